//! Read-only connectivity check against the address book.

use std::fmt;

use crate::contact::ContactRecord;
use crate::error::SyncResult;
use crate::source::RecordSource;

/// What a diagnostic pass found.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiagnosticReport {
    pub address_books: Vec<String>,
    pub contacts: Vec<ContactRecord>,
    /// Records whose birthday could not be read.
    pub unreadable: usize,
}

impl fmt::Display for DiagnosticReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} address books, {} contacts with birthdays, {} unreadable",
            self.address_books.len(),
            self.contacts.len(),
            self.unreadable
        )
    }
}

/// List address books and birthday contacts without touching the calendar.
///
/// Fails only when the source cannot be reached.
pub async fn run_diagnostic<R: RecordSource + ?Sized>(source: &R) -> SyncResult<DiagnosticReport> {
    let address_books = source.address_books().await?;
    for book in &address_books {
        tracing::info!(address_book = %book, "found address book");
    }

    let mut report = DiagnosticReport {
        address_books,
        ..Default::default()
    };

    for record in source.list_contacts().await? {
        match record {
            Ok(contact) => {
                tracing::info!(
                    contact = %contact.name,
                    birthday = %contact.birthday,
                    address_book = contact.address_book.as_deref().unwrap_or("-"),
                    "contact with birthday"
                );
                report.contacts.push(contact);
            }
            Err(e) => {
                tracing::warn!(%e, "unreadable contact");
                report.unreadable += 1;
            }
        }
    }

    tracing::info!(%report, "diagnostic finished");
    Ok(report)
}
