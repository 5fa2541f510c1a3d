//! Idempotent reconciliation of birthday events.
//!
//! For each contact and year the calendar should hold exactly one birthday
//! event that matches the current [`EventTemplate`]. [`Reconciler::reconcile`]
//! decides whether that means creating, updating or leaving it alone, and
//! [`run_sync_pass`] applies it to every contact for this year and the next.

use std::fmt;

use chrono::{Datelike, NaiveDate};

use crate::contact::ContactRecord;
use crate::error::{SyncError, SyncResult};
use crate::event::{BirthdayEvent, EventQuery};
use crate::source::{EventSink, RecordSource};
use crate::template::EventTemplate;

/// What happened to one contact in one year.
#[derive(Debug)]
pub enum Outcome {
    Created,
    Updated,
    /// The event already exists and is current, or updates are disabled.
    Skipped,
    Failed(SyncError),
}

impl Outcome {
    pub fn is_change(&self) -> bool {
        matches!(self, Outcome::Created | Outcome::Updated)
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Created => write!(f, "created"),
            Outcome::Updated => write!(f, "updated"),
            Outcome::Skipped => write!(f, "skipped"),
            Outcome::Failed(e) => write!(f, "failed: {e}"),
        }
    }
}

/// Applies an [`EventTemplate`] to contacts against an [`EventSink`].
pub struct Reconciler<'a, S: EventSink + ?Sized> {
    sink: &'a S,
    template: &'a EventTemplate,
}

impl<'a, S: EventSink + ?Sized> Reconciler<'a, S> {
    pub fn new(sink: &'a S, template: &'a EventTemplate) -> Self {
        Reconciler { sink, template }
    }

    /// Make sure `contact` has a correct birthday event in `year`.
    ///
    /// Never returns an error: every failure becomes [`Outcome::Failed`].
    pub async fn reconcile(&self, contact: &ContactRecord, year: i32) -> Outcome {
        match self.try_reconcile(contact, year).await {
            Ok(outcome) => outcome,
            Err(e) => Outcome::Failed(e),
        }
    }

    async fn try_reconcile(&self, contact: &ContactRecord, year: i32) -> SyncResult<Outcome> {
        let target = BirthdayEvent::build(contact, year, self.template)?;

        let query = EventQuery::for_event(&contact.name, &target, &self.template.category);

        let Some(existing) = self.sink.find_event(&query).await.map_err(into_sink)? else {
            self.sink.create_event(&target).await.map_err(into_sink)?;
            tracing::info!(
                contact = %contact.name,
                date = %target.date,
                uid = %target.uid,
                reminders = %self.template.reminders,
                "created birthday event"
            );
            return Ok(Outcome::Created);
        };

        if !self.template.update_existing {
            tracing::info!(contact = %contact.name, date = %target.date, "birthday event exists, updates disabled");
            return Ok(Outcome::Skipped);
        }

        if existing.is_up_to_date(&target) {
            tracing::debug!(contact = %contact.name, date = %target.date, "birthday event is current");
            return Ok(Outcome::Skipped);
        }

        tracing::info!(
            contact = %contact.name,
            date = %target.date,
            old_title = existing.summary.as_deref().unwrap_or_default(),
            new_title = %target.title,
            "updating birthday event"
        );
        self.sink
            .replace_event(&existing, &target)
            .await
            .map_err(into_sink)?;
        Ok(Outcome::Updated)
    }
}

/// Calendar failures are always reported as [`SyncError::Sink`].
fn into_sink(err: SyncError) -> SyncError {
    match err {
        SyncError::Sink(_) => err,
        other => SyncError::Sink(other.to_string()),
    }
}

/// Aggregate result of one sync pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PassReport {
    /// Contacts that were read successfully and reconciled.
    pub contacts: usize,
    /// Address book records that could not be parsed.
    pub skipped_records: usize,
    pub created: usize,
    pub updated: usize,
    /// Contact-years left alone because they were already current.
    pub unchanged: usize,
    pub failed: usize,
}

impl PassReport {
    /// Events written during the pass.
    pub fn changed(&self) -> usize {
        self.created + self.updated
    }

    fn record(&mut self, outcome: &Outcome) {
        match outcome {
            Outcome::Created => self.created += 1,
            Outcome::Updated => self.updated += 1,
            Outcome::Skipped => self.unchanged += 1,
            Outcome::Failed(_) => self.failed += 1,
        }
    }
}

impl fmt::Display for PassReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} contacts: {} created, {} updated, {} unchanged, {} failed, {} unreadable records",
            self.contacts, self.created, self.updated, self.unchanged, self.failed, self.skipped_records
        )
    }
}

/// Reconcile every contact from `source` for `today`'s year and the next.
///
/// Per-record and per-contact problems are logged and counted. The pass only
/// fails when the source cannot be read.
pub async fn run_sync_pass<R, S>(
    source: &R,
    sink: &S,
    template: &EventTemplate,
    today: NaiveDate,
) -> SyncResult<PassReport>
where
    R: RecordSource + ?Sized,
    S: EventSink + ?Sized,
{
    let records = source.list_contacts().await?;
    let mut report = PassReport::default();

    if records.is_empty() {
        tracing::warn!("no contacts with birthdays found");
        return Ok(report);
    }

    let reconciler = Reconciler::new(sink, template);
    let current_year = today.year();

    for record in records {
        let contact = match record {
            Ok(contact) => contact,
            Err(e) => {
                tracing::warn!(%e, "skipping unreadable contact");
                report.skipped_records += 1;
                continue;
            }
        };

        report.contacts += 1;
        tracing::info!(contact = %contact.name, birthday = %contact.birthday, "processing birthday");

        for year in [current_year, current_year + 1] {
            let outcome = reconciler.reconcile(&contact, year).await;
            if let Outcome::Failed(e) = &outcome {
                tracing::error!(contact = %contact.name, year, %e, "could not reconcile birthday event");
            }
            report.record(&outcome);
        }
    }

    tracing::info!(%report, changed = report.changed(), "sync pass finished");
    Ok(report)
}
