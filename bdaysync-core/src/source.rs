//! Boundaries to the address book and the calendar.
//!
//! The reconciler only talks to these traits; `bdaysync-dav` implements them
//! over CardDAV and CalDAV.

use async_trait::async_trait;

use crate::contact::ContactRecord;
use crate::error::SyncResult;
use crate::event::{BirthdayEvent, EventQuery, ExistingEvent};

/// One entry read from the address book: a contact, or the reason it could
/// not be read.
pub type SourceRecord = SyncResult<ContactRecord>;

/// Where contacts come from.
#[async_trait]
pub trait RecordSource: Send + Sync {
    /// Every contact that has a birthday.
    ///
    /// The outer error means the source could not be read at all
    /// (connection or authentication). Individual records that failed to
    /// parse are returned as inner errors so the pass can report them.
    async fn list_contacts(&self) -> SyncResult<Vec<SourceRecord>>;

    /// Names of the address books the contacts are read from.
    async fn address_books(&self) -> SyncResult<Vec<String>> {
        Ok(Vec::new())
    }
}

/// Where birthday events go.
#[async_trait]
pub trait EventSink: Send + Sync {
    /// The existing event for `query.name` on `query.date`, if any.
    async fn find_event(&self, query: &EventQuery) -> SyncResult<Option<ExistingEvent>>;

    async fn create_event(&self, event: &BirthdayEvent) -> SyncResult<()>;

    /// Overwrite `existing` with the content of `event`.
    async fn replace_event(&self, existing: &ExistingEvent, event: &BirthdayEvent) -> SyncResult<()>;
}
