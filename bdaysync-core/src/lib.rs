//! Core of bdaysync: contacts in, birthday events out.
//!
//! This crate holds everything that does not speak HTTP:
//! - `contact` and `event` for the data model
//! - `reconcile` for the create/update/skip decision and the sync pass
//! - `schedule` and `scheduler` for the daemon loop
//! - `ics` for reading and writing calendar resources
//!
//! The address book and calendar are reached through the traits in `source`.

pub mod contact;
pub mod diagnostic;
pub mod error;
pub mod event;
pub mod ics;
pub mod reconcile;
pub mod schedule;
pub mod scheduler;
pub mod settings;
pub mod source;
pub mod template;

pub use contact::{Birthday, ContactRecord};
pub use diagnostic::{DiagnosticReport, run_diagnostic};
pub use error::{SyncError, SyncResult};
pub use event::{BirthdayEvent, EventQuery, ExistingEvent};
pub use reconcile::{Outcome, PassReport, Reconciler, run_sync_pass};
pub use settings::{DavAccount, RunMode, Settings};
pub use source::{EventSink, RecordSource, SourceRecord};
pub use template::{EventTemplate, ReminderSpec};
