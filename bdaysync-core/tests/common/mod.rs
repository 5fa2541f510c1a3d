//! In-memory address book and calendar for integration tests.

#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::Mutex;

use async_trait::async_trait;
use bdaysync_core::ics::{generate_ics, parse_existing, patch_event};
use bdaysync_core::{
    Birthday, BirthdayEvent, ContactRecord, EventQuery, EventSink, ExistingEvent, RecordSource, SourceRecord,
    SyncError, SyncResult,
};
use chrono::NaiveDate;

pub fn contact(name: &str, birthday: &str) -> ContactRecord {
    ContactRecord::new(name, Birthday::parse(birthday).unwrap()).unwrap()
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

#[derive(Default)]
pub struct MemorySource {
    pub books: Vec<String>,
    pub records: Mutex<Vec<SourceRecord>>,
    pub unreachable: bool,
}

impl MemorySource {
    pub fn new(contacts: Vec<ContactRecord>) -> Self {
        MemorySource {
            books: vec!["/dav/addressbooks/ada/contacts/".to_string()],
            records: Mutex::new(contacts.into_iter().map(Ok).collect()),
            unreachable: false,
        }
    }

    pub fn push_unreadable(&self, reason: &str) {
        self.records
            .lock()
            .unwrap()
            .push(Err(SyncError::Parse(reason.to_string())));
    }
}

#[async_trait]
impl RecordSource for MemorySource {
    async fn list_contacts(&self) -> SyncResult<Vec<SourceRecord>> {
        if self.unreachable {
            return Err(SyncError::Connection("address book unreachable".into()));
        }
        let records = self.records.lock().unwrap();
        Ok(records
            .iter()
            .map(|r| match r {
                Ok(contact) => Ok(contact.clone()),
                Err(e) => Err(SyncError::Parse(e.to_string())),
            })
            .collect())
    }

    async fn address_books(&self) -> SyncResult<Vec<String>> {
        if self.unreachable {
            return Err(SyncError::Connection("address book unreachable".into()));
        }
        Ok(self.books.clone())
    }
}

/// A stored calendar resource: the date it covers and its ICS.
#[derive(Debug, Clone)]
pub struct StoredEvent {
    pub href: String,
    pub date: NaiveDate,
    pub etag: u32,
    pub ics: String,
}

#[derive(Default)]
pub struct MemorySink {
    pub events: Mutex<Vec<StoredEvent>>,
    /// Contacts whose writes fail.
    pub reject: HashSet<String>,
    pub lookups_fail: bool,
    pub writes: Mutex<usize>,
}

impl MemorySink {
    pub fn rejecting(names: &[&str]) -> Self {
        MemorySink {
            reject: names.iter().map(|n| n.to_string()).collect(),
            ..Default::default()
        }
    }

    /// Store a resource written by some other client.
    pub fn insert_raw(&self, href: &str, date: NaiveDate, ics: &str) {
        self.events.lock().unwrap().push(StoredEvent {
            href: href.to_string(),
            date,
            etag: 1,
            ics: ics.to_string(),
        });
    }

    pub fn len(&self) -> usize {
        self.events.lock().unwrap().len()
    }

    pub fn writes(&self) -> usize {
        *self.writes.lock().unwrap()
    }

    pub fn parsed(&self) -> Vec<ExistingEvent> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter_map(|e| parse_existing(&e.href, Some(e.etag.to_string()), &e.ics))
            .collect()
    }

    pub fn get(&self, uid: &str) -> Option<ExistingEvent> {
        self.parsed().into_iter().find(|e| e.uid.as_deref() == Some(uid))
    }

    fn check_rejected(&self, title: &str) -> SyncResult<()> {
        if self.reject.iter().any(|name| title.contains(name.as_str())) {
            return Err(SyncError::Sink(format!("server refused '{title}'")));
        }
        Ok(())
    }
}

#[async_trait]
impl EventSink for MemorySink {
    async fn find_event(&self, query: &EventQuery) -> SyncResult<Option<ExistingEvent>> {
        if self.lookups_fail {
            return Err(SyncError::Sink("REPORT failed with 500".into()));
        }
        let events = self.events.lock().unwrap();
        let (found, _) = query.pick(
            events
                .iter()
                .filter(|e| e.date == query.date)
                .filter_map(|e| parse_existing(&e.href, Some(e.etag.to_string()), &e.ics)),
        );
        Ok(found)
    }

    async fn create_event(&self, event: &BirthdayEvent) -> SyncResult<()> {
        self.check_rejected(&event.title)?;
        *self.writes.lock().unwrap() += 1;
        self.events.lock().unwrap().push(StoredEvent {
            href: format!("/cal/{}.ics", event.uid),
            date: event.date,
            etag: 1,
            ics: generate_ics(event),
        });
        Ok(())
    }

    async fn replace_event(&self, existing: &ExistingEvent, event: &BirthdayEvent) -> SyncResult<()> {
        self.check_rejected(&event.title)?;
        *self.writes.lock().unwrap() += 1;
        let mut events = self.events.lock().unwrap();
        let stored = events
            .iter_mut()
            .find(|e| e.href == existing.href)
            .ok_or_else(|| SyncError::Sink(format!("{} not found", existing.href)))?;

        if existing.etag.as_deref() != Some(stored.etag.to_string().as_str()) {
            return Err(SyncError::Sink("412 Precondition Failed".into()));
        }
        stored.ics = patch_event(&existing.data, event);
        stored.etag += 1;
        Ok(())
    }
}
