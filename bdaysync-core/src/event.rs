//! Birthday events and the calendar state they are compared against.
//!
//! A [`BirthdayEvent`] is derived from a contact, a year and the
//! [`EventTemplate`]; it is never stored on its own. An [`ExistingEvent`] is
//! whatever the calendar already holds, with every property optional.

use chrono::NaiveDate;

use crate::contact::{ContactRecord, normalize_name};
use crate::error::SyncResult;
use crate::template::EventTemplate;

pub const UID_PREFIX: &str = "birthday-";

/// Recurrence rule attached to every birthday event.
pub const YEARLY_RRULE: &str = "FREQ=YEARLY";

/// A reminder/alarm for a birthday event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alarm {
    /// Days before the event to trigger
    pub days_before: u32,
    pub message: String,
}

/// The event that should exist for one contact in one year.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BirthdayEvent {
    pub uid: String,
    /// All-day date of the birthday in the target year.
    pub date: NaiveDate,
    pub title: String,
    pub description: String,
    pub category: String,
    pub rrule: String,
    pub alarms: Vec<Alarm>,
}

impl BirthdayEvent {
    /// Build the event for `contact` in `year`.
    pub fn build(contact: &ContactRecord, year: i32, template: &EventTemplate) -> SyncResult<Self> {
        let date = contact.birthday.in_year(year)?;
        let title = template.render_title(&contact.name)?;
        let description = template.render_description(&contact.name)?;

        let alarms = template
            .reminders
            .days()
            .map(|days_before| Alarm {
                days_before,
                message: template.reminder_text(&contact.name, days_before),
            })
            .collect();

        Ok(BirthdayEvent {
            uid: event_uid(&contact.name, date),
            date,
            title,
            description,
            category: template.category.clone(),
            rrule: YEARLY_RRULE.to_string(),
            alarms,
        })
    }

    /// Alarm offsets, ascending.
    pub fn reminder_days(&self) -> Vec<u32> {
        let mut days: Vec<u32> = self.alarms.iter().map(|a| a.days_before).collect();
        days.sort_unstable();
        days.dedup();
        days
    }
}

/// Deterministic UID: `birthday-<normalized name>-<YYYYMMDD>`.
pub fn event_uid(name: &str, date: NaiveDate) -> String {
    format!("{}{}", uid_prefix(name), date.format("%Y%m%d"))
}

/// UID prefix shared by every year's event for `name`, up to the date.
pub fn uid_prefix(name: &str) -> String {
    format!("{UID_PREFIX}{}-", normalize_name(name))
}

/// The contact identity in a UID of the form `birthday-<identity>-YYYYMMDD`.
fn uid_identity(uid: &str) -> Option<&str> {
    let rest = uid.strip_prefix(UID_PREFIX)?;
    let (identity, date) = rest.rsplit_once('-')?;
    (date.len() == 8 && date.bytes().all(|b| b.is_ascii_digit()) && !identity.is_empty()).then_some(identity)
}

/// True when `name` occurs in `text` as a whole word ("Bob" is not in "Bobby's").
fn mentions(text: &str, name: &str) -> bool {
    if name.is_empty() {
        return false;
    }
    text.match_indices(name).any(|(at, _)| {
        let before = text[..at].chars().next_back();
        let after = text[at + name.len()..].chars().next();
        !before.is_some_and(char::is_alphanumeric) && !after.is_some_and(char::is_alphanumeric)
    })
}

/// What to look for in the calendar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventQuery {
    pub name: String,
    pub date: NaiveDate,
    pub category: String,
    /// UID this contact's event gets when we create it.
    pub uid: String,
}

impl EventQuery {
    /// The lookup for `target`, the event built for contact `name`.
    pub fn for_event(name: &str, target: &BirthdayEvent, category: &str) -> Self {
        EventQuery {
            name: name.to_string(),
            date: target.date,
            category: category.to_string(),
            uid: target.uid.clone(),
        }
    }

    /// Does `event` look like this contact's birthday event?
    ///
    /// An event whose UID follows our `birthday-<identity>-<date>` scheme
    /// matches only when the identity is this contact's. Anything else
    /// matches when its summary names the contact as a whole word together
    /// with the category (or the word "birthday").
    pub fn matches(&self, event: &ExistingEvent) -> bool {
        if let Some(uid) = event.uid.as_deref() {
            if uid == self.uid {
                return true;
            }
            if let Some(identity) = uid_identity(uid) {
                return identity == normalize_name(&self.name);
            }
        }

        event.summary.as_deref().is_some_and(|summary| {
            let lower = summary.to_lowercase();
            mentions(summary, &self.name)
                && (lower.contains(&self.category.to_lowercase()) || lower.contains("birthday"))
        })
    }

    /// The best match among `candidates`: the exact UID first, then any
    /// other match. Also returns how many further matches were passed over.
    pub fn pick(&self, candidates: impl IntoIterator<Item = ExistingEvent>) -> (Option<ExistingEvent>, usize) {
        let mut matching: Vec<ExistingEvent> = candidates.into_iter().filter(|e| self.matches(e)).collect();
        let extra = matching.len().saturating_sub(1);

        let exact = matching
            .iter()
            .position(|e| e.uid.as_deref() == Some(self.uid.as_str()));
        let found = match exact {
            Some(i) => Some(matching.swap_remove(i)),
            None if matching.is_empty() => None,
            None => Some(matching.swap_remove(0)),
        };
        (found, extra)
    }
}

/// An event resource already on the calendar.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExistingEvent {
    /// Resource path on the server.
    pub href: String,
    pub etag: Option<String>,
    /// Raw ICS as returned by the server.
    pub data: String,
    pub uid: Option<String>,
    pub summary: Option<String>,
    pub description: Option<String>,
    pub categories: Vec<String>,
    /// Trigger offsets of the VALARMs, in whole days.
    pub alarm_days: Vec<u32>,
}

impl ExistingEvent {
    /// True when title, description and reminder days already match `target`.
    pub fn is_up_to_date(&self, target: &BirthdayEvent) -> bool {
        let mut current = self.alarm_days.clone();
        current.sort_unstable();
        current.dedup();

        self.summary.as_deref().unwrap_or_default() == target.title
            && self.description.as_deref().unwrap_or_default() == target.description
            && current == target.reminder_days()
    }
}
