//! Contact records and their birthdays.
//!
//! Contacts come from an address book as vCards. Only the display name and
//! the `BDAY` property matter here; everything else is ignored.

use std::fmt;

use chrono::{Datelike, NaiveDate};
use icalendar::parser::unfold;

use crate::error::{SyncError, SyncResult};

/// Year used for date arithmetic on birthdays stored without a year.
///
/// A leap year, so that `--02-29` is still a valid date.
pub const PLACEHOLDER_YEAR: i32 = 2000;

/// A birthday as recorded in the address book.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Birthday {
    pub month: u32,
    pub day: u32,
    /// Birth year, if the address book knows it.
    pub year: Option<i32>,
}

impl Birthday {
    pub fn new(month: u32, day: u32, year: Option<i32>) -> SyncResult<Self> {
        let check_year = year.unwrap_or(PLACEHOLDER_YEAR);
        NaiveDate::from_ymd_opt(check_year, month, day).ok_or_else(|| {
            SyncError::Parse(format!("{check_year:04}-{month:02}-{day:02} is not a date"))
        })?;
        Ok(Birthday { month, day, year })
    }

    /// The date this birthday falls on in `year`.
    ///
    /// Fails for Feb 29 in a non-leap year.
    pub fn in_year(&self, year: i32) -> SyncResult<NaiveDate> {
        NaiveDate::from_ymd_opt(year, self.month, self.day).ok_or_else(|| {
            SyncError::InvalidDate(format!("{:02}-{:02} does not exist in {year}", self.month, self.day))
        })
    }

    /// Parse a vCard `BDAY` value.
    ///
    /// Supported: `YYYYMMDD`, `YYYY-MM-DD`, `MM/DD/YYYY` (falling back to
    /// `DD/MM/YYYY`), `--MM-DD` and `--MMDD`. A time part after `T` is ignored.
    pub fn parse(value: &str) -> SyncResult<Self> {
        let clean = value.trim().split('T').next().unwrap_or_default();

        if let Some(month_day) = clean.strip_prefix("--") {
            let month_day = month_day.replace('-', "");
            let date = NaiveDate::parse_from_str(&format!("{PLACEHOLDER_YEAR}{month_day}"), "%Y%m%d")
                .map_err(|e| SyncError::Parse(format!("birthday '{value}': {e}")))?;
            return Ok(Birthday {
                month: date.month(),
                day: date.day(),
                year: None,
            });
        }

        let date = if clean.len() == 8 && clean.chars().all(|c| c.is_ascii_digit()) {
            NaiveDate::parse_from_str(clean, "%Y%m%d").ok()
        } else if clean.len() == 10 && clean.matches('-').count() == 2 {
            NaiveDate::parse_from_str(clean, "%Y-%m-%d").ok()
        } else if clean.len() == 10 && clean.matches('/').count() == 2 {
            NaiveDate::parse_from_str(clean, "%m/%d/%Y")
                .or_else(|_| NaiveDate::parse_from_str(clean, "%d/%m/%Y"))
                .ok()
        } else {
            return Err(SyncError::Parse(format!("unknown birthday format '{value}'")));
        };

        let date = date.ok_or_else(|| SyncError::Parse(format!("could not parse birthday '{value}'")))?;
        Ok(Birthday {
            month: date.month(),
            day: date.day(),
            year: Some(date.year()),
        })
    }
}

impl fmt::Display for Birthday {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.year {
            Some(year) => write!(f, "{year:04}-{:02}-{:02}", self.month, self.day),
            None => write!(f, "--{:02}-{:02}", self.month, self.day),
        }
    }
}

/// A contact with a birthday.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContactRecord {
    pub name: String,
    pub birthday: Birthday,
    /// Address book the record was read from, for diagnostics.
    pub address_book: Option<String>,
}

impl ContactRecord {
    pub fn new(name: impl Into<String>, birthday: Birthday) -> SyncResult<Self> {
        let name = name.into().trim().to_string();
        if name.is_empty() {
            return Err(SyncError::Parse("contact has an empty name".into()));
        }
        Ok(ContactRecord {
            name,
            birthday,
            address_book: None,
        })
    }

    /// Identity used for UIDs and matching.
    pub fn identity(&self) -> String {
        normalize_name(&self.name)
    }

    /// Parse a vCard into a contact.
    ///
    /// Returns `Ok(None)` for a card without a `BDAY` (not a birthday
    /// contact), and an error when the card or its birthday is malformed.
    pub fn from_vcard(content: &str) -> SyncResult<Option<Self>> {
        let unfolded = unfold(content.trim());
        if !unfolded.starts_with("BEGIN:VCARD") {
            return Err(SyncError::Parse("not a vCard (missing BEGIN:VCARD)".into()));
        }

        let mut full_name = None;
        let mut structured_name = None;
        let mut bday = None;

        for line in unfolded.lines() {
            let Some((head, value)) = line.split_once(':') else {
                continue;
            };
            // Property name without parameters or group prefix (item1.BDAY;VALUE=date)
            let name = head.split(';').next().unwrap_or_default();
            let name = name.rsplit('.').next().unwrap_or_default().to_ascii_uppercase();

            match name.as_str() {
                "FN" => full_name = Some(unescape(value)),
                "N" => structured_name = Some(value.to_string()),
                "BDAY" => bday = Some(value.trim().to_string()),
                _ => {}
            }
        }

        let name = full_name
            .filter(|n| !n.trim().is_empty())
            .or_else(|| structured_name.as_deref().and_then(name_from_n))
            .unwrap_or_else(|| "Unknown".to_string());

        let Some(bday) = bday else {
            return Ok(None);
        };

        let birthday = Birthday::parse(&bday)
            .map_err(|e| SyncError::Parse(format!("{name}: {e}")))?;
        ContactRecord::new(name, birthday).map(Some)
    }
}

/// Lowercase a name and join its words with `-`.
///
/// "  Ada   Lovelace " becomes "ada-lovelace".
pub fn normalize_name(name: &str) -> String {
    name.split_whitespace()
        .collect::<Vec<_>>()
        .join("-")
        .to_lowercase()
}

/// Build "Given Family" from an `N` value (`Family;Given;Additional;Prefix;Suffix`).
fn name_from_n(value: &str) -> Option<String> {
    let mut parts = value.split(';');
    let family = parts.next().map(unescape).unwrap_or_default();
    let given = parts.next().map(unescape).unwrap_or_default();

    let joined = [given.trim(), family.trim()]
        .into_iter()
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ");

    (!joined.is_empty()).then_some(joined)
}

fn unescape(value: &str) -> String {
    value
        .replace("\\,", ",")
        .replace("\\;", ";")
        .replace("\\n", " ")
        .replace("\\N", " ")
        .replace("\\\\", "\\")
        .trim()
        .to_string()
}
