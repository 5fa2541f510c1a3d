//! ICS generation and parsing for birthday events.
//!
//! This module handles reading and writing .ics resources according to RFC 5545.

mod generate;
mod parse;
mod patch;

pub use generate::generate_ics;
pub use parse::parse_existing;
pub use patch::patch_event;

/// Property name of an unfolded content line (`DTSTART;VALUE=DATE:...` → `DTSTART`).
fn property_name(line: &str) -> &str {
    let end = line.find([':', ';']).unwrap_or(line.len());
    &line[..end]
}
