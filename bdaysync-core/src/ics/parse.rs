//! ICS parsing using the icalendar crate's parser.

use icalendar::parser::{Component, read_calendar, unfold};

use crate::event::ExistingEvent;

/// Parse the first VEVENT of a calendar resource into an [`ExistingEvent`].
///
/// Missing properties stay `None`/empty. Returns `None` only when the
/// content is not a calendar with an event in it.
pub fn parse_existing(href: &str, etag: Option<String>, content: &str) -> Option<ExistingEvent> {
    let unfolded = unfold(content);
    let calendar = read_calendar(&unfolded).ok()?;
    let vevent = calendar.components.iter().find(|c| c.name == "VEVENT")?;

    let text = |name: &str| vevent.find_prop(name).map(|p| unescape(p.val.as_ref()));

    let categories = vevent
        .properties
        .iter()
        .filter(|p| p.name == "CATEGORIES")
        .flat_map(|p| split_list(p.val.as_ref()))
        .collect();

    Some(ExistingEvent {
        href: href.to_string(),
        etag,
        data: content.to_string(),
        uid: text("UID"),
        summary: text("SUMMARY"),
        description: text("DESCRIPTION"),
        categories,
        alarm_days: alarm_days(vevent),
    })
}

/// Whole days before the event for each VALARM with a relative trigger.
fn alarm_days(vevent: &Component) -> Vec<u32> {
    vevent
        .components
        .iter()
        .filter(|c| c.name == "VALARM")
        .filter_map(|alarm| {
            let trigger = alarm.find_prop("TRIGGER")?;
            parse_trigger_days(trigger.val.as_ref())
        })
        .collect()
}

/// Parse a TRIGGER value (-P1D, -PT24H, -P1W, ...) into days.
///
/// Partial days round up, so `-PT12H` counts as one day.
fn parse_trigger_days(value: &str) -> Option<u32> {
    let duration_str = value.trim_start_matches(['-', '+']);
    let duration = iso8601::duration(duration_str).ok()?;
    let std_duration: std::time::Duration = duration.into();
    let days = std_duration.as_secs().div_ceil(86_400);
    u32::try_from(days).ok()
}

/// Split a comma separated list value, honouring `\,` escapes.
fn split_list(value: &str) -> Vec<String> {
    let mut items = Vec::new();
    let mut current = String::new();
    let mut escaped = false;

    for c in value.chars() {
        match c {
            '\\' if !escaped => {
                escaped = true;
                current.push(c);
                continue;
            }
            ',' if !escaped => items.push(std::mem::take(&mut current)),
            c => current.push(c),
        }
        escaped = false;
    }
    items.push(current);

    items
        .iter()
        .map(|s| unescape(s.trim()))
        .filter(|s| !s.is_empty())
        .collect()
}

/// Undo RFC 5545 TEXT escaping.
fn unescape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();

    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') | Some('N') => out.push('\n'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }

    out
}
