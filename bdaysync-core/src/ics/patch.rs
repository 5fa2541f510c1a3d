//! In-place update of an existing event resource.

use icalendar::parser::unfold;

use super::{generate_ics, property_name};
use crate::event::BirthdayEvent;

/// Properties owned by bdaysync. Everything else on an existing event is kept.
const REPLACED: [&str; 3] = ["SUMMARY", "DESCRIPTION", "CATEGORIES"];

/// Rewrite `existing` so its first VEVENT carries the title, description,
/// category and alarms of `target`.
///
/// UID, dates, recurrence and any foreign properties are left untouched.
pub fn patch_event(existing: &str, target: &BirthdayEvent) -> String {
    let replacement = replacement_lines(&generate_ics(target));
    let unfolded = unfold(existing);

    let mut result = String::with_capacity(unfolded.len() + replacement.len() * 40);
    let mut vevent_seen = false;
    let mut in_target = false;
    let mut nested_depth = 0usize;
    let mut skipping_alarm = false;

    for line in unfolded.lines() {
        if !in_target {
            if line == "BEGIN:VEVENT" && !vevent_seen {
                vevent_seen = true;
                in_target = true;
            }
            push_line(&mut result, line);
            continue;
        }

        if skipping_alarm {
            if line == "END:VALARM" {
                skipping_alarm = false;
            }
            continue;
        }

        if nested_depth == 0 {
            if line == "BEGIN:VALARM" {
                skipping_alarm = true;
                continue;
            }
            if line == "END:VEVENT" {
                for new_line in &replacement {
                    push_line(&mut result, new_line);
                }
                push_line(&mut result, line);
                in_target = false;
                continue;
            }
            if REPLACED.contains(&property_name(line).to_ascii_uppercase().as_str()) {
                continue;
            }
        }

        if line.starts_with("BEGIN:") {
            nested_depth += 1;
        } else if line.starts_with("END:") {
            nested_depth = nested_depth.saturating_sub(1);
        }
        push_line(&mut result, line);
    }

    result
}

/// The replaced properties and VALARM blocks of a freshly generated event.
fn replacement_lines(ics: &str) -> Vec<String> {
    let unfolded = unfold(ics);
    let mut lines = Vec::new();
    let mut in_vevent = false;
    let mut in_alarm = false;

    for line in unfolded.lines() {
        match line {
            "BEGIN:VEVENT" => in_vevent = true,
            "END:VEVENT" => in_vevent = false,
            "BEGIN:VALARM" if in_vevent => {
                in_alarm = true;
                lines.push(line.to_string());
            }
            "END:VALARM" if in_vevent => {
                in_alarm = false;
                lines.push(line.to_string());
            }
            _ if in_alarm => lines.push(line.to_string()),
            _ if in_vevent && REPLACED.contains(&property_name(line)) => lines.push(line.to_string()),
            _ => {}
        }
    }

    lines
}

fn push_line(out: &mut String, line: &str) {
    out.push_str(line);
    out.push_str("\r\n");
}
