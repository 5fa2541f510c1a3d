//! Event templates and reminder phrasing.

use std::collections::BTreeSet;
use std::fmt;

use crate::error::{SyncError, SyncResult};

pub const DEFAULT_TITLE_TEMPLATE: &str = "🎂 {name}'s Birthday";
pub const DEFAULT_DESCRIPTION_TEMPLATE: &str = "Birthday of {name}";
pub const DEFAULT_CATEGORY: &str = "Birthday";

/// Days-before offsets for the alarms of a birthday event.
///
/// Stored as a sorted set, so `[7, 1, 1]` and `[1, 7]` are the same spec.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ReminderSpec(BTreeSet<u32>);

impl ReminderSpec {
    pub fn new(days: impl IntoIterator<Item = u32>) -> Self {
        ReminderSpec(days.into_iter().collect())
    }

    /// Parse a comma separated list such as `"1, 7,14"`.
    pub fn parse(value: &str) -> SyncResult<Self> {
        value
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| {
                s.parse::<u32>()
                    .map_err(|_| SyncError::Config(format!("invalid reminder day '{s}' in '{value}'")))
            })
            .collect::<SyncResult<BTreeSet<u32>>>()
            .map(ReminderSpec)
    }

    /// Offsets in ascending order.
    pub fn days(&self) -> impl Iterator<Item = u32> + '_ {
        self.0.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Default for ReminderSpec {
    fn default() -> Self {
        ReminderSpec::new([1])
    }
}

impl fmt::Display for ReminderSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let days: Vec<String> = self.days().map(|d| d.to_string()).collect();
        write!(f, "[{}]", days.join(", "))
    }
}

/// How birthday events should look. Loaded once per run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventTemplate {
    /// Title with a `{name}` placeholder.
    pub title: String,
    /// Description with a `{name}` placeholder.
    pub description: String,
    /// Alarm text with `{name}` and `{days}` placeholders. `None` uses fixed phrases.
    pub reminder_message: Option<String>,
    pub category: String,
    pub reminders: ReminderSpec,
    /// Rewrite events that already exist but look different.
    pub update_existing: bool,
}

impl Default for EventTemplate {
    fn default() -> Self {
        EventTemplate {
            title: DEFAULT_TITLE_TEMPLATE.to_string(),
            description: DEFAULT_DESCRIPTION_TEMPLATE.to_string(),
            reminder_message: None,
            category: DEFAULT_CATEGORY.to_string(),
            reminders: ReminderSpec::default(),
            update_existing: true,
        }
    }
}

impl EventTemplate {
    pub fn render_title(&self, name: &str) -> SyncResult<String> {
        render(&self.title, &[("name", name)])
    }

    pub fn render_description(&self, name: &str) -> SyncResult<String> {
        render(&self.description, &[("name", name)])
    }

    pub fn reminder_text(&self, name: &str, days_before: u32) -> String {
        format_reminder(name, days_before, self.reminder_message.as_deref())
    }
}

/// Substitute `{key}` placeholders in `template`.
///
/// `{{` and `}}` are literal braces. An unknown key or an unbalanced brace is
/// an error.
pub fn render(template: &str, values: &[(&str, &str)]) -> SyncResult<String> {
    let mut out = String::with_capacity(template.len());
    let mut chars = template.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '{' if chars.peek() == Some(&'{') => {
                chars.next();
                out.push('{');
            }
            '}' if chars.peek() == Some(&'}') => {
                chars.next();
                out.push('}');
            }
            '{' => {
                let mut key = String::new();
                loop {
                    match chars.next() {
                        Some('}') => break,
                        Some('{') | None => {
                            return Err(SyncError::TemplateRender(format!(
                                "unclosed placeholder in '{template}'"
                            )));
                        }
                        Some(k) => key.push(k),
                    }
                }
                let value = values
                    .iter()
                    .find(|(k, _)| *k == key.trim())
                    .map(|(_, v)| *v)
                    .ok_or_else(|| {
                        SyncError::TemplateRender(format!("unknown placeholder '{{{key}}}' in '{template}'"))
                    })?;
                out.push_str(value);
            }
            '}' => {
                return Err(SyncError::TemplateRender(format!(
                    "single '}}' in '{template}'"
                )));
            }
            c => out.push(c),
        }
    }

    Ok(out)
}

/// Text for an alarm `days_before` days ahead of `name`'s birthday.
///
/// Zero days is phrased as "today" and one day is singular. A template that
/// fails to render falls back to a fixed phrase for the same case.
pub fn format_reminder(name: &str, days_before: u32, template: Option<&str>) -> String {
    let Some(template) = template else {
        return fallback_reminder(name, days_before);
    };

    let days = days_before.to_string();
    let rendered = |t: &str| render(t, &[("name", name), ("days", &days)]);

    let message = match days_before {
        0 if !template.contains("{days}") => Ok(fallback_reminder(name, 0)),
        0 => rendered(template).map(|m| {
            m.replace("in 0 days", "today")
                .replace("in 0 day", "today")
                .replace("is in today", "is today")
        }),
        1 => rendered(template).map(|m| m.replace("1 days", "1 day")),
        _ => rendered(template),
    };

    match message {
        Ok(m) if days_before == 0 && m.contains("0 days") => fallback_reminder(name, 0),
        Ok(m) => m,
        Err(e) => {
            tracing::warn!(%e, template, "reminder template failed, using plain text");
            fallback_reminder(name, days_before)
        }
    }
}

fn fallback_reminder(name: &str, days_before: u32) -> String {
    match days_before {
        0 => format!("Today is {name}'s birthday!"),
        1 => format!("Tomorrow is {name}'s birthday!"),
        n => format!("{name}'s birthday is in {n} days!"),
    }
}
