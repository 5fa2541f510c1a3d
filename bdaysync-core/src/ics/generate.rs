//! ICS generation.

use chrono::Duration;
use icalendar::{Alarm, Calendar, Component, EventLike, Property, Trigger, ValueType};

use crate::event::BirthdayEvent;

const PRODID: &str = "-//bdaysync//Birthday Sync//EN";

/// Generate .ics content for a birthday event.
///
/// The event is all-day (DTSTART/DTEND with VALUE=DATE, one day long),
/// recurs yearly and carries one DISPLAY alarm per reminder.
pub fn generate_ics(event: &BirthdayEvent) -> String {
    let mut cal = Calendar::new();

    let mut ics_event = icalendar::Event::new();
    ics_event.uid(&event.uid);
    ics_event.summary(&event.title);
    ics_event.description(&event.description);

    // DTSTAMP - required by RFC 5545
    let dtstamp = chrono::Utc::now().format("%Y%m%dT%H%M%SZ").to_string();
    ics_event.add_property("DTSTAMP", &dtstamp);

    add_date_property(&mut ics_event, "DTSTART", event.date);
    add_date_property(&mut ics_event, "DTEND", event.date + Duration::days(1));

    ics_event.add_property("CATEGORIES", &event.category);
    ics_event.add_property("RRULE", &event.rrule);
    ics_event.add_property("TRANSP", "TRANSPARENT");

    for alarm in &event.alarms {
        let trigger = Trigger::before_start(Duration::days(i64::from(alarm.days_before)));
        ics_event.alarm(Alarm::display(&alarm.message, trigger));
    }

    let ics_event = ics_event.done();
    cal.push(ics_event);
    let cal = cal.done();

    strip_ics_bloat(&cal.to_string())
}

/// Clean up ICS output from the icalendar crate
/// - Replace PRODID with our own
/// - Remove CALSCALE:GREGORIAN (it's the default)
/// - Remove DTSTAMP and UID inside VALARM sections (not required by RFC 5545)
fn strip_ics_bloat(ics: &str) -> String {
    let mut result = String::with_capacity(ics.len());
    let mut in_valarm = false;

    for line in ics.lines() {
        if line.starts_with("PRODID:") {
            result.push_str("PRODID:");
            result.push_str(PRODID);
            result.push_str("\r\n");
            continue;
        }

        if line == "CALSCALE:GREGORIAN" {
            continue;
        }

        if line == "BEGIN:VALARM" {
            in_valarm = true;
        } else if line == "END:VALARM" {
            in_valarm = false;
        }

        if in_valarm && (line.starts_with("DTSTAMP:") || line.starts_with("UID:")) {
            continue;
        }

        result.push_str(line);
        result.push_str("\r\n");
    }

    result
}

fn add_date_property(ics_event: &mut icalendar::Event, name: &str, date: chrono::NaiveDate) {
    let mut prop = Property::new(name, date.format("%Y%m%d").to_string());
    prop.append_parameter(ValueType::Date);
    ics_event.append_property(prop);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::Alarm as BirthdayAlarm;
    use chrono::NaiveDate;

    fn make_test_event() -> BirthdayEvent {
        BirthdayEvent {
            uid: "birthday-ada-lovelace-20251210".to_string(),
            date: NaiveDate::from_ymd_opt(2025, 12, 10).unwrap(),
            title: "Ada Lovelace's Birthday".to_string(),
            description: "Birthday of Ada Lovelace".to_string(),
            category: "Birthday".to_string(),
            rrule: "FREQ=YEARLY".to_string(),
            alarms: vec![BirthdayAlarm {
                days_before: 1,
                message: "Tomorrow is Ada Lovelace's birthday!".to_string(),
            }],
        }
    }

    #[test]
    fn test_generate_ics_is_all_day() {
        let ics = generate_ics(&make_test_event());

        assert!(
            ics.contains("DTSTART;VALUE=DATE:20251210"),
            "DTSTART should have VALUE=DATE parameter. ICS:\n{}",
            ics
        );
        assert!(
            ics.contains("DTEND;VALUE=DATE:20251211"),
            "DTEND should be the following day. ICS:\n{}",
            ics
        );
    }

    #[test]
    fn test_generate_ics_yearly_with_category() {
        let ics = generate_ics(&make_test_event());

        assert!(ics.contains("UID:birthday-ada-lovelace-20251210"));
        assert!(ics.contains("RRULE:FREQ=YEARLY"));
        assert!(ics.contains("CATEGORIES:Birthday"));
        assert!(ics.contains(&format!("PRODID:{PRODID}")));
        assert!(!ics.contains("CALSCALE"));
    }

    #[test]
    fn test_generate_ics_alarm_per_reminder() {
        let mut event = make_test_event();
        event.alarms.push(BirthdayAlarm {
            days_before: 7,
            message: "Ada Lovelace's birthday is in 7 days!".to_string(),
        });

        let ics = generate_ics(&event);

        assert_eq!(ics.matches("BEGIN:VALARM").count(), 2);
        assert!(ics.contains("ACTION:DISPLAY"));
        assert!(ics.contains("Tomorrow is Ada Lovelace's birthday!"));

        let valarm_section: String = ics
            .split("BEGIN:VALARM")
            .nth(1)
            .unwrap()
            .split("END:VALARM")
            .next()
            .unwrap()
            .to_string();
        assert!(
            !valarm_section.contains("UID:"),
            "VALARM should not have UID. Got:\n{}",
            valarm_section
        );
    }
}
