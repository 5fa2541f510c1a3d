mod common;

use bdaysync_core::{
    EventTemplate, Outcome, PassReport, Reconciler, ReminderSpec, SyncError, run_diagnostic, run_sync_pass,
};
use common::{MemorySink, MemorySource, contact, date};

fn template_with_reminders(days: &[u32]) -> EventTemplate {
    EventTemplate {
        reminders: ReminderSpec::new(days.iter().copied()),
        ..EventTemplate::default()
    }
}

#[tokio::test]
async fn yearless_birthday_gets_events_for_this_year_and_next() {
    let source = MemorySource::new(vec![contact("Bob", "--06-15")]);
    let sink = MemorySink::default();

    let report = run_sync_pass(&source, &sink, &EventTemplate::default(), date(2025, 3, 1))
        .await
        .unwrap();

    assert_eq!(report.contacts, 1);
    assert_eq!(report.created, 2);

    let this_year = sink.get("birthday-bob-20250615").expect("2025 event");
    assert_eq!(this_year.summary.as_deref(), Some("🎂 Bob's Birthday"));
    assert_eq!(this_year.description.as_deref(), Some("Birthday of Bob"));
    assert_eq!(this_year.categories, vec!["Birthday".to_string()]);
    assert_eq!(this_year.alarm_days, vec![1]);
    assert!(this_year.data.contains("Tomorrow is Bob's birthday!"));
    assert!(this_year.data.contains("RRULE:FREQ=YEARLY"));
    assert!(this_year.data.contains("DTSTART;VALUE=DATE:20250615"));

    assert!(sink.get("birthday-bob-20260615").is_some());
}

#[tokio::test]
async fn second_pass_changes_nothing() {
    let source = MemorySource::new(vec![contact("Ada Lovelace", "1815-12-10"), contact("Bob", "--06-15")]);
    let sink = MemorySink::default();
    let template = template_with_reminders(&[0, 1, 7]);
    let today = date(2025, 3, 1);

    let first = run_sync_pass(&source, &sink, &template, today).await.unwrap();
    assert_eq!(first.created, 4);
    let writes = sink.writes();

    let second = run_sync_pass(&source, &sink, &template, today).await.unwrap();
    assert_eq!(
        second,
        PassReport {
            contacts: 2,
            unchanged: 4,
            ..PassReport::default()
        }
    );
    assert_eq!(second.changed(), 0);
    assert_eq!(sink.writes(), writes);
    assert_eq!(sink.len(), 4);
}

#[tokio::test]
async fn contacts_sharing_a_name_prefix_keep_separate_events() {
    let source = MemorySource::new(vec![contact("Bobby", "--06-15"), contact("Bob", "--06-15")]);
    let sink = MemorySink::default();
    let today = date(2025, 3, 1);

    let first = run_sync_pass(&source, &sink, &EventTemplate::default(), today)
        .await
        .unwrap();
    assert_eq!(first.created, 4);
    assert_eq!(first.updated, 0);

    let second = run_sync_pass(&source, &sink, &EventTemplate::default(), today)
        .await
        .unwrap();
    assert_eq!(second.changed(), 0);
    assert_eq!(second.unchanged, 4);

    let bob = sink.get("birthday-bob-20250615").expect("Bob's 2025 event");
    let bobby = sink.get("birthday-bobby-20250615").expect("Bobby's 2025 event");
    assert_eq!(bob.summary.as_deref(), Some("🎂 Bob's Birthday"));
    assert_eq!(bobby.summary.as_deref(), Some("🎂 Bobby's Birthday"));
    assert_eq!(sink.len(), 4);
}

#[tokio::test]
async fn changed_template_updates_in_place() {
    let source = MemorySource::new(vec![contact("Ada Lovelace", "--12-10")]);
    let sink = MemorySink::default();
    let today = date(2025, 3, 1);

    run_sync_pass(&source, &sink, &EventTemplate::default(), today)
        .await
        .unwrap();

    let template = EventTemplate {
        title: "{name} turns another year older".to_string(),
        reminders: ReminderSpec::new([7, 1]),
        ..EventTemplate::default()
    };
    let report = run_sync_pass(&source, &sink, &template, today).await.unwrap();

    assert_eq!(report.updated, 2);
    assert_eq!(sink.len(), 2);

    let event = sink.get("birthday-ada-lovelace-20251210").expect("same UID after update");
    assert_eq!(event.summary.as_deref(), Some("Ada Lovelace turns another year older"));
    assert_eq!(event.alarm_days, vec![1, 7]);

    let again = run_sync_pass(&source, &sink, &template, today).await.unwrap();
    assert_eq!(again.unchanged, 2);
}

#[tokio::test]
async fn updates_disabled_leaves_existing_events_alone() {
    let source = MemorySource::new(vec![contact("Ada Lovelace", "--12-10")]);
    let sink = MemorySink::default();
    let today = date(2025, 3, 1);

    run_sync_pass(&source, &sink, &EventTemplate::default(), today)
        .await
        .unwrap();

    let template = EventTemplate {
        title: "Party for {name}".to_string(),
        update_existing: false,
        ..EventTemplate::default()
    };
    let report = run_sync_pass(&source, &sink, &template, today).await.unwrap();

    assert_eq!(report.unchanged, 2);
    assert_eq!(report.updated, 0);
    let event = sink.get("birthday-ada-lovelace-20251210").unwrap();
    assert_eq!(event.summary.as_deref(), Some("🎂 Ada Lovelace's Birthday"));
}

#[tokio::test]
async fn reminder_order_does_not_trigger_updates() {
    let sink = MemorySink::default();
    let ada = contact("Ada Lovelace", "--12-10");

    let forward = template_with_reminders(&[1, 7]);
    let reconciler = Reconciler::new(&sink, &forward);
    assert!(matches!(reconciler.reconcile(&ada, 2025).await, Outcome::Created));

    let backward = template_with_reminders(&[7, 1, 7]);
    let reconciler = Reconciler::new(&sink, &backward);
    assert!(matches!(reconciler.reconcile(&ada, 2025).await, Outcome::Skipped));
}

#[tokio::test]
async fn events_from_other_clients_are_found_by_summary() {
    let sink = MemorySink::default();
    sink.insert_raw(
        "/cal/legacy.ics",
        date(2025, 12, 10),
        "BEGIN:VCALENDAR\r\n\
VERSION:2.0\r\n\
PRODID:-//Other//EN\r\n\
BEGIN:VEVENT\r\n\
UID:3f1c0d2e\r\n\
DTSTART;VALUE=DATE:20251210\r\n\
SUMMARY:Ada Lovelace Birthday\r\n\
X-KEEP:yes\r\n\
END:VEVENT\r\n\
END:VCALENDAR\r\n",
    );

    let template = EventTemplate::default();
    let reconciler = Reconciler::new(&sink, &template);
    let outcome = reconciler.reconcile(&contact("Ada Lovelace", "--12-10"), 2025).await;

    assert!(matches!(outcome, Outcome::Updated), "got {outcome}");
    assert_eq!(sink.len(), 1);
    let updated = &sink.parsed()[0];
    assert_eq!(updated.uid.as_deref(), Some("3f1c0d2e"));
    assert_eq!(updated.summary.as_deref(), Some("🎂 Ada Lovelace's Birthday"));
    assert!(updated.data.contains("X-KEEP:yes"));
}

#[tokio::test]
async fn one_failing_contact_does_not_stop_the_pass() {
    let source = MemorySource::new(vec![
        contact("Ada", "--12-10"),
        contact("Bob", "--06-15"),
        contact("Cy", "--01-02"),
    ]);
    let sink = MemorySink::rejecting(&["Bob"]);

    let report = run_sync_pass(&source, &sink, &EventTemplate::default(), date(2025, 3, 1))
        .await
        .unwrap();

    assert_eq!(report.contacts, 3);
    assert_eq!(report.created, 4);
    assert_eq!(report.failed, 2);
    assert_eq!(sink.len(), 4);
}

#[tokio::test]
async fn unreadable_records_are_counted_and_skipped() {
    let source = MemorySource::new(vec![contact("Ada", "--12-10")]);
    source.push_unreadable("Bob: unknown birthday format 'sometime in June'");
    let sink = MemorySink::default();

    let report = run_sync_pass(&source, &sink, &EventTemplate::default(), date(2025, 3, 1))
        .await
        .unwrap();

    assert_eq!(report.contacts, 1);
    assert_eq!(report.skipped_records, 1);
    assert_eq!(report.created, 2);
}

#[tokio::test]
async fn leap_day_birthday_fails_only_in_common_years() {
    let source = MemorySource::new(vec![contact("Leap", "--02-29")]);
    let sink = MemorySink::default();

    let report = run_sync_pass(&source, &sink, &EventTemplate::default(), date(2027, 3, 1))
        .await
        .unwrap();

    assert_eq!(report.failed, 1);
    assert_eq!(report.created, 1);
    assert!(sink.get("birthday-leap-20280229").is_some());

    let template = EventTemplate::default();
    let outcome = Reconciler::new(&sink, &template)
        .reconcile(&contact("Leap", "--02-29"), 2027)
        .await;
    assert!(matches!(outcome, Outcome::Failed(SyncError::InvalidDate(_))));
}

#[tokio::test]
async fn broken_title_template_fails_the_contact() {
    let sink = MemorySink::default();
    let template = EventTemplate {
        title: "{nickname}'s day".to_string(),
        ..EventTemplate::default()
    };

    let outcome = Reconciler::new(&sink, &template)
        .reconcile(&contact("Ada", "--12-10"), 2025)
        .await;

    assert!(matches!(outcome, Outcome::Failed(SyncError::TemplateRender(_))));
    assert_eq!(sink.len(), 0);
}

#[tokio::test]
async fn lookup_failure_never_creates() {
    let sink = MemorySink {
        lookups_fail: true,
        ..MemorySink::default()
    };
    let template = EventTemplate::default();

    let outcome = Reconciler::new(&sink, &template)
        .reconcile(&contact("Ada", "--12-10"), 2025)
        .await;

    assert!(matches!(outcome, Outcome::Failed(SyncError::Sink(_))));
    assert_eq!(sink.writes(), 0);
}

#[tokio::test]
async fn unreachable_source_fails_the_pass() {
    let source = MemorySource {
        unreachable: true,
        ..MemorySource::default()
    };
    let sink = MemorySink::default();

    let result = run_sync_pass(&source, &sink, &EventTemplate::default(), date(2025, 3, 1)).await;

    assert!(matches!(result, Err(SyncError::Connection(_))));
}

#[tokio::test]
async fn empty_address_book_is_a_successful_pass() {
    let source = MemorySource::new(Vec::new());
    let sink = MemorySink::default();

    let report = run_sync_pass(&source, &sink, &EventTemplate::default(), date(2025, 3, 1))
        .await
        .unwrap();

    assert_eq!(report, PassReport::default());
}

#[tokio::test]
async fn diagnostic_lists_books_and_contacts() {
    let source = MemorySource::new(vec![contact("Ada", "--12-10"), contact("Bob", "1990-06-15")]);
    source.push_unreadable("broken");

    let report = run_diagnostic(&source).await.unwrap();

    assert_eq!(report.address_books.len(), 1);
    assert_eq!(report.contacts.len(), 2);
    assert_eq!(report.unreadable, 1);
}
