//! Integration tests for batching, quiet hours and notification passes.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, NaiveTime, TimeZone, Utc};
use proptest::prelude::*;
use tempo_core::{
    default_rules, Config, Habit, JsonFileRepository, MemorySink, NotificationCandidate,
    NotificationPayload, QuietPolicy, QuietWindow, RuleAction, SmartEngine, StateSnapshot,
    SubjectKind, SubjectRef, Task,
};
use uuid::Uuid;

fn at(day: u32, h: u32, m: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, day, h, m, 0).unwrap()
}

fn candidate(action: RuleAction, generated_at: DateTime<Utc>) -> NotificationCandidate {
    NotificationCandidate {
        id: Uuid::new_v4(),
        rule_id: "rule".to_string(),
        subject: SubjectRef {
            kind: SubjectKind::Habit,
            id: "stretch".to_string(),
        },
        action,
        category: Some("health".to_string()),
        generated_at,
        payload: NotificationPayload {
            title: "Stretch".to_string(),
            message: String::new(),
            fields: BTreeMap::new(),
        },
    }
}

fn overnight(policy: QuietPolicy) -> QuietWindow {
    QuietWindow::parse("22:00", "07:00", policy).unwrap()
}

#[test]
fn late_evening_candidate_is_dropped_or_deferred() {
    let engine = SmartEngine::new();
    let late = [candidate(RuleAction::Remind, at(3, 23, 0))];

    let suppressed = engine.filter_notifications(
        &late,
        &[overnight(QuietPolicy::Suppress)],
        at(3, 23, 0),
        Duration::minutes(15),
    );
    assert!(suppressed.is_empty());

    let deferred = engine.filter_notifications(
        &late,
        &[overnight(QuietPolicy::Defer)],
        at(3, 23, 0),
        Duration::minutes(15),
    );
    assert_eq!(deferred.len(), 1);
    assert_eq!(deferred[0].deliver_at, at(4, 7, 0));
}

#[test]
fn escalation_passes_through_quiet_hours() {
    let engine = SmartEngine::new();
    let batches = engine.filter_notifications(
        &[candidate(RuleAction::Escalate, at(3, 23, 0))],
        &[overnight(QuietPolicy::Suppress)],
        at(3, 23, 0),
        Duration::minutes(15),
    );
    assert_eq!(batches.len(), 1);
    assert!(batches[0].escalated);
    assert_eq!(batches[0].deliver_at, at(3, 23, 0));
}

#[test]
fn output_is_chronological() {
    let engine = SmartEngine::new();
    let candidates = [
        candidate(RuleAction::Remind, at(3, 23, 30)),
        candidate(RuleAction::Escalate, at(3, 23, 30)),
        candidate(RuleAction::Celebrate, at(3, 18, 0)),
    ];
    let batches = engine.filter_notifications(
        &candidates,
        &[overnight(QuietPolicy::Defer)],
        at(3, 18, 0),
        Duration::minutes(15),
    );
    let times: Vec<_> = batches.iter().map(|b| b.deliver_at).collect();
    assert_eq!(times, vec![at(3, 18, 0), at(3, 23, 30), at(4, 7, 0)]);
}

#[test]
fn pass_over_json_workspace_with_default_rules() {
    let dir = tempfile::TempDir::new().unwrap();
    let now = at(3, 10, 0);
    let mut snapshot = StateSnapshot::new("alice");
    snapshot
        .tasks
        .push(Task::new("report", "Report", 60).with_due(now - Duration::hours(1)));
    snapshot.habits.push(Habit::new("stretch", "Stretch"));
    std::fs::write(
        dir.path().join("alice.json"),
        serde_json::to_string(&snapshot).unwrap(),
    )
    .unwrap();

    let engine = SmartEngine::from_config(&Config::default());
    let repo = JsonFileRepository::new(dir.path());
    let sink = MemorySink::new();
    let report = engine
        .run_notification_pass(&repo, &sink, "alice", &default_rules(), now)
        .unwrap();

    assert!(report.rule_errors.is_empty());
    assert_eq!(report.candidates, 2);
    assert_eq!(report.delivered.len(), 2);
    assert!(report.delivered.iter().any(|b| b.escalated));
    assert_eq!(sink.delivered().len(), 2);
}

fn time_of_day() -> impl Strategy<Value = NaiveTime> {
    (0u32..24, 0u32..60).prop_map(|(h, m)| NaiveTime::from_hms_opt(h, m, 0).unwrap())
}

proptest! {
    #[test]
    fn quiet_windows_hold_back_non_escalations(
        start in time_of_day(),
        end in time_of_day(),
        minute_of_day in 0i64..1440,
        defer in any::<bool>(),
    ) {
        let policy = if defer { QuietPolicy::Defer } else { QuietPolicy::Suppress };
        let window = QuietWindow::new(start, end, policy);
        let generated = at(3, 0, 0) + Duration::minutes(minute_of_day);
        let c = candidate(RuleAction::Remind, generated);

        let batches = tempo_core::notify::filter(
            std::slice::from_ref(&c),
            &[window],
            generated,
            Duration::minutes(15),
        );
        let delivered: Vec<_> = batches
            .iter()
            .filter(|b| b.candidates.iter().any(|x| x.id == c.id))
            .collect();

        if !window.contains(generated) {
            prop_assert_eq!(delivered.len(), 1);
            prop_assert_eq!(delivered[0].deliver_at, generated);
        } else if defer {
            prop_assert_eq!(delivered.len(), 1);
            let window_end = window.occurrence_end(generated);
            prop_assert!(delivered[0].deliver_at >= window_end);
            prop_assert!(!window.contains(delivered[0].deliver_at));
        } else {
            prop_assert!(delivered.is_empty());
        }
    }
}
