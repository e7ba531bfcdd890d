//! Integration tests for schedule building.

use chrono::{DateTime, Duration, TimeZone, Utc};
use proptest::prelude::*;
use proptest::sample::Index;
use tempo_core::{
    CoreError, EnergyProfile, HorizonWindow, Priority, ScheduleOutcome, SchedulePreferences,
    ScheduleRequest, SmartEngine, Task, UnscheduledReason,
};

fn at(h: u32, m: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 3, h, m, 0).unwrap()
}

fn workday_request(tasks: Vec<Task>) -> ScheduleRequest {
    ScheduleRequest {
        tasks,
        horizon: vec![HorizonWindow::new(at(9, 0), at(17, 0))],
        energy: EnergyProfile::Steady,
        preferences: SchedulePreferences::default(),
    }
}

#[test]
fn urgent_task_goes_first_on_a_steady_day() {
    let request = workday_request(vec![
        Task::new("urgent", "Urgent", 60).with_priority(Priority::Urgent),
        Task::new("low", "Low", 30).with_priority(Priority::Low),
        Task::new("medium", "Medium", 45).with_priority(Priority::Medium),
    ]);
    let outcome = SmartEngine::new().build_schedule(&request).unwrap();

    assert!(outcome.is_complete());
    assert_eq!(outcome.schedule.len(), 3);
    let urgent = outcome.schedule.entry_for("urgent").unwrap();
    assert_eq!(urgent.start, at(9, 0));
    assert!(outcome.schedule.entries.iter().all(|e| e.start >= urgent.start));
    assert_eq!(outcome.schedule.entries[0].task_id, "urgent");
}

#[test]
fn dependent_starts_after_its_dependency_ends() {
    let request = workday_request(vec![
        Task::new("X", "X", 60)
            .with_priority(Priority::Urgent)
            .depends_on("Y"),
        Task::new("Y", "Y", 30).with_priority(Priority::Low),
    ]);
    let outcome = SmartEngine::new().build_schedule(&request).unwrap();

    let y = outcome.schedule.entry_for("Y").unwrap();
    let x = outcome.schedule.entry_for("X").unwrap();
    assert_eq!((y.start, y.end), (at(9, 0), at(9, 30)));
    assert!(x.start >= at(9, 30));
}

#[test]
fn dependency_cycle_fails_the_call() {
    let request = workday_request(vec![
        Task::new("A", "A", 30).depends_on("B"),
        Task::new("B", "B", 30).depends_on("A"),
    ]);
    match SmartEngine::new().build_schedule(&request) {
        Err(CoreError::CycleDetected { task_ids }) => assert_eq!(task_ids, vec!["A", "B"]),
        other => panic!("expected CycleDetected, got {other:?}"),
    }
}

#[test]
fn partial_schedule_reports_reasons() {
    let mut request = workday_request(vec![
        Task::new("big", "Big", 600),
        Task::new("after-big", "After big", 30).depends_on("big"),
        Task::new("fits", "Fits", 30),
    ]);
    request.horizon[0] = request.horizon[0].clone().with_capacity_hours(4.0);
    let outcome = SmartEngine::new().build_schedule(&request).unwrap();

    assert!(outcome.schedule.entry_for("fits").is_some());
    let reasons: Vec<(&str, UnscheduledReason)> = outcome
        .unscheduled
        .iter()
        .map(|u| (u.task_id.as_str(), u.reason))
        .collect();
    assert!(reasons.contains(&("big", UnscheduledReason::NoCapacity)));
    assert!(reasons.contains(&("after-big", UnscheduledReason::DependencyUnresolved)));
}

#[test]
fn invalid_custom_curve_fails_the_call() {
    let mut request = workday_request(vec![Task::new("a", "A", 30)]);
    request.energy = EnergyProfile::Custom {
        weights: [(9u8, 1.5)].into_iter().collect(),
    };
    assert!(matches!(
        SmartEngine::new().build_schedule(&request),
        Err(CoreError::InvalidEnergyCurve { .. })
    ));
}

#[test]
fn request_reads_from_json() {
    let json = r#"{
        "tasks": [
            {"id": "a", "title": "A", "duration_minutes": 30, "priority": "high"}
        ],
        "horizon": [
            {"start": "2025-03-03T09:00:00Z", "end": "2025-03-03T12:00:00Z", "capacity_hours": 2.0}
        ],
        "energy": {"kind": "morning-person"}
    }"#;
    let request: ScheduleRequest = serde_json::from_str(json).unwrap();
    assert!(request.preferences.prefer_morning_for_high_priority);
    let outcome = SmartEngine::new().build_schedule(&request).unwrap();
    assert_eq!(outcome.schedule.entry_for("a").unwrap().start, at(9, 0));
}

// ── Properties ───────────────────────────────────────────────────────

fn priority_from(index: usize) -> Priority {
    [Priority::Low, Priority::Medium, Priority::High, Priority::Urgent][index % 4]
}

fn energy_from(index: usize) -> EnergyProfile {
    [
        EnergyProfile::Steady,
        EnergyProfile::MorningPerson,
        EnergyProfile::NightOwl,
    ][index % 3]
        .clone()
}

type TaskSpec = (u32, usize, Vec<Index>, Option<usize>);
type WindowSpec = (u32, u32, Option<u32>);

fn arb_request() -> impl Strategy<Value = ScheduleRequest> {
    let task = (
        1u32..=8,
        0usize..4,
        prop::collection::vec(any::<Index>(), 0..3),
        prop::option::of(0usize..3),
    );
    let window = (6u32..14, 1u32..9, prop::option::of(1u32..8));
    (
        prop::collection::vec(task, 1..10),
        prop::collection::vec(window, 1..4),
        0usize..3,
        (any::<bool>(), any::<bool>(), any::<bool>(), 0u32..4),
    )
        .prop_map(|(tasks, windows, energy, prefs)| build_request(tasks, windows, energy, prefs))
}

fn build_request(
    task_specs: Vec<TaskSpec>,
    window_specs: Vec<WindowSpec>,
    energy: usize,
    (morning, batch, overflow, break_every): (bool, bool, bool, u32),
) -> ScheduleRequest {
    let categories = ["email", "deep", "admin"];
    let tasks = task_specs
        .into_iter()
        .enumerate()
        .map(|(i, (quarters, priority, deps, category))| {
            let mut task = Task::new(format!("t{i}"), format!("Task {i}"), quarters * 15)
                .with_priority(priority_from(priority));
            if i > 0 {
                for dep in deps {
                    task = task.depends_on(format!("t{}", dep.index(i)));
                }
            }
            if let Some(c) = category {
                task = task.with_category(categories[c]);
            }
            task
        })
        .collect();

    let horizon = window_specs
        .into_iter()
        .enumerate()
        .map(|(day, (start_hour, hours, cap))| {
            let start = at(start_hour, 0) + Duration::days(day as i64);
            let window = HorizonWindow::new(start, start + Duration::hours(i64::from(hours)));
            match cap {
                Some(cap) => window.with_capacity_hours(f64::from(cap)),
                None => window,
            }
        })
        .collect();

    ScheduleRequest {
        tasks,
        horizon,
        energy: energy_from(energy),
        preferences: SchedulePreferences {
            prefer_morning_for_high_priority: morning,
            batch_similar_tasks: batch,
            allow_overflow_into_next_day: overflow,
            break_every,
            ..SchedulePreferences::default()
        },
    }
}

fn window_for(request: &ScheduleRequest, outcome: &ScheduleOutcome, index: usize) -> HorizonWindow {
    match request.horizon.get(index) {
        Some(w) => w.clone(),
        None => outcome
            .schedule
            .overflow_window
            .clone()
            .expect("entry in overflow window without one"),
    }
}

proptest! {
    #[test]
    fn never_starts_before_dependencies_end(request in arb_request()) {
        let outcome = SmartEngine::new().build_schedule(&request).unwrap();
        for entry in &outcome.schedule.entries {
            let task = request.tasks.iter().find(|t| t.id == entry.task_id).unwrap();
            for dep in &task.dependencies {
                let dep_entry = outcome.schedule.entry_for(dep);
                prop_assert!(dep_entry.is_some(), "{} placed without {}", entry.task_id, dep);
                prop_assert!(dep_entry.unwrap().end <= entry.start);
            }
        }
    }

    #[test]
    fn entries_fit_windows_without_overlap(request in arb_request()) {
        let outcome = SmartEngine::new().build_schedule(&request).unwrap();
        let entries = &outcome.schedule.entries;

        for (i, a) in entries.iter().enumerate() {
            let window = window_for(&request, &outcome, a.window_index);
            prop_assert!(a.start >= window.start && a.end <= window.end);
            for b in &entries[i + 1..] {
                if a.window_index == b.window_index {
                    prop_assert!(!a.overlaps(b.start, b.end), "{} overlaps {}", a.task_id, b.task_id);
                }
            }
            for pause in &outcome.schedule.breaks {
                prop_assert!(!pause.overlaps(a.start, a.end), "{} overlaps a break", a.task_id);
            }
        }

        let windows = request.horizon.len() + usize::from(outcome.schedule.overflow_window.is_some());
        for index in 0..windows {
            let window = window_for(&request, &outcome, index);
            prop_assert!(outcome.schedule.minutes_in_window(index) <= window.capacity_minutes());
        }
    }

    #[test]
    fn every_task_is_placed_or_explained(request in arb_request()) {
        let outcome = SmartEngine::new().build_schedule(&request).unwrap();
        prop_assert_eq!(
            outcome.schedule.len() + outcome.unscheduled.len(),
            request.tasks.len()
        );
    }

    #[test]
    fn identical_requests_give_identical_schedules(request in arb_request()) {
        let engine = SmartEngine::new();
        let first = engine.build_schedule(&request).unwrap();
        let second = engine.build_schedule(&request).unwrap();
        prop_assert_eq!(first, second);
    }
}
