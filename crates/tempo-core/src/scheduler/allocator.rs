//! Greedy slot allocator.
//!
//! Tasks are taken in dependency-graph order. Each one is placed at the
//! highest-scoring feasible start of the first window (chronologically) that
//! can hold it, where the score of a start is
//! `energy_weight(hour) * priority_weight`. Ties go to the earliest start.
//!
//! Feasible means: inside the window, no overlap with an existing entry or
//! reserved break, the window's capacity is not exceeded, and every
//! dependency's entry has ended.
//!
//! With `break_every = n`, every n-th task placed in a window reserves a break
//! right after its end, when that interval is still free.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Timelike, Utc};

use super::{
    HorizonWindow, Schedule, ScheduleEntry, ScheduleOutcome, ScheduleRequest, ScheduledBreak,
    SchedulerConfig, Unscheduled, UnscheduledReason,
};
use crate::energy::EnergyCurve;
use crate::error::{Result, ValidationError};
use crate::task::{Task, TaskGraph};

/// First and one-past-last start hour of the morning preference.
const MORNING_HOURS: (u32, u32) = (6, 12);

#[derive(Debug, Clone)]
struct WindowState {
    index: usize,
    window: HorizonWindow,
    capacity: i64,
    used: i64,
    placed: u32,
}

impl WindowState {
    fn new(index: usize, window: HorizonWindow) -> Self {
        Self {
            index,
            capacity: window.capacity_minutes(),
            window,
            used: 0,
            placed: 0,
        }
    }

    fn remaining(&self) -> i64 {
        self.capacity - self.used
    }
}

/// Working state of one allocation call.
struct Placement<'r> {
    curve: EnergyCurve,
    request: &'r ScheduleRequest,
    windows: Vec<WindowState>,
    entries: Vec<ScheduleEntry>,
    breaks: Vec<ScheduledBreak>,
    by_task: HashMap<String, usize>,
    last_in_category: HashMap<String, usize>,
    overflow: Option<HorizonWindow>,
}

/// Allocates tasks to time slots across a planning horizon.
#[derive(Debug, Clone, Default)]
pub struct SlotAllocator {
    config: SchedulerConfig,
}

impl SlotAllocator {
    /// Create an allocator with the default config
    pub fn new() -> Self {
        Self::default()
    }

    /// Create with custom config
    pub fn with_config(config: SchedulerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Build a schedule for the request.
    ///
    /// Deterministic for identical requests. Tasks that cannot be placed are
    /// reported in [`ScheduleOutcome::unscheduled`]; that is not an error.
    ///
    /// # Errors
    ///
    /// - `CycleDetected` if active tasks depend on each other circularly
    /// - `InvalidEnergyCurve` for a malformed custom curve
    /// - `Validation` for malformed windows, duplicate ids or zero durations
    pub fn allocate(&self, request: &ScheduleRequest) -> Result<ScheduleOutcome> {
        if self.config.slot_minutes <= 0 {
            return Err(ValidationError::InvalidValue {
                field: "slot_minutes".to_string(),
                message: "must be positive".to_string(),
            }
            .into());
        }
        for window in &request.horizon {
            window.validate()?;
        }
        let curve = request.energy.resolve()?;
        let graph = TaskGraph::build(&request.tasks)?;
        let order = graph.order();

        let mut windows: Vec<WindowState> = request
            .horizon
            .iter()
            .cloned()
            .enumerate()
            .map(|(i, w)| WindowState::new(i, w))
            .collect();
        windows.sort_by(|a, b| {
            a.window
                .start
                .cmp(&b.window.start)
                .then_with(|| a.index.cmp(&b.index))
        });

        let mut state = Placement {
            curve,
            request,
            windows,
            entries: Vec::new(),
            breaks: Vec::new(),
            by_task: HashMap::new(),
            last_in_category: HashMap::new(),
            overflow: None,
        };
        let mut unscheduled = Vec::new();

        for task in order.tasks {
            let deps = graph.active_dependencies(&task.id);
            if let Some(missing) = deps.iter().find(|d| !state.by_task.contains_key(**d)) {
                tracing::debug!(task = %task.id, dependency = %missing, "dependency unscheduled");
                unscheduled.push(Unscheduled {
                    task_id: task.id.clone(),
                    reason: UnscheduledReason::DependencyUnresolved,
                });
                continue;
            }
            let earliest = deps
                .iter()
                .map(|d| state.entries[state.by_task[*d]].end)
                .max();

            match self.place_with_overflow(&mut state, task, earliest) {
                Ok(()) => {}
                Err(reason) => {
                    tracing::debug!(task = %task.id, ?reason, "task left unscheduled");
                    unscheduled.push(Unscheduled {
                        task_id: task.id.clone(),
                        reason,
                    });
                }
            }
        }

        let mut entries = state.entries;
        entries.sort_by(|a, b| a.start.cmp(&b.start).then_with(|| a.task_id.cmp(&b.task_id)));
        let mut breaks = state.breaks;
        breaks.sort_by_key(|b| b.start);

        tracing::info!(
            placed = entries.len(),
            breaks = breaks.len(),
            unscheduled = unscheduled.len(),
            overflow = state.overflow.is_some(),
            "schedule built"
        );

        Ok(ScheduleOutcome {
            schedule: Schedule {
                entries,
                breaks,
                overflow_window: state.overflow,
            },
            unscheduled,
        })
    }

    fn place_with_overflow(
        &self,
        state: &mut Placement<'_>,
        task: &Task,
        earliest: Option<DateTime<Utc>>,
    ) -> std::result::Result<(), UnscheduledReason> {
        if let Some((slot, start)) = self.find_placement(state, task, earliest, None) {
            self.commit(state, task, slot, start);
            return Ok(());
        }

        if state.request.preferences.allow_overflow_into_next_day && state.overflow.is_none() {
            if let Some(last) = state.windows.iter().map(|w| &w.window).max_by_key(|w| w.end) {
                let overflow = last.next_day();
                tracing::debug!(start = %overflow.start, end = %overflow.end, "synthesized overflow window");
                let index = state.request.horizon.len();
                state.windows.push(WindowState::new(index, overflow.clone()));
                state.overflow = Some(overflow);

                let only = state.windows.len() - 1;
                if let Some((slot, start)) = self.find_placement(state, task, earliest, Some(only)) {
                    self.commit(state, task, slot, start);
                    return Ok(());
                }
            }
        }

        let minutes = task.duration_minutes as i64;
        if state.windows.iter().all(|w| w.remaining() < minutes) {
            Err(UnscheduledReason::NoCapacity)
        } else {
            Err(UnscheduledReason::HorizonExhausted)
        }
    }

    /// Returns (position in `state.windows`, start).
    fn find_placement(
        &self,
        state: &Placement<'_>,
        task: &Task,
        earliest: Option<DateTime<Utc>>,
        only_window: Option<usize>,
    ) -> Option<(usize, DateTime<Utc>)> {
        let prefs = &state.request.preferences;
        let mut passes = Vec::with_capacity(2);
        if prefs.prefer_morning_for_high_priority && task.priority.is_high() {
            passes.push(true);
        }
        passes.push(false);

        for morning_only in passes {
            // Morning restriction is applied before batching adjacency.
            if prefs.batch_similar_tasks {
                if let Some(found) = self.adjacent_start(state, task, earliest, morning_only, only_window) {
                    return Some(found);
                }
            }
            for (slot, ws) in state.windows.iter().enumerate() {
                if only_window.is_some_and(|only| only != slot) {
                    continue;
                }
                if let Some(start) = self.best_start(state, ws, task, earliest, morning_only) {
                    return Some((slot, start));
                }
            }
        }
        None
    }

    /// Start immediately after (or else immediately before) the most recently
    /// placed task of the same category.
    fn adjacent_start(
        &self,
        state: &Placement<'_>,
        task: &Task,
        earliest: Option<DateTime<Utc>>,
        morning_only: bool,
        only_window: Option<usize>,
    ) -> Option<(usize, DateTime<Utc>)> {
        let category = task.category.as_ref()?;
        let neighbour = &state.entries[*state.last_in_category.get(category)?];
        let slot = state
            .windows
            .iter()
            .position(|w| w.index == neighbour.window_index)?;
        if only_window.is_some_and(|only| only != slot) {
            return None;
        }
        let ws = &state.windows[slot];
        let duration = Duration::minutes(task.duration_minutes as i64);

        [neighbour.end, neighbour.start - duration]
            .into_iter()
            .find(|start| self.is_feasible(state, ws, task, *start, earliest, morning_only))
            .map(|start| (slot, start))
    }

    /// Highest-scoring feasible start in a window, earliest on ties.
    fn best_start(
        &self,
        state: &Placement<'_>,
        ws: &WindowState,
        task: &Task,
        earliest: Option<DateTime<Utc>>,
        morning_only: bool,
    ) -> Option<DateTime<Utc>> {
        let minutes = task.duration_minutes as i64;
        if ws.remaining() < minutes || ws.window.duration_minutes() < minutes {
            return None;
        }

        let mut best: Option<(f64, DateTime<Utc>)> = None;
        for start in self.candidate_starts(state, ws, earliest) {
            if !self.is_feasible(state, ws, task, start, earliest, morning_only) {
                continue;
            }
            let score = state.curve.weight_at(start) * task.priority.weight();
            if best.map_or(true, |(s, _)| score > s) {
                best = Some((score, start));
            }
        }
        best.map(|(_, start)| start)
    }

    /// Grid starts every `slot_minutes` from the window start, plus the end
    /// of every entry and break and the dependency bound, ascending and
    /// deduplicated.
    fn candidate_starts(
        &self,
        state: &Placement<'_>,
        ws: &WindowState,
        earliest: Option<DateTime<Utc>>,
    ) -> Vec<DateTime<Utc>> {
        let window = &ws.window;
        let step = Duration::minutes(self.config.slot_minutes);
        let mut starts = Vec::new();

        let mut cursor = window.start;
        while cursor < window.end {
            starts.push(cursor);
            cursor += step;
        }
        starts.extend(
            state
                .entries
                .iter()
                .map(|e| e.end)
                .chain(state.breaks.iter().map(|b| b.end))
                .filter(|t| *t >= window.start && *t < window.end),
        );
        if let Some(bound) = earliest {
            if bound >= window.start && bound < window.end {
                starts.push(bound);
            }
        }

        starts.sort();
        starts.dedup();
        starts
    }

    fn is_feasible(
        &self,
        state: &Placement<'_>,
        ws: &WindowState,
        task: &Task,
        start: DateTime<Utc>,
        earliest: Option<DateTime<Utc>>,
        morning_only: bool,
    ) -> bool {
        let minutes = task.duration_minutes as i64;
        let end = start + Duration::minutes(minutes);
        if start < ws.window.start || end > ws.window.end {
            return false;
        }
        if earliest.is_some_and(|bound| start < bound) {
            return false;
        }
        if morning_only && !(MORNING_HOURS.0..MORNING_HOURS.1).contains(&start.hour()) {
            return false;
        }
        if ws.used + minutes > ws.capacity {
            return false;
        }
        !state.entries.iter().any(|e| e.overlaps(start, end))
            && !state.breaks.iter().any(|b| b.overlaps(start, end))
    }

    fn commit(&self, state: &mut Placement<'_>, task: &Task, slot: usize, start: DateTime<Utc>) {
        let minutes = task.duration_minutes as i64;
        let ws = &mut state.windows[slot];
        ws.used += minutes;
        ws.placed += 1;
        let placed_in_window = ws.placed;

        let entry = ScheduleEntry {
            task_id: task.id.clone(),
            window_index: ws.index,
            start,
            end: start + Duration::minutes(minutes),
            focus_level: state.curve.focus_level(task.priority, start),
        };
        tracing::debug!(
            task = %task.id,
            start = %entry.start,
            end = %entry.end,
            window = entry.window_index,
            "task placed"
        );

        let position = state.entries.len();
        let entry_end = entry.end;
        state.entries.push(entry);
        state.by_task.insert(task.id.clone(), position);
        if let Some(category) = &task.category {
            state.last_in_category.insert(category.clone(), position);
        }

        let every = state.request.preferences.break_every;
        if every > 0 && placed_in_window % every == 0 {
            self.reserve_break(state, slot, entry_end);
        }
    }

    fn reserve_break(&self, state: &mut Placement<'_>, slot: usize, start: DateTime<Utc>) {
        let minutes = i64::from(state.request.preferences.break_minutes);
        if minutes == 0 {
            return;
        }
        let end = start + Duration::minutes(minutes);
        let ws = &state.windows[slot];
        let free = end <= ws.window.end
            && !state.entries.iter().any(|e| e.overlaps(start, end))
            && !state.breaks.iter().any(|b| b.overlaps(start, end));
        if !free {
            tracing::debug!(%start, window = ws.index, "no room for break");
            return;
        }
        tracing::debug!(%start, %end, window = ws.index, "break reserved");
        state.breaks.push(ScheduledBreak {
            window_index: ws.index,
            start,
            end,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::energy::EnergyProfile;
    use crate::scheduler::SchedulePreferences;
    use crate::task::Priority;
    use chrono::TimeZone;

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 3, h, m, 0).unwrap()
    }

    fn request(tasks: Vec<Task>, horizon: Vec<HorizonWindow>) -> ScheduleRequest {
        ScheduleRequest {
            tasks,
            horizon,
            energy: EnergyProfile::Steady,
            preferences: SchedulePreferences {
                prefer_morning_for_high_priority: false,
                batch_similar_tasks: false,
                ..SchedulePreferences::default()
            },
        }
    }

    #[test]
    fn packs_tasks_back_to_back_on_flat_curve() {
        let req = request(
            vec![
                Task::new("a", "A", 60).with_priority(Priority::High),
                Task::new("b", "B", 30).with_priority(Priority::Low),
            ],
            vec![HorizonWindow::new(at(9, 0), at(12, 0))],
        );
        let outcome = SlotAllocator::new().allocate(&req).unwrap();
        let a = outcome.schedule.entry_for("a").unwrap();
        let b = outcome.schedule.entry_for("b").unwrap();
        assert_eq!((a.start, a.end), (at(9, 0), at(10, 0)));
        assert_eq!((b.start, b.end), (at(10, 0), at(10, 30)));
    }

    #[test]
    fn energy_curve_moves_task_to_peak_hour() {
        let mut weights: std::collections::BTreeMap<u8, f64> =
            (0u8..24).map(|h| (h, 0.2)).collect();
        weights.insert(14, 1.0);
        let mut req = request(
            vec![Task::new("a", "A", 30)],
            vec![HorizonWindow::new(at(9, 0), at(17, 0))],
        );
        req.energy = EnergyProfile::Custom { weights };
        let outcome = SlotAllocator::new().allocate(&req).unwrap();
        assert_eq!(outcome.schedule.entry_for("a").unwrap().start, at(14, 0));
    }

    #[test]
    fn capacity_cap_limits_window() {
        let req = request(
            vec![
                Task::new("a", "A", 60).with_priority(Priority::High),
                Task::new("b", "B", 60),
            ],
            vec![HorizonWindow::new(at(9, 0), at(17, 0)).with_capacity_hours(1.5)],
        );
        let outcome = SlotAllocator::new().allocate(&req).unwrap();
        assert!(outcome.schedule.entry_for("a").is_some());
        assert_eq!(
            outcome.unscheduled,
            vec![Unscheduled {
                task_id: "b".to_string(),
                reason: UnscheduledReason::NoCapacity,
            }]
        );
    }

    #[test]
    fn full_windows_report_no_capacity() {
        let req = request(
            vec![
                Task::new("a", "A", 45).with_priority(Priority::Urgent),
                Task::new("c", "C", 60),
            ],
            vec![HorizonWindow::new(at(9, 0), at(10, 30))],
        );
        let outcome = SlotAllocator::new().allocate(&req).unwrap();
        assert_eq!(outcome.unscheduled[0].task_id, "c");
        assert_eq!(outcome.unscheduled[0].reason, UnscheduledReason::NoCapacity);
    }

    #[test]
    fn dependency_ending_after_free_window_reports_horizon_exhausted() {
        // "a" only fits the later window, so the earlier window's free half
        // hour is useless to its dependent.
        let req = request(
            vec![
                Task::new("a", "A", 60).with_priority(Priority::Urgent),
                Task::new("late", "Late", 30).depends_on("a"),
            ],
            vec![
                HorizonWindow::new(at(9, 0), at(9, 30)),
                HorizonWindow::new(at(13, 0), at(14, 0)),
            ],
        );
        let outcome = SlotAllocator::new().allocate(&req).unwrap();
        assert_eq!(outcome.schedule.entry_for("a").unwrap().start, at(13, 0));
        assert_eq!(
            outcome.unscheduled,
            vec![Unscheduled {
                task_id: "late".to_string(),
                reason: UnscheduledReason::HorizonExhausted,
            }]
        );
    }

    #[test]
    fn unplaceable_dependency_blocks_dependent() {
        let req = request(
            vec![
                Task::new("big", "Big", 600),
                Task::new("after", "After", 30).depends_on("big"),
            ],
            vec![HorizonWindow::new(at(9, 0), at(17, 0))],
        );
        let outcome = SlotAllocator::new().allocate(&req).unwrap();
        assert!(outcome.schedule.is_empty());
        assert_eq!(outcome.unscheduled.len(), 2);
        assert_eq!(
            outcome.unscheduled[1],
            Unscheduled {
                task_id: "after".to_string(),
                reason: UnscheduledReason::DependencyUnresolved,
            }
        );
    }

    #[test]
    fn overflow_window_takes_leftovers() {
        let mut req = request(
            vec![
                Task::new("a", "A", 60).with_priority(Priority::High),
                Task::new("b", "B", 60),
            ],
            vec![HorizonWindow::new(at(9, 0), at(10, 0))],
        );
        req.preferences.allow_overflow_into_next_day = true;
        let outcome = SlotAllocator::new().allocate(&req).unwrap();
        assert!(outcome.is_complete());
        let b = outcome.schedule.entry_for("b").unwrap();
        assert_eq!(b.window_index, 1);
        assert_eq!(b.start, at(9, 0) + Duration::days(1));
        assert!(outcome.schedule.overflow_window.is_some());
    }

    #[test]
    fn morning_preference_skips_afternoon_peak() {
        let mut weights: std::collections::BTreeMap<u8, f64> =
            (0u8..24).map(|h| (h, 0.3)).collect();
        weights.insert(15, 1.0);
        let mut req = request(
            vec![Task::new("h", "H", 60).with_priority(Priority::High)],
            vec![HorizonWindow::new(at(9, 0), at(17, 0))],
        );
        req.energy = EnergyProfile::Custom { weights };
        req.preferences.prefer_morning_for_high_priority = true;
        let outcome = SlotAllocator::new().allocate(&req).unwrap();
        assert_eq!(outcome.schedule.entry_for("h").unwrap().start, at(9, 0));

        req.preferences.prefer_morning_for_high_priority = false;
        let outcome = SlotAllocator::new().allocate(&req).unwrap();
        assert_eq!(outcome.schedule.entry_for("h").unwrap().start, at(15, 0));
    }

    #[test]
    fn batching_places_category_mates_adjacent() {
        let mut weights: std::collections::BTreeMap<u8, f64> =
            (0u8..24).map(|h| (h, 0.5)).collect();
        weights.insert(14, 1.0);
        let tasks = vec![
            Task::new("mail-1", "Mail 1", 30).with_category("email"),
            Task::new("deep", "Deep", 120),
            Task::new("mail-2", "Mail 2", 30)
                .with_priority(Priority::Low)
                .with_category("email"),
        ];
        let mut req = request(tasks, vec![HorizonWindow::new(at(9, 0), at(17, 0))]);
        req.energy = EnergyProfile::Custom { weights };

        // "deep" takes the rest of the peak hour, so the slot after mail-1 is
        // gone and batching falls back to the slot right before it.
        req.preferences.batch_similar_tasks = true;
        let outcome = SlotAllocator::new().allocate(&req).unwrap();
        let first = outcome.schedule.entry_for("mail-1").unwrap();
        let second = outcome.schedule.entry_for("mail-2").unwrap();
        assert_eq!(first.start, at(14, 0));
        assert_eq!(outcome.schedule.entry_for("deep").unwrap().start, at(14, 30));
        assert_eq!(second.end, first.start);

        req.preferences.batch_similar_tasks = false;
        let outcome = SlotAllocator::new().allocate(&req).unwrap();
        assert_eq!(outcome.schedule.entry_for("mail-2").unwrap().start, at(9, 0));
    }

    #[test]
    fn morning_preference_outranks_category_batching() {
        let mut weights: std::collections::BTreeMap<u8, f64> =
            (0u8..24).map(|h| (h, 0.3)).collect();
        weights.insert(15, 1.0);
        let tasks = vec![
            Task::new("u", "U", 90)
                .with_priority(Priority::Urgent)
                .with_category("c"),
            Task::new("h", "H", 30)
                .with_priority(Priority::High)
                .with_category("c"),
        ];
        // The morning window is too short for "u", so it lands in the afternoon
        let mut req = request(
            tasks,
            vec![
                HorizonWindow::new(at(9, 0), at(10, 0)),
                HorizonWindow::new(at(14, 0), at(17, 0)),
            ],
        );
        req.energy = EnergyProfile::Custom { weights };
        req.preferences.prefer_morning_for_high_priority = true;
        req.preferences.batch_similar_tasks = true;

        let outcome = SlotAllocator::new().allocate(&req).unwrap();
        assert_eq!(outcome.schedule.entry_for("u").unwrap().start, at(15, 0));
        let h = outcome.schedule.entry_for("h").unwrap();
        assert_eq!(h.start, at(9, 0));
        assert!((6..12).contains(&h.start.hour()));

        req.preferences.prefer_morning_for_high_priority = false;
        let outcome = SlotAllocator::new().allocate(&req).unwrap();
        assert_eq!(outcome.schedule.entry_for("h").unwrap().start, at(16, 30));
    }

    #[test]
    fn break_follows_every_second_task() {
        let mut req = request(
            vec![
                Task::new("a", "A", 30),
                Task::new("b", "B", 30),
                Task::new("c", "C", 30),
            ],
            vec![HorizonWindow::new(at(9, 0), at(12, 0))],
        );
        req.preferences.break_every = 2;
        let outcome = SlotAllocator::new().allocate(&req).unwrap();

        assert_eq!(outcome.schedule.entry_for("a").unwrap().start, at(9, 0));
        assert_eq!(outcome.schedule.entry_for("b").unwrap().start, at(9, 30));
        assert_eq!(
            outcome.schedule.breaks,
            vec![ScheduledBreak {
                window_index: 0,
                start: at(10, 0),
                end: at(10, 15),
            }]
        );
        assert_eq!(outcome.schedule.entry_for("c").unwrap().start, at(10, 15));
        // Breaks do not count as work
        assert_eq!(outcome.schedule.minutes_in_window(0), 90);
    }

    #[test]
    fn break_is_skipped_when_window_ends() {
        let mut req = request(
            vec![Task::new("a", "A", 60)],
            vec![HorizonWindow::new(at(9, 0), at(10, 0))],
        );
        req.preferences.break_every = 1;
        let outcome = SlotAllocator::new().allocate(&req).unwrap();
        assert!(outcome.is_complete());
        assert!(outcome.schedule.breaks.is_empty());
    }

    #[test]
    fn invalid_slot_size_is_rejected() {
        let req = request(vec![], vec![HorizonWindow::new(at(9, 0), at(10, 0))]);
        let allocator = SlotAllocator::with_config(SchedulerConfig { slot_minutes: 0 });
        assert!(allocator.allocate(&req).is_err());
    }
}
