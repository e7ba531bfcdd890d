//! Automatic scheduler for pending tasks.
//!
//! This module provides the request/response types of slot allocation:
//! - A horizon of capacity-bounded windows
//! - A preference bundle (morning bias, category batching, breaks, overflow)
//! - The resulting schedule plus per-task reasons for anything left out
//!
//! The placement algorithm itself lives in [`allocator`].

pub mod allocator;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::energy::{EnergyProfile, FocusLevel};
use crate::error::{Result, ValidationError};
use crate::task::Task;

pub use allocator::SlotAllocator;

/// One contiguous, capacity-bounded interval of the horizon.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HorizonWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    /// Maximum hours of work placed in this window (defaults to its length)
    #[serde(default)]
    pub capacity_hours: Option<f64>,
}

impl HorizonWindow {
    /// Create an uncapped window
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            start,
            end,
            capacity_hours: None,
        }
    }

    pub fn with_capacity_hours(mut self, hours: f64) -> Self {
        self.capacity_hours = Some(hours);
        self
    }

    /// Window length in minutes
    pub fn duration_minutes(&self) -> i64 {
        (self.end - self.start).num_minutes()
    }

    /// Minutes of work this window accepts.
    pub fn capacity_minutes(&self) -> i64 {
        let length = self.duration_minutes();
        match self.capacity_hours {
            Some(hours) => ((hours * 60.0).floor() as i64).min(length),
            None => length,
        }
    }

    /// Check the window is well formed.
    pub fn validate(&self) -> Result<()> {
        if self.end <= self.start {
            return Err(ValidationError::InvalidTimeRange {
                start: self.start,
                end: self.end,
            }
            .into());
        }
        if let Some(hours) = self.capacity_hours {
            if !hours.is_finite() || hours < 0.0 {
                return Err(ValidationError::InvalidValue {
                    field: "capacity_hours".to_string(),
                    message: format!("{hours} is not a non-negative number of hours"),
                }
                .into());
            }
        }
        Ok(())
    }

    /// The same window one day later, or starting where this one ends if it
    /// spans more than a day.
    pub fn next_day(&self) -> Self {
        let shifted = self.start + Duration::days(1);
        let start = if shifted >= self.end { shifted } else { self.end };
        Self {
            start,
            end: start + (self.end - self.start),
            capacity_hours: self.capacity_hours,
        }
    }
}

/// Scheduling preferences.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulePreferences {
    /// Restrict High/Urgent tasks to 06:00-12:00 starts before any other hour
    #[serde(default = "default_true")]
    pub prefer_morning_for_high_priority: bool,
    /// Place a task right next to the last scheduled task of its category
    #[serde(default = "default_true")]
    pub batch_similar_tasks: bool,
    /// Retry unplaceable tasks once in a synthesized window after the horizon
    #[serde(default)]
    pub allow_overflow_into_next_day: bool,
    /// Reserve a break after every N tasks placed in a window (0 disables)
    #[serde(default)]
    pub break_every: u32,
    #[serde(default = "default_break_minutes")]
    pub break_minutes: u32,
}

fn default_true() -> bool {
    true
}

fn default_break_minutes() -> u32 {
    15
}

impl Default for SchedulePreferences {
    fn default() -> Self {
        Self {
            prefer_morning_for_high_priority: true,
            batch_similar_tasks: true,
            allow_overflow_into_next_day: false,
            break_every: 0,
            break_minutes: default_break_minutes(),
        }
    }
}

/// Input of one scheduling call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleRequest {
    pub tasks: Vec<Task>,
    /// Available windows; processed in chronological order
    pub horizon: Vec<HorizonWindow>,
    #[serde(default)]
    pub energy: EnergyProfile,
    #[serde(default)]
    pub preferences: SchedulePreferences,
}

/// A task bound to a concrete interval of one window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleEntry {
    pub task_id: String,
    /// Index into the request horizon; `horizon.len()` for the overflow window
    pub window_index: usize,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub focus_level: FocusLevel,
}

impl ScheduleEntry {
    /// Get total duration in minutes
    pub fn duration_minutes(&self) -> i64 {
        (self.end - self.start).num_minutes()
    }

    /// Check if this entry overlaps with a time range
    pub fn overlaps(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        self.start < end && self.end > start
    }
}

/// Time held free after a run of placed tasks. Breaks do not use window
/// capacity, but no task may overlap one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledBreak {
    pub window_index: usize,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl ScheduledBreak {
    pub fn overlaps(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        self.start < end && self.end > start
    }
}

/// Ordered sequence of entries (by start time).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Schedule {
    pub entries: Vec<ScheduleEntry>,
    /// Reserved breaks, by start time
    #[serde(default)]
    pub breaks: Vec<ScheduledBreak>,
    /// Window synthesized after the horizon, if overflow was needed
    #[serde(default)]
    pub overflow_window: Option<HorizonWindow>,
}

impl Schedule {
    pub fn entry_for(&self, task_id: &str) -> Option<&ScheduleEntry> {
        self.entries.iter().find(|e| e.task_id == task_id)
    }

    pub fn entries_in_window(&self, window_index: usize) -> impl Iterator<Item = &ScheduleEntry> {
        self.entries
            .iter()
            .filter(move |e| e.window_index == window_index)
    }

    /// Scheduled minutes in a window
    pub fn minutes_in_window(&self, window_index: usize) -> i64 {
        self.entries_in_window(window_index)
            .map(ScheduleEntry::duration_minutes)
            .sum()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Why a task was left out of a schedule. Not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnscheduledReason {
    /// No window had enough remaining capacity for the task's duration
    NoCapacity,
    /// A dependency in the request could not be scheduled
    DependencyUnresolved,
    /// Capacity existed but no free interval fit before the horizon ended
    HorizonExhausted,
}

/// A task that was not placed, with the reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Unscheduled {
    pub task_id: String,
    pub reason: UnscheduledReason,
}

/// Result of a scheduling call: a usable (possibly partial) schedule.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScheduleOutcome {
    pub schedule: Schedule,
    pub unscheduled: Vec<Unscheduled>,
}

impl ScheduleOutcome {
    pub fn is_complete(&self) -> bool {
        self.unscheduled.is_empty()
    }
}

/// Scheduler configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Granularity of candidate start times (minutes)
    #[serde(default = "default_slot_minutes")]
    pub slot_minutes: i64,
}

fn default_slot_minutes() -> i64 {
    15
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            slot_minutes: default_slot_minutes(),
        }
    }
}
