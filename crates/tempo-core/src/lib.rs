//! # Tempo Core Library
//!
//! Smart scheduling and notification-rule engine. Pure computation over
//! caller-supplied state: nothing here owns or mutates task storage, and the
//! only long-lived mutable state is the rule cooldown table.
//!
//! ## Architecture
//!
//! - **Task graph**: validates dependencies among tasks and orders them
//! - **Energy model**: per-hour capacity curve from a chronotype preset or custom map
//! - **Slot allocator**: greedy placement of tasks on a horizon of capacity-bounded windows
//! - **Rule engine**: declarative notification rules with per-subject cooldowns
//! - **Notification filter**: batching and quiet-hour handling
//!
//! ## Key Components
//!
//! - [`SmartEngine`]: facade over the public operations
//! - [`SlotAllocator`]: scheduling
//! - [`RuleEngine`]: rule evaluation
//! - [`notify::filter`]: batching and quiet windows
//! - [`Config`]: TOML configuration
//! - [`TaskRepository`] / [`NotificationSink`]: collaborator interfaces

pub mod energy;
pub mod engine;
pub mod error;
pub mod notify;
pub mod ports;
pub mod rules;
pub mod scheduler;
pub mod storage;
pub mod task;

pub use energy::{EnergyCurve, EnergyProfile, FocusLevel};
pub use engine::{FailedDelivery, PassReport, SmartEngine};
pub use error::{
    ConfigError, CoreError, DeliveryError, RepositoryError, Result, RuleErrorKind,
    RuleEvaluationError, ValidationError,
};
pub use notify::{NotificationBatch, NotificationCandidate, NotificationPayload, QuietPolicy, QuietWindow};
pub use ports::{InMemoryRepository, JsonFileRepository, MemorySink, NotificationSink, TaskRepository};
pub use rules::{
    default_rules, CompareOp, CooldownStore, Evaluation, Literal, NotificationRule, Predicate,
    RelativeOp, RuleAction, RuleEngine, RuleStore, ShardedCooldownStore, SubjectKind, SubjectRef,
};
pub use scheduler::{
    HorizonWindow, Schedule, ScheduleEntry, ScheduleOutcome, SchedulePreferences, ScheduleRequest,
    ScheduledBreak, SchedulerConfig, SlotAllocator, Unscheduled, UnscheduledReason,
};
pub use storage::{data_dir, Config};
pub use task::{Goal, Habit, Priority, StateSnapshot, Task, TaskGraph, TaskStatus};
