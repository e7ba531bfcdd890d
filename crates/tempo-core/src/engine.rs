//! Engine facade.
//!
//! Wires the slot allocator, rule engine and notification filter into the
//! public operations. The facade holds configuration and the cooldown table,
//! nothing else; task state always comes from the caller or a
//! [`TaskRepository`].

use chrono::{DateTime, Duration, Utc};

use crate::error::{Result, RuleEvaluationError};
use crate::notify::{self, NotificationBatch, NotificationCandidate, QuietWindow};
use crate::ports::{NotificationSink, TaskRepository};
use crate::rules::{CooldownStore, Evaluation, NotificationRule, RuleEngine, ShardedCooldownStore};
use crate::scheduler::{ScheduleOutcome, ScheduleRequest, SchedulerConfig, SlotAllocator};
use crate::storage::Config;

/// A batch the sink refused.
#[derive(Debug, Clone)]
pub struct FailedDelivery {
    pub batch: NotificationBatch,
    pub error: String,
}

/// Outcome of [`SmartEngine::run_notification_pass`].
#[derive(Debug, Clone, Default)]
pub struct PassReport {
    pub workspace: String,
    /// Candidates produced by the rule engine, before filtering
    pub candidates: usize,
    pub rule_errors: Vec<RuleEvaluationError>,
    pub delivered: Vec<NotificationBatch>,
    pub failed: Vec<FailedDelivery>,
}

/// Scheduling and notification engine
#[derive(Debug)]
pub struct SmartEngine<S = ShardedCooldownStore> {
    allocator: SlotAllocator,
    rules: RuleEngine<S>,
    quiet_windows: Vec<QuietWindow>,
    batch_window: Duration,
}

impl SmartEngine<ShardedCooldownStore> {
    /// Create an engine with default settings and an empty cooldown table
    pub fn new() -> Self {
        Self::from_config(&Config::default())
    }

    /// Create an engine from loaded configuration
    pub fn from_config(config: &Config) -> Self {
        Self::with_cooldown_store(config, ShardedCooldownStore::new())
    }
}

impl Default for SmartEngine<ShardedCooldownStore> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: CooldownStore> SmartEngine<S> {
    /// Create an engine around an existing cooldown store.
    pub fn with_cooldown_store(config: &Config, cooldowns: S) -> Self {
        Self {
            allocator: SlotAllocator::with_config(config.scheduler_config()),
            rules: RuleEngine::with_store(cooldowns),
            quiet_windows: config.notifications.quiet_windows.clone(),
            batch_window: config.batch_window(),
        }
    }

    pub fn scheduler_config(&self) -> &SchedulerConfig {
        self.allocator.config()
    }

    pub fn quiet_windows(&self) -> &[QuietWindow] {
        &self.quiet_windows
    }

    pub fn batch_window(&self) -> Duration {
        self.batch_window
    }

    pub fn rule_engine(&self) -> &RuleEngine<S> {
        &self.rules
    }

    /// Place the request's tasks on its horizon.
    ///
    /// # Errors
    ///
    /// Fails on dependency cycles, invalid energy curves and malformed
    /// input. Tasks that merely do not fit are reported in the outcome.
    pub fn build_schedule(&self, request: &ScheduleRequest) -> Result<ScheduleOutcome> {
        self.allocator.allocate(request)
    }

    /// Evaluate rules against a snapshot, claiming cooldowns for firings.
    pub fn evaluate_rules(
        &self,
        rules: &[NotificationRule],
        snapshot: &crate::task::StateSnapshot,
        now: DateTime<Utc>,
    ) -> Evaluation {
        self.rules.evaluate(rules, snapshot, now)
    }

    /// Batch candidates and apply quiet windows.
    pub fn filter_notifications(
        &self,
        candidates: &[NotificationCandidate],
        quiet_windows: &[QuietWindow],
        now: DateTime<Utc>,
        batch_window: Duration,
    ) -> Vec<NotificationBatch> {
        notify::filter(candidates, quiet_windows, now, batch_window)
    }

    /// Fetch, evaluate, filter with the configured windows and deliver.
    ///
    /// Delivery failures are reported per batch and never retried here.
    ///
    /// # Errors
    ///
    /// Fails only if the snapshot cannot be fetched.
    pub fn run_notification_pass(
        &self,
        repository: &dyn TaskRepository,
        sink: &dyn NotificationSink,
        workspace: &str,
        rules: &[NotificationRule],
        now: DateTime<Utc>,
    ) -> Result<PassReport> {
        let snapshot = repository.fetch_snapshot(workspace)?;
        let evaluation = self.evaluate_rules(rules, &snapshot, now);
        let batches = self.filter_notifications(
            &evaluation.candidates,
            &self.quiet_windows,
            now,
            self.batch_window,
        );

        let mut report = PassReport {
            workspace: workspace.to_string(),
            candidates: evaluation.candidates.len(),
            rule_errors: evaluation.errors,
            ..PassReport::default()
        };
        for batch in batches {
            match sink.deliver(&batch) {
                Ok(()) => report.delivered.push(batch),
                Err(e) => {
                    tracing::warn!(workspace, batch = %batch.key, error = %e, "batch delivery failed");
                    report.failed.push(FailedDelivery {
                        batch,
                        error: e.to_string(),
                    });
                }
            }
        }

        tracing::info!(
            workspace,
            delivered = report.delivered.len(),
            failed = report.failed.len(),
            "notification pass finished"
        );
        Ok(report)
    }
}
