//! Rule evaluation engine.
//!
//! Evaluates notification rules against a state snapshot and produces
//! candidates. Cooldowns are claimed only after a rule has been evaluated
//! against every subject, so a rule that fails halfway leaves no trace in the
//! cooldown table.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::cooldown::{CooldownKey, CooldownStore, ShardedCooldownStore};
use super::rule::{render_template, NotificationRule};
use super::subject::Subject;
use crate::error::RuleEvaluationError;
use crate::notify::{NotificationCandidate, NotificationPayload};
use crate::task::StateSnapshot;

/// Result of one evaluation pass.
#[derive(Debug, Clone, Default)]
pub struct Evaluation {
    pub candidates: Vec<NotificationCandidate>,
    /// Rules that were skipped, one entry each
    pub errors: Vec<RuleEvaluationError>,
}

/// Rule engine that owns the cooldown table
#[derive(Debug, Default)]
pub struct RuleEngine<S = ShardedCooldownStore> {
    cooldowns: S,
}

impl RuleEngine<ShardedCooldownStore> {
    /// Create an engine with an empty in-memory cooldown table
    pub fn new() -> Self {
        Self::with_store(ShardedCooldownStore::new())
    }
}

impl<S: CooldownStore> RuleEngine<S> {
    pub fn with_store(cooldowns: S) -> Self {
        Self { cooldowns }
    }

    pub fn cooldowns(&self) -> &S {
        &self.cooldowns
    }

    /// Evaluate `rules` against `snapshot` at `now`.
    ///
    /// Disabled rules are skipped. A rule that references an unknown field
    /// or compares incompatible values is reported in `errors` and produces
    /// no candidates; the other rules are unaffected.
    pub fn evaluate(
        &self,
        rules: &[NotificationRule],
        snapshot: &StateSnapshot,
        now: DateTime<Utc>,
    ) -> Evaluation {
        let mut evaluation = Evaluation::default();

        for rule in rules {
            if !rule.enabled {
                tracing::debug!(rule = %rule.id, "rule disabled, skipping");
                continue;
            }

            let matched = match matching_subjects(rule, snapshot, now) {
                Ok(matched) => matched,
                Err(kind) => {
                    let error = RuleEvaluationError {
                        rule_id: rule.id.clone(),
                        kind,
                    };
                    tracing::warn!(error = %error, "rule evaluation failed, skipping rule");
                    evaluation.errors.push(error);
                    continue;
                }
            };

            for subject in matched {
                let key = CooldownKey::new(&snapshot.workspace, &rule.id, subject.reference());
                if !self.cooldowns.try_fire(&key, now, rule.cooldown()) {
                    tracing::debug!(rule = %rule.id, subject = %key.subject, "rule cooling down");
                    continue;
                }
                evaluation.candidates.push(build_candidate(rule, &subject, now));
            }
        }

        tracing::info!(
            workspace = %snapshot.workspace,
            rules = rules.len(),
            fired = evaluation.candidates.len(),
            errors = evaluation.errors.len(),
            "evaluated notification rules"
        );
        evaluation
    }
}

fn matching_subjects<'a>(
    rule: &NotificationRule,
    snapshot: &'a StateSnapshot,
    now: DateTime<Utc>,
) -> Result<Vec<Subject<'a>>, crate::error::RuleErrorKind> {
    rule.when.check(rule.subject)?;
    let mut matched = Vec::new();
    for subject in Subject::all_of(rule.subject, snapshot) {
        if rule.when.evaluate(&subject, now)? {
            matched.push(subject);
        }
    }
    Ok(matched)
}

fn build_candidate(
    rule: &NotificationRule,
    subject: &Subject<'_>,
    now: DateTime<Utc>,
) -> NotificationCandidate {
    let fields = subject.fields();
    let title = if rule.title.is_empty() {
        rule.name.clone()
    } else {
        render_template(&rule.title, &fields)
    };
    NotificationCandidate {
        id: Uuid::new_v4(),
        rule_id: rule.id.clone(),
        subject: subject.reference(),
        action: rule.action,
        category: subject.category().map(str::to_string),
        generated_at: now,
        payload: NotificationPayload {
            title,
            message: render_template(&rule.message, &fields),
            fields,
        },
    }
}
