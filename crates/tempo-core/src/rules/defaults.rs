//! Built-in notification rules seeded into a fresh rule store.

use super::predicate::{CompareOp, Predicate, RelativeOp};
use super::rule::{NotificationRule, RuleAction};
use super::subject::SubjectKind;

const DAY_MINUTES: u32 = 24 * 60;

fn open_task() -> Predicate {
    Predicate::compare("status", CompareOp::In, vec!["pending", "scheduled"])
}

/// The default rule set.
pub fn default_rules() -> Vec<NotificationRule> {
    vec![
        NotificationRule::new(
            "task-due-soon",
            SubjectKind::Task,
            RuleAction::Remind,
            Predicate::all([
                open_task(),
                Predicate::relative("due", RelativeOp::WithinNext, 24.0),
                Predicate::compare("priority", CompareOp::Lt, "high"),
            ]),
        )
        .with_name("Task due soon")
        .with_cooldown_minutes(12 * 60)
        .with_templates("{title} is due soon", "Due at {due}"),
        NotificationRule::new(
            "task-overdue",
            SubjectKind::Task,
            RuleAction::Escalate,
            Predicate::all([
                open_task(),
                Predicate::relative("due", RelativeOp::OlderThan, 0.0),
            ]),
        )
        .with_name("Task overdue")
        .with_cooldown_minutes(DAY_MINUTES)
        .with_templates("{title} is overdue", "It was due at {due}"),
        NotificationRule::new(
            "high-priority-due-soon",
            SubjectKind::Task,
            RuleAction::Escalate,
            Predicate::all([
                open_task(),
                Predicate::relative("due", RelativeOp::WithinNext, 24.0),
                Predicate::compare("priority", CompareOp::Ge, "high"),
            ]),
        )
        .with_name("High-priority task due soon")
        .with_cooldown_minutes(6 * 60)
        .with_templates("{title} ({priority}) is due soon", "Due at {due}"),
        NotificationRule::new(
            "habit-not-done-today",
            SubjectKind::Habit,
            RuleAction::Remind,
            Predicate::compare("completed_today", CompareOp::Eq, false),
        )
        .with_name("Habit not done today")
        .with_cooldown_minutes(DAY_MINUTES)
        .with_templates("Time for {name}", "Current streak: {streak_days} days"),
        NotificationRule::new(
            "habit-streak",
            SubjectKind::Habit,
            RuleAction::Celebrate,
            Predicate::compare("streak_days", CompareOp::Ge, 7u32),
        )
        .with_name("Habit streak milestone")
        .with_cooldown_minutes(7 * DAY_MINUTES)
        .with_templates("{name}: {streak_days} day streak", "Keep it going"),
        NotificationRule::new(
            "goal-reached",
            SubjectKind::Goal,
            RuleAction::Celebrate,
            Predicate::compare("progress", CompareOp::Ge, 1.0),
        )
        .with_name("Goal reached")
        .with_cooldown_minutes(365 * DAY_MINUTES)
        .with_templates("Goal reached: {title}", "{progress_percent}% complete"),
    ]
}
