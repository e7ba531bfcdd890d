//! Notification rule definition.

use std::collections::BTreeMap;
use std::fmt;

use chrono::Duration;
use serde::{Deserialize, Serialize};

use super::predicate::Predicate;
use super::subject::SubjectKind;

/// What a fired rule asks the user to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleAction {
    Remind,
    Celebrate,
    /// Never batched and never held back by quiet windows
    Escalate,
}

impl RuleAction {
    pub fn is_escalation(self) -> bool {
        self == RuleAction::Escalate
    }
}

impl fmt::Display for RuleAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuleAction::Remind => write!(f, "remind"),
            RuleAction::Celebrate => write!(f, "celebrate"),
            RuleAction::Escalate => write!(f, "escalate"),
        }
    }
}

/// A declarative notification rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationRule {
    /// Unique identifier, also the cooldown key
    pub id: String,

    /// Human-readable name
    #[serde(default)]
    pub name: String,

    /// Whether this rule is evaluated at all
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Which records the predicate runs against
    pub subject: SubjectKind,

    pub action: RuleAction,

    /// Minimum minutes before the rule refires for the same subject
    #[serde(default)]
    pub cooldown_minutes: u32,

    /// Title template; `{field}` placeholders are filled from the subject
    #[serde(default)]
    pub title: String,

    /// Message template
    #[serde(default)]
    pub message: String,

    /// Trigger condition
    pub when: Predicate,
}

fn default_enabled() -> bool {
    true
}

impl NotificationRule {
    /// Create an enabled rule with no cooldown and empty templates.
    pub fn new(
        id: impl Into<String>,
        subject: SubjectKind,
        action: RuleAction,
        when: Predicate,
    ) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            enabled: true,
            subject,
            action,
            cooldown_minutes: 0,
            title: String::new(),
            message: String::new(),
            when,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_cooldown_minutes(mut self, minutes: u32) -> Self {
        self.cooldown_minutes = minutes;
        self
    }

    pub fn with_templates(mut self, title: impl Into<String>, message: impl Into<String>) -> Self {
        self.title = title.into();
        self.message = message.into();
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    pub fn cooldown(&self) -> Duration {
        Duration::minutes(i64::from(self.cooldown_minutes))
    }
}

/// Replace `{name}` placeholders with values from `fields`.
///
/// Unknown placeholders and unbalanced braces are copied through unchanged.
pub fn render_template(template: &str, fields: &BTreeMap<String, String>) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        match after.find('}') {
            Some(close) => {
                let name = &after[..close];
                match fields.get(name) {
                    Some(value) => out.push_str(value),
                    None => {
                        out.push('{');
                        out.push_str(name);
                        out.push('}');
                    }
                }
                rest = &after[close + 1..];
            }
            None => {
                out.push_str(&rest[open..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}
