//! Notification candidates and their delivery batches.
//!
//! The rule engine produces [`NotificationCandidate`]s. [`filter`] turns them
//! into [`NotificationBatch`]es: escalations alone and immediately, everything
//! else coalesced per subject category and held back by quiet windows.

mod filter;
mod quiet;

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::rules::{RuleAction, SubjectRef};

pub use filter::filter;
pub use quiet::{QuietPolicy, QuietWindow};

/// Rendered content of a notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationPayload {
    pub title: String,
    pub message: String,
    /// Subject fields the templates were rendered from
    #[serde(default)]
    pub fields: BTreeMap<String, String>,
}

/// One rule firing for one subject.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationCandidate {
    pub id: Uuid,
    pub rule_id: String,
    pub subject: SubjectRef,
    pub action: RuleAction,
    /// Subject category, used as the batching key
    #[serde(default)]
    pub category: Option<String>,
    pub generated_at: DateTime<Utc>,
    pub payload: NotificationPayload,
}

impl NotificationCandidate {
    /// Key of the batch this candidate joins (before time bucketing).
    pub fn batch_key(&self) -> String {
        if self.action.is_escalation() {
            format!("escalate:{}:{}", self.rule_id, self.subject)
        } else {
            format!(
                "{}:{}",
                self.subject.kind,
                self.category.as_deref().unwrap_or("uncategorized")
            )
        }
    }
}

/// Notifications handed to a sink together.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationBatch {
    pub id: Uuid,
    pub key: String,
    pub deliver_at: DateTime<Utc>,
    /// Single escalate candidate, delivered regardless of quiet windows
    pub escalated: bool,
    pub candidates: Vec<NotificationCandidate>,
}

impl NotificationBatch {
    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    /// One-line human summary.
    pub fn summary(&self) -> String {
        match self.candidates.as_slice() {
            [only] => only.payload.title.clone(),
            [first, rest @ ..] => format!("{} (+{} more)", first.payload.title, rest.len()),
            [] => String::new(),
        }
    }
}
