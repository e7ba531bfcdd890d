//! Rule storage and persistence.
//!
//! Rules live in `rules.toml` in the data directory.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use indoc::indoc;
use serde::{Deserialize, Serialize};

use super::defaults::default_rules;
use super::NotificationRule;
use crate::error::{ConfigError, Result, ValidationError};
use crate::storage::data_dir;

const FILE_HEADER: &str = indoc! {"
    # Notification rules.
    #
    # Each [[rules]] entry names the subject kind it watches (task, habit, goal),
    # the action to take (remind, celebrate, escalate) and a `when` predicate.
    # Titles and messages may use {field} placeholders from the subject.

"};

/// Storage for notification rules
#[derive(Debug, Clone)]
pub struct RuleStore {
    path: PathBuf,
}

/// Wrapper for serializing rules to TOML
#[derive(Serialize, Deserialize)]
struct RulesFile {
    #[serde(default)]
    rules: Vec<NotificationRule>,
}

impl RuleStore {
    /// Open the store in the data directory, writing the built-in rules
    /// first if `seed_defaults` is set and no file exists yet.
    pub fn open(seed_defaults: bool) -> Result<Self> {
        let store = Self::with_path(data_dir()?.join("rules.toml"));
        if seed_defaults {
            store.seed_if_missing()?;
        }
        Ok(store)
    }

    /// Create a rule store with a custom path
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Write the built-in rules if the file does not exist. Returns whether
    /// anything was written.
    pub fn seed_if_missing(&self) -> Result<bool> {
        if self.path.exists() {
            return Ok(false);
        }
        self.save_all(&default_rules())?;
        tracing::info!(path = %self.path.display(), "seeded default notification rules");
        Ok(true)
    }

    /// Load all rules. A missing file holds no rules.
    pub fn load_all(&self) -> Result<Vec<NotificationRule>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let content = std::fs::read_to_string(&self.path)?;
        let file: RulesFile = toml::from_str(&content).map_err(|e| ConfigError::LoadFailed {
            path: self.path.clone(),
            message: e.to_string(),
        })?;
        validate_ids(&file.rules)?;
        Ok(file.rules)
    }

    /// Load only enabled rules
    pub fn load_enabled(&self) -> Result<Vec<NotificationRule>> {
        let all = self.load_all()?;
        Ok(all.into_iter().filter(|r| r.enabled).collect())
    }

    /// Replace the stored rules.
    pub fn save_all(&self, rules: &[NotificationRule]) -> Result<()> {
        validate_ids(rules)?;
        let file = RulesFile {
            rules: rules.to_vec(),
        };
        let save_failed = |message: String| ConfigError::SaveFailed {
            path: self.path.clone(),
            message,
        };
        let content = toml::to_string_pretty(&file).map_err(|e| save_failed(e.to_string()))?;
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, format!("{FILE_HEADER}{content}"))?;
        Ok(())
    }

    /// Enable or disable one rule. Returns `false` if no rule has that id.
    pub fn set_enabled(&self, rule_id: &str, enabled: bool) -> Result<bool> {
        let mut rules = self.load_all()?;
        let Some(rule) = rules.iter_mut().find(|r| r.id == rule_id) else {
            return Ok(false);
        };
        rule.enabled = enabled;
        self.save_all(&rules)?;
        Ok(true)
    }

    /// Get the rules file path
    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn validate_ids(rules: &[NotificationRule]) -> Result<()> {
    let mut seen = BTreeSet::new();
    for rule in rules {
        if !seen.insert(rule.id.as_str()) {
            return Err(ValidationError::InvalidValue {
                field: "rules".to_string(),
                message: format!("duplicate rule id '{}'", rule.id),
            }
            .into());
        }
    }
    Ok(())
}
