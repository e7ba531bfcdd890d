//! Per-subject cooldown bookkeeping.
//!
//! The cooldown table is the only shared mutable state of the engine. It is
//! keyed by (workspace, rule, subject) and split across independently locked
//! shards, so evaluations for different workspaces rarely contend and two
//! evaluations of the same subject serialize on one lock.
//!
//! A process that runs one pass and exits can carry the table across runs
//! with [`ShardedCooldownStore::load`] and [`ShardedCooldownStore::save`].

use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::subject::SubjectRef;
use crate::error::Result;

/// Identifies one (workspace, rule, subject) cooldown slot.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CooldownKey {
    pub workspace: String,
    pub rule_id: String,
    pub subject: SubjectRef,
}

impl CooldownKey {
    pub fn new(workspace: impl Into<String>, rule_id: impl Into<String>, subject: SubjectRef) -> Self {
        Self {
            workspace: workspace.into(),
            rule_id: rule_id.into(),
            subject,
        }
    }
}

/// Storage for last-fired timestamps, injected into the rule engine.
pub trait CooldownStore: Send + Sync {
    /// When the slot last fired, if ever.
    fn last_fired(&self, key: &CooldownKey) -> Option<DateTime<Utc>>;

    /// Record a firing at `now` if the slot never fired or its last firing is
    /// at least `cooldown` old. Returns whether the firing was recorded.
    ///
    /// Check and record happen under one lock: of two concurrent callers for
    /// the same key, at most one sees `true` within a cooldown.
    fn try_fire(&self, key: &CooldownKey, now: DateTime<Utc>, cooldown: Duration) -> bool;

    /// Forget every recorded firing.
    fn clear(&self);
}

const DEFAULT_SHARDS: usize = 16;

/// One persisted slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CooldownRecord {
    #[serde(flatten)]
    pub key: CooldownKey,
    pub last_fired: DateTime<Utc>,
}

/// Mutex-per-shard hash map.
#[derive(Debug)]
pub struct ShardedCooldownStore {
    shards: Vec<Mutex<HashMap<CooldownKey, DateTime<Utc>>>>,
}

impl ShardedCooldownStore {
    pub fn new() -> Self {
        Self::with_shards(DEFAULT_SHARDS)
    }

    /// Create a store with `count` shards (at least one).
    pub fn with_shards(count: usize) -> Self {
        let shards = (0..count.max(1)).map(|_| Mutex::new(HashMap::new())).collect();
        Self { shards }
    }

    /// Total number of recorded slots.
    pub fn len(&self) -> usize {
        self.shards
            .iter()
            .map(|s| s.lock().unwrap_or_else(|e| e.into_inner()).len())
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every recorded slot, ordered by key.
    pub fn records(&self) -> Vec<CooldownRecord> {
        let mut records: Vec<CooldownRecord> = self
            .shards
            .iter()
            .flat_map(|s| {
                let shard = s.lock().unwrap_or_else(|e| e.into_inner());
                shard
                    .iter()
                    .map(|(key, last_fired)| CooldownRecord {
                        key: key.clone(),
                        last_fired: *last_fired,
                    })
                    .collect::<Vec<_>>()
            })
            .collect();
        records.sort_by(|a, b| a.key.cmp(&b.key));
        records
    }

    /// Build a store holding `records`. A later record for the same key wins.
    pub fn from_records(records: impl IntoIterator<Item = CooldownRecord>) -> Self {
        let store = Self::new();
        for record in records {
            store
                .shard(&record.key)
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .insert(record.key, record.last_fired);
        }
        store
    }

    /// Read a table written by [`save`](Self::save). A missing file is an
    /// empty table.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::new());
        }
        let content = std::fs::read_to_string(path)?;
        let records: Vec<CooldownRecord> = serde_json::from_str(&content)?;
        tracing::debug!(path = %path.display(), slots = records.len(), "loaded cooldown table");
        Ok(Self::from_records(records))
    }

    /// Write every slot to `path` as a JSON array.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(&self.records())?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        Ok(())
    }

    fn shard(&self, key: &CooldownKey) -> &Mutex<HashMap<CooldownKey, DateTime<Utc>>> {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        let index = (hasher.finish() % self.shards.len() as u64) as usize;
        &self.shards[index]
    }
}

impl Default for ShardedCooldownStore {
    fn default() -> Self {
        Self::new()
    }
}

impl CooldownStore for ShardedCooldownStore {
    fn last_fired(&self, key: &CooldownKey) -> Option<DateTime<Utc>> {
        // A poisoned shard still holds consistent timestamps
        let shard = self.shard(key).lock().unwrap_or_else(|e| e.into_inner());
        shard.get(key).copied()
    }

    fn try_fire(&self, key: &CooldownKey, now: DateTime<Utc>, cooldown: Duration) -> bool {
        let mut shard = self.shard(key).lock().unwrap_or_else(|e| e.into_inner());
        if let Some(last) = shard.get(key) {
            if now - *last < cooldown {
                return false;
            }
        }
        shard.insert(key.clone(), now);
        true
    }

    fn clear(&self) {
        for shard in &self.shards {
            shard.lock().unwrap_or_else(|e| e.into_inner()).clear();
        }
    }
}
