//! Collaborator interfaces the engine consumes.
//!
//! The engine never reads or writes task state itself. Callers hand it a
//! [`TaskRepository`] to fetch snapshots from and a [`NotificationSink`] to
//! deliver batches to.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, RwLock};

use crate::error::{DeliveryError, RepositoryError};
use crate::notify::NotificationBatch;
use crate::task::StateSnapshot;

/// Read-only access to task, habit and goal state.
pub trait TaskRepository: Send + Sync {
    /// Fetch everything the engine looks at for one workspace.
    fn fetch_snapshot(&self, workspace: &str) -> Result<StateSnapshot, RepositoryError>;
}

/// Accepts notification batches for delivery.
pub trait NotificationSink: Send + Sync {
    fn deliver(&self, batch: &NotificationBatch) -> Result<(), DeliveryError>;
}

/// Snapshots held in memory, keyed by workspace.
#[derive(Debug, Default)]
pub struct InMemoryRepository {
    snapshots: RwLock<HashMap<String, StateSnapshot>>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a snapshot under its own workspace name, replacing any previous one.
    pub fn insert(&self, snapshot: StateSnapshot) {
        let mut snapshots = self.snapshots.write().unwrap_or_else(|e| e.into_inner());
        snapshots.insert(snapshot.workspace.clone(), snapshot);
    }
}

impl TaskRepository for InMemoryRepository {
    fn fetch_snapshot(&self, workspace: &str) -> Result<StateSnapshot, RepositoryError> {
        let snapshots = self.snapshots.read().unwrap_or_else(|e| e.into_inner());
        snapshots
            .get(workspace)
            .cloned()
            .ok_or_else(|| RepositoryError::WorkspaceNotFound(workspace.to_string()))
    }
}

/// Snapshots stored as `<dir>/<workspace>.json`.
#[derive(Debug, Clone)]
pub struct JsonFileRepository {
    dir: PathBuf,
}

impl JsonFileRepository {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn file_for(&self, workspace: &str) -> Result<PathBuf, RepositoryError> {
        let valid = !workspace.is_empty()
            && workspace
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
            && !workspace.starts_with('.');
        if !valid {
            return Err(RepositoryError::Unavailable(format!(
                "invalid workspace name '{workspace}'"
            )));
        }
        Ok(self.dir.join(format!("{workspace}.json")))
    }
}

impl TaskRepository for JsonFileRepository {
    fn fetch_snapshot(&self, workspace: &str) -> Result<StateSnapshot, RepositoryError> {
        let path = self.file_for(workspace)?;
        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(RepositoryError::WorkspaceNotFound(workspace.to_string()))
            }
            Err(e) => {
                return Err(RepositoryError::Unavailable(format!(
                    "{}: {e}",
                    path.display()
                )))
            }
        };
        let mut snapshot: StateSnapshot = serde_json::from_str(&content)
            .map_err(|e| RepositoryError::Unavailable(format!("{}: {e}", path.display())))?;
        if snapshot.workspace.is_empty() {
            snapshot.workspace = workspace.to_string();
        }
        Ok(snapshot)
    }
}

/// Sink that keeps delivered batches in memory.
///
/// With a limit, batches past the limit are rejected as unavailable.
#[derive(Debug, Default)]
pub struct MemorySink {
    delivered: Mutex<Vec<NotificationBatch>>,
    limit: Option<usize>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept at most `limit` batches in total.
    pub fn with_limit(limit: usize) -> Self {
        Self {
            delivered: Mutex::new(Vec::new()),
            limit: Some(limit),
        }
    }

    /// Batches accepted so far, in delivery order.
    pub fn delivered(&self) -> Vec<NotificationBatch> {
        self.delivered
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

impl NotificationSink for MemorySink {
    fn deliver(&self, batch: &NotificationBatch) -> Result<(), DeliveryError> {
        let mut delivered = self.delivered.lock().unwrap_or_else(|e| e.into_inner());
        if self.limit.is_some_and(|limit| delivered.len() >= limit) {
            return Err(DeliveryError::Unavailable("sink is full".to_string()));
        }
        delivered.push(batch.clone());
        Ok(())
    }
}
