//! Task dependency graph.
//!
//! Builds "A depends on B" edges among the active (pending/scheduled) tasks
//! of a request, rejects cycles, and produces the processing order used by
//! the slot allocator: dependency tier first, then priority descending, due
//! time ascending, duration ascending and identifier.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

use super::Task;
use crate::error::{CoreError, Result, ValidationError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    InProgress,
    Done,
}

/// Validated dependency graph over a borrowed task set.
#[derive(Debug)]
pub struct TaskGraph<'a> {
    tasks: BTreeMap<&'a str, &'a Task>,
    /// Active task -> active dependencies present in the set
    edges: BTreeMap<&'a str, Vec<&'a str>>,
    /// Dependency ids not present in the set at all
    external: BTreeSet<&'a str>,
}

/// Processing order produced by [`TaskGraph::order`].
#[derive(Debug, Clone)]
pub struct TaskOrder<'a> {
    /// Active tasks, dependencies before dependents
    pub tasks: Vec<&'a Task>,
    /// Longest dependency chain below each task (roots are tier 0)
    pub tiers: BTreeMap<&'a str, usize>,
}

impl<'a> TaskGraph<'a> {
    /// Build the graph and verify it is acyclic.
    ///
    /// # Errors
    ///
    /// - `Validation` for duplicate identifiers or an active task with a zero duration
    /// - `CycleDetected` naming every task on the first cycle found
    pub fn build(tasks: &'a [Task]) -> Result<Self> {
        let mut by_id: BTreeMap<&'a str, &'a Task> = BTreeMap::new();
        for task in tasks {
            if by_id.insert(task.id.as_str(), task).is_some() {
                return Err(ValidationError::DuplicateTask(task.id.clone()).into());
            }
            if task.status.is_active() && task.duration_minutes == 0 {
                return Err(ValidationError::ZeroDuration {
                    task_id: task.id.clone(),
                }
                .into());
            }
        }

        let mut edges = BTreeMap::new();
        let mut external = BTreeSet::new();
        for task in by_id.values().copied().filter(|t| t.status.is_active()) {
            let mut deps = Vec::new();
            for dep in &task.dependencies {
                match by_id.get(dep.as_str()).copied() {
                    Some(d) if d.status.is_active() => deps.push(d.id.as_str()),
                    // Completed/cancelled dependencies are satisfied by definition
                    Some(_) => {}
                    None => {
                        tracing::warn!(
                            task = %task.id,
                            dependency = %dep,
                            "dependency not in request; treating as satisfied"
                        );
                        external.insert(dep.as_str());
                    }
                }
            }
            edges.insert(task.id.as_str(), deps);
        }

        let graph = Self {
            tasks: by_id,
            edges,
            external,
        };
        if let Some(cycle) = graph.find_cycle() {
            return Err(CoreError::CycleDetected { task_ids: cycle });
        }
        Ok(graph)
    }

    /// Look up any task in the set by id.
    pub fn task(&self, id: &str) -> Option<&'a Task> {
        self.tasks.get(id).copied()
    }

    /// Active dependencies of an active task that are part of the set.
    pub fn active_dependencies(&self, id: &str) -> &[&'a str] {
        self.edges.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Dependency ids referenced by some task but absent from the set.
    pub fn external_dependencies(&self) -> impl Iterator<Item = &&'a str> {
        self.external.iter()
    }

    /// Number of active tasks.
    pub fn active_len(&self) -> usize {
        self.edges.len()
    }

    /// Three-colour depth-first search. Returns the sorted ids on the first
    /// cycle encountered, visiting roots in identifier order.
    ///
    /// The walk keeps its own stack of (task, next dependency index) frames
    /// so chain depth is bounded by memory, not by the thread stack.
    fn find_cycle(&self) -> Option<Vec<String>> {
        let mut marks: BTreeMap<&str, Mark> =
            self.edges.keys().map(|id| (*id, Mark::Unvisited)).collect();
        let mut stack: Vec<(&'a str, usize)> = Vec::new();

        for root in self.edges.keys().copied() {
            if marks.get(root) != Some(&Mark::Unvisited) {
                continue;
            }
            marks.insert(root, Mark::InProgress);
            stack.push((root, 0));

            while let Some(&(id, next)) = stack.last() {
                let deps = self.active_dependencies(id);
                let Some(&dep) = deps.get(next) else {
                    marks.insert(id, Mark::Done);
                    stack.pop();
                    continue;
                };
                if let Some(frame) = stack.last_mut() {
                    frame.1 += 1;
                }

                match marks.get(dep).copied().unwrap_or(Mark::Done) {
                    Mark::InProgress => {
                        let from = stack.iter().position(|(n, _)| *n == dep).unwrap_or(0);
                        let mut cycle: Vec<String> =
                            stack[from..].iter().map(|(n, _)| n.to_string()).collect();
                        cycle.sort();
                        return Some(cycle);
                    }
                    Mark::Unvisited => {
                        marks.insert(dep, Mark::InProgress);
                        stack.push((dep, 0));
                    }
                    Mark::Done => {}
                }
            }
        }
        None
    }

    /// Topologically valid processing order of the active tasks.
    pub fn order(&self) -> TaskOrder<'a> {
        let tiers = self.tiers();

        let mut tasks: Vec<&'a Task> = self
            .edges
            .keys()
            .filter_map(|id| self.tasks.get(id).copied())
            .collect();
        tasks.sort_by(|a, b| {
            tiers[a.id.as_str()]
                .cmp(&tiers[b.id.as_str()])
                .then_with(|| compare_for_processing(a, b))
        });

        TaskOrder { tasks, tiers }
    }

    /// Longest dependency chain below every active task, computed in
    /// post-order with an explicit stack. Relies on the graph being acyclic.
    fn tiers(&self) -> BTreeMap<&'a str, usize> {
        let mut tiers: BTreeMap<&'a str, usize> = BTreeMap::new();
        let mut stack: Vec<&'a str> = Vec::new();

        for root in self.edges.keys().copied() {
            stack.push(root);
            while let Some(&id) = stack.last() {
                if tiers.contains_key(id) {
                    stack.pop();
                    continue;
                }
                let deps = self.active_dependencies(id);
                match deps.iter().find(|d| !tiers.contains_key(**d)) {
                    Some(&pending) => stack.push(pending),
                    None => {
                        let tier = deps.iter().map(|d| tiers[d] + 1).max().unwrap_or(0);
                        tiers.insert(id, tier);
                        stack.pop();
                    }
                }
            }
        }
        tiers
    }
}

/// Priority descending, then earliest due (undated last), then shortest,
/// then identifier.
pub(crate) fn compare_for_processing(a: &Task, b: &Task) -> Ordering {
    b.priority
        .cmp(&a.priority)
        .then_with(|| match (a.due, b.due) {
            (Some(x), Some(y)) => x.cmp(&y),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        })
        .then_with(|| a.duration_minutes.cmp(&b.duration_minutes))
        .then_with(|| a.id.cmp(&b.id))
}
