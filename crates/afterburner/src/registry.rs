/*
 *  Copyright 2025-2026 Colliery Software
 *
 *  Licensed under the Apache License, Version 2.0 (the "License");
 *  you may not use this file except in compliance with the License.
 *  You may obtain a copy of the License at
 *
 *      http://www.apache.org/licenses/LICENSE-2.0
 *
 *  Unless required by applicable law or agreed to in writing, software
 *  distributed under the License is distributed on an "AS IS" BASIS,
 *  WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 *  See the License for the specific language governing permissions and
 *  limitations under the License.
 */

//! In-memory table of submitted tasks.
//!
//! The registry owns all task records. It assigns identifiers, enforces the
//! strict lifecycle on state transitions, answers status queries, and
//! optionally deduplicates submissions whose scope is already in flight.
//!
//! `status` reads and `transition` writes are safe to call concurrently;
//! once a transition completes, no subsequent `status` call observes the
//! previous state.

use std::collections::HashMap;
use std::time::Duration;

use chrono::Utc;
use parking_lot::RwLock;
use tracing::{debug, info};

use crate::error::RegistryError;
use crate::scope::InvalidationScope;
use crate::task::{CacheOp, Task, TaskId, TaskState};

/// Result of a task submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Submission {
    /// A new task was created.
    Created(TaskId),
    /// An identical scope was already in flight; the existing task is
    /// returned instead of creating redundant work.
    Existing(TaskId),
}

impl Submission {
    pub fn task_id(&self) -> &TaskId {
        match self {
            Submission::Created(id) | Submission::Existing(id) => id,
        }
    }

    /// Whether this submission created a new task that still needs an
    /// executor attached.
    pub fn is_new(&self) -> bool {
        matches!(self, Submission::Created(_))
    }
}

/// Table of submitted tasks with lifecycle enforcement.
pub struct TaskRegistry {
    tasks: RwLock<HashMap<TaskId, Task>>,
    dedup_in_flight: bool,
    retention: Duration,
}

impl TaskRegistry {
    /// Creates a registry.
    ///
    /// `dedup_in_flight` enables the optional policy of returning an
    /// existing task id when an identical scope is resubmitted while still
    /// Submitted or Running. `retention` bounds how long terminal tasks
    /// remain queryable; it must be long enough for one full client poll
    /// cycle.
    pub fn new(dedup_in_flight: bool, retention: Duration) -> Self {
        Self {
            tasks: RwLock::new(HashMap::new()),
            dedup_in_flight,
            retention,
        }
    }

    /// Creates a task in `Submitted` state and returns immediately.
    ///
    /// The actual cache work is handed to the executor by the caller when
    /// the submission [`is_new`](Submission::is_new).
    pub fn submit(&self, op: CacheOp, scope: InvalidationScope) -> Submission {
        self.prune_finished();

        let mut tasks = self.tasks.write();
        if self.dedup_in_flight {
            // Does not precisely prevent duplicate work, but prevents
            // hundreds of simultaneous tasks under rapid repeated clicks.
            if let Some(existing) = tasks
                .values()
                .find(|t| t.op == op && t.scope == scope && !t.state.is_terminal())
            {
                debug!("Same task is already in flight: {}", existing.name);
                return Submission::Existing(existing.id.clone());
            }
        }

        let task = Task::new(op, scope);
        let id = task.id.clone();
        info!("Task submitted: {} ({})", task.name, id);
        tasks.insert(id.clone(), task);
        Submission::Created(id)
    }

    /// Applies a state transition. Called only by the executor.
    ///
    /// Fails with [`RegistryError::InvalidTransition`] if the task is
    /// already terminal or the transition skips a lifecycle step, and with
    /// [`RegistryError::NotFound`] for unknown ids.
    pub fn transition(
        &self,
        task_id: &TaskId,
        new_state: TaskState,
        error: Option<String>,
    ) -> Result<(), RegistryError> {
        let mut tasks = self.tasks.write();
        let task = tasks.get_mut(task_id).ok_or_else(|| RegistryError::NotFound {
            task_id: task_id.clone(),
        })?;

        if !task.state.may_transition_to(new_state) {
            return Err(RegistryError::InvalidTransition {
                task_id: task_id.clone(),
                from: task.state,
                to: new_state,
            });
        }

        debug!(
            "Task state change: {} -> {} (task: {})",
            task.state, new_state, task.name
        );
        task.state = new_state;
        if new_state.is_terminal() {
            task.finished_at = Some(Utc::now());
            task.error = error;
        }
        Ok(())
    }

    /// Returns a snapshot of the task record.
    ///
    /// A task that never reached a terminal state and is older than the
    /// retention window is reported as unknown; after a process restart its
    /// outcome can no longer be resolved.
    pub fn status(&self, task_id: &TaskId) -> Result<Task, RegistryError> {
        let tasks = self.tasks.read();
        let task = tasks.get(task_id).ok_or_else(|| RegistryError::NotFound {
            task_id: task_id.clone(),
        })?;

        if !task.state.is_terminal() && self.is_stale(task) {
            return Err(RegistryError::NotFound {
                task_id: task_id.clone(),
            });
        }
        Ok(task.clone())
    }

    /// Reclaims terminal tasks older than the retention window.
    ///
    /// Runs opportunistically on every submission; also callable directly.
    pub fn prune_finished(&self) -> usize {
        let now = Utc::now();
        let mut tasks = self.tasks.write();
        let before = tasks.len();
        tasks.retain(|_, task| match (task.state.is_terminal(), task.finished_at) {
            (true, Some(finished_at)) => {
                let age = (now - finished_at).to_std().unwrap_or(Duration::ZERO);
                age <= self.retention
            }
            _ => true,
        });
        let removed = before - tasks.len();
        if removed > 0 {
            debug!("Reclaimed {} finished tasks", removed);
        }
        removed
    }

    /// Number of retained task records.
    pub fn len(&self) -> usize {
        self.tasks.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.read().is_empty()
    }

    fn is_stale(&self, task: &Task) -> bool {
        let age = (Utc::now() - task.submitted_at)
            .to_std()
            .unwrap_or(Duration::ZERO);
        age > self.retention
    }

    #[cfg(test)]
    pub(crate) fn backdate(&self, task_id: &TaskId, by: Duration) {
        let mut tasks = self.tasks.write();
        if let Some(task) = tasks.get_mut(task_id) {
            let by = chrono::Duration::from_std(by).unwrap();
            task.submitted_at = task.submitted_at - by;
            if let Some(finished_at) = task.finished_at {
                task.finished_at = Some(finished_at - by);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> TaskRegistry {
        TaskRegistry::new(true, Duration::from_secs(300))
    }

    fn project_scope(name: &str) -> InvalidationScope {
        InvalidationScope::Project {
            project: name.to_string(),
        }
    }

    #[test]
    fn submit_creates_task_in_submitted_state() {
        let registry = registry();
        let submission = registry.submit(CacheOp::Invalidate, project_scope("p1"));
        assert!(submission.is_new());

        let task = registry.status(submission.task_id()).unwrap();
        assert_eq!(task.state, TaskState::Submitted);
        assert_eq!(task.scope, project_scope("p1"));
    }

    #[test]
    fn status_of_unknown_task_is_not_found() {
        let registry = registry();
        let err = registry.status(&TaskId::from("nope")).unwrap_err();
        assert!(matches!(err, RegistryError::NotFound { .. }));
    }

    #[test]
    fn status_is_idempotent_between_transitions() {
        let registry = registry();
        let id = registry
            .submit(CacheOp::Invalidate, project_scope("p1"))
            .task_id()
            .clone();

        let first = registry.status(&id).unwrap();
        let second = registry.status(&id).unwrap();
        assert_eq!(first.state, second.state);
        assert_eq!(first.submitted_at, second.submitted_at);
    }

    #[test]
    fn transitions_are_monotonic() {
        let registry = registry();
        let id = registry
            .submit(CacheOp::Invalidate, project_scope("p1"))
            .task_id()
            .clone();

        registry.transition(&id, TaskState::Running, None).unwrap();
        registry.transition(&id, TaskState::Finished, None).unwrap();

        // No transition out of a terminal state.
        let err = registry
            .transition(&id, TaskState::Running, None)
            .unwrap_err();
        assert!(matches!(err, RegistryError::InvalidTransition { .. }));
        let err = registry
            .transition(&id, TaskState::Failed, None)
            .unwrap_err();
        assert!(matches!(err, RegistryError::InvalidTransition { .. }));
    }

    #[test]
    fn submitted_cannot_jump_to_terminal() {
        let registry = registry();
        let id = registry
            .submit(CacheOp::Invalidate, project_scope("p1"))
            .task_id()
            .clone();
        let err = registry
            .transition(&id, TaskState::Finished, None)
            .unwrap_err();
        assert!(matches!(err, RegistryError::InvalidTransition { .. }));
    }

    #[test]
    fn transition_of_unknown_task_fails() {
        let registry = registry();
        let err = registry
            .transition(&TaskId::from("nope"), TaskState::Running, None)
            .unwrap_err();
        assert!(matches!(err, RegistryError::NotFound { .. }));
    }

    #[test]
    fn failed_task_records_error() {
        let registry = registry();
        let id = registry
            .submit(CacheOp::Invalidate, project_scope("p1"))
            .task_id()
            .clone();
        registry.transition(&id, TaskState::Running, None).unwrap();
        registry
            .transition(&id, TaskState::Failed, Some("engine timeout".to_string()))
            .unwrap();

        let task = registry.status(&id).unwrap();
        assert_eq!(task.state, TaskState::Failed);
        assert_eq!(task.error.as_deref(), Some("engine timeout"));
        assert!(task.finished_at.is_some());
    }

    #[test]
    fn in_flight_resubmission_deduplicates() {
        let registry = registry();
        let first = registry.submit(CacheOp::Invalidate, project_scope("p1"));
        let second = registry.submit(CacheOp::Invalidate, project_scope("p1"));

        assert!(first.is_new());
        assert!(!second.is_new());
        assert_eq!(first.task_id(), second.task_id());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn dedup_only_applies_to_identical_op_and_scope() {
        let registry = registry();
        let invalidate = registry.submit(CacheOp::Invalidate, InvalidationScope::All);
        let purge = registry.submit(CacheOp::Purge, InvalidationScope::All);
        assert_ne!(invalidate.task_id(), purge.task_id());

        let other = registry.submit(CacheOp::Invalidate, project_scope("p1"));
        assert_ne!(invalidate.task_id(), other.task_id());
    }

    #[test]
    fn terminal_tasks_are_not_dedup_targets() {
        let registry = registry();
        let first = registry
            .submit(CacheOp::Invalidate, project_scope("p1"))
            .task_id()
            .clone();
        registry
            .transition(&first, TaskState::Running, None)
            .unwrap();
        registry
            .transition(&first, TaskState::Finished, None)
            .unwrap();

        let second = registry.submit(CacheOp::Invalidate, project_scope("p1"));
        assert!(second.is_new());
        assert_ne!(&first, second.task_id());
    }

    #[test]
    fn dedup_can_be_disabled() {
        let registry = TaskRegistry::new(false, Duration::from_secs(300));
        let first = registry.submit(CacheOp::Invalidate, project_scope("p1"));
        let second = registry.submit(CacheOp::Invalidate, project_scope("p1"));
        assert!(second.is_new());
        assert_ne!(first.task_id(), second.task_id());
    }

    #[test]
    fn terminal_tasks_are_reclaimed_after_retention() {
        let registry = TaskRegistry::new(true, Duration::from_secs(60));
        let id = registry
            .submit(CacheOp::Invalidate, project_scope("p1"))
            .task_id()
            .clone();
        registry.transition(&id, TaskState::Running, None).unwrap();
        registry.transition(&id, TaskState::Finished, None).unwrap();

        registry.backdate(&id, Duration::from_secs(120));
        assert_eq!(registry.prune_finished(), 1);
        assert!(registry.status(&id).is_err());
    }

    #[test]
    fn stale_running_task_is_reported_unknown() {
        // Crash-recovery rule: a Running task older than the retention
        // window can no longer resolve, so callers see NotFound.
        let registry = TaskRegistry::new(true, Duration::from_secs(60));
        let id = registry
            .submit(CacheOp::Invalidate, project_scope("p1"))
            .task_id()
            .clone();
        registry.transition(&id, TaskState::Running, None).unwrap();
        registry.backdate(&id, Duration::from_secs(120));

        let err = registry.status(&id).unwrap_err();
        assert!(matches!(err, RegistryError::NotFound { .. }));
    }
}
