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

//! Task records and their strict lifecycle.
//!
//! A task represents one asynchronous cache operation. States form the
//! lifecycle `Submitted -> Running -> {Finished | Failed}` with no way out
//! of a terminal state.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::scope::InvalidationScope;

/// Opaque task identifier.
///
/// Assigned atomically at submission, unique for the registry's lifetime,
/// never reused.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(String);

impl TaskId {
    pub(crate) fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for TaskId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for TaskId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Task lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskState {
    Submitted,
    Running,
    Finished,
    Failed,
}

impl TaskState {
    /// Terminal states accept no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskState::Finished | TaskState::Failed)
    }

    /// Whether `next` is a legal successor of `self`.
    pub fn may_transition_to(&self, next: TaskState) -> bool {
        matches!(
            (self, next),
            (TaskState::Submitted, TaskState::Running)
                | (TaskState::Running, TaskState::Finished)
                | (TaskState::Running, TaskState::Failed)
        )
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TaskState::Submitted => "Submitted",
            TaskState::Running => "Running",
            TaskState::Finished => "Finished",
            TaskState::Failed => "Failed",
        };
        f.write_str(name)
    }
}

/// The cache operation a task performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheOp {
    /// Flag matching entries as invalidated.
    Invalidate,
    /// Physically delete matching entries.
    Purge,
}

impl fmt::Display for CacheOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheOp::Invalidate => f.write_str("invalidate"),
            CacheOp::Purge => f.write_str("purge"),
        }
    }
}

/// One submitted cache operation and its observed progress.
#[derive(Debug, Clone)]
pub struct Task {
    pub id: TaskId,
    /// Human-readable name, `<op>~<scope suffix>`.
    pub name: String,
    pub op: CacheOp,
    pub scope: InvalidationScope,
    pub state: TaskState,
    pub submitted_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    /// Storage engine error recorded when the task failed.
    pub error: Option<String>,
}

impl Task {
    pub(crate) fn new(op: CacheOp, scope: InvalidationScope) -> Self {
        let name = format!("{}~{}", op, scope.name_suffix());
        Self {
            id: TaskId::generate(),
            name,
            op,
            scope,
            state: TaskState::Submitted,
            submitted_at: Utc::now(),
            finished_at: None,
            error: None,
        }
    }
}
