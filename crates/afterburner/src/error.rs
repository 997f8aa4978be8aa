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

//! Error types for the coordinator.
//!
//! Each error enum covers one concern:
//! - [`ResolveError`] — purge-request validation and content classification
//! - [`RegistryError`] — task lookup and lifecycle violations
//! - [`StoreError`] — failures reported by the cache storage engine
//! - [`SubmitError`] — everything that can reject a submission synchronously
//! - [`SchedulerError`] — sweep scheduler startup problems
//!
//! Resolution and submission errors surface synchronously to the caller.
//! Execution errors are recorded on the task and observed via polling.
//! Sweep-tick errors are logged and never escape the scheduler loop.

use thiserror::Error;

use crate::task::{TaskId, TaskState};

/// Errors produced while resolving a purge request into an invalidation scope.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// The request was malformed or ambiguous. Not retriable.
    #[error("Invalid purge request: {message}")]
    InvalidRequest { message: String },

    /// The referenced content item does not exist in the directory.
    ///
    /// Resolution aborts here; it must not fall back to a wider scope.
    #[error("Content not found: {content_id}")]
    NotFound { content_id: String },
}

/// Errors returned by [`TaskRegistry`](crate::registry::TaskRegistry) operations.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// The task id was never issued, or the task has been reclaimed.
    #[error("Task not found: {task_id}")]
    NotFound { task_id: TaskId },

    /// The requested state change violates the strict task lifecycle.
    #[error("Invalid transition for task {task_id}: {from} -> {to}")]
    InvalidTransition {
        task_id: TaskId,
        from: TaskState,
        to: TaskState,
    },
}

/// Failures reported by the cache storage engine.
///
/// The coordinator records these on the failed task verbatim; retry policy
/// belongs to the caller re-submitting a fresh task.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The engine could not be reached.
    #[error("Cache store unavailable: {message}")]
    Unavailable { message: String },

    /// The engine rejected or failed the operation.
    #[error("Cache store operation failed: {message}")]
    Operation { message: String },

    /// The engine enforced its own timeout on the operation.
    #[error("Cache store operation timed out")]
    Timeout,
}

/// Errors that reject a purge submission before any task is created.
#[derive(Debug, Error)]
pub enum SubmitError {
    /// Scope resolution failed.
    #[error(transparent)]
    Resolve(#[from] ResolveError),

    /// The caller lacks rights to the resolved scope. Not retriable.
    #[error("Caller is not permitted to invalidate scope: {scope}")]
    Forbidden { scope: String },

    /// A licensing precondition failed.
    #[error("License check failed: {message}")]
    License { message: String },
}

/// Errors raised when starting the sweep scheduler.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// The configured cron expression could not be parsed.
    #[error("Invalid cron expression {expression:?}: {message}")]
    InvalidCron { expression: String, message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_error_messages() {
        let err = ResolveError::InvalidRequest {
            message: "pathPrefix requires domain".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Invalid purge request: pathPrefix requires domain"
        );

        let err = ResolveError::NotFound {
            content_id: "c1".to_string(),
        };
        assert_eq!(err.to_string(), "Content not found: c1");
    }

    #[test]
    fn submit_error_wraps_resolve_error() {
        let err: SubmitError = ResolveError::NotFound {
            content_id: "c1".to_string(),
        }
        .into();
        assert!(matches!(err, SubmitError::Resolve(_)));
        assert_eq!(err.to_string(), "Content not found: c1");
    }
}
