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

//! Detached execution of cache operations.
//!
//! The executor consumes a task's scope off the request thread, drives the
//! storage engine, and reports the terminal state back to the registry. It
//! never retries: retry policy, if any, belongs to the caller re-submitting
//! a fresh task. A failure in one task never affects unrelated tasks.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::registry::TaskRegistry;
use crate::scope::InvalidationScope;
use crate::store::CacheStore;
use crate::task::{CacheOp, TaskId, TaskState};

/// Runs submitted cache operations as detached tokio tasks.
#[derive(Clone)]
pub struct InvalidationExecutor {
    registry: Arc<TaskRegistry>,
    store: Arc<dyn CacheStore>,
}

impl InvalidationExecutor {
    pub fn new(registry: Arc<TaskRegistry>, store: Arc<dyn CacheStore>) -> Self {
        Self { registry, store }
    }

    /// Spawns the execution of a freshly submitted task.
    ///
    /// Returns the join handle for callers that want to await completion
    /// directly (tests, shutdown paths); normal callers drop it and observe
    /// progress through the registry.
    pub fn spawn(&self, task_id: TaskId, op: CacheOp, scope: InvalidationScope) -> JoinHandle<()> {
        let registry = self.registry.clone();
        let store = self.store.clone();
        tokio::spawn(async move {
            Self::execute(&registry, store.as_ref(), &task_id, op, &scope).await;
        })
    }

    async fn execute(
        registry: &TaskRegistry,
        store: &dyn CacheStore,
        task_id: &TaskId,
        op: CacheOp,
        scope: &InvalidationScope,
    ) {
        if let Err(e) = registry.transition(task_id, TaskState::Running, None) {
            // The task was reclaimed or tampered with; nothing to run.
            error!("Could not start task {}: {}", task_id, e);
            return;
        }

        let outcome = match op {
            CacheOp::Invalidate => store.invalidate(scope).await,
            CacheOp::Purge => store.purge(scope).await,
        };

        let result = match outcome {
            Ok(()) => {
                info!("Task finished: {} {} ({})", op, scope, task_id);
                registry.transition(task_id, TaskState::Finished, None)
            }
            Err(e) => {
                warn!("Task failed: {} {} ({}): {}", op, scope, task_id, e);
                registry.transition(task_id, TaskState::Failed, Some(e.to_string()))
            }
        };

        if let Err(e) = result {
            error!("Could not record terminal state for task {}: {}", task_id, e);
        }
    }
}
