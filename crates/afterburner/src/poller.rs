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

//! Client-side submit-and-poll protocol.
//!
//! The requesting party (typically a UI) submits a purge request, then
//! polls status at a fixed interval until a terminal state or an overall
//! timeout. Exactly one [`PollOutcome`] is reported per submitted request;
//! a timeout is distinct from an execution failure — the task may still
//! finish later, but the caller has given up waiting.
//!
//! The loop is a bounded retry, never an unbounded block, and can be
//! cancelled (e.g. when the UI is torn down) without panicking.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Notify;
use tokio::time::{sleep, Duration, Instant};
use tracing::{debug, warn};

use crate::config::CoordinatorConfig;
use crate::error::{RegistryError, SubmitError};
use crate::scope::PurgeRequest;
use crate::task::{Task, TaskId, TaskState};

/// The coordinator surface the poller talks to.
///
/// In-process callers hand it the coordinator directly; remote callers
/// implement it over their transport.
#[async_trait]
pub trait StatusClient: Send + Sync {
    /// Submits a purge request, returning the task id to poll.
    async fn submit(&self, request: &PurgeRequest) -> Result<TaskId, SubmitError>;

    /// Queries current task status.
    async fn status(&self, task_id: &TaskId) -> Result<Task, RegistryError>;
}

/// Single outcome of one submit-and-poll cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    /// The task reached `Finished` within the poll budget.
    Succeeded { task_id: TaskId },
    /// The task reached `Failed`; the recorded engine error is attached.
    Failed {
        task_id: TaskId,
        error: Option<String>,
    },
    /// Submission was rejected; no polling took place.
    SubmissionRejected { error: String },
    /// No terminal state was observed within the poll budget.
    TimedOut { task_id: TaskId },
    /// The poll loop was cancelled by the caller.
    Cancelled,
}

/// Bounded retry/poll loop for one requesting party.
pub struct ClientPoller<C: StatusClient> {
    client: Arc<C>,
    interval: Duration,
    timeout: Duration,
    cancel: Notify,
}

impl<C: StatusClient> ClientPoller<C> {
    pub fn new(client: Arc<C>, interval: Duration, timeout: Duration) -> Self {
        Self {
            client,
            interval,
            timeout,
            cancel: Notify::new(),
        }
    }

    /// Creates a poller with the configured interval and budget.
    pub fn from_config(client: Arc<C>, config: &CoordinatorConfig) -> Self {
        Self::new(client, config.poll_interval(), config.poll_timeout())
    }

    /// Cancels an in-flight [`run`](Self::run).
    ///
    /// Uses a stored permit, so a cancel that races ahead of the loop is
    /// not lost.
    pub fn cancel(&self) {
        self.cancel.notify_one();
    }

    /// Submits the request and polls to a single outcome.
    pub async fn run(&self, request: &PurgeRequest) -> PollOutcome {
        let task_id = match self.client.submit(request).await {
            Ok(task_id) => task_id,
            Err(e) => {
                warn!("Purge submission rejected: {}", e);
                return PollOutcome::SubmissionRejected {
                    error: e.to_string(),
                };
            }
        };
        debug!("Polling task {} every {:?}", task_id, self.interval);

        let deadline = Instant::now() + self.timeout;
        loop {
            match self.client.status(&task_id).await {
                Ok(task) => match task.state {
                    TaskState::Finished => return PollOutcome::Succeeded { task_id },
                    TaskState::Failed => {
                        return PollOutcome::Failed {
                            task_id,
                            error: task.error,
                        }
                    }
                    TaskState::Submitted | TaskState::Running => {}
                },
                Err(e) => {
                    // The task vanished mid-poll (reclaimed after restart).
                    return PollOutcome::Failed {
                        task_id,
                        error: Some(e.to_string()),
                    };
                }
            }

            let now = Instant::now();
            if now >= deadline {
                debug!("Poll budget exhausted for task {}", task_id);
                return PollOutcome::TimedOut { task_id };
            }
            let wait = self.interval.min(deadline - now);
            tokio::select! {
                _ = sleep(wait) => {}
                _ = self.cancel.notified() => {
                    debug!("Poll loop cancelled for task {}", task_id);
                    return PollOutcome::Cancelled;
                }
            }
        }
    }
}
