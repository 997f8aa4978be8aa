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

//! Content-change driven invalidation.
//!
//! [`ChangeInvalidator`] listens for repository change events and turns
//! them into project-wide invalidations. Events arrive at publish rate,
//! so projects are accumulated into a pending set and flushed on a fixed
//! delay; a burst of publishes to one project costs a single submission.
//! Only the `master` branch serves rendered pages, changes to other
//! branches are ignored.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::CoordinatorConfig;
use crate::poller::StatusClient;
use crate::scope::PurgeRequest;

/// Branch whose content is actually rendered and cached.
const LIVE_BRANCH: &str = "master";

/// A repository change notification, reduced to what invalidation needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    pub project: String,
    pub branch: String,
}

/// Batches change events and flushes project invalidations on a timer.
pub struct ChangeInvalidator<C: StatusClient> {
    client: Arc<C>,
    flush_period: Duration,
    pending: Arc<Mutex<HashSet<String>>>,
    shutdown: watch::Sender<bool>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl<C: StatusClient + 'static> ChangeInvalidator<C> {
    pub fn new(client: Arc<C>, flush_period: Duration) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            client,
            flush_period,
            pending: Arc::new(Mutex::new(HashSet::new())),
            shutdown,
            handle: Mutex::new(None),
        }
    }

    pub fn from_config(client: Arc<C>, config: &CoordinatorConfig) -> Self {
        Self::new(client, config.change_flush_period())
    }

    /// Records a change event for the next flush.
    pub fn on_event(&self, event: &ChangeEvent) {
        if event.branch != LIVE_BRANCH {
            debug!(
                "Ignoring change on branch {:?} of project {:?}",
                event.branch, event.project
            );
            return;
        }
        self.pending.lock().insert(event.project.clone());
    }

    /// Projects queued for the next flush. Mostly useful for diagnostics.
    pub fn pending(&self) -> Vec<String> {
        let mut projects: Vec<String> = self.pending.lock().iter().cloned().collect();
        projects.sort();
        projects
    }

    /// Starts the background flush loop. Calling twice is a no-op.
    pub fn start(&self) {
        let mut handle = self.handle.lock();
        if handle.is_some() {
            return;
        }

        info!(
            "Starting change invalidator, flushing every {:?}",
            self.flush_period
        );
        let client = self.client.clone();
        let pending = self.pending.clone();
        let flush_period = self.flush_period;
        let mut shutdown_rx = self.shutdown.subscribe();

        *handle = Some(tokio::spawn(async move {
            loop {
                if *shutdown_rx.borrow() {
                    break;
                }
                tokio::select! {
                    _ = tokio::time::sleep(flush_period) => {}
                    _ = shutdown_rx.changed() => break,
                }
                flush(&client, &pending).await;
            }
            // Drain whatever accumulated since the last tick.
            flush(&client, &pending).await;
            info!("Change invalidator stopped");
        }));
    }

    /// Signals shutdown and waits for the final flush.
    pub async fn stop(&self) {
        let _ = self.shutdown.send(true);
        let handle = self.handle.lock().take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                warn!("Change invalidator task panicked: {}", e);
            }
        }
    }
}

async fn flush<C: StatusClient>(client: &Arc<C>, pending: &Arc<Mutex<HashSet<String>>>) {
    let projects: Vec<String> = pending.lock().drain().collect();
    for project in projects {
        debug!("Flushing invalidation of project {:?}", project);
        match client.submit(&PurgeRequest::project(&project)).await {
            Ok(task_id) => {
                debug!("Submitted invalidation of {:?} as task {}", project, task_id);
            }
            Err(e) => {
                warn!("Failed to invalidate project {:?}: {}; will retry", project, e);
                pending.lock().insert(project);
            }
        }
    }
}
