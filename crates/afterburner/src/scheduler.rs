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

//! Leader-only background sweeps.
//!
//! Two independent jobs keep the cache healthy without any request driving
//! them:
//!
//! - `invalidate-scheduled` (fixed delay): flags entries whose publish
//!   window opened or closed since the last check.
//! - `evict-excess` (cron): scavenges expired entries and deletes the
//!   oldest entries beyond the configured capacity bound.
//!
//! Each job runs on its own spawned task so a slow tick of one never delays
//! the other. Leadership is re-checked at every tick, not only at
//! registration, because leadership can change in between; a non-leader
//! tick is a silent skip. Tick errors are logged and the next tick proceeds
//! independently.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use chrono_tz::Tz;
use croner::Cron;
use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use crate::cluster::ClusterInfo;
use crate::config::CoordinatorConfig;
use crate::error::SchedulerError;
use crate::scope::{ContentDirectory, InvalidationScope};
use crate::store::CacheStore;

/// Name of the scheduled-invalidation flush job.
pub const INVALIDATE_SCHEDULED_JOB: &str = "invalidate-scheduled";

/// Name of the excess-capacity eviction job.
pub const EVICT_EXCESS_JOB: &str = "evict-excess";

/// How a sweep job is triggered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SweepTrigger {
    FixedDelay {
        initial_delay: Duration,
        period: Duration,
    },
    Cron {
        expression: String,
        timezone: Tz,
    },
}

/// Descriptor of one registered sweep job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SweepJob {
    pub name: &'static str,
    pub trigger: SweepTrigger,
    pub enabled: bool,
}

/// Owns the lifecycle of both sweep jobs.
///
/// `start` registers the enabled jobs when the local node is the leader;
/// `stop` unregisters them unconditionally and idempotently. There is no
/// ambient global registry: dropping the scheduler after `stop` leaves
/// nothing behind.
pub struct SweepScheduler {
    config: CoordinatorConfig,
    store: Arc<dyn CacheStore>,
    directory: Arc<dyn ContentDirectory>,
    cluster: Arc<dyn ClusterInfo>,
    shutdown: watch::Sender<bool>,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl SweepScheduler {
    pub fn new(
        config: CoordinatorConfig,
        store: Arc<dyn CacheStore>,
        directory: Arc<dyn ContentDirectory>,
        cluster: Arc<dyn ClusterInfo>,
    ) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            config,
            store,
            directory,
            cluster,
            shutdown,
            handles: Mutex::new(Vec::new()),
        }
    }

    /// The job descriptors this scheduler manages.
    pub fn jobs(&self) -> Vec<SweepJob> {
        vec![
            SweepJob {
                name: INVALIDATE_SCHEDULED_JOB,
                trigger: SweepTrigger::FixedDelay {
                    initial_delay: self.config.invalidate_scheduled_initial_delay(),
                    period: self.config.invalidate_scheduled_period(),
                },
                enabled: self.config.enable_invalidate_scheduled(),
            },
            SweepJob {
                name: EVICT_EXCESS_JOB,
                trigger: SweepTrigger::Cron {
                    expression: self.config.evict_excess_schedule().to_string(),
                    timezone: self.config.evict_excess_timezone(),
                },
                enabled: self.config.enable_evict_excess(),
            },
        ]
    }

    /// Registers the enabled sweep jobs.
    ///
    /// If this node is not the leader the jobs remain unregistered;
    /// leadership transfer is not actively watched, a fresh process start
    /// re-evaluates. The cron expression is validated regardless so a
    /// misconfiguration surfaces on every node, not only on the leader.
    pub fn start(&self) -> Result<(), SchedulerError> {
        let cron = Cron::new(self.config.evict_excess_schedule())
            .parse()
            .map_err(|e| SchedulerError::InvalidCron {
                expression: self.config.evict_excess_schedule().to_string(),
                message: e.to_string(),
            })?;

        let mut handles = self.handles.lock();
        if !handles.is_empty() {
            warn!("Sweep jobs already registered; ignoring start");
            return Ok(());
        }

        // A prior stop left the channel at true; reset it so loops spawned
        // by a restart actually run.
        let _ = self.shutdown.send(false);

        if !self.cluster.is_leader() {
            info!("Not the cluster leader; sweep jobs remain unregistered");
            return Ok(());
        }

        if self.config.enable_invalidate_scheduled() {
            let store = self.store.clone();
            let directory = self.directory.clone();
            let cluster = self.cluster.clone();
            let initial_delay = self.config.invalidate_scheduled_initial_delay();
            let period = self.config.invalidate_scheduled_period();
            let shutdown_rx = self.shutdown.subscribe();
            handles.push(tokio::spawn(Self::run_invalidate_scheduled(
                store,
                directory,
                cluster,
                initial_delay,
                period,
                shutdown_rx,
            )));
            info!("Registered sweep job {}", INVALIDATE_SCHEDULED_JOB);
        }

        if self.config.enable_evict_excess() {
            let store = self.store.clone();
            let cluster = self.cluster.clone();
            let timezone = self.config.evict_excess_timezone();
            let max_entries = self.config.max_cache_entries();
            let shutdown_rx = self.shutdown.subscribe();
            handles.push(tokio::spawn(Self::run_evict_excess(
                store,
                cluster,
                cron,
                timezone,
                max_entries,
                shutdown_rx,
            )));
            info!("Registered sweep job {}", EVICT_EXCESS_JOB);
        }

        Ok(())
    }

    /// Unregisters both jobs and waits for their loops to wind down.
    ///
    /// Unconditional and idempotent: a no-op on a node that was never
    /// leader or that is already stopped.
    pub async fn stop(&self) {
        let _ = self.shutdown.send(true);
        let handles: Vec<JoinHandle<()>> = { self.handles.lock().drain(..).collect() };
        for handle in handles {
            let _ = handle.await;
        }
        debug!("Sweep jobs unregistered");
    }

    async fn run_invalidate_scheduled(
        store: Arc<dyn CacheStore>,
        directory: Arc<dyn ContentDirectory>,
        cluster: Arc<dyn ClusterInfo>,
        initial_delay: Duration,
        period: Duration,
        mut shutdown_rx: watch::Receiver<bool>,
    ) {
        tokio::select! {
            _ = sleep(initial_delay) => {}
            _ = shutdown_rx.changed() => return,
        }

        loop {
            if *shutdown_rx.borrow() {
                break;
            }
            Self::invalidate_scheduled_tick(store.as_ref(), directory.as_ref(), cluster.as_ref())
                .await;
            tokio::select! {
                _ = sleep(period) => {}
                _ = shutdown_rx.changed() => break,
            }
        }
    }

    async fn run_evict_excess(
        store: Arc<dyn CacheStore>,
        cluster: Arc<dyn ClusterInfo>,
        cron: Cron,
        timezone: Tz,
        max_entries: u64,
        mut shutdown_rx: watch::Receiver<bool>,
    ) {
        loop {
            if *shutdown_rx.borrow() {
                break;
            }
            let now = Utc::now().with_timezone(&timezone);
            let next = match cron.find_next_occurrence(&now, false) {
                Ok(next) => next,
                Err(e) => {
                    // A parseable expression with no future occurrence.
                    error!("No next occurrence for {}: {}", EVICT_EXCESS_JOB, e);
                    break;
                }
            };
            let wait = (next - now).to_std().unwrap_or(Duration::ZERO);
            tokio::select! {
                _ = sleep(wait) => {}
                _ = shutdown_rx.changed() => break,
            }
            if *shutdown_rx.borrow() {
                break;
            }
            Self::evict_excess_tick(store.as_ref(), cluster.as_ref(), max_entries).await;
        }
    }

    async fn invalidate_scheduled_tick(
        store: &dyn CacheStore,
        directory: &dyn ContentDirectory,
        cluster: &dyn ClusterInfo,
    ) {
        if !cluster.is_leader() {
            debug!("Skipping {} tick: not the leader", INVALIDATE_SCHEDULED_JOB);
            return;
        }

        let projects = directory.projects().await;
        let candidates = match store.scheduled_invalidation_candidates(&projects).await {
            Ok(candidates) => candidates,
            Err(e) => {
                warn!("Could not find scheduled invalidation candidates: {}", e);
                return;
            }
        };

        for project in candidates {
            let scope = InvalidationScope::Project { project };
            debug!("Scheduled invalidation for {}", scope);
            if let Err(e) = store.invalidate(&scope).await {
                warn!("Scheduled invalidation failed for {}: {}", scope, e);
            }
        }
    }

    async fn evict_excess_tick(store: &dyn CacheStore, cluster: &dyn ClusterInfo, max_entries: u64) {
        if !cluster.is_leader() {
            debug!("Skipping {} tick: not the leader", EVICT_EXCESS_JOB);
            return;
        }

        if let Err(e) = store.scavenge_expired().await {
            warn!("Scavenge failed: {}", e);
        }
        if let Err(e) = store.evict_excess(max_entries).await {
            warn!("Eviction failed: {}", e);
        }
    }
}
