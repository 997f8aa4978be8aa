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

//! # Afterburner
//!
//! Invalidation coordination for a rendered-page cache.
//!
//! Afterburner turns loose purge requests into precise invalidation
//! scopes, runs the invalidations as tracked asynchronous tasks, and
//! keeps the cache bounded with leader-gated background sweeps. It owns
//! the coordination, not the cache: the actual page store, cluster
//! membership and content metadata are supplied through the
//! [`CacheStore`], [`ClusterInfo`] and [`ContentDirectory`] traits.
//!
//! ## Architecture
//!
//! - [`ScopeResolver`] maps a [`PurgeRequest`] to the narrowest matching
//!   [`InvalidationScope`], from a single content item up to the whole
//!   cache.
//! - [`TaskRegistry`] tracks every invalidation as a [`Task`] with a
//!   `Submitted -> Running -> Finished | Failed` lifecycle, deduplicates
//!   in-flight work and reclaims finished records after a retention
//!   window.
//! - [`InvalidationExecutor`] runs each task on a detached tokio task;
//!   submission never waits for the store.
//! - [`SweepScheduler`] drives the periodic sweeps, flushing scheduled
//!   invalidations on a fixed delay and evicting excess entries on a
//!   cron schedule, on the cluster leader only.
//! - [`ChangeInvalidator`] batches content-change events into
//!   project-wide invalidations.
//! - [`ClientPoller`] is the client-side loop that submits a request and
//!   polls the task to completion.
//! - [`Coordinator`] ties it all together behind a transport-agnostic
//!   action boundary.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use afterburner::{AllowAll, Coordinator, CoordinatorConfig, PurgeRequest, SweepScheduler};
//!
//! let config = CoordinatorConfig::default();
//! let coordinator = Coordinator::new(
//!     &config,
//!     store,       // Arc<dyn CacheStore>
//!     directory,   // Arc<dyn ContentDirectory>
//!     Arc::new(AllowAll),
//!     Arc::new(AllowAll),
//! );
//!
//! let task_id = coordinator.submit_purge(&PurgeRequest::project("intranet")).await?;
//! let task = coordinator.task_status(&task_id)?;
//! ```

pub mod cluster;
pub mod config;
pub mod error;
pub mod executor;
pub mod invalidator;
pub mod poller;
pub mod registry;
pub mod scheduler;
pub mod scope;
pub mod service;
pub mod store;
pub mod task;
pub mod telemetry;

pub use cluster::{ClusterInfo, SingleNode};
pub use config::{CoordinatorConfig, CoordinatorConfigBuilder};
pub use error::{RegistryError, ResolveError, SchedulerError, StoreError, SubmitError};
pub use executor::InvalidationExecutor;
pub use invalidator::{ChangeEvent, ChangeInvalidator};
pub use poller::{ClientPoller, PollOutcome, StatusClient};
pub use registry::{Submission, TaskRegistry};
pub use scheduler::{SweepJob, SweepScheduler, SweepTrigger};
pub use scope::{ContentDirectory, ContentKind, InvalidationScope, PurgeRequest, ScopeResolver};
pub use service::{
    ActionData, ActionRequest, ActionResponse, AllowAll, Authorizer, Coordinator, LicenseChecker,
};
pub use store::CacheStore;
pub use task::{CacheOp, Task, TaskId, TaskState};
pub use telemetry::init_logging;
