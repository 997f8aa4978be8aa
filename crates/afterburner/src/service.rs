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

//! Coordinator facade and transport-agnostic request boundary.
//!
//! [`Coordinator`] wires the resolver, registry and executor together and
//! enforces the synchronous preconditions (license, authorization) before a
//! task is created. [`Coordinator::handle`] exposes the whole thing as a
//! JSON-shaped action protocol with HTTP-style status codes, without
//! binding to any particular transport:
//!
//! - `invalidate` — resolve scope, submit, return `{taskId}`
//! - `purge-all` — submit a physical purge of everything
//! - `status` — report `{state, error?}` for a task
//! - `cache-status` — report `{size}` for a project
//!
//! Malformed or unsupported actions map to 400, authorization failures to
//! 403, unknown content/tasks to 404, licensing preconditions to 500.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::config::CoordinatorConfig;
use crate::error::{RegistryError, ResolveError, StoreError, SubmitError};
use crate::executor::InvalidationExecutor;
use crate::poller::StatusClient;
use crate::registry::TaskRegistry;
use crate::scope::{ContentDirectory, InvalidationScope, PurgeRequest, ScopeResolver};
use crate::store::CacheStore;
use crate::task::{CacheOp, Task, TaskId};

/// Authorization check for a resolved scope.
///
/// A statically-typed seam instead of a runtime-resolved role lookup; the
/// serving platform supplies the implementation.
pub trait Authorizer: Send + Sync {
    /// Whether the current caller may invalidate the given scope.
    ///
    /// Scopes without a project (`Domain`, `PathPrefix`, `All`) cut across
    /// projects and should require administrator rights.
    fn may_invalidate(&self, scope: &InvalidationScope) -> bool;
}

/// Licensing precondition for coordinator actions.
pub trait LicenseChecker: Send + Sync {
    fn is_valid(&self) -> bool;
}

/// Permits everything; suitable for trusted in-process callers and tests.
#[derive(Debug, Default, Clone, Copy)]
pub struct AllowAll;

impl Authorizer for AllowAll {
    fn may_invalidate(&self, _scope: &InvalidationScope) -> bool {
        true
    }
}

impl LicenseChecker for AllowAll {
    fn is_valid(&self) -> bool {
        true
    }
}

/// One request at the coordinator boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionRequest {
    pub action: String,
    #[serde(default)]
    pub data: ActionData,
}

/// Loose data bag accompanying an action.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ActionData {
    pub project: Option<String>,
    pub content_id: Option<String>,
    pub site_id: Option<String>,
    pub domain: Option<String>,
    pub path_prefix: Option<String>,
    pub all: bool,
    pub task_id: Option<String>,
}

impl ActionData {
    fn purge_request(&self) -> PurgeRequest {
        PurgeRequest {
            project: self.project.clone(),
            content_id: self.content_id.clone(),
            site_id: self.site_id.clone(),
            domain: self.domain.clone(),
            path_prefix: self.path_prefix.clone(),
            all: self.all,
        }
    }
}

/// Transport-agnostic response: HTTP-style status plus a JSON body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionResponse {
    pub status: u16,
    pub body: Value,
}

impl ActionResponse {
    fn ok(body: Value) -> Self {
        Self { status: 200, body }
    }

    fn error(status: u16, message: impl Into<String>) -> Self {
        Self {
            status,
            body: json!({ "error": message.into() }),
        }
    }
}

/// Front door of the invalidation coordinator.
pub struct Coordinator {
    resolver: ScopeResolver,
    registry: Arc<TaskRegistry>,
    executor: InvalidationExecutor,
    store: Arc<dyn CacheStore>,
    authorizer: Arc<dyn Authorizer>,
    license: Arc<dyn LicenseChecker>,
}

impl Coordinator {
    pub fn new(
        config: &CoordinatorConfig,
        store: Arc<dyn CacheStore>,
        directory: Arc<dyn ContentDirectory>,
        authorizer: Arc<dyn Authorizer>,
        license: Arc<dyn LicenseChecker>,
    ) -> Self {
        let registry = Arc::new(TaskRegistry::new(
            config.dedup_in_flight(),
            config.task_retention(),
        ));
        let executor = InvalidationExecutor::new(registry.clone(), store.clone());
        Self {
            resolver: ScopeResolver::new(directory),
            registry,
            executor,
            store,
            authorizer,
            license,
        }
    }

    /// The task registry backing this coordinator.
    pub fn registry(&self) -> &Arc<TaskRegistry> {
        &self.registry
    }

    /// Resolves, authorizes and submits a purge request.
    ///
    /// Returns the task id immediately; the invalidation itself runs
    /// detached and is observed via [`task_status`](Self::task_status).
    pub async fn submit_purge(&self, request: &PurgeRequest) -> Result<TaskId, SubmitError> {
        self.submit_op(CacheOp::Invalidate, request).await
    }

    /// Submits a physical purge of the entire cache.
    pub async fn submit_purge_all(&self) -> Result<TaskId, SubmitError> {
        self.submit_op(CacheOp::Purge, &PurgeRequest::all()).await
    }

    async fn submit_op(&self, op: CacheOp, request: &PurgeRequest) -> Result<TaskId, SubmitError> {
        if !self.license.is_valid() {
            return Err(SubmitError::License {
                message: "no valid license installed".to_string(),
            });
        }

        let scope = self.resolver.resolve(request).await?;

        if !self.authorizer.may_invalidate(&scope) {
            warn!("Rejected {} of {}: caller not permitted", op, scope);
            return Err(SubmitError::Forbidden {
                scope: scope.to_string(),
            });
        }

        let submission = self.registry.submit(op, scope.clone());
        let task_id = submission.task_id().clone();
        if submission.is_new() {
            self.executor.spawn(task_id.clone(), op, scope);
        }
        Ok(task_id)
    }

    /// Current status of a submitted task.
    pub fn task_status(&self, task_id: &TaskId) -> Result<Task, RegistryError> {
        self.registry.status(task_id)
    }

    /// Number of live cache entries for a project.
    pub async fn cache_size(&self, project: &str) -> Result<u64, StoreError> {
        self.store
            .cache_size_for(&InvalidationScope::Project {
                project: project.to_string(),
            })
            .await
    }

    /// Handles one boundary request, mapping errors to status codes.
    pub async fn handle(&self, request: &ActionRequest) -> ActionResponse {
        debug!("Handling action {:?}", request.action);
        match request.action.trim() {
            "invalidate" => match self.submit_purge(&request.data.purge_request()).await {
                Ok(task_id) => ActionResponse::ok(json!({ "taskId": task_id })),
                Err(e) => submit_error_response(e),
            },
            "purge-all" => match self.submit_purge_all().await {
                Ok(task_id) => ActionResponse::ok(json!({ "taskId": task_id })),
                Err(e) => submit_error_response(e),
            },
            "status" => {
                let Some(task_id) = &request.data.task_id else {
                    return ActionResponse::error(400, "taskId is required");
                };
                match self.task_status(&TaskId::from(task_id.as_str())) {
                    Ok(task) => ActionResponse::ok(json!({
                        "state": task.state,
                        "error": task.error,
                    })),
                    Err(e) => ActionResponse::error(404, e.to_string()),
                }
            }
            "cache-status" => {
                let Some(project) = &request.data.project else {
                    return ActionResponse::error(400, "project is required");
                };
                match self.cache_size(project).await {
                    Ok(size) => ActionResponse::ok(json!({ "size": size })),
                    Err(e) => ActionResponse::error(500, e.to_string()),
                }
            }
            _ => ActionResponse::error(400, "Invalid action"),
        }
    }
}

fn submit_error_response(error: SubmitError) -> ActionResponse {
    let status = match &error {
        SubmitError::Resolve(ResolveError::InvalidRequest { .. }) => 400,
        SubmitError::Resolve(ResolveError::NotFound { .. }) => 404,
        SubmitError::Forbidden { .. } => 403,
        SubmitError::License { .. } => 500,
    };
    ActionResponse::error(status, error.to_string())
}

#[async_trait]
impl StatusClient for Coordinator {
    async fn submit(&self, request: &PurgeRequest) -> Result<TaskId, SubmitError> {
        self.submit_purge(request).await
    }

    async fn status(&self, task_id: &TaskId) -> Result<Task, RegistryError> {
        self.task_status(task_id)
    }
}
