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

//! Cache storage engine collaborator surface.
//!
//! The coordinator never touches cache entries directly. Entry lookup,
//! flagging, physical deletion and size accounting all live behind the
//! [`CacheStore`] trait; the engine provides its own internal concurrency
//! safety for concurrent `invalidate`/`evict_excess` calls.

use async_trait::async_trait;

use crate::error::StoreError;
use crate::scope::InvalidationScope;

/// Operations the coordinator requires from the cache storage engine.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Number of live (non-invalidated) entries matching a scope.
    async fn cache_size_for(&self, scope: &InvalidationScope) -> Result<u64, StoreError>;

    /// Flags every entry matching the scope as invalidated.
    async fn invalidate(&self, scope: &InvalidationScope) -> Result<(), StoreError>;

    /// Physically deletes every entry matching the scope.
    async fn purge(&self, scope: &InvalidationScope) -> Result<(), StoreError>;

    /// Projects among `projects` that have entries flagged for scheduled
    /// invalidation (publish windows that opened or closed since the last
    /// check).
    async fn scheduled_invalidation_candidates(
        &self,
        projects: &[String],
    ) -> Result<Vec<String>, StoreError>;

    /// Deletes the oldest entries until at most `max_entries` remain.
    async fn evict_excess(&self, max_entries: u64) -> Result<(), StoreError>;

    /// Deletes entries whose freshness lifetime has expired.
    async fn scavenge_expired(&self) -> Result<(), StoreError>;
}
