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

//! Cluster leadership collaborator surface.
//!
//! Sweeps run exclusively on the leader node so a multi-node cluster does
//! duplicate-free background work without a distributed lock. The
//! consistency of the predicate (no two nodes simultaneously believing they
//! are leader) is furnished by the external leadership mechanism, not by
//! this crate.

/// Leadership detection for the local node.
pub trait ClusterInfo: Send + Sync {
    /// Whether the local node is currently the cluster leader.
    ///
    /// Called at sweep registration and re-checked at every tick, because
    /// leadership can change between registration and a given tick.
    fn is_leader(&self) -> bool;
}

/// Single-node deployment: the local node is always the leader.
#[derive(Debug, Default, Clone, Copy)]
pub struct SingleNode;

impl ClusterInfo for SingleNode {
    fn is_leader(&self) -> bool {
        true
    }
}
