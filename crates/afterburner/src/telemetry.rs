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

//! Tracing setup for embedding applications.

use once_cell::sync::OnceCell;
use tracing_subscriber::EnvFilter;

static INITIALIZED: OnceCell<()> = OnceCell::new();

/// Installs a global fmt subscriber.
///
/// The filter falls back to `RUST_LOG`, then to `info`. Subsequent calls
/// are no-ops, so embedders and tests can call this unconditionally.
pub fn init_logging(filter: Option<&str>) {
    INITIALIZED.get_or_init(|| {
        let filter = match filter {
            Some(directives) => EnvFilter::new(directives),
            None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        };
        // try_init so an embedder-installed subscriber wins quietly.
        let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
    });
}
