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

//! Invalidation scopes and purge-request resolution.
//!
//! A purge request arrives as a loose bag of optional hint fields. The
//! [`ScopeResolver`] maps it into exactly one [`InvalidationScope`] variant,
//! choosing the most specific scope the fields support:
//!
//! content > site > path-prefix > domain > project > all
//!
//! An empty request is rejected rather than silently interpreted; a request
//! naming a content item that the directory cannot find aborts resolution
//! instead of widening to project scope.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::error::ResolveError;

/// The precise subset of cached entries targeted by an invalidation.
///
/// Exactly one variant is active per request. Variants are ordered by
/// decreasing specificity, which is also the resolution precedence.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum InvalidationScope {
    /// One content item within a project.
    Content { project: String, content_id: String },
    /// A whole site subtree within a project.
    Site { project: String, site_id: String },
    /// Entries whose URL path starts with a prefix, scoped to a host domain.
    PathPrefix { domain: String, path_prefix: String },
    /// Entries served under a host domain.
    Domain { domain: String },
    /// All entries tagged with a project.
    Project { project: String },
    /// Everything.
    All,
}

impl InvalidationScope {
    /// The project this scope is confined to, if any.
    ///
    /// `Domain`, `PathPrefix` and `All` scopes cut across projects and
    /// return `None`; authorization for those requires administrator rights.
    pub fn project(&self) -> Option<&str> {
        match self {
            InvalidationScope::Content { project, .. }
            | InvalidationScope::Site { project, .. }
            | InvalidationScope::Project { project } => Some(project),
            InvalidationScope::PathPrefix { .. }
            | InvalidationScope::Domain { .. }
            | InvalidationScope::All => None,
        }
    }

    /// Deterministic task-name fragment for this scope.
    ///
    /// Simple scopes use their value directly; compound scopes use a
    /// truncated sha256 of their fields so the fragment stays short and
    /// filesystem/log friendly.
    pub fn name_suffix(&self) -> String {
        match self {
            InvalidationScope::All => "all".to_string(),
            InvalidationScope::Project { project } => project.clone(),
            InvalidationScope::Domain { domain } => domain.clone(),
            InvalidationScope::Content {
                project,
                content_id,
            } => digest_suffix(&[project, content_id]),
            InvalidationScope::Site { project, site_id } => digest_suffix(&[project, site_id]),
            InvalidationScope::PathPrefix {
                domain,
                path_prefix,
            } => digest_suffix(&[domain, path_prefix]),
        }
    }
}

impl fmt::Display for InvalidationScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InvalidationScope::All => write!(f, "all"),
            InvalidationScope::Project { project } => write!(f, "project:{}", project),
            InvalidationScope::Site { project, site_id } => {
                write!(f, "site:{}/{}", project, site_id)
            }
            InvalidationScope::Content {
                project,
                content_id,
            } => write!(f, "content:{}/{}", project, content_id),
            InvalidationScope::Domain { domain } => write!(f, "domain:{}", domain),
            InvalidationScope::PathPrefix {
                domain,
                path_prefix,
            } => write!(f, "path:{}{}", domain, path_prefix),
        }
    }
}

fn digest_suffix(fields: &[&str]) -> String {
    let mut digest = Sha256::new();
    for field in fields {
        digest.update(field.as_bytes());
        digest.update([0u8]);
    }
    hex::encode(&digest.finalize()[..16])
}

/// A purge request as it arrives at the coordinator boundary.
///
/// All hint fields are optional; the resolver decides which scope wins.
/// The explicit `all` flag distinguishes "purge everything" from an empty
/// request, which is rejected.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PurgeRequest {
    pub project: Option<String>,
    pub content_id: Option<String>,
    pub site_id: Option<String>,
    pub domain: Option<String>,
    pub path_prefix: Option<String>,
    pub all: bool,
}

impl PurgeRequest {
    /// Convenience constructor for a project-wide purge.
    pub fn project(project: impl Into<String>) -> Self {
        Self {
            project: Some(project.into()),
            ..Default::default()
        }
    }

    /// Convenience constructor for the explicit purge-everything request.
    pub fn all() -> Self {
        Self {
            all: true,
            ..Default::default()
        }
    }
}

/// Classification of a content item in the serving platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    /// The item is a site root; purging it means purging the site subtree.
    SiteRoot,
    /// A leaf content item.
    Item,
}

/// Read-only directory lookup provided by the content-serving platform.
///
/// The resolver uses [`classify`](ContentDirectory::classify) to choose
/// between `Site` and `Content` scopes; the sweep scheduler uses
/// [`projects`](ContentDirectory::projects) to enumerate known projects.
#[async_trait]
pub trait ContentDirectory: Send + Sync {
    /// Classifies a content item, or `None` if it does not exist.
    async fn classify(&self, project: &str, content_id: &str) -> Option<ContentKind>;

    /// All known project identifiers.
    async fn projects(&self) -> Vec<String>;
}

/// Maps purge requests to invalidation scopes.
///
/// Pure and side-effect free apart from the single content-directory lookup
/// needed to classify a `content_id`.
pub struct ScopeResolver {
    directory: Arc<dyn ContentDirectory>,
}

impl ScopeResolver {
    pub fn new(directory: Arc<dyn ContentDirectory>) -> Self {
        Self { directory }
    }

    /// Resolves a purge request into exactly one scope.
    ///
    /// Resolution follows decreasing specificity and is deterministic when
    /// multiple hint fields are present: content > site > path-prefix >
    /// domain > project > all.
    pub async fn resolve(&self, request: &PurgeRequest) -> Result<InvalidationScope, ResolveError> {
        if let Some(content_id) = &request.content_id {
            let project =
                request
                    .project
                    .as_deref()
                    .ok_or_else(|| ResolveError::InvalidRequest {
                        message: "contentId requires project".to_string(),
                    })?;

            let kind = self
                .directory
                .classify(project, content_id)
                .await
                .ok_or_else(|| ResolveError::NotFound {
                    content_id: content_id.clone(),
                })?;

            let scope = match kind {
                ContentKind::SiteRoot => InvalidationScope::Site {
                    project: project.to_string(),
                    site_id: content_id.clone(),
                },
                ContentKind::Item => InvalidationScope::Content {
                    project: project.to_string(),
                    content_id: content_id.clone(),
                },
            };
            debug!("Resolved content {} to scope {}", content_id, scope);
            return Ok(scope);
        }

        if let Some(site_id) = &request.site_id {
            let project =
                request
                    .project
                    .as_deref()
                    .ok_or_else(|| ResolveError::InvalidRequest {
                        message: "siteId requires project".to_string(),
                    })?;
            return Ok(InvalidationScope::Site {
                project: project.to_string(),
                site_id: site_id.clone(),
            });
        }

        if let Some(path_prefix) = &request.path_prefix {
            let domain = request
                .domain
                .as_deref()
                .ok_or_else(|| ResolveError::InvalidRequest {
                    message: "pathPrefix requires domain".to_string(),
                })?;
            return Ok(InvalidationScope::PathPrefix {
                domain: domain.to_string(),
                path_prefix: path_prefix.clone(),
            });
        }

        if let Some(domain) = &request.domain {
            return Ok(InvalidationScope::Domain {
                domain: domain.clone(),
            });
        }

        if let Some(project) = &request.project {
            return Ok(InvalidationScope::Project {
                project: project.clone(),
            });
        }

        if request.all {
            return Ok(InvalidationScope::All);
        }

        Err(ResolveError::InvalidRequest {
            message: "no scope fields present and 'all' flag not set".to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    struct FixedDirectory {
        contents: HashMap<(String, String), ContentKind>,
    }

    impl FixedDirectory {
        fn new(entries: &[(&str, &str, ContentKind)]) -> Arc<Self> {
            Arc::new(Self {
                contents: entries
                    .iter()
                    .map(|(p, c, k)| ((p.to_string(), c.to_string()), *k))
                    .collect(),
            })
        }
    }

    #[async_trait]
    impl ContentDirectory for FixedDirectory {
        async fn classify(&self, project: &str, content_id: &str) -> Option<ContentKind> {
            self.contents
                .get(&(project.to_string(), content_id.to_string()))
                .copied()
        }

        async fn projects(&self) -> Vec<String> {
            vec!["p1".to_string()]
        }
    }

    fn resolver() -> ScopeResolver {
        ScopeResolver::new(FixedDirectory::new(&[
            ("p1", "c1", ContentKind::Item),
            ("p1", "s1", ContentKind::SiteRoot),
        ]))
    }

    #[tokio::test]
    async fn leaf_content_resolves_to_content_scope() {
        let request = PurgeRequest {
            project: Some("p1".to_string()),
            content_id: Some("c1".to_string()),
            ..Default::default()
        };
        let scope = resolver().resolve(&request).await.unwrap();
        assert_eq!(
            scope,
            InvalidationScope::Content {
                project: "p1".to_string(),
                content_id: "c1".to_string(),
            }
        );
    }

    #[tokio::test]
    async fn site_root_resolves_to_site_scope() {
        let request = PurgeRequest {
            project: Some("p1".to_string()),
            content_id: Some("s1".to_string()),
            ..Default::default()
        };
        let scope = resolver().resolve(&request).await.unwrap();
        assert_eq!(
            scope,
            InvalidationScope::Site {
                project: "p1".to_string(),
                site_id: "s1".to_string(),
            }
        );
    }

    #[tokio::test]
    async fn unknown_content_aborts_resolution() {
        let request = PurgeRequest {
            project: Some("p1".to_string()),
            content_id: Some("missing".to_string()),
            ..Default::default()
        };
        let err = resolver().resolve(&request).await.unwrap_err();
        assert!(matches!(err, ResolveError::NotFound { content_id } if content_id == "missing"));
    }

    #[tokio::test]
    async fn content_id_without_project_is_invalid() {
        let request = PurgeRequest {
            content_id: Some("c1".to_string()),
            ..Default::default()
        };
        let err = resolver().resolve(&request).await.unwrap_err();
        assert!(matches!(err, ResolveError::InvalidRequest { .. }));
    }

    #[tokio::test]
    async fn project_only_resolves_to_project_scope() {
        let scope = resolver()
            .resolve(&PurgeRequest::project("p1"))
            .await
            .unwrap();
        assert_eq!(
            scope,
            InvalidationScope::Project {
                project: "p1".to_string()
            }
        );
    }

    #[tokio::test]
    async fn explicit_site_id_resolves_without_lookup() {
        let request = PurgeRequest {
            project: Some("p1".to_string()),
            site_id: Some("s9".to_string()),
            ..Default::default()
        };
        let scope = resolver().resolve(&request).await.unwrap();
        assert_eq!(
            scope,
            InvalidationScope::Site {
                project: "p1".to_string(),
                site_id: "s9".to_string(),
            }
        );
    }

    #[tokio::test]
    async fn site_id_without_project_is_invalid() {
        let request = PurgeRequest {
            site_id: Some("s1".to_string()),
            ..Default::default()
        };
        let err = resolver().resolve(&request).await.unwrap_err();
        assert!(matches!(err, ResolveError::InvalidRequest { .. }));
    }

    #[tokio::test]
    async fn path_prefix_without_domain_is_invalid() {
        let request = PurgeRequest {
            path_prefix: Some("/news".to_string()),
            ..Default::default()
        };
        let err = resolver().resolve(&request).await.unwrap_err();
        assert!(matches!(err, ResolveError::InvalidRequest { .. }));
    }

    #[tokio::test]
    async fn path_prefix_with_domain_resolves() {
        let request = PurgeRequest {
            domain: Some("example.com".to_string()),
            path_prefix: Some("/news".to_string()),
            ..Default::default()
        };
        let scope = resolver().resolve(&request).await.unwrap();
        assert_eq!(
            scope,
            InvalidationScope::PathPrefix {
                domain: "example.com".to_string(),
                path_prefix: "/news".to_string(),
            }
        );
    }

    #[tokio::test]
    async fn domain_alone_resolves_to_domain_scope() {
        let request = PurgeRequest {
            domain: Some("example.com".to_string()),
            ..Default::default()
        };
        let scope = resolver().resolve(&request).await.unwrap();
        assert_eq!(
            scope,
            InvalidationScope::Domain {
                domain: "example.com".to_string()
            }
        );
    }

    #[tokio::test]
    async fn content_wins_over_domain_and_project() {
        // Most specific available scope wins.
        let request = PurgeRequest {
            project: Some("p1".to_string()),
            content_id: Some("c1".to_string()),
            domain: Some("example.com".to_string()),
            ..Default::default()
        };
        let scope = resolver().resolve(&request).await.unwrap();
        assert!(matches!(scope, InvalidationScope::Content { .. }));
    }

    #[tokio::test]
    async fn empty_request_is_rejected() {
        let err = resolver()
            .resolve(&PurgeRequest::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ResolveError::InvalidRequest { .. }));
    }

    #[tokio::test]
    async fn explicit_all_flag_resolves_to_all() {
        let scope = resolver().resolve(&PurgeRequest::all()).await.unwrap();
        assert_eq!(scope, InvalidationScope::All);
    }

    #[test]
    fn name_suffix_is_deterministic() {
        let a = InvalidationScope::Content {
            project: "p1".to_string(),
            content_id: "c1".to_string(),
        };
        let b = a.clone();
        assert_eq!(a.name_suffix(), b.name_suffix());
        assert_eq!(a.name_suffix().len(), 32);

        assert_eq!(InvalidationScope::All.name_suffix(), "all");
        assert_eq!(
            InvalidationScope::Project {
                project: "p1".to_string()
            }
            .name_suffix(),
            "p1"
        );
    }
}
