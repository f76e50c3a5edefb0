// src/tracker/sources/mod.rs

//! Source adapters
//!
//! One adapter per repository kind. Each adapter enumerates the packages
//! available in a local materialization of the repository (or, for Helm,
//! in the remote index) and returns them keyed by the canonical package
//! key. A fatal error means enumeration was impossible; anything wrong
//! with an individual package is reported to the errors collector and
//! the package is skipped.

pub mod falco;
pub mod generic;
pub mod helm;
pub mod helmplugin;
pub mod krew;
pub mod olm;

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::LazyLock;

use regex::Regex;
use tracing::warn;

use crate::cancel::CancellationToken;
use crate::catalog::{ImageStore, Package, Repository, RepositoryKind};
use crate::client::RepositoryClient;
use crate::config::TrackerConfig;
use crate::error::Result;
use crate::ratelimit::RateLimiter;
use crate::tracker::errors::ErrorsCollector;

/// The one grandfathered Falco repository still using the legacy
/// cloud-native-security-hub layout
pub const CLOUD_NATIVE_SECURITY_HUB_URL: &str =
    "https://github.com/falcosecurity/cloud-native-security-hub/resources/falco";

/// Captures `{base, provider, subpath}` from a git repository URL
static GIT_REPO_URL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(https://(github|gitlab)\.com/[^/]+/[^/]+)/?(.*)$").unwrap());

/// Per-provider path segment used to link to a file at the default branch
const GIT_PROVIDERS: &[(&str, &str)] = &[("github", "blob/master"), ("gitlab", "-/blob/master")];

/// Enumerates the packages available in one repository
pub trait TrackerSource {
    /// Return the available packages keyed by their canonical key
    fn get_packages_available(&self) -> Result<HashMap<String, Package>>;
}

/// Ambient services exposed to source adapters
pub struct TrackerSourceServices<'a> {
    pub token: &'a CancellationToken,
    pub config: &'a TrackerConfig,
    pub errors: &'a dyn ErrorsCollector,
    pub http: &'a RepositoryClient,
    pub image_store: &'a dyn ImageStore,
    pub limiter: &'a RateLimiter,
}

/// Input provided to a source adapter for one repository pass
pub struct TrackerSourceInput<'a> {
    pub repository: &'a Repository,
    /// Snapshot of `package key -> digest` already registered in the
    /// catalog, so adapters can skip expensive enrichment for known
    /// versions
    pub packages_registered: &'a HashMap<String, String>,
    /// Local directory holding the repository's packages (empty for
    /// kinds that are not cloned)
    pub base_path: PathBuf,
    pub svc: TrackerSourceServices<'a>,
}

impl TrackerSourceInput<'_> {
    /// Log a per-package error and record it in the errors collector
    pub fn warn(&self, message: &str) {
        warn!("{message}");
        self.svc
            .errors
            .append(&self.repository.repository_id, message);
    }
}

/// Create the source adapter for the repository in the input provided
pub fn source_for_input<'a>(input: &'a TrackerSourceInput<'a>) -> Box<dyn TrackerSource + 'a> {
    match input.repository.kind {
        RepositoryKind::Falco => {
            // Legacy layout kept working for the one repository that
            // still uses it; everything else goes through the generic
            // adapter.
            if input.repository.url == CLOUD_NATIVE_SECURITY_HUB_URL {
                Box::new(falco::FalcoSource::new(input))
            } else {
                Box::new(generic::GenericSource::new(input))
            }
        }
        RepositoryKind::Helm => Box::new(helm::HelmSource::new(input)),
        RepositoryKind::HelmPlugin => Box::new(helmplugin::HelmPluginSource::new(input)),
        RepositoryKind::Krew => Box::new(krew::KrewSource::new(input)),
        RepositoryKind::Olm => Box::new(olm::OlmSource::new(input)),
        RepositoryKind::Opa | RepositoryKind::TbAction => {
            Box::new(generic::GenericSource::new(input))
        }
    }
}

/// Convert an empty string into `None`
pub(crate) fn non_empty(value: String) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}

/// Build a browseable source URL for a file within a git repository
///
/// Returns `None` when the repository URL does not belong to a known git
/// provider. The provider table maps each provider to its blob path
/// segment, so adding a provider requires no engine changes.
pub fn git_source_url(repository_url: &str, package_path: &str) -> Option<String> {
    let caps = GIT_REPO_URL_RE.captures(repository_url)?;
    let base = caps.get(1)?.as_str();
    let provider = caps.get(2)?.as_str();
    let subpath = caps
        .get(3)
        .map(|m| m.as_str().trim_end_matches('/'))
        .unwrap_or("");
    let blob_path = GIT_PROVIDERS
        .iter()
        .find(|(name, _)| *name == provider)
        .map(|(_, blob)| *blob)?;

    let mut url = format!("{base}/{blob_path}");
    if !subpath.is_empty() {
        url.push('/');
        url.push_str(subpath);
    }
    let package_path = package_path.trim_start_matches('/');
    if !package_path.is_empty() {
        url.push('/');
        url.push_str(package_path);
    }
    Some(url)
}

#[cfg(test)]
pub(crate) mod testutil {
    use std::collections::HashMap;
    use std::path::Path;
    use std::time::Duration;

    use super::{TrackerSourceInput, TrackerSourceServices};
    use crate::cancel::CancellationToken;
    use crate::catalog::mock::MockImageStore;
    use crate::catalog::{Repository, RepositoryKind};
    use crate::client::RepositoryClient;
    use crate::config::TrackerConfig;
    use crate::ratelimit::RateLimiter;
    use crate::tracker::errors::{ErrorsCollector, NoopErrorsCollector};

    /// Owns everything a `TrackerSourceInput` borrows
    pub(crate) struct SourceFixture {
        pub repository: Repository,
        pub registered: HashMap<String, String>,
        pub token: CancellationToken,
        pub config: TrackerConfig,
        pub errors: Box<dyn ErrorsCollector>,
        pub http: RepositoryClient,
        pub image_store: MockImageStore,
        pub limiter: RateLimiter,
    }

    impl SourceFixture {
        pub fn new(kind: RepositoryKind) -> Self {
            Self {
                repository: Repository::new(
                    "repo-id",
                    "test-repo",
                    "https://github.com/org/repo",
                    kind,
                ),
                registered: HashMap::new(),
                token: CancellationToken::new(),
                config: TrackerConfig::default(),
                errors: Box::new(NoopErrorsCollector),
                http: RepositoryClient::new().unwrap(),
                image_store: MockImageStore::new(),
                limiter: RateLimiter::new(Duration::from_millis(0)),
            }
        }

        pub fn input(&self, base_path: &Path) -> TrackerSourceInput<'_> {
            TrackerSourceInput {
                repository: &self.repository,
                packages_registered: &self.registered,
                base_path: base_path.to_path_buf(),
                svc: TrackerSourceServices {
                    token: &self.token,
                    config: &self.config,
                    errors: self.errors.as_ref(),
                    http: &self.http,
                    image_store: &self.image_store,
                    limiter: &self.limiter,
                },
            }
        }
    }
}
