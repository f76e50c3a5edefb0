// src/tracker/mod.rs

//! Repository tracking engine
//!
//! One tracker pass reconciles the catalog with the packages actually
//! present in one upstream repository: it materializes the repository
//! through the kind-specific source adapter, registers newly discovered
//! package versions, unregisters the ones no longer published and
//! records per-repository diagnostics through the errors collector.
//!
//! `track_repositories` is the entry point of one tracker invocation: it
//! selects the repositories to process from configuration, fans the
//! passes out on a bounded worker pool and flushes the errors collector
//! once at the end.

pub mod errors;
pub mod ignore;
pub mod key;
pub mod selector;
pub mod sources;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use rayon::prelude::*;
use tempfile::TempDir;
use tracing::{debug, error, info, warn};

use crate::cancel::CancellationToken;
use crate::catalog::{
    ImageStore, OlmOciExporter, Package, PackageManager, Repository, RepositoryCloner,
    RepositoryKind, RepositoryManager, RepositoryMetadata, OCI_PREFIX, REPOSITORY_METADATA_FILE,
};
use crate::client::{scheme_is_http, url_join, RepositoryClient};
use crate::config::TrackerConfig;
use crate::error::{Error, Result};
use crate::ratelimit::RateLimiter;
use self::errors::ErrorsCollector;
use self::key::{build_key, parse_key};
use self::sources::{source_for_input, TrackerSourceInput, TrackerSourceServices};

/// Services a tracker invocation needs to perform its work
///
/// Everything the engine and the source adapters depend on is carried
/// explicitly in this bundle; there is no process-global state.
pub struct TrackerServices {
    pub repository_manager: Arc<dyn RepositoryManager>,
    pub package_manager: Arc<dyn PackageManager>,
    pub cloner: Arc<dyn RepositoryCloner>,
    pub olm_exporter: Arc<dyn OlmOciExporter>,
    pub image_store: Arc<dyn ImageStore>,
    pub errors: Arc<dyn ErrorsCollector>,
    pub http: Arc<RepositoryClient>,
    pub limiter: Arc<RateLimiter>,
    pub token: CancellationToken,
    pub config: TrackerConfig,
}

/// Run one tracker invocation over the configured repositories
///
/// Repository passes run in parallel on a pool of `num_workers` threads.
/// A failed pass is logged and recorded in the errors collector without
/// affecting sibling passes. The collector is flushed exactly once, after
/// all passes finished.
pub fn track_repositories(svc: &TrackerServices) -> Result<()> {
    let repositories = selector::get_repositories(&svc.config, svc.repository_manager.as_ref())?;
    info!("Tracking {} repositories", repositories.len());

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(svc.config.num_workers)
        .build()
        .map_err(|e| Error::TrackerError(format!("error creating worker pool: {e}")))?;
    pool.install(|| {
        repositories.par_iter().for_each(|repository| {
            if let Err(e) = Tracker::new(svc, repository).run() {
                let message = format!("error tracking repository {}: {e}", repository.name);
                error!("{message}");
                svc.errors.append(&repository.repository_id, &message);
            }
        });
    });

    svc.errors.flush();
    Ok(())
}

/// Tracks the packages available in one repository, registering and
/// unregistering them as needed
pub struct Tracker<'a> {
    svc: &'a TrackerServices,
    repository: &'a Repository,
}

impl<'a> Tracker<'a> {
    /// Create a new tracker for the repository provided
    pub fn new(svc: &'a TrackerServices, repository: &'a Repository) -> Self {
        Self { svc, repository }
    }

    /// Run one tracking pass
    pub fn run(&self) -> Result<()> {
        // Check if the repository has been updated since the last pass
        let remote_digest = self
            .svc
            .repository_manager
            .get_remote_digest(self.repository)
            .map_err(|e| Error::TrackerError(format!("error getting repository remote digest: {e}")))?;
        let bypass_digest_check = self.svc.config.bypass_digest_check;
        if !remote_digest.is_empty()
            && self.repository.digest == remote_digest
            && !bypass_digest_check
        {
            return Ok(());
        }

        debug!("Tracking repository {}", self.repository.name);
        self.svc.errors.init(&self.repository.repository_id);

        // Clone the repository when applicable and load its metadata.
        // The temp dir is owned here so the checkout is removed on every
        // exit path.
        let (tmp_dir, packages_path) = self
            .clone_repository()
            .map_err(|e| Error::TrackerError(format!("error cloning repository: {e}")))?;
        let base_path = match &tmp_dir {
            Some(tmp_dir) => tmp_dir.path().join(&packages_path),
            None => packages_path,
        };
        let metadata = self.repository_metadata(&base_path);

        // Load the packages already registered from this repository
        let packages_registered = self
            .svc
            .repository_manager
            .get_packages_digest(&self.repository.repository_id)
            .map_err(|e| Error::TrackerError(format!("error getting packages registered: {e}")))?;

        // Get the packages available in the repository
        let packages_available = self
            .packages_available(&base_path, &packages_registered)
            .map_err(|e| Error::TrackerError(format!("error getting packages available: {e}")))?;

        // Register available packages when needed
        for package in packages_available.values() {
            self.svc.token.check()?;

            let package_key = build_key(&package.name, &package.version);
            if packages_registered.contains_key(&package_key) && !bypass_digest_check {
                continue;
            }
            if self.should_ignore(metadata.as_ref(), &package.name, &package.version) {
                continue;
            }

            debug!("Registering package {} version {}", package.name, package.version);
            if let Err(e) = self.svc.package_manager.register(package) {
                self.warn(&format!(
                    "error registering package {} version {}: {e}",
                    package.name, package.version
                ));
            }
        }

        // Unregister packages not available anymore. Skipped entirely
        // when the adapter returned nothing, so a transient enumeration
        // failure cannot purge the whole repository.
        if !packages_available.is_empty() {
            for package_key in packages_registered.keys() {
                self.svc.token.check()?;

                let (name, version) = parse_key(package_key);
                if !packages_available.contains_key(package_key)
                    || self.should_ignore(metadata.as_ref(), &name, &version)
                {
                    debug!("Unregistering package {name} version {version}");
                    let package = Package {
                        name: name.clone(),
                        version: version.clone(),
                        repository: self.repository.clone(),
                        ..Package::default()
                    };
                    if let Err(e) = self.svc.package_manager.unregister(&package) {
                        self.warn(&format!(
                            "error unregistering package {name} version {version}: {e}"
                        ));
                    }
                }
            }
        }

        // Set the verified publisher flag when its value changed
        if let Err(e) = self.set_verified_publisher_flag(metadata.as_ref()) {
            self.warn(&format!("error setting verified publisher flag: {e}"));
        }

        // Update the repository digest when it changed. Best effort: a
        // failure here only means the repository is processed again next
        // time.
        if !remote_digest.is_empty() && remote_digest != self.repository.digest {
            if let Err(e) = self
                .svc
                .repository_manager
                .update_digest(&self.repository.repository_id, &remote_digest)
            {
                warn!("Error updating repository {} digest: {}", self.repository.name, e);
            }
        }

        Ok(())
    }

    /// Create a local copy of the repository when its kind requires one
    ///
    /// Returns the directory owning the copy and the packages subpath
    /// within it.
    fn clone_repository(&self) -> Result<(Option<TempDir>, PathBuf)> {
        match self.repository.kind {
            // Helm repositories are not cloned, the adapter fetches the
            // index over HTTP
            RepositoryKind::Helm => Ok((None, PathBuf::new())),
            RepositoryKind::Olm => {
                if self.repository.url.starts_with(OCI_PREFIX) {
                    let tmp_dir = self
                        .svc
                        .olm_exporter
                        .export_repository(&self.svc.token, self.repository)?;
                    Ok((Some(tmp_dir), PathBuf::new()))
                } else {
                    let (tmp_dir, packages_path) = self
                        .svc
                        .cloner
                        .clone_repository(&self.svc.token, self.repository)?;
                    Ok((Some(tmp_dir), packages_path))
                }
            }
            RepositoryKind::Falco
            | RepositoryKind::HelmPlugin
            | RepositoryKind::Krew
            | RepositoryKind::Opa
            | RepositoryKind::TbAction => {
                let (tmp_dir, packages_path) = self
                    .svc
                    .cloner
                    .clone_repository(&self.svc.token, self.repository)?;
                Ok((Some(tmp_dir), packages_path))
            }
        }
    }

    /// Load the repository's own metadata when available
    ///
    /// Absence or a parse failure is not an error: without metadata the
    /// ignore rules and the verified publisher matching are disabled.
    fn repository_metadata(&self, base_path: &Path) -> Option<RepositoryMetadata> {
        match self.repository.kind {
            RepositoryKind::Helm => {
                if scheme_is_http(&self.repository.url) {
                    let metadata_url = url_join(&self.repository.url, REPOSITORY_METADATA_FILE);
                    self.svc.repository_manager.get_metadata(&metadata_url).ok()
                } else {
                    None
                }
            }
            _ => {
                let metadata_path = base_path.join(REPOSITORY_METADATA_FILE);
                self.svc
                    .repository_manager
                    .get_metadata(&metadata_path.to_string_lossy())
                    .ok()
            }
        }
    }

    /// Enumerate the packages available through the kind-specific source
    /// adapter
    fn packages_available(
        &self,
        base_path: &Path,
        packages_registered: &HashMap<String, String>,
    ) -> Result<HashMap<String, Package>> {
        let input = TrackerSourceInput {
            repository: self.repository,
            packages_registered,
            base_path: base_path.to_path_buf(),
            svc: TrackerSourceServices {
                token: &self.svc.token,
                config: &self.svc.config,
                errors: self.svc.errors.as_ref(),
                http: &self.svc.http,
                image_store: self.svc.image_store.as_ref(),
                limiter: &self.svc.limiter,
            },
        };
        let source = source_for_input(&input);
        source.get_packages_available()
    }

    /// Write the verified publisher flag when the computed value differs
    /// from the repository's current one
    fn set_verified_publisher_flag(&self, metadata: Option<&RepositoryMetadata>) -> Result<()> {
        let verified = metadata
            .and_then(|md| md.repository_id.as_deref())
            .map(|id| id == self.repository.repository_id)
            .unwrap_or(false);
        if self.repository.verified_publisher != verified {
            self.svc
                .repository_manager
                .set_verified_publisher(&self.repository.repository_id, verified)?;
        }
        Ok(())
    }

    /// Check if the package provided is suppressed by the repository
    /// metadata
    fn should_ignore(
        &self,
        metadata: Option<&RepositoryMetadata>,
        name: &str,
        version: &str,
    ) -> bool {
        metadata
            .map(|md| {
                md.ignore
                    .iter()
                    .any(|entry| ignore::matches_entry(entry, name, version))
            })
            .unwrap_or(false)
    }

    /// Log a per-package error and record it in the errors collector
    fn warn(&self, message: &str) {
        warn!("{message}");
        self.svc
            .errors
            .append(&self.repository.repository_id, message);
    }
}
