// src/catalog/mock.rs

//! In-memory mock implementations of the catalog capability traits
//!
//! These mocks store state in memory and record every call, so the
//! reconciliation engine and the selector can be exercised without a
//! catalog, a git binary or network access.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::RwLock;

use tempfile::TempDir;

use super::{
    ImageStore, OlmOciExporter, Package, PackageManager, Repository, RepositoryCloner,
    RepositoryKind, RepositoryManager, RepositoryMetadata,
};
use crate::cancel::CancellationToken;
use crate::error::{Error, Result};

/// Calls recorded by `MockRepositoryManager`
#[derive(Debug, Default, Clone)]
pub struct RepositoryManagerCalls {
    pub get_by_name: Vec<String>,
    pub get_by_kind: Vec<RepositoryKind>,
    pub get_all: usize,
    pub get_remote_digest: Vec<String>,
    pub update_digest: Vec<(String, String)>,
    pub get_packages_digest: Vec<String>,
    pub get_metadata: Vec<String>,
    pub set_verified_publisher: Vec<(String, bool)>,
    pub set_last_tracking_results: Vec<(String, String)>,
}

#[derive(Default)]
struct RepositoryManagerState {
    repositories: Vec<Repository>,
    remote_digests: HashMap<String, String>,
    packages_digests: HashMap<String, HashMap<String, String>>,
    metadata: Option<RepositoryMetadata>,
    fail_get_remote_digest: bool,
    fail_update_digest: bool,
    calls: RepositoryManagerCalls,
}

/// In-memory repository manager recording every call
#[derive(Default)]
pub struct MockRepositoryManager {
    state: RwLock<RepositoryManagerState>,
}

impl MockRepositoryManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_repositories(repositories: Vec<Repository>) -> Self {
        let manager = Self::new();
        manager.state.write().unwrap().repositories = repositories;
        manager
    }

    pub fn set_remote_digest(&self, repository_id: &str, digest: &str) {
        self.state
            .write()
            .unwrap()
            .remote_digests
            .insert(repository_id.to_string(), digest.to_string());
    }

    pub fn set_packages_digest(&self, repository_id: &str, digest: HashMap<String, String>) {
        self.state
            .write()
            .unwrap()
            .packages_digests
            .insert(repository_id.to_string(), digest);
    }

    pub fn set_metadata(&self, metadata: RepositoryMetadata) {
        self.state.write().unwrap().metadata = Some(metadata);
    }

    pub fn fail_get_remote_digest(&self) {
        self.state.write().unwrap().fail_get_remote_digest = true;
    }

    pub fn fail_update_digest(&self) {
        self.state.write().unwrap().fail_update_digest = true;
    }

    pub fn calls(&self) -> RepositoryManagerCalls {
        self.state.read().unwrap().calls.clone()
    }
}

impl RepositoryManager for MockRepositoryManager {
    fn get_by_name(&self, name: &str, _include_credentials: bool) -> Result<Repository> {
        let mut state = self.state.write().unwrap();
        state.calls.get_by_name.push(name.to_string());
        state
            .repositories
            .iter()
            .find(|r| r.name == name)
            .cloned()
            .ok_or_else(|| Error::NotFoundError(format!("repository {name} not found")))
    }

    fn get_by_kind(&self, kind: RepositoryKind, _include_credentials: bool) -> Result<Vec<Repository>> {
        let mut state = self.state.write().unwrap();
        state.calls.get_by_kind.push(kind);
        Ok(state
            .repositories
            .iter()
            .filter(|r| r.kind == kind)
            .cloned()
            .collect())
    }

    fn get_all(&self, _include_credentials: bool) -> Result<Vec<Repository>> {
        let mut state = self.state.write().unwrap();
        state.calls.get_all += 1;
        Ok(state.repositories.clone())
    }

    fn get_remote_digest(&self, repository: &Repository) -> Result<String> {
        let mut state = self.state.write().unwrap();
        state
            .calls
            .get_remote_digest
            .push(repository.repository_id.clone());
        if state.fail_get_remote_digest {
            return Err(Error::DownloadError("mock remote digest failure".to_string()));
        }
        Ok(state
            .remote_digests
            .get(&repository.repository_id)
            .cloned()
            .unwrap_or_default())
    }

    fn update_digest(&self, repository_id: &str, digest: &str) -> Result<()> {
        let mut state = self.state.write().unwrap();
        state
            .calls
            .update_digest
            .push((repository_id.to_string(), digest.to_string()));
        if state.fail_update_digest {
            return Err(Error::TrackerError("mock update digest failure".to_string()));
        }
        Ok(())
    }

    fn get_packages_digest(&self, repository_id: &str) -> Result<HashMap<String, String>> {
        let mut state = self.state.write().unwrap();
        state
            .calls
            .get_packages_digest
            .push(repository_id.to_string());
        Ok(state
            .packages_digests
            .get(repository_id)
            .cloned()
            .unwrap_or_default())
    }

    fn get_metadata(&self, location: &str) -> Result<RepositoryMetadata> {
        let mut state = self.state.write().unwrap();
        state.calls.get_metadata.push(location.to_string());
        state
            .metadata
            .clone()
            .ok_or_else(|| Error::NotFoundError("metadata not found".to_string()))
    }

    fn set_verified_publisher(&self, repository_id: &str, verified: bool) -> Result<()> {
        let mut state = self.state.write().unwrap();
        state
            .calls
            .set_verified_publisher
            .push((repository_id.to_string(), verified));
        Ok(())
    }

    fn set_last_tracking_results(&self, repository_id: &str, results: &str) -> Result<()> {
        let mut state = self.state.write().unwrap();
        state
            .calls
            .set_last_tracking_results
            .push((repository_id.to_string(), results.to_string()));
        Ok(())
    }
}

#[derive(Default)]
struct PackageManagerState {
    registered: Vec<Package>,
    unregistered: Vec<Package>,
    fail_register: HashSet<String>,
    fail_unregister: HashSet<String>,
}

/// In-memory package manager recording register/unregister calls
#[derive(Default)]
pub struct MockPackageManager {
    state: RwLock<PackageManagerState>,
}

impl MockPackageManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `register` fail for the package name provided
    pub fn fail_register_for(&self, name: &str) {
        self.state
            .write()
            .unwrap()
            .fail_register
            .insert(name.to_string());
    }

    /// Make `unregister` fail for the package name provided
    pub fn fail_unregister_for(&self, name: &str) {
        self.state
            .write()
            .unwrap()
            .fail_unregister
            .insert(name.to_string());
    }

    pub fn registered(&self) -> Vec<Package> {
        self.state.read().unwrap().registered.clone()
    }

    pub fn unregistered(&self) -> Vec<Package> {
        self.state.read().unwrap().unregistered.clone()
    }
}

impl PackageManager for MockPackageManager {
    fn register(&self, package: &Package) -> Result<()> {
        let mut state = self.state.write().unwrap();
        if state.fail_register.contains(&package.name) {
            return Err(Error::TrackerError("mock register failure".to_string()));
        }
        state.registered.push(package.clone());
        Ok(())
    }

    fn unregister(&self, package: &Package) -> Result<()> {
        let mut state = self.state.write().unwrap();
        if state.fail_unregister.contains(&package.name) {
            return Err(Error::TrackerError("mock unregister failure".to_string()));
        }
        state.unregistered.push(package.clone());
        Ok(())
    }
}

type PopulateFn = dyn Fn(&Path) -> std::io::Result<()> + Send + Sync;

/// Cloner that materializes a fixture tree instead of running git
pub struct MockRepositoryCloner {
    packages_path: PathBuf,
    populate: Box<PopulateFn>,
    fail: bool,
    fail_names: RwLock<HashSet<String>>,
    calls: AtomicUsize,
}

impl MockRepositoryCloner {
    /// Create a cloner that fills each checkout with `populate`
    pub fn new<F>(packages_path: impl Into<PathBuf>, populate: F) -> Self
    where
        F: Fn(&Path) -> std::io::Result<()> + Send + Sync + 'static,
    {
        Self {
            packages_path: packages_path.into(),
            populate: Box::new(populate),
            fail: false,
            fail_names: RwLock::new(HashSet::new()),
            calls: AtomicUsize::new(0),
        }
    }

    /// Create a cloner that always fails
    pub fn failing() -> Self {
        let mut cloner = Self::new("", |_| Ok(()));
        cloner.fail = true;
        cloner
    }

    /// Make cloning fail for the repository name provided
    pub fn fail_for(&self, repository_name: &str) {
        self.fail_names
            .write()
            .unwrap()
            .insert(repository_name.to_string());
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::Relaxed)
    }
}

impl RepositoryCloner for MockRepositoryCloner {
    fn clone_repository(
        &self,
        token: &CancellationToken,
        repository: &Repository,
    ) -> Result<(TempDir, PathBuf)> {
        token.check()?;
        self.calls.fetch_add(1, Ordering::Relaxed);
        if self.fail || self.fail_names.read().unwrap().contains(&repository.name) {
            return Err(Error::DownloadError("mock clone failure".to_string()));
        }
        let tmp_dir = TempDir::new().map_err(|e| Error::IoError(format!("error creating temp dir: {e}")))?;
        (self.populate)(tmp_dir.path())
            .map_err(|e| Error::IoError(format!("error populating mock clone: {e}")))?;
        Ok((tmp_dir, self.packages_path.clone()))
    }
}

/// OLM OCI exporter that materializes a fixture tree
pub struct MockOlmOciExporter {
    populate: Box<PopulateFn>,
    calls: AtomicUsize,
}

impl MockOlmOciExporter {
    pub fn new<F>(populate: F) -> Self
    where
        F: Fn(&Path) -> std::io::Result<()> + Send + Sync + 'static,
    {
        Self {
            populate: Box::new(populate),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::Relaxed)
    }
}

impl OlmOciExporter for MockOlmOciExporter {
    fn export_repository(&self, token: &CancellationToken, _repository: &Repository) -> Result<TempDir> {
        token.check()?;
        self.calls.fetch_add(1, Ordering::Relaxed);
        let tmp_dir = TempDir::new().map_err(|e| Error::IoError(format!("error creating temp dir: {e}")))?;
        (self.populate)(tmp_dir.path())
            .map_err(|e| Error::IoError(format!("error populating mock export: {e}")))?;
        Ok(tmp_dir)
    }
}

/// Image store that records requested URLs and returns synthetic ids
#[derive(Default)]
pub struct MockImageStore {
    state: RwLock<Vec<String>>,
    fail: RwLock<bool>,
}

impl MockImageStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail(&self) {
        *self.fail.write().unwrap() = true;
    }

    pub fn requested_urls(&self) -> Vec<String> {
        self.state.read().unwrap().clone()
    }
}

impl ImageStore for MockImageStore {
    fn download_and_save_image(&self, url: &str) -> Result<String> {
        if *self.fail.read().unwrap() {
            return Err(Error::DownloadError("mock image store failure".to_string()));
        }
        let mut urls = self.state.write().unwrap();
        urls.push(url.to_string());
        Ok(format!("image-{}", urls.len()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repository_manager_lookup_and_calls() {
        let repo = Repository::new("id1", "repo1", "https://repo.io", RepositoryKind::Helm);
        let manager = MockRepositoryManager::with_repositories(vec![repo.clone()]);

        assert_eq!(manager.get_by_name("repo1", true).unwrap(), repo);
        assert!(manager.get_by_name("missing", true).is_err());
        assert_eq!(manager.get_by_kind(RepositoryKind::Helm, true).unwrap().len(), 1);
        assert_eq!(manager.get_all(true).unwrap().len(), 1);

        let calls = manager.calls();
        assert_eq!(calls.get_by_name, vec!["repo1", "missing"]);
        assert_eq!(calls.get_by_kind, vec![RepositoryKind::Helm]);
        assert_eq!(calls.get_all, 1);
    }

    #[test]
    fn test_package_manager_failure_injection() {
        let manager = MockPackageManager::new();
        manager.fail_register_for("bad");

        let mut package = Package {
            name: "good".to_string(),
            version: "1.0.0".to_string(),
            ..Package::default()
        };
        manager.register(&package).unwrap();

        package.name = "bad".to_string();
        assert!(manager.register(&package).is_err());
        assert_eq!(manager.registered().len(), 1);
    }

    #[test]
    fn test_cloner_materializes_fixture() {
        let cloner = MockRepositoryCloner::new("packages", |path| {
            std::fs::create_dir_all(path.join("packages"))?;
            std::fs::write(path.join("packages/marker"), b"ok")
        });
        let token = CancellationToken::new();
        let repo = Repository::new("id1", "repo1", "https://repo.io", RepositoryKind::Krew);

        let (tmp_dir, packages_path) = cloner.clone_repository(&token, &repo).unwrap();
        assert!(tmp_dir.path().join("packages/marker").exists());
        assert_eq!(packages_path, PathBuf::from("packages"));
        assert_eq!(cloner.call_count(), 1);
    }

    #[test]
    fn test_cloner_honors_cancellation() {
        let cloner = MockRepositoryCloner::new("", |_| Ok(()));
        let token = CancellationToken::new();
        token.cancel();
        let repo = Repository::new("id1", "repo1", "https://repo.io", RepositoryKind::Krew);
        assert!(matches!(cloner.clone_repository(&token, &repo), Err(Error::Cancelled)));
    }
}
