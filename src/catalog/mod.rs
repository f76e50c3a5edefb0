// src/catalog/mod.rs

//! Catalog domain model and capability traits
//!
//! The tracker never talks to a database or a git binary directly. The
//! persistent catalog, the repository cloner, the OLM OCI exporter and
//! the image store are external collaborators reached through the traits
//! defined here, which keeps the reconciliation engine testable against
//! in-memory implementations.

pub mod mock;

use std::collections::HashMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tempfile::TempDir;

use crate::cancel::CancellationToken;
use crate::error::{Error, Result};

/// Well-known file holding a repository's self-declared metadata
pub const REPOSITORY_METADATA_FILE: &str = "packdex-repo.yml";

/// URL prefix identifying repositories served from an OCI registry
pub const OCI_PREFIX: &str = "oci://";

/// The flavor of a repository, determining which source adapter parses it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum RepositoryKind {
    #[serde(rename = "falco")]
    Falco,
    #[default]
    #[serde(rename = "helm")]
    Helm,
    #[serde(rename = "helm-plugin")]
    HelmPlugin,
    #[serde(rename = "krew")]
    Krew,
    #[serde(rename = "olm")]
    Olm,
    #[serde(rename = "opa")]
    Opa,
    #[serde(rename = "tbaction")]
    TbAction,
}

impl RepositoryKind {
    /// Resolve a kind from its configuration name
    pub fn from_name(name: &str) -> Result<Self> {
        match name {
            "falco" => Ok(Self::Falco),
            "helm" => Ok(Self::Helm),
            "helm-plugin" => Ok(Self::HelmPlugin),
            "krew" => Ok(Self::Krew),
            "olm" => Ok(Self::Olm),
            "opa" => Ok(Self::Opa),
            "tbaction" => Ok(Self::TbAction),
            _ => Err(Error::ConfigError(format!("invalid repository kind: {name}"))),
        }
    }

    /// The configuration name of this kind
    pub fn name(&self) -> &'static str {
        match self {
            Self::Falco => "falco",
            Self::Helm => "helm",
            Self::HelmPlugin => "helm-plugin",
            Self::Krew => "krew",
            Self::Olm => "olm",
            Self::Opa => "opa",
            Self::TbAction => "tbaction",
        }
    }
}

impl std::fmt::Display for RepositoryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A named upstream source of packages
///
/// Read-only within one tracking pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Repository {
    pub repository_id: String,
    pub name: String,
    pub url: String,
    pub kind: RepositoryKind,
    /// Opaque upstream-version token from the previous pass
    #[serde(default)]
    pub digest: String,
    #[serde(default)]
    pub verified_publisher: bool,
    #[serde(default)]
    pub disabled: bool,
    #[serde(default)]
    pub auth_user: Option<String>,
    #[serde(default)]
    pub auth_pass: Option<String>,
}

impl Repository {
    /// Create a new repository descriptor
    pub fn new(repository_id: &str, name: &str, url: &str, kind: RepositoryKind) -> Self {
        Self {
            repository_id: repository_id.to_string(),
            name: name.to_string(),
            url: url.to_string(),
            kind,
            ..Self::default()
        }
    }

    /// Basic-auth credentials, when both parts are present
    pub fn credentials(&self) -> Option<(&str, &str)> {
        match (self.auth_user.as_deref(), self.auth_pass.as_deref()) {
            (Some(user), Some(pass)) => Some((user, pass)),
            _ => None,
        }
    }
}

/// Entry suppressing packages matched by name and version regex
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IgnoreEntry {
    pub name: String,
    /// Regular expression matched against the version; empty matches all
    #[serde(default)]
    pub version: String,
}

/// Optional manifest found at a well-known path in the repository
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryMetadata {
    /// Repository identity claimed by the metadata, used to assert the
    /// verified publisher status
    #[serde(rename = "repositoryID", default)]
    pub repository_id: Option<String>,
    #[serde(default)]
    pub ignore: Vec<IgnoreEntry>,
}

/// Named link attached to a package
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    pub name: String,
    pub url: String,
}

/// Package maintainer
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Maintainer {
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
}

/// One package version discovered in a repository
///
/// Created by a source adapter, consumed once by the reconciliation
/// engine. `(repository.repository_id, name, version)` is globally
/// unique; `version` must be strict SemVer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Package {
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub home_url: Option<String>,
    #[serde(default)]
    pub readme: Option<String>,
    #[serde(default)]
    pub license: Option<String>,
    #[serde(default)]
    pub provider: Option<String>,
    #[serde(default)]
    pub links: Vec<Link>,
    #[serde(default)]
    pub maintainers: Vec<Maintainer>,
    /// Identifier of the stored logo image, when one was fetched
    #[serde(default)]
    pub logo_image_id: Option<String>,
    /// Kind-specific payload (chart URLs, rules files, OLM channels, ...)
    #[serde(default)]
    pub data: Option<serde_json::Value>,
    pub repository: Repository,
}

/// Catalog-side repository operations consumed by the tracker
pub trait RepositoryManager: Send + Sync {
    fn get_by_name(&self, name: &str, include_credentials: bool) -> Result<Repository>;
    fn get_by_kind(&self, kind: RepositoryKind, include_credentials: bool) -> Result<Vec<Repository>>;
    fn get_all(&self, include_credentials: bool) -> Result<Vec<Repository>>;
    /// Current upstream-version token for the repository provided
    fn get_remote_digest(&self, repository: &Repository) -> Result<String>;
    fn update_digest(&self, repository_id: &str, digest: &str) -> Result<()>;
    /// Snapshot of `package key -> content digest` for the repository
    fn get_packages_digest(&self, repository_id: &str) -> Result<HashMap<String, String>>;
    /// Load repository metadata from a local path or URL
    fn get_metadata(&self, location: &str) -> Result<RepositoryMetadata>;
    fn set_verified_publisher(&self, repository_id: &str, verified: bool) -> Result<()>;
    fn set_last_tracking_results(&self, repository_id: &str, results: &str) -> Result<()>;
}

/// Catalog-side package operations consumed by the tracker
pub trait PackageManager: Send + Sync {
    fn register(&self, package: &Package) -> Result<()>;
    fn unregister(&self, package: &Package) -> Result<()>;
}

/// Produces a local copy of a git-backed repository
///
/// The returned `TempDir` owns the checkout; dropping it removes the
/// directory. The second element is the packages subpath within it.
pub trait RepositoryCloner: Send + Sync {
    fn clone_repository(
        &self,
        token: &CancellationToken,
        repository: &Repository,
    ) -> Result<(TempDir, PathBuf)>;
}

/// Exports an OLM repository from an OCI registry into a local directory
pub trait OlmOciExporter: Send + Sync {
    fn export_repository(&self, token: &CancellationToken, repository: &Repository) -> Result<TempDir>;
}

/// Downloads and stores package logos, returning the stored image id
pub trait ImageStore: Send + Sync {
    fn download_and_save_image(&self, url: &str) -> Result<String>;
}
