// src/tracker/sources/generic.rs

//! Generic source adapter
//!
//! Handles the repository kinds that share the plain directory layout:
//! one directory per package, one subdirectory per version, each version
//! holding a package manifest file. Used for OPA policies, Tinkerbell
//! actions and Falco rules repositories that moved off the legacy
//! layout.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use serde::Deserialize;
use serde_json::json;
use walkdir::WalkDir;

use super::{git_source_url, non_empty, TrackerSource, TrackerSourceInput};
use crate::catalog::{Link, Maintainer, Package, RepositoryKind};
use crate::error::{Error, Result};
use crate::license;
use crate::tracker::key::build_key;

/// Name of the per-version package manifest file
pub const PACKAGE_METADATA_FILE: &str = "packdex-pkg.yml";

/// Package manifest consumed by the generic adapter
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PackageManifest {
    #[serde(default)]
    name: String,
    #[serde(default)]
    version: String,
    #[serde(default)]
    display_name: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    keywords: Vec<String>,
    #[serde(default)]
    home_url: String,
    #[serde(default)]
    license: String,
    #[serde(default)]
    provider: String,
    #[serde(default)]
    links: Vec<Link>,
    #[serde(default)]
    maintainers: Vec<Maintainer>,
}

/// Generic source adapter
pub struct GenericSource<'a> {
    i: &'a TrackerSourceInput<'a>,
}

impl<'a> GenericSource<'a> {
    pub fn new(i: &'a TrackerSourceInput<'a>) -> Self {
        Self { i }
    }

    /// Process one version directory of one package
    fn prepare_package(&self, version_dir: &Path) -> Option<Package> {
        let manifest_path = version_dir.join(PACKAGE_METADATA_FILE);
        if !manifest_path.is_file() {
            return None;
        }

        let data = match fs::read_to_string(&manifest_path) {
            Ok(data) => data,
            Err(e) => {
                self.i.warn(&format!("error reading package metadata file: {e}"));
                return None;
            }
        };
        let manifest: PackageManifest = match serde_yaml::from_str(&data) {
            Ok(manifest) => manifest,
            Err(e) => {
                self.i.warn(&format!("error unmarshaling package metadata file: {e}"));
                return None;
            }
        };
        if manifest.name.is_empty() {
            self.i.warn(&format!(
                "package metadata file {} has no name",
                manifest_path.display()
            ));
            return None;
        }
        if let Err(e) = semver::Version::parse(&manifest.version) {
            self.i.warn(&format!(
                "invalid package {} version ({}): {e}",
                manifest.name, manifest.version
            ));
            return None;
        }

        let mut links = manifest.links;
        let relative_path = version_dir
            .strip_prefix(&self.i.base_path)
            .unwrap_or(version_dir)
            .to_string_lossy()
            .into_owned();
        if let Some(source_url) = git_source_url(&self.i.repository.url, &relative_path) {
            links.push(Link {
                name: "source".to_string(),
                url: source_url,
            });
        }

        let mut keywords = default_keywords(self.i.repository.kind);
        keywords.extend(manifest.keywords);

        let mut package = Package {
            name: manifest.name,
            version: manifest.version,
            display_name: non_empty(manifest.display_name),
            description: non_empty(manifest.description),
            keywords,
            home_url: non_empty(manifest.home_url),
            license: non_empty(manifest.license),
            provider: non_empty(manifest.provider),
            links,
            maintainers: manifest.maintainers,
            data: self.package_content(version_dir),
            repository: self.i.repository.clone(),
            ..Package::default()
        };

        if let Ok(readme) = fs::read_to_string(version_dir.join("README.md")) {
            package.readme = Some(readme);
        }
        if package.license.is_none() {
            package.license = license::detect_in_dir(version_dir);
        }

        Some(package)
    }

    /// Bundle the kind-specific content files of a package version
    fn package_content(&self, version_dir: &Path) -> Option<serde_json::Value> {
        match self.i.repository.kind {
            RepositoryKind::Opa => {
                let mut policies = serde_json::Map::new();
                for entry in WalkDir::new(version_dir).into_iter().flatten() {
                    if !entry.file_type().is_file() {
                        continue;
                    }
                    if entry.path().extension().and_then(|e| e.to_str()) != Some("rego") {
                        continue;
                    }
                    if let Ok(content) = fs::read_to_string(entry.path()) {
                        let name = entry
                            .path()
                            .strip_prefix(version_dir)
                            .unwrap_or(entry.path())
                            .to_string_lossy()
                            .into_owned();
                        policies.insert(name, json!(content));
                    }
                }
                if policies.is_empty() {
                    None
                } else {
                    Some(json!({ "policies": policies }))
                }
            }
            RepositoryKind::Falco => {
                let mut rules = Vec::new();
                for entry in WalkDir::new(version_dir).into_iter().flatten() {
                    if !entry.file_type().is_file() {
                        continue;
                    }
                    if entry.path().extension().and_then(|e| e.to_str()) != Some("yaml") {
                        continue;
                    }
                    if let Ok(content) = fs::read_to_string(entry.path()) {
                        rules.push(json!({ "raw": content }));
                    }
                }
                if rules.is_empty() {
                    None
                } else {
                    Some(json!({ "rules": rules }))
                }
            }
            _ => None,
        }
    }
}

impl TrackerSource for GenericSource<'_> {
    fn get_packages_available(&self) -> Result<HashMap<String, Package>> {
        let mut packages_available = HashMap::new();

        let entries = fs::read_dir(&self.i.base_path)
            .map_err(|e| Error::IoError(format!("error reading packages directory: {e}")))?;
        for entry in entries.flatten() {
            self.i.svc.token.check()?;

            if !entry.file_type().map(|t| t.is_dir()).unwrap_or(false) {
                continue;
            }
            let version_entries = match fs::read_dir(entry.path()) {
                Ok(entries) => entries,
                Err(e) => {
                    self.i.warn(&format!("error reading package versions: {e}"));
                    continue;
                }
            };
            for version_entry in version_entries.flatten() {
                self.i.svc.token.check()?;

                if !version_entry.file_type().map(|t| t.is_dir()).unwrap_or(false) {
                    continue;
                }
                if let Some(package) = self.prepare_package(&version_entry.path()) {
                    packages_available.insert(build_key(&package.name, &package.version), package);
                }
            }
        }

        Ok(packages_available)
    }
}

/// Keywords every package of the kind provided starts with
fn default_keywords(kind: RepositoryKind) -> Vec<String> {
    match kind {
        RepositoryKind::Falco => vec!["falco".to_string()],
        RepositoryKind::Opa => vec!["opa".to_string()],
        RepositoryKind::TbAction => vec!["tinkerbell".to_string()],
        _ => Vec::new(),
    }
}
