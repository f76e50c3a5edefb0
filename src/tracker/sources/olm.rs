// src/tracker/sources/olm.rs

//! Source adapter for OLM operators repositories
//!
//! Follows the operator-registry layout: one directory per operator
//! package holding a `*.package.yaml` channels manifest plus one
//! subdirectory per version containing the cluster service version
//! manifest the package fields are read from.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use super::{non_empty, TrackerSource, TrackerSourceInput};
use crate::catalog::{Link, Maintainer, Package};
use crate::error::{Error, Result};
use crate::tracker::key::build_key;

/// Suffix of the per-package channels manifest
const PACKAGE_MANIFEST_SUFFIX: &str = ".package.yaml";

/// Suffix of the per-version cluster service version manifest
const CSV_MANIFEST_SUFFIX: &str = ".clusterserviceversion.yaml";

/// Channels manifest of one operator package
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PackageManifest {
    #[serde(default)]
    package_name: String,
    #[serde(default, rename = "defaultChannel")]
    default_channel: String,
    #[serde(default)]
    channels: Vec<Channel>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Channel {
    #[serde(default)]
    name: String,
    #[serde(default, rename = "currentCSV")]
    current_csv: String,
}

/// Cluster service version manifest, the fields the tracker cares about
#[derive(Debug, Default, Deserialize)]
struct ClusterServiceVersion {
    #[serde(default)]
    metadata: CsvMetadata,
    #[serde(default)]
    spec: CsvSpec,
}

#[derive(Debug, Default, Deserialize)]
struct CsvMetadata {
    #[serde(default)]
    name: String,
    #[serde(default)]
    annotations: HashMap<String, String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CsvSpec {
    #[serde(default)]
    display_name: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    version: String,
    #[serde(default)]
    keywords: Vec<String>,
    #[serde(default)]
    links: Vec<CsvLink>,
    #[serde(default)]
    maintainers: Vec<CsvMaintainer>,
    #[serde(default)]
    provider: CsvProvider,
}

#[derive(Debug, Default, Deserialize)]
struct CsvLink {
    #[serde(default)]
    name: String,
    #[serde(default)]
    url: String,
}

#[derive(Debug, Default, Deserialize)]
struct CsvMaintainer {
    #[serde(default)]
    name: String,
    #[serde(default)]
    email: String,
}

#[derive(Debug, Default, Deserialize)]
struct CsvProvider {
    #[serde(default)]
    name: String,
}

/// OLM operators source adapter
pub struct OlmSource<'a> {
    i: &'a TrackerSourceInput<'a>,
}

impl<'a> OlmSource<'a> {
    pub fn new(i: &'a TrackerSourceInput<'a>) -> Self {
        Self { i }
    }

    /// Process one operator package directory
    fn process_package_dir(
        &self,
        package_dir: &Path,
        packages_available: &mut HashMap<String, Package>,
    ) -> Result<()> {
        // The channels manifest identifies an operator package directory
        let manifest_path = match find_with_suffix(package_dir, PACKAGE_MANIFEST_SUFFIX) {
            Some(path) => path,
            None => return Ok(()),
        };
        let data = match fs::read_to_string(&manifest_path) {
            Ok(data) => data,
            Err(e) => {
                self.i.warn(&format!("error reading package manifest file: {e}"));
                return Ok(());
            }
        };
        let manifest: PackageManifest = match serde_yaml::from_str(&data) {
            Ok(manifest) => manifest,
            Err(e) => {
                self.i.warn(&format!("error unmarshaling package manifest file: {e}"));
                return Ok(());
            }
        };
        if manifest.package_name.is_empty() {
            self.i.warn(&format!(
                "package manifest {} has no package name",
                manifest_path.display()
            ));
            return Ok(());
        }

        let entries = match fs::read_dir(package_dir) {
            Ok(entries) => entries,
            Err(e) => {
                self.i.warn(&format!("error reading package versions: {e}"));
                return Ok(());
            }
        };
        for entry in entries.flatten() {
            self.i.svc.token.check()?;

            if !entry.file_type().map(|t| t.is_dir()).unwrap_or(false) {
                continue;
            }
            if let Some(package) = self.prepare_package(&manifest, &entry.path()) {
                packages_available.insert(build_key(&package.name, &package.version), package);
            }
        }

        Ok(())
    }

    /// Build a package version from the CSV manifest in the version
    /// directory provided
    fn prepare_package(&self, manifest: &PackageManifest, version_dir: &Path) -> Option<Package> {
        let csv_path = find_with_suffix(version_dir, CSV_MANIFEST_SUFFIX)?;
        let data = match fs::read_to_string(&csv_path) {
            Ok(data) => data,
            Err(e) => {
                self.i.warn(&format!("error reading cluster service version file: {e}"));
                return None;
            }
        };
        let csv: ClusterServiceVersion = match serde_yaml::from_str(&data) {
            Ok(csv) => csv,
            Err(e) => {
                self.i.warn(&format!("error unmarshaling cluster service version file: {e}"));
                return None;
            }
        };
        if let Err(e) = semver::Version::parse(&csv.spec.version) {
            self.i.warn(&format!(
                "invalid package {} version ({}): {e}",
                manifest.package_name, csv.spec.version
            ));
            return None;
        }

        let channels: Vec<serde_json::Value> = manifest
            .channels
            .iter()
            .map(|c| serde_json::json!({ "name": c.name, "currentCSV": c.current_csv }))
            .collect();

        Some(Package {
            name: manifest.package_name.clone(),
            version: csv.spec.version.clone(),
            display_name: non_empty(csv.spec.display_name),
            description: csv.metadata.annotations.get("description").cloned(),
            keywords: csv.spec.keywords,
            readme: non_empty(csv.spec.description),
            provider: non_empty(csv.spec.provider.name),
            links: csv
                .spec
                .links
                .into_iter()
                .map(|l| Link {
                    name: l.name,
                    url: l.url,
                })
                .collect(),
            maintainers: csv
                .spec
                .maintainers
                .into_iter()
                .map(|m| Maintainer {
                    name: m.name,
                    email: non_empty(m.email),
                })
                .collect(),
            data: Some(serde_json::json!({
                "csvName": csv.metadata.name,
                "channels": channels,
                "defaultChannel": manifest.default_channel,
            })),
            repository: self.i.repository.clone(),
            ..Package::default()
        })
    }
}

impl TrackerSource for OlmSource<'_> {
    fn get_packages_available(&self) -> Result<HashMap<String, Package>> {
        let mut packages_available = HashMap::new();

        let entries = fs::read_dir(&self.i.base_path)
            .map_err(|e| Error::IoError(format!("error reading packages directory: {e}")))?;
        for entry in entries.flatten() {
            self.i.svc.token.check()?;

            if !entry.file_type().map(|t| t.is_dir()).unwrap_or(false) {
                continue;
            }
            self.process_package_dir(&entry.path(), &mut packages_available)?;
        }

        Ok(packages_available)
    }
}

/// Find a regular file in `dir` whose name ends with `suffix`
fn find_with_suffix(dir: &Path, suffix: &str) -> Option<PathBuf> {
    let entries = fs::read_dir(dir).ok()?;
    for entry in entries.flatten() {
        if !entry.file_type().map(|t| t.is_file()).unwrap_or(false) {
            continue;
        }
        if entry.file_name().to_string_lossy().ends_with(suffix) {
            return Some(entry.path());
        }
    }
    None
}
