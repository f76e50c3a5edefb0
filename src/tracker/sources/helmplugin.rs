// src/tracker/sources/helmplugin.rs

//! Source adapter for Helm plugins repositories
//!
//! Each immediate subdirectory of the base path holding a `plugin.yaml`
//! manifest is one package version. README and license files next to the
//! manifest enrich the package.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use serde::Deserialize;

use super::{non_empty, TrackerSource, TrackerSourceInput};
use crate::catalog::{Link, Package};
use crate::error::{Error, Result};
use crate::license;
use crate::tracker::key::build_key;

/// Name of the manifest file identifying a Helm plugin
const PLUGIN_MANIFEST_FILE: &str = "plugin.yaml";

/// Helm plugin manifest, the fields the tracker cares about
#[derive(Debug, Default, Deserialize)]
struct PluginManifest {
    #[serde(default)]
    name: String,
    #[serde(default)]
    version: String,
    #[serde(default)]
    description: String,
}

/// Helm plugins source adapter
pub struct HelmPluginSource<'a> {
    i: &'a TrackerSourceInput<'a>,
}

impl<'a> HelmPluginSource<'a> {
    pub fn new(i: &'a TrackerSourceInput<'a>) -> Self {
        Self { i }
    }

    /// Build a package version from the plugin manifest and the files in
    /// the directory provided
    fn prepare_package(&self, manifest: PluginManifest, plugin_path: &Path) -> Package {
        let mut package = Package {
            name: manifest.name,
            version: manifest.version,
            description: non_empty(manifest.description),
            keywords: vec!["helm".to_string(), "helm-plugin".to_string()],
            links: vec![Link {
                name: "Source".to_string(),
                url: self.i.repository.url.clone(),
            }],
            repository: self.i.repository.clone(),
            ..Package::default()
        };

        if let Ok(readme) = fs::read_to_string(plugin_path.join("README.md")) {
            package.readme = Some(readme);
        }
        package.license = license::detect_in_dir(plugin_path);

        package
    }
}

impl TrackerSource for HelmPluginSource<'_> {
    fn get_packages_available(&self) -> Result<HashMap<String, Package>> {
        let mut packages_available = HashMap::new();

        let entries = fs::read_dir(&self.i.base_path)
            .map_err(|e| Error::IoError(format!("error reading plugins directory: {e}")))?;
        for entry in entries.flatten() {
            self.i.svc.token.check()?;

            if !entry.file_type().map(|t| t.is_dir()).unwrap_or(false) {
                continue;
            }
            let plugin_path = entry.path();

            let data = match fs::read_to_string(plugin_path.join(PLUGIN_MANIFEST_FILE)) {
                Ok(data) => data,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => {
                    self.i.warn(&format!("error reading plugin metadata file: {e}"));
                    continue;
                }
            };
            let manifest: PluginManifest = match serde_yaml::from_str(&data) {
                Ok(manifest) => manifest,
                Err(e) => {
                    self.i.warn(&format!("error unmarshaling plugin metadata file: {e}"));
                    continue;
                }
            };
            if let Err(e) = semver::Version::parse(&manifest.version) {
                self.i.warn(&format!(
                    "invalid package {} version ({}): {e}",
                    manifest.name, manifest.version
                ));
                continue;
            }

            let package = self.prepare_package(manifest, &plugin_path);
            packages_available.insert(build_key(&package.name, &package.version), package);
        }

        Ok(packages_available)
    }
}
