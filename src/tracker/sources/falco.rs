// src/tracker/sources/falco.rs

//! Source adapter for legacy Falco rules repositories
//!
//! Walks the base path looking for rules manifests (`*.yaml` files with
//! `kind: FalcoRules`), one package version per file. The manifest is
//! the package: the raw rules travel in the package data.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use walkdir::WalkDir;

use super::{git_source_url, non_empty, TrackerSource, TrackerSourceInput};
use crate::catalog::{Link, Package};
use crate::error::Result;
use crate::tracker::key::build_key;

/// Manifest describing one Falco rules package version
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RulesManifest {
    #[serde(default)]
    kind: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    short_description: String,
    #[serde(default)]
    version: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    keywords: Vec<String>,
    #[serde(default)]
    vendor: String,
    #[serde(default)]
    rules: Vec<Rule>,
}

/// One raw rules document within a manifest
#[derive(Debug, Default, Serialize, Deserialize)]
struct Rule {
    #[serde(default)]
    raw: String,
}

/// Falco rules source adapter
pub struct FalcoSource<'a> {
    i: &'a TrackerSourceInput<'a>,
}

impl<'a> FalcoSource<'a> {
    pub fn new(i: &'a TrackerSourceInput<'a>) -> Self {
        Self { i }
    }

    /// Build a package version from the rules manifest provided
    fn prepare_package(&self, manifest: RulesManifest, manifest_path: &Path) -> Package {
        let mut links = Vec::new();
        let relative_path = manifest_path
            .strip_prefix(&self.i.base_path)
            .unwrap_or(manifest_path)
            .to_string_lossy()
            .into_owned();
        if let Some(source_url) = git_source_url(&self.i.repository.url, &relative_path) {
            links.push(Link {
                name: "source".to_string(),
                url: source_url,
            });
        }

        Package {
            name: manifest.name,
            version: manifest.version,
            description: non_empty(manifest.short_description),
            keywords: manifest.keywords,
            readme: non_empty(manifest.description),
            provider: non_empty(manifest.vendor),
            links,
            data: Some(serde_json::json!({ "rules": manifest.rules })),
            repository: self.i.repository.clone(),
            ..Package::default()
        }
    }
}

impl TrackerSource for FalcoSource<'_> {
    fn get_packages_available(&self) -> Result<HashMap<String, Package>> {
        let mut packages_available = HashMap::new();

        for entry in WalkDir::new(&self.i.base_path) {
            self.i.svc.token.check()?;

            // Skip paths that cannot be visited and anything that is not
            // a rules file
            let entry = match entry {
                Ok(entry) => entry,
                Err(_) => continue,
            };
            if !entry.file_type().is_file() {
                continue;
            }
            if entry.path().extension().and_then(|e| e.to_str()) != Some("yaml") {
                continue;
            }

            let data = match fs::read_to_string(entry.path()) {
                Ok(data) => data,
                Err(e) => {
                    self.i.warn(&format!("error reading rules metadata file: {e}"));
                    continue;
                }
            };
            let manifest: RulesManifest = match serde_yaml::from_str(&data) {
                Ok(manifest) => manifest,
                Err(e) => {
                    self.i.warn(&format!("error unmarshaling rules metadata file: {e}"));
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

            // Only Falco rules are supported
            if manifest.kind != "FalcoRules" {
                continue;
            }

            let package = self.prepare_package(manifest, entry.path());
            packages_available.insert(build_key(&package.name, &package.version), package);
        }

        Ok(packages_available)
    }
}
