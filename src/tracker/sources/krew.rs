// src/tracker/sources/krew.rs

//! Source adapter for Krew plugin index repositories
//!
//! Krew indexes keep one manifest per plugin in a flat `plugins/`
//! directory. The manifest itself carries little catalog-facing
//! information, so packages are enriched from well-known annotations.

use std::collections::HashMap;
use std::fs;

use serde::Deserialize;

use super::{non_empty, TrackerSource, TrackerSourceInput};
use crate::catalog::{Link, Maintainer, Package};
use crate::error::{Error, Result};
use crate::tracker::key::build_key;

const DISPLAY_NAME_ANNOTATION: &str = "packdex.io/displayName";
const KEYWORDS_ANNOTATION: &str = "packdex.io/keywords";
const LICENSE_ANNOTATION: &str = "packdex.io/license";
const LINKS_ANNOTATION: &str = "packdex.io/links";
const MAINTAINERS_ANNOTATION: &str = "packdex.io/maintainers";
const PROVIDER_ANNOTATION: &str = "packdex.io/provider";
const README_ANNOTATION: &str = "packdex.io/readme";

/// Krew plugin manifest, the fields the tracker cares about
#[derive(Debug, Default, Deserialize)]
struct PluginManifest {
    #[serde(default)]
    metadata: PluginMetadata,
    #[serde(default)]
    spec: PluginSpec,
}

#[derive(Debug, Default, Deserialize)]
struct PluginMetadata {
    #[serde(default)]
    name: String,
    #[serde(default)]
    annotations: HashMap<String, String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PluginSpec {
    #[serde(default)]
    version: String,
    #[serde(default)]
    short_description: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    homepage: String,
}

/// Krew plugins source adapter
pub struct KrewSource<'a> {
    i: &'a TrackerSourceInput<'a>,
}

impl<'a> KrewSource<'a> {
    pub fn new(i: &'a TrackerSourceInput<'a>) -> Self {
        Self { i }
    }

    /// Build a package version from the plugin manifest provided
    fn prepare_package(&self, manifest: PluginManifest) -> Result<Package> {
        let name = manifest.metadata.name;

        // Krew versions carry a leading v; normalize through the parsed
        // representation
        let version = semver::Version::parse(manifest.spec.version.trim_start_matches('v'))
            .map_err(|e| {
                Error::ParseError(format!(
                    "invalid package ({name}) version ({}): {e}",
                    manifest.spec.version
                ))
            })?
            .to_string();

        let mut package = Package {
            name: name.clone(),
            version: version.clone(),
            description: non_empty(manifest.spec.short_description),
            home_url: non_empty(manifest.spec.homepage),
            readme: non_empty(manifest.spec.description),
            repository: self.i.repository.clone(),
            ..Package::default()
        };

        enrich_package_from_annotations(&mut package, &manifest.metadata.annotations)
            .map_err(|e| Error::ParseError(format!("error enriching package {name} version {version}: {e}")))?;

        Ok(package)
    }
}

impl TrackerSource for KrewSource<'_> {
    fn get_packages_available(&self) -> Result<HashMap<String, Package>> {
        let mut packages_available = HashMap::new();

        let plugins_path = self.i.base_path.join("plugins");
        let entries = fs::read_dir(&plugins_path)
            .map_err(|e| Error::IoError(format!("error reading plugins directory: {e}")))?;
        for entry in entries.flatten() {
            self.i.svc.token.check()?;

            if !entry.file_type().map(|t| t.is_file()).unwrap_or(false) {
                continue;
            }
            if entry.path().extension().and_then(|e| e.to_str()) != Some("yaml") {
                continue;
            }

            let data = match fs::read_to_string(entry.path()) {
                Ok(data) => data,
                Err(e) => {
                    self.i.warn(&format!("error reading plugin manifest file: {e}"));
                    continue;
                }
            };
            let manifest: PluginManifest = match serde_yaml::from_str(&data) {
                Ok(manifest) => manifest,
                Err(e) => {
                    self.i.warn(&format!("error unmarshaling plugin manifest file: {e}"));
                    continue;
                }
            };

            let package = match self.prepare_package(manifest) {
                Ok(package) => package,
                Err(e) => {
                    self.i.warn(&e.to_string());
                    continue;
                }
            };
            packages_available.insert(build_key(&package.name, &package.version), package);
        }

        Ok(packages_available)
    }
}

/// Add catalog-facing information from the manifest annotations
fn enrich_package_from_annotations(
    package: &mut Package,
    annotations: &HashMap<String, String>,
) -> Result<()> {
    // Display name
    if let Some(display_name) = annotations.get(DISPLAY_NAME_ANNOTATION) {
        package.display_name = non_empty(display_name.clone());
    }

    // Keywords, merged onto the kind defaults
    package.keywords = vec![
        "kubernetes".to_string(),
        "kubectl".to_string(),
        "plugin".to_string(),
    ];
    if let Some(value) = annotations.get(KEYWORDS_ANNOTATION) {
        let extra: Vec<String> = serde_yaml::from_str(value)
            .map_err(|_| Error::ParseError(format!("invalid keywords value: {value}")))?;
        package.keywords.extend(extra);
    }

    // License
    if let Some(license) = annotations.get(LICENSE_ANNOTATION) {
        package.license = non_empty(license.clone());
    }

    // Links
    if let Some(value) = annotations.get(LINKS_ANNOTATION) {
        let links: Vec<Link> = serde_yaml::from_str(value)
            .map_err(|_| Error::ParseError(format!("invalid links value: {value}")))?;
        package.links = links;
    }

    // Maintainers
    if let Some(value) = annotations.get(MAINTAINERS_ANNOTATION) {
        let maintainers: Vec<Maintainer> = serde_yaml::from_str(value)
            .map_err(|_| Error::ParseError(format!("invalid maintainers value: {value}")))?;
        package.maintainers = maintainers;
    }

    // Provider
    if let Some(provider) = annotations.get(PROVIDER_ANNOTATION) {
        package.provider = non_empty(provider.clone());
    }

    // Readme override
    if let Some(readme) = annotations.get(README_ANNOTATION) {
        if !readme.is_empty() {
            package.readme = Some(readme.clone());
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    use crate::catalog::RepositoryKind;
    use crate::tracker::sources::testutil::SourceFixture;

    fn write_plugin(dir: &Path, file_name: &str, content: &str) {
        let plugins_dir = dir.join("plugins");
        fs::create_dir_all(&plugins_dir).unwrap();
        fs::write(plugins_dir.join(file_name), content).unwrap();
    }

    #[test]
    fn test_plugin_with_annotations() {
        let dir = tempfile::tempdir().unwrap();
        write_plugin(
            dir.path(),
            "whoami.yaml",
            r#"
apiVersion: krew.googlecontainertools.github.com/v1alpha2
kind: Plugin
metadata:
  name: whoami
  annotations:
    packdex.io/displayName: Who Am I
    packdex.io/keywords: "[identity, auth]"
    packdex.io/license: Apache-2.0
    packdex.io/links: |
      - name: source
        url: https://github.com/org/whoami
    packdex.io/maintainers: |
      - name: Jane Doe
        email: jane@example.com
    packdex.io/provider: Acme
    packdex.io/readme: Extended readme
spec:
  version: v0.3.0
  shortDescription: Show the subject of the current context
  description: Longer description
  homepage: https://github.com/org/whoami
"#,
        );

        let fixture = SourceFixture::new(RepositoryKind::Krew);
        let input = fixture.input(dir.path());
        let source = KrewSource::new(&input);

        let packages = source.get_packages_available().unwrap();
        assert_eq!(packages.len(), 1);
        let package = &packages["whoami@0.3.0"];
        assert_eq!(package.version, "0.3.0");
        assert_eq!(package.display_name.as_deref(), Some("Who Am I"));
        assert_eq!(
            package.keywords,
            vec!["kubernetes", "kubectl", "plugin", "identity", "auth"]
        );
        assert_eq!(package.license.as_deref(), Some("Apache-2.0"));
        assert_eq!(package.links[0].url, "https://github.com/org/whoami");
        assert_eq!(package.maintainers[0].name, "Jane Doe");
        assert_eq!(package.provider.as_deref(), Some("Acme"));
        assert_eq!(package.readme.as_deref(), Some("Extended readme"));
    }

    #[test]
    fn test_plugin_without_annotations_gets_default_keywords() {
        let dir = tempfile::tempdir().unwrap();
        write_plugin(
            dir.path(),
            "ctx.yaml",
            "metadata:\n  name: ctx\nspec:\n  version: 1.2.3\n  shortDescription: Switch contexts\n  description: Body\n",
        );

        let fixture = SourceFixture::new(RepositoryKind::Krew);
        let input = fixture.input(dir.path());
        let source = KrewSource::new(&input);

        let packages = source.get_packages_available().unwrap();
        let package = &packages["ctx@1.2.3"];
        assert_eq!(package.keywords, vec!["kubernetes", "kubectl", "plugin"]);
        assert_eq!(package.readme.as_deref(), Some("Body"));
    }

    #[test]
    fn test_malformed_annotation_skips_only_offending_package() {
        let dir = tempfile::tempdir().unwrap();
        write_plugin(
            dir.path(),
            "broken.yaml",
            "metadata:\n  name: broken\n  annotations:\n    packdex.io/links: \"not: [valid\"\nspec:\n  version: 1.0.0\n",
        );
        write_plugin(
            dir.path(),
            "fine.yaml",
            "metadata:\n  name: fine\nspec:\n  version: 1.0.0\n",
        );

        let fixture = SourceFixture::new(RepositoryKind::Krew);
        let input = fixture.input(dir.path());
        let source = KrewSource::new(&input);

        let packages = source.get_packages_available().unwrap();
        assert_eq!(packages.len(), 1);
        assert!(packages.contains_key("fine@1.0.0"));
    }

    #[test]
    fn test_invalid_version_skipped() {
        let dir = tempfile::tempdir().unwrap();
        write_plugin(
            dir.path(),
            "bad.yaml",
            "metadata:\n  name: bad\nspec:\n  version: latest\n",
        );

        let fixture = SourceFixture::new(RepositoryKind::Krew);
        let input = fixture.input(dir.path());
        let source = KrewSource::new(&input);

        assert!(source.get_packages_available().unwrap().is_empty());
    }

    #[test]
    fn test_missing_plugins_directory_is_fatal() {
        let dir = tempfile::tempdir().unwrap();

        let fixture = SourceFixture::new(RepositoryKind::Krew);
        let input = fixture.input(dir.path());
        let source = KrewSource::new(&input);

        let err = source.get_packages_available().unwrap_err();
        assert!(err.to_string().contains("error reading plugins directory"));
    }
}
