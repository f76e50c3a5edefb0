// src/tracker/sources/helm.rs

//! Source adapter for Helm chart repositories
//!
//! Helm repositories are not cloned: the adapter fetches the repository
//! index over HTTP and produces one package version per chart entry.
//! Chart logos are downloaded through the image store, but only for
//! versions not already registered, so unchanged repositories stay
//! cheap. Every outbound call waits on the shared rate limiter first.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Deserialize;

use super::{TrackerSource, TrackerSourceInput};
use crate::catalog::{Maintainer, Package};
use crate::client::{scheme_is_http, url_join};
use crate::error::{Error, Result};
use crate::tracker::key::build_key;

/// Name of the index file at the repository root
const INDEX_FILE: &str = "index.yaml";

/// Helm repository index
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HelmIndex {
    #[serde(default)]
    entries: HashMap<String, Vec<ChartVersion>>,
}

/// One chart version within the index
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChartVersion {
    #[serde(default)]
    name: String,
    #[serde(default)]
    version: String,
    #[serde(default)]
    app_version: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    home: Option<String>,
    #[serde(default)]
    icon: Option<String>,
    #[serde(default)]
    keywords: Vec<String>,
    #[serde(default)]
    maintainers: Vec<ChartMaintainer>,
    #[serde(default)]
    urls: Vec<String>,
    #[serde(default)]
    digest: Option<String>,
    #[serde(default)]
    created: Option<DateTime<Utc>>,
    #[serde(default)]
    deprecated: bool,
}

#[derive(Debug, Default, Deserialize)]
struct ChartMaintainer {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    email: Option<String>,
}

/// Helm charts source adapter
pub struct HelmSource<'a> {
    i: &'a TrackerSourceInput<'a>,
}

impl<'a> HelmSource<'a> {
    pub fn new(i: &'a TrackerSourceInput<'a>) -> Self {
        Self { i }
    }

    /// Produce the available packages from the index provided
    fn packages_from_index(&self, index: HelmIndex) -> Result<HashMap<String, Package>> {
        let mut packages_available = HashMap::new();

        for (chart_name, versions) in index.entries {
            for entry in versions {
                self.i.svc.token.check()?;

                let name = if entry.name.is_empty() {
                    chart_name.clone()
                } else {
                    entry.name.clone()
                };
                if let Err(e) = semver::Version::parse(&entry.version) {
                    self.i.warn(&format!(
                        "invalid package {name} version ({}): {e}",
                        entry.version
                    ));
                    continue;
                }

                let package = self.prepare_package(name, entry);
                packages_available.insert(build_key(&package.name, &package.version), package);
            }
        }

        Ok(packages_available)
    }

    /// Build a package version from the chart index entry provided
    fn prepare_package(&self, name: String, entry: ChartVersion) -> Package {
        // Chart URLs may be relative to the repository URL
        let content_url = entry.urls.first().map(|u| {
            if scheme_is_http(u) {
                u.clone()
            } else {
                url_join(&self.i.repository.url, u)
            }
        });

        let maintainers = entry
            .maintainers
            .into_iter()
            .filter_map(|m| {
                m.name.map(|name| Maintainer {
                    name,
                    email: m.email,
                })
            })
            .collect();

        let mut package = Package {
            name: name.clone(),
            version: entry.version.clone(),
            description: entry.description,
            home_url: entry.home,
            keywords: entry.keywords,
            maintainers,
            data: Some(serde_json::json!({
                "contentUrl": content_url,
                "appVersion": entry.app_version,
                "digest": entry.digest,
                "createdAt": entry.created.map(|t| t.to_rfc3339()),
                "deprecated": entry.deprecated,
            })),
            repository: self.i.repository.clone(),
            ..Package::default()
        };

        // Fetch the logo only for versions the catalog does not know yet
        let key = build_key(&name, &package.version);
        let needs_logo = !self.i.packages_registered.contains_key(&key)
            || self.i.svc.config.bypass_digest_check;
        if needs_logo {
            if let Some(icon) = entry.icon.filter(|u| !u.is_empty()) {
                self.i.svc.limiter.wait();
                match self.i.svc.image_store.download_and_save_image(&icon) {
                    Ok(image_id) => package.logo_image_id = Some(image_id),
                    Err(e) => {
                        self.i.warn(&format!(
                            "error getting package {name} version {} logo image: {e}",
                            package.version
                        ));
                    }
                }
            }
        }

        package
    }
}

impl TrackerSource for HelmSource<'_> {
    fn get_packages_available(&self) -> Result<HashMap<String, Package>> {
        let index_url = url_join(&self.i.repository.url, INDEX_FILE);
        self.i.svc.limiter.wait();
        let body = self
            .i
            .svc
            .http
            .get_text(&index_url, self.i.repository.credentials())
            .map_err(|e| Error::DownloadError(format!("error getting repository index file: {e}")))?;
        let index: HelmIndex = serde_yaml::from_str(&body)
            .map_err(|e| Error::ParseError(format!("error unmarshaling repository index file: {e}")))?;

        self.packages_from_index(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::RepositoryKind;
    use crate::tracker::sources::testutil::SourceFixture;

    const SAMPLE_INDEX: &str = r#"
apiVersion: v1
entries:
  nginx:
    - name: nginx
      version: 15.0.0
      appVersion: 1.25.0
      description: NGINX Open Source
      home: https://nginx.org
      icon: https://example.com/nginx.png
      keywords: [webserver, http]
      maintainers:
        - name: Jane Doe
          email: jane@example.com
      urls:
        - charts/nginx-15.0.0.tgz
      digest: sha256:abc123
      created: "2024-01-01T00:00:00Z"
    - name: nginx
      version: not-a-version
  redis:
    - name: redis
      version: 17.0.0
      urls:
        - https://cdn.example.com/redis-17.0.0.tgz
"#;

    fn parse_index(yaml: &str) -> HelmIndex {
        serde_yaml::from_str(yaml).unwrap()
    }

    #[test]
    fn test_index_entries_become_packages() {
        let fixture = SourceFixture::new(RepositoryKind::Helm);
        let input = fixture.input(std::path::Path::new(""));
        let source = HelmSource::new(&input);

        let packages = source.packages_from_index(parse_index(SAMPLE_INDEX)).unwrap();
        assert_eq!(packages.len(), 2);

        let nginx = &packages["nginx@15.0.0"];
        assert_eq!(nginx.description.as_deref(), Some("NGINX Open Source"));
        assert_eq!(nginx.home_url.as_deref(), Some("https://nginx.org"));
        assert_eq!(nginx.maintainers[0].name, "Jane Doe");
        let data = nginx.data.as_ref().unwrap();
        assert_eq!(data["appVersion"], "1.25.0");
        assert_eq!(
            data["contentUrl"],
            "https://github.com/org/repo/charts/nginx-15.0.0.tgz"
        );

        // Absolute chart URLs are left alone
        let redis = &packages["redis@17.0.0"];
        assert_eq!(
            redis.data.as_ref().unwrap()["contentUrl"],
            "https://cdn.example.com/redis-17.0.0.tgz"
        );
    }

    #[test]
    fn test_logo_fetched_through_image_store() {
        let fixture = SourceFixture::new(RepositoryKind::Helm);
        let input = fixture.input(std::path::Path::new(""));
        let source = HelmSource::new(&input);

        let packages = source.packages_from_index(parse_index(SAMPLE_INDEX)).unwrap();
        assert!(packages["nginx@15.0.0"].logo_image_id.is_some());
        assert_eq!(
            fixture.image_store.requested_urls(),
            vec!["https://example.com/nginx.png"]
        );
    }

    #[test]
    fn test_logo_skipped_for_registered_versions() {
        let mut fixture = SourceFixture::new(RepositoryKind::Helm);
        fixture
            .registered
            .insert("nginx@15.0.0".to_string(), "digest".to_string());
        let input = fixture.input(std::path::Path::new(""));
        let source = HelmSource::new(&input);

        let packages = source.packages_from_index(parse_index(SAMPLE_INDEX)).unwrap();
        assert!(packages["nginx@15.0.0"].logo_image_id.is_none());
        assert!(fixture.image_store.requested_urls().is_empty());
    }

    #[test]
    fn test_logo_failure_is_per_package() {
        let fixture = SourceFixture::new(RepositoryKind::Helm);
        fixture.image_store.fail();
        let input = fixture.input(std::path::Path::new(""));
        let source = HelmSource::new(&input);

        // The package is still returned, just without a logo
        let packages = source.packages_from_index(parse_index(SAMPLE_INDEX)).unwrap();
        assert!(packages["nginx@15.0.0"].logo_image_id.is_none());
    }

    #[test]
    fn test_logo_downloads_wait_on_the_rate_limiter() {
        use std::time::{Duration, Instant};

        use crate::ratelimit::RateLimiter;

        let mut fixture = SourceFixture::new(RepositoryKind::Helm);
        fixture.limiter = RateLimiter::new(Duration::from_millis(40));
        let input = fixture.input(std::path::Path::new(""));
        let source = HelmSource::new(&input);

        let index = parse_index(
            r#"
entries:
  a:
    - name: a
      version: 1.0.0
      icon: https://example.com/a.png
  b:
    - name: b
      version: 1.0.0
      icon: https://example.com/b.png
"#,
        );

        let start = Instant::now();
        source.packages_from_index(index).unwrap();
        assert_eq!(fixture.image_store.requested_urls().len(), 2);
        // The second download cannot start before the limiter interval
        assert!(start.elapsed() >= Duration::from_millis(40));
    }

    #[test]
    fn test_invalid_chart_version_skipped() {
        let fixture = SourceFixture::new(RepositoryKind::Helm);
        let input = fixture.input(std::path::Path::new(""));
        let source = HelmSource::new(&input);

        let packages = source.packages_from_index(parse_index(SAMPLE_INDEX)).unwrap();
        assert!(!packages.keys().any(|k| k.starts_with("nginx@not")));
    }
}
