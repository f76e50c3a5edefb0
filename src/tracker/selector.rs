// src/tracker/selector.rs

//! Repository selection from configuration
//!
//! Resolves the tracker configuration into the set of repositories to
//! process:
//!
//! - If repository names are configured, those repositories are fetched
//!   by name and any lookup failure aborts.
//! - Otherwise, if kinds are configured, all repositories of those kinds
//!   are fetched; an unknown kind name is a configuration error.
//! - Otherwise all repositories are fetched.
//!
//! Disabled repositories are filtered out of the result.

use crate::catalog::{Repository, RepositoryKind, RepositoryManager};
use crate::config::TrackerConfig;
use crate::error::{Error, Result};

/// Select the repositories a tracker invocation will process
pub fn get_repositories(
    config: &TrackerConfig,
    repository_manager: &dyn RepositoryManager,
) -> Result<Vec<Repository>> {
    let mut repositories = Vec::new();

    if !config.repositories_names.is_empty() {
        for name in &config.repositories_names {
            let repository = repository_manager
                .get_by_name(name, true)
                .map_err(|e| Error::TrackerError(format!("error getting repository {name}: {e}")))?;
            repositories.push(repository);
        }
    } else if !config.repositories_kinds.is_empty() {
        for kind_name in &config.repositories_kinds {
            let kind = RepositoryKind::from_name(kind_name).map_err(|_| {
                Error::ConfigError(format!("invalid repository kind found in config: {kind_name}"))
            })?;
            let kind_repositories = repository_manager.get_by_kind(kind, true).map_err(|e| {
                Error::TrackerError(format!("error getting repositories by kind ({kind_name}): {e}"))
            })?;
            repositories.extend(kind_repositories);
        }
    } else {
        repositories = repository_manager
            .get_all(true)
            .map_err(|e| Error::TrackerError(format!("error getting all repositories: {e}")))?;
    }

    Ok(repositories.into_iter().filter(|r| !r.disabled).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::mock::MockRepositoryManager;

    fn repo(id: &str, name: &str, kind: RepositoryKind) -> Repository {
        Repository::new(id, name, "https://repo.io", kind)
    }

    #[test]
    fn test_names_take_precedence_over_kinds() {
        let rm = MockRepositoryManager::with_repositories(vec![
            repo("id1", "repo1", RepositoryKind::Helm),
            repo("id2", "repo2", RepositoryKind::Olm),
        ]);
        let config = TrackerConfig {
            repositories_names: vec!["repo1".to_string(), "repo2".to_string()],
            repositories_kinds: vec!["helm".to_string(), "olm".to_string()],
            ..TrackerConfig::default()
        };

        let selected = get_repositories(&config, &rm).unwrap();
        assert_eq!(
            selected.iter().map(|r| r.name.as_str()).collect::<Vec<_>>(),
            vec!["repo1", "repo2"]
        );
        assert!(rm.calls().get_by_kind.is_empty());
        assert_eq!(rm.calls().get_all, 0);
    }

    #[test]
    fn test_missing_named_repository_aborts() {
        let rm = MockRepositoryManager::with_repositories(vec![repo("id1", "repo1", RepositoryKind::Helm)]);
        let config = TrackerConfig {
            repositories_names: vec!["repo1".to_string(), "ghost".to_string()],
            ..TrackerConfig::default()
        };

        let err = get_repositories(&config, &rm).unwrap_err();
        assert!(err.to_string().contains("error getting repository ghost"));
    }

    #[test]
    fn test_selection_by_kinds() {
        let rm = MockRepositoryManager::with_repositories(vec![
            repo("id1", "repo1", RepositoryKind::Helm),
            repo("id2", "repo2", RepositoryKind::Olm),
            repo("id3", "repo3", RepositoryKind::Helm),
        ]);
        let config = TrackerConfig {
            repositories_kinds: vec!["helm".to_string()],
            ..TrackerConfig::default()
        };

        let selected = get_repositories(&config, &rm).unwrap();
        assert_eq!(selected.len(), 2);
        assert!(selected.iter().all(|r| r.kind == RepositoryKind::Helm));
    }

    #[test]
    fn test_unknown_kind_is_fatal() {
        let rm = MockRepositoryManager::new();
        let config = TrackerConfig {
            repositories_kinds: vec!["rpm".to_string()],
            ..TrackerConfig::default()
        };

        let err = get_repositories(&config, &rm).unwrap_err();
        assert!(matches!(err, Error::ConfigError(_)));
        assert!(err.to_string().contains("invalid repository kind"));
    }

    #[test]
    fn test_disabled_repositories_filtered() {
        let mut disabled = repo("id3", "repo3", RepositoryKind::Opa);
        disabled.disabled = true;
        let rm = MockRepositoryManager::with_repositories(vec![
            repo("id1", "repo1", RepositoryKind::Helm),
            repo("id2", "repo2", RepositoryKind::Olm),
            disabled,
        ]);
        let config = TrackerConfig::default();

        let selected = get_repositories(&config, &rm).unwrap();
        assert_eq!(
            selected.iter().map(|r| r.name.as_str()).collect::<Vec<_>>(),
            vec!["repo1", "repo2"]
        );
        assert_eq!(rm.calls().get_all, 1);
    }
}
