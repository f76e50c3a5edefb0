// src/tracker/key.rs

//! Canonical package key encoding
//!
//! The `(name, version)` pair identifies one package version within a
//! repository. Its key form is persisted indirectly through the catalog's
//! packages digest map, so the encoding must stay stable across passes.

/// Build the canonical key for a package name and version
///
/// Versions are SemVer and therefore never contain `@`, which makes the
/// encoding reversible even for names that do.
pub fn build_key(name: &str, version: &str) -> String {
    format!("{name}@{version}")
}

/// Split a key back into its name and version
pub fn parse_key(key: &str) -> (String, String) {
    match key.rsplit_once('@') {
        Some((name, version)) => (name.to_string(), version.to_string()),
        None => (key.to_string(), String::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip() {
        for (name, version) in [
            ("nginx", "1.2.3"),
            ("falco-rules", "0.1.0-alpha.1"),
            ("scope/name", "2.0.0+build.5"),
        ] {
            let key = build_key(name, version);
            assert_eq!(parse_key(&key), (name.to_string(), version.to_string()));
        }
    }

    #[test]
    fn test_name_containing_separator() {
        // The version never contains '@', so the right-most split wins
        let key = build_key("team@plugin", "1.0.0");
        assert_eq!(key, "team@plugin@1.0.0");
        assert_eq!(parse_key(&key), ("team@plugin".to_string(), "1.0.0".to_string()));
    }

    #[test]
    fn test_parse_key_without_separator() {
        assert_eq!(parse_key("orphan"), ("orphan".to_string(), String::new()));
    }
}
