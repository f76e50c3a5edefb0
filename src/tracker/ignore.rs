// src/tracker/ignore.rs

//! Ignore rule matching
//!
//! Repository metadata can declare `{name, version-regex}` entries that
//! suppress matching packages from both registration and presence.

use regex::Regex;

use crate::catalog::IgnoreEntry;

/// Check whether a package name and version match an ignore entry
///
/// Names compare by equality. An empty candidate version matches any
/// entry for that name; otherwise the entry's version field is applied
/// as a regular expression. A malformed expression never matches.
pub fn matches_entry(entry: &IgnoreEntry, name: &str, version: &str) -> bool {
    if entry.name != name {
        return false;
    }
    if version.is_empty() {
        return true;
    }
    match Regex::new(&entry.version) {
        Ok(re) => re.is_match(version),
        Err(_) => false,
    }
}
