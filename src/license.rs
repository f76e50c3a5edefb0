// src/license.rs

//! License file location and SPDX identifier detection
//!
//! Upstream repositories rarely declare a license in their manifests, so
//! adapters fall back to locating a license file by name and matching its
//! text against the headers of common licenses.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;

/// Matches license file names (LICENSE, LICENSE.md, License.txt, ...)
static LICENSE_FILE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)license.*").unwrap());

/// Header patterns for common licenses, checked in order
static LICENSE_PATTERNS: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    [
        (r"(?i)Apache License\s*[\r\n]+\s*Version 2\.0", "Apache-2.0"),
        (r"(?i)MIT License", "MIT"),
        (r"(?i)BSD 3-Clause License", "BSD-3-Clause"),
        (r"(?i)BSD 2-Clause License", "BSD-2-Clause"),
        (r"(?i)GNU LESSER GENERAL PUBLIC LICENSE\s*[\r\n]+\s*Version 3", "LGPL-3.0"),
        (r"(?i)GNU LESSER GENERAL PUBLIC LICENSE\s*[\r\n]+\s*Version 2\.1", "LGPL-2.1"),
        (r"(?i)GNU GENERAL PUBLIC LICENSE\s*[\r\n]+\s*Version 3", "GPL-3.0"),
        (r"(?i)GNU GENERAL PUBLIC LICENSE\s*[\r\n]+\s*Version 2", "GPL-2.0"),
        (r"(?i)GNU AFFERO GENERAL PUBLIC LICENSE\s*[\r\n]+\s*Version 3", "AGPL-3.0"),
        (r"(?i)Mozilla Public License,? (?:v\.?|Version) 2\.0", "MPL-2.0"),
        (r"(?i)ISC License", "ISC"),
        (r"(?i)This is free and unencumbered software", "Unlicense"),
        // Older BSD texts carry no title line
        (
            r"(?i)Redistribution and use in source and binary forms.+neither the name",
            "BSD-3-Clause",
        ),
        (r"(?i)Redistribution and use in source and binary forms", "BSD-2-Clause"),
        // Permission grant without the MIT title
        (r"(?i)Permission is hereby granted, free of charge", "MIT"),
    ]
    .iter()
    .map(|(pattern, id)| {
        let re = Regex::new(&format!("(?s){pattern}")).unwrap();
        (re, *id)
    })
    .collect()
});

/// Detect the SPDX identifier of the license text provided
pub fn detect(text: &str) -> Option<String> {
    for (re, id) in LICENSE_PATTERNS.iter() {
        if re.is_match(text) {
            return Some((*id).to_string());
        }
    }
    None
}

/// Locate a license file in the directory provided
pub fn find_license_file(dir: &Path) -> Option<PathBuf> {
    let entries = fs::read_dir(dir).ok()?;
    for entry in entries.flatten() {
        if !entry.file_type().map(|t| t.is_file()).unwrap_or(false) {
            continue;
        }
        let name = entry.file_name();
        if LICENSE_FILE_RE.is_match(&name.to_string_lossy()) {
            return Some(entry.path());
        }
    }
    None
}

/// Locate and identify the license of the directory provided
pub fn detect_in_dir(dir: &Path) -> Option<String> {
    let path = find_license_file(dir)?;
    let text = fs::read_to_string(path).ok()?;
    detect(&text)
}
