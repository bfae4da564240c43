//! The manifest file: JSON-with-comments listing sources, default
//! requirements, and per-extra requirement sets.

use crate::error::ResolveError;
use crate::types::{Extra, PackageName, Requirement};
use indexmap::IndexMap;
use pep508_rs::MarkerTree;
use serde::Deserialize;
use std::str::FromStr;

/// Strips a single line's trailing `#`/`//` comment, honoring string
/// literals and backslash escapes so a `#` or `//` inside a quoted value
/// is never mistaken for a comment marker.
fn strip_comment(line: &str) -> &str {
    let bytes = line.as_bytes();
    let mut in_string = false;
    let mut index = 0;
    while index < bytes.len() {
        let ch = bytes[index];
        if ch == b'\\' {
            index += 2;
            continue;
        }
        if ch == b'"' {
            in_string = !in_string;
        }
        let starts_line_comment = ch == b'#' || (ch == b'/' && bytes.get(index + 1) == Some(&b'/'));
        if starts_line_comment && !in_string {
            return &line[..index];
        }
        index += 1;
    }
    line
}

/// Strips comments from every line, then parses as ordinary JSON.
fn strip_comments(contents: &str) -> String {
    contents
        .lines()
        .map(strip_comment)
        .collect::<Vec<_>>()
        .join("\n")
}

/// The right-hand side of a manifest requirement entry: either a bare
/// string (the specifier/VCS-URL/path) or an object carrying extras and a
/// marker alongside it (§6).
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawRequirementValue {
    Bare(String),
    Detailed {
        specifier: String,
        #[serde(default)]
        extras: Vec<String>,
        #[serde(default)]
        marker: Option<String>,
    },
}

#[derive(Debug, Deserialize)]
struct RawManifest {
    sources: Vec<String>,
    default: IndexMap<String, RawRequirementValue>,
    #[serde(default)]
    extras: IndexMap<String, IndexMap<String, RawRequirementValue>>,
}

/// A parsed manifest (§6): the list of index sources, the root
/// requirement set installed unconditionally, and one requirement set per
/// named optional-feature group.
#[derive(Debug, Clone)]
pub struct Manifest {
    pub sources: Vec<String>,
    pub default: Vec<Requirement>,
    pub extras: IndexMap<String, Vec<Requirement>>,
}

fn parse_requirement(name: &str, value: RawRequirementValue) -> Result<Requirement, ResolveError> {
    let package_name = PackageName::from_str(name)
        .map_err(|e| ResolveError::PackageIndexError(format!("invalid requirement name '{name}': {e}")))?;

    let (value, extras, marker) = match value {
        RawRequirementValue::Bare(value) => (value, Vec::new(), None),
        RawRequirementValue::Detailed {
            specifier,
            extras,
            marker,
        } => (specifier, extras, marker),
    };

    let extras: Vec<Extra> = extras
        .into_iter()
        .map(|e| Extra::from_str(&e).expect("Extra::from_str is infallible"))
        .collect();
    let marker = marker
        .as_deref()
        .map(MarkerTree::from_str)
        .transpose()
        .map_err(|e| ResolveError::PackageIndexError(format!("invalid marker for '{name}': {e}")))?;

    Ok(Requirement::from_name_and_value(package_name, &value, extras, marker))
}

impl Manifest {
    /// Parses a manifest document, stripping `#`/`//` line comments first.
    pub fn parse(contents: &str) -> Result<Manifest, ResolveError> {
        let stripped = strip_comments(contents);
        let raw: RawManifest = serde_json::from_str(&stripped)
            .map_err(|e| ResolveError::PackageIndexError(format!("invalid manifest: {e}")))?;

        let default = raw
            .default
            .into_iter()
            .map(|(name, value)| parse_requirement(&name, value))
            .collect::<Result<Vec<_>, _>>()?;

        let extras = raw
            .extras
            .into_iter()
            .map(|(extra_name, reqs)| {
                let parsed = reqs
                    .into_iter()
                    .map(|(name, value)| parse_requirement(&name, value))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok((extra_name, parsed))
            })
            .collect::<Result<IndexMap<_, _>, ResolveError>>()?;

        Ok(Manifest {
            sources: raw.sources,
            default,
            extras,
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn strips_hash_and_slash_comments_outside_strings() {
        assert_eq!(strip_comment(r#"  "a": "b" # trailing comment"#), r#"  "a": "b" "#);
        assert_eq!(strip_comment(r#"  "a": "b" // trailing comment"#), r#"  "a": "b" "#);
        assert_eq!(strip_comment(r#"  "a#b": "c//d""#), r#"  "a#b": "c//d""#);
    }

    #[test]
    fn parses_bare_and_detailed_requirement_values() {
        let manifest = Manifest::parse(
            r#"{
                // a comment
                "sources": ["https://pypi.org/simple"],
                "default": {
                    "attrs": ">=18.0,<19.0",
                    "requests": { "specifier": "*", "extras": ["socks"], "marker": "python_version >= '3.6'" }
                },
                "extras": {
                    "dev": { "pytest": "*" }
                }
            }"#,
        )
        .unwrap();

        assert_eq!(manifest.sources, vec!["https://pypi.org/simple".to_owned()]);
        assert_eq!(manifest.default.len(), 2);
        assert_eq!(manifest.extras.get("dev").unwrap().len(), 1);
    }
}
