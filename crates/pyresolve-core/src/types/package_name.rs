use miette::Diagnostic;
use regex::Regex;
use serde::{Serialize, Serializer};
use serde_with::{DeserializeFromStr, SerializeDisplay};
use std::borrow::Borrow;
use std::cmp::Ordering;
use std::fmt::{Display, Formatter};
use std::hash::{Hash, Hasher};
use std::str::FromStr;
use std::sync::OnceLock;
use thiserror::Error;

/// A Python package name, retaining both the string it was parsed from and
/// its PEP 503 normalized form. Invariant I1 requires every comparison in
/// this crate to go through the normalized form, never the source string.
#[derive(Debug, Clone, Eq, DeserializeFromStr)]
pub struct PackageName {
    source: Box<str>,
    normalized: Box<str>,
}

impl PackageName {
    /// The exact string this name was parsed from.
    pub fn as_source_str(&self) -> &str {
        self.source.as_ref()
    }

    /// The normalized (lowercase, `-_.` collapsed to `-`) form.
    pub fn as_str(&self) -> &str {
        self.normalized.as_ref()
    }

    /// Discards the source string, keeping only the normalized identity.
    pub fn into_normalized(self) -> NormalizedPackageName {
        NormalizedPackageName(self.normalized)
    }
}

#[derive(Debug, Clone, Error, Diagnostic)]
#[allow(missing_docs)]
pub enum ParsePackageNameError {
    #[error("invalid package name '{0}'")]
    InvalidPackageName(String),
}

impl FromStr for PackageName {
    type Err = ParsePackageNameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        static NAME_VALIDATE: OnceLock<Regex> = OnceLock::new();
        let name_validate = NAME_VALIDATE.get_or_init(|| {
            // https://packaging.python.org/specifications/core-metadata/#name
            Regex::new(r"(?i-u)^([A-Z0-9]|[A-Z0-9][A-Z0-9._-]*[A-Z0-9])$").unwrap()
        });

        if !name_validate.is_match(s) {
            return Err(ParsePackageNameError::InvalidPackageName(s.into()));
        }

        // https://peps.python.org/pep-0503/#normalized-names
        static SEPARATOR_RUN: OnceLock<Regex> = OnceLock::new();
        let separator_run = SEPARATOR_RUN.get_or_init(|| Regex::new(r"[-_.]+").unwrap());
        let mut normalized = separator_run.replace_all(s, "-").into_owned();
        normalized.make_ascii_lowercase();

        Ok(PackageName {
            source: s.to_owned().into_boxed_str(),
            normalized: normalized.into_boxed_str(),
        })
    }
}

impl Hash for PackageName {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.normalized.hash(state)
    }
}

impl PartialEq for PackageName {
    fn eq(&self, other: &Self) -> bool {
        self.normalized.eq(&other.normalized)
    }
}

impl PartialOrd for PackageName {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PackageName {
    fn cmp(&self, other: &Self) -> Ordering {
        self.normalized.cmp(&other.normalized)
    }
}

impl Display for PackageName {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.source)
    }
}

impl Serialize for PackageName {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.source.as_ref().serialize(serializer)
    }
}

/// A package name known to already be in PEP 503 normalized form.
///
/// The resolver's live-candidate index, cache keys, and the arena's
/// per-name lookups are all keyed on this type rather than [`PackageName`]
/// so that two spellings of the same project (`Foo_Bar`, `foo-bar`) can
/// never desync (I1).
#[repr(transparent)]
#[derive(
    Debug, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, SerializeDisplay, DeserializeFromStr,
)]
pub struct NormalizedPackageName(Box<str>);

impl From<PackageName> for NormalizedPackageName {
    fn from(value: PackageName) -> Self {
        Self(value.normalized)
    }
}

impl From<NormalizedPackageName> for PackageName {
    fn from(value: NormalizedPackageName) -> Self {
        Self {
            source: value.0.clone(),
            normalized: value.0,
        }
    }
}

impl Display for NormalizedPackageName {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl NormalizedPackageName {
    /// Returns the normalized string.
    pub fn as_str(&self) -> &str {
        self.0.as_ref()
    }
}

impl FromStr for NormalizedPackageName {
    type Err = ParsePackageNameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(PackageName::from_str(s)?.into())
    }
}

impl Borrow<str> for NormalizedPackageName {
    fn borrow(&self) -> &str {
        self.0.as_ref()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn normalizes_separators_and_case() {
        let name1: PackageName = "Foo-Bar-Baz".parse().unwrap();
        assert_eq!(name1.as_source_str(), "Foo-Bar-Baz");
        assert_eq!(name1.as_str(), "foo-bar-baz");

        let name2: PackageName = "foo_bar.baz".parse().unwrap();
        assert_eq!(name2.as_str(), "foo-bar-baz");
        assert_eq!(name1, name2);

        let name3: PackageName = "foo-barbaz".parse().unwrap();
        assert_ne!(name1, name3);
    }

    #[test]
    fn collapses_separator_runs_not_just_substitutes() {
        let dashes: PackageName = "foo--bar".parse().unwrap();
        let dots: PackageName = "foo..bar".parse().unwrap();
        let mixed: PackageName = "foo-_.bar".parse().unwrap();
        assert_eq!(dashes.as_str(), "foo-bar");
        assert_eq!(dots.as_str(), "foo-bar");
        assert_eq!(mixed.as_str(), "foo-bar");
        assert_eq!(dashes, dots);
    }

    #[test]
    fn rejects_invalid_names() {
        assert!("".parse::<PackageName>().is_err());
        assert!("-leading-dash".parse::<PackageName>().is_err());
        assert!("has space".parse::<PackageName>().is_err());
    }
}
