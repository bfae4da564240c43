//! Parsing of wheel `METADATA` / sdist `PKG-INFO` files (§4.1, §4.4).

use super::rfc822ish::RFC822ish;
use super::{PackageName, ParsePackageNameError};
use pep440_rs::{Pep440Error, Version, VersionSpecifiers};
use pep508_rs::Requirement;
use std::str::FromStr;
use thiserror::Error;

/// The subset of a distribution's core metadata the resolver needs:
/// its own identity, its declared dependencies, and the Python version
/// it requires.
#[derive(Debug, Clone)]
pub struct WheelCoreMetadata {
    pub name: PackageName,
    pub version: Version,
    pub requires_dist: Vec<Requirement>,
    pub requires_python: Option<VersionSpecifiers>,
}

#[derive(Debug, Error)]
#[allow(missing_docs)]
pub enum WheelCoreMetaDataError {
    #[error("{0}")]
    FailedToParseMetadata(String),

    #[error("missing key {0} in METADATA")]
    MissingKey(String),

    #[error("invalid Version: {0}")]
    InvalidVersion(String),

    #[error("invalid Requires-Python: {0}")]
    InvalidRequiresPython(#[source] Pep440Error),

    #[error(transparent)]
    InvalidPackageName(#[from] ParsePackageNameError),
}

impl TryFrom<&[u8]> for WheelCoreMetadata {
    type Error = WheelCoreMetaDataError;

    fn try_from(value: &[u8]) -> Result<Self, Self::Error> {
        let input = String::from_utf8_lossy(value);
        let mut parsed = RFC822ish::parse(&input)
            .map_err(|e| WheelCoreMetaDataError::FailedToParseMetadata(e.to_string()))?;

        let name = parsed
            .take("Name")
            .map_err(|_| WheelCoreMetaDataError::MissingKey(String::from("Name")))?
            .parse()?;
        let version = parsed
            .take("Version")
            .map_err(|_| WheelCoreMetaDataError::MissingKey(String::from("Version")))?;
        let version = Version::from_str(&version).map_err(|e| {
            WheelCoreMetaDataError::InvalidVersion(format!("{version}: {e}"))
        })?;

        let mut requires_dist = Vec::new();
        for req_str in parsed.take_all("Requires-Dist") {
            match req_str.parse() {
                Ok(req) => requires_dist.push(req),
                Err(e) => tracing::warn!("ignoring Requires-Dist '{req_str}': {e}"),
            }
        }

        let requires_python = parsed
            .maybe_take("Requires-Python")
            .unwrap_or_default()
            .as_deref()
            .map(VersionSpecifiers::from_str)
            .transpose()
            .map_err(WheelCoreMetaDataError::InvalidRequiresPython)?;

        Ok(WheelCoreMetadata {
            name,
            version,
            requires_dist,
            requires_python,
        })
    }
}

/// Parses a single `Requires-Dist`-style header value, used both for wheel
/// METADATA lines and for the JSON-introspected sdist requirement strings
/// the subprocess pipe protocol returns (§4.4).
pub fn parse_requires_dist(value: &str) -> Result<Requirement, pep508_rs::Pep508Error> {
    Requirement::from_str(value)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn parses_metadata_block() {
        let metadata = b"Metadata-Version: 2.1\nName: attrs\nVersion: 18.2.0\nRequires-Dist: six\nRequires-Python: >=2.7\n\n";
        let parsed = WheelCoreMetadata::try_from(metadata.as_slice()).unwrap();
        assert_eq!(parsed.name.as_str(), "attrs");
        assert_eq!(parsed.version, Version::from_str("18.2.0").unwrap());
        assert_eq!(parsed.requires_dist.len(), 1);
        assert!(parsed.requires_python.is_some());
    }

    #[test]
    fn skips_unparseable_requires_dist_without_failing() {
        let metadata = b"Name: attrs\nVersion: 18.2.0\nRequires-Dist: ###not a requirement###\n\n";
        let parsed = WheelCoreMetadata::try_from(metadata.as_slice()).unwrap();
        assert!(parsed.requires_dist.is_empty());
    }
}
