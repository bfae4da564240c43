//! Parsing of wheel (PEP 427) and sdist filenames into structured data.

use super::{NormalizedPackageName, PackageName, ParsePackageNameError};
use pep440_rs::Version;
use serde::{Deserialize, Serialize};
use serde_with::{DeserializeFromStr, SerializeDisplay};
use std::fmt::{Display, Formatter};
use std::str::FromStr;
use thiserror::Error;

/// The parsed name of a downloadable artifact: either a wheel or a source
/// distribution archive. VCS and local-path candidates have no filename to
/// parse and so are not represented here (see `types::candidate::PackageType`).
#[derive(Debug, Clone, PartialOrd, Ord, Eq, PartialEq, Serialize, Deserialize)]
pub enum ArtifactName {
    Wheel(WheelFilename),
    SDist(SDistFilename),
}

impl ArtifactName {
    pub fn version(&self) -> &Version {
        match self {
            ArtifactName::Wheel(name) => &name.version,
            ArtifactName::SDist(name) => &name.version,
        }
    }

    pub fn as_wheel(&self) -> Option<&WheelFilename> {
        match self {
            ArtifactName::Wheel(wheel) => Some(wheel),
            ArtifactName::SDist(_) => None,
        }
    }

    pub fn as_sdist(&self) -> Option<&SDistFilename> {
        match self {
            ArtifactName::SDist(sdist) => Some(sdist),
            ArtifactName::Wheel(_) => None,
        }
    }

    /// Dispatches on the filename extension the way the Simple-API index
    /// client must: a `.whl` suffix is a wheel, the remaining recognized
    /// archive extensions are sdists, anything else is rejected.
    pub fn from_filename(
        input: &str,
        normalized_package_name: &NormalizedPackageName,
    ) -> Result<Self, ParseArtifactNameError> {
        if input.ends_with(".whl") {
            Ok(ArtifactName::Wheel(WheelFilename::from_filename(
                input,
                normalized_package_name,
            )?))
        } else if SDistFormat::get_extension(input).is_ok() {
            Ok(ArtifactName::SDist(SDistFilename::from_filename(
                input,
                normalized_package_name,
            )?))
        } else {
            Err(ParseArtifactNameError::InvalidExtension(input.to_string()))
        }
    }
}

impl Display for ArtifactName {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ArtifactName::Wheel(name) => write!(f, "{name}"),
            ArtifactName::SDist(name) => write!(f, "{name}"),
        }
    }
}

/// See [PEP 427's file name convention](https://peps.python.org/pep-0427/#file-name-convention).
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Debug, Serialize, Deserialize)]
pub struct WheelFilename {
    pub distribution: PackageName,
    pub version: Version,
    pub build_tag: Option<BuildTag>,
    pub py_tags: Vec<String>,
    pub abi_tags: Vec<String>,
    pub arch_tags: Vec<String>,
}

impl WheelFilename {
    /// True if this wheel declares at least one real tag component in each
    /// of the python/abi/arch positions, as opposed to the legacy
    /// "no tags present" case that's always treated as compatible.
    pub fn has_any_tag(&self) -> bool {
        !self.py_tags.is_empty() && !self.abi_tags.is_empty() && !self.arch_tags.is_empty()
    }

    pub fn tag_triples(&self) -> impl Iterator<Item = (&str, &str, &str)> + '_ {
        self.py_tags.iter().flat_map(move |py| {
            self.abi_tags.iter().flat_map(move |abi| {
                self.arch_tags
                    .iter()
                    .map(move |arch| (py.as_str(), abi.as_str(), arch.as_str()))
            })
        })
    }

    pub fn from_filename(
        s: &str,
        normalized_package_name: &NormalizedPackageName,
    ) -> Result<Self, ParseArtifactNameError> {
        let Some(file_stem) = s.strip_suffix(".whl") else {
            return Err(ParseArtifactNameError::InvalidExtension(s.to_string()));
        };

        let Some((distribution, rest)) =
            split_into_filename_rest(file_stem, normalized_package_name)
        else {
            return Err(ParseArtifactNameError::PackageNameNotFound(
                normalized_package_name.clone(),
                s.to_string(),
            ));
        };
        let distribution = PackageName::from_str(distribution)
            .map_err(ParseArtifactNameError::InvalidPackageName)?;

        let Some((version, rest)) = rest.split_once('-') else {
            return Err(ParseArtifactNameError::InvalidName);
        };
        let version = Version::from_str(version)
            .map_err(|e| ParseArtifactNameError::InvalidVersion(e.to_string()))?;

        let Some((rest, platform_tags)) = rest.rsplit_once('-') else {
            return Err(ParseArtifactNameError::InvalidName);
        };
        let arch_tags = platform_tags.split('.').map(ToOwned::to_owned).collect();

        let Some((rest, abi_tag)) = rest.rsplit_once('-') else {
            return Err(ParseArtifactNameError::InvalidName);
        };
        let abi_tags = abi_tag.split('.').map(ToOwned::to_owned).collect();

        let (build_tag, python_tag) = match rest.rsplit_once('-') {
            Some((build_tag, python_tag)) => (Some(build_tag), python_tag),
            None => (None, rest),
        };
        let py_tags = python_tag.split('.').map(ToOwned::to_owned).collect();
        let build_tag = build_tag
            .map(BuildTag::from_str)
            .map_or_else(|| Ok(None), |result| result.map(Some))?;

        Ok(Self {
            distribution,
            version,
            build_tag,
            py_tags,
            abi_tags,
            arch_tags,
        })
    }
}

impl Display for WheelFilename {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{dist}-{ver}{build}-{py}-{abi}-{arch}.whl",
            dist = self.distribution.as_source_str(),
            ver = self.version,
            build = self
                .build_tag
                .as_ref()
                .map_or_else(String::new, |tag| format!("-{tag}")),
            py = self.py_tags.join("."),
            abi = self.abi_tags.join("."),
            arch = self.arch_tags.join("."),
        )
    }
}

/// A build number: a numeric prefix that tie-breaks two otherwise-identical
/// wheel filenames. Sorts before any tagged variant when absent.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Debug, SerializeDisplay, DeserializeFromStr)]
pub struct BuildTag {
    number: u32,
    name: String,
}

impl Display for BuildTag {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}", self.number, self.name)
    }
}

impl FromStr for BuildTag {
    type Err = ParseArtifactNameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let first_alpha_idx = s.find(|c: char| c.is_ascii_alphabetic()).unwrap_or(s.len());
        let (digits, name) = s.split_at(first_alpha_idx);
        Ok(Self {
            number: digits
                .parse()
                .map_err(|_| ParseArtifactNameError::BuildTagMustStartWithDigit(s.to_owned()))?,
            name: name.to_owned(),
        })
    }
}

#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Debug, Hash, Serialize, Deserialize)]
pub struct SDistFilename {
    pub distribution: PackageName,
    pub version: Version,
    pub format: SDistFormat,
}

impl SDistFilename {
    pub fn from_filename(
        s: &str,
        normalized_package_name: &NormalizedPackageName,
    ) -> Result<Self, ParseArtifactNameError> {
        let (package_name, rest) = split_into_filename_rest(s, normalized_package_name).ok_or(
            ParseArtifactNameError::PackageNameNotFound(
                normalized_package_name.clone(),
                s.to_string(),
            ),
        )?;

        let format = SDistFormat::get_extension(rest)?;
        let version = rest
            .strip_suffix(format.extension())
            .expect("get_extension just confirmed the suffix matches");

        let distribution = PackageName::from_str(package_name)
            .map_err(ParseArtifactNameError::InvalidPackageName)?;
        let version = Version::from_str(version)
            .map_err(|e| ParseArtifactNameError::InvalidVersion(e.to_string()))?;

        Ok(SDistFilename {
            distribution,
            version,
            format,
        })
    }
}

impl Display for SDistFilename {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{dist}-{ver}{ext}",
            dist = self.distribution.as_source_str(),
            ver = self.version,
            ext = self.format.extension(),
        )
    }
}

/// Archive formats the sdist extractor knows how to unpack (§4.4).
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Debug, Hash, Serialize, Deserialize)]
#[allow(missing_docs)]
pub enum SDistFormat {
    Zip,
    TarGz,
    TarBz2,
}

impl SDistFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            SDistFormat::Zip => ".zip",
            SDistFormat::TarGz => ".tar.gz",
            SDistFormat::TarBz2 => ".tar.bz2",
        }
    }

    pub fn get_extension(path: &str) -> Result<SDistFormat, ParseArtifactNameError> {
        [
            (".zip", SDistFormat::Zip),
            (".tar.gz", SDistFormat::TarGz),
            (".tar.bz2", SDistFormat::TarBz2),
        ]
        .into_iter()
        .find(|(ext, _)| path.ends_with(ext))
        .map(|(_, format)| format)
        .ok_or_else(|| ParseArtifactNameError::InvalidExtension(path.to_string()))
    }
}

#[derive(Debug, Clone, Error)]
#[allow(missing_docs)]
pub enum ParseArtifactNameError {
    #[error("invalid artifact name")]
    InvalidName,

    #[error("package name '{0}' not found in filename: '{1}'")]
    PackageNameNotFound(NormalizedPackageName, String),

    #[error("invalid artifact extension. Must be either .whl, .tar.gz, .tar.bz2, or .zip (filename='{0}')")]
    InvalidExtension(String),

    #[error(transparent)]
    InvalidPackageName(#[from] ParsePackageNameError),

    #[error("invalid version: '{0}'")]
    InvalidVersion(String),

    #[error("build tag '{0}' must start with a digit")]
    BuildTagMustStartWithDigit(String),
}

/// Finds where the package name ends and the version/tag suffix begins by
/// walking `-`-separated prefixes until one normalizes to the expected name.
/// Needed because package names may themselves contain dashes
/// (`trio-three-0.18.0...` vs `trio-0.18.0...`).
fn split_into_filename_rest<'a>(
    s: &'a str,
    normalized_package_name: &NormalizedPackageName,
) -> Option<(&'a str, &'a str)> {
    for (idx, char) in s.char_indices() {
        if char == '-' {
            let (name, rest) = (&s[..idx], &s[idx + 1..]);
            if let Ok(parsed) = name.parse::<NormalizedPackageName>() {
                if parsed == *normalized_package_name {
                    return Some((name, rest));
                }
            }
        }
    }
    None
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn parses_simple_wheel() {
        let n = WheelFilename::from_filename("trio-0.18.0-py3-none-any.whl", &"trio".parse().unwrap())
            .unwrap();
        assert_eq!(n.distribution, "trio".parse().unwrap());
        assert_eq!(n.version, "0.18.0".parse().unwrap());
        assert_eq!(n.build_tag, None);
        assert_eq!(n.py_tags, vec!["py3"]);
        assert_eq!(n.to_string(), "trio-0.18.0-py3-none-any.whl");
    }

    #[test]
    fn parses_wheel_with_build_tag_and_compressed_tags() {
        let n = WheelFilename::from_filename(
            "foo.bar-0.1b3-1local-py2.py3-none-any.whl",
            &"foo.bar".parse().unwrap(),
        )
        .unwrap();
        assert_eq!(
            n.build_tag,
            Some(BuildTag {
                number: 1,
                name: String::from("local"),
            })
        );
        assert_eq!(n.py_tags, vec!["py2", "py3"]);
    }

    #[test]
    fn parses_sdist() {
        let sn = SDistFilename::from_filename("trio-0.19a0.tar.gz", &"trio".parse().unwrap()).unwrap();
        assert_eq!(sn.version, "0.19a0".parse().unwrap());
        assert_eq!(sn.to_string(), "trio-0.19a0.tar.gz");
    }

    #[test]
    fn splits_dashed_package_names() {
        let normalized: NormalizedPackageName = "trio-three".parse().unwrap();
        let sn = SDistFilename::from_filename("trio-three-0.19a0.tar.gz", &normalized).unwrap();
        assert_eq!(sn.distribution, "trio-three".parse().unwrap());
    }
}
