//! Value types for working with the Python packaging ecosystem: names,
//! artifact filenames, core metadata, and the requirement/candidate model
//! (§3). Follows PEPs 440/503/508/425/427 as closely as the vendored
//! `pep440_rs`/`pep508_rs` primitives allow.

mod artifact_name;
mod candidate;
mod core_metadata;
mod extra;
mod package_name;
mod requirement;
mod rfc822ish;

pub use artifact_name::{
    ArtifactName, BuildTag, ParseArtifactNameError, SDistFilename, SDistFormat, WheelFilename,
};
pub use candidate::{CandidateInfo, HashAlgorithm, PackageType, RequirementInfo};
pub use core_metadata::{parse_requires_dist, WheelCoreMetaDataError, WheelCoreMetadata};
pub use extra::Extra;
pub use package_name::{NormalizedPackageName, PackageName, ParsePackageNameError};
pub use requirement::{Requirement, SpecifierKind, VcsKind};

pub(crate) use rfc822ish::RFC822ish;

pub use pep440_rs::{Version, VersionSpecifiers};
pub use pep508_rs::{MarkerEnvironment, MarkerTree};
