//! The candidate side of the data model (§3), plus the flattened
//! `CandidateInfo`/`RequirementInfo` value types that travel between the
//! index client, the cache store, and the resolver tree.
//!
//! `PackageType` is the four-way tagged union called for in the REDESIGN
//! FLAGS (§9), replacing the original six-way enum: legacy bdist formats
//! (`bdist_egg`, `bdist_wininst`, `bdist_rpm`) are rejected during index
//! filtering (§4.3) rather than modeled here.

use super::package_name::NormalizedPackageName;
use pep440_rs::Version;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt::{Display, Formatter};

/// The four concrete shapes a candidate distribution can take.
///
/// `Ord` encodes the tie-break rule used in §4.7: when two candidates share
/// a name and version, a VCS/local checkout is preferred over a wheel,
/// which is preferred over a sdist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PackageType {
    SDist,
    BdistWheel,
    Vcs,
    Local,
}

impl PackageType {
    fn rank(self) -> u8 {
        match self {
            PackageType::SDist => 0,
            PackageType::BdistWheel => 1,
            PackageType::Vcs => 2,
            PackageType::Local => 2,
        }
    }
}

impl PartialOrd for PackageType {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PackageType {
    fn cmp(&self, other: &Self) -> Ordering {
        self.rank().cmp(&other.rank())
    }
}

impl Display for PackageType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            PackageType::SDist => "sdist",
            PackageType::BdistWheel => "bdist_wheel",
            PackageType::Vcs => "vcs",
            PackageType::Local => "local",
        })
    }
}

/// A preferred content-hash algorithm, in the §4.3 preference order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[allow(missing_docs)]
pub enum HashAlgorithm {
    Sha256,
    Sha1,
    Md5,
}

impl Display for HashAlgorithm {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            HashAlgorithm::Sha256 => "sha256",
            HashAlgorithm::Sha1 => "sha1",
            HashAlgorithm::Md5 => "md5",
        })
    }
}

/// The value-typed, hashable description of a candidate distribution, used
/// as the map key the resolver tree associates with a `CandidateId` and as
/// the row shape the cache store persists (§4.6).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CandidateInfo {
    pub name: NormalizedPackageName,
    /// `None` for vcs/local candidates without a resolved version yet.
    pub version: Option<Version>,
    pub package_type: PackageType,
    /// The index base URL that returned this candidate; `None` for vcs/local.
    pub source: Option<String>,
    pub location: String,
    pub hash: Option<(HashAlgorithm, String)>,
}

impl CandidateInfo {
    /// Highest-version-wins, package-type-as-tiebreak ordering used to pick
    /// among a requirement's surviving candidates (§4.7).
    pub fn selection_key(&self) -> (Option<&Version>, PackageType) {
        (self.version.as_ref(), self.package_type)
    }
}

/// The value-typed description of a declared dependency, as persisted in
/// the cache's `requirement_infos` table (§4.6) and produced by both the
/// index client (`Requires-Dist`) and the archive introspector.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequirementInfo {
    pub name: NormalizedPackageName,
    /// The raw right-hand side, `"*"` for unconstrained, matching the
    /// cache's literal `'*'` sentinel encoding (§4.6).
    pub specifier: String,
    pub extras: Vec<String>,
    pub marker: Option<String>,
}
