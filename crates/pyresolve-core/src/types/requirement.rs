//! The requirement side of the data model.
//!
//! `SpecifierKind` is an explicit tagged union rather than dynamic
//! dispatch: a requirement is parsed once into exactly one of three
//! shapes and every consumer matches on the enum rather than probing
//! string prefixes again.

use super::extra::Extra;
use super::package_name::{NormalizedPackageName, PackageName};
use pep440_rs::VersionSpecifiers;
use pep508_rs::{MarkerTree, Requirement as Pep508Requirement};
use std::fmt::{Display, Formatter};
use std::str::FromStr;
use url::Url;

/// A VCS system supported for `<scheme>+<url>[@<revision>]` requirements.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VcsKind {
    Git,
    Hg,
    Svn,
}

impl VcsKind {
    pub fn from_scheme(scheme: &str) -> Option<Self> {
        match scheme {
            "git" => Some(Self::Git),
            "hg" => Some(Self::Hg),
            "svn" => Some(Self::Svn),
            _ => None,
        }
    }
}

impl Display for VcsKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            VcsKind::Git => "git",
            VcsKind::Hg => "hg",
            VcsKind::Svn => "svn",
        })
    }
}

/// The right-hand side of a requirement, as a tagged union rather than
/// dynamic dispatch.
#[derive(Debug, Clone)]
pub enum SpecifierKind {
    /// `*`, or any value parseable as a PEP 440 specifier set.
    Version(VersionSpecifiers),
    /// `<scheme>+<url>[@<revision>]` with scheme in {git, hg, svn}.
    Vcs {
        kind: VcsKind,
        url: Url,
        revision: Option<String>,
    },
    /// Anything else: an absolute or relative filesystem path.
    Path(String),
}

impl SpecifierKind {
    /// Dispatches a raw requirement value to one of the three shapes.
    /// Per §4.1 this never fails: anything that isn't a specifier or a
    /// recognized VCS URL falls through to `Path`.
    pub fn parse(value: &str) -> Self {
        if value == "*" {
            return SpecifierKind::Version(
                VersionSpecifiers::from_str("").expect("empty specifier is always valid"),
            );
        }
        if let Ok(specifiers) = VersionSpecifiers::from_str(value) {
            return SpecifierKind::Version(specifiers);
        }
        if let Some((scheme, rest)) = value.split_once('+') {
            if let Some(kind) = VcsKind::from_scheme(scheme) {
                let (url_part, revision) = match rest.rsplit_once('@') {
                    Some((url, rev)) => (url, Some(rev.to_owned())),
                    None => (rest, None),
                };
                if let Ok(url) = Url::parse(url_part) {
                    return SpecifierKind::Vcs {
                        kind,
                        url,
                        revision,
                    };
                }
            }
        }
        SpecifierKind::Path(value.to_owned())
    }

    pub fn is_version(&self) -> bool {
        matches!(self, SpecifierKind::Version(_))
    }
}

impl Display for SpecifierKind {
    /// Renders back to the cache's `'*'`-sentinel encoding (§4.6): an
    /// unconstrained version specifier becomes the literal `*`, everything
    /// else round-trips through its own `Display`.
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            SpecifierKind::Version(specifiers) if specifiers.to_string().is_empty() => {
                f.write_str("*")
            }
            SpecifierKind::Version(specifiers) => write!(f, "{specifiers}"),
            SpecifierKind::Vcs { kind, url, revision } => match revision {
                Some(rev) => write!(f, "{kind}+{url}@{rev}"),
                None => write!(f, "{kind}+{url}"),
            },
            SpecifierKind::Path(path) => f.write_str(path),
        }
    }
}

/// A parsed, canonicalized requirement (§3). Identical in shape whether it
/// came from a manifest entry, a wheel's `Requires-Dist`, or a sdist's
/// build-backend introspection (§4.1): all three funnel through
/// [`Requirement::from_name_and_value`] or [`Requirement::from_pep508`].
#[derive(Debug, Clone)]
pub struct Requirement {
    pub name: PackageName,
    pub specifier: SpecifierKind,
    pub extras: Vec<Extra>,
    pub marker: Option<MarkerTree>,
}

impl Requirement {
    /// Parses a manifest-style `{"name": "<req-value>"}` or
    /// `{"specifier": ..., "extras": [...], "marker": ...}` entry.
    pub fn from_name_and_value(
        name: PackageName,
        value: &str,
        extras: Vec<Extra>,
        marker: Option<MarkerTree>,
    ) -> Self {
        Requirement {
            name,
            specifier: SpecifierKind::parse(value),
            extras,
            marker,
        }
    }

    /// Converts a PEP 508 requirement (as recovered from `Requires-Dist` or
    /// a sdist's declared `install_requires`) into our canonical shape.
    pub fn from_pep508(req: Pep508Requirement) -> Self {
        let name = PackageName::from_str(req.name.as_ref())
            .unwrap_or_else(|_| PackageName::from_str("invalid").expect("'invalid' is valid"));
        let specifier = if req.version_or_url.is_none() {
            SpecifierKind::Version(
                VersionSpecifiers::from_str("").expect("empty specifier is always valid"),
            )
        } else {
            match req.version_or_url {
                Some(pep508_rs::VersionOrUrl::VersionSpecifier(v)) => SpecifierKind::Version(v),
                Some(pep508_rs::VersionOrUrl::Url(u)) => SpecifierKind::parse(u.as_str()),
                None => unreachable!(),
            }
        };
        let extras = req
            .extras
            .unwrap_or_default()
            .into_iter()
            .map(|e| Extra::from_str(e.as_ref()).expect("Extra::from_str is infallible"))
            .collect();
        Requirement {
            name,
            specifier,
            extras,
            marker: req.marker,
        }
    }

    pub fn canonical_name(&self) -> NormalizedPackageName {
        self.name.clone().into_normalized()
    }
}

impl From<Requirement> for super::candidate::RequirementInfo {
    /// Flattens a parsed requirement into the value shape the cache store
    /// persists (§4.6): `specifier` becomes its `Display` rendering (the
    /// `'*'` sentinel for unconstrained), `extras`/`marker` become plain
    /// strings.
    fn from(req: Requirement) -> Self {
        super::candidate::RequirementInfo {
            name: req.canonical_name(),
            specifier: req.specifier.to_string(),
            extras: req.extras.iter().map(ToString::to_string).collect(),
            marker: req.marker.as_ref().map(ToString::to_string),
        }
    }
}
