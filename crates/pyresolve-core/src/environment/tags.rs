//! PEP 425 compatibility tags: the `(python-tag, abi-tag, platform-tag)`
//! triple encoded in wheel filenames, and the ordered set of triples an
//! environment accepts.

use itertools::Itertools;
use serde::{Deserialize, Serialize};
use serde_with::{DeserializeFromStr, SerializeDisplay};
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// A single `py-abi-platform` tag as it appears (one component) in a wheel
/// filename.
#[derive(Debug, Clone, Hash, Eq, PartialEq, SerializeDisplay, DeserializeFromStr)]
pub struct WheelTag {
    pub interpreter: String,
    pub abi: String,
    pub platform: String,
}

impl FromStr for WheelTag {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let Some((interpreter, abi, platform)) =
            s.split('-').map(ToOwned::to_owned).collect_tuple()
        else {
            return Err(String::from("not enough '-' separators"));
        };
        Ok(Self {
            interpreter,
            abi,
            platform,
        })
    }
}

impl Display for WheelTag {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}-{}", self.interpreter, self.abi, self.platform)
    }
}

/// The ordered set of tags an environment accepts. Order matters: earlier
/// tags are more specific and should be preferred when multiple wheels
/// would otherwise tie (§4.3, §8: "tag(W) ∈ supported_tags(environment)").
#[derive(Debug, Clone, Default)]
pub struct SupportedTags {
    tags: indexmap::IndexSet<WheelTag>,
}

impl SupportedTags {
    pub fn is_compatible(&self, tag: &WheelTag) -> bool {
        self.tags.contains(tag)
    }

    pub fn specificity(&self, tag: &WheelTag) -> Option<usize> {
        self.tags.get_index_of(tag).map(|idx| self.tags.len() - idx)
    }
}

impl FromIterator<WheelTag> for SupportedTags {
    fn from_iter<T: IntoIterator<Item = WheelTag>>(iter: T) -> Self {
        Self {
            tags: FromIterator::from_iter(iter),
        }
    }
}

/// The `(impl, abi, platform, manylinux1, impl-version)` identity tuple
/// that participates in the cache filename (§4.2, §4.6) and that this
/// environment's supported wheel tags are derived from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TagTuple {
    pub implementation: String,
    pub abi: String,
    pub platform: String,
    pub manylinux1: bool,
    pub implementation_version: String,
}

impl TagTuple {
    /// A coarse, best-effort tag tuple derived from the process running
    /// the resolver itself. Vendored tag/marker arithmetic is out of
    /// scope (§1); an explicit `env.json` always overrides this.
    pub fn current() -> Self {
        let platform = match std::env::consts::OS {
            "linux" => "linux_x86_64",
            "macos" => "macosx_11_0_arm64",
            "windows" => "win_amd64",
            other => other,
        };
        TagTuple {
            implementation: "cp".to_owned(),
            abi: "abi3".to_owned(),
            platform: platform.to_owned(),
            manylinux1: platform.starts_with("linux"),
            implementation_version: "cp311".to_owned(),
        }
    }

    /// The filename fragment this tuple contributes to the cache file
    /// name (§4.6): `<impl>-<abi>-<platform>[-manylinux1]`.
    pub fn cache_key_fragment(&self) -> String {
        if self.manylinux1 {
            format!("{}-{}-{}-manylinux1", self.implementation, self.abi, self.platform)
        } else {
            format!("{}-{}-{}", self.implementation, self.abi, self.platform)
        }
    }
}
