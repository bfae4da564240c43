//! The target environment descriptor (§3, §4.2): the marker-variable map
//! plus the compatibility-tag tuple that together determine cache
//! identity and wheel filtering.

pub mod tags;

use pep508_rs::MarkerEnvironment;
use serde::{Deserialize, Serialize};
use tags::{SupportedTags, TagTuple, WheelTag};

/// `(impl, abi, platform, manylinux1-flag, impl-version)` plus the marker
/// variable map (§3). Two descriptors with different tag tuples never
/// share a cache file (I6).
#[derive(Debug, Clone)]
pub struct EnvironmentDescriptor {
    pub markers: MarkerEnvironment,
    pub tag_tuple: TagTuple,
    pub supported_tags: SupportedTags,
}

impl EnvironmentDescriptor {
    /// Builds a descriptor for the interpreter running this process.
    /// `supported_tags` defaults to the single `(impl, abi, platform)`
    /// triple from the tag tuple plus a universal `py3-none-any` fallback.
    pub fn current(markers: MarkerEnvironment) -> Self {
        let tag_tuple = TagTuple::current();
        let supported_tags = SupportedTags::from_iter([
            WheelTag {
                interpreter: tag_tuple.implementation.clone(),
                abi: tag_tuple.abi.clone(),
                platform: tag_tuple.platform.clone(),
            },
            WheelTag {
                interpreter: "py3".to_owned(),
                abi: "none".to_owned(),
                platform: "any".to_owned(),
            },
        ]);
        EnvironmentDescriptor {
            markers,
            tag_tuple,
            supported_tags,
        }
    }

    /// Loads a descriptor from a user-supplied `env.json` (§6), for
    /// resolving against a non-local target. A descriptor loaded this way
    /// is never compared against the running interpreter for equality;
    /// divergence is logged, not an error (§4.2).
    pub fn from_file_contents(contents: &str) -> Result<Self, serde_json::Error> {
        let file: EnvFile = serde_json::from_str(contents)?;
        let tag_tuple = TagTuple {
            implementation: file.pep425tags.implementation,
            abi: file.pep425tags.abi,
            platform: file.pep425tags.platform,
            manylinux1: file.pep425tags.manylinux1,
            implementation_version: file.pep425tags.version,
        };
        let supported_tags = SupportedTags::from_iter([WheelTag {
            interpreter: tag_tuple.implementation.clone(),
            abi: tag_tuple.abi.clone(),
            platform: tag_tuple.platform.clone(),
        }]);
        Ok(EnvironmentDescriptor {
            markers: file.environment,
            tag_tuple,
            supported_tags,
        })
    }

    /// Warns (never errors, per §4.2) when the loaded descriptor's tag
    /// tuple disagrees with the tuple derived from the running process.
    pub fn warn_if_mismatched_with_current(&self) {
        let current = TagTuple::current();
        if current.cache_key_fragment() != self.tag_tuple.cache_key_fragment() {
            tracing::warn!(
                loaded = %self.tag_tuple.cache_key_fragment(),
                running = %current.cache_key_fragment(),
                "environment file does not match the running interpreter; resolving for a non-local target",
            );
        }
    }
}

#[derive(Debug, Deserialize, Serialize)]
struct EnvFile {
    environment: MarkerEnvironment,
    pep425tags: Pep425TagsFile,
}

#[derive(Debug, Deserialize, Serialize)]
struct Pep425TagsFile {
    #[serde(rename = "impl")]
    implementation: String,
    abi: String,
    platform: String,
    #[serde(default)]
    manylinux1: bool,
    version: String,
}
