//! "Extra" feature-flag names. The PEP 508 grammar calls them identifiers
//! but real-world metadata is looser than that, so normalization here
//! mirrors [`super::package_name`] rather than re-validating the grammar.

use regex::Regex;
use serde::{Serialize, Serializer};
use serde_with::DeserializeFromStr;
use std::cmp::Ordering;
use std::fmt::{Display, Formatter};
use std::hash::{Hash, Hasher};
use std::str::FromStr;
use std::sync::OnceLock;

#[derive(Debug, Clone, Eq, DeserializeFromStr)]
pub struct Extra {
    source: Box<str>,
    normalized: Box<str>,
}

impl Extra {
    pub fn as_source_str(&self) -> &str {
        self.source.as_ref()
    }

    pub fn as_str(&self) -> &str {
        self.normalized.as_ref()
    }
}

impl FromStr for Extra {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        static SEPARATOR_RUN: OnceLock<Regex> = OnceLock::new();
        let separator_run = SEPARATOR_RUN.get_or_init(|| Regex::new(r"[-_.]+").unwrap());
        let mut normalized = separator_run.replace_all(s, "-").into_owned();
        normalized.make_ascii_lowercase();
        Ok(Self {
            source: s.to_owned().into_boxed_str(),
            normalized: normalized.into_boxed_str(),
        })
    }
}

impl Display for Extra {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.source)
    }
}

impl Hash for Extra {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.normalized.hash(state)
    }
}

impl PartialEq for Extra {
    fn eq(&self, other: &Self) -> bool {
        self.normalized.eq(&other.normalized)
    }
}

impl PartialOrd for Extra {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Extra {
    fn cmp(&self, other: &Self) -> Ordering {
        self.normalized.cmp(&other.normalized)
    }
}

impl Serialize for Extra {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.source.as_ref().serialize(serializer)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn collapses_separator_runs() {
        let a: Extra = "socks--extra".parse().unwrap();
        let b: Extra = "socks_extra".parse().unwrap();
        assert_eq!(a.as_str(), "socks-extra");
        assert_eq!(a, b);
    }
}
