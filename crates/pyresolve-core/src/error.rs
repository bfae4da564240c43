//! The top-level error enum for the resolver core.
//!
//! Every fallible operation in this crate ultimately returns (or wraps)
//! [`ResolveError`]. Subsystems that need their own narrower error type
//! (HTTP transport, archive parsing) define it locally and convert into
//! this enum at the façade/resolver boundary, the way `HttpRequestError`
//! and `WheelBuildError` fold into a crate-wide top-level error.

use miette::Diagnostic;
use thiserror::Error;

use crate::types::NormalizedPackageName;

/// All fatal error kinds a resolution run can produce (§7).
#[derive(Debug, Error, Diagnostic)]
pub enum ResolveError {
    /// No configured source answered for a package name.
    #[error("could not find package '{name}' on any configured index")]
    NotFound {
        /// The package that could not be located.
        name: NormalizedPackageName,
    },

    /// A requirement's candidate list was empty after specifier/environment filtering.
    #[error("no candidate for '{name}' satisfies {specifier}")]
    NoMatchingCandidate {
        /// The package whose candidate list emptied out.
        name: NormalizedPackageName,
        /// A human-readable rendering of the specifier that excluded everything.
        specifier: String,
    },

    /// The intersection of every live specifier for a name admits no candidate.
    #[error("conflicting requirements for '{name}': {chain_a} vs {chain_b}")]
    RequirementConflict {
        /// The package whose requirements collided.
        name: NormalizedPackageName,
        /// A rendering of the first requirement's ancestor chain.
        chain_a: String,
        /// A rendering of the second requirement's ancestor chain.
        chain_b: String,
    },

    /// A dependency chain revisited a name already present in its own ancestry.
    #[error("circular dependency detected: {chain}")]
    CircularDependency {
        /// The ancestor chain, from the offending requirement back to the root.
        chain: String,
    },

    /// A distribution had no hash this resolver is willing to trust.
    #[error("'{filename}' does not advertise a supported hash (sha256, sha1 or md5)")]
    UnsupportedHash {
        /// The file that lacked an acceptable digest.
        filename: String,
    },

    /// Downloaded bytes disagree with the hash recorded for this candidate (install-time only).
    #[error("hash mismatch for '{filename}': expected {expected}, got {actual}")]
    HashMismatch {
        /// The file being verified.
        filename: String,
        /// The digest recorded in the candidate metadata.
        expected: String,
        /// The digest actually computed from the downloaded bytes.
        actual: String,
    },

    /// A VCS clone/checkout subprocess exited non-zero.
    #[error("vcs checkout of '{url}' failed: {reason}")]
    VcsFailure {
        /// The repository URL that was being cloned or checked out.
        url: String,
        /// What went wrong (stderr tail, exit status, or missing executable).
        reason: String,
    },

    /// Transport or protocol failure talking to a package index.
    #[error("package index error: {0}")]
    PackageIndexError(String),

    /// Propagated I/O failure (archive extraction, cache file access, subprocess pipes).
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Propagated cache-store failure.
    #[error("cache store error: {0}")]
    Cache(#[from] rusqlite::Error),
}
