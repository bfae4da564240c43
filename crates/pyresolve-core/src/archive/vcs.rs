//! VCS checkout (§4.4): resolves the scheme-appropriate clone command and
//! introspects the resulting tree with the same build-backend pipe used
//! for sdists.

use super::sdist::{introspect_requirements, SDistError};
use crate::error::ResolveError;
use crate::types::{NormalizedPackageName, Requirement, VcsKind};
use std::process::Stdio;
use tokio::process::Command;
use url::Url;

fn clone_command(kind: VcsKind, url: &Url, revision: Option<&str>) -> (&'static str, Vec<String>) {
    match (kind, revision) {
        (VcsKind::Git, Some(rev)) => (
            "git",
            vec!["clone".into(), "--branch".into(), rev.into(), url.to_string()],
        ),
        (VcsKind::Git, None) => ("git", vec!["clone".into(), url.to_string()]),
        (VcsKind::Hg, Some(rev)) => (
            "hg",
            vec!["clone".into(), "-r".into(), rev.into(), url.to_string()],
        ),
        (VcsKind::Hg, None) => ("hg", vec!["clone".into(), url.to_string()]),
        (VcsKind::Svn, Some(rev)) => (
            "svn",
            vec!["checkout".into(), "-r".into(), rev.into(), url.to_string()],
        ),
        (VcsKind::Svn, None) => ("svn", vec!["checkout".into(), url.to_string()]),
    }
}

/// Clones `url` at `revision` (if given) into a fresh subdirectory of
/// `into_dir` and returns the path cloned into.
pub async fn clone(
    kind: VcsKind,
    url: &Url,
    revision: Option<&str>,
    into_dir: &std::path::Path,
) -> Result<std::path::PathBuf, ResolveError> {
    let (program, args) = clone_command(kind, url, revision);
    which::which(program).map_err(|_| ResolveError::VcsFailure {
        url: url.to_string(),
        reason: format!("'{program}' is not on PATH"),
    })?;

    let output = Command::new(program)
        .args(&args)
        .current_dir(into_dir)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await
        .map_err(|e| ResolveError::VcsFailure {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    if !output.status.success() {
        return Err(ResolveError::VcsFailure {
            url: url.to_string(),
            reason: String::from_utf8_lossy(&output.stderr).into_owned(),
        });
    }

    let mut entries = std::fs::read_dir(into_dir)
        .map_err(|e| ResolveError::VcsFailure {
            url: url.to_string(),
            reason: e.to_string(),
        })?
        .filter_map(|e| e.ok());
    let cloned = entries.next().ok_or_else(|| ResolveError::VcsFailure {
        url: url.to_string(),
        reason: "clone produced no directory".to_owned(),
    })?;
    Ok(cloned.path())
}

/// Clones and introspects a VCS requirement in one step, the way
/// `get_vcs_requirement_infos` does in the original.
pub async fn requirements_for(
    kind: VcsKind,
    url: &Url,
    revision: Option<&str>,
    expected_name: &NormalizedPackageName,
) -> Result<Vec<Requirement>, ResolveError> {
    let scratch = tempfile::tempdir().map_err(ResolveError::Io)?;
    let package_dir = clone(kind, url, revision, scratch.path()).await?;
    introspect_requirements(&package_dir, expected_name)
        .await
        .map_err(|e: SDistError| ResolveError::VcsFailure {
            url: url.to_string(),
            reason: e.to_string(),
        })
}
