//! Dispatch across the configured package sources: each source is either
//! a Simple-API base URL or a JSON-API base URL, distinguished by a
//! literal `#json` suffix on the configured URL, stripped before use. A
//! lookup tries every source in order and succeeds with the first one
//! that doesn't answer 404; if every source 404s, the package is reported
//! not found.

use super::html::parse_simple_index_page;
use super::http::{CacheMode, Http};
use super::json_api;
use crate::environment::EnvironmentDescriptor;
use crate::error::ResolveError;
use crate::types::{ArtifactName, CandidateInfo, HashAlgorithm, NormalizedPackageName, PackageType};
use url::Url;

/// One configured package source, resolved from the manifest's `sources`
/// list (§6).
#[derive(Debug, Clone)]
pub enum PackageSource {
    Simple(Url),
    Json(String),
}

impl PackageSource {
    /// Parses a source URL as it appears in the manifest: a trailing
    /// `#json` marks a JSON-API source, anything else is a Simple-API base.
    pub fn parse(raw: &str) -> Result<Self, url::ParseError> {
        if let Some(base) = raw.strip_suffix("#json") {
            Ok(PackageSource::Json(base.trim_end_matches('/').to_owned()))
        } else {
            Ok(PackageSource::Simple(Url::parse(raw)?))
        }
    }
}

fn simple_entry_to_candidate(
    name: &NormalizedPackageName,
    source: &Url,
    entry: super::html::SimpleIndexEntry,
) -> Option<CandidateInfo> {
    let package_type = match &entry.filename {
        ArtifactName::Wheel(_) => PackageType::BdistWheel,
        ArtifactName::SDist(_) => PackageType::SDist,
    };
    let hash = entry.hash.and_then(|(alg, hex)| {
        let alg = match alg.as_str() {
            "sha256" => HashAlgorithm::Sha256,
            "sha1" => HashAlgorithm::Sha1,
            "md5" => HashAlgorithm::Md5,
            _ => return None,
        };
        Some((alg, hex))
    });
    Some(CandidateInfo {
        name: name.clone(),
        version: Some(entry.filename.version().clone()),
        package_type,
        source: Some(source.to_string()),
        location: entry.url.to_string(),
        hash,
    })
}

async fn candidates_from_simple(
    http: &Http,
    base: &Url,
    name: &NormalizedPackageName,
    environment: &EnvironmentDescriptor,
) -> Result<Option<Vec<CandidateInfo>>, ResolveError> {
    let project_url = base
        .join(&format!("{name}/"))
        .map_err(|e| ResolveError::PackageIndexError(e.to_string()))?;
    let response = http
        .get(project_url.clone(), CacheMode::Default)
        .await
        .map_err(|e| ResolveError::PackageIndexError(e.to_string()))?;
    if response.status == reqwest::StatusCode::NOT_FOUND {
        return Ok(None);
    }
    if !response.status.is_success() {
        return Err(ResolveError::PackageIndexError(format!(
            "index returned {}",
            response.status
        )));
    }
    let body = String::from_utf8_lossy(&response.body);
    let entries = parse_simple_index_page(&project_url, name, &body)
        .map_err(|e| ResolveError::PackageIndexError(e.to_string()))?;
    Ok(Some(
        entries
            .into_iter()
            // `data-requires-python` filtering happens here, at HTML
            // parse time, rather than later against a `CandidateInfo`
            // that no longer carries it.
            .filter(|entry| {
                entry.requires_python.as_ref().map_or(true, |requires| {
                    requires.contains(&environment.markers.python_full_version)
                })
            })
            .filter_map(|entry| simple_entry_to_candidate(name, base, entry))
            .collect(),
    ))
}

/// Queries every configured source in order, returning the first
/// non-404 result. Fails with `ResolveError::NotFound` only once every
/// source has answered 404.
pub async fn candidates_for(
    http: &Http,
    sources: &[PackageSource],
    name: &NormalizedPackageName,
    environment: &EnvironmentDescriptor,
) -> Result<Vec<CandidateInfo>, ResolveError> {
    for source in sources {
        let found = match source {
            PackageSource::Simple(base) => candidates_from_simple(http, base, name, environment).await?,
            PackageSource::Json(base) => json_api::get_candidate_infos(http, base, name).await?,
        };
        if let Some(candidates) = found {
            return Ok(candidates);
        }
    }
    Err(ResolveError::NotFound { name: name.clone() })
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn recognizes_json_suffix() {
        match PackageSource::parse("https://pypi.org/pypi#json").unwrap() {
            PackageSource::Json(base) => assert_eq!(base, "https://pypi.org/pypi"),
            _ => panic!("expected a json source"),
        }
    }

    #[test]
    fn defaults_to_simple() {
        match PackageSource::parse("https://pypi.org/simple/").unwrap() {
            PackageSource::Simple(url) => assert_eq!(url.as_str(), "https://pypi.org/simple/"),
            _ => panic!("expected a simple source"),
        }
    }
}
