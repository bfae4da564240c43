//! The JSON index API (PyPI-compatible, §4.3): `GET <source>/<name>/json`
//! for the full release list, `GET <source>/<name>/<version>/json` for a
//! single version's detail (used for `requires_dist`, §4.5).

use super::http::{CacheMode, Http};
use crate::error::ResolveError;
use crate::types::{CandidateInfo, HashAlgorithm, NormalizedPackageName, PackageType};
use pep440_rs::Version;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::str::FromStr;
use url::Url;

#[derive(Debug, Deserialize)]
struct ReleasesResponse {
    releases: BTreeMap<String, Vec<RawDistribution>>,
}

#[derive(Debug, Deserialize)]
struct VersionDetailResponse {
    info: VersionDetailInfo,
}

#[derive(Debug, Deserialize)]
struct VersionDetailInfo {
    requires_dist: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct RawDistribution {
    packagetype: String,
    filename: String,
    url: String,
    digests: BTreeMap<String, String>,
}

fn package_type_from_str(s: &str) -> Option<PackageType> {
    match s {
        "sdist" => Some(PackageType::SDist),
        "bdist_wheel" => Some(PackageType::BdistWheel),
        // legacy bdist variants (bdist_egg, bdist_wininst, bdist_rpm, bdist_msi, bdist_dumb)
        // are rejected here per §4.3/§9: nothing in this resolver installs them.
        _ => None,
    }
}

fn preferred_hash(digests: &BTreeMap<String, String>) -> Option<(HashAlgorithm, String)> {
    for alg in [HashAlgorithm::Sha256, HashAlgorithm::Sha1, HashAlgorithm::Md5] {
        let key = alg.to_string();
        if let Some(value) = digests.get(&key) {
            return Some((alg, value.clone()));
        }
    }
    None
}

/// Fetches every candidate a JSON-API source advertises for `name`,
/// already filtered to parseable versions and an acceptable hash. Unlike
/// the Simple-API path, there's no `requires_python` to filter on here,
/// and the `releases` payload carries no compatibility tags beyond the
/// filename itself — but the façade re-checks every wheel it gets back
/// against the environment's supported tags regardless of which path
/// produced it, so that check doesn't need repeating here.
pub async fn get_candidate_infos(
    http: &Http,
    source: &str,
    name: &NormalizedPackageName,
) -> Result<Option<Vec<CandidateInfo>>, ResolveError> {
    let url = Url::parse(&format!("{source}/{name}/json"))
        .map_err(|e| ResolveError::PackageIndexError(e.to_string()))?;
    let response = http
        .get(url, CacheMode::Default)
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

    let parsed: ReleasesResponse = serde_json::from_slice(&response.body)
        .map_err(|e| ResolveError::PackageIndexError(e.to_string()))?;

    let mut candidates = Vec::new();
    for (version_str, distributions) in parsed.releases {
        let version = match Version::from_str(&version_str) {
            Ok(v) => v,
            Err(_) => {
                tracing::info!(name = %name, version = %version_str, "skipping unparseable version");
                continue;
            }
        };

        for dist in distributions {
            let Some(package_type) = package_type_from_str(&dist.packagetype) else {
                tracing::debug!(filename = %dist.filename, "skipping unsupported legacy bdist");
                continue;
            };

            let Some(hash) = preferred_hash(&dist.digests) else {
                return Err(ResolveError::UnsupportedHash {
                    filename: dist.filename,
                });
            };

            candidates.push(CandidateInfo {
                name: name.clone(),
                version: Some(version.clone()),
                package_type,
                source: Some(source.to_owned()),
                location: dist.url,
                hash: Some(hash),
            });
        }
    }

    Ok(Some(candidates))
}

/// Fetches the per-version `requires_dist` list, if the index publishes
/// it (§4.5: the façade falls back to downloading the wheel when this is
/// `null`).
pub async fn get_requires_dist(
    http: &Http,
    source: &str,
    name: &NormalizedPackageName,
    version: &Version,
) -> Result<Option<Vec<String>>, ResolveError> {
    let url = Url::parse(&format!("{source}/{name}/{version}/json"))
        .map_err(|e| ResolveError::PackageIndexError(e.to_string()))?;
    let response = http
        .get(url, CacheMode::Default)
        .await
        .map_err(|e| ResolveError::PackageIndexError(e.to_string()))?;
    if !response.status.is_success() {
        return Ok(None);
    }
    let parsed: VersionDetailResponse = serde_json::from_slice(&response.body)
        .map_err(|e| ResolveError::PackageIndexError(e.to_string()))?;
    Ok(parsed.info.requires_dist)
}
