//! The environment-keyed metadata cache (§4.6): a SQLite database, one per
//! schema-version/environment-tag-tuple pair, with two tables —
//! `candidate_infos` (one row per candidate a name was ever observed to
//! have) and `requirement_infos` (one row per dependency a candidate was
//! ever observed to declare, keyed by the candidate's content hash).
//!
//! Grounded directly on `dotlock.caching` (`cache_filename`,
//! `get_cached_candidate_infos`, `set_cached_candidate_infos`,
//! `get_cached_requirement_infos`, `set_cached_requirement_infos`), with
//! `rusqlite` standing in for `sqlite3`.

use crate::environment::tags::TagTuple;
use crate::types::{CandidateInfo, HashAlgorithm, NormalizedPackageName, PackageType, RequirementInfo};
use pep440_rs::Version;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};
use std::str::FromStr;

const SCHEMA_VERSION: &str = "0.1";

const SETUP_SCRIPT: &str = r#"
CREATE TABLE IF NOT EXISTS candidate_infos (
    name TEXT NOT NULL,
    version TEXT,
    package_type TEXT NOT NULL,
    source TEXT,
    location TEXT NOT NULL,
    hash_alg TEXT,
    hash_val TEXT,
    requirements_cached INTEGER NOT NULL DEFAULT 0
);
CREATE INDEX IF NOT EXISTS candidate_infos_name ON candidate_infos(name);

CREATE TABLE IF NOT EXISTS requirement_infos (
    candidate_hash TEXT NOT NULL,
    name TEXT NOT NULL,
    specifier TEXT NOT NULL,
    extras TEXT,
    marker TEXT
);
CREATE INDEX IF NOT EXISTS requirement_infos_candidate_hash ON requirement_infos(candidate_hash);
"#;

fn package_type_name(t: PackageType) -> &'static str {
    match t {
        PackageType::SDist => "sdist",
        PackageType::BdistWheel => "bdist_wheel",
        PackageType::Vcs => "vcs",
        PackageType::Local => "local",
    }
}

fn package_type_from_name(s: &str) -> Option<PackageType> {
    match s {
        "sdist" => Some(PackageType::SDist),
        "bdist_wheel" => Some(PackageType::BdistWheel),
        "vcs" => Some(PackageType::Vcs),
        "local" => Some(PackageType::Local),
        _ => None,
    }
}

fn hash_alg_name(alg: HashAlgorithm) -> &'static str {
    match alg {
        HashAlgorithm::Sha256 => "sha256",
        HashAlgorithm::Sha1 => "sha1",
        HashAlgorithm::Md5 => "md5",
    }
}

fn hash_alg_from_name(s: &str) -> Option<HashAlgorithm> {
    match s {
        "sha256" => Some(HashAlgorithm::Sha256),
        "sha1" => Some(HashAlgorithm::Sha1),
        "md5" => Some(HashAlgorithm::Md5),
        _ => None,
    }
}

/// A candidate's content hash is its cache identity: wheels and sdists are
/// looked up by the hash advertised in their index entry. VCS/local
/// candidates, which carry no hash, use their location URL instead.
fn candidate_cache_key(info: &CandidateInfo) -> String {
    match &info.hash {
        Some((_, hex)) => hex.clone(),
        None => info.location.clone(),
    }
}

/// Builds the cache file name for a given environment (§4.6): schema
/// version plus the environment's tag-tuple fragment, so that two
/// environments never share a cache file (I6).
pub fn cache_filename(tag_tuple: &TagTuple) -> String {
    format!("cache-{SCHEMA_VERSION}-{}.sqlite", tag_tuple.cache_key_fragment())
}

/// The persistent metadata cache for one environment.
pub struct CacheStore {
    connection: Connection,
}

impl CacheStore {
    /// Opens (creating if necessary) the cache database for `tag_tuple`
    /// under `cache_dir`.
    pub fn open(cache_dir: &Path, tag_tuple: &TagTuple) -> rusqlite::Result<Self> {
        std::fs::create_dir_all(cache_dir).map_err(|e| {
            rusqlite::Error::SqliteFailure(
                rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_CANTOPEN),
                Some(e.to_string()),
            )
        })?;
        let path: PathBuf = cache_dir.join(cache_filename(tag_tuple));
        let connection = Connection::open(path)?;
        connection.execute_batch(SETUP_SCRIPT)?;
        Ok(CacheStore { connection })
    }

    #[cfg(test)]
    fn open_in_memory() -> rusqlite::Result<Self> {
        let connection = Connection::open_in_memory()?;
        connection.execute_batch(SETUP_SCRIPT)?;
        Ok(CacheStore { connection })
    }

    /// Returns every candidate ever cached for `name`, or `None` on a
    /// cache miss (§4.5).
    pub fn get_candidate_infos(
        &self,
        name: &NormalizedPackageName,
    ) -> rusqlite::Result<Option<Vec<CandidateInfo>>> {
        let mut statement = self.connection.prepare(
            "SELECT name, version, package_type, source, location, hash_alg, hash_val \
             FROM candidate_infos WHERE name = ?1",
        )?;
        let rows = statement
            .query_map(params![name.as_str()], |row| {
                let name: String = row.get(0)?;
                let version: Option<String> = row.get(1)?;
                let package_type: String = row.get(2)?;
                let source: Option<String> = row.get(3)?;
                let location: String = row.get(4)?;
                let hash_alg: Option<String> = row.get(5)?;
                let hash_val: Option<String> = row.get(6)?;
                Ok((name, version, package_type, source, location, hash_alg, hash_val))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        if rows.is_empty() {
            tracing::debug!(%name, "cache miss for candidate_infos");
            return Ok(None);
        }

        let mut candidates = Vec::with_capacity(rows.len());
        for (name, version, package_type, source, location, hash_alg, hash_val) in rows {
            candidates.push(CandidateInfo {
                name: name.parse().unwrap_or_else(|_| {
                    unreachable!("only ever inserted via NormalizedPackageName::as_str")
                }),
                version: version.and_then(|v| Version::from_str(&v).ok()),
                package_type: package_type_from_name(&package_type)
                    .unwrap_or(PackageType::SDist),
                source,
                location,
                hash: hash_alg
                    .zip(hash_val)
                    .and_then(|(alg, val)| hash_alg_from_name(&alg).map(|alg| (alg, val))),
            });
        }
        tracing::debug!(%name, count = candidates.len(), "cache hit for candidate_infos");
        Ok(Some(candidates))
    }

    /// Replaces the cached candidate list for a name (§4.5 always writes
    /// the full, freshly fetched list rather than merging).
    pub fn set_candidate_infos(
        &self,
        name: &NormalizedPackageName,
        candidates: &[CandidateInfo],
    ) -> rusqlite::Result<()> {
        self.connection
            .execute("DELETE FROM candidate_infos WHERE name = ?1", params![name.as_str()])?;
        for c in candidates {
            self.connection.execute(
                "INSERT INTO candidate_infos \
                 (name, version, package_type, source, location, hash_alg, hash_val, requirements_cached) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 0)",
                params![
                    name.as_str(),
                    c.version.as_ref().map(ToString::to_string),
                    package_type_name(c.package_type),
                    c.source,
                    c.location,
                    c.hash.as_ref().map(|(alg, _)| hash_alg_name(*alg)),
                    c.hash.as_ref().map(|(_, hex)| hex.clone()),
                ],
            )?;
        }
        Ok(())
    }

    /// Returns the cached requirement list for `candidate`, or `None` if
    /// this candidate's requirements have never been cached.
    pub fn get_requirement_infos(
        &self,
        candidate: &CandidateInfo,
    ) -> rusqlite::Result<Option<Vec<RequirementInfo>>> {
        let key = candidate_cache_key(candidate);
        let cached: Option<i64> = self
            .connection
            .query_row(
                "SELECT requirements_cached FROM candidate_infos WHERE hash_val = ?1 OR location = ?1 LIMIT 1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;

        if cached != Some(1) {
            tracing::debug!(location = %candidate.location, "cache miss for requirement_infos");
            return Ok(None);
        }

        let mut statement = self.connection.prepare(
            "SELECT name, specifier, extras, marker FROM requirement_infos WHERE candidate_hash = ?1",
        )?;
        let rows = statement
            .query_map(params![key], |row| {
                let name: String = row.get(0)?;
                let specifier: String = row.get(1)?;
                let extras: Option<String> = row.get(2)?;
                let marker: Option<String> = row.get(3)?;
                Ok((name, specifier, extras, marker))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        tracing::debug!(location = %candidate.location, count = rows.len(), "cache hit for requirement_infos");
        Ok(Some(
            rows.into_iter()
                .map(|(name, specifier, extras, marker)| RequirementInfo {
                    name: name.parse().unwrap_or_else(|_| {
                        unreachable!("only ever inserted via NormalizedPackageName::as_str")
                    }),
                    specifier,
                    extras: extras
                        .map(|s| s.split(',').map(ToOwned::to_owned).collect())
                        .unwrap_or_default(),
                    marker,
                })
                .collect(),
        ))
    }

    /// Records `requirements` as the complete dependency list for
    /// `candidate`, and flips its `requirements_cached` flag.
    pub fn set_requirement_infos(
        &self,
        candidate: &CandidateInfo,
        requirements: &[RequirementInfo],
    ) -> rusqlite::Result<()> {
        let key = candidate_cache_key(candidate);
        self.connection
            .execute("DELETE FROM requirement_infos WHERE candidate_hash = ?1", params![key])?;
        for r in requirements {
            self.connection.execute(
                "INSERT INTO requirement_infos (candidate_hash, name, specifier, extras, marker) \
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    key,
                    r.name.as_str(),
                    r.specifier,
                    (!r.extras.is_empty()).then(|| r.extras.join(",")),
                    r.marker,
                ],
            )?;
        }
        self.connection.execute(
            "UPDATE candidate_infos SET requirements_cached = 1 WHERE hash_val = ?1 OR location = ?1",
            params![key],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::types::PackageType;

    fn sample_candidate() -> CandidateInfo {
        CandidateInfo {
            name: "attrs".parse().unwrap(),
            version: Some(Version::from_str("18.2.0").unwrap()),
            package_type: PackageType::BdistWheel,
            source: Some("https://pypi.org/simple/".to_owned()),
            location: "https://files.pythonhosted.org/attrs-18.2.0.whl".to_owned(),
            hash: Some((HashAlgorithm::Sha256, "deadbeef".to_owned())),
        }
    }

    #[test]
    fn round_trips_candidate_infos() {
        let store = CacheStore::open_in_memory().unwrap();
        let name: NormalizedPackageName = "attrs".parse().unwrap();
        assert!(store.get_candidate_infos(&name).unwrap().is_none());

        store.set_candidate_infos(&name, &[sample_candidate()]).unwrap();
        let fetched = store.get_candidate_infos(&name).unwrap().unwrap();
        assert_eq!(fetched.len(), 1);
        assert_eq!(fetched[0].hash, Some((HashAlgorithm::Sha256, "deadbeef".to_owned())));
    }

    #[test]
    fn requirement_cache_starts_empty_and_fills_on_write() {
        let store = CacheStore::open_in_memory().unwrap();
        let candidate = sample_candidate();
        store
            .set_candidate_infos(&candidate.name, std::slice::from_ref(&candidate))
            .unwrap();
        assert!(store.get_requirement_infos(&candidate).unwrap().is_none());

        let reqs = vec![RequirementInfo {
            name: "six".parse().unwrap(),
            specifier: "*".to_owned(),
            extras: vec![],
            marker: None,
        }];
        store.set_requirement_infos(&candidate, &reqs).unwrap();
        let fetched = store.get_requirement_infos(&candidate).unwrap().unwrap();
        assert_eq!(fetched.len(), 1);
        assert_eq!(fetched[0].specifier, "*");
    }
}
