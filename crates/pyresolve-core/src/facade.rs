//! The metadata façade: the resolver's only window onto the outside
//! world. Owns the cache store and decides, for every lookup, whether to
//! answer from cache or go fetch.

use crate::archive::{extract_wheel_metadata, introspect_requirements, unpack_sdist, vcs_requirements_for};
use crate::cache::CacheStore;
use crate::environment::tags::WheelTag;
use crate::environment::EnvironmentDescriptor;
use crate::error::ResolveError;
use crate::index::{candidates_for, json_api, CacheMode, Http, PackageSource};
use crate::types::{
    CandidateInfo, NormalizedPackageName, PackageType, Requirement, RequirementInfo, SDistFormat,
    SpecifierKind, WheelFilename,
};
use pep440_rs::VersionSpecifiers;
use std::path::PathBuf;
use url::Url;

/// Knobs the façade and resolver share.
#[derive(Debug, Clone)]
pub struct ResolveOptions {
    pub environment: EnvironmentDescriptor,
    pub allowed_package_types: Vec<PackageType>,
    /// Bypasses the candidate-list cache read (§4.5); still writes back.
    pub update: bool,
    /// The batched-gather concurrency cap (§5).
    pub concurrency: usize,
}

impl ResolveOptions {
    pub fn new(environment: EnvironmentDescriptor) -> Self {
        ResolveOptions {
            environment,
            allowed_package_types: vec![PackageType::BdistWheel, PackageType::SDist],
            update: false,
            concurrency: 10,
        }
    }
}

/// PEP 425 bdist-tag compatibility: every wheel candidate either declares
/// no tags at all (the legacy carve-out `WheelFilename::has_any_tag`
/// flags) or declares at least one triple the environment supports.
/// Non-wheel candidates, and wheels whose filename can't be parsed back
/// out of their location, are always accepted here — filename parsing was
/// already required to classify the candidate as a wheel in the first
/// place, so a parse failure at this point means there's nothing to check.
fn is_tag_compatible(candidate: &CandidateInfo, environment: &EnvironmentDescriptor) -> bool {
    if candidate.package_type != PackageType::BdistWheel {
        return true;
    }
    let Some(filename) = candidate.location.rsplit('/').next() else {
        return true;
    };
    let Ok(wheel) = WheelFilename::from_filename(filename, &candidate.name) else {
        return true;
    };
    if !wheel.has_any_tag() {
        return true;
    }
    let compatible = wheel.tag_triples().any(|(py, abi, arch)| {
        environment.supported_tags.is_compatible(&WheelTag {
            interpreter: py.to_owned(),
            abi: abi.to_owned(),
            platform: arch.to_owned(),
        })
    });
    compatible
}

pub struct MetadataFacade {
    http: Http,
    cache: CacheStore,
    sources: Vec<PackageSource>,
    scratch_dir: PathBuf,
}

impl MetadataFacade {
    pub fn new(http: Http, cache: CacheStore, sources: Vec<PackageSource>, scratch_dir: PathBuf) -> Self {
        MetadataFacade {
            http,
            cache,
            sources,
            scratch_dir,
        }
    }

    /// Dispatches on the requirement's specifier kind (§4.5): `vcs`/`path`
    /// requirements never touch the index or cache at all — they
    /// synthesize a single candidate whose location *is* the URL/path,
    /// with no hash (a repository or filesystem tree has no fixed digest).
    /// `version` requirements go through the full index/cache path.
    pub async fn candidates_for_requirement(
        &self,
        requirement: &Requirement,
        options: &ResolveOptions,
    ) -> Result<Vec<CandidateInfo>, ResolveError> {
        match &requirement.specifier {
            SpecifierKind::Version(specifier) => {
                self.candidates_for(&requirement.canonical_name(), Some(specifier), options)
                    .await
            }
            SpecifierKind::Vcs { .. } => Ok(vec![CandidateInfo {
                name: requirement.canonical_name(),
                version: None,
                package_type: PackageType::Vcs,
                source: None,
                location: requirement.specifier.to_string(),
                hash: None,
            }]),
            SpecifierKind::Path(path) => Ok(vec![CandidateInfo {
                name: requirement.canonical_name(),
                version: None,
                package_type: PackageType::Local,
                source: None,
                location: path.clone(),
                hash: None,
            }]),
        }
    }

    /// Resolves every candidate for `name` that satisfies `specifier`
    /// (`None` for unconstrained). Consults the cache first unless
    /// `options.update` is set; on an empty post-filter result, re-queries
    /// the index once before giving up (§4.5 fetch-through decision).
    pub async fn candidates_for(
        &self,
        name: &NormalizedPackageName,
        specifier: Option<&VersionSpecifiers>,
        options: &ResolveOptions,
    ) -> Result<Vec<CandidateInfo>, ResolveError> {
        let mut all = if options.update {
            None
        } else {
            self.cache.get_candidate_infos(name)?
        };

        if all.is_none() {
            let fetched = candidates_for(&self.http, &self.sources, name, &options.environment).await?;
            self.cache.set_candidate_infos(name, &fetched)?;
            all = Some(fetched);
        }

        let filtered = Self::filter_candidates(all.unwrap(), specifier, options);
        if !filtered.is_empty() {
            return Ok(filtered);
        }

        // Fetch-through: the cached list might simply be stale. Re-query
        // once before declaring failure.
        let refreshed = candidates_for(&self.http, &self.sources, name, &options.environment).await?;
        self.cache.set_candidate_infos(name, &refreshed)?;
        let filtered = Self::filter_candidates(refreshed, specifier, options);
        if filtered.is_empty() {
            return Err(ResolveError::NoMatchingCandidate {
                name: name.clone(),
                specifier: specifier.map_or_else(|| "*".to_owned(), |s| s.to_string()),
            });
        }
        Ok(filtered)
    }

    fn filter_candidates(
        candidates: Vec<CandidateInfo>,
        specifier: Option<&VersionSpecifiers>,
        options: &ResolveOptions,
    ) -> Vec<CandidateInfo> {
        candidates
            .into_iter()
            .filter(|c| options.allowed_package_types.contains(&c.package_type))
            .filter(|c| match (&c.version, specifier) {
                (Some(version), Some(spec)) => spec.contains(version),
                _ => true,
            })
            .filter(|c| is_tag_compatible(c, &options.environment))
            .collect()
    }

    /// Resolves the declared dependencies of `candidate`. VCS and local
    /// candidates are always introspected fresh, never served from cache
    /// (§4.5's "vcs/path always-introspect" rule) since they carry no
    /// stable content hash to key a cache entry on.
    pub async fn requirements_for(
        &self,
        candidate: &CandidateInfo,
    ) -> Result<Vec<RequirementInfo>, ResolveError> {
        if matches!(candidate.package_type, PackageType::Vcs | PackageType::Local) {
            return self.introspect_requirements(candidate).await;
        }

        if let Some(cached) = self.cache.get_requirement_infos(candidate)? {
            return Ok(cached);
        }

        let requirements = self.fetch_requirements(candidate).await?;
        self.cache.set_requirement_infos(candidate, &requirements)?;
        Ok(requirements)
    }

    async fn fetch_requirements(
        &self,
        candidate: &CandidateInfo,
    ) -> Result<Vec<RequirementInfo>, ResolveError> {
        match candidate.package_type {
            PackageType::SDist => {
                // Indices never list sdist dependencies; they must be downloaded.
                self.introspect_requirements(candidate).await
            }
            PackageType::BdistWheel => {
                if let (Some(source), Some(version)) = (&candidate.source, &candidate.version) {
                    if let Some(raw) =
                        json_api::get_requires_dist(&self.http, source, &candidate.name, version).await?
                    {
                        return Ok(raw
                            .into_iter()
                            .filter_map(|line| match crate::types::parse_requires_dist(&line) {
                                Ok(req) => Some(RequirementInfo::from(crate::types::Requirement::from_pep508(req))),
                                Err(e) => {
                                    tracing::warn!("ignoring requires_dist entry '{line}': {e}");
                                    None
                                }
                            })
                            .collect());
                    }
                }
                // The index doesn't know the dependencies; download and read them.
                self.wheel_requirements(candidate).await
            }
            PackageType::Vcs | PackageType::Local => self.introspect_requirements(candidate).await,
        }
    }

    async fn wheel_requirements(
        &self,
        candidate: &CandidateInfo,
    ) -> Result<Vec<RequirementInfo>, ResolveError> {
        let url = Url::parse(&candidate.location)
            .map_err(|e| ResolveError::PackageIndexError(e.to_string()))?;
        let response = self
            .http
            .get(url, CacheMode::Default)
            .await
            .map_err(|e| ResolveError::PackageIndexError(e.to_string()))?;

        let filename_str = candidate
            .location
            .rsplit('/')
            .next()
            .ok_or_else(|| ResolveError::PackageIndexError("empty location".to_owned()))?;
        let wheel_filename =
            crate::types::WheelFilename::from_filename(filename_str, &candidate.name)
                .map_err(|e| ResolveError::PackageIndexError(e.to_string()))?;

        let metadata = extract_wheel_metadata(response.body, &wheel_filename)
            .map_err(|e| ResolveError::PackageIndexError(e.to_string()))?;

        Ok(metadata
            .requires_dist
            .into_iter()
            .map(|req| RequirementInfo::from(crate::types::Requirement::from_pep508(req)))
            .collect())
    }

    async fn introspect_requirements(
        &self,
        candidate: &CandidateInfo,
    ) -> Result<Vec<RequirementInfo>, ResolveError> {
        use crate::types::SpecifierKind;
        use std::path::Path;

        let requirements = if candidate.package_type == PackageType::Local {
            // A local candidate's location is a bare filesystem path, not
            // a URL: introspect it in place, no download or unpack.
            introspect_requirements(Path::new(&candidate.location), &candidate.name)
                .await
                .map_err(|e| ResolveError::PackageIndexError(e.to_string()))?
        } else {
            match SpecifierKind::parse(&candidate.location) {
                SpecifierKind::Vcs { kind, url, revision } => {
                    vcs_requirements_for(kind, &url, revision.as_deref(), &candidate.name).await?
                }
                _ => {
                    let url = Url::parse(&candidate.location)
                        .map_err(|e| ResolveError::PackageIndexError(e.to_string()))?;
                    let response = self
                        .http
                        .get(url, CacheMode::Default)
                        .await
                        .map_err(|e| ResolveError::PackageIndexError(e.to_string()))?;
                    let extract_dir = self.scratch_dir.join(format!("sdist-{}", candidate.name));
                    std::fs::create_dir_all(&extract_dir)?;
                    let filename_str = candidate.location.rsplit('/').next().unwrap_or_default();
                    let format = SDistFormat::get_extension(filename_str)
                        .map_err(|e| ResolveError::PackageIndexError(e.to_string()))?;
                    let package_dir = unpack_sdist(&response.body, format, &extract_dir)
                        .map_err(|e| ResolveError::PackageIndexError(e.to_string()))?;
                    introspect_requirements(&package_dir, &candidate.name)
                        .await
                        .map_err(|e| ResolveError::PackageIndexError(e.to_string()))?
                }
            }
        };

        Ok(requirements
            .into_iter()
            .map(RequirementInfo::from)
            .collect())
    }
}
