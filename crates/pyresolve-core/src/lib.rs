//! Resolver core for the Python packaging ecosystem: given a manifest of
//! requirements and a target environment, produces a fully ordered lock
//! document naming exactly which candidate satisfies every requirement,
//! default and extra alike.
//!
//! [`index`] and [`archive`] acquire metadata from the outside world,
//! [`cache`] keeps an environment-keyed record of what's already been
//! seen, [`facade`] is the resolver's only window onto both, and
//! [`resolver`] is the selection algorithm itself. [`manifest`] parses the
//! input format and [`flatten::LockDocument`] is the output shape; neither
//! reads nor writes a file, leaving actual manifest/lock-file I/O to the
//! front end that embeds this crate.

pub mod archive;
pub mod cache;
pub mod environment;
pub mod error;
pub mod facade;
pub mod flatten;
pub mod index;
pub mod manifest;
pub mod resolver;
pub mod types;

use environment::EnvironmentDescriptor;
use error::ResolveError;
use facade::{MetadataFacade, ResolveOptions};
use indexmap::IndexMap;
use manifest::Manifest;
use types::Requirement;

/// Resolves an entire manifest (§6) and returns a ready-to-serialize lock
/// document.
///
/// The default set and every extra's set are resolved *together*, in one
/// combined pass, rather than as independent runs: concatenating every
/// requirement list before calling [`resolver::resolve`] once means a
/// package an extra depends on is selected consistently with the default
/// set's own needs, rather than each extra potentially picking a
/// different version of a shared dependency behind the default set's
/// back. Each requirement set's own install order is then read back out
/// of the single resulting tree via [`flatten::topological_order`].
pub async fn resolve_manifest(
    facade: &MetadataFacade,
    environment: &EnvironmentDescriptor,
    manifest: &Manifest,
    options: &ResolveOptions,
) -> Result<flatten::LockDocument, ResolveError> {
    let mut combined: Vec<Requirement> = manifest.default.clone();
    for reqs in manifest.extras.values() {
        combined.extend(reqs.iter().cloned());
    }

    let (tree, root_ids) = resolver::resolve(facade, environment, combined, options).await?;

    let default_ids = &root_ids[..manifest.default.len()];
    let default_order = flatten::topological_order(&tree, default_ids);

    let mut offset = manifest.default.len();
    let mut extras = IndexMap::new();
    for (name, reqs) in &manifest.extras {
        let ids = &root_ids[offset..offset + reqs.len()];
        extras.insert(name.clone(), flatten::topological_order(&tree, ids));
        offset += reqs.len();
    }

    Ok(flatten::LockDocument::new(environment, default_order, extras))
}
