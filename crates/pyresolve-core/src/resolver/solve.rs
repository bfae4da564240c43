//! The single-pass resolution algorithm, restated over the arena in
//! [`super::tree`]: for each requirement, reuse the name's existing live
//! candidate if it still satisfies the requirement, otherwise intersect
//! every live specifier for that name and pick the best surviving
//! candidate.
//!
//! Extras merged into a live candidate are propagated to every duplicate
//! live instance of that name, not just the one being visited, so a live
//! candidate's extras are always the exact union across every live
//! requirement referring to it.

use super::tree::{CandidateId, RequirementId, Tree};
use crate::environment::EnvironmentDescriptor;
use crate::error::ResolveError;
use crate::facade::{MetadataFacade, ResolveOptions};
use crate::types::{
    CandidateInfo, Extra, NormalizedPackageName, PackageName, Requirement, RequirementInfo,
    SpecifierKind, VersionSpecifiers,
};
use async_recursion::async_recursion;
use futures::StreamExt;
use pep508_rs::MarkerTree;
use std::str::FromStr;

fn render_chain(chain: &[NormalizedPackageName]) -> String {
    chain
        .iter()
        .rev()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" -> ")
}

/// Reconstructs a parsed [`Requirement`] from the flattened value shape
/// the façade returns (§4.6's cache row shape, reused as the in-memory
/// carrier between façade and resolver).
fn requirement_from_info(info: &RequirementInfo) -> Result<Requirement, ResolveError> {
    let name = PackageName::from(info.name.clone());
    let extras: Vec<Extra> = info
        .extras
        .iter()
        .map(|e| Extra::from_str(e).expect("Extra::from_str is infallible"))
        .collect();
    let marker = info
        .marker
        .as_deref()
        .map(MarkerTree::from_str)
        .transpose()
        .map_err(|e| ResolveError::PackageIndexError(format!("invalid marker: {e}")))?;
    Ok(Requirement::from_name_and_value(
        name,
        &info.specifier,
        extras,
        marker,
    ))
}

fn requirement_accepts(requirement: &Requirement, candidate: &CandidateInfo) -> bool {
    match &requirement.specifier {
        SpecifierKind::Version(specifier) => match &candidate.version {
            Some(version) => specifier.contains(version),
            None => true,
        },
        // A vcs/path requirement's candidate list is always the single
        // synthetic candidate synthesized for it (§4.5); there is never a
        // competing live candidate of a different shape to reject.
        SpecifierKind::Vcs { .. } | SpecifierKind::Path(_) => true,
    }
}

fn intersect_specifiers(a: &VersionSpecifiers, b: &VersionSpecifiers) -> VersionSpecifiers {
    a.iter().chain(b.iter()).cloned().collect()
}

/// Entry point (§4.7): resolves `roots` into a fully populated [`Tree`],
/// returning the tree alongside the [`RequirementId`] assigned to each
/// root in the same order `roots` was given, so a caller juggling several
/// concatenated requirement sets (§6's combined default+extras pass) can
/// recover which ids belong to which set.
pub async fn resolve(
    facade: &MetadataFacade,
    environment: &EnvironmentDescriptor,
    roots: Vec<Requirement>,
    options: &ResolveOptions,
) -> Result<(Tree, Vec<RequirementId>), ResolveError> {
    let mut tree = Tree::new();
    let root_ids: Vec<RequirementId> = roots
        .into_iter()
        .map(|r| tree.add_root_requirement(r))
        .collect();
    resolve_requirement_list(facade, environment, &mut tree, root_ids.clone(), options).await?;
    Ok((tree, root_ids))
}

/// The one batched-gather recursion step (§5): fetches candidates for
/// every requirement in `frontier` concurrently, then selects and
/// recurses sequentially in iteration order.
#[async_recursion(?Send)]
async fn resolve_requirement_list(
    facade: &MetadataFacade,
    environment: &EnvironmentDescriptor,
    tree: &mut Tree,
    frontier: Vec<RequirementId>,
    options: &ResolveOptions,
) -> Result<(), ResolveError> {
    let snapshot: Vec<Requirement> = frontier
        .iter()
        .map(|&id| tree.requirement(id).requirement.clone())
        .collect();

    let fetched: Vec<Result<Vec<CandidateInfo>, ResolveError>> = futures::stream::iter(
        snapshot.iter().map(|req| facade.candidates_for_requirement(req, options)),
    )
    .buffered(options.concurrency)
    .collect()
    .await;

    for (req_id, result) in frontier.iter().copied().zip(fetched) {
        tree.set_candidates(req_id, result?);
    }

    for req_id in frontier {
        resolve_one(facade, environment, tree, req_id, options).await?;
    }
    Ok(())
}

/// §4.7 steps 2a-2d for a single requirement at the current frontier.
async fn resolve_one(
    facade: &MetadataFacade,
    environment: &EnvironmentDescriptor,
    tree: &mut Tree,
    req_id: RequirementId,
    options: &ResolveOptions,
) -> Result<(), ResolveError> {
    let name = tree.requirement(req_id).canonical_name();
    let requested_extras = tree.requirement(req_id).requirement.extras.clone();

    let chosen_info = match tree.live_candidate_for_name(&name) {
        None => {
            // 2b. No live candidate exists: pick the best of this
            // requirement's own candidates.
            let mut infos: Vec<CandidateInfo> =
                tree.requirement(req_id).candidates.keys().cloned().collect();
            infos.sort_by(|a, b| a.selection_key().cmp(&b.selection_key()));
            infos.pop().ok_or_else(|| ResolveError::NoMatchingCandidate {
                name: name.clone(),
                specifier: tree.requirement(req_id).requirement.specifier.to_string(),
            })?
        }
        Some(live_cand_id) => {
            let live_info = tree.candidate(live_cand_id).info.clone();
            if requirement_accepts(&tree.requirement(req_id).requirement, &live_info) {
                // 2c, reuse branch.
                live_info
            } else {
                // 2c, conflict/backtrack branch: intersect every live
                // specifier for this name, filter this requirement's own
                // candidates by it, and fail fast if nothing survives.
                let mut specifier = match &tree.requirement(req_id).requirement.specifier {
                    SpecifierKind::Version(s) => s.clone(),
                    _ => unreachable!("non-version requirements always accept their own synthetic candidate"),
                };
                let other_live_reqs: Vec<RequirementId> =
                    tree.live_requirements_for_name(&name).to_vec();
                for &other in &other_live_reqs {
                    if let SpecifierKind::Version(s) = &tree.requirement(other).requirement.specifier {
                        specifier = intersect_specifiers(&specifier, s);
                    }
                }

                let mut survivors: Vec<CandidateInfo> = tree
                    .requirement(req_id)
                    .candidates
                    .keys()
                    .filter(|info| match &info.version {
                        Some(v) => specifier.contains(v),
                        None => true,
                    })
                    .cloned()
                    .collect();
                if survivors.is_empty() {
                    let owning_req = tree.candidate(live_cand_id).requirement;
                    return Err(ResolveError::RequirementConflict {
                        name: name.clone(),
                        chain_a: render_chain(&tree.ancestor_chain(req_id)),
                        chain_b: render_chain(&tree.ancestor_chain(owning_req)),
                    });
                }
                survivors.sort_by(|a, b| a.selection_key().cmp(&b.selection_key()));
                let best = survivors.pop().expect("checked non-empty above");

                // Promote `best` across every other live duplicate for
                // this name before handling `req_id` itself below.
                for other in other_live_reqs {
                    if other == req_id {
                        continue;
                    }
                    if let Some(old_cand) = tree.requirement(other).live {
                        tree.deactivate_candidate(old_cand);
                    }
                    let other_extras = tree.requirement(other).requirement.extras.clone();
                    let new_cand = *tree
                        .requirement(other)
                        .candidates
                        .get(&best)
                        .expect("every duplicate requirement for a name carries identical candidate infos");
                    tree.make_live(other, new_cand, &other_extras);
                    populate_and_recurse(facade, environment, tree, new_cand, options).await?;
                }
                best
            }
        }
    };

    let chosen_cand_id = *tree
        .requirement(req_id)
        .candidates
        .get(&chosen_info)
        .expect("chosen candidate originates from this requirement's own candidate list");
    tree.make_live(req_id, chosen_cand_id, &requested_extras);
    populate_and_recurse(facade, environment, tree, chosen_cand_id, options).await
}

/// Populates a newly-live candidate's declared dependencies (marker- and
/// cycle-filtered) and recurses §4.7 step 1 on the resulting frontier.
/// Mirrors `Candidate.set_requirements` plus its trailing recursive call.
#[async_recursion(?Send)]
async fn populate_and_recurse(
    facade: &MetadataFacade,
    environment: &EnvironmentDescriptor,
    tree: &mut Tree,
    cand_id: CandidateId,
    options: &ResolveOptions,
) -> Result<(), ResolveError> {
    let info = tree.candidate(cand_id).info.clone();
    let declared = facade.requirements_for(&info).await?;

    let extras_to_evaluate: Vec<String> = {
        let extras = &tree.candidate(cand_id).extras;
        if extras.is_empty() {
            vec![String::new()]
        } else {
            extras.iter().map(|e| e.as_str().to_owned()).collect()
        }
    };

    let owning_requirement = tree.candidate(cand_id).requirement;
    let mut children = Vec::new();

    for req_info in declared {
        let requirement = requirement_from_info(&req_info)?;

        if let Some(marker) = &requirement.marker {
            let refs: Vec<&str> = extras_to_evaluate.iter().map(String::as_str).collect();
            let matches_any = refs
                .iter()
                .any(|&extra| marker.evaluate(&environment.markers, &[extra]));
            if !matches_any {
                tracing::debug!(name = %req_info.name, "marker does not match any requested extra, skipping");
                continue;
            }
        }

        let child_name = requirement.canonical_name();
        if tree.would_cycle(owning_requirement, &child_name) {
            let mut chain: Vec<NormalizedPackageName> = tree.ancestor_chain(owning_requirement);
            chain.insert(0, child_name);
            return Err(ResolveError::CircularDependency {
                chain: render_chain(&chain),
            });
        }

        let child_id = tree.add_child_requirement(cand_id, requirement);
        tree.link_child(cand_id, req_info, child_id);
        children.push(child_id);
    }

    resolve_requirement_list(facade, environment, tree, children, options).await
}
