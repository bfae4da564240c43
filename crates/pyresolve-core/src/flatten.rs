//! The topological flattener: produces an install order from a resolved
//! [`Tree`] by walking it post-order from the roots.

use crate::environment::EnvironmentDescriptor;
use crate::resolver::{CandidateId, RequirementId, Tree};
use crate::types::{CandidateInfo, NormalizedPackageName};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Walks the live tree post-order starting from `roots`, yielding each live
/// candidate's info exactly once (deduplicated by canonical name), such
/// that for any dependency edge A -> B, B precedes A (§4.8, §8).
pub fn topological_order(tree: &Tree, roots: &[RequirementId]) -> Vec<CandidateInfo> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for &root in roots {
        visit_requirement(tree, root, &mut seen, &mut out);
    }
    out
}

fn visit_requirement(
    tree: &Tree,
    req_id: RequirementId,
    seen: &mut HashSet<NormalizedPackageName>,
    out: &mut Vec<CandidateInfo>,
) {
    if let Some(live_cand) = tree.requirement(req_id).live {
        visit_candidate(tree, live_cand, seen, out);
    }
}

fn visit_candidate(
    tree: &Tree,
    cand_id: CandidateId,
    seen: &mut HashSet<NormalizedPackageName>,
    out: &mut Vec<CandidateInfo>,
) {
    let candidate = tree.candidate(cand_id);
    if !candidate.live || seen.contains(&candidate.info.name) {
        return;
    }
    seen.insert(candidate.info.name.clone());

    let children: Vec<RequirementId> = candidate.requirements.values().copied().collect();
    for child in children {
        visit_requirement(tree, child, seen, out);
    }

    out.push(tree.candidate(cand_id).info.clone());
}

/// One entry in a [`LockDocument`]'s candidate lists (§6): exactly the
/// field set the lock file format names, nothing more.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockedCandidate {
    pub name: String,
    pub version: Option<String>,
    pub package_type: String,
    pub source: Option<String>,
    pub location: String,
    pub hash_alg: Option<String>,
    pub hash_val: Option<String>,
}

impl From<&CandidateInfo> for LockedCandidate {
    fn from(info: &CandidateInfo) -> Self {
        let (hash_alg, hash_val) = match &info.hash {
            Some((alg, val)) => (Some(alg.to_string()), Some(val.clone())),
            None => (None, None),
        };
        LockedCandidate {
            name: info.name.to_string(),
            version: info.version.as_ref().map(ToString::to_string),
            package_type: info.package_type.to_string(),
            source: info.source.clone(),
            location: info.location.clone(),
            hash_alg,
            hash_val,
        }
    }
}

/// A plain, serializable projection of a resolution's flattened candidate
/// lists, matching §6's lock file shape — the environment tag tuple plus
/// one ordered candidate list for the default set and one per extra.
///
/// This is a data shape only: actual lock-file I/O (writing it to disk,
/// reading it back, and checking a loaded document's tag tuple against
/// the running environment) is the out-of-scope front end's concern
/// (§1); this crate hands it a ready-made value to serialize.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockDocument {
    pub python: String,
    pub abi: String,
    pub platform: String,
    pub manylinux1: bool,
    pub default: Vec<LockedCandidate>,
    #[serde(default)]
    pub extras: IndexMap<String, Vec<LockedCandidate>>,
}

impl LockDocument {
    pub fn new(
        environment: &EnvironmentDescriptor,
        default: Vec<CandidateInfo>,
        extras: IndexMap<String, Vec<CandidateInfo>>,
    ) -> Self {
        let tag_tuple = &environment.tag_tuple;
        LockDocument {
            python: tag_tuple.implementation_version.clone(),
            abi: tag_tuple.abi.clone(),
            platform: tag_tuple.platform.clone(),
            manylinux1: tag_tuple.manylinux1,
            default: default.iter().map(LockedCandidate::from).collect(),
            extras: extras
                .into_iter()
                .map(|(name, candidates)| (name, candidates.iter().map(LockedCandidate::from).collect()))
                .collect(),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::types::{PackageName, PackageType, Requirement};
    use std::str::FromStr;

    fn info(name: &str) -> CandidateInfo {
        CandidateInfo {
            name: name.parse().unwrap(),
            version: None,
            package_type: PackageType::SDist,
            source: None,
            location: format!("file:///{name}"),
            hash: None,
        }
    }

    fn req(name: &str) -> Requirement {
        Requirement::from_name_and_value(PackageName::from_str(name).unwrap(), "*", Vec::new(), None)
    }

    #[test]
    fn dependencies_precede_dependents() {
        let mut tree = Tree::new();
        let a = tree.add_root_requirement(req("a"));
        tree.set_candidates(a, vec![info("a")]);
        let a_cand = *tree.requirement(a).candidates.get(&info("a")).unwrap();
        tree.make_live(a, a_cand, &[]);

        let b = tree.add_child_requirement(a_cand, req("b"));
        tree.link_child(
            a_cand,
            crate::types::RequirementInfo {
                name: "b".parse().unwrap(),
                specifier: "*".to_owned(),
                extras: Vec::new(),
                marker: None,
            },
            b,
        );
        tree.set_candidates(b, vec![info("b")]);
        let b_cand = *tree.requirement(b).candidates.get(&info("b")).unwrap();
        tree.make_live(b, b_cand, &[]);

        let order = topological_order(&tree, &[a]);
        let names: Vec<String> = order.iter().map(|c| c.name.to_string()).collect();
        assert_eq!(names, vec!["b".to_owned(), "a".to_owned()]);
    }

    fn descriptor() -> EnvironmentDescriptor {
        EnvironmentDescriptor::current(crate::types::MarkerEnvironment {
            implementation_name: "cpython".to_owned(),
            implementation_version: "3.11.0".parse().unwrap(),
            os_name: "posix".to_owned(),
            platform_machine: "x86_64".to_owned(),
            platform_python_implementation: "CPython".to_owned(),
            platform_release: "6.0.0".to_owned(),
            platform_system: "Linux".to_owned(),
            platform_version: "#1 SMP".to_owned(),
            python_full_version: "3.11.0".parse().unwrap(),
            python_version: "3.11".parse().unwrap(),
            sys_platform: "linux".to_owned(),
        })
    }

    #[test]
    fn lock_document_round_trips_through_json() {
        let env = descriptor();
        let doc = LockDocument::new(&env, vec![info("a")], IndexMap::new());
        let json = serde_json::to_string(&doc).unwrap();
        let loaded: LockDocument = serde_json::from_str(&json).unwrap();
        assert_eq!(loaded.default.len(), 1);
        assert_eq!(loaded.default[0].name, "a");
    }
}
