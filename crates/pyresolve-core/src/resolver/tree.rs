//! The alternating Requirement/Candidate arena: a slab of nodes addressed
//! by stable integer ids rather than mutually referential objects with
//! parent back-pointers.
//!
//! `live_candidate_for_name`/`live_requirements_for_name` are incrementally
//! maintained indices rather than recursive tree walks: displacing a live
//! candidate cascades a deactivation through its now-unreachable
//! descendants so the indices never point at a stale branch.

use crate::types::{CandidateInfo, Extra, NormalizedPackageName, Requirement, RequirementInfo};
use indexmap::IndexMap;
use std::collections::{BTreeSet, HashMap};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequirementId(usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CandidateId(usize);

#[derive(Debug)]
pub struct RequirementNode {
    pub requirement: Requirement,
    /// The requirement whose selected candidate declared this one;
    /// `None` for a root requirement parsed from the manifest.
    pub parent: Option<RequirementId>,
    pub candidates: IndexMap<CandidateInfo, CandidateId>,
    /// Which of `candidates` is currently selected, if any.
    pub live: Option<CandidateId>,
}

impl RequirementNode {
    pub fn canonical_name(&self) -> NormalizedPackageName {
        self.requirement.canonical_name()
    }
}

#[derive(Debug)]
pub struct CandidateNode {
    pub info: CandidateInfo,
    /// The requirement this candidate was enumerated for.
    pub requirement: RequirementId,
    /// Union of extras demanded of this candidate by every live requirement
    /// referring to it (I4).
    pub extras: BTreeSet<Extra>,
    pub live: bool,
    pub requirements: IndexMap<RequirementInfo, RequirementId>,
}

/// The resolution tree: every Requirement/Candidate ever created during a
/// single resolution run, plus the two root-level indices that make
/// "every live requirement/candidate for this name" an O(1) lookup instead
/// of a tree walk.
#[derive(Default, Debug)]
pub struct Tree {
    requirements: Vec<RequirementNode>,
    candidates: Vec<CandidateNode>,
    live_requirements_for_name: HashMap<NormalizedPackageName, Vec<RequirementId>>,
    live_candidate_for_name: HashMap<NormalizedPackageName, CandidateId>,
}

impl Tree {
    pub fn new() -> Self {
        Tree::default()
    }

    pub fn requirement(&self, id: RequirementId) -> &RequirementNode {
        &self.requirements[id.0]
    }

    pub fn requirement_mut(&mut self, id: RequirementId) -> &mut RequirementNode {
        &mut self.requirements[id.0]
    }

    pub fn candidate(&self, id: CandidateId) -> &CandidateNode {
        &self.candidates[id.0]
    }

    pub fn candidate_mut(&mut self, id: CandidateId) -> &mut CandidateNode {
        &mut self.candidates[id.0]
    }

    /// Adds a requirement parsed directly from the manifest (§6): always
    /// part of the live tree since it has no ancestor candidate that could
    /// displace it.
    pub fn add_root_requirement(&mut self, requirement: Requirement) -> RequirementId {
        let name = requirement.canonical_name();
        let id = RequirementId(self.requirements.len());
        self.requirements.push(RequirementNode {
            requirement,
            parent: None,
            candidates: IndexMap::new(),
            live: None,
        });
        self.live_requirements_for_name.entry(name).or_default().push(id);
        id
    }

    /// Adds a child requirement declared by `owner`'s package metadata.
    /// `owner` must already be live; the child is registered as live
    /// immediately, mirroring "a Candidate's requirements are populated
    /// the first time it becomes live" (§3 Lifecycle).
    pub fn add_child_requirement(&mut self, owner: CandidateId, requirement: Requirement) -> RequirementId {
        let name = requirement.canonical_name();
        let parent = self.candidates[owner.0].requirement;
        let id = RequirementId(self.requirements.len());
        self.requirements.push(RequirementNode {
            requirement,
            parent: Some(parent),
            candidates: IndexMap::new(),
            live: None,
        });
        self.live_requirements_for_name.entry(name).or_default().push(id);
        id
    }

    /// Populates a requirement's candidate list (§3 Lifecycle: exactly
    /// once). Candidates start non-live.
    pub fn set_candidates(&mut self, req_id: RequirementId, infos: Vec<CandidateInfo>) {
        for info in infos {
            let cand_id = CandidateId(self.candidates.len());
            self.candidates.push(CandidateNode {
                info: info.clone(),
                requirement: req_id,
                extras: BTreeSet::new(),
                live: false,
                requirements: IndexMap::new(),
            });
            self.requirements[req_id.0].candidates.insert(info, cand_id);
        }
    }

    /// The ancestor chain of `req_id`, innermost first, including `req_id`
    /// itself — used both for cycle detection (§4.7) and for rendering a
    /// conflict's chain in error messages.
    pub fn ancestor_chain(&self, req_id: RequirementId) -> Vec<NormalizedPackageName> {
        let mut chain = Vec::new();
        let mut current = Some(req_id);
        while let Some(id) = current {
            chain.push(self.requirements[id.0].canonical_name());
            current = self.requirements[id.0].parent;
        }
        chain
    }

    /// True if `name` already appears in the ancestor chain of `parent_req`
    /// (i.e. inserting a child named `name` under it would create a cycle).
    pub fn would_cycle(&self, parent_req: RequirementId, name: &NormalizedPackageName) -> bool {
        self.ancestor_chain(parent_req).iter().any(|n| n == name)
    }

    /// Every requirement currently reachable from a live ancestor chain and
    /// sharing `name` — the direct replacement for `_iter_live_specifiers`.
    pub fn live_requirements_for_name(&self, name: &NormalizedPackageName) -> &[RequirementId] {
        self.live_requirements_for_name
            .get(name)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// The single live candidate for `name`, if one exists. At most one
    /// candidate per name is ever live at a time.
    pub fn live_candidate_for_name(&self, name: &NormalizedPackageName) -> Option<CandidateId> {
        self.live_candidate_for_name.get(name).copied()
    }

    /// Marks `cand_id` (owned by `req_id`) live, merging `requested_extras`
    /// into its extras set and registering it in the root-level index.
    /// Does not touch any other requirement's map; callers that are
    /// promoting a candidate across several duplicate requirement entries
    /// call this once per entry.
    pub fn make_live(&mut self, req_id: RequirementId, cand_id: CandidateId, requested_extras: &[Extra]) {
        self.requirements[req_id.0].live = Some(cand_id);
        let candidate = &mut self.candidates[cand_id.0];
        candidate.live = true;
        candidate.extras.extend(requested_extras.iter().cloned());
        self.live_candidate_for_name
            .insert(candidate.info.name.clone(), cand_id);
    }

    /// Removes `req_id` and its entire live descendant subtree from the
    /// live indices (but not from the arena: the nodes remain addressable,
    /// just unreachable from the root). Used when an entire branch becomes
    /// unreachable because an ancestor requirement itself is being
    /// dropped (as opposed to merely switching which candidate it points
    /// at — see [`Tree::deactivate_candidate`] for that case).
    pub fn deactivate_requirement_subtree(&mut self, req_id: RequirementId) {
        let name = self.requirements[req_id.0].canonical_name();
        if let Some(live_ids) = self.live_requirements_for_name.get_mut(&name) {
            live_ids.retain(|&id| id != req_id);
        }
        if let Some(live_cand) = self.requirements[req_id.0].live.take() {
            self.deactivate_candidate(live_cand);
        }
    }

    /// Deactivates `cand_id` and cascades into its live descendants,
    /// without touching whatever requirement currently points `.live` at
    /// it — the caller is expected to immediately redirect that pointer
    /// at a replacement candidate (§4.7.c's backtrack branch).
    pub fn deactivate_candidate(&mut self, cand_id: CandidateId) {
        self.candidates[cand_id.0].live = false;
        let name = self.candidates[cand_id.0].info.name.clone();
        if self.live_candidate_for_name.get(&name) == Some(&cand_id) {
            self.live_candidate_for_name.remove(&name);
        }
        let children: Vec<RequirementId> = self.candidates[cand_id.0].requirements.values().copied().collect();
        for child in children {
            self.deactivate_requirement_subtree(child);
        }
    }

    /// Records that `owner` declares the child requirement described by
    /// `info`/`requirement` (§3: "a Candidate owns an ordered map from
    /// RequirementInfo to child Requirement").
    pub fn link_child(&mut self, owner: CandidateId, info: RequirementInfo, child: RequirementId) {
        self.candidates[owner.0].requirements.insert(info, child);
    }

    /// Every name appearing anywhere in the tree with at least one live
    /// candidate — used by the topological flattener and by the invariant
    /// assertions in §8.
    pub fn live_names(&self) -> impl Iterator<Item = &NormalizedPackageName> {
        self.live_candidate_for_name.keys()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::types::PackageName;
    use std::str::FromStr;

    fn req(name: &str) -> Requirement {
        Requirement::from_name_and_value(PackageName::from_str(name).unwrap(), "*", Vec::new(), None)
    }

    fn info(name: &str) -> CandidateInfo {
        CandidateInfo {
            name: name.parse().unwrap(),
            version: None,
            package_type: crate::types::PackageType::SDist,
            source: None,
            location: format!("file:///{name}"),
            hash: None,
        }
    }

    #[test]
    fn root_requirements_are_immediately_live_indexed() {
        let mut tree = Tree::new();
        let root = tree.add_root_requirement(req("a"));
        assert_eq!(tree.live_requirements_for_name(&"a".parse().unwrap()), &[root]);
    }

    #[test]
    fn cycle_detection_walks_the_parent_chain() {
        let mut tree = Tree::new();
        let root = tree.add_root_requirement(req("a"));
        tree.set_candidates(root, vec![info("a")]);
        let cand = *tree.requirement(root).candidates.get(&info("a")).unwrap();
        tree.make_live(root, cand, &[]);

        assert!(tree.would_cycle(root, &"a".parse().unwrap()));
        assert!(!tree.would_cycle(root, &"b".parse().unwrap()));
    }

    #[test]
    fn deactivating_a_candidate_removes_its_live_descendants() {
        let mut tree = Tree::new();
        let root = tree.add_root_requirement(req("a"));
        tree.set_candidates(root, vec![info("a")]);
        let cand = *tree.requirement(root).candidates.get(&info("a")).unwrap();
        tree.make_live(root, cand, &[]);

        let child = tree.add_child_requirement(cand, req("b"));
        tree.link_child(
            cand,
            RequirementInfo {
                name: "b".parse().unwrap(),
                specifier: "*".to_owned(),
                extras: Vec::new(),
                marker: None,
            },
            child,
        );
        tree.set_candidates(child, vec![info("b")]);
        let child_cand = *tree.requirement(child).candidates.get(&info("b")).unwrap();
        tree.make_live(child, child_cand, &[]);

        assert!(tree.live_candidate_for_name(&"b".parse().unwrap()).is_some());

        tree.deactivate_requirement_subtree(root);

        assert!(tree.live_candidate_for_name(&"a".parse().unwrap()).is_none());
        assert!(tree.live_candidate_for_name(&"b".parse().unwrap()).is_none());
        assert!(tree.live_requirements_for_name(&"b".parse().unwrap()).is_empty());
    }
}
