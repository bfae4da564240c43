//! The resolution engine (§4.7): the alternating Requirement/Candidate
//! arena plus the single-pass selection algorithm that walks it.

pub mod solve;
pub mod tree;

pub use solve::resolve;
pub use tree::{CandidateId, CandidateNode, RequirementId, RequirementNode, Tree};
