//! The archive introspector (§4.4): extracts metadata from downloaded
//! wheels directly, and from sdists/VCS checkouts via a subprocess-isolated
//! build-backend pipe.

pub mod sdist;
pub mod vcs;
pub mod wheel;

pub use sdist::{introspect_requirements, unpack as unpack_sdist, SDistError};
pub use vcs::{clone as vcs_clone, requirements_for as vcs_requirements_for};
pub use wheel::{extract_metadata as extract_wheel_metadata, WheelMetadataError};
