//! The index client (§4.3): talks to PEP 503 Simple-API and PyPI JSON-API
//! package sources through a shared, cache-aware HTTP layer.

pub mod file_store;
pub mod html;
pub mod http;
pub mod json_api;
pub mod package_sources;

pub use file_store::FileStore;
pub use http::{CacheMode, CacheStatus, Http, HttpRequestError, HttpResponse};
pub use package_sources::{candidates_for, PackageSource};
