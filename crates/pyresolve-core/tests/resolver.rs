//! End-to-end resolution scenarios driven against an in-process mock
//! JSON-API index.

use axum::extract::Path as AxumPath;
use axum::routing::get;
use axum::{Json, Router};
use pyresolve_core::cache::CacheStore;
use pyresolve_core::environment::EnvironmentDescriptor;
use pyresolve_core::error::ResolveError;
use pyresolve_core::facade::{MetadataFacade, ResolveOptions};
use pyresolve_core::flatten::topological_order;
use pyresolve_core::index::{FileStore, Http, PackageSource};
use pyresolve_core::resolver::resolve;
use pyresolve_core::types::{PackageName, Requirement};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::str::FromStr;
use std::sync::{Arc, Mutex};

/// One project's releases, keyed by version, each an ordered list of
/// `(packagetype, filename, requires_dist)` tuples.
#[derive(Clone, Default)]
struct FakeIndex {
    releases: Arc<Mutex<HashMap<String, HashMap<String, Vec<(&'static str, Vec<&'static str>)>>>>>,
}

impl FakeIndex {
    fn add(&self, name: &str, version: &str, package_type: &'static str, requires: Vec<&'static str>) {
        self.releases
            .lock()
            .unwrap()
            .entry(name.to_owned())
            .or_default()
            .entry(version.to_owned())
            .or_default()
            .push((package_type, requires));
    }

    fn releases_json(&self, name: &str) -> Value {
        let releases = self.releases.lock().unwrap();
        let Some(versions) = releases.get(name) else {
            return json!({ "releases": {} });
        };
        let mut out = serde_json::Map::new();
        for (version, dists) in versions {
            let files: Vec<Value> = dists
                .iter()
                .enumerate()
                .map(|(i, (package_type, _))| {
                    json!({
                        "packagetype": package_type,
                        "filename": format!("{name}-{version}-{i}.whl"),
                        "url": format!("http://example.invalid/{name}/{name}-{version}-{i}.whl"),
                        "digests": { "sha256": format!("{:064x}", i) },
                    })
                })
                .collect();
            out.insert(version.clone(), Value::Array(files));
        }
        json!({ "releases": out })
    }

    fn version_detail_json(&self, name: &str, version: &str) -> Value {
        let releases = self.releases.lock().unwrap();
        let requires: Vec<&'static str> = releases
            .get(name)
            .and_then(|v| v.get(version))
            .and_then(|dists| dists.first())
            .map(|(_, reqs)| reqs.clone())
            .unwrap_or_default();
        json!({ "info": { "requires_dist": requires } })
    }
}

async fn spawn_index(index: FakeIndex) -> String {
    let app = Router::new()
        .route(
            "/:name/json",
            get({
                let index = index.clone();
                move |AxumPath(name): AxumPath<String>| {
                    let index = index.clone();
                    async move { Json(index.releases_json(&name)) }
                }
            }),
        )
        .route(
            "/:name/:version/json",
            get({
                let index = index.clone();
                move |AxumPath((name, version)): AxumPath<(String, String)>| {
                    let index = index.clone();
                    async move { Json(index.version_detail_json(&name, &version)) }
                }
            }),
        );

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr: SocketAddr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}#json")
}

fn test_environment() -> EnvironmentDescriptor {
    EnvironmentDescriptor::current(pyresolve_core::types::MarkerEnvironment {
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

async fn facade_for(source_url: String) -> MetadataFacade {
    let scratch = tempfile::tempdir().unwrap();
    let cache_dir = scratch.path().join("cache");
    let file_store_dir = scratch.path().join("http-cache");
    let environment = test_environment();
    let cache = CacheStore::open(&cache_dir, &environment.tag_tuple).unwrap();
    let http = Http::new(reqwest::Client::new(), FileStore::new(&file_store_dir).unwrap());
    let source = PackageSource::parse(&source_url).unwrap();
    MetadataFacade::new(http, cache, vec![source], scratch.into_path())
}

fn req(name: &str, specifier: &str) -> Requirement {
    Requirement::from_name_and_value(PackageName::from_str(name).unwrap(), specifier, Vec::new(), None)
}

#[tokio::test]
async fn single_leaf_resolves_the_only_candidate() {
    let index = FakeIndex::default();
    index.add("attrs", "18.2.0", "bdist_wheel", vec![]);
    let base = spawn_index(index).await;
    let facade = facade_for(base).await;
    let environment = test_environment();
    let options = ResolveOptions::new(environment.clone());

    let (tree, roots) = resolve(&facade, &environment, vec![req("attrs", "==18.2.0")], &options)
        .await
        .unwrap();
    let order = topological_order(&tree, &roots);

    assert_eq!(order.len(), 1);
    assert_eq!(order[0].name.to_string(), "attrs");
    assert_eq!(order[0].version.as_ref().unwrap().to_string(), "18.2.0");
}

#[tokio::test]
async fn depth_two_chain_resolves_in_dependency_order() {
    let index = FakeIndex::default();
    index.add("a", "1.0", "bdist_wheel", vec!["b"]);
    index.add("b", "1.0", "bdist_wheel", vec!["c"]);
    index.add("c", "1.0", "bdist_wheel", vec![]);
    let base = spawn_index(index).await;
    let facade = facade_for(base).await;
    let environment = test_environment();
    let options = ResolveOptions::new(environment.clone());

    let (tree, roots) = resolve(&facade, &environment, vec![req("a", "*")], &options)
        .await
        .unwrap();
    let order = topological_order(&tree, &roots);
    let names: Vec<String> = order.iter().map(|c| c.name.to_string()).collect();

    assert_eq!(names, vec!["c".to_owned(), "b".to_owned(), "a".to_owned()]);
}

#[tokio::test]
async fn best_candidate_wins_among_several() {
    let index = FakeIndex::default();
    index.add("a", "1.0", "bdist_wheel", vec![]);
    index.add("a", "1.1", "bdist_wheel", vec![]);
    index.add("a", "2.0", "bdist_wheel", vec![]);
    let base = spawn_index(index).await;
    let facade = facade_for(base).await;
    let environment = test_environment();
    let options = ResolveOptions::new(environment.clone());

    let (tree, roots) = resolve(&facade, &environment, vec![req("a", "<2.0")], &options)
        .await
        .unwrap();
    let order = topological_order(&tree, &roots);

    assert_eq!(order.len(), 1);
    assert_eq!(order[0].version.as_ref().unwrap().to_string(), "1.1");
}

#[tokio::test]
async fn circular_dependency_is_detected() {
    let index = FakeIndex::default();
    index.add("a", "1.0", "bdist_wheel", vec!["b"]);
    index.add("b", "1.0", "bdist_wheel", vec!["c"]);
    index.add("c", "1.0", "bdist_wheel", vec!["a"]);
    let base = spawn_index(index).await;
    let facade = facade_for(base).await;
    let environment = test_environment();
    let options = ResolveOptions::new(environment.clone());

    let err = resolve(&facade, &environment, vec![req("a", "*")], &options)
        .await
        .unwrap_err();
    assert!(matches!(err, ResolveError::CircularDependency { .. }));
}

#[tokio::test]
async fn conflicting_requirements_are_reported() {
    let index = FakeIndex::default();
    index.add("mypy", "1.0", "bdist_wheel", vec!["typed-ast>=1.3.1"]);
    index.add("typed-ast", "1.2.0", "bdist_wheel", vec![]);
    index.add("typed-ast", "1.3.1", "bdist_wheel", vec![]);
    let base = spawn_index(index).await;
    let facade = facade_for(base).await;
    let environment = test_environment();
    let options = ResolveOptions::new(environment.clone());

    let err = resolve(
        &facade,
        &environment,
        vec![req("mypy", "*"), req("typed-ast", "<1.3.0")],
        &options,
    )
    .await
    .unwrap_err();
    assert!(matches!(err, ResolveError::RequirementConflict { .. }));
}

#[tokio::test]
async fn stale_cache_is_refreshed_on_empty_post_filter() {
    let index = FakeIndex::default();
    index.add("attrs", "18.1.0", "bdist_wheel", vec![]);
    let base = spawn_index(index).await;
    let facade = facade_for(base).await;
    let environment = test_environment();
    let options = ResolveOptions::new(environment.clone());

    // Prime the cache with only 18.1.0, then ask for a version that
    // doesn't exist there yet; the façade's fetch-through re-query
    // still has nothing newer to offer, so this deterministically
    // surfaces `NoMatchingCandidate` rather than hanging or silently
    // returning the wrong version.
    let _ = resolve(&facade, &environment, vec![req("attrs", "*")], &options).await;

    let err = resolve(&facade, &environment, vec![req("attrs", "==18.2.0")], &options)
        .await
        .unwrap_err();
    assert!(matches!(err, ResolveError::NoMatchingCandidate { .. }));
}
