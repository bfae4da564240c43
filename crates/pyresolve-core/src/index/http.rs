//! A thin `reqwest` wrapper that applies HTTP caching semantics
//! (`http-cache-semantics`) against a content-addressed [`FileStore`]
//! (§4.3 `[ADDED]`). Shared by the Simple/JSON index clients and by
//! artifact downloads.

use super::file_store::FileStore;
use http::header::{ACCEPT, CACHE_CONTROL};
use http_cache_semantics::{AfterResponse, BeforeRequest, CachePolicy};
use miette::Diagnostic;
use reqwest::{header::HeaderMap, Client, Method};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::SystemTime;
use thiserror::Error;
use url::Url;

/// Whether a request should consult, bypass, or refuse to touch the cache.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum CacheMode {
    /// Apply regular HTTP caching semantics.
    Default,
    /// Return a cached entry if one exists; otherwise error without
    /// touching the network. Used by the façade's stale-cache probe
    /// before falling through to a real fetch (§4.5 fetch-through policy).
    OnlyIfCached,
    /// Never read or write the cache.
    NoStore,
}

/// Observability hook: which of the four caching outcomes a request took.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum CacheStatus {
    Fresh,
    StaleButValidated,
    StaleAndChanged,
    Miss,
    Uncacheable,
}

#[derive(Debug)]
pub struct HttpResponse {
    pub status: reqwest::StatusCode,
    pub body: Vec<u8>,
    pub cache_status: CacheStatus,
}

#[derive(Debug, Error, Diagnostic)]
pub enum HttpRequestError {
    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("entry not in cache and CacheMode::OnlyIfCached was requested")]
    NotCached,

    #[error("failed to (de)serialize cache entry: {0}")]
    CacheCodec(String),
}

#[derive(Debug, Clone)]
pub struct Http {
    client: Client,
    cache: Arc<FileStore>,
}

#[derive(Serialize, Deserialize)]
struct CacheEntry {
    policy: CachePolicy,
    status: u16,
    body: Vec<u8>,
}

impl Http {
    pub fn new(client: Client, cache: FileStore) -> Self {
        Http {
            client,
            cache: Arc::new(cache),
        }
    }

    pub async fn get(
        &self,
        url: Url,
        cache_mode: CacheMode,
    ) -> Result<HttpResponse, HttpRequestError> {
        self.request(url, Method::GET, HeaderMap::new(), cache_mode)
            .await
    }

    #[tracing::instrument(skip(self, headers), fields(%url, ?cache_mode))]
    pub async fn request(
        &self,
        url: Url,
        method: Method,
        headers: HeaderMap,
        cache_mode: CacheMode,
    ) -> Result<HttpResponse, HttpRequestError> {
        if cache_mode == CacheMode::NoStore {
            tracing::debug!("bypassing cache (NoStore)");
            let response = self
                .client
                .request(method, url)
                .headers(headers)
                .send()
                .await?
                .error_for_status()?;
            let status = response.status();
            let body = response.bytes().await?.to_vec();
            return Ok(HttpResponse {
                status,
                body,
                cache_status: CacheStatus::Uncacheable,
            });
        }

        let key = cache_key(&url, &method, &headers);
        let cached = self
            .cache
            .get(&key)
            .map(|bytes| {
                serde_json::from_slice::<CacheEntry>(&bytes)
                    .map_err(|e| HttpRequestError::CacheCodec(e.to_string()))
            })
            .transpose()?;

        let request = self
            .client
            .request(method.clone(), url.clone())
            .headers(headers.clone())
            .build()?;

        let http_request = to_http_request(&request)?;

        if let Some(entry) = cached {
            match entry.policy.before_request(&http_request, SystemTime::now()) {
                BeforeRequest::Fresh(_) => {
                    tracing::debug!("cache hit, fresh");
                    return Ok(HttpResponse {
                        status: reqwest::StatusCode::from_u16(entry.status).unwrap_or(reqwest::StatusCode::OK),
                        body: entry.body,
                        cache_status: CacheStatus::Fresh,
                    });
                }
                BeforeRequest::Stale { .. } => {
                    if cache_mode == CacheMode::OnlyIfCached {
                        return Err(HttpRequestError::NotCached);
                    }
                    tracing::debug!("cache hit, stale; revalidating");
                    let response = self.client.execute(request).await?;
                    let http_response = to_http_response(&response);
                    match entry.policy.after_response(&http_request, &http_response, SystemTime::now()) {
                        AfterResponse::NotModified(new_policy, _) => {
                            let new_entry = CacheEntry {
                                policy: new_policy,
                                status: entry.status,
                                body: entry.body.clone(),
                            };
                            self.store(&key, &new_entry)?;
                            Ok(HttpResponse {
                                status: reqwest::StatusCode::from_u16(new_entry.status)
                                    .unwrap_or(reqwest::StatusCode::OK),
                                body: new_entry.body,
                                cache_status: CacheStatus::StaleButValidated,
                            })
                        }
                        AfterResponse::Modified(new_policy, _) => {
                            let status = response.status();
                            let body = response.bytes().await?.to_vec();
                            if new_policy.is_storable() {
                                self.store(
                                    &key,
                                    &CacheEntry {
                                        policy: new_policy,
                                        status: status.as_u16(),
                                        body: body.clone(),
                                    },
                                )?;
                            } else {
                                self.cache.remove(&key)?;
                            }
                            Ok(HttpResponse {
                                status,
                                body,
                                cache_status: CacheStatus::StaleAndChanged,
                            })
                        }
                    }
                }
            }
        } else {
            if cache_mode == CacheMode::OnlyIfCached {
                return Err(HttpRequestError::NotCached);
            }
            tracing::debug!("cache miss");
            let response = self.client.execute(request).await?.error_for_status()?;
            let http_response = to_http_response(&response);
            let policy = CachePolicy::new(&http_request, &http_response);
            let status = response.status();
            let body = response.bytes().await?.to_vec();
            if policy.is_storable() {
                self.store(
                    &key,
                    &CacheEntry {
                        policy,
                        status: status.as_u16(),
                        body: body.clone(),
                    },
                )?;
            }
            Ok(HttpResponse {
                status,
                body,
                cache_status: CacheStatus::Miss,
            })
        }
    }

    fn store(&self, key: &[u8], entry: &CacheEntry) -> Result<(), HttpRequestError> {
        let bytes =
            serde_json::to_vec(entry).map_err(|e| HttpRequestError::CacheCodec(e.to_string()))?;
        self.cache.set(key, &bytes)?;
        Ok(())
    }
}

fn cache_key(url: &Url, method: &Method, headers: &HeaderMap) -> Vec<u8> {
    let mut key = Vec::new();
    key.extend(method.as_str().as_bytes());
    key.push(0);
    let mut url = url.clone();
    url.set_fragment(None);
    key.extend(url.as_str().as_bytes());
    for header_name in [ACCEPT, CACHE_CONTROL] {
        if let Some(value) = headers.get(&header_name) {
            key.push(0);
            key.extend(header_name.as_str().as_bytes());
            key.extend(value.as_bytes());
        }
    }
    key
}

fn to_http_request(request: &reqwest::Request) -> Result<http::Request<()>, HttpRequestError> {
    let mut builder = http::Request::builder()
        .method(request.method().clone())
        .uri(request.url().as_str());
    for (name, value) in request.headers() {
        builder = builder.header(name, value);
    }
    builder.body(()).map_err(|e| HttpRequestError::CacheCodec(e.to_string()))
}

fn to_http_response(response: &reqwest::Response) -> http::Response<()> {
    let mut builder = http::Response::builder().status(response.status());
    for (name, value) in response.headers() {
        builder = builder.header(name, value);
    }
    builder.body(()).expect("status/headers from a real response are always valid")
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn cache_key_ignores_fragment() {
        let url_a = Url::parse("https://pypi.org/simple/attrs/#fragment-a").unwrap();
        let url_b = Url::parse("https://pypi.org/simple/attrs/#fragment-b").unwrap();
        let key_a = cache_key(&url_a, &Method::GET, &HeaderMap::new());
        let key_b = cache_key(&url_b, &Method::GET, &HeaderMap::new());
        assert_eq!(key_a, key_b);
    }
}
