//! Request normalization.
//!
//! # Responsibilities
//! - Resolve the request target against the declared host into a full URL
//! - Fold multi-value headers into discrete values
//! - Parse query parameters and copy path captures from the matched route
//! - Buffer the request body before the handler runs
//!
//! # Design Decisions
//! - A target that cannot form a URL is a distinct error, never swallowed
//! - Cookies split on `; `, every other header splits on `, `
//! - `GET` and `HEAD` never read a body, whatever the transport carries
//! - Adaptation only happens against the route that matched

use std::borrow::Cow;

use axum::body::Body;
use axum::http::header::{HeaderMap, HeaderValue, COOKIE, HOST};
use axum::http::{Method, Request, Uri};
use bytes::Bytes;
use thiserror::Error;
use url::Url;

use crate::routing::{PathParams, RouteEntry};

/// Error raised while turning a transport request into a [`NormalizedRequest`].
#[derive(Debug, Error)]
pub enum RequestError {
    /// The target could not be resolved into a URL.
    #[error("cannot build a URL from target {target:?} with host {host:?}: {source}")]
    BadRequestUrl {
        target: String,
        host: String,
        source: url::ParseError,
    },

    /// Reading the request body failed.
    #[error("failed to read request body: {0}")]
    Body(#[source] axum::Error),
}

/// Query parameters in the order they appear in the URL.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams(Vec<(String, String)>);

impl QueryParams {
    pub fn from_url(url: &Url) -> Self {
        Self(url.query_pairs().into_owned().collect())
    }

    /// First value for `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Every value for `key`, in order.
    pub fn get_all<'a>(&'a self, key: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.0
            .iter()
            .filter(move |(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.iter().any(|(k, _)| k == key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// A request as seen by route handlers.
#[derive(Debug, Clone)]
pub struct NormalizedRequest {
    method: Method,
    url: Url,
    headers: HeaderMap,
    query: QueryParams,
    params: PathParams,
    body: Option<Bytes>,
}

impl NormalizedRequest {
    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn path(&self) -> &str {
        self.url.path()
    }

    /// Headers, with multi-value headers folded into repeated entries.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn query(&self) -> &QueryParams {
        &self.query
    }

    /// Captures from the matched route; empty for exact routes.
    pub fn params(&self) -> &PathParams {
        &self.params
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    /// The buffered body; always `None` for `GET` and `HEAD`.
    pub fn body(&self) -> Option<&Bytes> {
        self.body.as_ref()
    }

    /// The body decoded as UTF-8, replacing invalid sequences.
    pub fn text(&self) -> Option<Cow<'_, str>> {
        self.body.as_ref().map(|b| String::from_utf8_lossy(b))
    }
}

/// Resolve the request target against the `Host` header.
///
/// Falls back to the URI authority (HTTP/2) and then to `localhost` when no
/// host was declared.
pub fn parse_request_url(uri: &Uri, headers: &HeaderMap) -> Result<Url, RequestError> {
    let host = headers
        .get(HOST)
        .map(|h| String::from_utf8_lossy(h.as_bytes()).into_owned())
        .or_else(|| uri.authority().map(|a| a.to_string()))
        .unwrap_or_else(|| "localhost".to_string());
    let target = uri.to_string();

    let resolved = Url::parse(&format!("http://{host}")).and_then(|base| base.join(&target));
    resolved.map_err(|source| RequestError::BadRequestUrl {
        target,
        host,
        source,
    })
}

/// Split multi-value headers into one entry per value, preserving order.
pub fn fold_headers(headers: &HeaderMap) -> HeaderMap {
    let mut folded = HeaderMap::with_capacity(headers.len());

    for (name, value) in headers.iter() {
        let Ok(text) = value.to_str() else {
            folded.append(name.clone(), value.clone());
            continue;
        };

        let separator = if *name == COOKIE { "; " } else { ", " };
        for piece in text.split(separator) {
            match HeaderValue::from_str(piece) {
                Ok(v) => {
                    folded.append(name.clone(), v);
                }
                Err(_) => {
                    folded.append(name.clone(), value.clone());
                    break;
                }
            }
        }
    }

    folded
}

/// Build the handler-facing request for a matched route.
///
/// `url` must be the URL the route was matched against.
pub async fn adapt_request(
    request: Request<Body>,
    url: Url,
    route: &RouteEntry,
) -> Result<NormalizedRequest, RequestError> {
    let (parts, body) = request.into_parts();

    let params = if route.path.is_exact_match() {
        PathParams::new()
    } else {
        route.path.captures(url.path()).unwrap_or_default()
    };

    let body = if parts.method == Method::GET || parts.method == Method::HEAD {
        None
    } else {
        let bytes = axum::body::to_bytes(body, usize::MAX)
            .await
            .map_err(RequestError::Body)?;
        Some(bytes)
    };

    Ok(NormalizedRequest {
        headers: fold_headers(&parts.headers),
        query: QueryParams::from_url(&url),
        method: parts.method,
        url,
        params,
        body,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::handler::handler_fn;
    use crate::http::Response;
    use crate::routing::{RouteMethod, RoutePath};

    fn route(method: RouteMethod, path: &str) -> RouteEntry {
        RouteEntry::new(
            method,
            RoutePath::compile(path).unwrap(),
            handler_fn(|_req| async { Ok(Response::ok()) }),
        )
    }

    fn url_for(req: &Request<Body>) -> Url {
        parse_request_url(req.uri(), req.headers()).unwrap()
    }

    #[test]
    fn test_url_resolved_against_host() {
        let req = Request::builder()
            .uri("/users/1?x=2")
            .header(HOST, "example.com:8080")
            .body(Body::empty())
            .unwrap();
        let url = url_for(&req);
        assert_eq!(url.as_str(), "http://example.com:8080/users/1?x=2");
        assert_eq!(url.path(), "/users/1");
    }

    #[test]
    fn test_url_without_host_uses_localhost() {
        let req = Request::builder().uri("/a").body(Body::empty()).unwrap();
        assert_eq!(url_for(&req).as_str(), "http://localhost/a");
    }

    #[test]
    fn test_malformed_host_is_bad_request_url() {
        let req = Request::builder()
            .uri("/a")
            .header(HOST, "exa mple.com")
            .body(Body::empty())
            .unwrap();
        let err = parse_request_url(req.uri(), req.headers()).unwrap_err();
        assert!(matches!(err, RequestError::BadRequestUrl { .. }));
    }

    #[test]
    fn test_fold_headers_splits_values() {
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_static("a=1; b=2"));
        headers.insert("accept", HeaderValue::from_static("text/html, application/json"));
        headers.append("x-tag", HeaderValue::from_static("one"));
        headers.append("x-tag", HeaderValue::from_static("two, three"));

        let folded = fold_headers(&headers);

        let cookies: Vec<_> = folded.get_all(COOKIE).iter().collect();
        assert_eq!(cookies, ["a=1", "b=2"]);
        let accept: Vec<_> = folded.get_all("accept").iter().collect();
        assert_eq!(accept, ["text/html", "application/json"]);
        let tags: Vec<_> = folded.get_all("x-tag").iter().collect();
        assert_eq!(tags, ["one", "two", "three"]);
    }

    #[test]
    fn test_cookie_not_split_on_comma() {
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_static("a=1, 2; b=3"));
        let folded = fold_headers(&headers);
        let cookies: Vec<_> = folded.get_all(COOKIE).iter().collect();
        assert_eq!(cookies, ["a=1, 2", "b=3"]);
    }

    #[test]
    fn test_query_params_keep_repeats() {
        let url = Url::parse("http://h/p?tag=a&tag=b&q=hello%20world").unwrap();
        let query = QueryParams::from_url(&url);
        assert_eq!(query.len(), 3);
        assert_eq!(query.get("q"), Some("hello world"));
        assert_eq!(query.get_all("tag").collect::<Vec<_>>(), ["a", "b"]);
        assert!(!query.contains_key("missing"));
    }

    #[test]
    fn test_query_lookup_outlives_key() {
        let url = Url::parse("http://h/p?name=ferris").unwrap();
        let query = QueryParams::from_url(&url);

        let value = {
            let key = String::from("name");
            query.get(&key)
        };
        assert_eq!(value, Some("ferris"));
    }

    #[tokio::test]
    async fn test_adapt_post_buffers_body_and_params() {
        let entry = route(RouteMethod::Post, "/users/:id");
        let req = Request::builder()
            .method(Method::POST)
            .uri("/users/42?verbose=1")
            .header(HOST, "localhost")
            .body(Body::from("hello"))
            .unwrap();
        let url = url_for(&req);

        let normalized = adapt_request(req, url, &entry).await.unwrap();
        assert_eq!(*normalized.method(), Method::POST);
        assert_eq!(normalized.param("id"), Some("42"));
        assert_eq!(normalized.query().get("verbose"), Some("1"));
        assert_eq!(normalized.text().as_deref(), Some("hello"));
    }

    #[tokio::test]
    async fn test_adapt_get_ignores_body() {
        let entry = route(RouteMethod::Get, "/a");
        let req = Request::builder()
            .method(Method::GET)
            .uri("/a")
            .body(Body::from("ignored"))
            .unwrap();
        let url = url_for(&req);

        let normalized = adapt_request(req, url, &entry).await.unwrap();
        assert!(normalized.body().is_none());
        assert!(normalized.params().is_empty());
    }

    #[tokio::test]
    async fn test_adapt_empty_post_body_is_present() {
        let entry = route(RouteMethod::Delete, "/a");
        let req = Request::builder()
            .method(Method::DELETE)
            .uri("/a")
            .body(Body::empty())
            .unwrap();
        let url = url_for(&req);

        let normalized = adapt_request(req, url, &entry).await.unwrap();
        assert_eq!(normalized.body().map(|b| b.len()), Some(0));
    }
}
