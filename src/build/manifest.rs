//! Filesystem build pipeline over TOML route manifests.
//!
//! Each `*.toml` file under the routes directory declares one route:
//!
//! ```toml
//! method = "GET"
//! path = "/users/:id"
//!
//! [handler]
//! kind = "static"
//! status = 200
//! headers = { "content-type" = "text/plain" }
//! body = "user {id}"
//! ```
//!
//! Handler kinds: `static` (fixed response, `{param}` placeholders filled
//! from path captures), `echo` (request body back), `json` (a TOML value
//! served as JSON) and `named` (a handler from the [`HandlerRegistry`]).

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::http::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use axum::http::StatusCode;
use serde::Deserialize;

use crate::build::pipeline::{BuildPipeline, ChangeStream, RouteModule, WatchHandle};
use crate::build::registry::HandlerRegistry;
use crate::build::watcher::RouteWatcher;
use crate::build::BuildError;
use crate::http::handler::{handler_fn, Handler};
use crate::http::Response;
use crate::routing::{RouteMethod, RoutePath};

const MANIFEST_EXTENSION: &str = "toml";

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RouteManifest {
    method: String,
    path: String,
    handler: HandlerSpec,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum HandlerSpec {
    Static {
        #[serde(default = "default_status")]
        status: u16,
        status_text: Option<String>,
        #[serde(default)]
        headers: BTreeMap<String, String>,
        body: Option<String>,
    },
    Echo {
        #[serde(default = "default_status")]
        status: u16,
        #[serde(default)]
        headers: BTreeMap<String, String>,
    },
    Json {
        #[serde(default = "default_status")]
        status: u16,
        #[serde(default)]
        headers: BTreeMap<String, String>,
        value: toml::Value,
    },
    Named {
        name: String,
    },
}

fn default_status() -> u16 {
    200
}

/// Build pipeline reading route manifests from a directory tree.
#[derive(Debug, Clone)]
pub struct ManifestPipeline {
    routes_dir: PathBuf,
    registry: Arc<HandlerRegistry>,
}

impl ManifestPipeline {
    pub fn new(routes_dir: impl Into<PathBuf>, registry: HandlerRegistry) -> Self {
        Self {
            routes_dir: routes_dir.into(),
            registry: Arc::new(registry),
        }
    }

    pub fn routes_dir(&self) -> &Path {
        &self.routes_dir
    }

    /// Compile a single manifest file.
    pub fn compile(&self, path: &Path) -> Result<RouteModule, BuildError> {
        let content = fs::read_to_string(path).map_err(|source| BuildError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let manifest: RouteManifest =
            toml::from_str(&content).map_err(|source| BuildError::Parse {
                path: path.to_path_buf(),
                source,
            })?;

        let method: RouteMethod = manifest.method.parse().map_err(|_| BuildError::UnknownMethod {
            path: path.to_path_buf(),
            method: manifest.method.clone(),
        })?;
        let route_path = RoutePath::compile(manifest.path).map_err(|source| BuildError::Pattern {
            path: path.to_path_buf(),
            source,
        })?;
        let handler = self.resolve_handler(path, manifest.handler)?;

        Ok(RouteModule::new(path, method, route_path, handler))
    }

    fn resolve_handler(&self, path: &Path, spec: HandlerSpec) -> Result<Handler, BuildError> {
        let invalid = |detail: String| BuildError::InvalidResponse {
            path: path.to_path_buf(),
            detail,
        };

        match spec {
            HandlerSpec::Static {
                status,
                status_text,
                headers,
                body,
            } => {
                let status = parse_status(status).map_err(invalid)?;
                let headers = parse_headers(&headers).map_err(invalid)?;
                Ok(static_handler(status, status_text, headers, body))
            }
            HandlerSpec::Echo { status, headers } => {
                let status = parse_status(status).map_err(invalid)?;
                let headers = parse_headers(&headers).map_err(invalid)?;
                Ok(echo_handler(status, headers))
            }
            HandlerSpec::Json {
                status,
                headers,
                value,
            } => {
                let status = parse_status(status).map_err(invalid)?;
                let mut headers = parse_headers(&headers).map_err(invalid)?;
                let value = serde_json::to_value(&value).map_err(|e| invalid(e.to_string()))?;
                if !headers.contains_key(CONTENT_TYPE) {
                    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
                }
                Ok(json_handler(status, headers, value))
            }
            HandlerSpec::Named { name } => {
                self.registry
                    .get(&name)
                    .cloned()
                    .ok_or_else(|| BuildError::UnknownHandler {
                        path: path.to_path_buf(),
                        name,
                    })
            }
        }
    }
}

impl BuildPipeline for ManifestPipeline {
    fn discover(&self) -> Result<Vec<PathBuf>, BuildError> {
        let mut found = Vec::new();
        collect_manifests(&self.routes_dir, &mut found)?;
        found.sort();
        Ok(found)
    }

    fn watch(&self, paths: &[PathBuf]) -> Result<(ChangeStream, WatchHandle), BuildError> {
        RouteWatcher::new(&self.routes_dir, MANIFEST_EXTENSION).run(paths)
    }

    fn compile_all(&self) -> Result<Vec<RouteModule>, BuildError> {
        let sources = self.discover()?;
        let modules = sources
            .iter()
            .map(|path| self.compile(path))
            .collect::<Result<Vec<_>, _>>()?;

        tracing::debug!(
            routes_dir = ?self.routes_dir,
            modules = modules.len(),
            "Compiled route manifests"
        );
        Ok(modules)
    }
}

fn collect_manifests(dir: &Path, found: &mut Vec<PathBuf>) -> Result<(), BuildError> {
    let io_err = |source| BuildError::Io {
        path: dir.to_path_buf(),
        source,
    };

    for entry in fs::read_dir(dir).map_err(io_err)? {
        let entry = entry.map_err(io_err)?;
        let path = entry.path();
        // Symlinked directories are not followed; a link cycle would never end.
        if entry.file_type().map_err(io_err)?.is_dir() {
            collect_manifests(&path, found)?;
        } else if path.extension().is_some_and(|e| e == MANIFEST_EXTENSION) {
            found.push(path);
        }
    }
    Ok(())
}

fn parse_status(code: u16) -> Result<StatusCode, String> {
    StatusCode::from_u16(code).map_err(|_| format!("status {code} is out of range"))
}

fn parse_headers(headers: &BTreeMap<String, String>) -> Result<HeaderMap, String> {
    let mut map = HeaderMap::with_capacity(headers.len());
    for (name, value) in headers {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|_| format!("header name {name:?} is invalid"))?;
        let value = HeaderValue::from_str(value)
            .map_err(|_| format!("header {name} has an invalid value"))?;
        map.append(name, value);
    }
    Ok(map)
}

fn with_headers(mut response: Response, headers: &HeaderMap) -> Response {
    for (name, value) in headers {
        response = response.header(name.clone(), value.clone());
    }
    response
}

fn static_handler(
    status: StatusCode,
    status_text: Option<String>,
    headers: HeaderMap,
    body: Option<String>,
) -> Handler {
    handler_fn(move |req| {
        let mut response = with_headers(Response::new(status), &headers);
        if let Some(text) = &status_text {
            response = response.with_status_text(text.clone());
        }
        if let Some(template) = &body {
            let mut rendered = template.clone();
            for (name, value) in req.params() {
                rendered = rendered.replace(&format!("{{{name}}}"), value);
            }
            response = response.text(rendered);
        }
        async move { Ok(response) }
    })
}

fn echo_handler(status: StatusCode, headers: HeaderMap) -> Handler {
    handler_fn(move |req| {
        let mut response = with_headers(Response::new(status), &headers);
        if !headers.contains_key(CONTENT_TYPE) {
            if let Some(content_type) = req.headers().get(CONTENT_TYPE) {
                response = response.header(CONTENT_TYPE, content_type.clone());
            }
        }
        if let Some(body) = req.body() {
            response = response.bytes(body.clone());
        }
        async move { Ok(response) }
    })
}

fn json_handler(status: StatusCode, headers: HeaderMap, value: serde_json::Value) -> Handler {
    handler_fn(move |_req| {
        let response = with_headers(Response::new(status), &headers).json(&value);
        async move { Ok(response) }
    })
}
