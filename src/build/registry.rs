//! Named route handlers.
//!
//! Manifests with `kind = "named"` refer to Rust handlers by name. The
//! embedding program registers them here before the pipeline is built.

use std::collections::HashMap;
use std::future::Future;

use crate::http::handler::{handler_fn, Handler, HandlerResult};
use crate::http::request::NormalizedRequest;

#[derive(Clone, Default)]
pub struct HandlerRegistry {
    handlers: HashMap<String, Handler>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` under `name`, replacing any previous registration.
    pub fn register(&mut self, name: impl Into<String>, handler: Handler) -> &mut Self {
        let name = name.into();
        if self.handlers.insert(name.clone(), handler).is_some() {
            tracing::warn!(handler = %name, "Replaced previously registered handler");
        }
        self
    }

    /// Register an async function or closure under `name`.
    pub fn register_fn<F, Fut>(&mut self, name: impl Into<String>, f: F) -> &mut Self
    where
        F: Fn(NormalizedRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        self.register(name, handler_fn(f))
    }

    pub fn get(&self, name: &str) -> Option<&Handler> {
        self.handlers.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.handlers.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl std::fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<_> = self.names().collect();
        names.sort_unstable();
        f.debug_struct("HandlerRegistry").field("handlers", &names).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::Response;

    #[test]
    fn test_register_and_lookup() {
        let mut registry = HandlerRegistry::new();
        registry
            .register_fn("health", |_req| async { Ok(Response::ok().text("up")) })
            .register_fn("other", |_req| async { Ok(Response::ok()) });

        assert_eq!(registry.len(), 2);
        assert!(registry.get("health").is_some());
        assert!(registry.get("missing").is_none());
    }
}
