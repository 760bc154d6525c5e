//! Route table generations.
//!
//! A generation is one build cycle's route table together with the compiled
//! modules backing it. The dispatcher serves exactly one generation at a time;
//! requests hold an `Arc<Generation>` until their response is written, so a
//! superseded generation (table and modules together) is released as soon as
//! its last request finishes.

use std::time::Instant;

use crate::build::{BuildPipeline, RouteModule};
use crate::reload::ReloadError;
use crate::routing::{DuplicateRouteError, RouteTable};

pub struct Generation {
    id: u64,
    table: RouteTable,
    modules: Vec<RouteModule>,
    built_at: Instant,
}

impl Generation {
    /// Generation zero: no routes.
    pub fn empty() -> Self {
        Self {
            id: 0,
            table: RouteTable::empty(),
            modules: Vec::new(),
            built_at: Instant::now(),
        }
    }

    /// Assemble a generation from compiled modules in discovery order.
    pub fn from_modules(id: u64, modules: Vec<RouteModule>) -> Result<Self, DuplicateRouteError> {
        let table = RouteTable::build(modules.iter().map(RouteModule::entry))?;
        Ok(Self {
            id,
            table,
            modules,
            built_at: Instant::now(),
        })
    }

    /// Compile every route source and assemble generation `id`.
    pub fn compile<P>(pipeline: &P, id: u64) -> Result<Self, ReloadError>
    where
        P: BuildPipeline + ?Sized,
    {
        let modules = pipeline.compile_all()?;
        Ok(Self::from_modules(id, modules)?)
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn table(&self) -> &RouteTable {
        &self.table
    }

    pub fn modules(&self) -> &[RouteModule] {
        &self.modules
    }

    pub fn built_at(&self) -> Instant {
        self.built_at
    }
}

impl std::fmt::Debug for Generation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Generation")
            .field("id", &self.id)
            .field("routes", &self.table.len())
            .finish()
    }
}

impl Drop for Generation {
    fn drop(&mut self) {
        tracing::trace!(generation = self.id, routes = self.table.len(), "Generation released");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::handler::handler_fn;
    use crate::http::Response;
    use crate::routing::{RouteMethod, RoutePath};

    fn module(method: RouteMethod, path: &str) -> RouteModule {
        RouteModule::new(
            format!("routes{path}.toml"),
            method,
            RoutePath::compile(path).unwrap(),
            handler_fn(|_req| async { Ok(Response::ok()) }),
        )
    }

    #[test]
    fn test_from_modules_builds_table() {
        let generation = Generation::from_modules(
            3,
            vec![module(RouteMethod::Get, "/a"), module(RouteMethod::Post, "/a")],
        )
        .unwrap();

        assert_eq!(generation.id(), 3);
        assert_eq!(generation.table().len(), 2);
        assert_eq!(generation.modules().len(), 2);
    }

    #[test]
    fn test_duplicate_modules_rejected() {
        let err = Generation::from_modules(
            1,
            vec![module(RouteMethod::Get, "/a"), module(RouteMethod::Get, "/a")],
        )
        .unwrap_err();
        assert_eq!(err.path, "/a");
    }

    #[test]
    fn test_release_drops_handlers() {
        let marker = std::sync::Arc::new(());
        let held = marker.clone();
        let handler = handler_fn(move |_req| {
            let _ = &held;
            async { Ok(Response::ok()) }
        });
        let generation = Generation::from_modules(
            1,
            vec![RouteModule::new(
                "routes/a.toml",
                RouteMethod::Get,
                RoutePath::compile("/a").unwrap(),
                handler,
            )],
        )
        .unwrap();
        assert_eq!(std::sync::Arc::strong_count(&marker), 2);

        drop(generation);
        assert_eq!(std::sync::Arc::strong_count(&marker), 1);
    }
}
