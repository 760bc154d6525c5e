//! Shared utilities for integration testing.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;

use route_reload::build::HandlerRegistry;
use route_reload::config::DevServerConfig;
use route_reload::lifecycle::{DevServer, StartupError};
use tempfile::TempDir;

/// A temporary routes directory.
pub struct RoutesDir {
    dir: TempDir,
}

impl RoutesDir {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().unwrap(),
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Write (or overwrite) a manifest relative to the routes directory.
    pub fn write(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.dir.path().join(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[allow(dead_code)]
    pub fn remove(&self, name: &str) {
        std::fs::remove_file(self.dir.path().join(name)).unwrap();
    }
}

/// Manifest for a `static` handler answering `body`.
pub fn static_route(method: &str, path: &str, body: &str) -> String {
    format!(
        "method = \"{method}\"\npath = \"{path}\"\n\n[handler]\nkind = \"static\"\nbody = \"{body}\"\n"
    )
}

/// Config serving `routes` on an ephemeral port with a short debounce window.
pub fn test_config(routes: &RoutesDir) -> DevServerConfig {
    let mut config = DevServerConfig::default();
    config.routes.dir = routes.path().to_path_buf();
    config.routes.debounce_ms = 50;
    config.listener.host = "127.0.0.1".to_string();
    config.listener.port = 0;
    config.listener.retry_delay_ms = 10;
    config
}

pub async fn start_server(config: &DevServerConfig) -> Result<DevServer, StartupError> {
    DevServer::start(config, HandlerRegistry::new()).await
}

/// Client without connection pooling, so shutdown is not held up by idle sockets.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .timeout(Duration::from_secs(5))
        .build()
        .unwrap()
}

/// GET `url` and return status and body text.
pub async fn get(url: &str) -> (u16, String) {
    let response = client().get(url).send().await.unwrap();
    let status = response.status().as_u16();
    (status, response.text().await.unwrap())
}

/// Poll `check` until it returns true or `timeout` elapses.
pub async fn eventually<F, Fut>(timeout: Duration, mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if check().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    false
}
