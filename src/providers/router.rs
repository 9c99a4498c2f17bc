use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use super::echo::{EchoBackend, UnconfiguredBackend};
use super::fake::FakeBackend;
use super::http::HttpBackend;
use super::traits::ChatBackend;
use super::types::{BackendError, BackendId};
use crate::services::settings::AppSettings;

pub struct BackendRouter {
    backends: HashMap<BackendId, Arc<dyn ChatBackend>>,
}

impl BackendRouter {
    pub fn new() -> Self {
        Self {
            backends: HashMap::new(),
        }
    }

    /// Register every backend the settings allow. The HTTP backend is only
    /// available once an endpoint is configured.
    pub fn from_settings(settings: &AppSettings) -> Self {
        let mut router = Self::new();
        router.register(Arc::new(FakeBackend::new(
            settings.fake_fragment_chars,
            Duration::from_millis(settings.fake_fragment_delay_ms),
        )));
        router.register(Arc::new(EchoBackend::new(Duration::from_millis(
            settings.echo_delay_ms,
        ))));
        router.register(Arc::new(UnconfiguredBackend));

        if let Some(endpoint) = &settings.endpoint {
            match HttpBackend::new(endpoint.clone()) {
                Ok(backend) => router.register(Arc::new(backend)),
                Err(e) => tracing::warn!("HTTP backend unavailable: {}", e),
            }
        }
        router
    }

    pub fn register(&mut self, backend: Arc<dyn ChatBackend>) {
        self.backends.insert(backend.backend_id(), backend);
    }

    pub fn get(&self, id: BackendId) -> Result<Arc<dyn ChatBackend>, BackendError> {
        self.backends.get(&id).cloned().ok_or_else(|| {
            BackendError::NotConfigured(format!("backend '{}' is not available", id.as_str()))
        })
    }
}

impl Default for BackendRouter {
    fn default() -> Self {
        Self::new()
    }
}
