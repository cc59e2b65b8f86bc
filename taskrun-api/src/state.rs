//! Shared application state for the API server.

use std::sync::Arc;

use taskrun::io::process::CommandRunner;
use taskrun::io::store::TaskStore;
use taskrun::service::TaskService;

/// Service over type-erased collaborators so tests can swap them.
pub type Service = TaskService<Arc<dyn TaskStore>, Arc<dyn CommandRunner>>;

/// Shared state accessible from all request handlers.
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<Service>,
}

impl AppState {
    pub fn new(service: Service) -> Self {
        Self {
            service: Arc::new(service),
        }
    }
}
