use crate::config::AppConfig;
use crate::core::{RunGuard, StatusBoard};

/// Process-wide state shared by the orchestrator, its job tasks and the RPC layer.
#[derive(Clone)]
pub struct AppContext {
    pub config: std::sync::Arc<AppConfig>,
    pub guard: RunGuard,
    pub status: StatusBoard,
}

impl AppContext {
    pub fn new(config: AppConfig) -> Self {
        Self {
            config: std::sync::Arc::new(config),
            guard: RunGuard::new(),
            status: StatusBoard::new(),
        }
    }
}
