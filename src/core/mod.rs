pub mod agent;
pub mod error;
pub mod guard;
pub mod models;
pub mod notifications;
pub mod opener;
pub mod orchestrator;
pub mod runner;
pub mod snapshot;
pub mod watcher;

pub use error::{CoordinatorError, JobFailure};
pub use guard::{RunGuard, RunPermit};
pub use models::{JobKind, JobOutcome, JobRequest, Trigger, TriggerOrigin};
pub use orchestrator::Orchestrator;
pub use snapshot::{BoardState, StatusBoard, StatusSnapshot, StatusView};
