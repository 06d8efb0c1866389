// ============================================================================
// Publish saga: design request -> provider product -> catalog listing
// ============================================================================

pub mod errors;
pub mod orchestrator;

pub use errors::PublishError;
pub use orchestrator::{PublishOrchestrator, PublishOutcome, PublishSettings, PublishStatusView};
