pub mod handle;
pub mod orchestrator;
