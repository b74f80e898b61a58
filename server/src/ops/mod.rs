//! Operation orchestration core

pub mod event;
pub mod operation;
pub mod orchestrator;
pub mod registry;
