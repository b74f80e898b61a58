//! Execution strategies
//!
//! A strategy knows how to run a deployment's ordered phases against one
//! kind of target host. The phase list is fixed before execution so the
//! orchestrator can report `totalPhases` up front.

pub mod local;
pub mod remote;

use async_trait::async_trait;

use crate::errors::LandfallError;
use crate::models::health::ServiceHealth;
use crate::ops::operation::Operation;

pub use local::LocalStrategy;
pub use remote::RemoteStrategy;

/// Pluggable phase executor for one target kind.
///
/// Contract:
/// - check `op.cancel_requested()` between phases and return `Ok` early
///   when tripped (the orchestrator keeps the cancelled status);
/// - report progress only through the operation's emit methods, which
///   never block on observers;
/// - hard failures abort the run and become the terminal error; failures
///   in optional sub-steps are logged at warn level and execution
///   continues.
#[async_trait]
pub trait DeployStrategy: Send + Sync {
    /// Ordered phase names, fixed for the lifetime of the strategy
    fn phases(&self) -> &'static [&'static str];

    /// Drive the operation through every phase, returning the final
    /// service health list on success.
    async fn execute(&self, op: &Operation) -> Result<Vec<ServiceHealth>, LandfallError>;
}
