//! SSH transport for remote deployments

pub mod session;

pub use session::{CommandOutput, SshSession};
