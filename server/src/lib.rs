//! Landfall Server Library
//!
//! Core modules for the Landfall migration server: it executes packaged
//! deployment plans against local or remote Docker hosts and migrates
//! live cloud data into the self-hosted replacements.

pub mod app;
pub mod engine;
pub mod errors;
pub mod health;
pub mod logs;
pub mod migrate;
pub mod models;
pub mod ops;
pub mod server;
pub mod ssh;
pub mod storage;
pub mod strategy;
pub mod utils;
