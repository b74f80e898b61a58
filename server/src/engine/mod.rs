//! Container engine command surface

pub mod compose;

pub use compose::ComposeEngine;
