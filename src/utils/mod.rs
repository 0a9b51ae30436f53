//! Shared utilities

pub mod logger;
mod timer;

pub use timer::{format_duration, Timer};
