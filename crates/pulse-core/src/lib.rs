//! # pulse-core
//!
//! Core crate for the Pulse heartbeat server. Contains the configuration
//! schemas and the unified error system shared by the server crate and the
//! binary.
//!
//! This crate has **no** internal dependencies on other Pulse crates.

pub mod config;
pub mod error;
pub mod result;

pub use error::AppError;
pub use result::AppResult;
