//! Gateway HTTP API module.
//!
//! # Purpose
//! Exposes route handlers and the shared error/response shapes.
pub mod error;
pub mod labels;
pub mod system;
pub mod types;
