//! Label-based access control gateway library crate.
//!
//! # Purpose
//! Exposes the gateway's configuration, router wiring, enforcement
//! middleware, and observability setup for use by the binary and tests.
pub mod api;
pub mod app;
pub mod config;
pub mod enforce;
pub mod observability;
