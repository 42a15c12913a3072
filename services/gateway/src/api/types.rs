//! HTTP API request/response types.
//!
//! # Purpose
//! Defines the JSON payload shapes returned by the gateway.
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct HealthStatus {
    pub status: String,
    /// Number of signing keys currently held.
    pub keys: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
    pub request_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct LabelsResponse {
    pub values: Vec<String>,
}
