//! Error types for Slipway deployment orchestration.
//!
//! This module provides a unified error type [`SlipwayError`] for all
//! orchestration operations, along with a convenient [`Result`] type alias.
//!
//! # Error Categories
//!
//! Errors fall into three behavioral classes, surfaced through the
//! classification helpers:
//!
//! - **Transient** ([`SlipwayError::is_retryable`]): a single network call
//!   failed or timed out; safe to retry with backoff up to a bounded count.
//! - **Conflict** ([`SlipwayError::is_conflict`]): a name is already owned by
//!   an incompatible resource, or another deployment holds the same names.
//!   Requires an explicit decision from the caller, never silent overwrite.
//! - **Fatal** ([`SlipwayError::is_fatal`]): the control plane reported a
//!   terminal state, or a bounded poll budget was exhausted. Propagated to the
//!   caller with resource name, last observed state, and attempt count.
//!
//! # Example
//!
//! ```rust
//! use slipway::error::{Result, SlipwayError};
//!
//! fn classify(err: &SlipwayError) -> &'static str {
//!     if err.is_retryable() {
//!         "retry the call"
//!     } else if err.is_conflict() {
//!         "needs explicit replace confirmation"
//!     } else {
//!         "abort this reconciliation pass"
//!     }
//! }
//! ```

use crate::types::ResourceKind;
use std::io;
use thiserror::Error;

/// Main error type for Slipway operations.
#[derive(Error, Debug)]
pub enum SlipwayError {
    // Transient network errors
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Request timeout after {0}ms")]
    Timeout(u64),

    #[error("Control plane unavailable: {0}")]
    Unavailable(String),

    // Conflicts
    #[error("{kind} '{name}' already exists")]
    AlreadyExists { kind: ResourceKind, name: String },

    #[error("{kind} '{name}' is in use: {reason}")]
    ResourceInUse {
        kind: ResourceKind,
        name: String,
        reason: String,
    },

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Deployment already in progress for '{0}'")]
    DeploymentInProgress(String),

    // Terminal deployment failures
    #[error("Endpoint '{name}' failed: {reason}")]
    EndpointFailed { name: String, reason: String },

    #[error("Deadline exceeded waiting for {what} after {attempts} attempts (last state: {last_state})")]
    DeadlineExceeded {
        what: String,
        attempts: u32,
        last_state: String,
    },

    #[error("{kind} '{name}' was not deleted after {attempts} attempts")]
    DeletionTimeout {
        kind: ResourceKind,
        name: String,
        attempts: u32,
    },

    #[error("Readiness probe exhausted after {attempts} attempts: {last_error}\nrecent server output:\n{diagnostics}")]
    ProbeExhausted {
        attempts: u32,
        last_error: String,
        diagnostics: String,
    },

    // Lookup failures
    #[error("{kind} '{name}' not found")]
    NotFound { kind: ResourceKind, name: String },

    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid configuration: {field}: {reason}")]
    InvalidConfig { field: String, reason: String },

    #[error("Validation error: {0}")]
    Validation(String),

    // Credential retrieval
    #[error("Credential error: {0}")]
    Credential(String),

    // External errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl SlipwayError {
    /// Check if the error is transient and safe to retry.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SlipwayError::ConnectionFailed(_)
                | SlipwayError::Timeout(_)
                | SlipwayError::Unavailable(_)
        )
    }

    /// Check if the error is a name-ownership conflict.
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            SlipwayError::AlreadyExists { .. }
                | SlipwayError::ResourceInUse { .. }
                | SlipwayError::Conflict(_)
                | SlipwayError::DeploymentInProgress(_)
        )
    }

    /// Check if the error is terminal for the current reconciliation pass.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            SlipwayError::EndpointFailed { .. }
                | SlipwayError::DeadlineExceeded { .. }
                | SlipwayError::DeletionTimeout { .. }
                | SlipwayError::ProbeExhausted { .. }
        )
    }
}

impl From<serde_json::Error> for SlipwayError {
    fn from(e: serde_json::Error) -> Self {
        SlipwayError::Serialization(e.to_string())
    }
}

impl From<reqwest::Error> for SlipwayError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            SlipwayError::Timeout(0)
        } else {
            SlipwayError::ConnectionFailed(e.to_string())
        }
    }
}

/// Result type alias for Slipway operations.
pub type Result<T> = std::result::Result<T, SlipwayError>;
