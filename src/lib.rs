//! pmo - Portfolio, project, risk and compliance tracking.
//!
//! This library provides the core functionality for the `pmo` CLI tool:
//! entity storage, health and risk aggregation, compliance scoring and
//! role-based access decisions.

pub mod access;
pub mod action_log;
pub mod cli;
pub mod commands;
pub mod config;
pub mod models;
#[cfg(feature = "serve")]
pub mod server;
pub mod storage;


/// Library-level error type for pmo operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Config error: {0}")]
    Config(#[from] kdl::KdlError),

    #[error("Not initialized: run `pmo system init` first")]
    NotInitialized,

    #[error("Entity not found: {0}")]
    NotFound(String),

    #[error("Invalid ID format: {0}")]
    InvalidId(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Referential integrity: {0}")]
    ReferentialIntegrity(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("{0}")]
    Other(String),
}

/// Result type alias for pmo operations.
pub type Result<T> = std::result::Result<T, Error>;
