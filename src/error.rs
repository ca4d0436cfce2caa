use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum VeilError {
    #[error("invalid pattern for {label}: {reason}")]
    InvalidPattern { label: String, reason: String },

    #[error("overlap_size must be non-negative, got {value}")]
    InvalidOverlap { value: i64 },

    #[error("invalid token template {template:?}: {reason}")]
    InvalidFormat { template: String, reason: String },

    #[error("{detector}: resource unavailable: {resource}: {reason}")]
    ResourceUnavailable {
        detector: String,
        resource: String,
        reason: String,
    },

    #[error("{detector}: detection failed: {reason}")]
    Detection { detector: String, reason: String },

    #[error("no detectors configured")]
    NoDetectors,

    #[error("config file not found: {path}")]
    ConfigNotFound { path: PathBuf },

    #[error("config parse error in {path}: {reason}")]
    ConfigParse { path: PathBuf, reason: String },

    #[error("token store error: {reason}")]
    Store { reason: String },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, VeilError>;
