//! Reversible PII redaction.
//!
//! Detectors report [`Span`]s; a [`RedactionPipeline`] replaces the selected
//! spans with numbered tokens and records each token in a [`TokenStore`] so the
//! redaction can be reversed. [`StreamingBuffer`] applies the same redaction to
//! text delivered in chunks, including entities cut by a chunk boundary.

pub mod config;
pub mod detect;
pub mod error;
pub mod pipeline;
pub mod span;
pub mod store;
pub mod stream;
pub mod traverse;

pub use config::RedactConfig;
pub use detect::{
    Detector, ExternalDetector, HybridDetector, KeywordDetector, PatternDetector, Prefer, Strategy,
};
pub use error::{Result, VeilError};
pub use pipeline::{Detection, Explanation, RedactionPipeline, TokenFormat};
pub use span::{filter_non_overlapping, Span};
pub use store::TokenStore;
pub use stream::{stream_redact, ChunkMetadata, StreamStats, StreamingBuffer};
