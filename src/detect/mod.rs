pub mod external;
pub mod hybrid;
pub mod keyword;
pub mod pattern;

use std::sync::Arc;

use crate::error::Result;
use crate::span::Span;

pub use external::ExternalDetector;
pub use hybrid::{HybridDetector, Prefer, Strategy};
pub use keyword::KeywordDetector;
pub use pattern::PatternDetector;

/// Maps a text to the spans of sensitive content found in it.
///
/// Output carries no ordering guarantee; consumers sort before use. Calls must
/// be deterministic for a given text and configuration. A detector whose
/// backing resource fails mid-call reports [`crate::VeilError::Detection`]
/// instead of returning an empty list.
pub trait Detector: Send + Sync {
    fn detect(&self, text: &str) -> Result<Vec<Span>>;

    /// Detect spans starting at or after byte offset `start`, with
    /// `text[..start]` available as left context only (word boundaries, line
    /// anchors). The default runs [`detect`](Self::detect) over the whole text
    /// and discards spans starting before `start`.
    fn detect_from(&self, text: &str, start: usize) -> Result<Vec<Span>> {
        let mut spans = self.detect(text)?;
        spans.retain(|s| s.start >= start);
        Ok(spans)
    }

    /// Name of this detector (for logging/debugging).
    fn name(&self) -> &str;
}

impl<D: Detector + ?Sized> Detector for Box<D> {
    fn detect(&self, text: &str) -> Result<Vec<Span>> {
        (**self).detect(text)
    }

    fn detect_from(&self, text: &str, start: usize) -> Result<Vec<Span>> {
        (**self).detect_from(text, start)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

impl<D: Detector + ?Sized> Detector for Arc<D> {
    fn detect(&self, text: &str) -> Result<Vec<Span>> {
        (**self).detect(text)
    }

    fn detect_from(&self, text: &str, start: usize) -> Result<Vec<Span>> {
        (**self).detect_from(text, start)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}
