use std::path::Path;

use crate::error::{Result, VeilError};
use crate::span::Span;

use super::Detector;

type DetectFn = dyn Fn(&str) -> Result<Vec<Span>> + Send + Sync;

/// Adapter for detectors implemented outside this crate (NER models and the
/// like). The closure is the whole contract: text in, spans out.
///
/// Spans reported here may carry `text` that differs from the exact source
/// slice; the redaction path drops those instead of failing.
pub struct ExternalDetector {
    name: String,
    detect_fn: Box<DetectFn>,
}

impl ExternalDetector {
    pub fn new<F>(name: impl Into<String>, detect_fn: F) -> Self
    where
        F: Fn(&str) -> Result<Vec<Span>> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            detect_fn: Box::new(detect_fn),
        }
    }

    /// Build a detector whose backing resource (model file, dictionary) lives
    /// at `resource`. A missing resource is reported as
    /// [`VeilError::ResourceUnavailable`] before `load` is called; errors from
    /// `load` propagate unchanged.
    pub fn from_resource<L, F>(name: impl Into<String>, resource: &Path, load: L) -> Result<Self>
    where
        L: FnOnce(&Path) -> Result<F>,
        F: Fn(&str) -> Result<Vec<Span>> + Send + Sync + 'static,
    {
        let name = name.into();
        if !resource.exists() {
            return Err(VeilError::ResourceUnavailable {
                detector: name,
                resource: resource.display().to_string(),
                reason: "not found".into(),
            });
        }
        let detect_fn = load(resource)?;
        tracing::debug!(detector = %name, resource = %resource.display(), "loaded external detector");
        Ok(Self::new(name, detect_fn))
    }
}

impl Detector for ExternalDetector {
    fn detect(&self, text: &str) -> Result<Vec<Span>> {
        (self.detect_fn)(text)
    }

    fn name(&self) -> &str {
        &self.name
    }
}
