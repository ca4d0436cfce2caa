use serde::{Deserialize, Serialize};

use crate::detect::{Prefer, Strategy};
use crate::error::{Result, VeilError};
use crate::stream::DEFAULT_OVERLAP;

/// Hybrid detector policy.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HybridOptions {
    #[serde(default)]
    pub strategy: Strategy,

    #[serde(default)]
    pub prefer: Prefer,

    /// Source names treated as model-based. Default: `spacy`, `bert`.
    #[serde(default)]
    pub model_sources: Option<Vec<String>>,
}

/// Streaming buffer settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamingOptions {
    /// Characters retained between chunks. Must cover the longest entity the
    /// detectors can match. Default: 512.
    #[serde(default = "default_overlap")]
    pub overlap_size: i64,
}

fn default_overlap() -> i64 {
    DEFAULT_OVERLAP as i64
}

impl Default for StreamingOptions {
    fn default() -> Self {
        Self {
            overlap_size: default_overlap(),
        }
    }
}

impl StreamingOptions {
    pub fn overlap(&self) -> Result<usize> {
        usize::try_from(self.overlap_size).map_err(|_| VeilError::InvalidOverlap {
            value: self.overlap_size,
        })
    }
}
