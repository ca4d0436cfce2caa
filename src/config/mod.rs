pub mod options;

pub use options::*;

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::detect::{Detector, HybridDetector, KeywordDetector, PatternDetector};
use crate::error::{Result, VeilError};
use crate::pipeline::{RedactionPipeline, TokenFormat, DEFAULT_TEMPLATE};
use crate::store::TokenStore;
use crate::stream::StreamingBuffer;

/// Environment variable overriding `redaction_format`.
pub const ENV_REDACTION_FORMAT: &str = "VEIL_REDACTION_FORMAT";

/// File names probed by [`RedactConfig::discover`], in order.
pub const LOCAL_CONFIG_FILES: &[&str] = &["veil.yaml", "veil.yml", "veil.json", "veil.toml"];

/// Top-level redaction configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RedactConfig {
    /// Label -> regular expression. Default: built-in EMAIL, PHONE, IPV4, SSN.
    #[serde(default = "default_patterns", alias = "pattern")]
    pub patterns: BTreeMap<String, String>,

    /// Label -> literal terms matched by a keyword detector.
    #[serde(default)]
    pub keywords: BTreeMap<String, Vec<String>>,

    /// ASCII case-insensitive keyword matching. Default: false.
    #[serde(default)]
    pub case_insensitive_keywords: bool,

    /// Token template. Default: `[REDACTED_{counter}]`.
    #[serde(default = "default_redaction_format")]
    pub redaction_format: String,

    #[serde(default)]
    pub hybrid: HybridOptions,

    #[serde(default)]
    pub streaming: StreamingOptions,
}

fn default_patterns() -> BTreeMap<String, String> {
    PatternDetector::default_patterns().into_iter().collect()
}

fn default_redaction_format() -> String {
    DEFAULT_TEMPLATE.to_string()
}

impl Default for RedactConfig {
    fn default() -> Self {
        Self {
            patterns: default_patterns(),
            keywords: BTreeMap::new(),
            case_insensitive_keywords: false,
            redaction_format: default_redaction_format(),
            hybrid: HybridOptions::default(),
            streaming: StreamingOptions::default(),
        }
    }
}

impl RedactConfig {
    /// Load from a YAML, JSON (`.json`) or TOML (`.toml`) file.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(VeilError::ConfigNotFound {
                path: path.to_path_buf(),
            });
        }
        let contents = std::fs::read_to_string(path)?;
        let parse_err = |reason: String| VeilError::ConfigParse {
            path: path.to_path_buf(),
            reason,
        };
        let config: Self = match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => {
                serde_json::from_str(&contents).map_err(|e| parse_err(e.to_string()))?
            }
            Some("toml") => toml::from_str(&contents).map_err(|e| parse_err(e.to_string()))?,
            _ => serde_yaml::from_str(&contents).map_err(|e| parse_err(e.to_string()))?,
        };
        tracing::debug!(path = %path.display(), "loaded redaction config");
        Ok(config)
    }

    /// Load the first of [`LOCAL_CONFIG_FILES`] found in `dir`. Returns the
    /// default configuration if none exists.
    pub fn discover(dir: &Path) -> Result<Self> {
        for name in LOCAL_CONFIG_FILES {
            let path = dir.join(name);
            if path.exists() {
                return Self::load_from(&path);
            }
        }
        Ok(Self::default())
    }

    /// Apply [`ENV_REDACTION_FORMAT`] if set.
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(format) = std::env::var(ENV_REDACTION_FORMAT) {
            self.redaction_format = format;
        }
        self
    }

    pub fn validate(&self) -> Result<()> {
        self.streaming.overlap()?;
        TokenFormat::new(self.redaction_format.as_str())?;
        Ok(())
    }

    /// Build the configured detector. `external` detectors (model-backed) come
    /// first, followed by the pattern and keyword detectors; more than one
    /// detector is wrapped in a [`HybridDetector`].
    pub fn build_detector(&self, external: Vec<Box<dyn Detector>>) -> Result<Box<dyn Detector>> {
        let mut detectors = external;
        if !self.patterns.is_empty() {
            detectors.push(Box::new(PatternDetector::new(&self.patterns)?));
        }
        if !self.keywords.is_empty() {
            let dictionaries = self
                .keywords
                .iter()
                .map(|(label, terms)| (label.as_str(), terms.iter().map(String::as_str)));
            detectors.push(Box::new(KeywordDetector::new(
                dictionaries,
                self.case_insensitive_keywords,
            )?));
        }

        match detectors.len() {
            0 => Err(VeilError::NoDetectors),
            1 => Ok(detectors.remove(0)),
            n => {
                tracing::debug!(detectors = n, prefer = ?self.hybrid.prefer, "combining detectors");
                let mut hybrid =
                    HybridDetector::new(detectors, self.hybrid.strategy, self.hybrid.prefer);
                if let Some(sources) = &self.hybrid.model_sources {
                    hybrid = hybrid.with_model_sources(sources.iter().cloned());
                }
                Ok(Box::new(hybrid))
            }
        }
    }

    /// Build a pipeline with a fresh token store attached.
    pub fn build_pipeline(&self, external: Vec<Box<dyn Detector>>) -> Result<RedactionPipeline> {
        self.validate()?;
        let format = TokenFormat::new(self.redaction_format.as_str())?;
        let detector: Arc<dyn Detector> = Arc::from(self.build_detector(external)?);
        Ok(RedactionPipeline::from_shared(detector)
            .with_format(format)
            .with_store(Arc::new(TokenStore::new())))
    }

    /// Build a streaming buffer with a fresh token store attached.
    pub fn build_buffer(&self, external: Vec<Box<dyn Detector>>) -> Result<StreamingBuffer> {
        let overlap = self.streaming.overlap()?;
        if overlap == 0 {
            tracing::warn!("streaming overlap is 0; entities split across chunks will not be detected");
        }
        let pipeline = self.build_pipeline(external)?;
        Ok(StreamingBuffer::from_pipeline(&pipeline, overlap))
    }
}
