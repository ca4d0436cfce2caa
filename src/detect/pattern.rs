use regex::{Regex, RegexSet};

use crate::error::{Result, VeilError};
use crate::span::{Span, SOURCE_REGEX};

use super::Detector;

/// Named regular expressions run independently over the full text.
///
/// Every match of every pattern becomes a span with score 1.0; matches of
/// different patterns may overlap. Empty matches carry no text and are skipped.
pub struct PatternDetector {
    regex_set: RegexSet,
    patterns: Vec<(String, Regex)>,
}

impl PatternDetector {
    /// Build from `(label, regex)` pairs. Fails on the first pattern that does
    /// not compile.
    pub fn new<I, L, P>(patterns: I) -> Result<Self>
    where
        I: IntoIterator<Item = (L, P)>,
        L: Into<String>,
        P: AsRef<str>,
    {
        let mut sources = Vec::new();
        let mut compiled = Vec::new();
        for (label, pattern) in patterns {
            let label = label.into();
            let pattern = pattern.as_ref();
            let re = Regex::new(pattern).map_err(|e| VeilError::InvalidPattern {
                label: label.clone(),
                reason: e.to_string(),
            })?;
            sources.push(pattern.to_string());
            compiled.push((label, re));
        }
        let regex_set = RegexSet::new(&sources).map_err(|e| VeilError::InvalidPattern {
            label: "*".into(),
            reason: e.to_string(),
        })?;
        Ok(Self {
            regex_set,
            patterns: compiled,
        })
    }

    /// Built-in PII patterns used when no configuration supplies any.
    pub fn default_patterns() -> Vec<(String, String)> {
        vec![
            (
                "EMAIL".into(),
                r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b".into(),
            ),
            ("PHONE".into(), r"\b\d{3}[-.]?\d{3}[-.]?\d{4}\b".into()),
            ("IPV4".into(), r"\b(?:\d{1,3}\.){3}\d{1,3}\b".into()),
            ("SSN".into(), r"\b\d{3}-\d{2}-\d{4}\b".into()),
        ]
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.patterns.iter().map(|(label, _)| label.as_str())
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

impl Detector for PatternDetector {
    fn detect(&self, text: &str) -> Result<Vec<Span>> {
        self.detect_from(text, 0)
    }

    fn detect_from(&self, text: &str, start: usize) -> Result<Vec<Span>> {
        // The set tells us which patterns can match at all.
        let mut spans = Vec::new();
        for idx in self.regex_set.matches_at(text, start).into_iter() {
            let (label, re) = &self.patterns[idx];
            let mut pos = start;
            while pos <= text.len() {
                let Some(m) = re.find_at(text, pos) else {
                    break;
                };
                if m.is_empty() {
                    pos = text[m.end()..]
                        .chars()
                        .next()
                        .map_or(text.len() + 1, |c| m.end() + c.len_utf8());
                    continue;
                }
                spans.push(Span::new(
                    m.start(),
                    m.end(),
                    label.as_str(),
                    1.0,
                    SOURCE_REGEX,
                    m.as_str(),
                ));
                pos = m.end();
            }
        }
        Ok(spans)
    }

    fn name(&self) -> &str {
        SOURCE_REGEX
    }
}
