use aho_corasick::{AhoCorasick, Input, MatchKind};

use crate::error::{Result, VeilError};
use crate::span::Span;

use super::Detector;

/// Source name reported by [`KeywordDetector`].
pub const SOURCE_KEYWORD: &str = "keyword";

/// Literal dictionary matching via aho-corasick.
///
/// Each term belongs to a label. Overlapping terms resolve leftmost-longest,
/// so `"Acme Corp"` wins over `"Acme"` at the same position.
pub struct KeywordDetector {
    automaton: AhoCorasick,
    /// Label for each pattern id in the automaton.
    labels: Vec<String>,
}

impl KeywordDetector {
    /// Build from `(label, terms)` pairs.
    pub fn new<I, L, T, S>(dictionaries: I, case_insensitive: bool) -> Result<Self>
    where
        I: IntoIterator<Item = (L, T)>,
        L: Into<String>,
        T: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut labels = Vec::new();
        let mut terms = Vec::new();
        for (label, words) in dictionaries {
            let label = label.into();
            for word in words {
                let word = word.into();
                if word.is_empty() {
                    return Err(VeilError::InvalidPattern {
                        label,
                        reason: "empty keyword".into(),
                    });
                }
                labels.push(label.clone());
                terms.push(word);
            }
        }

        let automaton = AhoCorasick::builder()
            .match_kind(MatchKind::LeftmostLongest)
            .ascii_case_insensitive(case_insensitive)
            .build(&terms)
            .map_err(|e| VeilError::InvalidPattern {
                label: "*".into(),
                reason: e.to_string(),
            })?;

        Ok(Self { automaton, labels })
    }
}

impl Detector for KeywordDetector {
    fn detect(&self, text: &str) -> Result<Vec<Span>> {
        self.detect_from(text, 0)
    }

    fn detect_from(&self, text: &str, start: usize) -> Result<Vec<Span>> {
        if self.labels.is_empty() || start > text.len() {
            return Ok(Vec::new());
        }
        let spans = self
            .automaton
            .find_iter(Input::new(text).range(start..))
            .map(|mat| {
                Span::new(
                    mat.start(),
                    mat.end(),
                    self.labels[mat.pattern().as_usize()].as_str(),
                    1.0,
                    SOURCE_KEYWORD,
                    &text[mat.start()..mat.end()],
                )
            })
            .collect();
        Ok(spans)
    }

    fn name(&self) -> &str {
        SOURCE_KEYWORD
    }
}
