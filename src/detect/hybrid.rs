use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::span::{screen_spans, sort_spans, Span, MODEL_SOURCES};

use super::Detector;

/// How sub-detector outputs are combined before conflict resolution.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    /// Concatenate every sub-detector's spans.
    #[default]
    Union,
}

/// Which class of detector wins an overlap before scores are compared.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Prefer {
    /// Model-based sources beat rule-based ones.
    #[default]
    Ml,
    /// Rule-based sources beat model-based ones.
    Rules,
    /// No class preference; decide on score then length.
    None,
}

/// Composes several detectors and merges their output into one
/// non-overlapping, ordered span list.
pub struct HybridDetector {
    detectors: Vec<Box<dyn Detector>>,
    strategy: Strategy,
    prefer: Prefer,
    model_sources: Vec<String>,
}

impl HybridDetector {
    pub fn new(detectors: Vec<Box<dyn Detector>>, strategy: Strategy, prefer: Prefer) -> Self {
        Self {
            detectors,
            strategy,
            prefer,
            model_sources: MODEL_SOURCES.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Replace the set of source names treated as model-based.
    pub fn with_model_sources<I, S>(mut self, sources: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.model_sources = sources.into_iter().map(Into::into).collect();
        self
    }

    pub fn strategy(&self) -> Strategy {
        self.strategy
    }

    pub fn prefer(&self) -> Prefer {
        self.prefer
    }

    fn is_model(&self, span: &Span) -> bool {
        self.model_sources.iter().any(|s| *s == span.source)
    }

    /// Greedy merge over spans sorted by `(start asc, end desc)`.
    pub fn merge(&self, mut spans: Vec<Span>) -> Vec<Span> {
        sort_spans(&mut spans);
        let mut iter = spans.into_iter();
        let Some(mut current) = iter.next() else {
            return Vec::new();
        };

        let mut merged = Vec::new();
        for next in iter {
            if next.start < current.end {
                current = self.resolve(current, next);
            } else {
                merged.push(std::mem::replace(&mut current, next));
            }
        }
        merged.push(current);
        merged
    }

    /// Pick one of two overlapping spans. Checked in order: class preference,
    /// strictly higher score, greater length; otherwise the first span stays.
    pub fn resolve(&self, first: Span, second: Span) -> Span {
        let first_ml = self.is_model(&first);
        let second_ml = self.is_model(&second);
        if first_ml != second_ml {
            match self.prefer {
                Prefer::Ml => return if first_ml { first } else { second },
                Prefer::Rules => return if first_ml { second } else { first },
                Prefer::None => {}
            }
        }

        if first.score > second.score {
            return first;
        }
        if second.score > first.score {
            return second;
        }
        if second.len() > first.len() {
            return second;
        }
        first
    }
}

impl Detector for HybridDetector {
    fn detect(&self, text: &str) -> Result<Vec<Span>> {
        self.detect_from(text, 0)
    }

    /// Spans whose `text` does not match the source are discarded before the
    /// merge, so a bad model span can never displace a valid one.
    fn detect_from(&self, text: &str, start: usize) -> Result<Vec<Span>> {
        let mut all = Vec::new();
        match self.strategy {
            Strategy::Union => {
                for detector in &self.detectors {
                    let spans = detector.detect_from(text, start)?;
                    tracing::trace!(detector = detector.name(), count = spans.len(), "sub-detector");
                    all.extend(spans);
                }
            }
        }
        Ok(self.merge(screen_spans(text, all)))
    }

    fn name(&self) -> &str {
        "hybrid"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn span(start: usize, end: usize, source: &str, score: f64) -> Span {
        Span::new(start, end, "X", score, source, "")
    }

    fn hybrid(prefer: Prefer) -> HybridDetector {
        HybridDetector::new(Vec::new(), Strategy::Union, prefer)
    }

    #[test]
    fn test_prefer_ml_keeps_model_span() {
        let kept = hybrid(Prefer::Ml).resolve(span(0, 10, "regex", 1.0), span(2, 8, "spacy", 0.8));
        assert_eq!(kept.source, "spacy");
    }

    #[test]
    fn test_prefer_rules_keeps_regex_span() {
        let kept =
            hybrid(Prefer::Rules).resolve(span(0, 10, "regex", 1.0), span(2, 8, "spacy", 0.8));
        assert_eq!(kept.source, "regex");
    }

    #[test]
    fn test_same_class_falls_back_to_score() {
        let kept = hybrid(Prefer::Ml).resolve(span(0, 10, "spacy", 0.7), span(2, 8, "bert", 0.9));
        assert_eq!(kept.source, "bert");
    }

    #[test]
    fn test_equal_score_prefers_longer() {
        let kept = hybrid(Prefer::None).resolve(span(0, 4, "regex", 1.0), span(2, 12, "regex", 1.0));
        assert_eq!((kept.start, kept.end), (2, 12));
    }

    #[test]
    fn test_full_tie_keeps_first() {
        let kept = hybrid(Prefer::None).resolve(span(0, 4, "a", 1.0), span(2, 6, "b", 1.0));
        assert_eq!(kept.source, "a");
    }

    #[test]
    fn test_merge_flushes_disjoint_spans() {
        let merged = hybrid(Prefer::Ml).merge(vec![
            span(20, 25, "regex", 1.0),
            span(0, 5, "regex", 1.0),
            span(3, 9, "spacy", 0.5),
        ]);
        let bounds: Vec<_> = merged.iter().map(|s| (s.start, s.end, s.source.as_str())).collect();
        assert_eq!(bounds, vec![(3, 9, "spacy"), (20, 25, "regex")]);
    }

    #[test]
    fn test_mismatched_model_span_does_not_displace_regex_span() {
        let model = crate::detect::ExternalDetector::new("bert", |_: &str| {
            Ok(vec![Span::new(0, 8, "PERSON", 0.99, "bert", "Jane Doe")])
        });
        let rules = crate::detect::PatternDetector::new([("PHONE", r"\d{3}-\d{4}")]).unwrap();
        let detectors: Vec<Box<dyn Detector>> = vec![Box::new(model), Box::new(rules)];
        let det = HybridDetector::new(detectors, Strategy::Union, Prefer::Ml);
        let spans = det.detect("555-1234 call me").unwrap();
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].label, "PHONE");
    }

    #[test]
    fn test_custom_model_sources() {
        let det = hybrid(Prefer::Ml).with_model_sources(["onnx"]);
        let kept = det.resolve(span(0, 10, "regex", 1.0), span(2, 8, "onnx", 0.1));
        assert_eq!(kept.source, "onnx");
    }
}
