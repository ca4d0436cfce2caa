use std::cmp::Reverse;

use serde::{Deserialize, Serialize};

/// Source name reported by [`crate::detect::pattern::PatternDetector`].
pub const SOURCE_REGEX: &str = "regex";

/// Source names treated as model-based by default.
pub const MODEL_SOURCES: &[&str] = &["spacy", "bert"];

/// A detected region of text.
///
/// `start` and `end` are byte offsets into the scanned text and always fall on
/// char boundaries, so `&text[start..end]` is valid for the text the span was
/// detected in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
    /// Category name, e.g. `EMAIL`.
    pub label: String,
    /// Confidence in `[0.0, 1.0]`.
    pub score: f64,
    /// Which detector produced the span, e.g. `regex`, `spacy`, `bert`.
    pub source: String,
    /// The matched substring as reported by the detector.
    pub text: String,
}

impl Span {
    pub fn new(
        start: usize,
        end: usize,
        label: impl Into<String>,
        score: f64,
        source: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            start,
            end,
            label: label.into(),
            score,
            source: source.into(),
            text: text.into(),
        }
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// True when `text` is exactly `source_text[start..end]`.
    pub fn matches_source(&self, source_text: &str) -> bool {
        source_text
            .get(self.start..self.end)
            .is_some_and(|slice| slice == self.text)
    }
}

/// Sort by start ascending; among spans starting at the same offset the longer
/// one comes first. The sort is stable.
pub fn sort_spans(spans: &mut [Span]) {
    spans.sort_by_key(|s| (s.start, Reverse(s.end)));
}

/// Greedy left-to-right overlap filter.
///
/// Sorts the spans, then keeps a span only if it starts at or after the end of
/// the last kept span. The result satisfies `out[i].end <= out[i + 1].start`.
pub fn filter_non_overlapping(mut spans: Vec<Span>) -> Vec<Span> {
    sort_spans(&mut spans);
    let mut kept: Vec<Span> = Vec::with_capacity(spans.len());
    let mut last_end = 0;
    for span in spans {
        if span.start >= last_end {
            last_end = span.end;
            kept.push(span);
        }
    }
    kept
}

/// Spans that survived selection, plus how many were discarded because their
/// reported text did not match the source.
#[derive(Debug, Clone, Default)]
pub struct Selection {
    pub spans: Vec<Span>,
    pub dropped: usize,
}

/// Drop spans whose `text` differs from `text[start..end]` or whose offsets do
/// not address a valid slice. Model-based detectors can report
/// tokenizer-normalized text; such spans are skipped rather than treated as
/// errors. Each drop is logged at debug level.
pub fn screen_spans(text: &str, spans: Vec<Span>) -> Vec<Span> {
    spans
        .into_iter()
        .filter(|span| {
            let ok = span.matches_source(text);
            if !ok {
                tracing::debug!(
                    source = %span.source,
                    label = %span.label,
                    start = span.start,
                    end = span.end,
                    "dropping span whose text does not match the source"
                );
            }
            ok
        })
        .collect()
}

/// Select the spans that will be redacted in `text`: [`screen_spans`], then
/// [`filter_non_overlapping`].
pub fn select_spans(text: &str, spans: Vec<Span>) -> Selection {
    let total = spans.len();
    let valid = screen_spans(text, spans);
    let dropped = total - valid.len();
    Selection {
        spans: filter_non_overlapping(valid),
        dropped,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn span(start: usize, end: usize) -> Span {
        Span::new(start, end, "X", 1.0, SOURCE_REGEX, "")
    }

    #[test]
    fn test_sort_prefers_longer_at_same_start() {
        let mut spans = vec![span(5, 7), span(0, 2), span(5, 9)];
        sort_spans(&mut spans);
        let bounds: Vec<_> = spans.iter().map(|s| (s.start, s.end)).collect();
        assert_eq!(bounds, vec![(0, 2), (5, 9), (5, 7)]);
    }

    #[test]
    fn test_filter_drops_overlaps() {
        let kept = filter_non_overlapping(vec![span(4, 10), span(0, 5), span(10, 12), span(11, 13)]);
        let bounds: Vec<_> = kept.iter().map(|s| (s.start, s.end)).collect();
        assert_eq!(bounds, vec![(0, 5), (10, 12)]);
    }

    #[test]
    fn test_filter_empty() {
        assert!(filter_non_overlapping(Vec::new()).is_empty());
    }

    #[test]
    fn test_select_drops_mismatched_text() {
        let text = "call Alice now";
        let good = Span::new(5, 10, "PERSON", 0.9, "bert", "Alice");
        let bad = Span::new(0, 4, "PERSON", 0.9, "bert", "##ca");
        let out_of_range = Span::new(10, 40, "PERSON", 0.9, "bert", "now");
        let selection = select_spans(text, vec![bad, good.clone(), out_of_range]);
        assert_eq!(selection.spans, vec![good]);
        assert_eq!(selection.dropped, 2);
    }

    #[test]
    fn test_matches_source_rejects_non_char_boundary() {
        let text = "héllo";
        let span = Span::new(0, 2, "X", 1.0, SOURCE_REGEX, "h\u{00e9}");
        assert!(!span.matches_source(text));
    }
}
