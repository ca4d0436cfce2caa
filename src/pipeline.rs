use std::fmt;
use std::ops::Range;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::detect::Detector;
use crate::error::{Result, VeilError};
use crate::span::{select_spans, Span};
use crate::store::TokenStore;
use crate::traverse;

/// Label-free template; the first token is `[REDACTED_1]`.
pub const DEFAULT_TEMPLATE: &str = "[REDACTED_{counter}]";

/// Label-aware template, e.g. `[EMAIL_3]`.
pub const LABELED_TEMPLATE: &str = "[{label}_{counter}]";

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Counter,
    Label,
}

/// Parsed redaction token template.
///
/// Placeholders: `{counter}` (or `{n}`) and `{label}`; `{{` and `}}` are
/// literal braces. A counter placeholder is mandatory so that distinct tokens
/// never compare equal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenFormat {
    template: String,
    segments: Vec<Segment>,
}

impl TokenFormat {
    pub fn new(template: impl Into<String>) -> Result<Self> {
        let template = template.into();
        let invalid = |reason: &str| VeilError::InvalidFormat {
            template: template.clone(),
            reason: reason.into(),
        };

        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut chars = template.chars().peekable();
        while let Some(c) = chars.next() {
            match c {
                '{' if chars.peek() == Some(&'{') => {
                    chars.next();
                    literal.push('{');
                }
                '}' if chars.peek() == Some(&'}') => {
                    chars.next();
                    literal.push('}');
                }
                '{' => {
                    let mut name = String::new();
                    loop {
                        match chars.next() {
                            Some('}') => break,
                            Some(ch) => name.push(ch),
                            None => return Err(invalid("unclosed placeholder")),
                        }
                    }
                    let segment = match name.as_str() {
                        "counter" | "n" => Segment::Counter,
                        "label" => Segment::Label,
                        other => return Err(invalid(&format!("unknown placeholder {{{other}}}"))),
                    };
                    if !literal.is_empty() {
                        segments.push(Segment::Literal(std::mem::take(&mut literal)));
                    }
                    segments.push(segment);
                }
                _ => literal.push(c),
            }
        }
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        if !segments.contains(&Segment::Counter) {
            return Err(invalid("missing {counter} placeholder"));
        }
        Ok(Self { template, segments })
    }

    pub fn labeled() -> Self {
        Self::new(LABELED_TEMPLATE).expect("built-in template is valid")
    }

    pub fn template(&self) -> &str {
        &self.template
    }

    pub fn render(&self, counter: u64, label: &str) -> String {
        let mut out = String::with_capacity(self.template.len() + 8);
        for segment in &self.segments {
            match segment {
                Segment::Literal(s) => out.push_str(s),
                Segment::Counter => out.push_str(&counter.to_string()),
                Segment::Label => out.push_str(label),
            }
        }
        out
    }
}

impl Default for TokenFormat {
    fn default() -> Self {
        Self::new(DEFAULT_TEMPLATE).expect("built-in template is valid")
    }
}

impl fmt::Display for TokenFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.template)
    }
}

/// Token emission state shared by the pipeline and the streaming buffer:
/// template, monotonically increasing counter, optional store.
#[derive(Debug, Clone, Default)]
pub(crate) struct Redactor {
    format: TokenFormat,
    counter: u64,
    store: Option<Arc<TokenStore>>,
}

impl Redactor {
    pub(crate) fn new(format: TokenFormat, store: Option<Arc<TokenStore>>) -> Self {
        Self {
            format,
            counter: 0,
            store,
        }
    }

    pub(crate) fn format(&self) -> &TokenFormat {
        &self.format
    }

    pub(crate) fn store(&self) -> Option<&Arc<TokenStore>> {
        self.store.as_ref()
    }

    /// Number of tokens emitted so far.
    pub(crate) fn counter(&self) -> u64 {
        self.counter
    }

    pub(crate) fn reset(&mut self) {
        self.counter = 0;
    }

    fn next_token(&mut self, span: &Span) -> String {
        self.counter += 1;
        let token = self.format.render(self.counter, &span.label);
        if let Some(store) = &self.store {
            store.record(&token, &span.text);
        }
        token
    }

    /// Append `text[range]` to `out` with every span replaced by a fresh
    /// token. Returns the number of tokens emitted.
    ///
    /// `spans` must come from [`select_spans`] over `text`: sorted,
    /// non-overlapping, on char boundaries, and inside `range`.
    pub(crate) fn emit(
        &mut self,
        text: &str,
        range: Range<usize>,
        spans: &[Span],
        out: &mut String,
    ) -> usize {
        let mut cursor = range.start;
        for span in spans {
            debug_assert!(cursor <= span.start && span.end <= range.end);
            out.push_str(&text[cursor..span.start]);
            let token = self.next_token(span);
            out.push_str(&token);
            cursor = span.end;
        }
        out.push_str(&text[cursor..range.end]);
        spans.len()
    }
}

/// One detection as reported by [`RedactionPipeline::explain`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub start: usize,
    pub end: usize,
    pub text: String,
    pub label: String,
    pub source: String,
    pub score: f64,
}

impl From<Span> for Detection {
    fn from(span: Span) -> Self {
        Self {
            start: span.start,
            end: span.end,
            text: span.text,
            label: span.label,
            source: span.source,
            score: span.score,
        }
    }
}

/// Audit view of a text: what would be redacted, without redacting it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Explanation {
    pub original: String,
    pub detections: Vec<Detection>,
}

/// Detection-to-redaction pipeline for complete strings.
pub struct RedactionPipeline {
    detector: Arc<dyn Detector>,
    redactor: Redactor,
}

impl RedactionPipeline {
    pub fn new<D: Detector + 'static>(detector: D) -> Self {
        Self::from_shared(Arc::new(detector))
    }

    pub fn from_shared(detector: Arc<dyn Detector>) -> Self {
        Self {
            detector,
            redactor: Redactor::default(),
        }
    }

    pub fn with_format(mut self, format: TokenFormat) -> Self {
        self.redactor = Redactor::new(format, self.redactor.store.take());
        self
    }

    pub fn with_store(mut self, store: Arc<TokenStore>) -> Self {
        self.redactor.store = Some(store);
        self
    }

    pub fn detector(&self) -> &Arc<dyn Detector> {
        &self.detector
    }

    pub fn format(&self) -> &TokenFormat {
        self.redactor.format()
    }

    pub fn store(&self) -> Option<&Arc<TokenStore>> {
        self.redactor.store()
    }

    /// Tokens emitted by this pipeline so far.
    pub fn counter(&self) -> u64 {
        self.redactor.counter()
    }

    /// Restart token numbering at 1. The store is left untouched.
    pub fn reset_counter(&mut self) {
        self.redactor.reset();
    }

    fn select(&self, text: &str) -> Result<Vec<Span>> {
        let spans = self.detector.detect(text)?;
        Ok(select_spans(text, spans).spans)
    }

    /// Replace every selected span in `text` with a token, recording each
    /// token in the attached store.
    pub fn redact(&mut self, text: &str) -> Result<String> {
        let spans = self.select(text)?;
        let mut out = String::with_capacity(text.len());
        let emitted = self.redactor.emit(text, 0..text.len(), &spans, &mut out);
        tracing::debug!(detector = self.detector.name(), emitted, "redacted text");
        Ok(out)
    }

    /// The spans [`redact`](Self::redact) would replace, as structured records.
    pub fn explain(&self, text: &str) -> Result<Explanation> {
        let detections = self.select(text)?.into_iter().map(Detection::from).collect();
        Ok(Explanation {
            original: text.to_string(),
            detections,
        })
    }

    /// Redact every string leaf of a JSON document.
    pub fn redact_json(&mut self, value: &Value) -> Result<Value> {
        traverse::redact_value(value, &mut |s: &str| self.redact(s))
    }
}
