//! Unit tests for pattern, keyword, external and hybrid detectors.

use veil_redact::detect::keyword::KeywordDetector;
use veil_redact::detect::{
    Detector, ExternalDetector, HybridDetector, PatternDetector, Prefer, Strategy,
};
use veil_redact::{RedactionPipeline, Span, VeilError};

const EMAIL: &str = r"[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}";

fn fixed(name: &'static str, spans: Vec<Span>) -> Box<dyn Detector> {
    Box::new(ExternalDetector::new(name, move |_: &str| Ok(spans.clone())))
}

// ---------------------------------------------------------------------------
// Pattern detector
// ---------------------------------------------------------------------------

#[test]
fn pattern_simple_email() {
    let det = PatternDetector::new([("EMAIL", EMAIL)]).unwrap();
    let spans = det.detect("Contact test@example.com").unwrap();
    assert_eq!(spans.len(), 1);
    let span = &spans[0];
    assert_eq!(span.label, "EMAIL");
    assert_eq!(span.text, "test@example.com");
    assert_eq!(span.start, 8);
    assert_eq!(span.end, 24);
}

#[test]
fn pattern_every_match_reported() {
    let det = PatternDetector::new([("EMAIL", EMAIL)]).unwrap();
    let text = "a@x.io, b@y.io and c@z.io";
    let spans = det.detect(text).unwrap();
    assert_eq!(spans.len(), 3);
    for span in &spans {
        assert_eq!(&text[span.start..span.end], span.text);
    }
}

#[test]
fn pattern_is_deterministic() {
    let det = PatternDetector::new(PatternDetector::default_patterns()).unwrap();
    let text = "call 555-123-4567 or mail ops@corp.example, ssn 123-45-6789";
    assert_eq!(det.detect(text).unwrap(), det.detect(text).unwrap());
}

#[test]
fn pattern_offsets_are_byte_offsets_on_char_boundaries() {
    let det = PatternDetector::new([("EMAIL", EMAIL)]).unwrap();
    let text = "Grüße an jörg@example.de";
    let spans = det.detect(text).unwrap();
    assert_eq!(spans.len(), 1);
    let span = &spans[0];
    // The local part stops at the non-ASCII 'ö'.
    assert_eq!(span.text, "rg@example.de");
    assert!(text.is_char_boundary(span.start));
    assert_eq!(&text[span.start..span.end], span.text);
}

#[test]
fn pattern_invalid_regex_is_configuration_error() {
    let result = PatternDetector::new([("EMAIL", EMAIL), ("BROKEN", "[a-")]);
    match result {
        Err(VeilError::InvalidPattern { label, .. }) => assert_eq!(label, "BROKEN"),
        Err(other) => panic!("unexpected error: {other}"),
        Ok(_) => panic!("invalid regex should not build"),
    }
}

// ---------------------------------------------------------------------------
// Keyword detector
// ---------------------------------------------------------------------------

#[test]
fn keyword_finds_dictionary_terms() {
    let det = KeywordDetector::new([("CODENAME", vec!["Nightjar", "Kestrel"])], false).unwrap();
    let spans = det.detect("Nightjar ships before Kestrel.").unwrap();
    let texts: Vec<_> = spans.iter().map(|s| s.text.as_str()).collect();
    assert_eq!(texts, vec!["Nightjar", "Kestrel"]);
}

// ---------------------------------------------------------------------------
// Hybrid detector
// ---------------------------------------------------------------------------

fn regex_and_spacy() -> (Vec<Box<dyn Detector>>, &'static str) {
    let text = "Ask John Smith today";
    let regex = fixed("rules", vec![Span::new(4, 14, "NAME", 1.0, "regex", "John Smith")]);
    let spacy = fixed("spacy", vec![Span::new(4, 8, "PERSON", 0.8, "spacy", "John")]);
    (vec![regex, spacy], text)
}

#[test]
fn hybrid_prefer_ml_keeps_model_span() {
    let (detectors, text) = regex_and_spacy();
    let det = HybridDetector::new(detectors, Strategy::Union, Prefer::Ml);
    let spans = det.detect(text).unwrap();
    assert_eq!(spans.len(), 1);
    assert_eq!(spans[0].source, "spacy");
}

#[test]
fn hybrid_prefer_rules_keeps_regex_span() {
    let (detectors, text) = regex_and_spacy();
    let det = HybridDetector::new(detectors, Strategy::Union, Prefer::Rules);
    let spans = det.detect(text).unwrap();
    assert_eq!(spans.len(), 1);
    assert_eq!(spans[0].source, "regex");
}

#[test]
fn hybrid_union_keeps_disjoint_spans_sorted() {
    let a = fixed("a", vec![Span::new(10, 12, "B", 1.0, "regex", "kl")]);
    let b = fixed("b", vec![Span::new(0, 3, "A", 0.9, "bert", "abc")]);
    let det = HybridDetector::new(vec![a, b], Strategy::Union, Prefer::Ml);
    let spans = det.detect("abcdefghijklm").unwrap();
    let starts: Vec<_> = spans.iter().map(|s| s.start).collect();
    assert_eq!(starts, vec![0, 10]);
}

#[test]
fn hybrid_chain_of_overlaps_resolves_to_one() {
    // 0..5 and 3..8 overlap; the survivor then overlaps 7..12.
    let det = HybridDetector::new(
        vec![fixed(
            "rules",
            vec![
                Span::new(0, 5, "A", 0.5, "regex", "abcde"),
                Span::new(3, 8, "B", 0.9, "regex", "defgh"),
                Span::new(7, 12, "C", 0.7, "regex", "hijkl"),
            ],
        )],
        Strategy::Union,
        Prefer::None,
    );
    let spans = det.detect("abcdefghijkl").unwrap();
    assert_eq!(spans.len(), 1);
    assert_eq!(spans[0].label, "B");
}

#[test]
fn hybrid_discards_mismatched_model_span_before_merging() {
    // The model wins under prefer=ml, but its text disagrees with the source;
    // the regex span it overlaps must survive.
    let text = "card 4111-1111 ok";
    let regex = fixed("rules", vec![Span::new(5, 14, "CARD", 1.0, "regex", "4111-1111")]);
    let bert = fixed("bert", vec![Span::new(5, 14, "PERSON", 0.99, "bert", "4111 1111")]);
    let det = HybridDetector::new(vec![regex, bert], Strategy::Union, Prefer::Ml);
    let spans = det.detect(text).unwrap();
    assert_eq!(spans.len(), 1);
    assert_eq!(spans[0].label, "CARD");

    let mut pipeline = RedactionPipeline::new(det);
    assert_eq!(pipeline.redact(text).unwrap(), "card [REDACTED_1] ok");
}

#[test]
fn hybrid_output_never_overlaps() {
    let det = HybridDetector::new(
        vec![
            Box::new(PatternDetector::new([("EMAIL", EMAIL)]).unwrap()),
            Box::new(PatternDetector::new([("DOMAIN", r"[a-z]+\.(?:com|org)")]).unwrap()),
        ],
        Strategy::Union,
        Prefer::Ml,
    );
    let spans = det.detect("bob@acme.com visits example.org").unwrap();
    for pair in spans.windows(2) {
        assert!(pair[0].end <= pair[1].start);
    }
    assert_eq!(spans[0].label, "EMAIL");
    assert_eq!(spans[1].text, "example.org");
}

#[test]
fn hybrid_propagates_sub_detector_errors() {
    let failing = ExternalDetector::new("bert", |_: &str| {
        Err(VeilError::Detection {
            detector: "bert".into(),
            reason: "model session closed".into(),
        })
    });
    let det = HybridDetector::new(vec![Box::new(failing)], Strategy::Union, Prefer::Ml);
    assert!(matches!(det.detect("x"), Err(VeilError::Detection { .. })));
}
