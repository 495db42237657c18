//! P1: first-pass entity detection.
//!
//! Combines seven ordered regex patterns for structured PII with a
//! statistical NER pass (via [`crate::nlp::NlpEngine`]) for PERSON and DOB
//! candidates, plus an all-caps-header heuristic for resume-style documents.
//! Candidates are merged and overlap-resolved before being handed to the
//! Validator.

use lazy_static::lazy_static;
use regex::Regex;

use crate::constants::*;
use crate::model::{Entity, Label};
use crate::nlp::{NerLabel, NlpEngine};
use crate::textindex::CodePointIndex;

lazy_static! {
    static ref EMAIL_RE: Regex =
        Regex::new(r"[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}").unwrap();

    static ref PHONE_RE: Regex = Regex::new(
        r"(?:\+?\d{1,2}[-.\s]?)?\(?\d{3}\)?[-.\s]\d{3}[-.\s]\d{4}\b"
    ).unwrap();

    static ref SSN_RE: Regex = Regex::new(r"\b\d{3}-\d{2}-\d{4}\b").unwrap();

    static ref URL_RE: Regex = Regex::new(r"https?://[^\s<>\)]+").unwrap();

    static ref DOB_RE: Regex = Regex::new(
        r"\b(?:0?[1-9]|1[0-2])[/-](?:0?[1-9]|[12]\d|3[01])[/-](?:\d{4}|\d{2})\b|\b(?:Jan(?:uary)?|Feb(?:ruary)?|Mar(?:ch)?|Apr(?:il)?|May|Jun(?:e)?|Jul(?:y)?|Aug(?:ust)?|Sep(?:tember)?|Oct(?:ober)?|Nov(?:ember)?|Dec(?:ember)?)\s+\d{1,2},\s+\d{4}\b"
    ).unwrap();

    static ref ID_NUMBER_RE: Regex = Regex::new(
        r"\b[A-Z]{1,3}-?\d{6,9}\b"
    ).unwrap();

    static ref ADDRESS_RE: Regex = Regex::new(
        r"(?i)\b\d{1,5}\s+[A-Za-z0-9.'\s]{2,40}?\s(?:Street|St|Avenue|Ave|Road|Rd|Boulevard|Blvd|Lane|Ln|Drive|Dr|Court|Ct|Way|Place|Pl|Circle|Cir)\.?\b"
    ).unwrap();

    static ref ALL_CAPS_WORD_RE: Regex = Regex::new(r"\b[A-Z][A-Z'\-]{2,}(?:\s+[A-Z][A-Z'\-]{1,})?\b").unwrap();
}

/// Classification used to pick doc-type-specific heuristics, mirrored from
/// the reference implementation's simple keyword scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocType {
    Resume,
    Transcript,
    General,
}

const RESUME_KEYWORDS: &[&str] = &["resume", "curriculum vitae", "work experience", "education"];
const TRANSCRIPT_KEYWORDS: &[&str] = &["interviewer:", "speaker", "q:", "a:"];

/// Classify a document by scanning the first [`DOC_TYPE_WINDOW`] characters
/// for keyword hits. Resume keywords take priority over transcript ones,
/// matching the reference implementation's check order.
pub fn detect_doc_type(text: &str) -> DocType {
    let window: String = text.chars().take(DOC_TYPE_WINDOW).collect();
    let lower = window.to_lowercase();
    if RESUME_KEYWORDS.iter().any(|k| lower.contains(k)) {
        DocType::Resume
    } else if TRANSCRIPT_KEYWORDS.iter().any(|k| lower.contains(k)) {
        DocType::Transcript
    } else {
        DocType::General
    }
}

fn regex_entities(text: &str, idx: &CodePointIndex) -> Vec<Entity> {
    let mut out = Vec::new();

    for m in EMAIL_RE.find_iter(text) {
        out.push(Entity::new(m.as_str(), Label::Email, idx.byte_to_char(m.start()), idx.byte_to_char(m.end()), REGEX_CONFIDENCE));
    }
    for m in PHONE_RE.find_iter(text) {
        out.push(Entity::new(m.as_str(), Label::Phone, idx.byte_to_char(m.start()), idx.byte_to_char(m.end()), REGEX_CONFIDENCE));
    }
    for m in SSN_RE.find_iter(text) {
        out.push(Entity::new(m.as_str(), Label::Ssn, idx.byte_to_char(m.start()), idx.byte_to_char(m.end()), REGEX_CONFIDENCE));
    }
    for m in URL_RE.find_iter(text) {
        out.push(Entity::new(m.as_str(), Label::Url, idx.byte_to_char(m.start()), idx.byte_to_char(m.end()), REGEX_CONFIDENCE));
    }
    for m in DOB_RE.find_iter(text) {
        out.push(Entity::new(m.as_str(), Label::Dob, idx.byte_to_char(m.start()), idx.byte_to_char(m.end()), DOB_REGEX_CONFIDENCE));
    }
    for m in ID_NUMBER_RE.find_iter(text) {
        out.push(Entity::new(m.as_str(), Label::IdNumber, idx.byte_to_char(m.start()), idx.byte_to_char(m.end()), REGEX_CONFIDENCE));
    }
    for m in ADDRESS_RE.find_iter(text) {
        out.push(Entity::new(m.as_str(), Label::Address, idx.byte_to_char(m.start()), idx.byte_to_char(m.end()), REGEX_CONFIDENCE));
    }

    out
}

fn is_valid_person(text: &str) -> bool {
    if text.contains('@') || text.contains('\n') || text.chars().any(|c| c.is_ascii_digit()) {
        return false;
    }
    let tokens = text.split_whitespace().count();
    (1..=MAX_PERSON_TOKENS).contains(&tokens)
}

fn ner_entities(text: &str, engine: &dyn NlpEngine) -> Vec<Entity> {
    let spans = engine.ner(text);
    let non_person_texts: std::collections::HashSet<String> = spans
        .iter()
        .filter(|s| s.label.is_non_person_entity())
        .map(|s| s.text.to_lowercase())
        .collect();

    let mut out = Vec::new();
    for span in spans {
        match span.label {
            NerLabel::Person => {
                if is_valid_person(&span.text) && !non_person_texts.contains(&span.text.to_lowercase()) {
                    out.push(Entity::new(span.text, Label::Person, span.start, span.end, 1.0));
                }
            }
            NerLabel::Date => {
                if span.text.chars().count() <= MAX_SPECIFIC_DATE_CHARS {
                    out.push(Entity::new(span.text, Label::Dob, span.start, span.end, DOB_NER_CONFIDENCE));
                }
            }
            _ => {}
        }
    }
    out
}

/// All-caps header heuristic: near the top of a document, a 2-3 word
/// all-caps run is very likely a name header in resume-style layouts.
fn header_entities(text: &str, idx: &CodePointIndex) -> Vec<Entity> {
    let window_end_byte = {
        let window_chars = HEADER_HEURISTIC_WINDOW.min(idx.char_len());
        idx.char_to_byte(window_chars)
    };
    let window = &text[..window_end_byte];
    let mut out = Vec::new();
    for m in ALL_CAPS_WORD_RE.find_iter(window) {
        let word_count = m.as_str().split_whitespace().count();
        if (1..=3).contains(&word_count) && m.as_str().chars().any(|c| c.is_alphabetic()) {
            out.push(Entity::new(
                m.as_str(),
                Label::Person,
                idx.byte_to_char(m.start()),
                idx.byte_to_char(m.end()),
                HEADER_HEURISTIC_CONFIDENCE,
            ));
        }
    }
    out
}

/// Sort by `(start, -len)` then greedily keep the first candidate at each
/// position, dropping any later candidate that overlaps one already kept.
/// Mirrors the reference implementation's merge step.
fn dedupe_overlaps(mut entities: Vec<Entity>) -> Vec<Entity> {
    entities.sort_by(|a, b| {
        a.start
            .cmp(&b.start)
            .then_with(|| b.len_chars().cmp(&a.len_chars()))
            .then(b.confidence.partial_cmp(&a.confidence).unwrap_or(std::cmp::Ordering::Equal))
    });

    let mut kept: Vec<Entity> = Vec::new();
    for entity in entities {
        let overlaps = kept
            .iter()
            .any(|k| entity.start < k.end && k.start < entity.end);
        if !overlaps {
            kept.push(entity);
        }
    }
    kept
}

/// Run the full P1 detection pass over `text`.
pub fn detect(text: &str, engine: &dyn NlpEngine) -> Vec<Entity> {
    let idx = CodePointIndex::new(text);
    let mut entities = regex_entities(text, &idx);
    entities.extend(ner_entities(text, engine));
    entities.extend(header_entities(text, &idx));
    dedupe_overlaps(entities)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nlp::heuristic::HeuristicEngine;

    #[test]
    fn detects_email_and_phone() {
        let engine = HeuristicEngine::new();
        let text = "Contact Steve Johnson at steve.j@example.com or 555-123-4567.";
        let entities = detect(text, &engine);
        assert!(entities.iter().any(|e| e.label == Label::Email));
        assert!(entities.iter().any(|e| e.label == Label::Phone));
    }

    #[test]
    fn detects_ssn_and_url() {
        let engine = HeuristicEngine::new();
        let text = "SSN 123-45-6789, see https://example.com/profile for more.";
        let entities = detect(text, &engine);
        assert!(entities.iter().any(|e| e.label == Label::Ssn));
        assert!(entities.iter().any(|e| e.label == Label::Url));
    }

    #[test]
    fn overlapping_candidates_keep_only_one() {
        let engine = HeuristicEngine::new();
        let text = "Steve Johnson Steve Johnson@example.com";
        let entities = detect(text, &engine);
        for a in &entities {
            for b in &entities {
                if a as *const _ != b as *const _ {
                    assert!(a.start >= b.end || b.start >= a.end, "entities overlap: {:?} {:?}", a, b);
                }
            }
        }
    }

    #[test]
    fn doc_type_detection() {
        assert_eq!(detect_doc_type("My Resume\n\nWork Experience: ..."), DocType::Resume);
        assert_eq!(detect_doc_type("INTERVIEWER: Tell me about yourself."), DocType::Transcript);
        assert_eq!(detect_doc_type("A perfectly ordinary letter."), DocType::General);
    }
}
