//! A dependency-light, fully offline [`NlpEngine`] implementation.
//!
//! Approximates spaCy's sentence segmenter, POS tagger, and PERSON/DATE/ORG
//! entity recognizer with capitalization-driven heuristics. This is the
//! default engine and the one every test in this crate runs against — it
//! needs no model download, so a fresh checkout of the crate is testable
//! offline.

use lazy_static::lazy_static;
use regex::Regex;

use super::{NerLabel, NerSpan, NlpEngine, PosClass, PosTag, Sentence};

lazy_static! {
    /// Day-first dates the structured regex pass (which expects
    /// month-first or "Month DD, YYYY") does not cover, e.g. "15 March 1990".
    static ref DAY_FIRST_DATE_RE: Regex = Regex::new(
        r"(?i)\b\d{1,2}\s+(?:Jan(?:uary)?|Feb(?:ruary)?|Mar(?:ch)?|Apr(?:il)?|May|Jun(?:e)?|Jul(?:y)?|Aug(?:ust)?|Sep(?:tember)?|Oct(?:ober)?|Nov(?:ember)?|Dec(?:ember)?)\s+\d{2,4}\b"
    ).unwrap();

    /// Corporate / institutional suffixes used to seed the non-person label
    /// set the Validator consults. Intentionally small; false negatives here
    /// only mean a PERSON candidate is scored on its own merits instead of
    /// being short-circuited.
    static ref ORG_SUFFIX_RE: Regex = Regex::new(
        r"\b[A-Z][A-Za-z&,.'\s]{1,40}?\s(?:Inc|LLC|LLP|Ltd|Corp|Corporation|Company|Co|Group|Associates|Foundation|Institute|University|College|Hospital|Clinic|Bank)\b\.?"
    ).unwrap();
}

const VAGUE_DATE_WORDS: &[&str] = &[
    "year", "years", "month", "months", "week", "weeks", "day", "days", "present", "current",
    "today", "now", "ago",
];

pub struct HeuristicEngine;

impl HeuristicEngine {
    pub fn new() -> Self {
        Self
    }
}

impl Default for HeuristicEngine {
    fn default() -> Self {
        Self::new()
    }
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '\'' || c == '-'
}

fn tokenize(chars: &[char]) -> Vec<(usize, usize)> {
    let mut tokens = Vec::new();
    let mut i = 0;
    while i < chars.len() {
        if chars[i].is_alphanumeric() {
            let start = i;
            while i < chars.len() && is_word_char(chars[i]) {
                i += 1;
            }
            tokens.push((start, i));
        } else {
            i += 1;
        }
    }
    tokens
}

fn chars_to_string(chars: &[char], start: usize, end: usize) -> String {
    chars[start..end].iter().collect()
}

/// A token "looks like a title-case word" if it starts uppercase and has at
/// least one more alphabetic char (excludes bare initials like "J").
fn is_title_case_word(word: &str) -> bool {
    let mut it = word.chars();
    match it.next() {
        Some(c) if c.is_uppercase() => it.clone().any(|c| c.is_alphabetic()),
        _ => false,
    }
}

impl NlpEngine for HeuristicEngine {
    fn sentences(&self, text: &str) -> Vec<Sentence> {
        let chars: Vec<char> = text.chars().collect();
        let mut spans = Vec::new();
        let mut start = 0usize;
        let mut i = 0usize;

        while i < chars.len() {
            let c = chars[i];
            if c == '.' || c == '!' || c == '?' {
                let mut j = i + 1;
                while j < chars.len() && (chars[j] == '.' || chars[j] == '!' || chars[j] == '?') {
                    j += 1;
                }
                let mut k = j;
                while k < chars.len() && chars[k].is_whitespace() && chars[k] != '\n' {
                    k += 1;
                }
                let boundary = k == chars.len() || (k < chars.len() && chars[k].is_uppercase());
                if boundary && j > start {
                    spans.push((start, j));
                    // skip whitespace (not newlines, those fall through below)
                    start = k;
                    i = k;
                    continue;
                }
                i = j;
                continue;
            }
            if c == '\n' {
                let mut j = i;
                while j < chars.len() && (chars[j] == '\n' || chars[j] == '\r') {
                    j += 1;
                }
                if j - i >= 2 {
                    if i > start {
                        spans.push((start, i));
                    }
                    start = j;
                    i = j;
                    continue;
                }
            }
            i += 1;
        }
        if start < chars.len() {
            spans.push((start, chars.len()));
        }

        spans
            .into_iter()
            .filter_map(|(s, e)| {
                let text = chars_to_string(&chars, s, e);
                let trimmed = text.trim();
                if trimmed.is_empty() {
                    None
                } else {
                    Some(Sentence { text, start: s, end: e })
                }
            })
            .collect()
    }

    fn pos_tags(&self, text: &str) -> Vec<PosTag> {
        let chars: Vec<char> = text.chars().collect();
        tokenize(&chars)
            .into_iter()
            .map(|(start, end)| {
                let word = chars_to_string(&chars, start, end);
                let tag = if is_title_case_word(&word) {
                    PosClass::ProperNoun
                } else {
                    PosClass::Other
                };
                PosTag { start, end, tag }
            })
            .collect()
    }

    fn ner(&self, text: &str) -> Vec<NerSpan> {
        let chars: Vec<char> = text.chars().collect();
        let tokens = tokenize(&chars);
        let mut spans = Vec::new();

        // PERSON: runs of 1-5 consecutive title-case tokens separated only
        // by single spaces, not preceded/followed by more title-case tokens
        // (so we capture the maximal run once, mirroring spaCy's whole-span
        // PERSON ents rather than one ent per word).
        let mut i = 0;
        while i < tokens.len() {
            let (s0, e0) = tokens[i];
            let w0 = chars_to_string(&chars, s0, e0);
            if is_title_case_word(&w0) && w0.chars().next().unwrap().is_uppercase() {
                let mut j = i;
                let mut last_end = e0;
                while j + 1 < tokens.len() {
                    let (ns, ne) = tokens[j + 1];
                    let gap: String = chars_to_string(&chars, last_end, ns);
                    if gap == " " {
                        let w = chars_to_string(&chars, ns, ne);
                        if is_title_case_word(&w) {
                            j += 1;
                            last_end = ne;
                            continue;
                        }
                    }
                    break;
                }
                let run_len = j - i + 1;
                if run_len <= 5 {
                    let start = s0;
                    let end = last_end;
                    let entity_text = chars_to_string(&chars, start, end);
                    spans.push(NerSpan {
                        label: NerLabel::Person,
                        text: entity_text,
                        start,
                        end,
                    });
                }
                i = j + 1;
                continue;
            }
            i += 1;
        }

        // ORG: corporate-suffix runs, matched over the whole string (byte
        // offsets from `regex` converted to char offsets via a local index).
        let idx = crate::textindex::CodePointIndex::new(text);
        for m in ORG_SUFFIX_RE.find_iter(text) {
            let trimmed = m.as_str().trim().trim_end_matches('.');
            spans.push(NerSpan {
                label: NerLabel::Org,
                text: trimmed.to_string(),
                start: idx.byte_to_char(m.start()),
                end: idx.byte_to_char(m.start()) + trimmed.chars().count(),
            });
        }

        // DATE: day-first dates the regex pass does not already cover.
        for m in DAY_FIRST_DATE_RE.find_iter(text) {
            let candidate = m.as_str();
            if is_specific_date(candidate) {
                spans.push(NerSpan {
                    label: NerLabel::Date,
                    text: candidate.to_string(),
                    start: idx.byte_to_char(m.start()),
                    end: idx.byte_to_char(m.end()),
                });
            }
        }

        spans
    }
}

fn is_specific_date(text: &str) -> bool {
    if !text.chars().any(|c| c.is_ascii_digit()) {
        return false;
    }
    let lower = text.to_lowercase();
    if VAGUE_DATE_WORDS.iter().any(|w| lower.contains(w)) {
        return false;
    }
    if text.contains(" - ") || lower.contains(" to ") {
        return false;
    }
    text.chars().count() <= 30
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn segments_two_sentences() {
        let engine = HeuristicEngine::new();
        let sents = engine.sentences("Steve joined. He will lead the project.");
        assert_eq!(sents.len(), 2);
        assert_eq!(sents[0].text, "Steve joined.");
    }

    #[test]
    fn detects_person_name() {
        let engine = HeuristicEngine::new();
        let spans = engine.ner("Steve Johnson joined the team.");
        let persons: Vec<_> = spans.iter().filter(|s| s.label == NerLabel::Person).collect();
        assert!(persons.iter().any(|p| p.text == "Steve Johnson"));
    }

    #[test]
    fn pos_tags_mark_capitalized_tokens_as_proper_nouns() {
        let engine = HeuristicEngine::new();
        let tags = engine.pos_tags("Steve went home");
        assert_eq!(tags[0].tag, PosClass::ProperNoun);
        assert_eq!(tags[1].tag, PosClass::Other);
    }

    #[test]
    fn day_first_date_detected() {
        let engine = HeuristicEngine::new();
        let spans = engine.ner("Born 15 March 1990 in the city.");
        assert!(spans.iter().any(|s| s.label == NerLabel::Date));
    }
}
