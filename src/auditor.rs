//! P2 (optional second pass): self-audit of already-redacted text for
//! person mentions the Detector/Validator missed.
//!
//! Four narrow heuristics, each scanning only the redacted text plus the
//! current `Mapping` — no NLP engine call, no network. A mention found this
//! way is folded into the existing coreference cluster when its text is a
//! token subset of a known canonical name (e.g. "Johnson" joins the
//! "Steve Johnson" cluster); otherwise it starts a new cluster with its own
//! tag, allocated from the same counters the Redactor used so tags stay
//! indistinguishable between passes. Running the audit again over its own
//! output finds nothing new — every surfaced mention is tagged before the
//! pass returns.

use lazy_static::lazy_static;
use regex::Regex;

use crate::model::{any_tag_regex, next_person_tag, Mapping};
use crate::redactor::is_token_subset;

lazy_static! {
    static ref TITLE_PREFIX_RE: Regex = Regex::new(
        r"\b(?:Mr|Mrs|Ms|Mx|Dr|Prof)\.?\s+([A-Z][a-z]+(?:\s[A-Z][a-z]+){0,2})\b"
    ).unwrap();

    static ref CAP_PHRASE_RE: Regex =
        Regex::new(r"\b([A-Z][a-z]+(?:\s[A-Z][a-z]+){1,2})\b").unwrap();

    static ref POSSESSIVE_RE: Regex = Regex::new(r"\b([A-Z][a-z]+)'s\b").unwrap();

    static ref CONJUNCTION_AFTER_TAG_RE: Regex =
        Regex::new(r"(<<[A-Z]+[0-9]*>>)\s+and\s+([A-Z][a-z]+(?:\s[A-Z][a-z]+)?)\b").unwrap();

    static ref CONJUNCTION_BEFORE_TAG_RE: Regex =
        Regex::new(r"\b([A-Z][a-z]+(?:\s[A-Z][a-z]+)?)\s+and\s+(<<[A-Z]+[0-9]*>>)").unwrap();
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct Candidate {
    start: usize,
    end: usize,
    name: String,
}

fn tagged_byte_ranges(text: &str) -> Vec<(usize, usize)> {
    any_tag_regex().find_iter(text).map(|m| (m.start(), m.end())).collect()
}

fn overlaps_any(start: usize, end: usize, ranges: &[(usize, usize)]) -> bool {
    ranges.iter().any(|&(s, e)| start < e && s < end)
}

fn collect_candidates(text: &str, known_name_parts: &[String]) -> Vec<Candidate> {
    let protected = tagged_byte_ranges(text);
    let mut out = Vec::new();

    for m in TITLE_PREFIX_RE.captures_iter(text) {
        let g = m.get(1).unwrap();
        if !overlaps_any(g.start(), g.end(), &protected) {
            out.push(Candidate { start: g.start(), end: g.end(), name: g.as_str().to_string() });
        }
    }

    for m in CONJUNCTION_AFTER_TAG_RE.captures_iter(text) {
        let g = m.get(2).unwrap();
        if !overlaps_any(g.start(), g.end(), &protected) {
            out.push(Candidate { start: g.start(), end: g.end(), name: g.as_str().to_string() });
        }
    }
    for m in CONJUNCTION_BEFORE_TAG_RE.captures_iter(text) {
        let g = m.get(1).unwrap();
        if !overlaps_any(g.start(), g.end(), &protected) {
            out.push(Candidate { start: g.start(), end: g.end(), name: g.as_str().to_string() });
        }
    }

    for m in POSSESSIVE_RE.captures_iter(text) {
        let g = m.get(1).unwrap();
        let word = g.as_str();
        if known_name_parts.iter().any(|p| p.eq_ignore_ascii_case(word))
            && !overlaps_any(g.start(), g.end(), &protected)
        {
            out.push(Candidate { start: g.start(), end: g.end(), name: word.to_string() });
        }
    }

    // Bare capitalized 2-3 word phrases: only worth surfacing when they
    // share a word with an already-known name (otherwise this would
    // over-trigger on section headers, product names, etc. with no
    // cheap way to tell them apart from a real missed person here).
    for m in CAP_PHRASE_RE.captures_iter(text) {
        let g = m.get(1).unwrap();
        if overlaps_any(g.start(), g.end(), &protected) {
            continue;
        }
        let phrase = g.as_str();
        let shares_known_part = phrase
            .split_whitespace()
            .any(|w| known_name_parts.iter().any(|p| p.eq_ignore_ascii_case(w)));
        if shares_known_part {
            out.push(Candidate { start: g.start(), end: g.end(), name: phrase.to_string() });
        }
    }

    out.sort();
    out.dedup();
    out
}

/// Run the self-audit pass once. Returns the (possibly further redacted)
/// text and an extended `Mapping`. If nothing new is found, returns the
/// inputs unchanged.
pub fn audit(text: &str, mapping: &Mapping) -> (String, Mapping) {
    let known_name_parts: Vec<String> = mapping
        .tags
        .values()
        .flat_map(|name| name.split_whitespace().map(|w| w.to_string()))
        .collect();

    let candidates = collect_candidates(text, &known_name_parts);
    if candidates.is_empty() {
        return (text.to_string(), mapping.clone());
    }

    let mut new_tags = mapping.tags.clone();
    let mut new_persons = mapping.persons.clone();
    let mut counts = mapping.person_initials_counts();

    let mut assignments: Vec<(usize, usize, String)> = Vec::new();
    for cand in &candidates {
        if let Some(tag) = new_persons.get(&cand.name) {
            assignments.push((cand.start, cand.end, tag.clone()));
            continue;
        }
        let existing_cluster = new_tags.iter().find(|(_, canonical)| is_token_subset(canonical, &cand.name));
        let tag = if let Some((tag, _)) = existing_cluster {
            tag.clone()
        } else {
            let initials: String = cand
                .name
                .split_whitespace()
                .filter_map(|w| w.chars().next())
                .map(|c| c.to_ascii_uppercase())
                .collect();
            let tag = next_person_tag(&initials, &mut counts);
            new_tags.insert(tag.clone(), cand.name.clone());
            tag
        };
        new_persons.insert(cand.name.clone(), tag.clone());
        assignments.push((cand.start, cand.end, tag));
    }

    assignments.sort_by(|a, b| b.0.cmp(&a.0));
    let mut out = text.to_string();
    for (start, end, tag) in assignments {
        out.replace_range(start..end, &tag);
    }

    let mut metadata = mapping.metadata.clone();
    metadata.entities_found += candidates.len();

    (
        out,
        Mapping {
            tags: new_tags,
            persons: new_persons,
            metadata,
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn mapping_with(tag: &str, name: &str) -> Mapping {
        let mut tags = BTreeMap::new();
        tags.insert(tag.to_string(), name.to_string());
        let mut persons = BTreeMap::new();
        persons.insert(name.to_string(), tag.to_string());
        Mapping { tags, persons, metadata: Default::default() }
    }

    #[test]
    fn orphaned_conjunction_gets_tagged() {
        let mapping = mapping_with("<<SJ>>", "Steve Johnson");
        let text = "<<SJ>> and Maria attended the review.";
        let (redacted, updated) = audit(text, &mapping);
        assert!(redacted.contains("<<M>>") || redacted.contains("Maria") == false);
        assert_eq!(updated.tags.len(), 2);
    }

    #[test]
    fn title_prefixed_name_gets_tagged() {
        let mapping = Mapping::default();
        let text = "Please contact Dr. Alice Brennan for details.";
        let (redacted, updated) = audit(text, &mapping);
        assert!(!redacted.contains("Alice Brennan"));
        assert_eq!(updated.tags.len(), 1);
    }

    #[test]
    fn possessive_of_known_name_part_gets_tagged() {
        let mapping = mapping_with("<<SJ>>", "Steve Johnson");
        let text = "Johnson's report was late.";
        let (redacted, updated) = audit(text, &mapping);
        assert!(redacted.contains("<<SJ>>"));
        assert_eq!(updated.tags.len(), 1, "possessive should join the existing cluster, not create a new one");
    }

    #[test]
    fn idempotent_on_fully_tagged_text() {
        let mapping = mapping_with("<<SJ>>", "Steve Johnson");
        let text = "<<SJ>> attended the review.";
        let (redacted, updated) = audit(text, &mapping);
        assert_eq!(redacted, text);
        assert_eq!(updated.tags.len(), mapping.tags.len());
    }
}
