//! P3 support: tag neutralization, sentence-bounded sharding, and a
//! cryptographically secure shuffle, preparing redacted text for cloud
//! verification without exposing real tag values or document order.

use std::collections::BTreeMap;

use lazy_static::lazy_static;
use rand::seq::SliceRandom;
use rand::rngs::OsRng;
use regex::Regex;

use crate::constants::{MAX_SHARD_CHARS, MIN_SENTENCE_WORDS};
use crate::model::{ReverseTagMap, Shard};
use crate::nlp::NlpEngine;

lazy_static! {
    static ref PERSON_TAG_INNER_RE: Regex = Regex::new(r"^<<([A-Z]+\d*)>>$").unwrap();
    static ref TYPED_TAG_INNER_RE: Regex = Regex::new(r"^<<([A-Z]+)_(\d+)>>$").unwrap();
    static ref ANY_TAG_RE: Regex = Regex::new(r"<<[A-Z]+\d*>>|<<[A-Z]+_\d+>>").unwrap();
}

/// Deterministic base-26 letter suffix: 0 -> A, 1 -> B, ..., 25 -> Z, 26 -> AA, ...
fn letter_suffix(mut n: usize) -> String {
    let mut out = Vec::new();
    loop {
        out.push((b'A' + (n % 26) as u8) as char);
        if n < 26 {
            break;
        }
        n = n / 26 - 1;
    }
    out.iter().rev().collect()
}

/// The neutralization category a real tag falls into: `PERSON` for any
/// person-shaped tag (every such tag shares one letter sequence, since the
/// point is to hide which cluster is which, not just that it's a person),
/// or the typed prefix (`EMAIL`, `SSN`, ...) for a typed tag, which gets its
/// own independent letter sequence per type.
fn tag_category(original: &str) -> String {
    if PERSON_TAG_INNER_RE.is_match(original) {
        "PERSON".to_string()
    } else if let Some(caps) = TYPED_TAG_INNER_RE.captures(original) {
        caps.get(1).unwrap().as_str().to_string()
    } else {
        "UNKNOWN".to_string()
    }
}

/// Replace every real tag in `text` with an opaque per-category placeholder
/// (`<<PERSON_A>>`, `<<PERSON_B>>`, ... for person tags; `<<EMAIL_A>>`,
/// `<<EMAIL_B>>`, ... for email tags, and so on per type) that carries no
/// information about *which* person or value it is, so a cloud verifier
/// sees only "something of this kind was redacted here".
///
/// Returns the neutralized text and the map needed to reverse it
/// (neutralized tag -> original tag). Suffixes within a category are
/// assigned in lexicographic order of the original tag string, so the same
/// document always neutralizes to the same placeholders regardless of
/// where in the text each tag happens to appear.
pub fn neutralize_tags(text: &str) -> (String, ReverseTagMap) {
    let mut matches: Vec<(usize, usize, String)> = ANY_TAG_RE
        .find_iter(text)
        .map(|m| (m.start(), m.end(), m.as_str().to_string()))
        .collect();

    let mut order: Vec<String> = matches.iter().map(|(_, _, original)| original.clone()).collect();
    order.sort();
    order.dedup();

    let mut next_index: BTreeMap<String, usize> = BTreeMap::new();
    let mut placeholder_for: BTreeMap<String, String> = BTreeMap::new();
    for original in &order {
        let category = tag_category(original);
        let idx = next_index.entry(category.clone()).or_insert(0);
        placeholder_for.insert(original.clone(), format!("<<{category}_{}>>", letter_suffix(*idx)));
        *idx += 1;
    }

    // Longest original tag text first, so a tag that is a textual prefix of
    // another never gets partially clobbered by an earlier replace.
    matches.sort_by(|a, b| b.2.len().cmp(&a.2.len()).then(b.0.cmp(&a.0)));

    let mut reverse = ReverseTagMap::new();
    let mut out = text.to_string();
    for (start, end, original) in matches {
        let placeholder = placeholder_for.get(&original).expect("every match was indexed above").clone();
        out.replace_range(start..end, &placeholder);
        reverse.insert(placeholder, original);
    }
    (out, reverse)
}

fn word_count(s: &str) -> usize {
    s.split_whitespace().count()
}

/// Split `neutralized` into shards of at most [`MAX_SHARD_CHARS`], on
/// sentence boundaries where possible. A sentence shorter than
/// [`MIN_SENTENCE_WORDS`] words merges into its predecessor rather than
/// standing alone (a fragment like "Thanks." leaks less as part of a
/// larger shard). A single sentence longer than the cap is hard-split at
/// the nearest preceding whitespace.
pub fn shard_text(neutralized: &str, engine: &dyn NlpEngine) -> Vec<Shard> {
    let sentences = engine.sentences(neutralized);
    let idx = crate::textindex::CodePointIndex::new(neutralized);

    let mut merged: Vec<(usize, usize)> = Vec::new();
    for s in &sentences {
        if word_count(&s.text) < MIN_SENTENCE_WORDS {
            if let Some(last) = merged.last_mut() {
                last.1 = s.end;
                continue;
            }
        }
        merged.push((s.start, s.end));
    }

    let mut shards = Vec::new();
    let mut cur_start: Option<usize> = None;
    let mut cur_end = 0usize;

    let mut flush = |start: Option<usize>, end: usize, shards: &mut Vec<Shard>| {
        if let Some(s) = start {
            if end > s {
                let text = crate::textindex::slice_by_chars(neutralized, s, end).to_string();
                shards.push(Shard {
                    id: format!("shard-{}", uuid::Uuid::new_v4()),
                    text,
                    start: s,
                    end,
                    is_canary: false,
                });
            }
        }
    };

    for (s_start, s_end) in merged {
        let sentence_len = s_end - s_start;
        if sentence_len > MAX_SHARD_CHARS {
            flush(cur_start, cur_end, &mut shards);
            cur_start = None;
            // Hard split on whitespace boundaries within the oversized sentence.
            let mut piece_start = s_start;
            while piece_start < s_end {
                let mut piece_end = (piece_start + MAX_SHARD_CHARS).min(s_end);
                if piece_end < s_end {
                    let mut back = piece_end;
                    while back > piece_start {
                        let b = idx.char_to_byte(back);
                        if neutralized[..b].ends_with(' ') || neutralized[..b].ends_with('\n') {
                            break;
                        }
                        back -= 1;
                    }
                    if back > piece_start {
                        piece_end = back;
                    }
                }
                let text = crate::textindex::slice_by_chars(neutralized, piece_start, piece_end).to_string();
                shards.push(Shard {
                    id: format!("shard-{}", uuid::Uuid::new_v4()),
                    text,
                    start: piece_start,
                    end: piece_end,
                    is_canary: false,
                });
                piece_start = piece_end;
            }
            continue;
        }

        match cur_start {
            None => {
                cur_start = Some(s_start);
                cur_end = s_end;
            }
            Some(s) => {
                if s_end - s <= MAX_SHARD_CHARS {
                    cur_end = s_end;
                } else {
                    flush(cur_start, cur_end, &mut shards);
                    cur_start = Some(s_start);
                    cur_end = s_end;
                }
            }
        }
    }
    flush(cur_start, cur_end, &mut shards);
    shards
}

/// Shuffle shards with a cryptographically secure RNG so shard order leaks
/// no information about document structure to the verifier.
pub fn shuffle_shards(shards: &mut [Shard]) {
    shards.shuffle(&mut OsRng);
}

/// Aggregate, order-free context sent alongside shards: how many of each
/// entity type were redacted and the coarse document type, never the tag
/// values or any text span.
#[derive(Debug, Clone, serde::Serialize)]
pub struct VerifyContext {
    pub entity_counts: BTreeMap<String, usize>,
    pub document_type: String,
}

pub fn build_context(reverse_map: &ReverseTagMap, document_type: &str) -> VerifyContext {
    let mut entity_counts: BTreeMap<String, usize> = BTreeMap::new();
    for original in reverse_map.values() {
        *entity_counts.entry(tag_category(original)).or_insert(0) += 1;
    }
    VerifyContext {
        entity_counts,
        document_type: document_type.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nlp::heuristic::HeuristicEngine;

    #[test]
    fn neutralize_hides_original_tag_text() {
        let (neutralized, reverse) = neutralize_tags("Hi <<SJ>>, email <<EMAIL_1>> now.");
        assert!(!neutralized.contains("SJ"));
        assert!(!neutralized.contains("EMAIL_1"));
        assert_eq!(reverse.len(), 2);
        let mut restored = neutralized.clone();
        for (placeholder, original) in &reverse {
            restored = restored.replace(placeholder, original);
        }
        assert_eq!(restored, "Hi <<SJ>>, email <<EMAIL_1>> now.");
    }

    #[test]
    fn short_sentence_merges_with_predecessor() {
        let engine = HeuristicEngine::new();
        let text = "This is a reasonably long opening sentence about the project. Thanks.";
        let shards = shard_text(text, &engine);
        assert_eq!(shards.len(), 1, "short trailing sentence should merge: {:?}", shards);
    }

    #[test]
    fn oversized_sentence_is_hard_split() {
        let engine = HeuristicEngine::new();
        let long_sentence = format!("{}.", "word ".repeat(300).trim());
        let shards = shard_text(&long_sentence, &engine);
        assert!(shards.len() >= 2);
        for s in &shards {
            assert!(s.text.chars().count() <= MAX_SHARD_CHARS);
        }
    }

    #[test]
    fn context_counts_never_include_tag_values() {
        let (_, reverse) = neutralize_tags("Hi <<SJ>>, email <<EMAIL_1>> now.");
        let ctx = build_context(&reverse, "general");
        let serialized = serde_json::to_string(&ctx).unwrap();
        assert!(!serialized.contains("SJ"));
        assert!(!serialized.contains("EMAIL_1"));
        assert_eq!(ctx.entity_counts.get("PERSON"), Some(&1));
        assert_eq!(ctx.entity_counts.get("EMAIL"), Some(&1));
    }

    #[test]
    fn neutralize_assigns_per_category_lexicographic_suffixes() {
        let (neutralized, reverse) =
            neutralize_tags("<<SJ2>> emailed <<EMAIL_1>>, cc <<AB>> and <<SSN_1>>, re <<EMAIL_3>>.");
        // PERSON tags ("<<AB>>", "<<SJ2>>") share one sequence, lexicographic
        // over the original tag string: AB < SJ2.
        assert!(neutralized.contains("<<PERSON_A>>"));
        assert!(neutralized.contains("<<PERSON_B>>"));
        assert_eq!(reverse.get("<<PERSON_A>>"), Some(&"<<AB>>".to_string()));
        assert_eq!(reverse.get("<<PERSON_B>>"), Some(&"<<SJ2>>".to_string()));
        // EMAIL tags get their own independent sequence: EMAIL_1 < EMAIL_3.
        assert_eq!(reverse.get("<<EMAIL_A>>"), Some(&"<<EMAIL_1>>".to_string()));
        assert_eq!(reverse.get("<<EMAIL_B>>"), Some(&"<<EMAIL_3>>".to_string()));
        // SSN has its own sequence too, independent of EMAIL's.
        assert_eq!(reverse.get("<<SSN_A>>"), Some(&"<<SSN_1>>".to_string()));
    }

    #[test]
    fn neutralize_is_stable_regardless_of_occurrence_order() {
        let (a, _) = neutralize_tags("<<EMAIL_3>> then <<EMAIL_1>>.");
        let (b, _) = neutralize_tags("<<EMAIL_1>> then <<EMAIL_3>>.");
        assert!(a.contains("<<EMAIL_A>>") && a.contains("<<EMAIL_B>>"));
        assert!(b.contains("<<EMAIL_A>>") && b.contains("<<EMAIL_B>>"));
    }
}
