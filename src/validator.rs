//! P1v: confidence scoring and filtering for PERSON candidates.
//!
//! Non-person candidates (EMAIL, PHONE, SSN, URL, ID_NUMBER, ADDRESS) pass
//! through unchanged — regex matches for these labels are definitional, not
//! probabilistic. DOB candidates are kept as-is too; their confidence was
//! already set by the Detector. Only PERSON candidates go through the
//! scoring cascade below.

use lazy_static::lazy_static;
use regex::Regex;

use crate::blocklist::Blocklist;
use crate::constants::*;
use crate::detector::DocType;
use crate::model::{Entity, Label};
use crate::nlp::{NerSpan, NlpEngine, PosClass};

lazy_static! {
    static ref JOB_TITLE_RE: Regex = Regex::new(
        r"(?i)^(Senior|Junior|Lead|Chief|Principal|Staff|Associate|Assistant)\s+\w+|(?i)(Manager|Director|Engineer|Analyst|Consultant|Officer|President|Administrator|Coordinator|Specialist|Developer|Architect)$"
    ).unwrap();

    static ref CERTIFICATION_RE: Regex = Regex::new(
        r"(?i)\b(PhD|M\.?D\.?|J\.?D\.?|CPA|CFA|PMP|MBA|Esq\.?|RN|DDS)\b"
    ).unwrap();

    static ref PROPER_NAME_RE: Regex = Regex::new(
        r"^[A-Z][a-z'\-]*(?:\s(?:[A-Z][a-z'\-]*|(?:de|la|van|von|der|den|di|al|bin|ibn|Mc|Mac|O')))*$"
    ).unwrap();
}

const SECTION_HEADERS: &[&str] = &[
    "summary", "objective", "experience", "work experience", "education", "skills",
    "certifications", "references", "contact", "profile", "about", "projects",
    "publications", "awards", "languages", "interests", "qualifications", "employment",
    "history", "background", "achievements", "volunteer", "training", "activities",
    "affiliations", "memberships", "honors", "licenses", "summary of qualifications",
    "professional experience",
];

const NAME_PARTICLES: &[&str] = &["de", "la", "van", "von", "der", "den", "di", "al", "bin", "ibn"];

fn has_proper_name_capitalization(text: &str) -> bool {
    let words: Vec<&str> = text.split_whitespace().collect();
    words.iter().all(|w| {
        let lower = w.to_lowercase();
        if NAME_PARTICLES.contains(&lower.as_str()) {
            return true;
        }
        if w.starts_with("O'") || w.starts_with("Mc") || w.starts_with("Mac") {
            return w.chars().nth(w.starts_with("O'") as usize + 1).map_or(false, |c| c.is_uppercase() || w.starts_with("Mc") || w.starts_with("Mac"));
        }
        if w.contains('-') {
            return w.split('-').all(|part| part.chars().next().map_or(false, |c| c.is_uppercase()));
        }
        w.chars().next().map_or(false, |c| c.is_uppercase())
    }) && PROPER_NAME_RE.is_match(text)
}

/// True if the candidate's own text is a resume section header ("Work
/// Experience", "Education", ...), or the candidate sits directly under one
/// ("References:\nJohn Smith"). Headers are capitalized exactly like a
/// two-word name, so without the first check a header line would
/// frequently outscore the threshold as a false PERSON on its own.
fn is_section_header_related(text: &str, span_start: usize, full_text: &str) -> bool {
    let normalized = text.trim().trim_end_matches(':').to_lowercase();
    if SECTION_HEADERS.contains(&normalized.as_str()) {
        return true;
    }
    let idx = crate::textindex::CodePointIndex::new(full_text);
    let byte_start = idx.char_to_byte(span_start.saturating_sub(30));
    let byte_end = idx.char_to_byte(span_start);
    if byte_start > byte_end || byte_end > full_text.len() {
        return false;
    }
    let context = full_text[byte_start..byte_end].to_lowercase();
    SECTION_HEADERS.iter().any(|h| context.trim_end().ends_with(&format!("{h}:")))
}

/// Proper-noun ratio over the candidate span, using the statistical POS
/// tagger: `proper_noun_tokens / total_tokens`.
fn proper_noun_ratio(engine: &dyn NlpEngine, span_text: &str) -> f32 {
    let tags = engine.pos_tags(span_text);
    if tags.is_empty() {
        return 0.0;
    }
    let proper = tags.iter().filter(|t| t.tag == PosClass::ProperNoun).count();
    proper as f32 / tags.len() as f32
}

/// True if `text` was also surfaced by the statistical NER pass under a
/// label that can never be a person (ORG, GPE, LOC, NORP, FAC, PRODUCT,
/// WORK_OF_ART) — the two passes disagreeing on the same span means the
/// regex-driven Detector's guess is very likely wrong.
fn seen_as_non_person(text: &str, ner_doc: &[NerSpan]) -> bool {
    ner_doc
        .iter()
        .any(|span| span.label.is_non_person_entity() && span.text.eq_ignore_ascii_case(text))
}

/// Score a single PERSON candidate in `[0.0, 1.0]`, following the same
/// additive cascade as the reference implementation's scorer.
///
/// Three conditions are immediate hard rejects (score forced to `0.0`
/// regardless of every other signal): a blocklist hit, the same text
/// surfacing elsewhere in `ner_doc` under a non-person label, and a resume
/// section header match. Everything else is an additive penalty/bonus.
pub fn score_person_entity(
    entity: &Entity,
    full_text: &str,
    ner_doc: &[NerSpan],
    engine: &dyn NlpEngine,
    blocklist: &Blocklist,
) -> f32 {
    debug_assert!(entity.label.is_person());

    if blocklist.contains(&entity.text)
        || seen_as_non_person(&entity.text, ner_doc)
        || is_section_header_related(&entity.text, entity.start, full_text)
    {
        return 0.0;
    }

    let mut score = PERSON_BASE_SCORE;

    let token_count = entity.text.split_whitespace().count();
    if token_count == 1 {
        score -= SCORE_SINGLE_TOKEN_PENALTY;
        if entity.text.chars().count() <= 3 {
            score -= SCORE_SHORT_SINGLE_TOKEN_PENALTY;
        }
    } else if (2..=3).contains(&token_count) {
        score += SCORE_MULTI_TOKEN_BONUS;
    }

    if JOB_TITLE_RE.is_match(&entity.text) || CERTIFICATION_RE.is_match(&entity.text) {
        score -= SCORE_JOB_TITLE_PENALTY;
    }

    if !has_proper_name_capitalization(&entity.text) {
        score -= SCORE_CAPITALIZATION_PENALTY;
    }

    let ratio = proper_noun_ratio(engine, &entity.text);
    if ratio >= POS_PROPER_NOUN_RATIO_HIGH {
        score += SCORE_POS_HIGH_BONUS;
    } else if ratio <= POS_PROPER_NOUN_RATIO_LOW {
        score -= SCORE_POS_LOW_PENALTY;
    }

    score.clamp(0.0, 1.0)
}

/// Score and filter every candidate: PERSON entities below
/// [`MIN_PERSON_CONFIDENCE`] are dropped; every other label passes through
/// with its Detector-assigned confidence.
///
/// `ner_doc` is the statistical NER pass's output over the whole document,
/// used to hard-reject a PERSON candidate also tagged ORG/GPE/LOC/etc.
/// elsewhere. `doc_type` is accepted for parity with the reference scorer's
/// context object; this implementation, like that one, does not currently
/// tune scoring on it.
pub fn validate(
    entities: Vec<Entity>,
    full_text: &str,
    ner_doc: &[NerSpan],
    doc_type: DocType,
    engine: &dyn NlpEngine,
    blocklist: &Blocklist,
) -> Vec<Entity> {
    tracing::debug!(?doc_type, "validating candidates");
    entities
        .into_iter()
        .filter_map(|mut e| {
            if e.label == Label::Person {
                let score = score_person_entity(&e, full_text, ner_doc, engine, blocklist);
                e.confidence = score;
                if score < MIN_PERSON_CONFIDENCE {
                    return None;
                }
            }
            Some(e)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nlp::heuristic::HeuristicEngine;

    #[test]
    fn real_name_scores_above_threshold() {
        let engine = HeuristicEngine::new();
        let blocklist = Blocklist::builtin_only();
        let entity = Entity::new("Steve Johnson", Label::Person, 0, 13, 1.0);
        let score = score_person_entity(&entity, "Steve Johnson joined the team.", &[], &engine, &blocklist);
        assert!(score >= MIN_PERSON_CONFIDENCE, "score was {score}");
    }

    #[test]
    fn job_title_scores_below_threshold() {
        let engine = HeuristicEngine::new();
        let blocklist = Blocklist::builtin_only();
        let entity = Entity::new("Senior Manager", Label::Person, 0, 14, 1.0);
        let score = score_person_entity(&entity, "The Senior Manager approved it.", &[], &engine, &blocklist);
        assert!(score < MIN_PERSON_CONFIDENCE, "score was {score}");
    }

    #[test]
    fn blocklisted_word_scores_zero() {
        let engine = HeuristicEngine::new();
        let blocklist = Blocklist::builtin_only();
        let entity = Entity::new("Monday", Label::Person, 0, 6, 1.0);
        let score = score_person_entity(&entity, "Monday was a holiday.", &[], &engine, &blocklist);
        assert_eq!(score, 0.0);
    }

    #[test]
    fn section_header_scores_zero_not_just_penalized() {
        let engine = HeuristicEngine::new();
        let blocklist = Blocklist::builtin_only();
        let entity = Entity::new("Work Experience", Label::Person, 0, 15, 1.0);
        let score = score_person_entity(&entity, "Work Experience\nSteve Johnson, Inc.", &[], &engine, &blocklist);
        assert_eq!(score, 0.0, "section headers are a hard reject, not a penalty");
    }

    #[test]
    fn ner_doc_org_match_hard_rejects() {
        use crate::nlp::{NerLabel, NerSpan};
        let engine = HeuristicEngine::new();
        let blocklist = Blocklist::builtin_only();
        let entity = Entity::new("Acme Corp", Label::Person, 0, 9, 1.0);
        let ner_doc = vec![NerSpan { label: NerLabel::Org, text: "Acme Corp".into(), start: 0, end: 9 }];
        let score = score_person_entity(&entity, "Acme Corp hired them.", &ner_doc, &engine, &blocklist);
        assert_eq!(score, 0.0);
    }

    #[test]
    fn non_person_entities_pass_through_unchanged() {
        let engine = HeuristicEngine::new();
        let blocklist = Blocklist::builtin_only();
        let entities = vec![Entity::new("a@b.com", Label::Email, 0, 7, 1.0)];
        let validated = validate(entities, "a@b.com", &[], DocType::General, &engine, &blocklist);
        assert_eq!(validated.len(), 1);
        assert_eq!(validated[0].confidence, 1.0);
    }
}
