//! Core data model: `Entity`, `Mapping`, `Shard`, `Finding`.
//!
//! Per the Design Notes, the label set is a closed, stable union, modeled
//! as an enum rather than free-form strings; tag templates are per-variant
//! data rather than ad-hoc `format!` calls scattered across stages.

use std::collections::BTreeMap;

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// The closed union of PII entity labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Label {
    Person,
    Email,
    Phone,
    Ssn,
    Url,
    Dob,
    IdNumber,
    Address,
}

impl Label {
    /// Uppercase name used in log output and doc-type scoring.
    pub fn name(&self) -> &'static str {
        match self {
            Label::Person => "PERSON",
            Label::Email => "EMAIL",
            Label::Phone => "PHONE",
            Label::Ssn => "SSN",
            Label::Url => "URL",
            Label::Dob => "DOB",
            Label::IdNumber => "ID_NUMBER",
            Label::Address => "ADDRESS",
        }
    }

    /// The short prefix used inside a typed tag, e.g. `<<ADDR_1>>`.
    /// Per the bit-exact tag grammar in the spec's External Interfaces
    /// section, this differs from `name()` for two labels.
    pub fn tag_prefix(&self) -> &'static str {
        match self {
            Label::Person => unreachable!("PERSON uses the initials tag form, not a typed prefix"),
            Label::Email => "EMAIL",
            Label::Phone => "PHONE",
            Label::Ssn => "SSN",
            Label::Url => "URL",
            Label::Dob => "DOB",
            Label::IdNumber => "ID",
            Label::Address => "ADDR",
        }
    }

    pub fn is_person(&self) -> bool {
        matches!(self, Label::Person)
    }
}

/// A detected PII candidate (pre- or post-validation).
#[derive(Debug, Clone, PartialEq)]
pub struct Entity {
    pub text: String,
    pub label: Label,
    /// Code-point offsets into the source text.
    pub start: usize,
    pub end: usize,
    pub confidence: f32,
}

impl Entity {
    pub fn new(text: impl Into<String>, label: Label, start: usize, end: usize, confidence: f32) -> Self {
        Self {
            text: text.into(),
            label,
            start,
            end,
            confidence,
        }
    }

    pub fn len_chars(&self) -> usize {
        self.end - self.start
    }
}

/// Free-form descriptor of a single redaction run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Metadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_file: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processed_at: Option<String>,
    #[serde(default)]
    pub entities_found: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

/// The authoritative reversible record for a single redaction run.
///
/// Treated as a single immutable value per stage (Design Notes: "Mapping as
/// a value type") — each stage returns a fresh `Mapping` derived from the
/// previous one rather than mutating one in place.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Mapping {
    /// tag literal -> original literal. Keys are unique; for person
    /// clusters the value is the canonical (longest) surface form.
    pub tags: BTreeMap<String, String>,
    /// any observed person surface form -> that cluster's tag.
    pub persons: BTreeMap<String, String>,
    #[serde(default)]
    pub metadata: Metadata,
}

lazy_static! {
    /// Canonical person tag: `<<INITIALS>>` or `<<INITIALSN>>`.
    static ref PERSON_TAG_RE: Regex = Regex::new(r"^<<([A-Z]+)([0-9]+)?>>$").unwrap();
    /// Canonical typed tag: `<<TYPE_N>>`.
    static ref TYPED_TAG_RE: Regex = Regex::new(r"^<<([A-Z]+)_([0-9]+)>>$").unwrap();
    /// Legacy person tag accepted on input only: `<NAME INITIALS[N]>`.
    static ref LEGACY_PERSON_TAG_RE: Regex = Regex::new(r"^<NAME ([A-Z]+)([0-9]*)>$").unwrap();
}

impl Mapping {
    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(s: &str) -> Result<Self, crate::error::PiiError> {
        serde_json::from_str(s).map_err(|e| crate::error::PiiError::MappingCorrupt(e.to_string()))
    }

    /// Reconstruct the per-initials collision counters from every existing
    /// tag, per the Design Notes: "parse every existing tag and take the
    /// max N seen per initials/type."
    pub fn person_initials_counts(&self) -> BTreeMap<String, u32> {
        let mut counts = BTreeMap::new();
        for tag in self.tags.keys() {
            if let Some(caps) = PERSON_TAG_RE.captures(tag) {
                let initials = caps.get(1).unwrap().as_str().to_string();
                let n: u32 = caps
                    .get(2)
                    .map(|m| m.as_str().parse().unwrap_or(1))
                    .unwrap_or(1);
                let entry = counts.entry(initials).or_insert(0u32);
                *entry = (*entry).max(n);
            }
        }
        counts
    }

    /// Reconstruct the per-type counters from every existing tag.
    pub fn type_counts(&self) -> BTreeMap<String, u32> {
        let mut counts = BTreeMap::new();
        for tag in self.tags.keys() {
            if let Some(caps) = TYPED_TAG_RE.captures(tag) {
                let ty = caps.get(1).unwrap().as_str().to_string();
                let n: u32 = caps.get(2).unwrap().as_str().parse().unwrap_or(0);
                let entry = counts.entry(ty).or_insert(0u32);
                *entry = (*entry).max(n);
            }
        }
        counts
    }
}

/// True if `tag` matches either the canonical `<<...>>` person/typed grammar
/// or the legacy `<NAME ...>` form accepted on input for backward
/// compatibility.
pub fn is_known_tag_shape(tag: &str) -> bool {
    PERSON_TAG_RE.is_match(tag) || TYPED_TAG_RE.is_match(tag) || LEGACY_PERSON_TAG_RE.is_match(tag)
}

pub fn is_person_tag(tag: &str) -> bool {
    PERSON_TAG_RE.is_match(tag) || LEGACY_PERSON_TAG_RE.is_match(tag)
}

pub fn is_typed_tag(tag: &str) -> bool {
    TYPED_TAG_RE.is_match(tag)
}

/// Regex matching any tag occurrence (canonical or legacy) inside running
/// text, used by the Auditor/Verifier to find "already tagged" regions.
pub fn any_tag_regex() -> Regex {
    Regex::new(r"<<[A-Z]+[0-9]*>>|<<[A-Z]+_[0-9]+>>|<NAME [A-Z]+[0-9]*>").unwrap()
}

/// Allocate the next canonical person tag for `initials`, bumping `counts`
/// in place. Shared by the Redactor and Auditor so a name first seen during
/// the audit pass gets a tag indistinguishable from one assigned earlier.
pub fn next_person_tag(initials: &str, counts: &mut BTreeMap<String, u32>) -> String {
    let count = counts.entry(initials.to_string()).or_insert(0);
    *count += 1;
    if *count == 1 {
        format!("<<{initials}>>")
    } else {
        format!("<<{initials}{count}>>")
    }
}

/// A sentence-level fragment of neutralized redacted text, ready for cloud
/// verification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Shard {
    pub id: String,
    pub text: String,
    /// Code-point offsets in the pre-shuffle neutralized text.
    pub start: usize,
    pub end: usize,
    #[serde(default)]
    pub is_canary: bool,
}

/// A single PII finding returned by the cloud verifier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Finding {
    pub shard_id: String,
    pub text: String,
    pub entity_type: String,
    pub confidence: f32,
    #[serde(default)]
    pub start_offset: Option<usize>,
    #[serde(default)]
    pub end_offset: Option<usize>,
}

/// Neutralized tag -> original tag, valid for the lifetime of one
/// verification call.
pub type ReverseTagMap = BTreeMap<String, String>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_prefixes_match_spec_grammar() {
        assert_eq!(Label::IdNumber.tag_prefix(), "ID");
        assert_eq!(Label::Address.tag_prefix(), "ADDR");
        assert_eq!(Label::Email.tag_prefix(), "EMAIL");
    }

    #[test]
    fn person_tag_shapes_recognized() {
        assert!(is_person_tag("<<SJ>>"));
        assert!(is_person_tag("<<SJ2>>"));
        assert!(is_person_tag("<NAME SJ>"));
        assert!(is_person_tag("<NAME SJ2>"));
        assert!(!is_person_tag("<<EMAIL_1>>"));
    }

    #[test]
    fn any_tag_regex_matches_collision_person_tags() {
        let re = any_tag_regex();
        assert!(re.is_match("<<SJ>>"));
        assert!(re.is_match("<<SJ2>>"));
        assert!(re.is_match("<<EMAIL_1>>"));
        assert!(re.is_match("<NAME SJ2>"));
    }

    #[test]
    fn counter_reconstruction_takes_max_n() {
        let mut mapping = Mapping::default();
        mapping.tags.insert("<<SJ>>".into(), "Steve Johnson".into());
        mapping.tags.insert("<<SJ2>>".into(), "Sarah Jones".into());
        mapping.tags.insert("<<EMAIL_1>>".into(), "a@b.com".into());
        mapping.tags.insert("<<EMAIL_3>>".into(), "c@d.com".into());
        let persons = mapping.person_initials_counts();
        assert_eq!(persons.get("SJ"), Some(&2));
        let types = mapping.type_counts();
        assert_eq!(types.get("EMAIL"), Some(&3));
    }
}
