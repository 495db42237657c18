//! P1r: reversible substitution of validated entities with tags, plus
//! coreference clustering for person names and a restricted global
//! name-catching pass.

use std::collections::{BTreeMap, HashMap};

use crate::constants::MIN_GLOBAL_NAME_PASS_LEN;
use crate::model::{any_tag_regex, Entity, Label, Mapping, Metadata};
use crate::textindex::CodePointIndex;

/// Build the initials tag body for a canonical person name: the uppercase
/// first letter of every whitespace-separated token, e.g. "Steve Johnson"
/// -> "SJ".
fn make_initials(name: &str) -> String {
    name.split_whitespace()
        .filter_map(|w| w.chars().find(|c| c.is_alphabetic()))
        .map(|c| c.to_ascii_uppercase())
        .collect()
}

/// True if every whitespace token of `needle` appears as a contiguous run
/// of whitespace tokens in `haystack` (case-insensitive). Used to decide
/// whether a shorter surface form ("Steve", "Johnson") is an alias of an
/// already-placed canonical name ("Steve Johnson").
pub(crate) fn is_token_subset(haystack: &str, needle: &str) -> bool {
    let h_tokens: Vec<String> = haystack.split_whitespace().map(|w| w.to_lowercase()).collect();
    let n_tokens: Vec<String> = needle.split_whitespace().map(|w| w.to_lowercase()).collect();
    if n_tokens.is_empty() || n_tokens.len() > h_tokens.len() {
        return false;
    }
    h_tokens.windows(n_tokens.len()).any(|w| w == n_tokens.as_slice())
}

struct Cluster {
    canonical: String,
    members: Vec<String>,
    first_start: usize,
}

/// Greedy, longest-surface-form-first clustering of person entities into
/// coreference groups sharing one tag.
fn group_names(entities: &[&Entity]) -> Vec<Cluster> {
    let mut by_form: HashMap<String, usize> = HashMap::new();
    for e in entities {
        by_form
            .entry(e.text.clone())
            .and_modify(|s| *s = (*s).min(e.start))
            .or_insert(e.start);
    }
    let mut forms: Vec<(String, usize)> = by_form.into_iter().collect();
    forms.sort_by(|a, b| b.0.chars().count().cmp(&a.0.chars().count()).then(a.1.cmp(&b.1)));

    let mut clusters: Vec<Cluster> = Vec::new();
    for (form, start) in forms {
        if let Some(c) = clusters.iter_mut().find(|c| is_token_subset(&c.canonical, &form)) {
            c.members.push(form);
            c.first_start = c.first_start.min(start);
        } else {
            clusters.push(Cluster {
                canonical: form.clone(),
                members: vec![form],
                first_start: start,
            });
        }
    }
    clusters
}

struct TagAssignment {
    /// surface form -> tag
    person_tag_of: HashMap<String, String>,
    /// (label, exact text) -> tag, for non-person entities
    typed_tag_of: HashMap<(Label, String), String>,
    tags: BTreeMap<String, String>,
}

fn assign_tags(entities: &[Entity], seed: Option<&Mapping>) -> TagAssignment {
    let mut initials_count: BTreeMap<String, u32> = seed.map(|m| m.person_initials_counts()).unwrap_or_default();
    let mut type_count: BTreeMap<String, u32> = seed
        .map(|m| m.type_counts().into_iter().collect())
        .unwrap_or_default();
    let mut tags = BTreeMap::new();
    let mut person_tag_of = HashMap::new();
    let mut typed_tag_of = HashMap::new();

    let person_entities: Vec<&Entity> = entities.iter().filter(|e| e.label == Label::Person).collect();
    let mut clusters = group_names(&person_entities);
    clusters.sort_by_key(|c| c.first_start);

    for cluster in clusters {
        let initials = make_initials(&cluster.canonical);
        let count = initials_count.entry(initials.clone()).or_insert(0);
        *count += 1;
        let tag = if *count == 1 {
            format!("<<{initials}>>")
        } else {
            format!("<<{initials}{count}>>")
        };
        tags.insert(tag.clone(), cluster.canonical.clone());
        for member in &cluster.members {
            person_tag_of.insert(member.clone(), tag.clone());
        }
    }

    let mut typed: Vec<&Entity> = entities.iter().filter(|e| e.label != Label::Person).collect();
    typed.sort_by_key(|e| e.start);
    for entity in typed {
        let key = (entity.label, entity.text.clone());
        if let Some(tag) = typed_tag_of.get(&key) {
            let _ = tag;
            continue;
        }
        let prefix = entity.label.tag_prefix();
        let count = type_count.entry(prefix.to_string()).or_insert(0);
        *count += 1;
        let tag = format!("<<{prefix}_{count}>>");
        tags.insert(tag.clone(), entity.text.clone());
        typed_tag_of.insert(key, tag);
    }

    TagAssignment {
        person_tag_of,
        typed_tag_of,
        tags,
    }
}

/// Substitute every validated entity with its assigned tag (descending
/// start order, so earlier offsets stay valid as later ones are rewritten),
/// then run a restricted global pass that catches additional mentions of a
/// known person's canonical/alias surface forms that the Detector/Validator
/// missed on their own.
///
/// The global pass is word-boundary and case-insensitive, restricted to
/// surface forms of at least [`MIN_GLOBAL_NAME_PASS_LEN`] characters —
/// unlike an unrestricted literal scan, this avoids turning common short
/// words that happen to equal a name fragment into redactions.
pub fn redact(text: &str, mut entities: Vec<Entity>, seed: Option<&Mapping>) -> (String, Mapping) {
    entities.sort_by_key(|e| e.start);
    let assignment = assign_tags(&entities, seed);

    let idx = CodePointIndex::new(text);
    let mut ordered = entities.clone();
    ordered.sort_by(|a, b| b.start.cmp(&a.start));

    let mut out = text.to_string();
    for entity in &ordered {
        let tag = if entity.label == Label::Person {
            assignment.person_tag_of.get(&entity.text).cloned()
        } else {
            assignment
                .typed_tag_of
                .get(&(entity.label, entity.text.clone()))
                .cloned()
        };
        if let Some(tag) = tag {
            let b_start = idx.char_to_byte(entity.start);
            let b_end = idx.char_to_byte(entity.end);
            out.replace_range(b_start..b_end, &tag);
        }
    }

    out = global_name_pass(&out, &assignment.person_tag_of);

    let mapping = Mapping {
        tags: assignment.tags,
        persons: assignment.person_tag_of.into_iter().collect(),
        metadata: Metadata {
            entities_found: entities.len(),
            ..Default::default()
        },
    };
    (out, mapping)
}

fn global_name_pass(text: &str, person_tag_of: &HashMap<String, String>) -> String {
    let mut forms: Vec<&String> = person_tag_of
        .keys()
        .filter(|f| f.chars().count() >= MIN_GLOBAL_NAME_PASS_LEN)
        .collect();
    forms.sort_by(|a, b| b.chars().count().cmp(&a.chars().count()));

    let tag_re = any_tag_regex();
    let mut out = String::with_capacity(text.len());
    let mut last = 0usize;
    let chars: Vec<char> = text.chars().collect();
    let mut protected: Vec<bool> = vec![false; chars.len()];
    let byte_idx = CodePointIndex::new(text);
    for m in tag_re.find_iter(text) {
        let s = byte_idx.byte_to_char(m.start());
        let e = byte_idx.byte_to_char(m.end());
        for p in protected.iter_mut().take(e).skip(s) {
            *p = true;
        }
    }

    let lower_chars: Vec<char> = text.to_lowercase().chars().collect();
    let mut i = 0usize;
    while i < chars.len() {
        let mut matched: Option<(usize, &String)> = None;
        for form in &forms {
            let form_lower: Vec<char> = form.to_lowercase().chars().collect();
            let flen = form_lower.len();
            if i + flen > chars.len() {
                continue;
            }
            if lower_chars[i..i + flen] != form_lower[..] {
                continue;
            }
            let left_ok = i == 0 || !chars[i - 1].is_alphanumeric();
            let right_ok = i + flen == chars.len() || !chars[i + flen].is_alphanumeric();
            if !left_ok || !right_ok {
                continue;
            }
            if protected[i..i + flen].iter().any(|&p| p) {
                continue;
            }
            matched = Some((flen, form));
            break;
        }
        if let Some((flen, form)) = matched {
            out.push_str(&byte_idx_slice(text, last, i));
            out.push_str(&person_tag_of[form]);
            last = i + flen;
            i += flen;
        } else {
            i += 1;
        }
    }
    out.push_str(&byte_idx_slice(text, last, chars.len()));
    out
}

fn byte_idx_slice(text: &str, start_char: usize, end_char: usize) -> String {
    crate::textindex::slice_by_chars(text, start_char, end_char).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Label;

    /// Every test text here is ASCII, so byte offsets from `str::find` double
    /// as the code-point offsets `Entity` expects.
    fn span(text: &str, needle: &str) -> (usize, usize) {
        let start = text.find(needle).unwrap();
        (start, start + needle.chars().count())
    }

    #[test]
    fn clusters_alias_surface_forms() {
        let text = "Steve Johnson was here. Steve left early.";
        let (s1, e1) = span(text, "Steve Johnson");
        let (s2, e2) = span(text, "Steve left");
        let entities = vec![
            Entity::new("Steve Johnson", Label::Person, s1, e1, 1.0),
            Entity::new("Steve", Label::Person, s2, s2 + 5, 1.0),
        ];
        let _ = e2;
        let (_, mapping) = redact(text, entities, None);
        let tags: std::collections::HashSet<_> = mapping.persons.values().collect();
        assert_eq!(tags.len(), 1, "expected both forms to share one tag, got {:?}", mapping.persons);
    }

    #[test]
    fn distinct_people_get_distinct_initials_tags() {
        let text = "Steve Johnson met with Sarah Jones yesterday.";
        let (s1, e1) = span(text, "Steve Johnson");
        let (s2, e2) = span(text, "Sarah Jones");
        let entities = vec![
            Entity::new("Steve Johnson", Label::Person, s1, e1, 1.0),
            Entity::new("Sarah Jones", Label::Person, s2, e2, 1.0),
        ];
        let (redacted, mapping) = redact(text, entities, None);
        assert!(redacted.contains("<<SJ>>"));
        assert!(redacted.contains("<<SJ2>>"));
        assert_eq!(mapping.tags.len(), 2);
    }

    #[test]
    fn typed_entities_reuse_tag_for_repeated_value() {
        let text = "a@b.com and also a@b.com";
        let (s1, e1) = span(text, "a@b.com");
        let s2 = text.rfind("a@b.com").unwrap();
        let entities = vec![
            Entity::new("a@b.com", Label::Email, s1, e1, 1.0),
            Entity::new("a@b.com", Label::Email, s2, s2 + 7, 1.0),
        ];
        let (redacted, mapping) = redact(text, entities, None);
        assert_eq!(mapping.tags.len(), 1);
        assert_eq!(redacted.matches("<<EMAIL_1>>").count(), 2);
    }

    #[test]
    fn global_pass_catches_missed_short_mention() {
        let entities = vec![Entity::new("Steve Johnson", Label::Person, 0, 13, 1.0)];
        let (redacted, _) = redact(
            "Steve Johnson opened the meeting. Later, Steve Johnson closed it.",
            entities,
            None,
        );
        assert_eq!(redacted.matches("<<SJ>>").count(), 2);
    }
}
