//! Reverses a redaction: literal substitution of every tag back to its
//! original value. Longest tag first, so `<<SJ>>` never gets partially
//! matched while restoring `<<SJ2>>`'s ten-character-longer sibling first
//! would avoid — in practice tags are similar lengths, but the ordering
//! keeps behavior correct regardless.

use crate::model::Mapping;

pub fn restore(redacted: &str, mapping: &Mapping) -> String {
    let mut tags: Vec<(&String, &String)> = mapping.tags.iter().collect();
    tags.sort_by(|a, b| b.0.len().cmp(&a.0.len()));

    let mut out = redacted.to_string();
    for (tag, original) in tags {
        out = out.replace(tag.as_str(), original.as_str());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn restores_every_tag() {
        let mut tags = BTreeMap::new();
        tags.insert("<<SJ>>".to_string(), "Steve Johnson".to_string());
        tags.insert("<<EMAIL_1>>".to_string(), "steve@example.com".to_string());
        let mapping = Mapping { tags, persons: BTreeMap::new(), metadata: Default::default() };

        let redacted = "Contact <<SJ>> at <<EMAIL_1>>.";
        let restored = restore(redacted, &mapping);
        assert_eq!(restored, "Contact Steve Johnson at steve@example.com.");
    }

    #[test]
    fn longer_initials_tag_does_not_corrupt_shorter_prefix() {
        let mut tags = BTreeMap::new();
        tags.insert("<<SJ>>".to_string(), "Steve Johnson".to_string());
        tags.insert("<<SJ2>>".to_string(), "Sarah Jones".to_string());
        let mapping = Mapping { tags, persons: BTreeMap::new(), metadata: Default::default() };

        let redacted = "<<SJ>> met <<SJ2>> yesterday.";
        let restored = restore(redacted, &mapping);
        assert_eq!(restored, "Steve Johnson met Sarah Jones yesterday.");
    }
}
