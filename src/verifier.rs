//! P3: orchestrates tag neutralization, sharding, optional canary
//! injection, and the cloud verify round-trip, then patches any additional
//! findings back into the mapping.
//!
//! `verify_and_patch` never returns `Result` — any categorized failure
//! (auth, credits, rate limit, timeout, transport) degrades gracefully to
//! the pre-stage `(text, mapping)` pair, structurally guaranteeing a
//! verifier outage cannot corrupt a redaction that already succeeded.

use futures::stream::{self, StreamExt};
use tracing::warn;

use regex::Regex;

use crate::canary::{self, Canary};
use crate::constants::{DEFAULT_BATCH_SIZE, DEFAULT_CANARY_COUNT, MAX_CONCURRENT_VERIFY_BATCHES};
use crate::detector::DocType;
use crate::error::PiiError;
use crate::model::{next_person_tag, Finding, Mapping, ReverseTagMap, Shard};
use crate::redactor::is_token_subset;
use crate::sharder::{self, VerifyContext};
use crate::nlp::NlpEngine;
use crate::verify_client::VerifyClient;

/// Partition `shards` into `DEFAULT_BATCH_SIZE`-sized groups and dispatch
/// them concurrently, bounded to [`MAX_CONCURRENT_VERIFY_BATCHES`] in
/// flight at once. Findings are pooled once every batch returns; batch
/// order does not affect correctness since the patch step that follows is
/// commutative over the resulting finding set.
async fn verify_all_batches(
    client: &VerifyClient,
    shards: &[Shard],
    context: &VerifyContext,
) -> Result<Vec<Finding>, PiiError> {
    let batches: Vec<&[Shard]> = shards.chunks(DEFAULT_BATCH_SIZE).collect();
    let results: Vec<Result<Vec<Finding>, PiiError>> = stream::iter(batches)
        .map(|batch| client.verify(batch, context))
        .buffer_unordered(MAX_CONCURRENT_VERIFY_BATCHES)
        .collect()
        .await;

    let mut findings = Vec::new();
    for batch_result in results {
        findings.extend(batch_result?);
    }
    Ok(findings)
}

#[derive(Debug, Clone)]
pub struct VerifierConfig {
    pub enable_canaries: bool,
    pub canary_count: usize,
}

impl Default for VerifierConfig {
    fn default() -> Self {
        Self {
            enable_canaries: true,
            canary_count: DEFAULT_CANARY_COUNT,
        }
    }
}

/// Map a [`DocType`] to the coarse label sent in the verify context.
fn doc_type_label(doc_type: DocType) -> &'static str {
    match doc_type {
        DocType::Resume => "resume",
        DocType::Transcript => "transcript",
        DocType::General => "general",
    }
}

/// Replace every case-insensitive occurrence of `literal` in `out` with
/// `tag`. A finding's surface form need not match the document's casing
/// exactly (the verifier may normalize or the source text may vary), but
/// the regex is built from the literal's exact bytes so no other text is
/// touched.
fn replace_case_insensitive(out: &str, literal: &str, tag: &str) -> String {
    match Regex::new(&format!("(?i){}", regex::escape(literal))) {
        Ok(re) => re.replace_all(out, regex::NoExpand(tag)).into_owned(),
        Err(_) => out.replace(literal, tag),
    }
}

fn apply_findings(text: &str, mapping: &Mapping, findings: &[Finding], reverse: &ReverseTagMap) -> (String, Mapping) {
    let tag_re = crate::model::any_tag_regex();
    let mut new_tags = mapping.tags.clone();
    let mut new_persons = mapping.persons.clone();
    let mut type_counts = mapping.type_counts();
    let mut person_counts = mapping.person_initials_counts();

    // Findings may reference the neutralized placeholder if the verifier
    // echoed redacted context back; translate to the real tag before
    // checking "already known" so a re-identified placeholder doesn't look
    // like brand-new PII.
    let resolve = |s: &str| reverse.get(s).cloned().unwrap_or_else(|| s.to_string());

    let mut candidates: Vec<&Finding> = Vec::new();
    for f in findings {
        let resolved_text = resolve(&f.text);
        if tag_re.is_match(&resolved_text) {
            continue; // finding literally is a tag marker, not raw PII
        }
        if new_tags.values().any(|v| v.eq_ignore_ascii_case(&f.text)) || new_persons.contains_key(&f.text) {
            continue; // already a known original value
        }
        if !text.to_lowercase().contains(&f.text.to_lowercase()) {
            continue; // nothing in the document to replace
        }
        candidates.push(f);
    }

    let mut assignments: Vec<(String, String)> = Vec::new();
    for f in &candidates {
        if f.entity_type.eq_ignore_ascii_case("PERSON") {
            let initials: String = f
                .text
                .split_whitespace()
                .filter_map(|w| w.chars().next())
                .map(|c| c.to_ascii_uppercase())
                .collect();
            if initials.is_empty() {
                continue;
            }
            let existing_cluster = new_tags.iter().find(|(_, canonical)| is_token_subset(canonical, &f.text));
            let tag = if let Some((tag, _)) = existing_cluster {
                tag.clone()
            } else {
                let tag = next_person_tag(&initials, &mut person_counts);
                new_tags.insert(tag.clone(), f.text.clone());
                tag
            };
            new_persons.insert(f.text.clone(), tag.clone());
            assignments.push((f.text.clone(), tag));
        } else {
            let prefix = f.entity_type.to_uppercase();
            let count = type_counts.entry(prefix.clone()).or_insert(0);
            *count += 1;
            let tag = format!("<<{prefix}_{count}>>");
            new_tags.insert(tag.clone(), f.text.clone());
            assignments.push((f.text.clone(), tag));
        }
    }

    let mut out = text.to_string();
    // Longest literal first so a shorter finding can't clobber part of a
    // longer one that contains it.
    assignments.sort_by(|a, b| b.0.len().cmp(&a.0.len()));
    for (literal, tag) in &assignments {
        out = replace_case_insensitive(&out, literal, tag);
    }

    let mut metadata = mapping.metadata.clone();
    metadata.entities_found += assignments.len();

    (
        out,
        Mapping {
            tags: new_tags,
            persons: new_persons,
            metadata,
        },
    )
}

/// Run the full cloud-verification round trip. On any failure, logs the
/// categorized error and returns `(text, mapping)` unchanged — callers
/// never need to branch on a verifier failure themselves.
pub async fn verify_and_patch(
    text: &str,
    mapping: &Mapping,
    doc_type: DocType,
    client: &VerifyClient,
    engine: &dyn NlpEngine,
    config: &VerifierConfig,
) -> (String, Mapping) {
    let (neutralized, reverse) = sharder::neutralize_tags(text);
    let mut shards = sharder::shard_text(&neutralized, engine);

    let canaries: Vec<Canary> = if config.enable_canaries && config.canary_count > 0 {
        let pairs = canary::generate_canaries(config.canary_count);
        let mut canaries = Vec::with_capacity(pairs.len());
        for (shard, c) in pairs {
            shards.push(shard);
            canaries.push(c);
        }
        canaries
    } else {
        Vec::new()
    };

    sharder::shuffle_shards(&mut shards);
    let context = sharder::build_context(&reverse, doc_type_label(doc_type));

    match verify_all_batches(client, &shards, &context).await {
        Ok(findings) => {
            if !canaries.is_empty() {
                let report = canary::evaluate_canaries(&canaries, &findings);
                if report.detection_rate < 1.0 {
                    warn!(
                        planted = report.canaries_planted,
                        detected = report.canaries_detected,
                        rate = report.detection_rate,
                        "verify canary detection below 100%"
                    );
                }
            }
            let real_findings = canary::strip_canaries(findings, &canaries);
            apply_findings(text, mapping, &real_findings, &reverse)
        }
        Err(err) => {
            warn!(category = err.category(), error = %err, "verify call failed, degrading to pre-verify result");
            (text.to_string(), mapping.clone())
        }
    }
}
