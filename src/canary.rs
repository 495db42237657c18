//! Canary injection: synthetic PII planted into the shard batch sent to the
//! cloud verifier, used to calibrate how much of it the verifier actually
//! catches. Canary shards are stripped from the findings returned to the
//! caller before they ever reach [`crate::verifier`]'s patch step.

use serde::{Deserialize, Serialize};

use crate::constants::DEFAULT_CANARY_COUNT;
use crate::model::{Finding, Shard};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CanaryKind {
    NameEmail,
    NamePhone,
    NameDate,
}

#[derive(Debug, Clone)]
pub struct Canary {
    pub kind: CanaryKind,
    pub shard_id: String,
    pub name: String,
    pub secondary: String,
}

const CANARY_NAMES: &[&str] = &["Wendell Ashcombe", "Marisol Fenwick", "Dmitri Okonkwo", "Priya Natarajan"];

fn synth_for(kind: CanaryKind, seed: usize) -> (String, String, String) {
    let name = CANARY_NAMES[seed % CANARY_NAMES.len()].to_string();
    match kind {
        CanaryKind::NameEmail => {
            let email = format!("{}.{}@example-canary.test", seed, seed * 7 + 3);
            let text = format!("{name} can be reached at {email}.");
            (name, email, text)
        }
        CanaryKind::NamePhone => {
            let phone = format!("555-{:03}-{:04}", (seed * 13) % 1000, (seed * 97) % 10000);
            let text = format!("{name}'s direct line is {phone}.");
            (name, phone, text)
        }
        CanaryKind::NameDate => {
            let date = format!("{:02}/{:02}/19{:02}", 1 + seed % 12, 1 + seed % 27, 50 + seed % 49);
            let text = format!("{name} was born on {date}.");
            (name, date, text)
        }
    }
}

/// Build `count` synthetic canary shards. Kinds cycle NameEmail / NamePhone
/// / NameDate so a short run still covers each template.
pub fn generate_canaries(count: usize) -> Vec<(Shard, Canary)> {
    let kinds = [CanaryKind::NameEmail, CanaryKind::NamePhone, CanaryKind::NameDate];
    (0..count)
        .map(|i| {
            let kind = kinds[i % kinds.len()];
            let (name, secondary, text) = synth_for(kind, i);
            let id = format!("canary-{}", uuid::Uuid::new_v4());
            (
                Shard { id: id.clone(), text, start: 0, end: 0, is_canary: true },
                Canary { kind, shard_id: id, name, secondary },
            )
        })
        .collect()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CanaryReport {
    pub canaries_planted: usize,
    pub canaries_detected: usize,
    pub detection_rate: f32,
}

/// Score how many canaries the verifier actually flagged, matching by
/// shard id plus a type-overlap check on the finding text.
pub fn evaluate_canaries(canaries: &[Canary], findings: &[Finding]) -> CanaryReport {
    let mut detected = 0usize;
    for canary in canaries {
        let hit = findings.iter().any(|f| {
            f.shard_id == canary.shard_id
                && (f.text.contains(&canary.name) || f.text.contains(&canary.secondary))
        });
        if hit {
            detected += 1;
        }
    }
    let rate = if canaries.is_empty() {
        1.0
    } else {
        detected as f32 / canaries.len() as f32
    };
    CanaryReport {
        canaries_planted: canaries.len(),
        canaries_detected: detected,
        detection_rate: rate,
    }
}

/// Remove canary shards and any findings pointing at them before the real
/// document's findings are patched back in.
pub fn strip_canaries(findings: Vec<Finding>, canaries: &[Canary]) -> Vec<Finding> {
    let canary_ids: std::collections::HashSet<&str> = canaries.iter().map(|c| c.shard_id.as_str()).collect();
    findings.into_iter().filter(|f| !canary_ids.contains(f.shard_id.as_str())).collect()
}

pub fn default_canary_count() -> usize {
    DEFAULT_CANARY_COUNT
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generates_requested_count() {
        let canaries = generate_canaries(3);
        assert_eq!(canaries.len(), 3);
    }

    #[test]
    fn detection_rate_counts_matching_shard_and_text() {
        let canaries = generate_canaries(2);
        let hit_shard = canaries[0].1.shard_id.clone();
        let hit_name = canaries[0].1.name.clone();
        let findings = vec![Finding {
            shard_id: hit_shard,
            text: format!("found name {hit_name}"),
            entity_type: "PERSON".into(),
            confidence: 0.9,
            start_offset: None,
            end_offset: None,
        }];
        let report = evaluate_canaries(&canaries.iter().map(|(_, c)| c.clone()).collect::<Vec<_>>(), &findings);
        assert_eq!(report.canaries_detected, 1);
        assert_eq!(report.canaries_planted, 2);
        assert!((report.detection_rate - 0.5).abs() < 1e-6);
    }

    #[test]
    fn strip_canaries_removes_canary_findings_only() {
        let canaries = generate_canaries(1);
        let canary_shard = canaries[0].1.shard_id.clone();
        let findings = vec![
            Finding { shard_id: canary_shard, text: "x".into(), entity_type: "PERSON".into(), confidence: 0.9, start_offset: None, end_offset: None },
            Finding { shard_id: "shard-0".into(), text: "y".into(), entity_type: "EMAIL".into(), confidence: 0.9, start_offset: None, end_offset: None },
        ];
        let kept = strip_canaries(findings, &canaries.iter().map(|(_, c)| c.clone()).collect::<Vec<_>>());
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].shard_id, "shard-0");
    }
}
