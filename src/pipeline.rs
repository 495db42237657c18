//! Wires the stages (Detector -> Validator -> Redactor -> optional Auditor
//! -> optional Sharder/Verifier) into one entry point, with a lightweight
//! cooperative cancellation check between stages.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{debug, info, instrument};

use crate::config::PipelineConfig;
use crate::detector::{self, DocType};
use crate::error::PiiError;
use crate::model::Mapping;
use crate::nlp::NlpEngine;
use crate::validator;
use crate::{auditor, blocklist::Blocklist, redactor, verifier, verify_client};

/// A cheap `Arc<AtomicBool>`-based cancellation flag, checked between
/// pipeline stages. Cloning shares the same underlying flag.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(false)))
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Outcome of one pipeline run.
#[derive(Debug, Clone)]
pub struct PipelineResult {
    pub redacted_text: String,
    pub mapping: Mapping,
    pub doc_type: DocType,
}

pub struct Pipeline {
    config: PipelineConfig,
    engine: Arc<dyn NlpEngine>,
    blocklist: Blocklist,
}

impl Pipeline {
    pub fn new(config: PipelineConfig, engine: Arc<dyn NlpEngine>) -> Self {
        let blocklist = Blocklist::new(config.blocklist_paths.clone());
        Self { config, engine, blocklist }
    }

    /// Run Detector -> Validator -> Redactor, then the optional Auditor and
    /// Verifier passes per `self.config`. Returns [`PiiError::Cancelled`] if
    /// `cancel` fires before a stage that hasn't started yet.
    #[instrument(skip_all)]
    pub async fn run(&self, text: &str, cancel: &CancellationToken) -> Result<PipelineResult, PiiError> {
        if text.trim().is_empty() {
            return Err(PiiError::EmptyExtraction);
        }

        let doc_type = detector::detect_doc_type(text);
        debug!(?doc_type, "classified document");

        let entities = detector::detect(text, self.engine.as_ref());
        debug!(count = entities.len(), "detector candidates");
        if cancel.is_cancelled() {
            return Err(PiiError::Cancelled);
        }

        let ner_doc = self.engine.ner(text);
        let entities = validator::validate(entities, text, &ner_doc, doc_type, self.engine.as_ref(), &self.blocklist);
        debug!(count = entities.len(), "validated candidates");
        if cancel.is_cancelled() {
            return Err(PiiError::Cancelled);
        }

        let (mut redacted, mut mapping) = redactor::redact(text, entities, None);
        info!(tags = mapping.tags.len(), "redaction complete");
        if cancel.is_cancelled() {
            return Err(PiiError::Cancelled);
        }

        if self.config.enable_audit {
            let (audited_text, audited_mapping) = auditor::audit(&redacted, &mapping);
            redacted = audited_text;
            mapping = audited_mapping;
            debug!(tags = mapping.tags.len(), "audit pass complete");
        }
        if cancel.is_cancelled() {
            return Err(PiiError::Cancelled);
        }

        if self.config.enable_verify {
            if let Some(verify_cfg) = &self.config.verify {
                let client = verify_client::VerifyClient::new(verify_client::VerifyClientConfig {
                    endpoint: verify_cfg.endpoint.clone(),
                    api_key: verify_cfg.api_key.clone(),
                    confidence_threshold: verify_cfg.confidence_threshold,
                });
                let verifier_config = verifier::VerifierConfig {
                    enable_canaries: verify_cfg.enable_canaries,
                    canary_count: verify_cfg.canary_count,
                };
                let (verified_text, verified_mapping) = verifier::verify_and_patch(
                    &redacted,
                    &mapping,
                    doc_type,
                    &client,
                    self.engine.as_ref(),
                    &verifier_config,
                )
                .await;
                redacted = verified_text;
                mapping = verified_mapping;
                debug!(tags = mapping.tags.len(), "verify pass complete");
            }
        }

        Ok(PipelineResult {
            redacted_text: redacted,
            mapping,
            doc_type,
        })
    }
}
