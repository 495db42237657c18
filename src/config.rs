//! Pipeline configuration. No file or environment loading lives here — a
//! host application builds a [`PipelineConfig`] however it likes (CLI
//! flags, a config file, defaults) and passes it to [`crate::pipeline::Pipeline`].

use crate::blocklist::BlocklistPaths;
use crate::constants::{DEFAULT_CANARY_COUNT, DEFAULT_VERIFY_CONFIDENCE, DEFAULT_VERIFY_ENDPOINT};

/// Cloud verify stage (P3) configuration. Absent unless a caller opts in by
/// providing an `api_key`.
#[derive(Debug, Clone)]
pub struct VerifyConfig {
    pub endpoint: String,
    pub api_key: String,
    pub confidence_threshold: f32,
    pub enable_canaries: bool,
    pub canary_count: usize,
}

impl Default for VerifyConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_VERIFY_ENDPOINT.to_string(),
            api_key: String::new(),
            confidence_threshold: DEFAULT_VERIFY_CONFIDENCE,
            enable_canaries: true,
            canary_count: DEFAULT_CANARY_COUNT,
        }
    }
}

/// Top-level pipeline configuration: which optional passes run, and where
/// the blocklist layers live on disk.
#[derive(Debug, Clone, Default)]
pub struct PipelineConfig {
    pub blocklist_paths: BlocklistPaths,
    /// Run the P2 self-audit pass after redaction.
    pub enable_audit: bool,
    /// Run the P3 cloud-verification pass after audit. Ignored if `verify`
    /// is `None`.
    pub enable_verify: bool,
    pub verify: Option<VerifyConfig>,
}
