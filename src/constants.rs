//! Tunable thresholds for the redaction pipeline.
//!
//! Centralizes the magic numbers named explicitly in the specification so
//! they are easy to audit and adjust in one place.

// ============================================================================
// Validator (P1v)
// ============================================================================

/// Minimum confidence a PERSON candidate must reach to survive validation.
pub const MIN_PERSON_CONFIDENCE: f32 = 0.6;

/// Starting score for a PERSON candidate before adjustments.
pub const PERSON_BASE_SCORE: f32 = 0.5;

/// Score delta for a 2-3 token name.
pub const SCORE_MULTI_TOKEN_BONUS: f32 = 0.25;

/// Score penalty for a single-token name.
pub const SCORE_SINGLE_TOKEN_PENALTY: f32 = 0.15;

/// Additional penalty when a single-token name is also very short (<= 3 chars).
pub const SCORE_SHORT_SINGLE_TOKEN_PENALTY: f32 = 0.20;

/// Score penalty for matching a job-title pattern.
pub const SCORE_JOB_TITLE_PENALTY: f32 = 0.40;

/// Score penalty for failing the capitalization check.
pub const SCORE_CAPITALIZATION_PENALTY: f32 = 0.25;

/// Score bonus when the proper-noun ratio over the span exceeds this.
pub const POS_PROPER_NOUN_RATIO_HIGH: f32 = 0.8;
pub const SCORE_POS_HIGH_BONUS: f32 = 0.20;

/// Score penalty when the proper-noun ratio over the span is below this.
pub const POS_PROPER_NOUN_RATIO_LOW: f32 = 0.3;
pub const SCORE_POS_LOW_PENALTY: f32 = 0.20;

/// Maximum token count a PERSON candidate may have before outright rejection.
pub const MAX_PERSON_TOKENS: usize = 5;

// ============================================================================
// Detector (P1)
// ============================================================================

/// Confidence assigned to every regex match except DOB.
pub const REGEX_CONFIDENCE: f32 = 1.0;

/// Confidence assigned to DOB regex matches (demotable during validation).
pub const DOB_REGEX_CONFIDENCE: f32 = 0.8;

/// Confidence assigned to statistically-detected DOB candidates.
pub const DOB_NER_CONFIDENCE: f32 = 0.8;

/// Confidence assigned to the all-caps header heuristic.
pub const HEADER_HEURISTIC_CONFIDENCE: f32 = 0.9;

/// How far into the document (in chars) the header heuristic looks.
pub const HEADER_HEURISTIC_WINDOW: usize = 500;

/// Maximum token count for a NER PERSON span to be considered.
pub const MAX_NER_PERSON_TOKENS: usize = 5;

/// Maximum char length for a NER DATE span to be considered a DOB candidate.
pub const MAX_SPECIFIC_DATE_CHARS: usize = 30;

/// Window (in chars) scanned when auto-detecting document type.
pub const DOC_TYPE_WINDOW: usize = 1_500;

// ============================================================================
// Redactor global name pass (Design Notes open question — restricted option)
// ============================================================================

/// Minimum surface-form length eligible for the Redactor's global,
/// case-insensitive, word-boundary name substitution pass.
pub const MIN_GLOBAL_NAME_PASS_LEN: usize = 4;

// ============================================================================
// Sharder (P3)
// ============================================================================

/// Maximum characters per shard.
pub const MAX_SHARD_CHARS: usize = 800;

/// Sentences with fewer whitespace-separated tokens than this merge with
/// their predecessor.
pub const MIN_SENTENCE_WORDS: usize = 5;

/// Default canary count when canary injection is enabled.
pub const DEFAULT_CANARY_COUNT: usize = 3;

/// Default maximum shards per verify batch.
pub const DEFAULT_BATCH_SIZE: usize = 5;

/// Maximum number of verify batches dispatched concurrently.
pub const MAX_CONCURRENT_VERIFY_BATCHES: usize = 4;

// ============================================================================
// Verify client (P3)
// ============================================================================

/// Per-request timeout for `/verify` calls, in seconds.
pub const VERIFY_TIMEOUT_SECS: u64 = 60;

/// Timeout for `/usage` calls, in seconds.
pub const USAGE_TIMEOUT_SECS: u64 = 10;

/// Timeout for `/health` calls, in seconds.
pub const HEALTH_TIMEOUT_SECS: u64 = 5;

/// Maximum retries for a retryable (5xx / transient network) verify error.
pub const MAX_VERIFY_RETRIES: u32 = 2;

/// Backoff unit, in seconds; actual backoff is `RETRY_BACKOFF_SECS * (attempt + 1)`.
pub const RETRY_BACKOFF_SECS: u64 = 1;

/// Default confidence threshold sent to the Verify API.
pub const DEFAULT_VERIFY_CONFIDENCE: f32 = 0.7;

/// Default Verify API base endpoint.
pub const DEFAULT_VERIFY_ENDPOINT: &str = "https://api.pii-redactor.example/v1";
