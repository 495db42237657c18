//! Multi-pass PII detection, reversible redaction, self-audit, and
//! cloud-verification pipeline.
//!
//! The stages run in order: [`detector`] (regex + statistical NER) ->
//! [`validator`] (confidence scoring) -> [`redactor`] (tag substitution) ->
//! optional [`auditor`] (self-audit for missed mentions) -> optional
//! [`verifier`] (sharded cloud re-verification). [`pipeline::Pipeline`]
//! wires all of this together; [`restorer`] reverses it.

pub mod auditor;
pub mod blocklist;
pub mod canary;
pub mod config;
pub mod constants;
pub mod detector;
pub mod error;
pub mod model;
pub mod nlp;
pub mod pipeline;
pub mod redactor;
pub mod restorer;
pub mod sharder;
pub mod textindex;
pub mod validator;
pub mod verifier;
pub mod verify_client;

pub use config::{PipelineConfig, VerifyConfig};
pub use error::PiiError;
pub use model::{Entity, Label, Mapping};
pub use pipeline::{CancellationToken, Pipeline, PipelineResult};

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize a `tracing` subscriber for standalone binaries embedding this
/// crate. Honors `RUST_LOG`; otherwise defaults to `debug` in debug builds
/// and `info` in release builds.
pub fn init_tracing() {
    let default_directive = if cfg!(debug_assertions) { "debug" } else { "info" };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_target(true).with_thread_ids(true).with_line_number(true))
        .init();
}
