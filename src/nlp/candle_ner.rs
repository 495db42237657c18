//! Optional statistical NER backend: a real BERT CoNLL03 model loaded from
//! the Hugging Face Hub via `candle`. Off by default behind the
//! `candle-ner` feature — [`heuristic::HeuristicEngine`] is what every test
//! in this crate runs against, since pulling a model at test time would
//! make the crate untestable offline.
//!
//! Only `ner()` is backed by the transformer; sentence segmentation and POS
//! tagging delegate to an inner [`HeuristicEngine`] since CoNLL03 token
//! classification has nothing useful to say about either.

use std::sync::Mutex;

use anyhow::{anyhow, Result};
use candle_core::{safetensors, DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::bert::{BertModel, Config as BertConfig};
use hf_hub::{api::sync::Api, Repo, RepoType};
use tokenizers::Tokenizer;
use tracing::info;

use super::heuristic::HeuristicEngine;
use super::{NerLabel, NerSpan, NlpEngine, PosTag, Sentence};
use crate::textindex::CodePointIndex;

/// BERT CoNLL03 label set in the order its classification head emits them.
fn default_id_to_label() -> Vec<String> {
    [
        "O", "B-PER", "I-PER", "B-ORG", "I-ORG", "B-LOC", "I-LOC", "B-MISC", "I-MISC",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

pub struct CandleNerEngine {
    model: Mutex<BertModel>,
    tokenizer: Tokenizer,
    id_to_label: Vec<String>,
    device: Device,
    heuristic: HeuristicEngine,
}

impl CandleNerEngine {
    /// Download (or read from the local Hub cache) `model_id`@`revision`
    /// and load it onto `device`.
    pub fn new(model_id: &str, revision: &str, device: Device) -> Result<Self> {
        info!(model_id, revision, ?device, "loading candle NER model");
        let api = Api::new()?;
        let repo = api.repo(Repo::with_revision(model_id.to_string(), RepoType::Model, revision.to_string()));

        let config_filename = repo.get("config.json")?;
        let tokenizer_filename = repo.get("tokenizer.json")?;
        let model_filename = repo.get("model.safetensors")?;

        let tokenizer =
            Tokenizer::from_file(tokenizer_filename).map_err(|e| anyhow!("failed to load tokenizer: {e:?}"))?;
        let config: BertConfig = serde_json::from_str(&std::fs::read_to_string(config_filename)?)?;

        let model_weights = safetensors::load(&model_filename, &device)?;
        let vb = VarBuilder::from_tensors(model_weights, DType::F32, &device)?;
        let model = BertModel::load(vb, &config)?;

        Ok(Self {
            model: Mutex::new(model),
            tokenizer,
            id_to_label: default_id_to_label(),
            device,
            heuristic: HeuristicEngine::new(),
        })
    }

    fn predict_byte_spans(&self, text: &str) -> Result<Vec<(String, String, usize, usize, f32)>> {
        let encoding = self
            .tokenizer
            .encode(text, true)
            .map_err(|e| anyhow!("failed to encode text: {e:?}"))?;

        let tokens = encoding.get_ids().to_vec();
        let offsets = encoding.get_offsets().to_vec();

        let model = self.model.lock().unwrap();
        let token_ids = Tensor::new(tokens.as_slice(), &self.device)?.unsqueeze(0)?;
        let attention_mask = Tensor::new(vec![1u32; tokens.len()].as_slice(), &self.device)?.unsqueeze(0)?;
        let logits = model.forward(&token_ids, &attention_mask, None)?.squeeze(0)?.to_vec2::<f32>()?;
        drop(model);

        let mut spans = Vec::new();
        let mut tokens_buf: Vec<String> = Vec::new();
        let mut label: Option<String> = None;
        let mut start: Option<usize> = None;
        let mut end: Option<usize> = None;
        let mut confidence = 0.0f32;

        let mut flush = |tokens_buf: &mut Vec<String>, label: &mut Option<String>, start: &mut Option<usize>, end: &mut Option<usize>, confidence: f32, spans: &mut Vec<(String, String, usize, usize, f32)>| {
            if let Some(l) = label.take() {
                if !tokens_buf.is_empty() {
                    let entity_text = tokens_buf.join("").replace("##", "");
                    spans.push((l, entity_text, start.unwrap_or(0), end.unwrap_or(0), confidence));
                }
            }
            tokens_buf.clear();
            *start = None;
            *end = None;
        };

        for (i, logit_row) in logits.iter().enumerate() {
            let (label_id, max_logit) = logit_row
                .iter()
                .enumerate()
                .max_by(|(_, a), (_, b)| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal))
                .unwrap();
            let tag = &self.id_to_label[label_id];
            let (tok_start, tok_end) = offsets[i];
            let token_text = &text[tok_start..tok_end];
            let tok_confidence = 1.0 / (1.0 + (-max_logit).exp());

            if let Some(kind) = tag.strip_prefix("B-") {
                flush(&mut tokens_buf, &mut label, &mut start, &mut end, confidence, &mut spans);
                tokens_buf.push(token_text.to_string());
                label = Some(kind.to_string());
                start = Some(tok_start);
                end = Some(tok_end);
                confidence = tok_confidence;
            } else if let Some(kind) = tag.strip_prefix("I-") {
                if label.as_deref() == Some(kind) {
                    tokens_buf.push(token_text.to_string());
                    end = Some(tok_end);
                    confidence = (confidence + tok_confidence) / 2.0;
                } else {
                    flush(&mut tokens_buf, &mut label, &mut start, &mut end, confidence, &mut spans);
                }
            } else {
                flush(&mut tokens_buf, &mut label, &mut start, &mut end, confidence, &mut spans);
            }
        }
        flush(&mut tokens_buf, &mut label, &mut start, &mut end, confidence, &mut spans);

        Ok(spans)
    }
}

fn label_for(conll_label: &str) -> NerLabel {
    match conll_label {
        "PER" => NerLabel::Person,
        "ORG" => NerLabel::Org,
        "LOC" => NerLabel::Loc,
        "MISC" => NerLabel::Other("MISC".to_string()),
        other => NerLabel::Other(other.to_string()),
    }
}

impl NlpEngine for CandleNerEngine {
    fn ner(&self, text: &str) -> Vec<NerSpan> {
        let spans = match self.predict_byte_spans(text) {
            Ok(s) => s,
            Err(e) => {
                tracing::warn!(error = %e, "candle NER inference failed, returning no entities");
                return Vec::new();
            }
        };
        let idx = CodePointIndex::new(text);
        spans
            .into_iter()
            .map(|(label, entity_text, start, end, _confidence)| NerSpan {
                label: label_for(&label),
                text: entity_text,
                start: idx.byte_to_char(start),
                end: idx.byte_to_char(end),
            })
            .collect()
    }

    fn sentences(&self, text: &str) -> Vec<Sentence> {
        self.heuristic.sentences(text)
    }

    fn pos_tags(&self, text: &str) -> Vec<PosTag> {
        self.heuristic.pos_tags(text)
    }
}
