//! Statistical NER as an external collaborator.
//!
//! Per the specification's Design Notes, any implementation satisfying this
//! trait is acceptable to the Detector/Sharder. This crate ships
//! [`heuristic::HeuristicEngine`] as the default, fully offline engine used
//! by every test, and (behind the `candle-ner` feature) a real transformer
//! pass in [`candle_ner`].

pub mod heuristic;
#[cfg(feature = "candle-ner")]
pub mod candle_ner;

/// The entity classes the statistical pass may emit, mirroring spaCy's
/// `en_core_web_sm` label set as used by the reference implementation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NerLabel {
    Person,
    Org,
    Gpe,
    Loc,
    Norp,
    Fac,
    Product,
    WorkOfArt,
    Date,
    Other(String),
}

impl NerLabel {
    pub fn is_non_person_entity(&self) -> bool {
        matches!(
            self,
            NerLabel::Org
                | NerLabel::Gpe
                | NerLabel::Loc
                | NerLabel::Norp
                | NerLabel::Fac
                | NerLabel::Product
                | NerLabel::WorkOfArt
        )
    }
}

/// A span produced by the statistical NER pass. Offsets are code points.
#[derive(Debug, Clone)]
pub struct NerSpan {
    pub label: NerLabel,
    pub text: String,
    pub start: usize,
    pub end: usize,
}

/// A sentence span, as produced by the segmenter. Offsets are code points.
#[derive(Debug, Clone)]
pub struct Sentence {
    pub text: String,
    pub start: usize,
    pub end: usize,
}

/// Coarse part-of-speech classification used only for the Validator's
/// proper-noun ratio heuristic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PosClass {
    ProperNoun,
    Other,
}

/// A single token's POS classification. Offsets are code points.
#[derive(Debug, Clone, Copy)]
pub struct PosTag {
    pub start: usize,
    pub end: usize,
    pub tag: PosClass,
}

/// The narrow contract the core pipeline depends on. Any NLP backend —
/// a real transformer, a hosted API client, or a rule-based stand-in — is
/// acceptable as long as it satisfies this trait.
pub trait NlpEngine: Send + Sync {
    fn ner(&self, text: &str) -> Vec<NerSpan>;
    fn sentences(&self, text: &str) -> Vec<Sentence>;
    fn pos_tags(&self, text: &str) -> Vec<PosTag>;
}
