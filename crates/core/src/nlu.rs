//! Classification results as produced by the external NLU oracle.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::errors::TransportError;
use crate::value::RawValue;

/// The oracle's "nothing matched" intent.
pub const NONE_INTENT: &str = "None";

const BUILTIN_TYPE_PREFIX: &str = "builtin.";

pub fn is_none_intent(intent: &str) -> bool {
    let trimmed = intent.trim();
    trimmed.is_empty() || trimmed.eq_ignore_ascii_case(NONE_INTENT)
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct IntentScore {
    pub intent: String,
    #[serde(default)]
    pub score: Option<f64>,
}

impl IntentScore {
    pub fn new(intent: impl Into<String>, score: f64) -> Self {
        Self { intent: intent.into(), score: Some(score) }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityOrigin {
    /// Produced by one of the oracle's prebuilt recognizers (numbers, dates, ...).
    BuiltIn,
    #[default]
    Custom,
}

impl EntityOrigin {
    pub fn from_type_tag(type_tag: &str) -> Self {
        if type_tag.starts_with(BUILTIN_TYPE_PREFIX) {
            Self::BuiltIn
        } else {
            Self::Custom
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExtractedEntity {
    pub text: String,
    pub type_tag: String,
    #[serde(default)]
    pub origin: EntityOrigin,
    /// Canonical values; empty when the oracle only reported the raw span.
    #[serde(default)]
    pub resolutions: Vec<RawValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_index: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_index: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
}

impl ExtractedEntity {
    pub fn new(text: impl Into<String>, type_tag: impl Into<String>, origin: EntityOrigin) -> Self {
        Self {
            text: text.into(),
            type_tag: type_tag.into(),
            origin,
            resolutions: Vec::new(),
            start_index: None,
            end_index: None,
            score: None,
        }
    }

    pub fn custom(text: impl Into<String>, type_tag: impl Into<String>) -> Self {
        Self::new(text, type_tag, EntityOrigin::Custom)
    }

    pub fn builtin(text: impl Into<String>, type_tag: impl Into<String>) -> Self {
        Self::new(text, type_tag, EntityOrigin::BuiltIn)
    }

    pub fn with_resolution(mut self, value: impl Into<RawValue>) -> Self {
        self.resolutions.push(value.into());
        self
    }

    pub fn with_span(mut self, start_index: usize, end_index: usize) -> Self {
        self.start_index = Some(start_index);
        self.end_index = Some(end_index);
        self
    }

    pub fn is_builtin(&self) -> bool {
        self.origin == EntityOrigin::BuiltIn
    }

    pub fn first_resolution(&self) -> Option<&RawValue> {
        self.resolutions.first()
    }

    /// The value handed to coercion: the first canonical resolution, else the raw span.
    pub fn binding_value(&self) -> RawValue {
        self.first_resolution().cloned().unwrap_or_else(|| RawValue::Scalar(self.text.clone()))
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResult {
    #[serde(default)]
    pub query: String,
    #[serde(default)]
    pub top_intent: Option<IntentScore>,
    /// Every scored intent the oracle reported, in the oracle's order.
    #[serde(default)]
    pub intents: Vec<IntentScore>,
    #[serde(default)]
    pub entities: Vec<ExtractedEntity>,
}

impl ClassificationResult {
    pub fn with_top_intent(intent: impl Into<String>, score: f64) -> Self {
        let top = IntentScore::new(intent, score);
        Self { intents: vec![top.clone()], top_intent: Some(top), ..Self::default() }
    }

    pub fn with_entity(mut self, entity: ExtractedEntity) -> Self {
        self.entities.push(entity);
        self
    }

    /// Designated top intent, else the best-scoring alternative. A missing score
    /// counts as zero and the earliest intent wins a tie.
    pub fn winning_intent(&self) -> Option<&IntentScore> {
        if let Some(top) = &self.top_intent {
            return Some(top);
        }

        self.intents.iter().fold(None, |best: Option<&IntentScore>, candidate| match best {
            Some(current) if current.score.unwrap_or(0.0) >= candidate.score.unwrap_or(0.0) => {
                Some(current)
            }
            _ => Some(candidate),
        })
    }

    /// First intent in the oracle's list, falling back to the top intent.
    pub fn leading_intent(&self) -> Option<&IntentScore> {
        self.intents.first().or(self.top_intent.as_ref())
    }
}

/// The external classifier, treated as a black box.
#[async_trait]
pub trait NluOracle: Send + Sync {
    async fn classify(&self, text: &str) -> Result<ClassificationResult, TransportError>;
}
