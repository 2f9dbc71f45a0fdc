//! NLU oracles: the hosted LUIS v2 endpoint and an offline keyword classifier.

use std::time::Duration;

use async_trait::async_trait;
use parley_core::config::NluConfig;
use parley_core::errors::TransportError;
use parley_core::nlu::{
    ClassificationResult, EntityOrigin, ExtractedEntity, IntentScore, NluOracle, NONE_INTENT,
};
use parley_core::value::RawValue;
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::bookstore::BOOK_GENRES;

const SUBSCRIPTION_KEY_HEADER: &str = "Ocp-Apim-Subscription-Key";

/// Client for a LUIS v2 application.
#[derive(Clone)]
pub struct HttpNluOracle {
    client: Client,
    app_url: String,
    subscription_key: Option<SecretString>,
    verbose: bool,
    timeout_secs: u64,
}

impl HttpNluOracle {
    pub fn new(config: &NluConfig) -> Result<Self, TransportError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|error| TransportError::Http(error.to_string()))?;

        Ok(Self {
            client,
            app_url: format!("{}/{}", config.endpoint.trim_end_matches('/'), config.app_id),
            subscription_key: config.subscription_key.clone(),
            verbose: config.verbose,
            timeout_secs: config.timeout_secs,
        })
    }

    fn transport_error(&self, error: reqwest::Error) -> TransportError {
        if error.is_timeout() {
            TransportError::Timeout(self.timeout_secs)
        } else {
            TransportError::Http(error.to_string())
        }
    }
}

#[async_trait]
impl NluOracle for HttpNluOracle {
    async fn classify(&self, text: &str) -> Result<ClassificationResult, TransportError> {
        let verbose = if self.verbose { "true" } else { "false" };
        let mut request =
            self.client.get(&self.app_url).query(&[("q", text), ("verbose", verbose)]);
        if let Some(key) = &self.subscription_key {
            request = request.header(SUBSCRIPTION_KEY_HEADER, key.expose_secret());
        }

        let response = request.send().await.map_err(|error| self.transport_error(error))?;
        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            warn!(event_name = "agent.oracle.rate_limited", "oracle rate limit exceeded");
            return Err(TransportError::RateLimited);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TransportError::Status { status: status.as_u16(), body });
        }

        let body = response.text().await.map_err(|error| self.transport_error(error))?;
        let classification = decode_luis_response(&body)?;
        debug!(
            event_name = "agent.oracle.classified",
            top_intent = classification.top_intent.as_ref().map(|top| top.intent.as_str()),
            entities = classification.entities.len(),
            "oracle classified utterance"
        );
        Ok(classification)
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LuisResponse {
    #[serde(default)]
    query: String,
    top_scoring_intent: Option<LuisIntent>,
    #[serde(default)]
    intents: Vec<LuisIntent>,
    #[serde(default)]
    entities: Vec<LuisEntity>,
}

#[derive(Deserialize)]
struct LuisIntent {
    intent: String,
    score: Option<f64>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LuisEntity {
    entity: String,
    #[serde(rename = "type")]
    kind: String,
    start_index: Option<usize>,
    end_index: Option<usize>,
    score: Option<f64>,
    resolution: Option<Value>,
}

impl From<LuisIntent> for IntentScore {
    fn from(intent: LuisIntent) -> Self {
        Self { intent: intent.intent, score: intent.score }
    }
}

impl From<LuisEntity> for ExtractedEntity {
    fn from(entity: LuisEntity) -> Self {
        let mut extracted = ExtractedEntity::new(
            entity.entity,
            entity.kind.as_str(),
            EntityOrigin::from_type_tag(&entity.kind),
        );
        if let (Some(start), Some(end)) = (entity.start_index, entity.end_index) {
            extracted = extracted.with_span(start, end);
        }
        extracted.score = entity.score;
        extracted.resolutions = entity.resolution.as_ref().and_then(resolution_value).into_iter().collect();
        extracted
    }
}

/// Decodes a LUIS v2 query response body.
pub fn decode_luis_response(body: &str) -> Result<ClassificationResult, TransportError> {
    let response: LuisResponse =
        serde_json::from_str(body).map_err(|error| TransportError::Decode(error.to_string()))?;

    Ok(ClassificationResult {
        query: response.query,
        top_intent: response.top_scoring_intent.map(IntentScore::from),
        intents: response.intents.into_iter().map(IntentScore::from).collect(),
        entities: response.entities.into_iter().map(ExtractedEntity::from).collect(),
    })
}

/// `{"value": ..}` becomes a scalar and `{"values": [..]}` a collection.
fn resolution_value(resolution: &Value) -> Option<RawValue> {
    let object = resolution.as_object()?;
    if let Some(Value::Array(values)) = object.get("values") {
        return Some(RawValue::Collection(values.iter().filter_map(reduce_value).collect()));
    }
    object.get("value").and_then(reduce_value)
}

fn reduce_value(value: &Value) -> Option<RawValue> {
    match value {
        Value::Null => None,
        Value::String(text) => Some(RawValue::Scalar(text.clone())),
        Value::Bool(flag) => Some(RawValue::Scalar(flag.to_string())),
        Value::Number(number) => Some(RawValue::Scalar(number.to_string())),
        Value::Array(values) => {
            Some(RawValue::Collection(values.iter().filter_map(reduce_value).collect()))
        }
        Value::Object(object) => object.get("value").and_then(reduce_value),
    }
}

const INTENT_KEYWORDS: [(&str, &[&str]); 4] = [
    ("Order.GetStatus", &["order", "status", "track", "shipment"]),
    ("Reserve.Book", &["reserve", "borrow", "rent"]),
    ("Books.Search", &["books", "genre", "genres", "find", "search", "browse"]),
    ("Help", &["help", "hi", "hello"]),
];

const MIN_ORDER_ID_LEN: usize = 4;

/// Offline classifier matching bookstore keywords. Deterministic and free.
#[derive(Clone, Debug, Default)]
pub struct KeywordOracle;

impl KeywordOracle {
    pub fn classify_text(&self, text: &str) -> ClassificationResult {
        let tokens = tokenize(&normalize_text(text));

        let mut intents = INTENT_KEYWORDS
            .iter()
            .filter_map(|(intent, keywords)| {
                let hits = tokens.iter().filter(|token| keywords.contains(&token.as_str())).count();
                (hits > 0).then(|| IntentScore::new(*intent, keyword_score(hits)))
            })
            .collect::<Vec<_>>();
        // Stable sort keeps declaration order between equal scores.
        intents.sort_by(|left, right| {
            right.score.unwrap_or(0.0).total_cmp(&left.score.unwrap_or(0.0))
        });
        if intents.is_empty() {
            intents.push(IntentScore::new(NONE_INTENT, 1.0));
        }

        ClassificationResult {
            query: text.to_owned(),
            top_intent: intents.first().cloned(),
            intents,
            entities: extract_entities(&tokens),
        }
    }
}

#[async_trait]
impl NluOracle for KeywordOracle {
    async fn classify(&self, text: &str) -> Result<ClassificationResult, TransportError> {
        Ok(self.classify_text(text))
    }
}

fn keyword_score(hits: usize) -> f64 {
    (0.5 + 0.2 * hits as f64).min(1.0)
}

fn normalize_text(text: &str) -> String {
    text.to_ascii_lowercase()
}

fn tokenize(text: &str) -> Vec<String> {
    let mut sanitized = String::with_capacity(text.len());
    for character in text.chars() {
        if character.is_ascii_alphanumeric() || character == '-' {
            sanitized.push(character);
        } else {
            sanitized.push(' ');
        }
    }
    sanitized.split_whitespace().map(|token| token.to_string()).collect()
}

fn extract_entities(tokens: &[String]) -> Vec<ExtractedEntity> {
    let mut entities = Vec::new();

    for (index, token) in tokens.iter().enumerate() {
        let previous = index.checked_sub(1).and_then(|at| tokens.get(at)).map(String::as_str);
        let next = tokens.get(index + 1).map(String::as_str);

        if let Some(genre) = BOOK_GENRES.iter().find(|genre| genre.eq_ignore_ascii_case(token)) {
            entities.push(
                ExtractedEntity::custom(token.as_str(), "Genre")
                    .with_resolution(RawValue::collection([*genre])),
            );
            continue;
        }

        if is_iso_date(token) {
            entities.push(
                ExtractedEntity::builtin(token.as_str(), "StartDate").with_resolution(token.as_str()),
            );
            continue;
        }

        if !token.chars().all(|character| character.is_ascii_digit()) {
            continue;
        }

        let tag = match (previous, next) {
            (Some("book"), _) => "BookId",
            (_, Some("day" | "days")) => "Days",
            _ if token.len() >= MIN_ORDER_ID_LEN => "OrderId",
            _ => continue,
        };
        entities.push(ExtractedEntity::custom(token.as_str(), tag).with_resolution(token.as_str()));
    }

    entities
}

fn is_iso_date(token: &str) -> bool {
    let parts = token.split('-').collect::<Vec<_>>();
    matches!(parts.as_slice(), [year, month, day]
        if year.len() == 4 && month.len() == 2 && day.len() == 2
            && parts.iter().all(|part| part.chars().all(|character| character.is_ascii_digit())))
}

#[cfg(test)]
mod tests {
    use parley_core::config::NluConfig;
    use parley_core::errors::TransportError;
    use parley_core::nlu::EntityOrigin;
    use parley_core::value::RawValue;

    use super::{decode_luis_response, HttpNluOracle, KeywordOracle};

    const ORDER_RESPONSE: &str = r#"{
        "query": "where is my order 12345",
        "topScoringIntent": { "intent": "Order.GetStatus", "score": 0.97 },
        "intents": [
            { "intent": "Order.GetStatus", "score": 0.97 },
            { "intent": "None", "score": 0.04 }
        ],
        "entities": [
            { "entity": "12345", "type": "OrderId", "startIndex": 18, "endIndex": 22, "score": 0.91 },
            { "entity": "12345", "type": "builtin.number", "startIndex": 18, "endIndex": 22,
              "resolution": { "value": "12345" } }
        ]
    }"#;

    #[test]
    fn luis_response_maps_intents_and_entities() {
        let classification = decode_luis_response(ORDER_RESPONSE).expect("valid body");

        assert_eq!(classification.query, "where is my order 12345");
        assert_eq!(classification.top_intent.map(|top| top.intent).as_deref(), Some("Order.GetStatus"));
        assert_eq!(classification.intents.len(), 2);

        let [order_id, number] = classification.entities.as_slice() else {
            panic!("expected two entities");
        };
        assert_eq!(order_id.origin, EntityOrigin::Custom);
        assert!(order_id.resolutions.is_empty());
        assert_eq!((order_id.start_index, order_id.end_index), (Some(18), Some(22)));
        assert_eq!(number.origin, EntityOrigin::BuiltIn);
        assert_eq!(number.resolutions, vec![RawValue::scalar("12345")]);
    }

    #[test]
    fn luis_value_lists_and_objects_are_reduced() {
        let classification = decode_luis_response(
            r#"{
                "query": "drama books from 2026-10-19",
                "topScoringIntent": { "intent": "Books.Search" },
                "entities": [
                    { "entity": "drama", "type": "Genre", "resolution": { "values": ["Drama"] } },
                    { "entity": "2026-10-19", "type": "builtin.datetimeV2.date",
                      "resolution": { "values": [
                          { "timex": "2026-10-19", "type": "date", "value": "2026-10-19" }
                      ] } }
                ]
            }"#,
        )
        .expect("valid body");

        assert!(classification.intents.is_empty());
        assert_eq!(classification.top_intent.and_then(|top| top.score), None);
        assert_eq!(classification.entities[0].resolutions, vec![RawValue::collection(["Drama"])]);
        assert_eq!(
            classification.entities[1].resolutions,
            vec![RawValue::collection(["2026-10-19"])]
        );
    }

    #[test]
    fn malformed_body_is_a_decode_error() {
        let error = decode_luis_response("<html>").expect_err("not json");

        assert!(matches!(error, TransportError::Decode(_)));
    }

    #[test]
    fn http_oracle_targets_the_app_url() {
        let config = NluConfig {
            endpoint: "https://luis.example.com/apps/".to_owned(),
            app_id: "bookstore".to_owned(),
            subscription_key: None,
            timeout_secs: 5,
            verbose: true,
            offline: false,
        };

        let oracle = HttpNluOracle::new(&config).expect("client builds");

        assert_eq!(oracle.app_url, "https://luis.example.com/apps/bookstore");
    }

    #[test]
    fn keywords_pick_intent_and_order_number() {
        let classification = KeywordOracle.classify_text("What's the status of order 12345?");

        assert_eq!(
            classification.top_intent.map(|top| top.intent).as_deref(),
            Some("Order.GetStatus")
        );
        assert_eq!(classification.entities.len(), 1);
        assert_eq!(classification.entities[0].type_tag, "OrderId");
        assert_eq!(classification.entities[0].binding_value(), RawValue::scalar("12345"));
    }

    #[test]
    fn reservation_entities_are_recognized() {
        let classification =
            KeywordOracle.classify_text("Reserve book 2 from 2026-10-20 for 5 days");

        let tags = classification
            .entities
            .iter()
            .map(|entity| (entity.type_tag.as_str(), entity.text.as_str()))
            .collect::<Vec<_>>();
        assert_eq!(tags, vec![("BookId", "2"), ("StartDate", "2026-10-20"), ("Days", "5")]);
        assert_eq!(
            classification.intents.first().map(|intent| intent.intent.as_str()),
            Some("Reserve.Book")
        );
    }

    #[test]
    fn unmatched_text_is_the_none_intent() {
        let classification = KeywordOracle.classify_text("Drama");

        assert_eq!(classification.top_intent.map(|top| top.intent).as_deref(), Some("None"));
        assert_eq!(classification.entities[0].type_tag, "Genre");
        assert_eq!(classification.entities[0].binding_value(), RawValue::collection(["Drama"]));
    }
}
