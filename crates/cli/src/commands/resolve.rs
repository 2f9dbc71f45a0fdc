use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use parley_agent::oracle::decode_luis_response;
use parley_core::action::Action;
use parley_core::config::{AppConfig, LoadOptions};
use parley_core::errors::TransportError;
use parley_core::nlu::{ClassificationResult, NluOracle};
use parley_core::reply::Reply;
use parley_core::router::Turn;
use serde::Serialize;

use crate::commands::{
    bookstore_agent, build_oracle, BookstoreAgent, CommandResult, EXIT_CONFIG, EXIT_DISPATCH,
    EXIT_ORACLE, EXIT_SETUP,
};
use crate::logging::init_logging;

const COMMAND: &str = "resolve";

#[derive(Debug, Serialize)]
struct ResolveReport {
    command: &'static str,
    status: &'static str,
    query: String,
    intent: Option<String>,
    score: Option<f64>,
    action_type: Option<&'static str>,
    fully_bound: bool,
    fields: BTreeMap<&'static str, Option<String>>,
    clarification: Option<ClarificationEntry>,
    reply: Reply,
}

#[derive(Debug, Serialize)]
struct ClarificationEntry {
    field: &'static str,
    prompt: String,
}

/// Replays a classification captured from the hosted oracle.
struct RecordedOracle {
    classification: ClassificationResult,
}

#[async_trait]
impl NluOracle for RecordedOracle {
    async fn classify(&self, _text: &str) -> Result<ClassificationResult, TransportError> {
        Ok(self.classification.clone())
    }
}

pub fn run(options: LoadOptions, utterance: &str, luis_response: Option<&Path>) -> CommandResult {
    let config = match AppConfig::load(options) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(COMMAND, "config_validation", error.to_string(), EXIT_CONFIG)
        }
    };
    init_logging(&config);

    let oracle = match luis_response {
        Some(path) => recorded_oracle(path),
        None => build_oracle(&config.nlu),
    };
    let oracle = match oracle {
        Ok(oracle) => oracle,
        Err(error) => return CommandResult::failure(COMMAND, "oracle", error.to_string(), EXIT_ORACLE),
    };

    let agent = match bookstore_agent(&config.conversation.none_intent) {
        Ok(agent) => agent,
        Err(error) => return CommandResult::failure(COMMAND, "setup", error, EXIT_SETUP),
    };

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return CommandResult::failure(
                COMMAND,
                "runtime",
                format!("failed to initialize async runtime: {error}"),
                EXIT_SETUP,
            )
        }
    };

    let turn = Turn::new("cli-resolve", utterance);
    runtime.block_on(resolve_turn(&agent, oracle.as_ref(), &turn))
}

fn recorded_oracle(path: &Path) -> Result<Arc<dyn NluOracle>, TransportError> {
    let body = fs::read_to_string(path).map_err(|error| {
        TransportError::Http(format!("could not read `{}`: {error}", path.display()))
    })?;
    Ok(Arc::new(RecordedOracle { classification: decode_luis_response(&body)? }))
}

async fn resolve_turn(
    agent: &BookstoreAgent,
    oracle: &dyn NluOracle,
    turn: &Turn,
) -> CommandResult {
    let classification = match oracle.classify(&turn.text).await {
        Ok(classification) => classification,
        Err(error) => return CommandResult::failure(COMMAND, "oracle", error.to_string(), EXIT_ORACLE),
    };

    let score = agent.resolver.select_intent(&classification).ok().and_then(|winner| winner.score);
    let resolution = agent.resolver.resolve(&classification);
    let action = resolution.action.as_deref();
    let clarification = action.and_then(|action| action.clarification());

    let reply = match &clarification {
        Some(clarification) => Reply::text(&clarification.prompt),
        None => {
            let intent = resolution
                .intent
                .as_deref()
                .filter(|intent| !agent.resolver.is_none(intent));
            match agent.router.dispatch(turn, intent, action).await {
                Ok(reply) => reply,
                Err(error) => {
                    return CommandResult::failure(COMMAND, "dispatch", error.to_string(), EXIT_DISPATCH)
                }
            }
        }
    };

    let report = ResolveReport {
        command: COMMAND,
        status: "ok",
        query: turn.text.clone(),
        intent: resolution.intent.clone(),
        score,
        action_type: action.map(|action| action.type_name()),
        fully_bound: resolution.fully_bound,
        fields: action.map(|action| field_values(action)).unwrap_or_default(),
        clarification: clarification
            .map(|clarification| ClarificationEntry {
                field: clarification.field,
                prompt: clarification.prompt,
            }),
        reply,
    };
    CommandResult::report(COMMAND, &report)
}

fn field_values(action: &dyn Action) -> BTreeMap<&'static str, Option<String>> {
    action
        .fields()
        .into_iter()
        .map(|field| (field.name, action.value_of(field.name).map(|value| value.to_string())))
        .collect()
}
