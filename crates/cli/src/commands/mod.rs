pub mod chat;
pub mod config;
pub mod intents;
pub mod resolve;

use std::sync::Arc;

use parley_agent::bookstore::InMemoryBookstore;
use parley_agent::handlers::{default_registry, default_router};
use parley_agent::oracle::{HttpNluOracle, KeywordOracle};
use parley_agent::runtime::ConversationRuntime;
use parley_core::config::{AppConfig, NluConfig};
use parley_core::errors::TransportError;
use parley_core::nlu::NluOracle;
use parley_core::resolver::ActionResolver;
use parley_core::router::HandlerRouter;
use serde::Serialize;

#[derive(Debug, Clone)]
pub struct CommandResult {
    pub exit_code: u8,
    pub output: String,
}

#[derive(Debug, Serialize)]
struct CommandOutcome {
    command: String,
    status: String,
    error_class: Option<String>,
    message: String,
}

impl CommandResult {
    pub fn success(command: &str, message: impl Into<String>) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "ok".to_string(),
            error_class: None,
            message: message.into(),
        };
        Self { exit_code: 0, output: serialize_payload(&payload) }
    }

    pub fn failure(
        command: &str,
        error_class: &str,
        message: impl Into<String>,
        exit_code: u8,
    ) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "error".to_string(),
            error_class: Some(error_class.to_string()),
            message: message.into(),
        };
        Self { exit_code, output: serialize_payload(&payload) }
    }

    /// A successful command with a structured report of its own.
    pub(crate) fn report<T: Serialize>(command: &str, report: &T) -> Self {
        match serde_json::to_string(report) {
            Ok(output) => Self { exit_code: 0, output },
            Err(error) => Self::failure(command, "serialization", error.to_string(), 1),
        }
    }
}

fn serialize_payload(payload: &CommandOutcome) -> String {
    serde_json::to_string(payload).unwrap_or_else(|error| {
        format!(
            "{{\"command\":\"unknown\",\"status\":\"error\",\"error_class\":\"serialization\",\"message\":\"{}\"}}",
            error.to_string().replace('\\', "\\\\").replace('"', "\\\"")
        )
    })
}

pub(crate) const EXIT_CONFIG: u8 = 2;
pub(crate) const EXIT_ORACLE: u8 = 3;
pub(crate) const EXIT_DISPATCH: u8 = 4;
pub(crate) const EXIT_SETUP: u8 = 5;

/// The hosted oracle, or the keyword classifier when running offline.
pub(crate) fn build_oracle(config: &NluConfig) -> Result<Arc<dyn NluOracle>, TransportError> {
    if config.offline {
        return Ok(Arc::new(KeywordOracle));
    }
    Ok(Arc::new(HttpNluOracle::new(config)?))
}

pub(crate) struct BookstoreAgent {
    pub resolver: ActionResolver,
    pub router: HandlerRouter,
}

pub(crate) fn bookstore_agent(none_intent: &str) -> Result<BookstoreAgent, String> {
    let registry = default_registry().map_err(|error| error.to_string())?;
    let router =
        default_router(Arc::new(InMemoryBookstore::default())).map_err(|error| error.to_string())?;
    let resolver = ActionResolver::new(Arc::new(registry)).with_none_intent(none_intent);
    Ok(BookstoreAgent { resolver, router })
}

pub(crate) fn conversation_runtime(
    config: &AppConfig,
    oracle: Arc<dyn NluOracle>,
) -> Result<ConversationRuntime, String> {
    let agent = bookstore_agent(&config.conversation.none_intent)?;
    Ok(ConversationRuntime::new(agent.resolver, agent.router, oracle)
        .with_max_clarification_attempts(config.conversation.max_clarification_attempts)
        .with_none_intent(config.conversation.none_intent.clone()))
}
