use parley_agent::runtime::{ConversationRuntime, ConversationState};
use parley_core::config::{AppConfig, LoadOptions};
use parley_core::router::Turn;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::commands::{build_oracle, conversation_runtime, CommandResult, EXIT_CONFIG, EXIT_SETUP};
use crate::logging::init_logging;

const COMMAND: &str = "chat";
const EXIT_WORDS: [&str; 2] = ["exit", "quit"];

pub fn run(options: LoadOptions, user: Option<String>) -> CommandResult {
    let config = match AppConfig::load(options) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(COMMAND, "config_validation", error.to_string(), EXIT_CONFIG)
        }
    };
    init_logging(&config);

    let conversation = match build_oracle(&config.nlu)
        .map_err(|error| error.to_string())
        .and_then(|oracle| conversation_runtime(&config, oracle))
    {
        Ok(conversation) => conversation,
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

    match runtime.block_on(chat_loop(&conversation, user)) {
        Ok(turns) => CommandResult::success(COMMAND, format!("conversation ended after {turns} turns")),
        Err(error) => CommandResult::failure(COMMAND, "io", error.to_string(), EXIT_SETUP),
    }
}

async fn chat_loop(conversation: &ConversationRuntime, user: Option<String>) -> anyhow::Result<u64> {
    let mut state = ConversationState::default();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();
    let mut turns = 0_u64;

    info!(
        event_name = "cli.chat.started",
        conversation_id = %state.conversation_id,
        "conversation started"
    );

    loop {
        stdout.write_all(b"> ").await?;
        stdout.flush().await?;

        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => None,
        };
        let Some(line) = line else {
            break;
        };
        let text = line.trim();
        if text.is_empty() {
            continue;
        }
        if EXIT_WORDS.iter().any(|word| word.eq_ignore_ascii_case(text)) {
            break;
        }

        turns += 1;
        let correlation_id = format!("{}-{turns}", state.conversation_id);
        let cancel = CancellationToken::new();
        let mut turn = Turn::new(&correlation_id, text).with_cancel(cancel.clone());
        if let Some(user) = &user {
            turn = turn.with_user(user);
        }

        let result = tokio::select! {
            result = conversation.handle_turn(&mut state, &turn) => Some(result),
            _ = tokio::signal::ctrl_c() => {
                cancel.cancel();
                None
            }
        };
        let Some(result) = result else {
            break;
        };

        let message = match result {
            Ok(reply) => reply.fallback_text(),
            Err(error) => {
                let interface = error.into_interface(&correlation_id);
                warn!(
                    event_name = "cli.chat.turn_failed",
                    correlation_id = %correlation_id,
                    error = %interface,
                    "turn failed"
                );
                interface.user_message().to_string()
            }
        };
        stdout.write_all(format!("{message}\n").as_bytes()).await?;
    }

    info!(
        event_name = "cli.chat.ended",
        conversation_id = %state.conversation_id,
        turns,
        "conversation ended"
    );
    Ok(turns)
}
