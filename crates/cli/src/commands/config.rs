use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use parley_core::config::{resolve_config_path, AppConfig, LoadOptions};
use secrecy::ExposeSecret;
use toml::Value;

pub fn run(options: LoadOptions) -> String {
    let config_file_path = resolve_config_path(options.config_path.as_deref());
    let config = match AppConfig::load(options) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let sources = Sources {
        doc: load_config_file_doc(config_file_path.as_deref()),
        path: config_file_path,
    };

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];

    lines.push(render_line(
        "nlu.endpoint",
        &config.nlu.endpoint,
        sources.of("nlu.endpoint", &["PARLEY_NLU_ENDPOINT"]),
    ));
    lines.push(render_line(
        "nlu.app_id",
        if config.nlu.app_id.is_empty() { "<unset>" } else { config.nlu.app_id.as_str() },
        sources.of("nlu.app_id", &["PARLEY_NLU_APP_ID"]),
    ));

    let subscription_key = config
        .nlu
        .subscription_key
        .as_ref()
        .map(|key| redact_key(key.expose_secret()))
        .unwrap_or_else(|| "<unset>".to_string());
    lines.push(render_line(
        "nlu.subscription_key",
        &subscription_key,
        sources.of("nlu.subscription_key", &["PARLEY_NLU_SUBSCRIPTION_KEY"]),
    ));
    lines.push(render_line(
        "nlu.timeout_secs",
        &config.nlu.timeout_secs.to_string(),
        sources.of("nlu.timeout_secs", &["PARLEY_NLU_TIMEOUT_SECS"]),
    ));
    lines.push(render_line(
        "nlu.verbose",
        &config.nlu.verbose.to_string(),
        sources.of("nlu.verbose", &["PARLEY_NLU_VERBOSE"]),
    ));
    lines.push(render_line(
        "nlu.offline",
        &config.nlu.offline.to_string(),
        sources.of("nlu.offline", &["PARLEY_NLU_OFFLINE"]),
    ));

    lines.push(render_line(
        "conversation.max_clarification_attempts",
        &config.conversation.max_clarification_attempts.to_string(),
        sources.of(
            "conversation.max_clarification_attempts",
            &["PARLEY_CONVERSATION_MAX_CLARIFICATION_ATTEMPTS"],
        ),
    ));
    lines.push(render_line(
        "conversation.none_intent",
        &config.conversation.none_intent,
        sources.of("conversation.none_intent", &["PARLEY_CONVERSATION_NONE_INTENT"]),
    ));

    lines.push(render_line(
        "logging.level",
        &config.logging.level,
        sources.of("logging.level", &["PARLEY_LOGGING_LEVEL", "PARLEY_LOG_LEVEL"]),
    ));
    lines.push(render_line(
        "logging.format",
        &format!("{:?}", config.logging.format),
        sources.of("logging.format", &["PARLEY_LOGGING_FORMAT", "PARLEY_LOG_FORMAT"]),
    ));

    lines.join("\n")
}

struct Sources {
    doc: Option<Value>,
    path: Option<PathBuf>,
}

impl Sources {
    fn of(&self, key_path: &str, env_keys: &[&str]) -> String {
        field_source(key_path, env_keys, self.doc.as_ref(), self.path.as_deref())
    }
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_keys: &[&str],
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_keys.iter().find(|key| env::var_os(key).is_some()) {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}

/// Keeps the last four characters so operators can tell keys apart.
fn redact_key(key: &str) -> String {
    let trimmed = key.trim();
    if trimmed.is_empty() {
        return "<empty>".to_string();
    }

    let visible = trimmed.len().saturating_sub(4);
    match trimmed.get(visible..) {
        Some(suffix) if visible > 0 => format!("***{suffix}"),
        _ => "<redacted>".to_string(),
    }
}
