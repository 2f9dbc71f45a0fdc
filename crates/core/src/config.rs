use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::nlu::NONE_INTENT;

pub const DEFAULT_CONFIG_FILES: [&str; 2] = ["parley.toml", "config/parley.toml"];

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub nlu: NluConfig,
    pub conversation: ConversationConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct NluConfig {
    pub endpoint: String,
    pub app_id: String,
    pub subscription_key: Option<SecretString>,
    pub timeout_secs: u64,
    /// Ask the oracle for every scored intent, not just the top one.
    pub verbose: bool,
    /// Use the built-in keyword oracle instead of the HTTP endpoint.
    pub offline: bool,
}

#[derive(Clone, Debug)]
pub struct ConversationConfig {
    pub max_clarification_attempts: u32,
    pub none_intent: String,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub log_level: Option<String>,
    pub log_format: Option<LogFormat>,
    pub nlu_endpoint: Option<String>,
    pub nlu_app_id: Option<String>,
    pub nlu_subscription_key: Option<String>,
    pub nlu_offline: Option<bool>,
    pub max_clarification_attempts: Option<u32>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            nlu: NluConfig {
                endpoint: "https://westus.api.cognitive.microsoft.com/luis/v2.0/apps".to_string(),
                app_id: String::new(),
                subscription_key: None,
                timeout_secs: 30,
                verbose: true,
                offline: true,
            },
            conversation: ConversationConfig {
                max_clarification_attempts: 3,
                none_intent: NONE_INTENT.to_string(),
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected =
                options.config_path.unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILES[0]));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(nlu) = patch.nlu {
            if let Some(endpoint) = nlu.endpoint {
                self.nlu.endpoint = endpoint;
            }
            if let Some(app_id) = nlu.app_id {
                self.nlu.app_id = app_id;
            }
            if let Some(subscription_key) = nlu.subscription_key {
                self.nlu.subscription_key = Some(secret_value(subscription_key));
            }
            if let Some(timeout_secs) = nlu.timeout_secs {
                self.nlu.timeout_secs = timeout_secs;
            }
            if let Some(verbose) = nlu.verbose {
                self.nlu.verbose = verbose;
            }
            if let Some(offline) = nlu.offline {
                self.nlu.offline = offline;
            }
        }

        if let Some(conversation) = patch.conversation {
            if let Some(attempts) = conversation.max_clarification_attempts {
                self.conversation.max_clarification_attempts = attempts;
            }
            if let Some(none_intent) = conversation.none_intent {
                self.conversation.none_intent = none_intent;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("PARLEY_NLU_ENDPOINT") {
            self.nlu.endpoint = value;
        }
        if let Some(value) = read_env("PARLEY_NLU_APP_ID") {
            self.nlu.app_id = value;
        }
        if let Some(value) = read_env("PARLEY_NLU_SUBSCRIPTION_KEY") {
            self.nlu.subscription_key = Some(secret_value(value));
        }
        if let Some(value) = read_env("PARLEY_NLU_TIMEOUT_SECS") {
            self.nlu.timeout_secs = parse_u64("PARLEY_NLU_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = read_env("PARLEY_NLU_VERBOSE") {
            self.nlu.verbose = parse_bool("PARLEY_NLU_VERBOSE", &value)?;
        }
        if let Some(value) = read_env("PARLEY_NLU_OFFLINE") {
            self.nlu.offline = parse_bool("PARLEY_NLU_OFFLINE", &value)?;
        }

        if let Some(value) = read_env("PARLEY_CONVERSATION_MAX_CLARIFICATION_ATTEMPTS") {
            self.conversation.max_clarification_attempts =
                parse_u32("PARLEY_CONVERSATION_MAX_CLARIFICATION_ATTEMPTS", &value)?;
        }
        if let Some(value) = read_env("PARLEY_CONVERSATION_NONE_INTENT") {
            self.conversation.none_intent = value;
        }

        let log_level = read_env("PARLEY_LOGGING_LEVEL").or_else(|| read_env("PARLEY_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("PARLEY_LOGGING_FORMAT").or_else(|| read_env("PARLEY_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(log_format) = overrides.log_format {
            self.logging.format = log_format;
        }
        if let Some(endpoint) = overrides.nlu_endpoint {
            self.nlu.endpoint = endpoint;
        }
        if let Some(app_id) = overrides.nlu_app_id {
            self.nlu.app_id = app_id;
        }
        if let Some(subscription_key) = overrides.nlu_subscription_key {
            self.nlu.subscription_key = Some(secret_value(subscription_key));
        }
        if let Some(offline) = overrides.nlu_offline {
            self.nlu.offline = offline;
        }
        if let Some(attempts) = overrides.max_clarification_attempts {
            self.conversation.max_clarification_attempts = attempts;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_nlu(&self.nlu)?;
        validate_conversation(&self.conversation)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

pub fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    DEFAULT_CONFIG_FILES.into_iter().map(PathBuf::from).find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_nlu(nlu: &NluConfig) -> Result<(), ConfigError> {
    if nlu.timeout_secs == 0 || nlu.timeout_secs > 300 {
        return Err(ConfigError::Validation("nlu.timeout_secs must be in range 1..=300".to_string()));
    }

    let endpoint = nlu.endpoint.trim();
    if !endpoint.starts_with("http://") && !endpoint.starts_with("https://") {
        return Err(ConfigError::Validation(
            "nlu.endpoint must start with http:// or https://".to_string(),
        ));
    }

    if nlu.offline {
        return Ok(());
    }

    if nlu.app_id.trim().is_empty() {
        return Err(ConfigError::Validation(
            "nlu.app_id is required unless nlu.offline is true".to_string(),
        ));
    }

    let missing_key = nlu
        .subscription_key
        .as_ref()
        .map(|value| value.expose_secret().trim().is_empty())
        .unwrap_or(true);
    if missing_key {
        return Err(ConfigError::Validation(
            "nlu.subscription_key is required unless nlu.offline is true".to_string(),
        ));
    }

    Ok(())
}

fn validate_conversation(conversation: &ConversationConfig) -> Result<(), ConfigError> {
    if !(1..=10).contains(&conversation.max_clarification_attempts) {
        return Err(ConfigError::Validation(
            "conversation.max_clarification_attempts must be in range 1..=10".to_string(),
        ));
    }

    if conversation.none_intent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "conversation.none_intent must not be empty".to_string(),
        ));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.parse::<u32>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    value.trim().to_ascii_lowercase().parse::<bool>().map_err(|_| {
        ConfigError::InvalidEnvOverride { key: key.to_string(), value: value.to_string() }
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    nlu: Option<NluPatch>,
    conversation: Option<ConversationPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct NluPatch {
    endpoint: Option<String>,
    app_id: Option<String>,
    subscription_key: Option<String>,
    timeout_secs: Option<u64>,
    verbose: Option<bool>,
    offline: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
struct ConversationPatch {
    max_clarification_attempts: Option<u32>,
    none_intent: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
