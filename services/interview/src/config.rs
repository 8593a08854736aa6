//! Application Configuration Module
//!
//! Loads settings for the interview service from environment variables
//! (and a `.env` file, if present) into a single struct.

use interview_core::llm_client::{DEFAULT_BASE_URL, DEFAULT_MODEL};
use interview_core::stt::{DEFAULT_STT_MODEL, SttConfig};
use secrecy::SecretString;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::Level;

/// Environment variables checked, in order, for the LLM API key.
pub const API_KEY_VARS: [&str; 3] = ["LLM_API_KEY", "OPENROUTER_API_KEY", "OPENAI_API_KEY"];

/// Holds all configuration loaded from the environment.
#[derive(Debug, Clone)]
pub struct Config {
    pub llm_api_key: Option<SecretString>,
    pub llm_base_url: String,
    pub interviewer_model: String,
    pub coach_model: String,
    pub llm_timeout: Duration,
    pub llm_temperature: f32,
    pub stt_url: Option<String>,
    pub stt_model: String,
    pub stt_api_key: Option<SecretString>,
    pub sessions_dir: PathBuf,
    pub prompts_dir: PathBuf,
    pub max_recording: Duration,
    pub input_device: Option<String>,
    pub log_level: Level,
}

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingVar(String),
    #[error("Invalid log level provided for RUST_LOG: {0}")]
    InvalidLogLevel(String),
    #[error("Invalid value '{value}' for {var}")]
    InvalidNumber { var: &'static str, value: String },
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    // *   `LLM_API_KEY`: API key for the chat backend. Falls back to `OPENROUTER_API_KEY`, then `OPENAI_API_KEY`.
    // *   `LLM_BASE_URL`: (Optional) OpenAI-compatible base URL. Defaults to OpenRouter.
    // *   `INTERVIEWER_MODEL` / `COACH_MODEL`: (Optional) Model names for the two agents.
    // *   `LLM_TIMEOUT_SECS`, `LLM_TEMPERATURE`: (Optional) Request timeout and sampling temperature.
    // *   `STT_URL`, `STT_MODEL`, `STT_API_KEY`: (Optional) Speech-to-text endpoint. Without `STT_URL` answers are typed.
    // *   `SESSIONS_DIR`, `PROMPTS_DIR`: (Optional) Where session files are written and prompts are read.
    // *   `MAX_RECORDING_SECS`, `INPUT_DEVICE`: (Optional) Recording limit and microphone name.
    // *   `RUST_LOG`: (Optional) The logging level. Defaults to "INFO".
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file. This is useful for local development and is ignored if not present.
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let llm_api_key = API_KEY_VARS
            .iter()
            .find_map(|key| get(key))
            .map(SecretString::from);

        let log_level_str = get("RUST_LOG").unwrap_or_else(|| "INFO".to_string());
        let log_level = log_level_str
            .parse::<Level>()
            .map_err(|_| ConfigError::InvalidLogLevel(log_level_str))?;

        Ok(Self {
            llm_api_key,
            llm_base_url: get("LLM_BASE_URL").unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            interviewer_model: get("INTERVIEWER_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            coach_model: get("COACH_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            llm_timeout: Duration::from_secs(parse_or(&get, "LLM_TIMEOUT_SECS", 90)?),
            llm_temperature: parse_or(&get, "LLM_TEMPERATURE", 0.7)?,
            stt_url: get("STT_URL"),
            stt_model: get("STT_MODEL").unwrap_or_else(|| DEFAULT_STT_MODEL.to_string()),
            stt_api_key: get("STT_API_KEY").map(SecretString::from),
            sessions_dir: PathBuf::from(get("SESSIONS_DIR").unwrap_or_else(|| "sessions".to_string())),
            prompts_dir: PathBuf::from(get("PROMPTS_DIR").unwrap_or_else(|| "prompts".to_string())),
            max_recording: Duration::from_secs(parse_or(&get, "MAX_RECORDING_SECS", 90)?),
            input_device: get("INPUT_DEVICE"),
            log_level,
        })
    }

    /// The LLM key, required before any interview activity starts.
    pub fn require_llm_key(&self) -> Result<SecretString, ConfigError> {
        self.llm_api_key.clone().ok_or_else(|| {
            ConfigError::MissingVar(format!(
                "{} must be set to reach the LLM backend",
                API_KEY_VARS.join(" or ")
            ))
        })
    }

    pub fn stt_config(&self) -> SttConfig {
        SttConfig {
            url: self.stt_url.clone(),
            model: self.stt_model.clone(),
            api_key: self
                .stt_api_key
                .clone()
                .or_else(|| self.llm_api_key.clone())
                .unwrap_or_else(|| SecretString::from(String::new())),
            timeout: self.llm_timeout,
        }
    }
}

fn parse_or<T: FromStr>(
    get: &impl Fn(&str) -> Option<String>,
    var: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match get(var) {
        None => Ok(default),
        Some(value) => value
            .parse()
            .map_err(|_| ConfigError::InvalidNumber { var, value }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_unset() {
        let cfg = config(&[]).unwrap();
        assert!(cfg.llm_api_key.is_none());
        assert_eq!(cfg.llm_base_url, "https://openrouter.ai/api/v1");
        assert_eq!(cfg.interviewer_model, "meta-llama/llama-3.1-8b-instruct");
        assert_eq!(cfg.llm_timeout, Duration::from_secs(90));
        assert_eq!(cfg.max_recording, Duration::from_secs(90));
        assert_eq!(cfg.sessions_dir, PathBuf::from("sessions"));
        assert_eq!(cfg.log_level, Level::INFO);
        assert!(cfg.stt_url.is_none());
    }

    #[test]
    fn api_key_falls_back_in_order() {
        let cfg = config(&[("OPENAI_API_KEY", "sk-openai"), ("OPENROUTER_API_KEY", "sk-or")]).unwrap();
        assert_eq!(cfg.require_llm_key().unwrap().expose_secret(), "sk-or");

        let cfg = config(&[("LLM_API_KEY", "  "), ("OPENAI_API_KEY", "sk-openai")]).unwrap();
        assert_eq!(cfg.require_llm_key().unwrap().expose_secret(), "sk-openai");
    }

    #[test]
    fn missing_key_is_reported_with_variable_names() {
        let err = config(&[]).unwrap().require_llm_key().unwrap_err();
        assert!(err.to_string().contains("LLM_API_KEY"));
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert!(matches!(
            config(&[("RUST_LOG", "chatty")]),
            Err(ConfigError::InvalidLogLevel(_))
        ));
        assert!(matches!(
            config(&[("LLM_TIMEOUT_SECS", "soon")]),
            Err(ConfigError::InvalidNumber { var: "LLM_TIMEOUT_SECS", .. })
        ));
    }

    #[test]
    fn stt_key_defaults_to_llm_key() {
        let cfg = config(&[("LLM_API_KEY", "sk-llm"), ("STT_URL", "http://localhost:8000/v1")]).unwrap();
        let stt = cfg.stt_config();
        assert_eq!(stt.api_key.expose_secret(), "sk-llm");
        assert_eq!(stt.url.as_deref(), Some("http://localhost:8000/v1"));
        assert_eq!(stt.model, "whisper-1");
    }
}
