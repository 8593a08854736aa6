//! Speech-to-text: pluggable trait + factory.

use anyhow::Context;
use secrecy::{ExposeSecret, SecretString};
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_STT_MODEL: &str = "whisper-1";

/// Trait for speech-to-text backends.
///
/// Calls block; drive them from a blocking context.
pub trait Transcriber: Send + Sync {
    /// Transcribe audio from a WAV file path. An empty string is a valid result.
    fn transcribe(&self, wav_path: &Path) -> anyhow::Result<String>;
    /// Human-readable name for logs.
    fn name(&self) -> &str;
    /// False when recording would be pointless because nothing can transcribe it.
    fn is_available(&self) -> bool;
}

#[derive(Debug, Clone)]
pub struct SttConfig {
    /// Base URL of an OpenAI-compatible API, e.g. `https://api.openai.com/v1`.
    pub url: Option<String>,
    pub model: String,
    pub api_key: SecretString,
    pub timeout: Duration,
}

impl Default for SttConfig {
    fn default() -> Self {
        Self {
            url: None,
            model: DEFAULT_STT_MODEL.to_string(),
            api_key: SecretString::from(String::new()),
            timeout: Duration::from_secs(90),
        }
    }
}

/// Placeholder returned when no backend is configured or it failed to initialise.
///
/// The session stays alive; transcription attempts return a clear error and
/// capture goes straight to typed input.
pub struct PendingTranscriber {
    reason: String,
}

impl PendingTranscriber {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl Transcriber for PendingTranscriber {
    fn transcribe(&self, _wav_path: &Path) -> anyhow::Result<String> {
        anyhow::bail!("speech-to-text unavailable: {}", self.reason)
    }

    fn name(&self) -> &str {
        "pending"
    }

    fn is_available(&self) -> bool {
        false
    }
}

/// Multipart POST of the WAV file to `{url}/audio/transcriptions`.
///
/// The blocking client is built per call so that this value can be created
/// and dropped on an async runtime thread.
pub struct HttpTranscriber {
    endpoint: String,
    model: String,
    api_key: SecretString,
    timeout: Duration,
}

impl HttpTranscriber {
    pub fn new(url: &str, cfg: &SttConfig) -> Self {
        let endpoint = format!("{}/audio/transcriptions", url.trim_end_matches('/'));
        tracing::info!("HttpTranscriber: endpoint {endpoint}, model {}", cfg.model);
        Self {
            endpoint,
            model: cfg.model.clone(),
            api_key: cfg.api_key.clone(),
            timeout: cfg.timeout,
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[derive(serde::Deserialize)]
struct TranscriptionResponse {
    #[serde(default)]
    text: String,
}

impl Transcriber for HttpTranscriber {
    fn transcribe(&self, wav_path: &Path) -> anyhow::Result<String> {
        let wav_bytes = std::fs::read(wav_path)
            .with_context(|| format!("reading {}", wav_path.display()))?;
        let filename = wav_path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("answer.wav")
            .to_string();

        let part = reqwest::blocking::multipart::Part::bytes(wav_bytes)
            .file_name(filename)
            .mime_str("audio/wav")?;
        let form = reqwest::blocking::multipart::Form::new()
            .text("model", self.model.clone())
            .part("file", part);

        let client = reqwest::blocking::Client::builder()
            .timeout(self.timeout)
            .build()
            .context("building transcription HTTP client")?;
        let mut request = client.post(&self.endpoint).multipart(form);
        let key = self.api_key.expose_secret();
        if !key.is_empty() {
            request = request.bearer_auth(key);
        }

        let resp = request.send().context("sending audio for transcription")?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().unwrap_or_default();
            anyhow::bail!("transcription endpoint returned HTTP {status}: {body}");
        }
        let parsed: TranscriptionResponse = resp.json().context("decoding transcription")?;
        let text = parsed.text.trim().to_string();
        tracing::debug!("Transcription: {text:?}");
        Ok(text)
    }

    fn name(&self) -> &str {
        "HTTP transcription"
    }

    fn is_available(&self) -> bool {
        true
    }
}

/// Create the session's transcriber from config.
///
/// Never fails: returns a `PendingTranscriber` when no endpoint is configured.
pub fn create_transcriber(cfg: &SttConfig) -> Box<dyn Transcriber> {
    match cfg.url.as_deref().map(str::trim) {
        Some(url) if !url.is_empty() => Box::new(HttpTranscriber::new(url, cfg)),
        _ => {
            let reason = "no STT_URL configured";
            tracing::warn!("Speech-to-text unavailable: {reason}; answers will be typed");
            Box::new(PendingTranscriber::new(reason))
        }
    }
}
