use std::path::PathBuf;

use crate::session_state::InterviewPhase;

/// Failures talking to the interviewer, coach or evaluator backend.
///
/// None of these are recovered locally: without the backend no question can
/// be asked, so they are surfaced straight to the driving surface.
/// Malformed *content* is not an error; the adapters degrade it instead.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("No API key configured for the LLM backend")]
    MissingCredential,
    #[error("LLM backend rejected the credentials (HTTP {status})")]
    Unauthorized { status: u16 },
    #[error("LLM backend is unreachable: {0}")]
    Unavailable(String),
    #[error("LLM backend did not answer within the configured timeout")]
    Timeout,
    #[error("LLM backend returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("LLM backend returned no completion")]
    EmptyCompletion,
    #[error("LLM backend returned an unreadable completion envelope: {0}")]
    InvalidEnvelope(String),
}

impl From<reqwest::Error> for BackendError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            BackendError::Timeout
        } else if let Some(status) = e.status() {
            match status.as_u16() {
                401 | 403 => BackendError::Unauthorized {
                    status: status.as_u16(),
                },
                code => BackendError::Status {
                    status: code,
                    body: e.to_string(),
                },
            }
        } else {
            BackendError::Unavailable(e.to_string())
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("Session file I/O failed for {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to serialize session record: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("Session file {} is not a valid session record: {source}", path.display())]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Errors reported by the turn controller to the driving surface.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error(transparent)]
    Backend(#[from] BackendError),
    /// The in-memory record is intact; calling `persist` again may succeed.
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
    #[error("Cannot {operation} while the interview is in the {phase:?} phase")]
    InvalidTransition {
        operation: &'static str,
        phase: InterviewPhase,
    },
    #[error("No answers have been recorded yet, there is nothing to review")]
    NothingToReview,
    #[error("No committed answer to attach a technical evaluation to")]
    NoAnswerToEvaluate,
}
