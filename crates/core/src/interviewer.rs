use async_trait::async_trait;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeSet;

use crate::conversation::ConversationState;
use crate::error::BackendError;
use crate::llm_client::ChatBackend;
use crate::profile::CandidateProfile;
use crate::technical;

pub const UNKNOWN_ROUND: &str = "unknown";
pub const GENERIC_QUESTION_TYPE: &str = "generic";
pub const FALLBACK_QUESTION_TEXT: &str = "Please answer this question.";

/// Output contract appended to the configured interviewer prompt.
pub const INTERVIEWER_CONTRACT: &str = r#"Always respond as a single JSON object of the form
{"persona": string or null, "next_round": string, "next_question": {"question_type": string, "skill_tags": [string], "text": string}, "end_interview": boolean}.
Do not include any explanatory text outside of the JSON.
Use the provided conversation_state.qa_list to understand what has already been asked and how the candidate answered. Do not repeat questions that have already been asked."#;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NextQuestion {
    #[serde(default = "generic_question_type", deserialize_with = "null_as_generic_type")]
    pub question_type: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub skill_tags: BTreeSet<String>,
    #[serde(default = "fallback_question_text", deserialize_with = "null_as_fallback_text")]
    pub text: String,
}

impl Default for NextQuestion {
    fn default() -> Self {
        Self {
            question_type: generic_question_type(),
            skill_tags: BTreeSet::new(),
            text: fallback_question_text(),
        }
    }
}

impl NextQuestion {
    pub fn is_coding(&self) -> bool {
        technical::is_coding_question(&self.question_type, &self.skill_tags)
    }
}

/// One reply of the interviewer backend.
///
/// Missing fields take explicit defaults (`persona` none, `next_round`
/// "unknown", `end_interview` false, question text "Please answer this
/// question."). Output that is not a JSON object of this shape is
/// *malformed* and becomes `InterviewerResponse::degraded`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterviewerResponse {
    #[serde(default)]
    pub persona: Option<String>,
    #[serde(default = "unknown_round", deserialize_with = "null_as_unknown_round")]
    pub next_round: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub next_question: NextQuestion,
    #[serde(default, deserialize_with = "null_as_default")]
    pub end_interview: bool,
}

impl InterviewerResponse {
    /// Placeholder carrying the raw backend output as the question text.
    pub fn degraded(raw: &str) -> Self {
        Self {
            persona: None,
            next_round: unknown_round(),
            next_question: NextQuestion {
                question_type: generic_question_type(),
                skill_tags: BTreeSet::new(),
                text: raw.to_string(),
            },
            end_interview: false,
        }
    }

    pub fn parse(raw: &str) -> Self {
        match serde_json::from_str::<InterviewerResponse>(raw) {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!("Interviewer output is not a valid response object ({e}); using raw text as the question");
                Self::degraded(raw)
            }
        }
    }
}

fn unknown_round() -> String {
    UNKNOWN_ROUND.to_string()
}

fn generic_question_type() -> String {
    GENERIC_QUESTION_TYPE.to_string()
}

fn fallback_question_text() -> String {
    FALLBACK_QUESTION_TEXT.to_string()
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

// `null` for a string field is treated like a missing field and gets that
// field's own default.
fn null_as_unknown_round<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_else(unknown_round))
}

fn null_as_generic_type<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_else(generic_question_type))
}

fn null_as_fallback_text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_else(fallback_question_text))
}

#[derive(Serialize)]
struct InterviewerRequest<'a> {
    candidate_profile: &'a CandidateProfile,
    conversation_state: ConversationState<'a>,
    latest_answer: &'a str,
}

/// Produces the next question given the profile and everything asked so far.
///
/// Implementations hold no conversation memory of their own; continuity comes
/// entirely from the `state` the caller passes in.
#[async_trait]
pub trait Interviewer: Send + Sync {
    async fn ask_next(
        &self,
        profile: &CandidateProfile,
        state: ConversationState<'_>,
        latest_answer: &str,
    ) -> Result<InterviewerResponse, BackendError>;
}

pub struct InterviewerAgent<B: ChatBackend> {
    backend: B,
    system_prompt: String,
}

impl<B: ChatBackend> InterviewerAgent<B> {
    pub fn new(backend: B, prompt: &str) -> Self {
        Self {
            backend,
            system_prompt: format!("{}\n\n{}", prompt.trim_end(), INTERVIEWER_CONTRACT),
        }
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }
}

#[async_trait]
impl<B: ChatBackend> Interviewer for InterviewerAgent<B> {
    async fn ask_next(
        &self,
        profile: &CandidateProfile,
        state: ConversationState<'_>,
        latest_answer: &str,
    ) -> Result<InterviewerResponse, BackendError> {
        let request = InterviewerRequest {
            candidate_profile: profile,
            conversation_state: state,
            latest_answer,
        };
        // Serializing plain strings and derived structs cannot fail.
        let payload = serde_json::to_string(&request)
            .map_err(|e| BackendError::InvalidEnvelope(e.to_string()))?;

        let raw = self.backend.complete(&self.system_prompt, &payload).await?;
        let response = InterviewerResponse::parse(&raw);
        tracing::debug!(
            round = %response.next_round,
            question_type = %response.next_question.question_type,
            end_interview = response.end_interview,
            "Interviewer replied"
        );
        Ok(response)
    }
}
