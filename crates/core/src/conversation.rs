//! The accumulated interview log and the persisted session aggregate.
//!
//! `SessionRecord` owns the one and only `qa_list`. The interviewer sees it
//! through a borrowed `ConversationState`, so what the backend is shown and
//! what gets written to disk are always the same sequence.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::coach::CoachReport;
use crate::profile::{CandidateProfile, FeedbackMode};
use crate::technical::TechnicalEvaluation;

/// Timestamp layout shared by `created_at_utc` and session file names.
pub const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// One committed question/answer turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QAEntry {
    pub turn: usize,
    pub round: String,
    pub question: String,
    pub answer_text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub technical_evaluation: Option<TechnicalEvaluation>,
}

/// The history handed back to the interviewer on every turn.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct ConversationState<'a> {
    pub qa_list: &'a [QAEntry],
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    candidate_profile: CandidateProfile,
    feedback_mode: FeedbackMode,
    qa_list: Vec<QAEntry>,
    interviewer_persona: Option<String>,
    created_at_utc: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    coach_feedback: Option<CoachReport>,
}

impl SessionRecord {
    pub fn new(
        candidate_profile: CandidateProfile,
        feedback_mode: FeedbackMode,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            candidate_profile,
            feedback_mode,
            qa_list: Vec::new(),
            interviewer_persona: None,
            created_at_utc: created_at.format(TIMESTAMP_FORMAT).to_string(),
            coach_feedback: None,
        }
    }

    pub fn candidate_profile(&self) -> &CandidateProfile {
        &self.candidate_profile
    }

    pub fn feedback_mode(&self) -> FeedbackMode {
        self.feedback_mode
    }

    pub fn qa_list(&self) -> &[QAEntry] {
        &self.qa_list
    }

    pub fn interviewer_persona(&self) -> Option<&str> {
        self.interviewer_persona.as_deref()
    }

    pub fn created_at_utc(&self) -> &str {
        &self.created_at_utc
    }

    pub fn coach_feedback(&self) -> Option<&CoachReport> {
        self.coach_feedback.as_ref()
    }

    pub fn conversation_state(&self) -> ConversationState<'_> {
        ConversationState {
            qa_list: &self.qa_list,
        }
    }

    /// Distinct round labels that actually occurred.
    pub fn rounds(&self) -> BTreeSet<&str> {
        self.qa_list.iter().map(|qa| qa.round.as_str()).collect()
    }

    /// Appends a turn. The turn number is always `len + 1` at commit time.
    pub(crate) fn append_answer(
        &mut self,
        round: impl Into<String>,
        question: impl Into<String>,
        answer_text: impl Into<String>,
    ) -> &QAEntry {
        let entry = QAEntry {
            turn: self.qa_list.len() + 1,
            round: round.into(),
            question: question.into(),
            answer_text: answer_text.into(),
            technical_evaluation: None,
        };
        self.qa_list.push(entry);
        &self.qa_list[self.qa_list.len() - 1]
    }

    /// First non-blank persona wins; returns it only when it was adopted now.
    pub(crate) fn adopt_persona(&mut self, persona: Option<&str>) -> Option<&str> {
        if self.interviewer_persona.is_some() {
            return None;
        }
        let persona = persona.map(str::trim).filter(|p| !p.is_empty())?;
        self.interviewer_persona = Some(persona.to_string());
        self.interviewer_persona.as_deref()
    }

    pub(crate) fn last_entry_mut(&mut self) -> Option<&mut QAEntry> {
        self.qa_list.last_mut()
    }

    pub(crate) fn set_coach_feedback(&mut self, feedback: CoachReport) {
        self.coach_feedback = Some(feedback);
    }
}
