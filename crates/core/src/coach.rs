use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::conversation::QAEntry;
use crate::error::BackendError;
use crate::llm_client::ChatBackend;
use crate::profile::{CandidateProfile, FeedbackMode};

/// Output contract appended to the configured coach prompt.
pub const COACH_CONTRACT: &str = r#"Always respond as a single JSON object of the form
{"overall_summary": string, "dimension_scores": {string: number or string}, "strengths": [string], "improvement_areas": [string], "per_round_feedback": {string: string}, "inferred_technical_skills": [string], "sample_improved_answers": [{"question": string, "improved_answer": string}]}.
Do not include any explanatory text outside of the JSON.
Base all observations strictly on the question-answer pairs in qa_list. Do not invent questions, answers, rounds or topics that do not appear there.
The per_round_feedback object must only include keys for rounds that appear in the 'round' field of qa_list entries.
If qa_list is short, say the evaluation is limited rather than imagining missing parts."#;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImprovedAnswer {
    #[serde(default)]
    pub question: String,
    #[serde(default)]
    pub improved_answer: String,
}

/// A score for one dimension. Backends mostly send numbers but sometimes a
/// label such as "high"; both are kept as given.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Score {
    Number(f64),
    Text(String),
}

impl Score {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Score::Number(n) => Some(*n),
            Score::Text(_) => None,
        }
    }
}

impl fmt::Display for Score {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Score::Number(n) => write!(f, "{n}"),
            Score::Text(text) => f.write_str(text),
        }
    }
}

/// Structured end-of-interview review.
///
/// `overall_summary` is the one required field; every collection defaults
/// to empty. Anything else the backend returns is *malformed* and kept as
/// `CoachReport::Raw`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoachFeedback {
    pub overall_summary: String,
    #[serde(default)]
    pub dimension_scores: BTreeMap<String, Score>,
    #[serde(default)]
    pub strengths: Vec<String>,
    #[serde(default)]
    pub improvement_areas: Vec<String>,
    #[serde(default)]
    pub per_round_feedback: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inferred_technical_skills: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sample_improved_answers: Option<Vec<ImprovedAnswer>>,
}

impl CoachFeedback {
    /// Drops `per_round_feedback` keys for rounds that never happened and
    /// returns the dropped labels.
    pub fn retain_rounds(&mut self, rounds: &BTreeSet<&str>) -> Vec<String> {
        let mut dropped = Vec::new();
        self.per_round_feedback.retain(|round, _| {
            let keep = rounds.contains(round.as_str());
            if !keep {
                dropped.push(round.clone());
            }
            keep
        });
        dropped
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CoachReport {
    Raw { raw_feedback: String },
    Structured(CoachFeedback),
}

impl CoachReport {
    pub fn parse(raw: &str) -> Self {
        match serde_json::from_str::<CoachFeedback>(raw) {
            Ok(feedback) => CoachReport::Structured(feedback),
            Err(e) => {
                tracing::warn!("Coach output is not a valid feedback object ({e}); keeping raw text");
                CoachReport::Raw {
                    raw_feedback: raw.to_string(),
                }
            }
        }
    }

    pub fn structured(&self) -> Option<&CoachFeedback> {
        match self {
            CoachReport::Structured(feedback) => Some(feedback),
            CoachReport::Raw { .. } => None,
        }
    }

    pub fn summary(&self) -> &str {
        match self {
            CoachReport::Structured(feedback) => &feedback.overall_summary,
            CoachReport::Raw { raw_feedback } => raw_feedback,
        }
    }
}

#[derive(Serialize)]
struct CoachRequest<'a> {
    candidate_profile: &'a CandidateProfile,
    qa_list: &'a [QAEntry],
    feedback_mode: FeedbackMode,
}

/// Reviews a finished (or partial) interview. Stateless: the same `qa_list`
/// may be analyzed any number of times.
#[async_trait]
pub trait Coach: Send + Sync {
    async fn analyze(
        &self,
        profile: &CandidateProfile,
        qa_list: &[QAEntry],
        feedback_mode: FeedbackMode,
    ) -> Result<CoachReport, BackendError>;
}

pub struct CoachAgent<B: ChatBackend> {
    backend: B,
    system_prompt: String,
}

impl<B: ChatBackend> CoachAgent<B> {
    pub fn new(backend: B, prompt: &str) -> Self {
        Self {
            backend,
            system_prompt: format!("{}\n\n{}", prompt.trim_end(), COACH_CONTRACT),
        }
    }
}

#[async_trait]
impl<B: ChatBackend> Coach for CoachAgent<B> {
    async fn analyze(
        &self,
        profile: &CandidateProfile,
        qa_list: &[QAEntry],
        feedback_mode: FeedbackMode,
    ) -> Result<CoachReport, BackendError> {
        let request = CoachRequest {
            candidate_profile: profile,
            qa_list,
            feedback_mode,
        };
        let payload = serde_json::to_string(&request)
            .map_err(|e| BackendError::InvalidEnvelope(e.to_string()))?;

        let raw = self.backend.complete(&self.system_prompt, &payload).await?;
        let mut report = CoachReport::parse(&raw);

        if let CoachReport::Structured(feedback) = &mut report {
            let rounds: BTreeSet<&str> = qa_list.iter().map(|qa| qa.round.as_str()).collect();
            let dropped = feedback.retain_rounds(&rounds);
            if !dropped.is_empty() {
                tracing::warn!(?dropped, "Coach returned feedback for rounds that did not occur");
            }
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm_client::MockChatBackend;

    fn qa(turn: usize, round: &str) -> QAEntry {
        QAEntry {
            turn,
            round: round.to_string(),
            question: format!("Q{turn}"),
            answer_text: format!("A{turn}"),
            technical_evaluation: None,
        }
    }

    fn profile() -> CandidateProfile {
        CandidateProfile::new("Sam", "SDE", "mid", "startup")
    }

    const FEEDBACK: &str = r#"{
        "overall_summary": "Solid fundamentals.",
        "dimension_scores": {"communication": 7, "technical_depth": 6.5},
        "strengths": ["clear examples"],
        "improvement_areas": ["quantify impact"],
        "per_round_feedback": {"warmup": "Good start.", "system_design": "Never asked."},
        "sample_improved_answers": [{"question": "Q1", "improved_answer": "Better A1"}]
    }"#;

    #[tokio::test]
    async fn analyze_keeps_only_rounds_that_occurred() {
        let mut backend = MockChatBackend::new();
        backend
            .expect_complete()
            .withf(|_, payload| {
                let v: serde_json::Value = serde_json::from_str(payload).unwrap();
                v["feedback_mode"] == "strict" && v["qa_list"].as_array().unwrap().len() == 2
            })
            .returning(|_, _| Ok(FEEDBACK.to_string()));

        let coach = CoachAgent::new(backend, "You are a coach.");
        let history = vec![qa(1, "warmup"), qa(2, "technical")];
        let report = coach
            .analyze(&profile(), &history, FeedbackMode::Strict)
            .await
            .unwrap();

        let feedback = report.structured().unwrap();
        assert_eq!(feedback.overall_summary, "Solid fundamentals.");
        assert_eq!(feedback.dimension_scores["communication"], Score::Number(7.0));
        let rounds: Vec<&str> = feedback.per_round_feedback.keys().map(String::as_str).collect();
        assert_eq!(rounds, vec!["warmup"]);
        assert_eq!(feedback.sample_improved_answers.as_ref().unwrap()[0].improved_answer, "Better A1");
        assert!(feedback.inferred_technical_skills.is_none());
    }

    #[tokio::test]
    async fn analyze_degrades_malformed_output() {
        let mut backend = MockChatBackend::new();
        backend
            .expect_complete()
            .returning(|_, _| Ok("You did great overall!".to_string()));

        let coach = CoachAgent::new(backend, "prompt");
        let report = coach
            .analyze(&profile(), &[qa(1, "warmup")], FeedbackMode::Coaching)
            .await
            .unwrap();
        assert_eq!(
            serde_json::to_value(&report).unwrap(),
            serde_json::json!({"raw_feedback": "You did great overall!"})
        );
        assert_eq!(report.summary(), "You did great overall!");
    }

    #[test]
    fn parse_requires_summary_and_object_shape() {
        assert!(matches!(
            CoachReport::parse(r#"{"strengths": ["x"]}"#),
            CoachReport::Raw { .. }
        ));
        assert!(matches!(
            CoachReport::parse(r#"{"overall_summary": "ok", "dimension_scores": ["high"]}"#),
            CoachReport::Raw { .. }
        ));
        let report = CoachReport::parse(r#"{"overall_summary": "Short session."}"#);
        assert!(report.structured().unwrap().strengths.is_empty());
    }

    #[test]
    fn text_scores_keep_the_structured_review() {
        let raw = r#"{
            "overall_summary": "Promising.",
            "dimension_scores": {"depth": "high", "communication": 4},
            "strengths": ["clear structure"],
            "improvement_areas": ["pace"]
        }"#;
        let feedback = CoachReport::parse(raw).structured().cloned().unwrap();
        assert_eq!(feedback.dimension_scores["depth"], Score::Text("high".into()));
        assert_eq!(feedback.dimension_scores["depth"].as_f64(), None);
        assert_eq!(feedback.dimension_scores["communication"].as_f64(), Some(4.0));
        assert_eq!(feedback.dimension_scores["communication"].to_string(), "4");
        assert_eq!(feedback.strengths, vec!["clear structure"]);
        assert_eq!(feedback.improvement_areas, vec!["pace"]);
    }

    #[test]
    fn stored_reports_load_back_as_the_same_variant() {
        for report in [
            CoachReport::parse(FEEDBACK),
            CoachReport::Raw {
                raw_feedback: "plain text".into(),
            },
        ] {
            let json = serde_json::to_string(&report).unwrap();
            let back: CoachReport = serde_json::from_str(&json).unwrap();
            assert_eq!(back, report);
        }
    }
}
