//! Verdicts on typed coding answers.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::LazyLock;

use crate::error::BackendError;
use crate::llm_client::ChatBackend;
use crate::profile::CandidateProfile;

const CODING_QUESTION_TYPES: &[&str] = &["technical", "coding", "dsa", "sql"];
const CODING_SKILL_TAGS: &[&str] = &["dsa", "coding", "algorithm", "sql", "sql_query", "query"];

static CODE_FENCE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?is)```(?:python)?\s*(.*?)```").ok());

pub const EVALUATOR_CONTRACT: &str = r#"Always respond as a single JSON object of the form
{"short_verdict": string, "is_correct": boolean, "issues": [string], "suggestions": [string]}.
Do not include any explanatory text outside of the JSON."#;

/// Whether a question should be answered with typed code rather than speech.
pub fn is_coding_question(question_type: &str, skill_tags: &BTreeSet<String>) -> bool {
    let question_type = question_type.trim().to_lowercase();
    CODING_QUESTION_TYPES.contains(&question_type.as_str())
        || skill_tags
            .iter()
            .any(|tag| CODING_SKILL_TAGS.contains(&tag.trim().to_lowercase().as_str()))
}

/// First fenced code block in `text`, without the fences. Empty when there is none.
pub fn extract_first_code_block(text: &str) -> String {
    CODE_FENCE
        .as_ref()
        .and_then(|re| re.captures(text))
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim_matches('\n').to_string())
        .unwrap_or_default()
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TechnicalVerdict {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub short_verdict: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_correct: Option<bool>,
    #[serde(default)]
    pub issues: Vec<String>,
    #[serde(default)]
    pub suggestions: Vec<String>,
    /// Any further fields the evaluator chose to include.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TechnicalEvaluation {
    Raw { raw_evaluation: String },
    Verdict(TechnicalVerdict),
}

impl TechnicalEvaluation {
    pub fn parse(raw: &str) -> Self {
        match serde_json::from_str::<TechnicalVerdict>(raw) {
            Ok(verdict) => TechnicalEvaluation::Verdict(verdict),
            Err(e) => {
                tracing::warn!("Technical evaluation is not a valid verdict object ({e}); keeping raw text");
                TechnicalEvaluation::Raw {
                    raw_evaluation: raw.to_string(),
                }
            }
        }
    }

    pub fn short_verdict(&self) -> Option<&str> {
        match self {
            TechnicalEvaluation::Verdict(v) => v.short_verdict.as_deref(),
            TechnicalEvaluation::Raw { .. } => None,
        }
    }
}

#[derive(Serialize)]
struct EvaluationRequest<'a> {
    candidate_profile: &'a CandidateProfile,
    question: &'a str,
    answer: &'a str,
    question_type: &'a str,
    skill_tags: &'a BTreeSet<String>,
}

pub struct TechnicalEvaluator<B: ChatBackend> {
    backend: B,
    system_prompt: String,
}

impl<B: ChatBackend> TechnicalEvaluator<B> {
    pub fn new(backend: B, prompt: &str) -> Self {
        Self {
            backend,
            system_prompt: format!("{}\n\n{}", prompt.trim_end(), EVALUATOR_CONTRACT),
        }
    }

    pub async fn evaluate(
        &self,
        profile: &CandidateProfile,
        question: &str,
        answer: &str,
        question_type: &str,
        skill_tags: &BTreeSet<String>,
    ) -> Result<TechnicalEvaluation, BackendError> {
        let request = EvaluationRequest {
            candidate_profile: profile,
            question,
            answer,
            question_type,
            skill_tags,
        };
        let payload = serde_json::to_string(&request)
            .map_err(|e| BackendError::InvalidEnvelope(e.to_string()))?;

        let raw = self.backend.complete(&self.system_prompt, &payload).await?;
        Ok(TechnicalEvaluation::parse(&raw))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm_client::MockChatBackend;

    fn tags(list: &[&str]) -> BTreeSet<String> {
        list.iter().map(|t| t.to_string()).collect()
    }

    #[test]
    fn coding_questions_by_type_or_tag() {
        assert!(is_coding_question("Coding", &tags(&[])));
        assert!(is_coding_question("SQL", &tags(&[])));
        assert!(is_coding_question("behavioral", &tags(&["communication", "Algorithm"])));
        assert!(!is_coding_question("generic", &tags(&["leadership"])));
        assert!(!is_coding_question("system_design", &tags(&[])));
    }

    #[test]
    fn extracts_first_fenced_block() {
        let text = "Fix this:\n```python\ndef add(a, b):\n    return a - b\n```\nand then ```sql\nSELECT 1;\n```";
        assert_eq!(extract_first_code_block(text), "def add(a, b):\n    return a - b");
        assert_eq!(extract_first_code_block("no code here"), "");
        assert_eq!(extract_first_code_block(""), "");
    }

    #[test]
    fn parse_keeps_verdict_and_extra_fields() {
        let raw = r#"{"short_verdict":"Off by one","is_correct":false,"issues":["loop bound"],"complexity":"O(n)"}"#;
        let eval = TechnicalEvaluation::parse(raw);
        assert_eq!(eval.short_verdict(), Some("Off by one"));
        let TechnicalEvaluation::Verdict(v) = &eval else {
            panic!("expected a verdict");
        };
        assert_eq!(v.is_correct, Some(false));
        assert!(v.suggestions.is_empty());
        assert_eq!(v.extra["complexity"], "O(n)");

        // Round-trips through the session file unchanged.
        let json = serde_json::to_string(&eval).unwrap();
        let back: TechnicalEvaluation = serde_json::from_str(&json).unwrap();
        assert_eq!(back, eval);
    }

    #[test]
    fn parse_degrades_to_raw_text() {
        let eval = TechnicalEvaluation::parse("Looks fine to me!");
        assert_eq!(
            eval,
            TechnicalEvaluation::Raw {
                raw_evaluation: "Looks fine to me!".to_string()
            }
        );
        assert_eq!(
            serde_json::to_value(&eval).unwrap(),
            serde_json::json!({"raw_evaluation": "Looks fine to me!"})
        );
    }

    #[tokio::test]
    async fn evaluate_sends_question_and_answer() {
        let mut backend = MockChatBackend::new();
        backend
            .expect_complete()
            .withf(|_, payload| {
                let v: serde_json::Value = serde_json::from_str(payload).unwrap();
                v["question"] == "Reverse a list"
                    && v["answer"] == "return xs[::-1]"
                    && v["skill_tags"][0] == "dsa"
            })
            .returning(|_, _| Ok(r#"{"short_verdict":"Correct","is_correct":true}"#.to_string()));

        let evaluator = TechnicalEvaluator::new(backend, "You review code.");
        let profile = CandidateProfile::new("Sam", "SDE", "mid", "startup");
        let eval = evaluator
            .evaluate(&profile, "Reverse a list", "return xs[::-1]", "coding", &tags(&["dsa"]))
            .await
            .unwrap();
        assert_eq!(eval.short_verdict(), Some("Correct"));
    }
}
