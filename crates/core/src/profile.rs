use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Who is being interviewed and for what. Fixed for the whole session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateProfile {
    pub user_name: String,
    pub target_role: String,
    pub experience_level: String,
    pub company_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_description: Option<String>,
}

impl CandidateProfile {
    pub fn new(
        user_name: impl Into<String>,
        target_role: impl Into<String>,
        experience_level: impl Into<String>,
        company_type: impl Into<String>,
    ) -> Self {
        Self {
            user_name: user_name.into(),
            target_role: target_role.into(),
            experience_level: experience_level.into(),
            company_type: company_type.into(),
            job_description: None,
        }
    }

    /// Attaches a job description; blank text is treated as absent.
    pub fn with_job_description(mut self, job_description: impl Into<String>) -> Self {
        let jd = job_description.into();
        let jd = jd.trim();
        self.job_description = if jd.is_empty() {
            None
        } else {
            Some(jd.to_string())
        };
        self
    }

    /// File-name-safe form of the candidate name.
    ///
    /// ASCII alphanumerics, `-` and `_` are kept, everything else becomes `_`.
    /// An empty name yields `candidate`.
    pub fn file_stem(&self) -> String {
        let safe: String = self
            .user_name
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        if safe.is_empty() {
            "candidate".to_string()
        } else {
            safe
        }
    }
}

/// Tone the coach should use for the final review.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedbackMode {
    #[default]
    Coaching,
    Strict,
}

#[derive(Debug, thiserror::Error)]
#[error("Unknown feedback mode '{0}', expected 'coaching' or 'strict'")]
pub struct ParseFeedbackModeError(String);

impl FromStr for FeedbackMode {
    type Err = ParseFeedbackModeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "" | "coaching" => Ok(FeedbackMode::Coaching),
            "strict" => Ok(FeedbackMode::Strict),
            other => Err(ParseFeedbackModeError(other.to_string())),
        }
    }
}

impl fmt::Display for FeedbackMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FeedbackMode::Coaching => f.write_str("coaching"),
            FeedbackMode::Strict => f.write_str("strict"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_stem_replaces_unsafe_characters() {
        let profile = CandidateProfile::new("Sam O'Neil", "SDE", "mid", "startup");
        assert_eq!(profile.file_stem(), "Sam_O_Neil");

        let profile = CandidateProfile::new("ana-maria_2", "SDE", "mid", "startup");
        assert_eq!(profile.file_stem(), "ana-maria_2");
    }

    #[test]
    fn file_stem_defaults_for_empty_name() {
        let profile = CandidateProfile::new("", "SDE", "mid", "startup");
        assert_eq!(profile.file_stem(), "candidate");
    }

    #[test]
    fn blank_job_description_is_dropped() {
        let profile = CandidateProfile::new("Sam", "SDE", "mid", "startup").with_job_description("   ");
        assert!(profile.job_description.is_none());

        let json = serde_json::to_value(&profile).unwrap();
        assert!(json.get("job_description").is_none());
    }

    #[test]
    fn feedback_mode_parses_and_defaults() {
        assert_eq!("".parse::<FeedbackMode>().unwrap(), FeedbackMode::Coaching);
        assert_eq!("STRICT".parse::<FeedbackMode>().unwrap(), FeedbackMode::Strict);
        assert!("harsh".parse::<FeedbackMode>().is_err());
        assert_eq!(
            serde_json::to_string(&FeedbackMode::Strict).unwrap(),
            "\"strict\""
        );
    }
}
