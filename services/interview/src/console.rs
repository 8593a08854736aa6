//! Terminal front end: typed input, the profile questionnaire and the
//! plain-text rendering of questions, feedback and saved sessions.

use anyhow::{Context, Result, bail};
use interview_core::capture::TypedInput;
use interview_core::coach::CoachReport;
use interview_core::conversation::SessionRecord;
use interview_core::interviewer::NextQuestion;
use interview_core::profile::{CandidateProfile, FeedbackMode};
use interview_core::technical::TechnicalEvaluation;
use std::fmt::Write as _;
use std::io::{self, BufRead, Write};

/// Line that terminates a multi-line code answer.
pub const BLOCK_TERMINATOR: &str = "END";

/// Text-to-speech seam. The console implementation just prints.
pub trait Speaker {
    fn speak(&mut self, text: &str);
}

pub struct ConsoleSpeaker {
    label: String,
}

impl ConsoleSpeaker {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
        }
    }

    pub fn set_label(&mut self, label: impl Into<String>) {
        self.label = label.into();
    }
}

impl Speaker for ConsoleSpeaker {
    fn speak(&mut self, text: &str) {
        println!("\n{}: {}\n", self.label, text);
    }
}

/// Typed answers from stdin. Stdin is locked per call, so several of these
/// can coexist with other readers in the same process.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdinInput;

impl TypedInput for StdinInput {
    fn read_line(&mut self, prompt: &str) -> Result<String> {
        print_prompt(prompt)?;
        read_line_from(&mut io::stdin().lock())
    }

    fn read_block(&mut self, prompt: &str, seed: &str) -> Result<String> {
        if !seed.trim().is_empty() {
            println!("Starter code:\n{seed}\n");
        }
        println!("{prompt}");
        read_block_from(&mut io::stdin().lock())
    }
}

fn print_prompt(prompt: &str) -> Result<()> {
    let mut stdout = io::stdout().lock();
    write!(stdout, "{prompt}")?;
    stdout.flush().context("Failed to flush stdout")
}

/// One line without its terminator. End of input is an error.
pub fn read_line_from<R: BufRead>(reader: &mut R) -> Result<String> {
    let mut line = String::new();
    if reader.read_line(&mut line).context("Failed to read input")? == 0 {
        bail!("Input closed");
    }
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

/// Lines up to (not including) a line holding only `END`. End of input also
/// finishes the block, unless nothing at all was read.
pub fn read_block_from<R: BufRead>(reader: &mut R) -> Result<String> {
    let mut lines = Vec::new();
    loop {
        let mut line = String::new();
        if reader.read_line(&mut line).context("Failed to read input")? == 0 {
            if lines.is_empty() {
                bail!("Input closed");
            }
            break;
        }
        let line = line.trim_end_matches(['\r', '\n']);
        if line.trim() == BLOCK_TERMINATOR {
            break;
        }
        lines.push(line.to_string());
    }
    Ok(lines.join("\n"))
}

/// Asks for the candidate profile, and for the feedback mode unless one was
/// already chosen on the command line.
pub fn read_profile(
    input: &mut dyn TypedInput,
    feedback_mode: Option<FeedbackMode>,
) -> Result<(CandidateProfile, FeedbackMode)> {
    let name = input.read_line("Your name [anonymous]: ")?;
    let name = match name.trim() {
        "" => "anonymous",
        n => n,
    };
    let role = input.read_line("Target role (e.g. Backend Engineer): ")?;
    let level = input.read_line("Experience level (e.g. junior, mid, senior): ")?;
    let company = input.read_line("Company type (e.g. startup, FAANG, consultancy): ")?;
    let jd = input.read_line("Job description (optional, single line): ")?;

    let profile = CandidateProfile::new(name, role.trim(), level.trim(), company.trim())
        .with_job_description(jd);

    let mode = match feedback_mode {
        Some(mode) => mode,
        None => loop {
            let answer = input.read_line("Feedback mode, coaching or strict [coaching]: ")?;
            match answer.parse::<FeedbackMode>() {
                Ok(mode) => break mode,
                Err(e) => println!("{e}"),
            }
        },
    };
    tracing::debug!(?profile, %mode, "Profile collected");
    Ok((profile, mode))
}

/// `true` to go on, `false` when the candidate types `q` or `quit`.
pub fn confirm(input: &mut dyn TypedInput, prompt: &str) -> Result<bool> {
    let answer = input.read_line(prompt)?;
    Ok(!matches!(
        answer.trim().to_lowercase().as_str(),
        "q" | "quit"
    ))
}

pub fn render_question(turn: usize, round: &str, question: &NextQuestion) -> String {
    let mut out = format!("[Question {turn} | {round}]");
    if !question.skill_tags.is_empty() {
        let tags: Vec<&str> = question.skill_tags.iter().map(String::as_str).collect();
        let _ = write!(out, " ({})", tags.join(", "));
    }
    let _ = write!(out, "\n{}", question.text);
    out
}

pub fn render_evaluation(evaluation: &TechnicalEvaluation) -> String {
    match evaluation {
        TechnicalEvaluation::Raw { raw_evaluation } => {
            format!("Evaluator notes:\n{raw_evaluation}")
        }
        TechnicalEvaluation::Verdict(verdict) => {
            let mut out = String::from("Evaluator verdict: ");
            out.push_str(verdict.short_verdict.as_deref().unwrap_or("(no verdict)"));
            match verdict.is_correct {
                Some(true) => out.push_str(" [correct]"),
                Some(false) => out.push_str(" [needs work]"),
                None => {}
            }
            push_list(&mut out, "Issues", &verdict.issues);
            push_list(&mut out, "Suggestions", &verdict.suggestions);
            out
        }
    }
}

pub fn render_feedback(report: &CoachReport) -> String {
    let feedback = match report {
        CoachReport::Raw { raw_feedback } => {
            return format!("=== Interview feedback ===\n{raw_feedback}\n");
        }
        CoachReport::Structured(feedback) => feedback,
    };

    let mut out = String::from("=== Interview feedback ===\n");
    let _ = writeln!(out, "{}", feedback.overall_summary);

    if !feedback.dimension_scores.is_empty() {
        out.push_str("\nScores:\n");
        for (dimension, score) in &feedback.dimension_scores {
            let _ = writeln!(out, "  {dimension}: {score}");
        }
    }
    push_list(&mut out, "Strengths", &feedback.strengths);
    push_list(&mut out, "Areas to improve", &feedback.improvement_areas);
    if let Some(skills) = &feedback.inferred_technical_skills {
        push_list(&mut out, "Inferred technical skills", skills);
    }
    if let Some(samples) = feedback.sample_improved_answers.as_deref() {
        if !samples.is_empty() {
            out.push_str("\nImproved answers:\n");
            for sample in samples {
                let _ = writeln!(out, "  Q: {}\n  A: {}", sample.question, sample.improved_answer);
            }
        }
    }
    if !feedback.per_round_feedback.is_empty() {
        out.push_str("\nBy round:\n");
        for (round, note) in &feedback.per_round_feedback {
            let _ = writeln!(out, "  {round}: {note}");
        }
    }
    out
}

/// Turn table of a saved session plus its last feedback summary.
pub fn render_log(record: &SessionRecord) -> String {
    let profile = record.candidate_profile();
    let mut out = format!(
        "Session {} for {} ({}, {}, {})\n",
        record.created_at_utc(),
        profile.user_name,
        profile.target_role,
        profile.experience_level,
        profile.company_type
    );
    if let Some(persona) = record.interviewer_persona() {
        let _ = writeln!(out, "Interviewer: {persona}");
    }
    let _ = writeln!(out, "Feedback mode: {}", record.feedback_mode());

    if record.qa_list().is_empty() {
        out.push_str("\nNo answers recorded.\n");
    }
    for qa in record.qa_list() {
        let _ = writeln!(out, "\n#{} [{}] {}", qa.turn, qa.round, qa.question);
        let answer = if qa.answer_text.is_empty() {
            "(no answer)"
        } else {
            qa.answer_text.as_str()
        };
        let _ = writeln!(out, "   > {answer}");
        if let Some(verdict) = qa.technical_evaluation.as_ref().and_then(|e| e.short_verdict()) {
            let _ = writeln!(out, "   verdict: {verdict}");
        }
    }

    if let Some(report) = record.coach_feedback() {
        let _ = writeln!(out, "\nLast feedback: {}", report.summary());
    }
    out
}

fn push_list(out: &mut String, title: &str, items: &[String]) {
    if items.is_empty() {
        return;
    }
    let _ = writeln!(out, "\n{title}:");
    for item in items {
        let _ = writeln!(out, "  - {item}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use interview_core::coach::CoachFeedback;
    use std::collections::VecDeque;
    use std::io::Cursor;

    struct Scripted(VecDeque<&'static str>);

    impl TypedInput for Scripted {
        fn read_line(&mut self, _prompt: &str) -> Result<String> {
            self.0
                .pop_front()
                .map(str::to_string)
                .ok_or_else(|| anyhow::anyhow!("Input closed"))
        }
    }

    fn scripted(lines: &[&'static str]) -> Scripted {
        Scripted(lines.iter().copied().collect())
    }

    #[test]
    fn read_line_strips_terminator_and_reports_eof() {
        let mut input = Cursor::new("hello there\r\nsecond\n");
        assert_eq!(read_line_from(&mut input).unwrap(), "hello there");
        assert_eq!(read_line_from(&mut input).unwrap(), "second");
        assert!(read_line_from(&mut input).is_err());
    }

    #[test]
    fn read_block_stops_at_terminator() {
        let mut input = Cursor::new("def f(x):\n    return x\n  END  \nafter\n");
        assert_eq!(read_block_from(&mut input).unwrap(), "def f(x):\n    return x");
        assert_eq!(read_line_from(&mut input).unwrap(), "after");
    }

    #[test]
    fn read_block_accepts_eof_after_content() {
        let mut input = Cursor::new("SELECT 1;");
        assert_eq!(read_block_from(&mut input).unwrap(), "SELECT 1;");
        assert!(read_block_from(&mut Cursor::new("")).is_err());
    }

    #[test]
    fn profile_defaults_name_and_retries_bad_mode() {
        let mut input = scripted(&["", "SDE", "mid", "startup", "  ", "lenient", "strict"]);
        let (profile, mode) = read_profile(&mut input, None).unwrap();
        assert_eq!(profile.user_name, "anonymous");
        assert_eq!(profile.target_role, "SDE");
        assert_eq!(profile.job_description, None);
        assert_eq!(mode, FeedbackMode::Strict);
    }

    #[test]
    fn profile_skips_mode_question_when_given() {
        let mut input = scripted(&["Ana", "SDE", "senior", "FAANG", "Build APIs"]);
        let (profile, mode) = read_profile(&mut input, Some(FeedbackMode::Coaching)).unwrap();
        assert_eq!(profile.job_description.as_deref(), Some("Build APIs"));
        assert_eq!(mode, FeedbackMode::Coaching);
        assert!(input.0.is_empty());
    }

    #[test]
    fn confirm_recognises_quit() {
        assert!(confirm(&mut scripted(&[""]), "go? ").unwrap());
        assert!(!confirm(&mut scripted(&[" Q "]), "go? ").unwrap());
        assert!(!confirm(&mut scripted(&["quit"]), "go? ").unwrap());
        assert!(confirm(&mut scripted(&[]), "go? ").is_err());
    }

    #[test]
    fn raw_feedback_is_shown_verbatim() {
        let report = CoachReport::Raw {
            raw_feedback: "Good job, mostly.".to_string(),
        };
        assert!(render_feedback(&report).contains("Good job, mostly."));
    }

    #[test]
    fn structured_feedback_lists_sections() {
        let feedback: CoachFeedback = serde_json::from_value(serde_json::json!({
            "overall_summary": "Solid.",
            "dimension_scores": {"communication": 4, "depth": "high"},
            "strengths": ["clear"],
            "improvement_areas": [],
            "per_round_feedback": {"warmup": "fine"}
        }))
        .unwrap();
        let text = render_feedback(&CoachReport::Structured(feedback));
        assert!(text.contains("Solid."));
        assert!(text.contains("communication: 4"));
        assert!(text.contains("depth: high"));
        assert!(text.contains("  - clear"));
        assert!(!text.contains("Areas to improve"));
        assert!(text.contains("warmup: fine"));
    }

    #[test]
    fn log_marks_empty_answers() {
        let record: SessionRecord = serde_json::from_value(serde_json::json!({
            "candidate_profile": {
                "user_name": "Ana", "target_role": "SDE",
                "experience_level": "mid", "company_type": "startup"
            },
            "feedback_mode": "coaching",
            "qa_list": [
                {"turn": 1, "round": "warmup", "question": "Tell me about you.", "answer_text": "I build things."},
                {"turn": 2, "round": "technical", "question": "Reverse a list.", "answer_text": ""}
            ],
            "interviewer_persona": "Maya",
            "created_at_utc": "20240501_093000"
        }))
        .unwrap();

        let text = render_log(&record);
        assert!(text.contains("20240501_093000"));
        assert!(text.contains("Interviewer: Maya"));
        assert!(text.contains("#1 [warmup] Tell me about you."));
        assert!(text.contains("#2 [technical] Reverse a list.\n   > (no answer)"));
        assert!(!text.contains("Last feedback"));
    }
}
