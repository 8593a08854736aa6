use crate::{
    Command,
    coach::{Coach, CoachReport},
    conversation::{QAEntry, SessionRecord},
    error::SessionError,
    interviewer::{Interviewer, NextQuestion},
    persistence::SessionStore,
    technical::TechnicalEvaluation,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterviewPhase {
    /// No question asked yet; waiting for the candidate to start.
    AwaitConsent,
    /// A question is out; waiting for the answer to be committed.
    AwaitAnswer,
    /// Answer recorded; waiting for the candidate to continue or quit.
    AwaitNext,
    /// Terminal.
    Finished,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinishReason {
    InterviewerEnded,
    CandidateQuit,
    /// Loaded from disk; how the original run ended is not stored.
    Reopened,
}

impl FinishReason {
    /// Closing line announced with `Command::SessionComplete`.
    pub fn message(self) -> &'static str {
        match self {
            FinishReason::InterviewerEnded => "The interviewer has concluded the interview.",
            FinishReason::CandidateQuit => "Ending the interview at your request.",
            FinishReason::Reopened => "This interview has already finished.",
        }
    }
}

/// The question currently awaiting an answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingQuestion {
    pub round: String,
    pub question: NextQuestion,
    pub end_interview: bool,
}

/// Everything one interview owns: the persisted record, where it is saved,
/// and where the turn protocol currently stands.
///
/// The caller owns this value and hands it to every `TurnController`
/// operation; nothing about a session lives anywhere else.
pub struct InterviewSession {
    record: SessionRecord,
    store: Box<dyn SessionStore>,
    phase: InterviewPhase,
    latest_answer: String,
    pending: Option<PendingQuestion>,
    finish_reason: Option<FinishReason>,
}

impl InterviewSession {
    /// A fresh session, waiting for consent.
    pub fn new(record: SessionRecord, store: Box<dyn SessionStore>) -> Self {
        Self {
            record,
            store,
            phase: InterviewPhase::AwaitConsent,
            latest_answer: String::new(),
            pending: None,
            finish_reason: None,
        }
    }

    /// A previously saved session, reopened for review. No more questions
    /// can be asked.
    pub fn reopen(record: SessionRecord, store: Box<dyn SessionStore>) -> Self {
        let latest_answer = record
            .qa_list()
            .last()
            .map(|qa| qa.answer_text.clone())
            .unwrap_or_default();
        Self {
            record,
            store,
            phase: InterviewPhase::Finished,
            latest_answer,
            pending: None,
            finish_reason: Some(FinishReason::Reopened),
        }
    }

    pub fn phase(&self) -> InterviewPhase {
        self.phase
    }

    pub fn record(&self) -> &SessionRecord {
        &self.record
    }

    pub fn pending_question(&self) -> Option<&PendingQuestion> {
        self.pending.as_ref()
    }

    pub fn latest_answer(&self) -> &str {
        &self.latest_answer
    }

    pub fn finish_reason(&self) -> Option<FinishReason> {
        self.finish_reason
    }

    /// The `SessionComplete` command for a finished session, e.g. to announce
    /// the end after a failed save has been retried.
    pub fn completion(&self) -> Option<Command> {
        self.finish_reason
            .map(|reason| Command::SessionComplete(reason.message().to_string()))
    }

    pub fn is_finished(&self) -> bool {
        self.phase == InterviewPhase::Finished
    }

    pub fn location(&self) -> &std::path::Path {
        self.store.location()
    }

    fn expect_phase(
        &self,
        operation: &'static str,
        allowed: &[InterviewPhase],
    ) -> Result<(), SessionError> {
        if allowed.contains(&self.phase) {
            Ok(())
        } else {
            Err(SessionError::InvalidTransition {
                operation,
                phase: self.phase,
            })
        }
    }

    fn save(&mut self) -> Result<(), SessionError> {
        self.store.save(&self.record)?;
        Ok(())
    }

    fn finish(&mut self, reason: FinishReason) {
        self.phase = InterviewPhase::Finished;
        self.finish_reason = Some(reason);
        self.pending = None;
    }
}

/// Drives the turn protocol. Holds only the interviewer; all session data is
/// in the `InterviewSession` passed to each operation.
///
/// Operations never perform terminal or audio I/O. They return the
/// `Command`s the driving surface should carry out, in order.
pub struct TurnController<I: Interviewer> {
    interviewer: I,
}

impl<I: Interviewer> TurnController<I> {
    pub fn new(interviewer: I) -> Self {
        Self { interviewer }
    }

    /// Asks the interviewer for the next question.
    ///
    /// On a backend error the session is left exactly as it was.
    pub async fn advance(&self, session: &mut InterviewSession) -> Result<Vec<Command>, SessionError> {
        session.expect_phase(
            "ask the next question",
            &[InterviewPhase::AwaitConsent, InterviewPhase::AwaitNext],
        )?;

        let response = self
            .interviewer
            .ask_next(
                session.record.candidate_profile(),
                session.record.conversation_state(),
                &session.latest_answer,
            )
            .await?;

        let mut commands = Vec::new();
        let adopted = session
            .record
            .adopt_persona(response.persona.as_deref())
            .map(str::to_string);
        if let Some(persona) = adopted {
            tracing::info!("Interviewer persona: {persona}");
            commands.push(Command::SpeakText(introduction(&session.record, &persona)));
        }

        session.pending = Some(PendingQuestion {
            round: response.next_round.clone(),
            question: response.next_question.clone(),
            end_interview: response.end_interview,
        });
        session.phase = InterviewPhase::AwaitAnswer;
        tracing::info!(
            turn = session.record.qa_list().len() + 1,
            round = %response.next_round,
            phase = ?session.phase,
            "Question asked"
        );

        commands.push(Command::AskQuestion {
            round: response.next_round,
            question: response.next_question,
        });
        Ok(commands)
    }

    /// Records the answer to the pending question and saves the session.
    ///
    /// The transition happens even if the save fails; the error is returned
    /// and `persist` can be retried.
    pub fn commit_answer(
        &self,
        session: &mut InterviewSession,
        answer_text: &str,
    ) -> Result<Vec<Command>, SessionError> {
        session.expect_phase("commit an answer", &[InterviewPhase::AwaitAnswer])?;
        let Some(pending) = session.pending.take() else {
            return Err(SessionError::InvalidTransition {
                operation: "commit an answer",
                phase: session.phase,
            });
        };

        let entry = session
            .record
            .append_answer(pending.round, pending.question.text, answer_text);
        let (turn, round) = (entry.turn, entry.round.clone());
        session.latest_answer = answer_text.to_string();

        let mut commands = Vec::new();
        if pending.end_interview {
            session.finish(FinishReason::InterviewerEnded);
            commands.extend(session.completion());
        } else {
            session.phase = InterviewPhase::AwaitNext;
        }
        tracing::info!(turn, round = %round, phase = ?session.phase, "Answer committed");

        session.save()?;
        Ok(commands)
    }

    /// Ends the interview at the candidate's request, without another
    /// interviewer call.
    pub fn quit(&self, session: &mut InterviewSession) -> Result<Vec<Command>, SessionError> {
        session.expect_phase(
            "quit",
            &[InterviewPhase::AwaitConsent, InterviewPhase::AwaitNext],
        )?;
        session.finish(FinishReason::CandidateQuit);
        tracing::info!(
            turns = session.record.qa_list().len(),
            "Interview ended by the candidate"
        );
        Ok(session.completion().into_iter().collect())
    }

    /// Saves the in-memory record again, e.g. after a failed write.
    pub fn persist(&self, session: &mut InterviewSession) -> Result<(), SessionError> {
        session.save()
    }

    /// Runs the coach over the answers so far and stores the result,
    /// replacing any earlier feedback. `qa_list` is not touched.
    pub async fn request_feedback<C: Coach + ?Sized>(
        &self,
        coach: &C,
        session: &mut InterviewSession,
    ) -> Result<CoachReport, SessionError> {
        request_feedback(coach, session).await
    }

    /// Attaches a verdict to the most recently committed answer and saves.
    pub fn attach_technical_evaluation(
        &self,
        session: &mut InterviewSession,
        evaluation: TechnicalEvaluation,
    ) -> Result<(), SessionError> {
        let entry: &mut QAEntry = session
            .record
            .last_entry_mut()
            .ok_or(SessionError::NoAnswerToEvaluate)?;
        entry.technical_evaluation = Some(evaluation);
        tracing::info!(turn = entry.turn, "Technical evaluation attached");
        session.save()
    }
}

/// Coach review for a session that has no interviewer attached, such as a
/// saved session reopened from disk.
pub async fn request_feedback<C: Coach + ?Sized>(
    coach: &C,
    session: &mut InterviewSession,
) -> Result<CoachReport, SessionError> {
    if session.record.qa_list().is_empty() {
        return Err(SessionError::NothingToReview);
    }
    let report = coach
        .analyze(
            session.record.candidate_profile(),
            session.record.qa_list(),
            session.record.feedback_mode(),
        )
        .await?;
    session.record.set_coach_feedback(report.clone());
    tracing::info!(
        turns = session.record.qa_list().len(),
        structured = report.structured().is_some(),
        "Coach feedback stored"
    );
    session.save()?;
    Ok(report)
}

fn introduction(record: &SessionRecord, persona: &str) -> String {
    let profile = record.candidate_profile();
    let name = match profile.user_name.trim() {
        "" => "there",
        name => name,
    };
    let role = match profile.target_role.trim() {
        "" => "selected",
        role => role,
    };
    format!(
        "Hello {name}. My name is {persona}. I will be your interviewer for the {role} role. \
         I will ask you questions and listen to your answers. Let us begin."
    )
}
