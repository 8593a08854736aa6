pub mod capture;
pub mod coach;
pub mod conversation;
pub mod error;
pub mod interviewer;
pub mod llm_client;
pub mod persistence;
pub mod profile;
pub mod session_state;
pub mod stt;
pub mod technical;

use interviewer::NextQuestion;

/// Represents commands that the turn controller issues to the driving surface.
///
/// Controller operations return these instead of performing side effects
/// (speaking, prompting), so the same state machine can sit behind a
/// terminal loop or any other front end.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Speak the given text to the candidate.
    SpeakText(String),
    /// Present the question and capture an answer for it.
    AskQuestion { round: String, question: NextQuestion },
    /// The interview is over, with a final message.
    SessionComplete(String),
}
