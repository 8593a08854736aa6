use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use interview_core::Command;
use interview_core::capture::{AnswerCapture, CancelFlag, CaptureMethod};
use interview_core::coach::CoachAgent;
use interview_core::conversation::SessionRecord;
use interview_core::error::SessionError;
use interview_core::interviewer::{Interviewer, InterviewerAgent};
use interview_core::llm_client::{ChatClient, ChatClientConfig};
use interview_core::persistence::{self, JsonFileStore};
use interview_core::profile::FeedbackMode;
use interview_core::session_state::{self, InterviewPhase, InterviewSession, TurnController};
use interview_core::stt;
use interview_core::technical::{self, TechnicalEvaluator};
use interview_service::config::Config;
use interview_service::console::{self, ConsoleSpeaker, Speaker, StdinInput};
use interview_service::microphone::Microphone;
use interview_service::prompt_loader::Prompts;
use secrecy::SecretString;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing_subscriber::fmt::time::ChronoLocal;

#[derive(Parser)]
#[command(version, about = "Practice job interviews with an AI interviewer and coach")]
struct Cli {
    #[command(subcommand)]
    command: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    /// Start a new mock interview
    Run {
        /// coaching or strict; asked interactively when omitted
        #[arg(long)]
        feedback_mode: Option<FeedbackMode>,
        /// Type every answer instead of recording it
        #[arg(long)]
        text_only: bool,
    },
    /// Re-run the coach over a saved session and store the new feedback
    Review { session_file: PathBuf },
    /// Print the questions and answers of a saved session
    Log { session_file: PathBuf },
    /// List audio input devices
    Devices,
}

#[tokio::main]
async fn main() -> Result<()> {
    // --- 1. Load Configuration ---
    let config = Config::from_env().context("Failed to load application configuration")?;

    // --- 2. Initialize Logging ---
    // Logs go to stderr so they do not interleave with the interview on stdout.
    tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .with_timer(ChronoLocal::rfc_3339())
        .with_writer(std::io::stderr)
        .init();

    tracing::info!("Configuration loaded successfully.");

    // --- 3. Parse Command-Line Arguments ---
    let args = Cli::parse();

    match args.command {
        Cmd::Run {
            feedback_mode,
            text_only,
        } => run(&config, feedback_mode, text_only).await,
        Cmd::Review { session_file } => review(&config, &session_file).await,
        Cmd::Log { session_file } => {
            let record = load(&session_file)?;
            print!("{}", console::render_log(&record));
            Ok(())
        }
        Cmd::Devices => {
            let devices = interview_native_utils::device::available_inputs()
                .context("Failed to list audio input devices")?;
            if devices.is_empty() {
                println!("No input devices found.");
            }
            for device in devices {
                println!("{device}");
            }
            Ok(())
        }
    }
}

async fn run(config: &Config, feedback_mode: Option<FeedbackMode>, text_only: bool) -> Result<()> {
    // --- Agents ---
    let api_key = config.require_llm_key()?;
    let prompts = Prompts::load(&config.prompts_dir);
    let controller = TurnController::new(InterviewerAgent::new(
        chat_client(config, &api_key, &config.interviewer_model)?,
        &prompts.interviewer,
    ));
    let coach = CoachAgent::new(
        chat_client(config, &api_key, &config.coach_model)?,
        &prompts.coach,
    );
    let evaluator = TechnicalEvaluator::new(
        chat_client(config, &api_key, &config.interviewer_model)?,
        &prompts.technical,
    );

    // --- Profile and session file ---
    let mut input = StdinInput;
    let (profile, mode) = console::read_profile(&mut input, feedback_mode)?;
    let record = SessionRecord::new(profile, mode, Utc::now());
    let store = JsonFileStore::create(&config.sessions_dir, &record)
        .context("Failed to create the session file")?;
    println!("Session file: {}", store.path().display());
    let mut session = InterviewSession::new(record, Box::new(store));

    // --- Answer capture ---
    let cancel = CancelFlag::new();
    let transcriber = stt::create_transcriber(&config.stt_config());
    let mut capture = AnswerCapture::new(transcriber, Box::new(StdinInput))
        .with_max_duration(config.max_recording);
    let recording = if text_only {
        Arc::new(AtomicBool::new(false))
    } else {
        let microphone = Microphone::new(config.input_device.clone());
        let flag = microphone.activity_flag();
        capture = capture.with_audio_source(Box::new(microphone));
        flag
    };
    spawn_interrupt_handler(recording, cancel.clone());

    if capture.speech_enabled() {
        println!("Spoken answers are transcribed with {}.", capture.transcriber_name());
    } else {
        println!("Answers will be typed.");
    }

    // --- Interview loop ---
    let mut speaker = ConsoleSpeaker::new("Interviewer");
    while !session.is_finished() {
        let prompt = if session.phase() == InterviewPhase::AwaitConsent {
            "\nPress Enter to begin the interview, or q to quit: "
        } else {
            "\nPress Enter for the next question, or q to end the interview: "
        };
        if !console::confirm(&mut input, prompt)? {
            let commands = controller.quit(&mut session)?;
            perform(commands, &mut speaker, &session);
            break;
        }

        let commands = controller
            .advance(&mut session)
            .await
            .context("The interviewer could not produce a question")?;
        if let Some(persona) = session.record().interviewer_persona() {
            speaker.set_label(persona);
        }
        perform(commands, &mut speaker, &session);

        let Some(pending) = session.pending_question().cloned() else {
            continue;
        };
        let coding = technical::is_coding_question(
            &pending.question.question_type,
            &pending.question.skill_tags,
        );
        let seed = coding.then(|| technical::extract_first_code_block(&pending.question.text));

        cancel.reset();
        let capture_cancel = cancel.clone();
        let (returned, answer) = tokio::task::spawn_blocking(move || {
            let answer = match seed {
                Some(seed) => capture.capture_code(&seed),
                None => capture.capture(&capture_cancel),
            };
            (capture, answer)
        })
        .await
        .context("Answer capture task failed")?;
        capture = returned;
        tracing::info!(method = ?answer.method, chars = answer.text.len(), "Answer captured");
        match answer.method {
            CaptureMethod::Spoken => println!("You said: {}", answer.text),
            CaptureMethod::Skipped => println!("No answer recorded for this question."),
            CaptureMethod::Typed | CaptureMethod::Code => {}
        }

        let commands = match controller.commit_answer(&mut session, &answer.text) {
            Ok(commands) => commands,
            Err(e) => {
                retry_persist(&controller, &mut session, e)?;
                session.completion().into_iter().collect()
            }
        };

        if coding && !answer.text.is_empty() {
            let evaluation = evaluator
                .evaluate(
                    session.record().candidate_profile(),
                    &pending.question.text,
                    &answer.text,
                    &pending.question.question_type,
                    &pending.question.skill_tags,
                )
                .await;
            match evaluation {
                Ok(evaluation) => {
                    println!("{}", console::render_evaluation(&evaluation));
                    if let Err(e) = controller.attach_technical_evaluation(&mut session, evaluation) {
                        retry_persist(&controller, &mut session, e)?;
                    }
                }
                Err(e) => tracing::warn!("Technical evaluation failed: {e}"),
            }
        }

        perform(commands, &mut speaker, &session);
    }

    // --- Feedback ---
    tracing::info!(reason = ?session.finish_reason(), "Interview finished");
    println!("Session saved to {}", session.location().display());
    if session.record().qa_list().is_empty() {
        println!("No answers were recorded, so there is no feedback to give.");
        return Ok(());
    }

    println!("\nPreparing your feedback...");
    match controller.request_feedback(&coach, &mut session).await {
        Ok(report) => print!("{}", console::render_feedback(&report)),
        Err(SessionError::Persistence(e)) => {
            retry_persist(&controller, &mut session, SessionError::Persistence(e))?;
            if let Some(report) = session.record().coach_feedback() {
                print!("{}", console::render_feedback(report));
            }
        }
        Err(e) => {
            return Err(e).context(format!(
                "Coach feedback failed; run `interview review {}` to try again",
                session.location().display()
            ));
        }
    }
    Ok(())
}

async fn review(config: &Config, path: &Path) -> Result<()> {
    let api_key = config.require_llm_key()?;
    let prompts = Prompts::load(&config.prompts_dir);
    let coach = CoachAgent::new(
        chat_client(config, &api_key, &config.coach_model)?,
        &prompts.coach,
    );

    let record = load(path)?;
    let mut session = InterviewSession::reopen(record, Box::new(JsonFileStore::open(path)));
    let report = session_state::request_feedback(&coach, &mut session)
        .await
        .context("Coach review failed")?;
    print!("{}", console::render_feedback(&report));
    println!("Feedback saved to {}", path.display());
    Ok(())
}

fn load(path: &Path) -> Result<SessionRecord> {
    persistence::load_record(path)
        .with_context(|| format!("Failed to load session {}", path.display()))
}

fn chat_client(config: &Config, api_key: &SecretString, model: &str) -> Result<ChatClient> {
    let client_config = ChatClientConfig::builder()
        .with_base_url(&config.llm_base_url)
        .with_api_key(api_key.clone())
        .with_model(model)
        .with_temperature(config.llm_temperature)
        .with_timeout(config.llm_timeout)
        .build();
    ChatClient::new(client_config).context("Failed to create LLM client")
}

/// Carries out controller commands on the console.
fn perform(commands: Vec<Command>, speaker: &mut dyn Speaker, session: &InterviewSession) {
    for command in commands {
        match command {
            Command::SpeakText(text) => speaker.speak(&text),
            Command::AskQuestion { round, question } => {
                let turn = session.record().qa_list().len() + 1;
                speaker.speak(&console::render_question(turn, &round, &question));
            }
            Command::SessionComplete(message) => {
                tracing::info!("Session complete: '{}'", message);
                println!("\n{message}");
            }
        }
    }
}

/// A failed save leaves the session intact in memory; try once more before
/// giving up. Any other error is passed through.
fn retry_persist<I: Interviewer>(
    controller: &TurnController<I>,
    session: &mut InterviewSession,
    error: SessionError,
) -> Result<()> {
    match error {
        SessionError::Persistence(e) => {
            tracing::warn!("Saving the session failed ({e}), retrying");
            controller
                .persist(session)
                .context("Failed to save the session")
        }
        other => Err(other.into()),
    }
}

/// Ctrl+C stops a running recording; at any other time it ends the program.
fn spawn_interrupt_handler(recording: Arc<AtomicBool>, cancel: CancelFlag) {
    tokio::spawn(async move {
        loop {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for Ctrl-C: {}", e);
                return;
            }
            if recording.load(Ordering::SeqCst) {
                tracing::info!("Received Ctrl-C, stopping the recording...");
                cancel.cancel();
            } else {
                tracing::info!("Received Ctrl-C, shutting down...");
                std::process::exit(130);
            }
        }
    });
}
