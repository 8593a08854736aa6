//! Answer acquisition: spoken capture first, typed text as the fallback.
//!
//! `AnswerCapture::capture` never returns an error. Every failure along the
//! spoken path (no device, cancelled, empty or failed transcription) ends in
//! the typed prompt, and the temporary WAV file is removed on every exit path.

use anyhow::Context;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tempfile::NamedTempFile;

use crate::stt::Transcriber;

pub const DEFAULT_MAX_RECORDING: Duration = Duration::from_secs(90);

const TYPED_PROMPT: &str = "Type your answer (press Enter on an empty line to skip): ";
const CODE_PROMPT: &str = "Write your code answer (finish with a line containing only END): ";

/// Cooperative stop signal shared with a running recording.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }

    /// The underlying flag, for recorders polling it from another thread.
    pub fn shared(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.0)
    }
}

/// Mono 16-bit PCM.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordedAudio {
    pub samples: Vec<i16>,
    pub sample_rate: u32,
}

impl RecordedAudio {
    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.samples.len() as f64 / self.sample_rate as f64)
    }
}

/// A microphone, or anything that can stand in for one.
pub trait AudioSource: Send {
    /// Blocks until `max_duration` elapses or `cancel` is raised, then returns
    /// everything captured so far. Cancellation is not an error.
    fn record(&mut self, max_duration: Duration, cancel: &CancelFlag)
    -> anyhow::Result<RecordedAudio>;
}

pub trait TypedInput: Send {
    fn read_line(&mut self, prompt: &str) -> anyhow::Result<String>;

    /// Multi-line input, pre-filled with `seed` where the surface supports it.
    fn read_block(&mut self, prompt: &str, _seed: &str) -> anyhow::Result<String> {
        self.read_line(prompt)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CaptureMethod {
    Spoken,
    Typed,
    Code,
    /// Nothing usable was obtained; the answer is empty.
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedAnswer {
    pub text: String,
    pub method: CaptureMethod,
}

impl CapturedAnswer {
    fn skipped() -> Self {
        Self {
            text: String::new(),
            method: CaptureMethod::Skipped,
        }
    }
}

pub struct AnswerCapture {
    transcriber: Box<dyn Transcriber>,
    audio: Option<Box<dyn AudioSource>>,
    typed: Box<dyn TypedInput>,
    max_duration: Duration,
    scratch_dir: PathBuf,
}

impl AnswerCapture {
    pub fn new(transcriber: Box<dyn Transcriber>, typed: Box<dyn TypedInput>) -> Self {
        Self {
            transcriber,
            audio: None,
            typed,
            max_duration: DEFAULT_MAX_RECORDING,
            scratch_dir: std::env::temp_dir(),
        }
    }

    pub fn with_audio_source(mut self, audio: Box<dyn AudioSource>) -> Self {
        self.audio = Some(audio);
        self
    }

    pub fn with_max_duration(mut self, max_duration: Duration) -> Self {
        self.max_duration = max_duration;
        self
    }

    /// Directory for the temporary WAV files.
    pub fn with_scratch_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.scratch_dir = dir.into();
        self
    }

    pub fn transcriber_name(&self) -> &str {
        self.transcriber.name()
    }

    pub fn speech_enabled(&self) -> bool {
        self.audio.is_some() && self.transcriber.is_available()
    }

    /// Spoken answer with typed fallback. Always yields a (possibly empty) string.
    pub fn capture(&mut self, cancel: &CancelFlag) -> CapturedAnswer {
        if self.speech_enabled() {
            match self.try_spoken(cancel) {
                Ok(text) if !text.trim().is_empty() => {
                    return CapturedAnswer {
                        text: text.trim().to_string(),
                        method: CaptureMethod::Spoken,
                    };
                }
                Ok(_) => tracing::warn!("Spoken capture produced no text, asking for a typed answer"),
                Err(e) => tracing::warn!("Spoken capture failed ({e:#}), asking for a typed answer"),
            }
        }
        self.typed_fallback()
    }

    /// Typed multi-line answer for coding questions, seeded with starter code.
    pub fn capture_code(&mut self, seed: &str) -> CapturedAnswer {
        match self.typed.read_block(CODE_PROMPT, seed) {
            Ok(text) if !text.trim().is_empty() => CapturedAnswer {
                text: text.trim_end().to_string(),
                method: CaptureMethod::Code,
            },
            Ok(_) => CapturedAnswer::skipped(),
            Err(e) => {
                tracing::warn!("Reading code answer failed: {e:#}");
                CapturedAnswer::skipped()
            }
        }
    }

    fn typed_fallback(&mut self) -> CapturedAnswer {
        match self.typed.read_line(TYPED_PROMPT) {
            Ok(text) if !text.trim().is_empty() => CapturedAnswer {
                text: text.trim().to_string(),
                method: CaptureMethod::Typed,
            },
            Ok(_) => CapturedAnswer::skipped(),
            Err(e) => {
                tracing::warn!("Reading typed answer failed: {e:#}");
                CapturedAnswer::skipped()
            }
        }
    }

    fn try_spoken(&mut self, cancel: &CancelFlag) -> anyhow::Result<String> {
        let Some(audio) = self.audio.as_mut() else {
            return Ok(String::new());
        };
        let recording = audio.record(self.max_duration, cancel)?;
        if cancel.is_cancelled() {
            tracing::info!(
                "Recording stopped early after {:.1}s, transcribing what was captured",
                recording.duration().as_secs_f32()
            );
        }
        if recording.samples.is_empty() {
            return Ok(String::new());
        }

        // Dropped (and deleted) on every return below.
        let wav = write_wav(&self.scratch_dir, &recording)?;
        self.transcriber.transcribe(wav.path())
    }
}

fn write_wav(dir: &Path, audio: &RecordedAudio) -> anyhow::Result<NamedTempFile> {
    let tmp = tempfile::Builder::new()
        .prefix("answer_")
        .suffix(".wav")
        .tempfile_in(dir)
        .context("create temp WAV")?;

    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: audio.sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(tmp.path(), spec).context("create WAV writer")?;
    for &sample in &audio.samples {
        writer.write_sample(sample)?;
    }
    writer.finalize().context("finalize WAV")?;
    Ok(tmp)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    struct StubAudio {
        samples: Vec<i16>,
        fail: bool,
    }

    impl AudioSource for StubAudio {
        fn record(
            &mut self,
            _max_duration: Duration,
            cancel: &CancelFlag,
        ) -> anyhow::Result<RecordedAudio> {
            if self.fail {
                anyhow::bail!("no input device");
            }
            // A cancelled recording keeps only the first half.
            let samples = if cancel.is_cancelled() {
                self.samples[..self.samples.len() / 2].to_vec()
            } else {
                self.samples.clone()
            };
            Ok(RecordedAudio {
                samples,
                sample_rate: 16_000,
            })
        }
    }

    /// Records the paths it was given and whether they existed at the time.
    #[derive(Clone, Default)]
    struct StubTranscriber {
        reply: Option<String>,
        seen: Arc<Mutex<Vec<(PathBuf, u32)>>>,
    }

    impl Transcriber for StubTranscriber {
        fn transcribe(&self, wav_path: &Path) -> anyhow::Result<String> {
            let reader = hound::WavReader::open(wav_path)?;
            self.seen
                .lock()
                .unwrap()
                .push((wav_path.to_path_buf(), reader.duration()));
            self.reply
                .clone()
                .ok_or_else(|| anyhow::anyhow!("engine crashed"))
        }
        fn name(&self) -> &str {
            "stub"
        }
        fn is_available(&self) -> bool {
            true
        }
    }

    struct ScriptedInput(VecDeque<anyhow::Result<String>>);

    impl ScriptedInput {
        fn lines(lines: &[&str]) -> Box<Self> {
            Box::new(Self(lines.iter().map(|l| Ok(l.to_string())).collect()))
        }
    }

    impl TypedInput for ScriptedInput {
        fn read_line(&mut self, _prompt: &str) -> anyhow::Result<String> {
            self.0
                .pop_front()
                .unwrap_or_else(|| Err(anyhow::anyhow!("stdin closed")))
        }
    }

    fn capture_with(
        transcriber: StubTranscriber,
        audio: StubAudio,
        typed: Box<dyn TypedInput>,
        dir: &Path,
    ) -> AnswerCapture {
        AnswerCapture::new(Box::new(transcriber), typed)
            .with_audio_source(Box::new(audio))
            .with_scratch_dir(dir)
    }

    fn dir_is_empty(dir: &Path) -> bool {
        std::fs::read_dir(dir).unwrap().next().is_none()
    }

    #[test]
    fn spoken_answer_is_used_and_wav_removed() {
        let dir = tempfile::tempdir().unwrap();
        let transcriber = StubTranscriber {
            reply: Some("  I built a cache.  ".into()),
            ..Default::default()
        };
        let seen = transcriber.seen.clone();
        let audio = StubAudio {
            samples: vec![100; 1600],
            fail: false,
        };
        let mut capture = capture_with(transcriber, audio, ScriptedInput::lines(&[]), dir.path());

        let answer = capture.capture(&CancelFlag::new());
        assert_eq!(answer.text, "I built a cache.");
        assert_eq!(answer.method, CaptureMethod::Spoken);
        assert_eq!(seen.lock().unwrap().len(), 1);
        assert!(dir_is_empty(dir.path()));
    }

    #[test]
    fn empty_transcription_falls_back_to_typed() {
        let dir = tempfile::tempdir().unwrap();
        let transcriber = StubTranscriber {
            reply: Some("   ".into()),
            ..Default::default()
        };
        let audio = StubAudio {
            samples: vec![0; 800],
            fail: false,
        };
        let mut capture = capture_with(
            transcriber,
            audio,
            ScriptedInput::lines(&["Built a caching layer."]),
            dir.path(),
        );

        let answer = capture.capture(&CancelFlag::new());
        assert_eq!(answer.text, "Built a caching layer.");
        assert_eq!(answer.method, CaptureMethod::Typed);
        assert!(dir_is_empty(dir.path()));
    }

    #[test]
    fn transcription_error_still_removes_wav() {
        let dir = tempfile::tempdir().unwrap();
        let transcriber = StubTranscriber::default();
        let seen = transcriber.seen.clone();
        let audio = StubAudio {
            samples: vec![5; 800],
            fail: false,
        };
        let mut capture =
            capture_with(transcriber, audio, ScriptedInput::lines(&["typed"]), dir.path());

        let answer = capture.capture(&CancelFlag::new());
        assert_eq!(answer.method, CaptureMethod::Typed);
        let (path, _) = seen.lock().unwrap()[0].clone();
        assert!(!path.exists());
        assert!(dir_is_empty(dir.path()));
    }

    #[test]
    fn cancelled_recording_is_still_transcribed() {
        let dir = tempfile::tempdir().unwrap();
        let transcriber = StubTranscriber {
            reply: Some("partial answer".into()),
            ..Default::default()
        };
        let seen = transcriber.seen.clone();
        let audio = StubAudio {
            samples: vec![7; 1000],
            fail: false,
        };
        let mut capture = capture_with(transcriber, audio, ScriptedInput::lines(&[]), dir.path());

        let cancel = CancelFlag::new();
        cancel.cancel();
        let answer = capture.capture(&cancel);
        assert_eq!(answer.text, "partial answer");
        assert_eq!(seen.lock().unwrap()[0].1, 500);
        assert!(dir_is_empty(dir.path()));
    }

    #[test]
    fn device_failure_and_closed_input_yield_empty_answer() {
        let dir = tempfile::tempdir().unwrap();
        let audio = StubAudio {
            samples: Vec::new(),
            fail: true,
        };
        let mut capture = capture_with(
            StubTranscriber::default(),
            audio,
            ScriptedInput::lines(&[]),
            dir.path(),
        );

        let answer = capture.capture(&CancelFlag::new());
        assert_eq!(answer, CapturedAnswer::skipped());
    }

    #[test]
    fn unavailable_transcriber_skips_recording() {
        struct PanickingAudio;
        impl AudioSource for PanickingAudio {
            fn record(&mut self, _: Duration, _: &CancelFlag) -> anyhow::Result<RecordedAudio> {
                panic!("recording should not start without a transcriber");
            }
        }

        let mut capture = AnswerCapture::new(
            Box::new(crate::stt::PendingTranscriber::new("not configured")),
            ScriptedInput::lines(&["typed instead"]),
        )
        .with_audio_source(Box::new(PanickingAudio));

        assert!(!capture.speech_enabled());
        let answer = capture.capture(&CancelFlag::new());
        assert_eq!(answer.text, "typed instead");
    }

    #[test]
    fn code_answer_keeps_indentation() {
        let mut capture = AnswerCapture::new(
            Box::new(StubTranscriber::default()),
            ScriptedInput::lines(&["def f(x):\n    return x\n\n"]),
        );
        let answer = capture.capture_code("def f(x):\n    pass");
        assert_eq!(answer.text, "def f(x):\n    return x");
        assert_eq!(answer.method, CaptureMethod::Code);
    }

    #[test]
    fn cancel_flag_is_shared() {
        let flag = CancelFlag::new();
        let shared = flag.shared();
        shared.store(true, Ordering::SeqCst);
        assert!(flag.is_cancelled());
        flag.reset();
        assert!(!shared.load(Ordering::SeqCst));
    }
}
