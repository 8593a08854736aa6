//! The local microphone as an `AudioSource`.

use anyhow::Context;
use interview_core::capture::{AudioSource, CancelFlag, RecordedAudio};
use interview_native_utils::{audio, device, recorder};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crate::console;

pub struct Microphone {
    device_name: Option<String>,
    /// Raised while a recording is running, so Ctrl+C can stop it instead of
    /// ending the program.
    active: Arc<AtomicBool>,
}

impl Microphone {
    pub fn new(device_name: Option<String>) -> Self {
        Self {
            device_name,
            active: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn activity_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.active)
    }

    fn record_now(
        &self,
        max_duration: Duration,
        cancel: &CancelFlag,
    ) -> anyhow::Result<RecordedAudio> {
        let device = device::get_or_default_input(self.device_name.as_deref())
            .context("Failed to get audio input device")?;
        let recording = recorder::record(&device, max_duration, cancel.shared())?;
        Ok(RecordedAudio {
            samples: audio::convert_f32_to_i16(&recording.samples),
            sample_rate: recording.sample_rate,
        })
    }
}

impl AudioSource for Microphone {
    fn record(
        &mut self,
        max_duration: Duration,
        cancel: &CancelFlag,
    ) -> anyhow::Result<RecordedAudio> {
        println!(
            "Press Enter to start recording (up to {} seconds)... (Press Ctrl+C to stop recording early)",
            max_duration.as_secs()
        );
        console::read_line_from(&mut std::io::stdin().lock())?;

        self.active.store(true, Ordering::SeqCst);
        println!("Recording... speak now.");
        let result = self.record_now(max_duration, cancel);
        self.active.store(false, Ordering::SeqCst);

        if cancel.is_cancelled() {
            println!("Recording stopped.");
        }
        result
    }
}
