//! Bounded, cancellable microphone recording.

use anyhow::Context;
use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::{Device, FromSample, Sample, SampleFormat, SizedSample, StreamConfig};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::audio;

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Mono f32 samples at the device's native rate.
#[derive(Debug, Clone, Default)]
pub struct Recording {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

/// Records from `device` until `max_duration` elapses or `cancel` is set.
///
/// Blocks the calling thread. Whatever was captured before the stop is
/// returned; cancelling is not an error.
pub fn record(
    device: &Device,
    max_duration: Duration,
    cancel: Arc<AtomicBool>,
) -> anyhow::Result<Recording> {
    let supported = device
        .default_input_config()
        .context("Failed to get default input config")?;
    let sample_format = supported.sample_format();
    let config: StreamConfig = supported.into();
    let channels = config.channels as usize;
    tracing::info!("Recording with {:?} ({:?})", &config, sample_format);

    let buffer = Arc::new(Mutex::new(Vec::<f32>::new()));
    let stream = match sample_format {
        SampleFormat::F32 => build_stream::<f32>(device, &config, channels, buffer.clone()),
        SampleFormat::I16 => build_stream::<i16>(device, &config, channels, buffer.clone()),
        SampleFormat::U16 => build_stream::<u16>(device, &config, channels, buffer.clone()),
        other => anyhow::bail!("Unsupported input sample format {other:?}"),
    }?;
    stream.play().context("Failed to start input stream")?;

    let deadline = Instant::now() + max_duration;
    while Instant::now() < deadline && !cancel.load(Ordering::SeqCst) {
        std::thread::sleep(POLL_INTERVAL);
    }
    drop(stream);

    if cancel.load(Ordering::SeqCst) {
        tracing::info!("Recording cancelled, keeping captured audio");
    }

    let samples = std::mem::take(
        &mut *buffer
            .lock()
            .map_err(|_| anyhow::anyhow!("Recording buffer lock poisoned"))?,
    );
    let seconds = samples.len() as f32 / config.sample_rate.0.max(1) as f32;
    tracing::info!("Captured {seconds:.1}s of audio");
    if !samples.is_empty() && audio::peak(&samples) < 1e-4 {
        tracing::warn!("Recording is silent; check the selected input device");
    }

    Ok(Recording {
        samples,
        sample_rate: config.sample_rate.0,
    })
}

fn build_stream<T>(
    device: &Device,
    config: &StreamConfig,
    channels: usize,
    buffer: Arc<Mutex<Vec<f32>>>,
) -> anyhow::Result<cpal::Stream>
where
    T: SizedSample,
    f32: FromSample<T>,
{
    let input_data_fn = move |data: &[T], _: &cpal::InputCallbackInfo| {
        let samples: Vec<f32> = data.iter().map(|s| s.to_sample::<f32>()).collect();
        let mono = audio::downmix_to_mono(&samples, channels);
        if let Ok(mut buf) = buffer.lock() {
            buf.extend_from_slice(&mono);
        }
    };

    device
        .build_input_stream(
            config,
            input_data_fn,
            move |err| tracing::error!("An error occurred on input stream: {}", err),
            None,
        )
        .context("Failed to build input stream")
}
