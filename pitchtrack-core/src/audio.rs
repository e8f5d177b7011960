//! # Audio Capture Module
//!
//! Live capture from the default input device using CPAL (Cross-Platform Audio
//! Library). Captured audio is reduced to one channel, gain-adjusted, converted
//! to 16-bit samples and streamed in fixed-size chunks to whoever drives the
//! [`Analyzer`](crate::Analyzer).
//!
//! ## Features
//! - Default input device selection
//! - `f32` and `i16` device formats
//! - Fixed sample rate: the device must support the configured rate
//! - Non-blocking hand-off; chunks are dropped if the consumer falls behind

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleFormat, SizedSample, SupportedStreamConfigRange};
use crossbeam_channel::Sender;
use tracing::{info, warn};

use crate::{Error, Result};

/// Number of samples per chunk sent to the analysis side.
///
/// Small enough that the analyzer sees new audio well inside one analysis
/// interval.
pub const CHUNK_SIZE: usize = 512;

/// Starts audio capture from the default input device.
///
/// This function:
/// 1. Selects the default audio input device
/// 2. Picks an `f32` or `i16` input config supporting `sample_rate`
/// 3. Sets up a callback that ships `i16` chunks through `sender`
///
/// # Arguments
/// * `sender` - Channel sender for streaming samples to the analysis thread
/// * `sample_rate` - Required capture rate in Hz
/// * `gain` - Linear gain applied before clamping to full scale
///
/// # Returns
/// * `Ok(stream)` - Running stream; capture stops when it is dropped
/// * `Err(e)` - No device, no matching config, or the stream failed to start
pub fn start_audio_capture(sender: Sender<Vec<i16>>, sample_rate: u32, gain: f32) -> Result<cpal::Stream> {
    let host = cpal::default_host();
    let device = host.default_input_device().ok_or(Error::NoInputDevice)?;

    info!("Using audio input device: {}", device.name()?);

    let configs = device.supported_input_configs()?.collect::<Vec<_>>();
    let supported_config =
        find_supported_config(configs, sample_rate).ok_or(Error::UnsupportedSampleRate(sample_rate))?;

    let sample_format = supported_config.sample_format();
    let config: cpal::StreamConfig = supported_config
        .with_sample_rate(cpal::SampleRate(sample_rate))
        .into();
    let channels = config.channels as usize;

    info!(sample_rate, channels, ?sample_format, "Selected input config");

    let stream = match sample_format {
        SampleFormat::F32 => build_stream::<f32>(&device, &config, sender, channels, move |s| apply_gain(s, gain)),
        SampleFormat::I16 => build_stream::<i16>(&device, &config, sender, channels, move |s| {
            apply_gain(s as f32 / 32768.0, gain)
        }),
        _ => Err(Error::UnsupportedSampleRate(sample_rate)),
    }?;

    stream.play()?;

    Ok(stream)
}

fn build_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    sender: Sender<Vec<i16>>,
    channels: usize,
    convert: impl Fn(T) -> i16 + Send + 'static,
) -> Result<cpal::Stream>
where
    T: SizedSample,
{
    let err_fn = |err| warn!("An error occurred on the audio stream: {}", err);

    // Accumulates converted samples across callbacks.
    let mut pending: Vec<i16> = Vec::with_capacity(CHUNK_SIZE * 2);

    let stream = device.build_input_stream(
        config,
        move |data: &[T], _: &cpal::InputCallbackInfo| {
            pending.extend(data.iter().step_by(channels.max(1)).map(|&s| convert(s)));

            while pending.len() >= CHUNK_SIZE {
                let chunk: Vec<i16> = pending.drain(..CHUNK_SIZE).collect();
                // Dropped if the analysis side is behind.
                let _ = sender.try_send(chunk);
            }
        },
        err_fn,
        None,
    )?;

    Ok(stream)
}

/// Applies `gain` to a float sample, clamps to [-1, 1] and scales to `i16`.
pub fn apply_gain(sample: f32, gain: f32) -> i16 {
    ((sample * gain).clamp(-1.0, 1.0) * 32767.0) as i16
}

/// Finds an input configuration able to capture at exactly `target_rate`.
///
/// Only `f32` and `i16` formats are considered. Fewer channels are preferred,
/// since only the first one is analysed.
fn find_supported_config(
    configs: Vec<SupportedStreamConfigRange>,
    target_rate: u32,
) -> Option<SupportedStreamConfigRange> {
    configs
        .into_iter()
        .filter(|c| matches!(c.sample_format(), SampleFormat::F32 | SampleFormat::I16))
        .filter(|c| c.min_sample_rate().0 <= target_rate && target_rate <= c.max_sample_rate().0)
        .min_by_key(|c| (c.channels(), c.sample_format() != SampleFormat::F32))
}
