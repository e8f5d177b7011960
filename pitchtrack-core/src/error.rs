//! Error types for pitchtrack-core.
//!
//! The analysis path never fails: an unvoiced or ambiguous frame is reported
//! as `None`. Errors only come from construction, configuration and the
//! capture device.

use thiserror::Error;

/// Error type for pitchtrack-core operations.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error("Invalid transform size: {0}. Must be a power of two >= 4")]
    InvalidTransformSize(usize),

    #[error("No input device available")]
    NoInputDevice,

    #[error("Input device does not support {0} Hz mono capture")]
    UnsupportedSampleRate(u32),

    #[error("Failed to query input configs")]
    SupportedConfigs(#[from] cpal::SupportedStreamConfigsError),

    #[error("Failed to build audio stream")]
    BuildStream(#[from] cpal::BuildStreamError),

    #[error("Failed to play audio stream")]
    PlayStream(#[from] cpal::PlayStreamError),

    #[error("Failed to get device name")]
    DeviceName(#[from] cpal::DeviceNameError),
}

pub type Result<T> = std::result::Result<T, Error>;
