//! Error types for the audio engine.
//!
//! These never cross the [`AudioEngine`](crate::engine::AudioEngine) boundary:
//! the engine absorbs them into degraded-but-functional behavior (silence,
//! zero feature frames, `None` handles).

use thiserror::Error;

/// Result type for audio operations.
pub type AudioResult<T> = Result<T, AudioError>;

/// Errors that can occur while setting up or feeding the audio pipeline.
#[derive(Debug, Error)]
pub enum AudioError {
    /// The platform exposes no default output device.
    #[error("no audio output device found")]
    NoOutputDevice,

    /// The output device refused to report a usable configuration.
    #[error("failed to get audio config: {0}")]
    DeviceConfig(#[from] cpal::DefaultStreamConfigError),

    /// Building the output stream failed.
    #[error("failed to build audio stream: {0}")]
    StreamBuild(#[from] cpal::BuildStreamError),

    /// Starting the output stream failed.
    #[error("failed to start audio stream: {0}")]
    StreamPlay(#[from] cpal::PlayStreamError),

    /// The device wants a sample format we do not render.
    #[error("unsupported sample format: {0}")]
    UnsupportedSampleFormat(String),

    /// A configuration value is out of range.
    #[error("invalid config '{name}': {message}")]
    InvalidConfig {
        /// Parameter name.
        name: String,
        /// What is wrong with it.
        message: String,
    },

    /// A sound asset could not be decoded.
    #[error("failed to decode '{name}': {source}")]
    Decode {
        /// Effect name the asset was registered under.
        name: String,
        /// Underlying decoder error.
        #[source]
        source: hound::Error,
    },

    /// Writing the WAV recording failed.
    #[error("failed to write recording: {0}")]
    Recording(#[from] hound::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The TOML configuration file could not be parsed.
    #[error("failed to parse config: {0}")]
    ConfigParse(#[from] toml::de::Error),
}

impl AudioError {
    /// Creates an invalid config error.
    pub fn invalid_config(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            name: name.into(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_config_helper() {
        let err = AudioError::invalid_config("bpm", "must be > 0");
        assert!(err.to_string().contains("bpm"));
        assert!(err.to_string().contains("must be > 0"));
    }

    #[test]
    fn test_no_device_message() {
        assert_eq!(
            AudioError::NoOutputDevice.to_string(),
            "no audio output device found"
        );
    }
}
