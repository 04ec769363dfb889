//! Parameter definitions with physical units and documented semantics.
//!
//! All magic numbers are extracted here with:
//! - Physical units (seconds, Hz, cents, etc.)
//! - Documented ranges and meanings
//! - Type safety where possible

mod audio;
mod music;
mod render;

use serde::Deserialize;
use std::path::Path;

use crate::error::AudioResult;

// Re-export all types
pub use audio::{audio_constants, AnalyserConfig, AudioSettings, Bus};
pub use music::{FilterKind, SchedulerParams, TimbreBank, TimbrePreset, Waveform};
pub use render::RecordingConfig;

/// Everything the engine reads at startup, loadable from a TOML file
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub audio: AudioSettings,
    pub analysis: AnalyserConfig,
    pub scheduler: SchedulerParams,
    pub timbres: TimbreBank,
}

impl EngineConfig {
    /// Parse and validate a TOML document
    pub fn from_toml_str(content: &str) -> AudioResult<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> AudioResult<()> {
        self.audio.validate()?;
        self.analysis.validate()?;
        self.scheduler.validate()?;
        self.timbres.validate()
    }
}

/// Load engine configuration from a TOML file
pub fn load_config(path: &Path) -> AudioResult<EngineConfig> {
    let content = std::fs::read_to_string(path)?;
    EngineConfig::from_toml_str(&content)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::music::Scale;

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = EngineConfig::from_toml_str(
            r#"
            [audio]
            bpm = 96.0
            scales = ["pentatonic"]

            [timbres.bass]
            waveform = "square"
            detune_cents = 0.0
            attack_s = 0.05
            decay_s = 0.2
            sustain_level = 0.5
            release_s = 0.4
            filter_kind = "lowpass"
            filter_cutoff_hz = 250.0
            filter_q = 3.0
            "#,
        )
        .unwrap();

        assert_eq!(config.audio.bpm, 96.0);
        assert_eq!(config.audio.scales, vec![Scale::Pentatonic]);
        assert_eq!(config.audio.master_volume, 0.7);
        assert_eq!(config.timbres.bass.waveform, Waveform::Square);
        assert_eq!(config.timbres.pad.waveform, Waveform::Sine);
        assert_eq!(config.analysis.fft_size, 256);
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let err = EngineConfig::from_toml_str("[audio]\nmusic_volume = 3.0\n").unwrap_err();
        assert!(err.to_string().contains("music_volume"));
    }

    #[test]
    fn test_malformed_toml_is_a_parse_error() {
        let err = EngineConfig::from_toml_str("[audio\nbpm = ").unwrap_err();
        assert!(matches!(err, crate::error::AudioError::ConfigParse(_)));
    }

    #[test]
    fn test_load_config_missing_file() {
        let err = load_config(Path::new("/definitely/not/here.toml")).unwrap_err();
        assert!(matches!(err, crate::error::AudioError::Io(_)));
    }
}
