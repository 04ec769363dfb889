//! Output mix settings and analysis configuration.

use serde::Deserialize;

use crate::error::{AudioError, AudioResult};
use crate::music::Scale;

/// Gain stage selector for [`AudioEngine::set_volume`](crate::engine::AudioEngine::set_volume)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Bus {
    /// Final stage feeding the destination (music + effects)
    Master,
    /// Procedural music voices
    Music,
    /// One-shot and looping sound effects
    Sfx,
}

/// User-facing audio settings (mirrors the game's `audio` config block)
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AudioSettings {
    /// Master bus gain (linear, 0.0-1.0)
    pub master_volume: f32,

    /// Music bus gain (linear, 0.0-1.0)
    pub music_volume: f32,

    /// Effects bus gain (linear, 0.0-1.0)
    pub sfx_volume: f32,

    /// Base tempo (beats per minute); section changes wander ±10% around it
    pub bpm: f32,

    /// Scales the harmony engine may pick from (first entry is the initial scale)
    pub scales: Vec<Scale>,
}

impl Default for AudioSettings {
    fn default() -> Self {
        Self {
            master_volume: 0.7,
            music_volume: 0.5,
            sfx_volume: 0.8,
            bpm: audio_constants::DEFAULT_BPM,
            scales: vec![Scale::Minor, Scale::Major, Scale::Pentatonic],
        }
    }
}

impl AudioSettings {
    /// Current configured gain for a bus
    pub fn volume(&self, bus: Bus) -> f32 {
        match bus {
            Bus::Master => self.master_volume,
            Bus::Music => self.music_volume,
            Bus::Sfx => self.sfx_volume,
        }
    }

    /// Store a new gain for a bus (clamped to 0.0-1.0, non-finite is 0.0)
    pub fn set_volume(&mut self, bus: Bus, value: f32) -> f32 {
        let value = if value.is_finite() {
            value.clamp(0.0, 1.0)
        } else {
            0.0
        };
        match bus {
            Bus::Master => self.master_volume = value,
            Bus::Music => self.music_volume = value,
            Bus::Sfx => self.sfx_volume = value,
        }
        value
    }

    /// Validate ranges (volumes in 0-1, bpm > 0, at least one scale)
    pub fn validate(&self) -> AudioResult<()> {
        for (name, value) in [
            ("master_volume", self.master_volume),
            ("music_volume", self.music_volume),
            ("sfx_volume", self.sfx_volume),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(AudioError::invalid_config(
                    name,
                    format!("must be within 0.0-1.0, got {}", value),
                ));
            }
        }
        if !(self.bpm > 0.0) {
            return Err(AudioError::invalid_config(
                "bpm",
                format!("must be > 0, got {}", self.bpm),
            ));
        }
        if self.scales.is_empty() {
            return Err(AudioError::invalid_config("scales", "must not be empty"));
        }
        Ok(())
    }
}

/// Spectral analysis configuration (one analyser tap per bus)
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AnalyserConfig {
    /// FFT window size (must be power of 2); yields `fft_size / 2` bins
    pub fft_size: usize,

    /// Per-bin temporal smoothing of magnitudes (0.0 = none, <1.0)
    pub time_smoothing: f32,

    /// Magnitude mapped to byte value 0 (dBFS)
    pub min_decibels: f32,

    /// Magnitude mapped to byte value 255 (dBFS)
    pub max_decibels: f32,

    /// Weight kept from the previous feature frame when smoothing (0.0-1.0)
    /// 0.6 old / 0.4 new
    pub feature_retain: f32,

    /// Fraction of bins counted as the low band
    pub low_band_end: f32,

    /// Fraction of bins where the mid band ends (high band is the rest)
    pub mid_band_end: f32,
}

impl Default for AnalyserConfig {
    fn default() -> Self {
        Self {
            fft_size: 256,
            time_smoothing: 0.8,
            min_decibels: -100.0,
            max_decibels: -30.0,
            feature_retain: 0.6,
            low_band_end: 0.15,
            mid_band_end: 0.6,
        }
    }
}

impl AnalyserConfig {
    /// Number of frequency bins produced per snapshot
    pub fn bin_count(&self) -> usize {
        self.fft_size / 2
    }

    /// Validate configuration (FFT size must be power of 2, etc.)
    pub fn validate(&self) -> AudioResult<()> {
        if self.fft_size < 16 || !self.fft_size.is_power_of_two() {
            return Err(AudioError::invalid_config(
                "fft_size",
                format!("must be a power of 2 >= 16, got {}", self.fft_size),
            ));
        }
        if !(0.0..1.0).contains(&self.time_smoothing) {
            return Err(AudioError::invalid_config(
                "time_smoothing",
                format!("must be within 0.0-1.0, got {}", self.time_smoothing),
            ));
        }
        if self.min_decibels >= self.max_decibels {
            return Err(AudioError::invalid_config(
                "min_decibels",
                "must be below max_decibels",
            ));
        }
        if !(0.0..=1.0).contains(&self.feature_retain) {
            return Err(AudioError::invalid_config(
                "feature_retain",
                format!("must be within 0.0-1.0, got {}", self.feature_retain),
            ));
        }
        if !(0.0 < self.low_band_end
            && self.low_band_end < self.mid_band_end
            && self.mid_band_end < 1.0)
        {
            return Err(AudioError::invalid_config(
                "low_band_end",
                "band split points must satisfy 0 < low < mid < 1",
            ));
        }
        Ok(())
    }
}

/// Audio constants (compile-time)
pub mod audio_constants {
    /// Sample rate used when rendering without a device (Hz)
    pub const OFFLINE_SAMPLE_RATE: u32 = 44100;

    /// Base tempo when none (or an unusable one) is configured (BPM)
    pub const DEFAULT_BPM: f32 = 120.0;

    /// Safety limiter: output is hard clipped to ±this value
    pub const OUTPUT_LIMIT: f32 = 0.9;

    /// Duration of the silent buffer substituted for undecodable effects (seconds)
    pub const FALLBACK_BUFFER_SECS: f32 = 0.5;

    /// Channel count of the silent fallback buffer
    pub const FALLBACK_BUFFER_CHANNELS: usize = 2;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings_are_valid() {
        assert!(AudioSettings::default().validate().is_ok());
        assert!(AnalyserConfig::default().validate().is_ok());
    }

    #[test]
    fn test_settings_reject_empty_scales() {
        let settings = AudioSettings {
            scales: Vec::new(),
            ..AudioSettings::default()
        };
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_settings_reject_non_positive_bpm() {
        let settings = AudioSettings {
            bpm: 0.0,
            ..AudioSettings::default()
        };
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_set_volume_clamps() {
        let mut settings = AudioSettings::default();
        assert_eq!(settings.set_volume(Bus::Music, 1.7), 1.0);
        assert_eq!(settings.volume(Bus::Music), 1.0);
        assert_eq!(settings.set_volume(Bus::Sfx, -0.2), 0.0);
    }

    #[test]
    fn test_set_volume_non_finite_is_silence() {
        let mut settings = AudioSettings::default();
        assert_eq!(settings.set_volume(Bus::Master, f32::NAN), 0.0);
        assert_eq!(settings.set_volume(Bus::Sfx, f32::INFINITY), 0.0);
        assert_eq!(settings.master_volume, 0.0);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_analyser_rejects_non_power_of_two() {
        let config = AnalyserConfig {
            fft_size: 300,
            ..AnalyserConfig::default()
        };
        assert!(config.validate().is_err());
        assert_eq!(AnalyserConfig::default().bin_count(), 128);
    }
}
