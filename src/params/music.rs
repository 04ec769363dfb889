//! Composer timing parameters and voice timbre presets.

use serde::Deserialize;

use crate::error::{AudioError, AudioResult};
use crate::music::VoiceRole;

/// Look-ahead scheduler timing
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SchedulerParams {
    /// How far ahead of the audio clock notes are scheduled (seconds)
    pub schedule_ahead_s: f64,

    /// Longest gap hosts may leave between `advance()` calls (seconds)
    /// Must stay below `schedule_ahead_s` or the window starves.
    pub advance_interval_s: f64,

    /// Beats per measure; the beat index wraps every two measures
    pub beats_per_measure: u32,

    /// Shortest section length (beats)
    pub section_min_beats: u64,

    /// Random extra section length, drawn from `0..section_jitter_beats`
    pub section_jitter_beats: u64,

    /// Beat at which the first section change happens
    pub first_section_change_beat: u64,

    /// Time from note start to the beginning of the release ramp (seconds)
    pub note_sustain_s: f64,
}

impl Default for SchedulerParams {
    fn default() -> Self {
        Self {
            schedule_ahead_s: 0.2,
            advance_interval_s: 0.1,
            beats_per_measure: 4,
            section_min_beats: 16,
            section_jitter_beats: 8,
            first_section_change_beat: 16,
            note_sustain_s: 0.5,
        }
    }
}

impl SchedulerParams {
    /// Beat index period (two measures)
    pub fn beat_cycle(&self) -> u32 {
        self.beats_per_measure * 2
    }

    pub fn validate(&self) -> AudioResult<()> {
        if !(self.schedule_ahead_s > 0.0) {
            return Err(AudioError::invalid_config(
                "schedule_ahead_s",
                "must be > 0",
            ));
        }
        if !(self.advance_interval_s > 0.0 && self.advance_interval_s < self.schedule_ahead_s) {
            return Err(AudioError::invalid_config(
                "advance_interval_s",
                format!(
                    "must be within (0, schedule_ahead_s = {})",
                    self.schedule_ahead_s
                ),
            ));
        }
        if self.beats_per_measure == 0 {
            return Err(AudioError::invalid_config(
                "beats_per_measure",
                "must be > 0",
            ));
        }
        if self.section_min_beats == 0 || self.section_jitter_beats == 0 {
            return Err(AudioError::invalid_config(
                "section_min_beats",
                "section length and jitter must be > 0",
            ));
        }
        if !(self.note_sustain_s > 0.0) {
            return Err(AudioError::invalid_config("note_sustain_s", "must be > 0"));
        }
        Ok(())
    }
}

/// Oscillator waveform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Waveform {
    Sine,
    Triangle,
    Sawtooth,
    Square,
}

/// Biquad filter response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterKind {
    Lowpass,
    Highpass,
    Bandpass,
}

/// Immutable synthesis recipe for one voice role
#[derive(Debug, Clone, Deserialize)]
pub struct TimbrePreset {
    pub waveform: Waveform,

    /// Oscillator detune (cents)
    pub detune_cents: f32,

    /// Envelope attack (seconds)
    pub attack_s: f64,

    /// Envelope decay (seconds)
    pub decay_s: f64,

    /// Sustain level relative to note volume (0.0-1.0)
    pub sustain_level: f32,

    /// Envelope release (seconds)
    pub release_s: f64,

    pub filter_kind: FilterKind,

    /// Filter cutoff / center frequency (Hz)
    pub filter_cutoff_hz: f32,

    /// Filter resonance (Q factor)
    pub filter_q: f32,
}

impl TimbrePreset {
    /// Round, filtered low end
    pub fn bass() -> Self {
        Self {
            waveform: Waveform::Triangle,
            detune_cents: 0.0,
            attack_s: 0.1,
            decay_s: 0.3,
            sustain_level: 0.4,
            release_s: 0.5,
            filter_kind: FilterKind::Lowpass,
            filter_cutoff_hz: 300.0,
            filter_q: 5.0,
        }
    }

    /// Slow swelling chords
    pub fn pad() -> Self {
        Self {
            waveform: Waveform::Sine,
            detune_cents: 5.0,
            attack_s: 0.5,
            decay_s: 0.1,
            sustain_level: 0.8,
            release_s: 1.5,
            filter_kind: FilterKind::Lowpass,
            filter_cutoff_hz: 2000.0,
            filter_q: 1.0,
        }
    }

    /// Thin plucked arpeggio
    pub fn arp() -> Self {
        Self {
            waveform: Waveform::Sawtooth,
            detune_cents: 10.0,
            attack_s: 0.02,
            decay_s: 0.1,
            sustain_level: 0.2,
            release_s: 0.3,
            filter_kind: FilterKind::Highpass,
            filter_cutoff_hz: 1000.0,
            filter_q: 2.0,
        }
    }

    pub fn validate(&self, role: VoiceRole) -> AudioResult<()> {
        let name = format!("timbres.{}", role.as_str());
        if [self.attack_s, self.decay_s, self.release_s]
            .iter()
            .any(|t| !(*t >= 0.0))
        {
            return Err(AudioError::invalid_config(
                name,
                "envelope times must be >= 0",
            ));
        }
        if !(0.0..=1.0).contains(&self.sustain_level) {
            return Err(AudioError::invalid_config(
                name,
                format!("sustain_level must be within 0.0-1.0, got {}", self.sustain_level),
            ));
        }
        if !(self.filter_cutoff_hz > 0.0 && self.filter_q > 0.0) {
            return Err(AudioError::invalid_config(
                name,
                "filter cutoff and Q must be > 0",
            ));
        }
        Ok(())
    }
}

/// One preset per voice role, fixed at startup
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TimbreBank {
    pub bass: TimbrePreset,
    pub pad: TimbrePreset,
    pub arp: TimbrePreset,
}

impl Default for TimbreBank {
    fn default() -> Self {
        Self {
            bass: TimbrePreset::bass(),
            pad: TimbrePreset::pad(),
            arp: TimbrePreset::arp(),
        }
    }
}

impl TimbreBank {
    pub fn preset(&self, role: VoiceRole) -> &TimbrePreset {
        match role {
            VoiceRole::Bass => &self.bass,
            VoiceRole::Pad => &self.pad,
            VoiceRole::Arp => &self.arp,
        }
    }

    pub fn validate(&self) -> AudioResult<()> {
        for role in VoiceRole::ALL {
            self.preset(role).validate(role)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert!(SchedulerParams::default().validate().is_ok());
        assert!(TimbreBank::default().validate().is_ok());
        assert_eq!(SchedulerParams::default().beat_cycle(), 8);
    }

    #[test]
    fn test_advance_interval_must_fit_window() {
        let params = SchedulerParams {
            advance_interval_s: 0.3,
            ..SchedulerParams::default()
        };
        assert!(params.validate().is_err());
    }

    #[test]
    fn test_preset_lookup_by_role() {
        let bank = TimbreBank::default();
        assert_eq!(bank.preset(VoiceRole::Bass).waveform, Waveform::Triangle);
        assert_eq!(bank.preset(VoiceRole::Pad).filter_cutoff_hz, 2000.0);
        assert_eq!(bank.preset(VoiceRole::Arp).filter_kind, FilterKind::Highpass);
    }

    #[test]
    fn test_preset_rejects_sustain_above_one() {
        let mut bank = TimbreBank::default();
        bank.pad.sustain_level = 1.2;
        assert!(bank.validate().is_err());
    }
}
