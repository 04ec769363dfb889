//! Per-note synthesis: oscillator → biquad filter → ADSR gain.
//!
//! A [`Voice`] is a short-lived value with a start and stop time fixed at
//! creation. Voices live in a [`VoiceArena`] inside the audio graph, keyed by a
//! monotonically increasing [`VoiceId`], and are removed by a pull-based
//! cleanup pass once their stop time has passed.

use std::f32::consts::PI;

use super::graph::AudioGraph;
use crate::music::VoiceRole;
use crate::params::{FilterKind, TimbreBank, TimbrePreset, Waveform};

/// Identifier of a scheduled voice (never reused)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VoiceId(pub u64);

/// Phase-accumulating oscillator
#[derive(Debug, Clone)]
pub struct Oscillator {
    waveform: Waveform,
    /// Phase increment per sample (cycles)
    step: f32,
    phase: f32,
}

impl Oscillator {
    pub fn new(waveform: Waveform, frequency_hz: f32, detune_cents: f32, sample_rate: f32) -> Self {
        let frequency = frequency_hz * 2f32.powf(detune_cents / 1200.0);
        Self {
            waveform,
            step: frequency / sample_rate,
            phase: 0.0,
        }
    }

    /// Effective frequency after detune (Hz)
    pub fn frequency_hz(&self, sample_rate: f32) -> f32 {
        self.step * sample_rate
    }

    pub fn next_sample(&mut self) -> f32 {
        let p = self.phase;
        let value = match self.waveform {
            Waveform::Sine => (2.0 * PI * p).sin(),
            Waveform::Triangle => {
                if p < 0.25 {
                    4.0 * p
                } else if p < 0.75 {
                    2.0 - 4.0 * p
                } else {
                    4.0 * p - 4.0
                }
            }
            Waveform::Sawtooth => 2.0 * p - 1.0,
            Waveform::Square => {
                if p < 0.5 {
                    1.0
                } else {
                    -1.0
                }
            }
        };
        self.phase = (self.phase + self.step).fract();
        value
    }
}

/// RBJ cookbook biquad (direct form I)
#[derive(Debug, Clone)]
pub struct Biquad {
    b0: f32,
    b1: f32,
    b2: f32,
    a1: f32,
    a2: f32,
    x1: f32,
    x2: f32,
    y1: f32,
    y2: f32,
}

impl Biquad {
    pub fn new(kind: FilterKind, cutoff_hz: f32, q: f32, sample_rate: f32) -> Self {
        let w0 = 2.0 * PI * (cutoff_hz / sample_rate).min(0.49);
        let alpha = w0.sin() / (2.0 * q.max(1e-4));
        let cos_w0 = w0.cos();
        let a0 = 1.0 + alpha;

        let (b0, b1, b2) = match kind {
            FilterKind::Lowpass => ((1.0 - cos_w0) / 2.0, 1.0 - cos_w0, (1.0 - cos_w0) / 2.0),
            FilterKind::Highpass => ((1.0 + cos_w0) / 2.0, -(1.0 + cos_w0), (1.0 + cos_w0) / 2.0),
            FilterKind::Bandpass => (alpha, 0.0, -alpha),
        };

        Self {
            b0: b0 / a0,
            b1: b1 / a0,
            b2: b2 / a0,
            a1: (-2.0 * cos_w0) / a0,
            a2: (1.0 - alpha) / a0,
            x1: 0.0,
            x2: 0.0,
            y1: 0.0,
            y2: 0.0,
        }
    }

    pub fn process(&mut self, input: f32) -> f32 {
        let output = self.b0 * input + self.b1 * self.x1 + self.b2 * self.x2
            - self.a1 * self.y1
            - self.a2 * self.y2;
        self.x2 = self.x1;
        self.x1 = input;
        self.y2 = self.y1;
        self.y1 = output;
        output
    }
}

/// Piecewise-linear gain automation (absolute audio-clock times)
#[derive(Debug, Clone)]
pub struct Envelope {
    points: [(f64, f32); 5],
}

impl Envelope {
    /// ADSR shape for a note starting at `start` whose release begins at
    /// `start + sustain_s`.
    ///
    /// Attack and decay ends are clamped to the sustain point; a preset whose
    /// attack + decay runs past it jumps to the sustain level there.
    pub fn adsr(preset: &TimbrePreset, start: f64, volume: f32, sustain_s: f64) -> Self {
        let sustain_point = start + sustain_s;
        let attack_end = (start + preset.attack_s).min(sustain_point);
        let decay_end = (attack_end + preset.decay_s).min(sustain_point);
        let stop = sustain_point + preset.release_s;
        let held = volume * preset.sustain_level;

        Self {
            points: [
                (start, 0.0),
                (attack_end, volume),
                (decay_end, held),
                (sustain_point, held),
                (stop, 0.0),
            ],
        }
    }

    /// Time the envelope returns to silence
    pub fn end_time(&self) -> f64 {
        self.points[self.points.len() - 1].0
    }

    pub fn value_at(&self, t: f64) -> f32 {
        let first = self.points[0];
        if t < first.0 {
            return 0.0;
        }

        // Last segment whose start is at or before t (later points win ties)
        let Some(i) = self.points.iter().rposition(|(time, _)| *time <= t) else {
            return 0.0;
        };
        if i + 1 == self.points.len() {
            return self.points[i].1;
        }

        let (t0, v0) = self.points[i];
        let (t1, v1) = self.points[i + 1];
        let span = t1 - t0;
        if span <= 0.0 {
            return v1;
        }
        let ratio = ((t - t0) / span) as f32;
        v0 + (v1 - v0) * ratio
    }
}

/// One sounding note
#[derive(Debug, Clone)]
pub struct Voice {
    pub role: VoiceRole,
    oscillator: Oscillator,
    filter: Biquad,
    envelope: Envelope,
    start_time: f64,
    stop_time: f64,
}

impl Voice {
    pub fn start_time(&self) -> f64 {
        self.start_time
    }

    pub fn stop_time(&self) -> f64 {
        self.stop_time
    }

    /// Whether the voice produces sound at `t`
    pub fn is_sounding(&self, t: f64) -> bool {
        t >= self.start_time && t < self.stop_time
    }

    /// Render the sample at audio-clock time `t`
    pub fn next_sample(&mut self, t: f64) -> f32 {
        if !self.is_sounding(t) {
            return 0.0;
        }
        let raw = self.oscillator.next_sample();
        self.filter.process(raw) * self.envelope.value_at(t)
    }
}

/// Voices owned by the graph until their stop time passes
#[derive(Debug, Default)]
pub struct VoiceArena {
    voices: Vec<(VoiceId, Voice)>,
    next_id: u64,
}

impl VoiceArena {
    pub fn insert(&mut self, voice: Voice) -> VoiceId {
        let id = VoiceId(self.next_id);
        self.next_id += 1;
        self.voices.push((id, voice));
        id
    }

    pub fn len(&self) -> usize {
        self.voices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.voices.is_empty()
    }

    pub fn contains(&self, id: VoiceId) -> bool {
        self.voices.iter().any(|(voice_id, _)| *voice_id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (VoiceId, &Voice)> {
        self.voices.iter().map(|(id, voice)| (*id, voice))
    }

    /// Mixed sample of every voice at time `t`
    pub fn mix(&mut self, t: f64) -> f32 {
        self.voices
            .iter_mut()
            .map(|(_, voice)| voice.next_sample(t))
            .sum()
    }

    /// Drop voices whose stop time is at or before `now`; returns how many
    pub fn cleanup(&mut self, now: f64) -> usize {
        let before = self.voices.len();
        self.voices.retain(|(_, voice)| voice.stop_time > now);
        before - self.voices.len()
    }

    /// Drop every voice, including ones scheduled for the future
    pub fn clear(&mut self) -> usize {
        let count = self.voices.len();
        self.voices.clear();
        count
    }
}

/// Turns note requests into voices on the graph's music bus
#[derive(Debug, Clone)]
pub struct VoiceSynthesizer {
    timbres: TimbreBank,
    note_sustain_s: f64,
}

impl VoiceSynthesizer {
    pub fn new(timbres: TimbreBank, note_sustain_s: f64) -> Self {
        Self {
            timbres,
            note_sustain_s,
        }
    }

    pub fn timbres(&self) -> &TimbreBank {
        &self.timbres
    }

    /// Build a voice without scheduling it
    pub fn build(
        &self,
        role: VoiceRole,
        frequency_hz: f32,
        start_time: f64,
        volume: f32,
        sample_rate: f32,
    ) -> Voice {
        let preset = self.timbres.preset(role);
        let envelope = Envelope::adsr(preset, start_time, volume, self.note_sustain_s);
        Voice {
            role,
            oscillator: Oscillator::new(
                preset.waveform,
                frequency_hz,
                preset.detune_cents,
                sample_rate,
            ),
            filter: Biquad::new(
                preset.filter_kind,
                preset.filter_cutoff_hz,
                preset.filter_q,
                sample_rate,
            ),
            stop_time: envelope.end_time(),
            envelope,
            start_time,
        }
    }

    /// Schedule one voice on the music bus
    pub fn render(
        &self,
        graph: &AudioGraph,
        role: VoiceRole,
        frequency_hz: f32,
        start_time: f64,
        volume: f32,
    ) -> VoiceId {
        let voice = self.build(role, frequency_hz, start_time, volume, graph.sample_rate() as f32);
        graph.add_voice(voice)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SR: f32 = 44100.0;

    fn synth() -> VoiceSynthesizer {
        VoiceSynthesizer::new(TimbreBank::default(), 0.5)
    }

    #[test]
    fn test_envelope_stages() {
        let preset = TimbrePreset::bass();
        let env = Envelope::adsr(&preset, 1.0, 0.5, 0.5);

        assert_eq!(env.value_at(0.99), 0.0);
        assert_eq!(env.value_at(1.0), 0.0);
        // Halfway through attack
        assert!((env.value_at(1.05) - 0.25).abs() < 1e-4);
        // Attack peak
        assert!((env.value_at(1.1) - 0.5).abs() < 1e-4);
        // Decay is clamped at the sustain point (0.1 + 0.3 < 0.5, so not here)
        assert!((env.value_at(1.4) - 0.2).abs() < 1e-4);
        // Holding
        assert!((env.value_at(1.45) - 0.2).abs() < 1e-4);
        // Release: 0.5 s from 1.5 to 2.0
        assert!((env.value_at(1.75) - 0.1).abs() < 1e-4);
        assert_eq!(env.value_at(2.0), 0.0);
        assert_eq!(env.end_time(), 2.0);
    }

    #[test]
    fn test_envelope_jumps_to_sustain_when_attack_fills_note() {
        // Pad: attack 0.5 reaches the sustain point exactly
        let preset = TimbrePreset::pad();
        let env = Envelope::adsr(&preset, 0.0, 1.0, 0.5);

        assert!((env.value_at(0.499) - 0.998).abs() < 1e-2);
        assert!((env.value_at(0.5) - 0.8).abs() < 1e-4);
        assert!((env.end_time() - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_stop_time_is_sustain_plus_release() {
        let synth = synth();
        for role in VoiceRole::ALL {
            let voice = synth.build(role, 220.0, 3.0, 1.0, SR);
            let release = synth.timbres().preset(role).release_s;
            assert!((voice.stop_time() - (3.5 + release)).abs() < 1e-9);
            assert_eq!(voice.start_time(), 3.0);
        }
    }

    #[test]
    fn test_voice_silent_outside_lifetime() {
        let mut voice = synth().build(VoiceRole::Arp, 880.0, 0.1, 1.0, SR);
        assert_eq!(voice.next_sample(0.05), 0.0);
        assert_eq!(voice.next_sample(voice.stop_time()), 0.0);
        assert!(voice.is_sounding(0.2));
    }

    #[test]
    fn test_detune_raises_pitch() {
        let osc = Oscillator::new(Waveform::Sine, 440.0, 1200.0, SR);
        assert!((osc.frequency_hz(SR) - 880.0).abs() < 1e-2);
    }

    #[test]
    fn test_waveforms_stay_bounded() {
        for waveform in [
            Waveform::Sine,
            Waveform::Triangle,
            Waveform::Sawtooth,
            Waveform::Square,
        ] {
            let mut osc = Oscillator::new(waveform, 440.0, 0.0, SR);
            for _ in 0..1000 {
                let s = osc.next_sample();
                assert!((-1.0..=1.0).contains(&s), "{:?} produced {}", waveform, s);
            }
        }
    }

    #[test]
    fn test_lowpass_passes_dc_and_highpass_blocks_it() {
        let mut lp = Biquad::new(FilterKind::Lowpass, 300.0, 0.707, SR);
        let mut hp = Biquad::new(FilterKind::Highpass, 1000.0, 0.707, SR);
        let (mut lp_out, mut hp_out) = (0.0, 0.0);
        for _ in 0..20000 {
            lp_out = lp.process(1.0);
            hp_out = hp.process(1.0);
        }
        assert!((lp_out - 1.0).abs() < 1e-3);
        assert!(hp_out.abs() < 1e-3);
    }

    #[test]
    fn test_arena_cleanup_respects_stop_time() {
        let synth = synth();
        let mut arena = VoiceArena::default();
        let early = arena.insert(synth.build(VoiceRole::Arp, 440.0, 0.0, 1.0, SR));
        let late = arena.insert(synth.build(VoiceRole::Pad, 440.0, 0.0, 1.0, SR));

        // Arp stops at 0.8, pad at 2.0
        let arp_stop = arena.iter().next().map(|(_, v)| v.stop_time()).unwrap();
        assert_eq!(arena.cleanup(0.79), 0);
        assert_eq!(arena.cleanup(arp_stop), 1);
        assert!(!arena.contains(early));
        assert!(arena.contains(late));
        assert_eq!(arena.cleanup(5.0), 1);
        assert!(arena.is_empty());
    }

    #[test]
    fn test_arena_ids_are_monotonic() {
        let synth = synth();
        let mut arena = VoiceArena::default();
        let a = arena.insert(synth.build(VoiceRole::Bass, 110.0, 0.0, 1.0, SR));
        arena.clear();
        let b = arena.insert(synth.build(VoiceRole::Bass, 110.0, 0.0, 1.0, SR));
        assert!(b > a);
    }
}
