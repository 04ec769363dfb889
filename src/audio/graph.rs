//! Output pipeline: music and effects buses into a master stage, plus
//! analysis taps.
//!
//! The graph is pull-rendered. Whoever owns the output (the `cpal` callback,
//! or an offline render loop) calls [`AudioGraph::render`], which mixes every
//! scheduled voice and effect at the sample's audio-clock time. The control
//! thread only submits and removes voices; it never renders.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use super::effects::{EffectHandle, EffectVoice};
use super::voice::{Voice, VoiceArena, VoiceId};
use crate::params::{audio_constants::OUTPUT_LIMIT, AudioSettings, Bus};

/// Where an analyser reads the signal from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TapPoint {
    /// Post-gain music bus
    Music,
    /// Final mix (music + effects)
    Master,
}

#[derive(Debug, Clone, Copy)]
struct BusGains {
    master: f32,
    music: f32,
    sfx: f32,
}

/// Most recent samples seen at a tap point
#[derive(Debug)]
struct TapBuffer {
    samples: VecDeque<f32>,
    capacity: usize,
}

impl TapBuffer {
    fn new(capacity: usize) -> Self {
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    fn push(&mut self, sample: f32) {
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(sample);
    }
}

/// State shared between the control thread and the renderer
struct GraphState {
    sample_rate: u32,
    frames_rendered: u64,
    suspended: bool,
    gains: BusGains,
    voices: VoiceArena,
    effects: Vec<(EffectHandle, EffectVoice)>,
    next_effect: u64,
    music_tap: TapBuffer,
    master_tap: TapBuffer,
}

impl GraphState {
    fn now(&self) -> f64 {
        self.frames_rendered as f64 / self.sample_rate as f64
    }
}

/// Handle to the shared output graph (cheap to clone)
#[derive(Clone)]
pub struct AudioGraph {
    shared: Arc<Mutex<GraphState>>,
    sample_rate: u32,
}

impl AudioGraph {
    /// Create a graph rendering at `sample_rate`, keeping `tap_size` samples
    /// per analysis tap
    pub fn new(sample_rate: u32, settings: &AudioSettings, tap_size: usize) -> Self {
        let state = GraphState {
            sample_rate,
            frames_rendered: 0,
            suspended: false,
            gains: BusGains {
                master: settings.master_volume,
                music: settings.music_volume,
                sfx: settings.sfx_volume,
            },
            voices: VoiceArena::default(),
            effects: Vec::new(),
            next_effect: 0,
            music_tap: TapBuffer::new(tap_size),
            master_tap: TapBuffer::new(tap_size),
        };
        Self {
            shared: Arc::new(Mutex::new(state)),
            sample_rate,
        }
    }

    fn state(&self) -> MutexGuard<'_, GraphState> {
        // A panic elsewhere must not take the audio down with it
        self.shared
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Audio clock (seconds of audio rendered while not suspended)
    pub fn now(&self) -> f64 {
        self.state().now()
    }

    pub fn bus_gain(&self, bus: Bus) -> f32 {
        let gains = self.state().gains;
        match bus {
            Bus::Master => gains.master,
            Bus::Music => gains.music,
            Bus::Sfx => gains.sfx,
        }
    }

    pub fn set_bus_gain(&self, bus: Bus, value: f32) {
        let mut state = self.state();
        match bus {
            Bus::Master => state.gains.master = value,
            Bus::Music => state.gains.music = value,
            Bus::Sfx => state.gains.sfx = value,
        }
    }

    /// Hand a voice to the music bus
    pub fn add_voice(&self, voice: Voice) -> VoiceId {
        self.state().voices.insert(voice)
    }

    pub fn voice_count(&self) -> usize {
        self.state().voices.len()
    }

    /// Latest scheduled start time among live voices
    pub fn latest_voice_start(&self) -> Option<f64> {
        self.state()
            .voices
            .iter()
            .map(|(_, voice)| voice.start_time())
            .reduce(f64::max)
    }

    /// Drop voices whose stop time has passed; returns how many
    pub fn cleanup_voices(&self) -> usize {
        let mut state = self.state();
        let now = state.now();
        state.voices.cleanup(now)
    }

    /// Silence and drop every voice, including future ones
    pub fn stop_all_voices(&self) -> usize {
        self.state().voices.clear()
    }

    /// Start an effect on the effects bus
    pub fn add_effect(&self, effect: EffectVoice) -> EffectHandle {
        let mut state = self.state();
        let handle = EffectHandle(state.next_effect);
        state.next_effect += 1;
        state.effects.push((handle, effect));
        handle
    }

    /// Stop an effect; stopping a finished or unknown effect is a no-op
    pub fn stop_effect(&self, handle: EffectHandle) -> bool {
        let mut state = self.state();
        let before = state.effects.len();
        state.effects.retain(|(h, _)| *h != handle);
        state.effects.len() != before
    }

    pub fn effect_count(&self) -> usize {
        self.state().effects.len()
    }

    /// Freeze the clock and output silence
    pub fn suspend(&self) {
        self.state().suspended = true;
    }

    pub fn resume(&self) {
        self.state().suspended = false;
    }

    pub fn is_suspended(&self) -> bool {
        self.state().suspended
    }

    /// Copy a tap's recent samples (oldest first) into `out`
    pub fn copy_tap(&self, tap: TapPoint, out: &mut Vec<f32>) {
        let state = self.state();
        let buffer = match tap {
            TapPoint::Music => &state.music_tap,
            TapPoint::Master => &state.master_tap,
        };
        out.clear();
        out.extend(buffer.samples.iter().copied());
    }

    /// Fill an interleaved output buffer with `channels` channels
    pub fn render(&self, data: &mut [f32], channels: usize) {
        let channels = channels.max(1);
        let mut state = self.state();

        if state.suspended {
            data.fill(0.0);
            return;
        }

        let sample_rate = state.sample_rate;
        for frame in data.chunks_mut(channels) {
            let t = state.now();
            let gains = state.gains;

            let music = state.voices.mix(t) * gains.music;

            let (mut sfx_left, mut sfx_right) = (0.0, 0.0);
            for (_, effect) in state.effects.iter_mut() {
                let (l, r) = effect.next_frame(sample_rate);
                sfx_left += l;
                sfx_right += r;
            }

            // Safety limiter: hard clip to prevent ear damage
            let left = ((music + sfx_left * gains.sfx) * gains.master).clamp(-OUTPUT_LIMIT, OUTPUT_LIMIT);
            let right = ((music + sfx_right * gains.sfx) * gains.master).clamp(-OUTPUT_LIMIT, OUTPUT_LIMIT);

            match frame.len() {
                1 => frame[0] = 0.5 * (left + right),
                _ => {
                    frame[0] = left;
                    frame[1] = right;
                    frame[2..].fill(0.0);
                }
            }

            state.music_tap.push(music);
            state.master_tap.push(0.5 * (left + right));
            state.frames_rendered += 1;
        }

        state.effects.retain(|(_, effect)| !effect.is_finished());
    }

    /// Render `frames` interleaved frames offline (advances the clock)
    pub fn render_frames(&self, frames: usize, channels: usize) -> Vec<f32> {
        let mut data = vec![0.0; frames * channels.max(1)];
        self.render(&mut data, channels);
        data
    }

    /// Render until the audio clock reaches at least `seconds` more
    pub fn advance_clock(&self, seconds: f64) {
        let frames = (seconds * self.sample_rate as f64).round() as usize;
        self.render_frames(frames, 2);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::music::VoiceRole;
    use crate::params::TimbreBank;
    use crate::audio::voice::VoiceSynthesizer;

    fn graph() -> AudioGraph {
        AudioGraph::new(8000, &AudioSettings::default(), 256)
    }

    #[test]
    fn test_clock_follows_rendered_frames() {
        let graph = graph();
        assert_eq!(graph.now(), 0.0);
        graph.render_frames(4000, 2);
        assert!((graph.now() - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_suspend_freezes_clock_and_silences() {
        let graph = graph();
        let synth = VoiceSynthesizer::new(TimbreBank::default(), 0.5);
        synth.render(&graph, VoiceRole::Bass, 110.0, 0.0, 1.0);

        graph.suspend();
        let out = graph.render_frames(800, 2);
        assert!(out.iter().all(|s| *s == 0.0));
        assert_eq!(graph.now(), 0.0);

        graph.resume();
        let out = graph.render_frames(800, 2);
        assert!(out.iter().any(|s| *s != 0.0));
    }

    #[test]
    fn test_voices_reach_music_tap() {
        let graph = graph();
        let synth = VoiceSynthesizer::new(TimbreBank::default(), 0.5);
        synth.render(&graph, VoiceRole::Pad, 440.0, 0.0, 1.0);
        graph.render_frames(2000, 2);

        let mut tap = Vec::new();
        graph.copy_tap(TapPoint::Music, &mut tap);
        assert_eq!(tap.len(), 256);
        assert!(tap.iter().any(|s| s.abs() > 0.01));
    }

    #[test]
    fn test_muted_master_outputs_silence() {
        let graph = graph();
        let synth = VoiceSynthesizer::new(TimbreBank::default(), 0.5);
        synth.render(&graph, VoiceRole::Pad, 440.0, 0.0, 1.0);
        graph.set_bus_gain(Bus::Master, 0.0);
        let out = graph.render_frames(2000, 2);
        assert!(out.iter().all(|s| *s == 0.0));
        assert_eq!(graph.bus_gain(Bus::Master), 0.0);
    }

    #[test]
    fn test_cleanup_only_after_stop_time() {
        let graph = graph();
        let synth = VoiceSynthesizer::new(TimbreBank::default(), 0.5);
        // Arp voice: 0.5 s sustain + 0.3 s release
        synth.render(&graph, VoiceRole::Arp, 880.0, 0.0, 1.0);

        graph.advance_clock(0.7);
        assert_eq!(graph.cleanup_voices(), 0);
        assert_eq!(graph.voice_count(), 1);

        graph.advance_clock(0.2);
        assert_eq!(graph.cleanup_voices(), 1);
        assert_eq!(graph.voice_count(), 0);
    }

    #[test]
    fn test_output_is_limited() {
        let graph = AudioGraph::new(
            8000,
            &AudioSettings {
                master_volume: 1.0,
                music_volume: 1.0,
                ..AudioSettings::default()
            },
            64,
        );
        let synth = VoiceSynthesizer::new(TimbreBank::default(), 0.5);
        for _ in 0..20 {
            synth.render(&graph, VoiceRole::Bass, 55.0, 0.0, 1.0);
        }
        let out = graph.render_frames(4000, 1);
        assert!(out.iter().all(|s| s.abs() <= OUTPUT_LIMIT));
    }
}
