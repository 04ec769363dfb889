//! Engine facade: the one object gameplay code talks to.
//!
//! Owns the graph handle, the scheduler, the effects player and both
//! analysers. Every failure is absorbed here: an engine without audio keeps
//! answering with zero frames and `None` handles.

use rand::SeedableRng;
use rand_pcg::Pcg32;
use std::path::{Path, PathBuf};

use crate::audio::{
    AudioFeatureFrame, AudioGraph, EffectHandle, EffectOptions, OutputDevice, SoundBank,
    SoundEffectPlayer, SpectrumAnalyzer,
};
use crate::music::NoteScheduler;
use crate::params::{audio_constants::OFFLINE_SAMPLE_RATE, Bus, EngineConfig};

pub struct AudioEngine {
    config: EngineConfig,
    graph: Option<AudioGraph>,
    device: Option<OutputDevice>,
    scheduler: NoteScheduler,
    effects: SoundEffectPlayer,
    master_analyzer: SpectrumAnalyzer,
    music_analyzer: SpectrumAnalyzer,
    last_music_frame: AudioFeatureFrame,
    /// Seconds of tick time left before the master bus is restored
    mute_remaining_s: Option<f64>,
    /// Audio-clock time of the last scheduler pass
    last_advance_at: Option<f64>,
}

impl AudioEngine {
    /// Uninitialized engine with a randomly seeded composer
    pub fn new(config: EngineConfig) -> Self {
        Self::with_seed(config, rand::random())
    }

    /// Uninitialized engine with a reproducible composer. An invalid
    /// config is replaced by the defaults.
    pub fn with_seed(config: EngineConfig, seed: u64) -> Self {
        let config = usable_config(config);
        let scheduler = NoteScheduler::new(
            &config.audio,
            config.scheduler.clone(),
            config.timbres.clone(),
            Pcg32::seed_from_u64(seed),
        );
        Self {
            master_analyzer: SpectrumAnalyzer::master(&config.analysis),
            music_analyzer: SpectrumAnalyzer::music(&config.analysis),
            effects: SoundEffectPlayer::new(SoundBank::new(OFFLINE_SAMPLE_RATE)),
            scheduler,
            config,
            graph: None,
            device: None,
            last_music_frame: AudioFeatureFrame::SILENT,
            mute_remaining_s: None,
            last_advance_at: None,
        }
    }

    /// Engine rendering into an existing graph (nobody drives the output;
    /// the caller renders it)
    pub fn with_graph(config: EngineConfig, graph: AudioGraph, seed: u64) -> Self {
        let mut engine = Self::with_seed(config, seed);
        engine.graph = Some(graph);
        engine
    }

    /// Headless engine with a fresh graph at `sample_rate`
    pub fn offline(config: EngineConfig, sample_rate: u32, seed: u64) -> Self {
        let config = usable_config(config);
        let graph = AudioGraph::new(sample_rate, &config.audio, config.analysis.fft_size);
        Self::with_graph(config, graph, seed)
    }

    /// Acquire the default output device. Returns `false` (and stays
    /// uninitialized) when the platform has no usable audio.
    pub fn init_audio(&mut self) -> bool {
        if self.graph.is_some() {
            return true;
        }

        match OutputDevice::open(&self.config.audio, self.config.analysis.fft_size) {
            Ok((device, graph)) => {
                log::info!(
                    "Audio initialized on {} ({} channels)",
                    device.name(),
                    device.channels()
                );
                self.device = Some(device);
                self.graph = Some(graph);
                true
            }
            Err(e) => {
                log::warn!("Audio unavailable: {}", e);
                false
            }
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.graph.is_some()
    }

    /// Name of the output device, if one is open
    pub fn device_name(&self) -> Option<&str> {
        self.device.as_ref().map(|device| device.name())
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn graph(&self) -> Option<&AudioGraph> {
        self.graph.as_ref()
    }

    pub fn scheduler(&self) -> &NoteScheduler {
        &self.scheduler
    }

    pub fn sound_bank(&self) -> &SoundBank {
        self.effects.bank()
    }

    pub fn sound_bank_mut(&mut self) -> &mut SoundBank {
        self.effects.bank_mut()
    }

    /// Set a bus volume (clamped to 0.0-1.0) in settings and on the graph.
    /// While a temporary mute is active the master value takes effect when
    /// the mute ends.
    pub fn set_volume(&mut self, bus: Bus, value: f32) {
        let value = self.config.audio.set_volume(bus, value);
        let muted = self.mute_remaining_s.is_some();
        if let Some(graph) = &self.graph {
            if !(bus == Bus::Master && muted) {
                graph.set_bus_gain(bus, value);
            }
        }
    }

    /// Queue a WAV file for background decoding
    pub fn load_sound(&mut self, name: impl Into<String>, path: impl Into<PathBuf>) {
        self.effects.bank_mut().load(name, path);
    }

    /// Queue the standard game effects from `dir`
    pub fn preload_sounds(&mut self, dir: &Path) {
        self.effects.bank_mut().preload_defaults(dir);
    }

    /// Play a loaded effect; `None` when uninitialized or the name is unknown
    pub fn play_effect(&mut self, name: &str, options: EffectOptions) -> Option<EffectHandle> {
        let graph = self.graph.as_ref()?;
        self.effects.bank_mut().poll();
        self.effects.play(graph, name, options)
    }

    pub fn stop_effect(&self, handle: EffectHandle) {
        if let Some(graph) = &self.graph {
            self.effects.stop(graph, handle);
        }
    }

    /// Suspend output: silence and a frozen audio clock
    pub fn pause_all(&self) {
        if let Some(graph) = &self.graph {
            graph.suspend();
        }
    }

    pub fn resume_all(&self) {
        if let Some(graph) = &self.graph {
            graph.resume();
        }
    }

    pub fn is_paused(&self) -> bool {
        self.graph.as_ref().is_some_and(|graph| graph.is_suspended())
    }

    /// Zero the master bus for `duration_ms` of tick time
    pub fn mute_all_temporarily(&mut self, duration_ms: u64) {
        if let Some(graph) = &self.graph {
            graph.set_bus_gain(Bus::Master, 0.0);
            self.mute_remaining_s = Some(duration_ms as f64 / 1000.0);
        }
    }

    pub fn start_music(&mut self) {
        let Some(graph) = &self.graph else {
            return;
        };
        if self.scheduler.is_playing() {
            return;
        }
        self.scheduler.start(graph);
        self.scheduler.advance(graph);
        self.last_advance_at = Some(graph.now());
    }

    pub fn stop_music(&mut self) {
        if let Some(graph) = &self.graph {
            self.scheduler.stop(graph);
        }
        self.last_advance_at = None;
        self.last_music_frame = AudioFeatureFrame::SILENT;
        self.music_analyzer.reset();
    }

    pub fn restart_music(&mut self) {
        self.stop_music();
        self.start_music();
    }

    /// Last music-bus frame (gated peaks, unsmoothed); zero while no music
    /// plays
    pub fn music_features(&self) -> AudioFeatureFrame {
        self.last_music_frame
    }

    /// Per-frame update: schedule music, expire voices, analyse the output.
    /// Returns the smoothed full-mix feature frame.
    pub fn tick(&mut self, delta_time: f64) -> AudioFeatureFrame {
        self.effects.bank_mut().poll();

        let Some(graph) = self.graph.clone() else {
            return AudioFeatureFrame::SILENT;
        };

        self.update_mute(&graph, delta_time);

        if self.scheduler.is_playing() {
            let now = graph.now();
            let due = self
                .last_advance_at
                .map_or(true, |last| now - last >= self.config.scheduler.advance_interval_s);
            if due {
                self.scheduler.advance(&graph);
                self.last_advance_at = Some(now);
            }
            self.last_music_frame = self.music_analyzer.sample(Some(&graph));
        } else {
            self.last_music_frame = AudioFeatureFrame::SILENT;
        }

        graph.cleanup_voices();
        self.master_analyzer.sample(Some(&graph))
    }

    fn update_mute(&mut self, graph: &AudioGraph, delta_time: f64) {
        if let Some(remaining) = self.mute_remaining_s {
            let remaining = remaining - delta_time;
            if remaining <= 0.0 {
                graph.set_bus_gain(Bus::Master, self.config.audio.master_volume);
                self.mute_remaining_s = None;
            } else {
                self.mute_remaining_s = Some(remaining);
            }
        }
    }
}

fn usable_config(config: EngineConfig) -> EngineConfig {
    match config.validate() {
        Ok(()) => config,
        Err(e) => {
            log::warn!("Invalid engine config ({}); using defaults", e);
            EngineConfig::default()
        }
    }
}
