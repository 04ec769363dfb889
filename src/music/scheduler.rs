//! Look-ahead note scheduler.
//!
//! Notes are placed on the audio clock slightly ahead of "now" so that the
//! control thread's tick jitter never reaches the output. Each `advance()`
//! fills the window `[now, now + schedule_ahead)` and stops.

use rand_pcg::Pcg32;

use super::harmony::{HarmonyEngine, VoiceRole};
use crate::audio::{AudioGraph, VoiceSynthesizer};
use crate::params::{AudioSettings, SchedulerParams, TimbreBank};

/// A note handed to the synthesizer during `advance()`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScheduledNote {
    pub role: VoiceRole,
    pub frequency_hz: f32,
    /// Audio-clock start time (seconds)
    pub time: f64,
    pub volume: f32,
}

pub struct NoteScheduler {
    harmony: HarmonyEngine,
    synth: VoiceSynthesizer,
    params: SchedulerParams,
    playing: bool,
    next_note_time: f64,
    beat_index: u32,
    total_beats: u64,
    next_section_change_at_beat: u64,
}

impl NoteScheduler {
    pub fn new(
        settings: &AudioSettings,
        params: SchedulerParams,
        timbres: TimbreBank,
        rng: Pcg32,
    ) -> Self {
        let harmony = HarmonyEngine::new(settings.bpm, settings.scales.clone(), rng);
        let synth = VoiceSynthesizer::new(timbres, params.note_sustain_s);
        Self {
            harmony,
            synth,
            next_section_change_at_beat: params.first_section_change_beat,
            params,
            playing: false,
            next_note_time: 0.0,
            beat_index: 0,
            total_beats: 0,
        }
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn harmony(&self) -> &HarmonyEngine {
        &self.harmony
    }

    pub fn harmony_mut(&mut self) -> &mut HarmonyEngine {
        &mut self.harmony
    }

    pub fn beat_index(&self) -> u32 {
        self.beat_index
    }

    pub fn total_beats(&self) -> u64 {
        self.total_beats
    }

    pub fn next_note_time(&self) -> f64 {
        self.next_note_time
    }

    pub fn next_section_change_at_beat(&self) -> u64 {
        self.next_section_change_at_beat
    }

    /// Begin playback at the graph's current time. No-op while playing.
    pub fn start(&mut self, graph: &AudioGraph) {
        if self.playing {
            return;
        }

        self.playing = true;
        self.next_note_time = graph.now();
        self.beat_index = 0;
        self.total_beats = 0;
        self.next_section_change_at_beat = self.params.first_section_change_beat;
        self.harmony.reset_tempo();
        self.harmony.choose_random_scale();

        log::info!(
            "Music started in {} {} @ {:.0} BPM",
            self.harmony.key().name(),
            self.harmony.scale().name(),
            self.harmony.bpm()
        );
    }

    /// Stop playback and silence every scheduled voice, including future ones
    pub fn stop(&mut self, graph: &AudioGraph) {
        let dropped = graph.stop_all_voices();
        if self.playing {
            log::info!("Music stopped ({} voices dropped)", dropped);
        }
        self.playing = false;
        self.beat_index = 0;
        self.total_beats = 0;
        self.next_section_change_at_beat = self.params.first_section_change_beat;
    }

    /// Schedule every beat that falls inside the look-ahead window
    pub fn advance(&mut self, graph: &AudioGraph) -> Vec<ScheduledNote> {
        let mut scheduled = Vec::new();
        if !self.playing {
            return scheduled;
        }

        let horizon = graph.now() + self.params.schedule_ahead_s;
        let cycle = self.params.beat_cycle().max(1);

        while self.next_note_time < horizon {
            let time = self.next_note_time;
            for note in self.harmony.notes_for_beat(self.beat_index) {
                self.synth
                    .render(graph, note.role, note.frequency_hz, time, note.volume);
                scheduled.push(ScheduledNote {
                    role: note.role,
                    frequency_hz: note.frequency_hz,
                    time,
                    volume: note.volume,
                });
            }

            self.beat_index = (self.beat_index + 1) % cycle;
            self.total_beats += 1;
            self.next_note_time += self.harmony.beat_duration();

            if self.total_beats >= self.next_section_change_at_beat {
                self.harmony.section_change();
                self.next_section_change_at_beat = self.total_beats
                    + self.harmony.section_span(
                        self.params.section_min_beats,
                        self.params.section_jitter_beats,
                    );
            }
        }

        scheduled
    }
}
