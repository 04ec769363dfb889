//! Procedural key, scale and rhythm generation.
//!
//! The harmony engine owns the musical state that changes between sections:
//! which key and scale are active, the tempo, and three 8-step on/off
//! sequences for the bass, pad and arpeggio voices. All randomness comes from
//! a seeded [`Pcg32`] so a given seed always produces the same music.

use rand::Rng;
use rand_pcg::Pcg32;
use serde::Deserialize;

use crate::params::audio_constants::DEFAULT_BPM;

/// Concert pitch reference (A4, Hz)
pub const REFERENCE_HZ: f32 = 440.0;

/// Steps per rhythmic sequence
pub const SEQUENCE_STEPS: usize = 8;

/// One on/off pattern per voice role
pub type StepSequence = [bool; SEQUENCE_STEPS];

const BASS_TEMPLATE: StepSequence = [true, false, false, false, true, false, false, false];
const PAD_TEMPLATE: StepSequence = [true, false, false, true, false, false, true, false];
const ARP_TEMPLATE: StepSequence = [false, true, false, true, false, true, false, true];

/// Probability that each sequence gets one step flipped on regeneration.
/// Busier voices vary more.
const BASS_VARIATION: f64 = 0.5;
const PAD_VARIATION: f64 = 0.7;
const ARP_VARIATION: f64 = 0.8;

/// Chance that a section change also picks a new key and scale
const RESCALE_PROBABILITY: f64 = 0.3;

/// Tempo wander range applied on every section change (fraction of base bpm)
const BPM_WANDER: (f32, f32) = (0.9, 1.1);

/// The twelve pitch classes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PitchClass {
    C,
    CSharp,
    D,
    DSharp,
    E,
    F,
    FSharp,
    G,
    GSharp,
    A,
    ASharp,
    B,
}

impl PitchClass {
    pub const ALL: [PitchClass; 12] = [
        PitchClass::C,
        PitchClass::CSharp,
        PitchClass::D,
        PitchClass::DSharp,
        PitchClass::E,
        PitchClass::F,
        PitchClass::FSharp,
        PitchClass::G,
        PitchClass::GSharp,
        PitchClass::A,
        PitchClass::ASharp,
        PitchClass::B,
    ];

    /// Semitone distance from A within the reference octave (C = -9, B = +2)
    pub fn semitones_from_a(self) -> i32 {
        self as i32 - PitchClass::A as i32
    }

    pub fn name(self) -> &'static str {
        match self {
            PitchClass::C => "C",
            PitchClass::CSharp => "C#",
            PitchClass::D => "D",
            PitchClass::DSharp => "D#",
            PitchClass::E => "E",
            PitchClass::F => "F",
            PitchClass::FSharp => "F#",
            PitchClass::G => "G",
            PitchClass::GSharp => "G#",
            PitchClass::A => "A",
            PitchClass::ASharp => "A#",
            PitchClass::B => "B",
        }
    }
}

/// Scale families the composer can pick from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scale {
    Major,
    Minor,
    Pentatonic,
}

impl Scale {
    /// Semitones from the root for each scale degree
    pub fn intervals(self) -> &'static [i32] {
        match self {
            Scale::Major => &[0, 2, 4, 5, 7, 9, 11],
            Scale::Minor => &[0, 2, 3, 5, 7, 8, 10],
            Scale::Pentatonic => &[0, 2, 4, 7, 9],
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Scale::Major => "major",
            Scale::Minor => "minor",
            Scale::Pentatonic => "pentatonic",
        }
    }
}

/// Which part of the arrangement a voice plays
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VoiceRole {
    Bass,
    Pad,
    Arp,
}

impl VoiceRole {
    pub const ALL: [VoiceRole; 3] = [VoiceRole::Bass, VoiceRole::Pad, VoiceRole::Arp];

    /// Octave relative to the reference octave. Bass sits one below the pad.
    pub fn octave(self) -> i32 {
        match self {
            VoiceRole::Bass => 0,
            VoiceRole::Pad => 1,
            VoiceRole::Arp => 2,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            VoiceRole::Bass => "bass",
            VoiceRole::Pad => "pad",
            VoiceRole::Arp => "arp",
        }
    }
}

/// A note the harmony engine wants played on a given beat
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NoteRequest {
    pub role: VoiceRole,
    pub frequency_hz: f32,
    pub volume: f32,
}

/// Equal-tempered frequency of a scale degree.
///
/// Degrees past the end of the interval table continue into the next octave,
/// so degree `len` is exactly one octave above degree 0.
pub fn frequency_for(key: PitchClass, scale: Scale, octave_offset: i32, degree_offset: i32) -> f32 {
    let intervals = scale.intervals();
    let len = intervals.len() as i32;
    let degree = degree_offset.rem_euclid(len) as usize;
    let octave = octave_offset + degree_offset.div_euclid(len);
    let semitones = key.semitones_from_a() + intervals[degree] + octave * 12;
    REFERENCE_HZ * 2f32.powf(semitones as f32 / 12.0)
}

/// Stateful key/scale/rhythm generator
pub struct HarmonyEngine {
    key: PitchClass,
    scale: Scale,
    scales: Vec<Scale>,
    base_bpm: f32,
    bpm: f32,
    bass: StepSequence,
    pad: StepSequence,
    arp: StepSequence,
    rng: Pcg32,
}

impl HarmonyEngine {
    /// Create an engine in C with the first configured scale.
    ///
    /// An empty `scales` list falls back to major, a non-positive tempo to
    /// the default.
    pub fn new(base_bpm: f32, scales: Vec<Scale>, rng: Pcg32) -> Self {
        let base_bpm = if base_bpm.is_finite() && base_bpm > 0.0 {
            base_bpm
        } else {
            log::warn!("Unusable tempo {} BPM; using {}", base_bpm, DEFAULT_BPM);
            DEFAULT_BPM
        };
        let scales = if scales.is_empty() {
            vec![Scale::Major]
        } else {
            scales
        };
        Self {
            key: PitchClass::C,
            scale: scales[0],
            scales,
            base_bpm,
            bpm: base_bpm,
            bass: BASS_TEMPLATE,
            pad: PAD_TEMPLATE,
            arp: ARP_TEMPLATE,
            rng,
        }
    }

    pub fn key(&self) -> PitchClass {
        self.key
    }

    pub fn scale(&self) -> Scale {
        self.scale
    }

    pub fn bpm(&self) -> f32 {
        self.bpm
    }

    /// Seconds per beat at the current tempo
    pub fn beat_duration(&self) -> f64 {
        60.0 / self.bpm as f64
    }

    pub fn sequence(&self, role: VoiceRole) -> &StepSequence {
        match role {
            VoiceRole::Bass => &self.bass,
            VoiceRole::Pad => &self.pad,
            VoiceRole::Arp => &self.arp,
        }
    }

    /// Force a key and scale (sequences untouched)
    pub fn set_key(&mut self, key: PitchClass, scale: Scale) {
        self.key = key;
        self.scale = scale;
    }

    /// Replace one role's sequence
    pub fn set_sequence(&mut self, role: VoiceRole, sequence: StepSequence) {
        match role {
            VoiceRole::Bass => self.bass = sequence,
            VoiceRole::Pad => self.pad = sequence,
            VoiceRole::Arp => self.arp = sequence,
        }
    }

    /// Restore the base tempo
    pub fn reset_tempo(&mut self) {
        self.bpm = self.base_bpm;
    }

    /// Pick a uniformly random key and scale, then regenerate sequences
    pub fn choose_random_scale(&mut self) {
        self.key = PitchClass::ALL[self.rng.gen_range(0..PitchClass::ALL.len())];
        self.scale = self.scales[self.rng.gen_range(0..self.scales.len())];
        self.generate_sequences();
    }

    /// Reset the rhythmic templates and flip at most one step in each
    pub fn generate_sequences(&mut self) {
        self.bass = BASS_TEMPLATE;
        self.pad = PAD_TEMPLATE;
        self.arp = ARP_TEMPLATE;

        let rng = &mut self.rng;
        for (sequence, probability) in [
            (&mut self.bass, BASS_VARIATION),
            (&mut self.pad, PAD_VARIATION),
            (&mut self.arp, ARP_VARIATION),
        ] {
            if rng.gen_bool(probability) {
                let step = rng.gen_range(0..SEQUENCE_STEPS);
                sequence[step] = !sequence[step];
            }
        }
    }

    /// Vary the music: sometimes a new key/scale, always new rhythms and tempo
    pub fn section_change(&mut self) {
        if self.rng.gen_bool(RESCALE_PROBABILITY) {
            self.choose_random_scale();
        } else {
            self.generate_sequences();
        }
        self.bpm = self.base_bpm * self.rng.gen_range(BPM_WANDER.0..BPM_WANDER.1);

        log::debug!(
            "Section change: {} {} @ {:.1} BPM",
            self.key.name(),
            self.scale.name(),
            self.bpm
        );
    }

    /// Length of the next section (beats)
    pub fn section_span(&mut self, min_beats: u64, jitter_beats: u64) -> u64 {
        min_beats + self.rng.gen_range(0..jitter_beats.max(1))
    }

    /// Frequency of a degree in the current key and scale
    pub fn frequency_for(&self, octave_offset: i32, degree_offset: i32) -> f32 {
        frequency_for(self.key, self.scale, octave_offset, degree_offset)
    }

    /// Notes to trigger on a beat of the two-measure cycle
    pub fn notes_for_beat(&self, beat: u32) -> Vec<NoteRequest> {
        let step = beat as usize % SEQUENCE_STEPS;
        let mut notes = Vec::new();

        if self.bass[step] {
            notes.push(self.note(VoiceRole::Bass, 0, 0.5));
        }

        if self.pad[step] {
            // Triad: root, third, fifth
            notes.push(self.note(VoiceRole::Pad, 0, 1.0));
            notes.push(self.note(VoiceRole::Pad, 2, 0.4));
            notes.push(self.note(VoiceRole::Pad, 4, 0.3));
        }

        if self.arp[step] {
            let degree = (beat / 2 % 4) as i32;
            notes.push(self.note(VoiceRole::Arp, degree, 0.2));
        }

        notes
    }

    fn note(&self, role: VoiceRole, degree: i32, volume: f32) -> NoteRequest {
        NoteRequest {
            role,
            frequency_hz: self.frequency_for(role.octave(), degree),
            volume,
        }
    }
}
