//! Audio output, synthesis, sound effects and spectrum analysis.
//!
//! Everything renders through one [`AudioGraph`]. A [`OutputDevice`] drives
//! it from the `cpal` callback; offline callers render it directly.

mod device;
mod effects;
mod fft;
mod graph;
mod recorder;
mod spectrum;
mod voice;

pub use device::OutputDevice;
pub use effects::{
    decode_wav, EffectHandle, EffectOptions, EffectVoice, SoundBank, SoundBuffer,
    SoundEffectPlayer, DEFAULT_EFFECTS,
};
pub use fft::{hann_window, FrequencyAnalyser};
pub use graph::{AudioGraph, TapPoint};
pub use recorder::WavRecorder;
pub use spectrum::{analyse_bins, AudioFeatureFrame, BandSplit, PeakPolicy, SpectrumAnalyzer};
pub use voice::{Biquad, Envelope, Oscillator, Voice, VoiceArena, VoiceId, VoiceSynthesizer};
