//! NeonPulse audio engine - procedural music and audio-reactive features
//!
//! A look-ahead composer schedules synthesized voices onto a shared output
//! graph, sound effects play on their own bus, and the mixed signal is
//! reduced every game frame to a small feature vector for gameplay.

pub mod audio;
pub mod engine;
pub mod error;
pub mod music;
pub mod params;

pub use audio::{AudioFeatureFrame, EffectHandle, EffectOptions};
pub use engine::AudioEngine;
pub use error::{AudioError, AudioResult};
pub use params::{load_config, Bus, EngineConfig};
