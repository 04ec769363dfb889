//! Command-line argument parsing.

use clap::Parser;
use std::path::PathBuf;

use neonpulse_audio::params::RecordingConfig;

/// Command line arguments
#[derive(Parser, Debug)]
#[command(name = "neonpulse")]
#[command(about = "Procedural game music and audio-reactive features", long_about = None)]
pub struct Args {
    /// Engine configuration (TOML)
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Composer seed (random if omitted)
    #[arg(long)]
    pub seed: Option<u64>,

    /// How long to play live (seconds)
    #[arg(long, value_name = "SECONDS", default_value = "30")]
    pub duration: f32,

    /// Render offline to recording/audio.wav instead (duration in seconds)
    #[arg(long, value_name = "SECONDS")]
    pub record: Option<f32>,

    /// Directory holding jump.wav, land.wav, collect.wav, hit.wav, game_over.wav
    #[arg(long, value_name = "DIR")]
    pub sounds: Option<PathBuf>,

    /// Simulated game-loop rate
    #[arg(long, default_value = "60")]
    pub fps: u32,
}

impl Args {
    /// Create recording configuration if recording mode is enabled
    pub fn recording_config(&self) -> Option<RecordingConfig> {
        self.record.map(|duration| RecordingConfig {
            fps: self.fps.max(1),
            ..RecordingConfig::new(duration)
        })
    }

    pub fn seed(&self) -> u64 {
        self.seed.unwrap_or_else(rand::random)
    }
}
