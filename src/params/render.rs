//! Offline recording configuration.

/// Recording mode configuration
#[derive(Debug, Clone)]
pub struct RecordingConfig {
    /// Duration to record (seconds)
    pub duration_secs: f32,

    /// Output directory for the rendered audio
    pub output_dir: String,

    /// Simulated game-loop rate (ticks per second)
    pub fps: u32,
}

impl RecordingConfig {
    pub fn new(duration_secs: f32) -> Self {
        Self {
            duration_secs,
            output_dir: "recording".to_string(),
            fps: 60,
        }
    }

    /// Total number of game-loop ticks to simulate
    pub fn total_ticks(&self) -> usize {
        (self.duration_secs * self.fps as f32).ceil() as usize
    }

    /// Audio file path
    pub fn audio_path(&self) -> String {
        format!("{}/audio.wav", self.output_dir)
    }
}
