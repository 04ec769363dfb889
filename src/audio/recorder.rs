//! Offline WAV capture of the rendered mix.

use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use crate::error::AudioResult;
use crate::params::RecordingConfig;

/// Stereo 32-bit float WAV writer
pub struct WavRecorder {
    writer: hound::WavWriter<BufWriter<File>>,
    path: PathBuf,
    frames: u64,
}

impl WavRecorder {
    /// Create the output directory and open `audio.wav` inside it
    pub fn create(config: &RecordingConfig, sample_rate: u32) -> AudioResult<Self> {
        std::fs::create_dir_all(&config.output_dir)?;
        Self::create_at(Path::new(&config.audio_path()), sample_rate)
    }

    pub fn create_at(path: &Path, sample_rate: u32) -> AudioResult<Self> {
        let spec = hound::WavSpec {
            channels: 2,
            sample_rate,
            bits_per_sample: 32,
            sample_format: hound::SampleFormat::Float,
        };
        let writer = hound::WavWriter::create(path, spec)?;
        Ok(Self {
            writer,
            path: path.to_path_buf(),
            frames: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Frames written so far
    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Append interleaved stereo samples
    pub fn write(&mut self, interleaved: &[f32]) -> AudioResult<()> {
        for sample in interleaved {
            self.writer.write_sample(*sample)?;
        }
        self.frames += (interleaved.len() / 2) as u64;
        Ok(())
    }

    /// Flush the header and close the file
    pub fn finalize(self) -> AudioResult<PathBuf> {
        self.writer.finalize()?;
        log::info!(
            "Recording saved: {} ({} frames)",
            self.path.display(),
            self.frames
        );
        Ok(self.path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let config = RecordingConfig {
            output_dir: dir.path().join("out").to_string_lossy().into_owned(),
            ..RecordingConfig::new(1.0)
        };

        let mut recorder = WavRecorder::create(&config, 8000).unwrap();
        recorder.write(&[0.25, -0.25, 0.5, -0.5]).unwrap();
        assert_eq!(recorder.frames(), 2);
        let path = recorder.finalize().unwrap();

        let mut reader = hound::WavReader::open(&path).unwrap();
        assert_eq!(reader.spec().channels, 2);
        assert_eq!(reader.spec().sample_rate, 8000);
        let samples: Vec<f32> = reader.samples::<f32>().map(|s| s.unwrap()).collect();
        assert_eq!(samples, vec![0.25, -0.25, 0.5, -0.5]);
    }
}
