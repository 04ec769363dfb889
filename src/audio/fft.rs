//! Byte-scaled magnitude spectrum of a tap's most recent samples.

use rustfft::{num_complex::Complex, Fft, FftPlanner};
use std::f32::consts::PI;
use std::sync::Arc;

use crate::params::AnalyserConfig;

/// Hann window function for FFT analysis
pub fn hann_window(index: usize, size: usize) -> f32 {
    0.5 * (1.0 - ((2.0 * PI * index as f32) / (size as f32 - 1.0)).cos())
}

/// Turns time-domain samples into `fft_size / 2` bins in 0..=255.
///
/// Magnitudes are smoothed over time per bin, converted to decibels and
/// mapped linearly from `[min_decibels, max_decibels]` onto the byte range.
pub struct FrequencyAnalyser {
    fft: Arc<dyn Fft<f32>>,
    window: Vec<f32>,
    buffer: Vec<Complex<f32>>,
    smoothed: Vec<f32>,
    config: AnalyserConfig,
}

impl FrequencyAnalyser {
    pub fn new(config: AnalyserConfig) -> Self {
        let size = config.fft_size;
        let mut planner = FftPlanner::new();
        Self {
            fft: planner.plan_fft_forward(size),
            window: (0..size).map(|i| hann_window(i, size)).collect(),
            buffer: vec![Complex::new(0.0, 0.0); size],
            smoothed: vec![0.0; config.bin_count()],
            config,
        }
    }

    pub fn bin_count(&self) -> usize {
        self.smoothed.len()
    }

    /// Compute the spectrum of `samples` (the most recent `fft_size` are
    /// used; shorter input is zero-padded at the front) into `out`
    pub fn byte_frequency_data(&mut self, samples: &[f32], out: &mut [u8]) {
        let size = self.config.fft_size;
        let start = samples.len().saturating_sub(size);
        let recent = &samples[start..];
        let pad = size - recent.len();

        for (i, slot) in self.buffer.iter_mut().enumerate() {
            let sample = if i < pad { 0.0 } else { recent[i - pad] };
            *slot = Complex::new(sample * self.window[i], 0.0);
        }
        self.fft.process(&mut self.buffer);

        let tau = self.config.time_smoothing;
        let range = self.config.max_decibels - self.config.min_decibels;
        let scale = 1.0 / size as f32;

        for (i, out_bin) in out.iter_mut().enumerate().take(self.smoothed.len()) {
            let magnitude = self.buffer[i].norm() * scale;
            let value = tau * self.smoothed[i] + (1.0 - tau) * magnitude;
            // Flush denormals and non-finite values
            self.smoothed[i] = if value.is_finite() && value > 1e-20 { value } else { 0.0 };

            let db = if self.smoothed[i] > 0.0 {
                20.0 * self.smoothed[i].log10()
            } else {
                f32::NEG_INFINITY
            };
            let scaled = 255.0 * (db - self.config.min_decibels) / range;
            *out_bin = scaled.clamp(0.0, 255.0) as u8;
        }
    }

    /// Forget temporal smoothing history
    pub fn reset(&mut self) {
        self.smoothed.fill(0.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine(freq: f32, sample_rate: f32, len: usize, amplitude: f32) -> Vec<f32> {
        (0..len)
            .map(|i| amplitude * (2.0 * PI * freq * i as f32 / sample_rate).sin())
            .collect()
    }

    #[test]
    fn test_hann_window() {
        let size = 1024;

        // Hann window should be 0 at edges, 1 at center
        assert!((hann_window(0, size) - 0.0).abs() < 0.01);
        assert!((hann_window(size - 1, size) - 0.0).abs() < 0.01);
        assert!((hann_window(size / 2, size) - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_silence_is_all_zero() {
        let mut analyser = FrequencyAnalyser::new(AnalyserConfig::default());
        let mut bins = vec![0u8; analyser.bin_count()];
        analyser.byte_frequency_data(&vec![0.0; 256], &mut bins);
        assert!(bins.iter().all(|b| *b == 0));
        analyser.byte_frequency_data(&[], &mut bins);
        assert!(bins.iter().all(|b| *b == 0));
    }

    #[test]
    fn test_tone_lands_in_its_bin() {
        let config = AnalyserConfig {
            time_smoothing: 0.0,
            ..AnalyserConfig::default()
        };
        let mut analyser = FrequencyAnalyser::new(config);
        let mut bins = vec![0u8; analyser.bin_count()];

        // 8 kHz / 256 = 31.25 Hz per bin; 1 kHz is bin 32
        let samples = sine(1000.0, 8000.0, 256, 0.005);
        analyser.byte_frequency_data(&samples, &mut bins);

        let loudest = bins
            .iter()
            .enumerate()
            .max_by_key(|(_, b)| **b)
            .map(|(i, _)| i)
            .unwrap();
        assert_eq!(loudest, 32);
        assert!(bins[32] > 100 && bins[32] < 255);
        assert!(bins[100] < bins[32]);
    }

    #[test]
    fn test_time_smoothing_lags_behind() {
        let mut analyser = FrequencyAnalyser::new(AnalyserConfig::default());
        let mut first = vec![0u8; analyser.bin_count()];
        let mut second = vec![0u8; analyser.bin_count()];
        let samples = sine(1000.0, 8000.0, 256, 0.005);

        analyser.byte_frequency_data(&samples, &mut first);
        analyser.byte_frequency_data(&samples, &mut second);
        assert!(second[32] > first[32]);

        analyser.reset();
        analyser.byte_frequency_data(&samples, &mut second);
        assert_eq!(second[32], first[32]);
    }
}
