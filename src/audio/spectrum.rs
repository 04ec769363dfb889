//! Reduces a spectrum snapshot into the per-frame feature vector gameplay
//! code reacts to.

use super::fft::FrequencyAnalyser;
use super::graph::{AudioGraph, TapPoint};
use crate::params::AnalyserConfig;

/// Smoothed summary of the current audio signal. All fields are in 0.0-1.0.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct AudioFeatureFrame {
    /// Mean level across all bins
    pub average: f32,
    /// Loudest bin when a transient was detected this tick, else 0.0
    pub peak: f32,
    /// Mean of the lowest 15% of bins
    pub low_freq: f32,
    /// Mean of bins 15%-60%
    pub mid_freq: f32,
    /// Mean of the top 40% of bins
    pub high_freq: f32,
}

impl AudioFeatureFrame {
    pub const SILENT: Self = Self {
        average: 0.0,
        peak: 0.0,
        low_freq: 0.0,
        mid_freq: 0.0,
        high_freq: 0.0,
    };

    /// Exponential moving average towards `raw`; `peak` is taken from `raw`
    /// unsmoothed
    pub fn smoothed(&self, raw: &AudioFeatureFrame, retain: f32) -> Self {
        let blend = |old: f32, new: f32| old * retain + new * (1.0 - retain);
        Self {
            average: blend(self.average, raw.average),
            peak: raw.peak,
            low_freq: blend(self.low_freq, raw.low_freq),
            mid_freq: blend(self.mid_freq, raw.mid_freq),
            high_freq: blend(self.high_freq, raw.high_freq),
        }
    }
}

/// Transient detector. The two variants are tuned independently.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum PeakPolicy {
    /// `max > previous_average * ratio` (full-mix analyser)
    RelativeToPrevious { ratio: f32 },
    /// `max > floor && max > current_average * ratio` (music analyser)
    Gated { floor: f32, ratio: f32 },
}

impl PeakPolicy {
    /// Default policy for the master tap
    pub const MASTER: Self = Self::RelativeToPrevious { ratio: 1.5 };

    /// Default policy for the music tap
    pub const MUSIC: Self = Self::Gated {
        floor: 0.7,
        ratio: 1.5,
    };

    fn peak(&self, max: f32, current_average: f32, previous_average: f32) -> f32 {
        let hit = match *self {
            Self::RelativeToPrevious { ratio } => max > previous_average * ratio,
            Self::Gated { floor, ratio } => max > floor && max > current_average * ratio,
        };
        if hit {
            max
        } else {
            0.0
        }
    }
}

/// Bin index boundaries of the three bands
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BandSplit {
    pub low_end: usize,
    pub mid_end: usize,
    pub total: usize,
}

impl BandSplit {
    /// Floor-based split at the given fractions of `total`
    pub fn new(total: usize, low_fraction: f32, mid_fraction: f32) -> Self {
        let low_end = ((total as f32 * low_fraction).floor() as usize).min(total);
        let mid_end = ((total as f32 * mid_fraction).floor() as usize).clamp(low_end, total);
        Self {
            low_end,
            mid_end,
            total,
        }
    }

    pub fn low_len(&self) -> usize {
        self.low_end
    }

    pub fn mid_len(&self) -> usize {
        self.mid_end - self.low_end
    }

    pub fn high_len(&self) -> usize {
        self.total - self.mid_end
    }
}

fn mean(values: &[f32]) -> f32 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f32>() / values.len() as f32
    }
}

/// Raw (unsmoothed) features of one byte snapshot.
///
/// Bands are split at `low_fraction` and `mid_fraction` of the bin count.
pub fn analyse_bins(
    bins: &[u8],
    (low_fraction, mid_fraction): (f32, f32),
    policy: PeakPolicy,
    previous_average: f32,
) -> AudioFeatureFrame {
    if bins.is_empty() {
        return AudioFeatureFrame::SILENT;
    }

    let normalized: Vec<f32> = bins.iter().map(|b| *b as f32 / 255.0).collect();
    let average = mean(&normalized);
    let max = normalized.iter().copied().fold(0.0f32, f32::max);
    let split = BandSplit::new(normalized.len(), low_fraction, mid_fraction);

    AudioFeatureFrame {
        average,
        peak: policy.peak(max, average, previous_average),
        low_freq: mean(&normalized[..split.low_end]),
        mid_freq: mean(&normalized[split.low_end..split.mid_end]),
        high_freq: mean(&normalized[split.mid_end..]),
    }
}

/// Samples one analysis tap each tick and keeps the smoothed frame
pub struct SpectrumAnalyzer {
    tap: TapPoint,
    policy: PeakPolicy,
    /// Weight kept from the previous frame; `None` reports raw frames
    retain: Option<f32>,
    band_edges: (f32, f32),
    analyser: FrequencyAnalyser,
    samples: Vec<f32>,
    bins: Vec<u8>,
    last: AudioFeatureFrame,
}

impl SpectrumAnalyzer {
    pub fn new(tap: TapPoint, policy: PeakPolicy, smoothing: bool, config: &AnalyserConfig) -> Self {
        let analyser = FrequencyAnalyser::new(config.clone());
        let bin_count = analyser.bin_count();
        Self {
            tap,
            policy,
            retain: smoothing.then_some(config.feature_retain),
            band_edges: (config.low_band_end, config.mid_band_end),
            analyser,
            samples: Vec::with_capacity(config.fft_size),
            bins: vec![0; bin_count],
            last: AudioFeatureFrame::SILENT,
        }
    }

    /// Full-mix analyser with smoothing (what `tick` returns)
    pub fn master(config: &AnalyserConfig) -> Self {
        Self::new(TapPoint::Master, PeakPolicy::MASTER, true, config)
    }

    /// Music-bus analyser reporting raw frames
    pub fn music(config: &AnalyserConfig) -> Self {
        Self::new(TapPoint::Music, PeakPolicy::MUSIC, false, config)
    }

    /// Last frame produced by [`sample`](Self::sample)
    pub fn last(&self) -> AudioFeatureFrame {
        self.last
    }

    /// Feed an already computed byte snapshot
    pub fn sample_bins(&mut self, bins: &[u8]) -> AudioFeatureFrame {
        let raw = analyse_bins(bins, self.band_edges, self.policy, self.last.average);
        self.last = match self.retain {
            Some(retain) => self.last.smoothed(&raw, retain),
            None => raw,
        };
        self.last
    }

    /// Analyse the graph's tap; without a graph the zero frame is returned
    pub fn sample(&mut self, graph: Option<&AudioGraph>) -> AudioFeatureFrame {
        let Some(graph) = graph else {
            return AudioFeatureFrame::SILENT;
        };

        graph.copy_tap(self.tap, &mut self.samples);
        let mut bins = std::mem::take(&mut self.bins);
        self.analyser.byte_frequency_data(&self.samples, &mut bins);
        let frame = self.sample_bins(&bins);
        self.bins = bins;
        frame
    }

    /// Forget history (smoothed frame and per-bin smoothing)
    pub fn reset(&mut self) {
        self.last = AudioFeatureFrame::SILENT;
        self.analyser.reset();
        self.bins.fill(0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::AudioSettings;

    const EDGES: (f32, f32) = (0.15, 0.6);

    fn split(n: usize) -> BandSplit {
        BandSplit::new(n, EDGES.0, EDGES.1)
    }

    #[test]
    fn test_band_sizes_cover_all_bins() {
        for n in [8usize, 16, 32, 64, 128, 256, 512, 1024, 2048] {
            let s = split(n);
            assert_eq!(s.low_len() + s.mid_len() + s.high_len(), n);
            assert_eq!(s.low_end, (n as f32 * 0.15).floor() as usize);
            assert_eq!(s.mid_end, (n as f32 * 0.6).floor() as usize);
        }
        // 128 bins: 19 / 57 / 52
        let s = split(128);
        assert_eq!((s.low_len(), s.mid_len(), s.high_len()), (19, 57, 52));
    }

    #[test]
    fn test_features_stay_in_unit_range() {
        let patterns: Vec<Vec<u8>> = vec![
            vec![255; 128],
            vec![0; 128],
            (0..128).map(|i| (i * 2) as u8).collect(),
            (0..128).map(|i| if i % 3 == 0 { 255 } else { 7 }).collect(),
        ];
        for bins in patterns {
            let f = analyse_bins(&bins, EDGES, PeakPolicy::MASTER, 0.0);
            for value in [f.average, f.peak, f.low_freq, f.mid_freq, f.high_freq] {
                assert!((0.0..=1.0).contains(&value));
            }
        }
    }

    #[test]
    fn test_band_means() {
        let mut bins = vec![0u8; 128];
        bins[..19].fill(255);
        let f = analyse_bins(&bins, EDGES, PeakPolicy::MASTER, 0.0);
        assert_eq!(f.low_freq, 1.0);
        assert_eq!(f.mid_freq, 0.0);
        assert_eq!(f.high_freq, 0.0);
        assert!((f.average - 19.0 / 128.0).abs() < 1e-6);
    }

    #[test]
    fn test_flat_spectrum_is_not_a_peak() {
        let level = (0.3f32 * 255.0).round() as u8;
        let bins = vec![level; 128];
        let value = level as f32 / 255.0;

        let f = analyse_bins(&bins, EDGES, PeakPolicy::MASTER, value);
        assert_eq!(f.peak, 0.0);
        let f = analyse_bins(&bins, EDGES, PeakPolicy::MUSIC, value);
        assert_eq!(f.peak, 0.0);
    }

    #[test]
    fn test_relative_peak_uses_previous_average() {
        let mut bins = vec![20u8; 128];
        bins[5] = 200;
        let f = analyse_bins(&bins, EDGES, PeakPolicy::MASTER, 0.1);
        assert!((f.peak - 200.0 / 255.0).abs() < 1e-6);

        let f = analyse_bins(&bins, EDGES, PeakPolicy::MASTER, 0.6);
        assert_eq!(f.peak, 0.0);
    }

    #[test]
    fn test_gated_peak_needs_floor() {
        // Sharp but quiet: passes the ratio, fails the 0.7 floor
        let mut bins = vec![5u8; 128];
        bins[5] = 150;
        let f = analyse_bins(&bins, EDGES, PeakPolicy::MUSIC, 0.0);
        assert_eq!(f.peak, 0.0);

        bins[5] = 240;
        let f = analyse_bins(&bins, EDGES, PeakPolicy::MUSIC, 0.0);
        assert!(f.peak > 0.9);
    }

    #[test]
    fn test_smoothing_converges_monotonically() {
        let config = AnalyserConfig::default();
        let mut analyzer = SpectrumAnalyzer::master(&config);
        let bins = vec![153u8; 128];
        let target = 153.0 / 255.0;

        let mut previous = 0.0;
        for _ in 0..40 {
            let f = analyzer.sample_bins(&bins);
            assert!(f.average >= previous - 1e-7);
            assert!(f.average <= target + 1e-6);
            assert!(f.low_freq <= target + 1e-6);
            previous = f.average;
        }
        assert!((previous - target).abs() < 1e-4);
    }

    #[test]
    fn test_first_smoothed_step_is_forty_percent() {
        let config = AnalyserConfig::default();
        let mut analyzer = SpectrumAnalyzer::master(&config);
        let f = analyzer.sample_bins(&vec![255u8; 128]);
        assert!((f.average - 0.4).abs() < 1e-6);
        // Peak is never smoothed
        assert_eq!(f.peak, 1.0);
    }

    #[test]
    fn test_music_analyzer_reports_raw_frames() {
        let config = AnalyserConfig::default();
        let mut analyzer = SpectrumAnalyzer::music(&config);
        let f = analyzer.sample_bins(&vec![255u8; 128]);
        assert_eq!(f.average, 1.0);
    }

    #[test]
    fn test_uninitialized_sample_is_silent() {
        let mut analyzer = SpectrumAnalyzer::master(&AnalyserConfig::default());
        assert_eq!(analyzer.sample(None), AudioFeatureFrame::SILENT);
    }

    #[test]
    fn test_sample_reads_graph_tap() {
        use crate::audio::voice::VoiceSynthesizer;
        use crate::music::VoiceRole;
        use crate::params::TimbreBank;

        let config = AnalyserConfig::default();
        let graph = AudioGraph::new(8000, &AudioSettings::default(), config.fft_size);
        let synth = VoiceSynthesizer::new(TimbreBank::default(), 0.5);
        synth.render(&graph, VoiceRole::Bass, 110.0, 0.0, 1.0);
        graph.render_frames(1600, 2);

        let mut analyzer = SpectrumAnalyzer::music(&config);
        let f = analyzer.sample(Some(&graph));
        assert!(f.average > 0.0);
        assert!(f.low_freq > f.high_freq);
    }
}
