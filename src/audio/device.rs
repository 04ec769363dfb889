//! Default output device driving an [`AudioGraph`] from the `cpal` callback.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, SizedSample};

use super::graph::AudioGraph;
use crate::error::{AudioError, AudioResult};
use crate::params::AudioSettings;

/// Running output stream. Dropping it closes the device.
pub struct OutputDevice {
    name: String,
    channels: usize,

    /// Audio output stream (kept alive)
    _stream: cpal::Stream,
}

impl OutputDevice {
    /// Open the default output device and start rendering a fresh graph
    /// at the device's sample rate
    pub fn open(settings: &AudioSettings, tap_size: usize) -> AudioResult<(Self, AudioGraph)> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or(AudioError::NoOutputDevice)?;
        let config = device.default_output_config()?;

        let name = device.name().unwrap_or_else(|_| "Unknown".to_string());
        let sample_rate = config.sample_rate().0;
        let channels = config.channels() as usize;
        log::info!("Audio: {} @ {}Hz, {} channels", name, sample_rate, channels);

        let graph = AudioGraph::new(sample_rate, settings, tap_size);
        let stream_config: cpal::StreamConfig = config.clone().into();

        let stream = match config.sample_format() {
            cpal::SampleFormat::F32 => build_stream::<f32>(&device, &stream_config, graph.clone())?,
            cpal::SampleFormat::I16 => build_stream::<i16>(&device, &stream_config, graph.clone())?,
            cpal::SampleFormat::U16 => build_stream::<u16>(&device, &stream_config, graph.clone())?,
            other => return Err(AudioError::UnsupportedSampleFormat(other.to_string())),
        };
        stream.play()?;

        Ok((
            Self {
                name,
                channels,
                _stream: stream,
            },
            graph,
        ))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn channels(&self) -> usize {
        self.channels
    }
}

fn build_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    graph: AudioGraph,
) -> AudioResult<cpal::Stream>
where
    T: SizedSample + FromSample<f32>,
{
    let channels = config.channels as usize;
    let mut scratch: Vec<f32> = Vec::new();

    let stream = device.build_output_stream(
        config,
        move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
            scratch.resize(data.len(), 0.0);
            graph.render(&mut scratch, channels);
            for (out, sample) in data.iter_mut().zip(scratch.iter()) {
                *out = T::from_sample(*sample);
            }
        },
        |err| log::error!("Audio stream error: {}", err),
        None,
    )?;

    Ok(stream)
}
