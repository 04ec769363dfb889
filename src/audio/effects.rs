//! Sound effect buffers, asynchronous loading and fire-and-forget playback.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread;

use super::graph::AudioGraph;
use crate::error::AudioError;
use crate::params::audio_constants::{FALLBACK_BUFFER_CHANNELS, FALLBACK_BUFFER_SECS};

/// Effects the game preloads from its sound directory
pub const DEFAULT_EFFECTS: [&str; 5] = ["jump", "land", "collect", "hit", "game_over"];

/// Handle to a playing effect
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EffectHandle(pub u64);

/// Decoded PCM, one `Vec` per channel (at most two kept)
#[derive(Debug, Clone)]
pub struct SoundBuffer {
    pub sample_rate: u32,
    channels: Vec<Vec<f32>>,
}

impl SoundBuffer {
    /// Build from per-channel samples. Empty channel lists become mono silence.
    pub fn new(sample_rate: u32, mut channels: Vec<Vec<f32>>) -> Self {
        if channels.is_empty() {
            channels.push(Vec::new());
        }
        channels.truncate(2);
        Self {
            sample_rate,
            channels,
        }
    }

    /// Silent stereo stand-in for an asset that failed to load
    pub fn silent(sample_rate: u32) -> Self {
        let frames = (sample_rate as f32 * FALLBACK_BUFFER_SECS) as usize;
        Self::new(sample_rate, vec![vec![0.0; frames]; FALLBACK_BUFFER_CHANNELS])
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Length in frames
    pub fn len(&self) -> usize {
        self.channels.iter().map(Vec::len).min().unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn duration_secs(&self) -> f32 {
        self.len() as f32 / self.sample_rate as f32
    }

    /// Stereo frame (mono is duplicated)
    fn frame(&self, index: usize) -> (f32, f32) {
        let left = self.channels[0][index];
        let right = self.channels.get(1).map_or(left, |c| c[index]);
        (left, right)
    }
}

/// Decode a WAV file into a [`SoundBuffer`]
pub fn decode_wav(path: &Path) -> Result<SoundBuffer, hound::Error> {
    let mut reader = hound::WavReader::open(path)?;
    let spec = reader.spec();
    let channel_count = spec.channels.max(1) as usize;

    let interleaved: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader.samples::<f32>().collect::<Result<_, _>>()?,
        hound::SampleFormat::Int => {
            let scale = 1.0 / (1i64 << (spec.bits_per_sample.max(1) - 1)) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 * scale))
                .collect::<Result<_, _>>()?
        }
    };

    let mut channels = vec![Vec::with_capacity(interleaved.len() / channel_count); channel_count.min(2)];
    for frame in interleaved.chunks_exact(channel_count) {
        for (channel, sample) in channels.iter_mut().zip(frame) {
            channel.push(*sample);
        }
    }

    Ok(SoundBuffer::new(spec.sample_rate, channels))
}

/// Playback options for [`SoundEffectPlayer::play`]
#[derive(Debug, Clone, Copy)]
pub struct EffectOptions {
    /// Restart from the beginning when the buffer ends
    pub looping: bool,
    /// Playback rate multiplier (1.0 = original pitch)
    pub rate: f32,
    /// Linear gain for this instance
    pub volume: f32,
    /// Start position within the buffer (seconds)
    pub offset: f32,
}

impl Default for EffectOptions {
    fn default() -> Self {
        Self {
            looping: false,
            rate: 1.0,
            volume: 1.0,
            offset: 0.0,
        }
    }
}

/// One playing instance of a buffer
#[derive(Debug, Clone)]
pub struct EffectVoice {
    buffer: Arc<SoundBuffer>,
    /// Read position (source frames)
    position: f64,
    rate: f64,
    volume: f32,
    looping: bool,
    finished: bool,
}

/// Zero, negative or non-finite rates play at the original speed
fn playback_rate(rate: f32) -> f64 {
    if rate.is_finite() && rate > 0.0 {
        rate as f64
    } else {
        1.0
    }
}

impl EffectVoice {
    pub fn new(buffer: Arc<SoundBuffer>, options: EffectOptions) -> Self {
        let len = buffer.len();
        let mut position = (options.offset.max(0.0) as f64) * buffer.sample_rate as f64;
        if options.looping && len > 0 {
            position %= len as f64;
        }
        Self {
            finished: len == 0 || position >= len as f64,
            buffer,
            position,
            rate: playback_rate(options.rate),
            volume: options.volume,
            looping: options.looping,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Next stereo frame at the output sample rate
    pub fn next_frame(&mut self, output_rate: u32) -> (f32, f32) {
        if self.finished {
            return (0.0, 0.0);
        }

        let len = self.buffer.len();
        let index = self.position.floor() as usize;
        let frac = (self.position - index as f64) as f32;
        let next = if index + 1 < len {
            index + 1
        } else if self.looping {
            0
        } else {
            index
        };

        let (l0, r0) = self.buffer.frame(index);
        let (l1, r1) = self.buffer.frame(next);
        let left = (l0 + (l1 - l0) * frac) * self.volume;
        let right = (r0 + (r1 - r0) * frac) * self.volume;

        self.position += self.rate * self.buffer.sample_rate as f64 / output_rate as f64;
        if self.position >= len as f64 {
            if self.looping {
                self.position %= len as f64;
            } else {
                self.finished = true;
            }
        }

        (left, right)
    }
}

struct LoadedSound {
    name: String,
    buffer: SoundBuffer,
}

/// Reports exactly one result per loader thread. Dropped without
/// [`finish`](Self::finish) (the loader panicked), it reports silence.
struct LoadGuard {
    name: String,
    sender: Option<Sender<LoadedSound>>,
    fallback_rate: u32,
}

impl LoadGuard {
    fn new(name: String, sender: Sender<LoadedSound>, fallback_rate: u32) -> Self {
        Self {
            name,
            sender: Some(sender),
            fallback_rate,
        }
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn finish(mut self, buffer: SoundBuffer) {
        self.send(buffer);
    }

    fn send(&mut self, buffer: SoundBuffer) {
        if let Some(sender) = self.sender.take() {
            // Receiver gone means the bank was dropped; nothing to do
            let _ = sender.send(LoadedSound {
                name: std::mem::take(&mut self.name),
                buffer,
            });
        }
    }
}

impl Drop for LoadGuard {
    fn drop(&mut self) {
        if self.sender.is_some() {
            log::warn!("Loader for '{}' crashed; substituting silence", self.name);
            let silence = SoundBuffer::silent(self.fallback_rate);
            self.send(silence);
        }
    }
}

/// Named, decoded effect buffers. Loading happens on background threads;
/// results are collected by [`SoundBank::poll`].
pub struct SoundBank {
    buffers: HashMap<String, Arc<SoundBuffer>>,
    fallback_rate: u32,
    pending: usize,
    sender: Sender<LoadedSound>,
    receiver: Receiver<LoadedSound>,
}

impl SoundBank {
    /// `fallback_rate` is the sample rate of silent substitutes
    pub fn new(fallback_rate: u32) -> Self {
        let (sender, receiver) = mpsc::channel();
        Self {
            buffers: HashMap::new(),
            fallback_rate,
            pending: 0,
            sender,
            receiver,
        }
    }

    /// Register an already decoded buffer
    pub fn insert(&mut self, name: impl Into<String>, buffer: SoundBuffer) {
        self.buffers.insert(name.into(), Arc::new(buffer));
    }

    pub fn get(&self, name: &str) -> Option<Arc<SoundBuffer>> {
        self.buffers.get(name).cloned()
    }

    pub fn len(&self) -> usize {
        self.buffers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }

    /// Loads still in flight
    pub fn pending(&self) -> usize {
        self.pending
    }

    /// Decode `path` in the background and register it as `name`.
    ///
    /// Decode failures register a silent buffer instead, so playback of the
    /// name never fails structurally.
    pub fn load(&mut self, name: impl Into<String>, path: impl Into<PathBuf>) {
        let name = name.into();
        let path = path.into();
        let sender = self.sender.clone();
        let fallback_rate = self.fallback_rate;
        let thread_name = name.clone();

        let spawned = thread::Builder::new()
            .name(format!("sound-loader-{}", thread_name))
            .spawn(move || {
                let guard = LoadGuard::new(name, sender, fallback_rate);
                let buffer = load_or_silence(guard.name(), &path, fallback_rate);
                guard.finish(buffer);
            });

        match spawned {
            Ok(_) => self.pending += 1,
            Err(e) => {
                log::warn!(
                    "Could not spawn loader for '{}': {}; using silence",
                    thread_name,
                    AudioError::Io(e)
                );
                self.insert(thread_name, SoundBuffer::silent(self.fallback_rate));
            }
        }
    }

    /// Queue the game's standard effects from `dir/<name>.wav`
    pub fn preload_defaults(&mut self, dir: &Path) {
        for name in DEFAULT_EFFECTS {
            self.load(name, dir.join(format!("{}.wav", name)));
        }
    }

    /// Collect finished loads without blocking; returns how many arrived
    pub fn poll(&mut self) -> usize {
        let mut arrived = 0;
        while let Ok(loaded) = self.receiver.try_recv() {
            self.register(loaded);
            arrived += 1;
        }
        arrived
    }

    /// Block until every queued load has arrived
    pub fn finish_loading(&mut self) {
        while self.pending > 0 {
            match self.receiver.recv() {
                Ok(loaded) => self.register(loaded),
                Err(_) => break,
            }
        }
    }

    fn register(&mut self, loaded: LoadedSound) {
        self.pending = self.pending.saturating_sub(1);
        log::debug!(
            "Loaded sound '{}' ({:.2}s)",
            loaded.name,
            loaded.buffer.duration_secs()
        );
        self.insert(loaded.name, loaded.buffer);
    }
}

fn load_or_silence(name: &str, path: &Path, fallback_rate: u32) -> SoundBuffer {
    match decode_wav(path) {
        Ok(buffer) => buffer,
        Err(source) => {
            let err = AudioError::Decode {
                name: name.to_string(),
                source,
            };
            log::warn!("{} ({}); substituting silence", err, path.display());
            SoundBuffer::silent(fallback_rate)
        }
    }
}

/// Fire-and-forget playback through the effects bus
pub struct SoundEffectPlayer {
    bank: SoundBank,
}

impl SoundEffectPlayer {
    pub fn new(bank: SoundBank) -> Self {
        Self { bank }
    }

    pub fn bank(&self) -> &SoundBank {
        &self.bank
    }

    pub fn bank_mut(&mut self) -> &mut SoundBank {
        &mut self.bank
    }

    /// Start a named buffer; `None` if the name is unknown (or still loading)
    pub fn play(
        &self,
        graph: &AudioGraph,
        name: &str,
        options: EffectOptions,
    ) -> Option<EffectHandle> {
        let Some(buffer) = self.bank.get(name) else {
            log::warn!("Sound not found: {}", name);
            return None;
        };
        Some(graph.add_effect(EffectVoice::new(buffer, options)))
    }

    /// Stop a playing effect (idempotent)
    pub fn stop(&self, graph: &AudioGraph, handle: EffectHandle) {
        graph.stop_effect(handle);
    }
}
