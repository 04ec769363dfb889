//! NeonPulse - procedural music for an endless runner
//!
//! Drives the audio engine from a simulated game loop: music plays, effects
//! fire on a fixed pattern and the feature frames the level generator would
//! consume are logged once per second.

mod cli;

use anyhow::{Context, Result};
use clap::Parser;
use std::time::{Duration, Instant};

use cli::Args;
use neonpulse_audio::audio::WavRecorder;
use neonpulse_audio::params::{audio_constants::OFFLINE_SAMPLE_RATE, RecordingConfig};
use neonpulse_audio::{load_config, AudioEngine, AudioFeatureFrame, EffectOptions, EngineConfig};

/// Mute applied around a music restart, as on game over
const RESTART_MUTE_MS: u64 = 100;

/// Scripted stand-in for gameplay events
struct GameScript {
    restart_at_s: f64,
    restarted: bool,
    next_jump_s: f64,
}

impl GameScript {
    fn new(duration_s: f64) -> Self {
        Self {
            restart_at_s: duration_s / 2.0,
            restarted: false,
            next_jump_s: 1.0,
        }
    }

    fn update(&mut self, engine: &mut AudioEngine, elapsed_s: f64) {
        if elapsed_s >= self.next_jump_s {
            engine.play_effect("jump", EffectOptions::default());
            self.next_jump_s += 2.0;
        }
        if !self.restarted && elapsed_s >= self.restart_at_s {
            engine.play_effect("game_over", EffectOptions::default());
            engine.mute_all_temporarily(RESTART_MUTE_MS);
            engine.restart_music();
            self.restarted = true;
            log::info!("Game over at {:.1}s, music restarted", elapsed_s);
        }
    }
}

fn log_frame(elapsed_s: f64, frame: &AudioFeatureFrame, music: &AudioFeatureFrame) {
    log::info!(
        "t={:5.1}s avg={:.2} peak={:.2} low={:.2} mid={:.2} high={:.2} | music avg={:.2} peak={:.2}",
        elapsed_s,
        frame.average,
        frame.peak,
        frame.low_freq,
        frame.mid_freq,
        frame.high_freq,
        music.average,
        music.peak
    );
}

fn record(config: EngineConfig, args: &Args, recording: RecordingConfig) -> Result<()> {
    let sample_rate = OFFLINE_SAMPLE_RATE;
    let mut engine = AudioEngine::offline(config, sample_rate, args.seed());
    if let Some(dir) = &args.sounds {
        engine.preload_sounds(dir);
        engine.sound_bank_mut().finish_loading();
    }

    let mut recorder = WavRecorder::create(&recording, sample_rate)
        .with_context(|| format!("Failed to create {}", recording.audio_path()))?;

    let fps = recording.fps.max(1);
    let dt = 1.0 / fps as f64;
    let frames_per_tick = (sample_rate / fps) as usize;
    let total_ticks = recording.total_ticks();
    let mut script = GameScript::new(recording.duration_secs as f64);

    log::info!(
        "Recording {:.1}s ({} ticks @ {} fps) to {}",
        recording.duration_secs,
        total_ticks,
        fps,
        recording.audio_path()
    );

    engine.start_music();
    for tick in 0..total_ticks {
        let elapsed = tick as f64 * dt;
        script.update(&mut engine, elapsed);

        let Some(graph) = engine.graph() else {
            break;
        };
        let block = graph.render_frames(frames_per_tick, 2);
        recorder.write(&block)?;

        let frame = engine.tick(dt);
        if tick % fps as usize == 0 {
            log_frame(elapsed, &frame, &engine.music_features());
        }
    }

    engine.stop_music();
    recorder.finalize()?;
    Ok(())
}

fn play_live(config: EngineConfig, args: &Args) -> Result<()> {
    let mut engine = AudioEngine::with_seed(config, args.seed());
    if !engine.init_audio() {
        log::warn!("Continuing without audio output");
    }
    let device = engine.device_name().unwrap_or("none").to_string();
    if let Some(dir) = &args.sounds {
        engine.preload_sounds(dir);
    }

    let fps = args.fps.max(1);
    let frame_time = Duration::from_secs_f64(1.0 / fps as f64);
    let duration = args.duration.max(0.0) as f64;
    let mut script = GameScript::new(duration);

    engine.start_music();
    let start = Instant::now();
    let mut last = start;
    let mut next_log_s = 0.0;

    while start.elapsed().as_secs_f64() < duration {
        let now = Instant::now();
        let dt = now.duration_since(last).as_secs_f64();
        last = now;
        let elapsed = now.duration_since(start).as_secs_f64();

        script.update(&mut engine, elapsed);
        let frame = engine.tick(dt);
        if elapsed >= next_log_s {
            log_frame(elapsed, &frame, &engine.music_features());
            next_log_s += 1.0;
        }

        std::thread::sleep(frame_time.saturating_sub(now.elapsed()));
    }

    engine.stop_music();
    log::info!("Played {:.1}s on output device {}", duration, device);
    Ok(())
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let config = match &args.config {
        Some(path) => load_config(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => EngineConfig::default(),
    };

    match args.recording_config() {
        Some(recording) => record(config, &args, recording),
        None => play_live(config, &args),
    }
}
