//! Headless controller for the tonebox synthesizer.
//!
//! Owns the editable song, runs the render thread and renders offline.
//! The CLI and the integration tests both drive playback through
//! [`Controller`].

mod demo;
mod error;
mod playback;
mod wav;

use ringbuf::traits::Producer;
use std::io::Write;
use std::sync::atomic::Ordering;
use std::sync::mpsc;
use std::sync::Arc;
use tb_engine::{frames_from_planar, Synth, WaveTables};
use tb_ir::legacy::{self, LegacyInstrument};
use tb_ir::ChannelKind;

use playback::{audio_thread, command_queue, PlaybackHandle, Shared, ThreadInit};

// Re-export common types so callers don't need tb-ir/tb-engine directly.
pub use demo::demo_song;
pub use error::MasterError;
pub use playback::Command;
pub use tb_engine::{ChannelLevel, EngineConfig, Frame};
pub use tb_ir::{IrError, Song, SongPosition};
pub use wav::{frames_to_wav, write_wav};

/// Settings of an offline render.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RenderOptions {
    pub sample_rate: u32,
    /// Upper bound on the rendered length.
    pub max_seconds: f64,
    pub start_bar: u32,
    /// Repeat the loop region until `max_seconds` instead of stopping at
    /// the end of the song.
    pub looping: bool,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self { sample_rate: 44_100, max_seconds: 300.0, start_bar: 0, looping: false }
    }
}

/// Headless synthesizer controller. Owns a song and manages playback.
pub struct Controller {
    song: Song,
    config: EngineConfig,
    tables: Arc<WaveTables>,
    playback: Option<PlaybackHandle>,
}

impl Controller {
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    pub fn with_config(config: EngineConfig) -> Self {
        Self {
            song: Song::with_channels(3, 1, 0),
            tables: Arc::new(WaveTables::new(config.interpolate_chip_waves)),
            config,
            playback: None,
        }
    }

    // --- Song management ---

    pub fn song(&self) -> &Song {
        &self.song
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Replace the song. A running render thread picks it up between blocks.
    pub fn set_song(&mut self, song: Song) -> Result<(), MasterError> {
        song.validate()?;
        self.song = song;
        self.commit()
    }

    /// Edit a copy of the song and swap it in if it still validates.
    pub fn edit<R>(&mut self, f: impl FnOnce(&mut Song) -> R) -> Result<R, MasterError> {
        let mut song = self.song.clone();
        let result = f(&mut song);
        self.set_song(song)?;
        Ok(result)
    }

    /// Migrate an instrument from an older format and append it to
    /// `channel`. Returns the new instrument's index.
    pub fn import_legacy_instrument(
        &mut self,
        channel: usize,
        record: &LegacyInstrument,
    ) -> Result<usize, MasterError> {
        let kind = self.song.channel_kind(channel).ok_or(MasterError::NoSuchChannel(channel))?;
        let migration = legacy::migrate(record, kind == ChannelKind::Noise);
        for correction in &migration.corrections {
            tracing::warn!(channel, version = ?record.version, ?correction, "corrected legacy instrument");
        }
        let added = self.edit(|song| {
            let channel = &mut song.channels[channel];
            channel.add_instrument(migration.instrument).then(|| channel.instruments.len() - 1)
        })?;
        added.ok_or(MasterError::InstrumentLimit(channel))
    }

    fn commit(&mut self) -> Result<(), MasterError> {
        if self.playback.is_some() {
            self.send(Command::ReplaceSong(Arc::new(self.song.clone())))?;
        }
        Ok(())
    }

    /// Queue a command for the render thread. Without one it is dropped.
    pub fn send(&mut self, command: Command) -> Result<(), MasterError> {
        let Some(playback) = self.playback.as_mut() else {
            return Ok(());
        };
        tracing::debug!(command = command.label(), "sending command");
        playback.commands.try_push(command).map_err(|_| MasterError::QueueFull)
    }

    // --- Real-time playback ---

    /// Start the render thread if it is not running and wait until the
    /// output stream is up. Returns the device sample rate.
    pub fn start(&mut self) -> Result<u32, MasterError> {
        if let Some(playback) = &self.playback {
            if !playback.shared.finished.load(Ordering::Relaxed) {
                return Ok(playback.sample_rate);
            }
        }
        self.stop();

        let (producer, consumer) = command_queue();
        let shared = Arc::new(Shared::new());
        let (ready, started) = mpsc::sync_channel(1);
        let init = ThreadInit {
            song: Arc::new(self.song.clone()),
            config: self.config,
            tables: self.tables.clone(),
            commands: consumer,
            shared: shared.clone(),
            ready,
        };
        let thread = std::thread::Builder::new()
            .name("tonebox-render".into())
            .spawn(move || audio_thread(init))?;

        let sample_rate = match started.recv() {
            Ok(Ok(rate)) => rate,
            Ok(Err(err)) => {
                let _ = thread.join();
                return Err(err.into());
            }
            Err(_) => {
                let _ = thread.join();
                return Err(MasterError::ThreadExited);
            }
        };
        tracing::info!(sample_rate, "playback started");

        self.playback = Some(PlaybackHandle { commands: producer, shared, sample_rate, thread: Some(thread) });
        Ok(sample_rate)
    }

    pub fn play(&mut self) -> Result<(), MasterError> {
        self.start()?;
        self.send(Command::Play)
    }

    pub fn pause(&mut self) -> Result<(), MasterError> {
        self.send(Command::Pause)
    }

    /// Shut the render thread down.
    pub fn stop(&mut self) {
        if let Some(mut playback) = self.playback.take() {
            playback.shared.stop.store(true, Ordering::Relaxed);
            if let Some(handle) = playback.thread.take() {
                if handle.join().is_err() {
                    tracing::error!("render thread panicked");
                }
            }
        }
    }

    pub fn seek_to_bar(&mut self, bar: u32) -> Result<(), MasterError> {
        self.send(Command::SeekToBar(bar))
    }

    /// Set the loop region on the song and on the running playback.
    pub fn set_loop(&mut self, start: u32, length: u32) -> Result<(), MasterError> {
        let bars = self.song.bar_count.max(1);
        self.song.loop_start = (start as usize).min(bars - 1);
        self.song.loop_length = (length as usize).clamp(1, bars - self.song.loop_start);
        self.send(Command::SetLoop { start, length })
    }

    pub fn set_looping(&mut self, looping: bool) -> Result<(), MasterError> {
        self.send(Command::SetLooping(looping))
    }

    pub fn mute(&mut self, channel: usize, muted: bool) -> Result<(), MasterError> {
        self.send(Command::Mute { channel, muted })
    }

    pub fn solo(&mut self, channel: usize, solo: bool) -> Result<(), MasterError> {
        self.send(Command::Solo { channel, solo })
    }

    pub fn is_playing(&self) -> bool {
        self.playback.as_ref().is_some_and(|p| p.shared.playing.load(Ordering::Relaxed))
    }

    /// The render thread has exited, on its own or after [`stop`](Self::stop).
    pub fn is_finished(&self) -> bool {
        self.playback.as_ref().is_some_and(|p| p.shared.finished.load(Ordering::Relaxed))
    }

    pub fn sample_rate(&self) -> Option<u32> {
        self.playback.as_ref().map(|p| p.sample_rate)
    }

    pub fn position(&self) -> Option<SongPosition> {
        let playback = self.playback.as_ref()?;
        if playback.shared.finished.load(Ordering::Relaxed) {
            return None;
        }
        let tick = playback.shared.tick.load(Ordering::Relaxed);
        Some(SongPosition::from_ticks(tick, self.song.beats_per_bar))
    }

    /// Peak levels of the last rendered block, one per channel.
    pub fn channel_levels(&self) -> Vec<ChannelLevel> {
        let count = self.song.channels.len();
        match &self.playback {
            Some(playback) => (0..count).map(|channel| playback.shared.level(channel)).collect(),
            None => vec![ChannelLevel::default(); count],
        }
    }

    // --- Offline rendering ---

    /// Render the song without an audio device.
    pub fn render_frames(&self, options: &RenderOptions) -> Vec<Frame> {
        let config = self.config.with_sample_rate(options.sample_rate);
        let mut synth = Synth::new(Arc::new(self.song.clone()), config, self.tables.clone());
        synth.set_looping(options.looping);
        synth.seek_to_bar(options.start_bar as usize);
        synth.play();

        let max_frames = (options.max_seconds.max(0.0) * options.sample_rate as f64) as usize;
        let block = config.block_size.max(1);
        let mut left = vec![0.0f32; block];
        let mut right = vec![0.0f32; block];
        let mut frames = Vec::with_capacity(max_frames.min(options.sample_rate as usize * 600));
        while frames.len() < max_frames && synth.is_playing() {
            let n = block.min(max_frames - frames.len());
            synth.synthesize(&mut left[..n], &mut right[..n]);
            let start = frames.len();
            frames.resize(start + n, Frame::silence());
            frames_from_planar(&left[..n], &right[..n], &mut frames[start..]);
        }
        tracing::debug!(frames = frames.len(), sample_rate = options.sample_rate, "offline render finished");
        frames
    }

    /// Render to WAV. Returns the number of frames written.
    pub fn render_to_wav(&self, w: &mut impl Write, options: &RenderOptions) -> Result<usize, MasterError> {
        let frames = self.render_frames(options);
        write_wav(w, &frames, options.sample_rate)?;
        Ok(frames.len())
    }
}

impl Default for Controller {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Controller {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tb_ir::legacy::FormatVersion;

    fn demo_controller() -> Controller {
        let mut controller = Controller::new();
        controller.set_song(demo_song()).unwrap();
        controller
    }

    #[test]
    fn invalid_songs_are_rejected() {
        let mut controller = Controller::new();
        let err = controller.edit(|song| song.channels[0].instruments.clear()).unwrap_err();
        assert!(matches!(err, MasterError::Ir(IrError::NoInstruments { channel: 0 })));
        assert!(!controller.song().channels[0].instruments.is_empty());
    }

    #[test]
    fn offline_render_stops_at_song_end() {
        let controller = demo_controller();
        let options = RenderOptions { sample_rate: 22_050, max_seconds: 60.0, ..Default::default() };
        let frames = controller.render_frames(&options);
        // Four bars of eight beats at 120 bpm.
        let expected = 22_050 * 16;
        assert!(frames.len() >= expected - 1024 && frames.len() <= expected + 1024, "{}", frames.len());
        assert!(frames.iter().any(|f| f.left != 0 || f.right != 0));
    }

    #[test]
    fn looping_render_fills_the_requested_length() {
        let controller = demo_controller();
        let options = RenderOptions { sample_rate: 8_000, max_seconds: 20.0, looping: true, ..Default::default() };
        assert_eq!(controller.render_frames(&options).len(), 160_000);
    }

    #[test]
    fn render_to_wav_writes_header_and_frames() {
        let controller = demo_controller();
        let options = RenderOptions { sample_rate: 8_000, max_seconds: 0.5, ..Default::default() };
        let mut buf = Vec::new();
        let frames = controller.render_to_wav(&mut buf, &options).unwrap();
        assert_eq!(frames, 4_000);
        assert_eq!(buf.len(), 44 + frames * 4);
    }

    #[test]
    fn legacy_import_appends_an_instrument() {
        let mut controller = Controller::new();
        let record = LegacyInstrument {
            version: FormatVersion::BeepBox3,
            type_name: "no such type".to_string(),
            ..Default::default()
        };
        assert_eq!(controller.import_legacy_instrument(0, &record).unwrap(), 1);
        assert_eq!(controller.song().channels[0].instruments.len(), 2);
        assert!(matches!(controller.import_legacy_instrument(99, &record), Err(MasterError::NoSuchChannel(99))));
    }

    #[test]
    fn commands_without_playback_are_ignored() {
        let mut controller = Controller::new();
        assert!(controller.pause().is_ok());
        assert!(controller.seek_to_bar(3).is_ok());
        assert!(!controller.is_playing());
        assert_eq!(controller.position(), None);
        assert_eq!(controller.channel_levels().len(), 4);
    }

    #[test]
    fn loop_region_is_clamped_to_the_song() {
        let mut controller = demo_controller();
        controller.set_loop(3, 10).unwrap();
        assert_eq!((controller.song().loop_start, controller.song().loop_length), (3, 1));
    }
}
