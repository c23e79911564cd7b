//! The render thread and the state it shares with the controller.
//!
//! The controller pushes [`Command`]s into a single-producer ring buffer;
//! the render thread drains it between blocks, renders a block with its
//! own [`Synth`] and publishes the playhead and channel levels through
//! atomics.

use ringbuf::traits::{Consumer, Split};
use ringbuf::{HeapCons, HeapProd, HeapRb};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::mpsc::SyncSender;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use tb_audio::{AudioError, AudioOutput, CpalOutput};
use tb_engine::{frames_from_planar, ChannelLevel, EngineConfig, Frame, Synth, WaveTables};
use tb_ir::config::{MOD_CHANNEL_COUNT_MAX, NOISE_CHANNEL_COUNT_MAX, PITCH_CHANNEL_COUNT_MAX};
use tb_ir::Song;

const COMMAND_CAPACITY: usize = 64;
const MAX_CHANNELS: usize = PITCH_CHANNEL_COUNT_MAX + NOISE_CHANNEL_COUNT_MAX + MOD_CHANNEL_COUNT_MAX;
/// How long the render thread waits for room in the output buffer.
const IDLE_WAIT: Duration = Duration::from_millis(2);

/// A request for the render thread, applied between blocks.
#[derive(Clone, Debug)]
pub enum Command {
    ReplaceSong(Arc<Song>),
    Play,
    Pause,
    SeekToBar(u32),
    SetLoop { start: u32, length: u32 },
    SetLooping(bool),
    Mute { channel: usize, muted: bool },
    Solo { channel: usize, solo: bool },
}

impl Command {
    pub fn label(&self) -> &'static str {
        match self {
            Command::ReplaceSong(_) => "replace song",
            Command::Play => "play",
            Command::Pause => "pause",
            Command::SeekToBar(_) => "seek",
            Command::SetLoop { .. } => "set loop",
            Command::SetLooping(_) => "set looping",
            Command::Mute { .. } => "mute",
            Command::Solo { .. } => "solo",
        }
    }

    fn apply(self, synth: &mut Synth) {
        match self {
            Command::ReplaceSong(song) => synth.snapshot_swap(song),
            Command::Play => synth.play(),
            Command::Pause => synth.pause(),
            Command::SeekToBar(bar) => synth.seek_to_bar(bar as usize),
            Command::SetLoop { start, length } => synth.set_loop(start as usize, length as usize),
            Command::SetLooping(looping) => synth.set_looping(looping),
            Command::Mute { channel, muted } => synth.mute(channel, muted),
            Command::Solo { channel, solo } => synth.solo(channel, solo),
        }
    }
}

/// Values the render thread publishes for the controller.
pub(crate) struct Shared {
    pub(crate) stop: AtomicBool,
    pub(crate) finished: AtomicBool,
    pub(crate) playing: AtomicBool,
    /// Absolute tick of the playhead.
    pub(crate) tick: AtomicU64,
    /// Per channel left and right peaks of the last block, as `f32` bits.
    levels: Box<[AtomicU32]>,
}

impl Shared {
    pub(crate) fn new() -> Self {
        Self {
            stop: AtomicBool::new(false),
            finished: AtomicBool::new(false),
            playing: AtomicBool::new(false),
            tick: AtomicU64::new(0),
            levels: (0..MAX_CHANNELS * 2).map(|_| AtomicU32::new(0)).collect(),
        }
    }

    fn publish(&self, synth: &Synth) {
        self.playing.store(synth.is_playing(), Ordering::Relaxed);
        let song = synth.song();
        let position = synth.position();
        let ticks = position.to_ticks(song.beats_per_bar);
        self.tick.store(ticks, Ordering::Relaxed);
        for (i, level) in synth.channel_levels().iter().enumerate().take(MAX_CHANNELS) {
            self.levels[2 * i].store(level.left.to_bits(), Ordering::Relaxed);
            self.levels[2 * i + 1].store(level.right.to_bits(), Ordering::Relaxed);
        }
    }

    pub(crate) fn level(&self, channel: usize) -> ChannelLevel {
        if channel >= MAX_CHANNELS {
            return ChannelLevel::default();
        }
        ChannelLevel {
            left: f32::from_bits(self.levels[2 * channel].load(Ordering::Relaxed)),
            right: f32::from_bits(self.levels[2 * channel + 1].load(Ordering::Relaxed)),
        }
    }
}

/// Handle to a running render thread.
pub(crate) struct PlaybackHandle {
    pub(crate) commands: HeapProd<Command>,
    pub(crate) shared: Arc<Shared>,
    pub(crate) sample_rate: u32,
    pub(crate) thread: Option<JoinHandle<()>>,
}

/// A fresh command queue.
pub(crate) fn command_queue() -> (HeapProd<Command>, HeapCons<Command>) {
    HeapRb::<Command>::new(COMMAND_CAPACITY).split()
}

/// Everything the render thread starts from.
pub(crate) struct ThreadInit {
    pub(crate) song: Arc<Song>,
    pub(crate) config: EngineConfig,
    pub(crate) tables: Arc<WaveTables>,
    pub(crate) commands: HeapCons<Command>,
    pub(crate) shared: Arc<Shared>,
    /// Receives the device sample rate once the stream runs, or the error
    /// that kept it from starting.
    pub(crate) ready: SyncSender<Result<u32, AudioError>>,
}

pub(crate) fn audio_thread(init: ThreadInit) {
    let ThreadInit { song, config, tables, commands, shared, ready } = init;
    let opened = open_output();
    let (output, sample_rate) = match opened {
        Ok(output) => output,
        Err(err) => {
            tracing::error!(%err, "could not start audio output");
            shared.finished.store(true, Ordering::Relaxed);
            let _ = ready.send(Err(err));
            return;
        }
    };
    let _ = ready.send(Ok(sample_rate));

    let synth = Synth::new(song, config.with_sample_rate(sample_rate), tables);
    render_loop(output, synth, commands, &shared);
    shared.playing.store(false, Ordering::Relaxed);
    shared.finished.store(true, Ordering::Relaxed);
    tracing::debug!("render thread finished");
}

fn open_output() -> Result<(CpalOutput, u32), AudioError> {
    let (mut output, consumer) = CpalOutput::new()?;
    let sample_rate = output.sample_rate();
    output.build_stream(consumer)?;
    output.start()?;
    Ok((output, sample_rate))
}

fn render_loop(mut output: CpalOutput, mut synth: Synth, mut commands: HeapCons<Command>, shared: &Shared) {
    // The output queue starts empty, so its vacancy is its capacity.
    let block = synth.config().block_size.clamp(1, output.vacant().max(1));
    let mut left = vec![0.0f32; block];
    let mut right = vec![0.0f32; block];
    let mut frames = vec![Frame::silence(); block];

    while !shared.stop.load(Ordering::Relaxed) {
        while let Some(command) = commands.try_pop() {
            tracing::debug!(command = command.label(), "applying command");
            command.apply(&mut synth);
        }
        shared.publish(&synth);

        if output.vacant() < block {
            std::thread::sleep(IDLE_WAIT);
            continue;
        }
        render_block(&mut synth, &mut left, &mut right);
        frames_from_planar(&left, &right, &mut frames);
        output.write(&frames);
    }

    if let Err(err) = output.stop() {
        tracing::warn!(%err, "could not stop audio output");
    }
}

#[cfg(feature = "alloc_check")]
fn render_block(synth: &mut Synth, left: &mut [f32], right: &mut [f32]) {
    assert_no_alloc::assert_no_alloc(|| synth.synthesize(left, right));
}

#[cfg(not(feature = "alloc_check"))]
fn render_block(synth: &mut Synth, left: &mut [f32], right: &mut [f32]) {
    synth.synthesize(left, right);
}
