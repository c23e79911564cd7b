//! tonebox CLI: plays the built-in demo song or renders it to WAV.
//!
//! Usage:
//!   cargo run --bin tb-cli
//!   cargo run --bin tb-cli -- --wav demo.wav --seconds 20 --loop

use clap::Parser;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::{Duration, Instant};
use tb_master::{demo_song, Controller, MasterError, RenderOptions};
use tracing_subscriber::EnvFilter;

#[cfg(feature = "alloc_check")]
#[global_allocator]
static ALLOCATOR: assert_no_alloc::AllocDisabler = assert_no_alloc::AllocDisabler;

#[derive(Parser, Debug)]
#[command(name = "tb-cli", version, about = "Headless playback and WAV export for tonebox")]
struct Args {
    /// Render to this WAV file instead of playing through the audio device
    #[arg(long, value_name = "PATH")]
    wav: Option<PathBuf>,

    /// Maximum length in seconds
    #[arg(long, default_value_t = 60.0)]
    seconds: f64,

    /// Sample rate of the WAV render; live playback uses the device rate
    #[arg(long, default_value_t = 44_100, value_parser = clap::value_parser!(u32).range(8_000..=192_000))]
    sample_rate: u32,

    /// Bar to start from
    #[arg(long, default_value_t = 0)]
    bar: u32,

    /// Repeat the loop region instead of stopping at the end of the song
    #[arg(long = "loop")]
    looping: bool,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let args = Args::parse();
    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(%err, "tb-cli failed");
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args) -> Result<(), MasterError> {
    let mut ctrl = Controller::new();
    ctrl.set_song(demo_song())?;

    let song = ctrl.song();
    println!("Channels: {} pitch, {} noise, {} mod", song.pitch_channel_count(), song.noise_channel_count(), song.mod_channel_count());
    println!("Bars:     {} ({} beats each)", song.bar_count, song.beats_per_bar);
    println!("Tempo:    {} BPM", song.beats_per_minute());
    println!("Loop:     bars {}..{}", song.loop_start, song.loop_start + song.loop_length);
    println!();

    match &args.wav {
        Some(path) => render_to_wav(&ctrl, path, args),
        None => play_audio(&mut ctrl, args),
    }
}

fn play_audio(ctrl: &mut Controller, args: &Args) -> Result<(), MasterError> {
    let sample_rate = ctrl.start()?;
    ctrl.set_looping(args.looping)?;
    ctrl.seek_to_bar(args.bar)?;
    ctrl.play()?;
    println!("Playing at {} Hz...", sample_rate);
    println!();

    let started = Instant::now();
    let limit = Duration::try_from_secs_f64(args.seconds.max(0.0)).unwrap_or(Duration::MAX);
    // The render thread reports playing only after it drained the play command.
    std::thread::sleep(Duration::from_millis(50));
    while ctrl.is_playing() && started.elapsed() < limit {
        if let Some(pos) = ctrl.position() {
            let peak = ctrl.channel_levels().iter().map(|l| l.peak()).fold(0.0f32, f32::max);
            print!("\rBar: {:03} | Beat: {:02} | Peak: {:5.3}", pos.bar + 1, pos.beat + 1, peak);
            let _ = std::io::stdout().flush();
        }
        std::thread::sleep(Duration::from_millis(10));
    }

    ctrl.stop();
    println!("\rDone.                                  ");
    Ok(())
}

fn render_to_wav(ctrl: &Controller, path: &Path, args: &Args) -> Result<(), MasterError> {
    let options = RenderOptions {
        sample_rate: args.sample_rate,
        max_seconds: args.seconds,
        start_bar: args.bar,
        looping: args.looping,
    };
    println!("Rendering to {} at {} Hz...", path.display(), options.sample_rate);

    let mut file = std::io::BufWriter::new(std::fs::File::create(path)?);
    let frames = ctrl.render_to_wav(&mut file, &options)?;
    file.flush()?;

    println!("Rendered {} frames ({:.1} s)", frames, frames as f64 / options.sample_rate as f64);
    println!("Done.");
    Ok(())
}
