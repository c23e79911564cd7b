//! Playback engine for the tonebox synthesizer.
//!
//! Turns a [`tb_ir::Song`] into audio: per-tick envelope and parameter
//! resolution, per-sample synthesis for every instrument type, the
//! instrument effect chain and the master mix.

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

pub mod channel;
mod config;
pub mod deque;
pub mod dynamic_filter;
pub mod effects;
pub mod envelope_computer;
mod fft;
mod frame;
pub mod frequency;
mod hash;
pub mod instrument_state;
pub mod mod_values;
mod synth;
mod synthesis;
pub mod tone;
pub mod tone_params;
pub mod tone_pool;
pub mod wave_tables;

pub use channel::ChannelLevel;
pub use config::EngineConfig;
pub use deque::Deque;
pub use dynamic_filter::DynamicBiquadFilter;
pub use envelope_computer::EnvelopeComputer;
pub use frame::{frames_from_planar, Frame};
pub use synth::Synth;
pub use tone::{NoteRef, Tone, ToneState};
pub use tone_pool::{ToneKey, TonePool};
pub use wave_tables::WaveTables;
