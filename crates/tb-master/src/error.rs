//! Error type for the controller.

use tb_audio::AudioError;
use tb_ir::IrError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MasterError {
    #[error(transparent)]
    Audio(#[from] AudioError),

    #[error("invalid song: {0}")]
    Ir(#[from] IrError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("channel {0} does not exist")]
    NoSuchChannel(usize),

    #[error("channel {0} already holds the maximum number of instruments")]
    InstrumentLimit(usize),

    #[error("playback command queue is full")]
    QueueFull,

    #[error("playback thread exited before it was ready")]
    ThreadExited,
}
