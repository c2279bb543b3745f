//! Audio output abstraction.
//!
//! The generation thread only talks to an [`AudioSink`]: it opens a mono 16-bit
//! stream, writes one buffer per cycle, and relies on [`AudioSink::write`]
//! blocking to keep pace with the device.

mod capture;
mod cpal_sink;

pub use capture::{CaptureSink, Captured};
pub use cpal_sink::CpalSink;

use crate::error::SinkError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SinkConfig {
    pub sample_rate: u32,
    pub channels: u16,
    pub bits_per_sample: u16,
    /// Frames the sink may buffer ahead of playback.
    pub buffer_frames: usize,
}

impl SinkConfig {
    pub fn mono_16bit(sample_rate: u32, buffer_frames: usize) -> Self {
        Self {
            sample_rate,
            channels: 1,
            bits_per_sample: 16,
            buffer_frames,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkState {
    Uninitialized,
    Initialized,
    Playing,
    Stopped,
    /// The device went away or the stream reported an error.
    Failed,
}

impl SinkState {
    pub fn is_streaming(self) -> bool {
        self == SinkState::Playing
    }
}

pub trait AudioSink: Send {
    /// Opens the output, returning the configuration actually in effect.
    /// The sample rate may differ from the requested one.
    fn open(&mut self, config: &SinkConfig) -> Result<SinkConfig, SinkError>;

    fn play(&mut self) -> Result<(), SinkError>;

    /// Queues `buffer` for playback, blocking until all of it has been
    /// accepted. Returns the number of samples written.
    fn write(&mut self, buffer: &[i16]) -> Result<usize, SinkError>;

    fn state(&self) -> SinkState;

    /// Stops playback once already queued samples have been played.
    fn stop(&mut self) -> Result<(), SinkError>;

    /// Frees the underlying stream. The sink can be opened again afterwards.
    fn release(&mut self);
}

impl<S: AudioSink + ?Sized> AudioSink for Box<S> {
    fn open(&mut self, config: &SinkConfig) -> Result<SinkConfig, SinkError> {
        (**self).open(config)
    }

    fn play(&mut self) -> Result<(), SinkError> {
        (**self).play()
    }

    fn write(&mut self, buffer: &[i16]) -> Result<usize, SinkError> {
        (**self).write(buffer)
    }

    fn state(&self) -> SinkState {
        (**self).state()
    }

    fn stop(&mut self) -> Result<(), SinkError> {
        (**self).stop()
    }

    fn release(&mut self) {
        (**self).release()
    }
}
