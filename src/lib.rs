//! Wavetable synthesizer played from a two-dimensional touch surface.
//!
//! Vertical position picks the pitch across a fixed range of octaves and
//! horizontal position blends through sine, triangle, square, and sawtooth.
//! Audio is produced on a dedicated generation thread that writes one
//! wavelength at a time to an [`AudioSink`].

pub mod config;
pub mod control;
pub mod engine;
pub mod error;
pub mod generator;
pub mod pad;
pub mod sink;
pub mod ui;
pub mod wavetable;

pub use config::{EngineConfig, InputPolicy};
pub use control::{ControlInput, PendingInputChannel};
pub use engine::{EngineState, Lifecycle, SynthEngine};
pub use error::{Error, Result, SinkError};
pub use generator::{BlendWeights, SampleGenerator};
pub use pad::{PadEvent, PadGrid, PadMapping};
pub use sink::{AudioSink, CaptureSink, CpalSink, SinkConfig, SinkState};
pub use wavetable::{TABLE_SIZE, WaveTable, WaveTableBank, WaveformFamily};
