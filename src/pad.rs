//! Two-dimensional touch input and its mapping onto the engine.

use crate::control::clamp_unit;
use crate::engine::SynthEngine;
use crate::sink::AudioSink;
use crate::wavetable::WaveformFamily;
use crate::Result;

/// A touch event with coordinates normalized to [0, 1], origin top-left.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PadEvent {
    Down { x: f64, y: f64 },
    Move { x: f64, y: f64 },
    Up,
}

impl PadEvent {
    pub fn down(x: f64, y: f64) -> Self {
        PadEvent::Down {
            x: clamp_coord(x),
            y: clamp_coord(y),
        }
    }

    pub fn moved(x: f64, y: f64) -> Self {
        PadEvent::Move {
            x: clamp_coord(x),
            y: clamp_coord(y),
        }
    }
}

fn clamp_coord(value: f64) -> f64 {
    clamp_unit(value as f32) as f64
}

/// How pad coordinates become pitch and distortion.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PadMapping {
    /// Higher on the pad means higher pitch.
    pub invert_y: bool,
}

impl Default for PadMapping {
    fn default() -> Self {
        Self { invert_y: true }
    }
}

impl PadMapping {
    /// Returns `(relative_pitch, relative_distortion)`.
    pub fn map(&self, x: f64, y: f64) -> (f32, f32) {
        let y = clamp_coord(y);
        let pitch = if self.invert_y { 1.0 - y } else { y };
        (pitch as f32, clamp_coord(x) as f32)
    }

    /// Routes one event: down starts a note, move updates it, up stops it.
    pub fn apply<S: AudioSink + 'static>(
        &self,
        engine: &mut SynthEngine<S>,
        event: PadEvent,
    ) -> Result<()> {
        match event {
            PadEvent::Down { x, y } => {
                let (pitch, distortion) = self.map(x, y);
                engine.start(pitch, distortion)
            }
            PadEvent::Move { x, y } => {
                let (pitch, distortion) = self.map(x, y);
                engine.update(pitch, distortion);
                Ok(())
            }
            PadEvent::Up => engine.stop(),
        }
    }

    /// Applies a batch of events in order, as delivered by input surfaces
    /// that coalesce intermediate drag positions.
    pub fn apply_all<S: AudioSink + 'static>(
        &self,
        engine: &mut SynthEngine<S>,
        events: impl IntoIterator<Item = PadEvent>,
    ) -> Result<()> {
        for event in events {
            self.apply(engine, event)?;
        }
        Ok(())
    }
}

/// Guide lines for the pad: one column boundary per pure waveform and one
/// row per octave.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PadGrid {
    pub columns: u32,
    pub rows: u32,
}

impl PadGrid {
    pub fn for_octaves(num_octaves: u32) -> Self {
        Self {
            columns: (WaveformFamily::COUNT - 1) as u32,
            rows: num_octaves.max(1),
        }
    }

    /// Positions of interior column lines on a surface `width` cells wide.
    pub fn column_lines(&self, width: u16) -> Vec<u16> {
        divisions(self.columns, width)
    }

    pub fn row_lines(&self, height: u16) -> Vec<u16> {
        divisions(self.rows, height)
    }

    /// Normalized coordinates of a cell on a `width` x `height` surface.
    pub fn locate(col: u16, row: u16, width: u16, height: u16) -> (f64, f64) {
        let span = |pos: u16, extent: u16| {
            if extent <= 1 {
                0.0
            } else {
                clamp_coord(pos as f64 / (extent - 1) as f64)
            }
        };
        (span(col, width), span(row, height))
    }

    /// The waveform family whose pure form sits nearest to `x`.
    pub fn nearest_family(&self, x: f64) -> WaveformFamily {
        let idx = (clamp_coord(x) * self.columns as f64).round() as usize;
        WaveformFamily::ALL[idx.min(WaveformFamily::COUNT - 1)]
    }
}

fn divisions(parts: u32, extent: u16) -> Vec<u16> {
    (1..parts)
        .map(|i| (i as u64 * extent as u64 / parts as u64) as u16)
        .collect()
}
