use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

use super::{AudioSink, SinkConfig, SinkState};
use crate::error::SinkError;

/// Everything a [`CaptureSink`] has been asked to do.
#[derive(Debug, Default, Clone)]
pub struct Captured {
    pub config: Option<SinkConfig>,
    pub buffers: Vec<Vec<i16>>,
    pub opens: usize,
    pub plays: usize,
    pub stops: usize,
    pub releases: usize,
}

impl Captured {
    pub fn samples(&self) -> impl Iterator<Item = i16> + '_ {
        self.buffers.iter().flatten().copied()
    }

    pub fn peak(buffer: &[i16]) -> i32 {
        buffer.iter().map(|s| (*s as i32).abs()).max().unwrap_or(0)
    }
}

/// In-memory sink that records every buffer it is given.
///
/// With pacing enabled each write sleeps for the buffer's real-time duration,
/// standing in for a device's backpressure.
pub struct CaptureSink {
    captured: Arc<Mutex<Captured>>,
    state: SinkState,
    paced: bool,
    fail_open: bool,
    device_rate: Option<u32>,
    fail_after_writes: Option<usize>,
    writes: usize,
}

impl CaptureSink {
    pub fn new() -> Self {
        Self {
            captured: Arc::new(Mutex::new(Captured::default())),
            state: SinkState::Uninitialized,
            paced: false,
            fail_open: false,
            device_rate: None,
            fail_after_writes: None,
            writes: 0,
        }
    }

    pub fn paced(mut self) -> Self {
        self.paced = true;
        self
    }

    /// Makes `open` fail, as for a missing device.
    pub fn failing_open(mut self) -> Self {
        self.fail_open = true;
        self
    }

    /// Opens at `sample_rate` whatever rate is requested, like a device
    /// with a fixed native rate.
    pub fn with_device_rate(mut self, sample_rate: u32) -> Self {
        self.device_rate = Some(sample_rate);
        self
    }

    /// Breaks the stream after `writes` successful writes.
    pub fn failing_after(mut self, writes: usize) -> Self {
        self.fail_after_writes = Some(writes);
        self
    }

    /// Handle for inspecting what was written after the sink has been moved
    /// into an engine.
    pub fn captured(&self) -> Arc<Mutex<Captured>> {
        Arc::clone(&self.captured)
    }
}

impl Default for CaptureSink {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioSink for CaptureSink {
    fn open(&mut self, config: &SinkConfig) -> Result<SinkConfig, SinkError> {
        if self.fail_open {
            self.state = SinkState::Uninitialized;
            return Err(SinkError::Device("no output device".into()));
        }
        let opened = SinkConfig {
            sample_rate: self.device_rate.unwrap_or(config.sample_rate),
            ..*config
        };
        let mut captured = self.captured.lock();
        captured.config = Some(opened);
        captured.opens += 1;
        self.state = SinkState::Initialized;
        Ok(opened)
    }

    fn play(&mut self) -> Result<(), SinkError> {
        match self.state {
            SinkState::Uninitialized => Err(SinkError::NotOpen),
            SinkState::Failed => Err(SinkError::Stream("stream has failed".into())),
            _ => {
                self.captured.lock().plays += 1;
                self.state = SinkState::Playing;
                Ok(())
            }
        }
    }

    fn write(&mut self, buffer: &[i16]) -> Result<usize, SinkError> {
        if self.state != SinkState::Playing {
            return Err(SinkError::NotPlaying);
        }
        if self.fail_after_writes.is_some_and(|limit| self.writes >= limit) {
            self.state = SinkState::Failed;
            return Err(SinkError::Stream("device disconnected".into()));
        }
        self.writes += 1;

        let sample_rate = {
            let mut captured = self.captured.lock();
            captured.buffers.push(buffer.to_vec());
            captured.config.map(|c| c.sample_rate).unwrap_or(1)
        };
        if self.paced {
            let secs = buffer.len() as f64 / sample_rate.max(1) as f64;
            std::thread::sleep(Duration::from_secs_f64(secs));
        }
        Ok(buffer.len())
    }

    fn state(&self) -> SinkState {
        self.state
    }

    fn stop(&mut self) -> Result<(), SinkError> {
        match self.state {
            SinkState::Uninitialized => Err(SinkError::NotOpen),
            _ => {
                self.captured.lock().stops += 1;
                if self.state != SinkState::Failed {
                    self.state = SinkState::Stopped;
                }
                Ok(())
            }
        }
    }

    fn release(&mut self) {
        self.captured.lock().releases += 1;
        self.state = SinkState::Uninitialized;
    }
}
