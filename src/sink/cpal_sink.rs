use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use parking_lot::{Condvar, Mutex};
use ringbuf::{
    HeapProd, HeapRb,
    traits::{Consumer, Observer, Producer, Split},
};
use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};
use std::time::{Duration, Instant};

use super::{AudioSink, SinkConfig, SinkState};
use crate::error::SinkError;

/// Upper bound on how long a blocked writer sleeps before rechecking.
const WAKE_INTERVAL: Duration = Duration::from_millis(5);

struct Shared {
    lock: Mutex<()>,
    space: Condvar,
    failed: AtomicBool,
}

struct OpenStream {
    stream: cpal::Stream,
    producer: HeapProd<i16>,
    drain_timeout: Duration,
    config: SinkConfig,
}

/// Plays through the default output device.
///
/// Samples go through a ring buffer sized by [`SinkConfig::buffer_frames`];
/// the device callback drains it, and [`AudioSink::write`] blocks while it is
/// full. Mono input is copied to every device channel.
pub struct CpalSink {
    shared: Arc<Shared>,
    open: Option<OpenStream>,
    state: SinkState,
}

impl CpalSink {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                lock: Mutex::new(()),
                space: Condvar::new(),
                failed: AtomicBool::new(false),
            }),
            open: None,
            state: SinkState::Uninitialized,
        }
    }

    fn wait_for_space(&self) {
        let mut guard = self.shared.lock.lock();
        self.shared.space.wait_for(&mut guard, WAKE_INTERVAL);
    }

    fn build_stream(&self, config: &SinkConfig) -> Result<OpenStream, SinkError> {
        let host = cpal::default_host();
        tracing::info!(host = host.id().name(), "opening audio output");
        let device = host
            .default_output_device()
            .ok_or_else(|| SinkError::Device("no output device".into()))?;
        let default_config = device
            .default_output_config()
            .map_err(|e| SinkError::Device(e.to_string()))?;

        let supported = device
            .supported_output_configs()
            .map(|mut ranges| {
                ranges.any(|range| {
                    range.min_sample_rate() <= config.sample_rate
                        && config.sample_rate <= range.max_sample_rate()
                })
            })
            .unwrap_or(false);
        let sample_rate = if supported {
            config.sample_rate
        } else {
            tracing::warn!(
                requested = config.sample_rate,
                fallback = default_config.sample_rate(),
                "sample rate not supported by device"
            );
            default_config.sample_rate()
        };
        let opened = SinkConfig {
            sample_rate,
            ..*config
        };

        let device_channels = default_config.channels().max(config.channels);
        let stream_config = cpal::StreamConfig {
            channels: device_channels,
            sample_rate,
            buffer_size: cpal::BufferSize::Default,
        };

        let ring_buffer = HeapRb::<i16>::new(config.buffer_frames);
        let (producer, mut consumer) = ring_buffer.split();

        let frame_len = device_channels as usize;
        let callback_shared = Arc::clone(&self.shared);
        let error_shared = Arc::clone(&self.shared);
        let stream = device
            .build_output_stream(
                &stream_config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    for frame in data.chunks_mut(frame_len) {
                        let sample = consumer
                            .try_pop()
                            .map(|s| s as f32 / 32768.0)
                            .unwrap_or(0.0);
                        frame.fill(sample);
                    }
                    callback_shared.space.notify_one();
                },
                move |err| {
                    tracing::error!(%err, "output stream error");
                    error_shared.failed.store(true, Ordering::Release);
                    error_shared.space.notify_all();
                },
                None,
            )
            .map_err(|e| SinkError::Stream(e.to_string()))?;

        tracing::info!(
            channels = device_channels,
            sample_rate,
            buffer_frames = config.buffer_frames,
            "output stream built"
        );

        let buffered_secs = config.buffer_frames as f64 / sample_rate.max(1) as f64;
        Ok(OpenStream {
            stream,
            producer,
            drain_timeout: Duration::from_secs_f64(buffered_secs * 2.0),
            config: opened,
        })
    }
}

impl Default for CpalSink {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioSink for CpalSink {
    fn open(&mut self, config: &SinkConfig) -> Result<SinkConfig, SinkError> {
        if let Some(open) = &self.open {
            return Ok(open.config);
        }
        self.shared.failed.store(false, Ordering::Release);
        match self.build_stream(config) {
            Ok(open) => {
                // some hosts start streams as soon as they are built
                let _ = open.stream.pause();
                let opened = open.config;
                self.open = Some(open);
                self.state = SinkState::Initialized;
                Ok(opened)
            }
            Err(e) => {
                self.state = SinkState::Uninitialized;
                Err(e)
            }
        }
    }

    fn play(&mut self) -> Result<(), SinkError> {
        let open = self.open.as_ref().ok_or(SinkError::NotOpen)?;
        open.stream
            .play()
            .map_err(|e| SinkError::Stream(e.to_string()))?;
        self.state = SinkState::Playing;
        Ok(())
    }

    fn write(&mut self, buffer: &[i16]) -> Result<usize, SinkError> {
        if self.state() != SinkState::Playing {
            return Err(SinkError::NotPlaying);
        }

        let mut written = 0;
        while written < buffer.len() {
            if self.shared.failed.load(Ordering::Acquire) {
                self.state = SinkState::Failed;
                return Err(SinkError::Stream("stream failed during write".into()));
            }
            let open = self.open.as_mut().ok_or(SinkError::NotOpen)?;
            written += open.producer.push_slice(&buffer[written..]);
            if written < buffer.len() {
                self.wait_for_space();
            }
        }
        Ok(written)
    }

    fn state(&self) -> SinkState {
        if self.shared.failed.load(Ordering::Acquire) {
            SinkState::Failed
        } else {
            self.state
        }
    }

    fn stop(&mut self) -> Result<(), SinkError> {
        let drain = self.state() == SinkState::Playing;
        let open = self.open.as_ref().ok_or(SinkError::NotOpen)?;

        if drain {
            let deadline = Instant::now() + open.drain_timeout;
            while open.producer.occupied_len() > 0 && Instant::now() < deadline {
                if self.shared.failed.load(Ordering::Acquire) {
                    break;
                }
                self.wait_for_space();
            }
        }

        open.stream
            .pause()
            .map_err(|e| SinkError::Stream(e.to_string()))?;
        if self.state != SinkState::Failed {
            self.state = SinkState::Stopped;
        }
        Ok(())
    }

    fn release(&mut self) {
        if self.open.take().is_some() {
            tracing::info!("output stream released");
        }
        self.shared.failed.store(false, Ordering::Release);
        self.state = SinkState::Uninitialized;
    }
}
