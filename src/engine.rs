use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};
use std::thread::JoinHandle;

use crate::config::EngineConfig;
use crate::control::{ControlInput, PendingInputChannel};
use crate::generator::SampleGenerator;
use crate::sink::{AudioSink, CpalSink, SinkConfig, SinkState};
use crate::wavetable::{TABLE_SIZE, WaveTableBank};
use crate::{Error, Result};

/// Each fade-out step multiplies the gain by this.
pub const FADE_RATIO: f32 = 0.9;
/// Fade-out ends once the gain is at or below this.
pub const FADE_FLOOR: f32 = 0.01;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    /// Constructed or stopped; the sink is held by the engine.
    Idle,
    /// The generation thread owns the sink and is streaming.
    Playing,
    /// The sink has been released. Terminal.
    Released,
}

/// Values owned by the generation thread for the length of one note.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineState {
    pub pitch_hz: f32,
    pub distortion: f32,
    pub gain: f32,
}

impl EngineState {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            pitch_hz: config.min_pitch_hz as f32,
            distortion: 0.0,
            gain: 1.0,
        }
    }

    pub fn apply(&mut self, input: &ControlInput, config: &EngineConfig) {
        self.pitch_hz = config.absolute_pitch(input.relative_pitch()) as f32;
        self.distortion = input.relative_distortion();
    }
}

/// Gains used by the fade-out, from the first step down to the first value
/// at or below [`FADE_FLOOR`].
pub fn fade_out_gains(start_gain: f32) -> impl Iterator<Item = f32> {
    std::iter::successors(Some(start_gain), |&gain| {
        (gain > FADE_FLOOR).then_some(gain * FADE_RATIO)
    })
    .skip(1)
}

/// Monophonic wavetable synthesizer driven by a two-dimensional control
/// signal.
///
/// `start` hands the sink to a dedicated generation thread, `update` feeds it
/// new control values, and `stop` fades the note out and joins the thread
/// before returning, so a following `start` never overlaps a fade.
pub struct SynthEngine<S: AudioSink + 'static = CpalSink> {
    config: EngineConfig,
    pending: Arc<PendingInputChannel>,
    playing: Arc<AtomicBool>,
    sink: Option<S>,
    worker: Option<JoinHandle<S>>,
    lifecycle: Lifecycle,
    /// Rate the sink actually opened at; may differ from the configured one.
    stream_rate: u32,
}

impl SynthEngine<CpalSink> {
    pub fn with_default_output(config: EngineConfig) -> Result<Self> {
        Self::new(config, CpalSink::new())
    }
}

impl<S: AudioSink + 'static> SynthEngine<S> {
    pub fn new(config: EngineConfig, sink: S) -> Result<Self> {
        config.validate()?;
        WaveTableBank::shared();

        Ok(Self {
            pending: Arc::new(PendingInputChannel::new(config.input_policy)),
            playing: Arc::new(AtomicBool::new(false)),
            sink: Some(sink),
            worker: None,
            lifecycle: Lifecycle::Idle,
            stream_rate: config.sample_rate,
            config,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.lifecycle
    }

    /// Sample rate buffers are rendered at, as negotiated with the sink.
    pub fn stream_rate(&self) -> u32 {
        self.stream_rate
    }

    /// Control updates not yet picked up by the generation thread.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// The sink, while the engine holds it (not during playback).
    pub fn sink(&self) -> Option<&S> {
        self.sink.as_ref()
    }

    /// Whether the generation thread is still running. It can end on its own
    /// if the sink breaks mid-stream.
    pub fn is_generating(&self) -> bool {
        self.worker.as_ref().is_some_and(|w| !w.is_finished())
    }

    pub fn start(&mut self, relative_pitch: f32, relative_distortion: f32) -> Result<()> {
        if self.lifecycle == Lifecycle::Playing && !self.is_generating() {
            tracing::debug!("reaping generation thread that ended on its own");
            self.join_worker()?;
        }
        if self.lifecycle != Lifecycle::Idle {
            return Err(Error::InvalidState {
                operation: "start",
                state: self.lifecycle,
            });
        }

        let mut sink = self.sink.take().ok_or(Error::InvalidState {
            operation: "start",
            state: self.lifecycle,
        })?;
        if let Err(e) = self.prepare_sink(&mut sink) {
            tracing::warn!(%e, "audio sink unavailable, not starting");
            self.sink = Some(sink);
            return Err(Error::SinkUnavailable(e.to_string()));
        }

        self.pending
            .push(ControlInput::new(relative_pitch, relative_distortion));
        self.playing.store(true, Ordering::Release);

        let pending = Arc::clone(&self.pending);
        let playing = Arc::clone(&self.playing);
        let config = EngineConfig {
            sample_rate: self.stream_rate,
            ..self.config.clone()
        };
        let spawned = std::thread::Builder::new()
            .name("soundpad-generator".into())
            .spawn(move || generation_loop(sink, &pending, &playing, &config));

        match spawned {
            Ok(handle) => {
                self.worker = Some(handle);
                self.lifecycle = Lifecycle::Playing;
                tracing::info!(relative_pitch, relative_distortion, "synthesis started");
                Ok(())
            }
            Err(e) => {
                // the sink went down with the closure
                self.playing.store(false, Ordering::Release);
                self.pending.clear();
                self.lifecycle = Lifecycle::Released;
                Err(Error::Io(e))
            }
        }
    }

    /// Queues a control update. Before `start` the update waits in the queue
    /// and is applied once playback begins.
    pub fn update(&self, relative_pitch: f32, relative_distortion: f32) {
        if self.lifecycle == Lifecycle::Released {
            tracing::warn!("update after release ignored");
            return;
        }
        let input = ControlInput::new(relative_pitch, relative_distortion);
        tracing::trace!(?input, "control update");
        self.pending.push(input);
    }

    /// Ends the note: the generation thread fades out, stops the sink, and is
    /// joined before this returns. Stopping an idle engine does nothing.
    pub fn stop(&mut self) -> Result<()> {
        match self.lifecycle {
            Lifecycle::Idle => Ok(()),
            Lifecycle::Released => Err(Error::InvalidState {
                operation: "stop",
                state: self.lifecycle,
            }),
            Lifecycle::Playing => {
                self.playing.store(false, Ordering::Release);
                self.join_worker()?;
                tracing::info!("synthesis stopped");
                Ok(())
            }
        }
    }

    /// Stops playback if needed and releases the sink. The engine cannot be
    /// started again afterwards.
    pub fn release_resources(&mut self) {
        if self.lifecycle == Lifecycle::Released {
            return;
        }
        if let Err(e) = self.stop() {
            tracing::warn!(%e, "stop before release failed");
        }
        if let Some(mut sink) = self.sink.take() {
            sink.release();
        }
        self.pending.clear();
        self.lifecycle = Lifecycle::Released;
        tracing::info!("engine resources released");
    }

    fn prepare_sink(&mut self, sink: &mut S) -> std::result::Result<(), crate::SinkError> {
        match sink.state() {
            SinkState::Uninitialized => {}
            SinkState::Failed => {
                tracing::info!("reopening failed sink");
                sink.release();
            }
            SinkState::Initialized | SinkState::Playing | SinkState::Stopped => {
                return sink.play();
            }
        }
        let opened = sink.open(&SinkConfig::mono_16bit(
            self.config.sample_rate,
            self.config.sink_buffer_frames,
        ))?;
        if opened.sample_rate != self.config.sample_rate {
            tracing::info!(
                requested = self.config.sample_rate,
                actual = opened.sample_rate,
                "sink opened at a different sample rate"
            );
        }
        self.stream_rate = opened.sample_rate;
        sink.play()
    }

    fn join_worker(&mut self) -> Result<()> {
        let Some(handle) = self.worker.take() else {
            self.lifecycle = Lifecycle::Idle;
            return Ok(());
        };
        match handle.join() {
            Ok(sink) => {
                self.sink = Some(sink);
                // updates sent after the note ended on its own are stale
                self.pending.clear();
                self.lifecycle = Lifecycle::Idle;
                Ok(())
            }
            Err(_) => {
                tracing::error!("generation thread panicked, sink lost");
                self.pending.clear();
                self.lifecycle = Lifecycle::Released;
                Err(Error::WorkerPanicked)
            }
        }
    }
}

impl<S: AudioSink + 'static> Drop for SynthEngine<S> {
    fn drop(&mut self) {
        self.release_resources();
    }
}

impl<S: AudioSink + 'static> std::fmt::Debug for SynthEngine<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SynthEngine")
            .field("lifecycle", &self.lifecycle)
            .field("pending", &self.pending)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Body of the generation thread. Returns the sink so the engine can reuse it.
fn generation_loop<S: AudioSink>(
    mut sink: S,
    pending: &PendingInputChannel,
    playing: &AtomicBool,
    config: &EngineConfig,
) -> S {
    let generator = SampleGenerator::new(WaveTableBank::shared(), config.sample_rate);
    let mut state = EngineState::new(config);
    let mut buffer = Vec::with_capacity(TABLE_SIZE);

    while playing.load(Ordering::Acquire) {
        // at most one update per cycle
        if let Some(input) = pending.poll_one() {
            state.apply(&input, config);
            generator.generate_into(&mut buffer, state.pitch_hz, state.distortion, state.gain);
            tracing::debug!(
                pitch_hz = state.pitch_hz,
                distortion = state.distortion,
                samples = buffer.len(),
                backlog = pending.len(),
                "buffer regenerated"
            );
        }
        if buffer.is_empty() {
            std::thread::yield_now();
            continue;
        }
        if let Err(err) = sink.write(&buffer) {
            tracing::warn!(%err, "sink write failed, ending generation");
            break;
        }
    }

    fade_out(&mut sink, &generator, &mut state, &mut buffer);

    if let Err(err) = sink.stop() {
        tracing::warn!(%err, "sink stop failed");
    }
    pending.clear();
    tracing::debug!("generation thread finished");
    sink
}

/// Ramps the last pitch down as a sine so the note does not end on a click.
/// Skipped when the sink is no longer streaming. Returns the buffers written.
fn fade_out<S: AudioSink>(
    sink: &mut S,
    generator: &SampleGenerator<'_>,
    state: &mut EngineState,
    buffer: &mut Vec<i16>,
) -> usize {
    if !sink.state().is_streaming() {
        tracing::warn!(state = ?sink.state(), "sink not streaming, skipping fade-out");
        return 0;
    }

    let mut written = 0;
    for gain in fade_out_gains(state.gain) {
        state.gain = gain;
        generator.generate_into(buffer, state.pitch_hz, 0.0, gain);
        if let Err(err) = sink.write(buffer) {
            tracing::warn!(%err, "sink failed during fade-out");
            break;
        }
        written += 1;
    }
    written
}
