use arc_swap::ArcSwapOption;
use crossbeam::channel::{Receiver, Sender, TrySendError};
use std::sync::Arc;

use crate::config::InputPolicy;

/// Clamps to [0, 1], mapping NaN to 0.
pub fn clamp_unit(value: f32) -> f32 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

/// One sample of the two-dimensional control signal.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ControlInput {
    relative_pitch: f32,
    relative_distortion: f32,
}

impl ControlInput {
    pub fn new(relative_pitch: f32, relative_distortion: f32) -> Self {
        Self {
            relative_pitch: clamp_unit(relative_pitch),
            relative_distortion: clamp_unit(relative_distortion),
        }
    }

    pub fn relative_pitch(&self) -> f32 {
        self.relative_pitch
    }

    pub fn relative_distortion(&self) -> f32 {
        self.relative_distortion
    }
}

enum Slot {
    Fifo {
        tx: Sender<ControlInput>,
        rx: Receiver<ControlInput>,
    },
    Latest(ArcSwapOption<ControlInput>),
}

/// Hands control updates from the control thread to the generation thread.
///
/// Neither side ever blocks. The generation loop takes at most one entry per
/// buffer cycle, so with [`InputPolicy::Fifo`] a fast gesture builds up a
/// backlog that is worked off one step per buffer. [`InputPolicy::Latest`]
/// keeps only the newest value instead.
pub struct PendingInputChannel {
    slot: Slot,
}

impl PendingInputChannel {
    pub fn new(policy: InputPolicy) -> Self {
        let slot = match policy {
            InputPolicy::Fifo => {
                let (tx, rx) = crossbeam::channel::unbounded();
                Slot::Fifo { tx, rx }
            }
            InputPolicy::Latest => Slot::Latest(ArcSwapOption::empty()),
        };
        Self { slot }
    }

    pub fn policy(&self) -> InputPolicy {
        match self.slot {
            Slot::Fifo { .. } => InputPolicy::Fifo,
            Slot::Latest(_) => InputPolicy::Latest,
        }
    }

    pub fn push(&self, input: ControlInput) {
        match &self.slot {
            Slot::Fifo { tx, .. } => match tx.try_send(input) {
                Ok(()) => {}
                Err(TrySendError::Full(dropped) | TrySendError::Disconnected(dropped)) => {
                    tracing::warn!(?dropped, "control channel rejected update, dropping it");
                }
            },
            Slot::Latest(latest) => {
                latest.store(Some(Arc::new(input)));
            }
        }
    }

    /// Takes the next pending update without blocking.
    pub fn poll_one(&self) -> Option<ControlInput> {
        match &self.slot {
            Slot::Fifo { rx, .. } => rx.try_recv().ok(),
            Slot::Latest(latest) => latest.swap(None).map(|input| *input),
        }
    }

    pub fn len(&self) -> usize {
        match &self.slot {
            Slot::Fifo { rx, .. } => rx.len(),
            Slot::Latest(latest) => usize::from(latest.load().is_some()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        match &self.slot {
            Slot::Fifo { rx, .. } => while rx.try_recv().is_ok() {},
            Slot::Latest(latest) => latest.store(None),
        }
    }
}

impl Default for PendingInputChannel {
    fn default() -> Self {
        Self::new(InputPolicy::Fifo)
    }
}

impl std::fmt::Debug for PendingInputChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingInputChannel")
            .field("policy", &self.policy())
            .field("len", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn control_input_clamps() {
        let input = ControlInput::new(1.5, -0.2);
        assert_eq!(input.relative_pitch(), 1.0);
        assert_eq!(input.relative_distortion(), 0.0);
        assert_eq!(ControlInput::new(f32::NAN, 0.5).relative_pitch(), 0.0);
    }

    #[test]
    fn fifo_polls_oldest_first() {
        let channel = PendingInputChannel::new(InputPolicy::Fifo);
        assert_eq!(channel.poll_one(), None);

        for i in 0..10 {
            channel.push(ControlInput::new(i as f32 / 10.0, 0.5));
        }
        assert_eq!(channel.len(), 10);

        let first = channel.poll_one().unwrap();
        assert_eq!(first.relative_pitch(), 0.0);
        assert_eq!(channel.len(), 9);

        let second = channel.poll_one().unwrap();
        assert!((second.relative_pitch() - 0.1).abs() < 1e-6);
    }

    #[test]
    fn latest_keeps_only_newest() {
        let channel = PendingInputChannel::new(InputPolicy::Latest);
        for i in 0..10 {
            channel.push(ControlInput::new(i as f32 / 10.0, 0.5));
        }
        assert_eq!(channel.len(), 1);

        let input = channel.poll_one().unwrap();
        assert!((input.relative_pitch() - 0.9).abs() < 1e-6);
        assert!(channel.is_empty());
        assert_eq!(channel.poll_one(), None);
    }

    #[test]
    fn clear_empties_both_policies() {
        for policy in [InputPolicy::Fifo, InputPolicy::Latest] {
            let channel = PendingInputChannel::new(policy);
            channel.push(ControlInput::new(0.3, 0.3));
            channel.push(ControlInput::new(0.4, 0.4));
            channel.clear();
            assert!(channel.is_empty());
            assert_eq!(channel.policy(), policy);
        }
    }

    #[test]
    fn concurrent_producer_and_consumer() {
        let channel = Arc::new(PendingInputChannel::new(InputPolicy::Fifo));
        let producer = {
            let channel = Arc::clone(&channel);
            std::thread::spawn(move || {
                for i in 0..1000 {
                    channel.push(ControlInput::new(i as f32 / 1000.0, 0.0));
                }
            })
        };

        let mut received = Vec::new();
        while received.len() < 1000 {
            if let Some(input) = channel.poll_one() {
                received.push(input.relative_pitch());
            } else {
                std::thread::yield_now();
            }
        }
        producer.join().unwrap();

        assert!(received.windows(2).all(|w| w[0] <= w[1]));
    }
}
