//! Control → audio hand-off.
//!
//! Two bounded channels cross the thread boundary: a command channel for
//! session lifecycle (activate/pause/resume/stop) and the parameter channel
//! for live tweaks. The audio side only ever uses non-blocking operations —
//! a stalled control thread can never stall rendering.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crossbeam_channel::{Receiver, Sender, TrySendError, bounded};

use crate::engine::session::Session;

/// A live parameter-change intent posted by the control thread.
///
/// Intents are lossy by design: when the queue is full the oldest pending
/// intent is discarded, because blocking the audio thread would cause a
/// dropout, which is strictly worse than losing one stale update.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ParamChange {
    LayerFrequency { index: usize, frequency_hz: f64 },
    LayerGain { index: usize, gain: f64 },
    PanningDepth { depth: f64 },
    PanningCycle { cycle_seconds: f64 },
}

/// Session lifecycle commands. Unlike parameter intents these are never
/// silently dropped; a full queue surfaces as an error on the control side.
#[derive(Debug)]
pub(crate) enum Command {
    Activate(Box<Session>),
    Pause,
    Resume,
    Stop { forced: bool },
}

/// Control-side half of the parameter channel.
#[derive(Debug)]
pub struct ParamSender {
    tx: Sender<ParamChange>,
    // Handle on the queue head so an overflowing producer can retire the
    // oldest pending intent instead of the newest.
    head: Receiver<ParamChange>,
    dropped: Arc<AtomicU64>,
}

/// Audio-side half of the parameter channel.
#[derive(Debug)]
pub struct ParamReceiver {
    rx: Receiver<ParamChange>,
}

/// Create a bounded parameter channel.
pub fn param_channel(capacity: usize) -> (ParamSender, ParamReceiver) {
    let (tx, rx) = bounded(capacity.max(1));
    (
        ParamSender {
            tx,
            head: rx.clone(),
            dropped: Arc::new(AtomicU64::new(0)),
        },
        ParamReceiver { rx },
    )
}

impl ParamSender {
    /// Enqueue an intent. Never blocks; on overflow the oldest unapplied
    /// intent is dropped and counted.
    pub fn send(&self, change: ParamChange) {
        match self.tx.try_send(change) {
            Ok(()) => {}
            Err(TrySendError::Full(change)) => {
                if self.head.try_recv().is_ok() {
                    self.dropped.fetch_add(1, Ordering::Relaxed);
                }
                if self.tx.try_send(change).is_err() {
                    // Still no room (consumer vanished mid-drain); the new
                    // intent is the casualty instead.
                    self.dropped.fetch_add(1, Ordering::Relaxed);
                }
            }
            Err(TrySendError::Disconnected(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    /// Number of intents discarded so far. Observability only.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl ParamReceiver {
    /// Take at most one pending intent. Called once per block boundary by
    /// the render context.
    #[inline]
    pub fn poll(&self) -> Option<ParamChange> {
        self.rx.try_recv().ok()
    }
}
