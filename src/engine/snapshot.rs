//! Lock-free session state publishing, audio → control.
//!
//! The render context owns the authoritative state and publishes a copy
//! through plain atomics after every block; the control side reads it at
//! any time without synchronizing with rendering. UI indicators (elapsed
//! time, pan position) follow this snapshot rather than their own timers,
//! so what is displayed can never drift from what is heard.

use std::sync::atomic::{AtomicBool, AtomicU8, AtomicU64, Ordering};

/// Lifecycle states of a tone session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SessionStatus {
    /// No session has been activated yet.
    Idle = 0,
    /// Actively rendering samples.
    Running = 1,
    /// Rendering frozen; oscillator phase preserved.
    Paused = 2,
    /// Master gain ramping to zero before release.
    FadingOut = 3,
    /// Session finished and its resources released.
    Stopped = 4,
}

impl SessionStatus {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => SessionStatus::Running,
            2 => SessionStatus::Paused,
            3 => SessionStatus::FadingOut,
            4 => SessionStatus::Stopped,
            _ => SessionStatus::Idle,
        }
    }
}

/// A point-in-time copy of the observable session state.
#[derive(Debug, Clone, Copy)]
pub struct SessionSnapshot {
    pub status: SessionStatus,
    pub elapsed_seconds: f64,
    /// Panning LFO phase in [0, 1), 0 when no session is active.
    pub panning_phase: f64,
    /// Parameter intents discarded by the lossy channel so far.
    pub dropped_intents: u64,
}

/// Atomically-published state shared between the two execution contexts.
#[derive(Debug)]
pub(crate) struct SharedState {
    status: AtomicU8,
    elapsed_bits: AtomicU64,
    panning_phase_bits: AtomicU64,
    failed: AtomicBool,
}

impl SharedState {
    pub fn new() -> Self {
        SharedState {
            status: AtomicU8::new(SessionStatus::Idle as u8),
            elapsed_bits: AtomicU64::new(0.0_f64.to_bits()),
            panning_phase_bits: AtomicU64::new(0.0_f64.to_bits()),
            failed: AtomicBool::new(false),
        }
    }

    /// Publish the post-block state. Render context only.
    pub fn publish(&self, status: SessionStatus, elapsed_seconds: f64, panning_phase: f64) {
        self.elapsed_bits
            .store(elapsed_seconds.to_bits(), Ordering::Relaxed);
        self.panning_phase_bits
            .store(panning_phase.to_bits(), Ordering::Relaxed);
        // Status last, releasing the field writes above.
        self.status.store(status as u8, Ordering::Release);
    }

    /// Read the published state. Control context only.
    pub fn read(&self) -> (SessionStatus, f64, f64) {
        let status = SessionStatus::from_u8(self.status.load(Ordering::Acquire));
        let elapsed = f64::from_bits(self.elapsed_bits.load(Ordering::Relaxed));
        let phase = f64::from_bits(self.panning_phase_bits.load(Ordering::Relaxed));
        (status, elapsed, phase)
    }

    /// Flag a fatal render-context fault. One-way.
    pub fn mark_failed(&self) {
        self.failed.store(true, Ordering::Release);
    }

    pub fn is_failed(&self) -> bool {
        self.failed.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn publish_read_round_trip() {
        let shared = SharedState::new();
        shared.publish(SessionStatus::Running, 12.5, 0.75);
        let (status, elapsed, phase) = shared.read();
        assert_eq!(status, SessionStatus::Running);
        assert_eq!(elapsed, 12.5);
        assert_eq!(phase, 0.75);
    }

    #[test]
    fn starts_idle_and_healthy() {
        let shared = SharedState::new();
        let (status, elapsed, phase) = shared.read();
        assert_eq!(status, SessionStatus::Idle);
        assert_eq!(elapsed, 0.0);
        assert_eq!(phase, 0.0);
        assert!(!shared.is_failed());
    }

    #[test]
    fn failure_flag_is_sticky() {
        let shared = SharedState::new();
        shared.mark_failed();
        shared.publish(SessionStatus::Stopped, 0.0, 0.0);
        assert!(shared.is_failed());
    }

    #[test]
    fn unknown_status_byte_reads_as_idle() {
        assert_eq!(SessionStatus::from_u8(200), SessionStatus::Idle);
    }
}
