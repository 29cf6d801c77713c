//! The tone engine — session state machine and real-time control plumbing.
//!
//! Construction yields two halves with distinct thread affinities:
//!
//! - [`ToneEngine`] moves to the audio-rendering context. Its only job is
//!   `render`, which fills interleaved stereo blocks within the block's
//!   time budget: no locks, no allocation, no I/O.
//! - [`EngineHandle`] stays with the application/UI thread. It validates
//!   presets, checks entitlement, and posts commands and parameter intents
//!   across bounded channels.
//!
//! There is no global engine instance; callers own both halves and their
//! lifecycle. Dropping the [`ToneEngine`] disconnects the handle, whose
//! calls then fail with [`EngineError::EngineUnavailable`].

pub mod bounce;
pub mod control;
pub(crate) mod session;
pub mod snapshot;

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use crossbeam_channel::{Receiver, Sender, TrySendError, bounded};
use tracing::{debug, info, warn};

use crate::dsp::mixer::BinauralMixer;
use crate::engine::control::{Command, ParamChange, ParamReceiver, ParamSender, param_channel};
use crate::engine::session::Session;
use crate::engine::snapshot::{SessionSnapshot, SessionStatus, SharedState};
use crate::error::{EngineError, Result};
use crate::preset::Preset;

/// Engine-wide timing configuration.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Output sample rate in Hz.
    pub sample_rate: f64,
    /// Slew window for live parameter changes, in seconds. Floor of 5 ms
    /// is what keeps changes click-free; the default leaves headroom.
    pub ramp_seconds: f64,
    /// Master fade-in applied at activation.
    pub fade_in_seconds: f64,
    /// Master fade-out for duration expiry and ordinary stops.
    pub fade_out_seconds: f64,
    /// Ramp used for forced stops. Short, but never a hard cut.
    pub forced_stop_seconds: f64,
    /// Capacity of the lossy parameter-intent queue.
    pub param_queue_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            sample_rate: 44100.0,
            ramp_seconds: 0.010,
            fade_in_seconds: 0.1,
            fade_out_seconds: 3.0,
            forced_stop_seconds: 0.05,
            param_queue_capacity: 64,
        }
    }
}

/// Entitlement check supplied by the subscription service. Closures work
/// directly: `&|_: &Preset| true`.
pub trait EntitlementGate {
    fn can_play(&self, preset: &Preset) -> bool;
}

impl<F> EntitlementGate for F
where
    F: Fn(&Preset) -> bool,
{
    fn can_play(&self, preset: &Preset) -> bool {
        self(preset)
    }
}

/// Audio-context half: renders the active session into caller buffers.
pub struct ToneEngine {
    config: EngineConfig,
    mixer: BinauralMixer,
    session: Option<Box<Session>>,
    status: SessionStatus,
    shared: Arc<SharedState>,
    params: ParamReceiver,
    commands: Receiver<Command>,
    retired: Sender<Box<Session>>,
    poisoned: bool,
}

/// Control-context half: lifecycle commands, parameter intents, and the
/// observable session snapshot.
pub struct EngineHandle {
    config: EngineConfig,
    params: ParamSender,
    commands: Sender<Command>,
    retired: Receiver<Box<Session>>,
    shared: Arc<SharedState>,
}

impl ToneEngine {
    /// Build an engine pair. The returned [`ToneEngine`] belongs on the
    /// rendering thread, the [`EngineHandle`] wherever control lives.
    pub fn new(config: EngineConfig) -> (ToneEngine, EngineHandle) {
        let (param_tx, param_rx) = param_channel(config.param_queue_capacity);
        let (command_tx, command_rx) = bounded(16);
        // Retired sessions travel back here so their heap resources are
        // dropped off the audio thread.
        let (retired_tx, retired_rx) = bounded(4);
        let shared = Arc::new(SharedState::new());

        let engine = ToneEngine {
            config: config.clone(),
            mixer: BinauralMixer::new(),
            session: None,
            status: SessionStatus::Idle,
            shared: Arc::clone(&shared),
            params: param_rx,
            commands: command_rx,
            retired: retired_tx,
            poisoned: false,
        };
        let handle = EngineHandle {
            config,
            params: param_tx,
            commands: command_tx,
            retired: retired_rx,
            shared,
        };
        (engine, handle)
    }

    pub fn sample_rate(&self) -> f64 {
        self.config.sample_rate
    }

    /// Current lifecycle status as seen by the render context.
    pub fn status(&self) -> SessionStatus {
        self.status
    }

    /// Render the next interleaved stereo block. `out.len()` must be even.
    ///
    /// A panic anywhere in the render path poisons the engine: the block
    /// is zeroed, every later call outputs silence, and the failure is
    /// visible to the control side. Corrupted samples never leave the
    /// engine.
    pub fn render(&mut self, out: &mut [f32]) {
        if self.poisoned {
            out.fill(0.0);
            return;
        }
        let faulted = panic::catch_unwind(AssertUnwindSafe(|| {
            self.render_block(&mut *out);
        }))
        .is_err();
        if faulted {
            self.poisoned = true;
            self.session = None;
            self.status = SessionStatus::Stopped;
            self.shared.mark_failed();
            self.shared.publish(SessionStatus::Stopped, 0.0, 0.0);
            out.fill(0.0);
        }
    }

    fn render_block(&mut self, out: &mut [f32]) {
        self.drain_commands();

        // At most one parameter intent per block boundary.
        if let Some(change) = self.params.poll() {
            if let Some(session) = self.session.as_mut() {
                session.apply(&change);
            }
        }

        match self.status {
            SessionStatus::Running | SessionStatus::FadingOut => {
                match self.session.as_mut() {
                    Some(session) => {
                        session.render_block(&self.mixer, out);
                        if session.is_fading_out() {
                            self.status = SessionStatus::FadingOut;
                        }
                        if session.is_finished() {
                            self.retire_session();
                            self.status = SessionStatus::Stopped;
                        }
                    }
                    None => out.fill(0.0),
                }
            }
            // Paused keeps the session (and its phase) but renders silence.
            _ => out.fill(0.0),
        }

        let (elapsed, phase) = self
            .session
            .as_ref()
            .map(|s| (s.elapsed_seconds(), s.panning_phase()))
            .unwrap_or((0.0, 0.0));
        self.shared.publish(self.status, elapsed, phase);
    }

    fn drain_commands(&mut self) {
        while let Ok(command) = self.commands.try_recv() {
            match command {
                Command::Activate(new_session) => {
                    // The previous session's oscillators are gone before the
                    // new ones produce a single sample.
                    self.retire_session();
                    self.session = Some(new_session);
                    self.status = SessionStatus::Running;
                }
                Command::Pause => {
                    if self.status == SessionStatus::Running {
                        self.status = SessionStatus::Paused;
                    }
                }
                Command::Resume => {
                    if self.status == SessionStatus::Paused {
                        self.status = SessionStatus::Running;
                    }
                }
                Command::Stop { forced } => self.handle_stop(forced),
            }
        }
    }

    fn handle_stop(&mut self, forced: bool) {
        match self.status {
            SessionStatus::Running | SessionStatus::Paused | SessionStatus::FadingOut => {
                if let Some(session) = self.session.as_mut() {
                    let seconds = if forced {
                        self.config.forced_stop_seconds
                    } else {
                        self.config.fade_out_seconds
                    };
                    let frames = (seconds * self.config.sample_rate).round() as u32;
                    session.begin_fade_out(frames, forced);
                    // Stopping a paused session resumes rendering just for
                    // the fade.
                    self.status = SessionStatus::FadingOut;
                } else {
                    self.status = SessionStatus::Stopped;
                }
            }
            SessionStatus::Idle | SessionStatus::Stopped => {}
        }
    }

    fn retire_session(&mut self) {
        if let Some(old) = self.session.take() {
            if let Err(err) = self.retired.try_send(old) {
                // Control side stopped reclaiming; dropping here is the
                // fallback.
                drop(err.into_inner());
            }
        }
    }
}

impl EngineHandle {
    /// Validate, entitle, and activate a preset. On success the session
    /// starts at the render context's next block boundary, after the
    /// previous session (if any) has been torn down.
    pub fn activate(&self, preset: &Preset, gate: &dyn EntitlementGate) -> Result<()> {
        self.reclaim();
        if self.shared.is_failed() {
            return Err(EngineError::EngineUnavailable("render context failed"));
        }
        preset.validate()?;
        if !gate.can_play(preset) {
            debug!(preset = %preset.id, "activation refused by entitlement gate");
            return Err(EngineError::NotEntitled {
                id: preset.id.clone(),
            });
        }

        let session = Box::new(Session::new(preset, &self.config));
        self.send(Command::Activate(session))?;
        info!(preset = %preset.id, "session activated");
        Ok(())
    }

    /// Freeze rendering at the next block boundary. Oscillator phase is
    /// preserved.
    pub fn pause(&self) -> Result<()> {
        self.reclaim();
        debug!("pause requested");
        self.send(Command::Pause)
    }

    /// Resume a paused session with no phase discontinuity.
    pub fn resume(&self) -> Result<()> {
        self.reclaim();
        debug!("resume requested");
        self.send(Command::Resume)
    }

    /// Stop the session through the fade-out path. `forced` shortens the
    /// fade to the configured forced-stop ramp but never hard-cuts.
    pub fn stop(&self, forced: bool) -> Result<()> {
        self.reclaim();
        info!(forced, "stop requested");
        self.send(Command::Stop { forced })
    }

    /// Retarget one layer's frequency. Lossy fire-and-forget intent.
    pub fn set_layer_frequency(&self, index: usize, frequency_hz: f64) {
        if frequency_hz > 0.0 {
            self.params.send(ParamChange::LayerFrequency {
                index,
                frequency_hz,
            });
        } else {
            warn!(index, frequency_hz, "ignoring non-positive frequency intent");
        }
    }

    /// Retarget one layer's gain. Lossy fire-and-forget intent.
    pub fn set_layer_gain(&self, index: usize, gain: f64) {
        if (0.0..=1.0).contains(&gain) {
            self.params.send(ParamChange::LayerGain { index, gain });
        } else {
            warn!(index, gain, "ignoring out-of-range gain intent");
        }
    }

    /// Retarget the panning depth. Lossy fire-and-forget intent.
    pub fn set_panning_depth(&self, depth: f64) {
        if (0.0..=1.0).contains(&depth) {
            self.params.send(ParamChange::PanningDepth { depth });
        } else {
            warn!(depth, "ignoring out-of-range panning depth intent");
        }
    }

    /// Retarget the panning cycle length. Ramps the LFO rate, not its
    /// phase.
    pub fn set_panning_cycle(&self, cycle_seconds: f64) {
        if cycle_seconds > 0.0 {
            self.params.send(ParamChange::PanningCycle { cycle_seconds });
        } else {
            warn!(cycle_seconds, "ignoring non-positive panning cycle intent");
        }
    }

    /// The latest state published by the render context.
    pub fn snapshot(&self) -> SessionSnapshot {
        self.reclaim();
        let (status, elapsed_seconds, panning_phase) = self.shared.read();
        SessionSnapshot {
            status,
            elapsed_seconds,
            panning_phase,
            dropped_intents: self.params.dropped(),
        }
    }

    /// Intents discarded by the lossy parameter queue so far.
    pub fn dropped_intents(&self) -> u64 {
        self.params.dropped()
    }

    /// Drop sessions the render context has handed back, keeping heap
    /// teardown off the audio thread.
    fn reclaim(&self) {
        while let Ok(retired) = self.retired.try_recv() {
            drop(retired);
        }
    }

    fn send(&self, command: Command) -> Result<()> {
        self.commands.try_send(command).map_err(|err| match err {
            TrySendError::Full(_) => EngineError::EngineUnavailable("command queue full"),
            TrySendError::Disconnected(_) => {
                EngineError::EngineUnavailable("render context gone")
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsp::waveform::Waveform;
    use crate::preset::{FrequencyLayer, PanningConfig, PresetCategory};
    use crate::ring::sample_ring;

    const BLOCK: usize = 512; // 256 stereo frames

    fn test_config() -> EngineConfig {
        EngineConfig {
            fade_in_seconds: 0.0,
            ..EngineConfig::default()
        }
    }

    fn sine_preset() -> Preset {
        Preset {
            id: "engine-test".to_string(),
            name: "Engine Test".to_string(),
            category: PresetCategory::Custom,
            layers: vec![FrequencyLayer {
                frequency_hz: 440.0,
                waveform: Waveform::Sine,
                gain: 1.0,
            }],
            binaural: None,
            panning: PanningConfig::default(),
            duration_seconds: None,
            is_gated: false,
        }
    }

    fn allow_all() -> impl EntitlementGate {
        |_: &Preset| true
    }

    #[test]
    fn activation_produces_equal_stereo() {
        let (mut engine, handle) = ToneEngine::new(test_config());
        handle
            .activate(&sine_preset(), &allow_all())
            .expect("activation should succeed");

        let mut out = [0.0f32; BLOCK];
        engine.render(&mut out);

        assert!(
            out.iter().any(|s| s.abs() > 1e-3),
            "single sine layer should be audible in the first block"
        );
        for frame in out.chunks_exact(2) {
            assert_eq!(
                frame[0], frame[1],
                "panning disabled: both channels must be identical"
            );
        }
        assert_eq!(engine.status(), SessionStatus::Running);
        assert_eq!(handle.snapshot().status, SessionStatus::Running);
    }

    #[test]
    fn gated_preset_with_refusal_stays_idle() {
        let (mut engine, handle) = ToneEngine::new(test_config());
        let mut preset = sine_preset();
        preset.is_gated = true;

        let refuse = |_: &Preset| false;
        let err = handle.activate(&preset, &refuse).unwrap_err();
        assert!(matches!(err, EngineError::NotEntitled { .. }));

        let mut out = [0.1f32; BLOCK];
        engine.render(&mut out);
        assert!(out.iter().all(|&s| s == 0.0), "no session: output is silence");
        assert_eq!(handle.snapshot().status, SessionStatus::Idle);
    }

    #[test]
    fn invalid_preset_is_rejected_before_any_command() {
        let (_engine, handle) = ToneEngine::new(test_config());
        let mut preset = sine_preset();
        preset.layers[0].frequency_hz = -5.0;
        let err = handle.activate(&preset, &allow_all()).unwrap_err();
        assert!(matches!(err, EngineError::InvalidPreset { .. }));
        assert_eq!(handle.snapshot().status, SessionStatus::Idle);
    }

    #[test]
    fn pause_freezes_and_resume_continues_phase() {
        let (mut engine, handle) = ToneEngine::new(test_config());
        handle.activate(&sine_preset(), &allow_all()).unwrap();

        let mut out = [0.0f32; BLOCK];
        for _ in 0..4 {
            engine.render(&mut out);
        }
        let last_running = out[BLOCK - 2];
        let elapsed_before = handle.snapshot().elapsed_seconds;

        handle.pause().unwrap();
        let mut paused = [0.5f32; BLOCK];
        engine.render(&mut paused);
        assert!(paused.iter().all(|&s| s == 0.0), "paused blocks are silent");
        assert_eq!(handle.snapshot().status, SessionStatus::Paused);
        assert_eq!(
            handle.snapshot().elapsed_seconds,
            elapsed_before,
            "elapsed time must freeze while paused"
        );

        handle.resume().unwrap();
        engine.render(&mut out);
        let first_resumed = out[0];
        // Phase was preserved: the resumed stream continues within the
        // oscillator's natural slope (~0.063/sample at 440 Hz).
        assert!(
            (first_resumed - last_running).abs() < 0.08,
            "resume should continue the waveform without a jump: {} -> {}",
            last_running,
            first_resumed
        );
    }

    #[test]
    fn stop_fades_to_silence_and_stops() {
        let config = EngineConfig {
            fade_out_seconds: 0.05,
            ..test_config()
        };
        let (mut engine, handle) = ToneEngine::new(config);
        handle.activate(&sine_preset(), &allow_all()).unwrap();

        let mut out = [0.0f32; BLOCK];
        engine.render(&mut out);
        handle.stop(false).unwrap();

        // 50 ms at 44.1 kHz is ~2205 frames; a dozen blocks is plenty.
        let mut prev = out[BLOCK - 2];
        for _ in 0..12 {
            engine.render(&mut out);
            for frame in out.chunks_exact(2) {
                assert!(
                    (frame[0] - prev).abs() < 0.08,
                    "fade-out must not introduce a click"
                );
                prev = frame[0];
            }
            if engine.status() == SessionStatus::Stopped {
                break;
            }
        }
        assert_eq!(engine.status(), SessionStatus::Stopped);
        assert_eq!(handle.snapshot().status, SessionStatus::Stopped);
    }

    #[test]
    fn forced_stop_ramps_within_budget() {
        let (mut engine, handle) = ToneEngine::new(test_config());
        handle.activate(&sine_preset(), &allow_all()).unwrap();

        let mut out = [0.0f32; BLOCK];
        engine.render(&mut out);
        handle.stop(true).unwrap();

        // Forced budget is 50 ms = 2205 frames; allow block rounding.
        let mut frames = 0;
        for _ in 0..20 {
            engine.render(&mut out);
            frames += BLOCK / 2;
            if engine.status() == SessionStatus::Stopped {
                break;
            }
        }
        assert_eq!(engine.status(), SessionStatus::Stopped);
        assert!(
            frames <= 2205 + 2 * (BLOCK / 2),
            "forced stop took {frames} frames"
        );
    }

    #[test]
    fn new_activation_replaces_running_session() {
        let (mut engine, handle) = ToneEngine::new(test_config());
        handle.activate(&sine_preset(), &allow_all()).unwrap();

        let mut out = [0.0f32; BLOCK];
        for _ in 0..8 {
            engine.render(&mut out);
        }
        let elapsed_first = handle.snapshot().elapsed_seconds;
        assert!(elapsed_first > 0.04);

        // Replacement session is silent (gain 0), making the swap
        // observable in the output.
        let mut silent = sine_preset();
        silent.id = "engine-test-silent".to_string();
        silent.layers[0].gain = 0.0;
        handle.activate(&silent, &allow_all()).unwrap();

        engine.render(&mut out);
        assert!(
            out.iter().all(|&s| s.abs() < 1e-6),
            "old oscillators must be gone at the first post-swap block"
        );
        let snap = handle.snapshot();
        assert_eq!(snap.status, SessionStatus::Running);
        assert!(
            snap.elapsed_seconds < elapsed_first,
            "elapsed time restarts with the new session"
        );
    }

    #[test]
    fn gain_intent_applies_through_ramp() {
        let (mut engine, handle) = ToneEngine::new(test_config());
        handle.activate(&sine_preset(), &allow_all()).unwrap();

        let mut out = [0.0f32; BLOCK];
        engine.render(&mut out);
        handle.set_layer_gain(0, 0.0);

        // 10 ms ramp = 441 frames ≈ 2 blocks; by the fifth block the layer
        // is silent.
        for _ in 0..5 {
            engine.render(&mut out);
        }
        assert!(
            out.iter().all(|&s| s.abs() < 1e-6),
            "gain intent should have silenced the layer"
        );
        assert_eq!(handle.dropped_intents(), 0);
    }

    #[test]
    fn out_of_range_intents_are_ignored_on_the_control_side() {
        let (_engine, handle) = ToneEngine::new(test_config());
        handle.set_layer_frequency(0, -10.0);
        handle.set_layer_gain(0, 2.0);
        handle.set_panning_depth(-0.5);
        handle.set_panning_cycle(0.0);
        assert_eq!(handle.dropped_intents(), 0, "rejected intents are not queued");
    }

    #[test]
    fn handle_reports_unavailable_after_engine_drop() {
        let (engine, handle) = ToneEngine::new(test_config());
        drop(engine);
        let err = handle.activate(&sine_preset(), &allow_all()).unwrap_err();
        assert!(matches!(err, EngineError::EngineUnavailable(_)));
        let err = handle.pause().unwrap_err();
        assert!(matches!(err, EngineError::EngineUnavailable(_)));
    }

    #[test]
    fn snapshot_publishes_authoritative_panning_phase() {
        let (mut engine, handle) = ToneEngine::new(test_config());
        let mut preset = sine_preset();
        preset.panning = PanningConfig {
            enabled: true,
            cycle_seconds: 1.0,
            depth: 0.5,
        };
        handle.activate(&preset, &allow_all()).unwrap();

        let mut out = [0.0f32; BLOCK];
        engine.render(&mut out);
        let first = handle.snapshot().panning_phase;
        engine.render(&mut out);
        let second = handle.snapshot().panning_phase;

        assert!(first > 0.0 && first < 1.0);
        assert!(
            second > first,
            "phase should advance with rendered blocks: {first} -> {second}"
        );
        // Two 256-frame blocks into a 1 s cycle.
        let expected = 512.0 / 44100.0;
        assert!(
            (second - expected).abs() < 1e-9,
            "published phase should track rendered frames, got {second}"
        );
    }

    #[test]
    fn render_thread_feeds_sink_through_ring() {
        let config = EngineConfig {
            fade_out_seconds: 0.05,
            ..test_config()
        };
        let (mut engine, handle) = ToneEngine::new(config);
        let (mut producer, mut consumer) = sample_ring(16384);

        // Queue the whole scenario up front so the render thread's progress
        // is deterministic: activate, then fade out.
        handle.activate(&sine_preset(), &allow_all()).unwrap();
        handle.stop(false).unwrap();

        let renderer = std::thread::spawn(move || {
            let mut buf = [0.0f32; BLOCK];
            for _ in 0..1000 {
                engine.render(&mut buf);
                producer.push(&buf);
                if engine.status() == SessionStatus::Stopped {
                    break;
                }
            }
            engine.status()
        });

        let final_status = renderer.join().expect("render thread panicked");
        assert_eq!(final_status, SessionStatus::Stopped);
        assert_eq!(handle.snapshot().status, SessionStatus::Stopped);

        let mut sink = vec![0.0f32; 4096];
        consumer.fill(&mut sink);
        assert!(
            sink.iter().any(|s| s.abs() > 1e-3),
            "sink should have received audible samples through the ring"
        );
    }
}
