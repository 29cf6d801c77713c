//! entrain-core — real-time psychoacoustic tone engine.
//!
//! Synthesizes layered tones (optionally with left/right frequency offsets
//! for binaural beats) and modulates stereo balance at a brainwave-
//! synchronized rate. The crate produces the sample stream only; device
//! I/O, preset catalogs, and entitlement live with their own services and
//! meet this engine at narrow seams ([`Preset`], [`EntitlementGate`], and
//! the output buffer handed to [`ToneEngine::render`]).
//!
//! The engine splits into two thread-affine halves: [`ToneEngine`] renders
//! on the audio thread, [`EngineHandle`] drives it from the control thread
//! over lock-free channels.

pub mod dsp;
pub mod engine;
pub mod error;
pub mod preset;
pub mod ring;

pub use crate::dsp::oscillator::ChannelTarget;
pub use crate::dsp::waveform::Waveform;
pub use crate::engine::snapshot::{SessionSnapshot, SessionStatus};
pub use crate::engine::{EngineConfig, EngineHandle, EntitlementGate, ToneEngine};
pub use crate::error::{EngineError, InvalidPresetReason, Result};
pub use crate::preset::{
    BinauralConfig, BrainwaveBand, FrequencyLayer, PanningConfig, Preset, PresetCategory,
};

/// The crate version, read from Cargo.toml at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Render a finite preset offline to a 16-bit stereo PCM WAV buffer.
pub fn bounce_preset_wav(preset: &Preset, sample_rate: u32) -> Result<Vec<u8>> {
    engine::bounce::bounce_wav(preset, sample_rate)
}
