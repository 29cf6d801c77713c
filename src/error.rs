//! Typed errors for the synthesis engine.
//!
//! [`EngineError`] is the top-level public error type. Preset validation
//! failures carry an [`InvalidPresetReason`] naming the offending field so
//! the catalog collaborator can report what to fix.

use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, EngineError>;

/// Errors surfaced by the engine's control API.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    /// The preset failed boundary validation; no partial session was created.
    #[error("invalid preset '{id}': {reason}")]
    InvalidPreset {
        /// Identifier of the rejected preset.
        id: String,
        /// What exactly was wrong with it.
        reason: InvalidPresetReason,
    },

    /// The entitlement gate refused playback. Any prior session is untouched.
    #[error("preset '{id}' is not entitled for playback")]
    NotEntitled {
        /// Identifier of the refused preset.
        id: String,
    },

    /// The rendering context is gone or failed. Recoverable from the control
    /// side by constructing a fresh engine and retrying activation.
    #[error("audio engine unavailable: {0}")]
    EngineUnavailable(&'static str),
}

/// The specific validation failure inside an [`EngineError::InvalidPreset`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InvalidPresetReason {
    #[error("layer {index} frequency must be positive, got {frequency_hz}")]
    NonPositiveFrequency { index: usize, frequency_hz: f64 },

    #[error("layer {index} gain must be within [0, 1], got {gain}")]
    GainOutOfRange { index: usize, gain: f64 },

    #[error("preset has no tone source (no layers and no binaural pair)")]
    EmptyLayers,

    #[error("binaural frequencies must be positive, got left {left_hz} / right {right_hz}")]
    NonPositiveBinauralFrequency { left_hz: f64, right_hz: f64 },

    #[error("panning cycle must be positive, got {cycle_seconds}")]
    NonPositivePanningCycle { cycle_seconds: f64 },

    #[error("panning depth must be within [0, 1], got {depth}")]
    PanningDepthOutOfRange { depth: f64 },

    #[error("duration must be positive, got {duration_seconds}")]
    NonPositiveDuration { duration_seconds: f64 },

    #[error("offline bounce requires a finite duration")]
    MissingDuration,
}
