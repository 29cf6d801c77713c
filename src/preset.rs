//! Preset types for tone sessions.
//!
//! These structs map directly to the `preset.json` schema served by the
//! entrain catalog. The catalog owns browsing, persistence, and gating
//! metadata; this crate only consumes validated, in-memory instances.

use serde::{Deserialize, Serialize};

use crate::dsp::waveform::Waveform;
use crate::error::{EngineError, InvalidPresetReason, Result};

// ── Preset (top-level) ──────────────────────────────────────

/// A complete tone-session description. Immutable once loaded; the engine
/// only ever reads it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Preset {
    /// Unique identifier (e.g., "deep-focus-theta").
    pub id: String,
    /// Human-readable name (e.g., "Deep Focus").
    pub name: String,
    /// Catalog category.
    pub category: PresetCategory,
    /// Independent tone layers, mixed into both channels.
    #[serde(default)]
    pub layers: Vec<FrequencyLayer>,
    /// Optional binaural pair, one oscillator per ear.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub binaural: Option<BinauralConfig>,
    /// Stereo panning modulation.
    #[serde(default)]
    pub panning: PanningConfig,
    /// Session length in seconds. `None` plays until stopped.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_seconds: Option<f64>,
    /// Whether playback requires an entitlement check.
    #[serde(default)]
    pub is_gated: bool,
}

/// Catalog categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PresetCategory {
    Focus,
    Relax,
    Sleep,
    Meditate,
    Custom,
}

/// One independent tone generator.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FrequencyLayer {
    /// Tone frequency in Hz. Must be positive.
    pub frequency_hz: f64,
    /// Waveform shape.
    pub waveform: Waveform,
    /// Layer gain [0, 1].
    pub gain: f64,
}

/// A left/right carrier pair. The perceived beat frequency is
/// `|right - left|`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BinauralConfig {
    /// Carrier frequency for the left ear, in Hz.
    pub left_frequency_hz: f64,
    /// Carrier frequency for the right ear, in Hz.
    pub right_frequency_hz: f64,
}

impl BinauralConfig {
    /// The beat frequency this pair produces.
    pub fn beat_frequency_hz(&self) -> f64 {
        (self.right_frequency_hz - self.left_frequency_hz).abs()
    }
}

/// Stereo balance modulation settings. `cycle_seconds` is the full
/// left→right→left period.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PanningConfig {
    pub enabled: bool,
    pub cycle_seconds: f64,
    /// Modulation depth [0, 1]. 0 leaves both channels untouched, 1 sweeps
    /// each channel all the way to silence at the opposite extreme.
    pub depth: f64,
}

impl Default for PanningConfig {
    fn default() -> Self {
        PanningConfig {
            enabled: false,
            cycle_seconds: 1.0,
            depth: 0.0,
        }
    }
}

impl Preset {
    /// Validate the preset at the system boundary. Called once during
    /// activation; the render path never re-interprets preset data.
    pub fn validate(&self) -> Result<()> {
        for (index, layer) in self.layers.iter().enumerate() {
            if !(layer.frequency_hz > 0.0) {
                return Err(self.fault(InvalidPresetReason::NonPositiveFrequency {
                    index,
                    frequency_hz: layer.frequency_hz,
                }));
            }
            if !(0.0..=1.0).contains(&layer.gain) {
                return Err(self.fault(InvalidPresetReason::GainOutOfRange {
                    index,
                    gain: layer.gain,
                }));
            }
        }

        if self.layers.is_empty() && self.binaural.is_none() {
            return Err(self.fault(InvalidPresetReason::EmptyLayers));
        }

        if let Some(binaural) = &self.binaural {
            if !(binaural.left_frequency_hz > 0.0) || !(binaural.right_frequency_hz > 0.0) {
                return Err(self.fault(InvalidPresetReason::NonPositiveBinauralFrequency {
                    left_hz: binaural.left_frequency_hz,
                    right_hz: binaural.right_frequency_hz,
                }));
            }
        }

        if self.panning.enabled && !(self.panning.cycle_seconds > 0.0) {
            return Err(self.fault(InvalidPresetReason::NonPositivePanningCycle {
                cycle_seconds: self.panning.cycle_seconds,
            }));
        }
        if !(0.0..=1.0).contains(&self.panning.depth) {
            return Err(self.fault(InvalidPresetReason::PanningDepthOutOfRange {
                depth: self.panning.depth,
            }));
        }

        if let Some(duration) = self.duration_seconds {
            if !(duration > 0.0) {
                return Err(self.fault(InvalidPresetReason::NonPositiveDuration {
                    duration_seconds: duration,
                }));
            }
        }

        Ok(())
    }

    fn fault(&self, reason: InvalidPresetReason) -> EngineError {
        EngineError::InvalidPreset {
            id: self.id.clone(),
            reason,
        }
    }
}

// ── Brainwave bands ─────────────────────────────────────────

/// Canonical brainwave bands with their entrainment targets.
///
/// Preset authors use this table to pick carrier pairs and panning cycles;
/// the engine itself only consumes the resolved [`PanningConfig`] and
/// [`BinauralConfig`] values. The panning cycle for a band is fixed at
/// `1 / target_hz`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BrainwaveBand {
    /// 1-4 Hz: deep sleep.
    Delta,
    /// 4-8 Hz: meditation, drowsiness.
    Theta,
    /// 8-13 Hz: relaxed alertness.
    Alpha,
    /// 13-30 Hz: active focus.
    Beta,
    /// 30+ Hz: peak concentration.
    Gamma,
}

impl BrainwaveBand {
    /// Target entrainment frequency for this band, in Hz.
    pub fn target_hz(&self) -> f64 {
        match self {
            BrainwaveBand::Delta => 2.5,
            BrainwaveBand::Theta => 6.0,
            BrainwaveBand::Alpha => 10.0,
            BrainwaveBand::Beta => 18.0,
            BrainwaveBand::Gamma => 40.0,
        }
    }

    /// Recommended binaural carrier frequency, in Hz.
    pub fn carrier_hz(&self) -> f64 {
        match self {
            BrainwaveBand::Delta | BrainwaveBand::Theta | BrainwaveBand::Alpha => 200.0,
            BrainwaveBand::Beta => 220.0,
            BrainwaveBand::Gamma => 240.0,
        }
    }

    /// Panning period matching the band target: one full left→right→left
    /// traversal per target cycle.
    pub fn cycle_seconds(&self) -> f64 {
        1.0 / self.target_hz()
    }

    /// A carrier pair whose beat frequency hits the band target.
    pub fn binaural(&self) -> BinauralConfig {
        BinauralConfig {
            left_frequency_hz: self.carrier_hz(),
            right_frequency_hz: self.carrier_hz() + self.target_hz(),
        }
    }
}
