//! Binaural mixer — sums oscillator layers into a stereo frame.

use crate::dsp::oscillator::{ChannelTarget, OscillatorLayer};

/// Combines any number of [`OscillatorLayer`]s into one stereo sample pair
/// per tick, routing each layer to its target channel(s).
///
/// The sum is normalized by `1/sqrt(layer_count)` and passed through a tanh
/// soft clipper, so stacking many layers never hard-clips. Saturation is an
/// audio-quality invariant here, not an error condition.
#[derive(Debug, Clone)]
pub struct BinauralMixer {
    pub master_gain: f64,
}

impl BinauralMixer {
    pub fn new() -> Self {
        BinauralMixer { master_gain: 0.8 }
    }

    /// Pull one sample from every layer and mix the next stereo frame.
    #[inline]
    pub fn mix_frame(&self, layers: &mut [OscillatorLayer]) -> (f64, f64) {
        let mut left = 0.0;
        let mut right = 0.0;
        for layer in layers.iter_mut() {
            let s = layer.next_sample();
            match layer.channel_target() {
                ChannelTarget::Left => left += s,
                ChannelTarget::Right => right += s,
                ChannelTarget::Both => {
                    left += s;
                    right += s;
                }
            }
        }

        if layers.len() > 1 {
            let norm = 1.0 / (layers.len() as f64).sqrt();
            left *= norm;
            right *= norm;
        }

        (
            soft_clip(left * self.master_gain),
            soft_clip(right * self.master_gain),
        )
    }
}

impl Default for BinauralMixer {
    fn default() -> Self {
        Self::new()
    }
}

/// Tanh saturation keeps the output in (-1, 1) without the harsh artifacts
/// of a hard clip.
#[inline]
fn soft_clip(x: f64) -> f64 {
    x.tanh()
}
