//! A running tone session: oscillator layers + panning LFO + master
//! envelope, built once from a validated preset.
//!
//! Sessions are constructed on the control thread (where allocation is
//! fine) and moved to the render context whole. Everything they do after
//! that point is allocation-free.

use crate::dsp::lfo::PanningLfo;
use crate::dsp::mixer::BinauralMixer;
use crate::dsp::oscillator::{ChannelTarget, OscillatorLayer};
use crate::dsp::ramp::ParamRamp;
use crate::dsp::waveform::Waveform;
use crate::engine::EngineConfig;
use crate::engine::control::ParamChange;
use crate::preset::Preset;

#[derive(Debug)]
pub(crate) struct Session {
    layers: Vec<OscillatorLayer>,
    /// How many leading entries of `layers` came from `preset.layers` and
    /// are therefore addressable by layer index. The binaural pair sits
    /// after them and is not reachable by stale UI intents.
    addressable_layers: usize,
    lfo: PanningLfo,
    /// Master envelope: fade-in at activation, fade-out at the end.
    master: ParamRamp,
    elapsed_frames: u64,
    /// Frame at which the duration-driven fade-out begins.
    fade_start_frame: Option<u64>,
    fade_out_frames: u32,
    /// Slew window for live parameter changes.
    ramp_frames: u32,
    sample_rate: f64,
    fading_out: bool,
    finished: bool,
}

impl Session {
    /// Build a session from a preset the boundary has already validated.
    pub fn new(preset: &Preset, config: &EngineConfig) -> Self {
        let sample_rate = config.sample_rate;

        let mut layers: Vec<OscillatorLayer> = preset
            .layers
            .iter()
            .map(|layer| OscillatorLayer::from_layer(layer, sample_rate))
            .collect();
        let addressable_layers = layers.len();

        if let Some(binaural) = &preset.binaural {
            layers.push(OscillatorLayer::new(
                binaural.left_frequency_hz,
                Waveform::Sine,
                1.0,
                ChannelTarget::Left,
                sample_rate,
            ));
            layers.push(OscillatorLayer::new(
                binaural.right_frequency_hz,
                Waveform::Sine,
                1.0,
                ChannelTarget::Right,
                sample_rate,
            ));
        }

        let lfo = PanningLfo::new(&preset.panning, sample_rate);

        let mut master = ParamRamp::new(0.0);
        master.ramp_to(1.0, (config.fade_in_seconds * sample_rate).round() as u32);

        let nominal_fade = (config.fade_out_seconds * sample_rate).round() as u32;
        let (fade_start_frame, fade_out_frames) = match preset.duration_seconds {
            Some(duration) => {
                let duration_frames = (duration * sample_rate).round() as u64;
                // A session shorter than the fade window fades for its whole
                // length.
                let fade = (nominal_fade as u64).min(duration_frames) as u32;
                (Some(duration_frames - fade as u64), fade)
            }
            None => (None, nominal_fade),
        };

        Session {
            layers,
            addressable_layers,
            lfo,
            master,
            elapsed_frames: 0,
            fade_start_frame,
            fade_out_frames,
            ramp_frames: (config.ramp_seconds * sample_rate).round() as u32,
            sample_rate,
            fading_out: false,
            finished: false,
        }
    }

    /// Render one interleaved stereo block. `out.len()` must be even.
    pub fn render_block(&mut self, mixer: &BinauralMixer, out: &mut [f32]) {
        for frame in out.chunks_exact_mut(2) {
            if self.finished {
                frame[0] = 0.0;
                frame[1] = 0.0;
                continue;
            }

            if let Some(start) = self.fade_start_frame {
                if !self.fading_out && self.elapsed_frames >= start {
                    self.begin_fade_out(self.fade_out_frames, false);
                }
            }

            let (left, right) = mixer.mix_frame(&mut self.layers);
            let (pan_left, pan_right) = self.lfo.next_gains();
            let master = self.master.next();

            frame[0] = (left * pan_left * master) as f32;
            frame[1] = (right * pan_right * master) as f32;
            self.elapsed_frames += 1;

            if self.fading_out && self.master.is_settled() {
                self.finished = true;
            }
        }
    }

    /// Convert a parameter intent into a ramp target. Indexes outside the
    /// preset's layer list are stale (from a previous session) and ignored.
    pub fn apply(&mut self, change: &ParamChange) {
        match *change {
            ParamChange::LayerFrequency {
                index,
                frequency_hz,
            } => {
                if index < self.addressable_layers && frequency_hz > 0.0 {
                    self.layers[index].set_frequency(frequency_hz, self.ramp_frames);
                }
            }
            ParamChange::LayerGain { index, gain } => {
                if index < self.addressable_layers && (0.0..=1.0).contains(&gain) {
                    self.layers[index].set_gain(gain, self.ramp_frames);
                }
            }
            ParamChange::PanningDepth { depth } => {
                self.lfo.set_depth(depth, self.ramp_frames);
            }
            ParamChange::PanningCycle { cycle_seconds } => {
                self.lfo.set_cycle_seconds(cycle_seconds, self.ramp_frames);
            }
        }
    }

    /// Start ramping the master gain to silence. A forced request shortens
    /// an already-running fade; a plain one leaves it alone.
    pub fn begin_fade_out(&mut self, frames: u32, forced: bool) {
        if self.fading_out {
            if forced {
                self.master.hasten(frames.max(1));
            }
            return;
        }
        self.fading_out = true;
        self.master.ramp_to(0.0, frames.max(1));
    }

    pub fn is_fading_out(&self) -> bool {
        self.fading_out
    }

    /// True once the fade-out has settled at silence.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn elapsed_seconds(&self) -> f64 {
        self.elapsed_frames as f64 / self.sample_rate
    }

    pub fn panning_phase(&self) -> f64 {
        self.lfo.phase()
    }
}
