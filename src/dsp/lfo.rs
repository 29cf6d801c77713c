//! Panning LFO — sub-audio oscillator that redistributes stereo energy.

use std::f64::consts::TAU;

use crate::dsp::ramp::ParamRamp;
use crate::preset::PanningConfig;

/// Low-frequency oscillator driving stereo balance.
///
/// One full cycle moves energy left→right→left over `cycle_seconds`. The
/// pan position follows a phase-shifted sine chosen so a cycle starts with
/// the left channel at full gain: `p = -cos(2π·phase)`, with
/// `left = (1 - depth) - depth·p` and `right = (1 - depth) + depth·p`,
/// both clamped to [0, 1]. The channel sum stays constant across the cycle,
/// and at depth 1 each channel reaches full silence at its far extreme.
///
/// Rate and depth changes slew; in particular, changing the cycle length
/// ramps the *rate*, never the phase, so there is no jump mid-cycle.
#[derive(Debug, Clone)]
pub struct PanningLfo {
    enabled: bool,
    /// Cycles per second (1 / cycle_seconds).
    rate: ParamRamp,
    depth: ParamRamp,
    phase: f64,
    sample_rate: f64,
}

impl PanningLfo {
    pub fn new(config: &PanningConfig, sample_rate: f64) -> Self {
        let rate = if config.enabled {
            1.0 / config.cycle_seconds
        } else {
            0.0
        };
        PanningLfo {
            enabled: config.enabled,
            rate: ParamRamp::new(rate),
            depth: ParamRamp::new(config.depth),
            phase: 0.0,
            sample_rate,
        }
    }

    /// A pass-through LFO: both gains stay at 1.
    pub fn disabled(sample_rate: f64) -> Self {
        Self::new(&PanningConfig::default(), sample_rate)
    }

    /// Advance one sample and return `(left_gain, right_gain)`.
    #[inline]
    pub fn next_gains(&mut self) -> (f64, f64) {
        if !self.enabled {
            return (1.0, 1.0);
        }

        let rate = self.rate.next();
        let depth = self.depth.next();

        let p = -(TAU * self.phase).cos();
        self.phase += rate / self.sample_rate;
        if self.phase >= 1.0 {
            self.phase -= 1.0;
        }

        let base = 1.0 - depth;
        let left = (base - depth * p).clamp(0.0, 1.0);
        let right = (base + depth * p).clamp(0.0, 1.0);
        (left, right)
    }

    /// Retarget the cycle length. Ramps the rate over `ramp_samples`; the
    /// phase is left alone.
    pub fn set_cycle_seconds(&mut self, cycle_seconds: f64, ramp_samples: u32) {
        if cycle_seconds > 0.0 {
            self.rate.ramp_to(1.0 / cycle_seconds, ramp_samples);
        }
    }

    /// Retarget the depth, slewing over `ramp_samples`.
    pub fn set_depth(&mut self, depth: f64, ramp_samples: u32) {
        self.depth.ramp_to(depth.clamp(0.0, 1.0), ramp_samples);
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn depth(&self) -> f64 {
        self.depth.value()
    }

    /// Current cycle phase in [0, 1). Published to the control side so UI
    /// indicators can follow the authoritative pan position.
    pub fn phase(&self) -> f64 {
        self.phase
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_RATE: f64 = 44100.0;

    fn enabled_lfo(cycle_seconds: f64, depth: f64) -> PanningLfo {
        PanningLfo::new(
            &PanningConfig {
                enabled: true,
                cycle_seconds,
                depth,
            },
            SAMPLE_RATE,
        )
    }

    #[test]
    fn disabled_is_pass_through() {
        let mut lfo = PanningLfo::disabled(SAMPLE_RATE);
        for _ in 0..1000 {
            assert_eq!(lfo.next_gains(), (1.0, 1.0));
        }
    }

    #[test]
    fn cycle_endpoints_match_pan_law() {
        // Over one period T: left(0)=1, left(T/2)=1-2d (minimum), left(T)=1.
        let cycle = 0.5;
        let depth = 0.4;
        let mut lfo = enabled_lfo(cycle, depth);
        let period = (cycle * SAMPLE_RATE) as usize;

        let (left_start, _) = lfo.next_gains();
        assert!(
            (left_start - 1.0).abs() < 1e-9,
            "left gain at cycle start should be 1, got {left_start}"
        );

        let mut left_half = 0.0;
        let mut left_full = 0.0;
        let mut minimum = f64::MAX;
        for i in 1..=period {
            let (l, _) = lfo.next_gains();
            minimum = minimum.min(l);
            if i == period / 2 {
                left_half = l;
            }
            if i == period {
                left_full = l;
            }
        }

        let expected_min = 1.0 - 2.0 * depth;
        assert!(
            (left_half - expected_min).abs() < 1e-3,
            "left gain at T/2 should be {expected_min}, got {left_half}"
        );
        assert!(
            (minimum - expected_min).abs() < 1e-3,
            "cycle minimum should be {expected_min}, got {minimum}"
        );
        assert!(
            (left_full - 1.0).abs() < 1e-3,
            "left gain after a full period should return to 1, got {left_full}"
        );
    }

    #[test]
    fn gains_stay_clamped_at_full_depth() {
        let mut lfo = enabled_lfo(0.1, 1.0);
        let mut reached_silence = false;
        for _ in 0..(0.1 * SAMPLE_RATE) as usize {
            let (l, r) = lfo.next_gains();
            assert!((0.0..=1.0).contains(&l) && (0.0..=1.0).contains(&r));
            if l == 0.0 {
                reached_silence = true;
            }
        }
        assert!(
            reached_silence,
            "full depth should sweep the left channel to silence"
        );
    }

    #[test]
    fn channel_sum_constant_mid_depth() {
        let mut lfo = enabled_lfo(0.25, 0.5);
        for _ in 0..20_000 {
            let (l, r) = lfo.next_gains();
            assert!(
                ((l + r) - 1.0).abs() < 1e-9,
                "pan law should preserve the channel sum, got {}",
                l + r
            );
        }
    }

    #[test]
    fn cycle_change_ramps_rate_without_phase_jump() {
        let mut lfo = enabled_lfo(0.5, 0.5);
        let (mut prev_l, _) = lfo.next_gains();
        for _ in 0..1000 {
            (prev_l, _) = lfo.next_gains();
        }

        lfo.set_cycle_seconds(0.1, 441);

        // The rate quintuples, but the gains must stay continuous: the worst
        // sample-to-sample delta at the new rate is 2π·depth·rate/sr.
        let bound = TAU * 0.5 * 10.0 / SAMPLE_RATE + 1e-6;
        for _ in 0..2000 {
            let (l, _) = lfo.next_gains();
            assert!(
                (l - prev_l).abs() <= bound,
                "gain jumped {} during rate ramp (bound {bound})",
                (l - prev_l).abs()
            );
            prev_l = l;
        }
    }

    #[test]
    fn phase_stays_in_unit_interval() {
        let mut lfo = enabled_lfo(0.05, 0.8);
        for _ in 0..100_000 {
            lfo.next_gains();
            let p = lfo.phase();
            assert!((0.0..1.0).contains(&p), "phase left [0,1): {p}");
        }
    }
}
