//! One-pole low-pass filter
//!
//! The filter runs independently on every channel of an interleaved buffer:
//!
//! ```text
//! y[n] = y[n-1] + alpha * (x[n] - y[n-1])
//! alpha = dt / (rc + dt),  dt = 1 / sample_rate,  rc = 1 / (2π · cutoff)
//! ```
//!
//! Designed for:
//! - Zero allocations in the hot path
//! - Continuity across chunk boundaries (per-channel state survives calls)
//! - Lock-free parameter updates (see [`FilterControl`])

use crate::domain::audio::{AudioError, Result};
use crate::domain::control::FilterControl;
use std::sync::Arc;
use tracing::trace;

/// Parameter constraints for the low-pass filter
pub mod params {
    /// Cutoff range in Hz
    pub const CUTOFF_MIN: f32 = 0.1;
    pub const CUTOFF_MAX: f32 = 10_000.0;

    /// Cutoff used when nothing else is configured
    pub const CUTOFF_DEFAULT: f32 = 1000.0;

    /// Clamp a cutoff into the supported range. NaN maps to the default.
    pub fn clamp_cutoff(cutoff_hz: f32) -> f32 {
        if cutoff_hz.is_nan() {
            return CUTOFF_DEFAULT;
        }
        cutoff_hz.clamp(CUTOFF_MIN, CUTOFF_MAX)
    }
}

/// Coefficient of a one-pole low-pass for the given rate and cutoff.
///
/// Always in (0, 1] for a positive cutoff and sample rate.
#[must_use]
pub fn lowpass_alpha(sample_rate: u32, cutoff_hz: f32) -> f32 {
    let dt = 1.0 / f64::from(sample_rate);
    let rc = 1.0 / (2.0 * std::f64::consts::PI * f64::from(cutoff_hz));
    (dt / (rc + dt)) as f32
}

/// Stateful per-channel one-pole low-pass over interleaved audio
#[derive(Debug)]
pub struct FilterEngine {
    channels: usize,
    state: Vec<f32>,
    control: Arc<FilterControl>,
}

impl FilterEngine {
    /// Create an engine for `channels` interleaved channels with zeroed state
    pub fn new(channels: u16, control: Arc<FilterControl>) -> Self {
        let channels = usize::from(channels.max(1));
        Self {
            channels,
            state: vec![0.0; channels],
            control,
        }
    }

    /// Filter `input` into `output`.
    ///
    /// `input` must hold whole frames and `output` must be at least as long.
    /// Coefficient and enable flag are sampled once for the whole call. When
    /// the filter is disabled the input is copied verbatim and the state is
    /// left as it was.
    pub fn process(&mut self, input: &[f32], output: &mut [f32]) -> Result<()> {
        if input.len() % self.channels != 0 {
            return Err(AudioError::InvalidConfiguration(format!(
                "{} samples is not a whole number of {}-channel frames",
                input.len(),
                self.channels
            )));
        }
        if output.len() < input.len() {
            return Err(AudioError::InvalidConfiguration(format!(
                "output holds {} samples, need {}",
                output.len(),
                input.len()
            )));
        }

        let output = &mut output[..input.len()];

        if !self.control.is_enabled() {
            output.copy_from_slice(input);
            return Ok(());
        }

        let alpha = self.control.alpha();

        for (ch, state) in self.state.iter_mut().enumerate() {
            let mut prev = *state;
            for i in (ch..input.len()).step_by(self.channels) {
                prev += alpha * (input[i] - prev);
                output[i] = prev;
            }
            *state = prev;
        }

        trace!(samples = input.len(), alpha, "Filtered chunk");
        Ok(())
    }

    /// Last filtered value of every channel
    pub fn state(&self) -> &[f32] {
        &self.state
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    pub fn control(&self) -> &Arc<FilterControl> {
        &self.control
    }

    /// Zero the filter memory
    pub fn reset(&mut self) {
        self.state.fill(0.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const SAMPLE_RATE: u32 = 44100;

    fn engine(channels: u16, cutoff: f32, enabled: bool) -> FilterEngine {
        FilterEngine::new(
            channels,
            Arc::new(FilterControl::new(SAMPLE_RATE, cutoff, enabled)),
        )
    }

    #[test]
    fn test_alpha_reference_value() {
        let alpha = lowpass_alpha(44100, 1000.0);
        assert!((alpha - 0.1248).abs() < 0.0005, "alpha = {alpha}");
    }

    #[test]
    fn test_step_from_zero() {
        let mut filter = engine(1, 1000.0, true);
        let alpha = filter.control().alpha();
        let input = [1.0; 4];
        let mut output = [0.0; 4];

        filter.process(&input, &mut output).unwrap();

        // Closed form of the recurrence for a unit step from rest
        for (n, &y) in output.iter().enumerate() {
            let expected = 1.0 - (1.0 - alpha).powi(n as i32 + 1);
            assert!((y - expected).abs() < 1e-5, "y[{n}] = {y}, expected {expected}");
        }
        assert!((output[0] - 0.1247).abs() < 0.0005);
        assert!((output[3] - 0.4130).abs() < 0.0005);
        assert_eq!(filter.state(), &[output[3]]);
    }

    #[test]
    fn test_channels_are_independent() {
        let mut filter = engine(2, 1000.0, true);
        let input = [1.0, 0.0, 1.0, 0.0, 1.0, 0.0];
        let mut output = [0.0; 6];

        filter.process(&input, &mut output).unwrap();

        assert!(output[0] > 0.0);
        assert_eq!(output[1], 0.0);
        assert_eq!(output[3], 0.0);
        assert_eq!(filter.state()[1], 0.0);
        assert_eq!(filter.state()[0], output[4]);
    }

    #[test]
    fn test_state_carries_across_chunks() {
        let mut whole = engine(2, 800.0, true);
        let mut split = engine(2, 800.0, true);
        let input: Vec<f32> = (0..64).map(|i| ((i as f32) * 0.37).sin()).collect();

        let mut expected = vec![0.0; 64];
        whole.process(&input, &mut expected).unwrap();

        let mut actual = vec![0.0; 64];
        split.process(&input[..22], &mut actual[..22]).unwrap();
        split.process(&input[22..], &mut actual[22..]).unwrap();

        assert_eq!(actual, expected);
        assert_eq!(split.state(), whole.state());
    }

    #[test]
    fn test_disable_keeps_state_for_resume() {
        let mut filter = engine(1, 1000.0, true);
        let mut out = [0.0; 8];
        filter.process(&[0.5; 8], &mut out).unwrap();
        let held = filter.state()[0];

        filter.control().toggle_enabled();
        let input = [0.9, -0.3, 0.2];
        let mut bypassed = [0.0; 3];
        filter.process(&input, &mut bypassed).unwrap();
        assert_eq!(bypassed, input);
        assert_eq!(filter.state()[0], held);

        filter.control().toggle_enabled();
        let mut resumed = [0.0; 1];
        filter.process(&[held], &mut resumed).unwrap();
        assert_eq!(resumed[0], held);
    }

    #[test]
    fn test_rejects_partial_frames() {
        let mut filter = engine(2, 1000.0, true);
        let mut out = [0.0; 3];
        assert!(filter.process(&[0.0; 3], &mut out).is_err());

        let mut short = [0.0; 2];
        assert!(filter.process(&[0.0; 4], &mut short).is_err());
    }

    #[test]
    fn test_reset() {
        let mut filter = engine(2, 1000.0, true);
        let mut out = [0.0; 4];
        filter.process(&[1.0; 4], &mut out).unwrap();

        filter.reset();

        assert_eq!(filter.state(), &[0.0, 0.0]);
    }

    #[test]
    fn test_clamp_cutoff() {
        assert_eq!(params::clamp_cutoff(0.0), params::CUTOFF_MIN);
        assert_eq!(params::clamp_cutoff(20_000.0), params::CUTOFF_MAX);
        assert_eq!(params::clamp_cutoff(f32::NAN), params::CUTOFF_DEFAULT);
        assert_eq!(params::clamp_cutoff(440.0), 440.0);
    }

    proptest! {
        #[test]
        fn alpha_in_unit_interval_and_monotonic(
            sample_rate in 8000u32..192_000,
            a in 0.1f32..10_000.0,
            b in 0.1f32..10_000.0,
        ) {
            let nyquist = sample_rate as f32 / 2.0;
            let (lo, hi) = if a < b { (a, b) } else { (b, a) };
            prop_assume!(hi < nyquist);

            let alpha_lo = lowpass_alpha(sample_rate, lo);
            let alpha_hi = lowpass_alpha(sample_rate, hi);

            prop_assert!(alpha_lo > 0.0 && alpha_lo <= 1.0);
            prop_assert!(alpha_hi > 0.0 && alpha_hi <= 1.0);
            prop_assert!(alpha_lo <= alpha_hi);
        }

        #[test]
        fn step_response_converges_monotonically(
            cutoff in 10.0f32..10_000.0,
            start in -1.0f32..1.0,
            target in -1.0f32..1.0,
        ) {
            let control = Arc::new(FilterControl::new(SAMPLE_RATE, cutoff, true));
            let mut filter = FilterEngine::new(1, control);

            // Settle at `start` first
            let mut settle = vec![0.0; 44100];
            filter.process(&vec![start; 44100], &mut settle).unwrap();
            let mut prev = filter.state()[0];

            let input = vec![target; 512];
            let mut output = vec![0.0; 512];
            filter.process(&input, &mut output).unwrap();

            for &y in &output {
                prop_assert!((target - y).abs() <= (target - prev).abs() + 1e-6);
                prev = y;
            }
        }

        #[test]
        fn disabled_filter_is_bit_exact(
            samples in prop::collection::vec(-1.0f32..1.0, 2..512),
            warmup in prop::collection::vec(-1.0f32..1.0, 2..64),
        ) {
            let control = Arc::new(FilterControl::new(SAMPLE_RATE, 500.0, true));
            let mut filter = FilterEngine::new(1, Arc::clone(&control));
            let mut scratch = vec![0.0; warmup.len()];
            filter.process(&warmup, &mut scratch).unwrap();

            control.set_enabled(false);
            let mut output = vec![0.0; samples.len()];
            filter.process(&samples, &mut output).unwrap();

            for (a, b) in samples.iter().zip(&output) {
                prop_assert_eq!(a.to_bits(), b.to_bits());
            }
        }
    }
}
