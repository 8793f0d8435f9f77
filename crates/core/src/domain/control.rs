//! Run-time filter parameters shared between the control and audio threads
//!
//! The coefficient is published as the bit pattern of an `f32` inside an
//! `AtomicU32`, so the processing side observes either the old or the new
//! value, never a mix of both.

use crate::domain::dsp::{lowpass_alpha, params};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use tracing::{debug, info};

/// Cutoff shortcuts offered by the control surface
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CutoffPreset {
    Low,
    Mid,
    High,
}

impl CutoffPreset {
    pub fn hz(&self) -> f32 {
        match self {
            CutoffPreset::Low => 200.0,
            CutoffPreset::Mid => 1000.0,
            CutoffPreset::High => 5000.0,
        }
    }
}

/// Cutoff, coefficient and enable flag of the low-pass filter
///
/// Shared through an `Arc` by the control surface (writer) and the
/// [`FilterEngine`](crate::domain::dsp::FilterEngine) (reader).
#[derive(Debug)]
pub struct FilterControl {
    sample_rate: u32,
    cutoff_bits: AtomicU32,
    alpha_bits: AtomicU32,
    enabled: AtomicBool,
}

impl FilterControl {
    pub fn new(sample_rate: u32, cutoff_hz: f32, enabled: bool) -> Self {
        let cutoff = params::clamp_cutoff(cutoff_hz);
        let alpha = lowpass_alpha(sample_rate, cutoff);

        debug!(sample_rate, cutoff, alpha, enabled, "Filter parameters initialized");

        Self {
            sample_rate,
            cutoff_bits: AtomicU32::new(cutoff.to_bits()),
            alpha_bits: AtomicU32::new(alpha.to_bits()),
            enabled: AtomicBool::new(enabled),
        }
    }

    /// Set the cutoff frequency in Hz.
    ///
    /// The value is clamped to [`params::CUTOFF_MIN`, `params::CUTOFF_MAX`]
    /// and the coefficient is recomputed and published in one store.
    /// Returns the cutoff actually applied.
    pub fn set_cutoff(&self, cutoff_hz: f32) -> f32 {
        let cutoff = params::clamp_cutoff(cutoff_hz);
        let alpha = lowpass_alpha(self.sample_rate, cutoff);

        self.cutoff_bits.store(cutoff.to_bits(), Ordering::Relaxed);
        self.alpha_bits.store(alpha.to_bits(), Ordering::Release);

        info!("Cutoff frequency set to: {:.1} Hz (Alpha: {:.4})", cutoff, alpha);
        cutoff
    }

    pub fn apply_preset(&self, preset: CutoffPreset) -> f32 {
        self.set_cutoff(preset.hz())
    }

    /// Flip the enable flag, returning the new state.
    ///
    /// Filter state is untouched, so re-enabling resumes from the last
    /// filtered value.
    pub fn toggle_enabled(&self) -> bool {
        let enabled = !self.enabled.fetch_xor(true, Ordering::AcqRel);
        info!(enabled, "Filter toggled");
        enabled
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Release);
    }

    pub fn alpha(&self) -> f32 {
        f32::from_bits(self.alpha_bits.load(Ordering::Acquire))
    }

    pub fn cutoff(&self) -> f32 {
        f32::from_bits(self.cutoff_bits.load(Ordering::Relaxed))
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}
