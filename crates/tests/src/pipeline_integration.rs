//! Integration tests for the capture → filter → playback pipeline
//!
//! These drive a real worker thread through a mock capture source and read
//! the result back through the playback sink.

use murmur_core::domain::audio::AudioError;
use murmur_core::domain::control::{CutoffPreset, FilterControl};
use murmur_core::domain::dsp::lowpass_alpha;
use murmur_infra::audio::{MockCaptureSource, Pipeline};
use murmur_tests::{rms, settings, sine_wave, wait_until, Harness, SAMPLE_RATE};
use std::sync::Arc;

fn assert_close(actual: f32, expected: f32) {
    assert!(
        (actual - expected).abs() < 1e-5,
        "expected {expected}, got {actual}"
    );
}

// ============================================================================
// FILTERING
// ============================================================================

#[test]
fn test_step_response_through_pipeline() {
    let harness = Harness::start(1, settings(1, 1024), 1000.0, true);
    let alpha = lowpass_alpha(SAMPLE_RATE, 1000.0);

    harness.capture(&[1.0, 1.0, 1.0, 1.0]);
    let output = harness.play(4);

    for (n, &y) in output.iter().enumerate() {
        assert_close(y, 1.0 - (1.0 - alpha).powi(n as i32 + 1));
    }
    // Monotonic approach towards the input level
    assert!(output.windows(2).all(|w| w[0] < w[1] && w[1] < 1.0));
}

#[test]
fn test_high_frequencies_are_attenuated() {
    let samples = 8820;
    let skip = 2000;

    let low = Harness::start(1, settings(1, 512), 500.0, true);
    let low_in = sine_wave(100.0, SAMPLE_RATE, samples);
    low.capture(&low_in);
    let low_out = low.play(samples);

    let high = Harness::start(1, settings(1, 512), 500.0, true);
    let high_in = sine_wave(10_000.0, SAMPLE_RATE, samples);
    high.capture(&high_in);
    let high_out = high.play(samples);

    let low_gain = rms(&low_out[skip..]) / rms(&low_in[skip..]);
    let high_gain = rms(&high_out[skip..]) / rms(&high_in[skip..]);

    assert!(low_gain > 0.9, "100 Hz gain {low_gain}");
    assert!(high_gain < 0.1, "10 kHz gain {high_gain}");
}

#[test]
fn test_stereo_channels_are_filtered_independently() {
    let harness = Harness::start(2, settings(2, 256), 1000.0, true);
    let alpha = lowpass_alpha(SAMPLE_RATE, 1000.0);

    // Left carries a step, right stays silent
    let input: Vec<f32> = (0..100).flat_map(|_| [1.0, 0.0]).collect();
    harness.capture(&input);
    let output = harness.play(input.len());

    for (n, frame) in output.chunks_exact(2).enumerate() {
        assert_close(frame[0], 1.0 - (1.0 - alpha).powi(n as i32 + 1));
        assert_eq!(frame[1], 0.0);
    }
}

#[test]
fn test_disabled_filter_is_bit_exact() {
    let harness = Harness::start(2, settings(2, 64), 200.0, false);
    let input = sine_wave(3_000.0, SAMPLE_RATE, 1000);

    harness.capture(&input);
    let output = harness.play(input.len());

    assert_eq!(output, input);
}

#[test]
fn test_mono_capture_is_upmixed() {
    let harness = Harness::start(1, settings(2, 4), 1000.0, false);

    harness.capture(&[0.1, 0.2, 0.3, 0.4, 0.5]);
    let output = harness.play(10);

    assert_eq!(
        output,
        vec![0.1, 0.1, 0.2, 0.2, 0.3, 0.3, 0.4, 0.4, 0.5, 0.5]
    );
}

// ============================================================================
// RUNTIME CONTROL
// ============================================================================

#[test]
fn test_cutoff_change_applies_to_next_samples() {
    let harness = Harness::start(1, settings(1, 1024), 1000.0, true);

    let applied = harness.pipeline.apply_preset(CutoffPreset::Low);
    assert_eq!(applied, 200.0);
    let alpha = lowpass_alpha(SAMPLE_RATE, 200.0);
    assert_eq!(harness.pipeline.status().alpha, alpha);

    harness.capture(&[1.0; 8]);
    let output = harness.play(8);
    for (n, &y) in output.iter().enumerate() {
        assert_close(y, 1.0 - (1.0 - alpha).powi(n as i32 + 1));
    }
}

#[test]
fn test_toggle_keeps_filter_state() {
    let harness = Harness::start(1, settings(1, 1024), 1000.0, true);
    let alpha = lowpass_alpha(SAMPLE_RATE, 1000.0);

    harness.capture(&[1.0; 8]);
    let filtered = harness.play(8);
    let last = filtered[7];

    assert!(!harness.pipeline.toggle_filter());
    harness.capture(&[0.5, -0.5, 0.25]);
    assert_eq!(harness.play(3), vec![0.5, -0.5, 0.25]);

    // Re-enabled filter resumes from the last filtered value
    assert!(harness.pipeline.toggle_filter());
    harness.capture(&[1.0]);
    assert_close(harness.play(1)[0], last + alpha * (1.0 - last));
}

#[test]
fn test_out_of_range_cutoff_is_clamped() {
    let harness = Harness::start(1, settings(1, 64), 1000.0, true);

    assert_eq!(harness.pipeline.set_cutoff_frequency(0.0), 0.1);
    assert_eq!(harness.pipeline.set_cutoff_frequency(1.0e6), 10_000.0);
    assert_eq!(harness.pipeline.set_cutoff_frequency(f32::NAN), 1000.0);
}

// ============================================================================
// BUFFERING
// ============================================================================

#[test]
fn test_overflow_keeps_newest_samples() {
    let mut small = settings(1, 4);
    small.ring_capacity_samples = 8;
    let harness = Harness::start(1, small, 1000.0, false);

    let input: Vec<f32> = (0..20).map(|v| v as f32).collect();
    harness.capture(&input);

    assert_eq!(harness.play(8), input[12..].to_vec());
    assert_eq!(harness.pipeline.status().overruns, 12);
}

#[test]
fn test_underflow_plays_silence() {
    let harness = Harness::start(1, settings(1, 64), 1000.0, false);
    harness.capture(&[0.5, 0.5]);

    let mut block = [1.0; 6];
    let silent = harness.sink.fill(&mut block, 1);

    assert_eq!(silent, 4);
    assert_eq!(block, [0.5, 0.5, 0.0, 0.0, 0.0, 0.0]);
    assert_eq!(harness.pipeline.status().underruns, 4);
}

#[test]
fn test_buffered_duration() {
    let harness = Harness::start(2, settings(2, 1024), 1000.0, false);
    assert_eq!(harness.pipeline.buffered_duration().as_secs_f64(), 0.0);

    harness.capture(&[0.0; 441 * 2]);
    let buffered = harness.pipeline.buffered_duration().as_secs_f64();
    assert!((buffered - 0.01).abs() < 1e-9, "buffered {buffered}");

    let status = harness.pipeline.status();
    assert_eq!(status.buffered_samples, 882);
    assert!((status.buffered_secs - 0.01).abs() < 1e-9);
}

#[test]
fn test_device_wraparound_is_seamless() {
    let (source, feed) = MockCaptureSource::new(1, SAMPLE_RATE, 100);
    feed.push(&[]);
    let control = Arc::new(FilterControl::new(SAMPLE_RATE, 1000.0, false));
    let pipeline = Pipeline::start(source, control, settings(1, 32)).unwrap();
    let sink = pipeline.sink();

    // Three passes over a 100-frame device buffer, 60 frames at a time
    let input: Vec<f32> = (0..300).map(|v| v as f32).collect();
    for chunk in input.chunks(60) {
        let before = pipeline.status().frames_captured;
        feed.push(chunk);
        assert!(wait_until(|| pipeline.status().frames_captured == before + 60));
    }

    let mut output = vec![0.0; 300];
    assert_eq!(sink.fill(&mut output, 1), 0);
    assert_eq!(output, input);
}

// ============================================================================
// LIFECYCLE AND ERRORS
// ============================================================================

#[test]
fn test_silent_device_times_out() {
    let (source, feed) = MockCaptureSource::new(2, SAMPLE_RATE, 1024);
    let control = Arc::new(FilterControl::new(SAMPLE_RATE, 1000.0, true));

    let result = Pipeline::start(source, control, settings(2, 64));

    assert!(matches!(result, Err(AudioError::CaptureStartTimeout { .. })));
    assert!(feed.is_stopped());
}

#[test]
fn test_unsupported_channel_layout_is_rejected() {
    let (source, feed) = MockCaptureSource::new(4, SAMPLE_RATE, 1024);
    feed.push(&[]);
    let control = Arc::new(FilterControl::new(SAMPLE_RATE, 1000.0, true));

    let result = Pipeline::start(source, control, settings(2, 64));

    assert!(matches!(result, Err(AudioError::UnsupportedConfiguration(_))));
    assert!(!feed.is_started());
}

#[test]
fn test_read_errors_do_not_stop_the_worker() {
    let harness = Harness::start(1, settings(1, 64), 1000.0, false);

    harness.feed.fail_next_reads(10);
    harness.capture(&[0.75; 16]);

    assert!(harness.pipeline.is_running());
    assert_eq!(harness.play(16), vec![0.75; 16]);
}

#[test]
fn test_stop_releases_the_source() {
    let mut harness = Harness::start(1, settings(1, 64), 1000.0, true);
    assert!(harness.feed.is_started());
    assert!(harness.pipeline.is_running());

    harness.pipeline.stop();
    assert!(!harness.pipeline.is_running());
    assert!(harness.feed.is_stopped());

    // Second stop is a no-op
    harness.pipeline.stop();
}
