//! Synthetic test signals.
//!
//! Deterministic generators used by the tests and benches to drive the
//! spectral stage without shipping audio fixtures.

use std::f32::consts::TAU;

fn sample_count(sample_rate: u32, duration: f32) -> usize {
    (duration * sample_rate as f32) as usize
}

/// Pure tone at `frequency` Hz.
pub fn generate_sine(frequency: f32, sample_rate: u32, duration: f32, amplitude: f32) -> Vec<f32> {
    (0..sample_count(sample_rate, duration))
        .map(|i| {
            let t = i as f32 / sample_rate as f32;
            amplitude * (TAU * frequency * t).sin()
        })
        .collect()
}

/// Linear frequency sweep from `start_hz` to `end_hz`.
pub fn generate_sweep(
    start_hz: f32,
    end_hz: f32,
    sample_rate: u32,
    duration: f32,
    amplitude: f32,
) -> Vec<f32> {
    let rate = (end_hz - start_hz) / duration.max(f32::EPSILON);
    (0..sample_count(sample_rate, duration))
        .map(|i| {
            let t = i as f32 / sample_rate as f32;
            // Phase is the integral of the instantaneous frequency.
            let phase = TAU * (start_hz * t + 0.5 * rate * t * t);
            amplitude * phase.sin()
        })
        .collect()
}

/// Reproducible white noise from a 64-bit LCG.
pub fn generate_white_noise(sample_rate: u32, duration: f32, amplitude: f32, seed: u64) -> Vec<f32> {
    const A: u64 = 6364136223846793005;
    const C: u64 = 1442695040888963407;

    let mut state = seed;
    (0..sample_count(sample_rate, duration))
        .map(|_| {
            state = state.wrapping_mul(A).wrapping_add(C);
            let unit = (state >> 40) as f32 / (1u64 << 24) as f32;
            amplitude * (unit * 2.0 - 1.0)
        })
        .collect()
}

/// Tone that is only audible during the second half of the clip.
pub fn generate_gated_tone(frequency: f32, sample_rate: u32, duration: f32) -> Vec<f32> {
    let mut samples = generate_sine(frequency, sample_rate, duration, 0.8);
    let half = samples.len() / 2;
    samples[..half].fill(0.0);
    samples
}
