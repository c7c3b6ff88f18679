//! Spectral feature extraction.
//!
//! Turns the normalized magnitude matrix into one [`AudioFeatures`] record
//! per video frame. Every quantity is normalized against the whole track, so
//! the extractor runs once over the complete spectrogram before rendering.

use crate::audio::Spectrogram;
use crate::config::VisualConfig;
use thiserror::Error;

/// Guard added to divisors so silent frames and constant tracks stay finite.
pub const EPSILON: f32 = 1e-8;

#[derive(Error, Debug, PartialEq)]
pub enum FeatureError {
    #[error("Spectrogram has no frames")]
    NoFrames,

    #[error("Spectrogram has no frequency bins")]
    NoBins,

    #[error("Non-finite magnitude at frame {frame}, bin {bin}")]
    NonFinite { frame: usize, bin: usize },
}

/// Per-frame audio descriptors, all normalized against the whole track.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioFeatures {
    /// Frequency-weighted energy in [0, 1].
    pub loudness: f32,
    /// Energy-weighted mean frequency in [0, 1].
    pub avg_frequency: f32,
    /// Fully saturated color whose hue is `avg_frequency`.
    pub color: [f32; 3],
    /// Energy per protrusion band in `[0, protrusion_scale]`, lowest band first.
    pub band_energy: Vec<f32>,
}

/// Settings for [`extract_features`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExtractorSettings {
    /// Exponent of the low-frequency weighting curve.
    pub weight_exponent: f32,
    /// Number of protrusion bands; zero skips the band analysis.
    pub protrusion_bands: usize,
    pub protrusion_scale: f32,
}

impl Default for ExtractorSettings {
    fn default() -> Self {
        Self {
            weight_exponent: 0.2,
            protrusion_bands: 0,
            protrusion_scale: 0.25,
        }
    }
}

impl From<&VisualConfig> for ExtractorSettings {
    fn from(config: &VisualConfig) -> Self {
        Self {
            weight_exponent: config.freq_band_weight_func_exponent,
            protrusion_bands: if config.protrusion_policy.is_multi_band() {
                config.protrusion_bands as usize
            } else {
                0
            },
            protrusion_scale: config.protrusion_scale,
        }
    }
}

/// Per-bin loudness weights `1 - (f / f_max)^p`.
pub fn frequency_weights(freqs: &[f32], exponent: f32) -> Vec<f32> {
    let freq_max = freqs.last().copied().unwrap_or(0.0);
    if freq_max <= 0.0 {
        return vec![1.0; freqs.len()];
    }
    freqs
        .iter()
        .map(|&f| 1.0 - (f / freq_max).powf(exponent))
        .collect()
}

/// Min-max normalize in place with the epsilon guard.
fn normalize_min_max(values: &mut [f32]) {
    let (min, max) = values
        .iter()
        .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        });
    let range = max - min + EPSILON;
    values.iter_mut().for_each(|v| *v = (*v - min) / range);
}

/// HSV to RGB with components in [0, 1].
pub fn hsv_to_rgb(h: f32, s: f32, v: f32) -> [f32; 3] {
    if s == 0.0 {
        return [v, v, v];
    }
    let scaled = h * 6.0;
    let sector = scaled.floor();
    let f = scaled - sector;
    let p = v * (1.0 - s);
    let q = v * (1.0 - s * f);
    let t = v * (1.0 - s * (1.0 - f));
    match (sector as i64).rem_euclid(6) {
        0 => [v, t, p],
        1 => [q, v, p],
        2 => [p, v, t],
        3 => [p, q, v],
        4 => [t, p, v],
        _ => [v, p, q],
    }
}

/// Map a normalized frequency to a fully saturated color.
pub fn frequency_to_color(ratio: f32) -> [f32; 3] {
    hsv_to_rgb(ratio.clamp(0.0, 1.0), 1.0, 1.0)
}

/// Bin range of band `j` out of `bands`, splitting `bins` proportionally.
fn band_range(j: usize, bands: usize, bins: usize) -> std::ops::Range<usize> {
    (j * bins / bands)..((j + 1) * bins / bands)
}

/// Compute the feature sequence for a whole track.
pub fn extract_features(
    spectrogram: &Spectrogram,
    settings: &ExtractorSettings,
) -> Result<Vec<AudioFeatures>, FeatureError> {
    if spectrogram.bins() == 0 {
        return Err(FeatureError::NoBins);
    }
    if spectrogram.frames() == 0 {
        return Err(FeatureError::NoFrames);
    }

    let freqs = spectrogram.frequency_axis();
    let weights = frequency_weights(&freqs, settings.weight_exponent);
    let bands = settings.protrusion_bands;

    let frames = spectrogram.frames();
    let mut loudness = Vec::with_capacity(frames);
    let mut avg_freq = Vec::with_capacity(frames);
    // One column per band so each can be normalized on its own.
    let mut band_energy = vec![Vec::with_capacity(frames); bands];

    for (t, column) in spectrogram.iter_frames().enumerate() {
        if let Some(bin) = column.iter().position(|m| !m.is_finite()) {
            return Err(FeatureError::NonFinite { frame: t, bin });
        }

        let mut weighted = 0.0;
        let mut moment = 0.0;
        let mut total = 0.0;
        for ((&m, &w), &f) in column.iter().zip(&weights).zip(&freqs) {
            weighted += m * w;
            moment += m * f;
            total += m;
        }
        loudness.push(weighted);
        avg_freq.push(moment / (total + EPSILON));

        for (j, energy) in band_energy.iter_mut().enumerate() {
            let range = band_range(j, bands, column.len());
            energy.push(column[range].iter().sum());
        }
    }

    normalize_min_max(&mut loudness);
    normalize_min_max(&mut avg_freq);
    for energy in &mut band_energy {
        normalize_min_max(energy);
        energy
            .iter_mut()
            .for_each(|e| *e *= settings.protrusion_scale);
    }

    let features: Vec<AudioFeatures> = (0..frames)
        .map(|t| AudioFeatures {
            loudness: loudness[t],
            avg_frequency: avg_freq[t],
            color: frequency_to_color(avg_freq[t]),
            band_energy: band_energy.iter().map(|band| band[t]).collect(),
        })
        .collect();

    log::info!(
        "Extracted features for {} frames ({} bins, {} protrusion bands)",
        frames,
        spectrogram.bins(),
        bands
    );
    Ok(features)
}

/// Keep only the strongest band at full weight. Ties go to the lowest band.
pub fn hardmax(values: &[f32]) -> Vec<f32> {
    let mut weights = vec![0.0; values.len()];
    let winner = values
        .iter()
        .enumerate()
        .fold(None, |best: Option<(usize, f32)>, (i, &v)| match best {
            Some((_, b)) if b >= v => best,
            _ => Some((i, v)),
        });
    if let Some((i, _)) = winner {
        weights[i] = 1.0;
    }
    weights
}

/// Softmax with the maximum subtracted before exponentiation.
pub fn softmax(values: &[f32]) -> Vec<f32> {
    let max = values.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = values.iter().map(|&v| (v - max).exp()).collect();
    let sum: f32 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn matrix(columns: &[&[f32]]) -> Spectrogram {
        let columns: Vec<Vec<f32>> = columns.iter().map(|c| c.to_vec()).collect();
        Spectrogram::from_columns(8000, &columns).unwrap()
    }

    #[test]
    fn test_weights_favor_low_frequencies() {
        let weights = frequency_weights(&[0.0, 1000.0, 2000.0, 4000.0], 0.2);
        assert_relative_eq!(weights[0], 1.0);
        assert_relative_eq!(weights[3], 0.0);
        assert!(weights.windows(2).all(|w| w[0] > w[1]));
    }

    #[test]
    fn test_zero_nyquist_weights_are_uniform() {
        assert_eq!(frequency_weights(&[0.0, 0.0], 0.2), vec![1.0, 1.0]);
    }

    #[test]
    fn test_hsv_primary_hues() {
        let red = frequency_to_color(0.0);
        let green = frequency_to_color(1.0 / 3.0);
        let blue = frequency_to_color(2.0 / 3.0);
        assert_relative_eq!(red[0], 1.0);
        assert_relative_eq!(red[1], 0.0);
        assert_relative_eq!(green[1], 1.0, epsilon = 1e-5);
        assert_relative_eq!(green[0], 0.0, epsilon = 1e-5);
        assert_relative_eq!(blue[2], 1.0, epsilon = 1e-5);
        // Hue 1.0 wraps back to red
        assert_eq!(frequency_to_color(1.0), [1.0, 0.0, 0.0]);
    }

    #[test]
    fn test_normalization_attains_both_ends() {
        let columns = matrix(&[&[0.1, 0.0, 0.0], &[0.0, 0.0, 0.9], &[0.5, 0.5, 0.0]]);
        let features = extract_features(&columns, &ExtractorSettings::default()).unwrap();
        assert_eq!(features.len(), 3);

        let pickers: [fn(&AudioFeatures) -> f32; 2] = [|f| f.loudness, |f| f.avg_frequency];
        for pick in pickers {
            let values: Vec<f32> = features.iter().map(pick).collect();
            assert!(values.iter().all(|v| (0.0..=1.0).contains(v)));
            assert!(values.iter().any(|&v| v < 1e-6));
            assert!(values.iter().any(|&v| v > 1.0 - 1e-6));
        }
    }

    #[test]
    fn test_constant_track_collapses_to_zero() {
        let columns = matrix(&[&[0.5, 0.5], &[0.5, 0.5], &[0.5, 0.5]]);
        let features = extract_features(&columns, &ExtractorSettings::default()).unwrap();
        for f in &features {
            assert!(f.loudness.is_finite() && f.avg_frequency.is_finite());
            assert_eq!(f.loudness, 0.0);
            assert_eq!(f.avg_frequency, 0.0);
            assert_eq!(f.color, [1.0, 0.0, 0.0]);
        }
    }

    #[test]
    fn test_empty_inputs_rejected() {
        let no_frames = Spectrogram::silent(8000, 16, 0);
        assert_eq!(
            extract_features(&no_frames, &ExtractorSettings::default()),
            Err(FeatureError::NoFrames)
        );
        let no_bins = Spectrogram::silent(8000, 0, 10);
        assert_eq!(
            extract_features(&no_bins, &ExtractorSettings::default()),
            Err(FeatureError::NoBins)
        );
    }

    #[test]
    fn test_nan_magnitude_rejected() {
        let columns = matrix(&[&[0.1, 0.2], &[f32::NAN, 0.0]]);
        assert_eq!(
            extract_features(&columns, &ExtractorSettings::default()),
            Err(FeatureError::NonFinite { frame: 1, bin: 0 })
        );
    }

    #[test]
    fn test_band_energy_normalized_per_band() {
        // Low band loud in frame 0, high band loud in frame 1
        let columns = matrix(&[&[1.0, 1.0, 0.0, 0.0], &[0.0, 0.0, 0.2, 0.2]]);
        let settings = ExtractorSettings {
            protrusion_bands: 2,
            protrusion_scale: 0.5,
            ..Default::default()
        };
        let features = extract_features(&columns, &settings).unwrap();
        assert_relative_eq!(features[0].band_energy[0], 0.5, epsilon = 1e-6);
        assert_relative_eq!(features[0].band_energy[1], 0.0);
        assert_relative_eq!(features[1].band_energy[0], 0.0);
        assert_relative_eq!(features[1].band_energy[1], 0.5, epsilon = 1e-6);
    }

    #[test]
    fn test_hardmax_picks_first_maximum() {
        assert_eq!(hardmax(&[0.2, 0.7, 0.7, 0.1]), vec![0.0, 1.0, 0.0, 0.0]);
        assert!(hardmax(&[]).is_empty());
    }

    #[test]
    fn test_softmax_is_stable_and_normalized() {
        let weights = softmax(&[1000.0, 1000.0, 999.0]);
        assert_relative_eq!(weights.iter().sum::<f32>(), 1.0, epsilon = 1e-6);
        assert!(weights.iter().all(|w| w.is_finite()));
        assert_relative_eq!(weights[0], weights[1]);
        assert!(weights[2] < weights[0]);
    }
}
