//! Per-frame animation state.
//!
//! [`AnimationState`] owns everything that carries over from one frame to
//! the next (smoothed values, rotation, wave field) and turns each frame's
//! [`AudioFeatures`] into the [`FrameParams`] handed to a renderer. Frames
//! must be stepped strictly in order.

pub mod geometry;
pub mod smoothing;
pub mod waves;

use crate::config::{ProtrusionPolicy, VisualConfig, BASE_FPS};
use crate::features::{hardmax, softmax, AudioFeatures};
use geometry::{generate_lobed_geometry, Lobe};
use smoothing::{Ema, EmaBank};
use std::f32::consts::TAU;
use waves::{WaveField, WaveLayer, WaveSettings};

pub use geometry::{fan_to_triangles, generate_geometry, ShapeParams};
pub use smoothing::{smooth, EmaRates};
pub use waves::{Wave, MAX_WAVES};

/// Everything a renderer needs to draw one frame.
#[derive(Debug, Clone)]
pub struct FrameParams {
    pub index: usize,
    pub waves: WaveLayer,
    /// Triangle fan in normalized device coordinates.
    pub shape: Vec<[f32; 2]>,
    pub shape_color: [f32; 3],
    pub radius_base: f32,
    pub rotation: f32,
}

/// Smoothed state carried across frames.
#[derive(Debug, Clone)]
pub struct AnimationState {
    config: VisualConfig,
    radius_scale: Ema,
    avg_freq: Ema,
    loudness: Ema,
    bands: EmaBank,
    rotation: f32,
    waves: WaveField,
    frame: usize,
}

impl AnimationState {
    /// `config` must already be scaled to its frame rate.
    pub fn new(config: &VisualConfig) -> Self {
        let bands = if config.protrusion_policy.is_multi_band() {
            config.protrusion_bands as usize
        } else {
            0
        };
        Self {
            config: config.clone(),
            radius_scale: Ema::new(0.0, config.radius_rates()),
            avg_freq: Ema::new(0.0, config.avg_freq_rates()),
            loudness: Ema::new(0.0, config.bg_speed_rates()),
            bands: EmaBank::new(bands, config.avg_freq_rates()),
            rotation: 0.0,
            waves: WaveField::new(WaveSettings::from(config)),
            frame: 0,
        }
    }

    pub fn rotation(&self) -> f32 {
        self.rotation
    }

    pub fn waves(&self) -> &WaveField {
        &self.waves
    }

    /// Index of the next frame to be stepped.
    pub fn frame(&self) -> usize {
        self.frame
    }

    /// Advance all state by one frame.
    pub fn step(&mut self, features: &AudioFeatures) -> FrameParams {
        let c = &self.config;

        let radius_scale = self
            .radius_scale
            .update(features.loudness * c.circle_loudness_scale_factor);
        let avg_freq = self.avg_freq.update(features.avg_frequency);

        // rotation_speed is in rpm at BASE_FPS and has been rescaled to the
        // session rate, so this advances by the same angle per second at any fps.
        let loudness = self.loudness.update(features.loudness);
        self.rotation += loudness * c.rotation_speed * TAU / (60.0 * BASE_FPS);

        self.waves.update(features.color, features.loudness);

        let lobes = self.lobes(features, avg_freq);
        let c = &self.config;
        let radius_base = c.circle_base_size * (1.0 + radius_scale);
        let shape = generate_lobed_geometry(
            radius_base,
            self.rotation,
            c.aspect_correction(),
            c.shape_vertices,
            &lobes,
        );

        let params = FrameParams {
            index: self.frame,
            waves: self.waves.snapshot(c.wave_thickness, c.brightness),
            shape,
            shape_color: c.shape_color,
            radius_base,
            rotation: self.rotation,
        };
        self.frame += 1;
        params
    }

    fn lobes(&mut self, features: &AudioFeatures, avg_freq: f32) -> Vec<Lobe> {
        let c = &self.config;
        let weights = match c.protrusion_policy {
            ProtrusionPolicy::Fixed => {
                return vec![Lobe::from_avg_freq(
                    c.num_protrusions,
                    avg_freq,
                    c.protrusion_variability,
                    c.protrusion_scale,
                )]
            }
            ProtrusionPolicy::Hardmax => hardmax(self.bands.update(&features.band_energy)),
            ProtrusionPolicy::Softmax => softmax(self.bands.update(&features.band_energy)),
        };
        self.bands
            .values()
            .iter()
            .zip(weights)
            .enumerate()
            .map(|(j, (&energy, weight))| Lobe {
                count: (c.min_protrusions as usize + j) as f32,
                magnitude: energy * weight,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::frequency_to_color;
    use approx::assert_relative_eq;

    fn features(loudness: f32, avg_frequency: f32) -> AudioFeatures {
        AudioFeatures {
            loudness,
            avg_frequency,
            color: frequency_to_color(avg_frequency),
            band_energy: Vec::new(),
        }
    }

    fn test_config() -> VisualConfig {
        VisualConfig {
            fps: 30,
            shape_vertices: 64,
            ..Default::default()
        }
    }

    #[test]
    fn test_silence_keeps_base_circle_still() {
        let config = test_config();
        let mut state = AnimationState::new(&config);
        for _ in 0..10 {
            let params = state.step(&features(0.0, 0.0));
            assert_relative_eq!(params.radius_base, config.circle_base_size);
            assert_eq!(params.rotation, 0.0);
        }
        assert_eq!(state.frame(), 10);
    }

    #[test]
    fn test_loudness_grows_radius_and_rotation() {
        let config = test_config();
        let mut state = AnimationState::new(&config);
        let params = state.step(&features(1.0, 0.0));
        // radius EMA: 0.9 * 5.0
        assert_relative_eq!(params.radius_base, 0.06 * (1.0 + 4.5), epsilon = 1e-6);
        // loudness EMA 0.3, 1000 rpm at 30 fps
        assert_relative_eq!(params.rotation, 0.3 * 1000.0 * TAU / 1800.0, epsilon = 1e-4);
    }

    #[test]
    fn test_rotation_rate_independent_of_fps() {
        let at_30 = test_config().scaled_to_fps().unwrap();
        let at_60 = VisualConfig {
            fps: 60,
            ..test_config()
        }
        .scaled_to_fps()
        .unwrap();

        let mut slow = AnimationState::new(&at_30);
        let mut fast = AnimationState::new(&at_60);
        // Settle both loudness EMAs at full scale so only the step size differs
        for _ in 0..600 {
            slow.step(&features(1.0, 0.0));
            fast.step(&features(1.0, 0.0));
            fast.step(&features(1.0, 0.0));
        }
        let slow_start = slow.rotation();
        let fast_start = fast.rotation();
        for _ in 0..30 {
            slow.step(&features(1.0, 0.0));
            fast.step(&features(1.0, 0.0));
            fast.step(&features(1.0, 0.0));
        }
        let slow_delta = slow.rotation() - slow_start;
        let fast_delta = fast.rotation() - fast_start;
        assert_relative_eq!(slow_delta, fast_delta, max_relative = 1e-3);
    }

    #[test]
    fn test_hardmax_draws_only_loudest_band() {
        let config = VisualConfig {
            protrusion_policy: ProtrusionPolicy::Hardmax,
            protrusion_bands: 3,
            ..test_config()
        };
        let mut state = AnimationState::new(&config);
        let mut f = features(0.0, 0.0);
        f.band_energy = vec![0.0, 0.25, 0.1];
        let lobes = state.lobes(&f, 0.0);
        assert_eq!(lobes.len(), 3);
        assert_eq!(lobes[0].magnitude, 0.0);
        assert!(lobes[1].magnitude > 0.0);
        assert_eq!(lobes[2].magnitude, 0.0);
        assert_eq!(lobes[1].count, 4.0);
    }

    #[test]
    fn test_wave_snapshot_tracks_field() {
        let mut state = AnimationState::new(&test_config());
        let params = state.step(&features(0.0, 0.5));
        assert_eq!(params.waves.count, 1);
        assert_eq!(params.waves.colors[0], frequency_to_color(0.5));
        assert_eq!(state.waves().len(), 1);
    }
}
