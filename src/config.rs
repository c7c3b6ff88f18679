//! Visual configuration.
//!
//! A [`VisualConfig`] is loaded once before a session (from JSON, or the
//! built-in defaults) and is never mutated while frames are rendered. Many
//! parameters are expressed per frame at a 30 fps reference rate; call
//! [`VisualConfig::scaled_to_fps`] to obtain the copy the engine runs with.

use crate::engine::smoothing::EmaRates;
use crate::engine::waves::MAX_WAVES;
use crate::video::VideoCodec;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Frame rate the per-frame constants are tuned for.
pub const BASE_FPS: f32 = 30.0;

/// Errors raised while loading or validating a configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to access config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Malformed config file: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Invalid value for `{field}`: {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

impl ConfigError {
    fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            field,
            reason: reason.into(),
        }
    }
}

/// How the shape's protrusions are driven.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProtrusionPolicy {
    /// A single lobe count (`num_protrusions`) scaled by the average frequency.
    #[default]
    Fixed,
    /// Multi-band: only the loudest band's lobes are drawn.
    Hardmax,
    /// Multi-band: every band contributes, weighted by a softmax of band energy.
    Softmax,
}

impl ProtrusionPolicy {
    /// Whether this policy consumes per-band protrusion magnitudes.
    pub fn is_multi_band(&self) -> bool {
        !matches!(self, Self::Fixed)
    }
}

/// Complete configuration of a render session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VisualConfig {
    // Output
    pub temp_file: String,
    /// Maximum rendered length in seconds.
    pub duration: u32,
    pub fps: u32,
    pub width: u32,
    pub height: u32,
    pub codec: VideoCodec,
    pub bitrate: u64,
    /// Frames buffered between the render loop and the encoder thread.
    pub encode_queue: usize,

    // Shape
    pub circle_base_size: f32,
    pub circle_loudness_scale_factor: f32,
    /// Revolutions per minute at full loudness.
    pub rotation_speed: f32,
    pub protrusion_scale: f32,
    pub num_protrusions: u32,
    pub protrusion_variability: f32,
    /// Tessellation segments of the shape perimeter.
    pub shape_vertices: u32,
    pub shape_color: [f32; 3],
    pub protrusion_policy: ProtrusionPolicy,
    /// Lobe count of the lowest band in multi-band mode.
    pub min_protrusions: u32,
    /// Number of frequency bands in multi-band mode.
    pub protrusion_bands: u32,

    // Waves
    pub base_wave_speed: f32,
    pub wave_speed_loudness_scale_factor: f32,
    pub wave_thickness: f32,
    pub brightness: f32,
    pub color_change_threshold: f32,
    pub max_frames_between_waves: u32,
    pub wave_removal_radius: f32,
    pub max_waves: usize,

    // Asymmetric EMA
    pub alpha_up_radius: f32,
    pub alpha_down_radius: f32,
    pub alpha_up_avg_freq: f32,
    pub alpha_down_avg_freq: f32,
    pub alpha_up_bg_speed: f32,
    pub alpha_down_bg_speed: f32,

    // Audio
    pub num_frequency_bands: usize,
    /// Lower values weight low frequencies more heavily in the loudness sum.
    pub freq_band_weight_func_exponent: f32,
}

impl Default for VisualConfig {
    fn default() -> Self {
        Self {
            temp_file: "temp/temp_video.mp4".to_string(),
            duration: 200,
            fps: 60,
            width: 1920,
            height: 1088,
            codec: VideoCodec::H264,
            bitrate: 8_000_000,
            encode_queue: 4,

            circle_base_size: 0.06,
            circle_loudness_scale_factor: 5.0,
            rotation_speed: 1000.0,
            protrusion_scale: 0.25,
            num_protrusions: 6,
            protrusion_variability: 2.0,
            shape_vertices: 1000,
            shape_color: [0.0, 0.0, 0.0],
            protrusion_policy: ProtrusionPolicy::Fixed,
            min_protrusions: 3,
            protrusion_bands: 4,

            base_wave_speed: 0.03,
            wave_speed_loudness_scale_factor: 0.25,
            wave_thickness: 0.40,
            brightness: 1.2,
            color_change_threshold: 0.025,
            max_frames_between_waves: 15,
            wave_removal_radius: 4.0,
            max_waves: MAX_WAVES,

            alpha_up_radius: 0.9,
            alpha_down_radius: 0.2,
            alpha_up_avg_freq: 0.8,
            alpha_down_avg_freq: 0.15,
            alpha_up_bg_speed: 0.3,
            alpha_down_bg_speed: 0.05,

            num_frequency_bands: 128,
            freq_band_weight_func_exponent: 0.2,
        }
    }
}

impl VisualConfig {
    /// Number of frames the duration setting allows.
    pub fn max_frames(&self) -> usize {
        self.duration as usize * self.fps as usize
    }

    /// Height over width, used to keep the shape circular on screen.
    pub fn aspect_correction(&self) -> f32 {
        self.height as f32 / self.width as f32
    }

    pub fn radius_rates(&self) -> EmaRates {
        EmaRates {
            up: self.alpha_up_radius,
            down: self.alpha_down_radius,
        }
    }

    pub fn avg_freq_rates(&self) -> EmaRates {
        EmaRates {
            up: self.alpha_up_avg_freq,
            down: self.alpha_down_avg_freq,
        }
    }

    pub fn bg_speed_rates(&self) -> EmaRates {
        EmaRates {
            up: self.alpha_up_bg_speed,
            down: self.alpha_down_bg_speed,
        }
    }

    /// Rescale the per-frame constants from [`BASE_FPS`] to `self.fps` so the
    /// visual speed does not depend on the frame rate, then validate.
    pub fn scaled_to_fps(&self) -> Result<Self, ConfigError> {
        if self.fps == 0 {
            return Err(ConfigError::invalid("fps", "must be positive"));
        }
        let factor = BASE_FPS / self.fps as f32;
        let mut scaled = self.clone();

        scaled.rotation_speed *= factor;
        scaled.base_wave_speed *= factor;
        scaled.wave_speed_loudness_scale_factor *= factor;
        scaled.max_frames_between_waves = (self.max_frames_between_waves as f32 * factor) as u32;
        scaled.circle_loudness_scale_factor *= factor;

        scaled.alpha_up_radius *= factor;
        scaled.alpha_down_radius *= factor;
        scaled.alpha_up_avg_freq *= factor;
        scaled.alpha_down_avg_freq *= factor;
        scaled.alpha_up_bg_speed *= factor;
        scaled.alpha_down_bg_speed *= factor;

        scaled.validate()?;
        Ok(scaled)
    }

    /// Check every parameter the engine relies on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.fps == 0 {
            return Err(ConfigError::invalid("fps", "must be positive"));
        }
        if self.width == 0 || self.height == 0 {
            return Err(ConfigError::invalid(
                "width/height",
                format!("resolution {}x{} is empty", self.width, self.height),
            ));
        }
        if self.duration == 0 {
            return Err(ConfigError::invalid("duration", "must be positive"));
        }
        if self.num_frequency_bands == 0 {
            return Err(ConfigError::invalid("num_frequency_bands", "must be positive"));
        }
        if self.shape_vertices < 3 {
            return Err(ConfigError::invalid(
                "shape_vertices",
                format!("need at least 3 segments, got {}", self.shape_vertices),
            ));
        }
        if self.max_waves == 0 || self.max_waves > MAX_WAVES {
            return Err(ConfigError::invalid(
                "max_waves",
                format!("must be within 1..={MAX_WAVES}, got {}", self.max_waves),
            ));
        }
        if self.encode_queue == 0 {
            return Err(ConfigError::invalid("encode_queue", "must be positive"));
        }
        if self.protrusion_policy.is_multi_band() && self.protrusion_bands == 0 {
            return Err(ConfigError::invalid("protrusion_bands", "must be positive"));
        }

        let alphas = [
            ("alpha_up_radius", self.alpha_up_radius),
            ("alpha_down_radius", self.alpha_down_radius),
            ("alpha_up_avg_freq", self.alpha_up_avg_freq),
            ("alpha_down_avg_freq", self.alpha_down_avg_freq),
            ("alpha_up_bg_speed", self.alpha_up_bg_speed),
            ("alpha_down_bg_speed", self.alpha_down_bg_speed),
        ];
        for (field, alpha) in alphas {
            if !(0.0..=1.0).contains(&alpha) {
                return Err(ConfigError::invalid(
                    field,
                    format!("{alpha} is outside [0, 1] at {} fps", self.fps),
                ));
            }
        }

        let non_negative = [
            ("circle_base_size", self.circle_base_size),
            ("circle_loudness_scale_factor", self.circle_loudness_scale_factor),
            ("rotation_speed", self.rotation_speed),
            ("protrusion_scale", self.protrusion_scale),
            ("protrusion_variability", self.protrusion_variability),
            ("base_wave_speed", self.base_wave_speed),
            ("wave_speed_loudness_scale_factor", self.wave_speed_loudness_scale_factor),
            ("wave_thickness", self.wave_thickness),
            ("brightness", self.brightness),
            ("color_change_threshold", self.color_change_threshold),
            ("wave_removal_radius", self.wave_removal_radius),
            ("freq_band_weight_func_exponent", self.freq_band_weight_func_exponent),
        ];
        for (field, value) in non_negative {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::invalid(
                    field,
                    format!("{value} is not a finite non-negative number"),
                ));
            }
        }

        Ok(())
    }
}

/// Load configuration from a JSON file, writing the defaults there first if
/// the file does not exist.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<VisualConfig, ConfigError> {
    let path = path.as_ref();
    if path.exists() {
        let data = std::fs::read_to_string(path)?;
        let config: VisualConfig = serde_json::from_str(&data)?;
        log::info!("Loaded configuration from {}", path.display());
        Ok(config)
    } else {
        let config = VisualConfig::default();
        save_config(&config, path)?;
        log::info!("Created default config file: {}", path.display());
        Ok(config)
    }
}

/// Save configuration as pretty-printed JSON.
pub fn save_config<P: AsRef<Path>>(config: &VisualConfig, path: P) -> Result<(), ConfigError> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, serde_json::to_string_pretty(config)?)?;
    Ok(())
}
