//! Background wave field.
//!
//! A wave is an expanding colored ring. New waves are spawned whenever the
//! audio color moves far enough from the color of the last spawned wave, or
//! when no wave has been spawned for a while. Waves that have grown past the
//! removal radius are dropped, except that the field never empties itself.

use crate::config::VisualConfig;

/// Capacity of the render-side wave buffer.
pub const MAX_WAVES: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Wave {
    pub color: [f32; 3],
    pub radius: f32,
}

/// Parameters of the spawn and eviction rules.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WaveSettings {
    pub color_change_threshold: f32,
    pub max_frames_between_waves: u32,
    pub base_speed: f32,
    pub loudness_speed_scale: f32,
    pub removal_radius: f32,
    pub max_waves: usize,
}

impl From<&VisualConfig> for WaveSettings {
    fn from(config: &VisualConfig) -> Self {
        Self {
            color_change_threshold: config.color_change_threshold,
            max_frames_between_waves: config.max_frames_between_waves,
            base_speed: config.base_wave_speed,
            loudness_speed_scale: config.wave_speed_loudness_scale_factor,
            removal_radius: config.wave_removal_radius,
            max_waves: config.max_waves.min(MAX_WAVES),
        }
    }
}

/// Fixed-size view of the active waves, oldest first, zero padded.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WaveLayer {
    pub colors: [[f32; 3]; MAX_WAVES],
    pub radii: [f32; MAX_WAVES],
    pub count: usize,
    pub thickness: f32,
    pub brightness: f32,
}

impl WaveLayer {
    pub fn active(&self) -> impl Iterator<Item = ([f32; 3], f32)> + '_ {
        self.colors[..self.count]
            .iter()
            .copied()
            .zip(self.radii[..self.count].iter().copied())
    }
}

fn color_distance(a: [f32; 3], b: [f32; 3]) -> f32 {
    a.iter()
        .zip(&b)
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f32>()
        .sqrt()
}

/// Ordered set of active waves plus the spawn bookkeeping.
#[derive(Debug, Clone)]
pub struct WaveField {
    settings: WaveSettings,
    waves: Vec<Wave>,
    last_spawn_color: [f32; 3],
    frames_since_spawn: u32,
    started: bool,
}

impl WaveField {
    pub fn new(settings: WaveSettings) -> Self {
        Self {
            settings,
            waves: Vec::with_capacity(MAX_WAVES + 1),
            last_spawn_color: [0.0; 3],
            frames_since_spawn: 0,
            started: false,
        }
    }

    pub fn waves(&self) -> &[Wave] {
        &self.waves
    }

    pub fn len(&self) -> usize {
        self.waves.len()
    }

    pub fn is_empty(&self) -> bool {
        self.waves.is_empty()
    }

    /// Advance the field by one frame. Returns whether a wave was spawned.
    pub fn update(&mut self, color: [f32; 3], loudness: f32) -> bool {
        let s = self.settings;
        self.frames_since_spawn += 1;

        let spawn = !self.started
            || color_distance(color, self.last_spawn_color) > s.color_change_threshold
            || self.frames_since_spawn > s.max_frames_between_waves
            || self.waves.is_empty();
        self.started = true;

        if spawn {
            self.waves.push(Wave { color, radius: 0.0 });
            self.last_spawn_color = color;
            self.frames_since_spawn = 0;
        }

        let speed = s.base_speed + loudness * s.loudness_speed_scale;
        let advanced: Vec<Wave> = self
            .waves
            .iter()
            .map(|w| Wave {
                radius: w.radius + speed,
                ..*w
            })
            .collect();

        let newest = advanced.last().copied();
        let mut next: Vec<Wave> = advanced
            .into_iter()
            .filter(|w| w.radius <= s.removal_radius)
            .collect();
        if next.is_empty() {
            next.extend(newest);
        }

        if next.len() > s.max_waves {
            next.drain(..next.len() - s.max_waves);
        }

        self.waves = next;
        spawn
    }

    /// Copy the active waves into the fixed-size render layout.
    pub fn snapshot(&self, thickness: f32, brightness: f32) -> WaveLayer {
        let mut layer = WaveLayer {
            colors: [[0.0; 3]; MAX_WAVES],
            radii: [0.0; MAX_WAVES],
            count: self.waves.len().min(MAX_WAVES),
            thickness,
            brightness,
        };
        for (i, wave) in self.waves.iter().take(MAX_WAVES).enumerate() {
            layer.colors[i] = wave.color;
            layer.radii[i] = wave.radius;
        }
        layer
    }
}
