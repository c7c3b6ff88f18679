//! Procedural shape geometry.
//!
//! The shape is a circle deformed by one or more periodic lobes. It is
//! emitted as a triangle fan: the center point followed by `segments + 1`
//! perimeter points, the last one closing the loop onto the first.

use std::f32::consts::TAU;

/// One periodic deformation of the perimeter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Lobe {
    /// Number of peaks around the perimeter.
    pub count: f32,
    /// Peak offset added to the base radius.
    pub magnitude: f32,
}

impl Lobe {
    /// Lobe whose magnitude follows `avg_freq ^ variability * scale`.
    pub fn from_avg_freq(count: u32, avg_freq: f32, variability: f32, scale: f32) -> Self {
        Self {
            count: count as f32,
            magnitude: avg_freq.max(0.0).powf(variability) * scale,
        }
    }

    /// Radial offset at angle `theta`. Squaring sharpens the peaks.
    #[inline]
    fn offset(&self, theta: f32, rotation: f32) -> f32 {
        let wave = ((self.count * theta + rotation).sin() + 1.0) / 2.0;
        self.magnitude * wave * wave
    }
}

/// Inputs of the single-lobe shape.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShapeParams {
    pub radius_base: f32,
    pub avg_freq: f32,
    pub rotation: f32,
    pub protrusion_count: u32,
    pub variability: f32,
    pub scale: f32,
    /// Height over width.
    pub aspect: f32,
    pub segments: u32,
}

/// Shape driven by the smoothed average frequency.
pub fn generate_geometry(params: &ShapeParams) -> Vec<[f32; 2]> {
    let lobe = Lobe::from_avg_freq(
        params.protrusion_count,
        params.avg_freq,
        params.variability,
        params.scale,
    );
    generate_lobed_geometry(
        params.radius_base,
        params.rotation,
        params.aspect,
        params.segments,
        &[lobe],
    )
}

/// Shape with an arbitrary set of superimposed lobes.
pub fn generate_lobed_geometry(
    radius_base: f32,
    rotation: f32,
    aspect: f32,
    segments: u32,
    lobes: &[Lobe],
) -> Vec<[f32; 2]> {
    let mut points = Vec::with_capacity(segments as usize + 2);
    points.push([0.0, 0.0]);
    for i in 0..=segments {
        let theta = TAU * i as f32 / segments as f32;
        let offset: f32 = lobes.iter().map(|l| l.offset(theta, rotation)).sum();
        let r = radius_base + offset;
        points.push([r * theta.cos() * aspect, r * theta.sin()]);
    }
    points
}

/// Expand a fan into an independent triangle list.
pub fn fan_to_triangles(fan: &[[f32; 2]]) -> Vec<[f32; 2]> {
    let Some((&center, perimeter)) = fan.split_first() else {
        return Vec::new();
    };
    perimeter
        .windows(2)
        .flat_map(|edge| [center, edge[0], edge[1]])
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn reference_params() -> ShapeParams {
        ShapeParams {
            radius_base: 0.1,
            avg_freq: 0.5,
            rotation: 0.0,
            protrusion_count: 6,
            variability: 2.0,
            scale: 0.25,
            aspect: 1.0,
            segments: 128,
        }
    }

    fn radius(p: [f32; 2]) -> f32 {
        (p[0] * p[0] + p[1] * p[1]).sqrt()
    }

    #[test]
    fn test_geometry_is_deterministic() {
        let params = reference_params();
        assert_eq!(generate_geometry(&params), generate_geometry(&params));
    }

    #[test]
    fn test_perimeter_never_inside_base_circle() {
        let points = generate_geometry(&reference_params());
        assert_eq!(points.len(), 128 + 2);
        assert_eq!(points[0], [0.0, 0.0]);
        for &p in &points[1..] {
            assert!(radius(p) >= 0.1 - 1e-6);
        }
    }

    #[test]
    fn test_peak_offset_matches_formula() {
        let points = generate_geometry(&reference_params());
        let max_r = points[1..].iter().map(|&p| radius(p)).fold(0.0, f32::max);
        // 0.5^2 * 0.25 at the crest of a lobe
        assert_relative_eq!(max_r, 0.1 + 0.0625, epsilon = 1e-3);
    }

    #[test]
    fn test_zero_avg_freq_gives_circle() {
        let params = ShapeParams {
            avg_freq: 0.0,
            ..reference_params()
        };
        for &p in &generate_geometry(&params)[1..] {
            assert_relative_eq!(radius(p), 0.1, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_loop_closes_and_aspect_squashes_x() {
        let params = ShapeParams {
            avg_freq: 0.0,
            aspect: 0.5,
            ..reference_params()
        };
        let points = generate_geometry(&params);
        let first = points[1];
        let last = points[points.len() - 1];
        assert_relative_eq!(first[0], last[0], epsilon = 1e-6);
        assert_relative_eq!(first[1], last[1], epsilon = 1e-6);
        assert_relative_eq!(first[0], 0.05, epsilon = 1e-6);
    }

    #[test]
    fn test_rotation_shifts_lobes() {
        let still = generate_geometry(&reference_params());
        let turned = generate_geometry(&ShapeParams {
            rotation: 1.0,
            ..reference_params()
        });
        assert_ne!(still, turned);
    }

    #[test]
    fn test_lobes_superimpose() {
        let lobes = [
            Lobe {
                count: 3.0,
                magnitude: 0.1,
            },
            Lobe {
                count: 4.0,
                magnitude: 0.2,
            },
        ];
        let points = generate_lobed_geometry(0.2, 0.0, 1.0, 64, &lobes);
        // At theta = 0 both lobes sit at half height: 0.1/4 + 0.2/4
        assert_relative_eq!(radius(points[1]), 0.2 + 0.075, epsilon = 1e-6);
    }

    #[test]
    fn test_fan_expands_to_triangles() {
        let fan = [[0.0, 0.0], [1.0, 0.0], [0.0, 1.0], [-1.0, 0.0]];
        let tris = fan_to_triangles(&fan);
        assert_eq!(tris.len(), 6);
        assert_eq!(&tris[3..], &[[0.0, 0.0], [0.0, 1.0], [-1.0, 0.0]]);
        assert!(fan_to_triangles(&[]).is_empty());
    }
}
