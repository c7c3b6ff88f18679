//! Property tests for the smoothing, wave field and geometry invariants.

use proptest::prelude::*;
use sonoform::engine::geometry::{generate_lobed_geometry, Lobe};
use sonoform::engine::waves::{WaveField, WaveSettings};
use sonoform::engine::{generate_geometry, smooth, ShapeParams, MAX_WAVES};

fn unit() -> impl Strategy<Value = f32> {
    0.0f32..=1.0
}

fn color() -> impl Strategy<Value = [f32; 3]> {
    [unit(), unit(), unit()]
}

fn settings() -> impl Strategy<Value = WaveSettings> {
    (
        0.0f32..0.5,
        0u32..40,
        0.001f32..0.5,
        0.0f32..1.0,
        0.1f32..5.0,
        1usize..=MAX_WAVES,
    )
        .prop_map(
            |(threshold, max_frames, base_speed, loudness_scale, removal, max_waves)| WaveSettings {
                color_change_threshold: threshold,
                max_frames_between_waves: max_frames,
                base_speed,
                loudness_speed_scale: loudness_scale,
                removal_radius: removal,
                max_waves,
            },
        )
}

proptest! {
    #[test]
    fn smoothed_value_stays_between_inputs(
        previous in -10.0f32..10.0,
        new_value in -10.0f32..10.0,
        up in unit(),
        down in unit(),
    ) {
        let out = smooth(previous, new_value, up, down);
        let (lo, hi) = if previous < new_value { (previous, new_value) } else { (new_value, previous) };
        prop_assert!(out >= lo - 1e-5 && out <= hi + 1e-5);
    }

    #[test]
    fn smoothing_a_constant_is_a_fixed_point(x in -10.0f32..10.0, up in unit(), down in unit()) {
        prop_assert!((smooth(x, x, up, down) - x).abs() <= 1e-5 * x.abs().max(1.0));
    }

    #[test]
    fn wave_field_stays_within_bounds(
        settings in settings(),
        frames in prop::collection::vec((color(), unit()), 1..200),
    ) {
        let mut field = WaveField::new(settings);
        for (color, loudness) in frames {
            field.update(color, loudness);
            prop_assert!(!field.is_empty());
            prop_assert!(field.len() <= settings.max_waves);
            // Oldest first: radii never increase along the list.
            prop_assert!(field.waves().windows(2).all(|w| w[0].radius >= w[1].radius));
            prop_assert!(field.waves().iter().all(|w| w.radius > 0.0));
        }
    }

    #[test]
    fn identical_inputs_give_identical_wave_fields(
        settings in settings(),
        frames in prop::collection::vec((color(), unit()), 1..60),
    ) {
        let mut a = WaveField::new(settings);
        let mut b = WaveField::new(settings);
        for (color, loudness) in frames {
            prop_assert_eq!(a.update(color, loudness), b.update(color, loudness));
        }
        prop_assert_eq!(a.waves(), b.waves());
    }

    #[test]
    fn shape_never_dips_below_base_radius(
        radius_base in 0.01f32..1.0,
        avg_freq in unit(),
        rotation in 0.0f32..100.0,
        protrusion_count in 1u32..12,
        variability in 0.0f32..4.0,
        scale in 0.0f32..1.0,
        segments in 3u32..400,
    ) {
        let params = ShapeParams {
            radius_base,
            avg_freq,
            rotation,
            protrusion_count,
            variability,
            scale,
            aspect: 1.0,
            segments,
        };
        let points = generate_geometry(&params);
        prop_assert_eq!(points.len(), segments as usize + 2);
        prop_assert_eq!(points[0], [0.0, 0.0]);
        for p in &points[1..] {
            let r = p[0].hypot(p[1]);
            prop_assert!(r >= radius_base - 1e-4);
            prop_assert!(r <= radius_base + scale + 1e-4);
        }
        prop_assert_eq!(generate_geometry(&params), points);
    }

    #[test]
    fn lobes_superimpose_without_shrinking(
        radius_base in 0.01f32..1.0,
        magnitudes in prop::collection::vec(0.0f32..0.3, 1..6),
        rotation in 0.0f32..10.0,
    ) {
        let lobes: Vec<Lobe> = magnitudes
            .iter()
            .enumerate()
            .map(|(j, &magnitude)| Lobe { count: (3 + j) as f32, magnitude })
            .collect();
        let total: f32 = magnitudes.iter().sum();
        for p in &generate_lobed_geometry(radius_base, rotation, 1.0, 64, &lobes)[1..] {
            let r = p[0].hypot(p[1]);
            prop_assert!(r >= radius_base - 1e-4);
            prop_assert!(r <= radius_base + total + 1e-4);
        }
    }
}
