//! Benchmarks for GPU rendering and readback.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use sonoform::engine::{AnimationState, FrameParams};
use sonoform::features::{frequency_to_color, AudioFeatures};
use sonoform::gpu::{SceneConfig, SceneRenderer};
use sonoform::render::FrameRenderer;
use sonoform::VisualConfig;

fn features_at(i: usize) -> AudioFeatures {
    let avg = (i % 60) as f32 / 60.0;
    AudioFeatures {
        loudness: (i % 7) as f32 / 7.0,
        avg_frequency: avg,
        color: frequency_to_color(avg),
        band_energy: Vec::new(),
    }
}

/// Parameters after a few seconds of varied input, so several waves are live.
fn warmed_params(config: &VisualConfig) -> FrameParams {
    let mut state = AnimationState::new(config);
    let mut params = state.step(&features_at(0));
    for i in 1..180 {
        params = state.step(&features_at(i));
    }
    params
}

fn bench_render_resolutions(c: &mut Criterion) {
    let mut group = c.benchmark_group("Resolution Scaling");
    group.sample_size(20);

    let resolutions = [
        (640, 360, "360p"),
        (1280, 720, "720p"),
        (1920, 1088, "1080p"),
    ];

    for (width, height, name) in resolutions {
        let config = match (VisualConfig {
            width,
            height,
            ..Default::default()
        })
        .scaled_to_fps()
        {
            Ok(c) => c,
            Err(_) => continue,
        };

        let mut renderer = match pollster::block_on(SceneRenderer::new(SceneConfig::from(&config))) {
            Ok(r) => r,
            Err(e) => {
                eprintln!("Skipping GPU benchmarks: {}", e);
                return;
            }
        };
        let params = warmed_params(&config);

        group.bench_function(BenchmarkId::new("render", name), |b| {
            b.iter(|| black_box(renderer.render_frame(&params)));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_render_resolutions);
criterion_main!(benches);
