//! Benchmarks for the CPU side: spectral analysis and the animation engine.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use sonoform::audio::{compute_spectrogram, generate_sweep, generate_white_noise};
use sonoform::engine::waves::{WaveField, WaveSettings};
use sonoform::engine::{generate_geometry, AnimationState, ShapeParams};
use sonoform::features::{extract_features, ExtractorSettings};
use sonoform::{ProtrusionPolicy, VisualConfig};

const SAMPLE_RATE: u32 = 44100;

fn bench_spectrogram(c: &mut Criterion) {
    let mut group = c.benchmark_group("Spectrogram");
    let samples = generate_white_noise(SAMPLE_RATE, 10.0, 0.5, 42);

    for bands in [64, 128, 512] {
        group.throughput(Throughput::Elements(samples.len() as u64));
        group.bench_with_input(BenchmarkId::new("stft_10s", bands), &bands, |b, &bands| {
            b.iter(|| black_box(compute_spectrogram(&samples, SAMPLE_RATE, 60, bands, usize::MAX)));
        });
    }

    group.finish();
}

fn bench_features(c: &mut Criterion) {
    let mut group = c.benchmark_group("Feature Extraction");
    let samples = generate_sweep(50.0, 15000.0, SAMPLE_RATE, 10.0, 0.5);
    let spectrogram = match compute_spectrogram(&samples, SAMPLE_RATE, 60, 128, usize::MAX) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Skipping feature benchmarks: {}", e);
            return;
        }
    };

    for bands in [0, 4, 8] {
        let settings = ExtractorSettings {
            protrusion_bands: bands,
            ..Default::default()
        };
        group.bench_with_input(BenchmarkId::new("extract", bands), &settings, |b, settings| {
            b.iter(|| black_box(extract_features(&spectrogram, settings)));
        });
    }

    group.finish();
}

fn bench_animation_step(c: &mut Criterion) {
    let mut group = c.benchmark_group("Animation Step");
    let samples = generate_sweep(50.0, 15000.0, SAMPLE_RATE, 5.0, 0.5);

    for policy in [ProtrusionPolicy::Fixed, ProtrusionPolicy::Hardmax, ProtrusionPolicy::Softmax] {
        let config = match (VisualConfig {
            protrusion_policy: policy,
            ..Default::default()
        })
        .scaled_to_fps()
        {
            Ok(c) => c,
            Err(e) => {
                eprintln!("Skipping {:?}: {}", policy, e);
                continue;
            }
        };
        let features = compute_spectrogram(
            &samples,
            SAMPLE_RATE,
            config.fps,
            config.num_frequency_bands,
            config.max_frames(),
        )
        .ok()
        .and_then(|s| extract_features(&s, &ExtractorSettings::from(&config)).ok());
        let Some(features) = features else {
            continue;
        };

        group.throughput(Throughput::Elements(features.len() as u64));
        group.bench_function(BenchmarkId::new("track", format!("{:?}", policy)), |b| {
            b.iter(|| {
                let mut state = AnimationState::new(&config);
                for f in &features {
                    black_box(state.step(f));
                }
            });
        });
    }

    group.finish();
}

fn bench_geometry(c: &mut Criterion) {
    let mut group = c.benchmark_group("Geometry");

    for segments in [100, 1000, 4000] {
        let params = ShapeParams {
            radius_base: 0.06,
            avg_freq: 0.5,
            rotation: 1.0,
            protrusion_count: 6,
            variability: 2.0,
            scale: 0.25,
            aspect: 0.5625,
            segments,
        };
        group.bench_with_input(BenchmarkId::new("generate", segments), &params, |b, params| {
            b.iter(|| black_box(generate_geometry(params)));
        });
    }

    group.finish();
}

fn bench_wave_field(c: &mut Criterion) {
    let settings = WaveSettings::from(&VisualConfig::default());
    c.bench_function("wave_field_1000_frames", |b| {
        b.iter(|| {
            let mut field = WaveField::new(settings);
            for i in 0..1000 {
                let hue = (i % 97) as f32 / 97.0;
                field.update([hue, 1.0 - hue, 0.5], (i % 13) as f32 / 13.0);
            }
            black_box(field.len())
        });
    });
}

criterion_group!(
    benches,
    bench_spectrogram,
    bench_features,
    bench_animation_step,
    bench_geometry,
    bench_wave_field
);
criterion_main!(benches);
