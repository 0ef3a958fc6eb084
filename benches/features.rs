//! Feature extraction benchmarks
//!
//! Run with: cargo bench --bench features

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use rand::Rng;

use petcry_neural::decoder::Waveform;
use petcry_neural::resampler::resample;
use petcry_neural::resize::resize_antialiased;
use petcry_neural::{FeatureConfig, FeatureExtractor, InputTensor};

fn random_audio(len: usize) -> Vec<f32> {
    let mut rng = rand::thread_rng();
    (0..len).map(|_| rng.gen::<f32>() - 0.5).collect()
}

fn bench_extract(c: &mut Criterion) {
    let extractor = FeatureExtractor::new(FeatureConfig::default());
    let mut group = c.benchmark_group("extract");

    for secs in [1usize, 2, 10] {
        let waveform = Waveform::new(random_audio(16000 * secs), 16000);
        group.throughput(Throughput::Elements(waveform.len() as u64));
        group.bench_function(format!("{}s", secs), |bencher| {
            bencher.iter(|| extractor.extract(black_box(&waveform)))
        });
    }

    group.finish();
}

fn bench_log_mel_and_resize(c: &mut Criterion) {
    let extractor = FeatureExtractor::new(FeatureConfig::default());
    let waveform = Waveform::new(random_audio(32000), 16000);

    c.bench_function("log_mel", |bencher| {
        bencher.iter(|| extractor.log_mel(black_box(&waveform)))
    });

    let Ok(mel) = extractor.log_mel(&waveform) else {
        return;
    };
    c.bench_function("resize_128x64_to_128x862", |bencher| {
        bencher.iter(|| resize_antialiased(black_box(&mel), 128, 862))
    });

    if let Ok(features) = extractor.extract(&waveform) {
        c.bench_function("tensor", |bencher| {
            bencher.iter(|| InputTensor::from_feature_map(black_box(&features)))
        });
    }
}

fn bench_resample(c: &mut Criterion) {
    let mut group = c.benchmark_group("resample_to_16k");

    for rate in [22050u32, 44100, 48000] {
        let audio = random_audio(rate as usize * 2);
        group.throughput(Throughput::Elements(audio.len() as u64));
        group.bench_function(format!("{}hz_2s", rate), |bencher| {
            bencher.iter(|| resample(black_box(&audio), rate, 16000))
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_extract,
    bench_log_mel_and_resize,
    bench_resample
);
criterion_main!(benches);
