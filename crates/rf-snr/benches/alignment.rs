//! Alignment benchmarks: direct vs FFT correlation

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use rf_snr::align::{cross_correlate_direct, cross_correlate_fft};
use rf_snr::{AudioMatcher, CorrelationMethod, MatchConfig};

fn signal(len: usize, seed: f64) -> Vec<f64> {
    (0..len)
        .map(|i| ((i as f64 * 0.013 + seed).sin() + (i as f64 * 0.0071).cos()) * 0.5)
        .collect()
}

fn bench_correlation(c: &mut Criterion) {
    let mut group = c.benchmark_group("cross_correlation");
    let candidate = signal(48000, 0.0);

    for reference_len in [256usize, 1024, 4096] {
        let reference = signal(reference_len, 1.7);

        group.bench_with_input(
            BenchmarkId::new("direct", reference_len),
            &reference,
            |b, reference| {
                b.iter(|| cross_correlate_direct(black_box(&candidate), black_box(reference)))
            },
        );

        group.bench_with_input(
            BenchmarkId::new("fft", reference_len),
            &reference,
            |b, reference| b.iter(|| cross_correlate_fft(black_box(&candidate), black_box(reference))),
        );
    }

    group.finish();
}

fn bench_compare(c: &mut Criterion) {
    let reference = signal(4800, 0.3);
    let mut candidate = vec![0.0; 480000];
    candidate[200000..204800].copy_from_slice(&reference);

    let matcher = AudioMatcher::new(MatchConfig::default().with_method(CorrelationMethod::Fft));

    c.bench_function("compare_10s_at_48k", |b| {
        b.iter(|| matcher.compare_samples(black_box(&reference), black_box(&candidate), 48000))
    });
}

criterion_group!(benches, bench_correlation, bench_compare);
criterion_main!(benches);
