use criterion::{black_box, Criterion};

use imspeaks::{find_peaks, PeakFinder, Sample};

fn profile(centers: &[f64], n: usize) -> Vec<Sample> {
    let sigma = 3.0 / 2.354820045;
    (0..n)
        .map(|i| {
            let x = i as f64 * 0.25;
            let y: f64 = centers
                .iter()
                .enumerate()
                .map(|(j, c)| {
                    let amplitude = 1000.0 / (j + 1) as f64;
                    amplitude * (-(x - c).powi(2) / (2.0 * sigma * sigma)).exp()
                })
                .sum();
            Sample::new(x, y + (i % 7) as f64)
        })
        .collect()
}

fn single_series(c: &mut Criterion) {
    let samples = profile(&[40.0, 95.0, 150.0, 210.0], 1000);
    c.bench_function("find_peaks_all", |b| {
        b.iter(|| find_peaks(black_box(&samples), 0))
    });
    c.bench_function("find_peaks_top_1", |b| {
        b.iter(|| find_peaks(black_box(&samples), 1))
    });
}

fn batch(c: &mut Criterion) {
    let batch: Vec<Vec<Sample>> = (0..64)
        .map(|i| profile(&[40.0 + i as f64, 150.0], 1000))
        .collect();
    let finder = PeakFinder::new(0);
    c.bench_function("find_peaks_batch", |b| {
        b.iter(|| finder.find_peaks_batch(black_box(&batch)))
    });
}

criterion::criterion_group!(benches, single_series, batch);
criterion::criterion_main!(benches);
