use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use hrscore::bootstrap::{BootstrapConfig, Metric, bootstrap_ci};
use ndarray::Array1;
use rand::distributions::Standard;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn random_cohort(size: usize) -> (Array1<f64>, Array1<f64>) {
    let mut rng = StdRng::seed_from_u64(0x5EED_B007 + size as u64);
    let scores: Array1<f64> = Array1::from_shape_fn(size, |_| rng.sample(Standard));
    let labels = scores.mapv(|p| if rng.gen_bool(p) { 1.0 } else { 0.0 });
    (scores, labels)
}

fn benchmark_bootstrap(c: &mut Criterion) {
    let sizes = [500_usize, 2000, 8000];
    let cohorts: Vec<_> = sizes
        .iter()
        .map(|&size| (size, random_cohort(size)))
        .collect();
    let config = BootstrapConfig::default().with_n_bootstraps(200);

    let mut group = c.benchmark_group("bootstrap_ci");
    group.sample_size(10);
    for (size, (scores, labels)) in cohorts.iter() {
        group.throughput(Throughput::Elements((*size * config.n_bootstraps) as u64));

        for metric in [Metric::Auroc, Metric::AveragePrecision, Metric::ObservedPredictedRatio] {
            group.bench_with_input(BenchmarkId::new(metric.name(), size), size, |b, _| {
                b.iter(|| {
                    let interval = bootstrap_ci(
                        black_box(scores.view()),
                        black_box(labels.view()),
                        metric,
                        &config,
                    );
                    black_box(interval.is_ok());
                });
            });
        }
    }
    group.finish();
}

criterion_group!(bootstrap, benchmark_bootstrap);
criterion_main!(bootstrap);
