use approx::assert_abs_diff_eq;
use hrscore::bootstrap::{BootstrapConfig, BootstrapError, Metric, bootstrap_ci};
use hrscore::classifier::{ExternalAdapter, NamedModel, ProbabilisticClassifier, SharedClassifier};
use hrscore::data::load_score_table;
use hrscore::metrics::MetricError;
use hrscore::model::LogisticModel;
use hrscore::nri::nri_grid;
use hrscore::opr::opr_table;
use hrscore::sequential::{DEFAULT_CUTOFF, SequentialClassifier};
use ndarray::{Array1, Array2, array};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;
use std::fmt::Write as FmtWrite;
use std::io::Write;
use std::sync::Arc;
use tempfile::NamedTempFile;

struct Cohort {
    x: Array2<f64>,
    y: Array1<f64>,
}

fn cohort(n: usize, seed: u64) -> (Cohort, LogisticModel) {
    let mut rng = StdRng::seed_from_u64(seed);
    let x: Array2<f64> = Array2::from_shape_fn((n, 2), |_| rng.sample(StandardNormal));
    let model = LogisticModel::new(
        vec!["lactate".to_string(), "age".to_string()],
        -1.2,
        array![1.1, 0.6],
    )
    .unwrap();
    let p = model.predict(x.view()).unwrap();
    let y = p.mapv(|pi| if rng.gen_bool(pi) { 1.0 } else { 0.0 });
    (Cohort { x, y }, model)
}

#[test]
fn bootstrap_intervals_are_reproducible_and_bounded() {
    let (data, model) = cohort(300, 1);
    let p = model.predict(data.x.view()).unwrap();
    let config = BootstrapConfig::default().with_n_bootstraps(400);

    for metric in [Metric::Auroc, Metric::AveragePrecision] {
        let first = bootstrap_ci(p.view(), data.y.view(), metric, &config).unwrap();
        let second = bootstrap_ci(p.view(), data.y.view(), metric, &config).unwrap();
        assert_eq!(first, second);
        assert!(first.lower <= first.upper);
        assert!(first.lower >= 0.0 && first.upper <= 1.0);
        if metric == Metric::Auroc {
            let point = metric.evaluate(p.view(), data.y.view()).unwrap();
            assert!(first.contains(point), "{} {point} outside {first:?}", metric.name());
        }
    }
}

#[test]
fn single_class_resample_aborts_the_interval() {
    // With a single event, roughly 30% of resamples contain no event at all.
    let p = array![0.2, 0.4, 0.9];
    let y = array![0.0, 0.0, 1.0];
    let config = BootstrapConfig::default().with_n_bootstraps(50);
    match bootstrap_ci(p.view(), y.view(), Metric::Auroc, &config) {
        Err(BootstrapError::ResampleFailed { source, .. }) => {
            assert!(matches!(source, MetricError::SingleClass { .. }));
        }
        other => panic!("Expected ResampleFailed, got {:?}", other),
    }
}

#[test]
fn sequential_model_joins_the_comparison_panel() {
    let (data, truth) = cohort(400, 2);
    let mut base = truth.clone();
    base.coefficients[1] = 0.0;
    let base: SharedClassifier = Arc::new(base);
    let high_risk: SharedClassifier = Arc::new(truth.clone());
    let sequential = SequentialClassifier::new(base.clone(), high_risk.clone(), DEFAULT_CUTOFF)
        .unwrap();

    let base_p = base.positive_proba(data.x.view()).unwrap();
    let hr_p = high_risk.positive_proba(data.x.view()).unwrap();
    let seq_p = sequential.positive_proba(data.x.view()).unwrap();
    for i in 0..seq_p.len() {
        if base_p[i] < DEFAULT_CUTOFF {
            assert_eq!(seq_p[i], base_p[i]);
        } else {
            assert_eq!(seq_p[i], hr_p[i]);
        }
    }

    let panel = vec![
        NamedModel::new("base", base),
        NamedModel::new("full", high_risk),
        NamedModel::new("sequential", Arc::new(sequential)),
    ];
    let grid = nri_grid(&panel, data.x.view(), data.y.view(), false).unwrap();
    for i in 0..3 {
        for j in 0..3 {
            assert_eq!(grid.additive.values[[i, j]], -grid.additive.values[[j, i]]);
            assert_eq!(grid.absolute.values[[i, j]], -grid.absolute.values[[j, i]]);
        }
    }

    let opr = opr_table(
        &panel,
        data.x.view(),
        data.y.view(),
        &BootstrapConfig::default().with_n_bootstraps(200),
    )
    .unwrap();
    assert_eq!(opr.rows.len(), 3);
    for row in &opr.rows {
        assert!(row.lower <= row.upper);
    }
}

#[test]
fn score_file_feeds_external_adapters() {
    let mut content = String::from("id\toutcome\tapache\n");
    let rows = [(1, 0.8), (0, 0.2), (1, 0.8), (0, 0.2)];
    for (i, (y, p)) in rows.iter().enumerate() {
        writeln!(content, "pt{i}\t{y}\t{p}").unwrap();
    }
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();

    let table = load_score_table(file.path(), "outcome").unwrap();
    let panel = table.models();
    let x = table.placeholder_features();
    let opr = opr_table(
        &panel,
        x.view(),
        table.labels.view(),
        &BootstrapConfig::default().with_n_bootstraps(100),
    )
    .unwrap();
    assert_abs_diff_eq!(opr.get("apache").unwrap().ratio, 1.0, epsilon = 1e-12);

    let adapter = ExternalAdapter::new(array![0.8, 0.2, 0.8, 0.2]).unwrap();
    let unrelated = Array2::<f64>::zeros((9, 5));
    let table = adapter.predict_proba(unrelated.view()).unwrap();
    for row in table.rows() {
        assert_abs_diff_eq!(row.sum(), 1.0, epsilon = 1e-15);
    }
}
