use approx::assert_relative_eq;
use chrono::NaiveDate;
use ndarray::{Array1, Array2};
use oxyscore_core::align::TemporalAligner;
use oxyscore_core::grid::DepthAxis;
use oxyscore_core::layers::LayerAggregator;
use oxyscore_core::profile::DepthProfile;
use oxyscore_core::score::{
    correlation_score, extremum_score, gas_exchange_score, profile_score, variability_score,
    ClampPolicy, ExtremumWindows, GasExchangeReference, ModelScore, ScoreComponent,
};
use oxyscore_core::table::ComparisonTable;
use oxyscore_core::timeseries::Timeseries;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const ITERATIONS: usize = 200;

fn annual(values: Array1<f64>) -> Timeseries {
    let times = (0..values.len())
        .map(|i| NaiveDate::from_ymd_opt(1990 + i as i32, 7, 1).unwrap())
        .collect();
    Timeseries::new(times, values).unwrap()
}

fn random_series(rng: &mut StdRng, len: usize, scale: f64) -> Array1<f64> {
    Array1::from_iter((0..len).map(|_| rng.gen_range(-scale..scale)))
}

#[test]
fn components_stay_within_bounds() {
    let mut rng = StdRng::seed_from_u64(42);
    let layers = LayerAggregator::default();
    let depths = Array1::from(vec![100.0, 800.0, 1800.0, 2600.0, 3500.0]);

    for _ in 0..ITERATIONS {
        let (observed_scale, model_scale) = (rng.gen_range(0.1..100.0), rng.gen_range(0.1..100.0));
        let observed = annual(random_series(&mut rng, 20, observed_scale));
        let model = annual(random_series(&mut rng, 20, model_scale));
        let table = ComparisonTable::new(&observed)
            .with_column("m", &model)
            .unwrap()
            .anomalies();
        let (m, o) = (table.model("m").unwrap(), table.observed());

        let extremum_clamp = if rng.gen_bool(0.5) {
            ClampPolicy::Symmetric
        } else {
            ClampPolicy::LowerOnly
        };

        let mut score = ModelScore::default();
        score.record(ScoreComponent::Correlation, correlation_score(&m, &o));
        score.record(
            ScoreComponent::ExtremumRatio,
            extremum_score(&m, &o, ExtremumWindows::default(), extremum_clamp),
        );
        score.record(
            ScoreComponent::VariabilityRatio,
            variability_score(&m, &o, ClampPolicy::Symmetric),
        );

        let observed_profile =
            DepthProfile::new(depths.clone(), random_series(&mut rng, 5, 400.0)).unwrap();
        let model_profile =
            DepthProfile::new(depths.clone(), random_series(&mut rng, 5, 400.0)).unwrap();
        let profile = profile_score(&model_profile, &observed_profile, &layers).unwrap();
        assert!((0.0..=10.0).contains(&profile.upper));
        assert!((0.0..=10.0).contains(&profile.lower));
        score.record_profile(Ok(profile));

        let reference = GasExchangeReference {
            mean: rng.gen_range(-50.0..50.0),
            std: rng.gen_range(0.1..20.0),
        };
        score.record(
            ScoreComponent::GasExchange,
            gas_exchange_score(rng.gen_range(-100.0..100.0), reference),
        );

        for (component, value) in &score.components {
            if *component == ScoreComponent::ExtremumRatio
                && extremum_clamp == ClampPolicy::LowerOnly
            {
                assert!(*value >= 0.0);
            } else {
                assert!((0.0..=20.0).contains(value), "{component} = {value}");
            }
        }
        if extremum_clamp == ClampPolicy::Symmetric {
            assert!(score.is_complete(), "{:?}", score.undefined);
            assert!((0.0..=100.0).contains(&score.total()));
        }
    }
}

#[test]
fn identical_series_score_maximum() {
    let mut rng = StdRng::seed_from_u64(7);
    for _ in 0..ITERATIONS {
        let series = annual(random_series(&mut rng, 20, 10.0));
        let anomaly = ComparisonTable::new(&series).anomalies().observed();

        assert_eq!(correlation_score(&anomaly, &anomaly).unwrap(), 20.0);
        assert_eq!(
            extremum_score(&anomaly, &anomaly, ExtremumWindows::default(), ClampPolicy::Symmetric)
                .unwrap(),
            20.0
        );
        assert_eq!(
            variability_score(&anomaly, &anomaly, ClampPolicy::LowerOnly).unwrap(),
            20.0
        );
    }
}

#[test]
fn layers_partition_the_column() {
    let mut rng = StdRng::seed_from_u64(1234);

    for _ in 0..ITERATIONS {
        let levels = rng.gen_range(2..30);
        let mut edges = vec![0.0];
        for _ in 0..levels {
            let last = edges[edges.len() - 1];
            edges.push(last + rng.gen_range(10.0..500.0));
        }
        let axis = DepthAxis::from_edges("m", &edges).unwrap();
        let threshold = rng.gen_range(axis.centres[0] + 1e-6..=axis.centres[levels - 1]);
        let aggregator = LayerAggregator::new(threshold);

        let nt = rng.gen_range(1..24);
        let times: Vec<NaiveDate> = (0..nt)
            .map(|i| NaiveDate::from_ymd_opt(2000, 1, 1).unwrap() + chrono::Days::new(i as u64 * 30))
            .collect();
        let column = Array2::from_shape_fn((nt, levels), |_| rng.gen_range(0.1..0.4));

        let inventories = aggregator.integrate(&times, &column, &axis).unwrap();
        let whole = column.dot(&axis.thicknesses());
        for t in 0..nt {
            assert_relative_eq!(
                inventories.upper.values()[t] + inventories.lower.values()[t],
                whole[t],
                max_relative = 1e-12
            );
        }
    }
}

#[test]
fn alignment_of_annual_series_is_identity() {
    let mut rng = StdRng::seed_from_u64(99);
    let aligner = TemporalAligner::default();

    for _ in 0..ITERATIONS {
        let len = rng.gen_range(1..40);
        let values = Array1::from_iter((0..len).map(|_| {
            if rng.gen_bool(0.1) {
                f64::NAN
            } else {
                rng.gen_range(0.0..1000.0)
            }
        }));
        let series = annual(values);
        let aligned = aligner.align(&series, series.times()).unwrap();

        assert_eq!(aligned.times(), series.times());
        for (a, b) in aligned.values().iter().zip(series.values().iter()) {
            assert!(a == b || (a.is_nan() && b.is_nan()));
        }
    }
}
