use std::sync::{Arc, Mutex};

use taxi_dashboard::config::SourceConfig;
use taxi_dashboard::dashboard::{Dashboard, RefreshOutcome};
use taxi_dashboard::loader::{FileSource, LoadError, MetricsSink, load_sources};
use taxi_dashboard::metrics::DashboardMetrics;
use taxi_dashboard::parser::parse_trips;
use taxi_dashboard::view::{BoroughFilter, TRIPS_PER_PAGE, paginate};

const FIXTURES: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures");

#[derive(Default)]
struct Collect(Mutex<Vec<DashboardMetrics>>);

impl MetricsSink for Collect {
    fn on_metrics_ready(&self, metrics: &DashboardMetrics) {
        self.0.lock().unwrap().push(metrics.clone());
    }
}

#[test]
fn test_parse_fixture_rows() {
    let text = include_str!("fixtures/manhattan_trips.csv");
    let trips = parse_trips(text);

    assert_eq!(trips.len(), text.trim().lines().count() - 1);
    assert_eq!(trips[3].total_amount, -8.3);
    assert_eq!(trips[4].store_and_fwd_flag, "Y");
    assert_eq!(trips[4].payment_type, "");
}

#[test]
fn test_short_row_in_fixture() {
    let trips = parse_trips(include_str!("fixtures/queens_trips.csv"));
    let short = &trips[1];

    assert_eq!(short.trip_distance, 0.0);
    assert_eq!(short.dropoff_location_id, "");
    assert_eq!(short.data_file_year, 0);
    assert_eq!(short.data_file_month, 0);
    assert_eq!(short.total_amount, 26.55);
}

#[tokio::test]
async fn test_full_pipeline() {
    let config = SourceConfig::default();
    let trips = load_sources(Arc::new(FileSource::new(FIXTURES)), config.sources())
        .await
        .expect("Failed to load fixtures");
    let metrics = DashboardMetrics::from_trips(&trips);

    assert_eq!(metrics.total_trips, 10);
    assert_eq!(metrics.total_revenue, 245.44);
    assert_eq!(metrics.avg_trip_distance, 4.85);
    assert_eq!(metrics.avg_tip, 2.77);

    let boroughs: Vec<_> = metrics
        .revenue_by_borough
        .iter()
        .map(|b| (b.borough.as_str(), b.revenue))
        .collect();
    assert_eq!(
        boroughs,
        vec![("Manhattan", 106.47), ("Brooklyn", 69.82), ("Queens", 69.15)]
    );

    let days: Vec<_> = metrics
        .trips_over_time
        .iter()
        .map(|d| (d.date.as_str(), d.trips, d.revenue))
        .collect();
    assert_eq!(
        days,
        vec![("2022-12-30", 3, 34.96), ("2022-12-31", 7, 210.48)]
    );

    let payments: Vec<_> = metrics
        .payment_type_distribution
        .iter()
        .map(|p| (p.payment_type.as_str(), p.count, p.percentage))
        .collect();
    assert_eq!(
        payments,
        vec![
            ("Credit Card", 6, 60.0),
            ("Cash", 1, 10.0),
            ("Dispute", 1, 10.0),
            ("Unknown", 1, 10.0),
            ("No Charge", 1, 10.0),
        ]
    );
}

#[tokio::test]
async fn test_metric_invariants() {
    let config = SourceConfig::default();
    let trips = load_sources(Arc::new(FileSource::new(FIXTURES)), config.sources())
        .await
        .unwrap();
    let metrics = DashboardMetrics::from_trips(&trips);

    let borough_sum: f64 = metrics.revenue_by_borough.iter().map(|b| b.revenue).sum();
    let tolerance = 0.01 * metrics.revenue_by_borough.len() as f64;
    assert!((borough_sum - metrics.total_revenue).abs() <= tolerance);

    let pct_sum: f64 = metrics
        .payment_type_distribution
        .iter()
        .map(|p| p.percentage)
        .sum();
    assert!((pct_sum - 100.0).abs() <= 0.1);

    assert!(
        metrics
            .revenue_by_borough
            .windows(2)
            .all(|w| w[0].revenue >= w[1].revenue)
    );
    assert!(
        metrics
            .trips_over_time
            .windows(2)
            .all(|w| w[0].date <= w[1].date)
    );
    assert!(
        metrics
            .payment_type_distribution
            .windows(2)
            .all(|w| w[0].count >= w[1].count)
    );

    assert_eq!(metrics, DashboardMetrics::from_trips(&trips));
}

#[tokio::test]
async fn test_missing_source_fails_whole_load() {
    let config = SourceConfig::from_json(
        r#"[
            {"name": "brooklyn_trips.csv", "borough": "Brooklyn"},
            {"name": "bronx_trips.csv", "borough": "Bronx"}
        ]"#,
    )
    .unwrap();

    let err = load_sources(Arc::new(FileSource::new(FIXTURES)), config.sources())
        .await
        .unwrap_err();
    assert!(matches!(err, LoadError::Fetch { ref source_name, .. } if source_name == "bronx_trips.csv"));
}

#[tokio::test]
async fn test_dashboard_filter_and_page() {
    let config = SourceConfig::default();
    let dashboard = Dashboard::new(
        Arc::new(FileSource::new(FIXTURES)),
        config.sources().to_vec(),
    );
    let sink = Collect::default();

    let outcome = dashboard.refresh(&sink).await.unwrap();
    assert_eq!(outcome, RefreshOutcome::Loaded { trips: 10 });
    assert_eq!(sink.0.lock().unwrap()[0].total_trips, 10);

    let state = dashboard.snapshot().await;
    let manhattan = BoroughFilter::parse("Manhattan").apply(&state.trips);
    assert_eq!(manhattan.len(), 5);
    assert_eq!(DashboardMetrics::from_trips(&manhattan).total_revenue, 106.47);

    let page = paginate(&state.trips, 2, TRIPS_PER_PAGE);
    assert_eq!((page.start, page.end, page.total_pages), (9, 10, 2));
    assert_eq!(page.rows[0].borough, "Queens");
}
