//! View state for the dashboard and the refresh cycle that replaces it.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;
use tracing::{error, info, warn};

use crate::config::SourceSpec;
use crate::loader::{LoadError, MetricsSink, SourceFetcher, load_sources};
use crate::metrics::DashboardMetrics;
use crate::trip::TripRecord;

/// Everything the display layer reads. Replaced wholesale by each successful
/// refresh.
#[derive(Debug, Clone, Default)]
pub struct DashboardState {
    pub trips: Vec<TripRecord>,
    pub metrics: Option<DashboardMetrics>,
    pub is_loading: bool,
    pub last_error: Option<String>,
    pub loaded_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    Loaded { trips: usize },
    /// Another refresh was already running; nothing was done.
    Skipped,
}

pub struct Dashboard {
    fetcher: Arc<dyn SourceFetcher>,
    sources: Vec<SourceSpec>,
    state: RwLock<DashboardState>,
    in_flight: AtomicBool,
}

/// Clears the in-flight flag however the refresh ends.
struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl Dashboard {
    pub fn new(fetcher: Arc<dyn SourceFetcher>, sources: Vec<SourceSpec>) -> Self {
        Self {
            fetcher,
            sources,
            state: RwLock::new(DashboardState::default()),
            in_flight: AtomicBool::new(false),
        }
    }

    /// Runs one load cycle: fetch all sources, aggregate, publish.
    ///
    /// Only one refresh runs at a time; a call made while another is in flight
    /// returns [`RefreshOutcome::Skipped`]. On failure the previous trips and
    /// metrics stay in place and the error is recorded in the state.
    #[tracing::instrument(skip_all)]
    pub async fn refresh(&self, sink: &dyn MetricsSink) -> Result<RefreshOutcome, LoadError> {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            warn!("Refresh already in flight, skipping");
            return Ok(RefreshOutcome::Skipped);
        }
        let _guard = InFlight(&self.in_flight);

        self.state.write().await.is_loading = true;

        match load_sources(self.fetcher.clone(), &self.sources).await {
            Ok(trips) => {
                let metrics = DashboardMetrics::from_trips(&trips);
                let count = trips.len();
                {
                    let mut state = self.state.write().await;
                    state.trips = trips;
                    state.metrics = Some(metrics.clone());
                    state.is_loading = false;
                    state.last_error = None;
                    state.loaded_at = Some(Utc::now());
                }
                info!(trips = count, "Dashboard refreshed");
                sink.on_metrics_ready(&metrics);
                Ok(RefreshOutcome::Loaded { trips: count })
            }
            Err(e) => {
                error!(error = %e, "Error loading taxi data");
                let mut state = self.state.write().await;
                state.is_loading = false;
                state.last_error = Some(e.to_string());
                Err(e)
            }
        }
    }

    /// Copy of the current state.
    pub async fn snapshot(&self) -> DashboardState {
        self.state.read().await.clone()
    }

    pub fn is_refreshing(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::tests::{FakeSources, RecordingSink};
    use anyhow::Result;
    use async_trait::async_trait;
    use tokio::sync::Notify;

    fn sources() -> Vec<SourceSpec> {
        vec![
            SourceSpec::new("a.csv", "Brooklyn"),
            SourceSpec::new("b.csv", "Queens"),
        ]
    }

    #[tokio::test]
    async fn test_refresh_publishes_metrics() {
        let fake = FakeSources::new(&[
            ("a.csv", "payment_type,total_amount\n1,10\n"),
            ("b.csv", "payment_type,total_amount\n2,30\n"),
        ]);
        let dashboard = Dashboard::new(Arc::new(fake), sources());
        let sink = RecordingSink::default();

        let outcome = dashboard.refresh(&sink).await.unwrap();
        assert_eq!(outcome, RefreshOutcome::Loaded { trips: 2 });

        let state = dashboard.snapshot().await;
        assert!(!state.is_loading);
        assert!(state.loaded_at.is_some());
        let metrics = state.metrics.unwrap();
        assert_eq!(metrics.total_revenue, 40.0);
        assert_eq!(metrics.revenue_by_borough[0].borough, "Queens");

        assert_eq!(sink.seen.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_failed_refresh_keeps_previous_state() {
        let good = FakeSources::new(&[
            ("a.csv", "total_amount\n10\n"),
            ("b.csv", "total_amount\n5\n"),
        ]);
        let dashboard = Dashboard::new(Arc::new(good), sources());
        let sink = RecordingSink::default();
        dashboard.refresh(&sink).await.unwrap();

        // Same dashboard state, but now a source is missing.
        let broken = Dashboard {
            fetcher: Arc::new(FakeSources::new(&[("a.csv", "total_amount\n1\n")])),
            sources: sources(),
            state: RwLock::new(dashboard.snapshot().await),
            in_flight: AtomicBool::new(false),
        };

        assert!(broken.refresh(&sink).await.is_err());

        let state = broken.snapshot().await;
        assert_eq!(state.trips.len(), 2);
        assert_eq!(state.metrics.unwrap().total_revenue, 15.0);
        assert!(state.last_error.unwrap().contains("b.csv"));
        assert!(!state.is_loading);
        assert!(!broken.is_refreshing());
        assert_eq!(sink.seen.lock().unwrap().len(), 1);
    }

    /// Blocks every fetch until released.
    struct GatedSources {
        inner: FakeSources,
        entered: Notify,
        release: Notify,
    }

    #[async_trait]
    impl SourceFetcher for GatedSources {
        async fn fetch_source(&self, name: &str) -> Result<String> {
            self.entered.notify_one();
            self.release.notified().await;
            self.inner.fetch_source(name).await
        }
    }

    #[tokio::test]
    async fn test_overlapping_refresh_is_skipped() {
        let gated = Arc::new(GatedSources {
            inner: FakeSources::new(&[("a.csv", "total_amount\n1\n")]),
            entered: Notify::new(),
            release: Notify::new(),
        });
        let dashboard = Arc::new(Dashboard::new(
            gated.clone(),
            vec![SourceSpec::new("a.csv", "Bronx")],
        ));

        let first = {
            let dashboard = dashboard.clone();
            tokio::spawn(async move {
                let sink = RecordingSink::default();
                dashboard.refresh(&sink).await.map_err(|e| e.to_string())
            })
        };

        gated.entered.notified().await;
        assert!(dashboard.is_refreshing());
        assert!(dashboard.snapshot().await.is_loading);

        let sink = RecordingSink::default();
        let second = dashboard.refresh(&sink).await.unwrap();
        assert_eq!(second, RefreshOutcome::Skipped);

        gated.release.notify_one();
        let first = first.await.unwrap().unwrap();
        assert_eq!(first, RefreshOutcome::Loaded { trips: 1 });
        assert!(!dashboard.is_refreshing());
    }
}
