//! Loading trip batches from their sources.
//!
//! All configured sources are fetched concurrently and joined in source order.
//! A single failed source fails the whole load; partial batches are never
//! merged.

use anyhow::{Context, Result};
use async_trait::async_trait;
use flate2::read::GzDecoder;
use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{Instrument, debug, error, info};

use crate::config::SourceSpec;
use crate::fetch::{BasicClient, HttpClient, fetch_text};
use crate::metrics::DashboardMetrics;
use crate::parser::parse_trips;
use crate::trip::TripRecord;

/// A load cycle that could not obtain every source's text.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to retrieve source '{source_name}': {source:#}")]
    Fetch {
        source_name: String,
        #[source]
        source: anyhow::Error,
    },
    #[error("retrieval task for source '{source_name}' did not complete")]
    Join {
        source_name: String,
        #[source]
        source: tokio::task::JoinError,
    },
}

/// Produces the raw CSV text behind a source name.
#[async_trait]
pub trait SourceFetcher: Send + Sync {
    async fn fetch_source(&self, name: &str) -> Result<String>;
}

/// Receives each freshly computed metrics snapshot.
pub trait MetricsSink: Send + Sync {
    fn on_metrics_ready(&self, metrics: &DashboardMetrics);
}

/// Fetches `<base_url>/<name>` over HTTP.
pub struct HttpSource<C> {
    client: C,
    base_url: String,
}

impl<C: HttpClient> HttpSource<C> {
    pub fn new(client: C, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn url_for(&self, name: &str) -> String {
        format!("{}/{}", self.base_url, name)
    }
}

#[async_trait]
impl<C: HttpClient> SourceFetcher for HttpSource<C> {
    async fn fetch_source(&self, name: &str) -> Result<String> {
        fetch_text(&self.client, &self.url_for(name)).await
    }
}

/// Reads `<root>/<name>` from disk. Names ending in `.gz` are gunzipped.
pub struct FileSource {
    root: PathBuf,
}

impl FileSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl SourceFetcher for FileSource {
    async fn fetch_source(&self, name: &str) -> Result<String> {
        let path = self.root.join(name);
        let bytes = tokio::fs::read(&path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;

        if name.ends_with(".gz") {
            let mut text = String::new();
            GzDecoder::new(bytes.as_slice())
                .read_to_string(&mut text)
                .with_context(|| format!("Failed to gunzip {}", path.display()))?;
            return Ok(text);
        }

        String::from_utf8(bytes).with_context(|| format!("{} is not UTF-8", path.display()))
    }
}

/// Picks the fetcher for a source root: URLs go over HTTP, anything else is a
/// local directory.
pub fn fetcher_for(root: &str, timeout: Duration) -> Result<Arc<dyn SourceFetcher>> {
    if root.starts_with("http") {
        let client = BasicClient::with_timeout(timeout)?;
        Ok(Arc::new(HttpSource::new(client, root)))
    } else {
        Ok(Arc::new(FileSource::new(root)))
    }
}

/// Fetches and parses every source concurrently, stamps each batch with its
/// borough and concatenates the batches in source order.
#[tracing::instrument(skip_all, fields(sources = sources.len()))]
pub async fn load_sources(
    fetcher: Arc<dyn SourceFetcher>,
    sources: &[SourceSpec],
) -> Result<Vec<TripRecord>, LoadError> {
    let mut tasks = Vec::with_capacity(sources.len());

    for spec in sources {
        let fetcher = fetcher.clone();
        let name = spec.name.clone();
        let borough = spec.borough.clone();

        let span = tracing::info_span!("load_source", source = %spec.name, borough = %spec.borough);

        let task = tokio::spawn(
            async move {
                let fetch_start = std::time::Instant::now();
                let text = fetcher.fetch_source(&name).await?;
                debug!(
                    bytes = text.len(),
                    elapsed_ms = fetch_start.elapsed().as_millis() as u64,
                    "Source text received, parsing"
                );

                let trips: Vec<TripRecord> = parse_trips(&text)
                    .into_iter()
                    .map(|t| t.with_borough(&borough))
                    .collect();
                info!(trips = trips.len(), "Source loaded");
                Ok::<_, anyhow::Error>(trips)
            }
            .instrument(span),
        );

        tasks.push((spec.name.clone(), task));
    }

    // Every task is awaited so none is left running after a failure.
    let mut batches = Vec::with_capacity(tasks.len());
    let mut first_error = None;
    for (source_name, task) in tasks {
        let outcome = match task.await {
            Ok(Ok(trips)) => Ok(trips),
            Ok(Err(source)) => Err(LoadError::Fetch {
                source_name,
                source,
            }),
            Err(source) => Err(LoadError::Join {
                source_name,
                source,
            }),
        };

        match outcome {
            Ok(trips) => batches.push(trips),
            Err(e) => {
                error!(error = %e, "Source retrieval failed");
                first_error.get_or_insert(e);
            }
        }
    }

    if let Some(e) = first_error {
        return Err(e);
    }

    Ok(batches.into_iter().flatten().collect())
}
