//! Fetch, decode, filter and convert the analytics sources into samples.
//!
//! Failure isolation follows the shape of the data: a source that cannot be
//! fetched or decoded contributes nothing to the scrape, an item whose count
//! cannot be parsed is skipped, and everything else is still returned.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use futures::StreamExt;
use futures::stream::FuturesUnordered;
use homebrew_analytics::{AnalyticsDocument, ParseError};
use thiserror::Error;
use tracing::{debug, trace, warn};

use crate::client::{FetchError, SourceClient};
use crate::registry::{MetricDescriptor, Source, SourceRegistry};
use crate::stats::{ExporterStats, FailureReason};

/// One data point derived from an analytics document.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    /// The family this sample belongs to.
    pub descriptor: Arc<MetricDescriptor>,
    /// Value of the `formula` label.
    pub formula: String,
    pub value: f64,
    /// End of the measurement window the value covers.
    pub timestamp: DateTime<Utc>,
}

/// A source that produced no samples.
#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error(transparent)]
    Transport(#[from] FetchError),

    #[error("Failed to decode {url}: {source}")]
    Parse { url: String, source: ParseError },
}

impl ScrapeError {
    pub fn reason(&self) -> FailureReason {
        match self {
            ScrapeError::Transport(_) => FailureReason::Transport,
            ScrapeError::Parse { .. } => FailureReason::Parse,
        }
    }
}

/// Runs scrapes over every source of a [`SourceRegistry`].
///
/// Holds no per-scrape state: every call fetches and derives its samples
/// from scratch.
pub struct ScrapePipeline<C> {
    client: C,
    registry: SourceRegistry,
    scrape_timeout: Duration,
    stats: ExporterStats,
}

impl<C: SourceClient> ScrapePipeline<C> {
    /// Create a pipeline. `scrape_timeout` bounds a whole [`scrape_all`]
    /// call; sources still in flight when it expires are abandoned.
    ///
    /// [`scrape_all`]: ScrapePipeline::scrape_all
    pub fn new(client: C, registry: SourceRegistry, scrape_timeout: Duration) -> Self {
        let stats = ExporterStats::new(registry.descriptors().map(|d| d.name.as_str()));
        Self {
            client,
            registry,
            scrape_timeout,
            stats,
        }
    }

    pub fn registry(&self) -> &SourceRegistry {
        &self.registry
    }

    pub fn stats(&self) -> &ExporterStats {
        &self.stats
    }

    /// Fetch and decode one source, returning its samples for `formulae`.
    pub async fn try_scrape_one(
        &self,
        source: &Source,
        formulae: &[String],
    ) -> Result<Vec<Sample>, ScrapeError> {
        let body = self.client.fetch(&source.url).await?;
        let document =
            AnalyticsDocument::from_slice(&body).map_err(|source_err| ScrapeError::Parse {
                url: source.url.clone(),
                source: source_err,
            })?;

        Ok(self.extract(source, &document, formulae))
    }

    /// Scrape one source. Failures are logged and counted, and yield no
    /// samples.
    pub async fn scrape_one(&self, source: &Source, formulae: &[String]) -> Vec<Sample> {
        match self.try_scrape_one(source, formulae).await {
            Ok(samples) => {
                trace!(
                    metric = %source.descriptor.name,
                    samples = samples.len(),
                    "Scraped source"
                );
                samples
            }
            Err(e) => {
                warn!(
                    metric = %source.descriptor.name,
                    url = %source.url,
                    error = %e,
                    "Skipping analytics source"
                );
                self.stats
                    .record_source_error(&source.descriptor.name, e.reason());
                Vec::new()
            }
        }
    }

    /// Samples for every tracked formula found in `document`.
    ///
    /// Matching is exact and case-sensitive. Output follows the order of
    /// `formulae`, then document order; a formula listed twice is emitted
    /// twice.
    pub fn extract(
        &self,
        source: &Source,
        document: &AnalyticsDocument,
        formulae: &[String],
    ) -> Vec<Sample> {
        let timestamp = document.end_timestamp();
        let mut samples = Vec::new();

        for formula in formulae {
            for item in document.items_named(formula) {
                match item.value() {
                    Ok(value) => samples.push(Sample {
                        descriptor: Arc::clone(&source.descriptor),
                        formula: item.formula.clone(),
                        value,
                        timestamp,
                    }),
                    Err(e) => {
                        warn!(
                            metric = %source.descriptor.name,
                            formula = %item.formula,
                            error = %e,
                            "Skipping item with unparseable count"
                        );
                        self.stats.record_item_error(&source.descriptor.name);
                    }
                }
            }
        }

        samples
    }

    /// Scrape every source concurrently and concatenate the results in
    /// registry order.
    ///
    /// Sources that have not completed when the scrape timeout expires are
    /// dropped, which cancels their requests; whatever completed is returned.
    pub async fn scrape_all(&self, formulae: &[String]) -> Vec<Sample> {
        let started = Instant::now();
        let deadline = tokio::time::Instant::now() + self.scrape_timeout;
        let sources = self.registry.sources();

        let mut pending = FuturesUnordered::new();
        for (index, source) in sources.iter().enumerate() {
            pending.push(async move { (index, self.scrape_one(source, formulae).await) });
        }

        let mut completed = vec![false; sources.len()];
        let mut batches = Vec::with_capacity(sources.len());

        loop {
            match tokio::time::timeout_at(deadline, pending.next()).await {
                Ok(Some((index, samples))) => {
                    completed[index] = true;
                    batches.push((index, samples));
                }
                Ok(None) => break,
                Err(_) => {
                    for (source, _) in sources
                        .iter()
                        .zip(&completed)
                        .filter(|(_, done)| !**done)
                    {
                        warn!(
                            metric = %source.descriptor.name,
                            url = %source.url,
                            timeout_secs = self.scrape_timeout.as_secs_f64(),
                            "Scrape deadline exceeded, abandoning source"
                        );
                        self.stats
                            .record_source_error(&source.descriptor.name, FailureReason::Timeout);
                    }
                    break;
                }
            }
        }
        drop(pending);

        batches.sort_by_key(|(index, _)| *index);
        let samples: Vec<Sample> = batches
            .into_iter()
            .flat_map(|(_, samples)| samples)
            .collect();

        let elapsed = started.elapsed();
        self.stats.record_scrape(samples.len(), elapsed);
        debug!(
            samples = samples.len(),
            sources = sources.len(),
            elapsed_ms = elapsed.as_millis() as u64,
            "Scrape complete"
        );

        samples
    }
}
