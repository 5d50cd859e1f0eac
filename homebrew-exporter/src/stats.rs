//! The exporter's own metrics, appended after the analytics families.
//!
//! These record the failures the scrape pipeline swallows so that a source
//! silently yielding nothing is still visible to whoever scrapes us.

use std::fmt;
use std::sync::atomic::AtomicU64;
use std::time::Duration;

use prometheus_client::encoding::EncodeLabelSet;
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::metrics::gauge::Gauge;
use prometheus_client::registry::Registry;

/// Why a source contributed no samples to a scrape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureReason {
    /// The document could not be fetched.
    Transport,
    /// The document was fetched but could not be decoded.
    Parse,
    /// The scrape deadline passed before the source completed.
    Timeout,
}

impl FailureReason {
    pub const ALL: [FailureReason; 3] = [
        FailureReason::Transport,
        FailureReason::Parse,
        FailureReason::Timeout,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FailureReason::Transport => "transport",
            FailureReason::Parse => "parse",
            FailureReason::Timeout => "timeout",
        }
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Hash, PartialEq, Eq, EncodeLabelSet)]
struct SourceErrorLabels {
    metric: String,
    reason: String,
}

#[derive(Debug, Clone, Hash, PartialEq, Eq, EncodeLabelSet)]
struct ItemErrorLabels {
    metric: String,
}

/// Counters and gauges describing the scrapes performed so far.
#[derive(Debug)]
pub struct ExporterStats {
    registry: Registry,
    metrics: Vec<String>,
    source_errors: Family<SourceErrorLabels, Counter>,
    item_errors: Family<ItemErrorLabels, Counter>,
    scrape_samples: Gauge,
    scrape_duration: Gauge<f64, AtomicU64>,
}

impl ExporterStats {
    /// Create the stats for the given analytics metric names. Every error
    /// series is initialized to zero so the exposed set never changes.
    pub fn new<'a>(metrics: impl IntoIterator<Item = &'a str>) -> Self {
        let metrics: Vec<String> = metrics.into_iter().map(str::to_string).collect();
        let mut registry = Registry::with_prefix("homebrew_exporter");

        let source_errors = Family::<SourceErrorLabels, Counter>::default();
        registry.register(
            "source_errors",
            "Analytics sources that produced no samples, by reason",
            source_errors.clone(),
        );

        let item_errors = Family::<ItemErrorLabels, Counter>::default();
        registry.register(
            "item_errors",
            "Tracked items skipped because their count could not be parsed",
            item_errors.clone(),
        );

        let scrape_samples = Gauge::default();
        registry.register(
            "scrape_samples",
            "Samples produced by the last scrape",
            scrape_samples.clone(),
        );

        let scrape_duration = Gauge::<f64, AtomicU64>::default();
        registry.register(
            "scrape_duration_seconds",
            "Wall time of the last scrape",
            scrape_duration.clone(),
        );

        for metric in &metrics {
            for reason in FailureReason::ALL {
                let _ = source_errors.get_or_create(&SourceErrorLabels {
                    metric: metric.clone(),
                    reason: reason.as_str().to_string(),
                });
            }
            let _ = item_errors.get_or_create(&ItemErrorLabels {
                metric: metric.clone(),
            });
        }

        Self {
            registry,
            metrics,
            source_errors,
            item_errors,
            scrape_samples,
            scrape_duration,
        }
    }

    pub fn record_source_error(&self, metric: &str, reason: FailureReason) {
        self.source_errors
            .get_or_create(&SourceErrorLabels {
                metric: metric.to_string(),
                reason: reason.as_str().to_string(),
            })
            .inc();
    }

    pub fn record_item_error(&self, metric: &str) {
        self.item_errors
            .get_or_create(&ItemErrorLabels {
                metric: metric.to_string(),
            })
            .inc();
    }

    pub fn record_scrape(&self, samples: usize, duration: Duration) {
        self.scrape_samples
            .set(i64::try_from(samples).unwrap_or(i64::MAX));
        self.scrape_duration.set(duration.as_secs_f64());
    }

    fn is_known(&self, metric: &str) -> bool {
        self.metrics.iter().any(|m| m == metric)
    }

    /// Number of failures recorded for `metric` with `reason`. Reading never
    /// adds a series: unknown metrics report zero.
    pub fn source_errors(&self, metric: &str, reason: FailureReason) -> u64 {
        if !self.is_known(metric) {
            return 0;
        }
        self.source_errors
            .get_or_create(&SourceErrorLabels {
                metric: metric.to_string(),
                reason: reason.as_str().to_string(),
            })
            .get()
    }

    /// Number of items skipped for `metric`.
    pub fn item_errors(&self, metric: &str) -> u64 {
        if !self.is_known(metric) {
            return 0;
        }
        self.item_errors
            .get_or_create(&ItemErrorLabels {
                metric: metric.to_string(),
            })
            .get()
    }

    /// Samples produced by the last scrape.
    pub fn last_scrape_samples(&self) -> i64 {
        self.scrape_samples.get()
    }

    /// Append these metrics in OpenMetrics text format, ending with `# EOF`.
    pub fn encode(&self, output: &mut String) -> fmt::Result {
        prometheus_client::encoding::text::encode(output, &self.registry)
    }
}
