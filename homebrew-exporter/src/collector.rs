//! Collector that turns a scrape into Prometheus exposition text.

use std::fmt::Write;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::client::{HttpSourceClient, SourceClient};
use crate::pipeline::{Sample, ScrapePipeline};
use crate::registry::{FORMULA_LABEL, MetricDescriptor};
use crate::stats::ExporterStats;

/// Collector for the Homebrew analytics gauges.
///
/// Stateless between scrapes: [`collect`](Self::collect) re-fetches every
/// source on each call.
pub struct HomebrewCollector<C = HttpSourceClient> {
    pipeline: ScrapePipeline<C>,
    formulae: Vec<String>,
}

impl<C: SourceClient> HomebrewCollector<C> {
    /// Create a collector publishing samples for `formulae`.
    pub fn new(pipeline: ScrapePipeline<C>, formulae: Vec<String>) -> Self {
        Self { pipeline, formulae }
    }

    /// Every metric family this collector publishes, whether or not any data
    /// has been fetched yet.
    pub fn describe(&self) -> impl Iterator<Item = &MetricDescriptor> {
        self.pipeline.registry().descriptors().map(|d| d.as_ref())
    }

    /// Run a fresh scrape of all sources.
    pub async fn collect(&self) -> Vec<Sample> {
        self.pipeline.scrape_all(&self.formulae).await
    }

    /// The tracked formulae.
    pub fn formulae(&self) -> &[String] {
        &self.formulae
    }

    /// Collector statistics.
    pub fn stats(&self) -> &ExporterStats {
        self.pipeline.stats()
    }

    /// Scrape and render metrics in OpenMetrics text format.
    pub async fn render(&self) -> String {
        let samples = self.collect().await;
        let mut output = String::with_capacity(1024 + samples.len() * 80);

        render_samples(&mut output, self.describe(), &samples);

        if let Err(e) = self.stats().encode(&mut output) {
            warn!(error = %e, "Failed to encode exporter metrics");
        }

        debug!(
            samples = samples.len(),
            bytes = output.len(),
            "Rendered metrics"
        );
        output
    }
}

/// Create a shareable collector handle.
pub type SharedCollector<C = HttpSourceClient> = Arc<HomebrewCollector<C>>;

/// Write one gauge family per descriptor, with the samples belonging to it.
fn render_samples<'a>(
    output: &mut String,
    descriptors: impl Iterator<Item = &'a MetricDescriptor>,
    samples: &[Sample],
) {
    for descriptor in descriptors {
        writeln!(
            output,
            "# HELP {} {}",
            descriptor.name,
            escape_label_value(&descriptor.help)
        )
        .ok();
        writeln!(output, "# TYPE {} gauge", descriptor.name).ok();

        for sample in samples
            .iter()
            .filter(|s| s.descriptor.name == descriptor.name)
        {
            writeln!(
                output,
                "{}{{{}=\"{}\"}} {} {}",
                descriptor.name,
                FORMULA_LABEL,
                escape_label_value(&sample.formula),
                format_value(sample.value),
                sample.timestamp.timestamp()
            )
            .ok();
        }
    }
}

/// Escape special characters in label values.
fn escape_label_value(value: &str) -> String {
    let mut result = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => result.push_str("\\\\"),
            '"' => result.push_str("\\\""),
            '\n' => result.push_str("\\n"),
            _ => result.push(c),
        }
    }
    result
}

/// Format a floating point value for Prometheus.
fn format_value(value: f64) -> String {
    if value.is_nan() {
        "NaN".to_string()
    } else if value.is_infinite() {
        if value.is_sign_positive() {
            "+Inf".to_string()
        } else {
            "-Inf".to_string()
        }
    } else if value.fract() == 0.0 {
        format!("{:.0}", value)
    } else {
        format!("{}", value)
    }
}
