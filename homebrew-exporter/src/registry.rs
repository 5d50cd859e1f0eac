//! The fixed table of analytics sources and the metrics they publish.
//!
//! Every (kind, window) pair is one source: one upstream document and one
//! gauge family. The table is built once at startup and only read afterwards.

use std::sync::Arc;

use homebrew_analytics::{MetricKind, Window, document_path};

/// Default root of the Homebrew analytics API.
pub const DEFAULT_BASE_URL: &str = "https://formulae.brew.sh/api/analytics";

/// Prefix shared by every published metric name.
pub const METRIC_PREFIX: &str = "homebrew";

/// Name of the label carrying the package name.
pub const FORMULA_LABEL: &str = "formula";

/// Immutable identity of one published gauge family.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MetricDescriptor {
    /// Metric name, e.g. `homebrew_install_30d`.
    pub name: String,
    /// HELP text.
    pub help: String,
    /// Label names, in order.
    pub labels: Vec<&'static str>,
}

impl MetricDescriptor {
    fn new(kind: MetricKind, window: Window, url: &str) -> Self {
        Self {
            name: build_metric_name(kind, window),
            help: format!("Results from {}", url),
            labels: vec![FORMULA_LABEL],
        }
    }
}

/// Build the metric name for a source: `homebrew_{kind}_{window}`.
pub fn build_metric_name(kind: MetricKind, window: Window) -> String {
    format!(
        "{}_{}_{}",
        METRIC_PREFIX,
        kind.as_metric_fragment(),
        window.as_str()
    )
}

/// One upstream document bound to the metric it feeds.
#[derive(Debug, Clone)]
pub struct Source {
    pub kind: MetricKind,
    pub window: Window,
    /// Absolute URL of the document.
    pub url: String,
    pub descriptor: Arc<MetricDescriptor>,
}

/// The nine sources, ordered by kind then window.
#[derive(Debug, Clone)]
pub struct SourceRegistry {
    sources: Vec<Source>,
}

impl SourceRegistry {
    /// Build the registry against an analytics API root such as
    /// [`DEFAULT_BASE_URL`]. A trailing `/` on `base_url` is ignored.
    pub fn new(base_url: &str) -> Self {
        let base = base_url.trim_end_matches('/');
        let sources = MetricKind::ALL
            .iter()
            .flat_map(|kind| Window::ALL.iter().map(move |window| (*kind, *window)))
            .map(|(kind, window)| {
                let url = format!("{}/{}", base, document_path(kind, window));
                let descriptor = Arc::new(MetricDescriptor::new(kind, window, &url));
                Source {
                    kind,
                    window,
                    url,
                    descriptor,
                }
            })
            .collect();

        Self { sources }
    }

    /// All sources in registry order.
    pub fn sources(&self) -> &[Source] {
        &self.sources
    }

    /// All descriptors in registry order.
    pub fn descriptors(&self) -> impl Iterator<Item = &Arc<MetricDescriptor>> {
        self.sources.iter().map(|s| &s.descriptor)
    }

    /// Look up the source for a (kind, window) pair.
    pub fn get(&self, kind: MetricKind, window: Window) -> Option<&Source> {
        self.sources
            .iter()
            .find(|s| s.kind == kind && s.window == window)
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

impl Default for SourceRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_URL)
    }
}
