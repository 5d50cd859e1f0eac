//! The kinds of analytics the service publishes and the windows they cover.

use std::fmt;

use serde::{Deserialize, Serialize};

/// What an analytics document counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MetricKind {
    /// Every install of a formula, including as a dependency.
    Install,
    /// Installs explicitly requested by the user.
    InstallOnRequest,
    /// Failed builds from source.
    BuildError,
}

impl MetricKind {
    /// All kinds, in publication order.
    pub const ALL: [MetricKind; 3] = [
        MetricKind::Install,
        MetricKind::InstallOnRequest,
        MetricKind::BuildError,
    ];

    /// Path segment used by the analytics API.
    pub fn as_path(&self) -> &'static str {
        match self {
            MetricKind::Install => "install",
            MetricKind::InstallOnRequest => "install-on-request",
            MetricKind::BuildError => "build-error",
        }
    }

    /// Fragment used in metric names.
    pub fn as_metric_fragment(&self) -> &'static str {
        match self {
            MetricKind::Install => "install",
            MetricKind::InstallOnRequest => "install_on_request",
            MetricKind::BuildError => "build_error",
        }
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_path())
    }
}

/// Trailing time window an analytics document aggregates over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Window {
    #[serde(rename = "30d")]
    Days30,
    #[serde(rename = "90d")]
    Days90,
    #[serde(rename = "365d")]
    Days365,
}

impl Window {
    /// All windows, shortest first.
    pub const ALL: [Window; 3] = [Window::Days30, Window::Days90, Window::Days365];

    /// Label used both in the API path and in metric names (e.g. "30d").
    pub fn as_str(&self) -> &'static str {
        match self {
            Window::Days30 => "30d",
            Window::Days90 => "90d",
            Window::Days365 => "365d",
        }
    }

    /// Length of the window in days.
    pub fn days(&self) -> u32 {
        match self {
            Window::Days30 => 30,
            Window::Days90 => 90,
            Window::Days365 => 365,
        }
    }
}

impl fmt::Display for Window {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Path of the document for `kind` over `window`, relative to the analytics
/// API root (e.g. `install-on-request/90d.json`).
pub fn document_path(kind: MetricKind, window: Window) -> String {
    format!("{}/{}.json", kind.as_path(), window.as_str())
}
