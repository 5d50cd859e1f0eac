//! Prometheus metrics exporter for Homebrew formula analytics.
//!
//! On every scrape this crate fetches the nine analytics documents published
//! by formulae.brew.sh (install, install-on-request and build-error counts over
//! 30, 90 and 365 days), keeps the rows for the configured formulae and
//! exposes them as gauges timestamped with the end of each document's window.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐     ┌─────────────────┐     ┌─────────────────┐
//! │ formulae.brew.sh│<────│    Collector    │<────│   HTTP Server   │
//! │ (9 JSON docs)   │────>│ (scrape_all)    │────>│   (/metrics)    │
//! └─────────────────┘     └─────────────────┘     └─────────────────┘
//! ```
//!
//! # Usage
//!
//! ```bash
//! HOMEBREW_FORMULAE="wget, curl" homebrew-exporter
//! homebrew-exporter --config config.json5
//! ```
//!
//! # Configuration
//!
//! See [`config::ExporterConfig`] for configuration options.

pub mod client;
pub mod collector;
pub mod config;
pub mod http;
pub mod pipeline;
pub mod registry;
pub mod stats;

pub use client::{FetchError, HttpSourceClient, SourceClient};
pub use collector::{HomebrewCollector, SharedCollector};
pub use config::ExporterConfig;
pub use http::HttpServer;
pub use pipeline::{Sample, ScrapeError, ScrapePipeline};
pub use registry::{MetricDescriptor, Source, SourceRegistry};
pub use stats::{ExporterStats, FailureReason};
