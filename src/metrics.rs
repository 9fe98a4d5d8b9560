use std::sync::Arc;

use prometheus_client::encoding::{EncodeLabelSet, EncodeLabelValue};
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::metrics::gauge::Gauge;
use prometheus_client::metrics::histogram::{exponential_buckets, Histogram};
use prometheus_client::registry::Registry;

// ---------------------------------------------------------------------------
// Label types
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelValue)]
pub enum CacheStatus {
    Hit,
    Miss,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct CacheLabels {
    pub cache_status: CacheStatus,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct ErrorLabels {
    pub class: String,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelValue)]
pub enum AuthMode {
    App,
    Public,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct AuthLabels {
    pub mode: AuthMode,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct EndpointLabels {
    pub endpoint: String,
}

// ---------------------------------------------------------------------------
// Metrics struct
// ---------------------------------------------------------------------------

/// Every Prometheus metric exposed by the service.
pub struct Metrics {
    // -- structure requests --
    pub structure_requests: Family<CacheLabels, Counter>,
    pub structure_errors: Family<ErrorLabels, Counter>,
    pub walk_duration_seconds: Histogram,

    // -- walker --
    pub listing_failures: Counter,

    // -- credentials --
    pub credential_resolutions: Family<AuthLabels, Counter>,

    // -- upstream API --
    pub upstream_api_calls: Family<EndpointLabels, Counter>,
    pub upstream_api_rate_limit_remaining: Gauge,
}

impl Metrics {
    /// Create every metric and register it with `registry`.
    pub fn new(registry: &mut Registry) -> Self {
        let structure_requests = Family::<CacheLabels, Counter>::default();
        registry.register(
            "reposcope_structure_requests",
            "Project structure requests by cache status",
            structure_requests.clone(),
        );

        let structure_errors = Family::<ErrorLabels, Counter>::default();
        registry.register(
            "reposcope_structure_errors",
            "Failed project structure requests by error class",
            structure_errors.clone(),
        );

        let walk_duration_seconds = Histogram::new(exponential_buckets(0.05, 2.0, 12));
        registry.register(
            "reposcope_walk_duration_seconds",
            "Repository tree walk latency in seconds",
            walk_duration_seconds.clone(),
        );

        let listing_failures = Counter::default();
        registry.register(
            "reposcope_listing_failures",
            "Contents listings that failed during a tree walk",
            listing_failures.clone(),
        );

        let credential_resolutions = Family::<AuthLabels, Counter>::default();
        registry.register(
            "reposcope_credential_resolutions",
            "Successful repository resolutions by auth mode",
            credential_resolutions.clone(),
        );

        let upstream_api_calls = Family::<EndpointLabels, Counter>::default();
        registry.register(
            "reposcope_upstream_api_calls",
            "GitHub API calls by endpoint",
            upstream_api_calls.clone(),
        );

        let upstream_api_rate_limit_remaining: Gauge = Gauge::default();
        registry.register(
            "reposcope_upstream_api_rate_limit_remaining",
            "Remaining GitHub API calls before rate limit",
            upstream_api_rate_limit_remaining.clone(),
        );

        Self {
            structure_requests,
            structure_errors,
            walk_duration_seconds,
            listing_failures,
            credential_resolutions,
            upstream_api_calls,
            upstream_api_rate_limit_remaining,
        }
    }

    pub fn record_cache(&self, cache_status: CacheStatus) {
        self.structure_requests
            .get_or_create(&CacheLabels { cache_status })
            .inc();
    }

    pub fn record_error(&self, class: &str) {
        self.structure_errors
            .get_or_create(&ErrorLabels {
                class: class.to_string(),
            })
            .inc();
    }

    pub fn record_upstream_call(&self, endpoint: &str) {
        self.upstream_api_calls
            .get_or_create(&EndpointLabels {
                endpoint: endpoint.to_string(),
            })
            .inc();
    }

    pub fn record_resolution(&self, mode: AuthMode) {
        self.credential_resolutions
            .get_or_create(&AuthLabels { mode })
            .inc();
    }
}

// ---------------------------------------------------------------------------
// Shared handle
// ---------------------------------------------------------------------------

/// Cloneable handle to the registry and its metrics.
#[derive(Clone)]
pub struct MetricsRegistry {
    pub registry: Arc<Registry>,
    pub metrics: Arc<Metrics>,
}

impl Default for MetricsRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsRegistry {
    pub fn new() -> Self {
        let mut registry = Registry::default();
        let metrics = Metrics::new(&mut registry);
        Self {
            registry: Arc::new(registry),
            metrics: Arc::new(metrics),
        }
    }

    /// Render the registry in OpenMetrics text format.
    pub fn encode(&self) -> anyhow::Result<String> {
        let mut buf = String::new();
        prometheus_client::encoding::text::encode(&mut buf, &self.registry)
            .map_err(|e| anyhow::anyhow!("metrics encoding failed: {e}"))?;
        Ok(buf)
    }
}
