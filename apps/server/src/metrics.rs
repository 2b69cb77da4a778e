//! Prometheus metrics

use lazy_static::lazy_static;
use prometheus::{
    register_counter, register_counter_vec, register_histogram_vec, Counter, CounterVec, Encoder,
    HistogramVec, TextEncoder,
};

lazy_static! {
    pub static ref HTTP_REQUESTS_TOTAL: CounterVec = register_counter_vec!(
        "caremesh_http_requests_total",
        "Total HTTP requests",
        &["method", "path", "status"]
    )
    .expect("metric registration");

    pub static ref HTTP_REQUEST_DURATION_SECONDS: HistogramVec = register_histogram_vec!(
        "caremesh_http_request_duration_seconds",
        "HTTP request latency",
        &["method", "path"],
        vec![0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0]
    )
    .expect("metric registration");

    pub static ref RATE_LIMITED_TOTAL: CounterVec = register_counter_vec!(
        "caremesh_rate_limited_total",
        "Requests rejected by the rate governor",
        &["route"]
    )
    .expect("metric registration");

    pub static ref SEARCH_FALLBACK_TOTAL: Counter = register_counter!(
        "caremesh_search_fallback_total",
        "Searches served by the degraded linear-scan path"
    )
    .expect("metric registration");
}

/// Collapse path segments that are identifiers so metric cardinality stays
/// bounded.
pub fn sanitize_path(path: &str) -> String {
    path.split('/')
        .map(|segment| {
            if uuid::Uuid::parse_str(segment).is_ok() {
                ":id"
            } else {
                segment
            }
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Render the default registry in Prometheus text exposition format.
pub fn gather() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&families, &mut buffer)?;
    Ok(String::from_utf8_lossy(&buffer).into_owned())
}
