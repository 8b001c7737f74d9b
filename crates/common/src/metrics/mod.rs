//! Metrics and observability utilities
//!
//! Describes the DocTalk metric families on the `metrics` facade with a
//! standardized naming convention. Wiring an exporter is the embedding
//! application's concern.

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram, Unit};

/// Metrics prefix for all DocTalk metrics
pub const METRICS_PREFIX: &str = "doctalk";

/// Register all metric descriptions
pub fn register_metrics() {
    // Ingestion metrics
    describe_counter!(
        format!("{}_documents_ingested_total", METRICS_PREFIX),
        Unit::Count,
        "Total documents ingested"
    );

    describe_counter!(
        format!("{}_passages_created_total", METRICS_PREFIX),
        Unit::Count,
        "Total passages written to the vector index"
    );

    describe_counter!(
        format!("{}_duplicate_uploads_total", METRICS_PREFIX),
        Unit::Count,
        "Uploads rejected by the duplicate-document guard"
    );

    // Retrieval metrics
    describe_counter!(
        format!("{}_retrieval_queries_total", METRICS_PREFIX),
        Unit::Count,
        "Total similarity queries issued"
    );

    describe_gauge!(
        format!("{}_retrieval_hits_count", METRICS_PREFIX),
        Unit::Count,
        "Hits returned by the last similarity query"
    );

    // Chat metrics
    describe_counter!(
        format!("{}_chat_answers_total", METRICS_PREFIX),
        Unit::Count,
        "Chat answers produced, labeled by route"
    );

    describe_counter!(
        format!("{}_chat_fallbacks_total", METRICS_PREFIX),
        Unit::Count,
        "RAG requests answered without context because retrieval was empty"
    );

    describe_histogram!(
        format!("{}_completion_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Completion engine latency in seconds"
    );
}

/// Record one ingested document and its passage count.
pub fn record_ingestion(passage_count: usize) {
    counter!(format!("{}_documents_ingested_total", METRICS_PREFIX)).increment(1);
    counter!(format!("{}_passages_created_total", METRICS_PREFIX))
        .increment(passage_count as u64);
}

/// Record a rejected duplicate upload.
pub fn record_duplicate_rejected() {
    counter!(format!("{}_duplicate_uploads_total", METRICS_PREFIX)).increment(1);
}

/// Record one similarity query and how many hits it produced.
pub fn record_retrieval(hit_count: usize) {
    counter!(format!("{}_retrieval_queries_total", METRICS_PREFIX)).increment(1);
    gauge!(format!("{}_retrieval_hits_count", METRICS_PREFIX)).set(hit_count as f64);
}

/// Record one produced chat answer, labeled by route.
pub fn record_chat_answer(route: &'static str) {
    counter!(format!("{}_chat_answers_total", METRICS_PREFIX), "route" => route).increment(1);
}

/// Record one empty-retrieval fallback.
pub fn record_chat_fallback() {
    counter!(format!("{}_chat_fallbacks_total", METRICS_PREFIX)).increment(1);
}

/// Record the latency of one blocking completion call.
pub fn record_completion_duration(seconds: f64) {
    histogram!(format!("{}_completion_duration_seconds", METRICS_PREFIX)).record(seconds);
}
