//! Metric names and helpers.
//!
//! Only the `metrics` facade is used here. Installing a recorder (and an
//! exporter) is up to the process embedding the agent; without one every
//! call below is a no-op.

use metrics::{counter, describe_counter, describe_gauge, gauge};

/// Register metric descriptions (safe to call multiple times)
pub fn init_metric_descriptions() {
    describe_counter!(
        "perplexity_requests_total",
        "Total number of Perplexity API requests"
    );
    describe_gauge!(
        "perplexity_cost_usd",
        "Accumulated Perplexity spend reported by the API, in USD"
    );
    describe_counter!(
        "perplexity_actions_total",
        "Total number of suggested actions dispatched to the host"
    );
    describe_gauge!(
        "perplexity_assistant_info",
        "Assistant version information"
    );

    gauge!("perplexity_assistant_info", "version" => env!("CARGO_PKG_VERSION")).set(1.0);
}

/// Record one completion call and its outcome
pub fn record_request(model: &str, outcome: &str) {
    counter!(
        "perplexity_requests_total",
        "model" => model.to_string(),
        "outcome" => outcome.to_string(),
    )
    .increment(1);
}

/// Add the cost reported for one call
pub fn record_cost(cost: f64) {
    if cost.is_finite() && cost > 0.0 {
        gauge!("perplexity_cost_usd").increment(cost);
    }
}

/// Record one dispatched action
pub fn record_action(domain: &str, outcome: &str) {
    counter!(
        "perplexity_actions_total",
        "domain" => domain.to_string(),
        "outcome" => outcome.to_string(),
    )
    .increment(1);
}
