use lazy_static::lazy_static;
use prometheus::{Encoder, IntCounterVec, Opts, Registry, TextEncoder};

lazy_static! {
    pub static ref REGISTRY: Registry = {
        let registry = Registry::new();
        register_metrics(&registry).expect("metrics can be registered");
        registry
    };

    // Business metrics - ledger mutations by operation and outcome
    pub static ref LEDGER_OPERATIONS: IntCounterVec = IntCounterVec::new(
        Opts::new("ledger_operations_total", "Total ledger operations"),
        &["operation", "outcome"]
    ).expect("metric can be created");

    // Auth metrics
    pub static ref AUTH_ATTEMPTS: IntCounterVec = IntCounterVec::new(
        Opts::new("auth_attempts_total", "Total register and login attempts"),
        &["operation", "outcome"]
    ).expect("metric can be created");
}

/// Register all metrics with the given registry
pub fn register_metrics(registry: &Registry) -> Result<(), prometheus::Error> {
    registry.register(Box::new(LEDGER_OPERATIONS.clone()))?;
    registry.register(Box::new(AUTH_ATTEMPTS.clone()))?;
    Ok(())
}

pub fn record_ledger_operation(operation: &str, outcome: &str) {
    LEDGER_OPERATIONS
        .with_label_values(&[operation, outcome])
        .inc();
}

pub fn record_auth_attempt(operation: &str, outcome: &str) {
    AUTH_ATTEMPTS.with_label_values(&[operation, outcome]).inc();
}

/// Render the registry in the Prometheus text format
pub fn metrics_handler() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;

    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recorded_operations_are_exported() {
        record_ledger_operation("withdrawal", "rejected");
        record_auth_attempt("login", "success");

        let body = metrics_handler().unwrap();
        assert!(body.contains("ledger_operations_total"));
        assert!(body.contains("auth_attempts_total"));
    }
}
