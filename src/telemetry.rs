use prometheus::{HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry};
use std::collections::HashSet;

pub struct Metrics {
    request_counter: IntCounterVec,
    prediction_duration: HistogramVec,
    prediction_counter: IntCounterVec,
    pub registry: Registry,
}

impl Metrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let request_counter = IntCounterVec::new(
            Opts::new("requests_total", "Total number of requests"),
            &["route"],
        )?;

        // Remote calls, so the interesting range is tens of ms up to ~10 s.
        let boundaries = generate_boundaries(&[
            (50, 500, 50),
            (500, 2_000, 250),
            (2_000, 10_000, 2_000),
        ]);

        let prediction_duration = HistogramVec::new(
            HistogramOpts::new(
                "prediction_duration_ms",
                "Duration of remote prediction calls in milliseconds",
            )
            .buckets(boundaries),
            &["variant"],
        )?;

        let prediction_counter = IntCounterVec::new(
            Opts::new("predictions_total", "Prediction calls by outcome"),
            &["variant", "outcome"],
        )?;

        registry.register(Box::new(request_counter.clone()))?;
        registry.register(Box::new(prediction_duration.clone()))?;
        registry.register(Box::new(prediction_counter.clone()))?;

        Ok(Metrics {
            request_counter,
            prediction_duration,
            prediction_counter,
            registry,
        })
    }

    pub fn record_request(&self, route: &str) {
        self.request_counter.with_label_values(&[route]).inc();
    }

    pub fn record_prediction(&self, variant: &str, outcome: &str, duration_ms: u64) {
        self.prediction_duration
            .with_label_values(&[variant])
            .observe(duration_ms as f64);
        self.prediction_counter
            .with_label_values(&[variant, outcome])
            .inc();
    }
}

/// Each segment is `(start, end, step)`; both ends are included and
/// boundaries shared by neighbouring segments appear once.
fn generate_boundaries(segments: &[(u64, u64, usize)]) -> Vec<f64> {
    let mut seen = HashSet::new();
    segments
        .iter()
        .flat_map(|&(start, end, step)| (start..=end).step_by(step))
        .filter(|&x| seen.insert(x))
        .map(|x| x as f64)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use prometheus::{Encoder, TextEncoder};

    #[test]
    fn test_generate_boundaries() {
        let segments = [(2, 22, 10), (22, 26, 2), (26, 46, 20), (46, 146, 100)];
        let get = generate_boundaries(&segments);
        let expected = vec![2.0, 12.0, 22.0, 24.0, 26.0, 46.0, 146.0];

        assert_eq!(get, expected);
    }

    #[test]
    fn test_recorded_values_are_exported() {
        let metrics = Metrics::new().unwrap();
        metrics.record_request("/detect");
        metrics.record_prediction("detection", "rate_limited", 120);

        let mut buffer = Vec::new();
        TextEncoder::new()
            .encode(&metrics.registry.gather(), &mut buffer)
            .unwrap();
        let text = String::from_utf8(buffer).unwrap();

        assert!(text.contains("requests_total{route=\"/detect\"} 1"));
        assert!(text.lines().any(|line| line.starts_with("predictions_total{")
            && line.contains("outcome=\"rate_limited\"")
            && line.contains("variant=\"detection\"")
            && line.ends_with(" 1")));
        assert!(text.contains("prediction_duration_ms_count{variant=\"detection\"} 1"));
    }
}
