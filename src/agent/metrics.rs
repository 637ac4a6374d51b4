use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Mutex;
use std::time::Duration;

/// Outcome of one `query` call.
#[derive(Debug, Clone, Default)]
pub struct QueryMetrics {
    pub action_identified: bool,
    pub tool_succeeded: bool,
    pub response_time: Duration,
    pub error_type: Option<String>,
}

#[derive(Debug, Default)]
struct Totals {
    queries: u64,
    action_identified: u64,
    tool_succeeded: u64,
    response_time: Duration,
    errors: u64,
    error_types: BTreeMap<String, u64>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AggregateMetrics {
    pub total_queries: u64,
    pub action_identification_rate: f64,
    pub tool_success_rate: f64,
    pub average_response_time_ms: f64,
    pub error_rate: f64,
    pub error_types: BTreeMap<String, u64>,
}

#[derive(Debug, Default)]
pub struct AgentMetrics {
    totals: Mutex<Totals>,
}

impl AgentMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, m: &QueryMetrics) {
        let Ok(mut t) = self.totals.lock() else {
            return;
        };
        t.queries += 1;
        t.action_identified += u64::from(m.action_identified);
        t.tool_succeeded += u64::from(m.tool_succeeded);
        t.response_time += m.response_time;
        if let Some(kind) = &m.error_type {
            t.errors += 1;
            *t.error_types.entry(kind.clone()).or_insert(0) += 1;
        }
    }

    /// Rates over every recorded query; `None` before the first one.
    pub fn aggregate(&self) -> Option<AggregateMetrics> {
        let t = self.totals.lock().ok()?;
        if t.queries == 0 {
            return None;
        }
        let n = t.queries as f64;
        Some(AggregateMetrics {
            total_queries: t.queries,
            action_identification_rate: t.action_identified as f64 / n,
            tool_success_rate: t.tool_succeeded as f64 / n,
            average_response_time_ms: t.response_time.as_secs_f64() * 1000.0 / n,
            error_rate: t.errors as f64 / n,
            error_types: t.error_types.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_metrics_have_no_aggregate() {
        assert!(AgentMetrics::new().aggregate().is_none());
    }

    #[test]
    fn test_rates() {
        let metrics = AgentMetrics::new();
        metrics.record(&QueryMetrics {
            action_identified: true,
            tool_succeeded: true,
            response_time: Duration::from_millis(300),
            error_type: None,
        });
        metrics.record(&QueryMetrics {
            action_identified: false,
            tool_succeeded: false,
            response_time: Duration::from_millis(100),
            error_type: Some("timeout".to_string()),
        });

        let agg = metrics.aggregate().unwrap();
        assert_eq!(agg.total_queries, 2);
        assert_eq!(agg.action_identification_rate, 0.5);
        assert_eq!(agg.error_rate, 0.5);
        assert!((agg.average_response_time_ms - 200.0).abs() < 1e-9);
        assert_eq!(agg.error_types.get("timeout"), Some(&1));
    }
}
