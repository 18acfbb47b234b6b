//! Normalized benchmark result record.

use serde::{Deserialize, Serialize};

/// Normalized summary of one benchmark run.
///
/// Every field is non-negative. Metrics the source document did not report
/// come through as `0`, never as null and never as an error.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultSummary {
    pub sequential_read_bw_kibps: f64,
    pub sequential_write_bw_kibps: f64,
    pub read_iops: f64,
    pub write_iops: f64,
    pub avg_read_latency_ms: f64,
    pub avg_write_latency_ms: f64,
    pub min_bw_kibps: f64,
    pub max_bw_kibps: f64,
    pub runtime_seconds: f64,
}

impl ResultSummary {
    /// Combined read and write bandwidth.
    pub fn total_bw_kibps(&self) -> f64 {
        self.sequential_read_bw_kibps + self.sequential_write_bw_kibps
    }
}
