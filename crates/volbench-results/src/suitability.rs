//! Stream-suitability verdicts.
//!
//! A pure mapping from a normalized result plus the pattern it came from to
//! a tier and a small set of recommendations. No I/O, no clock, no
//! randomness: identical inputs always yield the identical verdict.

use serde::{Deserialize, Serialize};
use std::fmt;
use volbench_common::PatternId;

use crate::summary::ResultSummary;

/// Nominal bandwidth of one 4K ProRes 422 HQ stream, in KiB/s (~110 MiB/s).
pub const STREAM_BW_KIBPS: f64 = 112_640.0;

/// Read latency above this is flagged as a secondary concern.
const ELEVATED_LATENCY_MS: f64 = 10.0;

/// Write bandwidth below this fraction of read bandwidth is flagged.
const WRITE_READ_IMBALANCE: f64 = 0.8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuitabilityTier {
    Excellent,
    Good,
    Marginal,
    Insufficient,
}

impl fmt::Display for SuitabilityTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SuitabilityTier::Excellent => "excellent",
            SuitabilityTier::Good => "good",
            SuitabilityTier::Marginal => "marginal",
            SuitabilityTier::Insufficient => "insufficient",
        };
        write!(f, "{}", s)
    }
}

/// Domain verdict for one completed run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    pub tier: SuitabilityTier,
    pub message: String,
    pub recommendations: Vec<String>,
}

/// Aggregate read bandwidth a pattern's stream profile requires, in KiB/s.
pub fn required_read_bw_kibps(pattern: PatternId) -> f64 {
    let streams = match pattern {
        PatternId::Quick | PatternId::Stream1 => 1.0,
        PatternId::Stream4 => 4.0,
        PatternId::Stream8 => 8.0,
        PatternId::Endurance => 2.0,
    };
    streams * STREAM_BW_KIBPS
}

/// Classify a result against the pattern's bandwidth target.
///
/// Tier bands are multiplicative on the read-bandwidth ratio: 1.2x and
/// above is excellent, 1.05x good, 1.0x marginal, anything below
/// insufficient.
pub fn analyze(summary: &ResultSummary, pattern: PatternId) -> Verdict {
    let required = required_read_bw_kibps(pattern);
    let ratio = summary.sequential_read_bw_kibps / required;

    let tier = if ratio >= 1.2 {
        SuitabilityTier::Excellent
    } else if ratio >= 1.05 {
        SuitabilityTier::Good
    } else if ratio >= 1.0 {
        SuitabilityTier::Marginal
    } else {
        SuitabilityTier::Insufficient
    };

    let read_mibps = summary.sequential_read_bw_kibps / 1024.0;
    let required_mibps = required / 1024.0;
    let message = match tier {
        SuitabilityTier::Excellent => format!(
            "Sustained read of {:.0} MiB/s clears the {} target of {:.0} MiB/s with comfortable headroom",
            read_mibps, pattern, required_mibps
        ),
        SuitabilityTier::Good => format!(
            "Sustained read of {:.0} MiB/s meets the {} target of {:.0} MiB/s",
            read_mibps, pattern, required_mibps
        ),
        SuitabilityTier::Marginal => format!(
            "Sustained read of {:.0} MiB/s only just meets the {} target of {:.0} MiB/s",
            read_mibps, pattern, required_mibps
        ),
        SuitabilityTier::Insufficient => format!(
            "Sustained read of {:.0} MiB/s falls short of the {} target of {:.0} MiB/s",
            read_mibps, pattern, required_mibps
        ),
    };

    let mut recommendations = Vec::new();
    match tier {
        SuitabilityTier::Excellent => {
            recommendations
                .push("This volume is suitable for the tested stream count.".to_string());
        }
        SuitabilityTier::Good => {
            recommendations.push(
                "This volume is suitable, but avoid running other heavy I/O during playback."
                    .to_string(),
            );
        }
        SuitabilityTier::Marginal => {
            recommendations.push(
                "Headroom is minimal; expect dropped frames if anything else touches this volume."
                    .to_string(),
            );
            recommendations
                .push("Consider a lower stream count or a proxy workflow.".to_string());
        }
        SuitabilityTier::Insufficient => {
            recommendations.push(
                "This volume cannot sustain the tested stream count; use a faster volume."
                    .to_string(),
            );
            recommendations
                .push("Transcoding to a lighter codec may make playback viable.".to_string());
        }
    }

    if summary.avg_read_latency_ms > ELEVATED_LATENCY_MS {
        recommendations.push(format!(
            "Average read latency is elevated ({:.1} ms); seek-heavy editing may stutter.",
            summary.avg_read_latency_ms
        ));
    }
    if summary.sequential_read_bw_kibps > 0.0
        && summary.sequential_write_bw_kibps
            < summary.sequential_read_bw_kibps * WRITE_READ_IMBALANCE
    {
        recommendations.push(
            "Write bandwidth trails read noticeably; capture and render to this volume may underperform."
                .to_string(),
        );
    }

    Verdict {
        tier,
        message,
        recommendations,
    }
}
