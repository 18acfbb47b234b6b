//! Parser for fio's JSON output.
//!
//! fio interleaves progress text with its result document when both go to
//! the same stream, and the document's field set has drifted across
//! releases. The parser therefore:
//!
//! - locates the result object inside arbitrary surrounding noise,
//! - tolerates several generations of field names per metric, and
//! - degrades missing metrics to zero instead of failing the run.
//!
//! Only an input with no parsable JSON object at all is a hard error.

use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::summary::ResultSummary;

#[derive(Debug, Error, PartialEq)]
pub enum ParseError {
    #[error("no JSON result object found in fio output")]
    NoJsonObject,
}

/// Parse raw fio output (possibly mixed with log noise) into a summary.
pub fn parse(raw: &str) -> Result<ResultSummary, ParseError> {
    let doc = extract_json_object(raw).ok_or(ParseError::NoJsonObject)?;
    Ok(summarize(&doc))
}

/// Locate and parse the outermost balanced JSON object in `raw`.
///
/// Fast path: the trimmed input is the document. Otherwise candidate
/// opening braces are tried from the last plausible one backwards, since
/// progress noise normally precedes the document. A "plausible" brace is
/// one that starts a line; if none of those yield a document, every brace
/// is tried.
fn extract_json_object(raw: &str) -> Option<Value> {
    let trimmed = raw.trim();
    if trimmed.starts_with('{') {
        if let Ok(v) = serde_json::from_str::<Value>(trimmed) {
            if v.is_object() {
                return Some(v);
            }
        }
    }

    let line_start_braces = brace_candidates(raw, true);
    if let Some(v) = try_candidates(raw, &line_start_braces) {
        return Some(v);
    }
    let all_braces = brace_candidates(raw, false);
    try_candidates(raw, &all_braces)
}

fn try_candidates(raw: &str, candidates: &[usize]) -> Option<Value> {
    for &start in candidates.iter().rev() {
        if let Some(end) = balanced_end(raw, start) {
            if let Ok(v) = serde_json::from_str::<Value>(&raw[start..=end]) {
                if v.is_object() {
                    debug!(offset = start, "recovered JSON object from mixed output");
                    return Some(v);
                }
            }
        }
    }
    None
}

/// Byte offsets of opening braces. With `line_start_only`, restricts to
/// braces preceded only by whitespace on their line.
fn brace_candidates(raw: &str, line_start_only: bool) -> Vec<usize> {
    let bytes = raw.as_bytes();
    let mut candidates = Vec::new();
    let mut line_has_content = false;
    for (i, &b) in bytes.iter().enumerate() {
        match b {
            b'\n' => line_has_content = false,
            b'{' => {
                if !line_start_only || !line_has_content {
                    candidates.push(i);
                }
                line_has_content = true;
            }
            b' ' | b'\t' | b'\r' => {}
            _ => line_has_content = true,
        }
    }
    candidates
}

/// Offset of the brace closing the object opened at `start`, honoring
/// string literals and escapes. `None` if the object never closes.
fn balanced_end(raw: &str, start: usize) -> Option<usize> {
    let bytes = raw.as_bytes();
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (i, &b) in bytes.iter().enumerate().skip(start) {
        if in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
            }
            continue;
        }
        match b {
            b'"' => in_string = true,
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

/// Aggregate the per-job sections of a fio document.
///
/// Bandwidth and IOPS sum across jobs; latency is a simple mean over the
/// jobs that reported it; runtime takes the maximum. A job missing a
/// metric contributes zero to that metric only.
fn summarize(doc: &Value) -> ResultSummary {
    let mut summary = ResultSummary::default();
    let jobs = match doc.get("jobs").and_then(Value::as_array) {
        Some(jobs) => jobs,
        None => return summary,
    };

    let mut read_latencies = Vec::new();
    let mut write_latencies = Vec::new();
    let mut min_bw = f64::INFINITY;
    let mut max_bw: f64 = 0.0;

    for job in jobs {
        let read = job.get("read");
        let write = job.get("write");

        let read_bw = section_bw_kibps(read);
        let write_bw = section_bw_kibps(write);

        summary.sequential_read_bw_kibps += read_bw.unwrap_or(0.0);
        summary.sequential_write_bw_kibps += write_bw.unwrap_or(0.0);
        summary.read_iops += section_iops(read).unwrap_or(0.0);
        summary.write_iops += section_iops(write).unwrap_or(0.0);

        if let Some(lat) = section_latency_ms(read) {
            read_latencies.push(lat);
        }
        if let Some(lat) = section_latency_ms(write) {
            write_latencies.push(lat);
        }

        // Per-job combined bandwidth feeds the spread figures. Jobs that
        // reported no bandwidth at all are excluded so they cannot drag
        // the minimum to zero.
        if read_bw.is_some() || write_bw.is_some() {
            let total = read_bw.unwrap_or(0.0) + write_bw.unwrap_or(0.0);
            min_bw = min_bw.min(total);
            max_bw = max_bw.max(total);
        }

        summary.runtime_seconds = summary.runtime_seconds.max(job_runtime_seconds(job));
    }

    if min_bw.is_finite() {
        summary.min_bw_kibps = min_bw;
        summary.max_bw_kibps = max_bw;
    }
    summary.avg_read_latency_ms = mean(&read_latencies);
    summary.avg_write_latency_ms = mean(&write_latencies);
    summary
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

/// Bandwidth in KiB/s. Newer fio reports `bw` directly in KiB/s; older
/// documents only carry `bw_bytes`.
fn section_bw_kibps(section: Option<&Value>) -> Option<f64> {
    let section = section?;
    if let Some(bw) = section.get("bw").and_then(Value::as_f64) {
        return Some(bw.max(0.0));
    }
    section
        .get("bw_bytes")
        .and_then(Value::as_f64)
        .map(|bytes| (bytes / 1024.0).max(0.0))
}

/// IOPS, preferring the direct figure over the windowed mean.
fn section_iops(section: Option<&Value>) -> Option<f64> {
    let section = section?;
    section
        .get("iops")
        .and_then(Value::as_f64)
        .or_else(|| section.get("iops_mean").and_then(Value::as_f64))
        .map(|iops| iops.max(0.0))
}

/// Mean latency in milliseconds. fio reports nanoseconds under `lat_ns`,
/// or only `clat_ns` in some versions. Absent either, the job simply does
/// not contribute a latency sample.
fn section_latency_ms(section: Option<&Value>) -> Option<f64> {
    let section = section?;
    let nanos = section
        .get("lat_ns")
        .and_then(|l| l.get("mean"))
        .and_then(Value::as_f64)
        .or_else(|| {
            section
                .get("clat_ns")
                .and_then(|l| l.get("mean"))
                .and_then(Value::as_f64)
        })?;
    Some((nanos / 1_000_000.0).max(0.0))
}

/// Job runtime in seconds: the maximum of the per-direction runtimes and
/// the job-level figure, all reported in milliseconds.
fn job_runtime_seconds(job: &Value) -> f64 {
    let candidates = [
        job.get("job_runtime").and_then(Value::as_f64),
        job.get("read")
            .and_then(|s| s.get("runtime"))
            .and_then(Value::as_f64),
        job.get("write")
            .and_then(|s| s.get("runtime"))
            .and_then(Value::as_f64),
    ];
    candidates
        .iter()
        .flatten()
        .fold(0.0f64, |acc, &ms| acc.max(ms))
        / 1000.0
}
