//! Autotest result reports: metric extraction and the stored-report store.

use crate::error::ReportError;
use regex::Regex;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::debug;

/// File name autotest writes its chart data to.
pub const RESULT_FILENAME: &str = "results-chart.json";

/// Split a metric path into keys.
///
/// Paths containing `/` are split on `/` only, so keys may contain dots;
/// otherwise the path is split on `.`.
pub fn metric_keys(metric: &str) -> Vec<&str> {
    let sep = if metric.contains('/') { '/' } else { '.' };
    metric.split(sep).filter(|k| !k.is_empty()).collect()
}

/// Walk `metric` inside `chart` and return its value.
///
/// With `take_average`, the value must be a list of numbers and its
/// arithmetic mean is returned.
pub fn metric_value(chart: &Value, metric: &str, take_average: bool) -> Result<f64, ReportError> {
    let mut node = chart;
    for key in metric_keys(metric) {
        let next = match node {
            Value::Object(map) => map.get(key),
            Value::Array(items) => key.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None,
        };
        node = next.ok_or_else(|| ReportError::MissingKey {
            metric: metric.to_string(),
            key: key.to_string(),
        })?;
    }

    let not_numeric = |value: &Value| ReportError::NotNumeric {
        metric: metric.to_string(),
        value: value.clone(),
    };

    if take_average {
        let items = node.as_array().ok_or_else(|| not_numeric(node))?;
        if items.is_empty() {
            return Err(ReportError::EmptyList {
                metric: metric.to_string(),
            });
        }
        let mut sum = 0.0;
        for item in items {
            sum += item.as_f64().ok_or_else(|| not_numeric(item))?;
        }
        Ok(sum / items.len() as f64)
    } else {
        node.as_f64().ok_or_else(|| not_numeric(node))
    }
}

/// Read a report file and extract `metric` from it.
pub fn read_metric(path: &Path, metric: &str, take_average: bool) -> Result<f64, ReportError> {
    let content = std::fs::read_to_string(path).map_err(|source| ReportError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let chart: Value = serde_json::from_str(&content).map_err(|source| ReportError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    let value = metric_value(&chart, metric, take_average)?;
    debug!(report = %path.display(), metric, value, "extracted metric");
    Ok(value)
}

/// A report kept in the report store, named
/// `results-chart.<label>.<index>-<repeat>.json`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredReport {
    pub label: String,
    /// 1-based run index within its evaluation.
    pub index: usize,
    /// Total runs of that evaluation.
    pub repeat: usize,
    pub path: PathBuf,
}

fn stored_report_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^results-chart\.(?P<label>.+)\.(?P<index>\d+)-(?P<repeat>\d+)\.json$")
            .expect("stored report pattern is valid")
    })
}

impl StoredReport {
    pub fn file_name(label: &str, index: usize, repeat: usize) -> String {
        format!("results-chart.{label}.{index}-{repeat}.json")
    }

    pub fn path_in(dir: &Path, label: &str, index: usize, repeat: usize) -> PathBuf {
        dir.join(Self::file_name(label, index, repeat))
    }

    /// Parse a stored report from its path; `None` if the name doesn't fit.
    pub fn parse(path: &Path) -> Option<Self> {
        let name = path.file_name()?.to_str()?;
        let caps = stored_report_pattern().captures(name)?;
        Some(Self {
            label: caps["label"].to_string(),
            index: caps["index"].parse().ok()?,
            repeat: caps["repeat"].parse().ok()?,
            path: path.to_path_buf(),
        })
    }
}

/// List stored reports in `dir`, sorted by (label, repeat, index).
///
/// A missing directory holds no reports.
pub fn scan_reports(dir: &Path) -> std::io::Result<Vec<StoredReport>> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e),
    };

    let mut reports = Vec::new();
    for entry in entries {
        let path = entry?.path();
        if path.is_file() {
            if let Some(report) = StoredReport::parse(&path) {
                reports.push(report);
            }
        }
    }
    reports.sort_by(|a, b| {
        (a.label.as_str(), a.repeat, a.index).cmp(&(b.label.as_str(), b.repeat, b.index))
    });
    Ok(reports)
}
