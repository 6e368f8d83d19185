//! Evaluation scores and summary statistics.

use serde::{Deserialize, Serialize};

/// Summary statistics over a non-empty sample.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub mean: f64,
    /// Sample variance (N-1 denominator); 0 for a single observation.
    pub variance: f64,
    pub std: f64,
}

/// Summarise `values`; `None` for an empty slice.
pub fn summarize(values: &[f64]) -> Option<Summary> {
    if values.is_empty() {
        return None;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = if values.len() == 1 {
        0.0
    } else {
        values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0)
    };
    Some(Summary {
        mean,
        variance,
        std: variance.sqrt(),
    })
}

/// Observed metric values of one evaluation plus their statistics.
///
/// An empty score means "no result"; its statistics are all zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Score {
    pub values: Vec<f64>,
    pub mean: f64,
    pub variance: f64,
    pub std: f64,
}

impl Score {
    pub fn new(values: Vec<f64>) -> Self {
        let summary = summarize(&values).unwrap_or(Summary {
            mean: 0.0,
            variance: 0.0,
            std: 0.0,
        });
        Self {
            values,
            mean: summary.mean,
            variance: summary.variance,
            std: summary.std,
        }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl Default for Score {
    fn default() -> Self {
        Self::empty()
    }
}

impl std::fmt::Display for Score {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_empty() {
            return write!(f, "Score(empty)");
        }
        write!(
            f,
            "Score(mean={:.3}, std={:.3}, n={})",
            self.mean,
            self.std,
            self.len()
        )
    }
}
