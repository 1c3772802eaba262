//! Measurement records: latency summaries and confusion matrices.

use serde::{Deserialize, Serialize};

/// Latency summary over a set of samples, in microseconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatencyStats {
    pub count: usize,
    pub mean_us: f64,
    pub stddev_us: f64,
    pub p50_us: f64,
    pub p95_us: f64,
    pub p99_us: f64,
    pub min_us: f64,
    pub max_us: f64,
}

impl LatencyStats {
    /// Summarize a non-empty sample set. Returns `None` for no samples.
    pub fn from_samples(mut samples_us: Vec<f64>) -> Option<Self> {
        if samples_us.is_empty() {
            return None;
        }
        samples_us.sort_by(|a, b| a.total_cmp(b));

        let count = samples_us.len();
        let sum: f64 = samples_us.iter().sum();
        let mean = sum / count as f64;
        let variance =
            samples_us.iter().map(|s| (s - mean) * (s - mean)).sum::<f64>() / count as f64;

        Some(Self {
            count,
            mean_us: mean,
            stddev_us: variance.sqrt(),
            p50_us: percentile(&samples_us, 0.50),
            p95_us: percentile(&samples_us, 0.95),
            p99_us: percentile(&samples_us, 0.99),
            min_us: samples_us[0],
            max_us: samples_us[count - 1],
        })
    }
}

/// Nearest-rank percentile over a sorted sample set.
fn percentile(sorted: &[f64], q: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let rank = (q * sorted.len() as f64).ceil() as usize;
    sorted[rank.clamp(1, sorted.len()) - 1]
}

/// Binary confusion matrix for one anomaly class.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfusionMatrix {
    pub tp: usize,
    pub fp: usize,
    pub tn: usize,
    pub fn_: usize,
}

impl ConfusionMatrix {
    /// Record one (ground truth, prediction) observation.
    pub fn record(&mut self, truth: bool, predicted: bool) {
        match (truth, predicted) {
            (true, true) => self.tp += 1,
            (false, true) => self.fp += 1,
            (false, false) => self.tn += 1,
            (true, false) => self.fn_ += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.tp + self.fp + self.tn + self.fn_
    }

    /// True positive rate (recall). `None` when there are no positives.
    pub fn tpr(&self) -> Option<f64> {
        ratio(self.tp, self.tp + self.fn_)
    }

    /// True negative rate. `None` when there are no negatives.
    pub fn tnr(&self) -> Option<f64> {
        ratio(self.tn, self.tn + self.fp)
    }

    /// False positive rate.
    pub fn fpr(&self) -> Option<f64> {
        ratio(self.fp, self.fp + self.tn)
    }

    /// False negative rate.
    pub fn fnr(&self) -> Option<f64> {
        ratio(self.fn_, self.fn_ + self.tp)
    }

    /// Positive predictive value. `None` when nothing was predicted positive.
    pub fn precision(&self) -> Option<f64> {
        ratio(self.tp, self.tp + self.fp)
    }

    pub fn accuracy(&self) -> Option<f64> {
        ratio(self.tp + self.tn, self.total())
    }

    /// Harmonic mean of precision and recall.
    pub fn f1(&self) -> Option<f64> {
        let p = self.precision()?;
        let r = self.tpr()?;
        if p + r == 0.0 {
            return Some(0.0);
        }
        Some(2.0 * p * r / (p + r))
    }
}

fn ratio(numerator: usize, denominator: usize) -> Option<f64> {
    if denominator == 0 {
        None
    } else {
        Some(numerator as f64 / denominator as f64)
    }
}

/// Derived metrics of a confusion matrix, flattened for reports.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DerivedRates {
    pub tpr: Option<f64>,
    pub tnr: Option<f64>,
    pub fpr: Option<f64>,
    pub fnr: Option<f64>,
    pub precision: Option<f64>,
    pub accuracy: Option<f64>,
    pub f1: Option<f64>,
}

impl From<&ConfusionMatrix> for DerivedRates {
    fn from(m: &ConfusionMatrix) -> Self {
        Self {
            tpr: m.tpr(),
            tnr: m.tnr(),
            fpr: m.fpr(),
            fnr: m.fnr(),
            precision: m.precision(),
            accuracy: m.accuracy(),
            f1: m.f1(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_latency_stats_basic() {
        let samples: Vec<f64> = (1..=100).map(|i| i as f64).collect();
        let stats = LatencyStats::from_samples(samples).unwrap();

        assert_eq!(stats.count, 100);
        assert!((stats.mean_us - 50.5).abs() < 1e-9);
        assert_eq!(stats.p50_us, 50.0);
        assert_eq!(stats.p95_us, 95.0);
        assert_eq!(stats.p99_us, 99.0);
        assert_eq!(stats.min_us, 1.0);
        assert_eq!(stats.max_us, 100.0);
    }

    #[test]
    fn test_latency_stats_single_sample() {
        let stats = LatencyStats::from_samples(vec![42.0]).unwrap();
        assert_eq!(stats.p50_us, 42.0);
        assert_eq!(stats.p99_us, 42.0);
        assert_eq!(stats.stddev_us, 0.0);
    }

    #[test]
    fn test_latency_stats_empty() {
        assert!(LatencyStats::from_samples(Vec::new()).is_none());
    }

    #[test]
    fn test_confusion_matrix_perfect_detector() {
        let mut m = ConfusionMatrix::default();
        for _ in 0..30 {
            m.record(true, true);
        }
        for _ in 0..70 {
            m.record(false, false);
        }

        assert_eq!(m.tpr(), Some(1.0));
        assert_eq!(m.tnr(), Some(1.0));
        assert_eq!(m.fpr(), Some(0.0));
        assert_eq!(m.fnr(), Some(0.0));
        assert_eq!(m.precision(), Some(1.0));
        assert_eq!(m.accuracy(), Some(1.0));
        assert_eq!(m.f1(), Some(1.0));
    }

    #[test]
    fn test_confusion_matrix_mixed() {
        let mut m = ConfusionMatrix::default();
        m.record(true, true); // tp
        m.record(true, false); // fn
        m.record(false, true); // fp
        m.record(false, false); // tn

        assert_eq!(m.tpr(), Some(0.5));
        assert_eq!(m.precision(), Some(0.5));
        assert_eq!(m.accuracy(), Some(0.5));
        assert_eq!(m.f1(), Some(0.5));
    }

    #[test]
    fn test_confusion_matrix_no_positives() {
        let mut m = ConfusionMatrix::default();
        m.record(false, false);
        assert_eq!(m.tpr(), None);
        assert_eq!(m.tnr(), Some(1.0));
    }
}
