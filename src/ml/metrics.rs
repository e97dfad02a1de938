//! Classification metrics over string labels.
//!
//! All ratios map a zero denominator to 0.0 instead of failing.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use serde::{Deserialize, Serialize};

/// Precision, recall and F1 for one intent (one-vs-rest).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct IntentMetrics {
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub support: usize,
}

/// Summary statistics of prediction confidences.
///
/// The buckets (`> 0.8`, `(0.5, 0.8]`, `<= 0.5`) are a reporting view and
/// are independent of the routing bands in [`ConfidenceLevel`].
///
/// [`ConfidenceLevel`]: crate::ml::confidence::ConfidenceLevel
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ConfidenceDistribution {
    pub min_confidence: f64,
    pub max_confidence: f64,
    pub mean_confidence: f64,
    pub median_confidence: f64,
    pub std_confidence: f64,
    pub high_confidence_count: usize,
    pub medium_confidence_count: usize,
    pub low_confidence_count: usize,
}

fn ratio(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

fn f1(precision: f64, recall: f64) -> f64 {
    if precision + recall > 0.0 {
        2.0 * precision * recall / (precision + recall)
    } else {
        0.0
    }
}

/// Fraction of exact matches.
pub fn accuracy<T: AsRef<str>, P: AsRef<str>>(y_true: &[T], y_pred: &[P]) -> f64 {
    let correct = y_true
        .iter()
        .zip(y_pred)
        .filter(|(t, p)| t.as_ref() == p.as_ref())
        .count();
    ratio(correct, y_true.len())
}

/// One-vs-rest metrics for `intent`.
pub fn intent_metrics<T: AsRef<str>, P: AsRef<str>>(
    y_true: &[T],
    y_pred: &[P],
    intent: &str,
) -> IntentMetrics {
    let (mut tp, mut fp, mut fn_) = (0, 0, 0);
    for (t, p) in y_true.iter().zip(y_pred) {
        let actual = t.as_ref() == intent;
        let predicted = p.as_ref() == intent;
        match (actual, predicted) {
            (true, true) => tp += 1,
            (false, true) => fp += 1,
            (true, false) => fn_ += 1,
            (false, false) => {}
        }
    }
    let precision = ratio(tp, tp + fp);
    let recall = ratio(tp, tp + fn_);
    IntentMetrics {
        precision,
        recall,
        f1: f1(precision, recall),
        support: tp + fn_,
    }
}

/// Metrics for every class in `classes`.
pub fn per_intent_metrics<T: AsRef<str>, P: AsRef<str>>(
    y_true: &[T],
    y_pred: &[P],
    classes: &[String],
) -> BTreeMap<String, IntentMetrics> {
    classes
        .iter()
        .map(|c| (c.clone(), intent_metrics(y_true, y_pred, c)))
        .collect()
}

/// Labels seen in either slice, sorted.
fn observed_labels<T: AsRef<str>, P: AsRef<str>>(y_true: &[T], y_pred: &[P]) -> Vec<String> {
    let mut labels: Vec<String> = y_true
        .iter()
        .map(|t| t.as_ref().to_string())
        .chain(y_pred.iter().map(|p| p.as_ref().to_string()))
        .collect();
    labels.sort();
    labels.dedup();
    labels
}

/// Support-weighted precision, recall and F1 over the observed labels.
pub fn weighted_scores<T: AsRef<str>, P: AsRef<str>>(y_true: &[T], y_pred: &[P]) -> (f64, f64, f64) {
    let total = y_true.len();
    if total == 0 {
        return (0.0, 0.0, 0.0);
    }
    let (mut precision, mut recall, mut f1_score) = (0.0, 0.0, 0.0);
    for label in observed_labels(y_true, y_pred) {
        let m = intent_metrics(y_true, y_pred, &label);
        let weight = m.support as f64 / total as f64;
        precision += weight * m.precision;
        recall += weight * m.recall;
        f1_score += weight * m.f1;
    }
    (precision, recall, f1_score)
}

/// Counts indexed `[true class][predicted class]` in `classes` order.
///
/// Labels outside `classes` are not counted.
pub fn confusion_matrix<T: AsRef<str>, P: AsRef<str>>(
    y_true: &[T],
    y_pred: &[P],
    classes: &[String],
) -> Vec<Vec<usize>> {
    let position = |label: &str| classes.iter().position(|c| c == label);
    let mut matrix = vec![vec![0; classes.len()]; classes.len()];
    for (t, p) in y_true.iter().zip(y_pred) {
        if let (Some(i), Some(j)) = (position(t.as_ref()), position(p.as_ref())) {
            matrix[i][j] += 1;
        }
    }
    matrix
}

/// Statistics over `confidences`; all zeros when empty.
pub fn confidence_distribution(confidences: &[f64]) -> ConfidenceDistribution {
    if confidences.is_empty() {
        return ConfidenceDistribution::default();
    }
    let n = confidences.len() as f64;
    let mut sorted = confidences.to_vec();
    sorted.sort_by(f64::total_cmp);

    let mean = confidences.iter().sum::<f64>() / n;
    let variance = confidences.iter().map(|c| (c - mean).powi(2)).sum::<f64>() / n;
    let mid = sorted.len() / 2;
    let median = if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    };

    ConfidenceDistribution {
        min_confidence: sorted[0],
        max_confidence: sorted[sorted.len() - 1],
        mean_confidence: mean,
        median_confidence: median,
        std_confidence: variance.sqrt(),
        high_confidence_count: confidences.iter().filter(|c| **c > 0.8).count(),
        medium_confidence_count: confidences
            .iter()
            .filter(|c| **c > 0.5 && **c <= 0.8)
            .count(),
        low_confidence_count: confidences.iter().filter(|c| **c <= 0.5).count(),
    }
}

/// Plain-text per-class report with accuracy, macro and weighted averages.
pub fn classification_report<T: AsRef<str>, P: AsRef<str>>(
    y_true: &[T],
    y_pred: &[P],
    classes: &[String],
) -> String {
    let width = classes
        .iter()
        .map(|c| c.len())
        .chain(std::iter::once("weighted avg".len()))
        .max()
        .unwrap_or(0);

    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:>width$} {:>9} {:>9} {:>9} {:>9}\n",
        "", "precision", "recall", "f1-score", "support"
    );

    let rows = per_intent_metrics(y_true, y_pred, classes);
    for class in classes {
        let m = rows.get(class).copied().unwrap_or_default();
        let _ = writeln!(
            out,
            "{:>width$} {:>9.2} {:>9.2} {:>9.2} {:>9}",
            class, m.precision, m.recall, m.f1, m.support
        );
    }
    out.push('\n');

    let total: usize = rows.values().map(|m| m.support).sum();
    let _ = writeln!(
        out,
        "{:>width$} {:>9} {:>9} {:>9.2} {:>9}",
        "accuracy",
        "",
        "",
        accuracy(y_true, y_pred),
        total
    );

    let k = rows.len().max(1) as f64;
    let macro_p = rows.values().map(|m| m.precision).sum::<f64>() / k;
    let macro_r = rows.values().map(|m| m.recall).sum::<f64>() / k;
    let macro_f = rows.values().map(|m| m.f1).sum::<f64>() / k;
    let _ = writeln!(
        out,
        "{:>width$} {:>9.2} {:>9.2} {:>9.2} {:>9}",
        "macro avg", macro_p, macro_r, macro_f, total
    );

    let weight = |f: fn(&IntentMetrics) -> f64| {
        rows.values()
            .map(|m| f(m) * ratio(m.support, total))
            .sum::<f64>()
    };
    let _ = writeln!(
        out,
        "{:>width$} {:>9.2} {:>9.2} {:>9.2} {:>9}",
        "weighted avg",
        weight(|m| m.precision),
        weight(|m| m.recall),
        weight(|m| m.f1),
        total
    );
    out
}
