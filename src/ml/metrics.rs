//! Evaluation metrics for the binary toxicity classifier.

use std::fmt;

use crate::dataset::Dataset;

use super::model::ToxicityModel;

/// Probabilities are clipped to `[EPS, 1 - EPS]` before taking logs.
const LOG_LOSS_EPSILON: f64 = 1e-15;

#[derive(Debug, Clone, PartialEq, Eq)]
/// Confusion matrix for a `K`-class classifier.
pub struct ConfusionMatrix {
    /// Number of classes.
    pub n_classes: usize,
    /// Row-major `KxK` counts (`truth * K + predicted`).
    pub counts: Vec<u32>,
}

impl ConfusionMatrix {
    /// Create an empty `KxK` confusion matrix.
    pub fn new(n_classes: usize) -> Self {
        Self {
            n_classes,
            counts: vec![0; n_classes * n_classes],
        }
    }

    pub fn add(&mut self, truth: usize, predicted: usize) {
        if truth >= self.n_classes || predicted >= self.n_classes {
            return;
        }
        let idx = truth * self.n_classes + predicted;
        self.counts[idx] = self.counts[idx].saturating_add(1);
    }

    pub fn get(&self, truth: usize, predicted: usize) -> u32 {
        self.counts[truth * self.n_classes + predicted]
    }

    pub fn total(&self) -> u64 {
        self.counts.iter().map(|&v| v as u64).sum()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
/// Precision/recall statistics for a single class.
pub struct PerClassStats {
    /// `TP / (TP + FP)`.
    pub precision: f64,
    /// `TP / (TP + FN)`.
    pub recall: f64,
    /// Total number of true examples for the class.
    pub support: u32,
}

/// Compute per-class precision and recall from a confusion matrix.
pub fn precision_recall_by_class(cm: &ConfusionMatrix) -> Vec<PerClassStats> {
    (0..cm.n_classes)
        .map(|class_idx| {
            let tp = cm.get(class_idx, class_idx) as f64;
            let mut fp = 0f64;
            let mut fn_ = 0f64;
            let mut support = 0u32;
            for other in 0..cm.n_classes {
                support = support.saturating_add(cm.get(class_idx, other));
                if other != class_idx {
                    fn_ += cm.get(class_idx, other) as f64;
                    fp += cm.get(other, class_idx) as f64;
                }
            }
            PerClassStats {
                precision: ratio(tp, tp + fp),
                recall: ratio(tp, tp + fn_),
                support,
            }
        })
        .collect()
}

/// Compute overall accuracy from a confusion matrix.
pub fn accuracy(cm: &ConfusionMatrix) -> f64 {
    let correct: u64 = (0..cm.n_classes).map(|c| cm.get(c, c) as u64).sum();
    ratio(correct as f64, cm.total() as f64)
}

/// Scalar scores for a binary classifier on a labeled set.
#[derive(Debug, Clone, PartialEq)]
pub struct BinaryMetrics {
    pub accuracy: f64,
    /// `NaN` when the set contains a single class.
    pub area_under_roc_curve: f64,
    /// Average precision; `NaN` when the set has no positives.
    pub area_under_precision_recall_curve: f64,
    pub f1_score: f64,
    /// Mean negative log2-likelihood of the true label.
    pub log_loss: f64,
    /// Relative improvement of `log_loss` over the label prior's entropy.
    pub log_loss_reduction: f64,
    pub positive_precision: f64,
    pub positive_recall: f64,
    pub negative_precision: f64,
    pub negative_recall: f64,
    /// Class 0 = non-toxic, class 1 = toxic.
    pub confusion: ConfusionMatrix,
    pub rows: usize,
}

impl BinaryMetrics {
    /// Compute metrics from `(probability, label)` pairs.
    pub fn from_scores(scored: &[(f32, bool)], threshold: f32) -> Self {
        let mut confusion = ConfusionMatrix::new(2);
        let mut log_loss = 0f64;
        for &(probability, label) in scored {
            let predicted = probability > threshold;
            confusion.add(usize::from(label), usize::from(predicted));
            let p = (probability as f64).clamp(LOG_LOSS_EPSILON, 1.0 - LOG_LOSS_EPSILON);
            let p_true = if label { p } else { 1.0 - p };
            log_loss -= p_true.log2();
        }
        let rows = scored.len();
        let log_loss = ratio(log_loss, rows as f64);

        let positives = scored.iter().filter(|(_, label)| *label).count();
        let prior_entropy = binary_entropy(ratio(positives as f64, rows as f64));
        let log_loss_reduction = if prior_entropy > 0.0 {
            (prior_entropy - log_loss) / prior_entropy
        } else {
            0.0
        };

        let per_class = precision_recall_by_class(&confusion);
        let negative = per_class[0];
        let positive = per_class[1];
        let f1_score = f1(positive.precision, positive.recall);
        let (area_under_roc_curve, area_under_precision_recall_curve) = ranking_areas(scored);

        Self {
            accuracy: accuracy(&confusion),
            area_under_roc_curve,
            area_under_precision_recall_curve,
            f1_score,
            log_loss,
            log_loss_reduction,
            positive_precision: positive.precision,
            positive_recall: positive.recall,
            negative_precision: negative.precision,
            negative_recall: negative.recall,
            confusion,
            rows,
        }
    }

    /// Multi-line report block headed by `name`.
    pub fn report(&self, name: &str) -> String {
        format!(
            "************************************************************\n\
             *       Metrics for {name} binary classification model\n\
             *-----------------------------------------------------------\n\
             {}\
             ************************************************************",
            self
        )
    }
}

impl fmt::Display for BinaryMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "*       Rows evaluated:  {}", self.rows)?;
        writeln!(f, "*       Accuracy:  {:.2}%", self.accuracy * 100.0)?;
        writeln!(
            f,
            "*       Area Under Curve:  {:.2}%",
            self.area_under_roc_curve * 100.0
        )?;
        writeln!(
            f,
            "*       Area under Precision recall Curve:  {:.2}%",
            self.area_under_precision_recall_curve * 100.0
        )?;
        writeln!(f, "*       F1Score:  {:.2}%", self.f1_score * 100.0)?;
        writeln!(f, "*       LogLoss:  {:.2}", self.log_loss)?;
        writeln!(f, "*       LogLossReduction:  {:.2}", self.log_loss_reduction)?;
        writeln!(f, "*       PositivePrecision:  {:.2}", self.positive_precision)?;
        writeln!(f, "*       PositiveRecall:  {:.2}", self.positive_recall)?;
        writeln!(f, "*       NegativePrecision:  {:.2}", self.negative_precision)?;
        writeln!(f, "*       NegativeRecall:  {:.2}%", self.negative_recall * 100.0)?;
        writeln!(f, "*       Confusion (rows=true, cols=pred):")?;
        for truth in 0..self.confusion.n_classes {
            let mut row = String::from("*     ");
            for pred in 0..self.confusion.n_classes {
                row.push_str(&format!("{:8}", self.confusion.get(truth, pred)));
            }
            writeln!(f, "{row}")?;
        }
        Ok(())
    }
}

/// Score every row of `dataset` with `model` and compute metrics.
pub fn evaluate(model: &ToxicityModel, dataset: &Dataset) -> BinaryMetrics {
    let scored: Vec<(f32, bool)> = dataset
        .examples()
        .iter()
        .map(|example| (model.probability(&example.text), example.label))
        .collect();
    BinaryMetrics::from_scores(&scored, model.threshold)
}

/// Harmonic mean of precision and recall.
pub fn f1(precision: f64, recall: f64) -> f64 {
    if precision + recall == 0.0 {
        0.0
    } else {
        2.0 * precision * recall / (precision + recall)
    }
}

/// Entropy in bits of a Bernoulli variable with success rate `p`.
fn binary_entropy(p: f64) -> f64 {
    if p <= 0.0 || p >= 1.0 {
        return 0.0;
    }
    -(p * p.log2() + (1.0 - p) * (1.0 - p).log2())
}

fn ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator == 0.0 {
        0.0
    } else {
        numerator / denominator
    }
}

/// AUC-ROC (trapezoidal) and average precision, sweeping thresholds from the
/// highest probability down. Rows with equal probability move together.
fn ranking_areas(scored: &[(f32, bool)]) -> (f64, f64) {
    let positives = scored.iter().filter(|(_, label)| *label).count() as f64;
    let negatives = scored.len() as f64 - positives;

    let mut sorted: Vec<(f32, bool)> = scored.to_vec();
    sorted.sort_by(|a, b| b.0.total_cmp(&a.0));

    let mut tp = 0f64;
    let mut fp = 0f64;
    let mut roc = 0f64;
    let mut average_precision = 0f64;
    let (mut prev_tpr, mut prev_fpr) = (0f64, 0f64);

    let mut idx = 0usize;
    while idx < sorted.len() {
        let threshold = sorted[idx].0;
        while idx < sorted.len() && sorted[idx].0 == threshold {
            if sorted[idx].1 {
                tp += 1.0;
            } else {
                fp += 1.0;
            }
            idx += 1;
        }
        let tpr = ratio(tp, positives);
        let fpr = ratio(fp, negatives);
        roc += (fpr - prev_fpr) * (tpr + prev_tpr) / 2.0;
        average_precision += (tpr - prev_tpr) * ratio(tp, tp + fp);
        prev_tpr = tpr;
        prev_fpr = fpr;
    }

    let roc = if positives == 0.0 || negatives == 0.0 {
        f64::NAN
    } else {
        roc
    };
    let average_precision = if positives == 0.0 {
        f64::NAN
    } else {
        average_precision
    };
    (roc, average_precision)
}
