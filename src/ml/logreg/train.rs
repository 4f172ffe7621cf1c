use rand::rngs::StdRng;
use rand::{Rng, SeedableRng, seq::SliceRandom};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::{CLASSIFIER_VERSION, LogisticClassifier, sigmoid};
use crate::ml::featurize::SparseFeatures;

/// Smallest probability used when accumulating training loss.
const LOSS_EPSILON: f32 = 1e-7;

/// Training options for the logistic regression classifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainOptions {
    #[serde(default = "default_epochs")]
    pub epochs: usize,
    #[serde(default = "default_learning_rate")]
    pub learning_rate: f32,
    #[serde(default = "default_l2")]
    pub l2: f32,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_seed")]
    pub seed: u64,
    /// Reweight the loss so both classes contribute equally.
    #[serde(default)]
    pub balance_classes: bool,
    /// Stop once the epoch loss improves by less than this amount.
    #[serde(default = "default_tolerance")]
    pub tolerance: f32,
}

impl Default for TrainOptions {
    fn default() -> Self {
        Self {
            epochs: default_epochs(),
            learning_rate: default_learning_rate(),
            l2: default_l2(),
            batch_size: default_batch_size(),
            seed: default_seed(),
            balance_classes: false,
            tolerance: default_tolerance(),
        }
    }
}

fn default_epochs() -> usize {
    30
}

fn default_learning_rate() -> f32 {
    0.5
}

fn default_l2() -> f32 {
    1e-5
}

fn default_batch_size() -> usize {
    64
}

fn default_seed() -> u64 {
    1
}

fn default_tolerance() -> f32 {
    1e-4
}

#[derive(Debug, Error)]
pub enum TrainError {
    #[error("Empty training set")]
    EmptyTrainingSet,
    #[error("Mismatched training inputs/labels ({inputs} rows, {labels} labels)")]
    Mismatch { inputs: usize, labels: usize },
    #[error("No features were learned from the training text")]
    NoFeatures,
    #[error("Row {row} has dimension {found} (expected {expected})")]
    DimensionMismatch {
        row: usize,
        found: usize,
        expected: usize,
    },
    #[error("Training diverged: {0}")]
    Diverged(String),
}

/// Fit a binary logistic regression with seeded mini-batch gradient descent.
pub fn train_logistic(
    x: &[SparseFeatures],
    y: &[bool],
    options: &TrainOptions,
) -> Result<LogisticClassifier, TrainError> {
    if x.is_empty() || y.is_empty() {
        return Err(TrainError::EmptyTrainingSet);
    }
    if x.len() != y.len() {
        return Err(TrainError::Mismatch {
            inputs: x.len(),
            labels: y.len(),
        });
    }
    let dim = x[0].dim();
    if dim == 0 {
        return Err(TrainError::NoFeatures);
    }
    for (row, features) in x.iter().enumerate() {
        if features.dim() != dim {
            return Err(TrainError::DimensionMismatch {
                row,
                found: features.dim(),
                expected: dim,
            });
        }
    }

    let mut rng = StdRng::seed_from_u64(options.seed);
    let mut weights = vec![0.0f32; dim];
    let mut bias = 0.0f32;
    for w in &mut weights {
        *w = (rng.random::<f32>() - 0.5) * 0.01;
    }

    let mut indices: Vec<usize> = (0..x.len()).collect();
    let batch_size = options.batch_size.max(1);
    let lr = options.learning_rate;
    let l2 = options.l2.max(0.0);
    let class_weights = class_weights(y, options.balance_classes);

    let mut grad_w = vec![0.0f32; dim];
    let mut previous_loss = f32::INFINITY;
    for epoch in 0..options.epochs {
        indices.shuffle(&mut rng);
        let mut epoch_loss = 0.0f32;
        let mut epoch_weight = 0.0f32;
        for chunk in indices.chunks(batch_size) {
            grad_w.fill(0.0);
            let mut grad_b = 0.0f32;
            let mut batch_weight = 0.0f32;
            for &idx in chunk {
                let label = y[idx];
                let weight = class_weights[usize::from(label)];
                if weight == 0.0 {
                    continue;
                }
                let features = &x[idx];
                let margin = features
                    .iter()
                    .map(|(i, v)| weights[i] * v)
                    .sum::<f32>()
                    + bias;
                let p = sigmoid(margin);
                let target = if label { 1.0 } else { 0.0 };
                let p_true = if label { p } else { 1.0 - p };
                epoch_loss -= weight * p_true.max(LOSS_EPSILON).ln();
                epoch_weight += weight;

                let diff = (p - target) * weight;
                for (i, v) in features.iter() {
                    grad_w[i] += diff * v;
                }
                grad_b += diff;
                batch_weight += weight;
            }
            if batch_weight == 0.0 {
                continue;
            }
            let inv = 1.0 / batch_weight;
            for (w, g) in weights.iter_mut().zip(&grad_w) {
                *w -= lr * (g * inv + l2 * *w);
            }
            bias -= lr * grad_b * inv;
        }

        if epoch_weight == 0.0 {
            break;
        }
        let penalty = 0.5 * l2 * weights.iter().map(|w| w * w).sum::<f32>();
        let loss = epoch_loss / epoch_weight + penalty;
        if !loss.is_finite() {
            return Err(TrainError::Diverged(format!(
                "non-finite loss at epoch {}",
                epoch + 1
            )));
        }
        tracing::debug!("epoch {}: loss {:.6}", epoch + 1, loss);
        if previous_loss - loss < options.tolerance {
            tracing::debug!("Converged after {} epochs", epoch + 1);
            break;
        }
        previous_loss = loss;
    }

    let model = LogisticClassifier {
        model_version: CLASSIFIER_VERSION,
        feature_dim: dim,
        weights,
        bias,
    };
    model.validate().map_err(TrainError::Diverged)?;
    Ok(model)
}

/// Per-class loss weights indexed by `usize::from(label)`.
fn class_weights(y: &[bool], balance: bool) -> [f32; 2] {
    if !balance {
        return [1.0, 1.0];
    }
    let positives = y.iter().filter(|&&label| label).count() as f32;
    let negatives = y.len() as f32 - positives;
    let total = y.len() as f32;
    let weight = |count: f32| {
        if count == 0.0 {
            0.0
        } else {
            total / (2.0 * count)
        }
    };
    [weight(negatives), weight(positives)]
}

#[cfg(test)]
mod tests {
    use super::*;
    use sprs::CsVec;

    /// Feature 0 fires for positives, feature 1 for negatives.
    fn separable(n: usize) -> (Vec<SparseFeatures>, Vec<bool>) {
        let mut x = Vec::new();
        let mut y = Vec::new();
        for i in 0..n {
            let label = i % 2 == 0;
            let idx = if label { 0 } else { 1 };
            x.push(CsVec::new(3, vec![idx], vec![1.0]));
            y.push(label);
        }
        (x, y)
    }

    #[test]
    fn learns_separable_data() {
        let (x, y) = separable(40);
        let options = TrainOptions {
            epochs: 200,
            ..TrainOptions::default()
        };
        let model = train_logistic(&x, &y, &options).unwrap();
        assert!(model.predict_proba(&x[0]) > 0.8);
        assert!(model.predict_proba(&x[1]) < 0.2);
        assert!(model.weights[0] > model.weights[1]);
    }

    #[test]
    fn same_seed_is_reproducible() {
        let (x, y) = separable(30);
        let options = TrainOptions {
            batch_size: 4,
            ..TrainOptions::default()
        };
        let a = train_logistic(&x, &y, &options).unwrap();
        let b = train_logistic(&x, &y, &options).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn rejects_bad_inputs() {
        let (x, y) = separable(4);
        assert!(matches!(
            train_logistic(&[], &[], &TrainOptions::default()),
            Err(TrainError::EmptyTrainingSet)
        ));
        assert!(matches!(
            train_logistic(&x, &y[..3], &TrainOptions::default()),
            Err(TrainError::Mismatch { .. })
        ));
        let mut ragged = x.clone();
        ragged.push(CsVec::new(5, vec![0], vec![1.0]));
        let mut labels = y.clone();
        labels.push(true);
        assert!(matches!(
            train_logistic(&ragged, &labels, &TrainOptions::default()),
            Err(TrainError::DimensionMismatch { row: 4, .. })
        ));
        let empty: Vec<SparseFeatures> = vec![CsVec::empty(0)];
        assert!(matches!(
            train_logistic(&empty, &[true], &TrainOptions::default()),
            Err(TrainError::NoFeatures)
        ));
    }

    #[test]
    fn balanced_weights_favor_minority_class() {
        let y = [true, false, false, false];
        let weights = class_weights(&y, true);
        assert!((weights[1] - 2.0).abs() < 1e-6);
        assert!((weights[0] - 2.0 / 3.0).abs() < 1e-6);
        assert_eq!(class_weights(&y, false), [1.0, 1.0]);
        assert_eq!(class_weights(&[true, true], true), [0.0, 1.0]);
    }

    #[test]
    fn single_class_training_pushes_bias() {
        let x = vec![CsVec::new(2, vec![0], vec![1.0]); 10];
        let y = vec![true; 10];
        let model = train_logistic(&x, &y, &TrainOptions::default()).unwrap();
        assert!(model.predict_proba(&x[0]) > 0.5);
    }
}
