//! Binary logistic regression over sparse text features.

use serde::{Deserialize, Serialize};

use super::featurize::SparseFeatures;

mod train;
pub use train::{TrainError, TrainOptions, train_logistic};

/// Current on-disk version of [`LogisticClassifier`].
pub const CLASSIFIER_VERSION: i64 = 1;

/// Linear classifier mapping a feature vector to P(toxic).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogisticClassifier {
    pub model_version: i64,
    pub feature_dim: usize,
    pub weights: Vec<f32>,
    pub bias: f32,
}

impl LogisticClassifier {
    /// Validate the model dimensions and parameter values.
    pub fn validate(&self) -> Result<(), String> {
        if self.model_version != CLASSIFIER_VERSION {
            return Err(format!(
                "Unsupported classifier version {} (expected {})",
                self.model_version, CLASSIFIER_VERSION
            ));
        }
        if self.weights.len() != self.feature_dim {
            return Err(format!(
                "weights length {} does not match feature_dim {}",
                self.weights.len(),
                self.feature_dim
            ));
        }
        if !self.bias.is_finite() || self.weights.iter().any(|w| !w.is_finite()) {
            return Err("classifier parameters must be finite".to_string());
        }
        Ok(())
    }

    /// Raw linear margin `w·x + b`. Indices beyond `feature_dim` are ignored.
    pub fn score(&self, features: &SparseFeatures) -> f32 {
        features
            .iter()
            .filter_map(|(idx, value)| self.weights.get(idx).map(|w| w * value))
            .sum::<f32>()
            + self.bias
    }

    /// Probability of the positive (toxic) class.
    pub fn predict_proba(&self, features: &SparseFeatures) -> f32 {
        sigmoid(self.score(features))
    }
}

/// Numerically stable logistic function.
pub fn sigmoid(z: f32) -> f32 {
    if z >= 0.0 {
        1.0 / (1.0 + (-z).exp())
    } else {
        let e = z.exp();
        e / (1.0 + e)
    }
}
