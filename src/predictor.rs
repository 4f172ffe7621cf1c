//! Single-example inference over a loaded model.

use std::path::Path;

use crate::dataset::RecordSchema;
use crate::ml::{ArchiveError, Prediction, ToxicityModel, load_model};

/// Read-only prediction engine; shareable across threads.
#[derive(Debug, Clone)]
pub struct Predictor {
    model: ToxicityModel,
}

impl Predictor {
    pub fn new(model: ToxicityModel) -> Self {
        Self { model }
    }

    /// Load a model archive and wrap it in a predictor.
    pub fn from_archive(path: &Path) -> Result<(Self, RecordSchema), ArchiveError> {
        let (model, schema) = load_model(path)?;
        Ok((Self::new(model), schema))
    }

    /// Replace the decision threshold stored with the model.
    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.model.threshold = threshold;
        self
    }

    pub fn model(&self) -> &ToxicityModel {
        &self.model
    }

    /// Classify one text. Any string is accepted, including an empty one.
    pub fn predict(&self, text: &str) -> Prediction {
        self.model.predict(text)
    }

    pub fn predict_batch(&self, texts: &[&str]) -> Vec<Prediction> {
        texts.iter().map(|text| self.predict(text)).collect()
    }
}
