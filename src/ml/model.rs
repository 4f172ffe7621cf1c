//! Fitted toxicity model: text featurizer chained with a logistic classifier.

use super::featurize::{FeatureOptions, TextFeaturizer};
use super::logreg::{LogisticClassifier, TrainError, TrainOptions, sigmoid, train_logistic};
use crate::dataset::Dataset;

/// Default probability cut-off for the toxic label.
pub const DEFAULT_THRESHOLD: f32 = 0.5;

/// Outcome of classifying one text.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Prediction {
    /// `true` when the text is classified as toxic.
    pub label: bool,
    /// Probability of the toxic class in `[0, 1]`.
    pub probability: f32,
    /// Raw linear margin before the logistic link.
    pub score: f32,
}

/// Featurizer and classifier trained together; read-only once built.
#[derive(Debug, Clone, PartialEq)]
pub struct ToxicityModel {
    pub featurizer: TextFeaturizer,
    pub classifier: LogisticClassifier,
    /// Probabilities strictly above this value are labeled toxic.
    pub threshold: f32,
}

impl ToxicityModel {
    /// Fit the featurizer on the training text, then the classifier on its output.
    pub fn fit(
        train: &Dataset,
        features: &FeatureOptions,
        training: &TrainOptions,
        threshold: f32,
    ) -> Result<Self, TrainError> {
        if train.is_empty() {
            return Err(TrainError::EmptyTrainingSet);
        }
        let featurizer = TextFeaturizer::fit(train.texts(), features);
        if featurizer.dimension() == 0 {
            return Err(TrainError::NoFeatures);
        }
        let x: Vec<_> = train.texts().map(|text| featurizer.transform(text)).collect();
        let y: Vec<bool> = train.examples().iter().map(|example| example.label).collect();
        let classifier = train_logistic(&x, &y, training)?;
        tracing::info!(
            "Trained logistic classifier on {} rows with {} features",
            train.len(),
            featurizer.dimension()
        );
        Ok(Self {
            featurizer,
            classifier,
            threshold,
        })
    }

    /// Check that featurizer and classifier agree on the feature space.
    pub fn validate(&self) -> Result<(), String> {
        self.featurizer.validate()?;
        self.classifier.validate()?;
        if self.featurizer.dimension() != self.classifier.feature_dim {
            return Err(format!(
                "featurizer dimension {} does not match classifier dimension {}",
                self.featurizer.dimension(),
                self.classifier.feature_dim
            ));
        }
        if !(0.0..=1.0).contains(&self.threshold) {
            return Err(format!("threshold {} is outside [0, 1]", self.threshold));
        }
        Ok(())
    }

    /// Probability that `text` is toxic.
    pub fn probability(&self, text: &str) -> f32 {
        self.classifier.predict_proba(&self.featurizer.transform(text))
    }

    /// Classify one text.
    pub fn predict(&self, text: &str) -> Prediction {
        let features = self.featurizer.transform(text);
        let score = self.classifier.score(&features);
        let probability = sigmoid(score);
        Prediction {
            label: probability > self.threshold,
            probability,
            score,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::Example;

    fn toy_dataset() -> Dataset {
        let mut rows = Vec::new();
        for _ in 0..20 {
            rows.push(Example::new(false, "This is great"));
            rows.push(Example::new(true, "You are an idiot"));
        }
        Dataset::new(rows)
    }

    #[test]
    fn separates_toy_sentences() {
        let model = ToxicityModel::fit(
            &toy_dataset(),
            &FeatureOptions::default(),
            &TrainOptions::default(),
            DEFAULT_THRESHOLD,
        )
        .unwrap();
        model.validate().unwrap();

        let toxic = model.predict("You are an idiot");
        assert!(toxic.label);
        assert!(toxic.probability > 0.5);

        let clean = model.predict("This is great");
        assert!(!clean.label);
        assert!(clean.probability < 0.5);
    }

    #[test]
    fn empty_text_still_predicts() {
        let model = ToxicityModel::fit(
            &toy_dataset(),
            &FeatureOptions::default(),
            &TrainOptions::default(),
            DEFAULT_THRESHOLD,
        )
        .unwrap();
        let prediction = model.predict("");
        assert!((0.0..=1.0).contains(&prediction.probability));
        assert_eq!(prediction.probability, model.probability(""));
    }

    #[test]
    fn threshold_controls_label() {
        let mut model = ToxicityModel::fit(
            &toy_dataset(),
            &FeatureOptions::default(),
            &TrainOptions::default(),
            DEFAULT_THRESHOLD,
        )
        .unwrap();
        let probability = model.probability("You are an idiot");
        model.threshold = probability;
        assert!(!model.predict("You are an idiot").label);
    }

    #[test]
    fn rejects_text_without_terms() {
        let dataset = Dataset::new(vec![Example::new(true, "!!!"), Example::new(false, "")]);
        assert!(matches!(
            ToxicityModel::fit(
                &dataset,
                &FeatureOptions::default(),
                &TrainOptions::default(),
                DEFAULT_THRESHOLD
            ),
            Err(TrainError::NoFeatures)
        ));
    }
}
