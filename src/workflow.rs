//! End-to-end runs: train/evaluate/save, reload, and scoring a saved archive.

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::config::{ConfigError, DetoxConfig};
use crate::dataset::{
    Dataset, DatasetError, LabelLiterals, RecordSchema, load_tsv, train_test_split,
};
use crate::ml::{ArchiveError, BinaryMetrics, ToxicityModel, TrainError, evaluate, save_model};
use crate::predictor::Predictor;

/// Name shown in the metrics report header.
pub const MODEL_DISPLAY_NAME: &str = "TF-IDF LogisticRegression";

#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Dataset(#[from] DatasetError),
    #[error("Training failed: {0}")]
    Train(#[from] TrainError),
    #[error(transparent)]
    Archive(#[from] ArchiveError),
    #[error("Dataset {} has no rows", .0.display())]
    EmptyDataset(PathBuf),
}

/// Outcome of [`train_evaluate_save`].
#[derive(Debug, Clone)]
pub struct TrainingReport {
    pub model: ToxicityModel,
    pub metrics: BinaryMetrics,
    pub train_rows: usize,
    pub test_rows: usize,
    pub model_path: PathBuf,
}

/// Train on the configured dataset, score the held-out split and write the
/// model archive to `config.model.path`.
pub fn train_evaluate_save(config: &DetoxConfig) -> Result<TrainingReport, WorkflowError> {
    config.validate()?;
    let schema = RecordSchema::default();
    let dataset = load_tsv(&config.data.dataset_path, &schema, &config.data.labels)?;
    let split = train_test_split(&dataset, config.data.test_fraction, config.data.seed)?;
    tracing::info!(
        "Split {} rows into {} train / {} test (seed {})",
        dataset.len(),
        split.train.len(),
        split.test.len(),
        config.data.seed
    );

    let model = ToxicityModel::fit(
        &split.train,
        &config.features,
        &config.training,
        config.model.threshold,
    )?;
    let metrics = evaluate(&model, &split.test);
    tracing::info!(
        "Test accuracy {:.4}, AUC {:.4}, F1 {:.4}",
        metrics.accuracy,
        metrics.area_under_roc_curve,
        metrics.f1_score
    );

    save_model(&model, &schema, &config.model.path)?;
    Ok(TrainingReport {
        model,
        metrics,
        train_rows: split.train.len(),
        test_rows: split.test.len(),
        model_path: config.model.path.clone(),
    })
}

/// Load a saved archive into a fresh predictor, independent of any in-memory
/// model. `threshold` replaces the archived decision threshold when given.
pub fn reload(path: &Path, threshold: Option<f32>) -> Result<Predictor, WorkflowError> {
    let (predictor, _schema) = Predictor::from_archive(path)?;
    apply_threshold(predictor, threshold)
}

/// Outcome of [`evaluate_archive`].
#[derive(Debug, Clone)]
pub struct EvaluationReport {
    pub model: ToxicityModel,
    pub dataset: Dataset,
    pub metrics: BinaryMetrics,
}

/// A row the model labeled wrongly.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Mistake<'a> {
    pub probability: f32,
    pub truth: bool,
    pub text: &'a str,
}

impl EvaluationReport {
    /// Misclassified rows, furthest from the decision threshold first.
    pub fn confident_mistakes(&self, top: usize) -> Vec<Mistake<'_>> {
        let threshold = self.model.threshold;
        let mut mistakes: Vec<Mistake<'_>> = self
            .dataset
            .examples()
            .iter()
            .filter_map(|example| {
                let prediction = self.model.predict(&example.text);
                (prediction.label != example.label).then_some(Mistake {
                    probability: prediction.probability,
                    truth: example.label,
                    text: example.text.as_str(),
                })
            })
            .collect();
        mistakes.sort_by(|a, b| {
            let margin_a = (a.probability - threshold).abs();
            let margin_b = (b.probability - threshold).abs();
            margin_b.total_cmp(&margin_a)
        });
        mistakes.truncate(top);
        mistakes
    }
}

/// Score a saved archive against a labeled TSV read with the archived schema.
pub fn evaluate_archive(
    model_path: &Path,
    dataset_path: &Path,
    labels: &LabelLiterals,
    threshold: Option<f32>,
) -> Result<EvaluationReport, WorkflowError> {
    let (predictor, schema) = Predictor::from_archive(model_path)?;
    let predictor = apply_threshold(predictor, threshold)?;
    let dataset = load_tsv(dataset_path, &schema, labels)?;
    if dataset.is_empty() {
        return Err(WorkflowError::EmptyDataset(dataset_path.to_path_buf()));
    }
    let model = predictor.model().clone();
    let metrics = evaluate(&model, &dataset);
    Ok(EvaluationReport {
        model,
        dataset,
        metrics,
    })
}

fn apply_threshold(
    predictor: Predictor,
    threshold: Option<f32>,
) -> Result<Predictor, WorkflowError> {
    let Some(threshold) = threshold else {
        return Ok(predictor);
    };
    if !(0.0..=1.0).contains(&threshold) {
        return Err(ConfigError::Invalid(format!(
            "threshold must be in [0, 1], got {threshold}"
        ))
        .into());
    }
    if threshold != predictor.model().threshold {
        tracing::info!(
            "Using threshold {threshold} instead of archived {}",
            predictor.model().threshold
        );
    }
    Ok(predictor.with_threshold(threshold))
}
