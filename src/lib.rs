//! Library exports for the binaries, benchmarks and tests.
/// Application directory resolution.
pub mod app_dirs;
/// TOML configuration.
pub mod config;
/// Interactive prediction loop.
pub mod console;
/// Labeled text datasets.
pub mod dataset;
/// Logging setup.
pub mod logging;
/// Featurization, training, metrics and persistence.
pub mod ml;
/// Inference over a loaded model.
pub mod predictor;
/// End-to-end training run.
pub mod workflow;
