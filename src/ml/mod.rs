//! Text featurization, classifier training, evaluation and model archives.

pub mod archive;
pub mod featurize;
pub mod logreg;
pub mod metrics;
pub mod model;

pub use archive::{ArchiveError, load_model, save_model};
pub use featurize::{FeatureOptions, TextFeaturizer};
pub use logreg::{LogisticClassifier, TrainError, TrainOptions};
pub use metrics::{BinaryMetrics, evaluate};
pub use model::{DEFAULT_THRESHOLD, Prediction, ToxicityModel};
