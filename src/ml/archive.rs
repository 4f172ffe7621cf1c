//! Single-file zip archive holding a fitted [`ToxicityModel`].
//!
//! Layout:
//! - `manifest.json`: format version, feature dimension, record schema, threshold
//! - `featurizer.json`: vocabulary and IDF table
//! - `classifier.json`: weights and bias

use std::fs::{self, File};
use std::io::{BufReader, Read, Seek, Write};
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use thiserror::Error;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use zip::result::ZipError;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use super::featurize::TextFeaturizer;
use super::logreg::LogisticClassifier;
use super::model::ToxicityModel;
use crate::dataset::RecordSchema;

/// Archive layout version written by [`save_model`].
pub const ARCHIVE_FORMAT_VERSION: u32 = 1;
/// Pipeline shape stored in the manifest.
pub const MODEL_KIND: &str = "tfidf_logreg_v1";

const MANIFEST_ENTRY: &str = "manifest.json";
const FEATURIZER_ENTRY: &str = "featurizer.json";
const CLASSIFIER_ENTRY: &str = "classifier.json";

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("Failed to create model directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to write model archive {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to open model archive {path}: {source}")]
    Open {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Invalid model archive {path}: {source}")]
    Zip { path: PathBuf, source: ZipError },
    #[error("Model archive {path} is missing {entry}")]
    MissingEntry { path: PathBuf, entry: &'static str },
    #[error("Invalid {entry} in model archive {path}: {source}")]
    Json {
        path: PathBuf,
        entry: &'static str,
        source: serde_json::Error,
    },
    #[error("Incompatible model archive {path}: {reason}")]
    Incompatible { path: PathBuf, reason: String },
}

/// Archive metadata written alongside the model parts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub format_version: u32,
    pub model_kind: String,
    pub feature_dim: usize,
    pub threshold: f32,
    pub schema: RecordSchema,
    #[serde(default)]
    pub created_at: Option<String>,
}

/// Serialize `model` and `schema` into a zip archive at `path`, replacing any
/// existing file. The archive is written next to `path` and renamed into place.
pub fn save_model(
    model: &ToxicityModel,
    schema: &RecordSchema,
    path: &Path,
) -> Result<(), ArchiveError> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent).map_err(|source| ArchiveError::CreateDir {
        path: parent.to_path_buf(),
        source,
    })?;

    let manifest = Manifest {
        format_version: ARCHIVE_FORMAT_VERSION,
        model_kind: MODEL_KIND.to_string(),
        feature_dim: model.featurizer.dimension(),
        threshold: model.threshold,
        schema: schema.clone(),
        created_at: OffsetDateTime::now_utc().format(&Rfc3339).ok(),
    };
    let entries = [
        (MANIFEST_ENTRY, to_json(&manifest, path, MANIFEST_ENTRY)?),
        (
            FEATURIZER_ENTRY,
            to_json(&model.featurizer, path, FEATURIZER_ENTRY)?,
        ),
        (
            CLASSIFIER_ENTRY,
            to_json(&model.classifier, path, CLASSIFIER_ENTRY)?,
        ),
    ];

    let write_err = |source: std::io::Error| ArchiveError::Write {
        path: path.to_path_buf(),
        source,
    };
    let mut temp = NamedTempFile::new_in(parent).map_err(write_err)?;
    write_entries(temp.as_file_mut(), &entries).map_err(|source| ArchiveError::Zip {
        path: path.to_path_buf(),
        source,
    })?;
    temp.as_file().sync_all().map_err(write_err)?;
    temp.persist(path).map_err(|err| write_err(err.error))?;

    tracing::info!("Saved model archive to {}", path.display());
    Ok(())
}

/// Load a model archive written by [`save_model`].
pub fn load_model(path: &Path) -> Result<(ToxicityModel, RecordSchema), ArchiveError> {
    let file = File::open(path).map_err(|source| ArchiveError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    let mut archive = ZipArchive::new(BufReader::new(file)).map_err(|source| ArchiveError::Zip {
        path: path.to_path_buf(),
        source,
    })?;

    let manifest: Manifest = read_json(&mut archive, path, MANIFEST_ENTRY)?;
    let incompatible = |reason: String| ArchiveError::Incompatible {
        path: path.to_path_buf(),
        reason,
    };
    if manifest.format_version != ARCHIVE_FORMAT_VERSION {
        return Err(incompatible(format!(
            "format version {} (expected {})",
            manifest.format_version, ARCHIVE_FORMAT_VERSION
        )));
    }
    if manifest.model_kind != MODEL_KIND {
        return Err(incompatible(format!(
            "model kind {:?} (expected {:?})",
            manifest.model_kind, MODEL_KIND
        )));
    }

    let featurizer: TextFeaturizer = read_json(&mut archive, path, FEATURIZER_ENTRY)?;
    let classifier: LogisticClassifier = read_json(&mut archive, path, CLASSIFIER_ENTRY)?;
    if featurizer.dimension() != manifest.feature_dim {
        return Err(incompatible(format!(
            "featurizer dimension {} does not match manifest dimension {}",
            featurizer.dimension(),
            manifest.feature_dim
        )));
    }
    let model = ToxicityModel {
        featurizer,
        classifier,
        threshold: manifest.threshold,
    };
    model.validate().map_err(incompatible)?;

    tracing::info!(
        "Loaded model archive {} ({} features)",
        path.display(),
        manifest.feature_dim
    );
    Ok((model, manifest.schema))
}

fn to_json<T: Serialize>(
    value: &T,
    path: &Path,
    entry: &'static str,
) -> Result<Vec<u8>, ArchiveError> {
    serde_json::to_vec(value).map_err(|source| ArchiveError::Json {
        path: path.to_path_buf(),
        entry,
        source,
    })
}

fn write_entries<W: Write + Seek>(writer: W, entries: &[(&str, Vec<u8>)]) -> Result<(), ZipError> {
    let mut zip = ZipWriter::new(writer);
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    for (name, bytes) in entries {
        zip.start_file(*name, options)?;
        zip.write_all(bytes)?;
    }
    zip.finish()?;
    Ok(())
}

fn read_json<R: Read + Seek, T: DeserializeOwned>(
    archive: &mut ZipArchive<R>,
    path: &Path,
    entry: &'static str,
) -> Result<T, ArchiveError> {
    let file = archive.by_name(entry).map_err(|source| match source {
        ZipError::FileNotFound => ArchiveError::MissingEntry {
            path: path.to_path_buf(),
            entry,
        },
        source => ArchiveError::Zip {
            path: path.to_path_buf(),
            source,
        },
    })?;
    serde_json::from_reader(file).map_err(|source| ArchiveError::Json {
        path: path.to_path_buf(),
        entry,
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::{Dataset, Example};
    use crate::ml::featurize::FeatureOptions;
    use crate::ml::logreg::TrainOptions;
    use crate::ml::model::DEFAULT_THRESHOLD;
    use tempfile::tempdir;

    fn trained() -> ToxicityModel {
        let rows: Dataset = (0..30)
            .flat_map(|i| {
                [
                    Example::new(true, format!("you idiot number {i}")),
                    Example::new(false, format!("thanks for edit {i}")),
                ]
            })
            .collect();
        ToxicityModel::fit(
            &rows,
            &FeatureOptions::default(),
            &TrainOptions::default(),
            DEFAULT_THRESHOLD,
        )
        .unwrap()
    }

    #[test]
    fn round_trip_preserves_predictions() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("models").join("model.zip");
        let model = trained();
        let schema = RecordSchema::default();
        save_model(&model, &schema, &path).unwrap();

        let (loaded, loaded_schema) = load_model(&path).unwrap();
        assert_eq!(loaded_schema, schema);
        assert_eq!(loaded.threshold, model.threshold);
        for text in ["you idiot", "thanks for the edit", "", "§§ unrelated ¿"] {
            let a = model.predict(text);
            let b = loaded.predict(text);
            assert_eq!(a.label, b.label);
            assert!((a.probability - b.probability).abs() < 1e-6);
        }
    }

    #[test]
    fn save_overwrites_existing_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("model.zip");
        std::fs::write(&path, b"stale").unwrap();
        save_model(&trained(), &RecordSchema::default(), &path).unwrap();
        assert!(load_model(&path).is_ok());
    }

    #[test]
    fn missing_archive_is_open_error() {
        let dir = tempdir().unwrap();
        let err = load_model(&dir.path().join("nope.zip")).unwrap_err();
        assert!(matches!(err, ArchiveError::Open { .. }));
    }

    #[test]
    fn truncated_archive_is_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("model.zip");
        save_model(&trained(), &RecordSchema::default(), &path).unwrap();
        let bytes = std::fs::read(&path).unwrap();
        std::fs::write(&path, &bytes[..bytes.len() / 2]).unwrap();
        assert!(matches!(
            load_model(&path).unwrap_err(),
            ArchiveError::Zip { .. } | ArchiveError::Json { .. }
        ));
    }

    #[test]
    fn dimension_mismatch_is_incompatible() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("model.zip");
        let mut model = trained();
        model.classifier.weights.push(0.0);
        model.classifier.feature_dim += 1;
        save_model(&model, &RecordSchema::default(), &path).unwrap();
        assert!(matches!(
            load_model(&path).unwrap_err(),
            ArchiveError::Incompatible { .. }
        ));
    }

    #[test]
    fn missing_entry_is_reported() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("model.zip");
        let manifest = Manifest {
            format_version: ARCHIVE_FORMAT_VERSION,
            model_kind: MODEL_KIND.to_string(),
            feature_dim: 0,
            threshold: 0.5,
            schema: RecordSchema::default(),
            created_at: None,
        };
        let file = File::create(&path).unwrap();
        write_entries(
            file,
            &[(MANIFEST_ENTRY, serde_json::to_vec(&manifest).unwrap())],
        )
        .unwrap();
        assert!(matches!(
            load_model(&path).unwrap_err(),
            ArchiveError::MissingEntry {
                entry: FEATURIZER_ENTRY,
                ..
            }
        ));
    }

    #[test]
    fn future_format_version_is_incompatible() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("model.zip");
        let manifest = Manifest {
            format_version: ARCHIVE_FORMAT_VERSION + 1,
            model_kind: MODEL_KIND.to_string(),
            feature_dim: 0,
            threshold: 0.5,
            schema: RecordSchema::default(),
            created_at: None,
        };
        let file = File::create(&path).unwrap();
        write_entries(
            file,
            &[(MANIFEST_ENTRY, serde_json::to_vec(&manifest).unwrap())],
        )
        .unwrap();
        assert!(matches!(
            load_model(&path).unwrap_err(),
            ArchiveError::Incompatible { .. }
        ));
    }
}
