//! Tab-separated dataset loader.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use csv::{ReaderBuilder, StringRecord};

use super::DatasetError;
use super::schema::{Dataset, Example, LabelLiterals, RecordSchema};

/// Column delimiter for training files.
pub const DELIMITER: u8 = b'\t';

/// Load a TSV dataset with a header row from `path`.
pub fn load_tsv(
    path: &Path,
    schema: &RecordSchema,
    literals: &LabelLiterals,
) -> Result<Dataset, DatasetError> {
    let file = File::open(path).map_err(|source| DatasetError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let dataset = read_tsv(file, path, schema, literals)?;
    tracing::info!(
        "Loaded {} rows ({} toxic) from {}",
        dataset.len(),
        dataset.positive_count(),
        path.display()
    );
    Ok(dataset)
}

/// Parse TSV rows from any reader. `origin` is only used in errors.
///
/// Fields are taken verbatim: quotes carry no meaning and rows may have any
/// number of columns past the ones the schema needs.
pub fn read_tsv<R: Read>(
    reader: R,
    origin: &Path,
    schema: &RecordSchema,
    literals: &LabelLiterals,
) -> Result<Dataset, DatasetError> {
    let mut rdr = ReaderBuilder::new()
        .delimiter(DELIMITER)
        .has_headers(true)
        .quoting(false)
        .flexible(true)
        .from_reader(reader);
    let min_columns = schema.min_columns();
    let mut examples = Vec::new();
    let mut record = StringRecord::new();
    loop {
        let more = rdr.read_record(&mut record).map_err(|source| DatasetError::Csv {
            path: origin.to_path_buf(),
            source,
        })?;
        if !more {
            break;
        }
        if record.iter().all(|field| field.trim().is_empty()) {
            continue;
        }
        let line = record.position().map_or(0, |pos| pos.line() as usize);
        if record.len() < min_columns {
            return Err(DatasetError::MissingColumns {
                path: origin.to_path_buf(),
                line,
                found: record.len(),
                expected: min_columns,
            });
        }
        let raw_label = &record[schema.label_column];
        let label = literals
            .parse(raw_label)
            .ok_or_else(|| DatasetError::InvalidLabel {
                path: origin.to_path_buf(),
                line,
                column: schema.label_column,
                value: raw_label.to_string(),
            })?;
        examples.push(Example::new(label, &record[schema.text_column]));
    }
    Ok(Dataset::new(examples))
}
