//! Seeded train/test partitioning.

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;

use super::DatasetError;
use super::schema::Dataset;

/// Disjoint train/test partition of a dataset.
#[derive(Debug, Clone)]
pub struct Split {
    pub train: Dataset,
    pub test: Dataset,
}

/// Partition `dataset` into train and test subsets.
///
/// Row indices are shuffled with a seeded RNG and the first
/// `round(test_fraction * n)` become the test set, clamped so both sides keep
/// at least one row. Each subset preserves the original row order.
pub fn train_test_split(
    dataset: &Dataset,
    test_fraction: f64,
    seed: u64,
) -> Result<Split, DatasetError> {
    if !(test_fraction > 0.0 && test_fraction < 1.0) {
        return Err(DatasetError::InvalidFraction(test_fraction));
    }
    let n = dataset.len();
    if n < 2 {
        return Err(DatasetError::TooSmallToSplit(n));
    }

    let test_len = ((n as f64) * test_fraction).round() as usize;
    let test_len = test_len.clamp(1, n - 1);

    let mut indices: Vec<usize> = (0..n).collect();
    let mut rng = StdRng::seed_from_u64(seed);
    indices.shuffle(&mut rng);

    let mut in_test = vec![false; n];
    for &idx in &indices[..test_len] {
        in_test[idx] = true;
    }

    let mut train = Vec::with_capacity(n - test_len);
    let mut test = Vec::with_capacity(test_len);
    for (example, is_test) in dataset.examples().iter().zip(in_test) {
        if is_test {
            test.push(example.clone());
        } else {
            train.push(example.clone());
        }
    }

    tracing::debug!(
        "Split {} rows into {} train / {} test (seed {})",
        n,
        train.len(),
        test.len(),
        seed
    );
    Ok(Split {
        train: Dataset::new(train),
        test: Dataset::new(test),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::Example;

    fn numbered(n: usize) -> Dataset {
        (0..n)
            .map(|i| Example::new(i % 3 == 0, format!("row {i}")))
            .collect()
    }

    fn texts(dataset: &Dataset) -> Vec<String> {
        dataset.texts().map(String::from).collect()
    }

    #[test]
    fn same_seed_reproduces_partition() {
        let dataset = numbered(200);
        let a = train_test_split(&dataset, 0.2, 7).unwrap();
        let b = train_test_split(&dataset, 0.2, 7).unwrap();
        assert_eq!(a.train, b.train);
        assert_eq!(a.test, b.test);
    }

    #[test]
    fn different_seeds_usually_differ() {
        let dataset = numbered(200);
        let a = train_test_split(&dataset, 0.2, 1).unwrap();
        let b = train_test_split(&dataset, 0.2, 2).unwrap();
        assert_ne!(a.test, b.test);
    }

    #[test]
    fn partition_is_disjoint_and_complete() {
        let dataset = numbered(97);
        for fraction in [0.01, 0.2, 0.5, 0.75, 0.99] {
            let split = train_test_split(&dataset, fraction, 3).unwrap();
            assert_eq!(split.train.len() + split.test.len(), dataset.len());
            let train = texts(&split.train);
            let test = texts(&split.test);
            assert!(test.iter().all(|text| !train.contains(text)));
            let mut all: Vec<String> = train.into_iter().chain(test).collect();
            all.sort();
            let mut expected = texts(&dataset);
            expected.sort();
            assert_eq!(all, expected);
        }
    }

    #[test]
    fn test_size_tracks_fraction() {
        let dataset = numbered(1000);
        let split = train_test_split(&dataset, 0.2, 11).unwrap();
        assert_eq!(split.test.len(), 200);
        assert_eq!(split.train.len(), 800);
    }

    #[test]
    fn tiny_fraction_still_keeps_one_test_row() {
        let split = train_test_split(&numbered(10), 0.001, 0).unwrap();
        assert_eq!(split.test.len(), 1);
        assert_eq!(split.train.len(), 9);
    }

    #[test]
    fn rejects_fraction_outside_open_interval() {
        let dataset = numbered(10);
        for fraction in [0.0, 1.0, -0.5, 1.5, f64::NAN] {
            assert!(matches!(
                train_test_split(&dataset, fraction, 0),
                Err(DatasetError::InvalidFraction(_))
            ));
        }
    }

    #[test]
    fn rejects_single_row_dataset() {
        assert!(matches!(
            train_test_split(&numbered(1), 0.5, 0),
            Err(DatasetError::TooSmallToSplit(1))
        ));
    }
}
