//! TF-IDF text featurizer over word and character n-grams.
//!
//! Text is lowercased and tokenized into word runs. Word n-grams and
//! character n-grams (over the space-joined tokens, with boundary markers)
//! are weighted by TF-IDF and L2-normalized into a sparse vector whose
//! dimension is fixed by the vocabulary learned in [`TextFeaturizer::fit`].

use std::collections::{BTreeMap, BTreeSet};
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use sprs::CsVec;

/// Sparse feature vector produced by the featurizer.
pub type SparseFeatures = CsVec<f32>;

const WORD_PREFIX: &str = "w:";
const CHAR_PREFIX: &str = "c:";
const TEXT_START: char = '\u{2}';
const TEXT_END: char = '\u{3}';

static TOKEN_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\p{L}\p{N}']+").expect("token pattern is valid"));

/// Vocabulary and n-gram settings for [`TextFeaturizer`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureOptions {
    /// Upper bound on vocabulary size; terms are ranked by document frequency.
    #[serde(default = "default_max_features")]
    pub max_features: usize,
    /// Longest word n-gram (1 = unigrams only, 0 disables word features).
    #[serde(default = "default_word_ngrams")]
    pub word_ngrams: usize,
    /// Character n-gram length (0 disables character features).
    #[serde(default = "default_char_ngrams")]
    pub char_ngrams: usize,
    /// Minimum number of training documents a term must appear in.
    #[serde(default = "default_min_df")]
    pub min_df: usize,
}

impl Default for FeatureOptions {
    fn default() -> Self {
        Self {
            max_features: default_max_features(),
            word_ngrams: default_word_ngrams(),
            char_ngrams: default_char_ngrams(),
            min_df: default_min_df(),
        }
    }
}

fn default_max_features() -> usize {
    20_000
}

fn default_word_ngrams() -> usize {
    2
}

fn default_char_ngrams() -> usize {
    3
}

fn default_min_df() -> usize {
    1
}

/// Learned text transform: vocabulary plus inverse document frequencies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextFeaturizer {
    pub options: FeatureOptions,
    /// Term to feature index.
    pub vocabulary: BTreeMap<String, u32>,
    /// Inverse document frequency per feature index.
    pub idf: Vec<f32>,
}

impl TextFeaturizer {
    /// Learn the vocabulary and IDF weights from training documents.
    pub fn fit<'a, I>(documents: I, options: &FeatureOptions) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut doc_freq: BTreeMap<String, usize> = BTreeMap::new();
        let mut n_docs = 0usize;
        for doc in documents {
            n_docs += 1;
            let unique: BTreeSet<String> = extract_terms(doc, options).into_iter().collect();
            for term in unique {
                *doc_freq.entry(term).or_insert(0) += 1;
            }
        }

        let min_df = options.min_df.max(1);
        let mut ranked: Vec<(String, usize)> = doc_freq
            .into_iter()
            .filter(|(_, df)| *df >= min_df)
            .collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        ranked.truncate(options.max_features);

        let mut vocabulary = BTreeMap::new();
        let mut idf = Vec::with_capacity(ranked.len());
        let n = n_docs as f32;
        for (idx, (term, df)) in ranked.into_iter().enumerate() {
            idf.push(((1.0 + n) / (1.0 + df as f32)).ln() + 1.0);
            vocabulary.insert(term, idx as u32);
        }

        tracing::debug!(
            "Featurizer fit on {} documents; vocabulary size {}",
            n_docs,
            vocabulary.len()
        );
        Self {
            options: options.clone(),
            vocabulary,
            idf,
        }
    }

    /// Number of features in every transformed vector.
    pub fn dimension(&self) -> usize {
        self.idf.len()
    }

    /// Transform one document into an L2-normalized TF-IDF vector.
    ///
    /// Documents without any known term map to the zero vector.
    pub fn transform(&self, text: &str) -> SparseFeatures {
        let mut weights: BTreeMap<usize, f32> = BTreeMap::new();
        for term in extract_terms(text, &self.options) {
            if let Some(&idx) = self.vocabulary.get(&term) {
                *weights.entry(idx as usize).or_insert(0.0) += 1.0;
            }
        }
        for (idx, weight) in weights.iter_mut() {
            *weight *= self.idf[*idx];
        }
        let norm = weights.values().map(|w| w * w).sum::<f32>().sqrt();
        if norm > 0.0 {
            for weight in weights.values_mut() {
                *weight /= norm;
            }
        }
        let (indices, data): (Vec<usize>, Vec<f32>) = weights.into_iter().unzip();
        CsVec::new(self.dimension(), indices, data)
    }

    /// Check that the vocabulary and IDF table describe the same feature space.
    pub fn validate(&self) -> Result<(), String> {
        let dim = self.idf.len();
        if self.vocabulary.len() != dim {
            return Err(format!(
                "vocabulary has {} terms but idf has {} entries",
                self.vocabulary.len(),
                dim
            ));
        }
        let mut seen = vec![false; dim];
        for (term, &idx) in &self.vocabulary {
            let idx = idx as usize;
            if idx >= dim || seen[idx] {
                return Err(format!("term {term:?} has invalid feature index {idx}"));
            }
            seen[idx] = true;
        }
        if self.idf.iter().any(|value| !value.is_finite()) {
            return Err("idf contains non-finite values".to_string());
        }
        Ok(())
    }
}

/// Word tokens of `text`: lowercased runs of letters, digits and apostrophes.
pub fn tokenize(text: &str) -> Vec<String> {
    let lower = text.to_lowercase();
    TOKEN_PATTERN
        .find_iter(&lower)
        .map(|m| m.as_str().trim_matches('\''))
        .filter(|token| !token.is_empty())
        .map(String::from)
        .collect()
}

fn extract_terms(text: &str, options: &FeatureOptions) -> Vec<String> {
    let tokens = tokenize(text);
    if tokens.is_empty() {
        return Vec::new();
    }
    let mut terms = Vec::new();
    for n in 1..=options.word_ngrams.min(tokens.len()) {
        for window in tokens.windows(n) {
            terms.push(format!("{WORD_PREFIX}{}", window.join(" ")));
        }
    }
    if options.char_ngrams > 0 {
        let chars: Vec<char> = std::iter::once(TEXT_START)
            .chain(tokens.join(" ").chars())
            .chain(std::iter::once(TEXT_END))
            .collect();
        for window in chars.windows(options.char_ngrams) {
            let gram: String = window.iter().collect();
            terms.push(format!("{CHAR_PREFIX}{gram}"));
        }
    }
    terms
}
