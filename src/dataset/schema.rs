//! Record shape for toxicity training data.

use serde::{Deserialize, Serialize};

/// One labeled training example.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Example {
    /// `true` when the text is toxic.
    pub label: bool,
    pub text: String,
}

impl Example {
    pub fn new(label: bool, text: impl Into<String>) -> Self {
        Self {
            label,
            text: text.into(),
        }
    }
}

/// Ordered, read-only collection of examples.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Dataset {
    examples: Vec<Example>,
}

impl Dataset {
    pub fn new(examples: Vec<Example>) -> Self {
        Self { examples }
    }

    pub fn examples(&self) -> &[Example] {
        &self.examples
    }

    pub fn len(&self) -> usize {
        self.examples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.examples.is_empty()
    }

    /// Number of examples labeled toxic.
    pub fn positive_count(&self) -> usize {
        self.examples.iter().filter(|example| example.label).count()
    }

    pub fn texts(&self) -> impl Iterator<Item = &str> {
        self.examples.iter().map(|example| example.text.as_str())
    }
}

impl FromIterator<Example> for Dataset {
    fn from_iter<I: IntoIterator<Item = Example>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

/// Column mapping used to read a delimited file; persisted with the model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordSchema {
    pub label_column: usize,
    pub label_name: String,
    pub text_column: usize,
    pub text_name: String,
}

impl RecordSchema {
    /// Minimum number of columns a row must have to satisfy the mapping.
    pub fn min_columns(&self) -> usize {
        self.label_column.max(self.text_column) + 1
    }
}

impl Default for RecordSchema {
    fn default() -> Self {
        Self {
            label_column: 0,
            label_name: "Label".to_string(),
            text_column: 2,
            text_name: "Text".to_string(),
        }
    }
}

/// Literal sets accepted as boolean labels.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelLiterals {
    #[serde(default = "default_truthy")]
    pub truthy: Vec<String>,
    #[serde(default = "default_falsy")]
    pub falsy: Vec<String>,
    #[serde(default = "default_case_insensitive")]
    pub case_insensitive: bool,
}

impl LabelLiterals {
    /// Coerce a raw column value to a label, or `None` if it is not accepted.
    pub fn parse(&self, raw: &str) -> Option<bool> {
        let value = raw.trim();
        if value.is_empty() {
            return None;
        }
        let matches = |literal: &String| {
            if self.case_insensitive {
                literal.eq_ignore_ascii_case(value)
            } else {
                literal == value
            }
        };
        if self.truthy.iter().any(matches) {
            Some(true)
        } else if self.falsy.iter().any(matches) {
            Some(false)
        } else {
            None
        }
    }

    /// Literals present in both sets, which would make parsing ambiguous.
    pub fn overlapping(&self) -> Vec<String> {
        self.truthy
            .iter()
            .filter(|t| {
                self.falsy.iter().any(|f| {
                    if self.case_insensitive {
                        f.eq_ignore_ascii_case(t)
                    } else {
                        f == *t
                    }
                })
            })
            .cloned()
            .collect()
    }
}

impl Default for LabelLiterals {
    fn default() -> Self {
        Self {
            truthy: default_truthy(),
            falsy: default_falsy(),
            case_insensitive: default_case_insensitive(),
        }
    }
}

fn default_truthy() -> Vec<String> {
    ["true", "1", "yes", "t", "y"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_falsy() -> Vec<String> {
    ["false", "0", "no", "f", "n"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_case_insensitive() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_literals_accept_common_forms() {
        let literals = LabelLiterals::default();
        assert_eq!(literals.parse("True"), Some(true));
        assert_eq!(literals.parse("1"), Some(true));
        assert_eq!(literals.parse(" false "), Some(false));
        assert_eq!(literals.parse("0"), Some(false));
        assert_eq!(literals.parse("maybe"), None);
        assert_eq!(literals.parse(""), None);
    }

    #[test]
    fn case_sensitive_literals_reject_other_cases() {
        let literals = LabelLiterals {
            truthy: vec!["toxic".into()],
            falsy: vec!["clean".into()],
            case_insensitive: false,
        };
        assert_eq!(literals.parse("toxic"), Some(true));
        assert_eq!(literals.parse("Toxic"), None);
        assert_eq!(literals.parse("clean"), Some(false));
    }

    #[test]
    fn overlapping_literals_are_reported() {
        let literals = LabelLiterals {
            truthy: vec!["1".into(), "Y".into()],
            falsy: vec!["y".into()],
            case_insensitive: true,
        };
        assert_eq!(literals.overlapping(), vec!["Y".to_string()]);
    }

    #[test]
    fn default_schema_reads_label_and_text_columns() {
        let schema = RecordSchema::default();
        assert_eq!(schema.min_columns(), 3);
    }
}
