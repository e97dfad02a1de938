//! String intent labels to integer class codes.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::error::{AugurError, Result};

/// Fixed-order bijection between intent labels and class codes.
///
/// Classes are sorted, so the same label set always yields the same codes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelEncoder {
    classes: Vec<String>,
}

impl LabelEncoder {
    /// Build an encoder over the distinct labels in `labels`.
    pub fn fit<S: AsRef<str>>(labels: &[S]) -> Self {
        let classes: BTreeSet<&str> = labels.iter().map(|l| l.as_ref()).collect();
        Self {
            classes: classes.into_iter().map(str::to_string).collect(),
        }
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    pub fn encode(&self, label: &str) -> Result<usize> {
        self.classes
            .binary_search_by(|c| c.as_str().cmp(label))
            .map_err(|_| AugurError::invalid_features(format!("unknown label '{label}'")))
    }

    pub fn encode_all<S: AsRef<str>>(&self, labels: &[S]) -> Result<Vec<usize>> {
        labels.iter().map(|l| self.encode(l.as_ref())).collect()
    }

    pub fn decode(&self, code: usize) -> Result<&str> {
        self.classes
            .get(code)
            .map(String::as_str)
            .ok_or_else(|| {
                AugurError::invalid_features(format!(
                    "class code {code} outside encoder of {} classes",
                    self.classes.len()
                ))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sorted_bijection() {
        let encoder = LabelEncoder::fit(&["greeting", "farewell", "greeting", "fees"]);
        assert_eq!(encoder.classes(), ["farewell", "fees", "greeting"]);
        assert_eq!(encoder.encode("greeting").unwrap(), 2);
        assert_eq!(encoder.decode(0).unwrap(), "farewell");
        assert!(encoder.encode("unknown").is_err());
        assert!(encoder.decode(3).is_err());
    }
}
