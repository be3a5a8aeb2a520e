//! Character-count features for raw log lines

use ndarray::Array2;
use serde::{Deserialize, Serialize};
use unicode_general_category::{get_general_category, GeneralCategory};

/// Number of features produced per log line
pub const N_FEATURES: usize = 3;

/// How characters are classified as letters or digits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CharClassification {
    /// Letters by `char::is_alphabetic`, digits by the Unicode `Nd` (decimal number) category
    #[default]
    Unicode,
    /// ASCII letters and `0-9` only; every other character counts as special
    Ascii,
}

impl CharClassification {
    fn is_digit(self, c: char) -> bool {
        match self {
            CharClassification::Unicode => get_general_category(c) == GeneralCategory::DecimalNumber,
            CharClassification::Ascii => c.is_ascii_digit(),
        }
    }

    fn is_letter(self, c: char) -> bool {
        match self {
            CharClassification::Unicode => c.is_alphabetic(),
            CharClassification::Ascii => c.is_ascii_alphabetic(),
        }
    }
}

/// Features of a single line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LineFeatures {
    /// Number of characters
    pub length: usize,
    /// Characters classified as digits
    pub digit_count: usize,
    /// Characters that are neither letters nor digits
    pub special_count: usize,
}

impl LineFeatures {
    pub fn to_array(self) -> [f64; N_FEATURES] {
        [
            self.length as f64,
            self.digit_count as f64,
            self.special_count as f64,
        ]
    }
}

/// Turns log lines into a fixed-width numeric matrix.
///
/// Each line is described independently (no cross-line normalization) by its
/// length, its digit count and its count of non-alphanumeric characters. Row
/// `i` of the output always describes line `i` of the input.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct FeatureExtractor {
    classification: CharClassification,
}

impl FeatureExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_classification(mut self, classification: CharClassification) -> Self {
        self.classification = classification;
        self
    }

    pub fn classification(&self) -> CharClassification {
        self.classification
    }

    /// Features of one line, computed in a single pass over its characters
    pub fn extract_line(&self, line: &str) -> LineFeatures {
        let mut features = LineFeatures::default();
        for c in line.chars() {
            features.length += 1;
            if self.classification.is_digit(c) {
                features.digit_count += 1;
            } else if !self.classification.is_letter(c) {
                features.special_count += 1;
            }
        }
        features
    }

    /// Feature matrix with one row per line, in input order
    pub fn extract<S: AsRef<str>>(&self, lines: &[S]) -> Array2<f64> {
        let mut matrix = Array2::zeros((lines.len(), N_FEATURES));
        for (mut row, line) in matrix.rows_mut().into_iter().zip(lines) {
            let values = self.extract_line(line.as_ref()).to_array();
            for (cell, value) in row.iter_mut().zip(values) {
                *cell = value;
            }
        }
        matrix
    }
}
