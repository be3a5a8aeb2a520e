//! Isolation Forest anomaly detection

use crate::anomaly::{AnomalyDetector, AnomalyLabel, AnomalyResult};
use crate::error::{LogsiftError, Result};
use ndarray::{Array1, Array2, ArrayView1};
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Score baseline of the classic formulation: rows scoring above it are anomalous
/// when no contamination is given.
pub const AUTO_THRESHOLD: f64 = 0.5;

/// Margin a score must clear above the threshold to be labelled anomalous.
/// Absorbs rounding when every row scores exactly the baseline.
pub const SCORE_TOLERANCE: f64 = 1e-9;

/// Isolation Tree node
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum IsolationTree {
    /// Internal node with split
    Internal {
        /// Feature index for split
        feature: usize,
        /// Split threshold
        threshold: f64,
        /// Left subtree (values < threshold)
        left: Box<IsolationTree>,
        /// Right subtree (values >= threshold)
        right: Box<IsolationTree>,
    },
    /// External (leaf) node
    External {
        /// Number of samples in this node
        size: usize,
        /// Expected path length of the samples left unsplit, `c(size)`
        adjustment: f64,
    },
}

impl IsolationTree {
    /// Build an isolation tree over the rows of `x` listed in `indices`
    pub fn build(
        x: &Array2<f64>,
        indices: &[usize],
        height: usize,
        max_height: usize,
        rng: &mut impl Rng,
    ) -> Self {
        let n_samples = indices.len();

        if height >= max_height || n_samples <= 1 {
            return Self::leaf(n_samples);
        }

        // Features that still vary within this partition, with their ranges
        let candidates: Vec<(usize, f64, f64)> = (0..x.ncols())
            .filter_map(|feature| {
                let (min_val, max_val) = indices.iter().map(|&i| x[[i, feature]]).fold(
                    (f64::INFINITY, f64::NEG_INFINITY),
                    |(lo, hi), v| (lo.min(v), hi.max(v)),
                );
                ((max_val - min_val).abs() >= 1e-10).then_some((feature, min_val, max_val))
            })
            .collect();

        // Every feature is constant: the rows cannot be told apart
        let Some(&(feature, min_val, max_val)) = candidates.choose(rng) else {
            return Self::leaf(n_samples);
        };

        let threshold = rng.gen_range(min_val..max_val);

        let (left_indices, right_indices): (Vec<usize>, Vec<usize>) = indices
            .iter()
            .partition(|&&i| x[[i, feature]] < threshold);

        if left_indices.is_empty() || right_indices.is_empty() {
            return Self::leaf(n_samples);
        }

        let left = Box::new(Self::build(x, &left_indices, height + 1, max_height, rng));
        let right = Box::new(Self::build(x, &right_indices, height + 1, max_height, rng));

        IsolationTree::Internal {
            feature,
            threshold,
            left,
            right,
        }
    }

    fn leaf(size: usize) -> Self {
        IsolationTree::External {
            size,
            adjustment: average_path_length(size),
        }
    }

    /// Path length of a sample, including the correction at truncated leaves
    pub fn path_length(&self, sample: ArrayView1<f64>, current_height: usize) -> f64 {
        match self {
            IsolationTree::External { adjustment, .. } => current_height as f64 + adjustment,
            IsolationTree::Internal {
                feature,
                threshold,
                left,
                right,
            } => {
                if sample[*feature] < *threshold {
                    left.path_length(sample, current_height + 1)
                } else {
                    right.path_length(sample, current_height + 1)
                }
            }
        }
    }

    /// Depth of the deepest leaf
    pub fn depth(&self) -> usize {
        match self {
            IsolationTree::External { .. } => 0,
            IsolationTree::Internal { left, right, .. } => 1 + left.depth().max(right.depth()),
        }
    }
}

/// Average path length of an unsuccessful search in a BST of `n` points:
/// c(n) = 2 * H(n-1) - 2(n-1)/n, with H the harmonic number.
pub fn average_path_length(n: usize) -> f64 {
    match n {
        0 | 1 => 0.0,
        2 => 1.0,
        _ => {
            let n_f = n as f64;
            2.0 * harmonic(n - 1) - 2.0 * (n_f - 1.0) / n_f
        }
    }
}

fn harmonic(n: usize) -> f64 {
    (1..=n).map(|i| 1.0 / i as f64).sum()
}

/// Isolation Forest anomaly detector
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IsolationForest {
    /// Number of trees
    n_estimators: usize,
    /// Maximum samples per tree
    max_samples: usize,
    /// Expected proportion of outliers; `None` uses the 0.5 score baseline
    contamination: Option<f64>,
    /// Random seed
    seed: Option<u64>,
    /// Fitted trees
    trees: Option<Vec<IsolationTree>>,
    /// Decision threshold
    threshold: Option<f64>,
    /// Rows drawn per tree during fitting
    samples_per_tree: Option<usize>,
    /// Column count seen during fitting
    n_features: Option<usize>,
}

impl IsolationForest {
    /// Create new Isolation Forest
    pub fn new() -> Self {
        Self {
            n_estimators: 100,
            max_samples: 256,
            contamination: None,
            seed: None,
            trees: None,
            threshold: None,
            samples_per_tree: None,
            n_features: None,
        }
    }

    /// Set number of trees
    pub fn with_n_estimators(mut self, n: usize) -> Self {
        self.n_estimators = n;
        self
    }

    /// Set maximum samples per tree
    pub fn with_max_samples(mut self, n: usize) -> Self {
        self.max_samples = n;
        self
    }

    /// Use a fixed contamination ratio instead of the automatic baseline
    pub fn with_contamination(mut self, c: f64) -> Self {
        self.contamination = Some(c.clamp(0.0, 0.5));
        self
    }

    /// Set random seed
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn trees(&self) -> Option<&[IsolationTree]> {
        self.trees.as_deref()
    }

    fn validate_params(&self) -> Result<()> {
        if self.n_estimators == 0 {
            return Err(LogsiftError::InvalidParameter {
                name: "n_estimators".to_string(),
                value: "0".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        if self.max_samples == 0 {
            return Err(LogsiftError::InvalidParameter {
                name: "max_samples".to_string(),
                value: "0".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    fn check_input(&self, x: &Array2<f64>) -> Result<()> {
        if let Some(n_features) = self.n_features {
            if x.ncols() != n_features {
                return Err(LogsiftError::ShapeError {
                    expected: format!("{} columns", n_features),
                    actual: format!("{} columns", x.ncols()),
                });
            }
        }
        if let Some(pos) = x.iter().position(|v| !v.is_finite()) {
            return Err(LogsiftError::ComputationError(format!(
                "non-finite feature value at row {}",
                pos / x.ncols().max(1)
            )));
        }
        Ok(())
    }

    /// Compute anomaly score for samples
    /// Score is between 0 and 1, higher means more anomalous
    fn compute_scores(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let trees = self.trees.as_ref().ok_or(LogsiftError::ModelNotFitted)?;
        self.check_input(x)?;

        let c_n = average_path_length(self.samples_per_tree.unwrap_or(0));
        let n_trees = trees.len() as f64;

        let scores: Vec<f64> = (0..x.nrows())
            .into_par_iter()
            .map(|i| {
                let sample = x.row(i);

                // A single fitted row gives nothing to compare against
                if c_n <= 0.0 {
                    return AUTO_THRESHOLD;
                }

                let avg_path_length: f64 = trees
                    .iter()
                    .map(|tree| tree.path_length(sample, 0))
                    .sum::<f64>()
                    / n_trees;

                // s(x, n) = 2^(-E[h(x)] / c(n))
                2.0_f64.powf(-avg_path_length / c_n)
            })
            .collect();

        if let Some(pos) = scores.iter().position(|s| !s.is_finite()) {
            return Err(LogsiftError::ComputationError(format!(
                "non-finite anomaly score at row {}",
                pos
            )));
        }

        Ok(Array1::from_vec(scores))
    }

    fn label(&self, score: f64, threshold: f64) -> AnomalyLabel {
        if self.samples_per_tree.unwrap_or(0) < 2 {
            return AnomalyLabel::Normal;
        }
        if score - threshold > SCORE_TOLERANCE {
            AnomalyLabel::Anomalous
        } else {
            AnomalyLabel::Normal
        }
    }

    fn labels_for(&self, scores: &Array1<f64>) -> Vec<AnomalyLabel> {
        let threshold = self.threshold();
        scores.iter().map(|&s| self.label(s, threshold)).collect()
    }
}

impl Default for IsolationForest {
    fn default() -> Self {
        Self::new()
    }
}

impl AnomalyDetector for IsolationForest {
    fn fit(&mut self, x: &Array2<f64>) -> Result<()> {
        self.validate_params()?;

        let n_samples = x.nrows();
        if n_samples == 0 {
            return Err(LogsiftError::ValidationError(
                "cannot fit on an empty matrix".to_string(),
            ));
        }
        if x.ncols() == 0 {
            return Err(LogsiftError::ShapeError {
                expected: "at least 1 column".to_string(),
                actual: "0 columns".to_string(),
            });
        }
        self.n_features = None;
        self.check_input(x)?;

        let samples_per_tree = self.max_samples.min(n_samples);
        let max_height = (samples_per_tree.max(2) as f64).log2().ceil() as usize;
        let base_seed = self.seed.unwrap_or_else(|| rand::thread_rng().gen());

        // Each tree owns its generator, so the forest does not depend on scheduling
        let trees: Vec<IsolationTree> = (0..self.n_estimators)
            .into_par_iter()
            .map(|tree_idx| {
                let mut rng = ChaCha8Rng::seed_from_u64(base_seed.wrapping_add(tree_idx as u64));
                let indices =
                    rand::seq::index::sample(&mut rng, n_samples, samples_per_tree).into_vec();
                IsolationTree::build(x, &indices, 0, max_height, &mut rng)
            })
            .collect();

        self.trees = Some(trees);
        self.samples_per_tree = Some(samples_per_tree);
        self.n_features = Some(x.ncols());

        self.threshold = Some(match self.contamination {
            None => AUTO_THRESHOLD,
            Some(contamination) => {
                let scores = self.compute_scores(x)?;
                let mut sorted_scores: Vec<f64> = scores.to_vec();
                sorted_scores.sort_by(|a, b| b.total_cmp(a));

                // Rows strictly above the (k+1)-th highest score are flagged
                let k = ((contamination * n_samples as f64) as usize).min(n_samples - 1);
                sorted_scores[k]
            }
        });

        Ok(())
    }

    fn score_samples(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        self.compute_scores(x)
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Vec<AnomalyLabel>> {
        let scores = self.compute_scores(x)?;
        Ok(self.labels_for(&scores))
    }

    fn detect(&self, x: &Array2<f64>) -> Result<AnomalyResult> {
        let scores = self.compute_scores(x)?;
        let labels = self.labels_for(&scores);
        Ok(AnomalyResult::new(scores, labels, self.threshold()))
    }

    fn threshold(&self) -> f64 {
        self.threshold.unwrap_or(AUTO_THRESHOLD)
    }
}

/// Train a fresh forest on `x` and label every row of it.
///
/// An empty matrix yields an empty label vector without building a model.
pub fn fit_and_predict(
    x: &Array2<f64>,
    ensemble_size: usize,
    subsample_size: usize,
    seed: u64,
) -> Result<Vec<AnomalyLabel>> {
    let mut forest = IsolationForest::new()
        .with_n_estimators(ensemble_size)
        .with_max_samples(subsample_size)
        .with_seed(seed);
    forest.fit_predict(x)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clustered_with_outliers() -> Array2<f64> {
        // Normal data cluster: 50 points with 2 features each
        let mut data = Vec::new();
        for i in 0..50 {
            data.push((i % 10) as f64);
            data.push(((i % 10) + 1) as f64);
        }
        // Add 2 outliers
        data.extend_from_slice(&[100.0, 100.0]);
        data.extend_from_slice(&[-50.0, -50.0]);

        Array2::from_shape_vec((52, 2), data).unwrap()
    }

    #[test]
    fn test_isolation_forest_basic() {
        let x = clustered_with_outliers();

        let mut iforest = IsolationForest::new()
            .with_n_estimators(50)
            .with_seed(42);

        iforest.fit(&x).unwrap();

        let scores = iforest.score_samples(&x).unwrap();
        let labels = iforest.predict(&x).unwrap();

        assert!(scores[50] > scores[0]);
        assert!(scores[51] > scores[0]);
        assert!(scores.iter().all(|&s| s > 0.0 && s <= 1.0));

        assert_eq!(labels.len(), 52);
        assert!(labels[50].is_anomalous());
        assert!(labels[51].is_anomalous());
    }

    #[test]
    fn test_contamination_threshold() {
        let x = clustered_with_outliers();

        let mut iforest = IsolationForest::new()
            .with_n_estimators(50)
            .with_contamination(0.04)
            .with_seed(7);
        let result = iforest.fit_predict(&x).unwrap();

        // floor(0.04 * 52) = 2 rows at most
        let n_anomalies = result.iter().filter(|l| l.is_anomalous()).count();
        assert!(n_anomalies <= 2);
        assert!(result[50].is_anomalous() || result[51].is_anomalous());
    }

    #[test]
    fn test_isolation_tree_path_length() {
        let x = Array2::from_shape_vec(
            (10, 2),
            vec![
                1.0, 1.0, 2.0, 2.0, 3.0, 3.0, 4.0, 4.0, 5.0, 5.0,
                6.0, 6.0, 7.0, 7.0, 8.0, 8.0, 9.0, 9.0, 10.0, 10.0,
            ],
        ).unwrap();

        let indices: Vec<usize> = (0..10).collect();
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let tree = IsolationTree::build(&x, &indices, 0, 4, &mut rng);

        assert!(tree.depth() <= 4);
        let sample = ndarray::arr1(&[5.0, 5.0]);
        assert!(tree.path_length(sample.view(), 0) > 0.0);
    }

    fn constant_except_first_feature() -> Array2<f64> {
        // 40 identical rows and one that differs only in its first feature
        Array2::from_shape_fn((41, 3), |(i, j)| match (i, j) {
            (40, 0) => 30.0,
            (_, 0) => 10.0,
            _ => 2.0,
        })
    }

    #[test]
    fn test_split_skips_constant_features() {
        let x = constant_except_first_feature();
        let indices: Vec<usize> = (0..41).collect();
        for seed in 0..20 {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            let tree = IsolationTree::build(&x, &indices, 0, 6, &mut rng);
            match tree {
                IsolationTree::Internal { feature, .. } => assert_eq!(feature, 0),
                IsolationTree::External { .. } => panic!("root should split (seed {})", seed),
            }
        }

        let constant = Array2::from_elem((8, 3), 4.0);
        let indices: Vec<usize> = (0..8).collect();
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let tree = IsolationTree::build(&constant, &indices, 0, 6, &mut rng);
        assert!(matches!(tree, IsolationTree::External { size: 8, .. }));
    }

    #[test]
    fn test_outlier_on_single_varying_feature() {
        let x = constant_except_first_feature();
        let labels = fit_and_predict(&x, 100, 256, 42).unwrap();
        let anomalous: Vec<usize> = labels
            .iter()
            .enumerate()
            .filter(|(_, l)| l.is_anomalous())
            .map(|(i, _)| i)
            .collect();
        assert_eq!(anomalous, vec![40]);
    }

    #[test]
    fn test_average_path_length() {
        assert_eq!(average_path_length(0), 0.0);
        assert_eq!(average_path_length(1), 0.0);
        assert_eq!(average_path_length(2), 1.0);
        // 2 * (1 + 1/2 + 1/3) - 2 * 3 / 4
        let expected = 2.0 * (1.0 + 0.5 + 1.0 / 3.0) - 1.5;
        assert!((average_path_length(4) - expected).abs() < 1e-12);
        assert!(average_path_length(256) > average_path_length(128));
    }

    #[test]
    fn test_fit_and_predict_is_deterministic() {
        let x = clustered_with_outliers();
        let first = fit_and_predict(&x, 100, 32, 1234).unwrap();
        let second = fit_and_predict(&x, 100, 32, 1234).unwrap();
        assert_eq!(first, second);

        let mut a = IsolationForest::new().with_max_samples(32).with_seed(99);
        let mut b = IsolationForest::new().with_max_samples(32).with_seed(99);
        a.fit(&x).unwrap();
        b.fit(&x).unwrap();
        assert_eq!(a.score_samples(&x).unwrap(), b.score_samples(&x).unwrap());
    }

    #[test]
    fn test_empty_matrix_builds_nothing() {
        let x = Array2::<f64>::zeros((0, 3));
        let labels = fit_and_predict(&x, 100, 256, 42).unwrap();
        assert!(labels.is_empty());

        let mut iforest = IsolationForest::new();
        assert!(iforest.fit(&x).is_err());
        assert!(iforest.trees().is_none());
    }

    #[test]
    fn test_single_row_is_never_anomalous() {
        let x = Array2::from_shape_vec((1, 3), vec![1.0, 0.0, 0.0]).unwrap();
        let labels = fit_and_predict(&x, 100, 256, 42).unwrap();
        assert_eq!(labels, vec![AnomalyLabel::Normal]);

        let mut iforest = IsolationForest::new().with_contamination(0.5).with_seed(1);
        let labels = iforest.fit_predict(&x).unwrap();
        assert_eq!(labels, vec![AnomalyLabel::Normal]);
    }

    #[test]
    fn test_identical_rows_score_at_baseline() {
        let x = Array2::from_shape_fn((50, 3), |(_, j)| [12.0, 2.0, 2.0][j]);
        let mut iforest = IsolationForest::new().with_seed(42);
        let result = iforest.fit_predict(&x).unwrap();
        assert!(result.iter().all(|l| !l.is_anomalous()));

        let scores = iforest.score_samples(&x).unwrap();
        assert!(scores.iter().all(|&s| (s - AUTO_THRESHOLD).abs() < 1e-9));
    }

    #[test]
    fn test_invalid_parameters() {
        let x = clustered_with_outliers();
        let err = IsolationForest::new().with_n_estimators(0).fit(&x).unwrap_err();
        assert!(matches!(err, LogsiftError::InvalidParameter { .. }));
        let err = IsolationForest::new().with_max_samples(0).fit(&x).unwrap_err();
        assert!(matches!(err, LogsiftError::InvalidParameter { .. }));
    }

    #[test]
    fn test_not_fitted_and_shape_errors() {
        let x = clustered_with_outliers();
        let iforest = IsolationForest::new();
        assert!(matches!(iforest.score_samples(&x), Err(LogsiftError::ModelNotFitted)));

        let mut iforest = IsolationForest::new().with_seed(3);
        iforest.fit(&x).unwrap();
        let wrong = Array2::<f64>::zeros((4, 3));
        assert!(matches!(iforest.predict(&wrong), Err(LogsiftError::ShapeError { .. })));
    }

    #[test]
    fn test_non_finite_input_is_computation_error() {
        let mut x = clustered_with_outliers();
        x[[3, 1]] = f64::NAN;
        let err = IsolationForest::new().with_seed(1).fit(&x).unwrap_err();
        assert!(err.is_internal());
    }

    #[test]
    fn test_detect_reports_counts() {
        let x = clustered_with_outliers();
        let mut iforest = IsolationForest::new().with_seed(42);
        iforest.fit(&x).unwrap();
        let result = iforest.detect(&x).unwrap();
        assert_eq!(result.scores.len(), 52);
        assert_eq!(result.threshold, AUTO_THRESHOLD);
        assert_eq!(
            result.n_anomalies,
            result.labels.iter().filter(|l| l.is_anomalous()).count()
        );
    }
}
