//! Decision Tree Classifier
use log::debug;
use nalgebra::{DMatrix, DVector};
use std::collections::HashMap;

use super::{node::TreeNode, params::TreeParams};
use crate::data::dataset::{distinct_sorted, Dataset, Number, WholeNumber};
use crate::error::TreeError;
use crate::metrics::confusion::ClassificationMetrics;

/// Guard added inside `log2` so a class whose probability mass collapses to
/// zero under float rounding cannot produce NaN. Never added to the
/// probability used for weighting.
const LOG_GUARD: f64 = 1e-9;

/// A winning split candidate with its materialized row partitions.
struct SplitData<XT: Number, YT: WholeNumber> {
    feature_index: usize,
    threshold: XT,
    left: Dataset<XT, YT>,
    right: Dataset<XT, YT>,
}

/// Binary decision tree classifier splitting on information gain.
///
/// `fit` grows the tree by exhaustive threshold search over every feature
/// column; `predict` routes each row through the stored tree. Re-fitting
/// replaces the tree wholesale.
#[derive(Clone, Debug)]
pub struct DecisionTreeClassifier<XT: Number, YT: WholeNumber> {
    root: Option<Box<TreeNode<XT, YT>>>,
    params: TreeParams,
    n_features: Option<usize>,
}

impl<XT: Number, YT: WholeNumber> Default for DecisionTreeClassifier<XT, YT> {
    fn default() -> Self {
        Self::new()
    }
}

impl<XT: Number, YT: WholeNumber> ClassificationMetrics<YT> for DecisionTreeClassifier<XT, YT> {}

impl<XT: Number, YT: WholeNumber> DecisionTreeClassifier<XT, YT> {
    pub fn new() -> Self {
        Self {
            root: None,
            params: TreeParams::new(),
            n_features: None,
        }
    }

    pub fn with_params(max_depth: Option<u16>) -> Self {
        let mut params = TreeParams::new();
        params.set_max_depth(max_depth);
        Self {
            root: None,
            params,
            n_features: None,
        }
    }

    pub fn max_depth(&self) -> Option<u16> {
        self.params.max_depth()
    }

    /// Read-only view of the fitted tree, if any.
    pub fn root(&self) -> Option<&TreeNode<XT, YT>> {
        self.root.as_deref()
    }

    /// Builds the decision tree from a dataset.
    ///
    /// # Errors
    ///
    /// Returns `TreeError::InvalidInput` when the number of rows and labels
    /// differ, the dataset is empty, or the feature matrix has no columns
    /// while the labels hold more than one class.
    pub fn fit(&mut self, dataset: &Dataset<XT, YT>) -> Result<(), TreeError> {
        let (n_samples, n_features) = dataset.x.shape();
        if n_samples != dataset.y.len() {
            return Err(TreeError::InvalidInput(format!(
                "feature matrix has {} rows but {} labels were given",
                n_samples,
                dataset.y.len()
            )));
        }
        if n_samples == 0 {
            return Err(TreeError::InvalidInput("training set is empty".to_string()));
        }
        if n_features == 0 && Self::single_class(&dataset.y).is_none() {
            return Err(TreeError::InvalidInput(
                "feature matrix has no columns but labels hold more than one class".to_string(),
            ));
        }

        debug!(
            "fitting decision tree on {} samples with {} features",
            n_samples, n_features
        );
        let root = self.build_tree(dataset, 0);
        debug!("decision tree built to depth {}", root.depth());

        self.root = Some(Box::new(root));
        self.n_features = Some(n_features);
        Ok(())
    }

    /// Predicts one label per input row, in input order.
    ///
    /// # Errors
    ///
    /// Returns `TreeError::NotFitted` before a successful `fit`, and
    /// `TreeError::InvalidInput` when the column count differs from the
    /// training matrix.
    pub fn predict(&self, features: &DMatrix<XT>) -> Result<DVector<YT>, TreeError> {
        let root = self.root.as_ref().ok_or(TreeError::NotFitted)?;
        if Some(features.ncols()) != self.n_features {
            return Err(TreeError::InvalidInput(format!(
                "expected {} feature columns, got {}",
                self.n_features.unwrap_or(0),
                features.ncols()
            )));
        }

        let predictions = features
            .row_iter()
            .map(|row| Self::predict_row(&row.transpose(), root))
            .collect::<Vec<_>>();

        Ok(DVector::from_vec(predictions))
    }

    fn predict_row(features: &DVector<XT>, root: &TreeNode<XT, YT>) -> YT {
        let mut node = root;
        loop {
            match node {
                TreeNode::Leaf { prediction } => return *prediction,
                TreeNode::Decision {
                    feature_index,
                    threshold,
                    left,
                    right,
                } => {
                    node = if features[*feature_index] <= *threshold {
                        left.as_ref()
                    } else {
                        right.as_ref()
                    };
                }
            }
        }
    }

    fn build_tree(&self, dataset: &Dataset<XT, YT>, depth: u16) -> TreeNode<XT, YT> {
        if let Some(class) = Self::single_class(&dataset.y) {
            return TreeNode::leaf(class);
        }
        if self.max_depth().is_some_and(|limit| depth >= limit) {
            return TreeNode::leaf(Self::majority_class(&dataset.y));
        }

        match self.best_split(dataset) {
            Some(split) if split.left.is_not_empty() && split.right.is_not_empty() => {
                let left = self.build_tree(&split.left, depth + 1);
                let right = self.build_tree(&split.right, depth + 1);
                TreeNode::Decision {
                    feature_index: split.feature_index,
                    threshold: split.threshold,
                    left: Box::new(left),
                    right: Box::new(right),
                }
            }
            // A winning split with an empty side means no candidate cut the
            // subset apart; descending further cannot make progress.
            _ => TreeNode::leaf(Self::majority_class(&dataset.y)),
        }
    }

    /// Exhaustively scores every (feature, distinct value) candidate and
    /// keeps the strictly best one, so equal gains resolve to the lowest
    /// feature index and then the lowest threshold.
    fn best_split(&self, dataset: &Dataset<XT, YT>) -> Option<SplitData<XT, YT>> {
        let mut best: Option<SplitData<XT, YT>> = None;
        let mut best_gain = f64::NEG_INFINITY;

        for feature_index in 0..dataset.n_features() {
            let thresholds =
                distinct_sorted(dataset.x.column(feature_index).iter().copied().collect());

            for threshold in thresholds {
                let (left, right) = dataset.split_on_threshold(feature_index, threshold);
                let gain = Self::information_gain(&dataset.y, &left.y, &right.y);

                if gain > best_gain {
                    best_gain = gain;
                    best = Some(SplitData {
                        feature_index,
                        threshold,
                        left,
                        right,
                    });
                }
            }
        }
        best
    }

    /// Parent entropy minus the count-weighted entropy of both children.
    /// An empty child carries weight zero and contributes nothing.
    fn information_gain(
        parent: &DVector<YT>,
        left: &DVector<YT>,
        right: &DVector<YT>,
    ) -> f64 {
        let total = parent.len() as f64;
        let mut children = 0.0;
        if !left.is_empty() {
            children += left.len() as f64 / total * Self::entropy(left);
        }
        if !right.is_empty() {
            children += right.len() as f64 / total * Self::entropy(right);
        }
        Self::entropy(parent) - children
    }

    /// Shannon entropy of the label distribution, in bits. Classes are
    /// summed in ascending order so the result is bit-for-bit reproducible.
    fn entropy(y: &DVector<YT>) -> f64 {
        let total = y.len() as f64;
        let classes = distinct_sorted(y.iter().copied().collect());
        classes
            .into_iter()
            .map(|class| {
                let count = y.iter().filter(|&&label| label == class).count();
                let p = count as f64 / total;
                -p * (p + LOG_GUARD).log2()
            })
            .sum()
    }

    /// The most frequent class; equal counts resolve to the smallest class
    /// value.
    fn majority_class(y: &DVector<YT>) -> YT {
        let counts = Self::class_counts(y);
        let classes = distinct_sorted(counts.keys().copied().collect());

        let mut winner = classes[0];
        let mut winner_count = counts[&winner];
        for class in classes.into_iter().skip(1) {
            let count = counts[&class];
            if count > winner_count {
                winner = class;
                winner_count = count;
            }
        }
        winner
    }

    fn class_counts(y: &DVector<YT>) -> HashMap<YT, usize> {
        let mut counts = HashMap::new();
        for label in y.iter() {
            *counts.entry(*label).or_insert(0) += 1;
        }
        counts
    }

    /// `Some(class)` when every label is the same, `None` otherwise.
    fn single_class(y: &DVector<YT>) -> Option<YT> {
        let first = *y.iter().next()?;
        y.iter().all(|label| *label == first).then_some(first)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    type Classifier = DecisionTreeClassifier<f64, u8>;

    fn two_class_dataset() -> Dataset<f64, u8> {
        Dataset::new(
            DMatrix::from_row_slice(4, 1, &[1.0, 2.0, 3.0, 4.0]),
            DVector::from_vec(vec![0, 0, 1, 1]),
        )
    }

    #[test]
    fn test_entropy_of_pure_labels_is_zero() {
        let pure = DVector::from_vec(vec![1u8, 1, 1, 1]);
        assert_abs_diff_eq!(Classifier::entropy(&pure), 0.0, epsilon = 1e-6);

        let single = DVector::from_vec(vec![3u8]);
        assert_abs_diff_eq!(Classifier::entropy(&single), 0.0, epsilon = 1e-6);
    }

    #[test]
    fn test_entropy_of_balanced_binary_labels_is_one_bit() {
        let y = DVector::from_vec(vec![0u8, 0, 1, 1]);
        assert_abs_diff_eq!(Classifier::entropy(&y), 1.0, epsilon = 1e-6);
    }

    #[test]
    fn test_entropy_stays_within_class_bound() {
        let y = DVector::from_vec(vec![0u8, 1, 2, 0, 1, 2]);
        let entropy = Classifier::entropy(&y);
        assert!(entropy >= -1e-6);
        assert!(entropy <= 3.0_f64.log2() + 1e-6);

        let skewed = DVector::from_vec(vec![0u8, 0, 0, 1]);
        let entropy = Classifier::entropy(&skewed);
        assert!(entropy > 0.0 && entropy < 1.0);
    }

    #[test]
    fn test_information_gain_of_perfect_split() {
        let parent = DVector::from_vec(vec![0u8, 0, 1, 1]);
        let left = DVector::from_vec(vec![0u8, 0]);
        let right = DVector::from_vec(vec![1u8, 1]);

        let gain = Classifier::information_gain(&parent, &left, &right);
        assert_abs_diff_eq!(gain, 1.0, epsilon = 1e-6);
    }

    #[test]
    fn test_information_gain_with_empty_side_is_zero() {
        let parent = DVector::from_vec(vec![0u8, 0, 1, 1]);
        let empty = DVector::from_vec(Vec::<u8>::new());

        let gain = Classifier::information_gain(&parent, &parent, &empty);
        assert_abs_diff_eq!(gain, 0.0, epsilon = 1e-6);
    }

    #[test]
    fn test_majority_class_breaks_ties_toward_lowest() {
        let tied = DVector::from_vec(vec![1u8, 0, 0, 1]);
        assert_eq!(Classifier::majority_class(&tied), 0);

        let clear = DVector::from_vec(vec![2u8, 2, 1]);
        assert_eq!(Classifier::majority_class(&clear), 2);
    }

    #[test]
    fn test_best_split_finds_concrete_threshold() {
        let classifier = Classifier::new();
        let split = classifier.best_split(&two_class_dataset()).unwrap();

        assert_eq!(split.feature_index, 0);
        assert_eq!(split.threshold, 2.0);
        assert_eq!(split.left.y, DVector::from_vec(vec![0, 0]));
        assert_eq!(split.right.y, DVector::from_vec(vec![1, 1]));
    }

    #[test]
    fn test_equal_gain_keeps_lowest_feature_index() {
        let dataset = Dataset::new(
            DMatrix::from_row_slice(4, 2, &[0.0, 0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 1.0]),
            DVector::from_vec(vec![0u8, 0, 1, 1]),
        );

        let classifier = Classifier::new();
        let split = classifier.best_split(&dataset).unwrap();
        assert_eq!(split.feature_index, 0);
        assert_eq!(split.threshold, 0.0);
    }

    #[test]
    fn test_fit_builds_concrete_tree() {
        let mut classifier = Classifier::new();
        classifier.fit(&two_class_dataset()).unwrap();

        let expected = TreeNode::Decision {
            feature_index: 0,
            threshold: 2.0,
            left: Box::new(TreeNode::leaf(0)),
            right: Box::new(TreeNode::leaf(1)),
        };
        assert_eq!(classifier.root(), Some(&expected));
    }

    #[test]
    fn test_predict_concrete_scenario() {
        let mut classifier = Classifier::new();
        classifier.fit(&two_class_dataset()).unwrap();

        let test_x = DMatrix::from_row_slice(2, 1, &[1.5, 3.5]);
        let predictions = classifier.predict(&test_x).unwrap();
        assert_eq!(predictions, DVector::from_vec(vec![0, 1]));
    }

    #[test]
    fn test_max_depth_zero_yields_majority_leaf() {
        let mut classifier = Classifier::with_params(Some(0));
        classifier.fit(&two_class_dataset()).unwrap();

        // 2 vs 2 tie between classes 0 and 1 resolves to 0.
        assert_eq!(classifier.root(), Some(&TreeNode::leaf(0)));

        let test_x = DMatrix::from_row_slice(2, 1, &[10.0, -10.0]);
        let predictions = classifier.predict(&test_x).unwrap();
        assert_eq!(predictions, DVector::from_vec(vec![0, 0]));
    }

    #[test]
    fn test_depth_never_exceeds_configured_limit() {
        let dataset = Dataset::new(
            DMatrix::from_row_slice(6, 1, &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]),
            DVector::from_vec(vec![0u8, 1, 0, 1, 0, 1]),
        );

        for limit in [1u16, 2, 3] {
            let mut classifier = Classifier::with_params(Some(limit));
            classifier.fit(&dataset).unwrap();
            assert!(classifier.root().unwrap().depth() <= limit as usize);
        }
    }

    #[test]
    fn test_pure_dataset_yields_single_leaf() {
        let dataset = Dataset::new(
            DMatrix::from_row_slice(3, 2, &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]),
            DVector::from_vec(vec![7u8, 7, 7]),
        );

        let mut classifier = Classifier::new();
        classifier.fit(&dataset).unwrap();
        assert_eq!(classifier.root(), Some(&TreeNode::leaf(7)));

        let predictions = classifier.predict(&dataset.x).unwrap();
        assert!(predictions.iter().all(|&label| label == 7));
    }

    #[test]
    fn test_identical_rows_fall_back_to_majority_leaf() {
        let dataset = Dataset::new(
            DMatrix::from_row_slice(2, 1, &[5.0, 5.0]),
            DVector::from_vec(vec![0u8, 1]),
        );

        let mut classifier = Classifier::new();
        classifier.fit(&dataset).unwrap();
        assert_eq!(classifier.root(), Some(&TreeNode::leaf(0)));
    }

    #[test]
    fn test_repeated_fits_are_deterministic() {
        let dataset = Dataset::new(
            DMatrix::from_row_slice(
                6,
                2,
                &[
                    1.0, 4.0, 2.0, 3.0, 3.0, 2.0, 4.0, 1.0, 5.0, 2.5, 6.0, 3.5,
                ],
            ),
            DVector::from_vec(vec![0u8, 0, 1, 1, 2, 2]),
        );

        let mut first = Classifier::new();
        first.fit(&dataset).unwrap();
        let mut second = Classifier::new();
        second.fit(&dataset).unwrap();

        assert_eq!(first.root(), second.root());
        assert_eq!(
            first.predict(&dataset.x).unwrap(),
            second.predict(&dataset.x).unwrap()
        );
    }

    #[test]
    fn test_refit_replaces_the_tree() {
        let mut classifier = Classifier::new();
        classifier.fit(&two_class_dataset()).unwrap();

        let pure = Dataset::new(
            DMatrix::from_row_slice(2, 1, &[1.0, 2.0]),
            DVector::from_vec(vec![4u8, 4]),
        );
        classifier.fit(&pure).unwrap();
        assert_eq!(classifier.root(), Some(&TreeNode::leaf(4)));
    }

    #[test]
    fn test_predictions_cover_rows_with_training_classes() {
        let dataset = Dataset::new(
            DMatrix::from_row_slice(
                6,
                2,
                &[
                    1.0, 1.0, 1.5, 2.0, 4.0, 4.5, 4.2, 5.0, 8.0, 8.5, 9.0, 7.5,
                ],
            ),
            DVector::from_vec(vec![0u8, 0, 1, 1, 2, 2]),
        );

        let mut classifier = Classifier::new();
        classifier.fit(&dataset).unwrap();

        let test_x = DMatrix::from_row_slice(4, 2, &[0.5, 0.5, 3.9, 4.1, 7.7, 8.0, 100.0, 100.0]);
        let predictions = classifier.predict(&test_x).unwrap();

        assert_eq!(predictions.len(), 4);
        assert!(predictions.iter().all(|label| [0, 1, 2].contains(label)));
    }

    #[test]
    fn test_predict_before_fit_fails() {
        let classifier = Classifier::new();
        let test_x = DMatrix::from_row_slice(1, 1, &[1.0]);
        assert_eq!(classifier.predict(&test_x), Err(TreeError::NotFitted));
    }

    #[test]
    fn test_fit_rejects_shape_mismatch() {
        let dataset = Dataset::new(
            DMatrix::from_row_slice(2, 1, &[1.0, 2.0]),
            DVector::from_vec(vec![0u8, 1, 1]),
        );

        let mut classifier = Classifier::new();
        assert!(matches!(
            classifier.fit(&dataset),
            Err(TreeError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_fit_rejects_empty_training_set() {
        let dataset =
            Dataset::<f64, u8>::new(DMatrix::from_row_slice(0, 1, &[]), DVector::from_vec(vec![]));

        let mut classifier = Classifier::new();
        assert!(matches!(
            classifier.fit(&dataset),
            Err(TreeError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_fit_rejects_zero_columns_with_mixed_labels() {
        let dataset = Dataset::new(
            DMatrix::from_row_slice(2, 0, &[]),
            DVector::from_vec(vec![0u8, 1]),
        );

        let mut classifier = Classifier::new();
        assert!(matches!(
            classifier.fit(&dataset),
            Err(TreeError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_fit_accepts_zero_columns_when_pure() {
        let dataset = Dataset::new(
            DMatrix::from_row_slice(2, 0, &[]),
            DVector::from_vec(vec![3u8, 3]),
        );

        let mut classifier = Classifier::new();
        classifier.fit(&dataset).unwrap();
        assert_eq!(classifier.root(), Some(&TreeNode::leaf(3)));
    }

    #[test]
    fn test_predict_rejects_column_mismatch() {
        let mut classifier = Classifier::new();
        classifier.fit(&two_class_dataset()).unwrap();

        let test_x = DMatrix::from_row_slice(1, 2, &[1.0, 2.0]);
        assert!(matches!(
            classifier.predict(&test_x),
            Err(TreeError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_best_split_gain_is_non_negative_for_mixed_node() {
        let dataset = Dataset::new(
            DMatrix::from_row_slice(4, 1, &[1.0, 1.0, 2.0, 2.0]),
            DVector::from_vec(vec![0u8, 1, 0, 1]),
        );

        let classifier = Classifier::new();
        let split = classifier.best_split(&dataset).unwrap();
        let gain =
            Classifier::information_gain(&dataset.y, &split.left.y, &split.right.y);
        assert!(gain >= 0.0 - 1e-9);
    }
}
