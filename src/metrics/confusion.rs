use std::collections::HashMap;

use nalgebra::{DMatrix, DVector};

use crate::data::dataset::{distinct_sorted, WholeNumber};
use crate::error::TreeError;

/// Rows index the true class, columns the predicted class, both in
/// ascending label order over every class seen in either vector.
pub type ConfusionMatrix = DMatrix<usize>;

/// Scoring helpers shared by classifiers.
pub trait ClassificationMetrics<T: WholeNumber> {
    /// Computes the confusion matrix of a prediction run.
    ///
    /// # Errors
    ///
    /// Returns `TreeError::InvalidInput` when the label vectors differ in
    /// length or are empty.
    fn confusion_matrix(
        &self,
        y_true: &DVector<T>,
        y_pred: &DVector<T>,
    ) -> Result<ConfusionMatrix, TreeError> {
        check_lengths(y_true, y_pred)?;

        let classes = distinct_sorted(y_true.iter().chain(y_pred.iter()).copied().collect());
        let index = classes
            .iter()
            .copied()
            .enumerate()
            .map(|(position, class)| (class, position))
            .collect::<HashMap<_, _>>();

        let mut matrix = ConfusionMatrix::zeros(classes.len(), classes.len());
        for (truth, prediction) in y_true.iter().zip(y_pred.iter()) {
            matrix[(index[truth], index[prediction])] += 1;
        }
        Ok(matrix)
    }

    /// Fraction of predictions matching the true label.
    ///
    /// # Errors
    ///
    /// Returns `TreeError::InvalidInput` when the label vectors differ in
    /// length or are empty.
    fn accuracy(&self, y_true: &DVector<T>, y_pred: &DVector<T>) -> Result<f64, TreeError> {
        check_lengths(y_true, y_pred)?;

        let correct = y_true
            .iter()
            .zip(y_pred.iter())
            .filter(|(truth, prediction)| truth == prediction)
            .count();
        Ok(correct as f64 / y_true.len() as f64)
    }
}

fn check_lengths<T: WholeNumber>(
    y_true: &DVector<T>,
    y_pred: &DVector<T>,
) -> Result<(), TreeError> {
    if y_true.len() != y_pred.len() {
        return Err(TreeError::InvalidInput(format!(
            "{} labels but {} predictions",
            y_true.len(),
            y_pred.len()
        )));
    }
    if y_true.is_empty() {
        return Err(TreeError::InvalidInput("no labels to score".to_string()));
    }
    Ok(())
}
