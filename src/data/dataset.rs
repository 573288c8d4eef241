use csv::ReaderBuilder;
use nalgebra::{DMatrix, DVector};
use num_traits::{FromPrimitive, Num, ToPrimitive};
use rand::seq::SliceRandom;
use rand::{rngs::StdRng, SeedableRng};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::error::Error;
use std::fmt::{Debug, Display};
use std::fs::File;
use std::hash::Hash;
use std::io::Read;
use std::path::Path;

use crate::error::TreeError;

pub trait DataValue:
    Debug + Display + Clone + Copy + Num + FromPrimitive + ToPrimitive + Send + Sync + 'static
{
}

impl<T> DataValue for T where
    T: Debug + Display + Clone + Copy + Num + FromPrimitive + ToPrimitive + Send + Sync + 'static
{
}

/// Feature values: anything numeric with a total-enough ordering.
pub trait Number: DataValue + PartialOrd {}
impl<T> Number for T where T: DataValue + PartialOrd {}

/// Class labels: countable integers.
pub trait WholeNumber: Number + Eq + Hash {}
impl<T> WholeNumber for T where T: Number + Eq + Hash {}

/// A rectangular feature matrix paired with one label per row.
///
/// Datasets are never mutated in place; the partitioning helpers hand back
/// freshly materialized copies of the selected rows.
#[derive(Clone, Debug)]
pub struct Dataset<XT: Number, YT: WholeNumber> {
    pub x: DMatrix<XT>,
    pub y: DVector<YT>,
}

impl<XT: Number, YT: WholeNumber> Dataset<XT, YT> {
    pub fn new(x: DMatrix<XT>, y: DVector<YT>) -> Self {
        Self { x, y }
    }

    pub fn nrows(&self) -> usize {
        self.x.nrows()
    }

    pub fn n_features(&self) -> usize {
        self.x.ncols()
    }

    pub fn is_not_empty(&self) -> bool {
        !(self.x.is_empty() || self.y.is_empty())
    }

    fn select(&self, rows: &[usize]) -> Self {
        Self::new(self.x.select_rows(rows), self.y.select_rows(rows))
    }

    /// Partitions the rows on `x[(row, feature_index)] <= threshold`.
    ///
    /// Either side may come back empty when the threshold sits outside the
    /// column's value range.
    pub fn split_on_threshold(&self, feature_index: usize, threshold: XT) -> (Self, Self) {
        let (left_rows, right_rows): (Vec<usize>, Vec<usize>) =
            (0..self.nrows()).partition(|&row| self.x[(row, feature_index)] <= threshold);

        (self.select(&left_rows), self.select(&right_rows))
    }

    /// Shuffles the rows and splits them into a train and a test dataset.
    ///
    /// `train_size` is the fraction of rows kept for training. Passing a
    /// seed makes the shuffle reproducible.
    pub fn train_test_split(
        &self,
        train_size: f64,
        seed: Option<u64>,
    ) -> Result<(Self, Self), TreeError> {
        if !(0.0..=1.0).contains(&train_size) {
            return Err(TreeError::InvalidInput(format!(
                "train_size must lie in [0.0, 1.0], got {}",
                train_size
            )));
        }

        let mut rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let mut indices = (0..self.nrows()).collect::<Vec<_>>();
        indices.shuffle(&mut rng);
        let cut = (self.nrows() as f64 * train_size).floor() as usize;

        Ok((self.select(&indices[..cut]), self.select(&indices[cut..])))
    }
}

impl Dataset<f64, u32> {
    /// Reads a classification dataset from a CSV file.
    ///
    /// The first `n_features` fields of every record are parsed as `f64`
    /// features; the following field is the label. Label strings are mapped
    /// to dense class ids in order of first appearance.
    pub fn from_csv<P: AsRef<Path>>(
        path: P,
        n_features: usize,
        has_headers: bool,
    ) -> Result<Self, Box<dyn Error>> {
        Self::from_reader(File::open(path)?, n_features, has_headers)
    }

    pub fn from_reader<R: Read>(
        reader: R,
        n_features: usize,
        has_headers: bool,
    ) -> Result<Self, Box<dyn Error>> {
        let mut csv_reader = ReaderBuilder::new()
            .has_headers(has_headers)
            .from_reader(reader);

        let mut features = Vec::new();
        let mut labels: Vec<u32> = Vec::new();
        let mut class_ids: HashMap<String, u32> = HashMap::new();

        for record in csv_reader.records() {
            let record = record?;
            if record.len() < n_features + 1 {
                return Err(format!(
                    "expected {} features and a label, got {} fields",
                    n_features,
                    record.len()
                )
                .into());
            }

            for field in record.iter().take(n_features) {
                features.push(field.trim().parse::<f64>()?);
            }

            let label = record[n_features].trim();
            let next_id = class_ids.len() as u32;
            labels.push(*class_ids.entry(label.to_string()).or_insert(next_id));
        }

        if labels.is_empty() {
            return Err("no data rows in input".into());
        }

        let x = DMatrix::from_row_slice(labels.len(), n_features, &features);
        let y = DVector::from_vec(labels);
        Ok(Self::new(x, y))
    }
}

/// Sorts ascending and drops duplicates, e.g. the candidate thresholds of
/// one feature column.
pub(crate) fn distinct_sorted<T: Number>(mut values: Vec<T>) -> Vec<T> {
    values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
    values.dedup();
    values
}
