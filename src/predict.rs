//! Class label prediction
//!
//! Prediction maps each instance into the simplex space with the trained
//! weights and assigns the label of the nearest simplex vertex.

use crate::data::Dataset;
use crate::error::{GenSvmError, Result};
use crate::model::SvmModel;
use crate::simplex::simplex;

/// Predict the class labels of a dataset
///
/// The dataset must be in the same representation the model was trained on;
/// kernel-trained models require the test data to be postprocessed with
/// [`crate::kernel::postprocess`] first.
pub fn predict_labels(data: &Dataset, model: &SvmModel) -> Result<Vec<usize>> {
    if data.z.n_cols() != model.v.nrows() {
        return Err(GenSvmError::DimensionMismatch(format!(
            "data has {} augmented features, model expects {}",
            data.z.n_cols(),
            model.v.nrows()
        )));
    }

    let k = model.k;
    let u = simplex(k);
    let zv = data.z.multiply(&model.v);

    let mut labels = Vec::with_capacity(data.n);
    for i in 0..data.n {
        let mut best_label = 0;
        let mut min_dist = f64::INFINITY;
        for j in 0..k {
            let mut dist = 0.0;
            for c in 0..k - 1 {
                let d = zv[(i, c)] - u[(j, c)];
                dist += d * d;
            }
            let dist = dist.sqrt();
            if dist < min_dist {
                best_label = j + 1;
                min_dist = dist;
            }
        }
        labels.push(best_label);
    }
    Ok(labels)
}

/// Percentage of correctly predicted labels
pub fn prediction_accuracy(y: &[usize], predicted: &[usize]) -> f64 {
    let correct = y
        .iter()
        .zip(predicted.iter())
        .filter(|(a, b)| a == b)
        .count();
    correct as f64 / y.len() as f64 * 100.0
}
