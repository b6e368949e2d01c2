//! Trained model: reported output fields, row scoring, JSON persistence.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::distance::closest;
use crate::driver::KMeansParams;
use crate::error::Result;
use crate::standardize::Standardizer;

/// Reported training state, in destandardized coordinates.
///
/// Snapshots of this struct are published after every K-Means|| round and
/// every accepted Lloyd iteration; the final one is carried by the model.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KMeansOutput {
    /// Column names in training order (categoricals first).
    pub names: Vec<String>,
    /// Destandardized cluster centers.
    pub centroids: Vec<Vec<f64>>,
    /// Count of categorical columns, occupying the leading positions.
    pub ncats: usize,
    /// Rows assigned to each cluster.
    pub rows: Vec<u64>,
    /// Mean squared dissimilarity within each cluster.
    pub withinmse: Vec<f64>,
    /// Average within-cluster squared dissimilarity over all rows.
    pub avgwithinss: f64,
    /// Average squared dissimilarity to the grand mean.
    pub avgss: f64,
    /// `avgss - avgwithinss`.
    pub avgbetweenss: f64,
    /// Completed iterations (sampling rounds while initialising, Lloyd
    /// iterations once the main loop runs).
    pub iterations: usize,
}

/// Trained k-means model.
///
/// Keeps the standardized centers and the materialisation rule alongside
/// the reported output so raw rows can be scored later.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KMeansModel {
    /// Parameters the model was trained with.
    pub params: KMeansParams,
    /// Reported training output.
    pub output: KMeansOutput,
    centers: Vec<Vec<f64>>,
    standardizer: Standardizer,
}

impl KMeansModel {
    pub(crate) fn new(
        params: KMeansParams,
        output: KMeansOutput,
        centers: Vec<Vec<f64>>,
        standardizer: Standardizer,
    ) -> Self {
        Self {
            params,
            output,
            centers,
            standardizer,
        }
    }

    /// Nearest cluster for a raw (unstandardized) row in training column
    /// order. Missing values are imputed with the training-time rule.
    pub fn predict_row(&self, point: &[f64]) -> usize {
        debug_assert_eq!(point.len(), self.standardizer.num_cols());
        let values: Vec<f64> = point
            .iter()
            .enumerate()
            .map(|(col, &d)| self.standardizer.value(d, col))
            .collect();
        closest(&self.centers, &values, self.output.ncats).cluster
    }

    /// Persist the model as pretty-printed JSON.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::{Initialization, KMeansParams};
    use crate::frame::{Column, Frame};

    fn model() -> KMeansModel {
        let cat = Column::categorical_coded("c", vec![0.0, 1.0], 2).unwrap();
        let num = Column::numeric("x", vec![0.0, 10.0]);
        let frame = Frame::new(vec![cat, num]).unwrap();
        let standardizer = Standardizer::from_frame(&frame, false);
        let centers = vec![vec![0.0, 0.0], vec![1.0, 10.0]];
        let params = KMeansParams {
            k: 2,
            max_iters: 10,
            init: Initialization::Furthest,
            standardize: false,
            seed: 0,
        };
        let output = KMeansOutput {
            names: frame.names(),
            centroids: centers.clone(),
            ncats: 1,
            rows: vec![1, 1],
            ..KMeansOutput::default()
        };
        KMeansModel::new(params, output, centers, standardizer)
    }

    #[test]
    fn predict_row_returns_nearest_center() {
        let model = model();
        assert_eq!(model.predict_row(&[0.0, 1.0]), 0);
        assert_eq!(model.predict_row(&[1.0, 9.0]), 1);
    }

    #[test]
    fn predict_row_imputes_missing_values() {
        let model = model();
        // numeric NaN becomes the column mean (5.0), categorical decides
        assert_eq!(model.predict_row(&[0.0, f64::NAN]), 0);
        assert_eq!(model.predict_row(&[1.0, f64::NAN]), 1);
    }

    #[test]
    fn model_round_trips_through_json() {
        let model = model();
        let json = serde_json::to_string(&model).unwrap();
        let restored: KMeansModel = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.output.centroids, model.output.centroids);
        assert_eq!(restored.predict_row(&[1.0, 9.0]), 1);
    }
}
