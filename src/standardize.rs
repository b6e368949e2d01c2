//! Per-column centering/scaling and NA imputation applied when rows are
//! materialised for a pass, and reversed when centroids are reported.

use serde::{Deserialize, Serialize};

use crate::frame::{Frame, FrameChunk};

const MIN_SIGMA: f64 = 1e-6;

/// Column-wise materialisation rule derived once from the training frame.
///
/// Numeric columns: missing values become the column mean; when
/// standardisation is enabled the value is then centred and scaled by
/// `1/sigma` (columns with near-zero sigma keep a unit multiplier).
/// Categorical columns: missing values become the rounded mean level code,
/// clamped to the domain; no scaling is applied.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Standardizer {
    means: Vec<f64>,
    mults: Option<Vec<f64>>,
    cardinalities: Vec<Option<usize>>,
}

impl Standardizer {
    /// Derive the rule from per-column frame statistics.
    pub fn from_frame(frame: &Frame, standardize: bool) -> Self {
        let ncols = frame.num_cols();
        let means = (0..ncols).map(|i| frame.column(i).mean()).collect();
        let cardinalities = (0..ncols).map(|i| frame.column(i).cardinality()).collect();
        let mults = standardize.then(|| {
            (0..ncols)
                .map(|i| {
                    let sigma = frame.column(i).sigma();
                    if sigma > MIN_SIGMA {
                        1.0 / sigma
                    } else {
                        1.0
                    }
                })
                .collect()
        });
        Self {
            means,
            mults,
            cardinalities,
        }
    }

    /// Number of columns the rule covers.
    pub fn num_cols(&self) -> usize {
        self.means.len()
    }

    /// Apply the materialisation rule to one raw cell value.
    pub fn value(&self, mut d: f64, col: usize) -> f64 {
        match self.cardinalities[col] {
            None => {
                if d.is_nan() {
                    d = self.means[col];
                }
                if let Some(mults) = &self.mults {
                    d -= self.means[col];
                    d *= mults[col];
                }
                d
            }
            Some(cardinality) => {
                if d.is_nan() {
                    d = (self.means[col].round() as usize).min(cardinality - 1) as f64;
                }
                d
            }
        }
    }

    /// Materialise one chunk-local row into `out`.
    pub fn chunk_row(&self, chunk: &FrameChunk<'_>, local_row: usize, out: &mut [f64]) {
        for col in 0..out.len() {
            out[col] = self.value(chunk.at(local_row, col), col);
        }
    }

    /// Materialise one whole-frame row into `out`.
    pub fn frame_row(&self, frame: &Frame, row: u64, out: &mut [f64]) {
        for col in 0..out.len() {
            out[col] = self.value(frame.value(row as usize, col), col);
        }
    }

    /// Reverse the numeric-column transform for a set of centroids.
    ///
    /// Categorical positions (the leading `ncats`) pass through untouched.
    pub fn destandardize(&self, centers: &[Vec<f64>], ncats: usize) -> Vec<Vec<f64>> {
        centers
            .iter()
            .map(|center| {
                let mut out = center.clone();
                if let Some(mults) = &self.mults {
                    for col in ncats..out.len() {
                        out[col] = out[col] / mults[col] + self.means[col];
                    }
                }
                out
            })
            .collect()
    }
}
