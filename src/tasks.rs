//! The three data-parallel passes of the trainer: total squared error
//! (SumSqr), probabilistic candidate emission (Sampler), and the Lloyd
//! assignment/accumulation pass.

use rand::prelude::*;
use rand_chacha::ChaCha8Rng;

use crate::distance::{closest, min_sqr};
use crate::exec::ChunkTask;
use crate::frame::FrameChunk;
use crate::standardize::Standardizer;

/// Sum over all rows of the squared dissimilarity to the nearest centroid.
pub(crate) struct SumSqrTask<'a> {
    pub centers: &'a [Vec<f64>],
    pub standardizer: &'a Standardizer,
    pub ncats: usize,
}

impl ChunkTask for SumSqrTask<'_> {
    type Acc = f64;

    fn identity(&self) -> f64 {
        0.0
    }

    fn map(&self, chunk: &FrameChunk<'_>) -> f64 {
        let mut values = vec![0.0; self.standardizer.num_cols()];
        let mut sqr = 0.0;
        for row in 0..chunk.len() {
            self.standardizer.chunk_row(chunk, row, &mut values);
            sqr += min_sqr(self.centers, &values, self.ncats, self.centers.len());
        }
        sqr
    }

    fn reduce(&self, left: f64, right: f64) -> f64 {
        left + right
    }
}

/// Emit candidate centroids with probability proportional to squared
/// distance from the current set (one K-Means|| round).
///
/// Each chunk draws from its own RNG seeded `seed + chunk.start`, so the
/// emitted set is reproducible under a fixed chunking.
pub(crate) struct SamplerTask<'a> {
    pub centers: &'a [Vec<f64>],
    pub standardizer: &'a Standardizer,
    pub ncats: usize,
    /// Total squared error of the current centroid set (the normaliser).
    pub total_sqr: f64,
    /// Oversampling factor, `3 * k`.
    pub probability: f64,
    pub seed: u64,
}

impl ChunkTask for SamplerTask<'_> {
    type Acc = Vec<Vec<f64>>;

    fn identity(&self) -> Vec<Vec<f64>> {
        Vec::new()
    }

    fn map(&self, chunk: &FrameChunk<'_>) -> Vec<Vec<f64>> {
        let mut rng = ChaCha8Rng::seed_from_u64(self.seed.wrapping_add(chunk.start()));
        let mut values = vec![0.0; self.standardizer.num_cols()];
        let mut sampled = Vec::new();
        for row in 0..chunk.len() {
            self.standardizer.chunk_row(chunk, row, &mut values);
            let sqr = min_sqr(self.centers, &values, self.ncats, self.centers.len());
            if self.probability * sqr > rng.gen::<f64>() * self.total_sqr {
                sampled.push(values.clone());
            }
        }
        sampled
    }

    fn reduce(&self, mut left: Vec<Vec<f64>>, right: Vec<Vec<f64>>) -> Vec<Vec<f64>> {
        left.extend(right);
        left
    }
}

/// Accumulated state of one Lloyd pass.
#[derive(Debug, Clone)]
pub(crate) struct LloydsStats {
    /// Per-cluster mean vector (numeric positions; categorical positions
    /// are filled from the histograms after reduction).
    pub means: Vec<Vec<f64>>,
    /// Per-cluster sum of squared dissimilarity.
    pub sqrs: Vec<f64>,
    /// Per-cluster row count.
    pub rows: Vec<u64>,
    /// Per-cluster, per-categorical-column level histograms.
    pub cats: Vec<Vec<Vec<u64>>>,
    /// Row with the greatest dissimilarity to its assigned centroid.
    pub worst_row: u64,
    pub worst_err: f64,
}

/// Assign every row to its nearest centroid and accumulate per-cluster
/// sums, histograms, counts, and the single worst-fit row.
pub(crate) struct LloydsTask<'a> {
    pub centers: &'a [Vec<f64>],
    pub standardizer: &'a Standardizer,
    pub ncats: usize,
    pub k: usize,
    /// Cardinality of each of the leading `ncats` categorical columns.
    pub cardinalities: &'a [usize],
}

impl LloydsTask<'_> {
    fn empty_stats(&self) -> LloydsStats {
        let ncols = self.standardizer.num_cols();
        LloydsStats {
            means: vec![vec![0.0; ncols]; self.k],
            sqrs: vec![0.0; self.k],
            rows: vec![0; self.k],
            cats: vec![
                self.cardinalities
                    .iter()
                    .map(|&card| vec![0u64; card])
                    .collect();
                self.k
            ],
            worst_row: 0,
            worst_err: 0.0,
        }
    }
}

impl ChunkTask for LloydsTask<'_> {
    type Acc = LloydsStats;

    fn identity(&self) -> LloydsStats {
        self.empty_stats()
    }

    fn map(&self, chunk: &FrameChunk<'_>) -> LloydsStats {
        let ncols = self.standardizer.num_cols();
        let mut stats = self.empty_stats();
        let mut values = vec![0.0; ncols];

        for row in 0..chunk.len() {
            self.standardizer.chunk_row(chunk, row, &mut values);
            let cd = closest(self.centers, &values, self.ncats);
            let clu = cd.cluster;
            stats.sqrs[clu] += cd.dist;
            for col in 0..self.ncats {
                stats.cats[clu][col][values[col] as usize] += 1;
            }
            for col in self.ncats..ncols {
                stats.means[clu][col] += values[col];
            }
            stats.rows[clu] += 1;
            if cd.dist > stats.worst_err {
                stats.worst_err = cd.dist;
                stats.worst_row = chunk.start() + row as u64;
            }
        }
        // Scale sums back down to chunk-local means.
        for clu in 0..self.k {
            let rows = stats.rows[clu];
            if rows != 0 {
                for v in &mut stats.means[clu] {
                    *v /= rows as f64;
                }
            }
        }
        stats
    }

    fn reduce(&self, mut left: LloydsStats, right: LloydsStats) -> LloydsStats {
        for clu in 0..self.k {
            let ra = left.rows[clu];
            let rb = right.rows[clu];
            if ra + rb > 0 {
                let denom = (ra + rb) as f64;
                for c in 0..left.means[clu].len() {
                    // Recursive mean keeps precision for skewed chunk sizes.
                    left.means[clu][c] =
                        (left.means[clu][c] * ra as f64 + right.means[clu][c] * rb as f64) / denom;
                }
            }
            left.sqrs[clu] += right.sqrs[clu];
            left.rows[clu] += rb;
            for col in 0..self.ncats {
                for level in 0..left.cats[clu][col].len() {
                    left.cats[clu][col][level] += right.cats[clu][col][level];
                }
            }
        }
        if left.worst_err < right.worst_err {
            left.worst_err = right.worst_err;
            left.worst_row = right.worst_row;
        }
        left
    }
}
