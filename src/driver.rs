//! Training orchestration: parameter validation, K-Means|| initialisation,
//! and the Lloyd convergence loop with empty-cluster rescue.

use std::fmt;
use std::str::FromStr;

use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::distance::distance;
use crate::error::{KMeansError, Result};
use crate::exec::{self, Job};
use crate::frame::Frame;
use crate::model::{KMeansModel, KMeansOutput};
use crate::recluster::{random_row, recluster};
use crate::standardize::Standardizer;
use crate::tasks::{LloydsTask, SamplerTask, SumSqrTask};

/// Number of K-Means|| oversampling rounds.
const INIT_ROUNDS: usize = 5;
/// Oversampling multiplier per round (`l = OVERSAMPLE_FACTOR * k`).
const OVERSAMPLE_FACTOR: usize = 3;
/// Lloyd stops once the average per-feature center movement drops below this.
const CONVERGENCE_TOL: f64 = 1e-6;

const MAX_K: usize = 10_000_000;
const MAX_ITERS: usize = 1_000_000;

/// Strategy used to seed initial centroids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Initialization {
    /// Seed all k centroids from uniformly-sampled rows, skipping K-Means||.
    None,
    /// K-Means|| oversampling reduced with the k-means++ first-fit scan.
    PlusPlus,
    /// K-Means|| oversampling reduced by repeatedly taking the furthest candidate.
    Furthest,
}

impl Default for Initialization {
    fn default() -> Self {
        Self::PlusPlus
    }
}

impl fmt::Display for Initialization {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Initialization::None => write!(f, "none"),
            Initialization::PlusPlus => write!(f, "plusplus"),
            Initialization::Furthest => write!(f, "furthest"),
        }
    }
}

impl FromStr for Initialization {
    type Err = KMeansError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "none" => Ok(Self::None),
            "plusplus" | "plus-plus" | "kmeans||" => Ok(Self::PlusPlus),
            "furthest" => Ok(Self::Furthest),
            other => Err(KMeansError::InvalidConfig(format!(
                "unsupported initialisation '{other}'"
            ))),
        }
    }
}

/// Configurable knobs for a training run, immutable once training starts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KMeansParams {
    /// Number of clusters to fit.
    pub k: usize,
    /// Maximum Lloyd iterations before giving up on convergence.
    pub max_iters: usize,
    /// Centroid initialisation strategy.
    pub init: Initialization,
    /// Whether to z-score standardize numeric columns.
    pub standardize: bool,
    /// Seed for every random draw of the run.
    pub seed: u64,
}

impl Default for KMeansParams {
    fn default() -> Self {
        Self {
            k: 8,
            max_iters: 300,
            init: Initialization::default(),
            standardize: true,
            seed: 42,
        }
    }
}

impl KMeansParams {
    /// Validate parameters against a specific training frame.
    pub fn validate(&self, frame: &Frame) -> Result<()> {
        if self.k < 1 || self.k > MAX_K {
            return Err(KMeansError::InvalidConfig(format!(
                "k must be between 1 and 1e7, got {}",
                self.k
            )));
        }
        if self.max_iters < 1 || self.max_iters > MAX_ITERS {
            return Err(KMeansError::InvalidConfig(format!(
                "max_iters must be between 1 and 1e6, got {}",
                self.max_iters
            )));
        }
        if frame.num_rows() < self.k {
            return Err(KMeansError::InvalidConfig(format!(
                "cannot make {} clusters out of {} rows",
                self.k,
                frame.num_rows()
            )));
        }
        Ok(())
    }
}

/// Train a model, observing cancellation and publishing snapshots through
/// the supplied job handle.
///
/// The frame is borrowed for the whole run (its categorical columns are
/// permuted to the front once, before any pass). On failure the job is
/// cancelled; in every case it is marked done.
pub fn train_model_with_job(
    params: &KMeansParams,
    frame: &mut Frame,
    job: &Job,
) -> Result<KMeansModel> {
    params.validate(frame)?;
    job.start(params.max_iters as u64);
    let result = Driver::new(params, frame, job).run();
    if result.is_err() {
        job.cancel();
    }
    job.done();
    result
}

/// Train a model with a throwaway job handle.
pub fn train_model(params: &KMeansParams, frame: &mut Frame) -> Result<KMeansModel> {
    train_model_with_job(params, frame, &Job::new())
}

struct Driver<'a> {
    params: &'a KMeansParams,
    frame: &'a Frame,
    job: &'a Job,
    standardizer: Standardizer,
    ncats: usize,
    cardinalities: Vec<usize>,
}

impl<'a> Driver<'a> {
    fn new(params: &'a KMeansParams, frame: &'a mut Frame, job: &'a Job) -> Self {
        let ncats = permute_categoricals(frame);
        let standardizer = Standardizer::from_frame(frame, params.standardize);
        let cardinalities: Vec<usize> = (0..ncats)
            .filter_map(|col| frame.column(col).cardinality())
            .collect();
        debug_assert_eq!(cardinalities.len(), ncats);
        Self {
            params,
            frame,
            job,
            standardizer,
            ncats,
            cardinalities,
        }
    }

    fn run(&self) -> Result<KMeansModel> {
        let k = self.params.k;
        let ncols = self.frame.num_cols();
        let mut output = KMeansOutput {
            names: self.frame.names(),
            ncats: self.ncats,
            ..KMeansOutput::default()
        };
        let mut rng = ChaCha8Rng::seed_from_u64(self.params.seed.wrapping_sub(1));

        let mut centers = if self.params.init == Initialization::None {
            (0..k)
                .map(|_| {
                    let mut center = vec![0.0; ncols];
                    random_row(self.frame, &self.standardizer, &mut rng, &mut center);
                    center
                })
                .collect()
        } else {
            let candidates = self.oversample(&mut output, &mut rng)?;
            recluster(&candidates, k, self.params.init, self.ncats, &mut rng)
        };
        output.iterations = 0;

        self.lloyd(&mut centers, &mut output)?;

        Ok(KMeansModel::new(
            self.params.clone(),
            output,
            centers,
            self.standardizer.clone(),
        ))
    }

    /// Five K-Means|| rounds: total squared error, then candidate emission
    /// proportional to it. Publishes a snapshot after every round.
    fn oversample(
        &self,
        output: &mut KMeansOutput,
        rng: &mut ChaCha8Rng,
    ) -> Result<Vec<Vec<f64>>> {
        let n = self.frame.num_rows();
        let mut first = vec![0.0; self.frame.num_cols()];
        random_row(self.frame, &self.standardizer, rng, &mut first);
        let mut centers = vec![first];

        for round in 1..=INIT_ROUNDS {
            let sqr = exec::run(
                self.frame,
                &SumSqrTask {
                    centers: &centers,
                    standardizer: &self.standardizer,
                    ncats: self.ncats,
                },
            );
            let sampled = exec::run(
                self.frame,
                &SamplerTask {
                    centers: &centers,
                    standardizer: &self.standardizer,
                    ncats: self.ncats,
                    total_sqr: sqr,
                    probability: (OVERSAMPLE_FACTOR * self.params.k) as f64,
                    seed: self.params.seed,
                },
            );
            centers.extend(sampled);

            if !self.job.is_running() {
                return Err(KMeansError::Cancelled);
            }
            output.centroids = self.standardizer.destandardize(&centers, self.ncats);
            output.avgwithinss = sqr / n as f64;
            output.iterations = round;
            self.job.publish(output);
            info!(
                round,
                candidates = centers.len(),
                avg_within_ss = output.avgwithinss,
                "k-means|| sampling round complete"
            );
        }
        Ok(centers)
    }

    /// The main assignment/update loop. `centers` holds the final
    /// standardized centroids when it returns.
    fn lloyd(&self, centers: &mut Vec<Vec<f64>>, output: &mut KMeansOutput) -> Result<()> {
        let k = self.params.k;
        let n = self.frame.num_rows();
        let ncols = self.frame.num_cols();
        let mut iterations = 0usize;
        let mut reinit_attempts = 0usize;

        'lloyd: while iterations < self.params.max_iters {
            if !self.job.is_running() {
                return Err(KMeansError::Cancelled);
            }
            let mut stats = exec::run(
                self.frame,
                &LloydsTask {
                    centers,
                    standardizer: &self.standardizer,
                    ncats: self.ncats,
                    k,
                    cardinalities: &self.cardinalities,
                },
            );
            // Categorical centers are the modal level of each cluster.
            for clu in 0..k {
                for col in 0..self.ncats {
                    stats.means[clu][col] = max_index(&stats.cats[clu][col]) as f64;
                }
            }

            // A cluster can go dry; rescue one per pass (only one worst row
            // is tracked). The reseed goes into the working centers so it
            // survives the re-run a second empty cluster forces; re-runs do
            // not count as iterations and are bounded by k attempts.
            let mut badrow = false;
            for clu in 0..k {
                if stats.rows[clu] == 0 {
                    if badrow {
                        warn!("re-running assignment pass to reseed another empty cluster");
                        if reinit_attempts < k {
                            reinit_attempts += 1;
                            continue 'lloyd;
                        }
                        reinit_attempts = 0;
                        break;
                    }
                    let row = stats.worst_row;
                    warn!(cluster = clu, row, "reseeding empty cluster from worst-fit row");
                    self.standardizer
                        .frame_row(self.frame, row, &mut centers[clu]);
                    stats.means[clu] = centers[clu].clone();
                    stats.rows[clu] = 1;
                    badrow = true;
                }
            }

            let total_sqr: f64 = stats.sqrs.iter().sum();
            output.centroids = self.standardizer.destandardize(&stats.means, self.ncats);
            output.rows = stats.rows.clone();
            output.withinmse = stats
                .sqrs
                .iter()
                .zip(&stats.rows)
                .map(|(&sqr, &rows)| sqr / rows as f64)
                .collect();
            output.avgwithinss = total_sqr / n as f64;
            output.avgss = if k == 1 {
                output.avgwithinss
            } else {
                // Standardized data has zero grand mean, so the total
                // dispersion is the squared distance to the origin.
                let origin = vec![vec![0.0; ncols]];
                let total = exec::run(
                    self.frame,
                    &SumSqrTask {
                        centers: &origin,
                        standardizer: &self.standardizer,
                        ncats: self.ncats,
                    },
                );
                total / n as f64
            };
            output.avgbetweenss = output.avgss - output.avgwithinss;
            output.iterations = iterations;
            self.job.publish(output);
            self.job.update(1);

            let movement = centers
                .iter()
                .zip(&stats.means)
                .map(|(prev, next)| distance(prev, next, self.ncats))
                .sum::<f64>()
                / ncols as f64;
            info!(
                iteration = iterations,
                avg_within_ss = output.avgwithinss,
                movement,
                "lloyd iteration complete"
            );
            *centers = stats.means;
            reinit_attempts = 0;
            if movement < CONVERGENCE_TOL {
                break;
            }
            iterations += 1;
            output.iterations = iterations;
        }
        Ok(())
    }
}

/// Move categorical columns to the leading positions; returns their count.
fn permute_categoricals(frame: &mut Frame) -> usize {
    let mut ncats = 0;
    let mut len = frame.num_cols();
    while ncats != len {
        while ncats < len && frame.column(ncats).is_categorical() {
            ncats += 1;
        }
        while len > 0 && !frame.column(len - 1).is_categorical() {
            len -= 1;
        }
        if ncats < len {
            frame.swap(ncats, len - 1);
        }
    }
    ncats
}

/// Index of the largest count; ties go to the lowest level.
fn max_index(counts: &[u64]) -> usize {
    let mut best = 0;
    for (level, &count) in counts.iter().enumerate() {
        if count > counts[best] {
            best = level;
        }
    }
    best
}
