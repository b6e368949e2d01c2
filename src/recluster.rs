//! Single-node reduction of the oversampled candidate set down to `k`
//! initial centroids, plus uniform row seeding.

use rand::prelude::*;
use rand_chacha::ChaCha8Rng;

use crate::distance::min_sqr;
use crate::driver::Initialization;
use crate::frame::Frame;
use crate::standardize::Standardizer;

/// Materialise one uniformly-sampled row of the frame into `out`.
pub(crate) fn random_row(
    frame: &Frame,
    standardizer: &Standardizer,
    rng: &mut ChaCha8Rng,
    out: &mut [f64],
) {
    let n = frame.num_rows() as u64;
    let row = ((rng.gen::<f64>() * n as f64) as u64).min(n - 1);
    standardizer.frame_row(frame, row, out);
}

/// Reduce the candidate set to exactly `k` centroids.
///
/// PlusPlus scans the candidates in order and takes the first whose
/// min-squared-distance clears the threshold `u * sum`, repeating with a
/// fresh draw when no candidate qualifies. Furthest repeatedly takes the
/// candidate farthest from every centroid chosen so far, ties to the
/// lowest index.
pub(crate) fn recluster(
    points: &[Vec<f64>],
    k: usize,
    init: Initialization,
    ncats: usize,
    rng: &mut ChaCha8Rng,
) -> Vec<Vec<f64>> {
    let mut res: Vec<Vec<f64>> = Vec::with_capacity(k);
    res.push(points[0].clone());
    match init {
        Initialization::None => {}
        Initialization::PlusPlus => {
            while res.len() < k {
                let count = res.len();
                let sum: f64 = points
                    .iter()
                    .map(|p| min_sqr(&res, p, ncats, count))
                    .sum();
                let threshold = rng.gen::<f64>() * sum;
                for point in points {
                    if min_sqr(&res, point, ncats, count) >= threshold {
                        res.push(point.clone());
                        break;
                    }
                }
            }
        }
        Initialization::Furthest => {
            while res.len() < k {
                let count = res.len();
                let mut max = 0.0;
                let mut index = 0;
                for (i, point) in points.iter().enumerate() {
                    let sqr = min_sqr(&res, point, ncats, count);
                    if sqr > max {
                        max = sqr;
                        index = i;
                    }
                }
                res.push(points[index].clone());
            }
        }
    }
    res
}
