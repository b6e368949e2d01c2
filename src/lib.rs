//! Scalable K-Means clustering for chunked columnar data.
//!
//! The crate implements the K-Means|| initialisation scheme (scalable
//! K-Means++) followed by Lloyd's iteration over a frame of mixed numeric
//! and categorical columns. Training runs as a sequence of bulk-synchronous
//! data-parallel passes: each pass maps over the frame's row chunks in
//! parallel and combines the per-chunk accumulators in a fixed order, so
//! results are reproducible for a given seed and chunking.
//!
//! Numeric columns use squared Euclidean distance (optionally z-score
//! standardized); categorical columns use 0/1 mismatch on level codes.
//! Missing values are imputed from column statistics, and rows with missing
//! dimensions have their distance rescaled to stay comparable.
//!
//! ## Example
//!
//! ```no_run
//! use kmeans_scalable::{generate_frame, train_model, Initialization, KMeansParams};
//! use rand::SeedableRng;
//! use rand_chacha::ChaCha8Rng;
//!
//! let mut rng = ChaCha8Rng::seed_from_u64(42);
//! let mut frame = generate_frame(10_000, 4, &mut rng).unwrap();
//!
//! let params = KMeansParams {
//!     k: 8,
//!     init: Initialization::PlusPlus,
//!     ..KMeansParams::default()
//! };
//! let model = train_model(&params, &mut frame).unwrap();
//! println!("within-cluster MSE: {}", model.output.avgwithinss);
//! ```

pub mod data;
pub mod distance;
pub mod driver;
pub mod error;
pub mod exec;
pub mod frame;
pub mod model;
pub mod standardize;

mod recluster;
mod tasks;

pub use data::{generate_clustered_frame, generate_frame, DataLoader};
pub use distance::{closest, distance, ClusterDist};
pub use driver::{train_model, train_model_with_job, Initialization, KMeansParams};
pub use error::{KMeansError, Result};
pub use exec::{ChunkTask, Job};
pub use frame::{Column, Frame, FrameChunk, DEFAULT_CHUNK_ROWS};
pub use model::{KMeansModel, KMeansOutput};
pub use standardize::Standardizer;
