//! Columnar training frame: named columns of `f64` values cut into
//! contiguous row chunks for data-parallel passes.
//!
//! Categorical columns carry a string domain and store integral level codes
//! in `[0, cardinality)`; numeric columns have no domain. Missing values are
//! `f64::NAN` in either case.

use ndarray::ArrayView2;

use crate::error::{KMeansError, Result};

/// Row count per chunk unless overridden with [`Frame::with_chunk_rows`].
pub const DEFAULT_CHUNK_ROWS: usize = 4096;

/// A single named column of the frame.
#[derive(Debug, Clone)]
pub struct Column {
    name: String,
    data: Vec<f64>,
    domain: Option<Vec<String>>,
}

impl Column {
    /// Create a numeric column.
    pub fn numeric(name: impl Into<String>, data: Vec<f64>) -> Self {
        Self {
            name: name.into(),
            data,
            domain: None,
        }
    }

    /// Create a categorical column from level codes and their string domain.
    ///
    /// Every non-NaN code must be an integral value in `[0, domain.len())`.
    pub fn categorical(
        name: impl Into<String>,
        codes: Vec<f64>,
        domain: Vec<String>,
    ) -> Result<Self> {
        let cardinality = domain.len();
        if cardinality == 0 {
            return Err(KMeansError::InvalidData(
                "categorical column needs a non-empty domain".into(),
            ));
        }
        for (row, &code) in codes.iter().enumerate() {
            if code.is_nan() {
                continue;
            }
            if code.fract() != 0.0 || code < 0.0 || code >= cardinality as f64 {
                return Err(KMeansError::InvalidData(format!(
                    "categorical code {code} at row {row} is outside [0, {cardinality})"
                )));
            }
        }
        Ok(Self {
            name: name.into(),
            data: codes,
            domain: Some(domain),
        })
    }

    /// Create a categorical column with an auto-generated `l0..l{c-1}` domain.
    pub fn categorical_coded(
        name: impl Into<String>,
        codes: Vec<f64>,
        cardinality: usize,
    ) -> Result<Self> {
        let domain = (0..cardinality).map(|l| format!("l{l}")).collect();
        Self::categorical(name, codes, domain)
    }

    /// Column name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of categorical levels, or `None` for numeric columns.
    pub fn cardinality(&self) -> Option<usize> {
        self.domain.as_ref().map(|d| d.len())
    }

    /// Whether the column is categorical.
    pub fn is_categorical(&self) -> bool {
        self.domain.is_some()
    }

    /// Categorical level names, when present.
    pub fn domain(&self) -> Option<&[String]> {
        self.domain.as_deref()
    }

    /// NaN-skipping arithmetic mean (of level codes for categoricals).
    pub fn mean(&self) -> f64 {
        let mut sum = 0.0;
        let mut n = 0usize;
        for &v in &self.data {
            if !v.is_nan() {
                sum += v;
                n += 1;
            }
        }
        if n == 0 {
            0.0
        } else {
            sum / n as f64
        }
    }

    /// NaN-skipping population standard deviation.
    pub fn sigma(&self) -> f64 {
        let mean = self.mean();
        let mut sq = 0.0;
        let mut n = 0usize;
        for &v in &self.data {
            if !v.is_nan() {
                let diff = v - mean;
                sq += diff * diff;
                n += 1;
            }
        }
        if n == 0 {
            0.0
        } else {
            (sq / n as f64).sqrt()
        }
    }
}

/// An ordered collection of equal-length columns.
#[derive(Debug, Clone)]
pub struct Frame {
    columns: Vec<Column>,
    nrows: usize,
    chunk_rows: usize,
}

impl Frame {
    /// Build a frame from columns, verifying they share one length.
    pub fn new(columns: Vec<Column>) -> Result<Self> {
        let Some(first) = columns.first() else {
            return Err(KMeansError::InvalidData(
                "frame must have at least one column".into(),
            ));
        };
        let nrows = first.data.len();
        for col in &columns {
            if col.data.len() != nrows {
                return Err(KMeansError::InvalidData(format!(
                    "column '{}' has {} rows, expected {nrows}",
                    col.name,
                    col.data.len()
                )));
            }
        }
        Ok(Self {
            columns,
            nrows,
            chunk_rows: DEFAULT_CHUNK_ROWS,
        })
    }

    /// Build an all-numeric frame from a dense matrix (rows = samples).
    ///
    /// Columns are named `c0..c{F-1}`.
    pub fn from_matrix(data: ArrayView2<'_, f64>) -> Result<Self> {
        let columns = (0..data.ncols())
            .map(|j| Column::numeric(format!("c{j}"), data.column(j).to_vec()))
            .collect();
        Self::new(columns)
    }

    /// Override the chunking granularity. Determinism-sensitive callers fix
    /// this because sampling seeds derive from chunk start ids.
    pub fn with_chunk_rows(mut self, chunk_rows: usize) -> Self {
        self.chunk_rows = chunk_rows.max(1);
        self
    }

    /// Number of rows.
    pub fn num_rows(&self) -> usize {
        self.nrows
    }

    /// Number of columns.
    pub fn num_cols(&self) -> usize {
        self.columns.len()
    }

    /// Column names, in frame order.
    pub fn names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    /// Access a column.
    pub fn column(&self, idx: usize) -> &Column {
        &self.columns[idx]
    }

    /// Swap two columns in place.
    pub fn swap(&mut self, i: usize, j: usize) {
        self.columns.swap(i, j);
    }

    /// Raw cell value (NaN when missing).
    pub fn value(&self, row: usize, col: usize) -> f64 {
        self.columns[col].data[row]
    }

    /// Cut the frame into contiguous row chunks of `chunk_rows`.
    pub fn chunks(&self) -> Vec<FrameChunk<'_>> {
        let mut out = Vec::with_capacity(self.nrows.div_ceil(self.chunk_rows));
        let mut start = 0usize;
        while start < self.nrows {
            let len = self.chunk_rows.min(self.nrows - start);
            out.push(FrameChunk {
                frame: self,
                start: start as u64,
                len,
            });
            start += len;
        }
        out
    }
}

/// A contiguous row range of a frame, the unit of map-phase work.
#[derive(Debug, Clone, Copy)]
pub struct FrameChunk<'a> {
    frame: &'a Frame,
    start: u64,
    len: usize,
}

impl<'a> FrameChunk<'a> {
    /// Global row id of this chunk's first row.
    pub fn start(&self) -> u64 {
        self.start
    }

    /// Rows in this chunk.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the chunk holds no rows.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Cell value at a chunk-local row.
    pub fn at(&self, local_row: usize, col: usize) -> f64 {
        debug_assert!(local_row < self.len);
        self.frame.value(self.start as usize + local_row, col)
    }

    /// The owning frame's column metadata.
    pub fn column(&self, col: usize) -> &'a Column {
        self.frame.column(col)
    }
}
