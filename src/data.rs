//! Dataset ingestion into [`Frame`]s and synthetic data generation.

use std::collections::BTreeSet;
use std::fs::File;
use std::path::Path;

use csv::ReaderBuilder;
use ndarray::Array1;
use ndarray_rand::rand_distr::{Distribution, Normal, Uniform};
use ndarray_rand::RandomExt;
use parquet::file::reader::{FileReader, SerializedFileReader};
use parquet::record::Field;
use rand_chacha::ChaCha8Rng;

use crate::error::{KMeansError, Result};
use crate::frame::{Column, Frame};

/// Build a frame of uniformly random numeric columns using a reproducible
/// RNG. Columns are drawn one at a time, named `c0..c{dim-1}`.
pub fn generate_frame(rows: usize, dim: usize, rng: &mut ChaCha8Rng) -> Result<Frame> {
    let columns = (0..dim)
        .map(|col| {
            let values = Array1::random_using(rows, Uniform::new(0.0, 1.0), rng);
            Column::numeric(format!("c{col}"), values.to_vec())
        })
        .collect();
    Frame::new(columns)
}

/// Build a frame of Gaussian blobs around the given centers, useful for
/// benchmarking and tests.
///
/// Rows are grouped by blob: rows `[b * rows_per_blob, (b+1) * rows_per_blob)`
/// scatter around `centers[b]`.
pub fn generate_clustered_frame(
    rows_per_blob: usize,
    centers: &[Vec<f64>],
    spread: f64,
    rng: &mut ChaCha8Rng,
) -> Result<Frame> {
    let dim = centers.first().map_or(0, Vec::len);
    if centers.iter().any(|center| center.len() != dim) {
        return Err(KMeansError::InvalidConfig(
            "blob centers must share one dimension".into(),
        ));
    }
    let noise = Normal::new(0.0, spread)
        .map_err(|err| KMeansError::InvalidConfig(format!("bad blob spread: {err}")))?;

    let columns = (0..dim)
        .map(|col| {
            let mut values = Vec::with_capacity(rows_per_blob * centers.len());
            for center in centers {
                values.extend((0..rows_per_blob).map(|_| center[col] + noise.sample(rng)));
            }
            Column::numeric(format!("c{col}"), values)
        })
        .collect();
    Frame::new(columns)
}

fn is_missing(field: &str) -> bool {
    field.is_empty() || field.eq_ignore_ascii_case("na") || field.eq_ignore_ascii_case("nan")
}

fn build_column(name: &str, raw: &[String]) -> Result<Column> {
    let parsed: Option<Vec<f64>> = raw
        .iter()
        .map(|field| {
            if is_missing(field) {
                Some(f64::NAN)
            } else {
                field.trim().parse::<f64>().ok()
            }
        })
        .collect();
    if let Some(data) = parsed {
        return Ok(Column::numeric(name, data));
    }

    // Non-numeric column: level-code it against its sorted distinct values.
    let domain: Vec<String> = raw
        .iter()
        .filter(|field| !is_missing(field))
        .cloned()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    let codes = raw
        .iter()
        .map(|field| {
            if is_missing(field) {
                f64::NAN
            } else {
                // Present by construction of the domain.
                domain.binary_search(field).unwrap_or_default() as f64
            }
        })
        .collect();
    Column::categorical(name, codes, domain)
}

/// Loaders turning CSV or Parquet files into training frames.
pub struct DataLoader;

impl DataLoader {
    /// Load a headered CSV file. Columns where every present cell parses as
    /// a number become numeric; all others are level-coded categoricals.
    /// Empty, `NA`, and `NaN` cells are treated as missing.
    pub fn load_csv<P: AsRef<Path>>(path: P) -> Result<Frame> {
        let mut rdr = ReaderBuilder::new().has_headers(true).from_path(path)?;
        let headers: Vec<String> = rdr.headers()?.iter().map(str::to_string).collect();
        let width = headers.len();
        let mut cells: Vec<Vec<String>> = vec![Vec::new(); width];

        for record in rdr.records() {
            let record = record?;
            if record.len() != width {
                return Err(KMeansError::InvalidData(format!(
                    "found inconsistent row width: expected {width}, got {}",
                    record.len()
                )));
            }
            for (col, field) in record.iter().enumerate() {
                cells[col].push(field.to_string());
            }
        }

        let columns = headers
            .iter()
            .zip(&cells)
            .map(|(name, raw)| build_column(name, raw))
            .collect::<Result<Vec<_>>>()?;
        Frame::new(columns)
    }

    /// Load a Parquet file containing numeric (int/float) columns. NULL
    /// cells become missing values for the trainer to impute.
    pub fn load_parquet<P: AsRef<Path>>(path: P) -> Result<Frame> {
        let file = File::open(path)?;
        let reader = SerializedFileReader::new(file)?;
        let row_iter = reader.get_row_iter(None)?;

        let mut names: Vec<String> = Vec::new();
        let mut data: Vec<Vec<f64>> = Vec::new();
        for (i, row) in row_iter.enumerate() {
            let row = row?;
            if i == 0 {
                for (name, _) in row.get_column_iter() {
                    names.push(name.clone());
                    data.push(Vec::new());
                }
            }
            let mut col = 0usize;
            for (_, field) in row.get_column_iter() {
                if col >= data.len() {
                    return Err(KMeansError::InvalidData(format!(
                        "row {i} width mismatch: expected {}",
                        data.len()
                    )));
                }
                data[col].push(parquet_value(field, col)?);
                col += 1;
            }
            if col != data.len() {
                return Err(KMeansError::InvalidData(format!(
                    "row {i} width mismatch: expected {}, found {col}",
                    data.len()
                )));
            }
        }

        let columns = names
            .into_iter()
            .zip(data)
            .map(|(name, values)| Column::numeric(name, values))
            .collect();
        Frame::new(columns)
    }
}

fn parquet_value(field: &Field, col: usize) -> Result<f64> {
    Ok(match field {
        Field::Double(v) => *v,
        Field::Float(v) => f64::from(*v),
        Field::Int(v) => f64::from(*v),
        Field::Long(v) => *v as f64,
        Field::Short(v) => f64::from(*v),
        Field::Byte(v) => f64::from(*v),
        Field::UInt(v) => f64::from(*v),
        Field::ULong(v) => *v as f64,
        Field::UShort(v) => f64::from(*v),
        Field::UByte(v) => f64::from(*v),
        Field::Null => f64::NAN,
        other => {
            return Err(KMeansError::InvalidData(format!(
                "unsupported parquet field at column {col}: {other:?}"
            )))
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use std::io::Write;

    #[test]
    fn generated_frame_has_requested_shape() {
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let frame = generate_frame(40, 5, &mut rng).unwrap();
        assert_eq!(frame.num_rows(), 40);
        assert_eq!(frame.num_cols(), 5);
        for row in 0..frame.num_rows() {
            for col in 0..frame.num_cols() {
                assert!((0.0..1.0).contains(&frame.value(row, col)));
            }
        }
    }

    #[test]
    fn clustered_frame_rows_stay_near_their_blob() {
        let mut rng = ChaCha8Rng::seed_from_u64(4);
        let centers = vec![vec![0.0, 0.0], vec![100.0, 100.0]];
        let frame = generate_clustered_frame(10, &centers, 0.5, &mut rng).unwrap();
        assert_eq!(frame.num_rows(), 20);
        assert_eq!(frame.num_cols(), 2);
        for row in 0..10 {
            assert!(frame.value(row, 0).abs() < 10.0);
        }
        for row in 10..20 {
            assert!((frame.value(row, 0) - 100.0).abs() < 10.0);
        }
    }

    #[test]
    fn mismatched_blob_centers_are_rejected() {
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let centers = vec![vec![0.0, 0.0], vec![1.0]];
        assert!(generate_clustered_frame(3, &centers, 0.1, &mut rng).is_err());
    }

    #[test]
    fn csv_loader_detects_column_kinds() {
        let mut path = std::env::temp_dir();
        path.push("kmeans_scalable_loader_test.csv");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "x,color").unwrap();
        writeln!(file, "1.5,red").unwrap();
        writeln!(file, ",blue").unwrap();
        writeln!(file, "3.0,red").unwrap();
        writeln!(file, "4.0,NA").unwrap();
        drop(file);

        let frame = DataLoader::load_csv(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(frame.num_rows(), 4);
        assert_eq!(frame.names(), vec!["x".to_string(), "color".to_string()]);
        assert!(!frame.column(0).is_categorical());
        assert!(frame.value(1, 0).is_nan());
        let color = frame.column(1);
        assert_eq!(color.cardinality(), Some(2));
        assert_eq!(color.domain().unwrap(), ["blue".to_string(), "red".to_string()]);
        assert_eq!(frame.value(0, 1), 1.0);
        assert_eq!(frame.value(1, 1), 0.0);
        assert!(frame.value(3, 1).is_nan());
    }
}
