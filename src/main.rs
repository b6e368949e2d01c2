use std::path::{Path, PathBuf};
use std::process;
use std::str::FromStr;
use std::time::Instant;

use clap::{Parser, ValueEnum};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::ThreadPoolBuilder;
use serde_json::json;
use tracing::{error, info};
use tracing_subscriber::FmtSubscriber;

use kmeans_scalable::{
    generate_frame, DataLoader, Frame, Initialization, KMeansError, KMeansModel, KMeansParams,
    Result as KMeansResult,
};

#[derive(Parser, Debug)]
#[command(name = "kmeans-scalable")]
#[command(about = "Scalable K-Means trainer (K-Means|| + Lloyd) over columnar frames", long_about = None)]
struct Args {
    /// Number of clusters
    #[arg(short, long, default_value_t = 4)]
    k: usize,

    /// Number of points to generate when not using --input
    #[arg(short = 'n', long, default_value_t = 100_000)]
    points: usize,

    /// Dimensionality of points when generating
    #[arg(short, long, default_value_t = 2)]
    dim: usize,

    /// Maximum number of Lloyd iterations
    #[arg(short, long, default_value_t = 50)]
    iterations: usize,

    /// RNG seed
    #[arg(long, default_value_t = 42u64)]
    seed: u64,

    /// Input dataset (CSV or Parquet)
    #[arg(long)]
    input: Option<PathBuf>,

    /// Explicitly specify the input file format (default: auto-detect from extension)
    #[arg(long, value_enum)]
    format: Option<InputFormat>,

    /// Output file for centroids and stats (JSON)
    #[arg(short, long, default_value = "kmeans_result.json")]
    output: PathBuf,

    /// Optional file containing per-sample cluster assignments (CSV)
    #[arg(long)]
    assignments: Option<PathBuf>,

    /// Initialization method (none, plusplus, furthest)
    #[arg(long, value_parser = parse_init, default_value = "plusplus")]
    init: Initialization,

    /// Whether to z-score standardize numeric columns prior to training
    #[arg(long, default_value_t = false)]
    standardize: bool,

    /// Rows per chunk (controls map-phase granularity and sampling seeds)
    #[arg(long)]
    chunk_rows: Option<usize>,

    /// Save trained model JSON
    #[arg(long)]
    save_model: Option<PathBuf>,

    /// Override Rayon global thread pool size
    #[arg(long)]
    threads: Option<usize>,

    /// Verbosity: set RUST_LOG style level (info, debug, warn)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum InputFormat {
    Csv,
    Parquet,
}

fn main() {
    let args = Args::parse();
    if let Err(err) = init_logging(&args.log_level) {
        eprintln!("failed to initialise logging: {err}");
    }

    if let Err(err) = run(args) {
        error!(error = %err, "kmeans run failed");
        process::exit(1);
    }
}

fn init_logging(level: &str) -> Result<(), String> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(match level {
            "debug" => tracing::Level::DEBUG,
            "warn" => tracing::Level::WARN,
            "error" => tracing::Level::ERROR,
            _ => tracing::Level::INFO,
        })
        .finish();
    tracing::subscriber::set_global_default(subscriber).map_err(|err| err.to_string())
}

fn run(args: Args) -> KMeansResult<()> {
    if let Some(threads) = args.threads {
        ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()
            .map_err(|err| {
                KMeansError::InvalidConfig(format!("failed to configure rayon threadpool: {err}"))
            })?;
        info!(threads, "configured rayon global thread pool");
    }

    info!(
        k = args.k,
        max_iters = args.iterations,
        init = %args.init,
        standardize = args.standardize,
        seed = args.seed,
        "starting kmeans training"
    );

    let mut frame = load_frame(
        args.input.as_deref(),
        args.format,
        args.points,
        args.dim,
        args.seed,
    )?;
    if let Some(chunk_rows) = args.chunk_rows {
        frame = frame.with_chunk_rows(chunk_rows);
    }

    let params = KMeansParams {
        k: args.k,
        max_iters: args.iterations,
        init: args.init,
        standardize: args.standardize,
        seed: args.seed,
    };

    let start = Instant::now();
    let model = kmeans_scalable::train_model(&params, &mut frame)?;
    let elapsed = start.elapsed();
    info!(
        avg_within_ss = model.output.avgwithinss,
        avg_between_ss = model.output.avgbetweenss,
        iterations = model.output.iterations,
        took_seconds = elapsed.as_secs_f64(),
        "kmeans training finished"
    );
    info!(?model.output.rows, "cluster population counts");

    write_result(&args, &frame, &model, elapsed.as_secs_f64())?;

    if let Some(path) = args.save_model.as_ref() {
        model.save(path)?;
        info!(path = ?path, "saved model snapshot");
    }

    if let Some(path) = args.assignments.as_ref() {
        write_assignments(path, &frame, &model)?;
    }

    Ok(())
}

fn load_frame(
    input: Option<&Path>,
    format: Option<InputFormat>,
    points: usize,
    dim: usize,
    seed: u64,
) -> KMeansResult<Frame> {
    if let Some(path) = input {
        let format_to_use =
            format.unwrap_or_else(|| infer_format(path).unwrap_or(InputFormat::Csv));
        info!(path = ?path, ?format_to_use, "loading input data");
        match format_to_use {
            InputFormat::Csv => DataLoader::load_csv(path),
            InputFormat::Parquet => DataLoader::load_parquet(path),
        }
    } else {
        if let Some(requested) = format {
            info!(
                ?requested,
                "ignoring --format because synthetic data will be generated"
            );
        }
        info!(points, dim, "generating synthetic uniform data");
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        generate_frame(points, dim, &mut rng)
    }
}

fn infer_format(path: &Path) -> Option<InputFormat> {
    path.extension().and_then(|ext| ext.to_str()).map(|ext| {
        match ext.to_ascii_lowercase().as_str() {
            "parquet" | "pq" => InputFormat::Parquet,
            _ => InputFormat::Csv,
        }
    })
}

fn write_result(
    args: &Args,
    frame: &Frame,
    model: &KMeansModel,
    elapsed_secs: f64,
) -> KMeansResult<()> {
    let output = &model.output;
    let dump = json!({
        "k": args.k,
        "columns": output.names,
        "ncats": output.ncats,
        "rows": frame.num_rows(),
        "iterations": output.iterations,
        "cluster_sizes": output.rows,
        "withinmse": output.withinmse,
        "avgwithinss": output.avgwithinss,
        "avgss": output.avgss,
        "avgbetweenss": output.avgbetweenss,
        "init": model.params.init,
        "seed": args.seed,
        "standardized": args.standardize,
        "elapsed_seconds": elapsed_secs,
        "centroids": output.centroids,
        "data_source": if let Some(path) = args.input.as_ref() {
            let fmt = args
                .format
                .or_else(|| infer_format(path))
                .unwrap_or(InputFormat::Csv);
            json!({
                "type": "file",
                "path": path.display().to_string(),
                "format": format!("{fmt:?}").to_lowercase(),
            })
        } else {
            json!({
                "type": "synthetic",
                "points": args.points,
                "dim": args.dim,
            })
        },
        "assignments_path": args.assignments.as_ref().map(|p| p.display().to_string()),
    });

    std::fs::write(&args.output, serde_json::to_string_pretty(&dump)?)?;
    info!(path = ?args.output, "wrote clustering summary");
    Ok(())
}

fn write_assignments(path: &Path, frame: &Frame, model: &KMeansModel) -> KMeansResult<()> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(["row", "cluster"])?;
    let mut values = vec![0.0; frame.num_cols()];
    for row in 0..frame.num_rows() {
        for (col, value) in values.iter_mut().enumerate() {
            *value = frame.value(row, col);
        }
        let cluster = model.predict_row(&values);
        writer.write_record([row.to_string(), cluster.to_string()])?;
    }
    writer.flush()?;
    info!(path = ?path, "wrote assignments CSV");
    Ok(())
}

fn parse_init(raw: &str) -> Result<Initialization, String> {
    Initialization::from_str(raw).map_err(|err| err.to_string())
}
