//! Forecast archival service.
//!
//! One run handles one forecast cycle end to end:
//! download the cycle's per-variable GRIB2 files, index them, merge the
//! indices into logical datasets, remap every field onto a HEALPix grid and
//! write one chunked Zarr store per dataset, optionally uploading the
//! finished stores to object storage.

mod acquire;
mod forecast;
mod pipeline;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::Parser;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use acquire::VariableFilter;
use healpix_grid::{HealpixGrid, Ordering};
use remap_engine::WeightCache;
use virtual_dataset::merge_sidecars;
use zarr_sink::{upload_store, ObjectStorage, ObjectStorageConfig, ZarrSinkConfig};

#[derive(Parser, Debug)]
#[command(name = "forecast-archiver")]
#[command(about = "Download, remap and archive forecast cycles onto a HEALPix grid")]
struct Args {
    /// Forecast cycle to process (ISO time, e.g. 2026-08-07T12:00:00Z);
    /// defaults to the most recent cycle
    #[arg(short, long)]
    time: Option<String>,

    /// Directory for downloaded files, indices and weight caches
    #[arg(short, long, default_value = "/data/forecast-cache")]
    cache: PathBuf,

    /// Directory the Zarr stores are written into
    #[arg(short, long, default_value = "/data/forecast-stores")]
    store: PathBuf,

    /// Base URL of the forecast feed
    #[arg(long, env = "FORECAST_BASE_URL", default_value = "https://data.ecmwf.int")]
    base_url: String,

    /// Only archive these parameter short names (comma separated, e.g. t,u,v)
    #[arg(long, value_delimiter = ',')]
    variables: Option<Vec<String>>,

    /// Target grid zoom level (nside = 2^zoom)
    #[arg(long, default_value = "7")]
    zoom: u32,

    /// Target grid pixel ordering: nest or ring
    #[arg(long, default_value = "nest")]
    ordering: String,

    /// Store chunk extent along the time axis
    #[arg(long, default_value = "6")]
    time_chunk: u64,

    /// Store chunk extent along the pixel axis
    #[arg(long, default_value = "16384")]
    pixel_chunk: u64,

    /// Maximum concurrent downloads
    #[arg(long, default_value = "4")]
    concurrency: usize,

    /// Upload finished stores under this object-storage prefix
    #[arg(long)]
    upload_prefix: Option<String>,

    /// Object storage endpoint (S3 compatible)
    #[arg(long, env = "STORE_S3_ENDPOINT", default_value = "")]
    s3_endpoint: String,

    /// Object storage bucket
    #[arg(long, env = "STORE_S3_BUCKET", default_value = "")]
    s3_bucket: String,

    /// Object storage access key
    #[arg(long, env = "STORE_S3_ACCESS_KEY", default_value = "")]
    s3_access_key: String,

    /// Object storage secret key
    #[arg(long, env = "STORE_S3_SECRET_KEY", default_value = "")]
    s3_secret_key: String,

    /// Object storage region
    #[arg(long, env = "STORE_S3_REGION", default_value = "us-east-1")]
    s3_region: String,

    /// Allow plain-HTTP object storage endpoints
    #[arg(long)]
    s3_allow_http: bool,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let fctime = match &args.time {
        Some(iso) => iso
            .parse::<DateTime<Utc>>()
            .with_context(|| format!("invalid --time value {iso}"))?,
        None => forecast::latest_forecast_time(Utc::now())?,
    };
    let label = forecast::cycle_label(fctime);
    info!(cycle = %label, "processing forecast cycle");

    let grid = HealpixGrid::new(args.zoom, args.ordering.parse::<Ordering>()?)?;
    let sink_config = ZarrSinkConfig {
        time_chunk: args.time_chunk,
        pixel_chunk: args.pixel_chunk,
    };

    let cycle_cache = args.cache.join(&label);
    tokio::fs::create_dir_all(&cycle_cache).await?;

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(600))
        .connect_timeout(Duration::from_secs(30))
        .build()
        .context("building HTTP client")?;

    // Acquisition: list, download, index. Listing failure is fatal for the
    // cycle; per-file failures only shrink the input sequence.
    let listing_url = forecast::cycle_listing_url(&args.base_url, fctime);
    let filter = VariableFilter::new(args.variables.clone());
    let sidecars = acquire::fetch_cycle(
        &client,
        &args.base_url,
        &listing_url,
        &cycle_cache,
        &filter,
        args.concurrency,
    )
    .await?;

    // Assembly: merge the per-file indices into logical datasets.
    let outcome = merge_sidecars(&sidecars);
    for excluded in &outcome.report.excluded {
        warn!(file = %excluded.file.display(), reason = %excluded.reason, "file excluded from merge");
    }
    if outcome.datasets.is_empty() {
        anyhow::bail!("no usable files in cycle {label}");
    }
    for dataset in &outcome.datasets {
        // Persisted so the merged view can be reopened without re-deriving.
        let sidecar = cycle_cache.join(format!("{}.dataset.json", dataset.name));
        dataset.to_json_file(&sidecar)?;
    }

    // Remap and store: CPU-bound, runs off the async threads.
    let datasets = outcome.datasets;
    let weight_dir = args.cache.join("weights");
    let store_dir = args.store.clone();
    let results = tokio::task::spawn_blocking(move || -> Result<_> {
        let weight_cache = WeightCache::open(weight_dir)?;
        pipeline::remap_and_store(&datasets, grid, &weight_cache, &store_dir, &label, sink_config)
    })
    .await
    .context("remap task panicked")??;

    for result in &results {
        info!(
            dataset = %result.dataset,
            store = %result.path.display(),
            arrays = result.summary.arrays,
            elements = result.summary.elements_written,
            "store written"
        );
    }

    // Optional upload of the finished stores.
    if let Some(prefix) = &args.upload_prefix {
        let storage = ObjectStorage::new(&ObjectStorageConfig {
            endpoint: args.s3_endpoint.clone(),
            bucket: args.s3_bucket.clone(),
            access_key_id: args.s3_access_key.clone(),
            secret_access_key: args.s3_secret_key.clone(),
            region: args.s3_region.clone(),
            allow_http: args.s3_allow_http,
        })?;

        for result in &results {
            let target = format!(
                "{}/{}",
                prefix.trim_end_matches('/'),
                result
                    .path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| result.dataset.clone())
            );
            let bytes = upload_store(&storage, &result.path, &target).await?;
            info!(store = %result.path.display(), target, bytes, "store uploaded");
        }
    }

    Ok(())
}
