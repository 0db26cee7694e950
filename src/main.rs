use anyhow::{Context, Result};
use czscraper::{
    cache::RegionCache,
    fetch::{
        urls::{fetch_index, resolve_archives, DEFAULT_INDEX_URL},
        zips::{archive_basename, download_archive},
    },
    region,
};
use reqwest::Client;
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64)";
const MAX_CONCURRENT_DOWNLOADS: usize = 3;

/// End-to-end pipeline: resolve the yearly archives from the index page,
/// download any that are missing locally, then build the merged table for the
/// requested regions (all 14 when none are given) and print a summary.
#[tokio::main]
async fn main() -> Result<()> {
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder().with_env_filter(env).init();

    let regions: Vec<String> = std::env::args().skip(1).collect();
    let regions: Vec<&str> = if regions.is_empty() {
        region::all_codes()
    } else {
        regions.iter().map(String::as_str).collect()
    };

    let data_dir = PathBuf::from("data");
    let client = Client::builder()
        .user_agent(USER_AGENT)
        .build()
        .context("building HTTP client")?;

    // 1) resolve archive references from the index page
    let html = fetch_index(&client, DEFAULT_INDEX_URL).await?;
    let archives = resolve_archives(&html)?;
    info!(count = archives.len(), "resolved archive references");

    // 2) download missing archives, a few at a time
    let unique: BTreeSet<String> = archives.iter().cloned().collect();
    let sem = Arc::new(Semaphore::new(MAX_CONCURRENT_DOWNLOADS));
    let mut handles = Vec::with_capacity(unique.len());
    for archive in unique {
        let client = client.clone();
        let data_dir = data_dir.clone();
        let sem = sem.clone();
        handles.push(tokio::spawn(async move {
            let _permit = sem.acquire().await.expect("semaphore closed");
            download_archive(&client, DEFAULT_INDEX_URL, &archive, &data_dir)
                .await
                .map_err(|err| (archive, err))
        }));
    }
    for handle in handles {
        if let Err((archive, err)) = handle.await? {
            error!(%archive, %err, "download failed");
            return Err(err);
        }
    }

    // Local paths in resolver order, duplicates preserved.
    let local_archives: Vec<PathBuf> = archives
        .iter()
        .map(|a| data_dir.join(archive_basename(a)))
        .collect();

    // 3) build and merge the per-region tables
    let mut cache = RegionCache::new(&data_dir, local_archives)?;
    let mut selected = Vec::new();
    for code in &regions {
        match cache.get(code) {
            Ok(table) => selected.push(table),
            // An unknown or unreadable region drops out of the batch
            // without aborting the rest.
            Err(err) => error!(region = *code, %err, "skipping region"),
        }
    }
    let merged = czscraper::process::table::merge(&selected)?;

    println!("Labels:");
    println!("{:?}", merged.labels());
    println!("Number of records: {}", merged.num_rows());
    println!("Regions in dataset: {:?}", regions);

    Ok(())
}
