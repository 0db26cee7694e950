use anyhow::{bail, Context, Result};
use czscraper::{cache::RegionCache, process::table, region, stats};
use std::path::PathBuf;
use tracing_subscriber::{fmt, EnvFilter};

/// Prints accident counts per (year, region) from previously cached tables.
/// Run the main pipeline first; this tool never touches the network.
fn main() -> Result<()> {
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    fmt::Subscriber::builder().with_env_filter(env).init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let regions: Vec<&str> = if args.is_empty() {
        region::all_codes()
    } else {
        args.iter().map(String::as_str).collect()
    };

    let data_dir = PathBuf::from("data");
    let mut cache = RegionCache::new(&data_dir, Vec::new())?;

    let mut tables = Vec::new();
    for code in &regions {
        if !data_dir.join(format!("data_{code}.parquet")).is_file() {
            bail!("no cached table for region {code}; run the pipeline first");
        }
        tables.push(
            cache
                .get(code)
                .with_context(|| format!("reading cached table for {code}"))?,
        );
    }
    let merged = table::merge(&tables)?;

    let counts = stats::yearly_counts(&merged)?;
    println!("{:<6} {:<8} {:>10}", "year", "region", "accidents");
    for ((year, region), count) in counts {
        println!("{year:<6} {region:<8} {count:>10}");
    }
    Ok(())
}
