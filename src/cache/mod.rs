use anyhow::{Context, Result};
use arrow::compute::concat_batches;
use arrow::record_batch::RecordBatch;
use glob::glob;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::ScrapeError;
use crate::process::loader::load_region;
use crate::process::table::{self, RecordTable};
use crate::schema;

/// Per-region table cache with an explicit lifecycle: construct it at
/// pipeline start, pass it by reference to whoever needs tables, drop it at
/// the end.
///
/// Two layers back `get`: an in-memory map for tables already materialized in
/// this process, and one compressed Parquet file per region on disk. A miss
/// on both runs the two-pass loader over the configured archives and
/// persists the result, so cold and warm starts yield identically shaped
/// tables.
pub struct RegionCache {
    cache_dir: PathBuf,
    archives: Vec<PathBuf>,
    loaded: HashMap<String, RecordTable>,
}

impl RegionCache {
    /// Open a cache rooted at `cache_dir` over the given archive files,
    /// creating the directory if needed.
    pub fn new(cache_dir: impl Into<PathBuf>, archives: Vec<PathBuf>) -> Result<Self> {
        let cache_dir = cache_dir.into();
        fs::create_dir_all(&cache_dir)
            .with_context(|| format!("creating cache directory {}", cache_dir.display()))?;

        let pattern = format!("{}/data_*.parquet", cache_dir.display());
        let warm = glob(&pattern)
            .context("invalid cache glob pattern")?
            .filter_map(Result::ok)
            .count();
        info!(cache_dir = %cache_dir.display(), warm_regions = warm, "opened region cache");

        Ok(Self {
            cache_dir,
            archives,
            loaded: HashMap::new(),
        })
    }

    fn region_path(&self, region: &str) -> PathBuf {
        self.cache_dir.join(format!("data_{region}.parquet"))
    }

    /// The table for one region: in-memory if this process already has it,
    /// deserialized from disk if a previous run left it, freshly parsed and
    /// persisted otherwise.
    pub fn get(&mut self, region: &str) -> Result<RecordTable> {
        if let Some(table) = self.loaded.get(region) {
            return Ok(table.clone());
        }

        let path = self.region_path(region);
        let table = if path.is_file() {
            debug!(region, path = %path.display(), "cache hit on disk");
            read_table(&path)?
        } else {
            debug!(region, "cache miss; parsing archives");
            let table = load_region(&self.archives, region)?;
            write_table(&table, &path)?;
            table
        };

        self.loaded.insert(region.to_string(), table.clone());
        Ok(table)
    }

    /// Tables for all requested regions, merged into one in request order.
    pub fn get_list(&mut self, regions: &[&str]) -> Result<RecordTable> {
        let mut tables = Vec::with_capacity(regions.len());
        for region in regions {
            tables.push(self.get(region)?);
        }
        table::merge(&tables)
    }
}

fn read_table(path: &Path) -> Result<RecordTable> {
    let file =
        File::open(path).with_context(|| format!("opening cache file {}", path.display()))?;
    let builder = ParquetRecordBatchReaderBuilder::try_new(file)
        .with_context(|| format!("reading cache file {}", path.display()))?;
    let schema = builder.schema().clone();
    let reader = builder.build()?;

    let batches: Vec<RecordBatch> = reader
        .collect::<std::result::Result<_, _>>()
        .with_context(|| format!("decoding cache file {}", path.display()))?;
    let batch = if batches.is_empty() {
        RecordBatch::new_empty(schema)
    } else {
        concat_batches(&schema, &batches)?
    };

    // A cache file written by anything other than the loader (stale layout,
    // foreign parquet dropped into the data dir) must not flow into merge.
    let expected = schema::arrow_schema();
    let found = batch.schema();
    let matches = found.fields().len() == expected.fields().len()
        && found
            .fields()
            .iter()
            .zip(expected.fields())
            .all(|(a, b)| a.name() == b.name() && a.data_type() == b.data_type());
    if !matches {
        return Err(ScrapeError::SchemaMismatch(format!(
            "cache file {} does not carry the accident table schema",
            path.display()
        ))
        .into());
    }

    Ok(RecordTable::from_batch(&batch))
}

fn write_table(table: &RecordTable, path: &Path) -> Result<()> {
    let batch = table.to_batch()?;
    let file =
        File::create(path).with_context(|| format!("creating cache file {}", path.display()))?;
    let props = WriterProperties::builder()
        .set_compression(Compression::SNAPPY)
        .build();
    let mut writer = ArrowWriter::try_new(BufWriter::new(file), batch.schema(), Some(props))
        .with_context(|| format!("opening parquet writer for {}", path.display()))?;
    writer.write(&batch)?;
    writer.close()?;
    Ok(())
}
