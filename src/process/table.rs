use anyhow::{Context, Result};
use arrow::array::{Array, ArrayRef};
use arrow::compute;
use arrow::datatypes::{Field, Schema};
use arrow::record_batch::RecordBatch;
use std::sync::Arc;

use crate::error::ScrapeError;

/// All parsed rows for one scope (a single region, or several regions merged):
/// 65 column labels paired with 65 equally-long typed arrays.
///
/// Cloning is cheap; the arrays are reference-counted.
#[derive(Debug, Clone)]
pub struct RecordTable {
    labels: Vec<String>,
    columns: Vec<ArrayRef>,
}

impl RecordTable {
    /// Build a table, enforcing that labels and columns line up and that all
    /// columns share one length.
    pub fn new(labels: Vec<String>, columns: Vec<ArrayRef>) -> Result<Self> {
        if labels.len() != columns.len() {
            return Err(ScrapeError::SchemaMismatch(format!(
                "{} labels but {} columns",
                labels.len(),
                columns.len()
            ))
            .into());
        }
        if let Some(first) = columns.first() {
            for (label, col) in labels.iter().zip(&columns) {
                if col.len() != first.len() {
                    return Err(ScrapeError::SchemaMismatch(format!(
                        "column `{}` has {} rows, expected {}",
                        label,
                        col.len(),
                        first.len()
                    ))
                    .into());
                }
            }
        }
        Ok(Self { labels, columns })
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn columns(&self) -> &[ArrayRef] {
        &self.columns
    }

    pub fn num_rows(&self) -> usize {
        self.columns.first().map_or(0, |c| c.len())
    }

    /// Look up a column by label.
    pub fn column(&self, label: &str) -> Option<&ArrayRef> {
        self.labels
            .iter()
            .position(|l| l == label)
            .map(|i| &self.columns[i])
    }

    /// Render as an Arrow record batch (all fields nullable, so tables with
    /// nulled-out date cells pass validation).
    pub fn to_batch(&self) -> Result<RecordBatch> {
        let fields: Vec<Field> = self
            .labels
            .iter()
            .zip(&self.columns)
            .map(|(label, col)| Field::new(label, col.data_type().clone(), true))
            .collect();
        RecordBatch::try_new(Arc::new(Schema::new(fields)), self.columns.clone())
            .context("building record batch from table")
    }

    pub fn from_batch(batch: &RecordBatch) -> Self {
        Self {
            labels: batch
                .schema()
                .fields()
                .iter()
                .map(|f| f.name().clone())
                .collect(),
            columns: batch.columns().to_vec(),
        }
    }
}

/// Concatenate the same-indexed column across all input tables, preserving
/// input order and keeping duplicates.
///
/// Every input must carry identical labels and column types; anything else is
/// a caller bug and fails with `SchemaMismatch` before any output is built.
pub fn merge(tables: &[RecordTable]) -> Result<RecordTable> {
    let first = tables
        .first()
        .ok_or_else(|| ScrapeError::SchemaMismatch("no tables to merge".to_string()))?;

    for (idx, table) in tables.iter().enumerate().skip(1) {
        if table.labels != first.labels {
            return Err(ScrapeError::SchemaMismatch(format!(
                "table {} has {} columns with different labels than table 0 ({} columns)",
                idx,
                table.labels.len(),
                first.labels.len()
            ))
            .into());
        }
        for (label, (a, b)) in first
            .labels
            .iter()
            .zip(first.columns.iter().zip(&table.columns))
        {
            if a.data_type() != b.data_type() {
                return Err(ScrapeError::SchemaMismatch(format!(
                    "column `{}` is {} in table 0 but {} in table {}",
                    label,
                    a.data_type(),
                    b.data_type(),
                    idx
                ))
                .into());
            }
        }
    }

    let mut merged = Vec::with_capacity(first.columns.len());
    for col_idx in 0..first.columns.len() {
        let parts: Vec<&dyn Array> = tables
            .iter()
            .map(|t| t.columns[col_idx].as_ref())
            .collect();
        let concatenated = compute::concat(&parts)
            .with_context(|| format!("concatenating column `{}`", first.labels[col_idx]))?;
        merged.push(concatenated);
    }

    RecordTable::new(first.labels.clone(), merged)
}
