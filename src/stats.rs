use anyhow::{Context, Result};
use arrow::array::{Array, Date32Array, StringArray};
use chrono::{Datelike, Duration, NaiveDate};
use std::collections::BTreeMap;

use crate::process::table::RecordTable;

/// Accident counts grouped by (year of `p2a`, region). Rows whose date was
/// nulled out during ingest are skipped.
pub fn yearly_counts(table: &RecordTable) -> Result<BTreeMap<(i32, String), u64>> {
    let regions = table
        .column("region")
        .context("table has no `region` column")?
        .as_any()
        .downcast_ref::<StringArray>()
        .context("`region` column is not a string array")?
        .clone();
    let dates = table
        .column("p2a")
        .context("table has no `p2a` column")?
        .as_any()
        .downcast_ref::<Date32Array>()
        .context("`p2a` column is not a date array")?
        .clone();

    let epoch = NaiveDate::from_ymd_opt(1970, 1, 1).unwrap();
    let mut counts = BTreeMap::new();
    for row in 0..table.num_rows() {
        if dates.is_null(row) {
            continue;
        }
        let date = epoch + Duration::days(dates.value(row) as i64);
        let key = (date.year(), regions.value(row).to_string());
        *counts.entry(key).or_insert(0u64) += 1;
    }
    Ok(counts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::ArrayRef;
    use std::sync::Arc;

    fn days(date: &str) -> i32 {
        let epoch = NaiveDate::from_ymd_opt(1970, 1, 1).unwrap();
        (NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap() - epoch).num_days() as i32
    }

    #[test]
    fn counts_group_by_year_and_region() {
        let regions: ArrayRef = Arc::new(StringArray::from(vec!["PHA", "PHA", "STC", "PHA"]));
        let dates: ArrayRef = Arc::new(Date32Array::from(vec![
            Some(days("2020-03-01")),
            Some(days("2020-11-20")),
            Some(days("2020-01-05")),
            None, // failed date coercion
        ]));
        let table = RecordTable::new(
            vec!["region".to_string(), "p2a".to_string()],
            vec![regions, dates],
        )
        .unwrap();

        let counts = yearly_counts(&table).unwrap();
        assert_eq!(counts.get(&(2020, "PHA".to_string())), Some(&2));
        assert_eq!(counts.get(&(2020, "STC".to_string())), Some(&1));
        assert_eq!(counts.len(), 2);
    }
}
