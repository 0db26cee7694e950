use anyhow::{Context, Result};
use csv::{ReaderBuilder, StringRecord};
use encoding_rs::WINDOWS_1250;
use rayon::prelude::*;
use std::fs::File;
use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use zip::ZipArchive;

use crate::process::coerce::{CellOutcome, ColumnBuilder};
use crate::process::table::RecordTable;
use crate::region::region_filename;
use crate::schema::{self, FIELD_COUNT, SCHEMA};

/// Decode the region's CSV entry out of one zip archive into a UTF-8 string.
/// The entries are Windows-1250, not UTF-8.
fn read_region_entry(archive_path: &Path, entry_name: &str) -> Result<String> {
    let file = File::open(archive_path)
        .with_context(|| format!("opening archive {}", archive_path.display()))?;
    let mut archive = ZipArchive::new(file)
        .with_context(|| format!("reading archive {}", archive_path.display()))?;
    let mut entry = archive.by_name(entry_name).with_context(|| {
        format!(
            "locating entry {} in archive {}",
            entry_name,
            archive_path.display()
        )
    })?;

    let mut bytes = Vec::with_capacity(entry.size() as usize);
    entry.read_to_end(&mut bytes).with_context(|| {
        format!(
            "reading entry {} from archive {}",
            entry_name,
            archive_path.display()
        )
    })?;

    let (text, _, had_errors) = WINDOWS_1250.decode(&bytes);
    if had_errors {
        warn!(archive = %archive_path.display(), entry = entry_name,
              "undecodable bytes in entry; replacement characters substituted");
    }
    Ok(text.into_owned())
}

fn csv_reader(text: &str) -> csv::Reader<Cursor<&[u8]>> {
    ReaderBuilder::new()
        .delimiter(b';')
        .quote(b'"')
        .has_headers(false)
        .flexible(true)
        .from_reader(Cursor::new(text.as_bytes()))
}

/// Pass 1: rows for this region in one archive.
fn count_rows(archive_path: &Path, entry_name: &str) -> Result<usize> {
    let text = read_region_entry(archive_path, entry_name)?;
    Ok(csv_reader(&text).records().filter(Result::is_ok).count())
}

/// Pass 2 helper: append one row across all 65 builders. Column 0 always
/// receives the region code; absent trailing fields fill with type defaults
/// so every column stays aligned.
fn append_row(
    builders: &mut [ColumnBuilder],
    record: &StringRecord,
    region: &str,
    archive: &Path,
    row: usize,
) {
    builders[0].append_raw(region);
    for field_idx in 0..FIELD_COUNT {
        let builder = &mut builders[field_idx + 1];
        match record.get(field_idx) {
            Some(raw) => {
                if builder.append_raw(raw) == CellOutcome::DateNull {
                    warn!(
                        region,
                        archive = %archive.display(),
                        row,
                        column = SCHEMA[field_idx + 1].0,
                        value = raw,
                        "unparseable date; stored as null"
                    );
                }
            }
            None => builder.append_default(),
        }
    }
}

/// Load every row for `region` out of the given archives into a 65-column
/// table.
///
/// Two passes: the first counts rows so each column can be allocated at its
/// final size, the second coerces and fills. Archives are read in the order
/// given; duplicated references are read twice, matching the resolver's
/// output contract.
pub fn load_region(archives: &[PathBuf], region: &str) -> Result<RecordTable> {
    let entry_name = region_filename(region)?;

    let counts: Vec<usize> = archives
        .par_iter()
        .map(|path| count_rows(path, entry_name))
        .collect::<Result<_>>()?;
    let total_rows: usize = counts.iter().sum();
    debug!(region, archives = archives.len(), rows = total_rows, "counted rows");

    let mut builders: Vec<ColumnBuilder> = SCHEMA
        .iter()
        .map(|(_, ty)| ColumnBuilder::with_capacity(*ty, total_rows))
        .collect();

    let mut row_index = 0usize;
    for path in archives {
        let text = read_region_entry(path, entry_name)?;
        for record in csv_reader(&text).records() {
            let record = match record {
                Ok(r) => r,
                Err(err) => {
                    warn!(region, archive = %path.display(), %err, "skipping malformed row");
                    continue;
                }
            };
            append_row(&mut builders, &record, region, path, row_index);
            row_index += 1;
        }
    }

    let columns = builders.into_iter().map(ColumnBuilder::finish).collect();
    RecordTable::new(schema::labels(), columns)
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{Array, Date32Array, Float32Array, Int16Array, Int64Array, Int8Array, StringArray};
    use std::io::Write;
    use tempfile::TempDir;
    use zip::write::{ExtendedFileOptions, FileOptions};
    use zip::CompressionMethod;

    /// Two plausible rows for region file 15.csv (ZLK). 64 `;`-separated
    /// fields, Windows-1250 encoded, street names with Czech diacritics.
    fn sample_rows() -> Vec<Vec<String>> {
        let mut row_a: Vec<String> = vec!["0".to_string(); FIELD_COUNT];
        row_a[0] = "002100160001".to_string(); // p1
        row_a[3] = "2021-01-02".to_string(); // p2a
        row_a[4] = "6".to_string(); // weekday(p2a)
        row_a[47] = "12,5".to_string(); // d, comma decimal
        row_a[52] = "Dlouhá třída".to_string(); // i
        let mut row_b: Vec<String> = vec!["0".to_string(); FIELD_COUNT];
        row_b[0] = "002100160002".to_string();
        row_b[3] = "not-a-date".to_string();
        row_b[4] = "xx".to_string(); // unparseable int
        row_b[47] = "abc".to_string(); // unparseable float
        vec![row_a, row_b]
    }

    fn write_zip(dir: &Path, name: &str, entry: &str, rows: &[Vec<String>]) -> PathBuf {
        let lines: String = rows
            .iter()
            .map(|r| r.join(";"))
            .collect::<Vec<_>>()
            .join("\r\n");
        let (encoded, _, _) = WINDOWS_1250.encode(&lines);

        let path = dir.join(name);
        let file = File::create(&path).unwrap();
        let mut zip = zip::ZipWriter::new(file);
        let options =
            FileOptions::<ExtendedFileOptions>::default().compression_method(CompressionMethod::Stored);
        zip.start_file(entry, options).unwrap();
        zip.write_all(&encoded).unwrap();
        zip.finish().unwrap();
        path
    }

    #[test]
    fn load_produces_sixty_five_aligned_columns() {
        let dir = TempDir::new().unwrap();
        let zip_a = write_zip(dir.path(), "data-gis2021.zip", "15.csv", &sample_rows());
        let zip_b = write_zip(dir.path(), "data-gis2022.zip", "15.csv", &sample_rows()[..1].to_vec());

        let table = load_region(&[zip_a, zip_b], "ZLK").unwrap();
        assert_eq!(table.labels().len(), 65);
        assert_eq!(table.columns().len(), 65);
        assert_eq!(table.num_rows(), 3);
        for col in table.columns() {
            assert_eq!(col.len(), 3);
        }
    }

    #[test]
    fn region_column_is_synthesized() {
        let dir = TempDir::new().unwrap();
        let zip = write_zip(dir.path(), "data-gis2021.zip", "15.csv", &sample_rows());

        let table = load_region(&[zip], "ZLK").unwrap();
        let region = table
            .column("region")
            .unwrap()
            .as_any()
            .downcast_ref::<StringArray>()
            .unwrap()
            .clone();
        assert_eq!(region.value(0), "ZLK");
        assert_eq!(region.value(1), "ZLK");
    }

    #[test]
    fn fallbacks_apply_per_cell_without_dropping_rows() {
        let dir = TempDir::new().unwrap();
        let zip = write_zip(dir.path(), "data-gis2021.zip", "15.csv", &sample_rows());

        let table = load_region(&[zip], "ZLK").unwrap();
        assert_eq!(table.num_rows(), 2);

        let p1 = table
            .column("p1")
            .unwrap()
            .as_any()
            .downcast_ref::<Int64Array>()
            .unwrap()
            .clone();
        assert_eq!(p1.value(0), 2100160001);
        assert_eq!(p1.value(1), 2100160002);

        let weekday = table
            .column("weekday(p2a)")
            .unwrap()
            .as_any()
            .downcast_ref::<Int8Array>()
            .unwrap()
            .clone();
        assert_eq!(weekday.value(0), 6);
        assert_eq!(weekday.value(1), -1); // sentinel

        let d = table
            .column("d")
            .unwrap()
            .as_any()
            .downcast_ref::<Float32Array>()
            .unwrap()
            .clone();
        assert_eq!(d.value(0), 12.5);
        assert!(d.value(1).is_nan());

        let date = table
            .column("p2a")
            .unwrap()
            .as_any()
            .downcast_ref::<Date32Array>()
            .unwrap()
            .clone();
        assert!(date.is_valid(0));
        assert!(date.is_null(1));
    }

    #[test]
    fn damage_coordinate_and_street_columns_survive_real_values() {
        // p53 routinely exceeds the i8 range, b is a comma-decimal
        // coordinate, and h is street text; none of them may collapse into a
        // numeric fallback.
        let mut row: Vec<String> = vec!["0".to_string(); FIELD_COUNT];
        row[41] = "5000".to_string(); // p53
        row[42] = "3".to_string(); // p55a
        row[46] = "1234,5".to_string(); // b
        row[51] = "Hlavní".to_string(); // h

        let dir = TempDir::new().unwrap();
        let zip = write_zip(dir.path(), "data-gis2021.zip", "15.csv", &[row]);
        let table = load_region(&[zip], "ZLK").unwrap();

        let p53 = table
            .column("p53")
            .unwrap()
            .as_any()
            .downcast_ref::<Int16Array>()
            .unwrap()
            .clone();
        assert_eq!(p53.value(0), 5000);

        let p55a = table
            .column("p55a")
            .unwrap()
            .as_any()
            .downcast_ref::<Int8Array>()
            .unwrap()
            .clone();
        assert_eq!(p55a.value(0), 3);

        let b = table
            .column("b")
            .unwrap()
            .as_any()
            .downcast_ref::<Float32Array>()
            .unwrap()
            .clone();
        assert_eq!(b.value(0), 1234.5);

        let h = table
            .column("h")
            .unwrap()
            .as_any()
            .downcast_ref::<StringArray>()
            .unwrap()
            .clone();
        assert_eq!(h.value(0), "Hlavní");
    }

    #[test]
    fn windows_1250_text_is_decoded() {
        let dir = TempDir::new().unwrap();
        let zip = write_zip(dir.path(), "data-gis2021.zip", "15.csv", &sample_rows());

        let table = load_region(&[zip], "ZLK").unwrap();
        let street = table
            .column("i")
            .unwrap()
            .as_any()
            .downcast_ref::<StringArray>()
            .unwrap()
            .clone();
        assert_eq!(street.value(0), "Dlouhá třída");
    }

    #[test]
    fn loading_twice_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let zip = write_zip(dir.path(), "data-gis2021.zip", "15.csv", &sample_rows());

        let first = load_region(std::slice::from_ref(&zip), "ZLK").unwrap();
        let second = load_region(std::slice::from_ref(&zip), "ZLK").unwrap();
        for (a, b) in first.columns().iter().zip(second.columns()) {
            assert_eq!(a.to_data(), b.to_data());
        }
    }

    #[test]
    fn unknown_region_fails_before_any_io() {
        let err = load_region(&[PathBuf::from("missing.zip")], "ABC").unwrap_err();
        let scrape = err.downcast_ref::<crate::error::ScrapeError>().unwrap();
        assert!(matches!(
            scrape,
            crate::error::ScrapeError::UnknownRegion(_)
        ));
    }
}
