use arrow::array::{
    ArrayRef, Date32Builder, Float32Builder, Int16Builder, Int32Builder, Int64Builder, Int8Builder,
    StringBuilder,
};
use chrono::NaiveDate;
use std::sync::Arc;

use crate::schema::ColumnType;

/// Integer columns store this when a cell fails to parse. Valid codes in the
/// dataset are non-negative, so -1 is unambiguous.
pub const INT_SENTINEL: i64 = -1;

/// What happened to one cell on append.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellOutcome {
    /// Coerced cleanly (including a successful comma-decimal retry).
    Ok,
    /// Integer cell failed to parse; the sentinel was stored.
    IntSentinel,
    /// Float cell failed to parse; NaN was stored.
    FloatNan,
    /// Date cell failed to parse; a null was stored. The caller is expected
    /// to surface this, there is no sentinel date.
    DateNull,
}

/// A pre-sized typed column under construction. One exists per schema column
/// during pass 2 of the load.
pub enum ColumnBuilder {
    Str { width: usize, builder: StringBuilder },
    I8(Int8Builder),
    I16(Int16Builder),
    I32(Int32Builder),
    I64(Int64Builder),
    F32(Float32Builder),
    Date(Date32Builder),
}

impl ColumnBuilder {
    /// Allocate a builder for `ty` sized for `rows` values up front.
    pub fn with_capacity(ty: ColumnType, rows: usize) -> Self {
        match ty {
            ColumnType::Str { width } => ColumnBuilder::Str {
                width,
                builder: StringBuilder::with_capacity(rows, rows * width),
            },
            ColumnType::I8 => ColumnBuilder::I8(Int8Builder::with_capacity(rows)),
            ColumnType::I16 => ColumnBuilder::I16(Int16Builder::with_capacity(rows)),
            ColumnType::I32 => ColumnBuilder::I32(Int32Builder::with_capacity(rows)),
            ColumnType::I64 => ColumnBuilder::I64(Int64Builder::with_capacity(rows)),
            ColumnType::F32 => ColumnBuilder::F32(Float32Builder::with_capacity(rows)),
            ColumnType::Date => ColumnBuilder::Date(Date32Builder::with_capacity(rows)),
        }
    }

    /// Coerce `raw` to this column's type and append it, applying the
    /// per-type fallback when the cell does not parse:
    /// integers get the -1 sentinel, floats get a comma-decimal retry and
    /// then NaN, dates get a null. Never fails; the outcome reports which
    /// path was taken.
    pub fn append_raw(&mut self, raw: &str) -> CellOutcome {
        let text = raw.trim();
        match self {
            ColumnBuilder::Str { width, builder } => {
                builder.append_value(truncate(text, *width));
                CellOutcome::Ok
            }
            ColumnBuilder::I8(b) => match text.parse::<i8>() {
                Ok(v) => {
                    b.append_value(v);
                    CellOutcome::Ok
                }
                Err(_) => {
                    b.append_value(INT_SENTINEL as i8);
                    CellOutcome::IntSentinel
                }
            },
            ColumnBuilder::I16(b) => match text.parse::<i16>() {
                Ok(v) => {
                    b.append_value(v);
                    CellOutcome::Ok
                }
                Err(_) => {
                    b.append_value(INT_SENTINEL as i16);
                    CellOutcome::IntSentinel
                }
            },
            ColumnBuilder::I32(b) => match text.parse::<i32>() {
                Ok(v) => {
                    b.append_value(v);
                    CellOutcome::Ok
                }
                Err(_) => {
                    b.append_value(INT_SENTINEL as i32);
                    CellOutcome::IntSentinel
                }
            },
            ColumnBuilder::I64(b) => match text.parse::<i64>() {
                Ok(v) => {
                    b.append_value(v);
                    CellOutcome::Ok
                }
                Err(_) => {
                    b.append_value(INT_SENTINEL);
                    CellOutcome::IntSentinel
                }
            },
            ColumnBuilder::F32(b) => match parse_float(text) {
                Some(v) => {
                    b.append_value(v);
                    CellOutcome::Ok
                }
                None => {
                    b.append_value(f32::NAN);
                    CellOutcome::FloatNan
                }
            },
            ColumnBuilder::Date(b) => match parse_date_days(text) {
                Some(days) => {
                    b.append_value(days);
                    CellOutcome::Ok
                }
                None => {
                    b.append_null();
                    CellOutcome::DateNull
                }
            },
        }
    }

    /// Append the type's zero value. Used for fields absent from a short row,
    /// matching the pre-zeroed-array semantics of the fill pass.
    pub fn append_default(&mut self) {
        match self {
            ColumnBuilder::Str { builder, .. } => builder.append_value(""),
            ColumnBuilder::I8(b) => b.append_value(0),
            ColumnBuilder::I16(b) => b.append_value(0),
            ColumnBuilder::I32(b) => b.append_value(0),
            ColumnBuilder::I64(b) => b.append_value(0),
            ColumnBuilder::F32(b) => b.append_value(0.0),
            ColumnBuilder::Date(b) => b.append_value(0),
        }
    }

    pub fn finish(self) -> ArrayRef {
        match self {
            ColumnBuilder::Str { mut builder, .. } => Arc::new(builder.finish()),
            ColumnBuilder::I8(mut b) => Arc::new(b.finish()),
            ColumnBuilder::I16(mut b) => Arc::new(b.finish()),
            ColumnBuilder::I32(mut b) => Arc::new(b.finish()),
            ColumnBuilder::I64(mut b) => Arc::new(b.finish()),
            ColumnBuilder::F32(mut b) => Arc::new(b.finish()),
            ColumnBuilder::Date(mut b) => Arc::new(b.finish()),
        }
    }
}

/// Parse a float, retrying with `,` normalized to `.` for locale-formatted
/// decimals like `"12,5"`.
fn parse_float(text: &str) -> Option<f32> {
    if let Ok(v) = text.parse::<f32>() {
        return Some(v);
    }
    if text.contains(',') {
        return text.replace(',', ".").parse::<f32>().ok();
    }
    None
}

/// Parse a `YYYY-MM-DD` date into days since the Unix epoch (Date32).
fn parse_date_days(text: &str) -> Option<i32> {
    let date = NaiveDate::parse_from_str(text, "%Y-%m-%d").ok()?;
    let epoch = NaiveDate::from_ymd_opt(1970, 1, 1).unwrap();
    Some((date - epoch).num_days() as i32)
}

/// Truncate to at most `width` characters without splitting a code point.
fn truncate(text: &str, width: usize) -> &str {
    match text.char_indices().nth(width) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
