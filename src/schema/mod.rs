use arrow::datatypes::{DataType, Field, Schema};
use std::sync::Arc;

/// Semantic type of one output column.
///
/// Strings are fixed-width in the source data (3 chars for the region code,
/// 30 for free text); the loader truncates to `width` on ingest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Str { width: usize },
    I8,
    I16,
    I32,
    I64,
    F32,
    /// Calendar date at day granularity (Arrow Date32).
    Date,
}

impl ColumnType {
    pub fn to_arrow(self) -> DataType {
        match self {
            ColumnType::Str { .. } => DataType::Utf8,
            ColumnType::I8 => DataType::Int8,
            ColumnType::I16 => DataType::Int16,
            ColumnType::I32 => DataType::Int32,
            ColumnType::I64 => DataType::Int64,
            ColumnType::F32 => DataType::Float32,
            ColumnType::Date => DataType::Date32,
        }
    }
}

use ColumnType::*;

/// The fixed 65-column schema, in output order.
///
/// Column 0 (`region`) is synthesized from the region code; columns 1..=64
/// map positionally onto the 64 `;`-separated fields of each input row.
pub static SCHEMA: [(&str, ColumnType); 65] = [
    ("region", Str { width: 3 }),
    ("p1", I64),
    ("p36", I8),
    ("p37", I8),
    ("p2a", Date),
    ("weekday(p2a)", I8),
    ("p2b", I16),
    ("p6", I8),
    ("p7", I8),
    ("p8", I8),
    ("p9", I8),
    ("p10", I8),
    ("p11", I8),
    ("p12", I16),
    ("p13a", I8),
    ("p13b", I8),
    ("p13c", I8),
    ("p14", I16),
    ("p15", I8),
    ("p16", I8),
    ("p17", I8),
    ("p18", I8),
    ("p19", I8),
    ("p20", I8),
    ("p21", I8),
    ("p22", I8),
    ("p23", I8),
    ("p24", I8),
    ("p27", I8),
    ("p28", I8),
    ("p34", I8),
    ("p35", I8),
    ("p39", I8),
    ("p44", I8),
    ("p45a", I8),
    ("p47", I8),
    ("p48a", I8),
    ("p49", I8),
    ("p50a", I8),
    ("p50b", I8),
    ("p51", I8),
    ("p52", I8),
    ("p53", I16),
    ("p55a", I8),
    ("p57", I8),
    ("p58", I8),
    ("a", I8),
    ("b", F32),
    ("d", F32),
    ("e", F32),
    ("f", F32),
    ("g", F32),
    ("h", Str { width: 30 }),
    ("i", Str { width: 30 }),
    ("j", Str { width: 30 }),
    ("k", Str { width: 30 }),
    ("l", Str { width: 30 }),
    ("n", I32),
    ("o", Str { width: 30 }),
    ("p", Str { width: 30 }),
    ("q", Str { width: 30 }),
    ("r", I64),
    ("s", I64),
    ("t", Str { width: 30 }),
    ("p5a", I8),
];

/// Number of output columns, including the synthesized `region` column.
pub const COLUMN_COUNT: usize = 65;

/// Number of `;`-separated fields expected in each input row.
pub const FIELD_COUNT: usize = COLUMN_COUNT - 1;

/// Column labels in schema order.
pub fn labels() -> Vec<String> {
    SCHEMA.iter().map(|(name, _)| name.to_string()).collect()
}

/// The schema rendered as an Arrow schema. Every field is declared nullable
/// so that tables survive the Parquet round trip unchanged; in practice only
/// the date column ever carries nulls (failed date coercions).
pub fn arrow_schema() -> Arc<Schema> {
    let fields: Vec<Field> = SCHEMA
        .iter()
        .map(|(name, ty)| Field::new(*name, ty.to_arrow(), true))
        .collect();
    Arc::new(Schema::new(fields))
}
