use crate::error::ScrapeError;

/// The 14 administrative regions, in the order the pipeline processes them.
/// Each code maps to the fixed two-digit file name that carries the region's
/// rows inside every yearly archive.
pub static REGIONS: [(&str, &str); 14] = [
    ("PHA", "00.csv"),
    ("STC", "01.csv"),
    ("JHC", "02.csv"),
    ("PLK", "03.csv"),
    ("KVK", "19.csv"),
    ("ULK", "04.csv"),
    ("LBK", "18.csv"),
    ("HKK", "05.csv"),
    ("PAK", "17.csv"),
    ("OLK", "14.csv"),
    ("MSK", "07.csv"),
    ("JHM", "06.csv"),
    ("ZLK", "15.csv"),
    ("VYS", "16.csv"),
];

/// All region codes in table order.
pub fn all_codes() -> Vec<&'static str> {
    REGIONS.iter().map(|(code, _)| *code).collect()
}

/// Resolve a region code to its per-archive file name.
pub fn region_filename(code: &str) -> Result<&'static str, ScrapeError> {
    REGIONS
        .iter()
        .find(|(c, _)| *c == code)
        .map(|(_, file)| *file)
        .ok_or_else(|| ScrapeError::UnknownRegion(code.to_string()))
}
