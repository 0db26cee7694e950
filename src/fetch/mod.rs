pub mod urls;
pub mod zips;
