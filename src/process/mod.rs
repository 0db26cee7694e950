pub mod coerce;
pub mod loader;
pub mod table;
