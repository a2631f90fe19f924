//! Streaming readers that produce rows for a script pipeline's input side.

pub mod csv;

pub use self::csv::CsvReader;
