//! Result rendering
//!
//! - [`table`] - terminal tables from JSON records
//! - [`csv_writer`] - schema-aware CSV export

pub mod csv_writer;
pub mod table;
