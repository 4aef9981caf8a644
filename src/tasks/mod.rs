//! Built-in task bodies.

pub mod table_summary;

pub use table_summary::TableSummary;
