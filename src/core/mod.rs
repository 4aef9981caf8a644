//! Core process model
//!
//! Process snapshot records and host process table enumeration.

pub mod models;
pub mod process_table;
