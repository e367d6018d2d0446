//! I/O module
//!
//! Handles CSV parsing, replay and output.
//!
//! # Components
//!
//! - `csv_format` - CSV format handling (record conversion, output serialization)
//! - `reader` - Streaming reader over operation rows
//! - `replay` - Applies parsed operations to a `LedgerEngine`

pub mod csv_format;
pub mod reader;
pub mod replay;

pub use csv_format::{
    convert_operation_record, format_amount, parse_amount, write_wallets_csv, Operation,
    OperationRecord,
};
pub use reader::OperationReader;
pub use replay::{replay_file, ReplaySummary, Replayer};
