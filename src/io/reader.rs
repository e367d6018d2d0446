//! Streaming reader over wallet operation rows
//!
//! Yields one `Result<Operation, LedgerError>` per CSV row without loading
//! the whole file. Fatal errors (file not found) are returned from `new()`;
//! a malformed row is yielded as an `Err` carrying its line number and
//! iteration continues with the next row.
//!
//! ```no_run
//! use wallet_ledger::io::OperationReader;
//! use std::path::Path;
//!
//! let reader = OperationReader::new(Path::new("operations.csv")).unwrap();
//! for result in reader {
//!     match result {
//!         Ok(operation) => println!("{:?}", operation),
//!         Err(e) => eprintln!("Error: {}", e),
//!     }
//! }
//! ```

use crate::io::csv_format::{convert_operation_record, Operation, OperationRecord};
use crate::types::LedgerError;
use csv::{ReaderBuilder, Trim};
use std::fs::File;
use std::path::Path;

#[derive(Debug)]
pub struct OperationReader {
    reader: csv::Reader<File>,
    line_num: u64,
}

impl OperationReader {
    /// Open a CSV file for streaming
    ///
    /// Fields are trimmed and rows may omit trailing optional columns.
    pub fn new(path: &Path) -> Result<Self, LedgerError> {
        let file = File::open(path).map_err(|e| LedgerError::IoError {
            message: format!("failed to open '{}': {}", path.display(), e),
        })?;

        let reader = ReaderBuilder::new()
            .trim(Trim::All)
            .flexible(true)
            .buffer_capacity(8 * 1024)
            .from_reader(file);

        Ok(Self {
            reader,
            line_num: 1,
        })
    }
}

impl Iterator for OperationReader {
    type Item = Result<Operation, LedgerError>;

    fn next(&mut self) -> Option<Self::Item> {
        let row = self.reader.deserialize::<OperationRecord>().next()?;
        self.line_num += 1;
        let line = self.line_num;

        let parsed = row
            .map_err(|e| e.to_string())
            .and_then(convert_operation_record)
            .map_err(|message| LedgerError::ParseError {
                line: Some(line),
                message,
            });
        Some(parsed)
    }
}
