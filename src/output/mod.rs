//! Output formatting module.
//!
//! Provides formatters for plain text, JSON, and CSV output of scan reports.

mod csv_format;
mod json_format;
mod plain;

pub use csv_format::{print_csv, write_csv};
pub use json_format::{print_json, write_json};
pub use plain::{
    print_error, print_info, print_plain, print_scan_header, print_success, print_warning,
    truncate_string, write_plain,
};

use crate::cli::OutputFormat;
use crate::report::Report;
use std::io::{self, Write};

/// Format and print a report according to the specified format.
pub fn print_results(report: &Report, format: OutputFormat) -> io::Result<()> {
    match format {
        OutputFormat::Plain => print_plain(report),
        OutputFormat::Json => print_json(report),
        OutputFormat::Csv => print_csv(report),
    }
}

/// Format a report into any writer.
pub fn write_results<W: Write>(out: &mut W, report: &Report, format: OutputFormat) -> io::Result<()> {
    match format {
        OutputFormat::Plain => write_plain(out, report),
        OutputFormat::Json => write_json(out, report),
        OutputFormat::Csv => write_csv(out, report),
    }
}
