//! JSON output formatting.

use crate::report::Report;
use std::io::{self, Write};

/// Print the full report as JSON.
pub fn print_json(report: &Report) -> io::Result<()> {
    let stdout = io::stdout();
    write_json(&mut stdout.lock(), report)
}

pub fn write_json<W: Write>(out: &mut W, report: &Report) -> io::Result<()> {
    let json = serde_json::to_string_pretty(report).map_err(io::Error::other)?;
    writeln!(out, "{}", json)
}
