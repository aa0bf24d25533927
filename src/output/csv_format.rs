//! CSV output formatting.

use crate::report::Report;
use std::io::{self, Write};

/// Print the summary rows in CSV format.
pub fn print_csv(report: &Report) -> io::Result<()> {
    let stdout = io::stdout();
    write_csv(stdout.lock(), report)
}

pub fn write_csv<W: Write>(out: W, report: &Report) -> io::Result<()> {
    let mut wtr = csv::Writer::from_writer(out);

    wtr.write_record(["session_id", "category", "value", "alert"])?;

    let session = report.session_id.to_string();
    for entry in report.summary.iter() {
        wtr.write_record([
            session.as_str(),
            entry.category.as_str(),
            entry.value.as_str(),
            if entry.alert { "true" } else { "false" },
        ])?;
    }
    for (host, flagged) in &report.waf_detection {
        let value = format!("{}={}", host, flagged);
        wtr.write_record([session.as_str(), "waf", value.as_str(), if *flagged { "true" } else { "false" }])?;
    }

    wtr.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::Stats;
    use crate::types::SessionId;
    use chrono::Utc;
    use std::collections::BTreeMap;
    use std::path::PathBuf;

    #[test]
    fn test_csv_rows() {
        let mut summary = Stats::new();
        summary.set("Open Ports", "443,80");
        let report = Report {
            tool: "reconflow".to_string(),
            version: "0.1.0".to_string(),
            session_id: SessionId::new(),
            scan_time: Utc::now(),
            completed_at: Utc::now(),
            session_dir: PathBuf::from("/tmp/s"),
            profile: None,
            targets: vec!["example.com".to_string()],
            summary,
            stats: BTreeMap::new(),
            waf_detection: BTreeMap::new(),
            files: BTreeMap::new(),
        };

        let mut buf = Vec::new();
        write_csv(&mut buf, &report).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let mut lines = text.lines();
        assert_eq!(lines.next(), Some("session_id,category,value,alert"));
        assert_eq!(
            lines.next(),
            Some(format!("{},Open Ports,\"443,80\",false", report.session_id).as_str())
        );
    }
}
