//! Writing outcome records to the report stream.

use std::io::{self, Write};

use crate::outcome::OutcomeRecord;

/// Report line format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// `<local-path>[ !][ <status>]`
    #[default]
    Text,

    /// One JSON object per line.
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            other => Err(format!("unknown output format: {other}")),
        }
    }
}

/// Write one record and flush, so progress is visible during long batches.
pub fn write_record<W: Write>(
    out: &mut W,
    record: &OutcomeRecord,
    format: OutputFormat,
) -> io::Result<()> {
    match format {
        OutputFormat::Text => writeln!(out, "{record}")?,
        OutputFormat::Json => writeln!(out, "{}", record.to_json())?,
    }
    out.flush()
}
