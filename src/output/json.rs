use crate::pipeline::VerificationReport;
use crate::VetError;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Writes the report as pretty-printed JSON
pub fn write_json_report(report: &VerificationReport, output_path: &Path) -> Result<(), VetError> {
    let mut writer = BufWriter::new(File::create(output_path)?);
    serde_json::to_writer_pretty(&mut writer, report)?;
    writer.write_all(b"\n")?;
    writer.flush()?;
    Ok(())
}
