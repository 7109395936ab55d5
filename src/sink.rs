use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result};
use tracing::info;

use crate::record::CompanyRecord;

const UTF8_BOM: &str = "\u{feff}";

/// Write records as CSV (UTF-8 with BOM), replacing whatever is at `path`.
pub fn write(records: &[CompanyRecord], path: &Path) -> Result<()> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir).with_context(|| format!("Failed to create {}", dir.display()))?;
    }
    let file = File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
    let mut out = BufWriter::new(file);
    out.write_all(UTF8_BOM.as_bytes())?;

    let mut wtr = csv::Writer::from_writer(out);
    if records.is_empty() {
        // serialize() only emits the header alongside the first row
        wtr.write_record(["company_name", "ebitda_source", "cif_source", "cif", "ebitda"])?;
    }
    for r in records {
        wtr.serialize(r)?;
    }
    wtr.flush()
        .with_context(|| format!("Failed to write {}", path.display()))?;

    info!("Data saved to {} ({} companies)", path.display(), records.len());
    Ok(())
}

/// Read a CSV produced by [`write`]; a leading BOM is optional.
pub fn read(path: &Path) -> Result<Vec<CompanyRecord>> {
    let raw =
        fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let body = raw.strip_prefix(UTF8_BOM).unwrap_or(&raw);
    let mut rdr = csv::Reader::from_reader(body.as_bytes());
    let records = rdr
        .deserialize()
        .collect::<Result<Vec<CompanyRecord>, _>>()
        .with_context(|| format!("Malformed row in {}", path.display()))?;
    Ok(records)
}
