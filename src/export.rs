use anyhow::Result;
use std::io::Write;

use crate::sheets::Grid;

/// Write a grid as CSV. Rows may differ in length.
pub fn write_csv<W: Write>(grid: &Grid, writer: W) -> Result<()> {
    let mut csv = csv::WriterBuilder::new().flexible(true).from_writer(writer);
    for row in grid {
        csv.write_record(row.iter().map(|cell| cell.to_string()))?;
    }
    csv.flush()?;
    Ok(())
}
