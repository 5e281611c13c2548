use anyhow::Result;
use std::collections::HashMap;
use tracing::info;

use super::{Grid, SheetStore};
use crate::types::Cell;

/// Add one snapshot column to `grid`.
///
/// Row 0 is the header; every other row is keyed by its first cell. After
/// the merge every row has exactly as many cells as the header: metrics seen
/// before get their value appended, new metrics get a row padded with empty
/// cells for the earlier runs, and known rows missing from `metrics` get an
/// empty cell.
pub fn merge_snapshot(
    mut grid: Grid,
    header_label: &str,
    timestamp: &str,
    metrics: &[(String, Cell)],
) -> Grid {
    if grid.is_empty() {
        let mut fresh = Vec::with_capacity(metrics.len() + 1);
        fresh.push(vec![Cell::from(header_label), Cell::from(timestamp)]);
        for (label, value) in metrics {
            fresh.push(vec![Cell::from(label.as_str()), value.clone()]);
        }
        return fresh;
    }

    let header = &mut grid[0];
    if header.is_empty() {
        header.push(Cell::from(header_label));
    }
    header.push(Cell::from(timestamp));
    let width = header.len();

    let mut values: HashMap<&str, &Cell> = metrics
        .iter()
        .map(|(label, value)| (label.as_str(), value))
        .collect();

    // Existing rows first, so their order is kept
    for row in grid.iter_mut().skip(1) {
        let value = row
            .first()
            .and_then(Cell::as_str)
            .and_then(|label| values.remove(label));

        // The API drops trailing empty cells, so short rows are normal
        if row.len() < width - 1 {
            row.resize(width - 1, Cell::empty());
        }
        row.push(value.cloned().unwrap_or_else(Cell::empty));
    }

    // Whatever is left has no row yet
    for (label, value) in metrics {
        if values.remove(label.as_str()).is_none() {
            continue;
        }
        let mut row = Vec::with_capacity(width);
        row.push(Cell::from(label.as_str()));
        row.resize(width - 1, Cell::empty());
        row.push(value.clone());
        grid.push(row);
    }

    grid
}

/// Read the sheet, merge the snapshot, and write the whole grid back once
pub fn sync_snapshot<S: SheetStore>(
    store: &S,
    range: &str,
    header_label: &str,
    timestamp: &str,
    metrics: &[(String, Cell)],
) -> Result<Grid> {
    let current = store.get_values(range)?;
    let first_run = current.is_empty();
    let existing_rows = current.len().saturating_sub(1);

    let merged = merge_snapshot(current, header_label, timestamp, metrics);
    store.update_values(range, &merged)?;

    info!(
        first_run,
        rows = merged.len() - 1,
        new_rows = (merged.len() - 1).saturating_sub(existing_rows),
        columns = merged[0].len(),
        "sheet updated"
    );
    Ok(merged)
}
