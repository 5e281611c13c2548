//! Google Sheets access and the snapshot merge

mod client;
mod credentials;
mod merge;

use anyhow::Result;

use crate::types::Cell;

pub use client::SheetsClient;
pub use credentials::ServiceAccountKey;
pub use merge::{merge_snapshot, sync_snapshot};

/// Rows of cells, row 0 being the header
pub type Grid = Vec<Vec<Cell>>;

/// Whole-range reads and writes against one spreadsheet
pub trait SheetStore {
    /// Current contents of `range`; empty if the sheet has no values
    fn get_values(&self, range: &str) -> Result<Grid>;

    /// Overwrite `range` with `grid`, values taken literally
    fn update_values(&self, range: &str, grid: &Grid) -> Result<()>;
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::cell::{Cell as Counter, RefCell};

    /// In-memory sheet that counts writes
    #[derive(Default)]
    pub struct MemorySheet {
        pub grid: RefCell<Grid>,
        pub updates: Counter<usize>,
    }

    impl SheetStore for MemorySheet {
        fn get_values(&self, _range: &str) -> Result<Grid> {
            Ok(self.grid.borrow().clone())
        }

        fn update_values(&self, _range: &str, grid: &Grid) -> Result<()> {
            self.updates.set(self.updates.get() + 1);
            *self.grid.borrow_mut() = grid.clone();
            Ok(())
        }
    }
}
