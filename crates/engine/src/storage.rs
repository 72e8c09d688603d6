//! Sparse cell table.
//!
//! One vector per row, each grown independently to the widest column written
//! in that row. A slot is `None` until a cell is written or referenced there.

use crate::cell::Cell;
use crate::position::Position;

#[derive(Debug, Default)]
pub(crate) struct CellStore {
    rows: Vec<Vec<Option<Cell>>>,
}

impl CellStore {
    pub fn get(&self, pos: Position) -> Option<&Cell> {
        self.rows.get(pos.row)?.get(pos.col)?.as_ref()
    }

    pub fn get_mut(&mut self, pos: Position) -> Option<&mut Cell> {
        self.rows.get_mut(pos.row)?.get_mut(pos.col)?.as_mut()
    }

    pub fn contains(&self, pos: Position) -> bool {
        self.get(pos).is_some()
    }

    /// Grow the table to cover `pos` and materialize an empty cell there if
    /// the slot is vacant. Returns true if a cell was created.
    pub fn ensure(&mut self, pos: Position) -> bool {
        if self.rows.len() <= pos.row {
            self.rows.resize_with(pos.row + 1, Vec::new);
        }
        let row = &mut self.rows[pos.row];
        if row.len() <= pos.col {
            row.resize_with(pos.col + 1, || None);
        }

        let slot = &mut row[pos.col];
        if slot.is_none() {
            *slot = Some(Cell::new());
            true
        } else {
            false
        }
    }

    /// Vacate a slot. The row keeps its allocated width.
    pub fn remove(&mut self, pos: Position) -> Option<Cell> {
        self.rows.get_mut(pos.row)?.get_mut(pos.col)?.take()
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Allocated slots of one row; empty for rows never touched.
    pub fn row(&self, row: usize) -> &[Option<Cell>] {
        self.rows.get(row).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Every allocated cell, row-major.
    pub fn iter(&self) -> impl Iterator<Item = (Position, &Cell)> + '_ {
        self.rows.iter().enumerate().flat_map(|(r, row)| {
            row.iter()
                .enumerate()
                .filter_map(move |(c, slot)| slot.as_ref().map(|cell| (Position::new(r, c), cell)))
        })
    }
}
