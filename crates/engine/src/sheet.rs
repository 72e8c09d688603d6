use std::io::{self, Write};

use crate::cell::{Cell, CellContent, CellValue};
use crate::error::{Result, SheetError};
use crate::formula::CellLookup;
use crate::graph;
use crate::position::{Position, Size};
use crate::storage::CellStore;

/// A sparse grid of cells with dependency tracking and lazy formula caching.
///
/// Every mutation is all-or-nothing: a write rejected for an invalid position,
/// a parse error, or a circular reference leaves content, edges and caches
/// exactly as they were.
#[derive(Debug, Default)]
pub struct Sheet {
    cells: CellStore,
}

impl CellLookup for Sheet {
    fn value_at(&self, pos: Position) -> CellValue {
        self.cells
            .get(pos)
            .map(|cell| cell.value(self))
            .unwrap_or_default()
    }
}

/// Evaluates through the sheet without reading or filling any cache.
struct Uncached<'a>(&'a Sheet);

impl CellLookup for Uncached<'_> {
    fn value_at(&self, pos: Position) -> CellValue {
        self.0
            .cells
            .get(pos)
            .map(|cell| cell.content().value_uncached(self))
            .unwrap_or_default()
    }
}

/// Read view of a non-empty cell, bound to the sheet its formula reads from.
#[derive(Debug, Clone, Copy)]
pub struct CellView<'a> {
    sheet: &'a Sheet,
    pos: Position,
    cell: &'a Cell,
}

impl<'a> CellView<'a> {
    pub fn position(&self) -> Position {
        self.pos
    }

    pub fn value(&self) -> CellValue {
        self.cell.value(self.sheet)
    }

    pub fn text(&self) -> String {
        self.cell.text()
    }

    pub fn referenced_cells(&self) -> &'a [Position] {
        self.cell.referenced_cells()
    }

    pub fn is_referenced(&self) -> bool {
        self.cell.is_referenced()
    }
}

fn check_position(pos: Position) -> Result<()> {
    if pos.is_valid() {
        Ok(())
    } else {
        Err(SheetError::InvalidPosition(pos))
    }
}

impl Sheet {
    pub fn new() -> Self {
        Self::default()
    }

    // =========================================================================
    // Mutation
    // =========================================================================

    /// Set the content of the cell at `pos` from user input.
    ///
    /// Empty input empties the cell, `=expr` stores a formula, anything else is
    /// text (a leading `'` is kept in the text but hidden from the value).
    pub fn set_cell(&mut self, pos: Position, text: &str) -> Result<()> {
        check_position(pos)?;

        let created = self.cells.ensure(pos);
        let result = self.try_set(pos, text);

        if let Err(err) = &result {
            log::debug!("{}: write rejected ({}): {}", pos, err.code(), err);
            // A slot allocated only for this write is rolled back with it.
            if created {
                self.cells.remove(pos);
            }
        }
        result
    }

    fn try_set(&mut self, pos: Position, text: &str) -> Result<()> {
        let content = CellContent::from_input(text)?;
        if graph::would_create_cycle(&self.cells, pos, content.referenced_cells()) {
            return Err(SheetError::CircularDependency(pos));
        }
        self.commit(pos, content);
        Ok(())
    }

    /// Install already-validated content: rewire edges, then invalidate.
    fn commit(&mut self, pos: Position, content: CellContent) {
        let released = graph::replace_edges(&mut self.cells, pos, content.referenced_cells());
        if let Some(cell) = self.cells.get_mut(pos) {
            cell.replace_content(content);
        }
        graph::invalidate(&mut self.cells, pos);
        self.reclaim_orphans(released);
    }

    /// Free empty slots that nothing reads anymore.
    fn reclaim_orphans(&mut self, candidates: Vec<Position>) {
        for candidate in candidates {
            let orphaned = self
                .cells
                .get(candidate)
                .is_some_and(|cell| cell.is_empty() && !cell.is_referenced());
            if orphaned {
                self.cells.remove(candidate);
                log::trace!("{}: orphaned placeholder reclaimed", candidate);
            }
        }
    }

    /// Empty the cell at `pos`.
    ///
    /// Behaves like `set_cell(pos, "")`, then releases the slot unless some
    /// formula still reads it, in which case it stays as a placeholder.
    pub fn clear_cell(&mut self, pos: Position) -> Result<()> {
        check_position(pos)?;

        let Some(cell) = self.raw_cell(pos) else {
            return Ok(());
        };
        let referenced = cell.is_referenced();

        self.commit(pos, CellContent::Empty);
        if !referenced {
            self.cells.remove(pos);
        }
        Ok(())
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// The cell at `pos`, if it has visible content.
    ///
    /// Placeholders kept alive only because formulas reference them are
    /// reported as absent.
    pub fn get_cell(&self, pos: Position) -> Result<Option<CellView<'_>>> {
        check_position(pos)?;
        Ok(self
            .cells
            .get(pos)
            .filter(|cell| !cell.is_empty())
            .map(|cell| CellView { sheet: self, pos, cell }))
    }

    /// Raw slot access, placeholders included.
    pub(crate) fn raw_cell(&self, pos: Position) -> Option<&Cell> {
        self.cells.get(pos)
    }

    /// Value at `pos`; absent cells read as the empty string.
    pub fn value(&self, pos: Position) -> Result<CellValue> {
        check_position(pos)?;
        Ok(self.value_at(pos))
    }

    /// Value at `pos` computed from scratch, bypassing every formula cache.
    ///
    /// Always equal to `value`; used to audit the cache.
    pub fn value_uncached(&self, pos: Position) -> Result<CellValue> {
        check_position(pos)?;
        Ok(Uncached(self).value_at(pos))
    }

    /// Text at `pos`; absent cells read as the empty string.
    pub fn text(&self, pos: Position) -> Result<String> {
        check_position(pos)?;
        Ok(self.cells.get(pos).map(Cell::text).unwrap_or_default())
    }

    /// Positions the cell at `pos` reads, sorted.
    pub fn referenced_cells(&self, pos: Position) -> Result<Vec<Position>> {
        check_position(pos)?;
        Ok(self
            .cells
            .get(pos)
            .map(|cell| cell.referenced_cells().to_vec())
            .unwrap_or_default())
    }

    /// Positions of the formulas that read `pos` directly, sorted.
    pub fn dependents(&self, pos: Position) -> Result<Vec<Position>> {
        check_position(pos)?;
        let mut deps: Vec<Position> = self
            .cells
            .get(pos)
            .map(|cell| cell.incoming.iter().copied().collect())
            .unwrap_or_default();
        deps.sort_unstable();
        Ok(deps)
    }

    // =========================================================================
    // Printing
    // =========================================================================

    /// Smallest origin-anchored rectangle covering every non-empty cell.
    pub fn printable_size(&self) -> Size {
        let mut size = Size::default();
        for row in 0..self.cells.row_count() {
            let last = self
                .cells
                .row(row)
                .iter()
                .rposition(|slot| slot.as_ref().is_some_and(|cell| !cell.is_empty()));
            if let Some(col) = last {
                size.rows = row + 1;
                size.cols = size.cols.max(col + 1);
            }
        }
        size
    }

    /// Values inside the printable area, row by row.
    pub fn values_grid(&self) -> Vec<Vec<CellValue>> {
        let size = self.printable_size();
        (0..size.rows)
            .map(|row| {
                (0..size.cols)
                    .map(|col| self.value_at(Position::new(row, col)))
                    .collect()
            })
            .collect()
    }

    /// Write the printable area as values: tab between columns, newline after each row.
    pub fn print_values<W: Write>(&self, out: &mut W) -> io::Result<()> {
        self.print_with(out, |cell| cell.value(self).to_string())
    }

    /// Write the printable area as texts: tab between columns, newline after each row.
    pub fn print_texts<W: Write>(&self, out: &mut W) -> io::Result<()> {
        self.print_with(out, Cell::text)
    }

    fn print_with<W, F>(&self, out: &mut W, render: F) -> io::Result<()>
    where
        W: Write,
        F: Fn(&Cell) -> String,
    {
        let size = self.printable_size();
        for row in 0..size.rows {
            let slots = self.cells.row(row);
            for col in 0..size.cols {
                if col > 0 {
                    out.write_all(b"\t")?;
                }
                if let Some(Some(cell)) = slots.get(col) {
                    out.write_all(render(cell).as_bytes())?;
                }
            }
            out.write_all(b"\n")?;
        }
        Ok(())
    }
}
