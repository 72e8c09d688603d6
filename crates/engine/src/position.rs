//! Grid coordinates.
//!
//! A `Position` is the stable identity of a cell: it keys the sparse table and
//! every edge of the dependency graph.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Number of addressable rows.
pub const MAX_ROWS: usize = 16384;
/// Number of addressable columns.
pub const MAX_COLS: usize = 16384;

const MAX_COL_LETTERS: usize = 3;

/// A zero-based (row, col) grid location.
///
/// Ordering is row-major, which keeps dumps and sorted reference lists stable.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Position {
    /// Row index (0-based)
    pub row: usize,
    /// Column index (0-based)
    pub col: usize,
}

impl Position {
    #[inline]
    pub const fn new(row: usize, col: usize) -> Self {
        Self { row, col }
    }

    /// True if the position lies inside the `MAX_ROWS` x `MAX_COLS` grid.
    #[inline]
    pub fn is_valid(&self) -> bool {
        self.row < MAX_ROWS && self.col < MAX_COLS
    }

    /// Parse an A1-style address (`A1`, `BC12`). Column letters must be uppercase.
    ///
    /// Returns `None` for malformed input or addresses outside the grid.
    pub fn from_a1(s: &str) -> Option<Self> {
        let letters = s.bytes().take_while(|b| b.is_ascii_uppercase()).count();
        if letters == 0 || letters > MAX_COL_LETTERS {
            return None;
        }
        let (col_str, row_str) = s.split_at(letters);
        if row_str.is_empty() || !row_str.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }

        let row: usize = row_str.parse().ok()?;
        if row == 0 {
            return None;
        }

        // A=1 .. Z=26, AA=27, ...
        let col = col_str
            .bytes()
            .fold(0usize, |acc, b| acc * 26 + (b - b'A' + 1) as usize)
            - 1;

        let pos = Position::new(row - 1, col);
        pos.is_valid().then_some(pos)
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", col_to_letters(self.col), self.row + 1)
    }
}

/// Convert 0-based column index to letter(s): 0 -> A, 25 -> Z, 26 -> AA.
pub(crate) fn col_to_letters(col: usize) -> String {
    let mut result = String::new();
    let mut n = col + 1;
    while n > 0 {
        n -= 1;
        result.insert(0, (b'A' + (n % 26) as u8) as char);
        n /= 26;
    }
    result
}

/// Extent of a rectangle anchored at the origin.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Size {
    pub rows: usize,
    pub cols: usize,
}

impl Size {
    pub const fn new(rows: usize, cols: usize) -> Self {
        Self { rows, cols }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_position_validity() {
        assert!(Position::new(0, 0).is_valid());
        assert!(Position::new(MAX_ROWS - 1, MAX_COLS - 1).is_valid());
        assert!(!Position::new(MAX_ROWS, 0).is_valid());
        assert!(!Position::new(0, MAX_COLS).is_valid());
    }

    #[test]
    fn test_col_to_letters() {
        assert_eq!(col_to_letters(0), "A");
        assert_eq!(col_to_letters(25), "Z");
        assert_eq!(col_to_letters(26), "AA");
        assert_eq!(col_to_letters(701), "ZZ");
        assert_eq!(col_to_letters(702), "AAA");
    }

    #[test]
    fn test_from_a1() {
        assert_eq!(Position::from_a1("A1"), Some(Position::new(0, 0)));
        assert_eq!(Position::from_a1("C3"), Some(Position::new(2, 2)));
        assert_eq!(Position::from_a1("AA10"), Some(Position::new(9, 26)));
        assert_eq!(Position::from_a1("XFD16384"), Some(Position::new(16383, 16383)));
    }

    #[test]
    fn test_from_a1_rejects_malformed() {
        assert_eq!(Position::from_a1(""), None);
        assert_eq!(Position::from_a1("A"), None);
        assert_eq!(Position::from_a1("1"), None);
        assert_eq!(Position::from_a1("A0"), None);
        assert_eq!(Position::from_a1("a1"), None);
        assert_eq!(Position::from_a1("A1B"), None);
        assert_eq!(Position::from_a1("ABCD1"), None);
        // Out of grid
        assert_eq!(Position::from_a1("XFE1"), None);
        assert_eq!(Position::from_a1("A16385"), None);
    }

    #[test]
    fn test_display() {
        assert_eq!(Position::new(0, 0).to_string(), "A1");
        assert_eq!(Position::new(9, 26).to_string(), "AA10");
        assert_eq!(Position::new(16383, 16383).to_string(), "XFD16384");
    }

    #[test]
    fn test_ordering_is_row_major() {
        let mut v = vec![Position::new(1, 0), Position::new(0, 5), Position::new(0, 1)];
        v.sort();
        assert_eq!(v, vec![Position::new(0, 1), Position::new(0, 5), Position::new(1, 0)]);
    }
}
