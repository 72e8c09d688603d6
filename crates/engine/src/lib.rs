pub mod cell;
pub mod error;
pub mod formula;
mod graph;
pub mod position;
pub mod sheet;
mod storage;

pub use cell::{CellValue, ESCAPE_SIGN, FORMULA_SIGN};
pub use error::{Result, SheetError};
pub use formula::FormulaError;
pub use position::{Position, Size, MAX_COLS, MAX_ROWS};
pub use sheet::{CellView, Sheet};
