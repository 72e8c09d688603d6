//! Faults raised by sheet mutations and lookups.
//!
//! Computational errors produced while evaluating a formula are *not* here:
//! they are data (`formula::FormulaError`) and travel inside `CellValue`.

use thiserror::Error;

use crate::formula::FormulaParseError;
use crate::position::Position;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SheetError {
    #[error("invalid position ({}, {})", .0.row, .0.col)]
    InvalidPosition(Position),

    #[error("circular dependency: {0} would depend on itself")]
    CircularDependency(Position),

    #[error("formula parse error: {0}")]
    FormulaParse(#[from] FormulaParseError),
}

impl SheetError {
    /// Stable machine-readable code, used in logs.
    pub fn code(&self) -> &'static str {
        match self {
            SheetError::InvalidPosition(_) => "invalid_position",
            SheetError::CircularDependency(_) => "circular_dependency",
            SheetError::FormulaParse(_) => "formula_parse_error",
        }
    }
}

pub type Result<T> = std::result::Result<T, SheetError>;
