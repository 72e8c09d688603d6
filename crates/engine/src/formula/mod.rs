// Formula parsing and evaluation

pub mod eval;
pub mod parser;

pub use eval::{CellLookup, FormulaError};
pub use parser::FormulaParseError;

use crate::position::Position;
use parser::Expr;

/// A parsed formula expression.
///
/// Holds the AST together with the in-grid positions it reads, computed once
/// at parse time.
#[derive(Debug, Clone, PartialEq)]
pub struct Formula {
    expr: Expr,
    refs: Vec<Position>,
}

/// Parse formula text (without the leading `=`).
pub fn parse(expression: &str) -> Result<Formula, FormulaParseError> {
    let expr = parser::parse_expression(expression)?;
    let refs = parser::extract_cell_refs(&expr);
    Ok(Formula { expr, refs })
}

impl Formula {
    pub fn evaluate<L: CellLookup + ?Sized>(&self, lookup: &L) -> Result<f64, FormulaError> {
        eval::evaluate(&self.expr, lookup)
    }

    /// Canonical expression text, without the leading `=`.
    pub fn expression(&self) -> String {
        parser::format_expr(&self.expr)
    }

    /// Sorted, deduplicated in-grid positions this formula reads.
    pub fn referenced_cells(&self) -> &[Position] {
        &self.refs
    }
}
