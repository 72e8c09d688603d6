// Formula evaluator - evaluates parsed expressions against a cell source

use thiserror::Error;

use crate::cell::CellValue;
use crate::position::Position;
use super::parser::{Expr, Op, UnaryOp};

/// Computational error produced by evaluating a formula.
///
/// Unlike `SheetError`, this is data: it is cached, returned by value reads,
/// and propagates to every formula that reads the failing cell.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FormulaError {
    /// Reference to a position outside the grid.
    #[error("#REF!")]
    Ref,
    /// Operand is text that does not read as a number.
    #[error("#VALUE!")]
    Value,
    /// Division by zero or a non-finite result.
    #[error("#ARITHM!")]
    Arithmetic,
}

/// Read access to the cells a formula references.
pub trait CellLookup {
    /// Current value at `pos`. Absent and empty cells yield `CellValue::Text("")`.
    fn value_at(&self, pos: Position) -> CellValue;
}

pub fn evaluate<L: CellLookup + ?Sized>(expr: &Expr, lookup: &L) -> Result<f64, FormulaError> {
    match expr {
        Expr::Number(n) => Ok(*n),
        Expr::CellRef(pos) => {
            if !pos.is_valid() {
                return Err(FormulaError::Ref);
            }
            to_number(&lookup.value_at(*pos))
        }
        Expr::Unary { op, operand } => {
            let v = evaluate(operand, lookup)?;
            Ok(match op {
                UnaryOp::Plus => v,
                UnaryOp::Minus => -v,
            })
        }
        Expr::BinaryOp { op, left, right } => {
            let l = evaluate(left, lookup)?;
            let r = evaluate(right, lookup)?;
            let result = match op {
                Op::Add => l + r,
                Op::Sub => l - r,
                Op::Mul => l * r,
                Op::Div => {
                    if r == 0.0 {
                        return Err(FormulaError::Arithmetic);
                    }
                    l / r
                }
            };
            if result.is_finite() {
                Ok(result)
            } else {
                Err(FormulaError::Arithmetic)
            }
        }
    }
}

/// Coerce a referenced cell's value to a number.
fn to_number(value: &CellValue) -> Result<f64, FormulaError> {
    match value {
        CellValue::Number(n) => Ok(*n),
        CellValue::Error(e) => Err(*e),
        CellValue::Text(s) if s.is_empty() => Ok(0.0),
        CellValue::Text(s) => match s.parse::<f64>() {
            Ok(n) if n.is_finite() => Ok(n),
            _ => Err(FormulaError::Value),
        },
    }
}
