use std::cell::RefCell;
use std::fmt;

use rustc_hash::FxHashSet;
use serde::{Serialize, Serializer};

use crate::formula::parser::format_number;
use crate::formula::{self, CellLookup, Formula, FormulaError, FormulaParseError};
use crate::position::Position;

/// Leading character that turns cell input into a formula.
pub const FORMULA_SIGN: char = '=';
/// Leading character that forces literal text; it is kept in the text but not in the value.
pub const ESCAPE_SIGN: char = '\'';

/// What a read returns.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    /// Literal text; the empty string stands for "no value".
    Text(String),
    Number(f64),
    Error(FormulaError),
}

impl Default for CellValue {
    fn default() -> Self {
        CellValue::Text(String::new())
    }
}

impl From<Result<f64, FormulaError>> for CellValue {
    fn from(result: Result<f64, FormulaError>) -> Self {
        match result {
            Ok(n) => CellValue::Number(n),
            Err(e) => CellValue::Error(e),
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Text(s) => f.write_str(s),
            CellValue::Number(n) => f.write_str(&format_number(*n)),
            CellValue::Error(e) => write!(f, "{}", e),
        }
    }
}

// Text and numbers map to their JSON counterparts; errors serialize as their code.
impl Serialize for CellValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            CellValue::Text(s) => serializer.serialize_str(s),
            CellValue::Number(n) => serializer.serialize_f64(*n),
            CellValue::Error(e) => serializer.collect_str(e),
        }
    }
}

/// Lazily computed result of a formula.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum FormulaCache {
    #[default]
    Invalid,
    Valid(CellValue),
}

/// The content variant held by a cell.
#[derive(Debug, Default)]
pub enum CellContent {
    #[default]
    Empty,
    /// Never empty; may start with `ESCAPE_SIGN`.
    Text(String),
    Formula {
        formula: Formula,
        cache: RefCell<FormulaCache>,
    },
}

impl CellContent {
    /// Build content from user input.
    ///
    /// A lone `=` is literal text rather than an empty formula.
    pub fn from_input(input: &str) -> Result<Self, FormulaParseError> {
        if input.is_empty() {
            return Ok(CellContent::Empty);
        }

        if let Some(expression) = input.strip_prefix(FORMULA_SIGN) {
            if !expression.is_empty() {
                return Ok(CellContent::Formula {
                    formula: formula::parse(expression)?,
                    cache: RefCell::new(FormulaCache::Invalid),
                });
            }
        }

        Ok(CellContent::Text(input.to_string()))
    }

    pub fn text(&self) -> String {
        match self {
            CellContent::Empty => String::new(),
            CellContent::Text(s) => s.clone(),
            CellContent::Formula { formula, .. } => {
                format!("{}{}", FORMULA_SIGN, formula.expression())
            }
        }
    }

    /// Current value. Formulas are evaluated against `lookup` on the first read
    /// after construction or invalidation and served from the cache afterwards.
    pub fn value<L: CellLookup + ?Sized>(&self, lookup: &L) -> CellValue {
        match self {
            CellContent::Empty => CellValue::default(),
            CellContent::Text(s) => {
                debug_assert!(!s.is_empty(), "text content is never empty");
                let shown = s.strip_prefix(ESCAPE_SIGN).unwrap_or(s);
                CellValue::Text(shown.to_string())
            }
            CellContent::Formula { formula, cache } => {
                if let FormulaCache::Valid(value) = &*cache.borrow() {
                    return value.clone();
                }
                let value = CellValue::from(formula.evaluate(lookup));
                *cache.borrow_mut() = FormulaCache::Valid(value.clone());
                value
            }
        }
    }

    /// Value computed from scratch, ignoring and leaving untouched every cache.
    pub(crate) fn value_uncached<L: CellLookup + ?Sized>(&self, lookup: &L) -> CellValue {
        match self {
            CellContent::Formula { formula, .. } => CellValue::from(formula.evaluate(lookup)),
            other => other.value(lookup),
        }
    }

    pub fn referenced_cells(&self) -> &[Position] {
        match self {
            CellContent::Formula { formula, .. } => formula.referenced_cells(),
            CellContent::Empty | CellContent::Text(_) => &[],
        }
    }

    /// True if a formula result is cached.
    #[cfg(test)]
    pub(crate) fn has_valid_cache(&self) -> bool {
        match self {
            CellContent::Formula { cache, .. } => {
                matches!(*cache.borrow(), FormulaCache::Valid(_))
            }
            CellContent::Empty | CellContent::Text(_) => false,
        }
    }

    /// Drop a cached result. Returns true if there was one to drop.
    pub(crate) fn invalidate_cache(&mut self) -> bool {
        match self {
            CellContent::Formula { cache, .. } => {
                let was_valid = matches!(*cache.get_mut(), FormulaCache::Valid(_));
                *cache.get_mut() = FormulaCache::Invalid;
                was_valid
            }
            CellContent::Empty | CellContent::Text(_) => false,
        }
    }
}

/// One grid slot: content plus both directions of its dependency edges.
///
/// `outgoing` and `incoming` are kept as exact inverses across the sheet:
/// B ∈ A.outgoing ⇔ A ∈ B.incoming. Only `graph` mutates them.
#[derive(Debug, Default)]
pub struct Cell {
    content: CellContent,
    /// Cells this cell's formula reads.
    pub(crate) outgoing: FxHashSet<Position>,
    /// Cells whose formulas read this cell.
    pub(crate) incoming: FxHashSet<Position>,
}

impl Cell {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn content(&self) -> &CellContent {
        &self.content
    }

    pub(crate) fn content_mut(&mut self) -> &mut CellContent {
        &mut self.content
    }

    pub(crate) fn replace_content(&mut self, content: CellContent) {
        self.content = content;
    }

    pub fn text(&self) -> String {
        self.content.text()
    }

    pub fn value<L: CellLookup + ?Sized>(&self, lookup: &L) -> CellValue {
        self.content.value(lookup)
    }

    pub fn referenced_cells(&self) -> &[Position] {
        self.content.referenced_cells()
    }

    /// True if any formula reads this cell.
    pub fn is_referenced(&self) -> bool {
        !self.incoming.is_empty()
    }

    /// True for empty content, i.e. the rendered text is empty.
    pub fn is_empty(&self) -> bool {
        matches!(self.content, CellContent::Empty)
    }
}
