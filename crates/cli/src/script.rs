//! Script line format for `gcalc`.
//!
//! ```text
//! # comment
//! A1 42
//! B1 =A1*2
//! C1 'literal text
//! A1            <- bare address clears the cell
//! ```
//!
//! The address and content are separated by the first space or tab. Content
//! is taken verbatim after that separator, so leading spaces in content are
//! kept. A trailing `\r` is dropped.

use std::fmt;

use gridcalc_engine::Position;

use crate::exit_codes::{EXIT_INVALID_POSITION, EXIT_USAGE};

/// One mutation read from a script.
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    Set(Position, String),
    Clear(Position),
}

/// A line that could not be turned into a `Step`.
#[derive(Debug, Clone, PartialEq)]
pub enum LineError {
    /// The address token is not a valid in-grid A1 reference.
    BadAddress(String),
    /// Content without an address.
    MissingAddress,
}

impl LineError {
    pub fn exit_code(&self) -> u8 {
        match self {
            LineError::BadAddress(_) => EXIT_INVALID_POSITION,
            LineError::MissingAddress => EXIT_USAGE,
        }
    }
}

impl fmt::Display for LineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LineError::BadAddress(addr) => write!(f, "invalid cell address '{}'", addr),
            LineError::MissingAddress => f.write_str("line starts with a separator, expected a cell address"),
        }
    }
}

/// Parse a single script line. Blank lines and comments yield `Ok(None)`.
pub fn parse_line(line: &str) -> Result<Option<Step>, LineError> {
    let line = line.strip_suffix('\r').unwrap_or(line);
    if line.trim().is_empty() || line.trim_start().starts_with('#') {
        return Ok(None);
    }

    let (addr, content) = match line.find([' ', '\t']) {
        Some(idx) => (&line[..idx], Some(&line[idx + 1..])),
        None => (line, None),
    };
    if addr.is_empty() {
        return Err(LineError::MissingAddress);
    }

    let pos = Position::from_a1(addr).ok_or_else(|| LineError::BadAddress(addr.to_string()))?;
    Ok(Some(match content {
        Some(text) => Step::Set(pos, text.to_string()),
        None => Step::Clear(pos),
    }))
}
