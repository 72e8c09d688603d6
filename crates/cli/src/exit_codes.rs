//! CLI Exit Code Registry
//!
//! This is the single source of truth for all CLI exit codes.
//! Exit codes are part of the shell contract; scripts rely on them.
//!
//! | Code | Meaning                                        |
//! |------|------------------------------------------------|
//! | 0    | Success                                        |
//! | 2    | CLI usage error (bad args, malformed line)     |
//! | 3    | Invalid cell position                          |
//! | 4    | Circular dependency                            |
//! | 5    | Formula parse error                            |
//! | 6    | I/O error (reading the script, writing output) |

use gridcalc_engine::SheetError;

/// Success - command completed without errors.
pub const EXIT_SUCCESS: u8 = 0;

/// Usage error - bad arguments or a script line that is not `<cell> [content]`.
pub const EXIT_USAGE: u8 = 2;

/// A cell address is malformed or lies outside the grid.
pub const EXIT_INVALID_POSITION: u8 = 3;

/// A write would make a formula read itself.
pub const EXIT_CIRCULAR: u8 = 4;

/// A formula could not be parsed.
pub const EXIT_FORMULA_PARSE: u8 = 5;

/// Reading the script or writing output failed.
pub const EXIT_IO: u8 = 6;

/// Map a rejected sheet mutation to its exit code.
pub fn sheet_exit_code(err: &SheetError) -> u8 {
    match err {
        SheetError::InvalidPosition(_) => EXIT_INVALID_POSITION,
        SheetError::CircularDependency(_) => EXIT_CIRCULAR,
        SheetError::FormulaParse(_) => EXIT_FORMULA_PARSE,
    }
}
