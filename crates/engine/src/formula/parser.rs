// Formula parser - converts formula strings into AST
// Supports: numbers, cell refs (A1), parentheses, unary +/-, basic math (+, -, *, /)

use thiserror::Error;

use crate::position::{col_to_letters, Position};

/// Longest column/row spelling accepted inside a formula. References beyond the
/// grid still parse (they evaluate to #REF!), but absurd lengths are rejected.
const MAX_REF_LETTERS: usize = 8;
const MAX_REF_DIGITS: usize = 9;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum FormulaParseError {
    #[error("empty formula")]
    Empty,
    #[error("unexpected character '{0}'")]
    UnexpectedChar(char),
    #[error("invalid number: {0}")]
    InvalidNumber(String),
    #[error("invalid cell reference: {0}")]
    InvalidCellRef(String),
    #[error("unexpected end of expression")]
    UnexpectedEnd,
    #[error("unexpected token at position {0}")]
    UnexpectedToken(usize),
    #[error("missing closing parenthesis")]
    MissingParen,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number(f64),
    /// May lie outside the grid; evaluation reports #REF! for those.
    CellRef(Position),
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    BinaryOp {
        op: Op,
        left: Box<Expr>,
        right: Box<Expr>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Op {
    Add,
    Sub,
    Mul,
    Div,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UnaryOp {
    Plus,
    Minus,
}

impl Op {
    fn precedence(self) -> u8 {
        match self {
            Op::Add | Op::Sub => 1,
            Op::Mul | Op::Div => 2,
        }
    }

    fn symbol(self) -> char {
        match self {
            Op::Add => '+',
            Op::Sub => '-',
            Op::Mul => '*',
            Op::Div => '/',
        }
    }
}

const UNARY_PRECEDENCE: u8 = 3;
const ATOM_PRECEDENCE: u8 = 4;

impl Expr {
    fn precedence(&self) -> u8 {
        match self {
            Expr::Number(_) | Expr::CellRef(_) => ATOM_PRECEDENCE,
            Expr::Unary { .. } => UNARY_PRECEDENCE,
            Expr::BinaryOp { op, .. } => op.precedence(),
        }
    }
}

/// Parse an expression (the text after the leading `=`).
pub fn parse_expression(input: &str) -> Result<Expr, FormulaParseError> {
    let tokens = tokenize(input)?;
    if tokens.is_empty() {
        return Err(FormulaParseError::Empty);
    }
    let (expr, pos) = parse_add_sub(&tokens, 0)?;
    if pos < tokens.len() {
        return Err(FormulaParseError::UnexpectedToken(pos));
    }
    Ok(expr)
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    CellRef(Position),
    Plus,
    Minus,
    Star,
    Slash,
    LParen,
    RParen,
}

fn tokenize(input: &str) -> Result<Vec<Token>, FormulaParseError> {
    let mut tokens = Vec::new();
    let mut chars = input.chars().peekable();

    while let Some(&c) = chars.peek() {
        match c {
            ' ' | '\t' => { chars.next(); }
            '+' => { tokens.push(Token::Plus); chars.next(); }
            '-' => { tokens.push(Token::Minus); chars.next(); }
            '*' => { tokens.push(Token::Star); chars.next(); }
            '/' => { tokens.push(Token::Slash); chars.next(); }
            '(' => { tokens.push(Token::LParen); chars.next(); }
            ')' => { tokens.push(Token::RParen); chars.next(); }
            'A'..='Z' => {
                let mut ident = String::new();
                while let Some(&ch) = chars.peek() {
                    if ch.is_ascii_alphanumeric() {
                        ident.push(ch);
                        chars.next();
                    } else {
                        break;
                    }
                }
                let pos = try_parse_cell_ref(&ident)
                    .ok_or(FormulaParseError::InvalidCellRef(ident))?;
                tokens.push(Token::CellRef(pos));
            }
            '0'..='9' | '.' => {
                let mut num_str = String::new();
                while let Some(&d) = chars.peek() {
                    if d.is_ascii_digit() || d == '.' {
                        num_str.push(d);
                        chars.next();
                    } else {
                        break;
                    }
                }
                // Optional exponent: 1e5, 2.5E-3
                if let Some(&e) = chars.peek() {
                    if e == 'e' || e == 'E' {
                        num_str.push(e);
                        chars.next();
                        if let Some(&sign) = chars.peek() {
                            if sign == '+' || sign == '-' {
                                num_str.push(sign);
                                chars.next();
                            }
                        }
                        while let Some(&d) = chars.peek() {
                            if d.is_ascii_digit() {
                                num_str.push(d);
                                chars.next();
                            } else {
                                break;
                            }
                        }
                    }
                }
                let num: f64 = num_str
                    .parse()
                    .map_err(|_| FormulaParseError::InvalidNumber(num_str.clone()))?;
                if !num.is_finite() {
                    return Err(FormulaParseError::InvalidNumber(num_str));
                }
                tokens.push(Token::Number(num));
            }
            _ => return Err(FormulaParseError::UnexpectedChar(c)),
        }
    }

    Ok(tokens)
}

/// Uppercase letters followed by a 1-based row number. The resulting position
/// is not bounds-checked.
fn try_parse_cell_ref(s: &str) -> Option<Position> {
    let letters = s.bytes().take_while(|b| b.is_ascii_uppercase()).count();
    if letters == 0 || letters > MAX_REF_LETTERS {
        return None;
    }
    let (col_str, row_str) = s.split_at(letters);
    if row_str.is_empty()
        || row_str.len() > MAX_REF_DIGITS
        || !row_str.bytes().all(|b| b.is_ascii_digit())
    {
        return None;
    }

    let row: usize = row_str.parse().ok()?;
    if row == 0 {
        return None;
    }

    let col = col_str
        .bytes()
        .fold(0usize, |acc, b| acc * 26 + (b - b'A' + 1) as usize)
        - 1;

    Some(Position::new(row - 1, col))
}

fn parse_add_sub(tokens: &[Token], pos: usize) -> Result<(Expr, usize), FormulaParseError> {
    let (mut left, mut pos) = parse_mul_div(tokens, pos)?;

    while pos < tokens.len() {
        let op = match &tokens[pos] {
            Token::Plus => Op::Add,
            Token::Minus => Op::Sub,
            _ => break,
        };
        let (right, new_pos) = parse_mul_div(tokens, pos + 1)?;
        left = Expr::BinaryOp {
            op,
            left: Box::new(left),
            right: Box::new(right),
        };
        pos = new_pos;
    }

    Ok((left, pos))
}

fn parse_mul_div(tokens: &[Token], pos: usize) -> Result<(Expr, usize), FormulaParseError> {
    let (mut left, mut pos) = parse_unary(tokens, pos)?;

    while pos < tokens.len() {
        let op = match &tokens[pos] {
            Token::Star => Op::Mul,
            Token::Slash => Op::Div,
            _ => break,
        };
        let (right, new_pos) = parse_unary(tokens, pos + 1)?;
        left = Expr::BinaryOp {
            op,
            left: Box::new(left),
            right: Box::new(right),
        };
        pos = new_pos;
    }

    Ok((left, pos))
}

fn parse_unary(tokens: &[Token], pos: usize) -> Result<(Expr, usize), FormulaParseError> {
    let op = match tokens.get(pos) {
        Some(Token::Plus) => UnaryOp::Plus,
        Some(Token::Minus) => UnaryOp::Minus,
        _ => return parse_primary(tokens, pos),
    };
    let (operand, pos) = parse_unary(tokens, pos + 1)?;
    Ok((
        Expr::Unary {
            op,
            operand: Box::new(operand),
        },
        pos,
    ))
}

fn parse_primary(tokens: &[Token], pos: usize) -> Result<(Expr, usize), FormulaParseError> {
    let Some(token) = tokens.get(pos) else {
        return Err(FormulaParseError::UnexpectedEnd);
    };

    match token {
        Token::Number(n) => Ok((Expr::Number(*n), pos + 1)),
        Token::CellRef(cell) => Ok((Expr::CellRef(*cell), pos + 1)),
        Token::LParen => {
            let (expr, pos) = parse_add_sub(tokens, pos + 1)?;
            match tokens.get(pos) {
                Some(Token::RParen) => Ok((expr, pos + 1)),
                Some(_) => Err(FormulaParseError::UnexpectedToken(pos)),
                None => Err(FormulaParseError::MissingParen),
            }
        }
        _ => Err(FormulaParseError::UnexpectedToken(pos)),
    }
}

// =============================================================================
// Formula Printing - Convert Expr back to its canonical string
// =============================================================================

/// Canonical text of an expression, without the leading '='.
///
/// Parentheses are emitted only where precedence or associativity requires them.
pub fn format_expr(expr: &Expr) -> String {
    let mut out = String::new();
    write_expr(expr, &mut out);
    out
}

fn write_expr(expr: &Expr, out: &mut String) {
    match expr {
        Expr::Number(n) => out.push_str(&format_number(*n)),
        Expr::CellRef(pos) => {
            out.push_str(&col_to_letters(pos.col));
            out.push_str(&(pos.row + 1).to_string());
        }
        Expr::Unary { op, operand } => {
            out.push(match op {
                UnaryOp::Plus => '+',
                UnaryOp::Minus => '-',
            });
            write_operand(operand, operand.precedence() < UNARY_PRECEDENCE, out);
        }
        Expr::BinaryOp { op, left, right } => {
            let prec = op.precedence();
            write_operand(left, left.precedence() < prec, out);
            out.push(op.symbol());
            // Floating-point + and * are not associative: any right operand at
            // the same level keeps its grouping so the text reparses to the same tree.
            write_operand(right, right.precedence() <= prec, out);
        }
    }
}

fn write_operand(expr: &Expr, parens: bool, out: &mut String) {
    if parens {
        out.push('(');
        write_expr(expr, out);
        out.push(')');
    } else {
        write_expr(expr, out);
    }
}

/// Integral values print without a fractional part; others use the shortest
/// representation that parses back to the same f64. Very large and very small
/// magnitudes switch to exponent notation.
pub fn format_number(n: f64) -> String {
    let magnitude = n.abs();
    if n.fract() == 0.0 && magnitude < 1e15 {
        format!("{}", n as i64)
    } else if magnitude >= 1e21 || (magnitude != 0.0 && magnitude < 1e-7) {
        format!("{:e}", n)
    } else {
        format!("{}", n)
    }
}

// =============================================================================
// Cell Reference Extraction
// =============================================================================

/// In-grid positions referenced by the expression, sorted and deduplicated.
pub fn extract_cell_refs(expr: &Expr) -> Vec<Position> {
    let mut refs = Vec::new();
    collect_cell_refs(expr, &mut refs);
    refs.sort_unstable();
    refs.dedup();
    refs
}

fn collect_cell_refs(expr: &Expr, refs: &mut Vec<Position>) {
    match expr {
        Expr::Number(_) => {}
        Expr::CellRef(pos) => {
            if pos.is_valid() {
                refs.push(*pos);
            }
        }
        Expr::Unary { operand, .. } => collect_cell_refs(operand, refs),
        Expr::BinaryOp { left, right, .. } => {
            collect_cell_refs(left, refs);
            collect_cell_refs(right, refs);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(input: &str) -> String {
        format_expr(&parse_expression(input).unwrap())
    }

    #[test]
    fn test_parse_number() {
        assert_eq!(parse_expression("42").unwrap(), Expr::Number(42.0));
        assert_eq!(parse_expression("2.5e3").unwrap(), Expr::Number(2500.0));
        assert_eq!(parse_expression(".5").unwrap(), Expr::Number(0.5));
    }

    #[test]
    fn test_parse_cell_ref() {
        assert_eq!(parse_expression("B3").unwrap(), Expr::CellRef(Position::new(2, 1)));
        assert_eq!(parse_expression("AA10").unwrap(), Expr::CellRef(Position::new(9, 26)));
    }

    #[test]
    fn test_out_of_grid_ref_parses() {
        match parse_expression("ZZZZ1").unwrap() {
            Expr::CellRef(pos) => assert!(!pos.is_valid()),
            other => panic!("Expected CellRef, got {:?}", other),
        }
    }

    #[test]
    fn test_precedence() {
        // 1+2*3 -> Add(1, Mul(2, 3))
        match parse_expression("1+2*3").unwrap() {
            Expr::BinaryOp { op: Op::Add, right, .. } => {
                assert!(matches!(*right, Expr::BinaryOp { op: Op::Mul, .. }));
            }
            other => panic!("Expected Add, got {:?}", other),
        }
    }

    #[test]
    fn test_left_associative() {
        // 8-4-2 -> Sub(Sub(8, 4), 2)
        match parse_expression("8-4-2").unwrap() {
            Expr::BinaryOp { op: Op::Sub, left, right } => {
                assert!(matches!(*left, Expr::BinaryOp { op: Op::Sub, .. }));
                assert_eq!(*right, Expr::Number(2.0));
            }
            other => panic!("Expected Sub, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(parse_expression(""), Err(FormulaParseError::Empty));
        assert_eq!(parse_expression("   "), Err(FormulaParseError::Empty));
        assert_eq!(parse_expression("1+"), Err(FormulaParseError::UnexpectedEnd));
        assert_eq!(parse_expression("(1+2"), Err(FormulaParseError::MissingParen));
        assert_eq!(parse_expression("1 2"), Err(FormulaParseError::UnexpectedToken(1)));
        assert_eq!(parse_expression("1)"), Err(FormulaParseError::UnexpectedToken(1)));
        assert_eq!(parse_expression("a1"), Err(FormulaParseError::UnexpectedChar('a')));
        assert_eq!(parse_expression("A0"), Err(FormulaParseError::InvalidCellRef("A0".into())));
        assert_eq!(parse_expression("SUM"), Err(FormulaParseError::InvalidCellRef("SUM".into())));
        assert_eq!(parse_expression("1..2"), Err(FormulaParseError::InvalidNumber("1..2".into())));
        assert_eq!(parse_expression("1%"), Err(FormulaParseError::UnexpectedChar('%')));
    }

    #[test]
    fn test_format_minimal_parens() {
        assert_eq!(roundtrip("(1+2)*3"), "(1+2)*3");
        assert_eq!(roundtrip("1+(2*3)"), "1+2*3");
        assert_eq!(roundtrip("((A1))"), "A1");
        assert_eq!(roundtrip("1-(2-3)"), "1-(2-3)");
        assert_eq!(roundtrip("(1-2)-3"), "1-2-3");
        assert_eq!(roundtrip("(1+2)+3"), "1+2+3");
        assert_eq!(roundtrip("1*2/3"), "1*2/3");
        assert_eq!(roundtrip("8/(4/2)"), "8/(4/2)");
        assert_eq!(roundtrip("8/(4*2)"), "8/(4*2)");
        assert_eq!(roundtrip("-(1+2)"), "-(1+2)");
        assert_eq!(roundtrip("- - 3"), "--3");
        assert_eq!(roundtrip(" 1 + A1 * 2.5 "), "1+A1*2.5");
    }

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(7.0), "7");
        assert_eq!(format_number(-3.0), "-3");
        assert_eq!(format_number(0.25), "0.25");
        assert_eq!(format_number(1e20), "100000000000000000000");
        assert_eq!(format_number(1e200), "1e200");
        assert_eq!(format_number(-2.5e21), "-2.5e21");
        assert_eq!(format_number(1.5e-9), "1.5e-9");
        assert_eq!(format_number(0.0), "0");
    }

    #[test]
    fn test_format_keeps_same_level_right_grouping() {
        // Regrouping would change the f64 result
        assert_eq!(roundtrip("1+(2-3)"), "1+(2-3)");
        assert_eq!(roundtrip("1+(2+3)"), "1+(2+3)");
        assert_eq!(roundtrip("2*(3/4)"), "2*(3/4)");
        assert_eq!(roundtrip("2*(3*4)"), "2*(3*4)");
        assert_eq!(roundtrip("1e200*(1e200/1e200)"), "1e200*(1e200/1e200)");
    }

    #[test]
    fn test_exponent_text_reparses() {
        for n in [1e200, 1.5e-9, 6.02e23, 0.1, 1e15 + 0.5] {
            let text = format_number(n);
            assert_eq!(parse_expression(&text), Ok(Expr::Number(n)), "text {}", text);
        }
    }

    #[test]
    fn test_extract_refs_sorted_and_deduplicated() {
        let expr = parse_expression("B2+A1*B2+ZZZZ1+A1").unwrap();
        assert_eq!(
            extract_cell_refs(&expr),
            vec![Position::new(0, 0), Position::new(1, 1)]
        );
    }
}
