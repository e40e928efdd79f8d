//! Parser for transfer-function expressions and literal values.
//!
//! Grammar (whitespace allowed between tokens):
//!
//! ```text
//! expr   := term (('+' | '-') term)*
//! term   := unary (('*' | '/') unary)*
//! unary  := '-' unary | '+' unary | power
//! power  := atom (('^' | '**') unary)?
//! atom   := number | '(' expr ')' | ident '(' expr ')' | ident
//! number := float [p|n|u|m|k|M|G] [j]
//! ```
//!
//! Powers are right-associative and bind tighter than unary minus, so
//! `-s^2` is `-(s^2)`. A trailing `j` makes a literal imaginary (`2j`,
//! `10e3+2j`). Engineering suffixes follow the pedal DSL convention
//! (`4.7k`, `220n`).
//!
//! # Example
//!
//! ```
//! use pzsweep::parse::parse_expr;
//!
//! let h = parse_expr("z1/(s*p1 + 1)").unwrap();
//! assert_eq!(h.free_symbols().len(), 3);
//! ```

use crate::expr::{Bindings, Expr, Func};
use nom::{
    branch::alt,
    bytes::complete::{tag, take_while, take_while1},
    character::complete::{char, digit0, digit1, multispace0, one_of},
    combinator::{map, not, opt, recognize},
    error::{Error as NomError, ErrorKind},
    multi::fold_many0,
    sequence::{delimited, pair, preceded, terminated, tuple},
    IResult,
};
use num_complex::Complex64;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    #[error("empty expression")]
    Empty,
    #[error("syntax error at offset {offset} near {near:?}")]
    Syntax { offset: usize, near: String },
    #[error("trailing input at offset {offset}: {rest:?}")]
    Trailing { offset: usize, rest: String },
    #[error("unknown function '{0}' (known: sqrt, exp, ln)")]
    UnknownFunction(String),
    #[error("'{0}' is not a constant value")]
    NotConstant(String),
    #[error("'{0}' does not evaluate to a finite number")]
    NotFinite(String),
}

// ---------------------------------------------------------------------------
// Lexical helpers
// ---------------------------------------------------------------------------

fn ws<'a, O, F>(inner: F) -> impl FnMut(&'a str) -> IResult<&'a str, O>
where
    F: FnMut(&'a str) -> IResult<&'a str, O>,
{
    delimited(multispace0, inner, multispace0)
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Identifier: starts with alpha/underscore, continues with alphanumeric/underscore.
fn identifier(input: &str) -> IResult<&str, &str> {
    recognize(pair(
        take_while1(|c: char| c.is_ascii_alphabetic() || c == '_'),
        take_while(is_ident_char),
    ))(input)
}

/// Unsigned decimal float: `12`, `1.5`, `.5`, `1e-6`, `2.2E3`.
///
/// Deliberately narrower than `nom::number::complete::double`, which would
/// also accept `inf` and `nan` as numbers.
fn unsigned_float(input: &str) -> IResult<&str, f64> {
    let (rest, text) = recognize(pair(
        alt((
            recognize(pair(digit1, opt(pair(char('.'), digit0)))),
            recognize(pair(char('.'), digit1)),
        )),
        opt(tuple((one_of("eE"), opt(one_of("+-")), digit1))),
    ))(input)?;
    let value = text
        .parse::<f64>()
        .map_err(|_| nom::Err::Error(NomError::new(input, ErrorKind::Float)))?;
    Ok((rest, value))
}

/// Engineering multiplier and imaginary marker glued to a number.
fn number_suffix(word: &str) -> Option<(f64, bool)> {
    let (body, imaginary) = match word.strip_suffix(['j', 'J']) {
        Some(body) => (body, true),
        None => (word, false),
    };
    let scale = match body {
        "" => 1.0,
        "p" => 1e-12,
        "n" => 1e-9,
        "u" => 1e-6,
        "m" => 1e-3,
        "k" => 1e3,
        "M" => 1e6,
        "G" => 1e9,
        _ => return None,
    };
    Some((scale, imaginary))
}

fn number(input: &str) -> IResult<&str, Complex64> {
    let (rest, magnitude) = unsigned_float(input)?;
    let (after, word) = take_while(is_ident_char)(rest)?;
    let (scale, imaginary) =
        number_suffix(word).ok_or(nom::Err::Error(NomError::new(rest, ErrorKind::Tag)))?;
    let v = magnitude * scale;
    let z = if imaginary {
        Complex64::new(0.0, v)
    } else {
        Complex64::new(v, 0.0)
    };
    Ok((after, z))
}

// ---------------------------------------------------------------------------
// Expression grammar
// ---------------------------------------------------------------------------

fn call_or_symbol(input: &str) -> IResult<&str, Expr> {
    let (rest, name) = identifier(input)?;
    let (after, paren) = opt(preceded(multispace0, char('(')))(rest)?;
    if paren.is_none() {
        return Ok((rest, Expr::Sym(name.to_string())));
    }
    let func =
        Func::from_name(name).ok_or(nom::Err::Failure(NomError::new(input, ErrorKind::Verify)))?;
    let (after, arg) = terminated(expr, ws(char(')')))(after)?;
    Ok((after, Expr::Call(func, Box::new(arg))))
}

fn atom(input: &str) -> IResult<&str, Expr> {
    ws(alt((
        map(number, Expr::Num),
        delimited(char('('), expr, char(')')),
        call_or_symbol,
    )))(input)
}

fn power(input: &str) -> IResult<&str, Expr> {
    let (input, base) = atom(input)?;
    let (input, exponent) = opt(preceded(ws(alt((tag("**"), tag("^")))), unary))(input)?;
    let node = match exponent {
        Some(e) => Expr::Pow(Box::new(base), Box::new(e)),
        None => base,
    };
    Ok((input, node))
}

fn unary(input: &str) -> IResult<&str, Expr> {
    alt((
        map(preceded(ws(char('-')), unary), |e| Expr::Neg(Box::new(e))),
        preceded(ws(char('+')), unary),
        power,
    ))(input)
}

fn term(input: &str) -> IResult<&str, Expr> {
    let (input, first) = unary(input)?;
    fold_many0(
        pair(
            ws(alt((terminated(char('*'), not(char('*'))), char('/')))),
            unary,
        ),
        move || first.clone(),
        |acc, (op, rhs)| match op {
            '*' => Expr::Mul(Box::new(acc), Box::new(rhs)),
            _ => Expr::Div(Box::new(acc), Box::new(rhs)),
        },
    )(input)
}

fn expr(input: &str) -> IResult<&str, Expr> {
    let (input, first) = term(input)?;
    fold_many0(
        pair(ws(one_of("+-")), term),
        move || first.clone(),
        |acc, (op, rhs)| match op {
            '+' => Expr::Add(Box::new(acc), Box::new(rhs)),
            _ => Expr::Sub(Box::new(acc), Box::new(rhs)),
        },
    )(input)
}

// ---------------------------------------------------------------------------
// Public entry points
// ---------------------------------------------------------------------------

fn snippet(rest: &str) -> String {
    rest.chars().take(40).collect()
}

/// Parse a complete expression. The whole input must be consumed.
pub fn parse_expr(src: &str) -> Result<Expr, ParseError> {
    if src.trim().is_empty() {
        return Err(ParseError::Empty);
    }
    match expr(src) {
        Ok(("", e)) => Ok(e),
        Ok((rest, _)) => Err(ParseError::Trailing {
            offset: src.len() - rest.len(),
            rest: snippet(rest),
        }),
        Err(nom::Err::Failure(e)) if e.code == ErrorKind::Verify => {
            let name = identifier(e.input).map(|(_, n)| n).unwrap_or(e.input);
            Err(ParseError::UnknownFunction(name.to_string()))
        }
        Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => Err(ParseError::Syntax {
            offset: src.len() - e.input.len(),
            near: snippet(e.input),
        }),
        Err(nom::Err::Incomplete(_)) => Err(ParseError::Syntax {
            offset: src.len(),
            near: String::new(),
        }),
    }
}

/// Parse a literal value such as `1e-6`, `4.7k`, `1/1e6` or `10e3+2j`.
///
/// Any constant expression is accepted; symbols are rejected.
pub fn parse_value(src: &str) -> Result<Complex64, ParseError> {
    let e = parse_expr(src)?;
    let z = e
        .eval(&Bindings::new())
        .map_err(|_| ParseError::NotConstant(src.trim().to_string()))?;
    if !(z.re.is_finite() && z.im.is_finite()) {
        return Err(ParseError::NotFinite(src.trim().to_string()));
    }
    Ok(z)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
