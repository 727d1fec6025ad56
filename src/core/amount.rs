//! Arithmetic amounts such as `"1,200*3+50"` or `"(3^2)%4"`.
//!
//! Commas are thousands separators and are dropped. Operators follow the usual
//! precedence with `^` (or `**`) as right-associative exponentiation that binds
//! tighter than unary minus, `/` as true division and `%` as floored modulo.

use crate::utils::error::{NoteError, Result};
use nom::{
    branch::alt,
    bytes::complete::tag,
    character::complete::{char, digit0, digit1, one_of},
    combinator::{all_consuming, map_opt, map_res, opt, recognize},
    error::{Error, ErrorKind},
    multi::many0,
    sequence::{delimited, preceded},
    IResult, Parser,
};

const MAX_DEPTH: usize = 64;
const ALLOWED: &[u8] = b"0123456789.+-*/%()^";

pub fn eval_amount(input: &str) -> Result<f64> {
    let invalid = || NoteError::InvalidAmountError {
        input: input.to_string(),
    };

    let cleaned: String = input.trim().chars().filter(|c| *c != ',').collect();
    if cleaned.is_empty() || !cleaned.bytes().all(|b| ALLOWED.contains(&b)) {
        return Err(invalid());
    }

    let parsed = all_consuming(|i| expression(i, 0)).parse(cleaned.as_str());
    match parsed {
        Ok((_, value)) if value.is_finite() => Ok(value),
        _ => Err(invalid()),
    }
}

/// `None` for a zero divisor.
fn apply(op: char, left: f64, right: f64) -> Option<f64> {
    match op {
        '+' => Some(left + right),
        '-' => Some(left - right),
        '*' => Some(left * right),
        '/' if right != 0.0 => Some(left / right),
        '%' if right != 0.0 => Some(left - right * (left / right).floor()),
        _ => None,
    }
}

fn fold(first: f64, rest: Vec<(char, f64)>) -> Option<f64> {
    rest.into_iter()
        .try_fold(first, |acc, (op, value)| apply(op, acc, value))
}

fn expression(input: &str, depth: usize) -> IResult<&str, f64> {
    map_opt(
        (
            |i| term(i, depth),
            many0((one_of("+-"), |i| term(i, depth))),
        ),
        |(first, rest)| fold(first, rest),
    )
    .parse(input)
}

fn term(input: &str, depth: usize) -> IResult<&str, f64> {
    map_opt(
        (
            |i| unary(i, depth),
            many0((one_of("*/%"), |i| unary(i, depth))),
        ),
        |(first, rest)| fold(first, rest),
    )
    .parse(input)
}

// Unary minus binds looser than `^`, so `-2^2` is -4.
fn unary(input: &str, depth: usize) -> IResult<&str, f64> {
    if depth >= MAX_DEPTH {
        return Err(nom::Err::Failure(Error::new(input, ErrorKind::TooLarge)));
    }
    alt((
        preceded(char('-'), |i| unary(i, depth + 1)).map(|value: f64| -value),
        preceded(char('+'), |i| unary(i, depth + 1)),
        |i| power(i, depth),
    ))
    .parse(input)
}

fn power(input: &str, depth: usize) -> IResult<&str, f64> {
    map_opt(
        (
            |i| primary(i, depth),
            opt(preceded(alt((tag("^"), tag("**"))), |i| unary(i, depth + 1))),
        ),
        |(base, exponent): (f64, Option<f64>)| match exponent {
            None => Some(base),
            Some(exponent) if base == 0.0 && exponent < 0.0 => None,
            Some(exponent) => Some(base.powf(exponent)),
        },
    )
    .parse(input)
}

fn primary(input: &str, depth: usize) -> IResult<&str, f64> {
    alt((
        delimited(char('('), |i| expression(i, depth + 1), char(')')),
        number,
    ))
    .parse(input)
}

fn number(input: &str) -> IResult<&str, f64> {
    map_res(
        alt((
            recognize((digit1, opt((char('.'), digit0)))),
            recognize((char('.'), digit1)),
        )),
        |text: &str| text.parse::<f64>(),
    )
    .parse(input)
}
