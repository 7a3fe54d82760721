//! The reader: source text to s-expressions, in nom.
//!
//! The grammar is the small datum subset the compiler accepts: proper
//! lists, identifiers, strings, decimal integers, the booleans and quote
//! abbreviation. Each parser function mirrors one production, so the
//! module reads best sequentially in declaration order.
//!
//! ```BNF
//! <program> → <datum>*
//! <datum>   → () | <boolean> | <number> | <string> | '<datum>
//!           | <identifier> | (<datum>+)
//! ```

use crate::core::{Error, Expr, Literal::Nil};
use nom::{
    branch::alt,
    bytes::complete::tag,
    character::complete::{char, digit1, multispace0 as space0, none_of, one_of},
    combinator::{all_consuming, map, map_res, opt, recognize, value},
    multi::{many0, many1},
    sequence::{delimited, pair, preceded, terminated},
    IResult,
};

/// `<program> → <datum>*`
fn program(i: &str) -> IResult<&str, Vec<Expr>> {
    terminated(many0(preceded(space0, datum)), space0)(i)
}

/// Any single form
fn datum(i: &str) -> IResult<&str, Expr> {
    alt((
        map(nil, |_| Expr::Literal(Nil)),
        map(boolean, Expr::from),
        map(number, Expr::from),
        map(string, Expr::string),
        quoted,
        map(identifier, Expr::Identifier),
        list,
    ))(i)
}

/// `()`, the empty list
fn nil(i: &str) -> IResult<&str, ()> {
    value((), pair(char('('), preceded(space0, char(')'))))(i)
}

/// `#t | #f`
fn boolean(i: &str) -> IResult<&str, bool> {
    alt((value(true, tag("#t")), value(false, tag("#f"))))(i)
}

/// Decimal integers with an optional sign
fn number(i: &str) -> IResult<&str, i32> {
    map_res(recognize(pair(opt(one_of("+-")), digit1)), |s: &str| s.parse::<i32>())(i)
}

/// `"..."` with the `\n`, `\\` and `\"` escapes, the same three the
/// assembly emitter knows how to write back out
fn string(i: &str) -> IResult<&str, String> {
    delimited(char('"'), map(many0(fragment), |v| v.into_iter().collect()), char('"'))(i)
}

fn fragment(i: &str) -> IResult<&str, char> {
    alt((
        value('\n', tag("\\n")),
        value('\\', tag("\\\\")),
        value('"', tag("\\\"")),
        none_of("\"\\"),
    ))(i)
}

/// `'<datum>` reads as `(quote <datum>)`
fn quoted(i: &str) -> IResult<&str, Expr> {
    map(preceded(char('\''), datum), |d| Expr::List(vec![Expr::name("quote"), d]))(i)
}

/// Identifiers are formed from letters, digits and the extended
/// characters. They cannot begin with a character that can also begin a
/// number, with `+` and `-` themselves as the exceptions.
///
/// ```BNF
/// <identifier> → <initial> <subsequent>* | + | -
/// <initial>    → <letter> | ! | $ | % | & | * | / | : | < | = | > | ? | ~ | _ | ^
/// <subsequent> → <initial> | <digit> | . | + | -
/// ```
fn identifier(i: &str) -> IResult<&str, String> {
    alt((
        value(String::from("+"), tag("+")),
        value(String::from("-"), tag("-")),
        map(pair(initial, many0(subsequent)), |(first, rest)| {
            let mut id = String::new();
            id.push(first);
            id.extend(rest);
            id
        }),
    ))(i)
}

fn initial(i: &str) -> IResult<&str, char> {
    alt((letter, symbolic))(i)
}

fn subsequent(i: &str) -> IResult<&str, char> {
    alt((initial, digit, one_of(".+-")))(i)
}

fn symbolic(i: &str) -> IResult<&str, char> {
    one_of("!$%&*/:<=>?~_^")(i)
}

fn letter(i: &str) -> IResult<&str, char> {
    one_of("abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ")(i)
}

fn digit(i: &str) -> IResult<&str, char> {
    one_of("0123456789")(i)
}

/// `(<datum>+)`; the empty list reads as nil
fn list(i: &str) -> IResult<&str, Expr> {
    map(delimited(open, many1(terminated(datum, space0)), close), Expr::List)(i)
}

fn open(i: &str) -> IResult<&str, ()> {
    value((), pair(char('('), space0))(i)
}

fn close(i: &str) -> IResult<&str, ()> {
    value((), pair(space0, char(')')))(i)
}

/// Parse a whole program; trailing garbage is a parse error
pub fn parse(i: &str) -> Result<Vec<Expr>, Error> {
    match all_consuming(program)(i) {
        Ok((_rest, forms)) => Ok(forms),
        Err(e) => Err(Error::Parser(e)),
    }
}

/// Parse a single form for testing, return or panic
#[cfg(test)]
pub fn parse1(i: &str) -> Expr {
    match preceded(space0, datum)(i) {
        Ok((_rest, e)) => e,
        Err(e) => panic!("Failed to parse `{}`: {:?}", i, e),
    }
}
