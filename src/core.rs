//! Core types shared by most of the program
use colored::Colorize;
use std::fmt;

/// A parsed top level form.
///
/// The reader produces plain s-expressions; all further shape analysis
/// (special forms, `define`, applications) happens in the compiler, which
/// dispatches on the head of a list rather than on dedicated AST variants.
#[derive(Debug, PartialEq, Clone)]
pub enum Expr {
    Literal(Literal),
    Identifier(String),
    List(Vec<Expr>),
}

/// Literal types of the source language
#[derive(Debug, PartialEq, Clone)]
pub enum Literal {
    // An empty list `()`
    Nil,
    // 30 bit signed number with a 2 bit tag
    Number(i32),
    // #t & #f
    Boolean(bool),
    // UTF-8 string
    Str(String),
}

impl Expr {
    pub fn name<S: Into<String>>(name: S) -> Self {
        Expr::Identifier(name.into())
    }

    pub fn string<S: Into<String>>(s: S) -> Self {
        Expr::Literal(Literal::Str(s.into()))
    }
}

impl From<i32> for Expr {
    fn from(i: i32) -> Self {
        Expr::Literal(Literal::Number(i))
    }
}

impl From<bool> for Expr {
    fn from(b: bool) -> Self {
        Expr::Literal(Literal::Boolean(b))
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Nil => write!(f, "()"),
            Self::Number(n) => write!(f, "{}", n),
            Self::Boolean(t) => write!(f, "{}", if *t { "#t" } else { "#f" }),
            Self::Str(s) => write!(f, "\"{}\"", s),
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Expr::Literal(l) => write!(f, "{}", l),
            Expr::Identifier(i) => write!(f, "{}", i),
            Expr::List(l) => {
                write!(f, "(")?;
                let mut l = l.iter().peekable();
                while let Some(elem) = l.next() {
                    if l.peek().is_some() {
                        write!(f, "{} ", elem)?;
                    } else {
                        write!(f, "{}", elem)?;
                    }
                }
                write!(f, ")")
            }
        }
    }
}

/// Control behavior and external interaction of the program.
pub struct Config {
    /// Program is the input source
    pub program: String,
    /// Name of the generated asm and executable; stdout when absent
    pub output: Option<String>,
}

/// Custom error type for all of wisp
#[derive(Debug)]
pub enum Error<'a> {
    // Errors returned by nom
    Parser(nom::Err<nom::error::Error<&'a str>>),
    // Internal errors are unexpected errors within the compiler
    Internal { message: String, e: Option<std::io::Error> },
    // Source program errors like an undefined global or a malformed form
    Compilation(String),
}

impl<'a> From<std::io::Error> for Error<'a> {
    fn from(error: std::io::Error) -> Self {
        Error::Internal { message: String::from(""), e: Some(error) }
    }
}

impl<'a> fmt::Display for Error<'a> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Parser(e) => {
                writeln!(f, "{}\n", "Failed to parse program".red().bold())?;
                writeln!(f, "{:?}", e)
            }
            Self::Internal { message, e } => {
                writeln!(f, "{}\n", "Something went wrong!".red().bold())?;
                writeln!(f, "{}", message)?;
                writeln!(f, "{:?}", e)
            }
            Self::Compilation(e) => {
                writeln!(f, "{}\n", "Failed to compile program".red().bold())?;
                writeln!(f, "{}", e)
            }
        }
    }
}
