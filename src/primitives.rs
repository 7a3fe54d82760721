//! Special forms compiled within the compiler rather than called at runtime.
//!
//! The table is fixed: `begin`, `if`, `lambda`, `+` and `-`. A compound
//! form whose head names none of these compiles as a general call through
//! [crate::lambda::apply].

use crate::{
    compiler::{emit, state::State},
    core::{Error, Expr},
    immediate, lambda, rt,
    x86::{self, Reference::Ind, Register::*, ASM},
};

/// The well formed but unspecified value of an empty `begin`
const UNSPECIFIED: i32 = 31;

/// Compile a special form, if the head names one
pub fn special(s: &mut State, name: &str, args: &[Expr]) -> Option<Result<ASM, Error<'static>>> {
    match name {
        "begin" => Some(begin(s, args)),
        "if" => Some(cond(s, args)),
        "lambda" => Some(lambda::code(s, args)),
        "+" => Some(plus(s, args)),
        "-" => Some(minus(s, args)),
        _ => None,
    }
}

/// Evaluate every sub expression for effect and keep the last value
fn begin(s: &mut State, args: &[Expr]) -> Result<ASM, Error<'static>> {
    match args.split_last() {
        None => Ok(emit::push_const(UNSPECIFIED)),
        Some((last, rest)) => {
            let mut asm = ASM::default();
            for e in rest {
                asm += emit::discard(s, e)?;
            }
            Ok(asm + emit::eval(s, last)?)
        }
    }
}

/// Two way conditional. Only `#f` is false; `()`, `0` and `""` are all true.
fn cond(s: &mut State, args: &[Expr]) -> Result<ASM, Error<'static>> {
    match args {
        [pred, then, alt] => {
            let alt_label = s.gen_label();
            let exit_label = s.gen_label();

            Ok(emit::eval(s, pred)?
                + x86::cmpl(EAX.into(), immediate::FALSE.into())
                + x86::pop(EAX.into())
                + x86::je(&alt_label)
                + emit::eval(s, then)?
                + x86::jmp(&exit_label)
                + x86::label(&alt_label)
                + emit::eval(s, alt)?
                + x86::label(&exit_label))
        }
        _ => Err(Error::Compilation(format!(
            "`if` expects exactly 3 operands, got {}",
            args.len()
        ))),
    }
}

/// Evaluate both operands and type check them in place: the second ends up
/// in the top of stack register, the first beneath it, and a swap lets the
/// check routine see each in turn. Afterwards the first operand is back on
/// top with the second in a scratch register.
//
// Checking y, swapping, then checking x reads backwards and took me a few
// tries to get right. Checking each operand as it is evaluated would read
// better but costs an extra call per operand.
fn operands(s: &mut State, x: &Expr, y: &Expr) -> Result<ASM, Error<'static>> {
    Ok(emit::eval(s, x)?
        + emit::eval(s, y)?
        + rt::ensure_integer(s)
        + x86::xchg(EAX.into(), Ind(ESP))
        + rt::ensure_integer(s)
        + x86::pop(EBX.into()))
}

/// Add the raw tagged words; `01 + 01` carries into tag `10`, fixed by a
/// decrement
fn plus(s: &mut State, args: &[Expr]) -> Result<ASM, Error<'static>> {
    match args {
        [x, y] => Ok(operands(s, x, y)? + x86::add(EAX.into(), EBX.into()) + x86::dec(EAX.into())),
        _ => Err(Error::Compilation(format!(
            "`+` expects exactly 2 operands, got {}",
            args.len()
        ))),
    }
}

/// Subtract the raw tagged words; `01 - 01` cancels into tag `00`, fixed by
/// an increment
fn minus(s: &mut State, args: &[Expr]) -> Result<ASM, Error<'static>> {
    match args {
        [x, y] => Ok(operands(s, x, y)? + x86::sub(EAX.into(), EBX.into()) + x86::inc(EAX.into())),
        _ => Err(Error::Compilation(format!(
            "`-` expects exactly 2 operands, got {}",
            args.len()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse1;
    use pretty_assertions::assert_eq;

    fn compile1(src: &str) -> Result<String, Error<'static>> {
        let mut s: State = Default::default();
        emit::eval(&mut s, &parse1(src)).map(|asm| asm.to_string())
    }

    #[test]
    fn empty_begin() {
        let asm = compile1("(begin)").unwrap();
        assert_eq!(asm, "    push %eax\n    mov $31, %eax\n");
    }

    #[test]
    fn begin_discards_all_but_the_last() {
        let asm = compile1("(begin 1 2)").unwrap();
        assert_eq!(
            asm,
            "    push %eax\n    mov $5, %eax\n    pop %eax\n    push %eax\n    mov $9, %eax\n"
        );
    }

    #[test]
    fn branches() {
        let asm = compile1("(if #t 1 2)").unwrap();

        // Only #f takes the alternate branch
        assert!(asm.contains("cmpl $1034, %eax"));
        assert!(asm.contains("je k_0"));
        assert!(asm.contains("jmp k_1"));

        // The test is popped before either branch runs
        let cmp = asm.find("cmpl").unwrap();
        let pop = asm.find("pop %eax").unwrap();
        assert!(cmp < pop);
    }

    #[test]
    fn conditional_arity() {
        assert!(compile1("(if 1 2)").is_err());
        assert!(compile1("(if 1 2 3 4)").is_err());
    }

    #[test]
    fn arithmetic_fixes_tags() {
        let plus = compile1("(+ 1 2)").unwrap();
        assert!(plus.contains("add %ebx, %eax"));
        assert!(plus.contains("dec %eax"));

        let minus = compile1("(- 1 2)").unwrap();
        assert!(minus.contains("sub %ebx, %eax"));
        assert!(minus.contains("inc %eax"));
    }

    #[test]
    fn arithmetic_checks_both_operands() {
        let asm = compile1("(+ 1 2)").unwrap();
        assert_eq!(asm.matches("call ensure_integer").count(), 2);
        assert!(asm.contains("xchg %eax, (%esp)"));
    }

    #[test]
    fn arithmetic_arity() {
        assert!(compile1("(+ 1)").is_err());
        assert!(compile1("(- 1 2 3)").is_err());
    }
}
