//! Procedures and the calling convention
//!
//! A procedure value is a pointer to a boxed `{magic, code entry}` pair in
//! the read only data section. The caller evaluates arguments in source
//! order (each lands on the machine stack as the next one is compiled),
//! evaluates the procedure expression, type checks it, loads the argument
//! count into `%edx` and calls through the entry word.
//!
//! The callee checks `%edx` against its arity, computes the stack pointer
//! it must restore on return (past the return address and every argument),
//! saves the caller's frame pointer and aims `%ebp` at its argument area.
//! On return it unwinds the whole frame from the stack, so the caller sees
//! only the result: the arguments are consumed and the value sits in the
//! top of stack register.
//!
//! Slot 0 of the frame is the *last* argument pushed; formals are bound
//! back to front so that parameter order matches source order.
//!
//! ⚠ Procedure objects carry no context pointer yet, so closing over an
//! enclosing procedure's locals is rejected at compile time rather than
//! miscompiled. Growing the object a third word and threading it through
//! the environment is the obvious fix, but it touches every call site and
//! I haven't needed it badly enough.

use crate::{
    compiler::{
        emit,
        state::{Binding, State},
    },
    core::{Error, Expr, Literal},
    immediate, rt,
    x86::{
        self,
        Reference::{Disp, Imm, Scaled},
        Register::*,
        ASM, WORDSIZE,
    },
};
use std::collections::HashMap;

/// Compile `(lambda (params...) body)` into a procedure value.
///
/// The body is emitted inline behind a jump; what the expression leaves on
/// the abstract stack is the address of the procedure object.
pub fn code(s: &mut State, args: &[Expr]) -> Result<ASM, Error<'static>> {
    match args {
        [params, body] => {
            let formals = formals(params)?;
            let arity = formals.len();

            let entry = s.gen_label();
            let object_label = s.gen_label();
            let skip = s.gen_label();

            let mut frame = HashMap::new();
            for (i, name) in formals.iter().enumerate() {
                frame.insert(name.clone(), Binding::Arg(arity - 1 - i));
            }

            s.enter(frame);
            let body = emit::eval(s, body);
            s.leave();
            let body = body?;

            rt::argument_count_wrong(s);

            Ok(x86::jmp(&skip)
                + prologue(&entry, arity)
                + body
                // The body spilled one word beneath its result; drop it so
                // the epilogue finds the saved frame on top. Forgetting
                // this pop cost me an afternoon in gdb.
                + x86::pop(EBX.into())
                + epilogue()
                + object(&object_label, &entry)
                + x86::label(&skip)
                + emit::push_from(Imm(object_label)))
        }
        _ => Err(Error::Compilation(format!(
            "`lambda` expects a parameter list and one body expression, got {} operands",
            args.len()
        ))),
    }
}

/// A flat list of identifiers; `()` reads as nil and means no parameters
fn formals(params: &Expr) -> Result<Vec<String>, Error<'static>> {
    match params {
        Expr::Literal(Literal::Nil) => Ok(vec![]),
        Expr::List(l) => l
            .iter()
            .map(|p| match p {
                Expr::Identifier(name) => Ok(name.clone()),
                _ => Err(Error::Compilation(format!(
                    "lambda parameter `{}` is not an identifier",
                    p
                ))),
            })
            .collect(),
        _ => Err(Error::Compilation(format!("malformed lambda parameter list: `{}`", params))),
    }
}

/// Entry sequence shared by every emitted procedure.
///
/// After it runs, `%ebp` addresses the argument area: slot `i` is
/// `4i(%ebp)`, slot 0 holding the last argument pushed.
pub fn prologue(entry: &str, arity: usize) -> ASM {
    x86::label(entry)
        + x86::cmpl(EDX.into(), (arity as i32).into())
        + x86::jnz("argument_count_wrong")
        + x86::lea(EBX, Scaled(WORDSIZE, ESP, EDX, WORDSIZE))
        + x86::push(EBX.into())
        + x86::push(EBP.into())
        + x86::lea(EBP, Disp(3 * WORDSIZE, ESP))
}

/// Exit sequence shared by every emitted procedure: restore the caller's
/// frame pointer, recover the saved stack pointer and return address, and
/// jump back with the argument area unwound. The result stays in the top
/// of stack register.
pub fn epilogue() -> ASM {
    x86::pop(EBP.into())
        + x86::pop(EBX.into())
        + x86::pop(ECX.into())
        + x86::mov(ESP.into(), EBX.into())
        + x86::jmp_star(ECX)
}

/// A procedure object in the read only data section; re-asserts `.text`
/// so the caller can keep emitting code
pub fn object(label: &str, entry: &str) -> ASM {
    x86::section(".rodata")
        + x86::align(WORDSIZE)
        + x86::label(label)
        + x86::word(format!("0x{:x}", immediate::PROCEDURE_MAGIC))
        + x86::word(entry)
        + x86::text()
}

/// Compile an application: arguments in source order, then the procedure
/// expression, the dynamic type check and the indirect call. The callee
/// unwinds its own argument area, so there is nothing to clean up here.
pub fn apply(s: &mut State, proc: &Expr, args: &[Expr]) -> Result<ASM, Error<'static>> {
    let mut asm = ASM::default();

    for arg in args {
        asm += emit::eval(s, arg)?;
    }

    asm += emit::eval(s, proc)?;
    asm += rt::ensure_procedure(s);
    asm += x86::mov(EBX.into(), Disp(WORDSIZE, EAX));
    asm += x86::mov(EDX.into(), (args.len() as i32).into());
    asm += x86::call_star(EBX);

    Ok(asm)
}
