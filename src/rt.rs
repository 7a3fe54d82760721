//! The runtime emitted into every program
//!
//! Nothing is linked in: the type checks, the error reporter and the
//! primitive procedures are assembly stubs registered as header thunks
//! while user code compiles, then flushed once ahead of it. Registration
//! is keyed by stub name and idempotent; each stub allocates its own
//! labels exactly once.
//!
//! Generated programs talk to the kernel through `int $0x80` with
//! `__NR_write` (4) and `__NR_exit` (1) only, fd 1 for output. A failed
//! type check or arity check prints a fixed message and exits with
//! status 1; there is no recovery.

use crate::{
    compiler::state::State,
    immediate::{FALSE, NIL, PROCEDURE_MAGIC, STRING_MAGIC, TRUE},
    lambda, strings,
    x86::{
        self,
        Reference::{Disp, Imm, Ind},
        Register::*,
        ASM, WORDSIZE,
    },
};

// Linux syscall numbers, 32-bit table
const SYS_EXIT: i32 = 1;
const SYS_WRITE: i32 = 4;
const STDOUT: i32 = 1;

/// Entry labels: `_start` strong for bare linking, `main` weak so the
/// output also links against a C runtime
pub fn entry() -> ASM {
    x86::globl("_start") + x86::weak("main") + x86::label("_start") + x86::label("main")
}

/// Terminate the program
pub fn exit(code: i32) -> ASM {
    x86::mov(EBX.into(), code.into()) + x86::mov(EAX.into(), SYS_EXIT.into()) + x86::int80()
}

/// Globals every program starts with: the primitive procedures
pub fn install(s: &mut State) {
    eq(s);
    display(s);
    newline(s);
}

/// Type check the top of stack for a procedure; returns the call site
pub fn ensure_procedure(s: &mut State) -> ASM {
    not_procedure(s);
    if s.require("ensure_procedure") {
        s.defer(|| {
            x86::label("ensure_procedure")
                + x86::test(EAX.into(), 3.into())
                + x86::jnz("not_procedure")
                + x86::cmpl(Ind(EAX), Imm(hex(PROCEDURE_MAGIC)))
                + x86::jnz("not_procedure")
                + x86::ret()
        });
    }
    x86::call("ensure_procedure").into()
}

/// Type check the top of stack for an integer (low tag bits `01`)
pub fn ensure_integer(s: &mut State) -> ASM {
    not_an_integer(s);
    if s.require("ensure_integer") {
        s.defer(|| {
            x86::label("ensure_integer")
                + x86::test(EAX.into(), 1.into())
                + x86::je("not_an_integer")
                + x86::test(EAX.into(), 2.into())
                + x86::jnz("not_an_integer")
                + x86::ret()
        });
    }
    x86::call("ensure_integer").into()
}

/// Type check the top of stack for a string
fn ensure_string(s: &mut State) -> ASM {
    notstring(s);
    if s.require("ensure_string") {
        s.defer(|| {
            x86::label("ensure_string")
                + x86::test(EAX.into(), 3.into())
                + x86::jnz("notstring")
                + x86::cmpl(Ind(EAX), Imm(hex(STRING_MAGIC)))
                + x86::jnz("notstring")
                + x86::ret()
        });
    }
    x86::call("ensure_string").into()
}

/// Print the string on top of the stack and exit with status 1
fn report_error(s: &mut State) {
    if s.require("report_error") {
        s.defer(|| x86::label("report_error") + write_string() + exit(1));
    }
}

fn not_procedure(s: &mut State) {
    handler(s, "not_procedure", "type error: not a procedure\n");
}

fn notstring(s: &mut State) {
    handler(s, "notstring", "type error: not a string\n");
}

// The integer message keeps its historical label and its missing trailing
// newline; the bytes are load bearing for output compatibility.
fn not_an_integer(s: &mut State) {
    report_error(s);
    if s.require("not_an_integer") {
        s.defer(|| stub("not_an_integer", String::from("not_int_msg"), "type error: not an integer"));
    }
}

pub fn argument_count_wrong(s: &mut State) {
    handler(s, "argument_count_wrong", "error: wrong number of arguments\n");
}

fn handler(s: &mut State, name: &'static str, message: &'static str) {
    report_error(s);
    if s.require(name) {
        let msg = s.gen_label();
        s.defer(move || stub(name, msg, message));
    }
}

/// An error handler: load its message and report
fn stub(name: &str, msg: String, message: &str) -> ASM {
    x86::label(name)
        + x86::mov(EAX.into(), Imm(msg.clone()))
        + x86::jmp("report_error")
        + strings::object(&msg, message)
}

/// Write the string object held in the top of stack register to stdout.
/// Clobbers everything; callers restore what they need.
//
// ⚠ No partial write handling: a short write to fd 1 silently drops the
// tail. Fine for a terminal, wrong for a full pipe.
fn write_string() -> ASM {
    x86::mov(EDX.into(), Disp(WORDSIZE, EAX))
        + x86::lea(ECX, Disp(2 * WORDSIZE, EAX))
        + x86::mov(EBX.into(), STDOUT.into())
        + x86::mov(EAX.into(), SYS_WRITE.into())
        + x86::int80()
}

/// Allocate the entry and object labels for a builtin and point its
/// pre-defined global cell at the object
fn builtin(s: &mut State, name: &str) -> (String, String) {
    let entry = s.gen_label();
    let object = s.gen_label();
    s.define_builtin(name, &object);
    (entry, object)
}

/// `(eq? a b)`: word identity. Immediates compare by value, boxed values
/// by address.
fn eq(s: &mut State) {
    argument_count_wrong(s);
    let (entry, object) = builtin(s, "eq?");
    let same = s.gen_label();
    let done = s.gen_label();

    s.defer(move || {
        lambda::prologue(&entry, 2)
            + x86::mov(EAX.into(), Disp(0, EBP))
            + x86::cmpl(EAX.into(), Disp(WORDSIZE, EBP))
            + x86::je(&same)
            + x86::mov(EAX.into(), FALSE.into())
            + x86::jmp(&done)
            + x86::label(&same)
            + x86::mov(EAX.into(), TRUE.into())
            + x86::label(&done)
            + lambda::epilogue()
            + lambda::object(&object, &entry)
    });
}

/// `(display s)`: write a string's bytes to stdout; evaluates to `()`
fn display(s: &mut State) {
    argument_count_wrong(s);
    let check = ensure_string(s);
    let (entry, object) = builtin(s, "display");

    s.defer(move || {
        lambda::prologue(&entry, 1)
            + x86::mov(EAX.into(), Disp(0, EBP))
            + check
            + write_string()
            + x86::mov(EAX.into(), NIL.into())
            + lambda::epilogue()
            + lambda::object(&object, &entry)
    });
}

/// `(newline)`: write the shared newline string; evaluates to `()`
fn newline(s: &mut State) {
    argument_count_wrong(s);
    if s.require("newline_string") {
        s.defer(|| strings::object("newline_string", "\n"));
    }
    let (entry, object) = builtin(s, "newline");

    s.defer(move || {
        lambda::prologue(&entry, 0)
            + x86::mov(EAX.into(), Imm(String::from("newline_string")))
            + write_string()
            + x86::mov(EAX.into(), NIL.into())
            + lambda::epilogue()
            + lambda::object(&object, &entry)
    });
}

fn hex(magic: u32) -> String {
    format!("0x{:x}", magic)
}
