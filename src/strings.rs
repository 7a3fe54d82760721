//! Boxed strings
//!
//! A string is `{magic, length, raw bytes}` in the read only data section.
//! Objects are word aligned, so the object address doubles as the tagged
//! value (the low pointer tag bits are already clear). Source literals are
//! interned per program and materialize as a single immediate load; there
//! is no runtime string allocation.
//!
//! Example memory layout for `"hi\n"`:
//!
//! ```txt
//!  --------------------
//! | Offset | Value     |
//!  --------------------
//! | 0      | 0xbabb1e  |
//! | 4      | 3         |
//! | 8      | h i \n    |
//!  --------------------
//! ```

use crate::{
    compiler::{emit, state::State},
    immediate,
    x86::{self, Reference::Imm, ASM, WORDSIZE},
};

/// Push a string literal's object address
pub fn eval(s: &mut State, data: &str) -> ASM {
    let label = s.string_label(data);
    emit::push_from(Imm(label))
}

/// A boxed string object under `label`; re-asserts `.text` so the caller
/// can keep emitting code
pub fn object(label: &str, data: &str) -> ASM {
    x86::section(".rodata")
        + x86::align(WORDSIZE)
        + x86::label(label)
        + x86::word(format!("0x{:x}", immediate::STRING_MAGIC))
        + x86::word(data.len())
        + x86::ascii(data)
        + x86::text()
}

/// Flush every interned literal, in first-use order
pub fn inline(s: &State) -> ASM {
    let mut asm = ASM::default();
    for (data, label) in s.string_objects() {
        asm += object(label, data);
    }
    asm
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn interning() {
        let mut s: State = Default::default();

        let a = eval(&mut s, "hello").to_string();
        let b = eval(&mut s, "hello").to_string();
        assert_eq!(a, b);
        assert_eq!(s.string_objects().count(), 1);
    }

    #[test]
    fn objects() {
        let asm = object("k_3", "hi\n").to_string();

        assert!(asm.contains(".section .rodata"));
        assert!(asm.contains("k_3:"));
        assert!(asm.contains(".int 0xbabb1e"));
        assert!(asm.contains(".int 3"));
        assert!(asm.contains(".ascii \"hi\\n\""));
        // Code generation resumes in the text section
        assert!(asm.ends_with(".text\n"));
    }

    #[test]
    fn length_counts_bytes_not_escapes() {
        let asm = object("k_0", "a\\b\n").to_string();
        assert!(asm.contains(".int 4"));
        assert!(asm.contains(r#".ascii "a\\b\n""#));
    }
}
