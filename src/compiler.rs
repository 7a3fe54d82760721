//! Entry point for the wisp compiler

/// State for the code generator
pub mod state {
    use crate::core::Error;
    use crate::x86::{self, ASM};
    use indexmap::IndexMap;
    use std::collections::{HashMap, HashSet};

    /// Where a lexically bound variable lives.
    ///
    /// Only frame slots exist today; the layout leaves room for captured
    /// upvalues once procedure values grow a context pointer.
    #[derive(Debug, PartialEq, Clone, Copy)]
    pub enum Binding {
        /// Slot `i` of the current frame, addressed as `4i(%ebp)`
        Arg(usize),
    }

    /// Result of resolving a name against the lexical environment
    #[derive(Debug, PartialEq, Clone, Copy)]
    pub enum Lookup {
        /// Bound in the innermost frame
        Local(Binding),
        /// Bound in an enclosing procedure's frame, which is gone at runtime
        Captured,
        /// Not lexically bound; resolves to a global cell
        Unbound,
    }

    /// One mutable machine word per global variable.
    ///
    /// `defined` is tracked separately from mere references so the driver
    /// can reject programs that use a name nobody ever defines. Cells for
    /// the builtin procedures start out pointing at their objects.
    struct Cell {
        label: String,
        defined: bool,
        init: Option<String>,
    }

    /// State for the code generator; easier to bundle it all into a struct
    /// than pass several arguments in.
    ///
    /// `li` is the label index, a counter used to generate unique labels.
    /// Globals and interned strings keep insertion order so the emitted
    /// program is byte for byte deterministic.
    ///
    /// The header is a list of deferred emitters, each registered at most
    /// once under its name and flushed ahead of user code.
    #[derive(Default)]
    pub struct State {
        li: u64,
        globals: IndexMap<String, Cell>,
        strings: IndexMap<String, String>,
        header: Vec<Box<dyn FnOnce() -> ASM>>,
        seen: HashSet<&'static str>,
        env: Env,
    }

    impl State {
        /// Generate a unique label for jump targets and data objects
        pub fn gen_label(&mut self) -> String {
            let label = format!("k_{}", self.li);
            self.li += 1;
            label
        }

        /// Label of a global's cell, allocating one on first sight
        pub fn global(&mut self, name: &str) -> String {
            if !self.globals.contains_key(name) {
                let label = self.gen_label();
                self.globals
                    .insert(name.to_string(), Cell { label, defined: false, init: None });
            }
            self.globals[name].label.clone()
        }

        /// Mark a global as defined. Defining a name twice is an error.
        pub fn define(&mut self, name: &str) -> Result<String, Error<'static>> {
            let label = self.global(name);
            let cell = &mut self.globals[name];
            if cell.defined {
                return Err(Error::Compilation(format!("global `{}` is defined twice", name)));
            }
            cell.defined = true;
            Ok(label)
        }

        /// Install a pre-defined global whose cell starts out pointing at
        /// a procedure object
        pub fn define_builtin(&mut self, name: &str, object: &str) {
            self.global(name);
            let cell = &mut self.globals[name];
            cell.defined = true;
            cell.init = Some(object.to_string());
        }

        /// Names referenced during compilation but never defined
        pub fn undefined(&self) -> Vec<&str> {
            self.globals
                .iter()
                .filter(|(_, cell)| !cell.defined)
                .map(|(name, _)| name.as_str())
                .collect()
        }

        /// Emit one mutable word per global into the data section
        pub fn inline_globals(&self) -> ASM {
            let mut asm = ASM::from(x86::data()) + x86::align(x86::WORDSIZE);
            for (_, cell) in &self.globals {
                asm += x86::label(&cell.label);
                match &cell.init {
                    Some(object) => asm += x86::word(object),
                    None => asm += x86::word(0),
                }
            }
            asm
        }

        /// Label of a string literal's object, interning it on first use
        pub fn string_label(&mut self, data: &str) -> String {
            if !self.strings.contains_key(data) {
                let label = self.gen_label();
                self.strings.insert(data.to_string(), label);
            }
            self.strings[data].clone()
        }

        /// Every interned literal with its label, in first-use order
        pub fn string_objects(&self) -> impl Iterator<Item = (&str, &str)> {
            self.strings.iter().map(|(data, label)| (data.as_str(), label.as_str()))
        }

        /// Claim a header stub name; true when the caller should go on and
        /// register its emitter. Keeps registration idempotent.
        pub fn require(&mut self, name: &'static str) -> bool {
            self.seen.insert(name)
        }

        /// Defer an emitter until the header flush
        pub fn defer(&mut self, thunk: impl FnOnce() -> ASM + 'static) {
            self.header.push(Box::new(thunk));
        }

        /// Run every deferred emitter once, in registration order
        pub fn flush_header(&mut self) -> ASM {
            let thunks = std::mem::take(&mut self.header);
            thunks.into_iter().fold(ASM::default(), |asm, thunk| asm + thunk())
        }

        /// Enter a procedure's lexical frame
        pub fn enter(&mut self, frame: HashMap<String, Binding>) {
            self.env.0.insert(0, frame);
        }

        /// Leave the innermost frame
        pub fn leave(&mut self) {
            self.env.0.remove(0);
        }

        pub fn lookup(&self, name: &str) -> Lookup {
            self.env.get(name)
        }
    }

    // Environment is an *ordered* list of frames, innermost first. A name
    // found past the innermost frame belongs to an enclosing procedure
    // whose frame pointer is no longer current, which is why such hits are
    // reported as captured rather than resolved.
    //
    // TODO: `Binding` needs an upvalue variant before `get` can resolve
    // these instead of bailing out with `Captured`.
    #[derive(Default)]
    struct Env(Vec<HashMap<String, Binding>>);

    impl Env {
        fn get(&self, name: &str) -> Lookup {
            for (depth, frame) in self.0.iter().enumerate() {
                if let Some(binding) = frame.get(name) {
                    return if depth == 0 { Lookup::Local(*binding) } else { Lookup::Captured };
                }
            }
            Lookup::Unbound
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;
        use pretty_assertions::assert_eq;

        fn frame(names: &[&str]) -> HashMap<String, Binding> {
            names
                .iter()
                .enumerate()
                .map(|(i, n)| (n.to_string(), Binding::Arg(i)))
                .collect()
        }

        #[test]
        fn labels() {
            let mut s: State = Default::default();
            assert_eq!(s.gen_label(), "k_0");
            assert_eq!(s.gen_label(), "k_1");
        }

        #[test]
        fn scopes() {
            let mut s: State = Default::default();
            assert_eq!(s.lookup("x"), Lookup::Unbound);

            s.enter(frame(&["x"]));
            assert_eq!(s.lookup("x"), Lookup::Local(Binding::Arg(0)));

            // An inner procedure sees its own formals but must not reach
            // into the enclosing frame
            s.enter(frame(&["y"]));
            assert_eq!(s.lookup("y"), Lookup::Local(Binding::Arg(0)));
            assert_eq!(s.lookup("x"), Lookup::Captured);
            assert_eq!(s.lookup("z"), Lookup::Unbound);

            s.leave();
            assert_eq!(s.lookup("x"), Lookup::Local(Binding::Arg(0)));

            s.leave();
            assert_eq!(s.lookup("x"), Lookup::Unbound);
        }

        #[test]
        fn globals() {
            let mut s: State = Default::default();

            let a = s.global("f");
            assert_eq!(a, s.global("f"));
            assert_eq!(s.undefined(), vec!["f"]);

            assert!(s.define("f").is_ok());
            assert!(s.undefined().is_empty());

            // Double definition is a compile error
            assert!(s.define("f").is_err());
        }

        #[test]
        fn header_is_idempotent() {
            let mut s: State = Default::default();
            assert!(s.require("report_error"));
            assert!(!s.require("report_error"));
        }
    }
}

/// Emit machine code for the wisp AST.
///
/// This module implements the bulk of the compiler and is a good place to
/// start reading code. Expressions compile against an abstract value stack:
/// the top lives in `%eax`, the rest is spilled to the machine stack, and
/// compiling any expression grows the abstract stack by exactly one value.
pub mod emit {
    use super::state::{Binding, Lookup, State};
    use crate::{
        core::{Error, Expr, Literal},
        immediate, lambda, primitives, rt, strings,
        x86::{
            self,
            Reference::{self, Disp, Mem},
            Register::*,
            ASM, WORDSIZE,
        },
    };

    /// Spill the current top of stack and load a constant
    pub fn push_const(c: i32) -> ASM {
        x86::push(EAX.into()) + x86::mov(EAX.into(), c.into())
    }

    /// Spill the current top of stack and load from a reference
    pub fn push_from(r: Reference) -> ASM {
        x86::push(EAX.into()) + x86::mov(EAX.into(), r)
    }

    /// Evaluate an expression, leaving its value on the abstract stack
    pub fn eval(s: &mut State, expr: &Expr) -> Result<ASM, Error<'static>> {
        match expr {
            Expr::List(forms) => match forms.split_first() {
                Some((Expr::Identifier(name), args)) => match primitives::special(s, name, args) {
                    Some(asm) => asm,
                    None => lambda::apply(s, &forms[0], args),
                },
                Some((head, args)) => lambda::apply(s, head, args),
                None => Err(Error::Compilation(String::from("cannot compile an empty application"))),
            },

            Expr::Identifier(name) => variable(s, name),

            Expr::Literal(Literal::Str(data)) => Ok(strings::eval(s, data)),

            Expr::Literal(lit) => constant(lit),
        }
    }

    /// Evaluate for effect only; the value is popped right away
    pub fn discard(s: &mut State, expr: &Expr) -> Result<ASM, Error<'static>> {
        Ok(eval(s, expr)? + x86::pop(EAX.into()))
    }

    fn constant(lit: &Literal) -> Result<ASM, Error<'static>> {
        match immediate::to(lit) {
            Some(c) => Ok(push_const(c)),
            None => match lit {
                Literal::Number(n) => Err(Error::Compilation(format!(
                    "integer literal {} is outside the representable range",
                    n
                ))),
                _ => Err(Error::Compilation(format!("cannot compile `{}` as an expression", lit))),
            },
        }
    }

    /// A variable reference: innermost frame slot, else a global cell
    fn variable(s: &mut State, name: &str) -> Result<ASM, Error<'static>> {
        match s.lookup(name) {
            Lookup::Local(Binding::Arg(slot)) => {
                Ok(push_from(Disp(WORDSIZE * slot as i32, EBP)))
            }
            Lookup::Captured => Err(Error::Compilation(format!(
                "cannot capture local variable `{}` in a nested lambda",
                name
            ))),
            Lookup::Unbound => {
                let label = s.global(name);
                Ok(push_from(Mem(label)))
            }
        }
    }

    /// Compile one top level form: `define` updates a global cell, any
    /// other expression runs in discarding mode
    fn top(s: &mut State, form: &Expr) -> Result<ASM, Error<'static>> {
        if let Expr::List(forms) = form {
            if let Some((Expr::Identifier(head), rest)) = forms.split_first() {
                if head == "define" {
                    return define(s, rest, form);
                }
            }
        }
        discard(s, form)
    }

    /// `(define name expression)` at top level.
    ///
    /// The name is marked defined before the value compiles so a procedure
    /// may refer to itself.
    fn define(s: &mut State, rest: &[Expr], form: &Expr) -> Result<ASM, Error<'static>> {
        match rest {
            [Expr::Identifier(name), value] => {
                let label = s.define(name)?;
                Ok(eval(s, value)? + x86::mov(Mem(label), EAX.into()) + x86::pop(EAX.into()))
            }
            _ => Err(Error::Compilation(format!("malformed define: `{}`", form))),
        }
    }

    /// Top level interface to the emit module
    pub fn program(prog: &[Expr]) -> Result<String, Error<'static>> {
        let mut s: State = Default::default();
        rt::install(&mut s);

        let mut body = rt::entry();

        // Every program opens by aliasing `=` to the builtin `eq?`
        let alias = Expr::List(vec![Expr::name("define"), Expr::name("="), Expr::name("eq?")]);
        body += top(&mut s, &alias)?;

        for form in prog {
            body += top(&mut s, form)?;
        }

        body += rt::exit(0);

        // The header must reach the assembler ahead of the code that calls
        // into it; the body was buffered, so flushing here still puts the
        // stubs first.
        let header = s.flush_header();
        let data = strings::inline(&s) + s.inline_globals();

        let undefined = s.undefined();
        if !undefined.is_empty() {
            return Err(Error::Compilation(format!(
                "undefined global variable(s): {}",
                undefined.join(", ")
            )));
        }

        Ok((ASM::from(x86::text()) + header + body + data).to_string())
    }

}
