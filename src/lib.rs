/*!

# wisp

A tiny single pass compiler from a parenthesized, dynamically typed,
lexically scoped functional language to 32-bit x86 assembly (GNU assembler
syntax, Linux syscall ABI).

The compiler reads a sequence of top level forms from standard input and
writes a freestanding assembly program to standard output. Assembling and
linking the output with `gcc -m32 -nostdlib` yields a standalone executable;
there is no linked-in runtime library, every helper a program needs is
emitted into its header.

## Where do I get started?

[compiler] is the heart of the crate and a good place to begin: it owns the
code generator state and the recursive expression compiler. [x86] is the
text level assembly emitter everything else builds on, [immediate] defines
the tagged word representation of runtime values, and [rt] emits the type
check, error report and I/O helpers shared by every compiled program.

Every value at runtime is a single 32-bit word. The low two bits are a tag:
`00` marks a pointer to a boxed object opening with a magic word, `01` an
immediate integer and `10` an immediate enumerated singleton (characters,
`()`, `#t`, `#f` and the EOF object). Compiled code keeps its operands on an
abstract stack whose top lives in `%eax` and whose remainder is spilled to
the machine stack; compiling any expression pushes exactly one value.

*/

pub mod cli;
pub mod compiler;
pub mod core;
pub mod immediate;
pub mod lambda;
pub mod parser;
pub mod primitives;
pub mod rt;
pub mod strings;
pub mod x86;
