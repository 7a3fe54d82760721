// Integration tests
//
// These drive the whole pipeline, source text to generated assembly, and
// assert on the emitted program text and on the compile time diagnostics.

use quickcheck_macros::quickcheck;
use wisp::{compiler::emit, immediate, parser};

fn compile(program: &str) -> Result<String, String> {
    let prog = parser::parse(program).map_err(|e| format!("{:?}", e))?;
    emit::program(&prog).map_err(|e| e.to_string())
}

fn ok(program: &str) -> String {
    match compile(program) {
        Ok(asm) => asm,
        Err(e) => panic!("Failed to compile `{}`: {}", program, e),
    }
}

fn fails(program: &str, diagnostic: &str) {
    match compile(program) {
        Ok(_) => panic!("`{}` compiled but should not have", program),
        Err(e) => assert!(
            e.contains(diagnostic),
            "diagnostic for `{}` should mention `{}`, got: {}",
            program,
            diagnostic,
            e
        ),
    }
}

mod programs {
    use super::*;

    #[test]
    fn hello_world() {
        let asm = ok(r#"(display "hello, world\n")"#);

        // The literal lands in rodata with its raw byte length
        assert!(asm.contains(r#".ascii "hello, world\n""#));
        assert!(asm.contains(".int 13"));

        // display is a real procedure call
        assert!(asm.contains("call ensure_procedure"));
        assert!(asm.contains("call *%ebx"));
    }

    #[test]
    fn conditional() {
        let asm = ok(r#"(display (if (= 2 (+ 1 1)) "yes" "no")) (newline)"#);

        assert!(asm.contains(r#".ascii "yes""#));
        assert!(asm.contains(r#".ascii "no""#));
        assert!(asm.contains("call ensure_integer"));
        // Only #f takes the alternate branch
        assert!(asm.contains(&format!("cmpl ${}, %eax", immediate::FALSE)));
    }

    #[test]
    fn user_procedures() {
        let asm = ok(r#"
            (define f (lambda (x) (+ x x)))
            (display (if (= (f 21) 42) "ok" "bad"))
            (newline)"#);

        assert!(asm.contains("jnz argument_count_wrong"));
        assert!(asm.contains("lea 4(%esp,%edx,4), %ebx"));
        assert!(asm.contains(".int 0xca11ab1e"));
    }

    #[test]
    fn procedures_may_recurse() {
        ok("(define f (lambda (x) (f x)))");
    }

    #[test]
    fn forward_references_between_defines() {
        ok("(define f (lambda () (g))) (define g (lambda () 1))");
    }

    #[test]
    fn computed_heads() {
        let asm = ok("((lambda (x) x) 5)");
        assert!(asm.contains("call *%ebx"));
    }
}

mod layout {
    use super::*;

    #[test]
    fn header_precedes_body() {
        let asm = ok(r#"(display "hi")"#);

        let start = asm.find("_start:").unwrap();
        assert!(asm.find("report_error:").unwrap() < start);
        assert!(asm.find("ensure_string:").unwrap() < start);
        assert!(asm.find("ensure_procedure:").unwrap() < start);
    }

    #[test]
    fn entry_is_weakly_aliased() {
        let asm = ok("");

        assert!(asm.starts_with(".text\n"));
        assert!(asm.contains(".globl _start"));
        assert!(asm.contains(".weak main"));
        assert!(asm.contains("_start:\nmain:\n"));
    }

    #[test]
    fn programs_exit_cleanly() {
        let asm = ok("");

        // exit(0) via int 0x80 closes every program
        assert!(asm.contains("mov $0, %ebx"));
        assert!(asm.contains("int $0x80"));
    }

    #[test]
    fn every_program_aliases_eq() {
        // The empty program still defines `=`, whose cell starts at 0 and
        // is stored to at startup; the builtins get initialized cells
        let asm = ok("");

        assert!(asm.contains(".data"));
        assert!(asm.contains(".int 0\n"));
        assert_eq!(asm.matches(".int 0xca11ab1e").count(), 3);
    }

    #[test]
    fn output_is_deterministic() {
        let src = r#"(define f (lambda (x) (+ x 1))) (display "a") (display "b")"#;
        assert_eq!(ok(src), ok(src));
    }
}

mod diagnostics {
    use super::*;

    #[test]
    fn undefined_globals_are_named() {
        fails("(display undefined-name)", "undefined-name");
    }

    #[test]
    fn double_definition_is_named() {
        fails("(define x 1) (define x 2)", "`x` is defined twice");
    }

    #[test]
    fn builtins_cannot_be_redefined() {
        fails("(define display 1)", "`display` is defined twice");
    }

    #[test]
    fn quote_is_not_implemented() {
        // Symbols are outside the subset; quoting fails cleanly instead of
        // miscompiling
        fails(r#"(display (if (eq? 'a 'a) "t" "f"))"#, "quote");
    }

    #[test]
    fn conditional_operand_count() {
        fails("(if 1 2)", "`if` expects exactly 3 operands");
    }

    #[test]
    fn lambda_operand_count() {
        fails("(lambda (x))", "`lambda` expects a parameter list and one body expression");
    }

    #[test]
    fn nested_capture() {
        fails(
            "(define f (lambda (x) (lambda (y) x)))",
            "cannot capture local variable `x`",
        );
    }

    #[test]
    fn nil_is_not_an_expression() {
        fails("(display ())", "cannot compile `()`");
    }

    #[test]
    fn out_of_range_integers() {
        fails("(display 536870912)", "outside the representable range");
        ok("(- 536870911 1)");
    }
}

mod representation {
    use super::*;

    #[quickcheck]
    fn tag_round_trip(n: i32) {
        // Clamp into the representable 30 bit signed range
        let n = n >> 2;
        assert_eq!(immediate::untag(immediate::n(n)), n);
    }

    #[quickcheck]
    fn integers_are_tagged_01(n: i32) {
        let n = n >> 2;
        assert_eq!(immediate::n(n) & immediate::MASK, immediate::INT);
    }

    #[test]
    fn singleton_encodings() {
        // 4k + 2 with k = 256, 257, 258, 259
        assert_eq!(immediate::NIL, 4 * 256 + 2);
        assert_eq!(immediate::TRUE, 4 * 257 + 2);
        assert_eq!(immediate::FALSE, 4 * 258 + 2);
        assert_eq!(immediate::EOF, 4 * 259 + 2);
    }

    #[test]
    fn truth_is_not_falseness_of_zero() {
        // The test compares against #f alone; 0 and () stay true
        let asm = ok("(if 0 1 2)");
        assert!(asm.contains(&format!("cmpl ${}, %eax", immediate::FALSE)));
        assert!(!asm.contains("cmpl $0, %eax"));
    }
}
