#[cfg(test)]
mod parser_tests {
    use rox as lox;

    use lox::ast::Stmt;
    use lox::ast_printer::AstPrinter;
    use lox::error::LoxError;
    use lox::parser::parse;
    use lox::scanner::scan;

    fn parse_source(source: &str) -> Result<Vec<Stmt>, Vec<LoxError>> {
        let tokens = scan(source).expect("source should scan");
        parse(&tokens)
    }

    fn assert_parses_to(source: &str, expected: &[&str]) {
        let statements = match parse_source(source) {
            Ok(statements) => statements,
            Err(errors) => panic!("Unexpected parse errors: {:?}", errors),
        };

        let printer = AstPrinter;
        let printed: Vec<String> = statements.iter().map(|s| printer.print_stmt(s)).collect();

        assert_eq!(printed, expected);
    }

    fn error_messages(source: &str) -> Vec<String> {
        match parse_source(source) {
            Ok(_) => panic!("Expected parse errors for {:?}", source),
            Err(errors) => errors.iter().map(ToString::to_string).collect(),
        }
    }

    #[test]
    fn test_precedence_and_associativity() {
        assert_parses_to("1 + 2 * 3;", &["(; (+ 1.0 (* 2.0 3.0)))"]);
        assert_parses_to("1 - 2 - 3;", &["(; (- (- 1.0 2.0) 3.0))"]);
        assert_parses_to("-(1 - 2) % 3;", &["(; (% (- (group (- 1.0 2.0))) 3.0))"]);
        assert_parses_to("1 < 2 == !false;", &["(; (== (< 1.0 2.0) (! false)))"]);
        assert_parses_to("a or b and c;", &["(; (or a (and b c)))"]);
        assert_parses_to("x = y = 2.5;", &["(; (= x (= y 2.5)))"]);
    }

    #[test]
    fn test_calls_and_properties() {
        assert_parses_to("print(\"hi\", nil);", &["(; (call print hi nil))"]);
        assert_parses_to("a.b = c.d();", &["(; (= (. a b) (call (. c d))))"]);
        assert_parses_to("f()();", &["(; (call (call f)))"]);
    }

    #[test]
    fn test_declarations() {
        assert_parses_to(
            "var a; var b = 1; fun add(x, y) { return x + y; }",
            &[
                "(var a)",
                "(var b 1.0)",
                "(fun add(x y) (return (+ x y)))",
            ],
        );

        assert_parses_to(
            "class B < A { init() { this.x = 1; } greet() { return super.greet(); } }",
            &["(class B < A (fun init() (; (= (. this x) 1.0))) (fun greet() (return (call (super greet)))))"],
        );
    }

    #[test]
    fn test_control_flow() {
        assert_parses_to(
            "if (x) y; else { z; } while (true) return;",
            &["(if x (; y) (block (; z)))", "(while true (return))"],
        );
    }

    #[test]
    fn test_for_desugars_to_while() {
        assert_parses_to(
            "for (var i = 0; i < 3; i = i + 1) print(i);",
            &["(block (var i 0.0) (while (< i 3.0) (block (; (call print i)) (; (= i (+ i 1.0))))))"],
        );

        // Every clause is optional; a missing condition loops forever.
        assert_parses_to("for (;;) f();", &["(while true (; (call f)))"]);
    }

    #[test]
    fn test_errors_are_accumulated() {
        let messages = error_messages("var = 1;\nprint(;\nvar ok = 2;");

        assert_eq!(
            messages,
            vec![
                "[line 1] Error at '=': Expect variable name.",
                "[line 2] Error at ';': Expect expression.",
            ]
        );
    }

    #[test]
    fn test_error_at_end() {
        assert_eq!(
            error_messages("var a = 1"),
            vec!["[line 1] Error at end: Expect ';' after variable declaration."]
        );
    }

    #[test]
    fn test_invalid_assignment_target() {
        assert_eq!(
            error_messages("1 = 2;"),
            vec!["[line 1] Error at '=': Invalid assignment target."]
        );
        assert_eq!(
            error_messages("a + b = c;"),
            vec!["[line 1] Error at '=': Invalid assignment target."]
        );
    }

    #[test]
    fn test_too_many_arguments() {
        let args: Vec<String> = (0..256).map(|i| i.to_string()).collect();
        let source = format!("f({});", args.join(", "));

        assert_eq!(
            error_messages(&source),
            vec!["[line 1] Error at '255': Can't have more than 255 arguments."]
        );
    }
}
