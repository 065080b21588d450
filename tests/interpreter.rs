#[cfg(test)]
mod interpreter_tests {
    use std::cell::RefCell;
    use std::io::{self, Write};
    use std::rc::Rc;

    use rox as lox;

    use lox::error::{RunError, RuntimeErrorKind, StaticErrorKind};
    use lox::session::Session;
    use lox::value::Value;

    /// Collects everything `print` writes.
    #[derive(Clone, Default)]
    struct Captured(Rc<RefCell<Vec<u8>>>);

    impl Write for Captured {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.borrow_mut().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl Captured {
        fn text(&self) -> String {
            String::from_utf8(self.0.borrow().clone()).expect("output should be UTF-8")
        }
    }

    fn session() -> (Session, Captured) {
        let out = Captured::default();
        (Session::with_output(Box::new(out.clone())), out)
    }

    fn run(source: &str) -> String {
        let (mut session, out) = session();
        if let Err(e) = session.run(source) {
            panic!("Program failed: {}", e);
        }
        out.text()
    }

    fn run_err(source: &str) -> (RunError, String) {
        let (mut session, out) = session();
        match session.run(source) {
            Ok(()) => panic!("Expected failure for {:?}", source),
            Err(e) => (e, out.text()),
        }
    }

    fn runtime_kind(error: &RunError) -> Option<RuntimeErrorKind> {
        match error {
            RunError::Runtime(e) => e.runtime_kind(),
            _ => None,
        }
    }

    #[test]
    fn test_arithmetic_and_printing() {
        assert_eq!(
            run("print(1 + 2 * 3); print(7 % 4); print(10 / 4); print(\"a\" + \"b\");"),
            "7\n3\n2.5\nab\n"
        );
    }

    #[test]
    fn test_operator_table_end_to_end() {
        assert_eq!(
            run("print(\"ab\" * 3); print(3 * \"ab\"); print(true * true);
                 print(true + false); print(1 + \"x\"); print(1 == \"1\");
                 print(nil == nil); print(!nil);"),
            "ababab\nababab\ntrue\ntrue\n1x\nfalse\ntrue\ntrue\n"
        );
    }

    #[test]
    fn test_type_errors_name_operand_kinds() {
        let (error, _) = run_err("print(1 < \"a\");");
        assert_eq!(runtime_kind(&error), Some(RuntimeErrorKind::Type));
        assert_eq!(
            error.to_string(),
            "Incomparable types `number` and `string`\n[line 1]"
        );

        let (error, _) = run_err("\n\"a\" - \"b\";");
        assert_eq!(
            error.to_string(),
            "Unsubtractable types `string` and `string`\n[line 2]"
        );
        assert_eq!(error.exit_code(), 70);
    }

    #[test]
    fn test_closure_observes_later_mutation() {
        assert_eq!(
            run("var i = 0; fun f() { return i; } i = 5; print(f());"),
            "5\n"
        );
    }

    #[test]
    fn test_closures_share_their_frame() {
        let source = "
            fun counter() {
                var n = 0;
                fun inc() { n = n + 1; return n; }
                return inc;
            }
            var a = counter();
            var b = counter();
            a(); a();
            print(a());
            print(b());
        ";

        assert_eq!(run(source), "3\n1\n");
    }

    #[test]
    fn test_resolution_ignores_later_shadowing() {
        let source = "
            var a = \"global\";
            {
                fun show() { print(a); }
                show();
                var a = \"block\";
                show();
            }
        ";

        assert_eq!(run(source), "global\nglobal\n");
    }

    #[test]
    fn test_control_flow() {
        let source = "
            var total = 0;
            for (var i = 0; i < 5; i = i + 1) {
                if (i == 3) total = total + 100; else total = total + i;
            }
            print(total);
            var n = 3;
            while (n > 0) n = n - 1;
            print(n);
        ";

        assert_eq!(run(source), "107\n0\n");
    }

    #[test]
    fn test_logical_operators_return_deciding_operand() {
        assert_eq!(
            run("print(nil or \"yes\"); print(1 and 2); print(false and boom());
                 print(\"x\" or boom());"),
            "yes\n2\nfalse\nx\n"
        );
    }

    #[test]
    fn test_return_unwinds_loops() {
        let source = "
            fun find() {
                var i = 0;
                while (true) {
                    if (i == 4) return i;
                    i = i + 1;
                }
            }
            print(find());
            fun nothing() {}
            print(nothing());
        ";

        assert_eq!(run(source), "4\nnil\n");
    }

    #[test]
    fn test_recursion() {
        assert_eq!(
            run("fun fib(n) { if (n < 2) return n; return fib(n - 1) + fib(n - 2); } print(fib(15));"),
            "610\n"
        );
    }

    #[test]
    fn test_inheritance_and_super() {
        let source = "
            class A { greet() { return \"hi\"; } }
            class B < A { greet() { return super.greet() + \"!\"; } }
            var b = B();
            print(b.greet());
        ";

        assert_eq!(run(source), "hi!\n");
    }

    #[test]
    fn test_super_keeps_this_bound_to_subclass_instance() {
        let source = "
            class A {
                describe() { return this.name(); }
                name() { return \"A\"; }
            }
            class B < A {
                describe() { return \"B sees \" + super.describe(); }
                name() { return \"B\"; }
            }
            class C < B {}
            print(C().describe());
        ";

        assert_eq!(run(source), "B sees B\n");
    }

    #[test]
    fn test_initializer_always_yields_instance() {
        let source = "
            class Point {
                init(x, y) {
                    this.x = x;
                    this.y = y;
                    if (x > 100) return;
                }
            }
            var p = Point(1, 2);
            print(p.x + p.y);
            print(p.init(200, 3));
            print(p.x);
            print(Point);
        ";

        assert_eq!(run(source), "3\nPoint instance\n200\nPoint\n");
    }

    #[test]
    fn test_fields_shadow_methods_and_methods_bind() {
        let source = "
            class Box {
                init(v) { this.v = v; }
                get() { return this.v; }
            }
            var b = Box(1);
            var g = b.get;
            b.v = 2;
            print(g());
            b.get = \"field\";
            print(b.get);
            print(g);
        ";

        assert_eq!(run(source), "2\nfield\n<fn get>\n");
    }

    #[test]
    fn test_initializer_return_value_is_static_error() {
        let (error, printed) =
            run_err("print(\"before\"); class A { init() { return 5; } }");

        assert!(matches!(error, RunError::Static(_)));
        assert_eq!(error.exit_code(), 65);
        assert_eq!(
            error.errors()[0].static_kind(),
            Some(StaticErrorKind::InitializerReturnValue)
        );
        // Nothing ran.
        assert_eq!(printed, "");
    }

    #[test]
    fn test_arity_error_before_body_runs() {
        let (error, printed) = run_err("fun f() { print(\"ran\"); } f(1);");

        assert_eq!(runtime_kind(&error), Some(RuntimeErrorKind::Arity));
        assert_eq!(error.to_string(), "Expected 0 arguments but got 1.\n[line 1]");
        assert_eq!(printed, "");

        let (error, _) = run_err("class P { init(a) {} } P();");
        assert_eq!(runtime_kind(&error), Some(RuntimeErrorKind::Arity));

        let (error, _) = run_err("print();");
        assert_eq!(runtime_kind(&error), Some(RuntimeErrorKind::Arity));
    }

    #[test]
    fn test_runtime_error_keeps_earlier_effects() {
        let (error, printed) = run_err("print(1); print(missing); print(2);");

        assert_eq!(runtime_kind(&error), Some(RuntimeErrorKind::UndefinedVariable));
        assert_eq!(error.to_string(), "Undefined variable 'missing'.\n[line 1]");
        assert_eq!(printed, "1\n");
    }

    #[test]
    fn test_runtime_error_kinds() {
        let cases = [
            ("\"s\"();", RuntimeErrorKind::NotCallable),
            ("var x = 1; x.y;", RuntimeErrorKind::InvalidReceiver),
            ("var x = 1; x.y = 2;", RuntimeErrorKind::InvalidReceiver),
            ("class A {} A().nope;", RuntimeErrorKind::UndefinedProperty),
            ("var NotClass = 1; class B < NotClass {}", RuntimeErrorKind::InvalidSuperclass),
            ("undefined = 1;", RuntimeErrorKind::UndefinedVariable),
            ("-\"x\";", RuntimeErrorKind::Type),
        ];

        for (source, expected) in cases {
            let (error, _) = run_err(source);
            assert_eq!(runtime_kind(&error), Some(expected), "source: {}", source);
        }

        let (error, _) = run_err("\"s\"();");
        assert_eq!(
            error.to_string(),
            "Can only call functions and classes, not `string`.\n[line 1]"
        );
    }

    #[test]
    fn test_environment_restored_after_error() {
        let (mut session, out) = session();

        assert!(session.run("var a = \"outer\"; { var a = \"inner\"; nope(); }").is_err());
        session.run("print(a);").unwrap();

        assert_eq!(out.text(), "outer\n");
    }

    #[test]
    fn test_session_persists_definitions_across_runs() {
        let (mut session, out) = session();

        session.run("var count = 1;").unwrap();
        session.run("fun bump() { count = count + 1; return count; }").unwrap();
        session
            .run("class Greeter { hi() { return \"hi \" + count; } }")
            .unwrap();

        // A failing line does not discard earlier state.
        assert!(session.run("bump(1);").is_err());
        assert!(session.run("var = ;").is_err());

        session.run("bump(); print(Greeter().hi());").unwrap();

        assert_eq!(out.text(), "hi 2\n");
    }

    #[test]
    fn test_session_drops_entries_of_finished_top_level_code() {
        let (mut session, out) = session();

        session.run("{ var a = 1; print(a); }").unwrap();
        assert_eq!(session.interpreter().resolved_count(), 0);

        session
            .run(
                "fun make() { var n = 0; fun inc() { n = n + 1; return n; } return inc; }
                 { var c = make(); c(); }",
            )
            .unwrap();
        let kept = session.interpreter().resolved_count();
        assert!(kept > 0);

        session.run("{ var x = 2; print(x + x); }").unwrap();
        assert!(session.run("{ var y = 1; y(); }").is_err());
        assert_eq!(session.interpreter().resolved_count(), kept);

        // Function bodies resolved on earlier lines still run correctly.
        session.run("var c = make(); c(); print(c());").unwrap();
        assert_eq!(out.text(), "1\n4\n2\n");
    }

    #[test]
    fn test_natives() {
        assert_eq!(run("print(clock() > 0); print(print); print(clock);"),
            "true\n<native fn print>\n<native fn clock>\n");

        let (mut session, _) = session();
        let globals = session.interpreter().globals().clone();
        assert!(matches!(
            globals.borrow().get(&lox::token::Token::new(
                lox::token::TokenType::IDENTIFIER,
                "clock",
                1
            )),
            Ok(Value::Native(_))
        ));
    }

    #[test]
    fn test_custom_native() {
        let (mut session, out) = session();

        session
            .interpreter()
            .define_native("double", 1, |_, args| match args.first() {
                Some(Value::Number(n)) => Ok(Value::Number(n * 2.0)),
                _ => Err("double expects a number".to_string()),
            });

        session.run("print(double(21));").unwrap();
        assert_eq!(out.text(), "42\n");

        let error = session.run("double(\"x\");").unwrap_err();
        assert_eq!(runtime_kind(&error), Some(RuntimeErrorKind::Native));
        assert_eq!(error.to_string(), "double expects a number\n[line 1]");
    }
}
