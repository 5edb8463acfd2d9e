use expandium::{
    Collector, DiagnosticKind, IncludeKind, Preprocessor, PreprocessorConfig, SourceResolver, Token,
    preprocess, render, tokenize,
};
use pretty_assertions::assert_eq;

fn run(source: &str) -> (String, Vec<DiagnosticKind>) {
    let mut pp = Preprocessor::with_sink(tokenize(source, "test.c"), Collector::new());
    let tokens: Vec<Token> = pp.by_ref().collect();
    (render(&tokens), pp.into_sink().kinds())
}

#[test]
fn max_macro_expands_and_evaluates() {
    let source = "\
#define MAX(a, b) ((a) > (b) ? (a) : (b))
MAX(3, 5)
#if MAX(3, 5) == 5
five
#endif
";
    let (out, kinds) = run(source);
    assert_eq!(out, "((3) > (5) ? (3) : (5))\nfive\n");
    assert!(kinds.is_empty());
}

#[test]
fn stringize_and_paste() {
    let source = "\
#define STR(x) #x
#define XSTR(x) STR(x)
#define CAT(a, b) a ## b
#define VERSION 1.2
STR(hello   world) XSTR(VERSION) STR(VERSION)
CAT(foo, bar) CAT(, tail) CAT(head, )
";
    let (out, kinds) = run(source);
    assert_eq!(
        out,
        "\"hello world\" \"1.2\" \"VERSION\"\nfoobar tail head\n"
    );
    assert!(kinds.is_empty());
}

#[test]
fn stringize_escapes_quotes() {
    let (out, _) = run("#define STR(x) #x\nSTR(\"a\\n\" 'b')\n");
    assert_eq!(out, "\"\\\"a\\\\n\\\" 'b'\"\n");
}

#[test]
fn elif_else_selection() {
    let source = "\
#if 0
zero
#elif 1
one
#else
other
#endif
";
    assert_eq!(run(source).0, "one\n");
}

#[test]
fn defined_operator_is_silent() {
    let source = "\
#define A
#if defined A && defined(A) && !defined B
ok
#endif
";
    let (out, kinds) = run(source);
    assert_eq!(out, "ok\n");
    assert!(kinds.is_empty());
}

#[test]
fn undefined_identifier_warns_and_is_false() {
    let (out, kinds) = run("#if UNKNOWN\nyes\n#else\nno\n#endif\n");
    assert_eq!(out, "no\n");
    assert_eq!(kinds, vec![DiagnosticKind::UndefinedIdentifier]);
}

#[test]
fn expression_errors_take_the_false_branch() {
    let cases = [
        ("#if 1 / 0\n", DiagnosticKind::DivisionByZero),
        ("#if 1.5\n", DiagnosticKind::FloatingPointInExpression),
        ("#if \"s\"\n", DiagnosticKind::StringInExpression),
        ("#if X = 1\n", DiagnosticKind::AssignmentInExpression),
        ("#if 1 +\n", DiagnosticKind::InvalidExpression),
        ("#if defined(\n", DiagnosticKind::InvalidDefinedOperand),
        ("#if\n", DiagnosticKind::IncompleteDirective),
    ];
    for (condition, kind) in cases {
        let source = format!("{condition}yes\n#else\nno\n#endif\n");
        let (out, kinds) = run(&source);
        assert_eq!(out, "no\n", "{condition}");
        assert_eq!(kinds, vec![kind], "{condition}");
    }
}

#[test]
fn identical_redefinition_is_silent() {
    let (_, kinds) = run("#define F(a) a  +  1\n#define F(a) a + /* c */ 1\n");
    assert!(kinds.is_empty());
    let (_, kinds) = run("#define F(a) a + 1\n#define F(b) b + 1\n");
    assert_eq!(kinds, vec![DiagnosticKind::MacroRedefinition]);
}

#[test]
fn rerunning_macro_free_output_is_a_no_op() {
    let source = "\
#define SQ(x) ((x) * (x))
#ifdef SQ
int a = SQ(2);
#endif
";
    let (first, _) = run(source);
    let (second, kinds) = run(&first);
    assert_eq!(second, first);
    assert!(kinds.is_empty());
}

#[test]
fn self_referential_macros_terminate() {
    let source = "\
#define x (4 + y)
#define y (2 * x)
x y
";
    assert_eq!(run(source).0, "(4 + (2 * x)) (2 * (4 + y))\n");
}

#[test]
fn includes_resolve_through_source_loader() {
    let config = PreprocessorConfig::default().with_include_resolver(SourceResolver::new(
        |name: &str, kind| match (name, kind) {
            ("config.h", IncludeKind::Local) => Some("#define ENABLED 1".to_string()),
            ("limits.h", IncludeKind::System) => Some("#define LIMIT 10\n".to_string()),
            _ => None,
        },
    ));
    let source = "\
#include \"config.h\"
#include <limits.h>
#if ENABLED && LIMIT > 5
int buf[LIMIT];
#endif
#include <missing.h>
";
    let result = preprocess(source, &config);
    assert_eq!(result.output, "int buf[10];\n");
    let kinds: Vec<_> = result.diagnostics.iter().map(|d| d.kind).collect();
    assert_eq!(kinds, vec![DiagnosticKind::IncludeNotFound]);
    assert!(result.has_errors());
}

fn mutual_headers(a: &'static str) -> PreprocessorConfig {
    PreprocessorConfig::default().with_include_resolver(SourceResolver::new(
        move |name: &str, _| match name {
            "a.h" => Some(a.to_string()),
            "b.h" => Some("#include \"a.h\"\nint b;\n".to_string()),
            _ => None,
        },
    ))
}

#[test]
fn pragma_once_breaks_an_include_cycle() {
    let config = mutual_headers("#pragma once\n#include \"b.h\"\nint a;\n");
    let result = preprocess("#include \"a.h\"\n#include \"b.h\"\n", &config);
    assert_eq!(result.output, "int b;\nint a;\nint b;\n");
    assert!(result.diagnostics.is_empty());
}

#[test]
fn include_cycle_without_guard_hits_the_depth_limit() {
    let config = mutual_headers("#include \"b.h\"\nint a;\n").with_include_depth_limit(10);
    let result = preprocess("#include \"a.h\"\n", &config);
    let kinds: Vec<_> = result.diagnostics.iter().map(|d| d.kind).collect();
    assert_eq!(kinds, vec![DiagnosticKind::IncludeDepthExceeded]);
    assert_eq!(result.output.matches("int a;").count(), 5);
    assert_eq!(result.output.matches("int b;").count(), 5);
}

#[test]
fn unknown_directive_warns() {
    let (out, kinds) = run("#frob 1\nx\n");
    assert_eq!(out, "x\n");
    assert_eq!(kinds, vec![DiagnosticKind::UnknownDirective]);
}

#[test]
fn unterminated_conditional_is_reported() {
    let (out, kinds) = run("#ifndef GUARD\n#define GUARD\nbody\n");
    assert_eq!(out, "body\n");
    assert_eq!(kinds, vec![DiagnosticKind::UnterminatedConditional]);
}

#[test]
fn variadic_macros() {
    let source = "\
#define LOG(fmt, ...) printf(fmt, __VA_ARGS__)
#define COUNT(...) #__VA_ARGS__
LOG(\"%d %d\", 1, (2, 3))
COUNT() COUNT(a, b)
";
    let (out, kinds) = run(source);
    assert_eq!(out, "printf(\"%d %d\", 1, (2, 3))\n\"\" \"a, b\"\n");
    assert!(kinds.is_empty());
}
