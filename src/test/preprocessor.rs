use pretty_assertions::assert_eq;

use crate::cmdline::{LangOptions, MacroOption, Standard};
use crate::error::{CompileError, CompileWarning, ErrorCollector};
use crate::machine::Machine;
use crate::preprocess::{self, Preprocessor, SearchPaths};
use crate::span::SourceMap;

use super::util::*;

fn preprocess_error(code: &str) -> ErrorCollector {
    let (text, ec) = preprocess_with(code, c23());
    assert!(text.is_err());
    ec
}

fn preprocess_warning(code: &str) -> Option<CompileWarning> {
    let (text, ec) = preprocess_with(code, c23());
    assert!(text.is_ok());
    ec.get_first_warning().cloned()
}

#[test]
fn test_object_macros() {
    assert_eq!(preprocess("#define A 1 + 2\nint x = A;\n"), "int x = 1 + 2;\n");
    assert_eq!(preprocess("#define A B\n#define B A\nA B\n"), "A B\n");
    assert_eq!(preprocess("#define foo foo bar\nfoo\n"), "foo bar\n");
    assert_eq!(preprocess("#define E\n[E]\n"), "[]\n");
}

#[test]
fn test_function_macros() {
    assert_eq!(
        preprocess("#define ADD(a, b) ((a) + (b))\nADD(1, 2)\n"),
        "((1) + (2))\n"
    );
    assert_eq!(
        preprocess("#define TWICE(x) x x\n#define ONE 1\nTWICE(ONE)\n"),
        "1 1\n"
    );
    assert_eq!(preprocess("#define F(x) x\nF\n"), "F\n");
    assert_eq!(preprocess("#define F(x) [x]\nF((1, 2))\n"), "[(1, 2)]\n");
    assert_eq!(preprocess("#define F() 7\nF()\n"), "7\n");
}

#[test]
fn test_variadic_macros() {
    assert_eq!(
        preprocess("#define V(fmt, ...) f(fmt, __VA_ARGS__)\nV(1, 2, 3)\n"),
        "f(1, 2, 3)\n"
    );
    assert_eq!(preprocess("#define V(args...) g(args)\nV(a, b)\n"), "g(a, b)\n");
    assert_eq!(preprocess("#define V(...) h(__VA_ARGS__)\nV()\n"), "h()\n");
}

#[test]
fn test_stringify() {
    assert_eq!(
        preprocess("#define STR(x) #x\nSTR(a + \"b\\n\")\n"),
        "\"a + \\\"b\\\\n\\\"\"\n"
    );
    assert_eq!(preprocess("#define STR(x) #x\nSTR()\n"), "\"\"\n");
}

#[test]
fn test_paste() {
    assert_eq!(
        preprocess("#define CAT(a, b) a ## b\nCAT(x, 1) CAT(, y) CAT(1, )\n"),
        "x1 y 1\n"
    );
    assert_eq!(
        preprocess("#define SUFFIX(c) c ## WB\nSUFFIX(-170141183460469231731687303715884105728)\n"),
        "-170141183460469231731687303715884105728WB\n"
    );
    assert_eq!(
        preprocess("#define J(a, b) a ## b\n#define X(a, b) J(a, b)\n#define S UL\nX(5, S)\n"),
        "5UL\n"
    );
    let ec = preprocess_error("#define CAT(a, b) a ## b\nCAT(+, /)\n");
    assert_eq!(
        ec.get_first_error(),
        Some(&CompileError::InvalidPaste("+/".to_string()))
    );
}

#[test]
fn test_int_c_macros() {
    let out = preprocess("#include <stdint.h>\nINT64_C(5) UINT32_C(7) INT8_C(1) INT128_C(2)\n");
    assert_eq!(out.lines().last(), Some("5L 7U 1 ((int128_t)2WB)"));
}

#[test]
fn test_conditionals() {
    let code = r#"#if defined(__x86_64__) && __SIZEOF_INT128__ == 16
yes
#else
no
#endif
#ifdef NOPE
bad
#elif 1 + 1 == 2
two
#else
bad
#endif
#ifndef NOPE
ok
#endif
#if 0
#if 1
bad
#else
bad
#endif
#elifdef __STDC__
stdc
#endif
#if -1 > 0u && true && !false && UNDEFINED == 0
unsigned
#endif
"#;
    assert_eq!(preprocess(code), "yes\ntwo\nok\nstdc\nunsigned\n");
}

#[test]
fn test_predefined_macros() {
    let code = "__STDC_VERSION__ __SIZEOF_INT128__ __INTMAX_TYPE__ __LINE__\n__FILE__\n";
    assert_eq!(preprocess(code), "202311L 16 long 1\n\"test.c\"\n");
}

#[test]
fn test_directive_errors() {
    let ec = preprocess_error("#if 1\nx\n");
    assert_eq!(ec.get_first_error(), Some(&CompileError::UnterminatedConditional));
    let ec = preprocess_error("#endif\n");
    assert_eq!(
        ec.get_first_error(),
        Some(&CompileError::UnmatchedDirective("endif".to_string()))
    );
    let ec = preprocess_error("#if 1\n#else\n#else\n#endif\n");
    assert_eq!(
        ec.get_first_error(),
        Some(&CompileError::UnmatchedDirective("else".to_string()))
    );
    let ec = preprocess_error("#error boom here\n");
    assert_eq!(
        ec.get_first_error(),
        Some(&CompileError::UserError("boom here".to_string()))
    );
    let ec = preprocess_error("#frobnicate\n");
    assert_eq!(
        ec.get_first_error(),
        Some(&CompileError::InvalidDirective("frobnicate".to_string()))
    );
    let ec = preprocess_error("#define\n");
    assert_eq!(
        ec.get_first_error(),
        Some(&CompileError::MissingMacroName("define".to_string()))
    );
    let ec = preprocess_error("#include <nonexistent.h>\n");
    assert_eq!(
        ec.get_first_error(),
        Some(&CompileError::IncludeNotFound("nonexistent.h".to_string()))
    );
    preprocess_error("#if\n#endif\n");
}

#[test]
fn test_skipped_groups_are_not_checked() {
    assert_eq!(preprocess("#if 0\n#frobnicate\n#error no\n#endif\nok\n"), "ok\n");
}

#[test]
fn test_macro_errors() {
    let ec = preprocess_error("#define F(x) x\nF(1, 2)\n");
    assert_eq!(
        ec.get_first_error(),
        Some(&CompileError::MacroArgCount("F".to_string(), 1, 2))
    );
    let ec = preprocess_error("#define F(x) x\nF(1\n");
    assert_eq!(
        ec.get_first_error(),
        Some(&CompileError::UnterminatedMacroCall("F".to_string()))
    );
    let ec = preprocess_error("#define A ## b\n");
    assert_eq!(ec.get_first_error(), Some(&CompileError::PasteAtEdge));
    let ec = preprocess_error("#define S(x) #y\n");
    assert_eq!(ec.get_first_error(), Some(&CompileError::InvalidStringify));
    let ec = preprocess_error("#define F(x, x) x\n");
    assert!(matches!(
        ec.get_first_error(),
        Some(CompileError::MacroParameterError(_))
    ));
}

#[test]
fn test_warnings() {
    assert_eq!(
        preprocess_warning("#define A 1\n#define A 2\n"),
        Some(CompileWarning::MacroRedefined("A".to_string()))
    );
    assert_eq!(preprocess_warning("#define A (1 + 2)\n#define A (1 + 2)\n"), None);
    assert_eq!(
        preprocess_warning("#pragma frobnicate\n"),
        Some(CompileWarning::UnknownPragma("frobnicate".to_string()))
    );
    assert_eq!(preprocess_warning("#pragma once\n#pragma GCC system_header\n"), None);
    assert_eq!(
        preprocess_warning("#warning careful\n"),
        Some(CompileWarning::UserWarning("careful".to_string()))
    );
}

#[test]
fn test_builtin_headers_included_once() {
    let code = "#include <stdint.h>\n#include <stdint.h>\n#include \"limits.h\"\nINT_MAX\n";
    assert_eq!(preprocess(code).lines().last(), Some("2147483647"));
}

#[test]
fn test_nostdinc() {
    let machine = Machine::default();
    let lang = LangOptions::default();
    let paths = SearchPaths::default();
    let mut sm = SourceMap::new();
    let mut ec = ErrorCollector::new();
    let file = sm.add_file("test.c".to_string(), None, "#include <stdint.h>\n".to_string());
    let mut pp = Preprocessor::new(&machine, &lang, &paths, &mut sm, &mut ec);
    pp.define_macros(&[]).unwrap();
    assert!(pp.preprocess_file(file).is_err());
}

#[test]
fn test_command_line_macros() {
    let machine = Machine::default();
    let lang = LangOptions::new(Standard::C11, false);
    let paths = SearchPaths {
        builtin: true,
        ..Default::default()
    };
    let mut sm = SourceMap::new();
    let mut ec = ErrorCollector::new();
    let file = sm.add_file(
        "test.c".to_string(),
        None,
        "FOO BAR __STRICT_ANSI__ __STDC_VERSION__ __x86_64__\n".to_string(),
    );
    let options = vec![
        MacroOption::Define("FOO".to_string()),
        MacroOption::Define("BAR=a b".to_string()),
        MacroOption::Undef("__x86_64__".to_string()),
    ];
    let mut pp = Preprocessor::new(&machine, &lang, &paths, &mut sm, &mut ec);
    pp.define_macros(&options).unwrap();
    let tokens = pp.preprocess_file(file).unwrap();
    assert_eq!(
        preprocess::print_tokens(&tokens),
        "1 a b 1 201112L __x86_64__\n"
    );
}

#[test]
fn test_dump_macros() {
    let machine = Machine::default();
    let lang = c23();
    let paths = SearchPaths {
        builtin: true,
        ..Default::default()
    };
    let mut sm = SourceMap::new();
    let mut ec = ErrorCollector::new();
    let file = sm.add_file(
        "test.c".to_string(),
        None,
        "#include <stdint.h>\n#define V(a, ...) a\n#define EMPTY\n".to_string(),
    );
    let mut pp = Preprocessor::new(&machine, &lang, &paths, &mut sm, &mut ec);
    pp.define_macros(&[]).unwrap();
    pp.preprocess_file(file).unwrap();
    let dump = pp.dump_macros();
    let lines: Vec<&str> = dump.lines().collect();
    assert!(lines.contains(&"#define INT128_C(c) ((int128_t)c ## WB)"));
    assert!(lines.contains(&"#define V(a, ...) a"));
    assert!(lines.contains(&"#define EMPTY"));
    assert!(lines.contains(&"#define __STDC_VERSION__ 202311L"));
    assert!(!lines.iter().any(|l| l.contains("__LINE__")));
    let mut sorted = lines.clone();
    sorted.sort();
    assert_eq!(lines, sorted);
}

#[test]
fn test_fixture_through_preprocessor() {
    let code = "#include <stdint.h>\n_Static_assert(INT128_MIN == -170141183460469231731687303715884105728WB);\n";
    let out = preprocess(code);
    assert_eq!(
        out.lines().last(),
        Some("_Static_assert((-((int128_t)170141183460469231731687303715884105727WB) - 1) == -170141183460469231731687303715884105728WB);")
    );
}
