use crate::build::{compile, run, stderr_of, stdout_of, write_source};

mod build;

#[macro_use]
extern crate lazy_static;

const INT128_CHECK: &str = "#include <stdint.h>\n_Static_assert(sizeof(int128_t) == 16);\n";

#[test]
fn test_clean_unit() {
    let assert = compile(INT128_CHECK, &["-std=c23"]);
    assert!(stderr_of(&assert).is_empty());
    assert.success();
}

#[test]
fn test_32bit_target_rejects_int128() {
    let assert = compile(INT128_CHECK, &["-std=c23", "-target", "i686-linux"]);
    assert!(stderr_of(&assert).contains("error: unknown identifier: int128_t"));
    assert.code(1);
}

#[test]
fn test_diagnostic_location() {
    let path = write_source("int x;\n_Static_assert(x);\n");
    let assert = run(&[], &path);
    let stderr = stderr_of(&assert);
    let expected = format!(
        "{}:2:16: error: variable `x' cannot be used in a constant expression",
        path.display()
    );
    assert!(stderr.contains(&expected), "{}", stderr);
    assert.code(1);
}

#[test]
fn test_json_diagnostics() {
    let assert = compile(
        "_Static_assert(1 == 2, \"no\");\n",
        &["-fdiagnostics-format=json"],
    );
    let json: serde_json::Value = serde_json::from_str(&stderr_of(&assert)).unwrap();
    let list = json.as_array().unwrap();
    assert_eq!(list.len(), 1);
    assert_eq!(list[0]["kind"], "error");
    assert_eq!(
        list[0]["message"],
        "static assertion failed due to requirement '1 == 2': no"
    );
    assert_eq!(list[0]["location"]["line"], 1);
    assert.code(1);
}

#[test]
fn test_warning_groups() {
    let code = "_Static_assert(1wb);\n";
    let assert = compile(code, &["-std=c17"]);
    assert!(stderr_of(&assert).contains("warning: ") && stderr_of(&assert).contains("[-Wc23-extensions]"));
    assert.success();

    let assert = compile(code, &["-std=c17", "-Wno-c23-extensions"]);
    assert!(stderr_of(&assert).is_empty());
    assert.success();

    let assert = compile(code, &["-std=c17", "-Werror"]);
    assert!(stderr_of(&assert).contains("[-Werror,-Wc23-extensions]"));
    assert.code(1);

    let assert = compile(code, &["-std=c17", "-w", "-Werror"]);
    assert.success();
}

#[test]
fn test_pedantic_empty_unit() {
    let assert = compile("", &[]);
    assert!(stderr_of(&assert).is_empty());
    assert.success();

    let assert = compile("", &["-pedantic"]);
    assert!(stderr_of(&assert).contains("[-Wempty-translation-unit]"));
    assert.success();
}

#[test]
fn test_preprocess_only() {
    let assert = compile(
        "#define TWICE(x) ((x) * 2)\nint y = TWICE(N);\n",
        &["-E", "-DN=21"],
    );
    assert_eq!(stdout_of(&assert), "int y = ((21) * 2);\n");
    assert.success();
}

#[test]
fn test_preprocess_to_file() {
    let output = write_source("").with_extension("i");
    let assert = compile("A\n", &["-E", "-DA=hello", "-o", output.to_str().unwrap()]);
    assert!(stdout_of(&assert).is_empty());
    assert.success();
    assert_eq!(std::fs::read_to_string(&output).unwrap(), "hello\n");
}

#[test]
fn test_dump_macros() {
    let assert = compile("#define FOO 1\n", &["-E", "-dM", "--target=x86_64-linux"]);
    let stdout = stdout_of(&assert);
    assert!(stdout.lines().any(|l| l == "#define FOO 1"));
    assert!(stdout.lines().any(|l| l == "#define __SIZEOF_INT128__ 16"));
    assert!(stdout.lines().any(|l| l == "#define __x86_64__ 1"));
    assert.success();
}

#[test]
fn test_include_paths() {
    let header = write_source("#define FROM_HEADER 42\n");
    let dir = header.parent().unwrap().to_str().unwrap().to_string();
    let name = header.file_name().unwrap().to_str().unwrap().to_string();
    let code = format!("#include <{}>\n_Static_assert(FROM_HEADER == 42);\n", name);
    compile(&code, &["-I", &dir]).success();
    let assert = compile(&code, &["-nostdinc"]);
    assert!(stderr_of(&assert).contains("not found"), "{}", stderr_of(&assert));
}

#[test]
fn test_bad_target() {
    let assert = compile("", &["--target=z80-none"]);
    assert!(stderr_of(&assert).contains("extint-cc: error: unknown target architecture `z80'"));
    assert.code(1);
}

#[test]
fn test_missing_input() {
    let assert = run(&[], std::path::Path::new("/nonexistent/input.c"));
    assert!(stderr_of(&assert).starts_with("extint-cc: error: /nonexistent/input.c"));
    assert.code(1);
}

#[test]
fn test_command_line_misuse() {
    let assert = compile("", &["-std=c42"]);
    assert.code(2);
}

#[test]
fn test_help_mentions_log_filter() {
    let assert = compile("", &["--help"]);
    let stdout = stdout_of(&assert);
    assert!(stdout.contains("  -v "), "{}", stdout);
    assert!(stdout.contains("RUST_LOG"), "{}", stdout);
    assert.success();
}
