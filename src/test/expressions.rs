use pretty_assertions::assert_eq;

use crate::error::{CompileError, CompileWarning};

use super::util::*;

#[test]
fn test_int128_limits() {
    compile(
        r#"
#include <stdint.h>
_Static_assert(sizeof(int128_t) == __SIZEOF_INT128__);
_Static_assert(INT128_WIDTH == 128);
_Static_assert(UINT128_MAX == 340282366920938463463374607431768211455WBU);
_Static_assert(INT128_MAX == 170141183460469231731687303715884105727WB);
_Static_assert(INT128_MIN == -170141183460469231731687303715884105728WB);
_Static_assert(INT128_C(-170141183460469231731687303715884105728) == -170141183460469231731687303715884105728wb);
_Static_assert(UINT128_C(340282366920938463463374607431768211455) == 340282366920938463463374607431768211455uwb);
"#,
    );
}

#[test]
fn test_int128_wraps() {
    compile(
        r#"
#include <stdint.h>
_Static_assert((uint128_t)-1 == UINT128_MAX);
_Static_assert((int128_t)UINT128_MAX == -1);
_Static_assert(UINT128_MAX + 1 == 0);
_Static_assert(-INT128_MIN == INT128_MIN);
_Static_assert((UINT128_MAX >> 127) == 1);
_Static_assert(((uint128_t)1 << 127) == (uint128_t)INT128_MAX + 1);
"#,
    );
}

#[test]
fn test_arithmetic() {
    compile(
        r#"
_Static_assert(1 + 2 * 3 == 7);
_Static_assert(-7 / 2 == -3);
_Static_assert(-7 % 2 == -1);
_Static_assert(0u - 1 == 4294967295u);
_Static_assert((1 ? 2 : 3) == 2);
_Static_assert(!0 && (0 || 5));
_Static_assert(-1 < 0u == 0);
_Static_assert(-1L < 0u);
_Static_assert((0x0f & 0x3c) == 0x0c && (0x0f | 0x30) == 0x3f && (0x0f ^ 0xff) == 0xf0);
_Static_assert(~0 == -1);
_Static_assert(sizeof(char) == 1 && sizeof(long) == 8 && sizeof(__int128) == 16);
_Static_assert(_Alignof(long long) == 8);
"#,
    );
}

#[test]
fn test_static_assert_failure() {
    let ec = assert_compile_error("_Static_assert(1 == 2, \"oops\");");
    assert_eq!(
        ec.get_first_error(),
        Some(&CompileError::StaticAssertionFailed {
            expression: "1 == 2".to_string(),
            message: Some("oops".to_string()),
        })
    );
}

#[test]
fn test_every_assertion_reported() {
    let ec = assert_compile_error("_Static_assert(0);\n_Static_assert(1);\n_Static_assert(0);\n");
    assert_eq!(ec.get_error_count(), 2);
}

#[test]
fn test_division_by_zero() {
    let ec = assert_compile_error("_Static_assert(1 / 0);");
    assert_eq!(ec.get_first_error(), Some(&CompileError::DivisionByZero));
    // the unevaluated branch may divide by zero
    compile("_Static_assert(1 ? 1 : 1 / 0);");
}

#[test]
fn test_shift_out_of_range() {
    let ec = assert_compile_error("_Static_assert(1 << 32);");
    assert_eq!(
        ec.get_first_error(),
        Some(&CompileError::ShiftOutOfRange("int".to_string()))
    );
    assert_compile_error("_Static_assert(1 >> -1);");
}

#[test]
fn test_signed_overflow_warns() {
    let (_, ec) = compile("_Static_assert(2147483647 + 1 < 0);");
    assert_eq!(
        ec.get_first_warning(),
        Some(&CompileWarning::IntegerOverflow(
            "-2147483648".to_string(),
            "int".to_string()
        ))
    );
}

#[test]
fn test_variables_in_constant_expressions() {
    let ec = assert_compile_error("int x; _Static_assert(x == 0);");
    assert_eq!(
        ec.get_first_error(),
        Some(&CompileError::VariablesForbidden("x".to_string()))
    );
    compile("long x; _Static_assert(sizeof x == 8);");
    compile("constexpr int n = 5; _Static_assert(n * 2 == 10);");
}

#[test]
fn test_unknown_identifier() {
    let ec = assert_compile_error("_Static_assert(foo);");
    assert_eq!(
        ec.get_first_error(),
        Some(&CompileError::UnknownIdentifier("foo".to_string()))
    );
}

#[test]
fn test_int128_on_32bit_target() {
    let (tu, ec) = translate_with(
        "#include <stdint.h>\n_Static_assert(sizeof(int128_t) == 16);\n",
        "i386-linux",
        c23(),
    );
    assert!(tu.is_err());
    assert!(ec.has_errors());

    let (tu, _) = translate_with("_Static_assert(sizeof(long long) == 8);", "i386-linux", c23());
    assert!(tu.is_ok());
}

#[test]
fn test_string_literal_size() {
    compile("_Static_assert(sizeof(\"abc\") == 4);");
    compile("_Static_assert(sizeof \"a\" \"bc\" == 4);");
    compile("_Static_assert(sizeof(u8\"\\u0444\") == 3);");
    compile("_Static_assert(sizeof(u\"ab\") == 6);");
    compile("_Static_assert(sizeof(U\"a\") == 8);");
    compile("_Static_assert(sizeof(L\"a\" \"b\") == 12);");
    compile("#define S(x) #x\n_Static_assert(sizeof(S(hello)) == 6);");

    let ec = assert_compile_error("_Static_assert(\"abc\");");
    assert_eq!(ec.get_first_error(), Some(&CompileError::NonConstInConstExpr));
}

#[test]
fn test_wide_string_on_windows() {
    let (tu, ec) = translate_with("_Static_assert(sizeof(L\"ab\") == 6);", "x86_64-pc-windows-msvc", c23());
    assert_eq!(ec.get_first_error(), None);
    assert!(tu.is_ok());
}
