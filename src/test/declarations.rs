use pretty_assertions::assert_eq;

use crate::ctype::{self, CType, IntKind, QualifiedType, Qualifiers};
use crate::error::{CompileError, CompileWarning};
use crate::name_scope::{GlobalStorageClass, Value};

use super::util::*;

fn var_type(code: &str, name: &str) -> (QualifiedType, GlobalStorageClass) {
    let (tu, _) = compile(code);
    match tu.scope.lookup(name) {
        Some(Value::StaticVar(t, sc, _)) => (t.clone(), *sc),
        other => panic!("{} is not a variable: {:?}", name, other),
    }
}

#[test]
fn test_global_vars() {
    let (t, sc) = var_type("long long unsigned int x;", "x");
    assert_eq!(t.t, ctype::ULLONG_TYPE);
    assert_eq!(sc, GlobalStorageClass::Default);

    let (t, sc) = var_type("static const char x;", "x");
    assert_eq!(t.t, ctype::SCHAR_TYPE);
    assert_eq!(t.qualifiers, Qualifiers::CONST);
    assert_eq!(sc, GlobalStorageClass::Static);

    let (t, _) = var_type("signed int x, * const volatile y;", "y");
    assert_eq!(t.qualifiers, Qualifiers::CONST | Qualifiers::VOLATILE);
    assert_eq!(t.t, CType::Pointer(Box::new(QualifiedType::new(ctype::INT_TYPE))));
}

#[test]
fn test_int128_types() {
    let (t, _) = var_type("unsigned __int128 x;", "x");
    assert_eq!(t.t, ctype::UINT128_TYPE);
    let (t, _) = var_type("__int128_t x;", "x");
    assert_eq!(t.t, ctype::INT128_TYPE);
    let (t, _) = var_type("#include <stdint.h>\nuint_least128_t x;", "x");
    assert_eq!(t.t, ctype::UINT128_TYPE);

    let (tu, ec) = translate_with("__int128 x;", "i386-linux", c23());
    assert!(tu.is_err());
    assert_eq!(ec.get_first_error(), Some(&CompileError::Int128Unsupported));
}

#[test]
fn test_bit_int_types() {
    let (t, _) = var_type("unsigned _BitInt(1) x;", "x");
    assert_eq!(t.t, CType::Int(IntKind::BitInt(1), false));
    let (t, _) = var_type("_BitInt(129) x;", "x");
    assert_eq!(t.t, CType::Int(IntKind::BitInt(129), true));

    let ec = assert_compile_error("_BitInt(1) x;");
    assert_eq!(
        ec.get_first_error(),
        Some(&CompileError::BadBitIntWidth("1".to_string(), true))
    );
    compile("_Static_assert(sizeof(_BitInt(65)) == 16 && sizeof(_BitInt(8)) == 1);");
}

#[test]
fn test_arrays() {
    let (t, _) = var_type("char s[] = \"abc\";", "s");
    assert_eq!(
        t.t,
        CType::Array(Box::new(QualifiedType::new(ctype::SCHAR_TYPE)), Some(4))
    );
    let (t, _) = var_type("int a[] = {1, 2, 3};", "a");
    assert_eq!(t.t, CType::Array(Box::new(QualifiedType::new(ctype::INT_TYPE)), Some(3)));

    let ec = assert_compile_error("char s[2] = \"abc\";");
    assert_eq!(ec.get_first_error(), Some(&CompileError::ExcessInitializers));
    assert_compile_error("int a[0];");

    let (t, _) = var_type("unsigned short s[] = u\"\\U0001F34C\";", "s");
    assert_eq!(t.t, CType::Array(Box::new(QualifiedType::new(ctype::USHORT_TYPE)), Some(3)));
    let ec = assert_compile_error("int a[] = \"abc\";");
    assert_eq!(
        ec.get_first_error(),
        Some(&CompileError::Unimplemented("array initializer".to_string()))
    );
    compile("int a[3]; _Static_assert(sizeof a == 12);");
}

#[test]
fn test_array_too_large() {
    let ec = assert_compile_error("_Static_assert(sizeof(int[2][4611686018427387904]));");
    assert_eq!(ec.get_first_error(), Some(&CompileError::ArrayTooLarge));
    let ec = assert_compile_error("_Static_assert(sizeof(char[18446744073709551615]));");
    assert_eq!(ec.get_first_error(), Some(&CompileError::ArrayTooLarge));
    let ec = assert_compile_error("long a[1152921504606846976];");
    assert_eq!(ec.get_first_error(), Some(&CompileError::ArrayTooLarge));

    compile("_Static_assert(sizeof(char[9223372036854775807]) == 9223372036854775807);");
    let (tu, ec) = translate_with("char a[32768];", "avr-none", c23());
    assert!(tu.is_err());
    assert_eq!(ec.get_first_error(), Some(&CompileError::ArrayTooLarge));
}

#[test]
fn test_typedefs() {
    compile("typedef unsigned long size_t; typedef unsigned long size_t; size_t n;");
    let ec = assert_compile_error("typedef int T; typedef long T;");
    assert_eq!(
        ec.get_first_error(),
        Some(&CompileError::TypeRedefinition("T".to_string()))
    );
    let ec = assert_compile_error("typedef int T = 5;");
    assert_eq!(ec.get_first_error(), Some(&CompileError::TypedefInitialized));
}

#[test]
fn test_redeclarations() {
    compile("extern int x; int x = 5; extern int x;");
    let ec = assert_compile_error("int x = 1; int x = 2;");
    assert_eq!(
        ec.get_first_error(),
        Some(&CompileError::VarRedefinition("x".to_string()))
    );
    let ec = assert_compile_error("int x; long x;");
    assert_eq!(
        ec.get_first_error(),
        Some(&CompileError::ConflictingTypes("x".to_string()))
    );
    assert_compile_error("int x; static int x;");

    let (_, ec) = compile("extern int y = 1;");
    assert_eq!(
        ec.get_first_warning(),
        Some(&CompileWarning::ExternVarInitialized("y".to_string()))
    );
}

#[test]
fn test_storage_classes() {
    assert_compile_error("auto int x;");
    assert_compile_error("register int x;");
    let ec = assert_compile_error("static extern int x;");
    assert_eq!(ec.get_first_error(), Some(&CompileError::MultipleStorageClasses));
    assert_compile_error("inline int x;");
}

#[test]
fn test_enums() {
    compile(
        r#"
enum color { RED, GREEN = 5, BLUE };
_Static_assert(RED == 0 && GREEN == 5 && BLUE == 6);
_Static_assert(_Generic(RED, int: 1, default: 0));
_Static_assert(_Generic((enum color)0, unsigned int: 1, default: 0));
enum big { HUGE = 0x100000000 };
_Static_assert(_Generic(HUGE, long: 1, default: 0));
enum small : unsigned char { S0, S1 };
_Static_assert(sizeof(enum small) == 1);
"#,
    );
    let ec = assert_compile_error("enum e : signed char { A = 200 };");
    assert_eq!(
        ec.get_first_error(),
        Some(&CompileError::EnumValueOutOfRange("A".to_string()))
    );
    let ec = assert_compile_error("enum e { A = 340282366920938463463374607431768211455uwb, B };");
    assert_eq!(
        ec.get_first_error(),
        Some(&CompileError::EnumValueOutOfRange("B".to_string()))
    );
    let ec = assert_compile_error("enum e : _BitInt(8) { A };");
    assert_eq!(ec.get_first_error(), Some(&CompileError::IntegerTypeRequired));
    assert_compile_error("enum e { A }; enum e { B };");
    assert_compile_error("enum e { A, A };");
}

#[test]
fn test_constexpr() {
    compile(
        r#"
constexpr unsigned __int128 big = 340282366920938463463374607431768211455uwb;
_Static_assert(big + 1 == 0);
static constexpr long n = 10;
_Static_assert(n * n == 100);
"#,
    );
    let ec = assert_compile_error("constexpr int x;");
    assert_eq!(
        ec.get_first_error(),
        Some(&CompileError::ConstexprNotInitialized("x".to_string()))
    );
    let ec = assert_compile_error("constexpr unsigned char c = 256;");
    assert_eq!(
        ec.get_first_error(),
        Some(&CompileError::ConstexprValueChanged("c".to_string()))
    );
    assert_compile_error("extern constexpr int x = 1;");
}

#[test]
fn test_empty_declaration() {
    let (_, ec) = compile("int;");
    assert_eq!(ec.get_first_warning(), Some(&CompileWarning::EmptyDeclaration));
}

#[test]
fn test_unimplemented_constructs() {
    let ec = assert_compile_error("float f;");
    assert_eq!(
        ec.get_first_error(),
        Some(&CompileError::Unimplemented("floating point types".to_string()))
    );
}
