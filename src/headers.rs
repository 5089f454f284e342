use std::collections::HashMap;
use std::fmt::Write;

lazy_static! {
    /**
     * Freestanding headers shipped with the compiler. They only rely on predefined macros,
     * so the same text serves every target.
     */
    static ref BUILTIN_HEADERS: HashMap<&'static str, String> = {
        let mut m = HashMap::new();
        m.insert("stdint.h", stdint_h());
        m.insert("stddef.h", STDDEF_H.to_string());
        m.insert("limits.h", LIMITS_H.to_string());
        m.insert("stdbool.h", STDBOOL_H.to_string());
        m
    };
}

pub fn get_builtin_header(name: &str) -> Option<&'static str> {
    BUILTIN_HEADERS.get(name).map(|s| s.as_str())
}

const STDDEF_H: &str = r#"#ifndef __EXTINT_STDDEF_H
#define __EXTINT_STDDEF_H
typedef __SIZE_TYPE__ size_t;
typedef __PTRDIFF_TYPE__ ptrdiff_t;
typedef __WCHAR_TYPE__ wchar_t;
#define NULL ((void *)0)
#endif
"#;

const STDBOOL_H: &str = r#"#ifndef __bool_true_false_are_defined
#if __STDC_VERSION__ < 202311L
#define bool _Bool
#define true 1
#define false 0
#endif
#define __bool_true_false_are_defined 1
#endif
"#;

const LIMITS_H: &str = r#"#ifndef __EXTINT_LIMITS_H
#define __EXTINT_LIMITS_H
#define CHAR_BIT __CHAR_BIT__
#define MB_LEN_MAX 1
#define SCHAR_MAX __SCHAR_MAX__
#define SCHAR_MIN (-__SCHAR_MAX__ - 1)
#define UCHAR_MAX (__SCHAR_MAX__ * 2 + 1)
#ifdef __CHAR_UNSIGNED__
#define CHAR_MIN 0
#define CHAR_MAX UCHAR_MAX
#else
#define CHAR_MIN SCHAR_MIN
#define CHAR_MAX __SCHAR_MAX__
#endif
#define SHRT_MAX __SHRT_MAX__
#define SHRT_MIN (-__SHRT_MAX__ - 1)
#if __SHRT_WIDTH__ < __INT_WIDTH__
#define USHRT_MAX (__SHRT_MAX__ * 2 + 1)
#else
#define USHRT_MAX (__SHRT_MAX__ * 2U + 1U)
#endif
#define INT_MAX __INT_MAX__
#define INT_MIN (-__INT_MAX__ - 1)
#define UINT_MAX (__INT_MAX__ * 2U + 1U)
#define LONG_MAX __LONG_MAX__
#define LONG_MIN (-__LONG_MAX__ - 1L)
#define ULONG_MAX (__LONG_MAX__ * 2UL + 1UL)
#define LLONG_MAX __LONG_LONG_MAX__
#define LLONG_MIN (-__LONG_LONG_MAX__ - 1LL)
#define ULLONG_MAX (__LONG_LONG_MAX__ * 2ULL + 1ULL)
#if __STDC_VERSION__ >= 202311L
#define BOOL_WIDTH 1
#define CHAR_WIDTH __CHAR_BIT__
#define SCHAR_WIDTH __SCHAR_WIDTH__
#define UCHAR_WIDTH __SCHAR_WIDTH__
#define SHRT_WIDTH __SHRT_WIDTH__
#define USHRT_WIDTH __SHRT_WIDTH__
#define INT_WIDTH __INT_WIDTH__
#define UINT_WIDTH __INT_WIDTH__
#define LONG_WIDTH __LONG_WIDTH__
#define ULONG_WIDTH __LONG_WIDTH__
#define LLONG_WIDTH __LONG_LONG_WIDTH__
#define ULLONG_WIDTH __LONG_LONG_WIDTH__
#define BITINT_MAXWIDTH __BITINT_MAXWIDTH__
#endif
#endif
"#;

const INT128_SECTION: &str = r#"#ifdef __SIZEOF_INT128__
typedef __int128 int128_t;
typedef unsigned __int128 uint128_t;
typedef int128_t int_least128_t;
typedef uint128_t uint_least128_t;
typedef int128_t int_fast128_t;
typedef uint128_t uint_fast128_t;
#define INT128_WIDTH 128
#define UINT128_WIDTH 128
#define INT_LEAST128_WIDTH 128
#define UINT_LEAST128_WIDTH 128
#define INT_FAST128_WIDTH 128
#define UINT_FAST128_WIDTH 128
#define INT128_MAX ((int128_t)170141183460469231731687303715884105727WB)
#define INT128_MIN (-INT128_MAX - 1)
#define UINT128_MAX ((uint128_t)340282366920938463463374607431768211455WBU)
#define INT_LEAST128_MAX INT128_MAX
#define INT_LEAST128_MIN INT128_MIN
#define UINT_LEAST128_MAX UINT128_MAX
#define INT_FAST128_MAX INT128_MAX
#define INT_FAST128_MIN INT128_MIN
#define UINT_FAST128_MAX UINT128_MAX
#define INT128_C(c) ((int128_t)c ## WB)
#define UINT128_C(c) ((uint128_t)c ## WBU)
#define INT_LEAST128_C(c) INT128_C(c)
#define UINT_LEAST128_C(c) UINT128_C(c)
#endif
"#;

fn stdint_h() -> String {
    let mut s = String::new();
    s.push_str("#ifndef __EXTINT_STDINT_H\n#define __EXTINT_STDINT_H\n");
    s.push_str("#define __int_c_join(a, b) a ## b\n#define __int_c(a, b) __int_c_join(a, b)\n");
    for n in [8, 16, 32, 64] {
        let _ = writeln!(s, "typedef __INT{n}_TYPE__ int{n}_t;");
        let _ = writeln!(s, "typedef __UINT{n}_TYPE__ uint{n}_t;");
        for kind in ["least", "fast"] {
            let _ = writeln!(s, "typedef int{n}_t int_{kind}{n}_t;");
            let _ = writeln!(s, "typedef uint{n}_t uint_{kind}{n}_t;");
        }
        for prefix in ["", "_LEAST", "_FAST"] {
            let _ = writeln!(s, "#define INT{prefix}{n}_WIDTH {n}");
            let _ = writeln!(s, "#define UINT{prefix}{n}_WIDTH {n}");
            let _ = writeln!(s, "#define INT{prefix}{n}_MAX __INT{n}_MAX__");
            let _ = writeln!(s, "#define INT{prefix}{n}_MIN (-__INT{n}_MAX__ - 1)");
            let _ = writeln!(s, "#define UINT{prefix}{n}_MAX __UINT{n}_MAX__");
        }
        let _ = writeln!(s, "#define INT{n}_C(c) __int_c(c, __INT{n}_C_SUFFIX__)");
        let _ = writeln!(s, "#define UINT{n}_C(c) __int_c(c, __UINT{n}_C_SUFFIX__)");
    }
    s.push_str(
        r#"typedef __INTPTR_TYPE__ intptr_t;
typedef __UINTPTR_TYPE__ uintptr_t;
typedef __INTMAX_TYPE__ intmax_t;
typedef __UINTMAX_TYPE__ uintmax_t;
#define INTPTR_WIDTH __INTPTR_WIDTH__
#define UINTPTR_WIDTH __INTPTR_WIDTH__
#define INTPTR_MAX __INTPTR_MAX__
#define INTPTR_MIN (-__INTPTR_MAX__ - 1)
#define UINTPTR_MAX __UINTPTR_MAX__
#define INTMAX_WIDTH __INTMAX_WIDTH__
#define UINTMAX_WIDTH __INTMAX_WIDTH__
#define INTMAX_MAX __INTMAX_MAX__
#define INTMAX_MIN (-__INTMAX_MAX__ - 1)
#define UINTMAX_MAX __UINTMAX_MAX__
#define INTMAX_C(c) __int_c(c, __INTMAX_C_SUFFIX__)
#define UINTMAX_C(c) __int_c(c, __UINTMAX_C_SUFFIX__)
#define PTRDIFF_WIDTH __PTRDIFF_WIDTH__
#define PTRDIFF_MAX __PTRDIFF_MAX__
#define PTRDIFF_MIN (-__PTRDIFF_MAX__ - 1)
#define SIZE_WIDTH __SIZE_WIDTH__
#define SIZE_MAX __SIZE_MAX__
#define WCHAR_WIDTH __WCHAR_WIDTH__
#define WCHAR_MAX __WCHAR_MAX__
#define WCHAR_MIN __WCHAR_MIN__
"#,
    );
    s.push_str(INT128_SECTION);
    s.push_str("#endif\n");
    s
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_known_headers() {
        for name in ["stdint.h", "stddef.h", "limits.h", "stdbool.h"] {
            assert!(get_builtin_header(name).is_some(), "{}", name);
        }
        assert!(get_builtin_header("stdio.h").is_none());
    }

    #[test]
    fn test_int128_macros() {
        let h = get_builtin_header("stdint.h").unwrap();
        assert!(h.contains("#define INT128_C(c) ((int128_t)c ## WB)"));
        assert!(h.contains("#define UINT128_C(c) ((uint128_t)c ## WBU)"));
        assert!(h.contains("#define INT128_WIDTH 128"));
        assert!(h.contains("typedef __INT64_TYPE__ int64_t;"));
        assert!(h.contains("#define INT_FAST16_MIN (-__INT16_MAX__ - 1)"));
    }
}
