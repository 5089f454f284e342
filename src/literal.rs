use num::BigUint;
use num_traits::Zero;
use std::fmt::Formatter;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntegerBase {
    Decimal,
    Octal,
    Hexadecimal,
    Binary,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntegerSize {
    Int,
    Long,
    LongLong,
    BitPrecise,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntegerSuffix {
    pub size: IntegerSize,
    pub unsigned: bool,
}

/**
 * An integer constant as written in the source, with its exact value.
 */
#[derive(Debug, Clone, PartialEq)]
pub struct IntegerLiteral {
    pub base: IntegerBase,
    pub value: BigUint,
    pub suffix: IntegerSuffix,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LiteralError {
    MissingDigits,
    InvalidDigit(char, IntegerBase),
    InvalidSuffix(String),
    MisplacedSeparator,
    SeparatorNotAllowed,
    Floating,
}

impl IntegerBase {
    pub fn radix(&self) -> u32 {
        match self {
            IntegerBase::Decimal => 10,
            IntegerBase::Octal => 8,
            IntegerBase::Hexadecimal => 16,
            IntegerBase::Binary => 2,
        }
    }
}

impl IntegerLiteral {
    pub fn is_decimal(&self) -> bool {
        self.base == IntegerBase::Decimal
    }
}

impl std::fmt::Display for IntegerBase {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), std::fmt::Error> {
        match self {
            IntegerBase::Decimal => f.write_str("decimal"),
            IntegerBase::Octal => f.write_str("octal"),
            IntegerBase::Hexadecimal => f.write_str("hexadecimal"),
            IntegerBase::Binary => f.write_str("binary"),
        }
    }
}

impl std::fmt::Display for LiteralError {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), std::fmt::Error> {
        match self {
            LiteralError::MissingDigits => f.write_str("integer literal has no digits"),
            LiteralError::InvalidDigit(c, base) => {
                write!(f, "invalid digit '{}' in {} constant", c, base)
            }
            LiteralError::InvalidSuffix(s) => {
                write!(f, "invalid suffix '{}' on integer constant", s)
            }
            LiteralError::MisplacedSeparator => f.write_str("digit separator must be placed between digits"),
            LiteralError::SeparatorNotAllowed => {
                f.write_str("digit separators are only allowed in C23")
            }
            LiteralError::Floating => f.write_str("floating constants are not supported"),
        }
    }
}

/**
 * Parse a suffix per 6.4.4.1. The unsigned suffix may come on either side of the size suffix;
 * the size suffixes must not mix case (`lL`, `wB` are rejected).
 */
pub fn parse_suffix(s: &str) -> Option<IntegerSuffix> {
    fn size_suffix(s: &str) -> Option<IntegerSize> {
        match s {
            "" => Some(IntegerSize::Int),
            "l" | "L" => Some(IntegerSize::Long),
            "ll" | "LL" => Some(IntegerSize::LongLong),
            "wb" | "WB" => Some(IntegerSize::BitPrecise),
            _ => None,
        }
    }
    if let Some(rest) = s.strip_prefix(&['u', 'U'][..]) {
        return size_suffix(rest).map(|size| IntegerSuffix {
            size,
            unsigned: true,
        });
    }
    if let Some(rest) = s.strip_suffix(&['u', 'U'][..]) {
        return size_suffix(rest).map(|size| IntegerSuffix {
            size,
            unsigned: true,
        });
    }
    size_suffix(s).map(|size| IntegerSuffix {
        size,
        unsigned: false,
    })
}

/**
 * Parse a pp-number as an integer constant. The value keeps every digit, no matter how wide.
 *
 * `allow_separators` enables C23 digit separators (`1'000'000`).
 */
pub fn parse_integer_literal(text: &str, allow_separators: bool) -> Result<IntegerLiteral, LiteralError> {
    let lower = text.to_ascii_lowercase();
    let (base, body) = if lower.starts_with("0x") {
        (IntegerBase::Hexadecimal, &text[2..])
    } else if lower.starts_with("0b") {
        (IntegerBase::Binary, &text[2..])
    } else if text.starts_with('0') && text.len() > 1 {
        (IntegerBase::Octal, &text[1..])
    } else {
        (IntegerBase::Decimal, text)
    };

    if base != IntegerBase::Hexadecimal && (text.contains('.') || has_exponent(body, 'e')) {
        return Err(LiteralError::Floating);
    }
    if base == IntegerBase::Hexadecimal && (text.contains('.') || has_exponent(body, 'p')) {
        return Err(LiteralError::Floating);
    }

    let radix = base.radix();
    let mut digits = String::new();
    let mut last_was_digit = false;
    let mut end = body.len();
    for (i, c) in body.char_indices() {
        if c == '\'' {
            if !allow_separators {
                return Err(LiteralError::SeparatorNotAllowed);
            }
            let next_is_digit = body[i + 1..]
                .chars()
                .next()
                .map_or(false, |n| n.is_digit(radix));
            if !last_was_digit || !next_is_digit {
                return Err(LiteralError::MisplacedSeparator);
            }
            last_was_digit = false;
            continue;
        }
        if c.is_digit(radix) {
            digits.push(c);
            last_was_digit = true;
        } else if c.is_ascii_digit() && base == IntegerBase::Octal {
            return Err(LiteralError::InvalidDigit(c, base));
        } else if c.is_ascii_digit() && base == IntegerBase::Binary {
            return Err(LiteralError::InvalidDigit(c, base));
        } else {
            end = i;
            break;
        }
    }

    let suffix_text = &body[end..];
    let suffix = match parse_suffix(suffix_text) {
        Some(s) => s,
        None => return Err(LiteralError::InvalidSuffix(suffix_text.to_string())),
    };

    let value = if digits.is_empty() {
        if base == IntegerBase::Octal || (base == IntegerBase::Decimal && text.starts_with('0')) {
            BigUint::zero()
        } else {
            return Err(LiteralError::MissingDigits);
        }
    } else {
        match BigUint::parse_bytes(digits.as_bytes(), radix) {
            Some(v) => v,
            None => return Err(LiteralError::MissingDigits),
        }
    };

    Ok(IntegerLiteral {
        base,
        value,
        suffix,
    })
}

fn has_exponent(body: &str, marker: char) -> bool {
    let b = body.as_bytes();
    b.iter().enumerate().any(|(i, c)| {
        c.to_ascii_lowercase() == marker as u8
            && i + 1 < b.len()
            && (b[i + 1] == b'+' || b[i + 1] == b'-' || b[i + 1].is_ascii_digit())
            && i > 0
            && b[i - 1].is_ascii_digit()
    })
}

#[cfg(test)]
mod test {
    use super::*;
    use num_traits::Num;

    fn suffix(size: IntegerSize, unsigned: bool) -> IntegerSuffix {
        IntegerSuffix { size, unsigned }
    }

    #[test]
    fn test_suffixes() {
        assert_eq!(parse_suffix(""), Some(suffix(IntegerSize::Int, false)));
        assert_eq!(parse_suffix("u"), Some(suffix(IntegerSize::Int, true)));
        assert_eq!(parse_suffix("LLU"), Some(suffix(IntegerSize::LongLong, true)));
        assert_eq!(parse_suffix("uLL"), Some(suffix(IntegerSize::LongLong, true)));
        assert_eq!(parse_suffix("lu"), Some(suffix(IntegerSize::Long, true)));
        assert_eq!(parse_suffix("wb"), Some(suffix(IntegerSize::BitPrecise, false)));
        assert_eq!(parse_suffix("WB"), Some(suffix(IntegerSize::BitPrecise, false)));
        assert_eq!(parse_suffix("WBU"), Some(suffix(IntegerSize::BitPrecise, true)));
        assert_eq!(parse_suffix("uwb"), Some(suffix(IntegerSize::BitPrecise, true)));
        assert_eq!(parse_suffix("Uwb"), Some(suffix(IntegerSize::BitPrecise, true)));
        assert_eq!(parse_suffix("wbU"), Some(suffix(IntegerSize::BitPrecise, true)));
        assert_eq!(parse_suffix("lL"), None);
        assert_eq!(parse_suffix("wB"), None);
        assert_eq!(parse_suffix("uu"), None);
        assert_eq!(parse_suffix("ulu"), None);
        assert_eq!(parse_suffix("lwb"), None);
    }

    #[test]
    fn test_bases() {
        let l = parse_integer_literal("0x1F", false).unwrap();
        assert_eq!(l.base, IntegerBase::Hexadecimal);
        assert_eq!(l.value, BigUint::from(31u32));
        let l = parse_integer_literal("017", false).unwrap();
        assert_eq!(l.base, IntegerBase::Octal);
        assert_eq!(l.value, BigUint::from(15u32));
        let l = parse_integer_literal("0b101u", false).unwrap();
        assert_eq!(l.base, IntegerBase::Binary);
        assert_eq!(l.value, BigUint::from(5u32));
        assert!(l.suffix.unsigned);
        let l = parse_integer_literal("0", false).unwrap();
        assert!(l.value.is_zero());
        let l = parse_integer_literal("0u", false).unwrap();
        assert!(l.value.is_zero());
    }

    #[test]
    fn test_128bit_exact() {
        let text = "340282366920938463463374607431768211455";
        let l = parse_integer_literal(&format!("{}WBU", text), false).unwrap();
        assert_eq!(l.value, BigUint::from(u128::MAX));
        assert_eq!(l.value.to_string(), text);
        assert_eq!(l.suffix, suffix(IntegerSize::BitPrecise, true));

        let l = parse_integer_literal("170141183460469231731687303715884105728wb", false).unwrap();
        assert_eq!(l.value, BigUint::from(1u8) << 127);
    }

    #[test]
    fn test_wider_than_128() {
        let text = "1000000000000000000000000000000000000000000000000000";
        let l = parse_integer_literal(text, false).unwrap();
        assert_eq!(l.value, BigUint::from_str_radix(text, 10).unwrap());
    }

    #[test]
    fn test_separators() {
        let l = parse_integer_literal("1'000'000", true).unwrap();
        assert_eq!(l.value, BigUint::from(1_000_000u32));
        let l = parse_integer_literal("0xFF'FFu", true).unwrap();
        assert_eq!(l.value, BigUint::from(0xffffu32));
        assert_eq!(
            parse_integer_literal("1'000", false),
            Err(LiteralError::SeparatorNotAllowed)
        );
        assert_eq!(
            parse_integer_literal("1''0", true),
            Err(LiteralError::MisplacedSeparator)
        );
        assert_eq!(
            parse_integer_literal("10'u", true),
            Err(LiteralError::MisplacedSeparator)
        );
    }

    #[test]
    fn test_errors() {
        assert_eq!(
            parse_integer_literal("09", false),
            Err(LiteralError::InvalidDigit('9', IntegerBase::Octal))
        );
        assert_eq!(
            parse_integer_literal("0b102", false),
            Err(LiteralError::InvalidDigit('2', IntegerBase::Binary))
        );
        assert_eq!(parse_integer_literal("0x", false), Err(LiteralError::MissingDigits));
        assert_eq!(
            parse_integer_literal("12xyz", false),
            Err(LiteralError::InvalidSuffix("xyz".to_string()))
        );
        assert_eq!(parse_integer_literal("1.5", false), Err(LiteralError::Floating));
        assert_eq!(parse_integer_literal("1e10", false), Err(LiteralError::Floating));
        assert_eq!(parse_integer_literal("0x1p3", false), Err(LiteralError::Floating));
    }
}
