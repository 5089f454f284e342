use std::{iter::Peekable, str::Chars};

#[derive(Debug, PartialEq)]
pub enum StringParseError {
    UnexpectedEOL,
    Empty,
    BadChar(char),
    BadEscape(char),
    BadDigit(char),
    BadCode(u32),
    BadPrefix(String),
}

impl std::fmt::Display for StringParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StringParseError::UnexpectedEOL => f.write_str("unexpected end of literal"),
            StringParseError::Empty => f.write_str("empty character constant"),
            StringParseError::BadChar(c) => write!(f, "character `{}' does not fit the literal type", c),
            StringParseError::BadEscape(c) => write!(f, "unknown escape sequence `\\{}'", c),
            StringParseError::BadDigit(c) => write!(f, "bad digit `{}' in escape sequence", c),
            StringParseError::BadCode(c) => write!(f, "invalid code point 0x{:x}", c),
            StringParseError::BadPrefix(p) => write!(f, "unknown literal prefix `{}'", p),
        }
    }
}

/**
 * Encoding prefix of a character constant or string literal.
 */
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CharPrefix {
    None,
    Utf8,
    Char16,
    Char32,
    Wide,
}

#[derive(Clone, Copy)]
enum CharType {
    Default,
    Char16T,
    Char32T,
    Any,
}

#[derive(Debug, PartialEq)]
pub struct CharLiteral {
    pub prefix: CharPrefix,
    pub chars: Vec<u32>,
}

fn parse_single_char(
    it: &mut Peekable<Chars>,
    char_type: CharType,
    quote: char,
) -> Result<u32, StringParseError> {
    enum State {
        Start,
        Escape,
        Code { remaining: u8, value: u32, base: u32, exact: bool, seen: bool },
    }
    let mut state = State::Start;
    loop {
        state = match state {
            State::Start => match it.peek() {
                None => return Err(StringParseError::UnexpectedEOL),
                Some(c) if *c == quote => return Err(StringParseError::UnexpectedEOL),
                Some('\\') => {
                    it.next();
                    State::Escape
                }
                Some(c) => {
                    let result = check_char(*c as u32, char_type)?;
                    it.next();
                    return Ok(result);
                }
            },
            State::Escape => match it.peek() {
                None => return Err(StringParseError::UnexpectedEOL),
                Some(&c) => {
                    let simple = match c {
                        '\'' | '"' | '\\' | '?' => Some(c as u32),
                        'a' => Some(7),
                        'b' => Some(8),
                        'f' => Some(0xc),
                        'n' => Some(0xa),
                        'r' => Some(0xd),
                        't' => Some(9),
                        'v' => Some(0xb),
                        'e' => Some(0x1b),
                        _ => None,
                    };
                    if let Some(code) = simple {
                        it.next();
                        return check_char(code, char_type);
                    }
                    match c {
                        'x' => {
                            it.next();
                            State::Code { remaining: u8::MAX, value: 0, base: 16, exact: false, seen: false }
                        }
                        'u' => {
                            it.next();
                            State::Code { remaining: 4, value: 0, base: 16, exact: true, seen: false }
                        }
                        'U' => {
                            it.next();
                            State::Code { remaining: 8, value: 0, base: 16, exact: true, seen: false }
                        }
                        '0'..='7' => State::Code { remaining: 3, value: 0, base: 8, exact: false, seen: false },
                        _ => return Err(StringParseError::BadEscape(c)),
                    }
                }
            },
            State::Code { remaining: 0, value, exact: false, .. } => return check_code(value, char_type),
            State::Code { remaining: 0, value, .. } => return check_char(value, char_type),
            State::Code { remaining, value, base, exact, seen } => match it.peek() {
                Some(c) if c.is_digit(base) => {
                    let d = c.to_digit(base).unwrap_or(0);
                    it.next();
                    let value = value
                        .checked_mul(base)
                        .and_then(|v| v.checked_add(d))
                        .ok_or(StringParseError::BadCode(value))?;
                    State::Code { remaining: remaining - 1, value, base, exact, seen: true }
                }
                // \x and octal escapes end at the first non-digit
                _ if seen && !exact => return check_code(value, char_type),
                None => return Err(StringParseError::UnexpectedEOL),
                Some(c) if *c == quote => return Err(StringParseError::UnexpectedEOL),
                Some(c) => return Err(StringParseError::BadDigit(*c)),
            },
        }
    }
}

fn check_code(value: u32, char_type: CharType) -> Result<u32, StringParseError> {
    match char_type {
        // numeric escapes give the code unit directly
        CharType::Default if value <= 0xff => Ok(value),
        CharType::Char16T if value <= 0xffff => Ok(value),
        CharType::Char32T | CharType::Any => Ok(value),
        _ => Err(StringParseError::BadCode(value)),
    }
}

fn check_char(code: u32, char_type: CharType) -> Result<u32, StringParseError> {
    let c = char::from_u32(code).ok_or(StringParseError::BadCode(code))?;
    match char_type {
        CharType::Default if code < 128 => Ok(code),
        CharType::Char16T if is_utf16_single(c) => Ok(code),
        CharType::Char32T | CharType::Any => Ok(code),
        _ => Err(StringParseError::BadChar(c)),
    }
}

fn is_utf16_single(c: char) -> bool {
    let code = c as u32;
    code <= 0xd7ff || (0xe000..=0xffff).contains(&code)
}

fn split_prefix(text: &str, quote: char) -> Result<(CharPrefix, &str), StringParseError> {
    let q = match text.find(quote) {
        Some(q) => q,
        None => return Err(StringParseError::UnexpectedEOL),
    };
    let prefix = match &text[..q] {
        "" => CharPrefix::None,
        "u8" => CharPrefix::Utf8,
        "u" => CharPrefix::Char16,
        "U" => CharPrefix::Char32,
        "L" => CharPrefix::Wide,
        p => return Err(StringParseError::BadPrefix(p.to_string())),
    };
    Ok((prefix, &text[q + 1..]))
}

/**
 * Decode a character constant token such as `'a'`, `u'ሴ'` or `L'\0'`.
 */
pub fn parse_char_literal(text: &str) -> Result<CharLiteral, StringParseError> {
    let (prefix, body) = split_prefix(text, '\'')?;
    let char_type = match prefix {
        CharPrefix::None | CharPrefix::Utf8 => CharType::Default,
        CharPrefix::Char16 => CharType::Char16T,
        CharPrefix::Char32 | CharPrefix::Wide => CharType::Char32T,
    };
    let mut it = body.chars().peekable();
    let mut chars = Vec::new();
    while it.peek() != Some(&'\'') {
        chars.push(parse_single_char(&mut it, char_type, '\'')?);
    }
    if chars.is_empty() {
        return Err(StringParseError::Empty);
    }
    Ok(CharLiteral { prefix, chars })
}

/**
 * Decode a string literal token into text. Used for static assertion messages and `#include`.
 */
pub fn parse_string_literal(text: &str) -> Result<String, StringParseError> {
    let (_, body) = split_prefix(text, '"')?;
    let mut it = body.chars().peekable();
    let mut result = String::new();
    while it.peek() != Some(&'"') {
        let code = parse_single_char(&mut it, CharType::Any, '"')?;
        result.push(char::from_u32(code).unwrap_or(char::REPLACEMENT_CHARACTER));
    }
    Ok(result)
}

/**
 * Encoding prefix of a string literal token.
 */
pub fn string_prefix(text: &str) -> Result<CharPrefix, StringParseError> {
    split_prefix(text, '"').map(|(prefix, _)| prefix)
}

fn is_numeric_escape(it: &Peekable<Chars>) -> bool {
    let mut look = it.clone();
    look.next() == Some('\\') && matches!(look.next(), Some('x' | '0'..='7'))
}

/**
 * Decode a string literal token into the code units of an array with the element type
 * `prefix` selects, without the terminating zero. `wide16` is set on targets with a 16-bit
 * `wchar_t`. Numeric escapes give a code unit each.
 */
pub fn encode_string_literal(
    text: &str,
    prefix: CharPrefix,
    wide16: bool,
) -> Result<Vec<u32>, StringParseError> {
    let (_, body) = split_prefix(text, '"')?;
    let mut it = body.chars().peekable();
    let mut units = Vec::new();
    while it.peek() != Some(&'"') {
        let numeric = is_numeric_escape(&it);
        let code = parse_single_char(&mut it, CharType::Any, '"')?;
        if numeric {
            units.push(code);
            continue;
        }
        let c = char::from_u32(code).ok_or(StringParseError::BadCode(code))?;
        match prefix {
            CharPrefix::None | CharPrefix::Utf8 => {
                let mut buf = [0u8; 4];
                units.extend(c.encode_utf8(&mut buf).bytes().map(u32::from));
            }
            CharPrefix::Wide if !wide16 => units.push(code),
            CharPrefix::Char32 => units.push(code),
            CharPrefix::Char16 | CharPrefix::Wide => {
                let mut buf = [0u16; 2];
                units.extend(c.encode_utf16(&mut buf).iter().map(|u| u32::from(*u)));
            }
        }
    }
    Ok(units)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_utf16() {
        assert!(is_utf16_single('b'));
        assert!(is_utf16_single('ф'));
        assert!(is_utf16_single('貓'));
        assert!(!is_utf16_single('🍌'));
    }

    #[test]
    fn test_char_1() {
        let s = "h'";
        let mut iter = s.chars().peekable();
        let r = parse_single_char(&mut iter, CharType::Default, '\'').unwrap();
        assert_eq!(r, 'h' as u32);
        assert_eq!(*iter.peek().unwrap(), '\'');
    }

    #[test]
    fn test_char_2() {
        let s = "🍌'";
        let mut iter = s.chars().peekable();
        let r = parse_single_char(&mut iter, CharType::Char16T, '\'');
        assert_eq!(r, Err(StringParseError::BadChar('🍌')));
        assert_eq!(*iter.peek().unwrap(), '🍌');
    }

    #[test]
    fn test_short_escapes() {
        let s = "\\0'";
        let mut iter = s.chars().peekable();
        assert_eq!(parse_single_char(&mut iter, CharType::Default, '\'').unwrap(), 0);
        assert_eq!(*iter.peek().unwrap(), '\'');

        let s = "\\xff'";
        let mut iter = s.chars().peekable();
        assert_eq!(parse_single_char(&mut iter, CharType::Default, '\'').unwrap(), 0xff);
    }

    #[test]
    fn test_char_literals() {
        assert_eq!(
            parse_char_literal("'a'").unwrap(),
            CharLiteral {
                prefix: CharPrefix::None,
                chars: vec!['a' as u32]
            }
        );
        assert_eq!(
            parse_char_literal("U'\\U0001f34c'").unwrap().chars,
            vec![0x1f34c]
        );
        assert_eq!(parse_char_literal("u'\\u1234'").unwrap().prefix, CharPrefix::Char16);
        assert_eq!(parse_char_literal("'ab'").unwrap().chars.len(), 2);
        assert_eq!(parse_char_literal("''"), Err(StringParseError::Empty));
        assert_eq!(
            parse_char_literal("x'a'"),
            Err(StringParseError::BadPrefix("x".to_string()))
        );
        assert_eq!(parse_char_literal("'\\q'"), Err(StringParseError::BadEscape('q')));
    }

    #[test]
    fn test_string_units() {
        assert_eq!(string_prefix("u\"x\"").unwrap(), CharPrefix::Char16);
        assert_eq!(
            encode_string_literal("\"a\\xff\\0\"", CharPrefix::None, false).unwrap(),
            vec!['a' as u32, 0xff, 0]
        );
        assert_eq!(
            encode_string_literal("\"ф\"", CharPrefix::None, false).unwrap().len(),
            2
        );
        assert_eq!(
            encode_string_literal("u\"🍌\"", CharPrefix::Char16, false).unwrap(),
            vec![0xd83c, 0xdf4c]
        );
        assert_eq!(
            encode_string_literal("L\"🍌\"", CharPrefix::Wide, false).unwrap(),
            vec![0x1f34c]
        );
        assert_eq!(
            encode_string_literal("L\"🍌\"", CharPrefix::Wide, true).unwrap().len(),
            2
        );
    }

    #[test]
    fn test_string_literal() {
        assert_eq!(parse_string_literal("\"a\\tb\"").unwrap(), "a\tb");
        assert_eq!(parse_string_literal("u8\"ф\"").unwrap(), "ф");
    }
}
