use std::collections::HashSet;
use std::rc::Rc;

use crate::{
    error::{CompileError, ErrorCollector},
    span::{FileId, Span},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Ident,
    Number,
    Char,
    Str,
    Punct,
    /// A stray character or an unterminated quote; only an error once it reaches the parser.
    Other,
    EndOfFile,
}

/**
 * A preprocessing token.
 *
 * `hideset` holds the names of the macros whose expansion produced the token.
 */
#[derive(Debug, Clone)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    pub span: Span,
    pub leading_space: bool,
    pub at_bol: bool,
    pub hideset: Rc<HashSet<String>>,
}

impl Token {
    pub fn new(kind: TokenKind, text: &str, span: Span) -> Self {
        Self {
            kind,
            text: text.to_string(),
            span,
            leading_space: false,
            at_bol: false,
            hideset: Rc::new(HashSet::new()),
        }
    }

    pub fn is_punct(&self, p: &str) -> bool {
        self.kind == TokenKind::Punct && self.text == p
    }

    pub fn is_ident(&self, name: &str) -> bool {
        self.kind == TokenKind::Ident && self.text == name
    }

    pub fn is_hidden(&self, name: &str) -> bool {
        self.hideset.contains(name)
    }
}

#[rustfmt::skip]
const PUNCTUATORS: &[&str] = &[
    "%:%:", "...", "<<=", ">>=",
    "->", "++", "--", "<<", ">>", "<=", ">=", "==", "!=", "&&", "||",
    "*=", "/=", "%=", "+=", "-=", "&=", "^=", "|=", "##", "::",
    "<:", ":>", "<%", "%>", "%:",
    "[", "]", "(", ")", "{", "}", ".", "&", "*", "+", "-", "~", "!",
    "/", "%", "<", ">", "^", "|", "?", ":", ";", "=", ",", "#",
];

fn canonical_punct(p: &str) -> &str {
    match p {
        "<:" => "[",
        ":>" => "]",
        "<%" => "{",
        "%>" => "}",
        "%:" => "#",
        "%:%:" => "##",
        p => p,
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_' || c == '$' || (!c.is_ascii() && c.is_alphanumeric())
}

fn is_ident_continue(c: char) -> bool {
    is_ident_start(c) || c.is_ascii_digit()
}

/**
 * Source text with backslash-newline sequences removed, remembering where each byte came from.
 */
struct Spliced {
    text: String,
    offsets: Vec<usize>,
}

impl Spliced {
    fn new(src: &str) -> Self {
        let mut text = String::with_capacity(src.len());
        let mut offsets = Vec::with_capacity(src.len() + 1);
        let bytes = src.as_bytes();
        let mut i = 0;
        while i < bytes.len() {
            if bytes[i] == b'\\' {
                let mut j = i + 1;
                if j < bytes.len() && bytes[j] == b'\r' {
                    j += 1;
                }
                if j < bytes.len() && bytes[j] == b'\n' {
                    i = j + 1;
                    continue;
                }
            }
            let len = utf8_len(bytes[i]);
            text.push_str(&src[i..i + len]);
            for k in 0..len {
                offsets.push(i + k);
            }
            i += len;
        }
        offsets.push(src.len());
        Self { text, offsets }
    }
}

fn utf8_len(first: u8) -> usize {
    match first {
        0x00..=0x7f => 1,
        0xc0..=0xdf => 2,
        0xe0..=0xef => 3,
        _ => 4,
    }
}

pub struct Lexer<'a> {
    file: FileId,
    spliced: Spliced,
    pos: usize,
    digit_separators: bool,
    ec: &'a mut ErrorCollector,
}

impl<'a> Lexer<'a> {
    pub fn new(file: FileId, src: &str, digit_separators: bool, ec: &'a mut ErrorCollector) -> Self {
        Self {
            file,
            spliced: Spliced::new(src),
            pos: 0,
            digit_separators,
            ec,
        }
    }

    fn span(&self, start: usize, end: usize) -> Span {
        Span::new(
            self.file,
            self.spliced.offsets[start],
            self.spliced.offsets[end],
        )
    }

    fn rest(&self) -> &str {
        &self.spliced.text[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn peek_at(&self, n: usize) -> Option<char> {
        self.rest().chars().nth(n)
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    /**
     * Skip whitespace and comments. Returns (skipped anything, crossed a newline).
     */
    fn skip_whitespace(&mut self) -> Result<(bool, bool), ()> {
        let mut space = false;
        let mut newline = false;
        loop {
            match self.peek() {
                Some('\n') => {
                    self.bump();
                    newline = true;
                    space = false;
                }
                Some(c) if c.is_whitespace() => {
                    self.bump();
                    space = true;
                }
                Some('/') if self.peek_at(1) == Some('/') => {
                    while !matches!(self.peek(), None | Some('\n')) {
                        self.bump();
                    }
                    space = true;
                }
                Some('/') if self.peek_at(1) == Some('*') => {
                    let start = self.pos;
                    self.pos += 2;
                    match self.rest().find("*/") {
                        Some(end) => self.pos += end + 2,
                        None => {
                            self.pos = self.spliced.text.len();
                            self.ec
                                .record_error(CompileError::UnterminatedComment, self.span(start, start + 2))?;
                        }
                    }
                    space = true;
                }
                _ => return Ok((space, newline)),
            }
        }
    }

    pub fn tokenize(mut self) -> Result<Vec<Token>, ()> {
        let mut tokens = Vec::new();
        let mut first = true;
        loop {
            let (space, newline) = self.skip_whitespace()?;
            let start = self.pos;
            let c = match self.peek() {
                Some(c) => c,
                None => break,
            };
            let kind = self.lex_token(c);
            let text = &self.spliced.text[start..self.pos];
            let mut tok = Token::new(kind, text, self.span(start, self.pos));
            if kind == TokenKind::Punct {
                tok.text = canonical_punct(text).to_string();
            }
            tok.leading_space = space;
            tok.at_bol = newline || first;
            first = false;
            tokens.push(tok);
        }
        Ok(tokens)
    }

    fn lex_token(&mut self, c: char) -> TokenKind {
        if c.is_ascii_digit() || (c == '.' && self.peek_at(1).map_or(false, |d| d.is_ascii_digit())) {
            self.lex_number();
            return TokenKind::Number;
        }
        if is_ident_start(c) {
            let prefix_len = self.literal_prefix_len();
            if prefix_len > 0 {
                self.pos += prefix_len;
                let quote = self.peek().unwrap_or('"');
                return self.lex_quoted(quote);
            }
            while self.peek().map_or(false, is_ident_continue) {
                self.bump();
            }
            return TokenKind::Ident;
        }
        if c == '\'' || c == '"' {
            return self.lex_quoted(c);
        }
        let rest = self.rest();
        if let Some(p) = PUNCTUATORS.iter().find(|p| rest.starts_with(**p)) {
            self.pos += p.len();
            return TokenKind::Punct;
        }
        self.bump();
        TokenKind::Other
    }

    /**
     * Length of an encoding prefix (`u8`, `u`, `U`, `L`) directly followed by a quote, or 0.
     */
    fn literal_prefix_len(&self) -> usize {
        let rest = self.rest();
        for p in ["u8", "u", "U", "L"] {
            if let Some(after) = rest.strip_prefix(p) {
                if after.starts_with('\'') || after.starts_with('"') {
                    return p.len();
                }
            }
        }
        0
    }

    fn lex_number(&mut self) {
        self.bump();
        loop {
            match self.peek() {
                Some('e' | 'E' | 'p' | 'P') if matches!(self.peek_at(1), Some('+' | '-')) => {
                    self.bump();
                    self.bump();
                }
                Some('\'')
                    if self.digit_separators
                        && self.peek_at(1).map_or(false, |d| d.is_ascii_alphanumeric()) =>
                {
                    self.bump();
                }
                Some(c) if is_ident_continue(c) || c == '.' => {
                    self.bump();
                }
                _ => break,
            }
        }
    }

    fn lex_quoted(&mut self, quote: char) -> TokenKind {
        let save = self.pos;
        self.bump();
        loop {
            match self.bump() {
                None | Some('\n') => {
                    // an unterminated quote lexes as a single stray character
                    self.pos = save;
                    self.bump();
                    return TokenKind::Other;
                }
                Some('\\') => {
                    if self.peek() != Some('\n') {
                        self.bump();
                    }
                }
                Some(c) if c == quote => break,
                Some(_) => (),
            }
        }
        if quote == '\'' {
            TokenKind::Char
        } else {
            TokenKind::Str
        }
    }
}

/**
 * Tokenize a whole file.
 */
pub fn tokenize(
    file: FileId,
    src: &str,
    digit_separators: bool,
    ec: &mut ErrorCollector,
) -> Result<Vec<Token>, ()> {
    Lexer::new(file, src, digit_separators, ec).tokenize()
}

/**
 * Spell a token sequence back into text, separating tokens that had whitespace between them.
 */
pub fn spell(tokens: &[Token]) -> String {
    let mut s = String::new();
    for (i, t) in tokens.iter().enumerate() {
        if i > 0 && t.leading_space {
            s.push(' ');
        }
        s.push_str(&t.text);
    }
    s
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    fn lex(src: &str) -> Vec<(TokenKind, String)> {
        let mut ec = ErrorCollector::new();
        tokenize(FileId(0), src, true, &mut ec)
            .unwrap()
            .into_iter()
            .map(|t| (t.kind, t.text))
            .collect()
    }

    #[test]
    fn test_basic() {
        use TokenKind::*;
        assert_eq!(
            lex("_Static_assert(x >>= 1, \"m\");"),
            vec![
                (Ident, "_Static_assert".to_string()),
                (Punct, "(".to_string()),
                (Ident, "x".to_string()),
                (Punct, ">>=".to_string()),
                (Number, "1".to_string()),
                (Punct, ",".to_string()),
                (Str, "\"m\"".to_string()),
                (Punct, ")".to_string()),
                (Punct, ";".to_string()),
            ]
        );
    }

    #[test]
    fn test_numbers() {
        use TokenKind::*;
        assert_eq!(
            lex("340282366920938463463374607431768211455WBU 1'000 0x1p-3 1e+5"),
            vec![
                (Number, "340282366920938463463374607431768211455WBU".to_string()),
                (Number, "1'000".to_string()),
                (Number, "0x1p-3".to_string()),
                (Number, "1e+5".to_string()),
            ]
        );
    }

    #[test]
    fn test_separator_needs_c23() {
        let mut ec = ErrorCollector::new();
        let toks = tokenize(FileId(0), "1'0'", false, &mut ec).unwrap();
        assert_eq!(toks[0].text, "1");
        assert_eq!(toks[1].kind, TokenKind::Char);
    }

    #[test]
    fn test_prefixes() {
        use TokenKind::*;
        assert_eq!(
            lex("u8'a' L\"x\" U'\\'' u8x"),
            vec![
                (Char, "u8'a'".to_string()),
                (Str, "L\"x\"".to_string()),
                (Char, "U'\\''".to_string()),
                (Ident, "u8x".to_string()),
            ]
        );
    }

    #[test]
    fn test_splice_and_comments() {
        let mut ec = ErrorCollector::new();
        let src = "#define A \\\n  1 /* c\n */ // x\nB";
        let toks = tokenize(FileId(0), src, false, &mut ec).unwrap();
        let texts: Vec<&str> = toks.iter().map(|t| t.text.as_str()).collect();
        assert_eq!(texts, vec!["#", "define", "A", "1", "B"]);
        assert!(toks[0].at_bol);
        assert!(!toks[3].at_bol);
        assert!(toks[4].at_bol);
        // the span of `1` points into the original text
        assert_eq!(&src[toks[3].span.start..toks[3].span.end], "1");
    }

    #[test]
    fn test_unterminated() {
        let mut ec = ErrorCollector::new();
        assert!(tokenize(FileId(0), "/* x", false, &mut ec).is_err());
        assert_eq!(ec.get_first_error(), Some(&CompileError::UnterminatedComment));

        let toks = tokenize(FileId(0), "'abc\nx", false, &mut ec).unwrap();
        assert_eq!(toks[0].kind, TokenKind::Other);
        assert_eq!(toks[1].text, "abc");
    }

    #[test]
    fn test_digraphs() {
        let texts: Vec<String> = lex("<: :> %:").into_iter().map(|(_, t)| t).collect();
        assert_eq!(texts, vec!["[", "]", "#"]);
    }
}
