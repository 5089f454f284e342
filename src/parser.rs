use std::collections::{HashMap, HashSet};

use crate::{
    ast::*,
    cmdline::LangOptions,
    error::{CompileError, CompileWarning, ErrorCollector},
    lexer::{self, Token, TokenKind},
    span::{Node, Span},
    string,
};

lazy_static! {
    /**
     * Keyword spelling to its canonical name, and whether it is a keyword only in C23.
     */
    static ref KEYWORDS: HashMap<&'static str, (&'static str, bool)> = {
        let mut m = HashMap::new();
        for kw in [
            "auto", "break", "case", "char", "const", "continue", "default", "do", "double",
            "else", "enum", "extern", "float", "for", "goto", "if", "inline", "int", "long",
            "register", "restrict", "return", "short", "signed", "sizeof", "static", "struct",
            "switch", "typedef", "union", "unsigned", "void", "volatile", "while", "_Alignas",
            "_Alignof", "_Atomic", "_Bool", "_Complex", "_Generic", "_Imaginary", "_Noreturn",
            "_Static_assert", "_Thread_local", "_BitInt", "__int128", "__attribute__",
            "__extension__", "typeof",
        ] {
            m.insert(kw, (kw, false));
        }
        for (alias, kw) in [
            ("__signed", "signed"),
            ("__signed__", "signed"),
            ("__const", "const"),
            ("__const__", "const"),
            ("__volatile", "volatile"),
            ("__volatile__", "volatile"),
            ("__restrict", "restrict"),
            ("__restrict__", "restrict"),
            ("__inline", "inline"),
            ("__inline__", "inline"),
            ("__alignof", "_Alignof"),
            ("__alignof__", "_Alignof"),
            ("__typeof", "typeof"),
            ("__typeof__", "typeof"),
        ] {
            m.insert(alias, (kw, false));
        }
        for (alias, kw) in [
            ("alignas", "_Alignas"),
            ("alignof", "_Alignof"),
            ("bool", "_Bool"),
            ("constexpr", "constexpr"),
            ("false", "false"),
            ("true", "true"),
            ("nullptr", "nullptr"),
            ("static_assert", "_Static_assert"),
            ("thread_local", "_Thread_local"),
            ("typeof_unqual", "typeof_unqual"),
        ] {
            m.insert(alias, (kw, true));
        }
        m
    };
}

const TYPE_START_KEYWORDS: &[&str] = &[
    "void", "char", "short", "int", "long", "float", "double", "signed", "unsigned", "_Bool",
    "_Complex", "__int128", "_BitInt", "struct", "union", "enum", "const", "volatile",
    "restrict", "_Atomic", "typedef", "extern", "static", "_Thread_local", "auto", "register",
    "constexpr", "inline", "_Noreturn", "_Alignas", "typeof", "typeof_unqual", "__attribute__",
    "__extension__",
];

fn binary_operator(tok: &Token) -> Option<(BinaryOperator, u8)> {
    use BinaryOperator::*;
    if tok.kind != TokenKind::Punct {
        return None;
    }
    let r = match tok.text.as_str() {
        "||" => (LogicalOr, 1),
        "&&" => (LogicalAnd, 2),
        "|" => (BitwiseOr, 3),
        "^" => (BitwiseXor, 4),
        "&" => (BitwiseAnd, 5),
        "==" => (Equals, 6),
        "!=" => (NotEquals, 6),
        "<" => (Less, 7),
        ">" => (Greater, 7),
        "<=" => (LessOrEqual, 7),
        ">=" => (GreaterOrEqual, 7),
        "<<" => (ShiftLeft, 8),
        ">>" => (ShiftRight, 8),
        "+" => (Plus, 9),
        "-" => (Minus, 9),
        "*" => (Multiply, 10),
        "/" => (Divide, 10),
        "%" => (Modulo, 10),
        _ => return None,
    };
    Some(r)
}

fn assignment_operator(tok: &Token) -> Option<BinaryOperator> {
    use BinaryOperator::*;
    if tok.kind != TokenKind::Punct {
        return None;
    }
    let r = match tok.text.as_str() {
        "=" => Assign,
        "*=" => AssignMultiply,
        "/=" => AssignDivide,
        "%=" => AssignModulo,
        "+=" => AssignPlus,
        "-=" => AssignMinus,
        "<<=" => AssignShiftLeft,
        ">>=" => AssignShiftRight,
        "&=" => AssignBitwiseAnd,
        "^=" => AssignBitwiseXor,
        "|=" => AssignBitwiseOr,
        _ => return None,
    };
    Some(r)
}

/**
 * Recursive descent parser over preprocessed tokens.
 *
 * Tracks typedef names so that `(T)x` parses as a cast.
 */
pub struct Parser<'a> {
    tokens: Vec<Token>,
    pos: usize,
    typedefs: HashSet<String>,
    lang: &'a LangOptions,
    ec: &'a mut ErrorCollector,
}

impl<'a> Parser<'a> {
    pub fn new(mut tokens: Vec<Token>, lang: &'a LangOptions, ec: &'a mut ErrorCollector) -> Self {
        let eof_span = match tokens.last() {
            Some(t) => Span::new(t.span.file, t.span.end, t.span.end),
            None => Span::none(),
        };
        tokens.push(Token::new(TokenKind::EndOfFile, "", eof_span));
        Self {
            tokens,
            pos: 0,
            typedefs: HashSet::new(),
            lang,
            ec,
        }
    }

    pub fn add_typedef(&mut self, name: &str) {
        self.typedefs.insert(name.to_string());
    }

    pub fn parse_translation_unit(mut self) -> TranslationUnit {
        let mut decls = Vec::new();
        while self.peek().kind != TokenKind::EndOfFile {
            if self.eat_punct(";") {
                continue;
            }
            match self.parse_external_declaration() {
                Ok(d) => decls.push(d),
                Err(()) => self.recover(),
            }
        }
        TranslationUnit(decls)
    }

    /**
     * Parse a whole token list as one conditional expression.
     */
    pub fn parse_constant_expression(mut self) -> Result<Node<Expression>, ()> {
        let e = self.parse_conditional()?;
        if self.peek().kind != TokenKind::EndOfFile {
            return self.unexpected("end of expression");
        }
        Ok(e)
    }

    fn peek(&self) -> &Token {
        &self.tokens[self.pos]
    }

    fn peek_at(&self, n: usize) -> &Token {
        &self.tokens[(self.pos + n).min(self.tokens.len() - 1)]
    }

    fn next(&mut self) -> Token {
        let t = self.tokens[self.pos].clone();
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        t
    }

    fn prev_span(&self) -> Span {
        if self.pos == 0 {
            self.tokens[0].span
        } else {
            self.tokens[self.pos - 1].span
        }
    }

    fn span_from(&self, start: Span) -> Span {
        start.join(self.prev_span())
    }

    fn keyword(&self, t: &Token) -> Option<&'static str> {
        if t.kind != TokenKind::Ident {
            return None;
        }
        match KEYWORDS.get(t.text.as_str()) {
            Some((kw, c23_only)) if !*c23_only || self.lang.is_c23() => Some(*kw),
            _ => None,
        }
    }

    fn is_keyword(&self, kw: &str) -> bool {
        self.keyword(self.peek()) == Some(kw)
    }

    fn is_punct(&self, p: &str) -> bool {
        self.peek().is_punct(p)
    }

    fn eat_punct(&mut self, p: &str) -> bool {
        if self.is_punct(p) {
            self.next();
            true
        } else {
            false
        }
    }

    fn expect_punct(&mut self, p: &str) -> Result<Span, ()> {
        if self.is_punct(p) {
            Ok(self.next().span)
        } else {
            self.unexpected(&format!("`{}'", p))
        }
    }

    fn expect_identifier(&mut self) -> Result<Node<String>, ()> {
        let t = self.peek().clone();
        if t.kind == TokenKind::Ident && self.keyword(&t).is_none() {
            self.next();
            Ok(Node::new(t.text, t.span))
        } else {
            self.unexpected("identifier")
        }
    }

    fn unexpected<T>(&mut self, what: &str) -> Result<T, ()> {
        let t = self.peek().clone();
        let error = match t.kind {
            TokenKind::EndOfFile => CompileError::UnexpectedEof(what.to_string()),
            TokenKind::Other if t.text.ends_with('\'') || t.text.ends_with('"') => {
                CompileError::UnterminatedLiteral
            }
            TokenKind::Other => CompileError::InvalidCharacter(t.text.chars().next().unwrap_or(' ')),
            _ => CompileError::Expected(what.to_string(), t.text),
        };
        self.ec.record_error(error, t.span)?;
        unreachable!()
    }

    fn unimplemented<T>(&mut self, what: &str) -> Result<T, ()> {
        let span = self.peek().span;
        self.ec
            .record_error(CompileError::Unimplemented(what.to_string()), span)?;
        unreachable!()
    }

    /**
     * Skip the rest of a broken declaration: up to a `;` or past a `}` at nesting level 0.
     */
    fn recover(&mut self) {
        let mut depth = 0usize;
        loop {
            let t = self.peek();
            if t.kind == TokenKind::EndOfFile {
                return;
            }
            if t.kind == TokenKind::Punct {
                match t.text.as_str() {
                    "{" | "(" | "[" => depth += 1,
                    "}" | ")" | "]" => {
                        let closes_block = t.text == "}";
                        depth = depth.saturating_sub(1);
                        if depth == 0 && closes_block {
                            self.next();
                            return;
                        }
                    }
                    ";" if depth == 0 => {
                        self.next();
                        return;
                    }
                    _ => (),
                }
            }
            self.next();
        }
    }

    /**
     * Skip a parenthesized or bracketed group starting at the current token.
     */
    fn skip_balanced(&mut self, open: &str, close: &str) -> Result<(), ()> {
        let mut depth = 0usize;
        loop {
            let t = self.peek().clone();
            if t.kind == TokenKind::EndOfFile {
                return self.unexpected(&format!("`{}'", close));
            }
            self.next();
            if t.is_punct(open) {
                depth += 1;
            } else if t.is_punct(close) {
                depth -= 1;
                if depth == 0 {
                    return Ok(());
                }
            }
        }
    }

    /**
     * Skip `[[...]]`, `__attribute__((...))` and `__extension__`.
     */
    fn skip_attributes(&mut self) -> Result<(), ()> {
        loop {
            if self.is_punct("[") && self.peek_at(1).is_punct("[") {
                self.skip_balanced("[", "]")?;
            } else if self.is_keyword("__attribute__") {
                self.next();
                if !self.is_punct("(") {
                    return self.unexpected("`('");
                }
                self.skip_balanced("(", ")")?;
            } else if self.is_keyword("__extension__") {
                self.next();
            } else {
                return Ok(());
            }
        }
    }

    fn is_type_start(&self, t: &Token) -> bool {
        match self.keyword(t) {
            Some(kw) => TYPE_START_KEYWORDS.contains(&kw),
            None => t.kind == TokenKind::Ident && self.typedefs.contains(&t.text),
        }
    }

    fn parse_external_declaration(&mut self) -> Result<Node<ExternalDeclaration>, ()> {
        self.skip_attributes()?;
        if self.is_keyword("_Static_assert") {
            let sa = self.parse_static_assert()?;
            let span = sa.span;
            return Ok(Node::new(ExternalDeclaration::StaticAssert(sa), span));
        }
        let d = self.parse_declaration()?;
        let span = d.span;
        Ok(Node::new(ExternalDeclaration::Declaration(d), span))
    }

    fn parse_static_assert(&mut self) -> Result<Node<StaticAssert>, ()> {
        let kw = self.next();
        self.expect_punct("(")?;
        let start = self.pos;
        let expression = self.parse_conditional()?;
        let text = lexer::spell(&self.tokens[start..self.pos]);
        let message = if self.eat_punct(",") {
            Some(self.parse_string_message()?)
        } else {
            if !self.lang.is_c23() {
                self.ec.record_warning(
                    CompileWarning::C23Extension("'_Static_assert' with no message".to_string()),
                    kw.span,
                )?;
            }
            None
        };
        self.expect_punct(")")?;
        self.expect_punct(";")?;
        Ok(Node::new(
            StaticAssert {
                expression: Box::new(expression),
                message,
                text,
            },
            self.span_from(kw.span),
        ))
    }

    fn parse_string_message(&mut self) -> Result<Node<String>, ()> {
        let start = self.peek().span;
        if self.peek().kind != TokenKind::Str {
            return self.unexpected("string literal");
        }
        let mut message = String::new();
        while self.peek().kind == TokenKind::Str {
            let t = self.next();
            match string::parse_string_literal(&t.text) {
                Ok(s) => message.push_str(&s),
                Err(e) => {
                    self.ec.record_error(CompileError::CharParseError(e), t.span)?;
                    unreachable!()
                }
            }
        }
        Ok(Node::new(message, self.span_from(start)))
    }

    fn parse_declaration(&mut self) -> Result<Node<Declaration>, ()> {
        let start = self.peek().span;
        let specifiers = self.parse_declaration_specifiers()?;
        if specifiers.is_empty() {
            return self.unexpected("declaration");
        }
        let is_typedef = specifiers.iter().any(|s| {
            matches!(
                s.node,
                DeclarationSpecifier::StorageClass(Node {
                    node: StorageClassSpecifier::Typedef,
                    ..
                })
            )
        });
        let mut declarators = Vec::new();
        if !self.is_punct(";") {
            loop {
                let declarator = self.parse_declarator(false)?;
                if self.is_punct("{") {
                    return self.unimplemented("function definitions");
                }
                self.skip_attributes()?;
                if is_typedef {
                    if let Some(id) = &declarator.node.identifier {
                        self.typedefs.insert(id.node.clone());
                    }
                }
                let initializer = if self.eat_punct("=") {
                    Some(self.parse_initializer()?)
                } else {
                    None
                };
                let span = self.span_from(declarator.span);
                declarators.push(Node::new(
                    InitDeclarator {
                        declarator,
                        initializer,
                    },
                    span,
                ));
                if !self.eat_punct(",") {
                    break;
                }
            }
        }
        self.expect_punct(";")?;
        Ok(Node::new(
            Declaration {
                specifiers,
                declarators,
            },
            self.span_from(start),
        ))
    }

    fn parse_declaration_specifiers(&mut self) -> Result<Vec<Node<DeclarationSpecifier>>, ()> {
        let mut specs = Vec::new();
        let mut seen_type = false;
        loop {
            self.skip_attributes()?;
            let t = self.peek().clone();
            let span = t.span;
            let spec = match self.keyword(&t) {
                Some(kw) => {
                    if let Some(sc) = storage_class(kw) {
                        self.next();
                        DeclarationSpecifier::StorageClass(Node::new(sc, span))
                    } else if kw == "_Atomic" && self.peek_at(1).is_punct("(") {
                        return self.unimplemented("_Atomic type specifier");
                    } else if let Some(q) = type_qualifier(kw) {
                        self.next();
                        DeclarationSpecifier::TypeQualifier(Node::new(q, span))
                    } else if kw == "inline" || kw == "_Noreturn" {
                        self.next();
                        let fs = if kw == "inline" {
                            FunctionSpecifier::Inline
                        } else {
                            FunctionSpecifier::Noreturn
                        };
                        DeclarationSpecifier::Function(Node::new(fs, span))
                    } else if let Some(ts) = simple_type_specifier(kw) {
                        self.next();
                        seen_type = true;
                        DeclarationSpecifier::TypeSpecifier(Node::new(ts, span))
                    } else if kw == "_BitInt" {
                        self.next();
                        self.expect_punct("(")?;
                        let width = self.parse_conditional()?;
                        self.expect_punct(")")?;
                        seen_type = true;
                        DeclarationSpecifier::TypeSpecifier(Node::new(
                            TypeSpecifier::BitInt(Box::new(width)),
                            self.span_from(span),
                        ))
                    } else if kw == "enum" {
                        let e = self.parse_enum()?;
                        let span = e.span;
                        seen_type = true;
                        DeclarationSpecifier::TypeSpecifier(Node::new(TypeSpecifier::Enum(e), span))
                    } else {
                        match kw {
                            "struct" | "union" => return self.unimplemented("struct and union types"),
                            "_Alignas" => return self.unimplemented("_Alignas"),
                            "typeof" | "typeof_unqual" => return self.unimplemented("typeof"),
                            "_Complex" | "_Imaginary" => return self.unimplemented("complex types"),
                            _ => break,
                        }
                    }
                }
                None if t.kind == TokenKind::Ident && !seen_type && self.typedefs.contains(&t.text) => {
                    self.next();
                    seen_type = true;
                    DeclarationSpecifier::TypeSpecifier(Node::new(
                        TypeSpecifier::TypedefName(Node::new(t.text, span)),
                        span,
                    ))
                }
                None => break,
            };
            specs.push(Node::new(spec, span));
        }
        Ok(specs)
    }

    fn parse_enum(&mut self) -> Result<Node<EnumType>, ()> {
        let start = self.next().span;
        self.skip_attributes()?;
        let t = self.peek().clone();
        let identifier = if t.kind == TokenKind::Ident && self.keyword(&t).is_none() {
            self.next();
            Some(Node::new(t.text, t.span))
        } else {
            None
        };
        let fixed_type = if self.is_punct(":") {
            let colon = self.next().span;
            if !self.lang.is_c23() {
                self.ec.record_warning(
                    CompileWarning::C23Extension(
                        "enumeration types with a fixed underlying type".to_string(),
                    ),
                    colon,
                )?;
            }
            Some(Box::new(self.parse_type_name()?))
        } else {
            None
        };
        let enumerators = if self.eat_punct("{") {
            let mut list = Vec::new();
            while !self.is_punct("}") {
                let identifier = self.expect_identifier()?;
                self.skip_attributes()?;
                let expression = if self.eat_punct("=") {
                    Some(Box::new(self.parse_conditional()?))
                } else {
                    None
                };
                let span = self.span_from(identifier.span);
                list.push(Node::new(
                    Enumerator {
                        identifier,
                        expression,
                    },
                    span,
                ));
                if !self.eat_punct(",") {
                    break;
                }
            }
            self.expect_punct("}")?;
            Some(list)
        } else {
            if identifier.is_none() {
                return self.unexpected("enumeration name or `{'");
            }
            None
        };
        Ok(Node::new(
            EnumType {
                identifier,
                fixed_type,
                enumerators,
            },
            self.span_from(start),
        ))
    }

    pub fn parse_type_name(&mut self) -> Result<Node<TypeName>, ()> {
        let start = self.peek().span;
        let specifiers = self.parse_declaration_specifiers()?;
        if specifiers.is_empty() {
            return self.unexpected("type name");
        }
        let declarator = if self.is_punct("*") || self.is_punct("(") || self.is_punct("[") {
            Some(self.parse_declarator(true)?)
        } else {
            None
        };
        Ok(Node::new(
            TypeName {
                specifiers,
                declarator,
            },
            self.span_from(start),
        ))
    }

    fn is_nested_declarator(&self, abstract_allowed: bool) -> bool {
        let t = self.peek_at(1);
        if abstract_allowed {
            t.is_punct("*") || t.is_punct("(") || t.is_punct("[")
        } else {
            !t.is_punct(")") && !self.is_type_start(t)
        }
    }

    fn parse_declarator(&mut self, abstract_allowed: bool) -> Result<Node<Declarator>, ()> {
        let start = self.peek().span;
        let mut derived = Vec::new();
        while self.is_punct("*") {
            let pointer_span = self.next().span;
            let mut qualifiers = Vec::new();
            loop {
                self.skip_attributes()?;
                let t = self.peek().clone();
                match self.keyword(&t).and_then(type_qualifier) {
                    Some(q) => {
                        self.next();
                        qualifiers.push(Node::new(q, t.span));
                    }
                    None => break,
                }
            }
            derived.push(Node::new(
                DerivedDeclarator::Pointer(qualifiers),
                self.span_from(pointer_span),
            ));
        }

        let mut identifier = None;
        let mut inner_derived = Vec::new();
        let t = self.peek().clone();
        if t.kind == TokenKind::Ident && self.keyword(&t).is_none() {
            self.next();
            identifier = Some(Node::new(t.text, t.span));
        } else if t.is_punct("(") && self.is_nested_declarator(abstract_allowed) {
            self.next();
            let inner = self.parse_declarator(abstract_allowed)?;
            self.expect_punct(")")?;
            identifier = inner.node.identifier;
            inner_derived = inner.node.derived;
        } else if !abstract_allowed {
            return self.unexpected("identifier");
        }

        let mut suffixes = Vec::new();
        loop {
            if self.is_punct("[") {
                let s = self.next().span;
                while matches!(
                    self.keyword(self.peek()),
                    Some("static" | "const" | "volatile" | "restrict" | "_Atomic")
                ) {
                    self.next();
                }
                let size = if self.is_punct("]") {
                    None
                } else if self.is_punct("*") && self.peek_at(1).is_punct("]") {
                    self.next();
                    None
                } else {
                    Some(Box::new(self.parse_assignment()?))
                };
                self.expect_punct("]")?;
                suffixes.push(Node::new(DerivedDeclarator::Array(size), self.span_from(s)));
            } else if self.is_punct("(") {
                let s = self.peek().span;
                self.skip_balanced("(", ")")?;
                suffixes.push(Node::new(DerivedDeclarator::Function, self.span_from(s)));
            } else {
                break;
            }
        }
        derived.extend(suffixes.into_iter().rev());
        derived.extend(inner_derived);
        Ok(Node::new(
            Declarator {
                identifier,
                derived,
            },
            self.span_from(start),
        ))
    }

    fn parse_initializer(&mut self) -> Result<Node<Initializer>, ()> {
        if self.is_punct("{") {
            let start = self.next().span;
            let mut list = Vec::new();
            while !self.is_punct("}") {
                if self.is_punct(".") || self.is_punct("[") {
                    return self.unimplemented("designated initializers");
                }
                list.push(self.parse_initializer()?);
                if !self.eat_punct(",") {
                    break;
                }
            }
            self.expect_punct("}")?;
            Ok(Node::new(Initializer::List(list), self.span_from(start)))
        } else {
            let e = self.parse_assignment()?;
            let span = e.span;
            Ok(Node::new(Initializer::Expression(Box::new(e)), span))
        }
    }

    pub fn parse_expression(&mut self) -> Result<Node<Expression>, ()> {
        let first = self.parse_assignment()?;
        if !self.is_punct(",") {
            return Ok(first);
        }
        let start = first.span;
        let mut list = vec![first];
        while self.eat_punct(",") {
            list.push(self.parse_assignment()?);
        }
        Ok(Node::new(Expression::Comma(list), self.span_from(start)))
    }

    fn parse_assignment(&mut self) -> Result<Node<Expression>, ()> {
        let lhs = self.parse_conditional()?;
        let t = self.peek().clone();
        if let Some(op) = assignment_operator(&t) {
            self.next();
            let rhs = self.parse_assignment()?;
            let span = lhs.span.join(rhs.span);
            return Ok(Node::new(
                Expression::BinaryOperator(Node::new(op, t.span), Box::new(lhs), Box::new(rhs)),
                span,
            ));
        }
        Ok(lhs)
    }

    fn parse_conditional(&mut self) -> Result<Node<Expression>, ()> {
        let cond = self.parse_binary(1)?;
        if !self.eat_punct("?") {
            return Ok(cond);
        }
        let then_expr = self.parse_expression()?;
        self.expect_punct(":")?;
        let else_expr = self.parse_conditional()?;
        let span = cond.span.join(else_expr.span);
        Ok(Node::new(
            Expression::Conditional(Box::new(cond), Box::new(then_expr), Box::new(else_expr)),
            span,
        ))
    }

    fn parse_binary(&mut self, min_prec: u8) -> Result<Node<Expression>, ()> {
        let mut lhs = self.parse_cast()?;
        loop {
            let t = self.peek().clone();
            let (op, prec) = match binary_operator(&t) {
                Some((op, prec)) if prec >= min_prec => (op, prec),
                _ => break,
            };
            self.next();
            let rhs = self.parse_binary(prec + 1)?;
            let span = lhs.span.join(rhs.span);
            lhs = Node::new(
                Expression::BinaryOperator(Node::new(op, t.span), Box::new(lhs), Box::new(rhs)),
                span,
            );
        }
        Ok(lhs)
    }

    fn parse_cast(&mut self) -> Result<Node<Expression>, ()> {
        if self.is_punct("(") && self.is_type_start(self.peek_at(1)) {
            let start = self.next().span;
            let type_name = self.parse_type_name()?;
            self.expect_punct(")")?;
            if self.is_punct("{") {
                return self.unimplemented("compound literals");
            }
            let operand = self.parse_cast()?;
            return Ok(Node::new(
                Expression::Cast(Box::new(type_name), Box::new(operand)),
                self.span_from(start),
            ));
        }
        self.parse_unary()
    }

    fn parse_unary(&mut self) -> Result<Node<Expression>, ()> {
        let t = self.peek().clone();
        let op = if t.kind == TokenKind::Punct {
            match t.text.as_str() {
                "+" => Some(UnaryOperator::Plus),
                "-" => Some(UnaryOperator::Minus),
                "~" => Some(UnaryOperator::Complement),
                "!" => Some(UnaryOperator::Negate),
                "&" => Some(UnaryOperator::Address),
                "*" => Some(UnaryOperator::Indirection),
                "++" => Some(UnaryOperator::PreIncrement),
                "--" => Some(UnaryOperator::PreDecrement),
                _ => None,
            }
        } else {
            None
        };
        if let Some(op) = op {
            self.next();
            let operand = match op {
                UnaryOperator::PreIncrement | UnaryOperator::PreDecrement => self.parse_unary()?,
                _ => self.parse_cast()?,
            };
            return Ok(Node::new(
                Expression::UnaryOperator(Node::new(op, t.span), Box::new(operand)),
                self.span_from(t.span),
            ));
        }
        match self.keyword(&t) {
            Some("sizeof") => {
                self.next();
                if self.is_punct("(") && self.is_type_start(self.peek_at(1)) {
                    self.next();
                    let type_name = self.parse_type_name()?;
                    self.expect_punct(")")?;
                    if self.is_punct("{") {
                        return self.unimplemented("compound literals");
                    }
                    Ok(Node::new(
                        Expression::SizeOfTy(Box::new(type_name)),
                        self.span_from(t.span),
                    ))
                } else {
                    let operand = self.parse_unary()?;
                    Ok(Node::new(
                        Expression::SizeOfVal(Box::new(operand)),
                        self.span_from(t.span),
                    ))
                }
            }
            Some("_Alignof") => {
                self.next();
                self.expect_punct("(")?;
                if !self.is_type_start(self.peek()) {
                    return self.unimplemented("_Alignof applied to an expression");
                }
                let type_name = self.parse_type_name()?;
                self.expect_punct(")")?;
                Ok(Node::new(
                    Expression::AlignOf(Box::new(type_name)),
                    self.span_from(t.span),
                ))
            }
            _ => self.parse_postfix(),
        }
    }

    fn parse_postfix(&mut self) -> Result<Node<Expression>, ()> {
        let mut e = self.parse_primary()?;
        loop {
            let t = self.peek().clone();
            if t.is_punct("[") {
                self.next();
                let index = self.parse_expression()?;
                self.expect_punct("]")?;
                let span = self.span_from(e.span);
                e = Node::new(
                    Expression::BinaryOperator(
                        Node::new(BinaryOperator::Index, t.span),
                        Box::new(e),
                        Box::new(index),
                    ),
                    span,
                );
            } else if t.is_punct("(") {
                self.next();
                let mut args = Vec::new();
                if !self.is_punct(")") {
                    loop {
                        args.push(self.parse_assignment()?);
                        if !self.eat_punct(",") {
                            break;
                        }
                    }
                }
                self.expect_punct(")")?;
                let span = self.span_from(e.span);
                e = Node::new(Expression::Call(Box::new(e), args), span);
            } else if t.is_punct(".") || t.is_punct("->") {
                self.next();
                let member = self.expect_identifier()?;
                let span = self.span_from(e.span);
                e = Node::new(Expression::Member(Box::new(e), member.node), span);
            } else if t.is_punct("++") || t.is_punct("--") {
                self.next();
                let op = if t.text == "++" {
                    UnaryOperator::PostIncrement
                } else {
                    UnaryOperator::PostDecrement
                };
                let span = self.span_from(e.span);
                e = Node::new(
                    Expression::UnaryOperator(Node::new(op, t.span), Box::new(e)),
                    span,
                );
            } else {
                return Ok(e);
            }
        }
    }

    fn parse_primary(&mut self) -> Result<Node<Expression>, ()> {
        let t = self.peek().clone();
        match t.kind {
            TokenKind::Ident => match self.keyword(&t) {
                None => {
                    self.next();
                    Ok(Node::new(Expression::Identifier(t.text), t.span))
                }
                Some("true") | Some("false") => {
                    self.next();
                    Ok(Node::new(
                        Expression::Constant(Constant::Bool(t.text == "true")),
                        t.span,
                    ))
                }
                Some("_Generic") => self.parse_generic(),
                Some("nullptr") => self.unimplemented("nullptr"),
                Some(_) => self.unexpected("expression"),
            },
            TokenKind::Number => {
                self.next();
                Ok(Node::new(Expression::Constant(Constant::Integer(t.text)), t.span))
            }
            TokenKind::Char => {
                self.next();
                Ok(Node::new(
                    Expression::Constant(Constant::Character(t.text)),
                    t.span,
                ))
            }
            TokenKind::Str => {
                let mut pieces = Vec::new();
                while self.peek().kind == TokenKind::Str {
                    pieces.push(self.next().text);
                }
                Ok(Node::new(
                    Expression::StringLiteral(pieces),
                    self.span_from(t.span),
                ))
            }
            TokenKind::Punct if t.text == "(" => {
                self.next();
                let e = self.parse_expression()?;
                self.expect_punct(")")?;
                Ok(Node::new(e.node, self.span_from(t.span)))
            }
            _ => self.unexpected("expression"),
        }
    }

    fn parse_generic(&mut self) -> Result<Node<Expression>, ()> {
        let start = self.next().span;
        self.expect_punct("(")?;
        let controlling = self.parse_assignment()?;
        let mut associations = Vec::new();
        while self.eat_punct(",") {
            let assoc_start = self.peek().span;
            if self.is_keyword("default") {
                self.next();
                self.expect_punct(":")?;
                let e = self.parse_assignment()?;
                associations.push(Node::new(
                    GenericAssociation::Default(Box::new(e)),
                    self.span_from(assoc_start),
                ));
            } else {
                let type_name = self.parse_type_name()?;
                self.expect_punct(":")?;
                let e = self.parse_assignment()?;
                associations.push(Node::new(
                    GenericAssociation::Type(type_name, Box::new(e)),
                    self.span_from(assoc_start),
                ));
            }
        }
        if associations.is_empty() {
            return self.unexpected("`,'");
        }
        self.expect_punct(")")?;
        Ok(Node::new(
            Expression::GenericSelection(Box::new(controlling), associations),
            self.span_from(start),
        ))
    }
}

fn storage_class(kw: &str) -> Option<StorageClassSpecifier> {
    let sc = match kw {
        "typedef" => StorageClassSpecifier::Typedef,
        "extern" => StorageClassSpecifier::Extern,
        "static" => StorageClassSpecifier::Static,
        "_Thread_local" => StorageClassSpecifier::ThreadLocal,
        "auto" => StorageClassSpecifier::Auto,
        "register" => StorageClassSpecifier::Register,
        "constexpr" => StorageClassSpecifier::Constexpr,
        _ => return None,
    };
    Some(sc)
}

fn type_qualifier(kw: &str) -> Option<TypeQualifier> {
    let q = match kw {
        "const" => TypeQualifier::Const,
        "volatile" => TypeQualifier::Volatile,
        "restrict" => TypeQualifier::Restrict,
        "_Atomic" => TypeQualifier::Atomic,
        _ => return None,
    };
    Some(q)
}

fn simple_type_specifier(kw: &str) -> Option<TypeSpecifier> {
    let ts = match kw {
        "void" => TypeSpecifier::Void,
        "_Bool" => TypeSpecifier::Bool,
        "char" => TypeSpecifier::Char,
        "short" => TypeSpecifier::Short,
        "int" => TypeSpecifier::Int,
        "long" => TypeSpecifier::Long,
        "float" => TypeSpecifier::Float,
        "double" => TypeSpecifier::Double,
        "signed" => TypeSpecifier::Signed,
        "unsigned" => TypeSpecifier::Unsigned,
        "__int128" => TypeSpecifier::Int128,
        _ => return None,
    };
    Some(ts)
}

/**
 * Whether `name` is a keyword in the dialect. Keywords survive identifier replacement in `#if`.
 */
pub fn is_keyword(name: &str, lang: &LangOptions) -> bool {
    match KEYWORDS.get(name) {
        Some((_, c23_only)) => !*c23_only || lang.is_c23(),
        None => false,
    }
}

/**
 * Parse a preprocessed translation unit. `typedefs` are names known to be types up front.
 */
pub fn parse_translation_unit(
    tokens: Vec<Token>,
    typedefs: &[&str],
    lang: &LangOptions,
    ec: &mut ErrorCollector,
) -> TranslationUnit {
    let mut parser = Parser::new(tokens, lang, ec);
    for name in typedefs {
        parser.add_typedef(name);
    }
    parser.parse_translation_unit()
}

pub fn parse_constant_expression(
    tokens: Vec<Token>,
    lang: &LangOptions,
    ec: &mut ErrorCollector,
) -> Result<Node<Expression>, ()> {
    Parser::new(tokens, lang, ec).parse_constant_expression()
}
