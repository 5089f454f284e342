use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt::Write;
use std::fs;
use std::iter::Peekable;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use crate::cmdline::{LangOptions, MacroOption};
use crate::constant::{self, Env};
use crate::ctype::{self, CType, IntKind};
use crate::error::{CompileError, CompileWarning, ErrorCollector};
use crate::headers;
use crate::lexer::{self, Token, TokenKind};
use crate::machine::{self, Arch, Machine, Os};
use crate::parser;
use crate::span::{FileId, SourceMap, Span};

const MAX_INCLUDE_DEPTH: usize = 200;

/**
 * Directories searched by `#include`, in order: `quote` only for `"..."` includes, then
 * `angled` (`-I`), `system` (`-isystem`) and finally the builtin headers.
 */
#[derive(Debug, Clone, Default)]
pub struct SearchPaths {
    pub quote: Vec<PathBuf>,
    pub angled: Vec<PathBuf>,
    pub system: Vec<PathBuf>,
    pub builtin: bool,
}

#[derive(Debug, Clone, PartialEq)]
enum MacroKind {
    Object,
    /// The variadic parameter, if any, is the last one.
    Function {
        params: Vec<String>,
        variadic: bool,
    },
    File,
    Line,
}

#[derive(Debug)]
struct Macro {
    kind: MacroKind,
    body: Vec<Token>,
}

impl Macro {
    fn is_function(&self) -> bool {
        matches!(self.kind, MacroKind::Function { .. })
    }

    fn params(&self) -> &[String] {
        match &self.kind {
            MacroKind::Function { params, .. } => params,
            _ => &[],
        }
    }

    fn same_definition(&self, other: &Macro) -> bool {
        self.kind == other.kind
            && self.body.len() == other.body.len()
            && self
                .body
                .iter()
                .zip(other.body.iter())
                .enumerate()
                .all(|(i, (a, b))| a.text == b.text && (i == 0 || a.leading_space == b.leading_space))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CondContext {
    Then,
    Elif,
    Else,
}

struct Conditional {
    ctx: CondContext,
    /// Some group of this conditional has been taken.
    included: bool,
    span: Span,
}

enum IncludeTarget {
    File(PathBuf, bool),
    Builtin(&'static str),
}

pub struct Preprocessor<'a> {
    machine: &'a Machine,
    lang: &'a LangOptions,
    paths: &'a SearchPaths,
    sm: &'a mut SourceMap,
    ec: &'a mut ErrorCollector,
    macros: HashMap<String, Rc<Macro>>,
    conditionals: Vec<Conditional>,
    file_keys: HashMap<FileId, String>,
    once: HashSet<String>,
    include_depth: usize,
}

impl<'a> Preprocessor<'a> {
    pub fn new(
        machine: &'a Machine,
        lang: &'a LangOptions,
        paths: &'a SearchPaths,
        sm: &'a mut SourceMap,
        ec: &'a mut ErrorCollector,
    ) -> Self {
        let mut macros = HashMap::new();
        for (name, kind) in [("__FILE__", MacroKind::File), ("__LINE__", MacroKind::Line)] {
            macros.insert(
                name.to_string(),
                Rc::new(Macro {
                    kind,
                    body: Vec::new(),
                }),
            );
        }
        Self {
            machine,
            lang,
            paths,
            sm,
            ec,
            macros,
            conditionals: Vec::new(),
            file_keys: HashMap::new(),
            once: HashSet::new(),
            include_depth: 0,
        }
    }

    /**
     * Define the predefined macros, then apply `-D` and `-U` in command line order.
     */
    pub fn define_macros(&mut self, options: &[MacroOption]) -> Result<(), ()> {
        let mut text = String::new();
        for (name, value) in predefined_macros(self.machine, self.lang) {
            let _ = writeln!(text, "#define {} {}", name, value);
        }
        let builtin = self.sm.add_file("<built-in>".to_string(), None, text);
        self.ec.mark_system_file(builtin);
        self.run_file(builtin)?;

        let mut text = String::new();
        for option in options {
            match option {
                MacroOption::Define(def) => match def.split_once('=') {
                    Some((name, value)) => {
                        let _ = writeln!(text, "#define {} {}", name, value);
                    }
                    None => {
                        let _ = writeln!(text, "#define {} 1", def);
                    }
                },
                MacroOption::Undef(name) => {
                    let _ = writeln!(text, "#undef {}", name);
                }
            }
        }
        if !text.is_empty() {
            let cmdline = self.sm.add_file("<command line>".to_string(), None, text);
            self.run_file(cmdline)?;
        }
        Ok(())
    }

    /**
     * Preprocess a file already in the source map. The result holds no directives and no
     * macro names left to expand.
     */
    pub fn preprocess_file(&mut self, file: FileId) -> Result<Vec<Token>, ()> {
        let key = match &self.sm.get(file).path {
            Some(path) => file_key(path),
            None => self.sm.get(file).name.clone(),
        };
        self.file_keys.insert(file, key);
        let tokens = self.run_file(file)?;
        tracing::debug!(tokens = tokens.len(), "preprocessed");
        Ok(tokens)
    }

    /**
     * Macro definitions in `#define` form, sorted by name.
     */
    pub fn dump_macros(&self) -> String {
        let mut names: Vec<&String> = self.macros.keys().collect();
        names.sort();
        let mut s = String::new();
        for name in names {
            let m = &self.macros[name];
            let head = match &m.kind {
                MacroKind::File | MacroKind::Line => continue,
                MacroKind::Object => name.clone(),
                MacroKind::Function { params, variadic } => {
                    let mut params = params.clone();
                    if *variadic {
                        if let Some(last) = params.last_mut() {
                            if last == "__VA_ARGS__" {
                                *last = "...".to_string();
                            } else {
                                last.push_str("...");
                            }
                        }
                    }
                    format!("{}({})", name, params.join(", "))
                }
            };
            let line = format!("#define {} {}", head, lexer::spell(&m.body));
            let _ = writeln!(s, "{}", line.trim_end());
        }
        s
    }

    fn run_file(&mut self, file: FileId) -> Result<Vec<Token>, ()> {
        let tokens = lexer::tokenize(file, &self.sm.get(file).text, self.lang.is_c23(), self.ec)?;
        let mut queue: VecDeque<Token> = tokens.into();
        queue.push_back(self.end_of_file(file));
        self.run(&mut queue)
    }

    fn end_of_file(&self, file: FileId) -> Token {
        let len = self.sm.get(file).text.len();
        let mut tok = Token::new(TokenKind::EndOfFile, "", Span::new(file, len, len));
        tok.at_bol = true;
        tok
    }

    fn run(&mut self, queue: &mut VecDeque<Token>) -> Result<Vec<Token>, ()> {
        let mut output = Vec::new();
        let mut has_error = false;
        while let Some(tok) = queue.pop_front() {
            if tok.kind == TokenKind::EndOfFile {
                if self.close_conditionals(tok.span.file).is_err() {
                    has_error = true;
                }
                if !queue.is_empty() {
                    self.include_depth -= 1;
                }
                continue;
            }
            if is_directive(&tok) {
                if self.directive(queue).is_err() {
                    has_error = true;
                }
                continue;
            }
            if tok.kind == TokenKind::Ident {
                match self.expand_macro(&tok, queue) {
                    Ok(true) => continue,
                    Ok(false) => (),
                    Err(()) => {
                        has_error = true;
                        continue;
                    }
                }
            }
            output.push(tok);
        }
        if has_error {
            Err(())
        } else {
            Ok(output)
        }
    }

    fn close_conditionals(&mut self, file: FileId) -> Result<(), ()> {
        let mut result = Ok(());
        while self
            .conditionals
            .last()
            .map_or(false, |c| c.span.file == file)
        {
            if let Some(c) = self.conditionals.pop() {
                result = self
                    .ec
                    .record_error(CompileError::UnterminatedConditional, c.span);
            }
        }
        result
    }

    fn directive(&mut self, queue: &mut VecDeque<Token>) -> Result<(), ()> {
        let mut line = read_line(queue);
        if line.is_empty() {
            return Ok(());
        }
        let name = line.remove(0);
        let span = name.span;
        if name.kind == TokenKind::Number {
            // line marker
            return Ok(());
        }
        match name.text.as_str() {
            "include" => self.include(line, span, queue),
            "define" => self.define(line, span),
            "undef" => {
                let id = self.macro_name(&line, "undef", span)?;
                self.macros.remove(&id);
                Ok(())
            }
            "if" => {
                let cond = self.eval_condition(line, span);
                self.push_conditional(*cond.as_ref().unwrap_or(&false), span, queue);
                cond.map(|_| ())
            }
            "ifdef" | "ifndef" => {
                let id = self.macro_name(&line, &name.text, span);
                let cond = id.map(|id| self.macros.contains_key(&id) == (name.text == "ifdef"));
                self.push_conditional(*cond.as_ref().unwrap_or(&false), span, queue);
                cond.map(|_| ())
            }
            "elif" | "elifdef" | "elifndef" => self.elif(&name.text, line, span, queue),
            "else" => {
                let included = match self.conditionals.last_mut() {
                    Some(c) if c.ctx != CondContext::Else => {
                        c.ctx = CondContext::Else;
                        let included = c.included;
                        c.included = true;
                        included
                    }
                    _ => {
                        self.ec
                            .record_error(CompileError::UnmatchedDirective("else".to_string()), span)?;
                        unreachable!()
                    }
                };
                if included {
                    skip_group(queue);
                }
                Ok(())
            }
            "endif" => match self.conditionals.pop() {
                Some(_) => Ok(()),
                None => self
                    .ec
                    .record_error(CompileError::UnmatchedDirective("endif".to_string()), span),
            },
            "error" => self
                .ec
                .record_error(CompileError::UserError(lexer::spell(&line)), span),
            "warning" => self
                .ec
                .record_warning(CompileWarning::UserWarning(lexer::spell(&line)), span),
            "pragma" => self.pragma(line, span),
            "line" | "ident" | "sccs" => Ok(()),
            s => self
                .ec
                .record_error(CompileError::InvalidDirective(s.to_string()), span),
        }
    }

    fn push_conditional(&mut self, included: bool, span: Span, queue: &mut VecDeque<Token>) {
        self.conditionals.push(Conditional {
            ctx: CondContext::Then,
            included,
            span,
        });
        if !included {
            skip_group(queue);
        }
    }

    fn elif(
        &mut self,
        directive: &str,
        line: Vec<Token>,
        span: Span,
        queue: &mut VecDeque<Token>,
    ) -> Result<(), ()> {
        let included = match self.conditionals.last_mut() {
            Some(c) if c.ctx != CondContext::Else => {
                c.ctx = CondContext::Elif;
                c.included
            }
            _ => {
                skip_group(queue);
                return self
                    .ec
                    .record_error(CompileError::UnmatchedDirective(directive.to_string()), span);
            }
        };
        if included {
            skip_group(queue);
            return Ok(());
        }
        let cond = match directive {
            "elif" => self.eval_condition(line, span),
            _ => self
                .macro_name(&line, directive, span)
                .map(|id| self.macros.contains_key(&id) == (directive == "elifdef")),
        };
        if *cond.as_ref().unwrap_or(&false) {
            if let Some(c) = self.conditionals.last_mut() {
                c.included = true;
            }
        } else {
            skip_group(queue);
        }
        cond.map(|_| ())
    }

    fn macro_name(&mut self, line: &[Token], directive: &str, span: Span) -> Result<String, ()> {
        match line.first() {
            Some(t) if t.kind == TokenKind::Ident => Ok(t.text.clone()),
            _ => {
                self.ec
                    .record_error(CompileError::MissingMacroName(directive.to_string()), span)?;
                unreachable!()
            }
        }
    }

    /**
     * Evaluate an `#if` condition: resolve `defined`, expand macros, replace the remaining
     * identifiers with 0 and compute the value in `intmax_t`/`uintmax_t`.
     */
    fn eval_condition(&mut self, line: Vec<Token>, span: Span) -> Result<bool, ()> {
        let mut resolved = Vec::new();
        let mut it = line.into_iter().peekable();
        while let Some(tok) = it.next() {
            if !tok.is_ident("defined") {
                resolved.push(tok);
                continue;
            }
            let paren = it.peek().map_or(false, |t| t.is_punct("("));
            if paren {
                it.next();
            }
            let id = match it.next() {
                Some(t) if t.kind == TokenKind::Ident => t.text,
                other => {
                    self.ec.record_error(
                        CompileError::Expected(
                            "macro name after `defined'".to_string(),
                            other.map(|t| t.text).unwrap_or_default(),
                        ),
                        tok.span,
                    )?;
                    unreachable!()
                }
            };
            if paren {
                match it.next() {
                    Some(t) if t.is_punct(")") => (),
                    other => {
                        self.ec.record_error(
                            CompileError::Expected(
                                "`)'".to_string(),
                                other.map(|t| t.text).unwrap_or_default(),
                            ),
                            tok.span,
                        )?;
                        unreachable!()
                    }
                }
            }
            let value = if self.macros.contains_key(&id) { "1" } else { "0" };
            resolved.push(synthesized(TokenKind::Number, value, &tok));
        }

        let expanded = self.expand_all(resolved)?;
        let tokens: Vec<Token> = expanded
            .into_iter()
            .map(|t| {
                if t.kind != TokenKind::Ident {
                    t
                } else if t.text == "true" {
                    synthesized(TokenKind::Number, "1", &t)
                } else if t.text == "false" {
                    synthesized(TokenKind::Number, "0", &t)
                } else if parser::is_keyword(&t.text, self.lang) {
                    t
                } else {
                    synthesized(TokenKind::Number, "0", &t)
                }
            })
            .collect();
        if tokens.is_empty() {
            self.ec.record_error(
                CompileError::Expected("expression".to_string(), "end of line".to_string()),
                span,
            )?;
            unreachable!()
        }

        let expr = parser::parse_constant_expression(tokens, self.lang, self.ec)?;
        let expr_span = expr.span;
        let mut env = Env::new_preprocessor(self.machine, self.lang);
        let value = constant::compute_constant_expr(expr, &mut env, self.ec)?;
        if !value.t.t.is_integer() {
            self.ec
                .record_error(CompileError::NotIntegerConstant, expr_span)?;
            unreachable!()
        }
        Ok(!value.is_zero())
    }

    fn define(&mut self, line: Vec<Token>, span: Span) -> Result<(), ()> {
        let mut it = line.into_iter().peekable();
        let name = match it.next() {
            Some(t) if t.kind == TokenKind::Ident => t,
            _ => {
                self.ec
                    .record_error(CompileError::MissingMacroName("define".to_string()), span)?;
                unreachable!()
            }
        };
        if name.text == "defined" {
            self.ec.record_error(
                CompileError::MacroParameterError("`defined' cannot be used as a macro name".to_string()),
                name.span,
            )?;
        }
        let kind = if it
            .peek()
            .map_or(false, |t| t.is_punct("(") && !t.leading_space)
        {
            it.next();
            let (params, variadic) = self.parse_params(&mut it, &name)?;
            MacroKind::Function { params, variadic }
        } else {
            MacroKind::Object
        };
        let mut body: Vec<Token> = it.collect();
        if let Some(first) = body.first_mut() {
            first.leading_space = false;
        }
        let m = Macro { kind, body };
        self.check_body(&m, &name)?;

        if let Some(old) = self.macros.get(&name.text) {
            if !old.same_definition(&m) {
                self.ec
                    .record_warning(CompileWarning::MacroRedefined(name.text.clone()), name.span)?;
            }
        }
        tracing::trace!(name = %name.text, body = %lexer::spell(&m.body), "define");
        self.macros.insert(name.text, Rc::new(m));
        Ok(())
    }

    fn parse_params<I>(&mut self, it: &mut Peekable<I>, name: &Token) -> Result<(Vec<String>, bool), ()>
    where
        I: Iterator<Item = Token>,
    {
        let mut params: Vec<String> = Vec::new();
        if it.peek().map_or(false, |t| t.is_punct(")")) {
            it.next();
            return Ok((params, false));
        }
        loop {
            let tok = match it.next() {
                Some(t) => t,
                None => return self.param_error(format!("missing `)' in `{}'", name.text), name.span),
            };
            if tok.is_punct("...") {
                params.push("__VA_ARGS__".to_string());
                return match it.next() {
                    Some(t) if t.is_punct(")") => Ok((params, true)),
                    _ => self.param_error("missing `)' after `...'".to_string(), tok.span),
                };
            }
            if tok.kind != TokenKind::Ident {
                return self.param_error(format!("unexpected `{}'", tok.text), tok.span);
            }
            if params.contains(&tok.text) {
                return self.param_error(format!("duplicate parameter `{}'", tok.text), tok.span);
            }
            params.push(tok.text);
            match it.next() {
                Some(t) if t.is_punct(",") => (),
                Some(t) if t.is_punct(")") => return Ok((params, false)),
                Some(t) if t.is_punct("...") => {
                    return match it.next() {
                        Some(t) if t.is_punct(")") => Ok((params, true)),
                        _ => self.param_error("missing `)' after `...'".to_string(), t.span),
                    }
                }
                Some(t) => return self.param_error(format!("unexpected `{}'", t.text), t.span),
                None => return self.param_error(format!("missing `)' in `{}'", name.text), name.span),
            }
        }
    }

    fn param_error<T>(&mut self, msg: String, span: Span) -> Result<T, ()> {
        self.ec
            .record_error(CompileError::MacroParameterError(msg), span)?;
        unreachable!()
    }

    fn check_body(&mut self, m: &Macro, name: &Token) -> Result<(), ()> {
        let body = &m.body;
        let paste_at_edge = body.first().map_or(false, |t| t.is_punct("##"))
            || body.last().map_or(false, |t| t.is_punct("##"));
        if paste_at_edge {
            return self.ec.record_error(CompileError::PasteAtEdge, name.span);
        }
        if m.is_function() {
            for (i, tok) in body.iter().enumerate() {
                if tok.is_punct("#") {
                    let follows_param = body
                        .get(i + 1)
                        .map_or(false, |t| m.params().contains(&t.text));
                    if !follows_param {
                        return self.ec.record_error(CompileError::InvalidStringify, tok.span);
                    }
                }
            }
        }
        Ok(())
    }

    fn include(&mut self, line: Vec<Token>, span: Span, queue: &mut VecDeque<Token>) -> Result<(), ()> {
        let literal = line
            .first()
            .map_or(false, |t| t.kind == TokenKind::Str || t.is_punct("<"));
        let line = if literal { line } else { self.expand_all(line)? };
        let (name, quoted) = match line.first() {
            Some(t) if t.kind == TokenKind::Str => (t.text.trim_matches('"').to_string(), true),
            Some(t) if t.is_punct("<") => match line.iter().position(|t| t.is_punct(">")) {
                Some(end) => (lexer::spell(&line[1..end]), false),
                None => {
                    return self.ec.record_error(
                        CompileError::Expected("`>'".to_string(), "end of line".to_string()),
                        t.span,
                    )
                }
            },
            other => {
                return self.ec.record_error(
                    CompileError::Expected(
                        "\"FILENAME\" or <FILENAME>".to_string(),
                        other.map(|t| t.text.clone()).unwrap_or_default(),
                    ),
                    span,
                )
            }
        };
        if self.include_depth >= MAX_INCLUDE_DEPTH {
            return self.ec.record_error(CompileError::IncludeTooDeep, span);
        }

        let (key, path, text, system) = match self.find_include(&name, quoted, span.file) {
            Some(IncludeTarget::Builtin(text)) => {
                (format!("<builtin>/{}", name), None, text.to_string(), true)
            }
            Some(IncludeTarget::File(path, system)) => match fs::read_to_string(&path) {
                Ok(text) => (file_key(&path), Some(path), text, system),
                Err(e) => {
                    return self
                        .ec
                        .record_error(CompileError::IncludeNotFound(format!("{}: {}", name, e)), span)
                }
            },
            None => return self.ec.record_error(CompileError::IncludeNotFound(name), span),
        };
        if self.once.contains(&key) {
            return Ok(());
        }
        let display_name = match &path {
            Some(path) => path.display().to_string(),
            None => name,
        };
        tracing::debug!(file = %display_name, system, "include");
        let file = self.sm.add_file(display_name, path, text);
        if system {
            self.ec.mark_system_file(file);
        }
        self.file_keys.insert(file, key);
        let tokens = lexer::tokenize(file, &self.sm.get(file).text, self.lang.is_c23(), self.ec)?;
        queue.push_front(self.end_of_file(file));
        for tok in tokens.into_iter().rev() {
            queue.push_front(tok);
        }
        self.include_depth += 1;
        Ok(())
    }

    fn find_include(&self, name: &str, quoted: bool, includer: FileId) -> Option<IncludeTarget> {
        let path = Path::new(name);
        if path.is_absolute() {
            return if path.is_file() {
                Some(IncludeTarget::File(path.to_path_buf(), false))
            } else {
                None
            };
        }
        if quoted {
            let includer_dir = self
                .sm
                .get(includer)
                .path
                .as_ref()
                .and_then(|p| p.parent())
                .map(Path::to_path_buf);
            for dir in includer_dir.iter().chain(self.paths.quote.iter()) {
                let candidate = dir.join(name);
                if candidate.is_file() {
                    return Some(IncludeTarget::File(candidate, false));
                }
            }
        }
        let dirs = self
            .paths
            .angled
            .iter()
            .map(|d| (d, false))
            .chain(self.paths.system.iter().map(|d| (d, true)));
        for (dir, system) in dirs {
            let candidate = dir.join(name);
            if candidate.is_file() {
                return Some(IncludeTarget::File(candidate, system));
            }
        }
        if self.paths.builtin {
            headers::get_builtin_header(name).map(IncludeTarget::Builtin)
        } else {
            None
        }
    }

    fn pragma(&mut self, line: Vec<Token>, span: Span) -> Result<(), ()> {
        match line.first().map(|t| t.text.as_str()) {
            Some("once") => {
                let key = match self.file_keys.get(&span.file) {
                    Some(key) => key.clone(),
                    None => self.sm.get(span.file).name.clone(),
                };
                self.once.insert(key);
                Ok(())
            }
            Some("GCC") if line.get(1).map_or(false, |t| t.is_ident("system_header")) => {
                self.ec.mark_system_file(span.file);
                Ok(())
            }
            None | Some("STDC") | Some("GCC") | Some("clang") => Ok(()),
            Some(_) => self
                .ec
                .record_warning(CompileWarning::UnknownPragma(lexer::spell(&line)), span),
        }
    }

    /**
     * Expand every macro in a token list that is not followed by more input, such as a
     * macro argument or an `#if` line.
     */
    fn expand_all(&mut self, tokens: Vec<Token>) -> Result<Vec<Token>, ()> {
        let mut queue: VecDeque<Token> = tokens.into();
        let mut output = Vec::new();
        while let Some(tok) = queue.pop_front() {
            if tok.kind == TokenKind::Ident && self.expand_macro(&tok, &mut queue)? {
                continue;
            }
            output.push(tok);
        }
        Ok(output)
    }

    /**
     * Replace a macro invocation starting at `tok` with its expansion at the front of
     * `queue`. Returns false when `tok` is not an invocation.
     */
    fn expand_macro(&mut self, tok: &Token, queue: &mut VecDeque<Token>) -> Result<bool, ()> {
        if tok.is_hidden(&tok.text) {
            return Ok(false);
        }
        let m = match self.macros.get(&tok.text) {
            Some(m) => m.clone(),
            None => return Ok(false),
        };
        let (body, hideset, span) = match &m.kind {
            MacroKind::File => {
                let name = format!("{:?}", self.sm.get(tok.span.file).name);
                queue.push_front(synthesized(TokenKind::Str, &name, tok));
                return Ok(true);
            }
            MacroKind::Line => {
                let line = self.sm.get(tok.span.file).line_of(tok.span.start);
                queue.push_front(synthesized(TokenKind::Number, &line.to_string(), tok));
                return Ok(true);
            }
            MacroKind::Object => {
                let mut hideset = (*tok.hideset).clone();
                hideset.insert(tok.text.clone());
                (self.substitute(&m, &[])?, hideset, tok.span)
            }
            MacroKind::Function { params, variadic } => {
                if !queue.front().map_or(false, |t| t.is_punct("(")) {
                    return Ok(false);
                }
                queue.pop_front();
                let (args, rparen) = self.collect_args(tok, queue)?;
                let args = self.match_args(tok, params.len(), *variadic, args)?;
                let mut hideset: HashSet<String> =
                    tok.hideset.intersection(&rparen.hideset).cloned().collect();
                hideset.insert(tok.text.clone());
                (self.substitute(&m, &args)?, hideset, tok.span.join(rparen.span))
            }
        };

        let mut first = true;
        let ec = &*self.ec;
        let expansion: Vec<Token> = body
            .into_iter()
            .map(|mut t| {
                let mut hs = (*t.hideset).clone();
                hs.extend(hideset.iter().cloned());
                t.hideset = Rc::new(hs);
                let system_macro = t.span.system_macro || ec.is_system_file(t.span.file);
                t.span = span.with_system_macro(system_macro);
                if first {
                    t.leading_space = tok.leading_space;
                    t.at_bol = tok.at_bol;
                    first = false;
                } else {
                    t.at_bol = false;
                }
                t
            })
            .collect();
        for t in expansion.into_iter().rev() {
            queue.push_front(t);
        }
        Ok(true)
    }

    fn collect_args(&mut self, name: &Token, queue: &mut VecDeque<Token>) -> Result<(Vec<Vec<Token>>, Token), ()> {
        let mut args: Vec<Vec<Token>> = vec![Vec::new()];
        let mut depth = 0;
        loop {
            let tok = match queue.pop_front() {
                Some(t) if t.kind != TokenKind::EndOfFile => t,
                other => {
                    if let Some(eof) = other {
                        queue.push_front(eof);
                    }
                    self.ec.record_error(
                        CompileError::UnterminatedMacroCall(name.text.clone()),
                        name.span,
                    )?;
                    unreachable!()
                }
            };
            if tok.is_punct("(") {
                depth += 1;
            } else if tok.is_punct(")") {
                if depth == 0 {
                    return Ok((args, tok));
                }
                depth -= 1;
            } else if tok.is_punct(",") && depth == 0 {
                args.push(Vec::new());
                continue;
            }
            if let Some(arg) = args.last_mut() {
                arg.push(tok);
            }
        }
    }

    /**
     * Check the argument count; the variadic parameter collects the trailing arguments
     * with their commas and may be omitted.
     */
    fn match_args(
        &mut self,
        name: &Token,
        nparams: usize,
        variadic: bool,
        mut args: Vec<Vec<Token>>,
    ) -> Result<Vec<Vec<Token>>, ()> {
        if nparams == 0 && args.len() == 1 && args[0].is_empty() {
            args.clear();
        }
        if variadic {
            let fixed = nparams - 1;
            if args.len() < fixed {
                self.ec.record_error(
                    CompileError::MacroArgCount(name.text.clone(), fixed, args.len()),
                    name.span,
                )?;
            }
            let rest = args.split_off(fixed);
            let mut va = Vec::new();
            for (i, arg) in rest.into_iter().enumerate() {
                if i > 0 {
                    va.push(Token::new(TokenKind::Punct, ",", name.span));
                }
                va.extend(arg);
            }
            args.push(va);
        } else if args.len() != nparams {
            self.ec.record_error(
                CompileError::MacroArgCount(name.text.clone(), nparams, args.len()),
                name.span,
            )?;
        }
        Ok(args)
    }

    /**
     * Replace parameters in the body. Operands of `#` and `##` take the argument as written,
     * other occurrences take it fully expanded.
     */
    fn substitute(&mut self, m: &Macro, args: &[Vec<Token>]) -> Result<Vec<Token>, ()> {
        let params = m.params();
        let param_index = |t: &Token| {
            if t.kind == TokenKind::Ident {
                params.iter().position(|p| *p == t.text)
            } else {
                None
            }
        };
        let mut expanded: Vec<Option<Vec<Token>>> = vec![None; args.len()];
        let body = &m.body;
        let mut out: Vec<Token> = Vec::new();
        let mut i = 0;
        while i < body.len() {
            let tok = &body[i];
            if m.is_function() && tok.is_punct("#") {
                if let Some(p) = body.get(i + 1).and_then(param_index) {
                    out.push(stringize(&args[p], tok));
                    i += 2;
                    continue;
                }
            }
            if tok.is_punct("##") {
                if let Some(rhs) = body.get(i + 1) {
                    match param_index(rhs) {
                        Some(p) => {
                            if let Some((first, rest)) = args[p].split_first() {
                                self.paste(&mut out, first)?;
                                out.extend(rest.iter().cloned());
                            }
                        }
                        None => self.paste(&mut out, rhs)?,
                    }
                }
                i += 2;
                continue;
            }
            if let Some(p) = param_index(tok) {
                if body.get(i + 1).map_or(false, |t| t.is_punct("##")) {
                    if args[p].is_empty() {
                        // an empty left operand leaves the right one as written
                        if let Some(rhs) = body.get(i + 2) {
                            match param_index(rhs) {
                                Some(q) => out.extend(args[q].iter().cloned()),
                                None => out.push(rhs.clone()),
                            }
                        }
                        i += 3;
                        continue;
                    }
                    out.extend(args[p].iter().cloned());
                } else {
                    let arg = match expanded[p].clone() {
                        Some(arg) => arg,
                        None => {
                            let arg = self.expand_all(args[p].clone())?;
                            expanded[p] = Some(arg.clone());
                            arg
                        }
                    };
                    let start = out.len();
                    out.extend(arg);
                    if let Some(first) = out.get_mut(start) {
                        first.leading_space = tok.leading_space;
                    }
                }
                i += 1;
                continue;
            }
            out.push(tok.clone());
            i += 1;
        }
        Ok(out)
    }

    /**
     * Glue `rhs` to the last token of `out`. The result must lex as a single token.
     */
    fn paste(&mut self, out: &mut Vec<Token>, rhs: &Token) -> Result<(), ()> {
        let lhs = match out.pop() {
            Some(t) => t,
            None => {
                out.push(rhs.clone());
                return Ok(());
            }
        };
        let text = format!("{}{}", lhs.text, rhs.text);
        let mut scratch = ErrorCollector::new();
        let tokens = lexer::tokenize(lhs.span.file, &text, self.lang.is_c23(), &mut scratch);
        let system_macro = lhs.span.system_macro
            || rhs.span.system_macro
            || self.ec.is_system_file(lhs.span.file)
            || self.ec.is_system_file(rhs.span.file);
        match tokens {
            Ok(tokens) if tokens.len() == 1 && !scratch.has_errors() => {
                for mut tok in tokens {
                    tok.span = lhs.span.with_system_macro(system_macro);
                    tok.leading_space = lhs.leading_space;
                    tok.at_bol = lhs.at_bol;
                    tok.hideset = lhs.hideset.clone();
                    out.push(tok);
                }
                Ok(())
            }
            _ => self.ec.record_error(CompileError::InvalidPaste(text), lhs.span),
        }
    }
}

fn is_directive(tok: &Token) -> bool {
    // tokens produced by macro expansion never start a directive
    tok.is_punct("#") && tok.at_bol && tok.hideset.is_empty()
}

/**
 * Take the rest of the directive line.
 */
fn read_line(queue: &mut VecDeque<Token>) -> Vec<Token> {
    let mut line = Vec::new();
    while queue.front().map_or(false, |t| !t.at_bol) {
        if let Some(t) = queue.pop_front() {
            line.push(t);
        }
    }
    line
}

/**
 * Drop tokens up to the next `#elif`, `#else` or `#endif` of the current conditional, which
 * is left in the queue.
 */
fn skip_group(queue: &mut VecDeque<Token>) {
    let mut depth = 0;
    loop {
        let stop = match queue.front() {
            None => true,
            Some(t) if t.kind == TokenKind::EndOfFile => true,
            Some(t) if is_directive(t) => match queue.get(1).filter(|n| !n.at_bol) {
                Some(name) => match name.text.as_str() {
                    "if" | "ifdef" | "ifndef" => {
                        depth += 1;
                        false
                    }
                    "elif" | "elifdef" | "elifndef" | "else" => depth == 0,
                    "endif" => {
                        if depth == 0 {
                            true
                        } else {
                            depth -= 1;
                            false
                        }
                    }
                    _ => false,
                },
                None => false,
            },
            Some(_) => false,
        };
        if stop {
            return;
        }
        queue.pop_front();
    }
}

fn synthesized(kind: TokenKind, text: &str, like: &Token) -> Token {
    let mut tok = Token::new(kind, text, like.span);
    tok.leading_space = like.leading_space;
    tok.at_bol = like.at_bol;
    tok.hideset = like.hideset.clone();
    tok
}

fn stringize(arg: &[Token], hash: &Token) -> Token {
    let mut s = String::from("\"");
    for (i, t) in arg.iter().enumerate() {
        if i > 0 && t.leading_space {
            s.push(' ');
        }
        if matches!(t.kind, TokenKind::Str | TokenKind::Char) {
            for c in t.text.chars() {
                if c == '"' || c == '\\' {
                    s.push('\\');
                }
                s.push(c);
            }
        } else {
            s.push_str(&t.text);
        }
    }
    s.push('"');
    synthesized(TokenKind::Str, &s, hash)
}

fn file_key(path: &Path) -> String {
    fs::canonicalize(path)
        .unwrap_or_else(|_| path.to_path_buf())
        .display()
        .to_string()
}

/**
 * Text of the preprocessed token stream for `-E`.
 */
pub fn print_tokens(tokens: &[Token]) -> String {
    let mut s = String::new();
    for (i, t) in tokens.iter().enumerate() {
        if i > 0 {
            if t.at_bol {
                s.push('\n');
            } else if t.leading_space {
                s.push(' ');
            }
        }
        s.push_str(&t.text);
    }
    if !tokens.is_empty() {
        s.push('\n');
    }
    s
}

/**
 * Suffix that gives an integer literal the type `t`. Types narrower than `int` have none.
 */
fn literal_suffix(t: &CType, m: &Machine) -> &'static str {
    match t {
        CType::Int(IntKind::Long, true) => "L",
        CType::Int(IntKind::Long, false) => "UL",
        CType::Int(IntKind::LongLong, true) => "LL",
        CType::Int(IntKind::LongLong, false) => "ULL",
        CType::Int(_, false) if t.width(m) == ctype::UINT_TYPE.width(m) => "U",
        _ => "",
    }
}

fn max_literal(t: &CType, m: &Machine) -> String {
    format!("{}{}", t.max_value(m).unwrap_or_default(), literal_suffix(t, m))
}

fn min_literal(t: &CType, m: &Machine) -> String {
    if t.is_signed() {
        format!("(-{} - 1)", max_literal(t, m))
    } else {
        format!("0{}", literal_suffix(t, m))
    }
}

/**
 * Macros every translation unit starts with, derived from the target and the dialect.
 */
fn predefined_macros(m: &Machine, lang: &LangOptions) -> Vec<(String, String)> {
    let mut defs: Vec<(String, String)> = Vec::new();
    macro_rules! def {
        ($name:expr, $value:expr) => {
            defs.push(($name.to_string(), $value.to_string()))
        };
    }
    let width = |t: &CType| t.width(m).unwrap_or(0);

    def!("__STDC__", 1);
    if let Some(version) = lang.stdc_version() {
        def!("__STDC_VERSION__", version);
    }
    def!("__STDC_HOSTED__", if lang.hosted { 1 } else { 0 });
    if !lang.gnu {
        def!("__STRICT_ANSI__", 1);
    }
    def!("__STDC_UTF_16__", 1);
    def!("__STDC_UTF_32__", 1);

    match m.arch {
        Arch::X86_64 => {
            def!("__x86_64__", 1);
            def!("__x86_64", 1);
            def!("__amd64__", 1);
            def!("__amd64", 1);
        }
        Arch::Aarch64 => def!("__aarch64__", 1),
        Arch::Riscv64 | Arch::Riscv32 => {
            def!("__riscv", 1);
            def!("__riscv_xlen", m.ptr_size as u32 * machine::CHAR_BIT);
        }
        Arch::Powerpc64 => {
            def!("__powerpc64__", 1);
            def!("__PPC64__", 1);
        }
        Arch::X86 => {
            def!("__i386__", 1);
            def!("__i386", 1);
            if lang.gnu {
                def!("i386", 1);
            }
        }
        Arch::Arm => def!("__arm__", 1),
        Arch::Avr => {
            def!("__AVR__", 1);
            def!("__AVR", 1);
        }
        Arch::Msp430 => def!("__MSP430__", 1),
    }
    match m.os {
        Os::Linux => {
            def!("__linux__", 1);
            def!("__linux", 1);
            def!("__gnu_linux__", 1);
            def!("__unix__", 1);
            def!("__unix", 1);
            def!("__ELF__", 1);
            if lang.gnu {
                def!("linux", 1);
                def!("unix", 1);
            }
        }
        Os::Windows => {
            def!("_WIN32", 1);
            if m.is_64bit() {
                def!("_WIN64", 1);
            }
        }
        Os::Darwin => {
            def!("__APPLE__", 1);
            def!("__MACH__", 1);
        }
        Os::FreeBsd => {
            def!("__FreeBSD__", 14);
            def!("__unix__", 1);
            def!("__ELF__", 1);
        }
        Os::None => (),
    }

    def!("__CHAR_BIT__", machine::CHAR_BIT);
    if !m.char_signed {
        def!("__CHAR_UNSIGNED__", 1);
    }

    let size_t = ctype::size_type(m);
    let ptrdiff_t = ctype::std_int_type(m.ptr_int_type(), true);
    let uintptr_t = ctype::std_int_type(m.ptr_int_type(), false);
    let wchar_t = ctype::wchar_type(m);
    let intmax_t = ctype::intmax_type(m, true);
    let uintmax_t = ctype::intmax_type(m, false);

    def!("__SIZEOF_SHORT__", m.short_size);
    def!("__SIZEOF_INT__", m.int_size);
    def!("__SIZEOF_LONG__", m.long_size);
    def!("__SIZEOF_LONG_LONG__", m.llong_size);
    def!("__SIZEOF_POINTER__", m.ptr_size);
    def!("__SIZEOF_SIZE_T__", m.ptr_size);
    def!("__SIZEOF_PTRDIFF_T__", m.ptr_size);
    def!("__SIZEOF_WCHAR_T__", m.size_of(m.wchar_type().0));
    if m.int128 {
        def!("__SIZEOF_INT128__", 16);
    }

    for (name, t) in [
        ("SIZE", &size_t),
        ("PTRDIFF", &ptrdiff_t),
        ("WCHAR", &wchar_t),
        ("INTMAX", &intmax_t),
        ("UINTMAX", &uintmax_t),
        ("INTPTR", &ptrdiff_t),
        ("UINTPTR", &uintptr_t),
    ] {
        def!(format!("__{}_TYPE__", name), t);
        def!(format!("__{}_MAX__", name), max_literal(t, m));
    }
    def!("__WCHAR_MIN__", min_literal(&wchar_t, m));
    def!("__INTMAX_C_SUFFIX__", literal_suffix(&intmax_t, m));
    def!("__UINTMAX_C_SUFFIX__", literal_suffix(&uintmax_t, m));

    for (name, t) in [
        ("SCHAR", &ctype::SCHAR_TYPE),
        ("SHRT", &ctype::SHORT_TYPE),
        ("INT", &ctype::INT_TYPE),
        ("LONG", &ctype::LONG_TYPE),
        ("LONG_LONG", &ctype::LLONG_TYPE),
    ] {
        def!(format!("__{}_MAX__", name), max_literal(t, m));
        def!(format!("__{}_WIDTH__", name), width(t));
    }
    for (name, t) in [
        ("PTRDIFF", &ptrdiff_t),
        ("SIZE", &size_t),
        ("WCHAR", &wchar_t),
        ("INTPTR", &ptrdiff_t),
        ("INTMAX", &intmax_t),
    ] {
        def!(format!("__{}_WIDTH__", name), width(t));
    }
    def!("__BITINT_MAXWIDTH__", machine::BITINT_MAXWIDTH);

    for bits in [8, 16, 32, 64] {
        if let Some(kind) = m.exact_width_type(bits) {
            let signed = ctype::std_int_type(kind, true);
            let unsigned = ctype::std_int_type(kind, false);
            def!(format!("__INT{}_TYPE__", bits), signed);
            def!(format!("__UINT{}_TYPE__", bits), unsigned);
            def!(format!("__INT{}_MAX__", bits), max_literal(&signed, m));
            def!(format!("__UINT{}_MAX__", bits), max_literal(&unsigned, m));
            def!(format!("__INT{}_C_SUFFIX__", bits), literal_suffix(&signed, m));
            def!(format!("__UINT{}_C_SUFFIX__", bits), literal_suffix(&unsigned, m));
        }
    }

    def!("__ORDER_LITTLE_ENDIAN__", 1234);
    def!("__ORDER_BIG_ENDIAN__", 4321);
    def!("__ORDER_PDP_ENDIAN__", 3412);
    if m.little_endian {
        def!("__BYTE_ORDER__", "__ORDER_LITTLE_ENDIAN__");
    } else {
        def!("__BYTE_ORDER__", "__ORDER_BIG_ENDIAN__");
    }
    if m.long_size == 8 && m.ptr_size == 8 {
        def!("__LP64__", 1);
        def!("_LP64", 1);
    }
    if m.int_size == 4 && m.long_size == 4 && m.ptr_size == 4 {
        def!("__ILP32__", 1);
        def!("_ILP32", 1);
    }
    defs
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_suffixes() {
        let m = Machine::default();
        assert_eq!(literal_suffix(&ctype::LONG_TYPE, &m), "L");
        assert_eq!(literal_suffix(&ctype::UINT_TYPE, &m), "U");
        assert_eq!(literal_suffix(&ctype::USHORT_TYPE, &m), "");
        assert_eq!(max_literal(&ctype::ULONG_TYPE, &m), "18446744073709551615UL");
        assert_eq!(min_literal(&ctype::INT_TYPE, &m), "(-2147483647 - 1)");
    }

    #[test]
    fn test_predefined_lp64() {
        let m = Machine::default();
        let lang = LangOptions::default();
        let defs: HashMap<String, String> = predefined_macros(&m, &lang).into_iter().collect();
        assert_eq!(defs["__SIZEOF_INT128__"], "16");
        assert_eq!(defs["__INT64_TYPE__"], "long");
        assert_eq!(defs["__INT64_C_SUFFIX__"], "L");
        assert_eq!(defs["__UINT32_C_SUFFIX__"], "U");
        assert_eq!(defs["__INTMAX_MAX__"], "9223372036854775807L");
        assert_eq!(defs["__SIZE_TYPE__"], "unsigned long");
        assert_eq!(defs["__STDC_VERSION__"], "201710L");
        assert!(defs.contains_key("__LP64__"));
        assert!(!defs.contains_key("__STRICT_ANSI__"));
    }

    #[test]
    fn test_predefined_i386() {
        let m = Machine::from_triple("i386-linux").unwrap();
        let lang = LangOptions::default();
        let defs: HashMap<String, String> = predefined_macros(&m, &lang).into_iter().collect();
        assert!(!defs.contains_key("__SIZEOF_INT128__"));
        assert_eq!(defs["__INT64_TYPE__"], "long long");
        assert_eq!(defs["__INT64_C_SUFFIX__"], "LL");
        assert!(defs.contains_key("__ILP32__"));
    }

    #[test]
    fn test_skip_group_nesting() {
        let mut ec = ErrorCollector::new();
        let src = "#if 1\nA\n#endif\nB\n#else\nC\n";
        let tokens = lexer::tokenize(FileId(0), src, false, &mut ec).unwrap();
        let mut queue: VecDeque<Token> = tokens.into();
        skip_group(&mut queue);
        let rest: Vec<String> = queue.iter().map(|t| t.text.clone()).collect();
        assert_eq!(rest, vec!["#", "else", "C"]);
    }
}
