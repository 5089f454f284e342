use crate::cmdline::{LangOptions, Standard};
use crate::error::ErrorCollector;
use crate::lexer::Token;
use crate::machine::Machine;
use crate::parser;
use crate::preprocess::{self, Preprocessor, SearchPaths};
use crate::span::SourceMap;
use crate::translation_unit::{self, TranslationUnit};

pub fn c23() -> LangOptions {
    LangOptions::new(Standard::C23, true)
}

fn run_preprocessor(
    code: &str,
    machine: &Machine,
    lang: &LangOptions,
    sm: &mut SourceMap,
    ec: &mut ErrorCollector,
) -> Result<Vec<Token>, ()> {
    let paths = SearchPaths {
        builtin: true,
        ..Default::default()
    };
    let file = sm.add_file("test.c".to_string(), None, code.to_string());
    let mut pp = Preprocessor::new(machine, lang, &paths, sm, ec);
    pp.define_macros(&[])?;
    pp.preprocess_file(file)
}

pub fn translate_with(
    code: &str,
    triple: &str,
    lang: LangOptions,
) -> (Result<TranslationUnit, ()>, ErrorCollector) {
    let machine = Machine::from_triple(triple).unwrap();
    let mut sm = SourceMap::new();
    let mut ec = ErrorCollector::new();
    let tokens = match run_preprocessor(code, &machine, &lang, &mut sm, &mut ec) {
        Ok(tokens) => tokens,
        Err(()) => return (Err(()), ec),
    };
    let typedefs = translation_unit::builtin_typedefs(&machine);
    let names: Vec<&str> = typedefs.iter().map(|(name, _)| *name).collect();
    let unit = parser::parse_translation_unit(tokens, &names, &lang, &mut ec);
    if ec.has_errors() {
        return (Err(()), ec);
    }
    let tu = TranslationUnit::translate(unit, &machine, &lang, &mut ec);
    (tu, ec)
}

pub fn translate(code: &str) -> (Result<TranslationUnit, ()>, ErrorCollector) {
    translate_with(code, "x86_64-linux", c23())
}

pub fn compile(code: &str) -> (TranslationUnit, ErrorCollector) {
    let (tu, ec) = translate(code);
    assert_eq!(ec.get_first_error(), None);
    assert!(tu.is_ok());
    (tu.unwrap(), ec)
}

pub fn assert_compile_error(code: &str) -> ErrorCollector {
    let (tu, ec) = translate(code);
    assert!(tu.is_err());
    assert!(ec.has_errors());
    ec
}

pub fn preprocess_with(code: &str, lang: LangOptions) -> (Result<String, ()>, ErrorCollector) {
    let machine = Machine::default();
    let mut sm = SourceMap::new();
    let mut ec = ErrorCollector::new();
    let text = run_preprocessor(code, &machine, &lang, &mut sm, &mut ec)
        .map(|tokens| preprocess::print_tokens(&tokens));
    (text, ec)
}

pub fn preprocess(code: &str) -> String {
    let (text, ec) = preprocess_with(code, c23());
    assert_eq!(ec.get_first_error(), None);
    text.unwrap()
}
