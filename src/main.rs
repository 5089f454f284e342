mod ast;
mod cmdline;
mod constant;
mod ctype;
mod error;
mod headers;
mod lexer;
mod literal;
mod machine;
mod name_scope;
mod parser;
mod preprocess;
mod span;
mod string;
mod translation_unit;
mod type_builder;
mod value;

#[cfg(test)]
mod test;

#[macro_use]
extern crate static_assertions;

#[macro_use]
extern crate lazy_static;

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::exit;

use crate::cmdline::Cli;
use crate::error::ErrorCollector;
use crate::machine::Machine;
use crate::preprocess::{Preprocessor, SearchPaths};
use crate::span::SourceMap;
use crate::translation_unit::TranslationUnit;

fn init_tracing(verbose: bool) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr).with_target(false))
        .with(filter)
        .init();
}

fn fail(msg: &str) -> ! {
    eprintln!("extint-cc: error: {}", msg);
    exit(1);
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let mut machine = match Machine::from_triple(cli.get_target()) {
        Ok(m) => m,
        Err(e) => fail(&e.to_string()),
    };
    if let Some(signed) = cli.char_signed {
        machine.char_signed = signed;
    }
    let lang = cli.get_lang_options();
    tracing::debug!(triple = %machine.triple, std = ?lang.std, gnu = lang.gnu, "configured");

    let input = cli.get_input();
    let text = match fs::read_to_string(input) {
        Ok(text) => text,
        Err(e) => fail(&format!("{}: {}", input.display(), e)),
    };
    let mut sm = SourceMap::new();
    let file = sm.add_file(input.display().to_string(), Some(input.clone()), text);

    let paths = SearchPaths {
        quote: cli.iquote.iter().map(PathBuf::from).collect(),
        angled: cli.include.iter().map(PathBuf::from).collect(),
        system: cli.isystem.iter().map(PathBuf::from).collect(),
        builtin: !cli.nostdinc,
    };
    let mut ec = ErrorCollector::with_options(cli.warnings.clone());

    tracing::debug!(file = %input.display(), "preprocess");
    let (tokens, text) = {
        let mut pp = Preprocessor::new(&machine, &lang, &paths, &mut sm, &mut ec);
        let tokens = pp
            .define_macros(&cli.macros)
            .and_then(|_| pp.preprocess_file(file));
        let text = match &tokens {
            Ok(_) if cli.preprocess_only && cli.dump_macros => Some(pp.dump_macros()),
            Ok(tokens) if cli.preprocess_only => Some(preprocess::print_tokens(tokens)),
            _ => None,
        };
        (tokens, text)
    };
    if let Some(text) = text {
        write_output(cli.output.as_ref(), &text);
        ec.print_issues(&sm, cli.diagnostics_format);
        exit(if ec.has_errors() { 1 } else { 0 });
    }
    let tokens = match tokens {
        Ok(tokens) => tokens,
        Err(()) => {
            ec.print_issues(&sm, cli.diagnostics_format);
            exit(1);
        }
    };

    tracing::debug!(tokens = tokens.len(), "parse");
    let typedefs = translation_unit::builtin_typedefs(&machine);
    let typedef_names: Vec<&str> = typedefs.iter().map(|(name, _)| *name).collect();
    let unit = parser::parse_translation_unit(tokens, &typedef_names, &lang, &mut ec);

    let result = if ec.has_errors() {
        Err(())
    } else {
        tracing::debug!(declarations = unit.0.len(), "translate");
        TranslationUnit::translate(unit, &machine, &lang, &mut ec).map(|_| ())
    };
    ec.print_issues(&sm, cli.diagnostics_format);
    if result.is_err() || ec.has_errors() {
        exit(1);
    }
}

fn write_output(output: Option<&PathBuf>, text: &str) {
    match output {
        Some(path) => {
            if let Err(e) = File::create(path).and_then(|mut f| write!(f, "{}", text)) {
                fail(&format!("cannot open {} for writing: {}", path.display(), e));
            }
        }
        None => print!("{}", text),
    }
}
