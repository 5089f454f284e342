use std::env;
use std::path::PathBuf;
use std::process::exit;

use crate::error::{DiagnosticsFormat, WarningOptions};

#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum Standard {
    C89,
    C99,
    C11,
    C17,
    C23,
}

/**
 * Language dialect options shared by the preprocessor, the parser and the evaluator.
 */
#[derive(Debug, Clone, PartialEq)]
pub struct LangOptions {
    pub std: Standard,
    pub gnu: bool,
    pub hosted: bool,
}

impl LangOptions {
    pub fn new(std: Standard, gnu: bool) -> Self {
        Self {
            std,
            gnu,
            hosted: true,
        }
    }

    pub fn is_c23(&self) -> bool {
        self.std >= Standard::C23
    }

    /**
     * Value of `__STDC_VERSION__`, absent in C89.
     */
    pub fn stdc_version(&self) -> Option<&'static str> {
        match self.std {
            Standard::C89 => None,
            Standard::C99 => Some("199901L"),
            Standard::C11 => Some("201112L"),
            Standard::C17 => Some("201710L"),
            Standard::C23 => Some("202311L"),
        }
    }
}

impl Default for LangOptions {
    fn default() -> Self {
        Self::new(Standard::C17, true)
    }
}

/**
 * `-D` and `-U` options, kept in command line order.
 */
#[derive(Debug, Clone, PartialEq)]
pub enum MacroOption {
    Define(String),
    Undef(String),
}

pub struct Cli {
    /// Log every compilation stage
    pub verbose: bool,

    /// Output file name
    pub output: Option<PathBuf>,

    /// Define and undefine macros
    pub macros: Vec<MacroOption>,

    /// Add directory to the end of the list of include search paths
    pub include: Vec<String>,

    /// Add directory to SYSTEM include search path
    pub isystem: Vec<String>,

    /// Add directory to QUOTE include search path
    pub iquote: Vec<String>,

    /// Don't search builtin headers
    pub nostdinc: bool,

    /// C dialect
    dialect: Option<(Standard, bool)>,

    /// Target triple
    target: Option<String>,

    hosted: Option<bool>,

    /// Overrides signedness of plain `char`
    pub char_signed: Option<bool>,

    pub warnings: WarningOptions,

    pub diagnostics_format: DiagnosticsFormat,

    /// Stop after preprocessing
    pub preprocess_only: bool,

    /// With -E, print macro definitions instead of the token stream
    pub dump_macros: bool,

    /// Input file name
    input: Option<PathBuf>,
}

impl Cli {
    pub fn parse() -> Self {
        let mut args = env::args();
        let prog_name = args.next().unwrap_or_else(|| "extint-cc".to_string());
        Self::parse_from(&prog_name, args)
    }

    pub fn parse_from<I: Iterator<Item = String>>(prog_name: &str, mut args: I) -> Self {
        let mut result = Self::new();
        loop {
            let arg = if let Some(arg) = args.next() {
                arg
            } else {
                break;
            };
            match arg.as_str() {
                "-h" | "-help" | "--help" => {
                    print_help(prog_name);
                    exit(0);
                }

                "-v" => result.verbose = true,

                "-o" => {
                    let path = if let Some(path) = args.next() {
                        path
                    } else {
                        die("Expected filename after '-o'");
                    };
                    result.set_output(&path);
                }
                s if s.starts_with("-o") => {
                    let path = &s[2..];
                    result.set_output(path);
                }

                "-D" => {
                    let val = if let Some(val) = args.next() {
                        val
                    } else {
                        die("Expected value after '-D'");
                    };
                    result.add_define(&val);
                }
                s if s.starts_with("-D") => {
                    let val = &s[2..];
                    result.add_define(val);
                }

                "-U" => {
                    let val = if let Some(val) = args.next() {
                        val
                    } else {
                        die("Expected value after '-U'");
                    };
                    result.add_undef(&val);
                }
                s if s.starts_with("-U") => {
                    let val = &s[2..];
                    result.add_undef(val);
                }

                "-I" => {
                    let val = if let Some(val) = args.next() {
                        val
                    } else {
                        die("Expected value after '-I'");
                    };
                    result.add_include(&val);
                }
                s if s.starts_with("-I") => {
                    let val = &s[2..];
                    result.add_include(val);
                }

                "-isystem" => {
                    let val = if let Some(val) = args.next() {
                        val
                    } else {
                        die("Expected value after '-isystem'");
                    };
                    result.add_isystem(&val);
                }

                "-iquote" => {
                    let val = if let Some(val) = args.next() {
                        val
                    } else {
                        die("Expected value after '-iquote'");
                    };
                    result.add_iquote(&val);
                }

                "-nostdinc" => result.nostdinc = true,

                "-target" => {
                    let val = if let Some(val) = args.next() {
                        val
                    } else {
                        die("Expected value after '-target'");
                    };
                    result.set_target(&val);
                }
                s if s.starts_with("--target=") => {
                    let val = &s["--target=".len()..];
                    result.set_target(val);
                }

                s if s.starts_with("-std=") || s.starts_with("--std=") => {
                    let name = &s[s.find('=').map_or(0, |i| i + 1)..];
                    match parse_standard(name) {
                        Some(d) => result.set_dialect(d),
                        None => die(&format!("Unrecognized C dialect: {}", name)),
                    }
                }

                "-ffreestanding" => result.hosted = Some(false),
                "-fhosted" => result.hosted = Some(true),
                "-fsigned-char" => result.char_signed = Some(true),
                "-funsigned-char" => result.char_signed = Some(false),

                "-fdiagnostics-format=text" => result.diagnostics_format = DiagnosticsFormat::Text,
                "-fdiagnostics-format=json" => result.diagnostics_format = DiagnosticsFormat::Json,
                s if s.starts_with("-fdiagnostics-format=") => {
                    die(&format!("Unrecognized diagnostics format: {}", &s[21..]))
                }

                "-w" => result.warnings.silence_all = true,
                "-pedantic" | "-Wpedantic" => result.warnings.pedantic = true,
                "-Werror" => result.warnings.werror = true,
                "-Wno-error" => result.warnings.werror = false,
                "-Wall" | "-Wextra" => (),
                s if s.starts_with("-Wno-") => {
                    let group = &s[5..];
                    result.warnings.enabled.remove(group);
                    result.warnings.disabled.insert(group.to_string());
                }
                s if s.starts_with("-W") => {
                    let group = &s[2..];
                    result.warnings.disabled.remove(group);
                    result.warnings.enabled.insert(group.to_string());
                }

                "-E" => result.preprocess_only = true,
                "-dM" => result.dump_macros = true,

                "-fsyntax-only" | "-c" | "-S" => (),

                s if s.starts_with('-') && s.len() > 1 => {
                    die(&format!("Unrecognized parameter: {}", s))
                }

                s => result.set_input(s),
            }
        }

        if result.input.is_none() {
            die("No input files");
        }

        result
    }

    pub fn get_lang_options(&self) -> LangOptions {
        let (std, gnu) = self.dialect.unwrap_or((Standard::C17, true));
        LangOptions {
            std,
            gnu,
            hosted: self.hosted.unwrap_or(true),
        }
    }

    pub fn get_target(&self) -> &str {
        self.target.as_deref().unwrap_or("x86_64-linux")
    }

    pub fn get_input(&self) -> &PathBuf {
        match &self.input {
            Some(input) => input,
            None => die("No input files"),
        }
    }

    fn new() -> Self {
        Self {
            verbose: false,
            output: None,
            macros: Vec::new(),
            include: Vec::new(),
            isystem: Vec::new(),
            iquote: Vec::new(),
            nostdinc: false,
            dialect: None,
            target: None,
            hosted: None,
            char_signed: None,
            warnings: WarningOptions::new(),
            diagnostics_format: DiagnosticsFormat::Text,
            preprocess_only: false,
            dump_macros: false,
            input: None,
        }
    }

    fn set_output(&mut self, output: &str) {
        if self.output.is_some() {
            die("Output file must not be specified more than once");
        }
        self.output = Some(PathBuf::from(output));
    }

    fn set_input(&mut self, input: &str) {
        if self.input.is_some() {
            die("Only one input file is supported");
        }
        self.input = Some(PathBuf::from(input));
    }

    fn set_dialect(&mut self, d: (Standard, bool)) {
        self.dialect = Some(d);
    }

    fn set_target(&mut self, target: &str) {
        self.target = Some(target.to_string());
    }

    fn add_define(&mut self, val: &str) {
        self.macros.push(MacroOption::Define(val.to_string()));
    }

    fn add_undef(&mut self, val: &str) {
        self.macros.push(MacroOption::Undef(val.to_string()));
    }

    fn add_include(&mut self, val: &str) {
        self.include.push(val.to_string());
    }

    fn add_isystem(&mut self, val: &str) {
        self.isystem.push(val.to_string());
    }

    fn add_iquote(&mut self, val: &str) {
        self.iquote.push(val.to_string());
    }
}

/**
 * Map a `-std=` value to the standard and the GNU dialect flag.
 */
pub fn parse_standard(name: &str) -> Option<(Standard, bool)> {
    let r = match name {
        "c89" | "c90" | "ansi" | "iso9899:1990" => (Standard::C89, false),
        "gnu89" | "gnu90" => (Standard::C89, true),
        "c99" | "iso9899:1999" => (Standard::C99, false),
        "gnu99" => (Standard::C99, true),
        "c11" | "iso9899:2011" => (Standard::C11, false),
        "gnu11" => (Standard::C11, true),
        "c17" | "c18" | "iso9899:2017" | "iso9899:2018" => (Standard::C17, false),
        "gnu17" | "gnu18" => (Standard::C17, true),
        "c23" | "c2x" | "iso9899:2024" => (Standard::C23, false),
        "gnu23" | "gnu2x" => (Standard::C23, true),
        _ => return None,
    };
    Some(r)
}

fn die(msg: &str) -> ! {
    eprintln!("extint-cc: error: {}", msg);
    exit(2);
}

fn print_help(prog_name: &str) {
    print!(
        "Usage: {} [OPTIONS] <INPUT>

Arguments:
  <INPUT>  Input file name

Options:
  -v                       Log compilation stages to stderr
  -E                       Only preprocess, write the result to stdout or the output file
  -dM                      With -E, print macro definitions
  -fsyntax-only, -c, -S    Check the input, produce no output
  -o <OUTPUT>              Output file name
  -D<name>[=<value>]       Define macro
  -U<name>                 Undefine macro
  -I <dir>                 Add directory to the end of the list of include search paths
  -isystem <dir>           Add directory to SYSTEM include search path
  -iquote <dir>            Add directory to QUOTE include search path
  -nostdinc                Don't search builtin headers
  -std=<standard>          C dialect [possible values: c89, c99, c11, c17, c23, gnu89, gnu99, gnu11, gnu17, gnu23]. Default gnu17.
  --target=<triple>        Target triple. Default x86_64-linux.
  -ffreestanding           Freestanding environment
  -fsigned-char            Plain char is signed
  -funsigned-char          Plain char is unsigned
  -W<group>, -Wno-<group>  Enable or disable a warning group
  -Werror                  Treat warnings as errors
  -w                       Suppress all warnings
  -pedantic                Enable warnings that are off by default
  -fdiagnostics-format=<text|json>
                           Diagnostics output format
  -h, --help               Print help

Environment:
  RUST_LOG                 Log filter used without -v, e.g. RUST_LOG=extint_cc=trace. Default warn.
",
        prog_name
    );
}
