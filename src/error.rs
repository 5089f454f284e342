use serde::Serialize;
use std::collections::HashSet;
use std::fmt::Formatter;

use crate::{
    ctype::QualifiedType,
    literal::LiteralError,
    span::{FileId, SourceMap, Span},
    string::StringParseError,
};

#[derive(Debug, PartialEq)]
pub enum CompileError {
    Unimplemented(String),
    UnknownIdentifier(String),
    StaticAssertionFailed {
        expression: String,
        message: Option<String>,
    },
    NotIntegerConstant,
    WarningAsError(CompileWarning),
    // Errors concerning types in declarations
    MultipleStorageClasses,
    WrongStorageClass(String),
    MultipleTypes,
    MultipleSignSpecifiers,
    LongShortTogether,
    TypeTooLong,
    WrongModifiers(String),
    MissingType,
    BadBitIntWidth(String, bool),
    Int128Unsupported,
    IncompleteType(String),
    BadArraySize(String),
    NotAType(String),
    NotAVar(String),
    // Global definition errors
    TypeRedefinition(String),
    ConflictingTypes(String),
    ConflictingStorageClass(String),
    TypedefInitialized,
    ExcessInitializers,
    ArrayTooLarge,
    VarRedefinition(String),
    ConstexprNotInitialized(String),
    ConstexprValueChanged(String),
    EnumValueOutOfRange(String),
    // Constant expression errors
    VariablesForbidden(String),
    CallsForbidden,
    NonConstInConstExpr,
    BadCast(String, String),
    AssignmentToConst,
    DivisionByZero,
    ShiftOutOfRange(String),
    CharParseError(StringParseError),
    LiteralError(LiteralError),
    LiteralTooLarge,
    BitIntLiteralTooWide(u32),
    ForbiddenInPreprocessor(String),
    // General expression error
    ArithmeticTypeRequired,
    IntegerTypeRequired,
    ScalarTypeRequired,
    BadTypesForOperator(String),
    CannotCompare(QualifiedType, QualifiedType),
    IncompatibleTypes(QualifiedType, QualifiedType),
    GenericNoMatch(String),
    GenericDuplicate(String),
    // Syntax errors
    Expected(String, String),
    UnexpectedEof(String),
    InvalidCharacter(char),
    UnterminatedComment,
    UnterminatedLiteral,
    // Preprocessor errors
    IncludeNotFound(String),
    IncludeTooDeep,
    UserError(String),
    UnterminatedConditional,
    UnmatchedDirective(String),
    InvalidDirective(String),
    MissingMacroName(String),
    MacroArgCount(String, usize, usize),
    UnterminatedMacroCall(String),
    InvalidPaste(String),
    PasteAtEdge,
    InvalidStringify,
    MacroParameterError(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum CompileWarning {
    C23Extension(String),
    ImplicitInt,
    EmptyDeclaration,
    IntegerOverflow(String, String),
    ExtendedLiteral(String),
    ImplicitlyUnsignedLiteral,
    MacroRedefined(String),
    UnknownPragma(String),
    UserWarning(String),
    Multichar,
    EmptyTranslationUnit,
    ExternVarInitialized(String),
    DuplicateQualifier(String),
}

impl CompileWarning {
    /**
     * Name of the group the warning belongs to, as used in `-W<group>` and `-Wno-<group>`.
     */
    pub fn group(&self) -> &'static str {
        match self {
            CompileWarning::C23Extension(_) => "c23-extensions",
            CompileWarning::ImplicitInt => "implicit-int",
            CompileWarning::EmptyDeclaration => "missing-declarations",
            CompileWarning::IntegerOverflow(_, _) => "integer-overflow",
            CompileWarning::ExtendedLiteral(_) => "extended-literal",
            CompileWarning::ImplicitlyUnsignedLiteral => "implicitly-unsigned-literal",
            CompileWarning::MacroRedefined(_) => "macro-redefined",
            CompileWarning::UnknownPragma(_) => "unknown-pragmas",
            CompileWarning::UserWarning(_) => "#warnings",
            CompileWarning::Multichar => "multichar",
            CompileWarning::EmptyTranslationUnit => "empty-translation-unit",
            CompileWarning::ExternVarInitialized(_) => "extern-initializer",
            CompileWarning::DuplicateQualifier(_) => "duplicate-decl-specifier",
        }
    }

    /**
     * Groups that stay silent unless requested with `-W<group>` or `-pedantic`.
     */
    fn is_off_by_default(&self) -> bool {
        matches!(self, CompileWarning::EmptyTranslationUnit)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticsFormat {
    Text,
    Json,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WarningOptions {
    pub disabled: HashSet<String>,
    pub enabled: HashSet<String>,
    pub werror: bool,
    pub silence_all: bool,
    pub pedantic: bool,
}

impl WarningOptions {
    pub fn new() -> Self {
        Self {
            disabled: HashSet::new(),
            enabled: HashSet::new(),
            werror: false,
            silence_all: false,
            pedantic: false,
        }
    }

    fn is_enabled(&self, warning: &CompileWarning) -> bool {
        let group = warning.group();
        if self.silence_all || self.disabled.contains(group) {
            false
        } else if warning.is_off_by_default() {
            self.pedantic || self.enabled.contains(group)
        } else {
            true
        }
    }
}

#[derive(Debug)]
enum Issue {
    Error(CompileError),
    Warning(CompileWarning),
}

pub struct ErrorCollector {
    issues: Vec<(Issue, Span)>,
    options: WarningOptions,
    system_files: HashSet<FileId>,
    error_count: usize,
    warning_count: usize,
}

#[derive(Serialize)]
struct JsonLocation {
    file: String,
    line: usize,
    column: usize,
}

#[derive(Serialize)]
struct JsonDiagnostic {
    kind: &'static str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    option: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    location: Option<JsonLocation>,
}

impl ErrorCollector {
    pub fn new() -> Self {
        Self::with_options(WarningOptions::new())
    }

    pub fn with_options(options: WarningOptions) -> Self {
        ErrorCollector {
            issues: Vec::new(),
            options,
            system_files: HashSet::new(),
            error_count: 0,
            warning_count: 0,
        }
    }

    pub fn record_error(&mut self, error: CompileError, span: Span) -> Result<(), ()> {
        self.issues.push((Issue::Error(error), span));
        self.error_count += 1;
        Err(())
    }

    /**
     * Warnings spelled inside system headers are not reported.
     */
    pub fn mark_system_file(&mut self, file: FileId) {
        self.system_files.insert(file);
    }

    pub fn is_system_file(&self, file: FileId) -> bool {
        self.system_files.contains(&file)
    }

    /**
     * Record a warning unless its group is disabled. With `-Werror` it is recorded as an error,
     * but compilation still continues.
     */
    pub fn record_warning(&mut self, warning: CompileWarning, span: Span) -> Result<(), ()> {
        if !self.options.is_enabled(&warning) || span.system_macro || self.is_system_file(span.file) {
            return Ok(());
        }
        if self.options.werror {
            self.issues
                .push((Issue::Error(CompileError::WarningAsError(warning)), span));
            self.error_count += 1;
        } else {
            self.issues.push((Issue::Warning(warning), span));
            self.warning_count += 1;
        }
        Ok(())
    }

    pub fn get_error_count(&self) -> usize {
        self.error_count
    }

    pub fn get_warning_count(&self) -> usize {
        self.warning_count
    }

    pub fn has_errors(&self) -> bool {
        self.error_count > 0
    }

    pub fn print_issues(&self, sm: &SourceMap, format: DiagnosticsFormat) {
        match format {
            DiagnosticsFormat::Text => {
                for line in self.render_text(sm) {
                    eprintln!("{}", line);
                }
            }
            DiagnosticsFormat::Json => eprintln!("{}", self.render_json(sm)),
        }
    }

    pub fn render_text(&self, sm: &SourceMap) -> Vec<String> {
        self.issues
            .iter()
            .map(|(issue, span)| {
                let prefix = match sm.locate(*span) {
                    Some(loc) => format!("{}: ", loc),
                    None => String::new(),
                };
                match issue {
                    Issue::Error(CompileError::WarningAsError(w)) => {
                        format!("{}error: {} [-Werror,-W{}]", prefix, w, w.group())
                    }
                    Issue::Error(e) => format!("{}error: {}", prefix, e),
                    Issue::Warning(w) => format!("{}warning: {} [-W{}]", prefix, w, w.group()),
                }
            })
            .collect()
    }

    pub fn render_json(&self, sm: &SourceMap) -> String {
        let diagnostics: Vec<JsonDiagnostic> = self
            .issues
            .iter()
            .map(|(issue, span)| {
                let (kind, message, option) = match issue {
                    Issue::Error(CompileError::WarningAsError(w)) => {
                        ("error", w.to_string(), Some(format!("-W{}", w.group())))
                    }
                    Issue::Error(e) => ("error", e.to_string(), None),
                    Issue::Warning(w) => ("warning", w.to_string(), Some(format!("-W{}", w.group()))),
                };
                JsonDiagnostic {
                    kind,
                    message,
                    option,
                    location: sm.locate(*span).map(|l| JsonLocation {
                        file: l.file,
                        line: l.line,
                        column: l.column,
                    }),
                }
            })
            .collect();
        serde_json::to_string_pretty(&diagnostics).unwrap_or_else(|_| "[]".to_string())
    }

    #[cfg(test)]
    pub fn get_first_error(&self) -> Option<&CompileError> {
        self.issues.iter().find_map(|(issue, _)| match issue {
            Issue::Error(e) => Some(e),
            Issue::Warning(_) => None,
        })
    }

    #[cfg(test)]
    pub fn get_first_warning(&self) -> Option<&CompileWarning> {
        self.issues.iter().find_map(|(issue, _)| match issue {
            Issue::Warning(w) => Some(w),
            Issue::Error(_) => None,
        })
    }

    #[cfg(test)]
    pub fn get_warnings(&self) -> Vec<&CompileWarning> {
        self.issues
            .iter()
            .filter_map(|(issue, _)| match issue {
                Issue::Warning(w) => Some(w),
                Issue::Error(_) => None,
            })
            .collect()
    }
}

impl std::fmt::Display for CompileError {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), std::fmt::Error> {
        match self {
            CompileError::Unimplemented(s) => write!(f, "unimplemented: {}", &s),
            CompileError::UnknownIdentifier(s) => write!(f, "unknown identifier: {}", &s),
            CompileError::StaticAssertionFailed {
                expression,
                message: None,
            } => write!(f, "static assertion failed due to requirement '{}'", expression),
            CompileError::StaticAssertionFailed {
                expression,
                message: Some(m),
            } => write!(
                f,
                "static assertion failed due to requirement '{}': {}",
                expression, m
            ),
            CompileError::NotIntegerConstant => {
                f.write_str("expression is not an integer constant expression")
            }
            CompileError::WarningAsError(w) => write!(f, "{}", w),
            CompileError::WrongStorageClass(s) => write!(f, "storage class `{}' is not allowed here", s),
            CompileError::MultipleStorageClasses => {
                write!(f, "multiple storage classes in declaration specifiers")
            }
            CompileError::MultipleTypes => {
                write!(f, "two or more data types in declaration specifiers")
            }
            CompileError::MultipleSignSpecifiers => {
                write!(f, "only one signed/unsigned is allowed")
            }
            CompileError::LongShortTogether => write!(f, "long and short cannot be together"),
            CompileError::TypeTooLong => write!(f, "too long"),
            CompileError::WrongModifiers(t) => write!(f, "wrong modifiers for {}", t),
            CompileError::MissingType => f.write_str("type specifier missing, defaults to 'int' is not allowed in C23"),
            CompileError::BadBitIntWidth(n, true) => write!(
                f,
                "signed _BitInt must have a bit size of at least 2 and at most {}, got {}",
                crate::machine::BITINT_MAXWIDTH,
                n
            ),
            CompileError::BadBitIntWidth(n, false) => write!(
                f,
                "unsigned _BitInt must have a bit size of at least 1 and at most {}, got {}",
                crate::machine::BITINT_MAXWIDTH,
                n
            ),
            CompileError::Int128Unsupported => f.write_str("__int128 is not supported on this target"),
            CompileError::IncompleteType(t) => write!(f, "invalid application of sizeof or alignof to an incomplete type `{}'", t),
            CompileError::BadArraySize(n) => write!(f, "array size must be positive, got {}", n),
            CompileError::TypeRedefinition(t) => write!(f, "type `{}' is redefined", t),
            CompileError::ConflictingTypes(s) => write!(f, "conflicting types for {}", s),
            CompileError::ConflictingStorageClass(s) => {
                write!(f, "conflicting storage classes for {}", s)
            }
            CompileError::VariablesForbidden(s) => {
                write!(f, "variable `{}' cannot be used in a constant expression", s)
            }
            CompileError::CallsForbidden => f.write_str("function calls are forbidden here"),
            CompileError::NonConstInConstExpr => {
                f.write_str("non-const value in a constant expression")
            }
            CompileError::BadCast(t1, t2) => write!(f, "bad cast from `{}' to `{}'", t1, t2),
            CompileError::TypedefInitialized => f.write_str("typedef is initialized"),
            CompileError::ExcessInitializers => f.write_str("excess elements in initializer"),
            CompileError::ArrayTooLarge => f.write_str("array is too large"),
            CompileError::AssignmentToConst => f.write_str("assignment to a constant expression"),
            CompileError::ArithmeticTypeRequired => {
                f.write_str("an arithmetic type is required here")
            }
            CompileError::IntegerTypeRequired => f.write_str("an integer type is required here"),
            CompileError::ScalarTypeRequired => f.write_str("a scalar type is required here"),
            CompileError::BadTypesForOperator(op) => write!(f, "bad types for operator `{}`", op),
            CompileError::DivisionByZero => f.write_str("division by zero"),
            CompileError::ShiftOutOfRange(t) => {
                write!(f, "shift count is negative or not less than the width of `{}'", t)
            }
            CompileError::CannotCompare(t1, t2) => {
                write!(f, "cannot compare `{}` and `{}`", t1, t2)
            }
            CompileError::IncompatibleTypes(t1, t2) => {
                write!(f, "incompatible types `{}' and `{}'", t1, t2)
            }
            CompileError::CharParseError(e) => {
                write!(f, "error while parsing character literal: {}", e)
            }
            CompileError::LiteralError(e) => write!(f, "{}", e),
            CompileError::LiteralTooLarge => {
                f.write_str("integer literal is too large to be represented in any integer type")
            }
            CompileError::BitIntLiteralTooWide(n) => write!(
                f,
                "integer literal needs {} bits, which exceeds the maximum _BitInt width {}",
                n,
                crate::machine::BITINT_MAXWIDTH
            ),
            CompileError::ForbiddenInPreprocessor(s) => {
                write!(f, "{} is not allowed in a preprocessor expression", s)
            }
            CompileError::VarRedefinition(s) => write!(f, "redefinition of `{}'", s),
            CompileError::ConstexprNotInitialized(s) => {
                write!(f, "constexpr object `{}' must be initialized", s)
            }
            CompileError::ConstexprValueChanged(s) => write!(
                f,
                "constexpr initializer of `{}' changes value when converted to the object type",
                s
            ),
            CompileError::EnumValueOutOfRange(s) => {
                write!(f, "enumerator value of `{}' is not representable", s)
            }
            CompileError::NotAType(s) => write!(f, "`{}' is not a type, but a variable", s),
            CompileError::NotAVar(s) => write!(f, "`{}' is not a variable, but a type alias", s),
            CompileError::GenericNoMatch(t) => {
                write!(f, "controlling expression type `{}' not compatible with any generic association type", t)
            }
            CompileError::GenericDuplicate(t) => {
                write!(f, "type `{}' in generic association compatible with previously specified type", t)
            }
            CompileError::Expected(what, found) => write!(f, "expected {}, found `{}'", what, found),
            CompileError::UnexpectedEof(what) => write!(f, "expected {}, found end of file", what),
            CompileError::InvalidCharacter(c) => write!(f, "invalid character `{}' in source", c),
            CompileError::UnterminatedComment => f.write_str("unterminated /* comment"),
            CompileError::UnterminatedLiteral => f.write_str("missing terminating quote character"),
            CompileError::IncludeNotFound(s) => write!(f, "'{}' file not found", s),
            CompileError::IncludeTooDeep => f.write_str("#include nested too deeply"),
            CompileError::UserError(s) => write!(f, "#error {}", s),
            CompileError::UnterminatedConditional => f.write_str("unterminated conditional directive"),
            CompileError::UnmatchedDirective(s) => write!(f, "#{} without #if", s),
            CompileError::InvalidDirective(s) => write!(f, "invalid preprocessing directive #{}", s),
            CompileError::MissingMacroName(s) => write!(f, "macro name missing after #{}", s),
            CompileError::MacroArgCount(name, expected, got) => write!(
                f,
                "macro `{}' requires {} arguments, but {} given",
                name, expected, got
            ),
            CompileError::UnterminatedMacroCall(s) => {
                write!(f, "unterminated argument list invoking macro `{}'", s)
            }
            CompileError::InvalidPaste(s) => {
                write!(f, "pasting formed `{}', an invalid preprocessing token", s)
            }
            CompileError::PasteAtEdge => {
                f.write_str("'##' cannot appear at either end of a macro expansion")
            }
            CompileError::InvalidStringify => {
                f.write_str("'#' is not followed by a macro parameter")
            }
            CompileError::MacroParameterError(s) => write!(f, "invalid macro parameter list: {}", s),
        }
    }
}

impl std::fmt::Display for CompileWarning {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), std::fmt::Error> {
        match self {
            CompileWarning::C23Extension(s) => write!(f, "{} is a C23 extension", s),
            CompileWarning::ImplicitInt => f.write_str("implicit int"),
            CompileWarning::EmptyDeclaration => {
                f.write_str("empty declaration doesn't declare anything")
            }
            CompileWarning::IntegerOverflow(v, t) => {
                write!(f, "overflow in expression; result is {} with type `{}'", v, t)
            }
            CompileWarning::ExtendedLiteral(t) => write!(
                f,
                "integer literal is too large for any standard integer type, using `{}'",
                t
            ),
            CompileWarning::ImplicitlyUnsignedLiteral => f.write_str(
                "integer literal is too large to be represented in a signed integer type, interpreting as unsigned",
            ),
            CompileWarning::MacroRedefined(s) => write!(f, "`{}' macro redefined", s),
            CompileWarning::UnknownPragma(s) => write!(f, "unknown pragma `{}' ignored", s),
            CompileWarning::UserWarning(s) => write!(f, "#warning {}", s),
            CompileWarning::Multichar => f.write_str("multi-character character constant"),
            CompileWarning::EmptyTranslationUnit => {
                f.write_str("ISO C requires a translation unit to contain at least one declaration")
            }
            CompileWarning::ExternVarInitialized(s) => {
                write!(f, "extern variable `{}' has an initializer", s)
            }
            CompileWarning::DuplicateQualifier(s) => write!(f, "duplicate `{}' declaration specifier", s),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::span::SourceMap;

    #[test]
    fn test_disabled_group() {
        let mut options = WarningOptions::new();
        options.disabled.insert("c23-extensions".to_string());
        let mut ec = ErrorCollector::with_options(options);
        assert!(ec
            .record_warning(CompileWarning::C23Extension("x".to_string()), Span::none())
            .is_ok());
        assert_eq!(ec.get_warning_count(), 0);
        ec.record_warning(CompileWarning::Multichar, Span::none()).unwrap();
        assert_eq!(ec.get_warning_count(), 1);
    }

    #[test]
    fn test_werror() {
        let mut options = WarningOptions::new();
        options.werror = true;
        let mut ec = ErrorCollector::with_options(options);
        assert!(ec.record_warning(CompileWarning::Multichar, Span::none()).is_ok());
        assert_eq!(ec.get_error_count(), 1);
        let sm = SourceMap::new();
        assert_eq!(
            ec.render_text(&sm),
            vec!["error: multi-character character constant [-Werror,-Wmultichar]".to_string()]
        );
    }

    #[test]
    fn test_off_by_default() {
        let mut ec = ErrorCollector::new();
        ec.record_warning(CompileWarning::EmptyTranslationUnit, Span::none()).unwrap();
        assert_eq!(ec.get_warning_count(), 0);

        let mut options = WarningOptions::new();
        options.pedantic = true;
        let mut ec = ErrorCollector::with_options(options);
        ec.record_warning(CompileWarning::EmptyTranslationUnit, Span::none()).unwrap();
        assert_eq!(ec.get_warning_count(), 1);
    }

    #[test]
    fn test_system_header() {
        let mut ec = ErrorCollector::new();
        ec.mark_system_file(FileId(3));
        ec.record_warning(CompileWarning::Multichar, Span::new(FileId(3), 0, 1)).unwrap();
        assert_eq!(ec.get_warning_count(), 0);
        ec.record_warning(CompileWarning::Multichar, Span::new(FileId(0), 0, 1)).unwrap();
        assert_eq!(ec.get_warning_count(), 1);
        let expanded = Span::new(FileId(0), 0, 1).with_system_macro(true);
        ec.record_warning(CompileWarning::Multichar, expanded).unwrap();
        assert_eq!(ec.get_warning_count(), 1);
    }

    #[test]
    fn test_json() {
        let mut sm = SourceMap::new();
        let id = sm.add_file("t.c".to_string(), None, "x".to_string());
        let mut ec = ErrorCollector::new();
        let _ = ec.record_error(CompileError::DivisionByZero, Span::new(id, 0, 1));
        let v: serde_json::Value = serde_json::from_str(&ec.render_json(&sm)).unwrap();
        assert_eq!(v[0]["kind"], "error");
        assert_eq!(v[0]["message"], "division by zero");
        assert_eq!(v[0]["location"]["line"], 1);
    }
}
