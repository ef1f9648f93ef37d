//! Source-located diagnostics.
//!
//! Diagnostics are collected, never thrown: every lexer and parser path
//! appends to a [`DiagnosticSet`] and presses on. Each record is stored as
//! the fully formatted line
//!
//! ```text
//! <file>(<line>,<column>): <severity> <code>: <message>
//! ```
//!
//! This format is stable; external tools split on `(`, `,`, `)` and `: ` to
//! recover components, and the accessors on [`Diagnostic`] do the same.

use std::fmt;

use crate::arena::ChainedArena;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Severity {
    Error,
    Warning,
    Info,
    Note,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Error => "error",
            Severity::Warning => "warning",
            Severity::Info => "info",
            Severity::Note => "note",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[repr(u32)]
pub enum ErrorCode {
    SyntaxError = 1000,
    UnrecognizedToken = 1001,
    EmptySexpr = 1002,
    UnterminatedStringLiteral = 1003,
    UnexpectedToken = 1004,
    MalformedFloatLiteral = 1005,
    ProgramMustStartWithSexpr = 1006,
    NoMatchingOpenParenthesis = 1007,
    NoMatchingCloseParenthesis = 1008,
    AuxiliaryOfLazyToken = 1009,
    UnexpectedTopLevelToken = 1010,
}

impl ErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::SyntaxError => "LISP1000",
            ErrorCode::UnrecognizedToken => "LISP1001",
            ErrorCode::EmptySexpr => "LISP1002",
            ErrorCode::UnterminatedStringLiteral => "LISP1003",
            ErrorCode::UnexpectedToken => "LISP1004",
            ErrorCode::MalformedFloatLiteral => "LISP1005",
            ErrorCode::ProgramMustStartWithSexpr => "LISP1006",
            ErrorCode::NoMatchingOpenParenthesis => "LISP1007",
            ErrorCode::NoMatchingCloseParenthesis => "LISP1008",
            ErrorCode::AuxiliaryOfLazyToken => "LISP1009",
            ErrorCode::UnexpectedTopLevelToken => "LISP1010",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One formatted, source-located record.
#[derive(Clone, Debug)]
pub struct Diagnostic {
    message: Box<str>,
    severity: Severity,
    code: ErrorCode,
}

impl Diagnostic {
    fn create(
        file: &str,
        line: u32,
        column: u32,
        severity: Severity,
        code: ErrorCode,
        message: fmt::Arguments<'_>,
    ) -> Self {
        let message = format!(
            "{}({},{}): {} {}: {}",
            file, line, column, severity, code, message
        );
        Diagnostic {
            message: message.into_boxed_str(),
            severity,
            code,
        }
    }

    pub fn syntax_error(file: &str, line: u32, column: u32, expected: &str) -> Self {
        Self::create(
            file,
            line,
            column,
            Severity::Error,
            ErrorCode::SyntaxError,
            format_args!("syntax error, '{}' expected", expected),
        )
    }

    pub fn unexpected_token(file: &str, line: u32, column: u32, text: &str) -> Self {
        Self::create(
            file,
            line,
            column,
            Severity::Error,
            ErrorCode::UnexpectedToken,
            format_args!("unexpected token '{}'", text),
        )
    }

    pub fn empty_sexpr(file: &str, line: u32, column: u32) -> Self {
        Self::create(
            file,
            line,
            column,
            Severity::Error,
            ErrorCode::EmptySexpr,
            format_args!("empty s-expression"),
        )
    }

    pub fn unterminated_string(file: &str, line: u32, column: u32) -> Self {
        Self::create(
            file,
            line,
            column,
            Severity::Error,
            ErrorCode::UnterminatedStringLiteral,
            format_args!("unterminated string literal"),
        )
    }

    pub fn unrecognized_token(file: &str, line: u32, column: u32, text: &str) -> Self {
        Self::create(
            file,
            line,
            column,
            Severity::Error,
            ErrorCode::UnrecognizedToken,
            format_args!("unrecognized token '{}'", text),
        )
    }

    pub fn malformed_float(file: &str, line: u32, column: u32, text: &str) -> Self {
        Self::create(
            file,
            line,
            column,
            Severity::Error,
            ErrorCode::MalformedFloatLiteral,
            format_args!("malformed floating point literal '{}'", text),
        )
    }

    pub fn program_must_start_with_sexpr(file: &str, line: u32, column: u32) -> Self {
        Self::create(
            file,
            line,
            column,
            Severity::Error,
            ErrorCode::ProgramMustStartWithSexpr,
            format_args!("program must start with an s-expression"),
        )
    }

    pub fn no_matching_open(file: &str, line: u32, column: u32) -> Self {
        Self::create(
            file,
            line,
            column,
            Severity::Error,
            ErrorCode::NoMatchingOpenParenthesis,
            format_args!(
                "closing parenthesis at ({},{}) does not have an opening parenthesis",
                line, column
            ),
        )
    }

    pub fn no_matching_close(file: &str, line: u32, column: u32) -> Self {
        Self::create(
            file,
            line,
            column,
            Severity::Error,
            ErrorCode::NoMatchingCloseParenthesis,
            format_args!(
                "open parenthesis at ({},{}) does not have a closing parenthesis",
                line, column
            ),
        )
    }

    pub fn auxiliary_of_lazy_token(file: &str, line: u32, column: u32, text: &str) -> Self {
        Self::create(
            file,
            line,
            column,
            Severity::Error,
            ErrorCode::AuxiliaryOfLazyToken,
            format_args!("fetching trivia of lazy token '{}' is prohibited", text),
        )
    }

    pub fn unexpected_top_level_token(file: &str, line: u32, column: u32) -> Self {
        Self::create(
            file,
            line,
            column,
            Severity::Error,
            ErrorCode::UnexpectedTopLevelToken,
            format_args!("unexpected token at top level, only s-expressions are allowed"),
        )
    }

    #[inline]
    pub fn severity(&self) -> Severity {
        self.severity
    }

    #[inline]
    pub fn code(&self) -> ErrorCode {
        self.code
    }

    /// The full formatted line.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.message
    }

    /// The `<file>` component of the formatted line.
    pub fn file(&self) -> &str {
        match self.message.find('(') {
            Some(open) if open > 0 => &self.message[..open],
            _ => "",
        }
    }

    /// The `<line>` component of the formatted line.
    pub fn line(&self) -> &str {
        let open = match self.message.find('(') {
            Some(open) => open,
            None => return "",
        };
        match self.message[open..].find(',') {
            Some(comma) => &self.message[open + 1..open + comma],
            None => "",
        }
    }

    /// The `<column>` component of the formatted line.
    pub fn column(&self) -> &str {
        let comma = match self.message.find(',') {
            Some(comma) => comma,
            None => return "",
        };
        match self.message[comma..].find(')') {
            Some(close) => &self.message[comma + 1..comma + close],
            None => "",
        }
    }

    /// The `<code>` component of the formatted line.
    pub fn code_str(&self) -> &str {
        // "<file>(l,c): <severity> <code>: <message>"
        let close = match self.message.find(')') {
            Some(close) => close,
            None => return "",
        };
        let tail = &self.message[close..];
        let space = match tail.find(' ') {
            Some(space) => close + space + 1,
            None => return "",
        };
        let rest = &self.message[space..];
        match rest.find(' ') {
            Some(gap) => {
                let code = &rest[gap + 1..];
                match code.find(':') {
                    Some(colon) => &code[..colon],
                    None => "",
                }
            }
            None => "",
        }
    }

    /// The free-text `<message>` component of the formatted line.
    pub fn message(&self) -> &str {
        match self.message.rfind(": ") {
            Some(colon) => &self.message[colon + 2..],
            None => &self.message,
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Append-only collection of diagnostics.
///
/// The set is not cleared between parses of a reused parser; callers that
/// want a clean slate call [`clear`](DiagnosticSet::clear) explicitly.
pub struct DiagnosticSet {
    records: ChainedArena<Diagnostic>,
}

impl DiagnosticSet {
    pub fn new() -> Self {
        DiagnosticSet {
            records: ChainedArena::with_chunk_capacity(64),
        }
    }

    #[inline]
    pub fn push(&mut self, diagnostic: Diagnostic) {
        self.records.push(diagnostic);
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.records.len() as usize
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    #[inline]
    pub fn get(&self, index: usize) -> &Diagnostic {
        self.records.get(index as u32)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.records.iter()
    }

    pub fn has_errors(&self) -> bool {
        self.iter().any(|d| d.severity() == Severity::Error)
    }

    pub fn clear(&mut self) {
        self.records.reset();
    }
}

impl Default for DiagnosticSet {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_format_is_stable() {
        let d = Diagnostic::unterminated_string("demo.lsp", 3, 14);
        assert_eq!(
            d.as_str(),
            "demo.lsp(3,14): error LISP1003: unterminated string literal"
        );
    }

    #[test]
    fn components_roundtrip() {
        let d = Diagnostic::no_matching_close("a/b.lsp", 7, 2);
        assert_eq!(d.file(), "a/b.lsp");
        assert_eq!(d.line(), "7");
        assert_eq!(d.column(), "2");
        assert_eq!(d.code_str(), "LISP1008");
        assert_eq!(d.code(), ErrorCode::NoMatchingCloseParenthesis);
        assert_eq!(
            d.message(),
            "open parenthesis at (7,2) does not have a closing parenthesis"
        );
    }

    #[test]
    fn memory_origin() {
        let d = Diagnostic::program_must_start_with_sexpr("memory", 1, 1);
        assert_eq!(d.file(), "memory");
        assert_eq!(d.code_str(), "LISP1006");
        assert_eq!(d.severity(), Severity::Error);
    }

    #[test]
    fn set_tracks_errors() {
        let mut set = DiagnosticSet::new();
        assert!(!set.has_errors());
        set.push(Diagnostic::empty_sexpr("memory", 1, 1));
        assert!(set.has_errors());
        assert_eq!(set.len(), 1);
        set.clear();
        assert!(set.is_empty());
    }

    #[test]
    fn message_component_of_nested_colons() {
        let d = Diagnostic::unrecognized_token("memory", 1, 1, "??");
        assert_eq!(d.message(), "unrecognized token '??'");
        assert_eq!(d.code_str(), "LISP1001");
    }
}
