use std::fmt::Display;

use thiserror::Error;

pub type RecResult<T> = Result<T, RecError>;

/// What went wrong while decoding a rec stream. The variants mirror the
/// states the streaming parser can get stuck in; each carries a fixed
/// description used when rendering `file:line: error: message` diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseErrorKind {
    UnexpectedEof,
    ExpectedFieldName,
    ExpectedField,
    ExpectedRecord,
    ExpectedComment,
    TooManyNameParts,
    Unknown,
}

impl ParseErrorKind {
    pub fn description(self) -> &'static str {
        match self {
            ParseErrorKind::UnexpectedEof => "unexpected end of file",
            ParseErrorKind::ExpectedFieldName => "expected a field name",
            ParseErrorKind::ExpectedField => "expected a field",
            ParseErrorKind::ExpectedRecord => "expected a record",
            ParseErrorKind::ExpectedComment => "expected a comment",
            ParseErrorKind::TooManyNameParts => "too many parts in field name",
            ParseErrorKind::Unknown => "unknown error",
        }
    }
}

impl Display for ParseErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.description())
    }
}

#[derive(Debug, Error)]
pub enum RecError {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("{file}:{line}: error: {kind}")]
    Parse {
        kind: ParseErrorKind,
        file: String,
        line: usize,
    },

    #[error("invalid field name: {0}")]
    InvalidFieldName(String),

    #[error("invalid type description: {0}")]
    InvalidType(String),

    #[error("invalid selection expression: {0}")]
    InvalidSex(String),

    #[error("invalid field expression: {0}")]
    InvalidFex(String),

    #[error("duplicated record set {0}")]
    DuplicatedRset(String),

    #[error("{count} integrity violations\n{report}")]
    Integrity { count: usize, report: String },

    #[error("could not fetch remote descriptor from {url}: {cause}")]
    RemoteFetch { url: String, cause: String },

    #[error("field {field} failed its type check: {reason}")]
    TypeCheckFailed { field: String, reason: String },

    #[error("crypto operation failed: {0}")]
    Crypto(String),
}

impl PartialEq for RecError {
    fn eq(&self, other: &Self) -> bool {
        // Io errors compare by kind only; everything else structurally.
        match (self, other) {
            (RecError::Io(a), RecError::Io(b)) => a.kind() == b.kind(),
            _ => self.to_string() == other.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
}

impl Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Error => f.write_str("error"),
            Severity::Warning => f.write_str("warning"),
        }
    }
}

/// One integrity finding. The checker accumulates these instead of
/// stopping at the first problem; utilities render them verbatim.
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    pub file: Option<String>,
    pub line: Option<usize>,
    pub severity: Severity,
    pub message: String,
}

impl Diagnostic {
    pub fn error(file: Option<&str>, line: Option<usize>, message: impl Into<String>) -> Self {
        Diagnostic {
            file: file.map(str::to_owned),
            line,
            severity: Severity::Error,
            message: message.into(),
        }
    }

    pub fn warning(file: Option<&str>, line: Option<usize>, message: impl Into<String>) -> Self {
        Diagnostic {
            file: file.map(str::to_owned),
            line,
            severity: Severity::Warning,
            message: message.into(),
        }
    }
}

impl Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(file) = &self.file {
            write!(f, "{file}:")?;
        }
        if let Some(line) = self.line {
            write!(f, "{line}:")?;
        }
        if self.file.is_some() || self.line.is_some() {
            f.write_str(" ")?;
        }
        write!(f, "{}: {}", self.severity, self.message)
    }
}

/// Join accumulated diagnostics into the report text carried by
/// [`RecError::Integrity`].
pub fn render_report(diagnostics: &[Diagnostic]) -> String {
    let mut out = String::new();
    for diagnostic in diagnostics {
        out.push_str(&diagnostic.to_string());
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_parse_error_rendering() {
        let err = RecError::Parse {
            kind: ParseErrorKind::ExpectedField,
            file: "contacts.rec".to_owned(),
            line: 14,
        };
        assert_eq!(err.to_string(), "contacts.rec:14: error: expected a field");
    }

    #[test]
    fn test_diagnostic_rendering() {
        let d = Diagnostic::error(Some("db.rec"), Some(3), "key field 'Id' not found in record");
        assert_eq!(
            d.to_string(),
            "db.rec:3: error: key field 'Id' not found in record"
        );

        let bare = Diagnostic::warning(None, None, "something odd");
        assert_eq!(bare.to_string(), "warning: something odd");
    }
}
