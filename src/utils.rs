use std::fmt;
use std::io;
use thiserror::Error;

/// Custom error types for the grammar engine
#[derive(Error, Debug)]
pub enum GramError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("{0}")]
    Lexer(Report),

    #[error("{0}")]
    Parser(Report),

    #[error("{0}")]
    Resolution(Report),
}

impl GramError {
    pub fn lexer(origin: &str, lines: Vec<String>) -> Self {
        GramError::Lexer(Report::new(origin, lines))
    }

    pub fn parser(origin: &str, lines: Vec<String>) -> Self {
        GramError::Parser(Report::new(origin, lines))
    }

    pub fn resolution(origin: &str, lines: Vec<String>) -> Self {
        GramError::Resolution(Report::new(origin, lines))
    }

    /// The report carried by the error, if it is a structured engine error.
    pub fn report(&self) -> Option<&Report> {
        match self {
            GramError::Io(_) => None,
            GramError::Lexer(report)
            | GramError::Parser(report)
            | GramError::Resolution(report) => Some(report),
        }
    }
}

/// An origin tag plus detail lines.
///
/// Every user-surfaced engine error names the stage it came from (for
/// example `"Parser: Assembling blocks"`) and carries one message per line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    pub origin: String,
    pub lines: Vec<String>,
}

impl Report {
    pub fn new(origin: impl Into<String>, lines: Vec<String>) -> Self {
        Report {
            origin: origin.into(),
            lines,
        }
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.origin)?;
        for line in &self.lines {
            write!(f, "\n    {}", line)?;
        }
        Ok(())
    }
}

/// Result type for grammar operations
pub type Result<T> = std::result::Result<T, GramError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_display() {
        let err = GramError::parser(
            "Parser: Assembling blocks",
            vec!["misaligned dedent".to_string(), "near line 4".to_string()],
        );

        assert_eq!(
            format!("{}", err),
            "Parser: Assembling blocks\n    misaligned dedent\n    near line 4"
        );
    }

    #[test]
    fn test_report_accessor() {
        let err = GramError::resolution("Resolution: Expanding", vec!["x".to_string()]);
        assert_eq!(
            err.report().map(|r| r.origin.as_str()),
            Some("Resolution: Expanding")
        );

        let io = GramError::from(io::Error::new(io::ErrorKind::NotFound, "gone"));
        assert!(io.report().is_none());
    }
}
