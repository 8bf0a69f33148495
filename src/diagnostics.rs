//! Unified, `miette`-based diagnostics for catchrun.
//!
//! Every failure produced while loading settings, parsing fixtures, building
//! the registry, or interpreting a fixture body is a [`CatchError`]. Errors are
//! built with the `err_msg!` and `err_src!` macros rather than by hand:
//!
//! - `err_msg!(Validation, "duplicate test case '{}'", name)` for message-only errors.
//! - `err_src!(Parse, "unexpected token", &source, span)` when a fixture source
//!   and span are available.
//!
//! Assertion failures are *not* errors; they are recorded outcomes in the run
//! report. Only problems with the fixture itself or the host environment end
//! up here.

use std::sync::Arc;

use miette::{Diagnostic, LabeledSpan, NamedSource, SourceCode};
use thiserror::Error;

/// Shared handle to a named fixture source.
pub type SourceArc = Arc<NamedSource<String>>;

/// Byte range inside a fixture source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    fn len(&self) -> usize {
        if self.end > self.start {
            self.end - self.start
        } else {
            1
        }
    }
}

/// Type-safe error classification that mirrors the [`CatchError`] variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorType {
    Parse,
    Validation,
    Eval,
    Config,
    Io,
    Internal,
}

impl ErrorType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorType::Parse => "Parse",
            ErrorType::Validation => "Validation",
            ErrorType::Eval => "Eval",
            ErrorType::Config => "Config",
            ErrorType::Io => "Io",
            ErrorType::Internal => "Internal",
        }
    }
}

impl std::fmt::Display for ErrorType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Minimal, composable error context for diagnostics.
#[derive(Debug, Default)]
pub struct ErrorContext {
    /// The fixture source the error points into, if any.
    pub source: Option<SourceArc>,
    /// The primary span inside `source`.
    pub span: Option<Span>,
    pub help: Option<String>,
}

impl ErrorContext {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn with_source_and_span(source: SourceArc, span: Span) -> Self {
        Self {
            source: Some(source),
            span: Some(span),
            help: None,
        }
    }

    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }
}

/// Unified error type for every catchrun failure mode.
#[derive(Debug, Error)]
pub enum CatchError {
    #[error("Parse error: {message}")]
    Parse {
        message: String,
        ctx: ErrorContext,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
    },
    #[error("Validation error: {message}")]
    Validation {
        message: String,
        ctx: ErrorContext,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
    },
    #[error("Evaluation error: {message}")]
    Eval {
        message: String,
        ctx: ErrorContext,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
    },
    #[error("Configuration error: {message}")]
    Config {
        message: String,
        ctx: ErrorContext,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
    },
    #[error("I/O error: {message}")]
    Io {
        message: String,
        ctx: ErrorContext,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
    },
    #[error("Internal error: {message}")]
    Internal {
        message: String,
        ctx: ErrorContext,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
    },
}

impl CatchError {
    fn parts(&self) -> (&str, &ErrorContext) {
        match self {
            CatchError::Parse { message, ctx, .. }
            | CatchError::Validation { message, ctx, .. }
            | CatchError::Eval { message, ctx, .. }
            | CatchError::Config { message, ctx, .. }
            | CatchError::Io { message, ctx, .. }
            | CatchError::Internal { message, ctx, .. } => (message, ctx),
        }
    }

    pub fn error_type(&self) -> ErrorType {
        match self {
            CatchError::Parse { .. } => ErrorType::Parse,
            CatchError::Validation { .. } => ErrorType::Validation,
            CatchError::Eval { .. } => ErrorType::Eval,
            CatchError::Config { .. } => ErrorType::Config,
            CatchError::Io { .. } => ErrorType::Io,
            CatchError::Internal { .. } => ErrorType::Internal,
        }
    }

    /// The bare message, without the variant prefix added by `Display`.
    pub fn message(&self) -> &str {
        self.parts().0
    }

    /// Primary span of the error, when it points into a fixture.
    pub fn span(&self) -> Option<Span> {
        self.parts().1.span
    }

    /// Attaches an underlying cause to the error.
    pub fn with_cause<E>(mut self, cause: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        match &mut self {
            CatchError::Parse { source, .. }
            | CatchError::Validation { source, .. }
            | CatchError::Eval { source, .. }
            | CatchError::Config { source, .. }
            | CatchError::Io { source, .. }
            | CatchError::Internal { source, .. } => *source = Some(Box::new(cause)),
        }
        self
    }

    /// Attaches a help line shown under the rendered diagnostic.
    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        match &mut self {
            CatchError::Parse { ctx, .. }
            | CatchError::Validation { ctx, .. }
            | CatchError::Eval { ctx, .. }
            | CatchError::Config { ctx, .. }
            | CatchError::Io { ctx, .. }
            | CatchError::Internal { ctx, .. } => ctx.help = Some(help.into()),
        }
        self
    }
}

impl Diagnostic for CatchError {
    fn code<'a>(&'a self) -> Option<Box<dyn std::fmt::Display + 'a>> {
        let code = match self.error_type() {
            ErrorType::Parse => "catchrun::parse",
            ErrorType::Validation => "catchrun::validation",
            ErrorType::Eval => "catchrun::eval",
            ErrorType::Config => "catchrun::config",
            ErrorType::Io => "catchrun::io",
            ErrorType::Internal => "catchrun::internal",
        };
        Some(Box::new(code))
    }

    fn help<'a>(&'a self) -> Option<Box<dyn std::fmt::Display + 'a>> {
        self.parts()
            .1
            .help
            .as_ref()
            .map(|h| Box::new(h) as Box<dyn std::fmt::Display + 'a>)
    }

    fn source_code(&self) -> Option<&dyn SourceCode> {
        self.parts()
            .1
            .source
            .as_ref()
            .map(|s| s.as_ref() as &dyn SourceCode)
    }

    fn labels(&self) -> Option<Box<dyn Iterator<Item = LabeledSpan> + '_>> {
        let (message, ctx) = self.parts();
        let span = ctx.span?;
        let label = LabeledSpan::new(Some(message.to_string()), span.start, span.len());
        Some(Box::new(std::iter::once(label)))
    }
}

/// Wraps fixture text into a shareable named source.
pub fn to_error_source(name: impl AsRef<str>, text: impl Into<String>) -> SourceArc {
    Arc::new(NamedSource::new(name.as_ref(), text.into()))
}

/// Constructs a `CatchError` variant with a formatted message and no source context.
#[macro_export]
macro_rules! err_msg {
    ($variant:ident, $msg:literal $(, $arg:expr)* $(,)?) => {
        $crate::CatchError::$variant {
            message: format!($msg $(, $arg)*),
            ctx: $crate::ErrorContext::none(),
            source: None,
        }
    };
    ($variant:ident, $msg:expr) => {
        $crate::CatchError::$variant {
            message: format!("{}", $msg),
            ctx: $crate::ErrorContext::none(),
            source: None,
        }
    };
}

/// Constructs a `CatchError` variant pointing at a span of a pre-built source.
#[macro_export]
macro_rules! err_src {
    ($variant:ident, $msg:expr, $source:expr, $span:expr, $help:expr) => {
        $crate::CatchError::$variant {
            message: $msg.to_string(),
            ctx: $crate::ErrorContext::with_source_and_span(std::sync::Arc::clone($source), $span)
                .with_help(format!("{}", $help)),
            source: None,
        }
    };
    ($variant:ident, $msg:expr, $source:expr, $span:expr) => {
        $crate::CatchError::$variant {
            message: $msg.to_string(),
            ctx: $crate::ErrorContext::with_source_and_span(std::sync::Arc::clone($source), $span),
            source: None,
        }
    };
}

#[cfg(test)]
mod diagnostics_tests {
    use miette::Report;

    use super::*;

    #[test]
    fn rendered_report_carries_label_and_help() {
        let src = to_error_source("Tests.cpp", "CHECK(y == 1);");
        let err = err_src!(
            Eval,
            "undefined variable 'y'",
            &src,
            Span::new(6, 7),
            "declare it first"
        );
        let output = format!("{:?}", Report::new(err));
        assert!(output.contains("undefined variable 'y'"));
        assert!(output.contains("declare it first"));
    }

    #[test]
    fn message_only_errors_have_no_labels() {
        let err = err_msg!(Validation, "duplicate test case '{}'", "Foo");
        assert_eq!(err.message(), "duplicate test case 'Foo'");
        assert_eq!(err.error_type(), ErrorType::Validation);
        assert!(err.labels().is_none());
        assert_eq!(err.to_string(), "Validation error: duplicate test case 'Foo'");
    }

    #[test]
    fn cause_is_exposed_as_source() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err = err_msg!(Io, "cannot read 'a.cpp'").with_cause(io);
        let cause = std::error::Error::source(&err).map(|c| c.to_string());
        assert_eq!(cause.as_deref(), Some("gone"));
    }

    #[test]
    fn every_variant_takes_an_optional_cause() {
        let errors = [
            err_msg!(Parse, "p"),
            err_msg!(Validation, "v"),
            err_msg!(Eval, "e"),
            err_msg!(Config, "c"),
            err_msg!(Io, "i"),
            err_msg!(Internal, "x"),
        ];
        for err in errors {
            assert!(std::error::Error::source(&err).is_none());
            let io = std::io::Error::new(std::io::ErrorKind::Other, "cause");
            let caused = err.with_cause(io);
            assert!(std::error::Error::source(&caused).is_some(), "{}", caused);
        }
    }
}
