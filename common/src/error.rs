use std::fmt;

use crate::span::Span;

/// Every semantic problem the pipeline can raise, funneled into one kind
/// the way the source compiler funnels all of its `SemanticException`s
/// through a single class. Variants record *origin*, not a distinct
/// wire format — the CLI driver renders all of them identically.
#[derive(Debug, Clone, thiserror::Error)]
pub enum CompileError {
    #[error("{0}")]
    Syntax(String),

    #[error("идентификатор \"{name}\" не найден")]
    UnresolvedName { name: String, span: Option<Span> },

    #[error("идентификатор \"{name}\" уже объявлен")]
    Redeclaration { name: String, span: Option<Span> },

    #[error("неизвестный тип \"{name}\"")]
    UnknownType { name: String, span: Option<Span> },

    #[error("{message}")]
    TypeMismatch { message: String, span: Option<Span> },

    #[error("{message}")]
    ArityMismatch { message: String, span: Option<Span> },

    #[error("{message}")]
    InvalidProgramShape { message: String, span: Option<Span> },
}

impl CompileError {
    pub fn span(&self) -> Option<Span> {
        match self {
            CompileError::Syntax(_) => None,
            CompileError::UnresolvedName { span, .. }
            | CompileError::Redeclaration { span, .. }
            | CompileError::UnknownType { span, .. }
            | CompileError::TypeMismatch { span, .. }
            | CompileError::ArityMismatch { span, .. }
            | CompileError::InvalidProgramShape { span, .. } => *span,
        }
    }

    pub fn message(&self) -> String {
        self.to_string()
    }
}

/// Renders the driver-facing form: `Ошибка: <message> (строка: N, позиция: M)`.
/// The bare `Display` impl on the variants above only carries the message;
/// the row/col suffix is assembled here because it is the outer driver's
/// responsibility per the error-handling design, not the error type's own.
pub struct Formatted<'a>(pub &'a CompileError);

impl fmt::Display for Formatted<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Ошибка: {}", self.0.message())?;
        if let Some(span) = self.0.span() {
            write!(f, " (строка: {}, позиция: {})", span.row, span.col)?;
        }
        Ok(())
    }
}

pub type Result<T> = std::result::Result<T, CompileError>;
