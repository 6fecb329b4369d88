//! Diagnostics sink
//!
//! Collects user-facing errors and notes. Analysis only ever asks whether an
//! error was issued; the content is for whoever prints it.

use std::fmt;

use serde::Serialize;

use crate::utils::Span;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Note,
}

/// A single reported message
#[derive(Debug, Clone, Serialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub span: Option<Span>,
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self.severity {
            Severity::Error => "error",
            Severity::Note => "note",
        };
        match self.span {
            Some(span) => write!(f, "{}: {}: {}", span, label, self.message),
            None => write!(f, "{}: {}", label, self.message),
        }
    }
}

/// Accumulates diagnostics for one compilation session
#[derive(Debug, Default)]
pub struct Diagnostics {
    items: Vec<Diagnostic>,
    errors: usize,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Report a user error
    pub fn error(&mut self, span: Span, message: impl Into<String>) {
        self.report(Severity::Error, Some(span), message);
    }

    /// Attach a note, usually pointing at a related location
    pub fn note(&mut self, span: Span, message: impl Into<String>) {
        self.report(Severity::Note, Some(span), message);
    }

    /// Report with an optional location
    pub fn report(&mut self, severity: Severity, span: Option<Span>, message: impl Into<String>) {
        let message = message.into();
        if severity == Severity::Error {
            log::trace!("diagnostic error: {}", message);
            self.errors += 1;
        }
        self.items.push(Diagnostic { severity, span, message });
    }

    /// Internal compiler error: an invariant of the analyzer itself was broken.
    pub fn ice(&self, message: impl fmt::Display) -> ! {
        log::error!("internal compiler error: {}", message);
        panic!("internal compiler error: {}", message)
    }

    pub fn has_errors(&self) -> bool {
        self.errors > 0
    }

    pub fn error_count(&self) -> usize {
        self.errors
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.items.iter()
    }

    /// Only the error-severity entries
    pub fn errors(&self) -> impl Iterator<Item = &Diagnostic> {
        self.items.iter().filter(|d| d.severity == Severity::Error)
    }

    /// Drain everything reported so far
    pub fn take(&mut self) -> Vec<Diagnostic> {
        self.errors = 0;
        std::mem::take(&mut self.items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_notes_do_not_count_as_errors() {
        let mut diag = Diagnostics::new();
        diag.report(Severity::Note, None, "context");
        assert!(!diag.has_errors());
        diag.error(Span::new(1, 2, 0), "bad");
        assert_eq!(diag.error_count(), 1);
        assert_eq!(diag.len(), 2);
    }

    #[test]
    fn test_take_resets() {
        let mut diag = Diagnostics::new();
        diag.report(Severity::Error, None, "first");
        let taken = diag.take();
        assert_eq!(taken.len(), 1);
        assert!(!diag.has_errors());
        assert!(diag.is_empty());
    }

    #[test]
    fn test_display_includes_location() {
        let d = Diagnostic {
            severity: Severity::Error,
            span: Some(Span::new(3, 7, 1)),
            message: "oops".to_string(),
        };
        assert_eq!(d.to_string(), "1:3..7: error: oops");
    }

    #[test]
    #[should_panic(expected = "internal compiler error")]
    fn test_ice_aborts() {
        Diagnostics::new().ice("scope stack underflow");
    }
}
