//! Positioned diagnostics produced while checking a template file.

use crate::checker::State;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Style problem; reported but scanning continues.
    Warning,
    /// Structural or consistency problem; scanning of the file stops.
    Error,
}

#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub severity: Severity,
    pub file: String,
    pub line: usize,
    pub state: State,
    pub message: String,
    /// Offending source line, right-trimmed.
    pub text: String,
}

impl Diagnostic {
    pub fn is_fatal(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self.severity {
            Severity::Warning => "WARNING",
            Severity::Error => "ERROR",
        };
        write!(
            f,
            "{}({}:{}:{}): {}\n{}",
            label, self.file, self.line, self.state, self.message, self.text
        )
    }
}
