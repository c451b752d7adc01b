//! Diagnostics
//!
//! Per-extension findings collected during a load. A load never fails
//! because of these; they record what was attached, what was skipped and
//! why.

use serde::{Deserialize, Serialize};
use std::fmt;

// =============================================================================
// Diagnostic Codes
// =============================================================================

/// Diagnostic code for categorizing findings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DiagnosticCode {
    // === Classification ===
    /// Identity keyword present but not a string
    IllTypedIdentity,
    /// Prefixed identity that no schema defines
    UnknownIdentity,
    /// Revision keyword absent or not an integer
    BadRevision,
    /// Revision outside the registry's range
    UnsupportedRevision,
    /// Revision in range but not defined for this record type
    UnregisteredRevision,

    // === Building ===
    /// One or more fields could not be resolved
    IncompleteRecord,
    /// Second record of an at-most-one type
    DuplicateSingleton,

    // === Update ===
    /// ARRNAME/INSNAME/CORRNAME names no record
    UnresolvedLink,

    // === Routine ===
    /// Record built and attached
    Recognized,
    /// Extension is not a data-block
    NotApplicable,
}

impl DiagnosticCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::IllTypedIdentity => "W001",
            Self::UnknownIdentity => "W002",
            Self::BadRevision => "W003",
            Self::UnsupportedRevision => "W004",
            Self::UnregisteredRevision => "W005",
            Self::IncompleteRecord => "W006",
            Self::DuplicateSingleton => "W007",
            Self::UnresolvedLink => "W008",
            Self::Recognized => "I001",
            Self::NotApplicable => "I002",
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            Self::Recognized | Self::NotApplicable => Severity::Info,
            _ => Severity::Warning,
        }
    }
}

impl fmt::Display for DiagnosticCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Diagnostic severity level
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Severity {
    Info,
    Warning,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Info => write!(f, "info"),
            Self::Warning => write!(f, "warning"),
        }
    }
}

// =============================================================================
// Diagnostic Item
// =============================================================================

/// A single diagnostic item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiagnosticItem {
    /// 1-based position of the extension concerned
    pub extension: usize,
    pub code: DiagnosticCode,
    pub message: String,
    /// Additional context (e.g. individual field failures)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub context: Vec<String>,
}

impl DiagnosticItem {
    pub fn new(extension: usize, code: DiagnosticCode, message: impl Into<String>) -> Self {
        Self {
            extension,
            code,
            message: message.into(),
            context: Vec::new(),
        }
    }

    pub fn with_context(mut self, ctx: impl Into<String>) -> Self {
        self.context.push(ctx.into());
        self
    }

    pub fn severity(&self) -> Severity {
        self.code.severity()
    }
}

impl fmt::Display for DiagnosticItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {}: extension {}: {}",
            self.code,
            self.code.severity(),
            self.extension,
            self.message
        )?;

        for ctx in &self.context {
            write!(f, "\n  - {}", ctx)?;
        }

        Ok(())
    }
}

// =============================================================================
// Diagnostics Collection
// =============================================================================

/// Collection of diagnostics from one load
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Diagnostics {
    items: Vec<DiagnosticItem>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, item: DiagnosticItem) {
        self.items.push(item);
    }

    pub fn has_warnings(&self) -> bool {
        self.warnings().next().is_some()
    }

    pub fn warnings(&self) -> impl Iterator<Item = &DiagnosticItem> {
        self.items.iter().filter(|i| i.severity() == Severity::Warning)
    }

    pub fn with_code(&self, code: DiagnosticCode) -> impl Iterator<Item = &DiagnosticItem> {
        self.items.iter().filter(move |i| i.code == code)
    }

    pub fn for_extension(&self, extension: usize) -> impl Iterator<Item = &DiagnosticItem> {
        self.items.iter().filter(move |i| i.extension == extension)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn warning_count(&self) -> usize {
        self.warnings().count()
    }

    /// Format all diagnostics for display
    pub fn format_all(&self) -> String {
        let mut output = String::new();

        for item in &self.items {
            output.push_str(&format!("{}\n", item));
        }

        if !self.is_empty() {
            output.push_str(&format!("\n{} warning(s)\n", self.warning_count()));
        }

        output
    }
}

impl fmt::Display for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format_all())
    }
}
