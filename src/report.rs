//! Translation Diagnostics and Summary
//!
//! Recoverable conditions in the conversion pipeline are reported as data,
//! not as errors: every stage accumulates [`Diagnostic`] values which the
//! pipeline rolls up into a [`TranslationSummary`]. Only the fatal conditions
//! in [`crate::error::ConvertError`] abort a run.

use serde::Serialize;

/// Position of a diagnostic within the profile sources
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceLocator {
    /// Source file path (as supplied by the loader, not resolved)
    pub path: String,

    /// One-based line number
    pub line: usize,

    /// One-based column number
    pub column: usize,
}

impl SourceLocator {
    pub fn new(path: impl Into<String>, line: usize, column: usize) -> Self {
        Self {
            path: path.into(),
            line,
            column,
        }
    }
}

impl std::fmt::Display for SourceLocator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}:{}", self.path, self.line, self.column)
    }
}

/// A recoverable condition observed during conversion
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Diagnostic {
    /// Structurally broken profile source: unterminated quoted identifier,
    /// unbalanced block nesting, unparseable impact value. Parsing resumes
    /// at the next recognizable control header.
    MalformedProfile {
        locator: SourceLocator,
        message: String,
    },

    /// A declared field (`title`, `desc`, `impact`) appeared more than once
    /// in a control body. The first occurrence wins.
    DuplicateField {
        control_id: String,
        field: String,
        locator: SourceLocator,
    },

    /// A resource call with no registry entry and no custom-resource
    /// fallback, or a matcher the matching template cannot express safely.
    UntranslatableResource {
        control_id: String,
        resource_name: String,
        reason: String,
    },

    /// A control body contains an `only_if` guard. Guard semantics are
    /// runtime-only and are not carried into the generated tasks.
    RuntimeGuard {
        control_id: String,
        locator: SourceLocator,
    },
}

impl Diagnostic {
    /// Whether this diagnostic marks an untranslatable resource call
    pub fn is_untranslatable(&self) -> bool {
        matches!(self, Self::UntranslatableResource { .. })
    }
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MalformedProfile { locator, message } => {
                write!(f, "malformed profile at {}: {}", locator, message)
            }
            Self::DuplicateField {
                control_id,
                field,
                locator,
            } => {
                write!(
                    f,
                    "duplicate `{}` in control '{}' at {} (first occurrence kept)",
                    field, control_id, locator
                )
            }
            Self::UntranslatableResource {
                control_id,
                resource_name,
                reason,
            } => {
                write!(
                    f,
                    "untranslatable resource `{}` in control '{}': {}",
                    resource_name, control_id, reason
                )
            }
            Self::RuntimeGuard {
                control_id,
                locator,
            } => {
                write!(
                    f,
                    "control '{}' has an only_if guard at {}; guard is not carried over",
                    control_id, locator
                )
            }
        }
    }
}

/// Roll-up of a conversion run, consumed by the embedding CLI/API layer
#[derive(Debug, Clone, Default, Serialize)]
pub struct TranslationSummary {
    /// Controls found in the profile sources
    pub controls_total: usize,

    /// Controls that produced at least one task
    pub controls_translated: usize,

    /// Controls whose every resource call was untranslatable
    pub controls_untranslatable: usize,

    /// All recoverable diagnostics, in pipeline order
    pub diagnostics: Vec<Diagnostic>,
}

impl TranslationSummary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a diagnostic
    pub fn push(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic);
    }

    /// Append all diagnostics from another accumulator
    pub fn extend(&mut self, diagnostics: impl IntoIterator<Item = Diagnostic>) {
        self.diagnostics.extend(diagnostics);
    }

    /// Count of untranslatable-resource diagnostics
    pub fn untranslatable_count(&self) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.is_untranslatable())
            .count()
    }

    /// Whether the run exceeded the caller's untranslatable tolerance
    pub fn exceeds_tolerance(&self, tolerance: usize) -> bool {
        self.untranslatable_count() > tolerance
    }
}
