//! # Error Handling
//!
//! Error types for the image reduction library, with classification traits and context
//! metadata attached to every error.
//!
//! ## Error Classification
//!
//! - `Recoverable`: the current operation can be skipped or degraded without aborting the
//!   surrounding flow (a single image in a batch, a failed write to the handoff slot)
//! - `HasSeverity`: how loudly an error should be reported
//! - `HasRecoverySuggestion`: a user-facing hint for the CLI
//!
//! Failures are handled at the lowest layer that can absorb them: the batch orchestrator turns
//! per-image errors into skipped items and the handoff store turns storage errors into log lines.
//! Only configuration and validation errors reach the binary.
//!
//! ## Usage
//!
//! ```rust
//! use image_reducer::error::{ReduceError, Recoverable};
//!
//! let error = ReduceError::decode("holiday.png", "unexpected end of file")
//!     .with_recovery_suggestion("Re-export the image and select it again");
//!
//! assert!(error.is_recoverable());
//! ```

use std::{error::Error as StdError, fmt, time::SystemTime};

/// Severity levels for errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    /// Informational errors
    Info,
    /// Warnings that may indicate potential issues
    Warning,
    /// Errors that affect operation but can be recovered from
    Error,
    /// Fatal errors that cannot be recovered from
    Fatal,
}

/// Metadata about when and where an error occurred
#[derive(Debug, Clone)]
pub struct ErrorContext {
    /// When the error occurred
    pub timestamp: SystemTime,
    /// Additional context about the error
    pub context: Option<String>,
    /// Suggested recovery action
    pub recovery_suggestion: Option<String>,
    /// Error severity level
    pub severity: ErrorSeverity,
}

impl Default for ErrorContext {
    fn default() -> Self {
        Self {
            timestamp: SystemTime::now(),
            context: None,
            recovery_suggestion: None,
            severity: ErrorSeverity::Error,
        }
    }
}

impl ErrorContext {
    /// Create a new error context
    pub fn new() -> Self {
        Self::default()
    }

    fn with_severity(mut self, severity: ErrorSeverity) -> Self {
        self.severity = severity;
        self
    }
}

/// Base error type for the image reduction library
#[derive(Debug)]
pub enum ReduceError {
    /// Configuration errors (data directory, log settings)
    Config {
        field: String,
        value: String,
        reason: String,
        context: ErrorContext,
    },
    /// Validation errors (target size, batch length)
    Validation {
        field: String,
        constraint: String,
        value: String,
        context: ErrorContext,
    },
    /// Selection errors (unreadable or non-image files)
    Selection {
        name: String,
        reason: String,
        context: ErrorContext,
    },
    /// Image decoding failures
    Decode {
        name: String,
        reason: String,
        context: ErrorContext,
    },
    /// Image encoding or resizing failures
    Encode {
        name: String,
        reason: String,
        context: ErrorContext,
    },
    /// Handoff slot read/write failures
    Storage {
        slot: String,
        operation: String,
        reason: String,
        context: ErrorContext,
    },
    /// Archive export failures
    Archive {
        entry: Option<String>,
        reason: String,
        context: ErrorContext,
    },
    /// I/O errors
    Io {
        operation: String,
        path: Option<String>,
        source: std::io::Error,
        context: ErrorContext,
    },
    /// External library errors
    External {
        library: String,
        source: Box<dyn StdError + Send + Sync>,
        context: ErrorContext,
    },
}

impl ReduceError {
    /// Create a configuration error
    pub fn config(
        field: impl Into<String>,
        value: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::Config {
            field: field.into(),
            value: value.into(),
            reason: reason.into(),
            context: ErrorContext::new().with_severity(ErrorSeverity::Fatal),
        }
    }

    /// Create a validation error
    pub fn validation(
        field: impl Into<String>,
        constraint: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self::Validation {
            field: field.into(),
            constraint: constraint.into(),
            value: value.into(),
            context: ErrorContext::new(),
        }
    }

    /// Create a selection error
    pub fn selection(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Selection {
            name: name.into(),
            reason: reason.into(),
            context: ErrorContext::new().with_severity(ErrorSeverity::Warning),
        }
    }

    /// Create a decode error
    pub fn decode(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Decode {
            name: name.into(),
            reason: reason.into(),
            context: ErrorContext::new(),
        }
    }

    /// Create an encode error
    pub fn encode(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Encode {
            name: name.into(),
            reason: reason.into(),
            context: ErrorContext::new(),
        }
    }

    /// Create a storage error
    pub fn storage(
        slot: impl Into<String>,
        operation: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::Storage {
            slot: slot.into(),
            operation: operation.into(),
            reason: reason.into(),
            context: ErrorContext::new().with_severity(ErrorSeverity::Warning),
        }
    }

    /// Create an archive error
    pub fn archive(entry: Option<String>, reason: impl Into<String>) -> Self {
        Self::Archive {
            entry,
            reason: reason.into(),
            context: ErrorContext::new(),
        }
    }

    /// Create an I/O error tied to a path
    pub fn io_at(
        operation: impl Into<String>,
        path: impl AsRef<std::path::Path>,
        source: std::io::Error,
    ) -> Self {
        Self::Io {
            operation: operation.into(),
            path: Some(path.as_ref().display().to_string()),
            source,
            context: ErrorContext::new(),
        }
    }

    /// Create an external library error
    pub fn external(
        library: impl Into<String>,
        source: impl StdError + Send + Sync + 'static,
    ) -> Self {
        Self::External {
            library: library.into(),
            source: Box::new(source),
            context: ErrorContext::new(),
        }
    }

    /// Add context to the error
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context_mut().context = Some(context.into());
        self
    }

    /// Add recovery suggestion
    pub fn with_recovery_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.context_mut().recovery_suggestion = Some(suggestion.into());
        self
    }

    /// Get the error context
    pub fn context(&self) -> &ErrorContext {
        match self {
            Self::Config { context, .. } => context,
            Self::Validation { context, .. } => context,
            Self::Selection { context, .. } => context,
            Self::Decode { context, .. } => context,
            Self::Encode { context, .. } => context,
            Self::Storage { context, .. } => context,
            Self::Archive { context, .. } => context,
            Self::Io { context, .. } => context,
            Self::External { context, .. } => context,
        }
    }

    fn context_mut(&mut self) -> &mut ErrorContext {
        match self {
            Self::Config { context, .. } => context,
            Self::Validation { context, .. } => context,
            Self::Selection { context, .. } => context,
            Self::Decode { context, .. } => context,
            Self::Encode { context, .. } => context,
            Self::Storage { context, .. } => context,
            Self::Archive { context, .. } => context,
            Self::Io { context, .. } => context,
            Self::External { context, .. } => context,
        }
    }

    /// Get the error category as a string
    pub fn category(&self) -> &'static str {
        match self {
            Self::Config { .. } => "config",
            Self::Validation { .. } => "validation",
            Self::Selection { .. } => "selection",
            Self::Decode { .. } => "decode",
            Self::Encode { .. } => "encode",
            Self::Storage { .. } => "storage",
            Self::Archive { .. } => "archive",
            Self::Io { .. } => "io",
            Self::External { .. } => "external",
        }
    }
}

impl fmt::Display for ReduceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write_message(f)?;
        if let Some(context) = &self.context().context {
            write!(f, " ({})", context)?;
        }
        Ok(())
    }
}

impl ReduceError {
    fn write_message(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReduceError::Config {
                field,
                value,
                reason,
                ..
            } => {
                write!(
                    f,
                    "Configuration error in '{}': {} (value: {})",
                    field, reason, value
                )
            }
            ReduceError::Validation {
                field,
                constraint,
                value,
                ..
            } => {
                write!(
                    f,
                    "Validation failed for '{}': {} (value: {})",
                    field, constraint, value
                )
            }
            ReduceError::Selection { name, reason, .. } => {
                write!(f, "Cannot select '{}': {}", name, reason)
            }
            ReduceError::Decode { name, reason, .. } => {
                write!(f, "Failed to decode '{}': {}", name, reason)
            }
            ReduceError::Encode { name, reason, .. } => {
                write!(f, "Failed to compress '{}': {}", name, reason)
            }
            ReduceError::Storage {
                slot,
                operation,
                reason,
                ..
            } => {
                write!(f, "Storage {} failed for slot '{}': {}", operation, slot, reason)
            }
            ReduceError::Archive { entry, reason, .. } => {
                if let Some(entry) = entry {
                    write!(f, "Archive error at entry '{}': {}", entry, reason)
                } else {
                    write!(f, "Archive error: {}", reason)
                }
            }
            ReduceError::Io {
                operation,
                path,
                source,
                ..
            } => {
                if let Some(path) = path {
                    write!(
                        f,
                        "I/O error during {} on '{}': {}",
                        operation, path, source
                    )
                } else {
                    write!(f, "I/O error during {}: {}", operation, source)
                }
            }
            ReduceError::External {
                library, source, ..
            } => {
                write!(f, "External library error in {}: {}", library, source)
            }
        }
    }
}

impl StdError for ReduceError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::External { source, .. } => Some(source.as_ref()),
            _ => None,
        }
    }
}

/// Result type alias using our custom error type
pub type ReduceResult<T> = Result<T, ReduceError>;

/// Trait for errors that can be recovered from
pub trait Recoverable {
    /// Check if this error can be recovered from
    fn is_recoverable(&self) -> bool;

    /// Get recovery strategies for this error
    fn recovery_strategies(&self) -> Vec<RecoveryStrategy>;
}

/// Recovery strategies for handling errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecoveryStrategy {
    /// Skip the current item and continue
    Skip { reason: String },
    /// Keep going with reduced functionality
    Degrade { description: String },
}

impl Recoverable for ReduceError {
    fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::Decode { .. } | Self::Encode { .. } | Self::Storage { .. } | Self::Selection { .. }
        )
    }

    fn recovery_strategies(&self) -> Vec<RecoveryStrategy> {
        match self {
            Self::Decode { .. } | Self::Encode { .. } => vec![RecoveryStrategy::Skip {
                reason: "Skip this image and continue the batch".to_string(),
            }],
            Self::Selection { .. } => vec![RecoveryStrategy::Skip {
                reason: "Leave the file out of the selection".to_string(),
            }],
            Self::Storage { .. } => vec![RecoveryStrategy::Degrade {
                description: "Keep results in memory for this run only".to_string(),
            }],
            _ => vec![],
        }
    }
}

/// Trait for errors with severity levels
pub trait HasSeverity {
    /// Get the severity level of this error
    fn severity(&self) -> ErrorSeverity;
}

impl HasSeverity for ReduceError {
    fn severity(&self) -> ErrorSeverity {
        self.context().severity
    }
}

/// Trait for errors that provide recovery suggestions
pub trait HasRecoverySuggestion {
    /// Get recovery suggestion for this error
    fn recovery_suggestion(&self) -> Option<&str>;
}

impl HasRecoverySuggestion for ReduceError {
    fn recovery_suggestion(&self) -> Option<&str> {
        self.context().recovery_suggestion.as_deref()
    }
}

impl From<std::io::Error> for ReduceError {
    fn from(error: std::io::Error) -> Self {
        Self::Io {
            operation: "unknown".to_string(),
            path: None,
            source: error,
            context: ErrorContext::new(),
        }
    }
}

impl From<serde_json::Error> for ReduceError {
    fn from(error: serde_json::Error) -> Self {
        Self::external("serde_json", error)
    }
}

impl From<zip::result::ZipError> for ReduceError {
    fn from(error: zip::result::ZipError) -> Self {
        Self::archive(None, error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let error = ReduceError::validation("target_kb", "must be within 10..=2000", "5");
        assert_eq!(error.category(), "validation");
        assert!(!error.is_recoverable());
        assert_eq!(
            error.to_string(),
            "Validation failed for 'target_kb': must be within 10..=2000 (value: 5)"
        );
    }

    #[test]
    fn test_error_with_context() {
        let error = ReduceError::encode("cat.jpg", "encoder rejected dimensions")
            .with_context("compressing 2 of 3")
            .with_recovery_suggestion("try a larger target size");

        assert_eq!(error.category(), "encode");
        assert!(error.is_recoverable());
        assert_eq!(error.recovery_suggestion(), Some("try a larger target size"));
        assert_eq!(error.context().context.as_deref(), Some("compressing 2 of 3"));
        assert_eq!(
            error.to_string(),
            "Failed to compress 'cat.jpg': encoder rejected dimensions (compressing 2 of 3)"
        );
    }

    #[test]
    fn test_storage_errors_degrade() {
        let error = ReduceError::storage("processedImages", "write", "quota exceeded");
        assert_eq!(error.severity(), ErrorSeverity::Warning);
        assert_eq!(
            error.recovery_strategies(),
            vec![RecoveryStrategy::Degrade {
                description: "Keep results in memory for this run only".to_string(),
            }]
        );
    }

    #[test]
    fn test_config_errors_are_fatal() {
        let error = ReduceError::config("data_dir", "", "no data directory available");
        assert_eq!(error.severity(), ErrorSeverity::Fatal);
        assert!(error.recovery_strategies().is_empty());
    }
}
