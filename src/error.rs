//! Crate-wide error type.
//!
//! Every fallible operation in this crate returns [`Result<T>`], where the
//! error carries one of the machine-readable [`ErrorKind`]s a caller is
//! expected to branch on (`not_found`, `sync_in_progress`, ...) plus an
//! optional human-readable context string and, where available, the
//! underlying cause.

use std::fmt;

/// The closed set of error identifiers the core can surface to a caller.
///
/// These are machine-readable outcomes, not Rust type names: a caller
/// (the host process) matches on `kind()` rather than downcasting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, thiserror::Error)]
pub enum ErrorKind {
    /// Transport failure talking to the upstream ERP, after retries.
    #[error("upstream_unavailable")]
    UpstreamUnavailable,
    /// Protocol or application-level error returned by the upstream ERP.
    #[error("upstream_query_error")]
    UpstreamQueryError,
    /// Every reader returned empty for the requested MTO.
    #[error("not_found")]
    NotFound,
    /// A sync trigger arrived while a run was already in progress.
    #[error("sync_in_progress")]
    SyncInProgress,
    /// A caller-supplied parameter was out of its accepted range.
    #[error("validation_error")]
    ValidationError,
    /// An invariant the core assumes was violated.
    #[error("internal_error")]
    Internal,
}

impl ErrorKind {
    /// The identifier as it appears in `spec.md` §7 (snake_case).
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::UpstreamUnavailable => "upstream_unavailable",
            Self::UpstreamQueryError => "upstream_query_error",
            Self::NotFound => "not_found",
            Self::SyncInProgress => "sync_in_progress",
            Self::ValidationError => "validation_error",
            Self::Internal => "internal_error",
        }
    }

    /// Returns `true` when a caller may usefully retry the same call.
    #[must_use]
    pub const fn is_retriable(self) -> bool {
        matches!(self, Self::UpstreamUnavailable)
    }
}

/// The crate's error type: a [`ErrorKind`] plus optional context and cause.
#[derive(Debug)]
pub struct Error {
    kind: ErrorKind,
    context: Option<String>,
    source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
}

impl Error {
    /// Creates a bare error of the given kind.
    #[must_use]
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            context: None,
            source: None,
        }
    }

    /// Attaches a human-readable context string.
    #[must_use]
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    /// Attaches an underlying cause.
    #[must_use]
    pub fn with_source(
        mut self,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Returns the machine-readable kind.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Returns the attached context, if any.
    #[must_use]
    pub fn context(&self) -> Option<&str> {
        self.context.as_deref()
    }

    /// Shorthand constructors for each kind.
    #[must_use]
    pub fn upstream_unavailable(context: impl Into<String>) -> Self {
        Self::new(ErrorKind::UpstreamUnavailable).with_context(context)
    }

    #[must_use]
    pub fn upstream_query_error(context: impl Into<String>) -> Self {
        Self::new(ErrorKind::UpstreamQueryError).with_context(context)
    }

    #[must_use]
    pub fn not_found(mto: impl fmt::Display) -> Self {
        Self::new(ErrorKind::NotFound).with_context(format!("no records for MTO {mto}"))
    }

    #[must_use]
    pub fn sync_in_progress() -> Self {
        Self::new(ErrorKind::SyncInProgress)
    }

    #[must_use]
    pub fn validation(context: impl Into<String>) -> Self {
        Self::new(ErrorKind::ValidationError).with_context(context)
    }

    #[must_use]
    pub fn internal(context: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal).with_context(context)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)?;
        if let Some(ctx) = &self.context {
            write!(f, ": {ctx}")?;
        }
        Ok(())
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source.as_ref().map(|e| e.as_ref() as _)
    }
}

impl From<rusqlite::Error> for Error {
    fn from(e: rusqlite::Error) -> Self {
        Self::new(ErrorKind::Internal)
            .with_context("persistent store error")
            .with_source(e)
    }
}

impl From<tokio::time::error::Elapsed> for Error {
    fn from(e: tokio::time::error::Elapsed) -> Self {
        Self::new(ErrorKind::UpstreamUnavailable)
            .with_context("deadline elapsed")
            .with_source(e)
    }
}

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_strings_match_spec_identifiers() {
        assert_eq!(ErrorKind::UpstreamUnavailable.as_str(), "upstream_unavailable");
        assert_eq!(ErrorKind::UpstreamQueryError.as_str(), "upstream_query_error");
        assert_eq!(ErrorKind::NotFound.as_str(), "not_found");
        assert_eq!(ErrorKind::SyncInProgress.as_str(), "sync_in_progress");
        assert_eq!(ErrorKind::ValidationError.as_str(), "validation_error");
        assert_eq!(ErrorKind::Internal.as_str(), "internal_error");
    }

    #[test]
    fn display_includes_context() {
        let err = Error::not_found("AK2510034");
        let msg = err.to_string();
        assert!(msg.contains("not_found"));
        assert!(msg.contains("AK2510034"));
    }

    #[test]
    fn only_upstream_unavailable_is_retriable() {
        assert!(ErrorKind::UpstreamUnavailable.is_retriable());
        assert!(!ErrorKind::UpstreamQueryError.is_retriable());
        assert!(!ErrorKind::NotFound.is_retriable());
    }
}
