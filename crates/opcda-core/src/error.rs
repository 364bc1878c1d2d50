// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! OPC DA error types.
//!
//! # Error Categories
//!
//! ```text
//! OpcDaError
//! ├── Connect    - Session, group and item container setup
//! ├── Item       - Per-tag add/read/write failures
//! ├── Aggregate  - Several per-tag or per-node failures from one batch call
//! ├── Config     - Invalid or unreadable client configuration
//! └── Driver     - Raw failure reported by the server driver
//! ```
//!
//! # Examples
//!
//! ```
//! use opcda_core::error::{DriverError, ItemError, OpcDaError};
//!
//! let error = OpcDaError::from(ItemError::read_failed(
//!     "numeric.sin.int64",
//!     DriverError::new("server unavailable"),
//! ));
//!
//! assert!(error.is_retryable());
//! assert_eq!(error.category(), "item");
//! ```

use std::fmt;
use std::io;
use std::path::PathBuf;

use thiserror::Error;
use tracing::Level;

/// Result alias for client operations.
pub type OpcDaResult<T> = Result<T, OpcDaError>;

/// Result alias for raw driver calls.
pub type DriverResult<T> = Result<T, DriverError>;

// =============================================================================
// OpcDaError - Main Error Type
// =============================================================================

/// The main error type for OPC DA client operations.
#[derive(Debug, Error)]
pub enum OpcDaError {
    /// Session or group setup errors.
    #[error("{0}")]
    Connect(#[from] ConnectError),

    /// Per-tag errors.
    #[error("{0}")]
    Item(#[from] ItemError),

    /// Several failures collected from one batch operation.
    #[error("{0}")]
    Aggregate(#[from] AggregateError),

    /// Configuration errors.
    #[error("{0}")]
    Config(#[from] ConfigError),

    /// Driver errors not attributed to a specific step.
    #[error("{0}")]
    Driver(#[from] DriverError),
}

impl OpcDaError {
    /// Returns `true` if repeating the operation may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Connect(e) => e.is_retryable(),
            Self::Item(e) => e.is_retryable(),
            Self::Aggregate(e) => e.iter().any(OpcDaError::is_retryable),
            Self::Config(_) => false,
            Self::Driver(_) => true,
        }
    }

    /// Returns the severity level of this error.
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            Self::Connect(_) => ErrorSeverity::Error,
            Self::Item(e) => e.severity(),
            Self::Aggregate(_) => ErrorSeverity::Warning,
            Self::Config(_) => ErrorSeverity::Critical,
            Self::Driver(_) => ErrorSeverity::Error,
        }
    }

    /// Returns the error category for logging.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Connect(_) => "connect",
            Self::Item(_) => "item",
            Self::Aggregate(_) => "aggregate",
            Self::Config(_) => "config",
            Self::Driver(_) => "driver",
        }
    }

    /// Returns the tracing level for this error.
    pub fn tracing_level(&self) -> Level {
        self.severity().to_tracing_level()
    }

    /// Logs this error with appropriate level and context.
    pub fn log(&self, context: &str) {
        match self.tracing_level() {
            Level::ERROR => tracing::error!(
                category = self.category(),
                context = context,
                retryable = self.is_retryable(),
                "{self}"
            ),
            Level::WARN => tracing::warn!(
                category = self.category(),
                context = context,
                retryable = self.is_retryable(),
                "{self}"
            ),
            _ => tracing::debug!(
                category = self.category(),
                context = context,
                retryable = self.is_retryable(),
                "{self}"
            ),
        }
    }
}

// =============================================================================
// ConnectError
// =============================================================================

/// Failures while establishing a session and its item container.
///
/// Each variant names the setup step that failed.
#[derive(Debug, Error)]
pub enum ConnectError {
    /// The driver could not create a session object.
    #[error("cannot create server session: {source}")]
    SessionUnavailable {
        /// Underlying driver error.
        #[source]
        source: DriverError,
    },

    /// The driver refused the connection to `server` on `node`.
    #[error("connection failed: {source}")]
    ConnectionFailed {
        /// Server program identifier.
        server: String,
        /// Node the connection was attempted on.
        node: String,
        /// Underlying driver error.
        #[source]
        source: DriverError,
    },

    /// The group collection of the session is unavailable.
    #[error("cannot get OPCGroups property")]
    GroupingUnavailable {
        /// Underlying driver error.
        #[source]
        source: DriverError,
    },

    /// A subscription group could not be added.
    #[error("cannot add new OPC Group")]
    AddGroupFailed {
        /// Underlying driver error.
        #[source]
        source: DriverError,
    },

    /// The item container of the group is unavailable.
    #[error("cannot get OPC Items")]
    ContainerUnavailable {
        /// Underlying driver error.
        #[source]
        source: DriverError,
    },

    /// The browse cursor could not be created.
    #[error("failed to create OPCBrowser")]
    CursorUnavailable {
        /// Underlying driver error.
        #[source]
        source: DriverError,
    },

    /// The session is not connected to a running server.
    #[error("cannot browse because we are not connected")]
    NotConnected,

    /// The owner was closed and holds no session anymore.
    #[error("connection is closed")]
    Closed,
}

impl ConnectError {
    /// Creates a connection failed error.
    pub fn connection_failed(
        server: impl Into<String>,
        node: impl Into<String>,
        source: DriverError,
    ) -> Self {
        Self::ConnectionFailed {
            server: server.into(),
            node: node.into(),
            source,
        }
    }

    /// Returns `true` if this error is retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ConnectionFailed { .. } | Self::NotConnected)
    }

    /// Returns the setup step that failed.
    pub fn step(&self) -> &'static str {
        match self {
            Self::SessionUnavailable { .. } => "session",
            Self::ConnectionFailed { .. } => "connect",
            Self::GroupingUnavailable { .. } => "grouping",
            Self::AddGroupFailed { .. } => "group",
            Self::ContainerUnavailable { .. } => "item container",
            Self::CursorUnavailable { .. } => "browse cursor",
            Self::NotConnected => "state",
            Self::Closed => "closed",
        }
    }
}

// =============================================================================
// ItemError
// =============================================================================

/// Per-tag failures.
#[derive(Debug, Error)]
pub enum ItemError {
    /// The server rejected the tag because it is not in its address space.
    #[error("{tag}: {source}")]
    TagNotFound {
        /// The rejected tag.
        tag: String,
        /// Underlying driver error.
        #[source]
        source: DriverError,
    },

    /// The driver accepted the tag but returned no usable item handle.
    #[error("{tag}: no usable item handle returned")]
    NoHandle {
        /// The tag.
        tag: String,
    },

    /// Implicit registration before a write failed.
    #[error("failed to add tag {tag}: {source}")]
    AddFailed {
        /// The tag.
        tag: String,
        /// Why the registration failed.
        #[source]
        source: Box<ItemError>,
    },

    /// A cached read failed.
    #[error("cannot read {tag}: {source}")]
    ReadFailed {
        /// The tag.
        tag: String,
        /// Underlying driver error.
        #[source]
        source: DriverError,
    },

    /// A write failed.
    #[error("cannot write {tag}: {source}")]
    WriteFailed {
        /// The tag.
        tag: String,
        /// Underlying driver error.
        #[source]
        source: DriverError,
    },

    /// The item container was released; nothing can be added anymore.
    #[error("cannot add {tag}: item container is closed")]
    ContainerClosed {
        /// The tag.
        tag: String,
    },

    /// The tag is not part of the working set.
    #[error("tag {tag} not found, add it first")]
    NotRegistered {
        /// The tag.
        tag: String,
    },
}

impl ItemError {
    /// Creates a tag not found error.
    pub fn tag_not_found(tag: impl Into<String>, source: DriverError) -> Self {
        Self::TagNotFound {
            tag: tag.into(),
            source,
        }
    }

    /// Creates a read failed error.
    pub fn read_failed(tag: impl Into<String>, source: DriverError) -> Self {
        Self::ReadFailed {
            tag: tag.into(),
            source,
        }
    }

    /// Creates a write failed error.
    pub fn write_failed(tag: impl Into<String>, source: DriverError) -> Self {
        Self::WriteFailed {
            tag: tag.into(),
            source,
        }
    }

    /// Creates a not registered error.
    pub fn not_registered(tag: impl Into<String>) -> Self {
        Self::NotRegistered { tag: tag.into() }
    }

    /// Returns the tag this error refers to.
    pub fn tag(&self) -> &str {
        match self {
            Self::TagNotFound { tag, .. }
            | Self::NoHandle { tag }
            | Self::ContainerClosed { tag }
            | Self::AddFailed { tag, .. }
            | Self::ReadFailed { tag, .. }
            | Self::WriteFailed { tag, .. }
            | Self::NotRegistered { tag } => tag,
        }
    }

    /// Returns `true` if this error is retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ReadFailed { .. } | Self::WriteFailed { .. })
    }

    /// Returns the severity level of this error.
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            Self::NotRegistered { .. } => ErrorSeverity::Info,
            Self::ContainerClosed { .. } => ErrorSeverity::Warning,
            Self::TagNotFound { .. } | Self::NoHandle { .. } | Self::AddFailed { .. } => {
                ErrorSeverity::Warning
            }
            Self::ReadFailed { .. } | Self::WriteFailed { .. } => ErrorSeverity::Error,
        }
    }
}

// =============================================================================
// AggregateError
// =============================================================================

/// A keyed failure inside an [`AggregateError`].
#[derive(Debug)]
pub struct Failure {
    /// Tag or node the failure belongs to.
    pub key: String,
    /// The failure itself.
    pub error: OpcDaError,
}

/// Failures collected from a batch `add` or a `try_connect` over several nodes.
///
/// The display form is the context followed by every message joined with `;; `.
#[derive(Debug)]
pub struct AggregateError {
    context: String,
    failures: Vec<Failure>,
}

impl AggregateError {
    /// Creates an empty aggregate with the given context.
    pub fn new(context: impl Into<String>) -> Self {
        Self {
            context: context.into(),
            failures: Vec::new(),
        }
    }

    /// Records a failure for `key`.
    pub fn push(&mut self, key: impl Into<String>, error: impl Into<OpcDaError>) {
        self.failures.push(Failure {
            key: key.into(),
            error: error.into(),
        });
    }

    /// Returns `true` if no failure was recorded.
    pub fn is_empty(&self) -> bool {
        self.failures.is_empty()
    }

    /// Returns the number of failures.
    pub fn len(&self) -> usize {
        self.failures.len()
    }

    /// Returns the context message.
    pub fn context(&self) -> &str {
        &self.context
    }

    /// Returns the recorded failures in order.
    pub fn failures(&self) -> &[Failure] {
        &self.failures
    }

    /// Returns the keys (tags or nodes) that failed.
    pub fn failed_keys(&self) -> Vec<&str> {
        self.failures.iter().map(|f| f.key.as_str()).collect()
    }

    /// Iterates over the individual errors.
    pub fn iter(&self) -> impl Iterator<Item = &OpcDaError> {
        self.failures.iter().map(|f| &f.error)
    }

    /// Returns `Ok(())` when empty, otherwise the aggregate as an error.
    pub fn into_result(self) -> OpcDaResult<()> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(OpcDaError::Aggregate(self))
        }
    }
}

impl fmt::Display for AggregateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.failures.is_empty() {
            return f.write_str(&self.context);
        }
        write!(f, "{}: ", self.context)?;
        for (i, failure) in self.failures.iter().enumerate() {
            if i > 0 {
                f.write_str(";; ")?;
            }
            write!(f, "{}", failure.error)?;
        }
        Ok(())
    }
}

impl std::error::Error for AggregateError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.failures
            .first()
            .map(|f| &f.error as &(dyn std::error::Error + 'static))
    }
}

// =============================================================================
// DriverError
// =============================================================================

/// Error reported by a server driver call.
///
/// Native automation errors carry a numeric code, a description and
/// optionally a nested sub-error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriverError {
    code: Option<i32>,
    description: String,
    sub_error: Option<Box<DriverError>>,
}

impl DriverError {
    /// Creates an error with a description only.
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            code: None,
            description: description.into(),
            sub_error: None,
        }
    }

    /// Creates an error with a native error code.
    pub fn with_code(code: i32, description: impl Into<String>) -> Self {
        Self {
            code: Some(code),
            description: description.into(),
            sub_error: None,
        }
    }

    /// Attaches a nested error.
    pub fn with_sub_error(mut self, sub_error: DriverError) -> Self {
        self.sub_error = Some(Box::new(sub_error));
        self
    }

    /// Returns the native error code, if any.
    pub fn code(&self) -> Option<i32> {
        self.code
    }

    /// Returns the description with trailing line breaks removed.
    pub fn description(&self) -> &str {
        self.description.trim_end_matches(['\r', '\n'])
    }

    /// Returns the nested error, if any.
    pub fn sub_error(&self) -> Option<&DriverError> {
        self.sub_error.as_deref()
    }
}

impl fmt::Display for DriverError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.code {
            Some(code) => {
                write!(f, "code={}, desc={:?}, sub=[", code, self.description())?;
                if let Some(sub) = &self.sub_error {
                    write!(f, "{sub}")?;
                }
                f.write_str("]")
            }
            None => f.write_str(self.description()),
        }
    }
}

impl std::error::Error for DriverError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.sub_error
            .as_deref()
            .map(|e| e as &(dyn std::error::Error + 'static))
    }
}

// =============================================================================
// ConfigError
// =============================================================================

/// Client configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Configuration file does not exist.
    #[error("File not found: {path}")]
    FileNotFound {
        /// The missing path.
        path: PathBuf,
    },

    /// Configuration file could not be read.
    #[error("Failed to read config file '{path}': {source}")]
    Io {
        /// Path to the file.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// Configuration content could not be parsed.
    #[error("Failed to parse config: {message}")]
    Parse {
        /// Path to the file, if loaded from disk.
        path: Option<PathBuf>,
        /// Parser message.
        message: String,
    },

    /// File extension is not a known format.
    #[error("Unsupported config format: {extension}")]
    UnsupportedFormat {
        /// The extension that was found.
        extension: String,
    },

    /// A field holds an invalid value.
    #[error("Validation failed for '{field}': {message}")]
    Validation {
        /// The field that failed validation.
        field: String,
        /// Error message.
        message: String,
    },

    /// An override environment variable holds an invalid value.
    #[error("Invalid environment variable value for '{name}': {message}")]
    InvalidEnvVar {
        /// Variable name.
        name: String,
        /// Error message.
        message: String,
    },
}

impl ConfigError {
    /// Creates a file not found error.
    pub fn file_not_found(path: impl Into<PathBuf>) -> Self {
        Self::FileNotFound { path: path.into() }
    }

    /// Creates an I/O error.
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Creates a parse error.
    pub fn parse(path: Option<PathBuf>, message: impl Into<String>) -> Self {
        Self::Parse {
            path,
            message: message.into(),
        }
    }

    /// Creates an unsupported format error.
    pub fn unsupported_format(extension: impl Into<String>) -> Self {
        Self::UnsupportedFormat {
            extension: extension.into(),
        }
    }

    /// Creates a validation error.
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Creates an invalid environment variable error.
    pub fn invalid_env_var(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidEnvVar {
            name: name.into(),
            message: message.into(),
        }
    }
}

// =============================================================================
// ErrorSeverity
// =============================================================================

/// Error severity levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ErrorSeverity {
    /// Informational - no action required.
    Info,
    /// Warning - action may be required.
    Warning,
    /// Error - action required, but recoverable.
    Error,
    /// Critical - immediate action required.
    Critical,
}

impl ErrorSeverity {
    /// Converts to tracing level.
    pub fn to_tracing_level(self) -> Level {
        match self {
            Self::Info => Level::INFO,
            Self::Warning => Level::WARN,
            Self::Error | Self::Critical => Level::ERROR,
        }
    }

    /// Returns the string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
            Self::Critical => "critical",
        }
    }
}

impl fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_driver_error_display_with_code() {
        let error = DriverError::with_code(-2147352567, "Unknown item ID\r\n")
            .with_sub_error(DriverError::new("not in address space"));

        assert_eq!(
            error.to_string(),
            "code=-2147352567, desc=\"Unknown item ID\", sub=[not in address space]"
        );
        assert!(std::error::Error::source(&error).is_some());
    }

    #[test]
    fn test_driver_error_display_without_code() {
        let error = DriverError::new("server gone\n");
        assert_eq!(error.to_string(), "server gone");
        assert_eq!(error.code(), None);
    }

    #[test]
    fn test_connect_error_messages() {
        let failed = ConnectError::connection_failed(
            "Graybox.Simulator",
            "localhost",
            DriverError::new("access denied"),
        );
        assert_eq!(failed.to_string(), "connection failed: access denied");
        assert_eq!(failed.step(), "connect");

        let grouping = ConnectError::GroupingUnavailable {
            source: DriverError::new("x"),
        };
        assert_eq!(grouping.to_string(), "cannot get OPCGroups property");

        let group = ConnectError::AddGroupFailed {
            source: DriverError::new("x"),
        };
        assert_eq!(group.to_string(), "cannot add new OPC Group");

        let container = ConnectError::ContainerUnavailable {
            source: DriverError::new("x"),
        };
        assert_eq!(container.to_string(), "cannot get OPC Items");
    }

    #[test]
    fn test_aggregate_error() {
        let mut aggregate = AggregateError::new("failed to add tags");
        assert!(aggregate.is_empty());

        aggregate.push(
            "bad.one",
            ItemError::tag_not_found("bad.one", DriverError::new("unknown item")),
        );
        aggregate.push("bad.two", ItemError::NoHandle { tag: "bad.two".into() });

        assert_eq!(aggregate.len(), 2);
        assert_eq!(aggregate.failed_keys(), vec!["bad.one", "bad.two"]);
        assert_eq!(
            aggregate.to_string(),
            "failed to add tags: bad.one: unknown item;; bad.two: no usable item handle returned"
        );

        let error = aggregate.into_result().unwrap_err();
        assert_eq!(error.category(), "aggregate");
    }

    #[test]
    fn test_empty_aggregate_is_ok() {
        let empty = AggregateError::new("nothing");
        assert_eq!(empty.to_string(), "nothing");
        assert!(empty.into_result().is_ok());
    }

    #[test]
    fn test_item_error_properties() {
        let read = ItemError::read_failed("a.b", DriverError::new("timeout"));
        assert_eq!(read.tag(), "a.b");
        assert!(read.is_retryable());
        assert_eq!(read.severity(), ErrorSeverity::Error);

        let add = ItemError::AddFailed {
            tag: "a.b".into(),
            source: Box::new(ItemError::NoHandle { tag: "a.b".into() }),
        };
        assert_eq!(
            add.to_string(),
            "failed to add tag a.b: a.b: no usable item handle returned"
        );
        assert!(!add.is_retryable());

        let closed = ItemError::ContainerClosed { tag: "a.b".into() };
        assert_eq!(closed.to_string(), "cannot add a.b: item container is closed");
        assert_eq!(closed.tag(), "a.b");
        assert!(!closed.is_retryable());
        assert_eq!(closed.severity(), ErrorSeverity::Warning);
    }

    #[test]
    fn test_severity_levels() {
        assert_eq!(ErrorSeverity::Warning.to_tracing_level(), Level::WARN);
        assert_eq!(ErrorSeverity::Critical.to_tracing_level(), Level::ERROR);
        assert!(ErrorSeverity::Critical > ErrorSeverity::Info);
        assert_eq!(ErrorSeverity::Error.to_string(), "error");
    }
}
