// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Diagnostic output.
//!
//! The client reports progress and failures through `tracing`. Nothing is
//! printed until the application asks for it: with no subscriber installed
//! every event is discarded.
//!
//! Two ways to turn output on:
//!
//! - [`debug`] / [`set_log_writer`] route events to a swappable sink. The
//!   sink can be replaced at any time, or dropped again with [`discard`].
//! - [`init_logging`] installs a regular text, JSON or compact subscriber on
//!   stdout for applications that want the usual `RUST_LOG` setup.
//!
//! Only one global subscriber can exist per process. Both entry points report
//! [`LoggingError::AlreadyInitialized`] instead of panicking when one is
//! already in place.

use std::fmt;
use std::io::{self, Write};
use std::str::FromStr;
use std::sync::OnceLock;

use parking_lot::Mutex;
use thiserror::Error;
use tracing::Level;
use tracing_subscriber::{
    fmt::{self as tracing_fmt, MakeWriter},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

/// Prefix of every line written to the sink, kept for log scrapers.
pub const LOG_PREFIX: &str = "OPC ";

// =============================================================================
// Errors
// =============================================================================

/// Logging setup errors.
#[derive(Debug, Error)]
pub enum LoggingError {
    /// A global subscriber was installed by someone else.
    #[error("a global tracing subscriber is already installed")]
    AlreadyInitialized,

    /// The log format string is not known.
    #[error("unknown log format '{0}', expected text, json or compact")]
    UnknownFormat(String),
}

// =============================================================================
// Swappable sink
// =============================================================================

static SINK: Mutex<Option<Box<dyn Write + Send>>> = parking_lot::const_mutex(None);

static SINK_SUBSCRIBER: OnceLock<bool> = OnceLock::new();

/// Writer handed to the fmt layer; forwards to whatever sink is current.
#[derive(Debug, Clone, Copy, Default)]
pub struct SinkWriter;

impl Write for SinkWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match SINK.lock().as_mut() {
            Some(sink) => {
                sink.write_all(LOG_PREFIX.as_bytes())?;
                sink.write_all(buf)?;
                Ok(buf.len())
            }
            None => Ok(buf.len()),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match SINK.lock().as_mut() {
            Some(sink) => sink.flush(),
            None => Ok(()),
        }
    }
}

impl<'a> MakeWriter<'a> for SinkWriter {
    type Writer = SinkWriter;

    fn make_writer(&'a self) -> Self::Writer {
        SinkWriter
    }
}

/// Routes diagnostics to stderr.
pub fn debug() -> Result<(), LoggingError> {
    set_log_writer(io::stderr())
}

/// Routes diagnostics to `writer`, replacing the previous sink.
pub fn set_log_writer<W>(writer: W) -> Result<(), LoggingError>
where
    W: Write + Send + 'static,
{
    *SINK.lock() = Some(Box::new(writer));
    install_sink_subscriber()
}

/// Drops the current sink; later events are discarded again.
pub fn discard() {
    *SINK.lock() = None;
}

fn install_sink_subscriber() -> Result<(), LoggingError> {
    let installed = *SINK_SUBSCRIBER.get_or_init(|| {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"));

        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_fmt::layer()
                    .with_writer(SinkWriter)
                    .with_target(true)
                    .with_ansi(false),
            )
            .try_init()
            .is_ok()
    });

    if installed {
        Ok(())
    } else {
        Err(LoggingError::AlreadyInitialized)
    }
}

// =============================================================================
// Application subscriber
// =============================================================================

/// Output format for [`init_logging`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human readable text.
    #[default]
    Text,
    /// One JSON object per line.
    Json,
    /// Minimal single-line output.
    Compact,
}

impl FromStr for LogFormat {
    type Err = LoggingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            "compact" => Ok(Self::Compact),
            other => Err(LoggingError::UnknownFormat(other.to_string())),
        }
    }
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text => write!(f, "text"),
            Self::Json => write!(f, "json"),
            Self::Compact => write!(f, "compact"),
        }
    }
}

/// Installs a stdout subscriber. `RUST_LOG` takes precedence over `level`.
pub fn init_logging(level: &str, format: LogFormat) -> Result<(), LoggingError> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(parse_level(level).to_string().to_lowercase()));
    let is_terminal = io::IsTerminal::is_terminal(&io::stdout());

    let result = match format {
        LogFormat::Text => tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_fmt::layer()
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false)
                    .with_ansi(is_terminal),
            )
            .try_init(),
        LogFormat::Json => tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_fmt::layer()
                    .json()
                    .with_target(true)
                    .with_file(true)
                    .with_line_number(true)
                    .with_current_span(true),
            )
            .try_init(),
        LogFormat::Compact => tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_fmt::layer()
                    .compact()
                    .with_target(false)
                    .with_ansi(is_terminal),
            )
            .try_init(),
    };

    result.map_err(|_| LoggingError::AlreadyInitialized)
}

/// Parses a log level string; unknown strings map to `INFO`.
pub fn parse_level(level: &str) -> Level {
    match level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" | "warning" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[derive(Clone, Default)]
    struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_parse_level() {
        assert_eq!(parse_level("trace"), Level::TRACE);
        assert_eq!(parse_level("DEBUG"), Level::DEBUG);
        assert_eq!(parse_level("Info"), Level::INFO);
        assert_eq!(parse_level("warning"), Level::WARN);
        assert_eq!(parse_level("error"), Level::ERROR);
        assert_eq!(parse_level("invalid"), Level::INFO);
    }

    #[test]
    fn test_log_format_parse() {
        assert_eq!("json".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert_eq!("Compact".parse::<LogFormat>().unwrap(), LogFormat::Compact);
        assert!("xml".parse::<LogFormat>().is_err());
        assert_eq!(LogFormat::default().to_string(), "text");
    }

    #[test]
    fn test_sink_writer_swaps_and_discards() {
        let buffer = SharedBuffer::default();
        *SINK.lock() = Some(Box::new(buffer.clone()));

        SinkWriter.write_all(b"first line\n").unwrap();
        discard();
        SinkWriter.write_all(b"dropped\n").unwrap();

        let written = String::from_utf8(buffer.0.lock().clone()).unwrap();
        assert_eq!(written, "OPC first line\n");
    }
}
