//! Structured logger factory
//!
//! A [`Logger`] owns its own `tracing` dispatcher plus a span carrying the
//! fields bound to it. The base logger binds `service`; the per-request
//! logger derived by [`Logger::for_request`] adds `trace_id` on a child span.
//! Nothing here installs a global subscriber unless asked to via
//! [`Logger::install_global`].

use std::{fmt, future::Future, io::IsTerminal, str::FromStr};

use tracing::{
    instrument::{Instrument, Instrumented, WithDispatch, WithSubscriber},
    Dispatch, Span,
};
use tracing_subscriber::{
    filter::LevelFilter,
    fmt::{time::ChronoUtc, MakeWriter},
    prelude::*,
};

use crate::config::LogConfig;
use crate::error::{Error, Result};

/// RFC3339 with nanosecond precision, always UTC
pub const CONSOLE_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.9fZ";

/// Minimum severity a logger emits
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
    Fatal,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
            LogLevel::Fatal => "fatal",
        }
    }

    /// `tracing` has no level above ERROR, so `fatal` filters like `error`.
    pub fn as_filter(&self) -> LevelFilter {
        match self {
            LogLevel::Trace => LevelFilter::TRACE,
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Warn => LevelFilter::WARN,
            LogLevel::Error | LogLevel::Fatal => LevelFilter::ERROR,
        }
    }
}

impl FromStr for LogLevel {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "trace" => Ok(LogLevel::Trace),
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            "fatal" => Ok(LogLevel::Fatal),
            _ => Err(Error::invalid_config(format!(
                "unknown log level '{}' (expected trace, debug, info, warn, error or fatal)",
                s
            ))),
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Output sink format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogOutput {
    /// Human-readable lines with a fixed high-precision timestamp
    Console,
    /// One JSON object per record
    Json,
}

impl LogOutput {
    /// `"console"` selects the console writer, anything else the JSON one.
    pub fn from_name(name: &str) -> Self {
        if name.trim().eq_ignore_ascii_case("console") {
            LogOutput::Console
        } else {
            LogOutput::Json
        }
    }
}

/// Immutable, cheaply cloneable structured logger.
#[derive(Clone)]
pub struct Logger {
    dispatch: Dispatch,
    span: Span,
}

impl fmt::Debug for Logger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Logger")
            .field("span", &self.span)
            .finish()
    }
}

impl Logger {
    /// Build a logger writing to stderr.
    pub fn new(cfg: &LogConfig, service: &str) -> Result<Self> {
        Self::build(cfg, service, std::io::stderr, std::io::stderr().is_terminal())
    }

    /// Build a logger writing to `writer`.
    ///
    /// Fails with [`Error::InvalidConfiguration`] when the level does not
    /// parse; nothing is constructed in that case.
    pub fn with_writer<W>(cfg: &LogConfig, service: &str, writer: W) -> Result<Self>
    where
        W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
    {
        Self::build(cfg, service, writer, false)
    }

    fn build<W>(cfg: &LogConfig, service: &str, writer: W, ansi: bool) -> Result<Self>
    where
        W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
    {
        let level: LogLevel = cfg.level.parse()?;
        let filter = level.as_filter();

        let dispatch = match LogOutput::from_name(&cfg.output) {
            LogOutput::Console => Dispatch::new(
                tracing_subscriber::registry().with(filter).with(
                    tracing_subscriber::fmt::layer()
                        .with_writer(writer)
                        .with_ansi(ansi)
                        .with_timer(ChronoUtc::new(CONSOLE_TIME_FORMAT.to_string()))
                        .with_target(false),
                ),
            ),
            LogOutput::Json => Dispatch::new(
                tracing_subscriber::registry().with(filter).with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .flatten_event(true)
                        .with_current_span(true)
                        .with_span_list(true)
                        .with_writer(writer)
                        .with_ansi(false)
                        .with_timer(ChronoUtc::rfc_3339())
                        .with_target(false),
                ),
            ),
        };

        // ERROR-level span so the bound fields survive every level filter
        let span = tracing::dispatcher::with_default(&dispatch, || {
            tracing::error_span!("service", service = %service)
        });

        Ok(Self { dispatch, span })
    }

    /// Derive a logger with `trace_id` bound as a permanent field.
    pub fn for_request(&self, trace_id: &str) -> Logger {
        let span = tracing::dispatcher::with_default(&self.dispatch, || {
            tracing::error_span!(parent: &self.span, "request", trace_id = %trace_id)
        });

        Logger {
            dispatch: self.dispatch.clone(),
            span,
        }
    }

    /// Run `f` with this logger's dispatcher and bound fields active, so
    /// the plain `tracing` macros inside it go through this logger.
    pub fn in_scope<F, R>(&self, f: F) -> R
    where
        F: FnOnce() -> R,
    {
        tracing::dispatcher::with_default(&self.dispatch, || self.span.in_scope(f))
    }

    /// Bind a future to this logger for every poll.
    pub fn bind<F>(&self, fut: F) -> WithDispatch<Instrumented<F>>
    where
        F: Future,
    {
        fut.instrument(self.span.clone())
            .with_subscriber(self.dispatch.clone())
    }

    /// Make this logger the process-wide default for code that logs without
    /// a logger in hand (framework layers, startup code). Can succeed once.
    pub fn install_global(&self) -> Result<()> {
        tracing::dispatcher::set_global_default(self.dispatch.clone())
            .map_err(|e| Error::Logging(e.to_string()))
    }
}
