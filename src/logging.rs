//! Structured logging for the loopback benchmark
//!
//! This module provides:
//! - Structured logging with multiple levels and contexts
//! - Session and per-operation correlation IDs
//! - Probe lifecycle events (setup failures, transport loss, result summaries)
//! - JSON structured output for integration with log aggregators

use crate::error::{AppError, Result};
use crate::models::{Config, LatencyResult, ThroughputResult};
use crate::types::SubTest;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::{self, Write};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Log level enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum LogLevel {
    /// Trace level - most detailed
    Trace = 0,
    /// Debug level - per-round events
    Debug = 1,
    /// Info level - probe results and run planning
    Info = 2,
    /// Warning level - a sub-test could not run
    Warn = 3,
    /// Error level - resource exhaustion and internal faults
    Error = 4,
    /// Fatal level - the process cannot continue
    Fatal = 5,
}

impl LogLevel {
    /// Get log level name as string
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "TRACE",
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warn => "WARN",
            LogLevel::Error => "ERROR",
            LogLevel::Fatal => "FATAL",
        }
    }

    /// Get ANSI color code for console output
    pub fn color_code(&self) -> &'static str {
        match self {
            LogLevel::Trace => "\x1b[37m",
            LogLevel::Debug => "\x1b[36m",
            LogLevel::Info => "\x1b[32m",
            LogLevel::Warn => "\x1b[33m",
            LogLevel::Error => "\x1b[31m",
            LogLevel::Fatal => "\x1b[35m",
        }
    }

    /// Reset ANSI color code
    pub fn reset_code() -> &'static str {
        "\x1b[0m"
    }
}

impl std::str::FromStr for LogLevel {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_uppercase().as_str() {
            "TRACE" => Ok(LogLevel::Trace),
            "DEBUG" => Ok(LogLevel::Debug),
            "INFO" => Ok(LogLevel::Info),
            "WARN" | "WARNING" => Ok(LogLevel::Warn),
            "ERROR" => Ok(LogLevel::Error),
            "FATAL" => Ok(LogLevel::Fatal),
            _ => Err(AppError::parse(format!("Invalid log level: {}", s))),
        }
    }
}

/// Log entry structure for structured logging
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    pub message: String,
    /// Logger name/component
    pub logger: String,
    /// Correlation ID for tracking related events
    pub correlation_id: Option<String>,
    pub fields: HashMap<String, serde_json::Value>,
    pub location: Option<LogLocation>,
}

/// Source code location information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogLocation {
    pub file: String,
    pub line: u32,
    pub module: Option<String>,
}

/// Log output format options
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LogFormat {
    /// Human-readable console format
    Console,
    /// JSON format for structured logging
    Json,
    /// Compact single-line format
    Compact,
}

/// Shared logging context for correlation and session tracking
#[derive(Debug, Default)]
struct LogContext {
    session_id: Option<String>,
    current_correlation_id: Option<String>,
    context_fields: HashMap<String, serde_json::Value>,
}

/// Logger implementation with multiple output formats
#[derive(Debug, Clone)]
pub struct Logger {
    min_level: LogLevel,
    use_color: bool,
    include_location: bool,
    /// Send every entry to stderr so stdout stays machine-readable
    stderr_only: bool,
    format: LogFormat,
    name: String,
    context: Arc<RwLock<LogContext>>,
}

impl Logger {
    /// Create a new logger
    pub fn new(name: String) -> Self {
        Self {
            min_level: LogLevel::Info,
            use_color: true,
            include_location: false,
            stderr_only: false,
            format: LogFormat::Console,
            name,
            context: Arc::new(RwLock::new(LogContext::default())),
        }
    }

    /// Logger used when a library caller supplies none: warnings and above, no colour
    pub fn quiet(name: String) -> Self {
        Self {
            min_level: LogLevel::Warn,
            use_color: false,
            ..Self::new(name)
        }
    }

    /// Create a logger with specific configuration
    pub fn with_config(name: String, config: &Config) -> Self {
        let min_level = if config.debug {
            LogLevel::Debug
        } else if config.verbose {
            LogLevel::Info
        } else {
            LogLevel::Warn
        };

        Self {
            min_level,
            use_color: config.enable_color,
            include_location: config.debug,
            stderr_only: config.json,
            format: if config.debug {
                LogFormat::Json
            } else if config.json {
                // One short line per record next to the JSON report
                LogFormat::Compact
            } else {
                LogFormat::Console
            },
            name,
            context: Arc::new(RwLock::new(LogContext::default())),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Set minimum log level
    pub fn set_level(&mut self, level: LogLevel) {
        self.min_level = level;
    }

    /// Set output format
    pub fn set_format(&mut self, format: LogFormat) {
        self.format = format;
    }

    /// Enable or disable colored output
    pub fn set_color(&mut self, use_color: bool) {
        self.use_color = use_color;
    }

    /// Set session correlation ID
    pub async fn set_session_id(&self, session_id: String) {
        let mut context = self.context.write().await;
        context.session_id = Some(session_id);
    }

    /// Add context field for all subsequent log entries
    pub async fn add_context_field<T: Serialize>(&self, key: String, value: T) {
        if let Ok(json_value) = serde_json::to_value(value) {
            let mut context = self.context.write().await;
            context.context_fields.insert(key, json_value);
        }
    }

    /// Start a correlated operation
    pub async fn start_operation(&self, operation_name: &str) -> String {
        let correlation_id = Uuid::new_v4().to_string();
        {
            let mut context = self.context.write().await;
            context.current_correlation_id = Some(correlation_id.clone());
        }

        self.debug(&format!("Started operation: {}", operation_name))
            .correlation_id(&correlation_id)
            .field("operation", operation_name)
            .field("operation_type", "start")
            .log()
            .await;

        correlation_id
    }

    /// End a correlated operation
    pub async fn end_operation(&self, correlation_id: &str, operation_name: &str, success: bool) {
        self.debug(&format!("Completed operation: {} (success: {})", operation_name, success))
            .correlation_id(correlation_id)
            .field("operation", operation_name)
            .field("operation_type", "end")
            .field("success", success)
            .log()
            .await;

        let mut context = self.context.write().await;
        if context.current_correlation_id.as_deref() == Some(correlation_id) {
            context.current_correlation_id = None;
        }
    }

    /// Create a log entry builder
    pub fn log(&self, level: LogLevel, message: &str) -> LogEntryBuilder<'_> {
        LogEntryBuilder::new(self, level, message.to_string())
    }

    pub fn trace(&self, message: &str) -> LogEntryBuilder<'_> {
        self.log(LogLevel::Trace, message)
    }

    pub fn debug(&self, message: &str) -> LogEntryBuilder<'_> {
        self.log(LogLevel::Debug, message)
    }

    pub fn info(&self, message: &str) -> LogEntryBuilder<'_> {
        self.log(LogLevel::Info, message)
    }

    pub fn warn(&self, message: &str) -> LogEntryBuilder<'_> {
        self.log(LogLevel::Warn, message)
    }

    pub fn error(&self, message: &str) -> LogEntryBuilder<'_> {
        self.log(LogLevel::Error, message)
    }

    pub fn fatal(&self, message: &str) -> LogEntryBuilder<'_> {
        self.log(LogLevel::Fatal, message)
    }

    /// Check if a log level would be output
    pub fn would_log(&self, level: LogLevel) -> bool {
        level >= self.min_level
    }

    async fn write_entry(&self, mut entry: LogEntry) {
        if entry.level < self.min_level {
            return;
        }

        let context = self.context.read().await;
        if let Some(session_id) = &context.session_id {
            entry
                .fields
                .insert("session_id".to_string(), serde_json::Value::String(session_id.clone()));
        }
        if entry.correlation_id.is_none() {
            entry.correlation_id = context.current_correlation_id.clone();
        }
        for (key, value) in &context.context_fields {
            entry.fields.insert(key.clone(), value.clone());
        }
        drop(context);

        let output = match self.format {
            LogFormat::Console => self.format_console(&entry),
            LogFormat::Json => self.format_json(&entry),
            LogFormat::Compact => self.format_compact(&entry),
        };

        // Warnings and errors to stderr, the rest to stdout
        if self.stderr_only || entry.level >= LogLevel::Warn {
            let _ = writeln!(io::stderr(), "{}", output);
        } else {
            let _ = writeln!(io::stdout(), "{}", output);
        }
    }

    fn format_console(&self, entry: &LogEntry) -> String {
        let timestamp = entry.timestamp.format("%Y-%m-%d %H:%M:%S%.3f");
        let level_str = entry.level.as_str();

        let formatted_level = if self.use_color {
            format!("{}{:>5}{}", entry.level.color_code(), level_str, LogLevel::reset_code())
        } else {
            format!("{:>5}", level_str)
        };

        let mut output = format!("{} {} [{}] {}", timestamp, formatted_level, entry.logger, entry.message);

        if let Some(correlation_id) = &entry.correlation_id {
            // First 8 chars are enough to tell operations apart
            let short: String = correlation_id.chars().take(8).collect();
            output.push_str(&format!(" [{}]", short));
        }

        if !entry.fields.is_empty() {
            let mut fields: Vec<String> = entry
                .fields
                .iter()
                .map(|(k, v)| format!("{}={}", k, v))
                .collect();
            fields.sort();
            output.push_str(&format!(" {{{}}}", fields.join(", ")));
        }

        if self.include_location {
            if let Some(location) = &entry.location {
                output.push_str(&format!(" @ {}:{}", location.file, location.line));
            }
        }

        output
    }

    fn format_json(&self, entry: &LogEntry) -> String {
        match serde_json::to_string(entry) {
            Ok(json) => json,
            Err(_) => format!(
                "{{\"error\": \"Failed to serialize log entry\", \"message\": \"{}\"}}",
                entry.message
            ),
        }
    }

    fn format_compact(&self, entry: &LogEntry) -> String {
        let timestamp = entry.timestamp.format("%H:%M:%S");
        format!(
            "{} {} {}: {}",
            timestamp,
            entry.level.as_str().chars().next().unwrap_or('?'),
            entry.logger,
            entry.message
        )
    }
}

/// Builder pattern for creating log entries
pub struct LogEntryBuilder<'a> {
    logger: &'a Logger,
    entry: LogEntry,
}

impl<'a> LogEntryBuilder<'a> {
    fn new(logger: &'a Logger, level: LogLevel, message: String) -> Self {
        Self {
            logger,
            entry: LogEntry {
                timestamp: Utc::now(),
                level,
                message,
                logger: logger.name.clone(),
                correlation_id: None,
                fields: HashMap::new(),
                location: None,
            },
        }
    }

    /// Add a correlation ID
    pub fn correlation_id(mut self, id: &str) -> Self {
        self.entry.correlation_id = Some(id.to_string());
        self
    }

    /// Add a structured field
    pub fn field<T: Serialize>(mut self, key: &str, value: T) -> Self {
        if let Ok(json_value) = serde_json::to_value(value) {
            self.entry.fields.insert(key.to_string(), json_value);
        }
        self
    }

    /// Add location information
    pub fn location(mut self, file: &str, line: u32, module: Option<&str>) -> Self {
        self.entry.location = Some(LogLocation {
            file: file.to_string(),
            line,
            module: module.map(String::from),
        });
        self
    }

    /// Add latency summary fields
    pub fn latency(self, result: &LatencyResult) -> Self {
        self.field("samples", result.sample_count)
            .field("lost_rounds", result.lost_rounds)
            .field("min_us", result.min_us)
            .field("median_us", result.median_us)
            .field("p99_us", result.p99_us)
            .field("max_us", result.max_us)
            .field("success", result.success)
    }

    /// Add throughput summary fields
    pub fn throughput(self, result: &ThroughputResult) -> Self {
        self.field("bytes_transferred", result.bytes_transferred)
            .field("bytes_sent", result.bytes_sent)
            .field("duration_sec", result.duration_sec)
            .field("mib_per_sec", result.mib_per_sec)
            .field("success", result.success)
    }

    /// Add error information
    pub fn error_info(self, error: &AppError) -> Self {
        self.field("error_category", error.category())
            .field("error_recoverable", error.is_recoverable())
            .field("error_exit_code", error.exit_code())
    }

    /// Finalize and write the log entry
    pub async fn log(self) {
        self.logger.write_entry(self.entry).await;
    }
}

/// Logger for probe and orchestrator events
#[derive(Debug, Clone)]
pub struct ProbeLogger {
    logger: Logger,
}

impl ProbeLogger {
    pub const COMPONENT: &'static str = "PROBE";

    /// Create a probe logger from the application configuration
    pub fn new(config: &Config) -> Self {
        Self {
            logger: Logger::with_config(Self::COMPONENT.to_string(), config),
        }
    }

    /// Probe logger that only reports warnings and errors
    pub fn quiet() -> Self {
        Self {
            logger: Logger::quiet(Self::COMPONENT.to_string()),
        }
    }

    pub fn from_logger(logger: Logger) -> Self {
        Self { logger }
    }

    pub fn logger(&self) -> &Logger {
        &self.logger
    }

    /// Log the start of a probe
    pub async fn log_probe_start(&self, test: SubTest, budget: Duration, size: usize) {
        self.logger
            .debug(&format!("Starting {} probe", test.label()))
            .field("test", test.as_str())
            .field("budget_ms", budget.as_secs_f64() * 1000.0)
            .field("size", size)
            .log()
            .await;
    }

    /// Log a server bound to a different port than the one allocated
    pub async fn log_port_fallback(&self, test: SubTest, requested: u16, bound: u16) {
        self.logger
            .debug(&format!("Port {} busy, {} server bound to {}", requested, test.label(), bound))
            .field("test", test.as_str())
            .field("requested_port", requested)
            .field("bound_port", bound)
            .log()
            .await;
    }

    /// Log a setup failure that left the sub-test unsuccessful
    pub async fn log_setup_failure(&self, test: SubTest, error: &AppError) {
        let level = match error {
            AppError::Resource(_) | AppError::Internal(_) => LogLevel::Error,
            _ => LogLevel::Warn,
        };

        self.logger
            .log(level, &format!("{} setup failed: {}", test.label(), error))
            .field("test", test.as_str())
            .error_info(error)
            .log()
            .await;
    }

    /// Log a lost or unusable round; not an error for UDP
    pub async fn log_transport_loss(&self, test: SubTest, round: u64, error: &AppError) {
        self.logger
            .debug(&format!("{} round {} lost: {}", test.label(), round, error))
            .field("test", test.as_str())
            .field("round", round)
            .field("error_category", error.category())
            .log()
            .await;
    }

    /// Log the end of a measurement loop that stopped on a transport failure
    pub async fn log_transport_failure(&self, test: SubTest, error: &AppError) {
        self.logger
            .debug(&format!("{} loop ended early: {}", test.label(), error))
            .field("test", test.as_str())
            .error_info(error)
            .log()
            .await;
    }

    /// Log a latency probe result
    pub async fn log_latency_result(&self, test: SubTest, result: &LatencyResult) {
        self.logger
            .info(&format!(
                "{}: {} samples, median {:.1}us, p99 {:.1}us",
                test.label(),
                result.sample_count,
                result.median_us,
                result.p99_us
            ))
            .field("test", test.as_str())
            .latency(result)
            .log()
            .await;
    }

    /// Log a throughput probe result
    pub async fn log_throughput_result(&self, test: SubTest, result: &ThroughputResult) {
        self.logger
            .info(&format!(
                "{}: {} bytes in {:.3}s ({:.1} MiB/s)",
                test.label(),
                result.bytes_transferred,
                result.duration_sec,
                result.mib_per_sec
            ))
            .field("test", test.as_str())
            .throughput(result)
            .log()
            .await;
    }

    /// Log how the orchestrator split its budget
    pub async fn log_slice_plan(&self, total: Duration, enabled: &[SubTest], slice: Duration) {
        let names: Vec<&str> = enabled.iter().map(|t| t.as_str()).collect();
        self.logger
            .info(&format!(
                "Running {} sub-tests, {:.1}ms each",
                enabled.len(),
                slice.as_secs_f64() * 1000.0
            ))
            .field("total_budget_ms", total.as_secs_f64() * 1000.0)
            .field("slice_ms", slice.as_secs_f64() * 1000.0)
            .field("tests", names)
            .log()
            .await;
    }
}

impl Default for ProbeLogger {
    fn default() -> Self {
        Self::quiet()
    }
}

/// Creates loggers that share one session id
pub struct LoggerFactory {
    config: Config,
    session_id: String,
}

impl LoggerFactory {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            session_id: Uuid::new_v4().to_string(),
        }
    }

    /// Create a logger with a specific name
    pub async fn create_logger(&self, name: &str) -> Logger {
        let logger = Logger::with_config(name.to_string(), &self.config);
        logger.set_session_id(self.session_id.clone()).await;
        logger
    }

    /// Create a probe logger tagged with the session id
    pub async fn create_probe_logger(&self) -> ProbeLogger {
        ProbeLogger::from_logger(self.create_logger(ProbeLogger::COMPONENT).await)
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }
}

/// Convenience macros for logging with location information
#[macro_export]
macro_rules! log_debug {
    ($logger:expr, $($arg:tt)*) => {
        $logger.debug(&format!($($arg)*))
            .location(file!(), line!(), Some(module_path!()))
            .log()
            .await
    };
}

#[macro_export]
macro_rules! log_info {
    ($logger:expr, $($arg:tt)*) => {
        $logger.info(&format!($($arg)*))
            .location(file!(), line!(), Some(module_path!()))
            .log()
            .await
    };
}

#[macro_export]
macro_rules! log_warn {
    ($logger:expr, $($arg:tt)*) => {
        $logger.warn(&format!($($arg)*))
            .location(file!(), line!(), Some(module_path!()))
            .log()
            .await
    };
}

#[macro_export]
macro_rules! log_error {
    ($logger:expr, $($arg:tt)*) => {
        $logger.error(&format!($($arg)*))
            .location(file!(), line!(), Some(module_path!()))
            .log()
            .await
    };
}
