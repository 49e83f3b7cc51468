//! Error handling for the loopback benchmark

use thiserror::Error;

/// Custom error types for the loopback benchmark
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Socket setup errors (create, bind, listen, connect)
    #[error("Socket setup error: {0}")]
    Socket(String),

    /// Mid-run transport errors (reset, short transfer, closed peer)
    #[error("Transport error: {0}")]
    Transport(String),

    /// Timeout errors
    #[error("Timeout error: {0}")]
    Timeout(String),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// I/O errors outside socket setup (files, terminal)
    #[error("I/O error: {0}")]
    Io(String),

    /// Parsing errors (numbers, test names, JSON)
    #[error("Parsing error: {0}")]
    Parse(String),

    /// Buffer allocation failures
    #[error("Resource error: {0}")]
    Resource(String),

    /// Test execution errors
    #[error("Test execution error: {0}")]
    TestExecution(String),

    /// Generic internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config(message.into())
    }

    /// Create a new socket setup error
    pub fn socket<S: Into<String>>(message: S) -> Self {
        Self::Socket(message.into())
    }

    /// Create a new transport error
    pub fn transport<S: Into<String>>(message: S) -> Self {
        Self::Transport(message.into())
    }

    /// Create a new timeout error
    pub fn timeout<S: Into<String>>(message: S) -> Self {
        Self::Timeout(message.into())
    }

    /// Create a new validation error
    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::Validation(message.into())
    }

    /// Create a new I/O error
    pub fn io<S: Into<String>>(message: S) -> Self {
        Self::Io(message.into())
    }

    /// Create a new parsing error
    pub fn parse<S: Into<String>>(message: S) -> Self {
        Self::Parse(message.into())
    }

    /// Create a new resource error
    pub fn resource<S: Into<String>>(message: S) -> Self {
        Self::Resource(message.into())
    }

    /// Create a new test execution error
    pub fn test_execution<S: Into<String>>(message: S) -> Self {
        Self::TestExecution(message.into())
    }

    /// Create a new internal error
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal(message.into())
    }

    /// Get error category for logging and reporting
    pub fn category(&self) -> &'static str {
        match self {
            Self::Config(_) => "CONFIG",
            Self::Socket(_) => "SOCKET",
            Self::Transport(_) => "TRANSPORT",
            Self::Timeout(_) => "TIMEOUT",
            Self::Validation(_) => "VALIDATION",
            Self::Io(_) => "IO",
            Self::Parse(_) => "PARSE",
            Self::Resource(_) => "RESOURCE",
            Self::TestExecution(_) => "TEST",
            Self::Internal(_) => "INTERNAL",
        }
    }

    /// Check if error is recoverable (a rerun may succeed)
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Socket(_) | Self::Transport(_) | Self::Timeout(_) => true,
            Self::Config(_) | Self::Validation(_) | Self::Parse(_) => false,
            Self::Io(_) | Self::Resource(_) | Self::TestExecution(_) | Self::Internal(_) => false,
        }
    }

    /// Get user-friendly error message with suggestions
    pub fn user_friendly_message(&self) -> String {
        match self {
            Self::Config(msg) => {
                format!("Configuration problem: {}\n\nSuggestion: Check your .env file or command line arguments.", msg)
            }
            Self::Socket(msg) => {
                format!("Could not set up a loopback socket: {}\n\nSuggestion: Check that the loopback interface is up and that ports {}-{} are not exhausted.",
                    msg,
                    crate::defaults::PORT_BASE,
                    crate::defaults::PORT_BASE + crate::defaults::PORT_WINDOW_SIZE - 1)
            }
            Self::Transport(msg) => {
                format!("Loopback transfer failed: {}\n\nSuggestion: This is usually transient. Run the benchmark again.", msg)
            }
            Self::Timeout(msg) => {
                format!("Operation timed out: {}\n\nSuggestion: The host may be heavily loaded. Increase --budget-ms or retry.", msg)
            }
            Self::Validation(msg) => {
                format!("Invalid input: {}\n\nSuggestion: Check budget, message size and buffer size values.", msg)
            }
            Self::Io(msg) => {
                format!("I/O operation failed: {}\n\nSuggestion: Check file permissions and terminal output.", msg)
            }
            Self::Parse(msg) => {
                format!("Failed to parse value: {}\n\nSuggestion: Check the format of your arguments or environment variables.", msg)
            }
            Self::Resource(msg) => {
                format!("Out of resources: {}\n\nSuggestion: Reduce --buffer-size or --max-samples.", msg)
            }
            Self::TestExecution(msg) => {
                format!("Benchmark failed: {}\n\nSuggestion: Run with --debug to see which sub-tests failed.", msg)
            }
            Self::Internal(msg) => {
                format!("Internal error: {}\n\nThis is likely a bug. Please report this issue with the error details.", msg)
            }
        }
    }

    /// Get exit code for this error type
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) | Self::Validation(_) | Self::Parse(_) => 1,  // Invalid configuration/usage
            Self::Socket(_) | Self::Transport(_) => 7,  // Loopback networking issues
            Self::Timeout(_) => 3,
            Self::Resource(_) => 4,
            Self::Io(_) => 5,
            Self::TestExecution(_) => 6,
            Self::Internal(_) => 99,
        }
    }

    /// Format error for console display with color coding
    pub fn format_for_console(&self, use_color: bool) -> String {
        let category = self.category();
        let message = self.to_string();

        if use_color {
            use colored::Colorize;
            match self {
                Self::Config(_) | Self::Validation(_) | Self::Parse(_) => {
                    format!("[{}] {}", category.red().bold(), message.red())
                }
                Self::Socket(_) | Self::Transport(_) => {
                    format!("[{}] {}", category.yellow().bold(), message.yellow())
                }
                Self::Timeout(_) => {
                    format!("[{}] {}", category.blue().bold(), message.blue())
                }
                Self::Resource(_) => {
                    format!("[{}] {}", category.magenta().bold(), message.magenta())
                }
                Self::Io(_) | Self::TestExecution(_) => {
                    format!("[{}] {}", category.cyan().bold(), message.cyan())
                }
                Self::Internal(_) => {
                    format!("[{}] {}", category.bright_red().bold(), message.bright_red())
                }
            }
        } else {
            format!("[{}] {}", category, message)
        }
    }
}

// Standard library error conversions
impl From<std::io::Error> for AppError {
    fn from(error: std::io::Error) -> Self {
        Self::io(error.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(error: serde_json::Error) -> Self {
        Self::parse(format!("JSON error: {}", error))
    }
}

impl From<dotenv::Error> for AppError {
    fn from(error: dotenv::Error) -> Self {
        Self::config(format!("Environment file error: {}", error))
    }
}

impl From<tokio::time::error::Elapsed> for AppError {
    fn from(error: tokio::time::error::Elapsed) -> Self {
        Self::timeout(error.to_string())
    }
}

impl From<std::num::ParseIntError> for AppError {
    fn from(error: std::num::ParseIntError) -> Self {
        Self::parse(format!("Integer parse error: {}", error))
    }
}

impl From<std::str::ParseBoolError> for AppError {
    fn from(error: std::str::ParseBoolError) -> Self {
        Self::parse(format!("Boolean parse error: {}", error))
    }
}

impl From<std::collections::TryReserveError> for AppError {
    fn from(error: std::collections::TryReserveError) -> Self {
        Self::resource(format!("Buffer allocation failed: {}", error))
    }
}

/// Custom Result type for the application
pub type Result<T> = std::result::Result<T, AppError>;

/// Error reporter for user-facing error output
pub struct ErrorReporter {
    pub use_color: bool,
    pub verbose: bool,
}

impl ErrorReporter {
    /// Create a new error reporter
    pub fn new(use_color: bool, verbose: bool) -> Self {
        Self { use_color, verbose }
    }

    /// Report an error to the user
    pub fn report_error(&self, error: &AppError) {
        eprintln!("{}", error.format_for_console(self.use_color));

        if self.verbose {
            eprintln!();
            eprintln!("{}", error.user_friendly_message());

            if error.is_recoverable() {
                eprintln!();
                if self.use_color {
                    use colored::Colorize;
                    eprintln!("{}", "This error might be temporary. You can try running the command again.".green());
                } else {
                    eprintln!("This error might be temporary. You can try running the command again.");
                }
            }
        }
    }
}

impl Default for ErrorReporter {
    fn default() -> Self {
        Self::new(true, false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let config_error = AppError::config("Invalid configuration");
        assert_eq!(config_error.category(), "CONFIG");
        assert!(!config_error.is_recoverable());
        assert_eq!(config_error.exit_code(), 1);

        let socket_error = AppError::socket("bind failed");
        assert_eq!(socket_error.category(), "SOCKET");
        assert!(socket_error.is_recoverable());
        assert_eq!(socket_error.exit_code(), 7);
        assert_eq!(AppError::transport("reset").exit_code(), 7);
    }

    #[test]
    fn test_error_display() {
        let error = AppError::transport("connection reset");
        let display = error.to_string();
        assert!(display.contains("Transport error"));
        assert!(display.contains("connection reset"));
    }

    #[test]
    fn test_error_categories() {
        let errors = [
            AppError::config("config"),
            AppError::socket("socket"),
            AppError::transport("transport"),
            AppError::timeout("timeout"),
            AppError::validation("validation"),
            AppError::io("io"),
            AppError::parse("parse"),
            AppError::resource("resource"),
            AppError::test_execution("test"),
            AppError::internal("internal"),
        ];

        let expected_categories = [
            "CONFIG", "SOCKET", "TRANSPORT", "TIMEOUT", "VALIDATION",
            "IO", "PARSE", "RESOURCE", "TEST", "INTERNAL",
        ];

        for (error, expected) in errors.iter().zip(expected_categories.iter()) {
            assert_eq!(error.category(), *expected);
        }
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(AppError::config("test").exit_code(), 1);
        assert_eq!(AppError::transport("test").exit_code(), 7);
        assert_eq!(AppError::timeout("test").exit_code(), 3);
        assert_eq!(AppError::resource("test").exit_code(), 4);
        assert_eq!(AppError::io("test").exit_code(), 5);
        assert_eq!(AppError::test_execution("test").exit_code(), 6);
        assert_eq!(AppError::internal("test").exit_code(), 99);
    }

    #[test]
    fn test_user_friendly_messages() {
        let error = AppError::socket("address in use");
        let message = error.user_friendly_message();
        assert!(message.contains("loopback socket"));
        assert!(message.contains("Suggestion:"));
        assert!(message.contains("47000-47999"));
    }

    #[test]
    fn test_error_conversions() {
        let io_error = std::io::Error::new(std::io::ErrorKind::NotFound, "File not found");
        let app_error: AppError = io_error.into();
        assert_eq!(app_error.category(), "IO");

        let parse_error = "not_a_number".parse::<u64>().unwrap_err();
        let app_error: AppError = parse_error.into();
        assert_eq!(app_error.category(), "PARSE");

        let bool_error = "not-a-bool".parse::<bool>().unwrap_err();
        let app_error: AppError = bool_error.into();
        assert!(app_error.to_string().contains("Boolean parse error"));
    }

    #[test]
    fn test_try_reserve_conversion() {
        let mut buffer: Vec<u8> = Vec::new();
        let error = buffer.try_reserve_exact(usize::MAX).unwrap_err();
        let app_error: AppError = error.into();
        assert_eq!(app_error.category(), "RESOURCE");
    }

    #[tokio::test]
    async fn test_elapsed_conversion() {
        let elapsed = tokio::time::timeout(
            std::time::Duration::from_millis(1),
            std::future::pending::<()>(),
        )
        .await
        .unwrap_err();
        let app_error: AppError = elapsed.into();
        assert_eq!(app_error.category(), "TIMEOUT");
    }

    #[test]
    fn test_dotenv_error_conversion() {
        let dotenv_error = dotenv::Error::LineParse(".env".to_string(), 1);
        let app_error: AppError = dotenv_error.into();
        assert_eq!(app_error.category(), "CONFIG");
        assert!(app_error.to_string().contains("Environment file error"));
    }

    #[test]
    fn test_console_formatting() {
        let error = AppError::config("Test error");
        let formatted_no_color = error.format_for_console(false);
        let formatted_color = error.format_for_console(true);

        assert_eq!(formatted_no_color, "[CONFIG] Configuration error: Test error");
        assert!(formatted_color.contains("CONFIG"));
        assert!(formatted_color.contains("Test error"));
    }

    #[test]
    fn test_error_reporter_default() {
        let reporter = ErrorReporter::default();
        assert!(reporter.use_color);
        assert!(!reporter.verbose);
    }
}
