//! Loopback Bench - Main CLI Application
//!
//! Measures TCP and UDP latency and throughput over 127.0.0.1 within a
//! fixed wall-clock budget.

use clap::Parser;
use loopback_bench::{
    app::App,
    cli::Cli,
    error::{AppError, ErrorReporter},
};
use std::process;

#[tokio::main]
async fn main() {
    std::panic::set_hook(Box::new(|panic_info| {
        eprintln!("Application panic: {}", panic_info);
        process::exit(99);
    }));

    let cli = Cli::parse();
    let reporter = ErrorReporter::new(cli.use_colors(), cli.verbose || cli.debug);

    if let Err(message) = cli.validate() {
        let error = AppError::validation(message);
        reporter.report_error(&error);
        process::exit(error.exit_code());
    }

    match App::new(cli).run().await {
        Ok(outcome) => process::exit(outcome.exit_code()),
        Err(e) => {
            reporter.report_error(&e);
            print_error_suggestions(&e);
            process::exit(e.exit_code());
        }
    }
}

/// Print helpful suggestions for common errors
fn print_error_suggestions(error: &AppError) {
    match error {
        AppError::Config(_) | AppError::Validation(_) | AppError::Parse(_) => {
            eprintln!();
            eprintln!("Configuration help:");
            eprintln!("  - Check your .env file format (see --env-example)");
            eprintln!("  - LOOPBACK_BUDGET_MS must be between 1 and 600000");
            eprintln!("  - LOOPBACK_TESTS takes a comma-separated list of sub-test names");
        }
        AppError::Socket(_) => {
            eprintln!();
            eprintln!("Socket troubleshooting:");
            eprintln!("  - Check that the loopback interface is up");
            eprintln!("  - Check the open file descriptor limit (ulimit -n)");
        }
        _ => {}
    }
}
