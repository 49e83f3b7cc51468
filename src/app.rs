//! Main application orchestration and execution

use crate::{
    cli::Cli,
    config::{display_config_summary, load_config, validate_config, EnvManager},
    error::{AppError, Result},
    executor::{BenchmarkOrchestrator, RunSummary},
    logging::LoggerFactory,
    log_debug, log_error, log_info, log_warn,
    models::{LoopbackBenchConfig, LoopbackBenchResult},
    output::{OutputCoordinator, OutputFormatterFactory},
};
use std::path::Path;

/// What a finished invocation produced
#[derive(Debug)]
pub enum AppOutcome {
    /// Reference text was printed, no probes ran
    Info,
    /// A benchmark ran to completion
    Completed {
        result: LoopbackBenchResult,
        summary: RunSummary,
    },
}

impl AppOutcome {
    /// The error a completed run that produced no successful sub-test stands for
    pub fn failure(&self) -> Option<AppError> {
        match self {
            Self::Completed { result, summary } if !result.any_success() => {
                Some(AppError::test_execution(format!(
                    "none of {} enabled sub-tests produced a result",
                    summary.enabled.len()
                )))
            }
            _ => None,
        }
    }

    /// Process exit code: 0 unless a benchmark ran and nothing succeeded
    pub fn exit_code(&self) -> i32 {
        self.failure().map_or(0, |error| error.exit_code())
    }
}

/// Main application struct that coordinates all components
pub struct App {
    cli: Cli,
}

impl App {
    /// Create a new application instance with CLI configuration
    pub fn new(cli: Cli) -> Self {
        Self { cli }
    }

    /// Run the application
    pub async fn run(self) -> Result<AppOutcome> {
        if self.cli.env_example {
            print!("{}", EnvManager::create_example_env_content());
            return Ok(AppOutcome::Info);
        }
        if self.cli.env_help {
            print!("{}", EnvManager::display_env_help());
            return Ok(AppOutcome::Info);
        }

        let config = load_config(self.cli.clone())?;
        let warnings = validate_config(&config)?;

        let factory = LoggerFactory::new(config.clone());
        let logger = factory.create_logger("APP").await;

        if config.debug {
            eprintln!(
                "{} v{} ({}, built {} for {})",
                crate::PKG_NAME,
                crate::VERSION,
                crate::GIT_COMMIT.unwrap_or("unknown commit"),
                crate::BUILD_TIME,
                crate::TARGET_TRIPLE
            );
            eprintln!("Session: {}", factory.session_id());
            eprintln!("\nConfiguration Summary:\n{}\n", display_config_summary(&config));

            let env_path = self.cli.env_file.as_deref().unwrap_or(Path::new(".env"));
            if let Some(problems) = EnvManager::check_env_file(env_path)? {
                for problem in problems {
                    log_warn!(logger, "{}: {}", env_path.display(), problem);
                }
            }
        }

        if !warnings.is_empty() {
            eprintln!("Configuration Warnings:");
            for warning in &warnings {
                eprintln!("  {}", warning.format(config.enable_color));
            }
            eprintln!();
        }

        let bench_config = LoopbackBenchConfig::from(&config);
        log_info!(
            logger,
            "Starting loopback benchmark: {} sub-tests within {}ms",
            bench_config.enabled_tests().len(),
            config.budget_ms
        );

        let orchestrator =
            BenchmarkOrchestrator::new(bench_config.clone()).with_logger(factory.create_probe_logger().await);
        let (result, summary) = orchestrator.run_with_summary().await;

        log_debug!(
            logger,
            "Benchmark finished in {:.1}ms, {}/{} sub-tests succeeded",
            summary.total_duration.as_secs_f64() * 1000.0,
            summary.successful_tests,
            summary.enabled.len()
        );

        if config.json {
            println!("{}", OutputCoordinator::display_json(&bench_config, &result, &summary)?);
        } else {
            let formatter = OutputFormatterFactory::create_formatter(config.enable_color, config.verbose);
            let coordinator = OutputCoordinator::new(formatter);
            println!("{}", coordinator.display_results(&result, &summary)?);
            if config.verbose {
                println!("\n{}", coordinator.display_quick_summary(&result, &summary)?);
            }
        }

        let outcome = AppOutcome::Completed { result, summary };
        if let Some(error) = outcome.failure() {
            log_error!(logger, "{}", error);
        }

        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_outcome_exit_codes() {
        assert_eq!(AppOutcome::Info.exit_code(), 0);

        let summary = RunSummary {
            enabled: Vec::new(),
            slice: Duration::ZERO,
            total_duration: Duration::ZERO,
            successful_tests: 0,
        };
        let failed = AppOutcome::Completed {
            result: LoopbackBenchResult::default(),
            summary: summary.clone(),
        };
        assert_eq!(failed.exit_code(), 6);
        assert!(matches!(failed.failure(), Some(AppError::TestExecution(_))));
        assert!(AppOutcome::Info.failure().is_none());

        let mut result = LoopbackBenchResult::default();
        result.udp_latency.success = true;
        assert_eq!(AppOutcome::Completed { result, summary }.exit_code(), 0);
    }
}
