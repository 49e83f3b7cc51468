//! Colored formatter implementation with terminal color support
//!
//! Latency cells are colored by [`LatencyLevel`], statuses and delivery
//! ratios by outcome. Cells are padded before coloring so ANSI escapes
//! never disturb column alignment.

use super::formatter::{
    align_text, display_width, format_duration_ms, format_micros, format_percentage,
    latency_cells, latency_columns, throughput_cells, throughput_columns, Column,
    FormattingOptions, OutputFormatter, RowStatus,
};
use crate::{
    error::{AppError, Result},
    executor::RunSummary,
    models::{LoopbackBenchResult, ProbeReport},
    types::{LatencyLevel, SubTest},
};
use colored::*;
use std::fmt::Write as _;

impl LatencyLevel {
    /// Get color for this latency level
    pub fn color(&self) -> Color {
        match self {
            Self::Excellent => Color::Green,
            Self::Good => Color::Cyan,
            Self::Fair => Color::Yellow,
            Self::Poor => Color::Red,
        }
    }

    /// Get descriptive text
    pub fn description(&self) -> &'static str {
        match self {
            Self::Excellent => "Excellent",
            Self::Good => "Good",
            Self::Fair => "Fair",
            Self::Poor => "Poor",
        }
    }
}

/// Color scheme configuration
#[derive(Debug, Clone)]
pub struct ColorScheme {
    pub header: Color,
    pub success: Color,
    pub warning: Color,
    pub error: Color,
    pub info: Color,
    pub muted: Color,
    pub border: Color,
}

impl Default for ColorScheme {
    fn default() -> Self {
        Self {
            header: Color::Blue,
            success: Color::Green,
            warning: Color::Yellow,
            error: Color::Red,
            info: Color::Cyan,
            muted: Color::BrightBlack,
            border: Color::BrightBlack,
        }
    }
}

/// One cell of a colored row: plain text plus an optional color
type Cell = (String, Option<Color>);

/// Colored formatter implementation
pub struct ColoredFormatter {
    options: FormattingOptions,
    color_scheme: ColorScheme,
}

impl ColoredFormatter {
    /// Create a new colored formatter with options
    pub fn new(options: FormattingOptions) -> Self {
        Self {
            options,
            color_scheme: ColorScheme::default(),
        }
    }

    /// Create a colored formatter with custom color scheme
    pub fn with_color_scheme(options: FormattingOptions, color_scheme: ColorScheme) -> Self {
        Self { options, color_scheme }
    }

    /// Apply color to text if colors are enabled
    fn colorize(&self, text: &str, color: Color) -> ColoredString {
        if self.options.enable_color {
            text.color(color)
        } else {
            text.normal()
        }
    }

    /// Apply bold formatting if colors are enabled
    fn bold(&self, text: &str) -> ColoredString {
        if self.options.enable_color {
            text.bold()
        } else {
            text.normal()
        }
    }

    fn status_cell(&self, status: RowStatus) -> Cell {
        let color = match status {
            RowStatus::Ok => self.color_scheme.success,
            RowStatus::Failed => self.color_scheme.error,
            RowStatus::Skipped => self.color_scheme.muted,
        };
        (status.as_str().to_string(), Some(color))
    }

    fn percentage_color(&self, percentage: f64) -> Color {
        if percentage >= 95.0 {
            self.color_scheme.success
        } else if percentage >= 80.0 {
            self.color_scheme.warning
        } else {
            self.color_scheme.error
        }
    }

    /// Render rows with widths computed on plain text
    fn render_table(&self, columns: &[Column], rows: &[Vec<Cell>]) -> String {
        let widths: Vec<usize> = columns
            .iter()
            .enumerate()
            .map(|(idx, column)| {
                rows.iter()
                    .filter_map(|row| row.get(idx))
                    .map(|(text, _)| display_width(text))
                    .fold(column.min_width.max(display_width(&column.header)), usize::max)
            })
            .collect();

        let rule = self
            .colorize(&"─".repeat(widths.iter().sum::<usize>() + 2 * widths.len()), self.color_scheme.border)
            .to_string();

        let mut lines = Vec::with_capacity(rows.len() + 3);
        let header: Vec<String> = columns
            .iter()
            .zip(&widths)
            .map(|(column, &width)| align_text(&column.header, width, &column.alignment))
            .collect();
        lines.push(self.bold(header.join("  ").trim_end()).to_string());
        lines.push(rule.clone());

        for row in rows {
            let cells: Vec<String> = row
                .iter()
                .zip(columns.iter().zip(&widths))
                .map(|((text, color), (column, &width))| {
                    let padded = align_text(text, width, &column.alignment);
                    match color {
                        Some(color) => self.colorize(&padded, *color).to_string(),
                        None => padded,
                    }
                })
                .collect();
            lines.push(cells.join("  ").trim_end().to_string());
        }
        lines.push(rule);

        lines.join("\n")
    }

    fn latency_row(&self, result: &LoopbackBenchResult, test: SubTest, enabled: &[SubTest]) -> Vec<Cell> {
        let status = RowStatus::of(result, test, enabled);
        let mut row = vec![(test.label().to_string(), Some(self.color_scheme.info)), self.status_cell(status)];

        if let (RowStatus::Ok, ProbeReport::Latency(latency)) = (status, result.get(test)) {
            let cells = latency_cells(&latency, self.options.verbose_mode);
            // Same order as latency_cells
            let values = [
                None,
                Some(latency.min_us),
                Some(latency.median_us),
                Some(latency.mean_us),
                Some(latency.p99_us),
                Some(latency.max_us),
                None,
                None,
                Some(latency.p90_us),
                Some(latency.p95_us),
                Some(latency.p999_us),
                None,
            ];
            for (idx, text) in cells.into_iter().enumerate() {
                let color = match (idx, values.get(idx).copied().flatten()) {
                    (_, Some(us)) => Some(LatencyLevel::from_micros(us).color()),
                    (7, None) if latency.lost_rounds > 0 => Some(self.color_scheme.warning),
                    _ => None,
                };
                row.push((text, color));
            }
        }

        row
    }

    fn throughput_row(&self, result: &LoopbackBenchResult, test: SubTest, enabled: &[SubTest]) -> Vec<Cell> {
        let status = RowStatus::of(result, test, enabled);
        let mut row = vec![(test.label().to_string(), Some(self.color_scheme.info)), self.status_cell(status)];

        if let (RowStatus::Ok, ProbeReport::Throughput(throughput)) = (status, result.get(test)) {
            let delivered = throughput.delivery_ratio() * 100.0;
            for (idx, text) in throughput_cells(&throughput).into_iter().enumerate() {
                let color = match idx {
                    0 | 1 => Some(self.color_scheme.success),
                    4 => Some(self.percentage_color(delivered)),
                    _ => None,
                };
                row.push((text, color));
            }
        }

        row
    }
}

impl OutputFormatter for ColoredFormatter {
    fn format_header(&self, title: &str) -> Result<String> {
        let border = "═".repeat(display_width(title) + 4);
        Ok(format!(
            "{}\n  {}  \n{}",
            self.colorize(&border, self.color_scheme.header),
            self.bold(title).color(self.color_scheme.header),
            self.colorize(&border, self.color_scheme.header)
        ))
    }

    fn format_run_summary(&self, summary: &RunSummary) -> Result<String> {
        let mut output = String::new();
        let names: Vec<&str> = summary.enabled.iter().map(|t| t.as_str()).collect();
        let success_rate = summary.success_rate();

        writeln!(output, "{}", self.bold("Run Summary")).map_err(fmt_err)?;
        writeln!(
            output,
            "  Sub-tests:      {}",
            if names.is_empty() {
                self.colorize("none", self.color_scheme.warning).to_string()
            } else {
                names.join(", ")
            }
        )
        .map_err(fmt_err)?;
        writeln!(
            output,
            "  Slice per test: {}",
            format_duration_ms(summary.slice.as_secs_f64() * 1000.0)
        )
        .map_err(fmt_err)?;
        writeln!(
            output,
            "  Total duration: {}",
            format_duration_ms(summary.total_duration.as_secs_f64() * 1000.0)
        )
        .map_err(fmt_err)?;
        writeln!(
            output,
            "  Successful:     {} ({})",
            self.colorize(&summary.successful_tests.to_string(), self.color_scheme.success),
            self.colorize(&format_percentage(success_rate), self.percentage_color(success_rate))
        )
        .map_err(fmt_err)?;

        let failed = summary.failed_tests();
        let failed_text = failed.to_string();
        write!(
            output,
            "  Failed:         {}",
            if failed > 0 {
                self.colorize(&failed_text, self.color_scheme.error)
            } else {
                failed_text.normal()
            }
        )
        .map_err(fmt_err)?;

        Ok(output)
    }

    fn format_latency_table(&self, result: &LoopbackBenchResult, enabled: &[SubTest]) -> Result<String> {
        let rows: Vec<Vec<Cell>> = [SubTest::TcpLatency, SubTest::UdpLatency]
            .iter()
            .map(|&test| self.latency_row(result, test, enabled))
            .collect();

        Ok(self.render_table(&latency_columns(self.options.verbose_mode), &rows))
    }

    fn format_throughput_table(&self, result: &LoopbackBenchResult, enabled: &[SubTest]) -> Result<String> {
        let rows: Vec<Vec<Cell>> = [SubTest::TcpThroughput, SubTest::UdpThroughput]
            .iter()
            .map(|&test| self.throughput_row(result, test, enabled))
            .collect();

        Ok(self.render_table(&throughput_columns(), &rows))
    }

    fn format_quick_summary(&self, result: &LoopbackBenchResult, summary: &RunSummary) -> Result<String> {
        let rtt = |us: f64| self.colorize(&format_micros(us), LatencyLevel::from_micros(us).color());

        Ok(format!(
            "{}/{} ok | TCP rtt {} | UDP rtt {} | TCP {} MiB/s | UDP {} MiB/s | {}",
            self.colorize(&summary.successful_tests.to_string(), self.color_scheme.success),
            summary.enabled.len(),
            rtt(result.tcp_latency.median_us),
            rtt(result.udp_latency.median_us),
            self.colorize(&format!("{:.1}", result.tcp_throughput.mib_per_sec), self.color_scheme.info),
            self.colorize(&format!("{:.1}", result.udp_throughput.mib_per_sec), self.color_scheme.info),
            format_duration_ms(summary.total_duration.as_secs_f64() * 1000.0)
        ))
    }

    fn format_error(&self, error: &str) -> Result<String> {
        Ok(format!("✗ {}", self.colorize(error, self.color_scheme.error)))
    }

    fn format_warning(&self, warning: &str) -> Result<String> {
        Ok(format!("! {}", self.colorize(warning, self.color_scheme.warning)))
    }

    fn format_success(&self, message: &str) -> Result<String> {
        Ok(format!("✓ {}", self.colorize(message, self.color_scheme.success)))
    }
}

fn fmt_err(e: std::fmt::Error) -> AppError {
    AppError::io(format!("Failed to format output: {}", e))
}
