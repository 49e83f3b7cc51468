//! Core formatting traits and implementations
//!
//! This module defines the output formatting interface and provides
//! a plain text implementation with table formatting capabilities.

use crate::{
    error::{AppError, Result},
    executor::RunSummary,
    models::{LatencyResult, LoopbackBenchResult, ProbeReport, ThroughputResult},
    types::SubTest,
};
use std::fmt::Write as _;

/// Main trait for output formatting
pub trait OutputFormatter {
    /// Format a header section
    fn format_header(&self, title: &str) -> Result<String>;

    /// Format the run summary (budget split, duration, success count)
    fn format_run_summary(&self, summary: &RunSummary) -> Result<String>;

    /// Format the latency sub-tests as a table
    fn format_latency_table(&self, result: &LoopbackBenchResult, enabled: &[SubTest]) -> Result<String>;

    /// Format the throughput sub-tests as a table
    fn format_throughput_table(&self, result: &LoopbackBenchResult, enabled: &[SubTest]) -> Result<String>;

    /// Format a one-line summary
    fn format_quick_summary(&self, result: &LoopbackBenchResult, summary: &RunSummary) -> Result<String>;

    /// Format error messages
    fn format_error(&self, error: &str) -> Result<String>;

    /// Format warning messages
    fn format_warning(&self, warning: &str) -> Result<String>;

    /// Format success messages
    fn format_success(&self, message: &str) -> Result<String>;
}

/// Configuration options for formatting
#[derive(Debug, Clone)]
pub struct FormattingOptions {
    /// Enable colored output
    pub enable_color: bool,
    /// Show the full percentile breakdown
    pub verbose_mode: bool,
    /// Show table borders
    pub table_borders: bool,
}

impl Default for FormattingOptions {
    fn default() -> Self {
        Self {
            enable_color: true,
            verbose_mode: false,
            table_borders: true,
        }
    }
}

/// Table formatting configuration
#[derive(Debug, Clone)]
pub struct TableFormat {
    /// Column definitions
    pub columns: Vec<Column>,
    /// Show borders around table
    pub show_borders: bool,
    /// Show header row
    pub show_header: bool,
}

/// Column definition for table formatting
#[derive(Debug, Clone)]
pub struct Column {
    pub header: String,
    pub alignment: Alignment,
    pub min_width: usize,
}

impl Column {
    pub fn left(header: &str, min_width: usize) -> Self {
        Self {
            header: header.to_string(),
            alignment: Alignment::Left,
            min_width,
        }
    }

    pub fn right(header: &str, min_width: usize) -> Self {
        Self {
            header: header.to_string(),
            alignment: Alignment::Right,
            min_width,
        }
    }
}

/// Text alignment options
#[derive(Debug, Clone)]
pub enum Alignment {
    Left,
    Right,
}

/// Row data for table formatting
pub type RowData = Vec<String>;

/// Status of a sub-test as shown in the tables
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RowStatus {
    Ok,
    Failed,
    Skipped,
}

impl RowStatus {
    pub fn of(result: &LoopbackBenchResult, test: SubTest, enabled: &[SubTest]) -> Self {
        if !enabled.contains(&test) {
            Self::Skipped
        } else if result.success_of(test) {
            Self::Ok
        } else {
            Self::Failed
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
        }
    }
}

/// Latency cells for one sub-test: samples, min, median, mean, p99, max, jitter, loss
pub(crate) fn latency_cells(result: &LatencyResult, verbose: bool) -> Vec<String> {
    let mut cells = vec![
        result.sample_count.to_string(),
        format_micros(result.min_us),
        format_micros(result.median_us),
        format_micros(result.mean_us),
        format_micros(result.p99_us),
        format_micros(result.max_us),
        format_micros(result.jitter_us()),
        format_percentage(result.loss_percentage()),
    ];
    if verbose {
        cells.push(format_micros(result.p90_us));
        cells.push(format_micros(result.p95_us));
        cells.push(format_micros(result.p999_us));
        cells.push(format_micros(result.stddev_us));
    }
    cells
}

/// Throughput cells for one sub-test: MiB/s, Mbit/s, transferred, sent, delivered, duration
pub(crate) fn throughput_cells(result: &ThroughputResult) -> Vec<String> {
    vec![
        format!("{:.1}", result.mib_per_sec),
        format!("{:.1}", result.mbits_per_sec),
        format_bytes(result.bytes_transferred),
        format_bytes(result.bytes_sent),
        format_percentage(result.delivery_ratio() * 100.0),
        format!("{:.3}s", result.duration_sec),
    ]
}

pub(crate) fn latency_columns(verbose: bool) -> Vec<Column> {
    let mut columns = vec![
        Column::left("Test", 14),
        Column::left("Status", 7),
        Column::right("Samples", 7),
        Column::right("Min", 9),
        Column::right("Median", 9),
        Column::right("Mean", 9),
        Column::right("P99", 9),
        Column::right("Max", 9),
        Column::right("Jitter", 9),
        Column::right("Loss", 6),
    ];
    if verbose {
        columns.push(Column::right("P90", 9));
        columns.push(Column::right("P95", 9));
        columns.push(Column::right("P99.9", 9));
        columns.push(Column::right("StdDev", 9));
    }
    columns
}

pub(crate) fn throughput_columns() -> Vec<Column> {
    vec![
        Column::left("Test", 14),
        Column::left("Status", 7),
        Column::right("MiB/s", 9),
        Column::right("Mbit/s", 9),
        Column::right("Received", 10),
        Column::right("Sent", 10),
        Column::right("Delivered", 9),
        Column::right("Duration", 8),
    ]
}

/// Format microseconds, switching to milliseconds above 1000µs
pub(crate) fn format_micros(us: f64) -> String {
    if us < 1000.0 {
        format!("{:.1}µs", us)
    } else {
        format!("{:.2}ms", us / 1000.0)
    }
}

/// Format a byte count with binary units
pub(crate) fn format_bytes(bytes: u64) -> String {
    const KIB: f64 = 1024.0;
    const MIB: f64 = KIB * 1024.0;
    const GIB: f64 = MIB * 1024.0;

    let b = bytes as f64;
    if b >= GIB {
        format!("{:.2}GiB", b / GIB)
    } else if b >= MIB {
        format!("{:.1}MiB", b / MIB)
    } else if b >= KIB {
        format!("{:.1}KiB", b / KIB)
    } else {
        format!("{}B", bytes)
    }
}

/// Format percentage with appropriate precision
pub(crate) fn format_percentage(percentage: f64) -> String {
    if percentage >= 99.95 {
        "100.0%".to_string()
    } else if percentage < 0.05 {
        "0.0%".to_string()
    } else {
        format!("{:.1}%", percentage)
    }
}

/// Format a duration given in milliseconds
pub(crate) fn format_duration_ms(duration_ms: f64) -> String {
    if duration_ms < 1000.0 {
        format!("{:.1}ms", duration_ms)
    } else {
        format!("{:.2}s", duration_ms / 1000.0)
    }
}

fn fmt_err(e: std::fmt::Error) -> AppError {
    AppError::io(format!("Failed to format output: {}", e))
}

/// Plain text formatter implementation
pub struct PlainFormatter {
    options: FormattingOptions,
}

impl PlainFormatter {
    /// Create a new plain formatter with options
    pub fn new(options: FormattingOptions) -> Self {
        Self { options }
    }

    /// Create a table with the given format and data
    pub(crate) fn create_table(&self, format: &TableFormat, rows: &[RowData]) -> String {
        if rows.is_empty() {
            return String::new();
        }

        let column_widths = Self::calculate_column_widths(format, rows);
        let mut output = String::new();

        if format.show_header && !format.columns.is_empty() {
            if format.show_borders {
                output.push_str(&Self::create_horizontal_border(&column_widths));
                output.push('\n');
            }

            let headers: Vec<String> = format.columns.iter().map(|c| c.header.clone()).collect();
            output.push_str(&Self::create_row(&headers, &column_widths, format));
            output.push('\n');

            if format.show_borders {
                output.push_str(&Self::create_horizontal_border(&column_widths));
                output.push('\n');
            }
        }

        for row in rows {
            output.push_str(&Self::create_row(row, &column_widths, format));
            output.push('\n');
        }

        if format.show_borders {
            output.push_str(&Self::create_horizontal_border(&column_widths));
        }

        output.trim_end().to_string()
    }

    fn calculate_column_widths(format: &TableFormat, rows: &[RowData]) -> Vec<usize> {
        let num_columns = format
            .columns
            .len()
            .max(rows.iter().map(|r| r.len()).max().unwrap_or(0));

        (0..num_columns)
            .map(|idx| {
                let base = format
                    .columns
                    .get(idx)
                    .map(|c| c.min_width.max(display_width(&c.header)))
                    .unwrap_or(0);
                rows.iter()
                    .filter_map(|row| row.get(idx))
                    .map(|cell| display_width(cell))
                    .fold(base, usize::max)
            })
            .collect()
    }

    fn create_row(data: &[String], widths: &[usize], format: &TableFormat) -> String {
        let mut row = String::new();

        if format.show_borders {
            row.push('|');
        }

        for (idx, (cell, &width)) in data.iter().zip(widths.iter()).enumerate() {
            let alignment = format
                .columns
                .get(idx)
                .map(|c| &c.alignment)
                .unwrap_or(&Alignment::Left);

            if format.show_borders {
                row.push(' ');
            }
            row.push_str(&align_text(cell, width, alignment));
            if format.show_borders {
                row.push_str(" |");
            } else {
                row.push_str("  ");
            }
        }

        row.trim_end().to_string()
    }

    fn create_horizontal_border(widths: &[usize]) -> String {
        let mut border = String::new();

        if !widths.is_empty() {
            border.push('+');
            for &width in widths {
                border.push_str(&"-".repeat(width + 2));
                border.push('+');
            }
        }

        border
    }

    fn table_format(&self, columns: Vec<Column>) -> TableFormat {
        TableFormat {
            columns,
            show_borders: self.options.table_borders,
            show_header: true,
        }
    }
}

/// Character count, so multi-byte units like "µs" align correctly
pub(crate) fn display_width(text: &str) -> usize {
    text.chars().count()
}

/// Align text within specified width
pub(crate) fn align_text(text: &str, width: usize, alignment: &Alignment) -> String {
    let len = display_width(text);
    if len >= width {
        return text.to_string();
    }

    let padding = " ".repeat(width - len);
    match alignment {
        Alignment::Left => format!("{}{}", text, padding),
        Alignment::Right => format!("{}{}", padding, text),
    }
}

impl OutputFormatter for PlainFormatter {
    fn format_header(&self, title: &str) -> Result<String> {
        let mut output = String::new();
        let border = "=".repeat(display_width(title) + 4);

        writeln!(output, "{}", border).map_err(fmt_err)?;
        writeln!(output, "  {}  ", title).map_err(fmt_err)?;
        write!(output, "{}", border).map_err(fmt_err)?;

        Ok(output)
    }

    fn format_run_summary(&self, summary: &RunSummary) -> Result<String> {
        let mut output = String::new();
        let names: Vec<&str> = summary.enabled.iter().map(|t| t.as_str()).collect();

        writeln!(output, "Run Summary:").map_err(fmt_err)?;
        writeln!(output, "------------").map_err(fmt_err)?;
        writeln!(
            output,
            "Sub-tests:        {}",
            if names.is_empty() { "none".to_string() } else { names.join(", ") }
        )
        .map_err(fmt_err)?;
        writeln!(
            output,
            "Slice per test:   {}",
            format_duration_ms(summary.slice.as_secs_f64() * 1000.0)
        )
        .map_err(fmt_err)?;
        writeln!(
            output,
            "Total Duration:   {}",
            format_duration_ms(summary.total_duration.as_secs_f64() * 1000.0)
        )
        .map_err(fmt_err)?;
        writeln!(
            output,
            "Successful:       {} ({})",
            summary.successful_tests,
            format_percentage(summary.success_rate())
        )
        .map_err(fmt_err)?;
        write!(output, "Failed:           {}", summary.failed_tests()).map_err(fmt_err)?;

        Ok(output)
    }

    fn format_latency_table(&self, result: &LoopbackBenchResult, enabled: &[SubTest]) -> Result<String> {
        let verbose = self.options.verbose_mode;
        let rows: Vec<RowData> = [SubTest::TcpLatency, SubTest::UdpLatency]
            .iter()
            .map(|&test| {
                let status = RowStatus::of(result, test, enabled);
                let mut row = vec![test.label().to_string(), status.as_str().to_string()];
                if let ProbeReport::Latency(latency) = result.get(test) {
                    if status == RowStatus::Ok {
                        row.extend(latency_cells(&latency, verbose));
                    }
                }
                row
            })
            .collect();

        Ok(self.create_table(&self.table_format(latency_columns(verbose)), &rows))
    }

    fn format_throughput_table(&self, result: &LoopbackBenchResult, enabled: &[SubTest]) -> Result<String> {
        let rows: Vec<RowData> = [SubTest::TcpThroughput, SubTest::UdpThroughput]
            .iter()
            .map(|&test| {
                let status = RowStatus::of(result, test, enabled);
                let mut row = vec![test.label().to_string(), status.as_str().to_string()];
                if let ProbeReport::Throughput(throughput) = result.get(test) {
                    if status == RowStatus::Ok {
                        row.extend(throughput_cells(&throughput));
                    }
                }
                row
            })
            .collect();

        Ok(self.create_table(&self.table_format(throughput_columns()), &rows))
    }

    fn format_quick_summary(&self, result: &LoopbackBenchResult, summary: &RunSummary) -> Result<String> {
        Ok(format!(
            "{}/{} sub-tests succeeded | TCP rtt {} | UDP rtt {} | TCP {:.1} MiB/s | UDP {:.1} MiB/s | {}",
            summary.successful_tests,
            summary.enabled.len(),
            format_micros(result.tcp_latency.median_us),
            format_micros(result.udp_latency.median_us),
            result.tcp_throughput.mib_per_sec,
            result.udp_throughput.mib_per_sec,
            format_duration_ms(summary.total_duration.as_secs_f64() * 1000.0)
        ))
    }

    fn format_error(&self, error: &str) -> Result<String> {
        Ok(format!("ERROR: {}", error))
    }

    fn format_warning(&self, warning: &str) -> Result<String> {
        Ok(format!("WARNING: {}", warning))
    }

    fn format_success(&self, message: &str) -> Result<String> {
        Ok(format!("SUCCESS: {}", message))
    }
}
