//! Human and machine-readable report output

use crate::cli::OutputFormat;
use anyhow::{Context, Result};
use colored::Colorize;
use gauge_probe::{
    AbortReason, BenchmarkReport, CapacityReport, ConformanceCheck, ConformanceResult,
    LatencyMeasurement, RampState, Throughput,
};
use std::fmt::Write;

/// Render `report` in the requested format
pub fn render(report: &BenchmarkReport, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Json => {
            serde_json::to_string_pretty(report).context("Failed to serialize report to JSON")
        }
        OutputFormat::Yaml => {
            serde_yaml::to_string(report).context("Failed to serialize report to YAML")
        }
        OutputFormat::Table => Ok(render_table(report)),
    }
}

fn render_table(report: &BenchmarkReport) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{} {}", "Proxy:".bold(), report.proxy);

    if !report.latency.is_empty() {
        out.push('\n');
        out.push_str(&latency_table(&report.latency));
    }

    if !report.conformance.is_empty() {
        out.push('\n');
        for result in &report.conformance {
            let _ = writeln!(out, "{}", conformance_line(result));
        }
    }

    if let Some(ref capacity) = report.capacity {
        out.push('\n');
        out.push_str(&capacity_summary(capacity));
    }

    out
}

fn seconds(value: Option<f64>) -> String {
    value.map_or_else(|| "n/a".to_string(), |s| format!("{:.4}s", s))
}

fn percent(value: Option<f64>) -> String {
    value.map_or_else(|| "n/a".to_string(), |p| format!("{:.2}%", p))
}

fn throughput(value: Option<Throughput>) -> String {
    value.map_or_else(|| "n/a".to_string(), |t| format!("{} {}", t.value, t.unit))
}

/// Relative throughput change, positive when the proxy moved more bits per second
fn throughput_change(measurement: &LatencyMeasurement) -> Option<f64> {
    let direct = measurement.throughput_direct?.bits_per_second;
    let proxied = measurement.throughput_proxied?.bits_per_second;
    (direct > 0.0).then(|| (proxied - direct) / direct * 100.0)
}

/// Rows No Proxy / Proxy / Proxy % change; average latency columns first,
/// then throughput columns, one of each per endpoint.
pub fn latency_table(latency: &[LatencyMeasurement]) -> String {
    let mut headers = vec![String::new()];
    headers.extend(latency.iter().map(|m| {
        format!(
            "Avg latency {} ({})",
            m.endpoint.transfer_class,
            m.endpoint.url.host_str().unwrap_or("?")
        )
    }));
    headers.extend(
        latency
            .iter()
            .map(|m| format!("Throughput {}", m.endpoint.transfer_class)),
    );

    let mut direct = vec!["No Proxy".to_string()];
    direct.extend(latency.iter().map(|m| seconds(m.direct_avg_seconds())));
    direct.extend(latency.iter().map(|m| throughput(m.throughput_direct)));

    let mut proxied = vec!["Proxy".to_string()];
    proxied.extend(latency.iter().map(|m| seconds(m.proxied_avg_seconds())));
    proxied.extend(latency.iter().map(|m| throughput(m.throughput_proxied)));

    let mut change = vec!["Proxy % change".to_string()];
    change.extend(latency.iter().map(|m| percent(m.percent_overhead)));
    change.extend(latency.iter().map(|m| percent(throughput_change(m))));

    table(&headers, &[direct, proxied, change])
}

fn table(headers: &[String], rows: &[Vec<String>]) -> String {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
    for row in rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let separator = |left: &str, mid: &str, right: &str| {
        let cells: Vec<String> = widths.iter().map(|w| "─".repeat(w + 2)).collect();
        format!("{}{}{}\n", left, cells.join(mid), right)
    };

    let mut out = separator("┌", "┬", "┐");
    out.push('│');
    for (header, width) in headers.iter().zip(&widths) {
        let _ = write!(out, " {} │", format!("{:width$}", header, width = *width).cyan().bold());
    }
    out.push('\n');
    out.push_str(&separator("├", "┼", "┤"));
    for row in rows {
        out.push('│');
        for (cell, width) in row.iter().zip(&widths) {
            let _ = write!(out, " {:width$} │", cell, width = *width);
        }
        out.push('\n');
    }
    out.push_str(&separator("└", "┴", "┘"));
    out
}

pub fn conformance_line(result: &ConformanceResult) -> String {
    let verdict = if result.passed {
        "PASS".green().bold()
    } else {
        "FAIL".red().bold()
    };
    let mut line = format!("{} {} {}", verdict, result.check, result.url);

    if result.check == ConformanceCheck::CacheFidelity {
        if let [cold, warm] = &result.timings.proxied_ms[..] {
            let _ = write!(line, " (cold {}ms, warm {}ms)", cold, warm);
        }
    }
    if let Some(ref failure) = result.failure {
        let _ = write!(line, ": {}", failure);
    }
    line
}

pub fn capacity_summary(report: &CapacityReport) -> String {
    let mut out = String::new();
    for round in &report.rounds {
        if round.failed == 0 {
            let _ = writeln!(out, "Sustained {} concurrent clients", round.level);
        } else {
            let _ = writeln!(
                out,
                "Failed with {} concurrent clients ({} of {} responses bad)",
                round.level,
                round.failed,
                round.passed + round.failed
            );
        }
    }

    let measurement = &report.measurement;
    let summary = match (&report.state, measurement.breaking_level) {
        (RampState::Found, Some(breaking)) if measurement.max_sustained_level == 0 => {
            format!("Capacity: failed at the first level ({} clients)", breaking)
        }
        (RampState::Found, Some(breaking)) => format!(
            "Capacity: sustained {} clients, failed at {}",
            measurement.max_sustained_level, breaking
        ),
        (RampState::Aborted(AbortReason::CeilingExceeded { ceiling }), _) => format!(
            "Capacity exceeds configured ceiling of {} clients (sustained {})",
            ceiling, measurement.max_sustained_level
        ),
        (RampState::Aborted(AbortReason::BudgetExhausted { budget }), _) => format!(
            "Capacity exceeds what {}s allowed probing (sustained {})",
            budget.as_secs(),
            measurement.max_sustained_level
        ),
        (RampState::Aborted(AbortReason::BaselineUnavailable { level, reason }), _) => format!(
            "Capacity unknown: direct fetch failed before level {}: {} (sustained {})",
            level, reason, measurement.max_sustained_level
        ),
        (state, _) => format!("Capacity: ramp ended in state {:?}", state),
    };
    let _ = writeln!(out, "{}", summary.bold());

    if let Some(outcome) = report.breaking_round.as_ref().and_then(|r| r.first_failure()) {
        if let Some(ref reason) = outcome.reason {
            let _ = writeln!(out, "First bad response: client #{}: {}", outcome.index, reason);
        }
    }
    out
}
