use std::fmt::Write;

use super::HEADER;
use crate::format::pad_right;
use crate::system::snapshot::Report;

/// Marker on the aggregate row.
pub const TOTAL_MARKER: char = '+';

pub fn render(report: &Report) -> String {
    let mut out = String::new();
    let ms = report.elapsed.as_secs_f64() * 1e3;
    let hz = if ms > 0.0 { 1e3 / ms } else { 0.0 };
    let children = if report.child_count > 0 {
        format!(" and {} children", report.child_count)
    } else {
        String::new()
    };
    let _ = writeln!(
        out,
        "=== {HEADER} - ({ms:.2} ms / {hz:.3} Hz) PID {}{children} ===",
        report.root_pid
    );

    push_row(
        &mut out,
        TOTAL_MARKER,
        report.root_pid,
        "total",
        report.total_memory_mb,
        report.total_cpu_percent,
        report.name_width,
    );
    for p in &report.processes {
        push_row(
            &mut out,
            p.marker,
            p.pid,
            &p.command,
            p.memory_mb,
            p.cpu_percent,
            report.name_width,
        );
    }
    out
}

fn push_row(
    out: &mut String,
    marker: char,
    pid: u32,
    command: &str,
    memory_mb: f64,
    cpu_percent: f64,
    width: usize,
) {
    let _ = writeln!(
        out,
        "{marker} {pid:>8} {} {memory_mb:>8.2} M {cpu_percent:>6.2} %",
        pad_right(command, width)
    );
}
