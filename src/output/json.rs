use serde_json::{Value, json};

use crate::format::round_2;
use crate::system::snapshot::Report;

/// `[elapsedMs, childCount, totalMemory, totalCpu, [[pid, command, memory, cpu], ...]]`
/// on a single line.
pub fn render(report: &Report) -> String {
    let mut line = to_value(report).to_string();
    line.push('\n');
    line
}

pub fn to_value(report: &Report) -> Value {
    let processes: Vec<Value> = report
        .processes
        .iter()
        .map(|p| {
            json!([
                p.pid,
                p.command,
                round_2(p.memory_mb),
                round_2(p.cpu_percent)
            ])
        })
        .collect();

    json!([
        round_2(report.elapsed.as_secs_f64() * 1e3),
        report.child_count,
        round_2(report.total_memory_mb),
        round_2(report.total_cpu_percent),
        processes
    ])
}
