use std::time::{Duration, Instant};

use super::process::{SampleStore, TickWindow};

/// Marker shown in place of the scheduling state on the root's row.
pub const ROOT_MARKER: char = '*';

/// Everything observed during one cycle. Never shared across cycles.
#[derive(Debug)]
pub struct Snapshot {
    pub root_pid: u32,
    pub samples: SampleStore,
    pub system_ticks: TickWindow,
    pub started: Instant,
    pub elapsed: Duration,
    /// Widest command name (in terminal columns) inserted this cycle.
    pub longest_command: usize,
}

impl Snapshot {
    pub fn begin(root_pid: u32, system_ticks: u64, started: Instant) -> Self {
        Snapshot {
            root_pid,
            samples: SampleStore::new(),
            system_ticks: TickWindow::starting_at(system_ticks),
            started,
            elapsed: Duration::ZERO,
            longest_command: 0,
        }
    }

    /// Aggregates over the samples currently in the store.
    pub fn totals(&self) -> Totals {
        self.samples
            .iter()
            .fold(Totals::default(), |mut totals, sample| {
                totals.processes += 1;
                totals.memory_mb += sample.memory_mb;
                totals.cpu_percent += sample.cpu_percent.unwrap_or(0.0);
                totals
            })
    }

    pub fn report(&self, name_width: usize) -> Report {
        let totals = self.totals();
        let processes: Vec<ProcessRow> = self
            .samples
            .iter()
            .map(|sample| ProcessRow {
                pid: sample.pid,
                command: sample.command.clone(),
                memory_mb: sample.memory_mb,
                cpu_percent: sample.cpu_percent.unwrap_or(0.0),
                marker: if sample.pid == self.root_pid {
                    ROOT_MARKER
                } else {
                    sample.state
                },
            })
            .collect();
        let child_count = if self.samples.contains(self.root_pid) {
            processes.len() - 1
        } else {
            processes.len()
        };

        Report {
            root_pid: self.root_pid,
            elapsed: self.elapsed,
            child_count,
            total_memory_mb: totals.memory_mb,
            total_cpu_percent: totals.cpu_percent,
            processes,
            name_width: name_width.max(self.longest_command),
        }
    }
}

/// Running totals for one cycle, always rebuilt from the store.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Totals {
    pub processes: usize,
    pub memory_mb: f64,
    pub cpu_percent: f64,
}

/// Finished cycle, handed to the renderers.
#[derive(Clone, Debug, PartialEq)]
pub struct Report {
    pub root_pid: u32,
    pub elapsed: Duration,
    /// Surviving processes other than the root.
    pub child_count: usize,
    pub total_memory_mb: f64,
    pub total_cpu_percent: f64,
    pub processes: Vec<ProcessRow>,
    pub name_width: usize,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ProcessRow {
    pub pid: u32,
    pub command: String,
    pub memory_mb: f64,
    pub cpu_percent: f64,
    pub marker: char,
}
