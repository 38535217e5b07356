use std::collections::HashSet;
use std::fs;
use std::path::PathBuf;

use sysinfo::{CpuRefreshKind, RefreshKind, System};

use super::{MetricsSource, ProcStat};
use crate::system::error::MetricsError;

/// Reads process and system counters from a procfs mount.
#[derive(Clone, Debug)]
pub struct ProcFs {
    root: PathBuf,
    cores: usize,
}

impl Default for ProcFs {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcFs {
    pub fn new() -> Self {
        Self::at("/proc", detect_logical_cores())
    }

    /// A reader rooted somewhere other than `/proc`, with a fixed core count.
    pub fn at(root: impl Into<PathBuf>, cores: usize) -> Self {
        ProcFs {
            root: root.into(),
            cores: cores.max(1),
        }
    }

    fn process_path(&self, pid: u32, file: &str) -> PathBuf {
        self.root.join(pid.to_string()).join(file)
    }

    fn read_process_file(&self, pid: u32, file: &str) -> Result<String, MetricsError> {
        let path = self.process_path(pid, file);
        fs::read_to_string(&path).map_err(|e| MetricsError::from_process_io(pid, path, e))
    }
}

fn detect_logical_cores() -> usize {
    let sys =
        System::new_with_specifics(RefreshKind::nothing().with_cpu(CpuRefreshKind::nothing()));
    match sys.cpus().len() {
        0 => std::thread::available_parallelism().map_or(1, |n| n.get()),
        n => n,
    }
}

impl MetricsSource for ProcFs {
    fn process_stat(&self, pid: u32) -> Result<ProcStat, MetricsError> {
        let stat = self.read_process_file(pid, "stat")?;
        let (comm, state, cpu_ticks) =
            parse_stat(&stat).ok_or_else(|| MetricsError::Parse {
                path: self.process_path(pid, "stat"),
                detail: "expected `pid (comm) state ... utime stime`".to_string(),
            })?;

        let cmdline = self.read_process_file(pid, "cmdline")?;
        let command = match command_from_cmdline(&cmdline) {
            Some(cmd) => cmd.to_string(),
            // Kernel threads have no argv.
            None => comm.to_string(),
        };

        Ok(ProcStat {
            command,
            state,
            cpu_ticks,
        })
    }

    fn children(&self, pid: u32) -> Result<Vec<u32>, MetricsError> {
        let task_dir = self.process_path(pid, "task");
        let entries = fs::read_dir(&task_dir)
            .map_err(|e| MetricsError::from_process_io(pid, task_dir.clone(), e))?;

        let mut tids: Vec<u32> = entries
            .flatten()
            .filter_map(|entry| entry.file_name().to_str()?.parse().ok())
            .collect();
        tids.sort_unstable();

        let mut seen = HashSet::new();
        let mut children = Vec::new();
        for tid in tids {
            let path = task_dir.join(tid.to_string()).join("children");
            let contents = match fs::read_to_string(&path) {
                Ok(contents) => contents,
                Err(e) => match MetricsError::from_process_io(pid, path, e) {
                    // A single thread exiting does not mean the process is gone.
                    MetricsError::ProcessNotFound(_) => continue,
                    other => return Err(other),
                },
            };
            let parsed = parse_children(&contents).ok_or_else(|| MetricsError::Parse {
                path: task_dir.join(tid.to_string()).join("children"),
                detail: "expected whitespace-separated pids".to_string(),
            })?;
            for child in parsed {
                if seen.insert(child) {
                    children.push(child);
                }
            }
        }
        Ok(children)
    }

    fn process_pss_mb(&self, pid: u32) -> Result<f64, MetricsError> {
        let smaps = self.read_process_file(pid, "smaps")?;
        Ok(parse_pss_kb(&smaps) as f64 / 1024.0)
    }

    fn system_ticks(&self) -> Result<u64, MetricsError> {
        let path = self.root.join("stat");
        let contents = fs::read_to_string(&path).map_err(|source| MetricsError::Io {
            path: path.clone(),
            source,
        })?;
        parse_system_ticks(&contents).ok_or_else(|| MetricsError::Parse {
            path,
            detail: "expected aggregate `cpu` line with at least four counters".to_string(),
        })
    }

    fn logical_cores(&self) -> usize {
        self.cores
    }
}

/// Returns `(comm, state, utime + stime)`.
pub fn parse_stat(contents: &str) -> Option<(&str, char, u64)> {
    // comm may itself contain spaces and parens, so anchor on the last `)`.
    let open = contents.find('(')?;
    let close = contents.rfind(')')?;
    let comm = contents.get(open + 1..close)?;
    let fields: Vec<&str> = contents.get(close + 1..)?.split_whitespace().collect();
    // Fields after comm: state(0) ppid(1) pgrp(2) session(3) tty_nr(4)
    // tpgid(5) flags(6) minflt(7) cminflt(8) majflt(9) cmajflt(10)
    // utime(11) stime(12)
    let state = fields.first()?.chars().next()?;
    let utime: u64 = fields.get(11)?.parse().ok()?;
    let stime: u64 = fields.get(12)?.parse().ok()?;
    Some((comm, state, utime + stime))
}

/// First argv entry, cut at the first space. `None` for an empty cmdline.
pub fn command_from_cmdline(contents: &str) -> Option<&str> {
    let first = contents.split('\0').next()?;
    let command = first.split(' ').next()?;
    if command.is_empty() {
        None
    } else {
        Some(command)
    }
}

pub fn parse_children(contents: &str) -> Option<Vec<u32>> {
    contents
        .split_whitespace()
        .map(|pid| pid.parse().ok())
        .collect()
}

/// Sum of every `Pss:` entry, in kB.
pub fn parse_pss_kb(smaps: &str) -> u64 {
    smaps
        .lines()
        .filter_map(|line| line.strip_prefix("Pss:"))
        .filter_map(|rest| rest.split_whitespace().next()?.parse::<u64>().ok())
        .sum()
}

/// user + nice + system + idle from the aggregate `cpu` line.
pub fn parse_system_ticks(contents: &str) -> Option<u64> {
    let line = contents.lines().next()?;
    let mut fields = line.split_whitespace();
    if fields.next()? != "cpu" {
        return None;
    }
    let counters: Vec<u64> = fields
        .take(4)
        .map(|f| f.parse().ok())
        .collect::<Option<_>>()?;
    if counters.len() < 4 {
        return None;
    }
    Some(counters.iter().sum())
}
