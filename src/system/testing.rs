//! In-memory kernel and signal fakes shared by unit tests.

use std::cell::RefCell;
use std::collections::HashMap;
use std::path::PathBuf;

use super::enforce::SignalSender;
use super::error::MetricsError;
use super::kill::KillResult;
use super::platform::{MetricsSource, ProcStat};

#[derive(Clone, Debug, Default)]
struct FakeProc {
    command: String,
    state: char,
    ticks: Vec<u64>,
    memory_mb: f64,
    children: Vec<u32>,
    vanish_after: Option<usize>,
    pss_denied: bool,
    pss_missing: bool,
}

/// Scripted process table. Each `process_stat` call for a pid returns the
/// next entry of its tick script (the last entry repeats), and a pid can be
/// made to vanish after a number of stat reads. Vanishing affects stat and
/// children reads; a missing smaps file is scripted separately.
#[derive(Debug)]
pub struct FakeSource {
    procs: HashMap<u32, FakeProc>,
    system: Vec<u64>,
    cores: usize,
    stat_reads: RefCell<HashMap<u32, usize>>,
    system_reads: RefCell<usize>,
}

impl FakeSource {
    pub fn new(cores: usize) -> Self {
        FakeSource {
            procs: HashMap::new(),
            system: vec![0, 100],
            cores,
            stat_reads: RefCell::new(HashMap::new()),
            system_reads: RefCell::new(0),
        }
    }

    pub fn process(mut self, pid: u32, command: &str, children: &[u32]) -> Self {
        self.procs.insert(
            pid,
            FakeProc {
                command: command.to_string(),
                state: 'S',
                ticks: vec![0],
                children: children.to_vec(),
                ..FakeProc::default()
            },
        );
        self
    }

    pub fn ticks(mut self, pid: u32, reads: &[u64]) -> Self {
        self.entry(pid).ticks = reads.to_vec();
        self
    }

    pub fn memory(mut self, pid: u32, memory_mb: f64) -> Self {
        self.entry(pid).memory_mb = memory_mb;
        self
    }

    pub fn state(mut self, pid: u32, state: char) -> Self {
        self.entry(pid).state = state;
        self
    }

    pub fn vanish_after(mut self, pid: u32, stat_reads: usize) -> Self {
        self.entry(pid).vanish_after = Some(stat_reads);
        self
    }

    pub fn deny_pss(mut self, pid: u32) -> Self {
        self.entry(pid).pss_denied = true;
        self
    }

    pub fn lose_smaps(mut self, pid: u32) -> Self {
        self.entry(pid).pss_missing = true;
        self
    }

    pub fn system(mut self, reads: &[u64]) -> Self {
        self.system = reads.to_vec();
        self
    }

    pub fn stat_reads(&self, pid: u32) -> usize {
        self.stat_reads.borrow().get(&pid).copied().unwrap_or(0)
    }

    fn entry(&mut self, pid: u32) -> &mut FakeProc {
        self.procs
            .get_mut(&pid)
            .unwrap_or_else(|| panic!("pid {pid} must be declared with process() first"))
    }

    fn alive(&self, pid: u32) -> Option<&FakeProc> {
        let proc = self.procs.get(&pid)?;
        match proc.vanish_after {
            Some(limit) if self.stat_reads(pid) >= limit => None,
            _ => Some(proc),
        }
    }
}

impl MetricsSource for FakeSource {
    fn process_stat(&self, pid: u32) -> Result<ProcStat, MetricsError> {
        let proc = self.alive(pid).ok_or(MetricsError::ProcessNotFound(pid))?;
        let mut reads = self.stat_reads.borrow_mut();
        let count = reads.entry(pid).or_insert(0);
        let ticks = proc
            .ticks
            .get(*count)
            .or(proc.ticks.last())
            .copied()
            .unwrap_or(0);
        *count += 1;
        Ok(ProcStat {
            command: proc.command.clone(),
            state: proc.state,
            cpu_ticks: ticks,
        })
    }

    fn children(&self, pid: u32) -> Result<Vec<u32>, MetricsError> {
        self.alive(pid)
            .map(|p| p.children.clone())
            .ok_or(MetricsError::ProcessNotFound(pid))
    }

    fn process_pss_mb(&self, pid: u32) -> Result<f64, MetricsError> {
        let proc = self
            .procs
            .get(&pid)
            .filter(|p| !p.pss_missing)
            .ok_or(MetricsError::ProcessNotFound(pid))?;
        if proc.pss_denied {
            return Err(MetricsError::PermissionDenied {
                pid,
                path: PathBuf::from(format!("/proc/{pid}/smaps")),
            });
        }
        Ok(proc.memory_mb)
    }

    fn system_ticks(&self) -> Result<u64, MetricsError> {
        let mut reads = self.system_reads.borrow_mut();
        let ticks = self
            .system
            .get(*reads)
            .or(self.system.last())
            .copied()
            .unwrap_or(0);
        *reads += 1;
        Ok(ticks)
    }

    fn logical_cores(&self) -> usize {
        self.cores
    }
}

/// Records every termination request instead of signalling anything.
#[derive(Debug, Default)]
pub struct RecordingSignaller {
    pub calls: Vec<Vec<u32>>,
    fail: bool,
}

impl RecordingSignaller {
    pub fn failing() -> Self {
        RecordingSignaller {
            calls: Vec::new(),
            fail: true,
        }
    }

    pub fn signalled(&self) -> Vec<u32> {
        self.calls.iter().flatten().copied().collect()
    }
}

impl SignalSender for RecordingSignaller {
    fn terminate(&mut self, pids: &[u32]) -> Vec<KillResult> {
        self.calls.push(pids.to_vec());
        pids.iter()
            .map(|&pid| {
                if self.fail {
                    KillResult::NotFound(pid)
                } else {
                    KillResult::Success(pid, "SIGKILL")
                }
            })
            .collect()
    }
}
