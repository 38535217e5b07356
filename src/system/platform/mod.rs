//! Kernel metrics interface.
//!
//! [`MetricsSource`] is the only way the sampling engine touches the kernel.
//! [`ProcFs`] reads it from a procfs mount; tests substitute in-memory fakes.

mod procfs;

pub use procfs::ProcFs;

use super::error::MetricsError;

/// One read of `/proc/<pid>/stat` (plus the command line it is paired with).
#[derive(Clone, Debug, PartialEq)]
pub struct ProcStat {
    pub command: String,
    pub state: char,
    /// Cumulative user + system ticks.
    pub cpu_ticks: u64,
}

pub trait MetricsSource {
    /// Cumulative CPU ticks of `pid` together with its command name and
    /// scheduling state.
    fn process_stat(&self, pid: u32) -> Result<ProcStat, MetricsError>;

    /// Direct children of `pid`.
    fn children(&self, pid: u32) -> Result<Vec<u32>, MetricsError>;

    /// Proportional set size of `pid` in MB.
    fn process_pss_mb(&self, pid: u32) -> Result<f64, MetricsError>;

    /// user + nice + system + idle ticks summed over all cores.
    fn system_ticks(&self) -> Result<u64, MetricsError>;

    fn logical_cores(&self) -> usize;
}

impl<S: MetricsSource + ?Sized> MetricsSource for &S {
    fn process_stat(&self, pid: u32) -> Result<ProcStat, MetricsError> {
        (**self).process_stat(pid)
    }

    fn children(&self, pid: u32) -> Result<Vec<u32>, MetricsError> {
        (**self).children(pid)
    }

    fn process_pss_mb(&self, pid: u32) -> Result<f64, MetricsError> {
        (**self).process_pss_mb(pid)
    }

    fn system_ticks(&self) -> Result<u64, MetricsError> {
        (**self).system_ticks()
    }

    fn logical_cores(&self) -> usize {
        (**self).logical_cores()
    }
}
