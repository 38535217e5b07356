use std::fmt;

use tracing::{debug, warn};

use super::kill::KillResult;
use super::process::SampleStore;
use super::snapshot::Totals;

/// Hard ceilings for the observed subtree. Zero disables a ceiling.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Limits {
    pub memory_mb: u64,
    pub cpu_percent: f64,
    pub pid_count: usize,
}

impl Limits {
    pub fn is_unbounded(&self) -> bool {
        self.memory_mb == 0 && self.cpu_percent <= 0.0 && self.pid_count == 0
    }

    /// First ceiling strictly exceeded by `totals`, if any.
    pub fn breach(&self, totals: &Totals) -> Option<Breach> {
        if self.pid_count > 0 && totals.processes > self.pid_count {
            return Some(Breach::PidCount {
                observed: totals.processes,
                limit: self.pid_count,
            });
        }
        if self.memory_mb > 0 && totals.memory_mb > self.memory_mb as f64 {
            return Some(Breach::Memory {
                observed_mb: totals.memory_mb,
                limit_mb: self.memory_mb,
            });
        }
        if self.cpu_percent > 0.0 && totals.cpu_percent > self.cpu_percent {
            return Some(Breach::Cpu {
                observed_percent: totals.cpu_percent,
                limit_percent: self.cpu_percent,
            });
        }
        None
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Breach {
    PidCount { observed: usize, limit: usize },
    Memory { observed_mb: f64, limit_mb: u64 },
    Cpu { observed_percent: f64, limit_percent: f64 },
}

impl fmt::Display for Breach {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Breach::PidCount { observed, limit } => {
                write!(f, "{observed} processes exceed the limit of {limit}")
            }
            Breach::Memory {
                observed_mb,
                limit_mb,
            } => write!(f, "{observed_mb:.2} MB exceeds the limit of {limit_mb} MB"),
            Breach::Cpu {
                observed_percent,
                limit_percent,
            } => write!(
                f,
                "{observed_percent:.2} % CPU exceeds the limit of {limit_percent} %"
            ),
        }
    }
}

/// Delivers the termination signal. Production code uses
/// [`SysinfoSignaller`](super::kill::SysinfoSignaller).
pub trait SignalSender {
    fn terminate(&mut self, pids: &[u32]) -> Vec<KillResult>;
}

impl<K: SignalSender + ?Sized> SignalSender for &mut K {
    fn terminate(&mut self, pids: &[u32]) -> Vec<KillResult> {
        (**self).terminate(pids)
    }
}

pub struct Enforcer<K> {
    limits: Limits,
    sender: K,
    own_pid: u32,
}

impl<K: SignalSender> Enforcer<K> {
    pub fn new(limits: Limits, sender: K) -> Self {
        Enforcer {
            limits,
            sender,
            own_pid: std::process::id(),
        }
    }

    pub fn sender(&self) -> &K {
        &self.sender
    }

    pub fn into_sender(self) -> K {
        self.sender
    }

    /// Compare `totals` against the ceilings. On a breach every pid in
    /// `samples` (except this process) is signalled, and the breach is
    /// returned so the caller can stop. Signal failures are not surfaced.
    pub fn check(&mut self, totals: &Totals, samples: &SampleStore) -> Option<Breach> {
        let breach = self.limits.breach(totals)?;
        warn!(%breach, pids = samples.len(), "resource ceiling exceeded, terminating subtree");

        let targets: Vec<u32> = samples
            .pids()
            .into_iter()
            .filter(|&pid| pid != self.own_pid)
            .collect();
        for result in self.sender.terminate(&targets) {
            match result {
                KillResult::Success(pid, signal) => debug!(pid, signal, "signalled"),
                KillResult::Failed(pid, reason) => debug!(pid, %reason, "signal failed"),
                KillResult::NotFound(pid) => debug!(pid, "already exited"),
            }
        }
        Some(breach)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::system::process::ProcessSample;
    use crate::system::testing::RecordingSignaller;

    fn totals(processes: usize, memory_mb: f64, cpu_percent: f64) -> Totals {
        Totals {
            processes,
            memory_mb,
            cpu_percent,
        }
    }

    fn store(pids: &[u32]) -> SampleStore {
        let mut store = SampleStore::new();
        for &pid in pids {
            store.insert(ProcessSample::new(pid, "p".into(), 'S', 0));
        }
        store
    }

    #[test]
    fn zero_limits_never_breach() {
        let limits = Limits::default();
        assert!(limits.is_unbounded());
        assert_eq!(limits.breach(&totals(10_000, 1e9, 1e6)), None);
    }

    #[test]
    fn limits_are_strict_upper_bounds() {
        let limits = Limits {
            memory_mb: 10,
            cpu_percent: 50.0,
            pid_count: 3,
        };
        assert_eq!(limits.breach(&totals(3, 10.0, 50.0)), None);
        assert!(matches!(
            limits.breach(&totals(4, 0.0, 0.0)),
            Some(Breach::PidCount { observed: 4, limit: 3 })
        ));
        assert!(matches!(
            limits.breach(&totals(1, 12.0, 0.0)),
            Some(Breach::Memory { limit_mb: 10, .. })
        ));
        assert!(matches!(
            limits.breach(&totals(1, 0.0, 50.5)),
            Some(Breach::Cpu { .. })
        ));
    }

    #[test]
    fn breach_signals_every_sampled_pid() {
        let limits = Limits {
            memory_mb: 10,
            ..Limits::default()
        };
        let mut enforcer = Enforcer::new(limits, RecordingSignaller::default());

        let breach = enforcer.check(&totals(3, 12.0, 0.0), &store(&[1, 5, 9]));
        assert!(matches!(breach, Some(Breach::Memory { .. })));
        assert_eq!(enforcer.sender().calls, vec![vec![1, 5, 9]]);
    }

    #[test]
    fn no_breach_sends_nothing() {
        let mut enforcer = Enforcer::new(
            Limits {
                pid_count: 5,
                ..Limits::default()
            },
            RecordingSignaller::default(),
        );
        assert_eq!(enforcer.check(&totals(2, 0.0, 0.0), &store(&[1, 2])), None);
        assert!(enforcer.sender().calls.is_empty());
    }

    #[test]
    fn own_pid_is_never_signalled() {
        let me = std::process::id();
        let mut enforcer = Enforcer::new(
            Limits {
                pid_count: 1,
                ..Limits::default()
            },
            RecordingSignaller::default(),
        );
        enforcer.check(&totals(2, 0.0, 0.0), &store(&[me, me + 1]));
        assert_eq!(enforcer.sender().calls, vec![vec![me + 1]]);
    }

    #[test]
    fn signal_failures_are_swallowed() {
        let mut enforcer = Enforcer::new(
            Limits {
                pid_count: 1,
                ..Limits::default()
            },
            RecordingSignaller::failing(),
        );
        let breach = enforcer.check(&totals(2, 0.0, 0.0), &store(&[40, 41]));
        assert!(breach.is_some());
        assert_eq!(enforcer.sender().calls.len(), 1);
    }
}
