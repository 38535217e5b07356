use sysinfo::{Pid, ProcessRefreshKind, ProcessesToUpdate, Signal, System};

use super::enforce::SignalSender;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum KillResult {
    Success(u32, &'static str),
    Failed(u32, String),
    NotFound(u32),
}

pub fn signal_name(signal: Signal) -> &'static str {
    match signal {
        Signal::Term => "SIGTERM",
        Signal::Kill => "SIGKILL",
        _ => "signal",
    }
}

/// Parse the configured termination signal. Unknown names fall back to SIGKILL.
pub fn parse_signal(name: &str) -> Signal {
    match name.to_lowercase().as_str() {
        "term" | "sigterm" => Signal::Term,
        _ => Signal::Kill,
    }
}

pub fn kill_process(sys: &System, pid: u32, signal: Signal) -> KillResult {
    let sysinfo_pid = Pid::from_u32(pid);
    match sys.process(sysinfo_pid) {
        Some(process) => {
            let name = signal_name(signal);
            match process.kill_with(signal) {
                Some(true) => KillResult::Success(pid, name),
                Some(false) => KillResult::Failed(pid, format!("Failed to send {name} to PID {pid}")),
                None => {
                    // Signal not supported on this platform, fall back to kill()
                    if process.kill() {
                        KillResult::Success(pid, name)
                    } else {
                        KillResult::Failed(
                            pid,
                            format!("Failed to kill PID {pid} (permission denied?)"),
                        )
                    }
                }
            }
        }
        None => KillResult::NotFound(pid),
    }
}

/// Fire-and-forget signalling through `sysinfo`. Does not wait for exit.
pub struct SysinfoSignaller {
    sys: System,
    signal: Signal,
}

impl SysinfoSignaller {
    pub fn new(signal: Signal) -> Self {
        SysinfoSignaller {
            sys: System::new(),
            signal,
        }
    }
}

impl Default for SysinfoSignaller {
    fn default() -> Self {
        Self::new(Signal::Kill)
    }
}

impl SignalSender for SysinfoSignaller {
    fn terminate(&mut self, pids: &[u32]) -> Vec<KillResult> {
        let targets: Vec<Pid> = pids.iter().copied().map(Pid::from_u32).collect();
        self.sys.refresh_processes_specifics(
            ProcessesToUpdate::Some(&targets),
            true,
            ProcessRefreshKind::nothing(),
        );
        pids.iter()
            .map(|&pid| kill_process(&self.sys, pid, self.signal))
            .collect()
    }
}
