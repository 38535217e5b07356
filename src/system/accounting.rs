//! Turns the two ends of each tick window into CPU percentages.
//!
//! System ticks are summed over every core, so a process pegging one core on
//! an 8-core box accounts for 1/8 of the system delta. Scaling by the logical
//! core count restores single-core units: that process reports ~100 %.

use tracing::{debug, debug_span};

use super::enforce::{Breach, Enforcer, SignalSender};
use super::error::{MetricsError, SampleError};
use super::platform::MetricsSource;
use super::snapshot::{Snapshot, Totals};

/// `cores * process_ticks * 100 / total_ticks`, or 0 for an empty window.
pub fn cpu_percent(cores: usize, process_ticks: u64, total_ticks: u64) -> f64 {
    if total_ticks == 0 {
        return 0.0;
    }
    cores as f64 * process_ticks as f64 * 100.0 / total_ticks as f64
}

/// Close every tick window in `snapshot` and fill in CPU percentages.
///
/// Pids that exited since discovery are removed from the snapshot. The
/// running CPU total is checked against the ceiling after each process.
pub fn finalize<S, K>(
    source: &S,
    snapshot: &mut Snapshot,
    enforcer: &mut Enforcer<K>,
) -> Result<Option<Breach>, SampleError>
where
    S: MetricsSource,
    K: SignalSender,
{
    let _finalize_span = debug_span!("accounting.finalize", pids = snapshot.samples.len()).entered();

    snapshot.system_ticks.close(source.system_ticks()?);
    let total_ticks = snapshot.system_ticks.delta().unwrap_or(0);
    let cores = source.logical_cores();

    // Pid-count and memory ceilings were settled during discovery.
    let mut running = Totals::default();
    for pid in snapshot.samples.pids() {
        let stat = match source.process_stat(pid) {
            Ok(stat) => stat,
            Err(MetricsError::ProcessNotFound(_)) => {
                debug!(pid, "exited before its window closed");
                snapshot.samples.remove(pid);
                continue;
            }
            Err(e) => return Err(e.into()),
        };

        let Some(sample) = snapshot.samples.get_mut(pid) else {
            continue;
        };
        sample.cpu_ticks.close(stat.cpu_ticks);
        sample.state = stat.state;
        let percent = cpu_percent(cores, sample.cpu_ticks.delta().unwrap_or(0), total_ticks);
        sample.cpu_percent = Some(percent);
        running.cpu_percent += percent;

        if let Some(breach) = enforcer.check(&running, &snapshot.samples) {
            return Ok(Some(breach));
        }
    }

    snapshot.elapsed = snapshot.started.elapsed();
    Ok(None)
}
