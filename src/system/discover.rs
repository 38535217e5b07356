//! Expansion of the root pid into its descendant set.

use std::collections::HashSet;

use tracing::{debug, debug_span};

use super::enforce::{Breach, Enforcer, SignalSender};
use super::error::{MetricsError, SampleError};
use super::platform::MetricsSource;
use super::process::ProcessSample;
use super::snapshot::{Snapshot, Totals};
use crate::format::display_width;

#[derive(Clone, Debug, Default)]
pub struct DiscoveryOptions {
    pub root_pid: u32,
    pub recurse: bool,
    /// Non-root pids listed here are skipped together with their subtree.
    /// A listed root is still sampled but not expanded.
    pub exclude: HashSet<u32>,
    pub ignore_permission_errors: bool,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Discovery {
    Complete,
    Breached(Breach),
}

enum Admission {
    Added { memory_mb: f64 },
    Vanished,
}

/// Walk the tree under `opts.root_pid`, recording a start-of-window sample
/// for every reachable pid. Limits on pid count and memory are checked after
/// every insertion.
pub fn discover<S, K>(
    source: &S,
    opts: &DiscoveryOptions,
    snapshot: &mut Snapshot,
    enforcer: &mut Enforcer<K>,
) -> Result<Discovery, SampleError>
where
    S: MetricsSource,
    K: SignalSender,
{
    let root = opts.root_pid;
    let _walk_span = debug_span!("discover.walk", root).entered();

    let mut running = Totals::default();
    match admit(source, opts, snapshot, root)? {
        Admission::Added { memory_mb } => {
            running.processes += 1;
            running.memory_mb += memory_mb;
        }
        Admission::Vanished => return Err(SampleError::RootNotFound(root)),
    }
    if let Some(breach) = enforcer.check(&running, &snapshot.samples) {
        return Ok(Discovery::Breached(breach));
    }

    if !opts.recurse || opts.exclude.contains(&root) {
        return Ok(Discovery::Complete);
    }

    let mut frontier = vec![root];
    while let Some(pid) = frontier.pop() {
        let children = match source.children(pid) {
            Ok(children) => children,
            Err(MetricsError::ProcessNotFound(_)) => {
                debug!(pid, "exited before its children were listed");
                continue;
            }
            Err(e) => return Err(e.into()),
        };

        for child in children {
            // A reparented root or a recycled pid would otherwise loop the walk.
            if child == root || child == pid || snapshot.samples.contains(child) {
                continue;
            }
            if opts.exclude.contains(&child) {
                debug!(pid = child, "excluded, skipping subtree");
                continue;
            }

            match admit(source, opts, snapshot, child)? {
                Admission::Added { memory_mb } => {
                    running.processes += 1;
                    running.memory_mb += memory_mb;
                    frontier.push(child);
                }
                Admission::Vanished => {
                    debug!(pid = child, "exited during discovery");
                    continue;
                }
            }

            if let Some(breach) = enforcer.check(&running, &snapshot.samples) {
                return Ok(Discovery::Breached(breach));
            }
        }
    }

    Ok(Discovery::Complete)
}

/// Insert `pid` with its starting tick count and memory. A pid that exits
/// part way through is removed again.
fn admit<S: MetricsSource>(
    source: &S,
    opts: &DiscoveryOptions,
    snapshot: &mut Snapshot,
    pid: u32,
) -> Result<Admission, SampleError> {
    let stat = match source.process_stat(pid) {
        Ok(stat) => stat,
        Err(MetricsError::ProcessNotFound(_)) => return Ok(Admission::Vanished),
        Err(e) => return Err(e.into()),
    };
    let width = display_width(&stat.command);
    snapshot
        .samples
        .insert(ProcessSample::new(pid, stat.command, stat.state, stat.cpu_ticks));

    let memory_mb = match source.process_pss_mb(pid) {
        Ok(memory_mb) => memory_mb,
        Err(MetricsError::PermissionDenied { .. }) if opts.ignore_permission_errors => 0.0,
        Err(MetricsError::PermissionDenied { .. }) => {
            snapshot.samples.remove(pid);
            return Err(SampleError::PermissionDenied(pid));
        }
        Err(MetricsError::ProcessNotFound(_)) => {
            snapshot.samples.remove(pid);
            return Ok(Admission::Vanished);
        }
        Err(e) => {
            snapshot.samples.remove(pid);
            return Err(e.into());
        }
    };

    if let Some(sample) = snapshot.samples.get_mut(pid) {
        sample.memory_mb = memory_mb;
    }
    snapshot.longest_command = snapshot.longest_command.max(width);
    Ok(Admission::Added { memory_mb })
}
