//! The sampling loop: discover, pace, account, enforce, emit.

use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, debug_span, info};

use crate::system::accounting;
use crate::system::discover::{Discovery, DiscoveryOptions, discover};
use crate::system::enforce::{Breach, Enforcer, Limits, SignalSender};
use crate::system::error::SampleError;
use crate::system::platform::MetricsSource;
use crate::system::snapshot::{Report, Snapshot};

/// Command column never shrinks below the width of "total".
pub const MIN_NAME_WIDTH: usize = 5;

/// Run-wide settings, fixed at startup.
#[derive(Clone, Debug, Default)]
pub struct Settings {
    pub discovery: DiscoveryOptions,
    pub limits: Limits,
    /// Minimum wall-clock time between the start of a cycle and its second
    /// round of reads. Zero disables pacing.
    pub delay: Duration,
    pub repeat: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub enum CycleOutcome {
    Completed(Report),
    Terminated(Breach),
}

/// How [`Monitor::run`] ended without an error.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum RunEnd {
    /// Single-shot mode finished its one cycle.
    Finished,
    /// A ceiling was exceeded and the subtree was signalled.
    Terminated(Breach),
}

pub struct Monitor<S, K> {
    source: S,
    enforcer: Enforcer<K>,
    discovery: DiscoveryOptions,
    delay: Duration,
    repeat: bool,
    name_width: usize,
    cycles: u64,
}

impl<S: MetricsSource, K: SignalSender> Monitor<S, K> {
    pub fn new(source: S, sender: K, settings: Settings) -> Self {
        Monitor {
            source,
            enforcer: Enforcer::new(settings.limits, sender),
            discovery: settings.discovery,
            delay: settings.delay,
            repeat: settings.repeat,
            name_width: MIN_NAME_WIDTH,
            cycles: 0,
        }
    }

    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    pub fn sender(&self) -> &K {
        self.enforcer.sender()
    }

    /// One full pass. State from previous cycles is never reused apart from
    /// the command column width.
    pub fn cycle(&mut self) -> Result<CycleOutcome, SampleError> {
        self.cycles += 1;
        let _cycle_span =
            debug_span!("monitor.cycle", cycle = self.cycles, root = self.discovery.root_pid)
                .entered();

        // Sampling
        let started = Instant::now();
        let mut snapshot =
            Snapshot::begin(self.discovery.root_pid, self.source.system_ticks()?, started);
        if let Discovery::Breached(breach) =
            discover(&self.source, &self.discovery, &mut snapshot, &mut self.enforcer)?
        {
            return Ok(CycleOutcome::Terminated(breach));
        }
        self.pace(started);

        // Reporting
        if let Some(breach) = accounting::finalize(&self.source, &mut snapshot, &mut self.enforcer)?
        {
            return Ok(CycleOutcome::Terminated(breach));
        }
        self.name_width = self.name_width.max(snapshot.longest_command);
        debug!(
            pids = snapshot.samples.len(),
            elapsed_ms = snapshot.elapsed.as_secs_f64() * 1e3,
            "cycle complete"
        );
        Ok(CycleOutcome::Completed(snapshot.report(self.name_width)))
    }

    /// Run cycles, handing each report to `emit`, until single-shot mode has
    /// produced one report, a ceiling is exceeded, or an error occurs.
    pub fn run<E, F>(&mut self, mut emit: F) -> Result<RunEnd, E>
    where
        E: From<SampleError>,
        F: FnMut(&Report) -> Result<(), E>,
    {
        loop {
            match self.cycle()? {
                CycleOutcome::Completed(report) => emit(&report)?,
                CycleOutcome::Terminated(breach) => {
                    info!(%breach, "subtree terminated");
                    return Ok(RunEnd::Terminated(breach));
                }
            }
            if !self.repeat {
                return Ok(RunEnd::Finished);
            }
        }
    }

    /// Top the cycle up to the configured minimum duration.
    fn pace(&self, started: Instant) {
        let remaining = pacing_remaining(self.delay, started.elapsed());
        if !remaining.is_zero() {
            thread::sleep(remaining);
        }
    }
}

/// `max(delay - elapsed, 0)`.
pub fn pacing_remaining(delay: Duration, elapsed: Duration) -> Duration {
    delay.saturating_sub(elapsed)
}
