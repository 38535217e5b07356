use std::collections::BTreeMap;

/// Two reads of a cumulative tick counter taken at either end of a
/// measurement window.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TickWindow {
    pub start: u64,
    pub end: Option<u64>,
}

impl TickWindow {
    pub fn starting_at(start: u64) -> Self {
        TickWindow { start, end: None }
    }

    pub fn close(&mut self, end: u64) {
        self.end = Some(end);
    }

    /// Ticks elapsed inside the window, `None` until the window is closed.
    /// Counters never run backwards, so a smaller end read clamps to zero.
    pub fn delta(&self) -> Option<u64> {
        self.end.map(|end| end.saturating_sub(self.start))
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ProcessSample {
    pub pid: u32,
    pub command: String,
    pub state: char,
    pub cpu_ticks: TickWindow,
    pub memory_mb: f64,
    /// Filled in by the accountant once the window is closed.
    pub cpu_percent: Option<f64>,
}

impl ProcessSample {
    pub fn new(pid: u32, command: String, state: char, start_ticks: u64) -> Self {
        ProcessSample {
            pid,
            command,
            state,
            cpu_ticks: TickWindow::starting_at(start_ticks),
            memory_mb: 0.0,
            cpu_percent: None,
        }
    }
}

/// Per-cycle pid -> sample map. Rebuilt from empty every cycle.
#[derive(Clone, Debug, Default)]
pub struct SampleStore {
    samples: BTreeMap<u32, ProcessSample>,
}

impl SampleStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `false` (and leaves the store untouched) if `pid` is present.
    pub fn insert(&mut self, sample: ProcessSample) -> bool {
        if self.samples.contains_key(&sample.pid) {
            return false;
        }
        self.samples.insert(sample.pid, sample);
        true
    }

    pub fn remove(&mut self, pid: u32) -> Option<ProcessSample> {
        self.samples.remove(&pid)
    }

    pub fn contains(&self, pid: u32) -> bool {
        self.samples.contains_key(&pid)
    }

    pub fn get(&self, pid: u32) -> Option<&ProcessSample> {
        self.samples.get(&pid)
    }

    pub fn get_mut(&mut self, pid: u32) -> Option<&mut ProcessSample> {
        self.samples.get_mut(&pid)
    }

    /// Pids in ascending order.
    pub fn pids(&self) -> Vec<u32> {
        self.samples.keys().copied().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ProcessSample> {
        self.samples.values()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }
}
