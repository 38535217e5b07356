//! A throwaway procfs tree on disk, laid out the way the kernel exposes it.

#![allow(dead_code)]

use std::fs;
use std::path::Path;

use tempfile::TempDir;

pub struct FakeProcFs {
    dir: TempDir,
}

impl FakeProcFs {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("failed to create temp procfs");
        let fake = FakeProcFs { dir };
        fake.set_system_ticks(0);
        fake
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    /// Writes `/stat` with all of `ticks` booked as idle time.
    pub fn set_system_ticks(&self, ticks: u64) {
        let contents = format!(
            "cpu  0 0 0 {ticks} 0 0 0 0 0 0\ncpu0 0 0 0 {ticks} 0 0 0 0 0 0\nintr 0\n"
        );
        fs::write(self.root().join("stat"), contents).expect("write /stat");
    }

    pub fn add_process(&self, pid: u32, command: &str, children: &[u32]) {
        let dir = self.root().join(pid.to_string());
        fs::create_dir_all(dir.join("task").join(pid.to_string())).expect("create task dir");
        fs::write(dir.join("cmdline"), format!("{command}\0--flag\0")).expect("write cmdline");
        self.set_ticks(pid, 0);
        self.set_pss_kb(pid, &[]);
        self.set_children(pid, pid, children);
    }

    pub fn add_kernel_thread(&self, pid: u32, comm: &str) {
        self.add_process(pid, comm, &[]);
        fs::write(self.root().join(pid.to_string()).join("cmdline"), "").expect("clear cmdline");
        self.write_stat(pid, comm, 'I', 0);
    }

    /// Ticks are split as utime = ticks - 1, stime = 1 (or all utime for 0).
    pub fn set_ticks(&self, pid: u32, ticks: u64) {
        self.write_stat(pid, "fake", 'S', ticks);
    }

    pub fn set_pss_kb(&self, pid: u32, regions: &[u64]) {
        let mut smaps = String::new();
        for (i, kb) in regions.iter().enumerate() {
            smaps.push_str(&format!(
                "{:08x}-{:08x} r-xp 00000000 08:01 {i} /usr/lib/libfake.so\n\
                 Size:               {kb} kB\nRss:                {kb} kB\nPss:                {kb} kB\nPss_Dirty:             0 kB\n",
                i * 0x1000,
                (i + 1) * 0x1000
            ));
        }
        fs::write(self.root().join(pid.to_string()).join("smaps"), smaps).expect("write smaps");
    }

    /// Children forked by thread `tid` of `pid`.
    pub fn set_children(&self, pid: u32, tid: u32, children: &[u32]) {
        let task = self
            .root()
            .join(pid.to_string())
            .join("task")
            .join(tid.to_string());
        fs::create_dir_all(&task).expect("create task dir");
        let mut list = String::new();
        for child in children {
            list.push_str(&format!("{child} "));
        }
        fs::write(task.join("children"), list).expect("write children");
    }

    pub fn remove_process(&self, pid: u32) {
        fs::remove_dir_all(self.root().join(pid.to_string())).expect("remove pid dir");
    }

    fn write_stat(&self, pid: u32, comm: &str, state: char, ticks: u64) {
        let (utime, stime) = if ticks == 0 { (0, 0) } else { (ticks - 1, 1) };
        let stat = format!(
            "{pid} ({comm}) {state} 1 {pid} {pid} 0 -1 4194304 0 0 0 0 {utime} {stime} 0 0 20 0 1 0 100 0 0\n"
        );
        fs::write(self.root().join(pid.to_string()).join("stat"), stat).expect("write stat");
    }
}
