//! Performance-profile reporting for `-p/--profile-file`.
//!
//! original_source/'s `sync/cli.py` wraps the whole run in `cProfile` and
//! dumps stats to this path. Rust has no stdlib equivalent and no profiling
//! crate appears anywhere in the retrieval pack, so instead we time each
//! phase the way the teacher times its own work (`Instant`/`Duration`
//! around `process_album`, `commands/transcode/mod.rs`) and write a small
//! `key = value` duration report on exit.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::Path;
use std::time::{Duration, Instant};

#[derive(Default)]
pub struct PhaseTimer {
    phases: BTreeMap<&'static str, Duration>,
}

impl PhaseTimer {
    pub fn new() -> Self {
        PhaseTimer::default()
    }

    /// Times `f`, recording its duration under `phase`.
    pub fn time<T>(&mut self, phase: &'static str, f: impl FnOnce() -> T) -> T {
        let start = Instant::now();
        let result = f();
        self.phases.insert(phase, start.elapsed());
        result
    }

    pub fn write_report(&self, path: &Path) -> std::io::Result<()> {
        let mut report = String::new();
        for (phase, duration) in &self.phases {
            let _ = writeln!(report, "{phase} = {:.6}", duration.as_secs_f64());
        }
        std::fs::write(path, report)
    }
}
