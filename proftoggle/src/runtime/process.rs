// SPDX-License-Identifier: Apache-2.0

use super::Runtime;
use crate::{Error, ProfileKind, Result};
use log::debug;
use pprof::{protos::Message, ProfilerGuard, ProfilerGuardBuilder};
use std::{fmt, io::Write};

#[cfg(feature = "dhat-heap")]
use super::heap::HeapProfiler;

/// The profiler of the running process.
///
/// CPU sampling is delegated to `pprof` and written as a pprof protobuf.
/// Heap profiles come from `dhat` when the `dhat-heap` feature is enabled
/// and are written as dhat JSON. The thread and contention reports are
/// plain text built from what the kernel accounts for each thread, so they
/// are only available where `/proc` is.
#[derive(Default)]
pub struct ProcessRuntime {
    cpu: Option<ProfilerGuard<'static>>,
    #[cfg(feature = "dhat-heap")]
    heap: Option<HeapProfiler>,
}

impl ProcessRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` while CPU sampling is running.
    pub fn is_sampling(&self) -> bool {
        self.cpu.is_some()
    }

    /// Returns `true` while allocations are being recorded.
    pub fn is_recording_heap(&self) -> bool {
        #[cfg(feature = "dhat-heap")]
        return self.heap.is_some();

        #[cfg(not(feature = "dhat-heap"))]
        false
    }
}

impl fmt::Debug for ProcessRuntime {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("ProcessRuntime")
            .field("sampling", &self.is_sampling())
            .field("recording_heap", &self.is_recording_heap())
            .finish()
    }
}

impl Runtime for ProcessRuntime {
    fn start_cpu_profile(&mut self, frequency: i32) -> Result<()> {
        if self.cpu.is_some() {
            return Err(Error::Profiling("CPU profiling already enabled".to_string()));
        }

        let guard = ProfilerGuardBuilder::default()
            .frequency(frequency)
            .build()
            .map_err(|e| Error::Profiling(format!("could not start CPU profiler: {}", e)))?;
        self.cpu = Some(guard);
        Ok(())
    }

    fn stop_cpu_profile(&mut self, out: &mut dyn Write) -> Result<()> {
        // Dropping the guard stops the sampler, even if the report fails
        let guard = self
            .cpu
            .take()
            .ok_or(Error::Profiling("CPU profiling not enabled".to_string()))?;

        let report = guard.report().build()?;
        let profile = report.pprof()?;
        out.write_all(&profile.encode_to_vec())?;
        Ok(())
    }

    #[cfg(feature = "dhat-heap")]
    fn start_heap_profile(&mut self) -> Result<()> {
        if self.heap.is_some() {
            return Err(Error::Profiling("heap profiling already enabled".to_string()));
        }
        self.heap = Some(HeapProfiler::start()?);
        Ok(())
    }

    fn collect_garbage(&mut self) {
        #[cfg(all(target_os = "linux", target_env = "gnu"))]
        {
            let released = unsafe { libc::malloc_trim(0) } != 0;
            debug!("Trimmed allocator heap (memory released: {})", released);
        }

        #[cfg(not(all(target_os = "linux", target_env = "gnu")))]
        debug!("No allocator trimming available on this platform");
    }

    fn write_snapshot(&mut self, kind: ProfileKind, out: &mut dyn Write) -> Result<()> {
        match kind {
            ProfileKind::Cpu => Err(Error::Profiling(
                "CPU profiles are written when sampling stops".to_string(),
            )),
            #[cfg(feature = "dhat-heap")]
            ProfileKind::Heap => self
                .heap
                .take()
                .ok_or(Error::Profiling("heap profiling not enabled".to_string()))?
                .finish(out),
            #[cfg(not(feature = "dhat-heap"))]
            ProfileKind::Heap => Err(Error::Unsupported(ProfileKind::Heap)),
            #[cfg(target_os = "linux")]
            ProfileKind::Thread => procfs::write_threads(out),
            #[cfg(target_os = "linux")]
            ProfileKind::Block => procfs::write_contention(out),
            #[cfg(not(target_os = "linux"))]
            kind @ (ProfileKind::Thread | ProfileKind::Block) => {
                let _ = out;
                Err(Error::Unsupported(kind))
            }
        }
    }
}

#[cfg(target_os = "linux")]
mod procfs {
    use crate::{Error, Result};
    use std::{fs, io::Write};

    const SELF_TASKS: &str = "/proc/self/task";

    fn field<'a>(status: &'a str, name: &str) -> Option<&'a str> {
        status.lines().find_map(|line| {
            line.strip_prefix(name)
                .and_then(|rest| rest.strip_prefix(':'))
                .map(str::trim)
        })
    }

    struct Task {
        tid: u32,
        name: String,
        status: String,
        wchan: String,
    }

    fn tasks() -> Result<Vec<Task>> {
        let entries =
            fs::read_dir(SELF_TASKS).map_err(|e| Error::Profiling(format!("{}: {}", SELF_TASKS, e)))?;

        let mut tids: Vec<u32> = entries
            .filter_map(|e| e.ok())
            .filter_map(|e| e.file_name().to_str().and_then(|s| s.parse().ok()))
            .collect();
        tids.sort_unstable();

        // Threads may exit between listing and reading
        Ok(tids
            .into_iter()
            .filter_map(|tid| {
                let dir = format!("{}/{}", SELF_TASKS, tid);
                let status = fs::read_to_string(format!("{}/status", dir)).ok()?;
                let name = fs::read_to_string(format!("{}/comm", dir))
                    .map(|s| s.trim().to_string())
                    .unwrap_or_default();
                let wchan = fs::read_to_string(format!("{}/wchan", dir))
                    .map(|s| s.trim().to_string())
                    .unwrap_or_default();
                Some(Task {
                    tid,
                    name,
                    status,
                    wchan,
                })
            })
            .collect())
    }

    pub(super) fn write_threads(out: &mut dyn Write) -> Result<()> {
        let tasks = tasks()?;

        writeln!(out, "# live threads: {}", tasks.len())?;
        for task in &tasks {
            writeln!(out, "tid {} {}", task.tid, task.name)?;
        }
        Ok(())
    }

    pub(super) fn write_contention(out: &mut dyn Write) -> Result<()> {
        let tasks = tasks()?;

        writeln!(out, "# context switches per thread: {}", tasks.len())?;
        for task in &tasks {
            let wchan = match task.wchan.as_str() {
                "" | "0" => "-",
                w => w,
            };
            writeln!(
                out,
                "tid {} {} voluntary={} nonvoluntary={} wchan={}",
                task.tid,
                task.name,
                field(&task.status, "voluntary_ctxt_switches").unwrap_or("0"),
                field(&task.status, "nonvoluntary_ctxt_switches").unwrap_or("0"),
                wchan
            )?;
        }
        Ok(())
    }

}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stop_without_start_is_an_error() {
        let mut runtime = ProcessRuntime::new();
        let mut buf = Vec::new();
        assert!(matches!(
            runtime.stop_cpu_profile(&mut buf),
            Err(Error::Profiling(_))
        ));
        assert!(buf.is_empty());
    }

    #[test]
    fn cpu_kind_has_no_snapshot() {
        let mut runtime = ProcessRuntime::new();
        let mut buf = Vec::new();
        assert!(runtime.write_snapshot(ProfileKind::Cpu, &mut buf).is_err());
    }

    #[cfg(not(feature = "dhat-heap"))]
    #[test]
    fn heap_needs_dhat() {
        let mut runtime = ProcessRuntime::new();
        runtime.start_heap_profile().unwrap();
        assert!(!runtime.is_recording_heap());

        let mut buf = Vec::new();
        assert!(matches!(
            runtime.write_snapshot(ProfileKind::Heap, &mut buf),
            Err(Error::Unsupported(ProfileKind::Heap))
        ));
        assert!(buf.is_empty());
    }

    #[test]
    fn collect_garbage_is_callable() {
        ProcessRuntime::new().collect_garbage();
    }
}
