// SPDX-License-Identifier: Apache-2.0

use crate::{ProfileKind, Result};
use std::io::Write;

#[cfg(feature = "dhat-heap")]
mod heap;
pub mod process;

pub use process::ProcessRuntime;

/// The profiler that actually collects data.
///
/// A [`ProfileManager`](crate::ProfileManager) only decides when to start
/// and stop profiling and where output goes; sampling and the output format
/// belong to the runtime.
pub trait Runtime {
    /// Starts continuous CPU sampling at `frequency` Hz.
    fn start_cpu_profile(&mut self, frequency: i32) -> Result<()>;

    /// Stops CPU sampling and writes the collected profile into `out`.
    fn stop_cpu_profile(&mut self, out: &mut dyn Write) -> Result<()>;

    /// Starts recording allocations for a later heap snapshot.
    ///
    /// Runtimes that can take a heap snapshot at any time need not record
    /// anything up front.
    fn start_heap_profile(&mut self) -> Result<()> {
        Ok(())
    }

    /// Releases memory held by dead objects so a heap snapshot only reports
    /// live data.
    fn collect_garbage(&mut self);

    /// Writes the current snapshot of a non-CPU profile into `out`.
    fn write_snapshot(&mut self, kind: ProfileKind, out: &mut dyn Write) -> Result<()>;
}

impl<R: Runtime + ?Sized> Runtime for Box<R> {
    fn start_cpu_profile(&mut self, frequency: i32) -> Result<()> {
        (**self).start_cpu_profile(frequency)
    }

    fn stop_cpu_profile(&mut self, out: &mut dyn Write) -> Result<()> {
        (**self).stop_cpu_profile(out)
    }

    fn start_heap_profile(&mut self) -> Result<()> {
        (**self).start_heap_profile()
    }

    fn collect_garbage(&mut self) {
        (**self).collect_garbage()
    }

    fn write_snapshot(&mut self, kind: ProfileKind, out: &mut dyn Write) -> Result<()> {
        (**self).write_snapshot(kind, out)
    }
}
