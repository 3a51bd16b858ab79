// SPDX-License-Identifier: Apache-2.0

//! Heap profiling through `dhat`.
//!
//! Only allocations made through `dhat::Alloc` are recorded, so the host
//! program must install it as its global allocator:
//!
//! ```rust,ignore
//! #[global_allocator]
//! static ALLOC: dhat::Alloc = dhat::Alloc;
//! ```

use crate::{Error, Result};
use std::{
    fs::File,
    io::{self, Write},
    sync::atomic::{AtomicBool, Ordering},
};
use tempfile::NamedTempFile;

// dhat supports a single profiler per process
static RUNNING: AtomicBool = AtomicBool::new(false);

/// A running dhat heap profiler.
///
/// dhat writes its JSON report to a file when the profiler is dropped, so
/// the report is staged in a temporary file and copied into the profile
/// output afterwards.
pub(super) struct HeapProfiler {
    profiler: Option<dhat::Profiler>,
    staging: NamedTempFile,
}

impl HeapProfiler {
    pub(super) fn start() -> Result<Self> {
        if RUNNING
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(Error::Profiling("heap profiling already enabled".to_string()));
        }

        let staging = match NamedTempFile::new() {
            Ok(f) => f,
            Err(e) => {
                RUNNING.store(false, Ordering::Release);
                return Err(Error::Profiling(format!(
                    "could not stage heap profile: {}",
                    e
                )));
            }
        };

        let profiler = dhat::Profiler::builder()
            .file_name(staging.path())
            .trim_backtraces(None)
            .build();

        Ok(Self {
            profiler: Some(profiler),
            staging,
        })
    }

    /// Stops the profiler and copies its report into `out`.
    pub(super) fn finish(mut self, out: &mut dyn Write) -> Result<()> {
        // Dropping the profiler writes the report
        drop(self.profiler.take());
        RUNNING.store(false, Ordering::Release);

        let mut report = File::open(self.staging.path())?;
        io::copy(&mut report, out)?;
        Ok(())
    }
}

impl Drop for HeapProfiler {
    fn drop(&mut self) {
        if self.profiler.take().is_some() {
            RUNNING.store(false, Ordering::Release);
        }
    }
}
