// SPDX-License-Identifier: Apache-2.0

use crate::{Error, ProcessRuntime, ProfileKind, ProfileOptions, Result, Runtime};
use log::{debug, info, warn};
use std::{
    fmt,
    fs::File,
    io::{BufWriter, Write},
    path::PathBuf,
};

/// An output file held open while its profile is active.
#[derive(Debug)]
struct OpenProfile {
    path: PathBuf,
    file: File,
}

/// Owns the profile output files and drives the runtime profiler.
///
/// `init` is fail-fast: it stops at the first file or profiler that cannot
/// be set up, but keeps whatever it activated before that. `close` is
/// best-effort: every active profile is written even if another one fails.
/// Dropping the manager closes it.
#[derive(Debug)]
pub struct ProfileManager<R: Runtime = ProcessRuntime> {
    options: ProfileOptions,
    slots: [Option<OpenProfile>; 4],
    runtime: R,
}

impl ProfileManager<ProcessRuntime> {
    /// Creates a manager backed by the process profiler. Nothing is opened
    /// until [`ProfileManager::init`].
    pub fn new(options: ProfileOptions) -> Self {
        Self::with_runtime(options, ProcessRuntime::new())
    }

    /// Creates a manager backed by the process profiler and initializes it.
    pub fn start(options: ProfileOptions) -> std::result::Result<Self, StartError> {
        Self::start_with_runtime(options, ProcessRuntime::new())
    }
}

impl<R: Runtime> ProfileManager<R> {
    pub fn with_runtime(options: ProfileOptions, runtime: R) -> Self {
        Self {
            options,
            slots: [None, None, None, None],
            runtime,
        }
    }

    /// Creates a manager and initializes it.
    ///
    /// On failure the returned [`StartError`] still owns the manager, with
    /// the profiles that were activated before the failure left running.
    pub fn start_with_runtime(
        options: ProfileOptions,
        runtime: R,
    ) -> std::result::Result<Self, StartError<R>> {
        let mut manager = Self::with_runtime(options, runtime);
        match manager.init() {
            Ok(()) => Ok(manager),
            Err(error) => Err(StartError { manager, error }),
        }
    }

    /// Opens the output file of every enabled profile and starts CPU
    /// sampling.
    ///
    /// Besides CPU sampling, runtimes that need to record allocations from
    /// the start are asked to do so for the heap profile.
    ///
    /// Profiles are set up in the order CPU, heap, thread, block and the
    /// first failure is returned immediately. Profiles set up before the
    /// failure stay active, so [`ProfileManager::close`] must still run.
    /// Already active profiles are left untouched.
    pub fn init(&mut self) -> Result<()> {
        for kind in ProfileKind::ALL {
            if self.slots[kind.index()].is_some() {
                continue;
            }
            let path = match self.options.path(kind) {
                Some(p) => p.to_path_buf(),
                None => continue,
            };

            let file = File::create(&path).map_err(|e| Error::io(&path, e))?;
            // `file` is closed on the way out if the runtime cannot start
            match kind {
                ProfileKind::Cpu => self.runtime.start_cpu_profile(self.options.cpu_rate())?,
                ProfileKind::Heap => self.runtime.start_heap_profile()?,
                ProfileKind::Thread | ProfileKind::Block => {}
            }

            debug!("Enabled {} profile, writing to {}", kind, path.display());
            self.slots[kind.index()] = Some(OpenProfile { path, file });
        }

        Ok(())
    }

    /// Writes every active profile and closes its file.
    ///
    /// Failures are logged and do not stop the remaining profiles from being
    /// written. Afterwards no profile is active, so calling `close` again
    /// does nothing.
    pub fn close(&mut self) {
        for kind in ProfileKind::ALL {
            let Some(open) = self.slots[kind.index()].take() else {
                continue;
            };
            let path = open.path.clone();

            match self.finish(kind, open) {
                Ok(()) => info!("Wrote {} profile to {}", kind, path.display()),
                Err(e) => warn!("Could not write {} profile to {}: {}", kind, path.display(), e),
            }
        }
    }

    fn finish(&mut self, kind: ProfileKind, open: OpenProfile) -> Result<()> {
        let OpenProfile { path, file } = open;
        let mut out = BufWriter::new(file);

        match kind {
            ProfileKind::Cpu => self.runtime.stop_cpu_profile(&mut out)?,
            ProfileKind::Heap => {
                // Dead allocations must not show up in the snapshot
                self.runtime.collect_garbage();
                self.runtime.write_snapshot(kind, &mut out)?
            }
            ProfileKind::Thread | ProfileKind::Block => {
                self.runtime.write_snapshot(kind, &mut out)?
            }
        }

        out.flush().map_err(|e| Error::io(path, e))
    }

    /// Returns `true` if `kind` has an open output file.
    pub fn is_active(&self, kind: ProfileKind) -> bool {
        self.slots[kind.index()].is_some()
    }

    /// Returns the active profiles in processing order.
    pub fn active_kinds(&self) -> Vec<ProfileKind> {
        ProfileKind::ALL
            .into_iter()
            .filter(|k| self.is_active(*k))
            .collect()
    }

    pub fn options(&self) -> &ProfileOptions {
        &self.options
    }

    pub fn runtime(&self) -> &R {
        &self.runtime
    }

    pub fn runtime_mut(&mut self) -> &mut R {
        &mut self.runtime
    }
}

impl<R: Runtime> Drop for ProfileManager<R> {
    fn drop(&mut self) {
        self.close();
    }
}

/// The error returned by [`ProfileManager::start`].
///
/// Holds the manager so that profiles started before the failure can still
/// be written.
pub struct StartError<R: Runtime = ProcessRuntime> {
    manager: ProfileManager<R>,
    error: Error,
}

impl<R: Runtime> StartError<R> {
    pub fn error(&self) -> &Error {
        &self.error
    }

    /// Returns the partially initialized manager, dropping the error.
    pub fn into_manager(self) -> ProfileManager<R> {
        self.manager
    }

    pub fn into_parts(self) -> (ProfileManager<R>, Error) {
        (self.manager, self.error)
    }
}

impl<R: Runtime> fmt::Debug for StartError<R> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("StartError")
            .field("error", &self.error)
            .field("active", &self.manager.active_kinds())
            .finish()
    }
}

impl<R: Runtime> fmt::Display for StartError<R> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Could not start profiling: {}", self.error)
    }
}

impl<R: Runtime> std::error::Error for StartError<R> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}
