// SPDX-License-Identifier: Apache-2.0

//! Command-line profiling toggles.
//!
//! A host program registers the `--cpuprofile`, `--heapprofile`,
//! `--threadprofile` and `--blockprofile` options, parses its arguments and
//! then hands the resulting [`ProfileOptions`] to a [`ProfileManager`]. The
//! manager opens the requested output files, starts CPU sampling, and writes
//! every requested profile when it is closed or dropped.
//!
//! ```rust,ignore
//! #[derive(clap::Parser)]
//! struct Cli {
//!     #[command(flatten)]
//!     profiles: proftoggle::ProfileOptions,
//! }
//!
//! let cli = Cli::parse();
//! let _profiles = match proftoggle::ProfileManager::start(cli.profiles) {
//!     Ok(m) => m,
//!     Err(e) => {
//!         log::warn!("{}", e);
//!         e.into_manager()
//!     }
//! };
//! // ... run workload, profiles are written when `_profiles` is dropped
//! ```

use std::{io, path::PathBuf};
use thiserror::Error as ThisError;

pub mod kind;
pub mod manager;
pub mod options;
pub mod runtime;

pub use kind::ProfileKind;
pub use manager::{ProfileManager, StartError};
pub use options::ProfileOptions;
pub use runtime::{ProcessRuntime, Runtime};

#[derive(ThisError, Debug)]
pub enum Error {
    /// A profile output file could not be created or written
    #[error("I/O error on '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The runtime profiler refused to start or stop sampling
    #[error("Profiling error: {0}")]
    Profiling(String),

    /// The runtime cannot produce this kind of profile
    #[error("{0} profiles are not supported on this platform")]
    Unsupported(ProfileKind),

    /// A profile could not be written into its sink
    #[error("Write error: {0}")]
    Write(#[from] io::Error),

    /// Malformed profiling options
    #[error("CLI error: {0}")]
    Cli(String),
}

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }
}

impl From<pprof::Error> for Error {
    fn from(err: pprof::Error) -> Self {
        Error::Profiling(format!("{}", err))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
