// SPDX-License-Identifier: Apache-2.0

use crate::{Error, ProfileKind, Result};
use clap::{ArgMatches, Args, Command, FromArgMatches};
use std::{
    env,
    path::{Path, PathBuf},
    str::FromStr,
};

/// Environment variable holding options in the `key=value,key=value` format.
pub const ENV_OPTIONS: &str = "PROFTOGGLE";

/// Default CPU sampling frequency in Hz.
pub const DEFAULT_CPU_RATE: i32 = 100;

/// Output destinations for each profile kind.
///
/// A missing or empty path leaves the profile disabled.
#[derive(Debug, Clone, Default, PartialEq, Eq, Args)]
pub struct ProfileOptions {
    #[arg(long = "cpuprofile", value_name = "PATH")]
    #[arg(help = "a filename to write a CPU profile")]
    pub cpu: Option<PathBuf>,

    #[arg(long = "heapprofile", value_name = "PATH")]
    #[arg(help = "a filename to write a heap profile")]
    pub heap: Option<PathBuf>,

    #[arg(long = "threadprofile", value_name = "PATH")]
    #[arg(help = "a filename to write the threads created by the process")]
    pub thread: Option<PathBuf>,

    #[arg(long = "blockprofile", value_name = "PATH")]
    #[arg(help = "a filename to write how threads blocked on synchronization")]
    pub block: Option<PathBuf>,

    #[arg(long = "cpuprofile-rate", value_name = "HZ")]
    #[arg(help = "CPU profile sampling frequency [default: 100]")]
    #[arg(value_parser = clap::value_parser!(i32).range(1..))]
    pub cpu_rate: Option<i32>,
}

impl ProfileOptions {
    /// Adds the profiling options to a builder-style command.
    ///
    /// Must be called before the command parses its arguments.
    pub fn register(cmd: Command) -> Command {
        <Self as Args>::augment_args(cmd)
    }

    /// Reads the options back from parsed matches of a command passed
    /// through [`ProfileOptions::register`].
    pub fn from_matches(matches: &ArgMatches) -> Result<Self> {
        <Self as FromArgMatches>::from_arg_matches(matches).map_err(|e| Error::Cli(e.to_string()))
    }

    /// Reads the options from the `PROFTOGGLE` environment variable.
    ///
    /// An unset variable yields all profiles disabled.
    pub fn from_env() -> Result<Self> {
        match env::var(ENV_OPTIONS) {
            Ok(s) => s.parse(),
            Err(env::VarError::NotPresent) => Ok(Self::default()),
            Err(e) => Err(Error::Cli(format!("{}: {}", ENV_OPTIONS, e))),
        }
    }

    pub fn with_path(mut self, kind: ProfileKind, path: impl Into<PathBuf>) -> Self {
        *self.slot_mut(kind) = Some(path.into());
        self
    }

    pub fn with_cpu_rate(mut self, hz: i32) -> Self {
        self.cpu_rate = Some(hz);
        self
    }

    /// Returns the CPU sampling frequency, falling back to
    /// [`DEFAULT_CPU_RATE`].
    pub fn cpu_rate(&self) -> i32 {
        self.cpu_rate.unwrap_or(DEFAULT_CPU_RATE)
    }

    /// Returns the output path for `kind`, if that profile is enabled.
    pub fn path(&self, kind: ProfileKind) -> Option<&Path> {
        let path = match kind {
            ProfileKind::Cpu => &self.cpu,
            ProfileKind::Heap => &self.heap,
            ProfileKind::Thread => &self.thread,
            ProfileKind::Block => &self.block,
        };
        path.as_deref().filter(|p| !p.as_os_str().is_empty())
    }

    /// Returns `true` if no profile is enabled.
    pub fn is_empty(&self) -> bool {
        ProfileKind::ALL.iter().all(|k| self.path(*k).is_none())
    }

    /// Overlays `other` on top of `self`.
    ///
    /// Enabled paths and an explicit CPU rate of `other` replace those of
    /// `self`.
    pub fn merge(mut self, other: ProfileOptions) -> Self {
        for kind in ProfileKind::ALL {
            if let Some(p) = other.path(kind) {
                *self.slot_mut(kind) = Some(p.to_path_buf());
            }
        }
        self.cpu_rate = other.cpu_rate.or(self.cpu_rate);
        self
    }

    fn slot_mut(&mut self, kind: ProfileKind) -> &mut Option<PathBuf> {
        match kind {
            ProfileKind::Cpu => &mut self.cpu,
            ProfileKind::Heap => &mut self.heap,
            ProfileKind::Thread => &mut self.thread,
            ProfileKind::Block => &mut self.block,
        }
    }
}

impl FromStr for ProfileOptions {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let mut options = ProfileOptions::default();

        for part in s.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let mut kv = part.splitn(2, '=');
            let key = kv
                .next()
                .ok_or(Error::Cli("Missing key".to_string()))?;
            let value = kv
                .next()
                .ok_or(Error::Cli(format!("Missing value for {}", key)))?;
            match key {
                "cpuprofile_rate" => {
                    let hz = value.parse::<i32>().ok().filter(|hz| *hz > 0).ok_or(
                        Error::Cli(format!("Invalid frequency for cpuprofile_rate: {}", value)),
                    )?;
                    options.cpu_rate = Some(hz);
                }
                _ => match ProfileKind::from_flag_name(key) {
                    Some(kind) => *options.slot_mut(kind) = Some(PathBuf::from(value)),
                    None => return Err(Error::Cli(format!("Unknown key: {}", key))),
                },
            }
        }

        Ok(options)
    }
}
