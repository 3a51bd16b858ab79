// SPDX-License-Identifier: Apache-2.0

mod cli;
mod workload;

use clap::Parser;
use cli::Cli;
use env_logger::Env;
use log::{error, info, warn};
use proftoggle::{ProfileManager, ProfileOptions};
use std::{
    process::ExitCode,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};
use thiserror::Error as ThisError;

#[cfg(feature = "dhat-heap")]
#[global_allocator]
static ALLOC: dhat::Alloc = dhat::Alloc;

#[derive(ThisError, Debug)]
pub enum Error {
    /// Profiling could not be configured or started
    #[error("{0}")]
    Profiling(#[from] proftoggle::Error),

    /// Worker threads could not be spawned
    #[error("Spawn error: {0}")]
    Spawn(#[from] std::io::Error),

    /// The workload failed
    #[error("Workload error: {0}")]
    Workload(String),

    /// Signal handler error
    #[error("Signal handler error: {0}")]
    Signal(#[from] ctrlc::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

fn run(cli: Cli) -> Result<()> {
    // Explicit flags win over the environment
    let options = cli.profile_options(ProfileOptions::from_env()?);

    let profiles = match ProfileManager::start(options) {
        Ok(m) => m,
        Err(e) if cli.fail_on_init_error => return Err(e.into_parts().1.into()),
        Err(e) => {
            warn!("{}; continuing without the remaining profiles", e);
            e.into_manager()
        }
    };
    info!("Active profiles: {:?}", profiles.active_kinds());

    let stop = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&stop);
    ctrlc::set_handler(move || {
        flag.store(true, Ordering::Relaxed);
    })?;

    let summary = workload::run(
        cli.threads,
        Duration::from_millis(cli.duration_ms),
        stop,
    )?;
    info!(
        "Workload finished: {} iterations (checksum {:#x})",
        summary.iterations, summary.checksum
    );

    // Profiles are written when `profiles` goes out of scope
    drop(profiles);
    Ok(())
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    match run(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
