// SPDX-License-Identifier: Apache-2.0

use clap::Parser;
use proftoggle::ProfileOptions;

#[derive(Debug, Parser)]
#[command(name = "proftoggle-run")]
#[command(about = "Runs a synthetic workload with the selected profiles enabled")]
pub struct Cli {
    #[arg(short = 'd')]
    #[arg(long = "duration-ms")]
    #[arg(help = "How long the workload runs, in milliseconds")]
    #[arg(default_value_t = 1000)]
    pub duration_ms: u64,

    #[arg(short = 't')]
    #[arg(long = "threads")]
    #[arg(help = "Number of worker threads")]
    #[arg(default_value_t = 4)]
    #[arg(value_parser = clap::value_parser!(u16).range(1..))]
    pub threads: u16,

    #[arg(long = "fail-on-init-error")]
    #[arg(help = "Exit instead of running without the profiles that could not be started")]
    pub fail_on_init_error: bool,

    #[command(flatten)]
    pub profiles: ProfileOptions,
}

impl Cli {
    /// Resolves the profiling options, letting flags given on the command
    /// line override those from the environment.
    pub fn profile_options(&self, env: ProfileOptions) -> ProfileOptions {
        env.merge(self.profiles.clone())
    }
}
