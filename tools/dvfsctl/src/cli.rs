// Copyright (c) Meta Platforms, Inc. and affiliates.

// This software may be used and distributed according to the terms of the
// GNU General Public License version 2.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose output, including debug messages from the library.
    /// Specify multiple times to increase verbosity.
    #[clap(short = 'v', long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Serialize transitions with other processes through the host wide
    /// transition lock.
    #[clap(long, global = true)]
    pub serialize: bool,

    /// Root of the sysfs tree.
    #[clap(long, env = "DVFSCTL_SYSFS_ROOT", global = true)]
    pub sysfs_root: Option<PathBuf>,

    /// Root of the procfs tree.
    #[clap(long, env = "DVFSCTL_PROCFS_ROOT", global = true)]
    pub procfs_root: Option<PathBuf>,
}

#[derive(Parser, Debug)]
pub struct HoldArgs {
    #[arg(short, long, help = "Governor to set", default_value = "userspace")]
    pub governor: String,
    #[arg(
        short,
        long,
        help = "Frequency in kHz to request, must be advertised by the CPUs"
    )]
    pub freq: Option<u64>,
    #[arg(
        short,
        long,
        help = "Restrict to the unit containing this CPU instead of all units"
    )]
    pub cpu: Option<u32>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    #[command(
        about = "Print the CPUs grouped by frequency domain",
        long_about = "Print the CPUs grouped by frequency domain.\n\n\
            Without CPU, every group is printed and groups are separated by '|', \
            e.g. \"0 1 | 2 3\" when CPUs 0 and 1 share a domain and 2 and 3 \
            share another. With CPU, only the CPUs of its domain are printed."
    )]
    Domains {
        #[arg(help = "Only print the domain of this CPU")]
        cpu: Option<u32>,
    },
    #[command(about = "Show governor and frequencies of every unit")]
    Info {
        #[arg(long, help = "Output JSON")]
        json: bool,
    },
    #[command(about = "Apply a governor and frequency until interrupted, then restore")]
    Hold {
        #[clap(flatten)]
        args: HoldArgs,
    },
    #[command(about = "Report whether the CPU supports opportunistic boost")]
    Boost,
}
