// Copyright (c) Meta Platforms, Inc. and affiliates.

// This software may be used and distributed according to the terms of the
// GNU General Public License version 2.

mod cli;

use anyhow::Context;
use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands, HoldArgs};
use log::info;
use scx_dvfs::has_turbo_boost;
use scx_dvfs::DvfsConfig;
use scx_dvfs::DvfsContext;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

fn init_log(verbose: u8) -> Result<()> {
    let llv = match verbose {
        0 => simplelog::LevelFilter::Info,
        1 => simplelog::LevelFilter::Debug,
        _ => simplelog::LevelFilter::Trace,
    };
    let mut lcfg = simplelog::ConfigBuilder::new();
    lcfg.set_time_level(simplelog::LevelFilter::Error)
        .set_location_level(simplelog::LevelFilter::Off)
        .set_target_level(simplelog::LevelFilter::Off)
        .set_thread_level(simplelog::LevelFilter::Off);
    simplelog::TermLogger::init(
        llv,
        lcfg.build(),
        simplelog::TerminalMode::Stderr,
        simplelog::ColorChoice::Auto,
    )?;
    Ok(())
}

fn config(cli: &Cli) -> DvfsConfig {
    let mut config = DvfsConfig::default().serialize(cli.serialize);
    if let Some(root) = &cli.sysfs_root {
        config.sysfs_root = root.clone();
    }
    if let Some(root) = &cli.procfs_root {
        config.procfs_root = root.clone();
    }
    config
}

fn format_cpus<'a>(cpus: impl Iterator<Item = &'a scx_dvfs::DvfsCore>) -> String {
    cpus.map(|core| core.id().to_string())
        .collect::<Vec<_>>()
        .join(" ")
}

fn cmd_domains(config: &DvfsConfig, cpu: Option<u32>) -> Result<()> {
    let ctx = DvfsContext::open(config).context("Failed to read topology information")?;

    match cpu {
        Some(cpu) => {
            let unit = ctx
                .unit_by_core_id(cpu)
                .context("Invalid core number provided")?;
            println!("{}", format_cpus(unit.cores().iter()));
        }
        None => {
            let domains: Vec<String> = ctx
                .units()
                .iter()
                .map(|unit| format_cpus(unit.cores().iter()))
                .collect();
            println!("{}", domains.join(" | "));
        }
    }

    ctx.close().context("Failed to restore DVFS state")
}

fn cmd_info(config: &DvfsConfig, json: bool) -> Result<()> {
    let mut ctx = DvfsContext::open(config).context("Failed to open DVFS context")?;
    let units = ctx.snapshot().context("Failed to read DVFS state")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&units)?);
    } else {
        for unit in units.iter() {
            let cpus: Vec<String> = unit.cores.iter().map(|c| c.id.to_string()).collect();
            println!("unit {}: cpus [{}] freq {} kHz", unit.id, cpus.join(" "), unit.freq);
            for core in unit.cores.iter() {
                let freqs: Vec<String> = core.freqs.iter().map(|f| f.to_string()).collect();
                println!(
                    "  cpu {:<4} {:<12} cur {:>8} kHz  avail [{}]",
                    core.id,
                    core.governor,
                    core.cur_freq,
                    freqs.join(" ")
                );
            }
        }
    }

    ctx.close().context("Failed to restore DVFS state")
}

fn cmd_hold(config: &DvfsConfig, args: &HoldArgs) -> Result<()> {
    // Armed before anything is changed so an early interrupt still restores.
    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_clone = shutdown.clone();
    ctrlc::set_handler(move || {
        shutdown_clone.store(true, Ordering::Relaxed);
    })
    .context("Error setting Ctrl-C handler")?;

    let ctx = DvfsContext::open(config).context("Failed to open DVFS context")?;
    hold(ctx, args, &shutdown)
}

/// Apply `args` and keep them until `shutdown` is raised, then close `ctx`.
fn hold(mut ctx: DvfsContext, args: &HoldArgs, shutdown: &AtomicBool) -> Result<()> {
    let res = match args.cpu {
        Some(cpu) => {
            let unit = ctx
                .unit_by_core_id_mut(cpu)
                .context("Invalid core number provided")?;
            unit.set_governor(&args.governor).and_then(|_| match args.freq {
                Some(freq) => unit.set_frequency(freq),
                None => Ok(()),
            })
        }
        None => ctx.set_governor(&args.governor).and_then(|_| match args.freq {
            Some(freq) => ctx.set_frequency(freq),
            None => Ok(()),
        }),
    };
    res.context("Failed to apply the DVFS request")?;

    info!(
        "Holding governor {} freq {:?}, interrupt to restore",
        args.governor, args.freq
    );

    while !shutdown.load(Ordering::Relaxed) {
        std::thread::sleep(Duration::from_millis(100));
    }

    info!("Restoring DVFS state");
    ctx.close().context("Failed to restore DVFS state")
}

fn cmd_boost(config: &DvfsConfig) -> Result<()> {
    if has_turbo_boost(&config.procfs_root)? {
        println!("This CPU has TurboBoost");
    } else {
        println!("This CPU does not have TurboBoost");
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_log(cli.verbose)?;
    let config = config(&cli);

    match &cli.command {
        Commands::Domains { cpu } => cmd_domains(&config, *cpu),
        Commands::Info { json } => cmd_info(&config, *json),
        Commands::Hold { args } => cmd_hold(&config, args),
        Commands::Boost => cmd_boost(&config),
    }
}
