// Copyright (c) Meta Platforms, Inc. and affiliates.
//
// This software may be used and distributed according to the terms of the
// GNU General Public License version 2.

//! # DVFS control for sched_ext tooling
//!
//! Benchmarks and tuning tools often want the CPUs pinned to a known governor
//! and frequency for the duration of a run, and put back as they were
//! afterwards. This crate discovers which CPUs share a frequency domain and
//! exposes revertible control over cpufreq governors and frequencies.
//!
//! ## Model
//!
//! - `DvfsCore`: one logical CPU. Remembers the governor (and frequency,
//!   under the "userspace" governor) found when opened and restores them
//!   when closed or dropped.
//! - `DvfsUnit`: the cores bound to a single frequency by the hardware.
//! - `DvfsContext`: every unit on the host.
//!
//! Frequency domains are read from the cpufreq topology files. The choice of
//! file goes through a `TopologyResolver` so that tests and unusual hosts can
//! point the crate elsewhere; `DvfsConfig` relocates sysfs and procfs.
//!
//! ## Serialization
//!
//! When `DvfsConfig::serialize` is set, transitions on every core go through
//! a host wide `TransitionLock` shared with other processes using this
//! crate.

mod config;
pub use config::DvfsConfig;
pub use config::DEFAULT_LOCK_NAME;

mod error;
pub use error::DvfsError;
pub use error::Result;

pub mod cpulist;
pub use cpulist::read_cpulist;

pub mod sysfs;
pub use sysfs::CpuFile;
pub use sysfs::SysfsPaths;

mod cpus;
pub use cpus::has_turbo_boost;
pub use cpus::online_cpus;
pub use cpus::CpuInfo;

mod resolver;
pub use resolver::FixedResolver;
pub use resolver::KernelResolver;
pub use resolver::TopologyResolver;

mod lock;
pub use lock::TransitionGuard;
pub use lock::TransitionLock;

mod cpu_core;
pub use crate::cpu_core::DvfsCore;
pub use crate::cpu_core::USERSPACE_GOVERNOR;

mod domain;
pub use domain::frequency_domains;
pub use domain::related_cpus;

mod unit;
pub use unit::CoreInfo;
pub use unit::DvfsUnit;
pub use unit::UnitInfo;

mod context;
pub use context::DvfsContext;
