// Copyright (c) Meta Platforms, Inc. and affiliates.

// This software may be used and distributed according to the terms of the
// GNU General Public License version 2.

//! Host level CPU information: which CPUs are online and what
//! `/proc/cpuinfo` reports about them.

use crate::cpulist::read_cpulist;
use crate::error::DvfsError;
use crate::error::Result;
use crate::sysfs::read_string;
use crate::sysfs::SysfsPaths;
use glob::glob;
use log::debug;
use log::warn;
use sscanf::sscanf;
use std::path::Path;

/// Ids of the online CPUs, ascending.
///
/// Reads the `online` cpulist, then falls back to the `cpu[0-9]*`
/// directories, and finally to `sysconf(_SC_NPROCESSORS_ONLN)`.
pub fn online_cpus(paths: &SysfsPaths, procfs_root: &Path) -> Result<Vec<u32>> {
    let online_path = paths.cpu_dir().join("online");
    match read_string(&online_path) {
        Ok(online) => match read_cpulist(&online) {
            Ok(mut cpus) => {
                cpus.sort_unstable();
                cpus.dedup();
                return Ok(cpus);
            }
            Err(e) => warn!("Failed to parse {:?} ({}), probing cpu directories", online_path, e),
        },
        Err(e) => debug!("{}", e),
    }

    let cpus = cpu_dirs(paths);
    if !cpus.is_empty() {
        return Ok(cpus);
    }

    let nr_cpus = unsafe { libc::sysconf(libc::_SC_NPROCESSORS_ONLN) };
    if nr_cpus > 0 {
        return Ok((0..nr_cpus as u32).collect());
    }

    let nr_cpus = CpuInfo::read(procfs_root)?.nr_processors;
    if nr_cpus == 0 {
        return Err(DvfsError::InvalidArgument(
            "unable to determine the number of CPUs".to_string(),
        ));
    }
    Ok((0..nr_cpus).collect())
}

fn cpu_dirs(paths: &SysfsPaths) -> Vec<u32> {
    let pattern = paths.cpu_dir().join("cpu[0-9]*");
    let mut cpus = Vec::new();
    let entries = match glob(pattern.to_string_lossy().as_ref()) {
        Ok(entries) => entries,
        Err(_) => return cpus,
    };
    for path in entries.filter_map(|e| e.ok()) {
        let name = match path.file_name().and_then(|n| n.to_str()) {
            Some(name) => name,
            None => continue,
        };
        if let Ok(cpu) = sscanf!(name, "cpu{u32}") {
            cpus.push(cpu);
        }
    }
    cpus.sort_unstable();
    cpus
}

/// The subset of `/proc/cpuinfo` DVFS cares about.
#[derive(Debug, Clone, Default)]
pub struct CpuInfo {
    pub vendor: Option<String>,
    pub flags: Vec<String>,
    pub nr_processors: u32,
}

impl CpuInfo {
    pub fn read(procfs_root: &Path) -> Result<CpuInfo> {
        let path = procfs_root.join("cpuinfo");
        let content = read_string(&path)?;
        Ok(CpuInfo::parse(&content))
    }

    pub fn parse(content: &str) -> CpuInfo {
        let mut info = CpuInfo::default();
        for line in content.lines() {
            let (key, val) = match line.split_once(':') {
                Some((key, val)) => (key.trim(), val.trim()),
                None => continue,
            };
            match key {
                "processor" => info.nr_processors += 1,
                "vendor_id" if info.vendor.is_none() => info.vendor = Some(val.to_string()),
                // Flags are identical on every processor entry.
                "flags" if info.flags.is_empty() => {
                    info.flags = val.split_whitespace().map(|f| f.to_string()).collect();
                }
                _ => {}
            }
        }
        info
    }

    pub fn has_flag(&self, flag: &str) -> bool {
        self.flags.iter().any(|f| f == flag)
    }
}

/// Whether the CPU advertises opportunistic boost, i.e. the "ida" flag.
pub fn has_turbo_boost(procfs_root: &Path) -> Result<bool> {
    Ok(CpuInfo::read(procfs_root)?.has_flag("ida"))
}
