// Copyright (c) Meta Platforms, Inc. and affiliates.

// This software may be used and distributed according to the terms of the
// GNU General Public License version 2.

//! # Topology file resolution
//!
//! Which file tells the cores sharing a frequency domain with a given CPU
//! depends on the kernel version, the cpufreq driver and the vendor:
//!
//! - `cpufreq/freqdomain_cpus` when the driver exposes it;
//! - `cpufreq/related_cpus` otherwise;
//! - `topology/core_siblings_list` on the 3.9 and 3.10 branches, where
//!   `related_cpus` disappeared and the domain is assumed package wide.
//!
//! When no cpufreq domain file exists at all, the vendor decides between a
//! package wide domain and a per physical core one.

use crate::cpus::CpuInfo;
use crate::error::DvfsError;
use crate::error::Result;
use crate::sysfs::read_string;
use crate::sysfs::CpuFile;
use crate::sysfs::SysfsPaths;
use log::debug;
use std::ffi::CStr;
use std::path::Path;
use std::path::PathBuf;
use version_compare::Cmp;

/// Chooses the topology file describing the frequency domain of a CPU.
pub trait TopologyResolver {
    fn related_cpus_path(&self, paths: &SysfsPaths, cpu: u32) -> Result<PathBuf>;
}

/// Always answers the same file role.
#[derive(Debug, Clone, Copy)]
pub struct FixedResolver(pub CpuFile);

impl TopologyResolver for FixedResolver {
    fn related_cpus_path(&self, paths: &SysfsPaths, cpu: u32) -> Result<PathBuf> {
        paths.cpu_file(cpu, self.0)
    }
}

#[derive(Debug, Clone)]
pub struct KernelResolver {
    release: String,
    vendor: Option<String>,
}

impl KernelResolver {
    pub fn new(release: impl Into<String>, vendor: Option<String>) -> Self {
        KernelResolver {
            release: release.into(),
            vendor,
        }
    }

    /// Build a resolver for the running kernel.
    pub fn detect(procfs_root: &Path) -> KernelResolver {
        let release = match read_string(&procfs_root.join("sys/kernel/osrelease")) {
            Ok(release) => release.trim().to_string(),
            Err(_) => uname_release().unwrap_or_default(),
        };
        let vendor = CpuInfo::read(procfs_root).ok().and_then(|info| info.vendor);
        debug!("Kernel release {:?}, CPU vendor {:?}", release, vendor);

        KernelResolver { release, vendor }
    }

    /// 3.9 and 3.10 kernels lack `related_cpus`.
    fn lacks_related_cpus(&self) -> bool {
        let version: String = self
            .release
            .chars()
            .take_while(|c| c.is_ascii_digit() || *c == '.')
            .collect();
        let version = version.trim_end_matches('.');
        if version.is_empty() {
            return false;
        }

        version_compare::compare(version, "3.9") != Ok(Cmp::Lt)
            && version_compare::compare(version, "3.11") == Ok(Cmp::Lt)
    }

    fn fallback_file(&self) -> CpuFile {
        match self.vendor.as_deref() {
            Some("GenuineIntel") => CpuFile::CoreSiblings,
            _ => CpuFile::ThreadSiblings,
        }
    }
}

impl TopologyResolver for KernelResolver {
    fn related_cpus_path(&self, paths: &SysfsPaths, cpu: u32) -> Result<PathBuf> {
        if self.lacks_related_cpus() {
            return paths.cpu_file(cpu, CpuFile::CoreSiblings);
        }

        for file in [CpuFile::FreqDomainCpus, CpuFile::RelatedCpus] {
            let path = paths.cpu_file(cpu, file)?;
            if path.exists() {
                return Ok(path);
            }
        }

        let file = self.fallback_file();
        debug!(
            "No cpufreq domain file for CPU {}, using {:?} for vendor {:?}",
            cpu, file, self.vendor
        );
        paths.cpu_file(cpu, file)
    }
}

fn uname_release() -> Result<String> {
    let mut uts: libc::utsname = unsafe { std::mem::zeroed() };
    if unsafe { libc::uname(&mut uts) } < 0 {
        return Err(DvfsError::file(
            "uname",
            std::io::Error::last_os_error(),
        ));
    }
    let release = unsafe { CStr::from_ptr(uts.release.as_ptr()) };
    Ok(release.to_string_lossy().into_owned())
}
