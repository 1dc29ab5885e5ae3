// Copyright (c) Meta Platforms, Inc. and affiliates.

// This software may be used and distributed according to the terms of the
// GNU General Public License version 2.

//! # Frequency domains
//!
//! Partition of the host CPUs into groups that the hardware forces to run at
//! a single frequency. CPUs are visited in ascending order and each CPU not
//! yet grouped seeds a new group made of the CPUs its topology file lists,
//! in the order the file lists them.

use crate::cpulist::read_cpulist;
use crate::cpulist::CpulistError;
use crate::error::DvfsError;
use crate::error::Result;
use crate::resolver::TopologyResolver;
use crate::sysfs::read_string;
use crate::sysfs::SysfsPaths;
use log::debug;
use log::warn;
use std::collections::BTreeSet;

/// Ids of the CPUs sharing a frequency domain with `cpu`, as listed by its
/// topology file.
pub fn related_cpus(
    paths: &SysfsPaths,
    resolver: &dyn TopologyResolver,
    cpu: u32,
) -> Result<Vec<u32>> {
    let path = resolver.related_cpus_path(paths, cpu)?;
    let content = read_string(&path).map_err(|e| DvfsError::RelatedCoreUnavailable {
        cpu,
        reason: e.to_string(),
    })?;

    read_cpulist(&content).map_err(|e| match e {
        CpulistError::Alloc(_) => DvfsError::MemAlloc,
        e => DvfsError::RelatedCoreUnavailable {
            cpu,
            reason: format!("{} in {:?}", e, path),
        },
    })
}

/// Group `cpus` into frequency domains. A single unreadable or malformed
/// topology file fails the whole partition.
pub fn frequency_domains(
    paths: &SysfsPaths,
    resolver: &dyn TopologyResolver,
    cpus: &[u32],
) -> Result<Vec<Vec<u32>>> {
    let known: BTreeSet<u32> = cpus.iter().copied().collect();
    let mut grouped = BTreeSet::new();
    let mut domains = Vec::new();

    for &cpu in known.iter() {
        if grouped.contains(&cpu) {
            continue;
        }

        let mut domain = Vec::new();
        for related in related_cpus(paths, resolver, cpu)? {
            if !known.contains(&related) {
                debug!("CPU {}: skipping unknown related CPU {}", cpu, related);
                continue;
            }
            if domain.contains(&related) {
                continue;
            }
            if grouped.contains(&related) {
                return Err(DvfsError::RelatedCoreUnavailable {
                    cpu,
                    reason: format!("CPU {} already belongs to another domain", related),
                });
            }
            domain.push(related);
        }

        if !domain.contains(&cpu) {
            warn!("CPU {} is missing from its own topology file", cpu);
            domain.push(cpu);
        }

        grouped.extend(domain.iter().copied());
        domains.push(domain);
    }

    Ok(domains)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::FixedResolver;
    use crate::sysfs::CpuFile;
    use tempfile::TempDir;

    fn write_related(paths: &SysfsPaths, cpu: u32, content: &str) {
        let path = paths.cpu_file(cpu, CpuFile::RelatedCpus).unwrap();
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    const RELATED: FixedResolver = FixedResolver(CpuFile::RelatedCpus);

    #[test]
    fn test_single_domain_flat() {
        let tmp = TempDir::new().unwrap();
        let paths = SysfsPaths::new(tmp.path());
        for cpu in 0..4 {
            write_related(&paths, cpu, "0 1 2 3\n");
        }

        let domains = frequency_domains(&paths, &RELATED, &[0, 1, 2, 3]).unwrap();
        assert_eq!(domains, vec![vec![0, 1, 2, 3]]);
    }

    #[test]
    fn test_single_domain_range() {
        let tmp = TempDir::new().unwrap();
        let paths = SysfsPaths::new(tmp.path());
        for cpu in 0..4 {
            write_related(&paths, cpu, "0-3\n");
        }

        let domains = frequency_domains(&paths, &RELATED, &[0, 1, 2, 3]).unwrap();
        assert_eq!(domains, vec![vec![0, 1, 2, 3]]);
    }

    #[test]
    fn test_per_core_domains() {
        let tmp = TempDir::new().unwrap();
        let paths = SysfsPaths::new(tmp.path());
        for cpu in 0..3 {
            write_related(&paths, cpu, &format!("{cpu}\n"));
        }

        let domains = frequency_domains(&paths, &RELATED, &[2, 0, 1]).unwrap();
        assert_eq!(domains, vec![vec![0], vec![1], vec![2]]);
    }

    #[test]
    fn test_membership_follows_file_order() {
        let tmp = TempDir::new().unwrap();
        let paths = SysfsPaths::new(tmp.path());
        // SMT siblings interleaved: 0,4 and 1,5 share a domain each.
        write_related(&paths, 0, "4,0\n");
        write_related(&paths, 4, "4,0\n");
        write_related(&paths, 1, "1 5\n");
        write_related(&paths, 5, "1 5\n");

        let domains = frequency_domains(&paths, &RELATED, &[0, 1, 4, 5]).unwrap();
        assert_eq!(domains, vec![vec![4, 0], vec![1, 5]]);
    }

    #[test]
    fn test_offline_cpus_dropped() {
        let tmp = TempDir::new().unwrap();
        let paths = SysfsPaths::new(tmp.path());
        write_related(&paths, 0, "0-3\n");
        write_related(&paths, 1, "0-3\n");

        let domains = frequency_domains(&paths, &RELATED, &[0, 1]).unwrap();
        assert_eq!(domains, vec![vec![0, 1]]);
    }

    #[test]
    fn test_malformed_aborts() {
        let tmp = TempDir::new().unwrap();
        let paths = SysfsPaths::new(tmp.path());
        write_related(&paths, 0, "0 1\n");
        write_related(&paths, 2, "2-a\n");

        let err = frequency_domains(&paths, &RELATED, &[0, 1, 2, 3]).unwrap_err();
        assert!(matches!(
            err,
            DvfsError::RelatedCoreUnavailable { cpu: 2, .. }
        ));
    }

    #[test]
    fn test_huge_range_aborts() {
        let tmp = TempDir::new().unwrap();
        let paths = SysfsPaths::new(tmp.path());
        write_related(&paths, 0, "0-4294967295\n");

        let err = frequency_domains(&paths, &RELATED, &[0, 1]).unwrap_err();
        assert!(matches!(
            err,
            DvfsError::RelatedCoreUnavailable { cpu: 0, .. }
        ));
    }

    #[test]
    fn test_missing_file() {
        let tmp = TempDir::new().unwrap();
        let paths = SysfsPaths::new(tmp.path());

        let err = frequency_domains(&paths, &RELATED, &[0]).unwrap_err();
        assert!(matches!(
            err,
            DvfsError::RelatedCoreUnavailable { cpu: 0, .. }
        ));
    }

    #[test]
    fn test_overlapping_domains_rejected() {
        let tmp = TempDir::new().unwrap();
        let paths = SysfsPaths::new(tmp.path());
        write_related(&paths, 0, "0 1\n");
        write_related(&paths, 2, "1 2\n");

        assert!(frequency_domains(&paths, &RELATED, &[0, 1, 2]).is_err());
    }

    #[test]
    fn test_seed_missing_from_own_file() {
        let tmp = TempDir::new().unwrap();
        let paths = SysfsPaths::new(tmp.path());
        write_related(&paths, 0, "1\n");

        let domains = frequency_domains(&paths, &RELATED, &[0, 1]).unwrap();
        assert_eq!(domains, vec![vec![1, 0]]);
    }
}
