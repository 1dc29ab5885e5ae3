// Copyright (c) Meta Platforms, Inc. and affiliates.

// This software may be used and distributed according to the terms of the
// GNU General Public License version 2.

#![allow(dead_code)]

use scx_dvfs::CpuFile;
use scx_dvfs::DvfsConfig;
use scx_dvfs::SysfsPaths;
use std::path::PathBuf;
use tempfile::TempDir;

pub const FREQS: &str = "2000000 1600000 1200000\n";

/// A fake `/sys` + `/proc` tree with cpufreq directories.
pub struct FakeHost {
    pub tmp: TempDir,
    pub paths: SysfsPaths,
}

impl FakeHost {
    pub fn new() -> FakeHost {
        let tmp = TempDir::new().unwrap();
        let paths = SysfsPaths::new(tmp.path().join("sys"));
        std::fs::create_dir_all(tmp.path().join("proc")).unwrap();
        FakeHost { tmp, paths }
    }

    pub fn config(&self) -> DvfsConfig {
        DvfsConfig::with_root(self.tmp.path())
    }

    pub fn path(&self, cpu: u32, file: CpuFile) -> PathBuf {
        self.paths.cpu_file(cpu, file).unwrap()
    }

    pub fn write(&self, cpu: u32, file: CpuFile, content: &str) {
        let path = self.path(cpu, file);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    /// Add a CPU with every cpufreq file in place.
    pub fn add_cpu(&self, cpu: u32, gov: &str, freq: u64, related: &str) {
        self.write(cpu, CpuFile::Governor, &format!("{gov}\n"));
        self.write(cpu, CpuFile::CurFreq, &format!("{freq}\n"));
        self.write(cpu, CpuFile::AvailableFreqs, FREQS);
        self.write(cpu, CpuFile::SetSpeed, "<unsupported>\n");
        self.write(cpu, CpuFile::RelatedCpus, related);
    }

    pub fn set_online(&self, cpulist: &str) {
        let path = self.paths.cpu_dir().join("online");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, cpulist).unwrap();
    }

    pub fn set_kernel(&self, release: &str, cpuinfo: &str) {
        let proc = self.tmp.path().join("proc");
        std::fs::create_dir_all(proc.join("sys/kernel")).unwrap();
        std::fs::write(proc.join("sys/kernel/osrelease"), format!("{release}\n")).unwrap();
        std::fs::write(proc.join("cpuinfo"), cpuinfo).unwrap();
    }

    pub fn read(&self, cpu: u32, file: CpuFile) -> String {
        let val = std::fs::read_to_string(self.path(cpu, file)).unwrap();
        val.trim_end_matches('\0').trim().to_string()
    }

    pub fn governor(&self, cpu: u32) -> String {
        self.read(cpu, CpuFile::Governor)
    }

    /// Last frequency written to the setter.
    pub fn set_speed(&self, cpu: u32) -> String {
        let val = self.read(cpu, CpuFile::SetSpeed);
        val.chars().take_while(|c| c.is_ascii_digit()).collect()
    }
}
