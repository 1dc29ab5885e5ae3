// Copyright (c) Meta Platforms, Inc. and affiliates.

// This software may be used and distributed according to the terms of the
// GNU General Public License version 2.

//! # Sysfs accessor
//!
//! Translates a CPU id and a file role into a path under the cpufreq or
//! topology directory of that CPU, and performs single reads and writes on
//! it. Nothing here keeps state besides the configured sysfs root.

use crate::error::DvfsError;
use crate::error::Result;
use std::fs::File;
use std::fs::OpenOptions;
use std::io::Read;
use std::io::Seek;
use std::io::SeekFrom;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;

/// Longest path the accessor will build.
pub const MAX_PATH_LEN: usize = 256;

/// Longest governor name the kernel can report.
pub const MAX_GOVERNOR_LEN: usize = 127;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CpuFile {
    Governor,
    CurFreq,
    AvailableFreqs,
    SetSpeed,
    FreqDomainCpus,
    RelatedCpus,
    CoreSiblings,
    ThreadSiblings,
}

impl CpuFile {
    fn rel_path(&self) -> &'static str {
        match self {
            CpuFile::Governor => "cpufreq/scaling_governor",
            CpuFile::CurFreq => "cpufreq/scaling_cur_freq",
            CpuFile::AvailableFreqs => "cpufreq/scaling_available_frequencies",
            CpuFile::SetSpeed => "cpufreq/scaling_setspeed",
            CpuFile::FreqDomainCpus => "cpufreq/freqdomain_cpus",
            CpuFile::RelatedCpus => "cpufreq/related_cpus",
            CpuFile::CoreSiblings => "topology/core_siblings_list",
            CpuFile::ThreadSiblings => "topology/thread_siblings_list",
        }
    }
}

#[derive(Debug, Clone)]
pub struct SysfsPaths {
    root: PathBuf,
}

impl SysfsPaths {
    pub fn new(sysfs_root: impl Into<PathBuf>) -> Self {
        SysfsPaths {
            root: sysfs_root.into(),
        }
    }

    pub fn cpu_dir(&self) -> PathBuf {
        self.root.join("devices/system/cpu")
    }

    /// Path of `file` for `cpu`. Fails instead of truncating when the result
    /// does not fit in `MAX_PATH_LEN` bytes.
    pub fn cpu_file(&self, cpu: u32, file: CpuFile) -> Result<PathBuf> {
        let path = format!(
            "{}/cpu{}/{}",
            self.cpu_dir().display(),
            cpu,
            file.rel_path()
        );
        if path.len() > MAX_PATH_LEN {
            return Err(DvfsError::BufferTooShort {
                len: path.len(),
                max: MAX_PATH_LEN,
            });
        }
        Ok(PathBuf::from(path))
    }
}

pub fn read_string(path: &Path) -> Result<String> {
    let val = std::fs::read_to_string(path).map_err(|e| DvfsError::file(path, e))?;
    Ok(val.trim_end_matches('\0').to_string())
}

/// Read the first whitespace separated token of a file, e.g. a governor.
pub fn read_token(path: &Path) -> Result<String> {
    let val = read_string(path)?;
    let token = match val.split_whitespace().next() {
        Some(token) => token,
        None => return Err(DvfsError::parse(path, "empty file")),
    };
    if token.len() > MAX_GOVERNOR_LEN {
        return Err(DvfsError::parse(
            path,
            format!("token longer than {MAX_GOVERNOR_LEN} bytes"),
        ));
    }
    Ok(token.to_string())
}

pub fn read_u64(path: &Path) -> Result<u64> {
    let val = read_string(path)?;
    parse_u64(path, &val)
}

fn parse_u64(path: &Path, val: &str) -> Result<u64> {
    match val.trim().parse::<u64>() {
        Ok(parsed) => Ok(parsed),
        Err(_) => Err(DvfsError::parse(
            path,
            format!("expected an integer, got '{}'", val.trim()),
        )),
    }
}

/// Parse the first line of `scaling_available_frequencies`.
///
/// The kernel does not guarantee any order, the result is always strictly
/// increasing.
pub fn read_freq_list(path: &Path) -> Result<Vec<u64>> {
    let val = read_string(path)?;
    let line = val.lines().next().unwrap_or("");

    let nr_freqs = line.split_whitespace().count();
    if nr_freqs == 0 {
        return Err(DvfsError::parse(path, "no frequency advertised"));
    }

    let mut freqs = Vec::new();
    freqs
        .try_reserve_exact(nr_freqs)
        .map_err(|_| DvfsError::MemAlloc)?;
    for tok in line.split_whitespace() {
        freqs.push(parse_u64(path, tok)?);
    }

    // Most drivers list frequencies from the highest down.
    freqs.reverse();
    if !freqs.windows(2).all(|w| w[0] < w[1]) {
        freqs.sort_unstable();
        freqs.dedup();
    }
    Ok(freqs)
}

/// Write a string followed by its NUL terminator, e.g. a governor name.
pub fn write_str(path: &Path, val: &str) -> Result<()> {
    let mut file = File::create(path).map_err(|e| DvfsError::file(path, e))?;
    let mut payload = Vec::with_capacity(val.len() + 1);
    payload.extend_from_slice(val.as_bytes());
    payload.push(0);
    file.write_all(&payload)
        .and_then(|_| file.flush())
        .map_err(|e| DvfsError::file(path, e))
}

pub fn open_read(path: &Path) -> Result<File> {
    File::open(path).map_err(|e| DvfsError::file(path, e))
}

pub fn open_write(path: &Path) -> Result<File> {
    OpenOptions::new()
        .write(true)
        .open(path)
        .map_err(|e| DvfsError::file(path, e))
}

/// Re-read an integer through a handle kept open for polling.
pub fn poll_u64(file: &mut File, path: &Path) -> Result<u64> {
    let mut val = String::new();
    file.seek(SeekFrom::Start(0))
        .and_then(|_| file.read_to_string(&mut val))
        .map_err(|e| DvfsError::file(path, e))?;
    parse_u64(path, val.trim_end_matches('\0'))
}

/// Write a decimal integer, without newline, through a kept-open handle.
pub fn write_u64(file: &mut File, path: &Path, val: u64) -> Result<()> {
    file.seek(SeekFrom::Start(0))
        .and_then(|_| write!(file, "{val}"))
        .and_then(|_| file.flush())
        .map_err(|e| DvfsError::file(path, e))
}
