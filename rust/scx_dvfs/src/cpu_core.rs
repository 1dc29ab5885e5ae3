// Copyright (c) Meta Platforms, Inc. and affiliates.

// This software may be used and distributed according to the terms of the
// GNU General Public License version 2.

//! # DVFS core
//!
//! Control handle for a single logical CPU. Opening a core records the
//! governor, and the frequency when the governor is "userspace", so that
//! closing it (explicitly or by dropping it) puts the CPU back the way it
//! was found.

use crate::error::DvfsError;
use crate::error::Result;
use crate::lock::serialized;
use crate::lock::TransitionLock;
use crate::sysfs;
use crate::sysfs::CpuFile;
use crate::sysfs::SysfsPaths;
use log::debug;
use log::warn;
use std::fs::File;
use std::path::PathBuf;

pub const USERSPACE_GOVERNOR: &str = "userspace";

#[derive(Debug)]
pub struct DvfsCore {
    id: u32,
    freqs: Vec<u64>,

    gov_path: PathBuf,
    set_path: PathBuf,
    cur_path: PathBuf,
    set_file: Option<File>,
    cur_file: File,

    init_gov: String,
    init_freq: u64,

    lock: Option<TransitionLock>,
    // Set by the first governor or frequency write.
    dirty: bool,
    closed: bool,
}

impl DvfsCore {
    /// Open the control handle of CPU `id`. With `lock`, every transition
    /// on this core is serialized through it.
    pub fn open(id: u32, paths: &SysfsPaths, lock: Option<TransitionLock>) -> Result<DvfsCore> {
        let gov_path = paths.cpu_file(id, CpuFile::Governor)?;
        let cur_path = paths.cpu_file(id, CpuFile::CurFreq)?;
        let set_path = paths.cpu_file(id, CpuFile::SetSpeed)?;
        let avail_path = paths.cpu_file(id, CpuFile::AvailableFreqs)?;

        let init_gov = sysfs::read_token(&gov_path)?;
        let init_freq = if init_gov == USERSPACE_GOVERNOR {
            sysfs::read_u64(&cur_path)?
        } else {
            0
        };

        let freqs = sysfs::read_freq_list(&avail_path)?;

        let set_file = match sysfs::open_write(&set_path) {
            Ok(file) => Some(file),
            Err(e) => {
                debug!("CPU {}: frequency setter unavailable ({})", id, e);
                None
            }
        };
        let cur_file = sysfs::open_read(&cur_path)?;

        debug!(
            "CPU {}: governor={} freq={} freqs={:?} serialized={}",
            id,
            init_gov,
            init_freq,
            freqs,
            lock.is_some()
        );

        Ok(DvfsCore {
            id,
            freqs,
            gov_path,
            set_path,
            cur_path,
            set_file,
            cur_file,
            init_gov,
            init_freq,
            lock,
            dirty: false,
            closed: false,
        })
    }

    /// Restore the governor and frequency found at open time and release
    /// the handle. A handle that never wrote anything leaves the files
    /// untouched.
    pub fn close(mut self) -> Result<()> {
        self.restore()
    }

    fn restore(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        if !self.dirty {
            return Ok(());
        }

        let init_gov = std::mem::take(&mut self.init_gov);
        let res = self.set_governor(&init_gov);
        let res = if init_gov == USERSPACE_GOVERNOR {
            // Attempt the frequency even if the governor write failed.
            let freq_res = self.write_frequency(self.init_freq);
            res.and(freq_res)
        } else {
            res
        };
        self.init_gov = init_gov;
        res
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    /// Available frequencies, ascending.
    pub fn frequencies(&self) -> &[u64] {
        &self.freqs
    }

    pub fn nb_freqs(&self) -> usize {
        self.freqs.len()
    }

    pub fn frequency(&self, freq_id: usize) -> Result<u64> {
        self.freqs
            .get(freq_id)
            .copied()
            .ok_or(DvfsError::InvalidFreqId(freq_id))
    }

    pub fn init_governor(&self) -> &str {
        &self.init_gov
    }

    /// Frequency found at open time. Only meaningful when the initial
    /// governor was "userspace".
    pub fn init_frequency(&self) -> u64 {
        self.init_freq
    }

    pub fn is_serialized(&self) -> bool {
        self.lock.is_some()
    }

    pub fn can_set_frequency(&self) -> bool {
        self.set_file.is_some()
    }

    pub fn governor(&self) -> Result<String> {
        serialized(self.lock.as_ref(), || sysfs::read_token(&self.gov_path))
    }

    pub fn set_governor(&mut self, gov: &str) -> Result<()> {
        if gov.is_empty() || gov.contains('\0') || gov.len() > sysfs::MAX_GOVERNOR_LEN {
            return Err(DvfsError::InvalidArgument(format!(
                "invalid governor name {:?}",
                gov
            )));
        }
        self.dirty = true;
        serialized(self.lock.as_ref(), || sysfs::write_str(&self.gov_path, gov))
    }

    /// Request `freq`, which must be one of the advertised frequencies. The
    /// request only takes effect under the "userspace" governor.
    pub fn set_frequency(&mut self, freq: u64) -> Result<()> {
        if self.freqs.binary_search(&freq).is_err() {
            return Err(DvfsError::UnsupportedFrequency { cpu: self.id, freq });
        }
        self.write_frequency(freq)
    }

    fn write_frequency(&mut self, freq: u64) -> Result<()> {
        let file = match self.set_file.as_mut() {
            Some(file) => file,
            None => return Err(DvfsError::SetFreqFileUnavailable(self.id)),
        };
        self.dirty = true;
        let set_path = &self.set_path;
        serialized(self.lock.as_ref(), || {
            sysfs::write_u64(file, set_path, freq)
        })
    }

    /// Frequency currently selected for this core. Other cores of the same
    /// unit may request a different one; `DvfsUnit::frequency()` tells what
    /// the unit actually runs at.
    pub fn current_frequency(&mut self) -> Result<u64> {
        let cur_file = &mut self.cur_file;
        let cur_path = &self.cur_path;
        serialized(self.lock.as_ref(), || sysfs::poll_u64(cur_file, cur_path))
    }
}

impl Drop for DvfsCore {
    fn drop(&mut self) {
        if let Err(e) = self.restore() {
            warn!("CPU {}: failed to restore DVFS state ({})", self.id, e);
        }
    }
}
