// Copyright (c) Meta Platforms, Inc. and affiliates.

// This software may be used and distributed according to the terms of the
// GNU General Public License version 2.

//! # DVFS unit
//!
//! Many CPUs can't run their cores at different frequencies. The cores that
//! are bound together form a unit, and requests are fanned out to every one
//! of them. A failure on one core doesn't stop the others from being
//! updated, and cores already updated are not rolled back.

use crate::cpu_core::DvfsCore;
use crate::error::first_err;
use crate::error::DvfsError;
use crate::error::Result;
use serde::Serialize;

#[derive(Debug)]
pub struct DvfsUnit {
    id: usize,
    cores: Vec<DvfsCore>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CoreInfo {
    pub id: u32,
    pub governor: String,
    pub cur_freq: u64,
    pub freqs: Vec<u64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct UnitInfo {
    pub id: usize,
    pub freq: u64,
    pub cores: Vec<CoreInfo>,
}

impl DvfsUnit {
    pub fn new(id: usize, cores: Vec<DvfsCore>) -> Result<DvfsUnit> {
        if cores.is_empty() {
            return Err(DvfsError::InvalidArgument(format!("unit {} has no core", id)));
        }
        Ok(DvfsUnit { id, cores })
    }

    /// Close every core in order, restoring their initial state.
    pub fn close(self) -> Result<()> {
        let mut err = None;
        for core in self.cores {
            first_err(&mut err, core.close());
        }
        err.map_or(Ok(()), Err)
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn cores(&self) -> &[DvfsCore] {
        &self.cores
    }

    pub fn nb_cores(&self) -> usize {
        self.cores.len()
    }

    /// Core at position `idx` in the unit, not core id `idx`.
    pub fn core(&self, idx: usize) -> Result<&DvfsCore> {
        self.cores
            .get(idx)
            .ok_or(DvfsError::InvalidCoreIndex(idx))
    }

    pub fn core_mut(&mut self, idx: usize) -> Result<&mut DvfsCore> {
        self.cores
            .get_mut(idx)
            .ok_or(DvfsError::InvalidCoreIndex(idx))
    }

    pub fn contains(&self, cpu: u32) -> bool {
        self.cores.iter().any(|core| core.id() == cpu)
    }

    pub fn set_governor(&mut self, gov: &str) -> Result<()> {
        let mut err = None;
        for core in self.cores.iter_mut() {
            first_err(&mut err, core.set_governor(gov));
        }
        err.map_or(Ok(()), Err)
    }

    /// Request `freq` on every core. The effect is unknown unless the
    /// governor is "userspace".
    pub fn set_frequency(&mut self, freq: u64) -> Result<()> {
        let mut err = None;
        for core in self.cores.iter_mut() {
            first_err(&mut err, core.set_frequency(freq));
        }
        err.map_or(Ok(()), Err)
    }

    /// Frequency the unit runs at: the highest one its cores report.
    pub fn frequency(&mut self) -> Result<u64> {
        let mut err = None;
        let mut max_freq = 0;
        for core in self.cores.iter_mut() {
            match core.current_frequency() {
                Ok(freq) => max_freq = max_freq.max(freq),
                Err(e) => first_err(&mut err, Err(e)),
            }
        }
        match err {
            Some(e) => Err(e),
            None => Ok(max_freq),
        }
    }

    /// Governor of the first core.
    pub fn governor(&self) -> Result<String> {
        self.cores[0].governor()
    }

    /// Frequencies available on the first core.
    pub fn frequencies(&self) -> &[u64] {
        self.cores[0].frequencies()
    }

    pub fn info(&mut self) -> Result<UnitInfo> {
        let freq = self.frequency()?;
        let mut cores = Vec::with_capacity(self.cores.len());
        for core in self.cores.iter_mut() {
            cores.push(CoreInfo {
                id: core.id(),
                governor: core.governor()?,
                cur_freq: core.current_frequency()?,
                freqs: core.frequencies().to_vec(),
            });
        }
        Ok(UnitInfo {
            id: self.id,
            freq,
            cores,
        })
    }
}
