// Copyright (c) Meta Platforms, Inc. and affiliates.

// This software may be used and distributed according to the terms of the
// GNU General Public License version 2.

//! # DVFS context
//!
//! Entry point of the crate. A context discovers the frequency domains of
//! the host, opens every online CPU and owns the resulting units. Closing or
//! dropping the context puts every CPU back in the state found when it was
//! opened.
//!
//!```no_run
//!     use scx_dvfs::DvfsConfig;
//!     use scx_dvfs::DvfsContext;
//!
//!     let mut ctx = DvfsContext::open(&DvfsConfig::default())?;
//!     ctx.set_governor("userspace")?;
//!     let freq = ctx.unit(0)?.frequencies()[0];
//!     ctx.set_frequency(freq)?;
//!     // ... run the benchmark ...
//!     ctx.close()?;
//!     # Ok::<(), scx_dvfs::DvfsError>(())
//!```

use crate::config::DvfsConfig;
use crate::cpu_core::DvfsCore;
use crate::cpus::online_cpus;
use crate::domain::frequency_domains;
use crate::error::first_err;
use crate::error::DvfsError;
use crate::error::Result;
use crate::lock::TransitionLock;
use crate::resolver::KernelResolver;
use crate::resolver::TopologyResolver;
use crate::sysfs::SysfsPaths;
use crate::unit::DvfsUnit;
use crate::unit::UnitInfo;
use log::info;
use log::warn;

#[derive(Debug)]
pub struct DvfsContext {
    units: Vec<DvfsUnit>,
}

impl DvfsContext {
    /// Discover the online CPUs and their frequency domains and take
    /// control of all of them.
    pub fn open(config: &DvfsConfig) -> Result<DvfsContext> {
        let paths = SysfsPaths::new(&config.sysfs_root);
        let cpus = online_cpus(&paths, &config.procfs_root)?;
        let resolver = KernelResolver::detect(&config.procfs_root);
        Self::open_cpus(config, &resolver, &cpus)
    }

    /// Take control of `cpus`, grouped with `resolver`.
    pub fn open_cpus(
        config: &DvfsConfig,
        resolver: &dyn TopologyResolver,
        cpus: &[u32],
    ) -> Result<DvfsContext> {
        let paths = SysfsPaths::new(&config.sysfs_root);
        let domains = frequency_domains(&paths, resolver, cpus)?;

        // Cores opened so far restore themselves if a later one fails.
        let mut units = Vec::with_capacity(domains.len());
        for (id, domain) in domains.into_iter().enumerate() {
            let mut cores = Vec::with_capacity(domain.len());
            for cpu in domain {
                let lock = if config.serialize {
                    open_lock(config)
                } else {
                    None
                };
                cores.push(DvfsCore::open(cpu, &paths, lock)?);
            }
            units.push(DvfsUnit::new(id, cores)?);
        }

        info!(
            "DVFS: {} units over {} CPUs",
            units.len(),
            units.iter().map(|u| u.nb_cores()).sum::<usize>()
        );
        Ok(DvfsContext { units })
    }

    /// Close every unit in order, restoring the initial DVFS state.
    pub fn close(self) -> Result<()> {
        let mut err = None;
        for unit in self.units {
            first_err(&mut err, unit.close());
        }
        err.map_or(Ok(()), Err)
    }

    pub fn units(&self) -> &[DvfsUnit] {
        &self.units
    }

    pub fn nb_units(&self) -> usize {
        self.units.len()
    }

    pub fn unit(&self, id: usize) -> Result<&DvfsUnit> {
        self.units.get(id).ok_or(DvfsError::InvalidUnitId(id))
    }

    pub fn unit_mut(&mut self, id: usize) -> Result<&mut DvfsUnit> {
        self.units.get_mut(id).ok_or(DvfsError::InvalidUnitId(id))
    }

    pub fn core(&self, cpu: u32) -> Result<&DvfsCore> {
        self.units
            .iter()
            .flat_map(|unit| unit.cores())
            .find(|core| core.id() == cpu)
            .ok_or(DvfsError::InvalidCoreId(cpu))
    }

    pub fn unit_by_core_id(&self, cpu: u32) -> Result<&DvfsUnit> {
        self.units
            .iter()
            .find(|unit| unit.contains(cpu))
            .ok_or(DvfsError::InvalidCoreId(cpu))
    }

    pub fn unit_by_core_id_mut(&mut self, cpu: u32) -> Result<&mut DvfsUnit> {
        self.units
            .iter_mut()
            .find(|unit| unit.contains(cpu))
            .ok_or(DvfsError::InvalidCoreId(cpu))
    }

    /// Unit owning `core`, which must be a handle of this context.
    pub fn unit_by_core(&self, core: &DvfsCore) -> Result<&DvfsUnit> {
        self.units
            .iter()
            .find(|unit| unit.cores().iter().any(|c| std::ptr::eq(c, core)))
            .ok_or(DvfsError::CoreUnitMismatch(core.id()))
    }

    pub fn set_governor(&mut self, gov: &str) -> Result<()> {
        let mut err = None;
        for unit in self.units.iter_mut() {
            first_err(&mut err, unit.set_governor(gov));
        }
        err.map_or(Ok(()), Err)
    }

    pub fn set_frequency(&mut self, freq: u64) -> Result<()> {
        let mut err = None;
        for unit in self.units.iter_mut() {
            first_err(&mut err, unit.set_frequency(freq));
        }
        err.map_or(Ok(()), Err)
    }

    pub fn snapshot(&mut self) -> Result<Vec<UnitInfo>> {
        self.units.iter_mut().map(|unit| unit.info()).collect()
    }
}

fn open_lock(config: &DvfsConfig) -> Option<TransitionLock> {
    let path = config.lock_path();
    match TransitionLock::open(&path) {
        Ok(lock) => Some(lock),
        Err(e) => {
            warn!("Transitions won't be serialized ({})", e);
            None
        }
    }
}
