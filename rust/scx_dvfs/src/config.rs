// Copyright (c) Meta Platforms, Inc. and affiliates.

// This software may be used and distributed according to the terms of the
// GNU General Public License version 2.

use std::env;
use std::path::PathBuf;

lazy_static::lazy_static! {
    pub static ref ROOT_PREFIX: String =
        env::var("DVFS_SYSFS_PREFIX").unwrap_or("".to_string());
    pub static ref LOCK_DIR: Option<String> = env::var("DVFS_LOCK_DIR").ok();
}

pub const DEFAULT_LOCK_NAME: &str = "scx_dvfs";

/// Where to find the kernel interfaces and how to serialize transitions.
///
/// `Default` honors `DVFS_SYSFS_PREFIX`, which is prepended to both `/sys`
/// and `/proc`, and `DVFS_LOCK_DIR`.
#[derive(Debug, Clone)]
pub struct DvfsConfig {
    pub sysfs_root: PathBuf,
    pub procfs_root: PathBuf,
    /// Serialize governor and frequency transitions through the named
    /// host-wide transition lock.
    pub serialize: bool,
    pub lock_dir: PathBuf,
    pub lock_name: String,
}

impl Default for DvfsConfig {
    fn default() -> Self {
        let lock_dir = match LOCK_DIR.as_ref() {
            Some(dir) => PathBuf::from(dir),
            None => default_lock_dir(),
        };

        DvfsConfig {
            sysfs_root: PathBuf::from(format!("{}/sys", *ROOT_PREFIX)),
            procfs_root: PathBuf::from(format!("{}/proc", *ROOT_PREFIX)),
            serialize: false,
            lock_dir,
            lock_name: DEFAULT_LOCK_NAME.to_string(),
        }
    }
}

impl DvfsConfig {
    /// Configuration rooted at a fake `sys`/`proc` tree under `root`.
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        DvfsConfig {
            sysfs_root: root.join("sys"),
            procfs_root: root.join("proc"),
            lock_dir: root.clone(),
            ..DvfsConfig::default()
        }
    }

    pub fn serialize(mut self, serialize: bool) -> Self {
        self.serialize = serialize;
        self
    }

    pub fn lock_path(&self) -> PathBuf {
        self.lock_dir.join(format!("{}.lock", self.lock_name))
    }
}

fn default_lock_dir() -> PathBuf {
    let run_lock = PathBuf::from("/run/lock");
    if run_lock.is_dir() {
        run_lock
    } else {
        env::temp_dir()
    }
}
