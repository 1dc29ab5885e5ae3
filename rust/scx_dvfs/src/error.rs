// Copyright (c) Meta Platforms, Inc. and affiliates.

// This software may be used and distributed according to the terms of the
// GNU General Public License version 2.

use std::io;
use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, DvfsError>;

/// Errors returned by every fallible DVFS operation.
#[derive(Debug, thiserror::Error)]
pub enum DvfsError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Failed to access {}: {source}", path.display())]
    File {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to parse {}: {detail}", path.display())]
    Parse { path: PathBuf, detail: String },

    #[error("Memory allocation failed")]
    MemAlloc,

    #[error("Related cores of CPU {cpu} unavailable: {reason}")]
    RelatedCoreUnavailable { cpu: u32, reason: String },

    #[error("Transition lock failure: {0}")]
    Serialization(#[source] io::Error),

    #[error("Path of {len} bytes exceeds the {max} bytes limit")]
    BufferTooShort { len: usize, max: usize },

    #[error("Frequency setter file of CPU {0} is not available")]
    SetFreqFileUnavailable(u32),

    #[error("Invalid frequency index {0}")]
    InvalidFreqId(usize),

    #[error("Invalid core id {0}")]
    InvalidCoreId(u32),

    #[error("Invalid core index {0}")]
    InvalidCoreIndex(usize),

    #[error("Invalid unit id {0}")]
    InvalidUnitId(usize),

    #[error("Core {0} does not belong to this context")]
    CoreUnitMismatch(u32),

    #[error("Frequency {freq} is not advertised by CPU {cpu}")]
    UnsupportedFrequency { cpu: u32, freq: u64 },
}

impl DvfsError {
    pub(crate) fn file(path: impl Into<PathBuf>, source: io::Error) -> Self {
        DvfsError::File {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn parse(path: impl Into<PathBuf>, detail: impl Into<String>) -> Self {
        DvfsError::Parse {
            path: path.into(),
            detail: detail.into(),
        }
    }

    /// True for failures opening, reading, writing or parsing a sysfs file.
    pub fn is_file_error(&self) -> bool {
        matches!(self, DvfsError::File { .. } | DvfsError::Parse { .. })
    }
}

/// Keep the first error seen while still running every step of a fan-out.
pub(crate) fn first_err(acc: &mut Option<DvfsError>, res: Result<()>) {
    if let Err(e) = res {
        if acc.is_none() {
            *acc = Some(e);
        }
    }
}
