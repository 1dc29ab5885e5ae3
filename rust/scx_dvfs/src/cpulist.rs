// Copyright (c) Meta Platforms, Inc. and affiliates.

// This software may be used and distributed according to the terms of the
// GNU General Public License version 2.

//! # CPU list parsing
//!
//! Topology files come in two flavors depending on the kernel and the file:
//! a flat list of ids separated by spaces or commas ("0 1 2 3", "0,1,2,3"),
//! and the condensed form where contiguous ids are written as an inclusive
//! range ("0-3", "0-1,4-5"). Both may be mixed in one file. Only the first
//! line is considered.
//! Ids at or above `MAX_CPUS` are rejected before anything is reserved.
//!
//! Parsing runs in two passes: the first one counts the ids, expanding
//! ranges, the second one fills a buffer reserved for exactly that count.

use sscanf::sscanf;

/// Upper bound on CPU ids, the largest `CONFIG_NR_CPUS` the kernel allows.
pub const MAX_CPUS: u32 = 8192;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CpulistError {
    #[error("Malformed cpulist token '{0}'")]
    Malformed(String),
    #[error("CPU id {0} exceeds the kernel CPU limit")]
    OutOfRange(u32),
    #[error("Empty cpulist")]
    Empty,
    #[error("Failed to allocate {0} cpu ids")]
    Alloc(usize),
}

#[derive(Debug, Clone, Copy)]
enum Token {
    Single(u32),
    Range(u32, u32),
}

impl Token {
    fn len(&self) -> usize {
        match *self {
            Token::Single(_) => 1,
            Token::Range(min, max) => (max - min) as usize + 1,
        }
    }
}

fn tokens(cpulist: &str) -> impl Iterator<Item = &str> {
    let cpulist = cpulist.trim_start().trim_end_matches('\0');
    let line = cpulist.lines().next().unwrap_or("");
    line.split([' ', ',', '\t']).filter(|tok| !tok.is_empty())
}

fn parse_token(tok: &str) -> Result<Token, CpulistError> {
    if let Ok((min, max)) = sscanf!(tok, "{u32}-{u32}") {
        if max < min {
            return Err(CpulistError::Malformed(tok.to_string()));
        }
        if max >= MAX_CPUS {
            return Err(CpulistError::OutOfRange(max));
        }
        return Ok(Token::Range(min, max));
    }
    match sscanf!(tok, "{u32}") {
        Ok(cpu) if cpu >= MAX_CPUS => Err(CpulistError::OutOfRange(cpu)),
        Ok(cpu) => Ok(Token::Single(cpu)),
        Err(_) => Err(CpulistError::Malformed(tok.to_string())),
    }
}

/// First pass: number of cpu ids described by `cpulist`.
pub fn count_cpus(cpulist: &str) -> Result<usize, CpulistError> {
    let mut nr_cpus: usize = 0;
    for tok in tokens(cpulist) {
        let len = parse_token(tok)?.len();
        nr_cpus = nr_cpus
            .checked_add(len)
            .ok_or_else(|| CpulistError::Malformed(tok.to_string()))?;
    }
    Ok(nr_cpus)
}

/// Expand `cpulist` into the ids it lists, in file order.
pub fn read_cpulist(cpulist: &str) -> Result<Vec<u32>, CpulistError> {
    let nr_cpus = count_cpus(cpulist)?;
    if nr_cpus == 0 {
        return Err(CpulistError::Empty);
    }

    let mut cpu_ids = Vec::new();
    cpu_ids
        .try_reserve_exact(nr_cpus)
        .map_err(|_| CpulistError::Alloc(nr_cpus))?;

    for tok in tokens(cpulist) {
        match parse_token(tok)? {
            Token::Single(cpu) => cpu_ids.push(cpu),
            Token::Range(min, max) => cpu_ids.extend(min..=max),
        }
    }

    debug_assert_eq!(cpu_ids.len(), nr_cpus);
    Ok(cpu_ids)
}
