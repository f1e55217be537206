//! # On-disk layout of one named state.
//!
//! ```text
//! {dir}/{name}.json        generation 1 (live)
//! {dir}/{name}_2.json      generation 2
//! {dir}/{name}_3.json      generation 3
//! {dir}/{name}_4.json      generation 4 (oldest)
//! {dir}/{name}_temp.json   scratch, rewritten every cycle
//! {dir}/{name}_swap.json   staging copy renamed over the live file
//! ```
//!
//! Backups are only ever produced by copying, so a crash mid-rotation leaves
//! at worst two equal neighbours. The live file is replaced by renaming a
//! fully synced staging copy over it and is never seen half-written.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::PersistError;

/// Number of generations kept, live file included.
pub const GENERATIONS: usize = 4;

/// What [`GenerationSet::rotate`] did to the backup chain.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Rotation {
    /// Nothing on disk yet; the chain is seeded after the first write.
    Fresh,
    /// No generation 2; every backup was copied from the live file.
    Seeded,
    /// The oldest generation was evicted.
    Shifted,
}

/// Paths of the live file, its backups and the scratch files for one name.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GenerationSet {
    live: PathBuf,
    backups: Vec<PathBuf>,
    temp: PathBuf,
    swap: PathBuf,
}

impl GenerationSet {
    /// Lays out the files for `name` under `dir`.
    pub fn new(dir: &Path, name: &str) -> Self {
        Self {
            live: dir.join(format!("{name}.json")),
            backups: (2..=GENERATIONS)
                .map(|k| dir.join(format!("{name}_{k}.json")))
                .collect(),
            temp: dir.join(format!("{name}_temp.json")),
            swap: dir.join(format!("{name}_swap.json")),
        }
    }

    /// The live file.
    pub fn live(&self) -> &Path {
        &self.live
    }

    /// Backups, newest first.
    pub fn backups(&self) -> &[PathBuf] {
        &self.backups
    }

    /// The scratch file.
    pub fn temp(&self) -> &Path {
        &self.temp
    }

    /// Staging file for the live replacement. Only exists mid-write.
    pub fn swap(&self) -> &Path {
        &self.swap
    }

    /// Generation `k`: 1 is live, `GENERATIONS` is the oldest backup.
    pub fn path(&self, k: usize) -> Option<&Path> {
        match k {
            1 => Some(&self.live),
            k if (2..=GENERATIONS).contains(&k) => Some(&self.backups[k - 2]),
            _ => None,
        }
    }

    /// Shifts the backup chain by one before a new write.
    ///
    /// Without a generation 2 the chain is seeded from the live file, or left
    /// alone when there is no live file yet ([`Rotation::Fresh`]). Otherwise
    /// the oldest is evicted: 3→4, 2→3, live→2, skipping missing sources.
    pub(crate) fn rotate(&self) -> Result<Rotation, PersistError> {
        if !self.backups[0].exists() {
            if !self.live.exists() {
                return Ok(Rotation::Fresh);
            }
            self.seed()?;
            return Ok(Rotation::Seeded);
        }

        for k in (1..GENERATIONS).rev() {
            let (Some(from), Some(to)) = (self.path(k), self.path(k + 1)) else {
                continue;
            };
            if from.exists() {
                copy(from, to)?;
            }
        }
        Ok(Rotation::Shifted)
    }

    /// Copies the live file down the whole chain: live→2, 2→3, 3→4.
    pub(crate) fn seed(&self) -> Result<(), PersistError> {
        let mut from = self.live.as_path();
        for to in &self.backups {
            copy(from, to)?;
            from = to;
        }
        Ok(())
    }

    /// Atomically replaces the live file with the contents of `from`.
    ///
    /// `from` is copied to the staging file, synced, then renamed over live.
    pub(crate) fn replace_live(&self, from: &Path) -> Result<(), PersistError> {
        copy(from, &self.swap)?;
        fs::OpenOptions::new()
            .write(true)
            .open(&self.swap)
            .and_then(|f| f.sync_all())
            .map_err(|e| PersistError::io(&self.swap, e))?;
        fs::rename(&self.swap, &self.live).map_err(|e| PersistError::io(&self.live, e))
    }
}

fn copy(from: &Path, to: &Path) -> Result<(), PersistError> {
    fs::copy(from, to).map_err(|e| PersistError::io(to, e))?;
    Ok(())
}
