//! # Checkpoint
//!
//! Snapshot of a run taken after selection: the population, the generation it
//! belongs to, the logbook so far and the full RNG state. Restoring one and
//! continuing replays exactly what the uninterrupted run would have done,
//! provided the oracle answers the same way.
//!
//! Checkpoints are pretty-printed JSON. They are written to `<path>.tmp`
//! first and then renamed over `<path>`, so a crash never leaves a truncated
//! checkpoint behind.

use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use crate::error::{GeneticError, Result};
use crate::evolution::logbook::Logbook;
use crate::individual::Individual;
use crate::rng::RandomNumberGenerator;

/// Format version written by this crate.
pub const CHECKPOINT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub version: u32,
    /// Last completed generation.
    pub generation: usize,
    pub population: Vec<Individual>,
    pub logbook: Logbook,
    pub rng: RandomNumberGenerator,
}

impl Checkpoint {
    pub fn new(
        generation: usize,
        population: Vec<Individual>,
        logbook: Logbook,
        rng: RandomNumberGenerator,
    ) -> Self {
        Self {
            version: CHECKPOINT_VERSION,
            generation,
            population,
            logbook,
            rng,
        }
    }

    /// Writes the checkpoint atomically to `path`.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let tmp = tmp_path(path);

        let payload = serde_json::to_vec_pretty(self).map_err(|e| {
            GeneticError::Checkpoint(format!("cannot serialize generation {}: {}", self.generation, e))
        })?;
        fs::write(&tmp, payload).map_err(|e| {
            GeneticError::Checkpoint(format!("cannot write {}: {}", tmp.display(), e))
        })?;
        fs::rename(&tmp, path).map_err(|e| {
            GeneticError::Checkpoint(format!(
                "cannot move {} to {}: {}",
                tmp.display(),
                path.display(),
                e
            ))
        })?;

        info!(generation = self.generation, path = %path.display(), "checkpoint saved");
        Ok(())
    }

    /// Reads a checkpoint written by [`Checkpoint::save`].
    ///
    /// # Errors
    ///
    /// `GeneticError::Checkpoint` if the file cannot be read or parsed, or
    /// carries a missing or unsupported version.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let payload = fs::read(path).map_err(|e| {
            GeneticError::Checkpoint(format!("cannot read {}: {}", path.display(), e))
        })?;
        let value: Value = serde_json::from_slice(&payload).map_err(|e| {
            GeneticError::Checkpoint(format!("{} is not valid JSON: {}", path.display(), e))
        })?;

        match value.get("version").and_then(Value::as_u64) {
            Some(v) if v == u64::from(CHECKPOINT_VERSION) => {}
            Some(v) => {
                return Err(GeneticError::Checkpoint(format!(
                    "{} has unsupported version {}",
                    path.display(),
                    v
                )))
            }
            None => {
                return Err(GeneticError::Checkpoint(format!(
                    "{} carries no version",
                    path.display()
                )))
            }
        }

        let checkpoint: Checkpoint = serde_json::from_value(value).map_err(|e| {
            GeneticError::Checkpoint(format!("{} is malformed: {}", path.display(), e))
        })?;
        debug!(generation = checkpoint.generation, "checkpoint loaded");
        Ok(checkpoint)
    }
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut tmp: OsString = path.as_os_str().to_owned();
    tmp.push(".tmp");
    PathBuf::from(tmp)
}
