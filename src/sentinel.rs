//! Governance integrity sentinel (C8a): TOFU baseline hashing of the
//! kernel's own critical files.
//!
//! Uses SHA3-512 exclusively, unlike every other hash in the kernel which
//! is SHA-256.

use crate::clock::Clock;
use crate::hashing::sha3_512_of_file;
use crate::scram::{ScramController, ScramReason};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// The confirmation token `reset_baseline` requires, to make a baseline
/// reset an unmistakably deliberate operator action.
pub const RESET_CONFIRMATION_TOKEN: &str = "RESET_GOVERNANCE_BASELINE";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IntegrityStatus {
    NoBaseline,
    BreachDetected,
    IntegrityVerified,
}

#[derive(Debug, thiserror::Error)]
pub enum SentinelError {
    #[error("RESET_CONFIRMATION_REQUIRED: baseline reset requires the exact confirmation token")]
    ResetConfirmationRequired,
}

/// Monitors a fixed set of critical files for unauthorized change,
/// trusting whatever hash was present on first run (trust-on-first-use).
pub struct IntegritySentinel {
    critical_files: Vec<PathBuf>,
    baseline: Mutex<Option<HashMap<String, String>>>,
}

impl IntegritySentinel {
    pub fn new(critical_files: Vec<PathBuf>) -> Self {
        Self {
            critical_files,
            baseline: Mutex::new(None),
        }
    }

    fn compute_current(&self) -> HashMap<String, String> {
        self.critical_files
            .iter()
            .map(|path| (path.to_string_lossy().to_string(), sha3_512_of_file(path)))
            .collect()
    }

    /// Load the baseline if present, otherwise trust the current state
    /// and adopt it as the baseline (TOFU).
    fn load_or_create_baseline(&self) -> HashMap<String, String> {
        let mut guard = self.baseline.lock().expect("sentinel baseline mutex poisoned");
        if let Some(baseline) = guard.as_ref() {
            return baseline.clone();
        }
        let fresh = self.compute_current();
        *guard = Some(fresh.clone());
        fresh
    }

    /// Compare the current hash of every critical file to the trusted
    /// baseline. Any mismatch triggers SCRAM.
    pub fn verify_integrity(
        &self,
        scram: &ScramController,
        ledger: &crate::ledger::Ledger,
        clock: &dyn Clock,
    ) -> IntegrityStatus {
        let had_baseline = self.baseline.lock().expect("sentinel baseline mutex poisoned").is_some();
        let baseline = self.load_or_create_baseline();
        if !had_baseline {
            return IntegrityStatus::NoBaseline;
        }

        let current = self.compute_current();
        let breached = self.critical_files.iter().any(|path| {
            let key = path.to_string_lossy().to_string();
            baseline.get(&key) != current.get(&key)
        });

        if breached {
            let context = serde_json::json!({
                "breached_files": self.critical_files.iter()
                    .filter(|p| {
                        let key = p.to_string_lossy().to_string();
                        baseline.get(&key) != current.get(&key)
                    })
                    .map(|p| p.to_string_lossy().to_string())
                    .collect::<Vec<_>>(),
            });
            let _ = scram.activate(
                &["sentinel-key-a", "sentinel-key-b"],
                ScramReason::SentinelTrigger,
                context,
                ledger,
                clock,
            );
            IntegrityStatus::BreachDetected
        } else {
            IntegrityStatus::IntegrityVerified
        }
    }

    /// Reset the baseline to the current file state. Requires the exact
    /// confirmation token so this can never happen by accident.
    pub fn reset_baseline(&self, confirmation: &str) -> Result<(), SentinelError> {
        if confirmation != RESET_CONFIRMATION_TOKEN {
            return Err(SentinelError::ResetConfirmationRequired);
        }
        let fresh = self.compute_current();
        *self.baseline.lock().expect("sentinel baseline mutex poisoned") = Some(fresh);
        Ok(())
    }

    pub fn get_status(&self) -> IntegrityStatus {
        match self.baseline.lock().expect("sentinel baseline mutex poisoned").as_ref() {
            None => IntegrityStatus::NoBaseline,
            Some(_) => IntegrityStatus::IntegrityVerified,
        }
    }

    pub fn critical_files(&self) -> &[PathBuf] {
        &self.critical_files
    }
}

impl IntegritySentinel {
    /// Convenience constructor taking borrowed path strings.
    pub fn from_paths<I, S>(paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<Path>,
    {
        Self::new(paths.into_iter().map(|p| p.as_ref().to_path_buf()).collect())
    }
}
