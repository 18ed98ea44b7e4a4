//! Kernel configuration.
//!
//! A `Default`-impl'd config struct carrying the ambient settings every
//! subsystem reads at construction time.

use serde::{Deserialize, Serialize};

/// Maximum permitted SCRAM termination latency. Represented in the config
/// struct for interface compatibility with an external configuration
/// surface, but not actually a tunable.
pub const MAX_TERMINATION_MS: u64 = 500;

/// Kernel-wide configuration. Any attempt to construct a config with the
/// immutable keys (`require_dual_key`, `fail_closed_on_error`,
/// `max_termination_ms`) set to an unsafe value is silently overridden back
/// to the safe default by `KernelConfig::sanitized()` — never rejected.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KernelConfig {
    /// Immutable: always 500. Present for interface compatibility.
    pub max_termination_ms: u64,
    /// Immutable: always true.
    pub require_dual_key: bool,
    /// Whether a hardware-sentinel acknowledgment is mandatory for
    /// INV-SCRAM-003 to pass.
    pub hardware_sentinel_required: bool,
    /// Immutable: always true.
    pub fail_closed_on_error: bool,
    /// Path to the SCRAM audit log (append-only JSONL).
    pub audit_log_path: String,
    /// Path to the advisory hardware-sentinel marker file.
    pub hardware_sentinel_path: String,
    /// Path to the governance integrity baseline lock file.
    pub governance_lock_path: String,
    /// Path to the read-only JSONL audit trail the Inspector General tails.
    /// Distinct from `audit_log_path`: that one is SCRAM's own write target,
    /// this one is an external input IG only ever reads.
    pub ig_audit_trail_path: String,
    /// Whether settlement/state-machine transitions anchor to the ledger.
    pub ledger_anchor_enabled: bool,
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            max_termination_ms: MAX_TERMINATION_MS,
            require_dual_key: true,
            hardware_sentinel_required: false,
            fail_closed_on_error: true,
            audit_log_path: "/var/log/chainbridge/scram.log".to_string(),
            hardware_sentinel_path: "/tmp/chainbridge_scram_sentinel".to_string(),
            governance_lock_path: "logs/governance/governance.lock".to_string(),
            ig_audit_trail_path: "logs/tgl_audit_trail.jsonl".to_string(),
            ledger_anchor_enabled: true,
        }
    }
}

impl KernelConfig {
    /// Load from a JSON file, falling back to defaults for absent keys.
    pub fn from_file(path: &std::path::Path) -> anyhow::Result<Self> {
        let data = std::fs::read_to_string(path)?;
        let config: KernelConfig = serde_json::from_str(&data)?;
        Ok(config.sanitized())
    }

    /// Force the immutable keys back to their safe values regardless of
    /// what was deserialized or constructed.
    pub fn sanitized(mut self) -> Self {
        self.max_termination_ms = MAX_TERMINATION_MS;
        self.require_dual_key = true;
        self.fail_closed_on_error = true;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_already_sanitized() {
        let config = KernelConfig::default();
        assert_eq!(config.max_termination_ms, MAX_TERMINATION_MS);
        assert!(config.require_dual_key);
        assert!(config.fail_closed_on_error);
    }

    #[test]
    fn sanitized_overrides_tampered_immutable_keys() {
        let mut config = KernelConfig::default();
        config.max_termination_ms = 10_000;
        config.require_dual_key = false;
        config.fail_closed_on_error = false;
        let sanitized = config.sanitized();
        assert_eq!(sanitized.max_termination_ms, MAX_TERMINATION_MS);
        assert!(sanitized.require_dual_key);
        assert!(sanitized.fail_closed_on_error);
    }
}
