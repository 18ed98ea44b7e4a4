//! Append-only, hash-chained ledger (C4).
//!
//! An in-memory structure guarded by a single `Mutex`, keeping a list plus
//! two dict-like indexes. Entries are immutable once appended; there is no
//! `update`/`delete`.

use crate::clock::Clock;
use crate::hashing::{sha256_joined, GENESIS_HASH};
use crate::pdo::PdoArtifact;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Mutex;

/// Ledger format/version tag carried on every entry and on `export_json`'s
/// envelope, matching `pdo_ledger.py`'s `LEDGER_VERSION`.
pub const LEDGER_VERSION: &str = "1.0.0";

/// Errors raised by ledger operations. Matches `pdo_ledger.py`'s closed
/// exception set for runtime ledger operations: mutation is always
/// forbidden, the chain can be found broken on verification, and
/// reconstructing from an export can find the sequence numbers out of
/// order or the export document itself malformed. There is no append-time
/// uniqueness error — `pdo_ledger.py` indexes `by_pdo_id`/`by_pac_id` as
/// plain last-write-wins maps, not uniqueness constraints, since settlement
/// and milestone transitions legitimately append further entries anchored
/// to a PDO that was already anchored once.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("LEDGER_MUTATION_FORBIDDEN: entries are append-only")]
    MutationForbidden,

    #[error("LEDGER_CHAIN_BROKEN: entry at index {index} does not chain to its predecessor")]
    ChainBroken { index: usize },

    #[error("LEDGER_ORDERING_VIOLATION: entry at position {index} has sequence {found}, expected {expected}")]
    OrderingViolation { index: usize, found: u64, expected: u64 },

    #[error("LEDGER_EXPORT_MALFORMED: exported document is not a valid ledger export")]
    ExportMalformed,
}

/// One append-only ledger entry. Mirrors `pdo_ledger.py`'s `LedgerEntry`
/// dataclass field-for-field; fields that only apply to PDO anchor entries
/// (`ber_id`, `wrap_id`, `outcome_status`, `issuer`, `proof_hash`,
/// `decision_hash`, `outcome_hash`, `pdo_created_at`) are `None` on the
/// generic entries this ledger also carries (SCRAM audit anchors,
/// settlement/milestone transitions) that the Python source, being
/// PDO-only, never had to model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub entry_id: String,
    pub sequence: u64,
    pub entry_type: String,
    pub pdo_id: Option<String>,
    pub pac_id: Option<String>,
    pub ber_id: Option<String>,
    pub wrap_id: Option<String>,
    pub outcome_status: Option<String>,
    pub issuer: Option<String>,
    pub payload_hash: String,
    pub proof_hash: Option<String>,
    pub decision_hash: Option<String>,
    pub outcome_hash: Option<String>,
    /// The PDO's own `created_at`, distinct from `recorded_at` (when the
    /// ledger itself recorded the entry). `None` on non-PDO entries.
    pub pdo_created_at: Option<String>,
    pub previous_entry_hash: String,
    pub entry_hash: String,
    pub recorded_at: String,
    pub ledger_version: String,
}

/// SHA-256 over the 7-field pipe-joined preimage
/// `entry_id|sequence|pdo_id|pac_id|payload_hash|previous_entry_hash|recorded_at`,
/// matching `pdo_ledger.py`'s `compute_entry_hash` (`payload_hash` standing
/// in for the Python source's `pdo_hash` argument, generalized to entries
/// that anchor something other than a PDO).
fn compute_entry_hash(
    entry_id: &str,
    sequence: u64,
    pdo_id: &str,
    pac_id: &str,
    payload_hash: &str,
    previous_entry_hash: &str,
    recorded_at: &str,
) -> String {
    let sequence_str = sequence.to_string();
    sha256_joined(&[
        entry_id,
        &sequence_str,
        pdo_id,
        pac_id,
        payload_hash,
        previous_entry_hash,
        recorded_at,
    ])
}

#[derive(Default)]
struct LedgerState {
    entries: Vec<LedgerEntry>,
    // Last-write-wins indices, mirroring `pdo_ledger.py`'s plain dict
    // assignment (`self._by_pdo_id[pdo_id] = entry`): a lookup returns the
    // most recent entry for that key, not a uniqueness guarantee.
    by_pdo_id: HashMap<String, usize>,
    by_pac_id: HashMap<String, usize>,
}

/// Hash-chained, append-only ledger.
pub struct Ledger {
    state: Mutex<LedgerState>,
}

/// Capability seam so `settlement`/state-machine code can be tested against
/// a ledger that fails on demand (INV-SETTLEMENT-004's "ledger append
/// failure aborts the operation" is otherwise unreachable against an
/// in-memory structure that never legitimately fails to append).
pub trait LedgerPort {
    fn append(
        &self,
        entry_type: &str,
        pdo_id: Option<&str>,
        pac_id: Option<&str>,
        payload_hash: &str,
        clock: &dyn Clock,
    ) -> Result<LedgerEntry, LedgerError>;
}

impl LedgerPort for Ledger {
    fn append(
        &self,
        entry_type: &str,
        pdo_id: Option<&str>,
        pac_id: Option<&str>,
        payload_hash: &str,
        clock: &dyn Clock,
    ) -> Result<LedgerEntry, LedgerError> {
        Ledger::append(self, entry_type, pdo_id, pac_id, payload_hash, clock)
    }
}

impl Default for Ledger {
    fn default() -> Self {
        Self::new()
    }
}

impl Ledger {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(LedgerState::default()),
        }
    }

    /// Shared append path. `ber_id`/`wrap_id`/`outcome_status`/`issuer`/
    /// `proof_hash`/`decision_hash`/`outcome_hash`/`pdo_created_at` are only
    /// populated by `append_pdo`; every other entry type leaves them `None`.
    #[allow(clippy::too_many_arguments)]
    fn append_entry(
        &self,
        entry_type: &str,
        pdo_id: Option<&str>,
        pac_id: Option<&str>,
        ber_id: Option<&str>,
        wrap_id: Option<&str>,
        outcome_status: Option<&str>,
        issuer: Option<&str>,
        payload_hash: &str,
        proof_hash: Option<&str>,
        decision_hash: Option<&str>,
        outcome_hash: Option<&str>,
        pdo_created_at: Option<&str>,
        clock: &dyn Clock,
    ) -> Result<LedgerEntry, LedgerError> {
        let mut state = self.state.lock().expect("ledger mutex poisoned");

        let sequence = state.entries.len() as u64;
        let previous_entry_hash = state
            .entries
            .last()
            .map(|e| e.entry_hash.clone())
            .unwrap_or_else(|| GENESIS_HASH.to_string());
        let recorded_at = clock.now_rfc3339();
        let entry_id = format!("ledger_{}", uuid::Uuid::new_v4().simple());

        let entry_hash = compute_entry_hash(
            &entry_id,
            sequence,
            pdo_id.unwrap_or(""),
            pac_id.unwrap_or(""),
            payload_hash,
            &previous_entry_hash,
            &recorded_at,
        );

        let entry = LedgerEntry {
            entry_id,
            sequence,
            entry_type: entry_type.to_string(),
            pdo_id: pdo_id.map(str::to_string),
            pac_id: pac_id.map(str::to_string),
            ber_id: ber_id.map(str::to_string),
            wrap_id: wrap_id.map(str::to_string),
            outcome_status: outcome_status.map(str::to_string),
            issuer: issuer.map(str::to_string),
            payload_hash: payload_hash.to_string(),
            proof_hash: proof_hash.map(str::to_string),
            decision_hash: decision_hash.map(str::to_string),
            outcome_hash: outcome_hash.map(str::to_string),
            pdo_created_at: pdo_created_at.map(str::to_string),
            previous_entry_hash,
            entry_hash,
            recorded_at,
            ledger_version: LEDGER_VERSION.to_string(),
        };

        let index = state.entries.len();
        if let Some(id) = &entry.pdo_id {
            state.by_pdo_id.insert(id.clone(), index);
        }
        if let Some(id) = &entry.pac_id {
            state.by_pac_id.insert(id.clone(), index);
        }
        state.entries.push(entry.clone());
        Ok(entry)
    }

    /// Append a generic entry. `pdo_id`/`pac_id` are optional — non-PDO
    /// entries (SCRAM audit anchors, settlement transitions) may omit
    /// either or both.
    pub fn append(
        &self,
        entry_type: &str,
        pdo_id: Option<&str>,
        pac_id: Option<&str>,
        payload_hash: &str,
        clock: &dyn Clock,
    ) -> Result<LedgerEntry, LedgerError> {
        self.append_entry(
            entry_type, pdo_id, pac_id, None, None, None, None, payload_hash, None, None, None, None, clock,
        )
    }

    /// Convenience wrapper anchoring a full PDO artifact, matching
    /// `pdo_ledger.py`'s `append_pdo(pdo)` — every PDO-specific field
    /// (`ber_id`, `wrap_id`, `outcome_status`, `issuer`, `proof_hash`,
    /// `decision_hash`, `outcome_hash`, `pdo_created_at`) is carried onto
    /// the entry.
    pub fn append_pdo(&self, pdo: &PdoArtifact, clock: &dyn Clock) -> Result<LedgerEntry, LedgerError> {
        self.append_entry(
            "PDO_ANCHOR",
            Some(&pdo.pdo_id),
            Some(&pdo.pac_id),
            Some(&pdo.ber_id),
            Some(&pdo.wrap_id),
            Some(pdo.outcome_status.as_str()),
            Some(&pdo.issuer),
            &pdo.pdo_hash,
            Some(&pdo.proof_hash),
            Some(&pdo.decision_hash),
            Some(&pdo.outcome_hash),
            Some(&pdo.created_at),
            clock,
        )
    }

    /// Ledger entries are immutable once appended.
    pub fn update(&self, _sequence: u64) -> Result<(), LedgerError> {
        Err(LedgerError::MutationForbidden)
    }

    /// Ledger entries are immutable once appended.
    pub fn delete(&self, _sequence: u64) -> Result<(), LedgerError> {
        Err(LedgerError::MutationForbidden)
    }

    pub fn get_by_pdo_id(&self, pdo_id: &str) -> Option<LedgerEntry> {
        let state = self.state.lock().expect("ledger mutex poisoned");
        state.by_pdo_id.get(pdo_id).map(|&i| state.entries[i].clone())
    }

    pub fn get_by_pac_id(&self, pac_id: &str) -> Option<LedgerEntry> {
        let state = self.state.lock().expect("ledger mutex poisoned");
        state.by_pac_id.get(pac_id).map(|&i| state.entries[i].clone())
    }

    pub fn len(&self) -> usize {
        self.state.lock().expect("ledger mutex poisoned").entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Walk the full chain verifying each entry's `entry_hash` recomputes
    /// correctly and that `previous_entry_hash` matches the prior entry
    /// (or `GENESIS_HASH` for the first entry).
    pub fn verify_chain(&self) -> Result<(), LedgerError> {
        let state = self.state.lock().expect("ledger mutex poisoned");
        let mut expected_previous = GENESIS_HASH.to_string();
        for (index, entry) in state.entries.iter().enumerate() {
            if entry.previous_entry_hash != expected_previous {
                return Err(LedgerError::ChainBroken { index });
            }
            let recomputed = compute_entry_hash(
                &entry.entry_id,
                entry.sequence,
                entry.pdo_id.as_deref().unwrap_or(""),
                entry.pac_id.as_deref().unwrap_or(""),
                &entry.payload_hash,
                &entry.previous_entry_hash,
                &entry.recorded_at,
            );
            if recomputed != entry.entry_hash {
                return Err(LedgerError::ChainBroken { index });
            }
            expected_previous = entry.entry_hash.clone();
        }
        Ok(())
    }

    /// Export the full chain as an audit document:
    /// `{ledger_version, entry_count, exported_at, entries:[...]}`, matching
    /// `pdo_ledger.py`'s `export_json`.
    pub fn export_json(&self, clock: &dyn Clock) -> serde_json::Value {
        let state = self.state.lock().expect("ledger mutex poisoned");
        serde_json::json!({
            "ledger_version": LEDGER_VERSION,
            "entry_count": state.entries.len(),
            "exported_at": clock.now_rfc3339(),
            "entries": state.entries,
        })
    }

    /// Rebuild a ledger from a previously exported document (the shape
    /// `export_json` produces). Validates dense, monotonic sequencing
    /// before trusting the entries; a caller should still run
    /// `verify_chain` afterward to check the hash chain itself.
    pub fn reconstruct(export: serde_json::Value) -> Result<Self, LedgerError> {
        let entries = export
            .get("entries")
            .cloned()
            .ok_or(LedgerError::ExportMalformed)?;
        let entries: Vec<LedgerEntry> =
            serde_json::from_value(entries).map_err(|_| LedgerError::ExportMalformed)?;

        let mut by_pdo_id = HashMap::new();
        let mut by_pac_id = HashMap::new();
        for (index, entry) in entries.iter().enumerate() {
            if entry.sequence != index as u64 {
                return Err(LedgerError::OrderingViolation {
                    index,
                    found: entry.sequence,
                    expected: index as u64,
                });
            }
            if let Some(id) = &entry.pdo_id {
                by_pdo_id.insert(id.clone(), index);
            }
            if let Some(id) = &entry.pac_id {
                by_pac_id.insert(id.clone(), index);
            }
        }
        Ok(Self {
            state: Mutex::new(LedgerState { entries, by_pdo_id, by_pac_id }),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SystemClock;

    #[test]
    fn first_entry_chains_to_genesis() {
        let ledger = Ledger::new();
        let clock = SystemClock;
        let entry = ledger
            .append("PDO_ANCHOR", Some("pdo_1"), Some("PAC-1"), "deadbeef", &clock)
            .unwrap();
        assert_eq!(entry.previous_entry_hash, GENESIS_HASH);
        assert_eq!(entry.sequence, 0);
        assert!(!entry.entry_id.is_empty());
    }

    #[test]
    fn chain_links_entries_in_sequence() {
        let ledger = Ledger::new();
        let clock = SystemClock;
        let first = ledger
            .append("PDO_ANCHOR", Some("pdo_1"), Some("PAC-1"), "hash1", &clock)
            .unwrap();
        let second = ledger
            .append("PDO_ANCHOR", Some("pdo_2"), Some("PAC-2"), "hash2", &clock)
            .unwrap();
        assert_eq!(second.previous_entry_hash, first.entry_hash);
        assert!(ledger.verify_chain().is_ok());
    }

    #[test]
    fn a_pdo_id_may_anchor_more_than_one_entry() {
        // Settlement/milestone transitions anchor further entries against a
        // pdo_id that was already used for the PDO's own anchor entry; the
        // by_pdo_id index just follows the latest one, it does not reject.
        let ledger = Ledger::new();
        let clock = SystemClock;
        ledger
            .append("PDO_ANCHOR", Some("pdo_1"), Some("PAC-1"), "hash1", &clock)
            .unwrap();
        let second = ledger
            .append("SETTLEMENT_INITIATED", Some("pdo_1"), None, "hash2", &clock)
            .unwrap();
        assert_eq!(ledger.len(), 2);
        assert_eq!(ledger.get_by_pdo_id("pdo_1").unwrap().sequence, second.sequence);
    }

    #[test]
    fn append_pdo_carries_the_full_pdo_specific_field_set() {
        let ledger = Ledger::new();
        let clock = SystemClock;
        let wrap = serde_json::json!({"status": "COMPLETE"});
        let ber = serde_json::json!({"status": "APPROVE"});
        let proof_hash = crate::pdo::compute_proof_hash(&wrap);
        let decision_hash = crate::pdo::compute_decision_hash(&proof_hash, &ber);
        let pdo = crate::pdo::PdoArtifactFactory::create(
            crate::pdo::PdoMintRequest {
                pac_id: "PAC-1".to_string(),
                wrap_id: "W1".to_string(),
                ber_id: "B1".to_string(),
                issuer: crate::pdo::PDO_AUTHORITY.to_string(),
                proof_hash,
                decision_hash,
                outcome_status: crate::pdo::OutcomeStatus::Accepted,
            },
            &clock,
        )
        .unwrap();

        let entry = ledger.append_pdo(&pdo, &clock).unwrap();
        assert_eq!(entry.ber_id.as_deref(), Some("B1"));
        assert_eq!(entry.wrap_id.as_deref(), Some("W1"));
        assert_eq!(entry.outcome_status.as_deref(), Some("ACCEPTED"));
        assert_eq!(entry.issuer.as_deref(), Some(crate::pdo::PDO_AUTHORITY));
        assert_eq!(entry.proof_hash.as_deref(), Some(pdo.proof_hash.as_str()));
        assert_eq!(entry.decision_hash.as_deref(), Some(pdo.decision_hash.as_str()));
        assert_eq!(entry.outcome_hash.as_deref(), Some(pdo.outcome_hash.as_str()));
        assert_eq!(entry.pdo_created_at.as_deref(), Some(pdo.created_at.as_str()));
        assert_eq!(entry.ledger_version, LEDGER_VERSION);
    }

    #[test]
    fn reconstruct_from_export_passes_verify_chain() {
        let ledger = Ledger::new();
        let clock = SystemClock;
        ledger.append("PDO_ANCHOR", Some("pdo_1"), Some("PAC-1"), "hash1", &clock).unwrap();
        ledger.append("PDO_ANCHOR", Some("pdo_2"), Some("PAC-2"), "hash2", &clock).unwrap();

        let exported = ledger.export_json(&clock);
        assert_eq!(exported["ledger_version"], LEDGER_VERSION);
        assert_eq!(exported["entry_count"], 2);

        let rebuilt = Ledger::reconstruct(exported).unwrap();
        assert!(rebuilt.verify_chain().is_ok());
        assert_eq!(rebuilt.len(), 2);
    }

    #[test]
    fn reconstruct_rejects_out_of_order_sequence() {
        let ledger = Ledger::new();
        let clock = SystemClock;
        ledger.append("PDO_ANCHOR", Some("pdo_1"), Some("PAC-1"), "hash1", &clock).unwrap();
        let mut exported = ledger.export_json(&clock);
        exported["entries"][0]["sequence"] = serde_json::json!(7);
        let err = Ledger::reconstruct(exported).unwrap_err();
        assert!(matches!(err, LedgerError::OrderingViolation { .. }));
    }

    #[test]
    fn reconstruct_rejects_a_document_with_no_entries_field() {
        let err = Ledger::reconstruct(serde_json::json!({"not": "an export"})).unwrap_err();
        assert!(matches!(err, LedgerError::ExportMalformed));
    }

    #[test]
    fn mutation_is_always_forbidden() {
        let ledger = Ledger::new();
        assert!(matches!(ledger.update(0), Err(LedgerError::MutationForbidden)));
        assert!(matches!(ledger.delete(0), Err(LedgerError::MutationForbidden)));
    }

    #[test]
    fn verify_chain_detects_tampering() {
        let ledger = Ledger::new();
        let clock = SystemClock;
        ledger
            .append("PDO_ANCHOR", Some("pdo_1"), Some("PAC-1"), "hash1", &clock)
            .unwrap();
        {
            let mut state = ledger.state.lock().unwrap();
            state.entries[0].payload_hash = "tampered".to_string();
        }
        assert!(matches!(
            ledger.verify_chain(),
            Err(LedgerError::ChainBroken { index: 0 })
        ));
    }

    #[test]
    fn export_json_wraps_entries_in_the_audit_envelope() {
        let ledger = Ledger::new();
        let clock = SystemClock;
        ledger
            .append("PDO_ANCHOR", Some("pdo_1"), Some("PAC-1"), "hash1", &clock)
            .unwrap();
        let exported = ledger.export_json(&clock);
        assert_eq!(exported["entries"].as_array().unwrap().len(), 1);
        assert!(exported["exported_at"].is_string());
    }
}
