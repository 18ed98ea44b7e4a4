//! PDO Artifact & Registry (C3).
//!
//! A PDO (Proof-Decision-Outcome) is the terminal, byte-frozen artifact
//! binding a WRAP (proof) and a BER (decision). `PdoArtifactFactory::create`
//! is the only legitimate minter.

use crate::clock::Clock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// The single identifier permitted to mint PDOs.
pub const PDO_AUTHORITY: &str = "GID-00";

/// Closed set of outcome classifications a PDO may carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OutcomeStatus {
    Accepted,
    Corrective,
    Rejected,
}

impl OutcomeStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            OutcomeStatus::Accepted => "ACCEPTED",
            OutcomeStatus::Corrective => "CORRECTIVE",
            OutcomeStatus::Rejected => "REJECTED",
        }
    }
}

impl std::fmt::Display for OutcomeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Errors raised while minting or registering a PDO.
#[derive(Debug, thiserror::Error)]
pub enum PdoError {
    #[error("AUTHORITY_VIOLATION: issuer '{actual}' is not the PDO authority")]
    AuthorityViolation { actual: String },

    #[error("INCOMPLETE: required field '{field}' is empty")]
    Incomplete { field: &'static str },

    #[error("INVALID_OUTCOME: '{value}' is not a recognized outcome status")]
    InvalidOutcome { value: String },

    #[error("DUPLICATE: a PDO already exists for pac_id '{pac_id}'")]
    DuplicatePacId { pac_id: String },

    #[error("DUPLICATE: pdo_id '{pdo_id}' already registered")]
    DuplicatePdoId { pdo_id: String },

    #[error("PDO_NOT_FOUND: no PDO for key '{key}'")]
    NotFound { key: String },
}

/// Inputs required to mint a PDO: an explicit builder with concrete
/// fields, no attribute reflection.
#[derive(Debug, Clone)]
pub struct PdoMintRequest {
    pub pac_id: String,
    pub wrap_id: String,
    pub ber_id: String,
    pub issuer: String,
    pub proof_hash: String,
    pub decision_hash: String,
    pub outcome_status: OutcomeStatus,
}

/// Immutable, byte-frozen PDO artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PdoArtifact {
    pub pdo_id: String,
    pub pac_id: String,
    pub wrap_id: String,
    pub ber_id: String,
    pub issuer: String,
    pub proof_hash: String,
    pub decision_hash: String,
    pub outcome_hash: String,
    pub pdo_hash: String,
    pub proof_at: String,
    pub decision_at: String,
    pub outcome_at: String,
    pub created_at: String,
    pub outcome_status: OutcomeStatus,
}

impl PdoArtifact {
    /// Recompute the hash chain from the artifact's own fields and compare
    /// to the stored values. Checks structure and hex format only — does
    /// not require the original wrap/ber payloads.
    pub fn verify_pdo_chain(&self) -> bool {
        if self.issuer != PDO_AUTHORITY {
            return false;
        }
        let expected_outcome_hash = compute_outcome_hash(
            &self.decision_hash,
            self.outcome_status,
            &self.outcome_at,
        );
        if expected_outcome_hash != self.outcome_hash {
            return false;
        }
        let expected_pdo_hash = compute_pdo_hash(
            &self.outcome_hash,
            &self.pdo_id,
            &self.pac_id,
            &self.issuer,
            &self.created_at,
        );
        expected_pdo_hash == self.pdo_hash
            && self.proof_hash.len() == crate::hashing::SHA256_HEX_LEN
            && self.decision_hash.len() == crate::hashing::SHA256_HEX_LEN
    }

    /// Recompute every hash in the chain from the original wrap/ber data
    /// and compare, rather than trusting the stored intermediate hashes.
    pub fn verify_pdo_full(&self, wrap_data: &serde_json::Value, ber_data: &serde_json::Value) -> bool {
        let proof_hash = compute_proof_hash(wrap_data);
        if proof_hash != self.proof_hash {
            return false;
        }
        let decision_hash = compute_decision_hash(&proof_hash, ber_data);
        if decision_hash != self.decision_hash {
            return false;
        }
        self.verify_pdo_chain()
    }
}

/// `H(wrap_data)`.
pub fn compute_proof_hash(wrap_data: &serde_json::Value) -> String {
    crate::hashing::sha256_of_value(wrap_data)
}

/// `H(proof_hash ∥ ber_data)`.
pub fn compute_decision_hash(proof_hash: &str, ber_data: &serde_json::Value) -> String {
    let combined = serde_json::json!({ "proof_hash": proof_hash, "ber_data": ber_data });
    crate::hashing::sha256_of_value(&combined)
}

/// `H(decision_hash ∥ {outcome_status, outcome_at})`.
pub fn compute_outcome_hash(decision_hash: &str, outcome_status: OutcomeStatus, outcome_at: &str) -> String {
    let combined = serde_json::json!({
        "decision_hash": decision_hash,
        "outcome_status": outcome_status.as_str(),
        "outcome_at": outcome_at,
    });
    crate::hashing::sha256_of_value(&combined)
}

/// `H(outcome_hash ∥ {ids, issuer, created_at})`.
pub fn compute_pdo_hash(outcome_hash: &str, pdo_id: &str, pac_id: &str, issuer: &str, created_at: &str) -> String {
    let combined = serde_json::json!({
        "outcome_hash": outcome_hash,
        "pdo_id": pdo_id,
        "pac_id": pac_id,
        "issuer": issuer,
        "created_at": created_at,
    });
    crate::hashing::sha256_of_value(&combined)
}

/// Generic content hash helper used by call sites that need a stable hash
/// of an arbitrary JSON-serializable map.
pub fn compute_hash(value: &serde_json::Value) -> String {
    crate::hashing::sha256_of_value(value)
}

/// The only legitimate PDO minter.
pub struct PdoArtifactFactory;

impl PdoArtifactFactory {
    /// Mint a PDO from explicit fields, enforcing (in order): issuer
    /// authority, field completeness, outcome-status validity, then
    /// computes the full hash chain and returns an immutable value.
    pub fn create(req: PdoMintRequest, clock: &dyn Clock) -> Result<PdoArtifact, PdoError> {
        if req.issuer != PDO_AUTHORITY {
            return Err(PdoError::AuthorityViolation { actual: req.issuer });
        }

        for (name, value) in [
            ("pac_id", &req.pac_id),
            ("wrap_id", &req.wrap_id),
            ("ber_id", &req.ber_id),
            ("proof_hash", &req.proof_hash),
            ("decision_hash", &req.decision_hash),
        ] {
            if value.is_empty() {
                return Err(PdoError::Incomplete { field: field_name(name) });
            }
        }

        let now = clock.now_rfc3339();
        let pdo_id = format!("pdo_{}", uuid::Uuid::new_v4().simple());

        let outcome_hash = compute_outcome_hash(&req.decision_hash, req.outcome_status, &now);
        let pdo_hash = compute_pdo_hash(&outcome_hash, &pdo_id, &req.pac_id, &req.issuer, &now);

        Ok(PdoArtifact {
            pdo_id,
            pac_id: req.pac_id,
            wrap_id: req.wrap_id,
            ber_id: req.ber_id,
            issuer: req.issuer,
            proof_hash: req.proof_hash,
            decision_hash: req.decision_hash,
            outcome_hash,
            pdo_hash,
            proof_at: now.clone(),
            decision_at: now.clone(),
            outcome_at: now.clone(),
            created_at: now,
            outcome_status: req.outcome_status,
        })
    }

    /// Map a raw decision string to an `OutcomeStatus`. An unrecognized
    /// string is an explicit error rather than a silent default.
    pub fn map_decision_to_outcome(decision_status: &str) -> Result<OutcomeStatus, PdoError> {
        match decision_status {
            "APPROVE" | "ACCEPTED" => Ok(OutcomeStatus::Accepted),
            "CORRECTIVE" => Ok(OutcomeStatus::Corrective),
            "REJECT" | "REJECTED" => Ok(OutcomeStatus::Rejected),
            other => Err(PdoError::InvalidOutcome { value: other.to_string() }),
        }
    }
}

// "pac_id" -> &'static str without leaking the borrowed `name` lifetime.
fn field_name(name: &str) -> &'static str {
    match name {
        "pac_id" => "pac_id",
        "wrap_id" => "wrap_id",
        "ber_id" => "ber_id",
        "proof_hash" => "proof_hash",
        "decision_hash" => "decision_hash",
        _ => "field",
    }
}

/// In-memory, triple-indexed PDO registry: by `pac_id`, by `pdo_id`, and by
/// insertion order. Enforces uniqueness in both key spaces. Callers use
/// `Option` explicitly rather than relying on empty-collection
/// truthiness.
#[derive(Debug, Default)]
pub struct PdoRegistry {
    by_pac_id: HashMap<String, PdoArtifact>,
    by_pdo_id: HashMap<String, PdoArtifact>,
    order: Vec<String>, // pdo_ids in insertion order
}

impl PdoRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a PDO. Rejects duplicate `pac_id` or `pdo_id`.
    pub fn register(&mut self, pdo: PdoArtifact) -> Result<(), PdoError> {
        if self.by_pac_id.contains_key(&pdo.pac_id) {
            return Err(PdoError::DuplicatePacId { pac_id: pdo.pac_id });
        }
        if self.by_pdo_id.contains_key(&pdo.pdo_id) {
            return Err(PdoError::DuplicatePdoId { pdo_id: pdo.pdo_id });
        }
        self.order.push(pdo.pdo_id.clone());
        self.by_pac_id.insert(pdo.pac_id.clone(), pdo.clone());
        self.by_pdo_id.insert(pdo.pdo_id.clone(), pdo);
        Ok(())
    }

    pub fn get_by_pac_id(&self, pac_id: &str) -> Option<&PdoArtifact> {
        self.by_pac_id.get(pac_id)
    }

    pub fn get_by_pdo_id(&self, pdo_id: &str) -> Option<&PdoArtifact> {
        self.by_pdo_id.get(pdo_id)
    }

    pub fn require_by_pac_id(&self, pac_id: &str) -> Result<&PdoArtifact, PdoError> {
        self.get_by_pac_id(pac_id)
            .ok_or_else(|| PdoError::NotFound { key: pac_id.to_string() })
    }

    pub fn require_by_pdo_id(&self, pdo_id: &str) -> Result<&PdoArtifact, PdoError> {
        self.get_by_pdo_id(pdo_id)
            .ok_or_else(|| PdoError::NotFound { key: pdo_id.to_string() })
    }

    /// Iterate PDOs in insertion order.
    pub fn iter_in_order(&self) -> impl Iterator<Item = &PdoArtifact> {
        self.order.iter().filter_map(move |id| self.by_pdo_id.get(id))
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Clear all entries. Exists only for test reset.
    pub fn clear(&mut self) {
        self.by_pac_id.clear();
        self.by_pdo_id.clear();
        self.order.clear();
    }
}
