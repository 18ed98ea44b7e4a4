//! PDO execution gate (C5): the fail-closed chokepoint all three gates sit
//! behind.
//!
//! Three sequential gates: GATE-PROOF (a WRAP/proof must exist), GATE-DECISION
//! (a BER/decision must exist and reference the proof), GATE-PDO (a minted,
//! chain-verified PDO must exist before a governed side effect runs).
//! `execute_with_pdo` is the composition of the first two: it runs
//! GATE-PROOF then GATE-DECISION and only then mints the PDO itself, so a
//! PDO can never come into existence without having passed both. `run_gated`
//! is the separate, narrower helper for code that already holds a minted
//! PDO and just wants GATE-PDO around a closure. Every evaluation — pass or
//! block — is recorded for `export_audit_trail`.

use crate::pdo::{PdoArtifact, PdoError, PdoRegistry};
use serde::{Deserialize, Serialize};
use std::sync::Mutex;

/// Closed set of reasons a gate evaluation can be blocked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GateBlockReason {
    NoProof,
    InvalidProof,
    NoDecision,
    InvalidDecision,
    ProofHashMismatch,
    DecisionNotApproved,
    NoPdo,
    PdoChainInvalid,
    PdoPacMismatch,
    PdoAuthorityViolation,
    PdoNotEmitted,
    ExecutionDenied,
}

impl GateBlockReason {
    pub const fn as_str(self) -> &'static str {
        match self {
            GateBlockReason::NoProof => "NO_PROOF",
            GateBlockReason::InvalidProof => "INVALID_PROOF",
            GateBlockReason::NoDecision => "NO_DECISION",
            GateBlockReason::InvalidDecision => "INVALID_DECISION",
            GateBlockReason::ProofHashMismatch => "PROOF_HASH_MISMATCH",
            GateBlockReason::DecisionNotApproved => "DECISION_NOT_APPROVED",
            GateBlockReason::NoPdo => "NO_PDO",
            GateBlockReason::PdoChainInvalid => "PDO_CHAIN_INVALID",
            GateBlockReason::PdoPacMismatch => "PDO_PAC_MISMATCH",
            GateBlockReason::PdoAuthorityViolation => "PDO_AUTHORITY_VIOLATION",
            GateBlockReason::PdoNotEmitted => "PDO_NOT_EMITTED",
            GateBlockReason::ExecutionDenied => "EXECUTION_DENIED",
        }
    }
}

/// Errors raised by the gate's checking functions.
#[derive(Debug, thiserror::Error)]
pub enum GateError {
    #[error("proof gate blocked: {0:?}")]
    ProofGateBlocked(GateBlockReason),

    #[error("decision gate blocked: {0:?}")]
    DecisionGateBlocked(GateBlockReason),

    #[error("pdo gate blocked: {0:?}")]
    PdoGateBlocked(GateBlockReason),

    #[error("pdo minting failed after both gates passed: {0}")]
    PdoMintFailed(#[from] PdoError),
}

/// Minimal proof container: the WRAP payload. `wrap_data` is the raw WRAP
/// content `execute_with_pdo` hashes into `proof_hash` when minting.
#[derive(Debug, Clone)]
pub struct ProofContainer {
    pub wrap_id: String,
    pub pac_id: String,
    pub status: String,
    pub wrap_data: serde_json::Value,
}

impl ProofContainer {
    fn is_complete(&self) -> bool {
        !self.wrap_id.is_empty() && !self.pac_id.is_empty() && self.status == "COMPLETE"
    }

    pub fn proof_hash(&self) -> String {
        crate::pdo::compute_proof_hash(&self.wrap_data)
    }
}

/// Minimal decision container: the BER payload. `ber_data` is the raw BER
/// content `execute_with_pdo` hashes, together with the proof hash it
/// decided against, into `decision_hash` when minting. `proof_hash` is the
/// hash of the proof this decision was made against; gate 2 rejects any
/// decision whose `proof_hash` doesn't byte-equal gate 1's output.
#[derive(Debug, Clone)]
pub struct DecisionContainer {
    pub ber_id: String,
    pub pac_id: String,
    pub proof_wrap_id: String,
    pub proof_hash: String,
    pub decision_status: String,
    pub ber_data: serde_json::Value,
}

impl DecisionContainer {
    fn is_complete(&self) -> bool {
        !self.ber_id.is_empty()
            && !self.pac_id.is_empty()
            && !self.proof_hash.is_empty()
            && !self.decision_status.is_empty()
    }

    pub fn is_approved(&self) -> bool {
        matches!(self.decision_status.as_str(), "APPROVE" | "APPROVED" | "ACCEPTED")
    }

    pub fn decision_hash(&self, proof_hash: &str) -> String {
        crate::pdo::compute_decision_hash(proof_hash, &self.ber_data)
    }
}

/// One recorded evaluation, whether it passed or blocked.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GateEvaluation {
    pub pac_id: String,
    pub gate: String,
    pub passed: bool,
    pub block_reason: Option<GateBlockReason>,
    pub evaluated_at: String,
}

/// The fail-closed execution chokepoint. Every method that can block
/// records a `GateEvaluation`; nothing executes without a prior passing
/// `GATE-PDO` evaluation.
pub struct PdoExecutionGate {
    evaluations: Mutex<Vec<GateEvaluation>>,
}

impl Default for PdoExecutionGate {
    fn default() -> Self {
        Self::new()
    }
}

impl PdoExecutionGate {
    pub fn new() -> Self {
        Self {
            evaluations: Mutex::new(Vec::new()),
        }
    }

    fn record(&self, pac_id: &str, gate: &str, passed: bool, reason: Option<GateBlockReason>, clock: &dyn crate::clock::Clock) {
        let evaluation = GateEvaluation {
            pac_id: pac_id.to_string(),
            gate: gate.to_string(),
            passed,
            block_reason: reason,
            evaluated_at: clock.now_rfc3339(),
        };
        if passed {
            tracing::info!(pac_id = %pac_id, gate = %gate, "gate evaluation passed");
        } else {
            tracing::warn!(pac_id = %pac_id, gate = %gate, reason = ?reason, "gate evaluation blocked");
        }
        self.evaluations.lock().expect("gate mutex poisoned").push(evaluation);
    }

    /// GATE-PROOF: a complete WRAP must exist for the PAC.
    pub fn require_proof(&self, proof: Option<&ProofContainer>, pac_id: &str, clock: &dyn crate::clock::Clock) -> Result<(), GateError> {
        let Some(proof) = proof else {
            self.record(pac_id, "GATE-PROOF", false, Some(GateBlockReason::NoProof), clock);
            return Err(GateError::ProofGateBlocked(GateBlockReason::NoProof));
        };
        if !proof.is_complete() {
            self.record(pac_id, "GATE-PROOF", false, Some(GateBlockReason::InvalidProof), clock);
            return Err(GateError::ProofGateBlocked(GateBlockReason::InvalidProof));
        }
        self.record(pac_id, "GATE-PROOF", true, None, clock);
        Ok(())
    }

    /// GATE-DECISION: a complete BER must exist and reference the proof
    /// that passed GATE-PROOF.
    pub fn require_decision(
        &self,
        decision: Option<&DecisionContainer>,
        proof: &ProofContainer,
        pac_id: &str,
        clock: &dyn crate::clock::Clock,
    ) -> Result<(), GateError> {
        let Some(decision) = decision else {
            self.record(pac_id, "GATE-DECISION", false, Some(GateBlockReason::NoDecision), clock);
            return Err(GateError::DecisionGateBlocked(GateBlockReason::NoDecision));
        };
        if !decision.is_complete() {
            self.record(pac_id, "GATE-DECISION", false, Some(GateBlockReason::InvalidDecision), clock);
            return Err(GateError::DecisionGateBlocked(GateBlockReason::InvalidDecision));
        }
        if decision.proof_hash != proof.proof_hash() {
            self.record(pac_id, "GATE-DECISION", false, Some(GateBlockReason::ProofHashMismatch), clock);
            return Err(GateError::DecisionGateBlocked(GateBlockReason::ProofHashMismatch));
        }
        if !matches!(decision.decision_status.as_str(), "APPROVE" | "APPROVED" | "ACCEPTED") {
            self.record(pac_id, "GATE-DECISION", false, Some(GateBlockReason::DecisionNotApproved), clock);
            return Err(GateError::DecisionGateBlocked(GateBlockReason::DecisionNotApproved));
        }
        self.record(pac_id, "GATE-DECISION", true, None, clock);
        Ok(())
    }

    /// GATE-PDO: a minted, chain-verified PDO bound to `pac_id` must exist
    /// in the registry.
    pub fn require_pdo(&self, registry: &PdoRegistry, pac_id: &str, clock: &dyn crate::clock::Clock) -> Result<PdoArtifact, GateError> {
        let Some(pdo) = registry.get_by_pac_id(pac_id) else {
            self.record(pac_id, "GATE-PDO", false, Some(GateBlockReason::NoPdo), clock);
            return Err(GateError::PdoGateBlocked(GateBlockReason::NoPdo));
        };
        if pdo.pac_id != pac_id {
            self.record(pac_id, "GATE-PDO", false, Some(GateBlockReason::PdoPacMismatch), clock);
            return Err(GateError::PdoGateBlocked(GateBlockReason::PdoPacMismatch));
        }
        if pdo.issuer != crate::pdo::PDO_AUTHORITY {
            self.record(pac_id, "GATE-PDO", false, Some(GateBlockReason::PdoAuthorityViolation), clock);
            return Err(GateError::PdoGateBlocked(GateBlockReason::PdoAuthorityViolation));
        }
        if !pdo.verify_pdo_chain() {
            self.record(pac_id, "GATE-PDO", false, Some(GateBlockReason::PdoChainInvalid), clock);
            return Err(GateError::PdoGateBlocked(GateBlockReason::PdoChainInvalid));
        }
        self.record(pac_id, "GATE-PDO", true, None, clock);
        Ok(pdo.clone())
    }

    /// Utility used by settlement to enforce INV-SETTLEMENT-001. Looks up
    /// by `pdo_id` first, then falls back to `pac_id`; a PDO found only via
    /// the PAC fallback whose `pdo_id` doesn't match the requested one is
    /// `PDO_NOT_EMITTED` rather than `PDO_MISSING` — the PAC has *a* PDO,
    /// just not the one the caller is trying to settle against.
    pub fn verify_pdo_exists(
        &self,
        registry: &PdoRegistry,
        pdo_id: &str,
        pac_id: &str,
        clock: &dyn crate::clock::Clock,
    ) -> Result<PdoArtifact, GateError> {
        let pdo = registry
            .get_by_pdo_id(pdo_id)
            .or_else(|| registry.get_by_pac_id(pac_id));

        let Some(pdo) = pdo else {
            self.record(pac_id, "GATE-PDO-FINAL", false, Some(GateBlockReason::NoPdo), clock);
            return Err(GateError::PdoGateBlocked(GateBlockReason::NoPdo));
        };
        if pdo.pdo_id != pdo_id {
            self.record(pac_id, "GATE-PDO-FINAL", false, Some(GateBlockReason::PdoNotEmitted), clock);
            return Err(GateError::PdoGateBlocked(GateBlockReason::PdoNotEmitted));
        }
        self.record(pac_id, "GATE-PDO-FINAL", true, None, clock);
        Ok(pdo.clone())
    }

    /// Run `action` only if a valid PDO exists for `pac_id`. For code that
    /// already holds a minted PDO and just wants a yes/no gate around a
    /// closure; it composes `require_pdo` with the guarded operation.
    pub fn run_gated<T>(
        &self,
        registry: &PdoRegistry,
        pac_id: &str,
        clock: &dyn crate::clock::Clock,
        action: impl FnOnce(&PdoArtifact) -> T,
    ) -> Result<T, GateError> {
        let pdo = self.require_pdo(registry, pac_id, clock)?;
        Ok(action(&pdo))
    }

    /// Mint a PDO from a validated proof/decision pair, enforcing
    /// GATE-PROOF then GATE-DECISION first: a PDO can never be minted
    /// without both having passed. `outcome_status` is `ACCEPTED` iff the
    /// decision was approved, `CORRECTIVE` otherwise (the latter is
    /// presently unreachable, since `require_decision` already blocks
    /// unapproved decisions before the mint is attempted). Registers the
    /// minted PDO into `registry` when `persist` is true.
    pub fn execute_with_pdo(
        &self,
        registry: &mut PdoRegistry,
        proof: &ProofContainer,
        decision: &DecisionContainer,
        issuer: &str,
        persist: bool,
        clock: &dyn crate::clock::Clock,
    ) -> Result<PdoArtifact, GateError> {
        let pac_id = proof.pac_id.clone();
        self.require_proof(Some(proof), &pac_id, clock)?;
        let proof_hash = proof.proof_hash();

        self.require_decision(Some(decision), proof, &pac_id, clock)?;
        let decision_hash = decision.decision_hash(&proof_hash);

        let outcome_status = if decision.is_approved() {
            crate::pdo::OutcomeStatus::Accepted
        } else {
            crate::pdo::OutcomeStatus::Corrective
        };

        let pdo = crate::pdo::PdoArtifactFactory::create(
            crate::pdo::PdoMintRequest {
                pac_id,
                wrap_id: proof.wrap_id.clone(),
                ber_id: decision.ber_id.clone(),
                issuer: issuer.to_string(),
                proof_hash,
                decision_hash,
                outcome_status,
            },
            clock,
        )?;

        if persist {
            registry.register(pdo.clone())?;
        }

        Ok(pdo)
    }

    pub fn get_evaluations(&self) -> Vec<GateEvaluation> {
        self.evaluations.lock().expect("gate mutex poisoned").clone()
    }

    pub fn get_blocked_evaluations(&self) -> Vec<GateEvaluation> {
        self.evaluations
            .lock()
            .expect("gate mutex poisoned")
            .iter()
            .filter(|e| !e.passed)
            .cloned()
            .collect()
    }

    pub fn export_audit_trail(&self) -> serde_json::Value {
        serde_json::to_value(self.get_evaluations()).expect("evaluations are always serializable")
    }
}
