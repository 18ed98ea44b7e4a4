//! Integration tests driving a full `Kernel` instance through the
//! end-to-end scenarios (S1-S6), matching the literal inputs and expected
//! outputs a governed settlement pipeline must produce.

use chainbridge_pdo_kernel::clock::{Clock, SystemClock};
use chainbridge_pdo_kernel::config::KernelConfig;
use chainbridge_pdo_kernel::gate::{DecisionContainer, ProofContainer};
use chainbridge_pdo_kernel::ledger::{LedgerEntry, LedgerError, LedgerPort};
use chainbridge_pdo_kernel::pdo::OutcomeStatus;
use chainbridge_pdo_kernel::scram::{ScramKey, ScramKeyType, ScramReason};
use chainbridge_pdo_kernel::settlement::{SettlementError, SettlementRequest, SettlementStatus};
use chainbridge_pdo_kernel::signer::Ed25519SignerVerifier;
use chainbridge_pdo_kernel::voter::{AgentProof, ConsensusStatus, CoreType};
use chainbridge_pdo_kernel::{Kernel, KernelDeps};
use std::sync::Arc;

/// A ledger double whose `append` always fails, used to fault-inject a
/// settlement-initiation failure without relying on any accidental
/// collision in the real ledger's indices.
struct FailingLedger;
impl LedgerPort for FailingLedger {
    fn append(
        &self,
        _entry_type: &str,
        _pdo_id: Option<&str>,
        _pac_id: Option<&str>,
        _payload_hash: &str,
        _clock: &dyn Clock,
    ) -> Result<LedgerEntry, LedgerError> {
        Err(LedgerError::MutationForbidden)
    }
}

fn build_kernel(config: KernelConfig) -> Kernel {
    Kernel::new(KernelDeps {
        config,
        clock: Arc::new(SystemClock),
        signer: Arc::new(Ed25519SignerVerifier::generate()),
        critical_files: vec![],
        swarm_size: 100,
        diversity_drift_threshold: 0.15,
    })
}

fn mint_pdo(kernel: &Kernel, pac_id: &str) -> chainbridge_pdo_kernel::pdo::PdoArtifact {
    let proof = ProofContainer {
        wrap_id: "W1".to_string(),
        pac_id: pac_id.to_string(),
        status: "COMPLETE".to_string(),
        wrap_data: serde_json::json!({"status": "COMPLETE"}),
    };
    let decision = DecisionContainer {
        ber_id: "B1".to_string(),
        pac_id: pac_id.to_string(),
        proof_wrap_id: proof.wrap_id.clone(),
        proof_hash: proof.proof_hash(),
        decision_status: "APPROVE".to_string(),
        ber_data: serde_json::json!({"status": "APPROVE"}),
    };
    kernel
        .mint_pdo(&proof, &decision)
        .expect("mint should succeed for a well-formed request")
}

/// S1 — happy path: mint a PDO, pass it through the gate, initiate and
/// complete a settlement. Registry holds exactly one entry; the ledger
/// gains its first entry only once settlement initiation runs, one per
/// settlement state transition thereafter.
#[test]
fn s1_happy_path_settles_end_to_end() {
    let kernel = build_kernel(KernelConfig::default());
    let pdo = mint_pdo(&kernel, "PAC-1");
    assert_eq!(pdo.outcome_status, OutcomeStatus::Accepted);
    assert_eq!(kernel.ledger.len(), 0); // minting only registers, gate does not auto-append

    {
        let registry = kernel.registry.lock().unwrap();
        assert!(registry.get_by_pac_id("PAC-1").is_some());
        assert_eq!(registry.len(), 1);
    }

    let request = SettlementRequest {
        pac_id: "PAC-1".to_string(),
        pdo_id: pdo.pdo_id.clone(),
        settlement_id: "SETTLE-1".to_string(),
        amount: 1000.00,
        currency: "USD".to_string(),
    };
    let initiated = {
        let registry = kernel.registry.lock().unwrap();
        kernel
            .settlement
            .initiate_settlement(request, &kernel.gate, &registry, &kernel.ledger, kernel.clock.as_ref())
            .unwrap()
    };
    assert_eq!(initiated.status, SettlementStatus::Initiated);
    assert!(initiated.ledger_entry_id.is_some());
    assert!(kernel.ledger.len() > 1);

    let record = kernel.settlement.get_record("SETTLE-1").unwrap();
    assert_eq!(record.amount, 1000.00);
    assert_eq!(record.currency, "USD");

    let completed = {
        let registry = kernel.registry.lock().unwrap();
        kernel
            .settlement
            .complete_settlement("SETTLE-1", "PAC-1", &kernel.gate, &registry, &kernel.ledger, kernel.clock.as_ref())
            .unwrap()
    };
    assert_eq!(completed.status, SettlementStatus::Completed);
    assert!(completed.ledger_entry_id.is_some());
    kernel.ledger.verify_chain().expect("ledger must remain chain-valid");
}

/// S2 — settlement against a PDO that was never minted is rejected, and
/// leaves neither a settlement record nor a ledger entry behind.
#[test]
fn s2_settlement_requires_an_existing_pdo() {
    let kernel = build_kernel(KernelConfig::default());
    let request = SettlementRequest {
        pac_id: "pac_nonexistent".to_string(),
        pdo_id: "pdo_nonexistent".to_string(),
        settlement_id: "SETTLE-2".to_string(),
        amount: 1000.00,
        currency: "USD".to_string(),
    };
    let before = kernel.ledger.len();
    let err = {
        let registry = kernel.registry.lock().unwrap();
        kernel
            .settlement
            .initiate_settlement(request, &kernel.gate, &registry, &kernel.ledger, kernel.clock.as_ref())
            .unwrap_err()
    };
    assert!(matches!(err, SettlementError::PdoRequired(_)));
    assert_eq!(kernel.ledger.len(), before);
    assert!(kernel.settlement.get_record("SETTLE-2").is_none());
}

/// S3 — a ledger append failure during settlement initiation aborts the
/// operation and leaves no settlement record. Triggered here by swapping in
/// a ledger double whose `append` always raises.
#[test]
fn s3_ledger_append_failure_aborts_settlement_initiation() {
    let kernel = build_kernel(KernelConfig::default());
    let pdo = mint_pdo(&kernel, "PAC-3");
    let failing_ledger = FailingLedger;

    let request = SettlementRequest {
        pac_id: "PAC-3".to_string(),
        pdo_id: pdo.pdo_id.clone(),
        settlement_id: "SETTLE-3A".to_string(),
        amount: 500.00,
        currency: "USD".to_string(),
    };
    let err = {
        let registry = kernel.registry.lock().unwrap();
        kernel
            .settlement
            .initiate_settlement(request, &kernel.gate, &registry, &failing_ledger, kernel.clock.as_ref())
            .unwrap_err()
    };
    assert!(matches!(err, SettlementError::LedgerFailure(_)));
    assert!(kernel.settlement.get_record("SETTLE-3A").is_none());
}

/// S4 — a 100-agent swarm with 34% Byzantine (invalid) agents still reaches
/// quorum at exactly the threshold, and every invalid agent is reported.
#[test]
fn s4_byzantine_quorum_with_34_percent_traitors() {
    let kernel = build_kernel(KernelConfig::default());
    assert_eq!(kernel.voter.threshold(), 67);

    let mut proofs: Vec<AgentProof> = (0..34)
        .map(|i| AgentProof {
            agent_id: format!("lattice-{i}"),
            core_type: CoreType::Lattice,
            valid: true,
            fips_204_compliant: true,
            fips_203_compliant: true,
            timestamp: kernel.clock.now_rfc3339(),
        })
        .collect();
    proofs.extend((0..33).map(|i| AgentProof {
        agent_id: format!("heuristic-{i}"),
        core_type: CoreType::Heuristic,
        valid: true,
        fips_204_compliant: true,
        fips_203_compliant: true,
        timestamp: kernel.clock.now_rfc3339(),
    }));
    proofs.extend((0..34).map(|i| AgentProof {
        agent_id: format!("byzantine-{i}"),
        core_type: CoreType::Lattice,
        valid: false,
        fips_204_compliant: false,
        fips_203_compliant: false,
        timestamp: kernel.clock.now_rfc3339(),
    }));

    let result = kernel.voter.verify_consensus(&proofs, true, &kernel.scram);
    assert_eq!(result.status, ConsensusStatus::SovereignConsensusReached);
    assert_eq!(result.quorum_count, 67);
    assert_eq!(result.byzantine_agents.len(), 34);
}

/// S5 — a dual-key-authorized SCRAM activation completes within the 500 ms
/// deadline with no failed invariants, and every subsequent voter call is
/// fail-closed (`SCRAM_ABORT`) regardless of input.
#[test]
fn s5_scram_activation_completes_and_blocks_subsequent_consensus() {
    let kernel = build_kernel(KernelConfig::default());
    let now = kernel.clock.now_rfc3339();

    kernel.scram.authorize_key(
        Some(ScramKey {
            key_id: "op-1".to_string(),
            key_type: ScramKeyType::Operator,
            key_hash: "hash-operator".to_string(),
            issued_at: now.clone(),
            expires_at: None,
        }),
        &now,
    );
    kernel.scram.authorize_key(
        Some(ScramKey {
            key_id: "arch-1".to_string(),
            key_type: ScramKeyType::Architect,
            key_hash: "hash-architect".to_string(),
            issued_at: now.clone(),
            expires_at: None,
        }),
        &now,
    );

    let event = kernel
        .scram
        .activate(&[], ScramReason::ManualOperator, serde_json::json!({}), &kernel.ledger, kernel.clock.as_ref());

    assert_eq!(event.scram_state, "COMPLETE");
    assert!(event.invariants_failed.is_empty());
    assert!(event.termination_latency_ms < 500);

    let proofs: Vec<AgentProof> = (0..10)
        .map(|i| AgentProof {
            agent_id: format!("agent-{i}"),
            core_type: CoreType::Lattice,
            valid: true,
            fips_204_compliant: true,
            fips_203_compliant: true,
            timestamp: kernel.clock.now_rfc3339(),
        })
        .collect();
    let consensus = kernel.voter.verify_consensus(&proofs, true, &kernel.scram);
    assert_eq!(consensus.status, ConsensusStatus::ScramAbort);
    assert_eq!(consensus.quorum_count, 0);
}

/// S6 — the Inspector General detects a rejected verdict in its tailed
/// audit trail within one scan cycle and trips SCRAM.
#[test]
fn s6_inspector_general_trips_scram_on_rejected_verdict() {
    let dir = tempfile::tempdir().unwrap();
    let ig_log = dir.path().join("tgl_audit_trail.jsonl");
    std::fs::write(
        &ig_log,
        b"{\"manifest_id\":\"M-1\",\"judgment\":\"Rejected\",\"detail\":\"signature mismatch\"}\n",
    )
    .unwrap();

    let mut config = KernelConfig::default();
    config.ig_audit_trail_path = ig_log.to_string_lossy().to_string();
    let kernel = build_kernel(config);

    assert_eq!(kernel.scram.state(), chainbridge_pdo_kernel::scram::ScramState::Armed);
    kernel.inspector.scan_once(&kernel.scram, &kernel.ledger, kernel.clock.as_ref());

    assert_eq!(kernel.scram.state(), chainbridge_pdo_kernel::scram::ScramState::Complete);
    let trail = kernel.scram.audit_trail();
    assert!(trail.iter().any(|e| e.reason == ScramReason::IgViolationDetected));
}
