//! Demo binary: wires a `Kernel` with a real Ed25519 signer and the system
//! clock, then walks the S1 happy-path scenario once — mint a PDO through
//! both gates, run a consensus round, initiate and complete a settlement —
//! printing a summary at each step.

use chainbridge_pdo_kernel::clock::SystemClock;
use chainbridge_pdo_kernel::config::KernelConfig;
use chainbridge_pdo_kernel::gate::{DecisionContainer, ProofContainer};
use chainbridge_pdo_kernel::observability::{self, AuditConfig, AuditEvent};
use chainbridge_pdo_kernel::settlement::SettlementRequest;
use chainbridge_pdo_kernel::signer::Ed25519SignerVerifier;
use chainbridge_pdo_kernel::voter::{AgentProof, CoreType};
use chainbridge_pdo_kernel::{Kernel, KernelDeps};
use std::sync::Arc;

fn main() -> anyhow::Result<()> {
    // Held for the process lifetime: dropping it stops the non-blocking
    // file writer.
    let _guard = observability::init_tracing(AuditConfig {
        console_output: true,
        ..AuditConfig::default()
    });

    let kernel = Kernel::new(KernelDeps {
        config: KernelConfig::default(),
        clock: Arc::new(SystemClock),
        signer: Arc::new(Ed25519SignerVerifier::generate()),
        critical_files: vec![],
        swarm_size: 10,
        diversity_drift_threshold: 0.15,
    });
    tracing::info!(event = %AuditEvent::KernelIgnite, "kernel constructed");

    let pac_id = "PAC-DEMO-0001";

    let proof = ProofContainer {
        wrap_id: "WRAP-0001".to_string(),
        pac_id: pac_id.to_string(),
        status: "COMPLETE".to_string(),
        wrap_data: serde_json::json!({"status": "COMPLETE", "wrap_id": "WRAP-0001"}),
    };
    let decision = DecisionContainer {
        ber_id: "BER-0001".to_string(),
        pac_id: pac_id.to_string(),
        proof_wrap_id: proof.wrap_id.clone(),
        proof_hash: proof.proof_hash(),
        decision_status: "APPROVE".to_string(),
        ber_data: serde_json::json!({"status": "APPROVE", "ber_id": "BER-0001"}),
    };

    let pdo = kernel.mint_pdo(&proof, &decision)?;
    tracing::info!(event = %AuditEvent::PdoMinted, pdo_id = %pdo.pdo_id, "pdo minted");
    println!(
        "minted PDO {} for {} (outcome {}, ledger len {})",
        pdo.pdo_id, pdo.pac_id, pdo.outcome_status, kernel.ledger.len()
    );

    let gated = {
        let registry = kernel.registry.lock().expect("registry mutex poisoned");
        kernel
            .gate
            .run_gated(&registry, pac_id, kernel.clock.as_ref(), |pdo| pdo.pdo_id.clone())?
    };
    println!("gate passed, executing under PDO {gated}");

    let proofs: Vec<AgentProof> = (0..8)
        .map(|i| AgentProof {
            agent_id: format!("agent-{i}"),
            core_type: if i % 2 == 0 { CoreType::Lattice } else { CoreType::Heuristic },
            valid: true,
            fips_204_compliant: true,
            fips_203_compliant: true,
            timestamp: kernel.clock.now_rfc3339(),
        })
        .collect();
    let consensus = kernel.voter.verify_consensus(&proofs, true, &kernel.scram);
    println!(
        "consensus: {:?} ({}/{})",
        consensus.status, consensus.quorum_count, consensus.threshold
    );

    {
        let registry = kernel.registry.lock().expect("registry mutex poisoned");
        let request = SettlementRequest {
            pac_id: pac_id.to_string(),
            pdo_id: pdo.pdo_id.clone(),
            settlement_id: "SETTLE-0001".to_string(),
            amount: 100.00,
            currency: "USD".to_string(),
        };
        let initiated = kernel.settlement.initiate_settlement(
            request,
            &kernel.gate,
            &registry,
            &kernel.ledger,
            kernel.clock.as_ref(),
        )?;
        println!(
            "settlement initiated: {:?} (ledger_entry_id={:?})",
            initiated.status, initiated.ledger_entry_id
        );

        let completed = kernel.settlement.complete_settlement(
            "SETTLE-0001",
            pac_id,
            &kernel.gate,
            &registry,
            &kernel.ledger,
            kernel.clock.as_ref(),
        )?;
        println!("settlement completed: {:?}", completed.status);
    }

    kernel.ledger.verify_chain()?;
    println!("ledger chain verified, {} entries", kernel.ledger.len());

    Ok(())
}
