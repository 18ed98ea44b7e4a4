//! Top-level kernel facade.
//!
//! `Kernel` owns every component behind `Arc` and is constructed once,
//! explicitly, by the caller (the demo binary or a test). There is exactly
//! one way to get a handle to each subsystem, and it is always through a
//! `Kernel` value you built yourself — no lazy statics, no module-level
//! singletons.

use crate::clock::Clock;
use crate::config::KernelConfig;
use crate::gate::PdoExecutionGate;
use crate::inspector::InspectorGeneral;
use crate::ledger::Ledger;
use crate::pdo::PdoRegistry;
use crate::scram::{ScramConfig, ScramController};
use crate::sentinel::IntegritySentinel;
use crate::settlement::SettlementEngine;
use crate::signer::SignerVerifier;
use crate::voter::ByzantineVoter;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

/// Everything the kernel needs that isn't a compile-time constant.
pub struct KernelDeps {
    pub config: KernelConfig,
    pub clock: Arc<dyn Clock>,
    pub signer: Arc<dyn SignerVerifier>,
    pub critical_files: Vec<PathBuf>,
    pub swarm_size: usize,
    pub diversity_drift_threshold: f64,
}

/// Owns every governed subsystem. Constructed once per process (or once
/// per test); never reached via a global.
pub struct Kernel {
    pub config: KernelConfig,
    pub clock: Arc<dyn Clock>,
    pub signer: Arc<dyn SignerVerifier>,
    pub ledger: Arc<Ledger>,
    pub registry: Mutex<PdoRegistry>,
    pub gate: Arc<PdoExecutionGate>,
    pub scram: Arc<ScramController>,
    pub voter: Arc<ByzantineVoter>,
    pub settlement: Arc<SettlementEngine>,
    pub sentinel: Arc<IntegritySentinel>,
    pub inspector: Arc<InspectorGeneral>,
}

impl Kernel {
    pub fn new(deps: KernelDeps) -> Self {
        let config = deps.config.sanitized();
        let scram_config = ScramConfig {
            max_termination_ms: config.max_termination_ms,
            require_dual_key: config.require_dual_key,
            hardware_sentinel_required: config.hardware_sentinel_required,
            audit_log_path: Some(config.audit_log_path.clone()),
            hardware_sentinel_path: Some(config.hardware_sentinel_path.clone()),
        };

        Self {
            ledger: Arc::new(Ledger::new()),
            registry: Mutex::new(PdoRegistry::new()),
            gate: Arc::new(PdoExecutionGate::new()),
            scram: Arc::new(ScramController::new(scram_config)),
            voter: Arc::new(ByzantineVoter::new(deps.swarm_size, deps.diversity_drift_threshold)),
            settlement: Arc::new(SettlementEngine::new()),
            sentinel: Arc::new(IntegritySentinel::new(deps.critical_files)),
            inspector: Arc::new(InspectorGeneral::new(PathBuf::from(&config.ig_audit_trail_path))),
            config,
            clock: deps.clock,
            signer: deps.signer,
        }
    }

    /// Mint and register a PDO for a validated proof/decision pair,
    /// returning the artifact. Routes through `PdoExecutionGate::execute_with_pdo`,
    /// which enforces GATE-PROOF then GATE-DECISION before minting — this is
    /// the only legitimate way a caller obtains a PDO: the factory and
    /// registry are never reachable except through a `Kernel`. Minting only
    /// registers the PDO; the gate does not auto-append to the ledger, so
    /// the ledger gains no entry until a settlement is initiated against it.
    pub fn mint_pdo(
        &self,
        proof: &crate::gate::ProofContainer,
        decision: &crate::gate::DecisionContainer,
    ) -> Result<crate::pdo::PdoArtifact, crate::gate::GateError> {
        let mut registry = self.registry.lock().expect("registry mutex poisoned");
        self.gate.execute_with_pdo(
            &mut registry,
            proof,
            decision,
            crate::pdo::PDO_AUTHORITY,
            true,
            self.clock.as_ref(),
        )
    }

    /// Start the Inspector General's background monitoring thread.
    pub fn start_monitoring(self: &Arc<Self>) -> std::thread::JoinHandle<()> {
        self.inspector.start_monitoring(
            Arc::clone(&self.scram),
            Arc::clone(&self.sentinel),
            Arc::clone(&self.ledger),
            Arc::clone(&self.clock),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SystemClock;
    use crate::signer::Ed25519SignerVerifier;

    fn build_kernel() -> Kernel {
        Kernel::new(KernelDeps {
            config: KernelConfig::default(),
            clock: Arc::new(SystemClock),
            signer: Arc::new(Ed25519SignerVerifier::generate()),
            critical_files: vec![],
            swarm_size: 10,
            diversity_drift_threshold: 0.15,
        })
    }

    #[test]
    fn kernel_wires_every_component() {
        let kernel = build_kernel();
        assert_eq!(kernel.scram.state(), crate::scram::ScramState::Armed);
        assert_eq!(kernel.ledger.len(), 0);
    }

    #[test]
    fn mint_pdo_registers_and_anchors() {
        let kernel = build_kernel();
        let proof = crate::gate::ProofContainer {
            wrap_id: "W1".to_string(),
            pac_id: "PAC-1".to_string(),
            status: "COMPLETE".to_string(),
            wrap_data: serde_json::json!({"status": "COMPLETE"}),
        };
        let decision = crate::gate::DecisionContainer {
            ber_id: "B1".to_string(),
            pac_id: "PAC-1".to_string(),
            proof_wrap_id: proof.wrap_id.clone(),
            proof_hash: proof.proof_hash(),
            decision_status: "APPROVE".to_string(),
            ber_data: serde_json::json!({"status": "APPROVE"}),
        };
        let pdo = kernel.mint_pdo(&proof, &decision).unwrap();
        assert_eq!(kernel.ledger.len(), 0); // minting only registers, gate does not auto-append
        assert!(kernel.registry.lock().unwrap().get_by_pac_id("PAC-1").is_some());
        assert_eq!(pdo.pac_id, "PAC-1");
    }
}
