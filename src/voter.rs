//! Byzantine-fault-tolerant supermajority voter (C6).
//!
//! No async runtime is pulled in for a single consensus check, so
//! `verify_consensus` is a plain blocking method. It runs a SCRAM
//! pre-flight check before counting any votes, then a quorum check, a
//! diversity-drift check, and an optional NIST-compliance gate, in that
//! order.

use crate::scram::{ScramController, ScramState};
use serde::{Deserialize, Serialize};
use std::sync::Mutex;

/// The two agent core types the swarm is split between.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CoreType {
    Lattice,
    Heuristic,
}

/// One agent's attestation proof for a consensus round. The voter treats
/// this as an opaque token — it does not re-verify any signature, only
/// tallies the `valid` self-attestation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentProof {
    pub agent_id: String,
    pub core_type: CoreType,
    pub valid: bool,
    pub fips_204_compliant: bool,
    pub fips_203_compliant: bool,
    pub timestamp: String,
}

/// Closed set of consensus outcomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConsensusStatus {
    SovereignConsensusReached,
    QuorumFailure,
    DiversityCollapse,
    NistViolation,
    ScramAbort,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsensusResult {
    pub status: ConsensusStatus,
    pub quorum_count: usize,
    pub threshold: usize,
    pub lattice_votes: usize,
    pub heuristic_votes: usize,
    pub diversity_ratio: f64,
    pub nist_compliant: bool,
    pub reason: Option<String>,
    pub byzantine_agents: Vec<String>,
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct ByzantineMetrics {
    pub rounds_run: u64,
    pub rounds_reached: u64,
    pub quorum_failures: u64,
    pub diversity_collapses: u64,
    pub nist_violations: u64,
    pub scram_aborts: u64,
    pub avg_diversity_ratio: f64,
}

/// Byzantine-fault-tolerant supermajority voter. `threshold` is
/// `(2 * swarm_size / 3) + 1`; `max_byzantine` is `(swarm_size - 1) / 3`.
pub struct ByzantineVoter {
    swarm_size: usize,
    threshold: usize,
    max_byzantine: usize,
    diversity_drift_threshold: f64,
    metrics: Mutex<ByzantineMetrics>,
}

impl ByzantineVoter {
    pub fn new(swarm_size: usize, diversity_drift_threshold: f64) -> Self {
        let threshold = (2 * swarm_size / 3) + 1;
        let max_byzantine = (swarm_size.saturating_sub(1)) / 3;
        Self {
            swarm_size,
            threshold,
            max_byzantine,
            diversity_drift_threshold,
            metrics: Mutex::new(ByzantineMetrics::default()),
        }
    }

    pub fn swarm_size(&self) -> usize {
        self.swarm_size
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }

    pub fn max_byzantine(&self) -> usize {
        self.max_byzantine
    }

    /// Runs, in order:
    /// 1. SCRAM pre-flight — fail-closed if the controller is not ARMED.
    /// 2. Quorum: `approvals = |{p : p.valid}|`; below `T` is
    ///    `QUORUM_FAILURE`.
    /// 3. Diversity: `drift = |lattice - heuristic| / max(1, T)`; above
    ///    `delta` is `DIVERSITY_COLLAPSE`.
    /// 4. NIST: when `enforce_nist`, require `|{valid & fips204 & fips203}|
    ///    >= T`, else `NIST_VIOLATION`.
    /// 5. Otherwise `SOVEREIGN_CONSENSUS_REACHED`, reporting every invalid
    ///    agent id as Byzantine.
    pub fn verify_consensus(
        &self,
        proofs: &[AgentProof],
        enforce_nist: bool,
        scram: &ScramController,
    ) -> ConsensusResult {
        let scram_state = scram.state();
        if !matches!(scram_state, ScramState::Armed) {
            self.bump(ConsensusStatus::ScramAbort, 0.0);
            return ConsensusResult {
                status: ConsensusStatus::ScramAbort,
                quorum_count: 0,
                threshold: self.threshold,
                lattice_votes: 0,
                heuristic_votes: 0,
                diversity_ratio: 0.0,
                nist_compliant: false,
                reason: Some(format!("{:?}", scram_state).to_lowercase()),
                byzantine_agents: Vec::new(),
            };
        }

        let byzantine_agents: Vec<String> = proofs
            .iter()
            .filter(|p| !p.valid)
            .map(|p| p.agent_id.clone())
            .collect();

        let approvals = proofs.iter().filter(|p| p.valid).count();
        if approvals < self.threshold {
            self.bump(ConsensusStatus::QuorumFailure, 0.0);
            return ConsensusResult {
                status: ConsensusStatus::QuorumFailure,
                quorum_count: approvals,
                threshold: self.threshold,
                lattice_votes: 0,
                heuristic_votes: 0,
                diversity_ratio: 0.0,
                nist_compliant: false,
                reason: Some("insufficient valid proofs for quorum".to_string()),
                byzantine_agents,
            };
        }

        let lattice = proofs.iter().filter(|p| p.valid && p.core_type == CoreType::Lattice).count();
        let heuristic = proofs.iter().filter(|p| p.valid && p.core_type == CoreType::Heuristic).count();
        let drift = (lattice as f64 - heuristic as f64).abs() / (self.threshold.max(1) as f64);

        if drift > self.diversity_drift_threshold {
            self.bump(ConsensusStatus::DiversityCollapse, drift);
            return ConsensusResult {
                status: ConsensusStatus::DiversityCollapse,
                quorum_count: approvals,
                threshold: self.threshold,
                lattice_votes: lattice,
                heuristic_votes: heuristic,
                diversity_ratio: drift,
                nist_compliant: false,
                reason: Some(format!("diversity drift {drift:.4} exceeds threshold {:.4}", self.diversity_drift_threshold)),
                byzantine_agents,
            };
        }

        if enforce_nist {
            let nist_compliant_count = proofs
                .iter()
                .filter(|p| p.valid && p.fips_204_compliant && p.fips_203_compliant)
                .count();
            if nist_compliant_count < self.threshold {
                self.bump(ConsensusStatus::NistViolation, drift);
                return ConsensusResult {
                    status: ConsensusStatus::NistViolation,
                    quorum_count: approvals,
                    threshold: self.threshold,
                    lattice_votes: lattice,
                    heuristic_votes: heuristic,
                    diversity_ratio: drift,
                    nist_compliant: false,
                    reason: Some("insufficient FIPS 204/203 compliant proofs".to_string()),
                    byzantine_agents,
                };
            }
        }

        self.bump(ConsensusStatus::SovereignConsensusReached, drift);
        ConsensusResult {
            status: ConsensusStatus::SovereignConsensusReached,
            quorum_count: approvals,
            threshold: self.threshold,
            lattice_votes: lattice,
            heuristic_votes: heuristic,
            diversity_ratio: drift,
            nist_compliant: true,
            reason: None,
            byzantine_agents,
        }
    }

    fn bump(&self, status: ConsensusStatus, diversity_ratio: f64) {
        let mut metrics = self.metrics.lock().expect("voter metrics mutex poisoned");
        metrics.rounds_run += 1;
        match status {
            ConsensusStatus::SovereignConsensusReached => {
                metrics.rounds_reached += 1;
                let n = metrics.rounds_reached as f64;
                metrics.avg_diversity_ratio =
                    ((metrics.avg_diversity_ratio * (n - 1.0)) + diversity_ratio) / n;
            }
            ConsensusStatus::QuorumFailure => metrics.quorum_failures += 1,
            ConsensusStatus::DiversityCollapse => metrics.diversity_collapses += 1,
            ConsensusStatus::NistViolation => metrics.nist_violations += 1,
            ConsensusStatus::ScramAbort => metrics.scram_aborts += 1,
        }
    }

    pub fn get_metrics(&self) -> ByzantineMetrics {
        self.metrics.lock().expect("voter metrics mutex poisoned").clone()
    }

    /// Sanity-check the threshold/byzantine-bound arithmetic for the
    /// configured swarm size, matching the Python source's
    /// `run_preflight_checks`.
    pub fn run_preflight_checks(&self) -> bool {
        let expected_threshold = (2 * self.swarm_size / 3) + 1;
        let expected_max_byzantine = (self.swarm_size.saturating_sub(1)) / 3;
        self.threshold == expected_threshold
            && self.max_byzantine == expected_max_byzantine
            && self.threshold > self.max_byzantine
            && self.threshold <= self.swarm_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SystemClock;
    use crate::ledger::Ledger;
    use crate::scram::{ScramConfig, ScramReason};

    fn proof(id: &str, core: CoreType, valid: bool, fips204: bool, fips203: bool) -> AgentProof {
        AgentProof {
            agent_id: id.to_string(),
            core_type: core,
            valid,
            fips_204_compliant: fips204,
            fips_203_compliant: fips203,
            timestamp: "2026-01-01T00:00:00Z".to_string(),
        }
    }

    #[test]
    fn threshold_matches_spec_formula_for_default_swarm() {
        let voter = ByzantineVoter::new(10_000, 0.15);
        assert_eq!(voter.threshold(), 6667);
        assert_eq!(voter.max_byzantine(), 3333);
        assert!(voter.run_preflight_checks());
    }

    #[test]
    fn boundary_66_of_100_fails_quorum() {
        // swarm_size=100 -> T=67. 66 valid proofs must fail quorum.
        let voter = ByzantineVoter::new(100, 0.15);
        let scram = ScramController::new(ScramConfig::default());
        let mut proofs: Vec<AgentProof> = (0..66)
            .map(|i| proof(&format!("a{i}"), CoreType::Lattice, true, true, true))
            .collect();
        proofs.extend((0..34).map(|i| proof(&format!("b{i}"), CoreType::Heuristic, false, true, true)));
        let result = voter.verify_consensus(&proofs, true, &scram);
        assert_eq!(result.status, ConsensusStatus::QuorumFailure);
    }

    #[test]
    fn boundary_67_of_100_balanced_reaches_consensus() {
        let voter = ByzantineVoter::new(100, 0.15);
        let scram = ScramController::new(ScramConfig::default());
        let mut proofs: Vec<AgentProof> = (0..34)
            .map(|i| proof(&format!("lat{i}"), CoreType::Lattice, true, true, true))
            .collect();
        proofs.extend((0..33).map(|i| proof(&format!("heu{i}"), CoreType::Heuristic, true, true, true)));
        proofs.extend((0..33).map(|i| proof(&format!("bad{i}"), CoreType::Lattice, false, false, false)));
        let result = voter.verify_consensus(&proofs, true, &scram);
        assert_eq!(result.status, ConsensusStatus::SovereignConsensusReached);
        assert_eq!(result.quorum_count, 67);
    }

    #[test]
    fn all_lattice_causes_diversity_collapse() {
        // swarm_size=100 -> T=67. 100 all-LATTICE valid proofs: drift = 100/67 > 0.15.
        let voter = ByzantineVoter::new(100, 0.15);
        let scram = ScramController::new(ScramConfig::default());
        let proofs: Vec<AgentProof> = (0..100)
            .map(|i| proof(&format!("a{i}"), CoreType::Lattice, true, true, true))
            .collect();
        let result = voter.verify_consensus(&proofs, true, &scram);
        assert_eq!(result.status, ConsensusStatus::DiversityCollapse);
    }

    #[test]
    fn nist_violation_when_insufficient_compliant_proofs() {
        let voter = ByzantineVoter::new(100, 0.15);
        let scram = ScramController::new(ScramConfig::default());
        let mut proofs: Vec<AgentProof> = (0..34)
            .map(|i| proof(&format!("lat{i}"), CoreType::Lattice, true, true, true))
            .collect();
        proofs.extend((0..33).map(|i| proof(&format!("heu{i}"), CoreType::Heuristic, true, false, true)));
        proofs.extend((0..33).map(|i| proof(&format!("bad{i}"), CoreType::Lattice, false, false, false)));
        let result = voter.verify_consensus(&proofs, true, &scram);
        assert_eq!(result.status, ConsensusStatus::NistViolation);
    }

    #[test]
    fn scram_preflight_aborts_regardless_of_input() {
        let voter = ByzantineVoter::new(100, 0.15);
        let scram = ScramController::new(ScramConfig::default());
        let ledger = Ledger::new();
        let clock = SystemClock;
        scram.activate(&["a", "b"], ScramReason::ManualOperator, serde_json::json!({}), &ledger, &clock);
        let proofs: Vec<AgentProof> = (0..100)
            .map(|i| proof(&format!("a{i}"), CoreType::Lattice, true, true, true))
            .collect();
        let result = voter.verify_consensus(&proofs, true, &scram);
        assert_eq!(result.status, ConsensusStatus::ScramAbort);
        assert_eq!(result.quorum_count, 0);
    }

    #[test]
    fn byzantine_agents_lists_every_invalid_proof() {
        let voter = ByzantineVoter::new(100, 0.15);
        let scram = ScramController::new(ScramConfig::default());
        let mut proofs: Vec<AgentProof> = (0..34)
            .map(|i| proof(&format!("lat{i}"), CoreType::Lattice, true, true, true))
            .collect();
        proofs.extend((0..33).map(|i| proof(&format!("heu{i}"), CoreType::Heuristic, true, true, true)));
        proofs.extend((0..34).map(|i| proof(&format!("bad{i}"), CoreType::Lattice, false, false, false)));
        let result = voter.verify_consensus(&proofs, true, &scram);
        assert_eq!(result.status, ConsensusStatus::SovereignConsensusReached);
        assert_eq!(result.byzantine_agents.len(), 34);
    }
}
