//! ChainBridge PDO governance kernel.
//!
//! A fail-closed execution gate sits in front of every governed operation:
//! nothing runs without a minted, chain-verified Proof-Decision-Outcome
//! (PDO) artifact. A hash-chained ledger anchors every PDO and state
//! transition; a singleton-free SCRAM controller can halt the kernel on
//! operator command or on a detected integrity breach; a Byzantine voter
//! gates swarm consensus behind a supermajority threshold; a settlement
//! engine drives PDO-gated settlements through their milestones.

pub mod clock;
pub mod config;
pub mod gate;
pub mod hashing;
pub mod inspector;
pub mod kernel;
pub mod ledger;
pub mod observability;
pub mod pdo;
pub mod scram;
pub mod sentinel;
pub mod settlement;
pub mod signer;
pub mod voter;

pub use kernel::{Kernel, KernelDeps};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SystemClock;
    use crate::signer::Ed25519SignerVerifier;
    use std::sync::Arc;

    #[test]
    fn kernel_can_be_constructed_end_to_end() {
        let kernel = Kernel::new(KernelDeps {
            config: config::KernelConfig::default(),
            clock: Arc::new(SystemClock),
            signer: Arc::new(Ed25519SignerVerifier::generate()),
            critical_files: vec![],
            swarm_size: 100,
            diversity_drift_threshold: 0.15,
        });
        assert_eq!(kernel.scram.state(), scram::ScramState::Armed);
    }
}
