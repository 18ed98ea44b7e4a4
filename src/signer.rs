//! Signer/Verifier capability port (C1).
//!
//! The kernel treats signing and verification as opaque: it consumes a
//! `sign(message) -> signature` / `verify(public_key, message, signature) ->
//! bool` pair and never inspects key material itself. Compatibility with
//! ML-DSA-65 (FIPS 204) sizing is recommended but not required — the actual
//! post-quantum primitive is out of scope here.
//!
//! `Ed25519SignerVerifier` is a concrete, test/demo-grade implementation of
//! a signed-request envelope.

use ed25519_dalek::{Signature, Signer as _, SigningKey, Verifier as _, VerifyingKey};

/// Opaque signer/verifier capability consumed by the kernel.
pub trait SignerVerifier: Send + Sync {
    /// Sign `message` and return the raw signature bytes.
    fn sign(&self, message: &[u8]) -> Vec<u8>;

    /// Verify that `signature` over `message` was produced by `public_key`.
    /// Returns `false` on any malformed input rather than raising — the
    /// kernel treats both as opaque and never panics on untrusted bytes.
    fn verify(&self, public_key: &[u8], message: &[u8], signature: &[u8]) -> bool;

    /// The public key bytes this signer signs with, for callers that need
    /// to hand them to a counterparty.
    fn public_key_bytes(&self) -> Vec<u8>;
}

/// Ed25519-dalek-backed `SignerVerifier`. Not a production PQC signer — a
/// concrete stand-in satisfying the opaque contract for tests and the demo
/// binary.
pub struct Ed25519SignerVerifier {
    signing_key: SigningKey,
}

impl Ed25519SignerVerifier {
    /// Generate a fresh keypair from the operating system's CSPRNG.
    pub fn generate() -> Self {
        let mut csprng = rand_core::OsRng;
        Self {
            signing_key: SigningKey::generate(&mut csprng),
        }
    }

    /// Construct from an existing 32-byte seed, for reproducible tests.
    pub fn from_seed(seed: [u8; 32]) -> Self {
        Self {
            signing_key: SigningKey::from_bytes(&seed),
        }
    }
}

impl SignerVerifier for Ed25519SignerVerifier {
    fn sign(&self, message: &[u8]) -> Vec<u8> {
        self.signing_key.sign(message).to_bytes().to_vec()
    }

    fn verify(&self, public_key: &[u8], message: &[u8], signature: &[u8]) -> bool {
        verify_detached(public_key, message, signature)
    }

    fn public_key_bytes(&self) -> Vec<u8> {
        self.signing_key.verifying_key().to_bytes().to_vec()
    }
}

/// Stateless verification helper: verify a signature against an arbitrary
/// public key without needing a signer instance. Used by counterparties
/// that only ever verify.
pub fn verify_detached(public_key: &[u8], message: &[u8], signature: &[u8]) -> bool {
    let Ok(key_bytes): Result<[u8; 32], _> = public_key.try_into() else {
        return false;
    };
    let Ok(verifying_key) = VerifyingKey::from_bytes(&key_bytes) else {
        return false;
    };
    let Ok(sig_bytes): Result<[u8; 64], _> = signature.try_into() else {
        return false;
    };
    let signature = Signature::from_bytes(&sig_bytes);
    verifying_key.verify(message, &signature).is_ok()
}
