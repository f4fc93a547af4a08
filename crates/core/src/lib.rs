#![deny(missing_docs)]
//! Missive point-to-point message authentication.
//!
//! A sender cryptographically attests to the authorship, integrity, and
//! recency of a structured message; a receiver verifies that attestation
//! without a prior handshake or session state. See the [auth] module for
//! the protocol operations, and missive_api for the capability traits
//! this crate implements with ed25519.

use missive_api::*;

/// A default [missive_api::keys::Verifier] based on ed25519_dalek.
#[derive(Debug)]
pub struct Ed25519Verifier;

impl keys::Verifier for Ed25519Verifier {
    fn verify(
        &self,
        signed_by: &PeerId,
        message: &[u8],
        signature: &[u8],
    ) -> bool {
        use ed25519_dalek::Verifier;

        let signed_by: &[u8] = signed_by;
        let signed_by: [u8; 32] = match signed_by.try_into() {
            Ok(signed_by) => signed_by,
            Err(_) => return false,
        };

        let signed_by =
            match ed25519_dalek::VerifyingKey::from_bytes(&signed_by) {
                Ok(signed_by) => signed_by,
                Err(_) => return false,
            };

        let signature: [u8; 64] = match signature.try_into() {
            Ok(signature) => signature,
            Err(_) => return false,
        };

        let signature = ed25519_dalek::Signature::from_bytes(&signature);

        signed_by.verify(message, &signature).is_ok()
    }
}

/// A default [missive_api::keys::LocalIdentity] holding an in-process
/// ed25519 key.
///
/// The identity bytes are the verifying key; the signing seed never
/// leaves this struct except through [Ed25519Identity::seed].
pub struct Ed25519Identity {
    signing_key: ed25519_dalek::SigningKey,
    identity: PeerId,
}

impl std::fmt::Debug for Ed25519Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ed25519Identity")
            .field("identity", &self.identity)
            .field("signing_key", &"<redacted>")
            .finish()
    }
}

impl Ed25519Identity {
    /// Generate a new random identity from the system rng.
    pub fn generate() -> Self {
        Self::from_seed(&ed25519_dalek::SigningKey::generate(
            &mut rand::rngs::OsRng,
        )
        .to_bytes())
    }

    /// Construct an identity from ed25519 seed bytes.
    pub fn from_seed(seed: &[u8; 32]) -> Self {
        let signing_key = ed25519_dalek::SigningKey::from_bytes(seed);
        let identity = PeerId::from(bytes::Bytes::copy_from_slice(
            signing_key.verifying_key().as_bytes(),
        ));
        Self {
            signing_key,
            identity,
        }
    }

    /// Get the seed bytes, e.g. for persisting this identity.
    pub fn seed(&self) -> [u8; 32] {
        self.signing_key.to_bytes()
    }
}

impl keys::Signer for Ed25519Identity {
    fn sign(&self, message: &[u8]) -> BoxFut<'_, MsvResult<bytes::Bytes>> {
        use ed25519_dalek::Signer;
        let signature = bytes::Bytes::copy_from_slice(
            &self.signing_key.sign(message).to_bytes(),
        );
        Box::pin(async move { Ok(signature) })
    }
}

impl keys::KeyExchange for Ed25519Identity {
    fn shared_secret(&self, remote: &PeerId) -> MsvResult<bytes::Bytes> {
        let remote: &[u8] = remote;
        let remote: [u8; 32] = remote.try_into().map_err(|_| {
            MsvError::signing("remote identity is not a 32 byte public key")
        })?;
        let remote = ed25519_dalek::VerifyingKey::from_bytes(&remote)
            .map_err(|e| {
                MsvError::signing_src("invalid remote public key", e)
            })?;

        // Standard ed25519-to-x25519 bridge: the x25519 scalar is the
        // clamped lower half of SHA-512(seed), multiplied against the
        // montgomery form of the remote verifying key. Both parties
        // arrive at the same point.
        use sha2::Digest;
        let h = sha2::Sha512::digest(self.signing_key.to_bytes());
        let mut scalar = [0_u8; 32];
        scalar.copy_from_slice(&h[..32]);
        let shared = remote.to_montgomery().mul_clamped(scalar);

        // An all-zero point means the remote key was in the small
        // subgroup and contributed nothing to the secret.
        if shared.as_bytes() == &[0_u8; 32] {
            return Err(MsvError::signing(
                "remote public key yields a degenerate shared secret",
            ));
        }

        Ok(bytes::Bytes::copy_from_slice(shared.as_bytes()))
    }
}

impl keys::LocalIdentity for Ed25519Identity {
    fn identity(&self) -> &PeerId {
        &self.identity
    }
}

pub mod auth;

#[cfg(test)]
mod test {
    use super::*;
    use missive_api::keys::{KeyExchange, LocalIdentity, Signer, Verifier};

    #[tokio::test(flavor = "multi_thread")]
    async fn ed25519_sign_and_verify() {
        let id = Ed25519Identity::generate();
        let sig = id.sign(b"test message").await.unwrap();
        assert_eq!(64, sig.len());
        assert!(Ed25519Verifier.verify(id.identity(), b"test message", &sig));
        assert!(!Ed25519Verifier.verify(
            id.identity(),
            b"wrong message",
            &sig,
        ));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn ed25519_verify_wrong_key_fails() {
        let a = Ed25519Identity::generate();
        let b = Ed25519Identity::generate();
        let sig = a.sign(b"test message").await.unwrap();
        assert!(!Ed25519Verifier.verify(b.identity(), b"test message", &sig));
    }

    #[test]
    fn ed25519_verify_malformed_input_is_false_not_panic() {
        let bad_id = PeerId::from(bytes::Bytes::from_static(b"short"));
        assert!(!Ed25519Verifier.verify(&bad_id, b"msg", &[0_u8; 64]));

        let id = Ed25519Identity::generate();
        assert!(!Ed25519Verifier.verify(id.identity(), b"msg", b"short-sig"));
    }

    #[test]
    fn identity_round_trips_through_seed() {
        let id = Ed25519Identity::generate();
        let restored = Ed25519Identity::from_seed(&id.seed());
        assert_eq!(id.identity(), restored.identity());
    }

    #[test]
    fn shared_secret_is_symmetric() {
        let a = Ed25519Identity::generate();
        let b = Ed25519Identity::generate();
        let c = Ed25519Identity::generate();

        let ab = a.shared_secret(b.identity()).unwrap();
        let ba = b.shared_secret(a.identity()).unwrap();
        assert_eq!(ab, ba);

        let cb = c.shared_secret(b.identity()).unwrap();
        assert_ne!(ab, cb);
    }

    #[test]
    fn shared_secret_rejects_malformed_remote() {
        let a = Ed25519Identity::generate();
        let bad = PeerId::from(bytes::Bytes::from_static(b"not-a-key"));
        assert!(a.shared_secret(&bad).is_err());
    }

    #[test]
    fn debug_redacts_key_material() {
        let id = Ed25519Identity::generate();
        let dbg = format!("{id:?}");
        assert!(dbg.contains("<redacted>"));
    }
}
