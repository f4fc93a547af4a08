//! Key capability traits.
//!
//! The protocol never holds key material itself. Signing, verification,
//! and the key agreement needed by the targeted sub-protocol are all
//! supplied through these capability seams, allowing implementors to
//! choose their key management: an in-process key, a keystore service,
//! or hardware.
//!
//! By convention, absent other indications, a [PeerId] is an ed25519
//! public key and signatures are detached 64-byte ed25519 signatures.

use crate::*;
use std::sync::Arc;

/// Defines a type capable of cryptographic signatures.
pub trait Signer {
    /// Sign the message bytes, returning the resulting detached
    /// signature bytes.
    fn sign(&self, message: &[u8]) -> BoxFut<'_, MsvResult<bytes::Bytes>>;
}

/// Defines a type capable of cryptographic verification.
pub trait Verifier: std::fmt::Debug {
    /// Verify the provided detached signature over the provided message
    /// against the public identity that claims to have signed it.
    /// Returns `true` if the signature is valid.
    fn verify(
        &self,
        signed_by: &PeerId,
        message: &[u8],
        signature: &[u8],
    ) -> bool;
}

/// Trait-object [Verifier].
pub type DynVerifier = Arc<dyn Verifier + 'static + Send + Sync>;

/// Defines a type capable of deriving a shared secret with a remote
/// identity. Both ends of the targeted sub-protocol need this: the
/// sender derives the secret against the target identity, the target
/// derives the same secret against the sender identity.
pub trait KeyExchange {
    /// Derive the shared secret bytes for the given remote identity.
    fn shared_secret(&self, remote: &PeerId) -> MsvResult<bytes::Bytes>;
}

/// A local identity is a party on this node that can sign messages and
/// participate in targeted key agreement.
pub trait LocalIdentity:
    Signer + KeyExchange + 'static + Send + Sync + std::fmt::Debug
{
    /// The public [PeerId] of this local identity.
    fn identity(&self) -> &PeerId;
}
