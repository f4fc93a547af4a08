//! Types dealing with party and message identity.

macro_rules! imp_deref {
    ($i:ty, $t:ty) => {
        impl std::ops::Deref for $i {
            type Target = $t;

            fn deref(&self) -> &Self::Target {
                &self.0
            }
        }
    };
}

macro_rules! imp_from {
    ($a:ty, $b:ty, $i:ident => $e:expr) => {
        impl From<$b> for $a {
            fn from($i: $b) -> Self {
                $e
            }
        }
    };
}

/// Base data identity type meant for newtyping.
/// You probably want [PeerId] or [MessageId].
///
/// In missive these bytes should ONLY be the actual public key or
/// nonce bytes of the identity being tracked, without prefix or suffix.
#[derive(
    Clone,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    serde::Serialize,
    serde::Deserialize,
)]
pub struct Id(#[serde(with = "crate::serde_bytes_base64")] pub bytes::Bytes);

imp_deref!(Id, bytes::Bytes);
imp_from!(Id, bytes::Bytes, b => Id(b));

/// Ids display as base64url. This makes debugging so much easier
/// than rust's default of decimal array, and is also the encoding
/// used for identity fields on the wire.
impl std::fmt::Display for Id {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        use base64::prelude::*;
        f.write_str(&BASE64_URL_SAFE_NO_PAD.encode(&self.0))
    }
}

impl std::fmt::Debug for Id {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Display::fmt(self, f)
    }
}

/// Identifies a party that can sign and receive messages.
/// By convention, absent other indications, these bytes are an
/// ed25519 public key.
#[derive(
    Clone,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    serde::Serialize,
    serde::Deserialize,
)]
#[serde(transparent)]
pub struct PeerId(pub Id);

imp_deref!(PeerId, Id);
imp_from!(PeerId, bytes::Bytes, b => PeerId(Id(b)));
imp_from!(PeerId, Id, b => PeerId(b));

impl std::fmt::Display for PeerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl std::fmt::Debug for PeerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// The byte length of a [MessageId] nonce.
pub const MESSAGE_ID_LEN: usize = 16;

/// The per-message nonce, minted once at signing time and never reused.
/// Its presence in the signed payload makes identical bodies produce
/// distinguishable signed instances.
#[derive(
    Clone,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    serde::Serialize,
    serde::Deserialize,
)]
#[serde(transparent)]
pub struct MessageId(pub Id);

imp_deref!(MessageId, Id);
imp_from!(MessageId, bytes::Bytes, b => MessageId(Id(b)));
imp_from!(MessageId, Id, b => MessageId(b));

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl std::fmt::Debug for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl MessageId {
    /// Mint a fresh random nonce from the system rng.
    pub fn generate() -> Self {
        use rand::RngCore;
        let mut nonce = [0_u8; MESSAGE_ID_LEN];
        rand::rngs::OsRng.fill_bytes(&mut nonce);
        bytes::Bytes::copy_from_slice(&nonce).into()
    }
}
