//! The wire header set accompanying a signed message.
//!
//! A [MessageHeaders] record maps to and from a flat set of named string
//! headers, transport-agnostic. The targeted sub-protocol fields travel
//! as a single [TargetAuth] bundle inside [Scope], so "all three shares
//! present or none" is enforced by the type itself rather than by
//! runtime checks scattered across call sites.
//!
//! This module is purely structural. No cryptographic decision is made
//! here; a header set that decodes successfully may still fail
//! verification.

use crate::*;
use base64::prelude::*;
use std::collections::BTreeMap;

/// The protocol version emitted by this implementation.
pub const PROTOCOL_VERSION: &str = "2";

/// Header carrying the protocol version identifier.
pub const HEADER_VERSION: &str = "Protocol-Version";

/// Header carrying the sender wall-clock milliseconds at signing time.
pub const HEADER_TIMESTAMP: &str = "Timestamp";

/// Header carrying the per-message nonce.
pub const HEADER_UUID: &str = "Uuid";

/// Header carrying the sender identity.
pub const HEADER_SIGNED_BY: &str = "Signed-By";

/// Header carrying the primary signature.
pub const HEADER_SIGNATURE: &str = "Request-Signature";

/// Header carrying the receiver identity, only present when targeted.
pub const HEADER_SIGNED_FOR: &str = "Signed-For";

/// Headers carrying the targeted-auth shares, only present when
/// targeted, always all three together.
pub const HEADER_SECRET_SIGNATURES: [&str; 3] = [
    "Secret-Signature-0",
    "Secret-Signature-1",
    "Secret-Signature-2",
];

/// The byte length of a detached ed25519 signature.
pub const SIGNATURE_LEN: usize = 64;

/// The byte length of a single targeted-auth share.
pub const SHARE_LEN: usize = 64;

/// The targeted-authentication bundle: the receiver identity plus the
/// three shares that only that receiver can recombine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetAuth {
    /// The intended receiver's identity.
    pub signed_for: PeerId,

    /// The three share values, each [SHARE_LEN] bytes.
    pub shares: [bytes::Bytes; 3],
}

/// Whether a message is addressed to everyone or to one receiver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scope {
    /// The message carries no target; any party may verify sender
    /// authenticity.
    Broadcast,

    /// The message names one receiver, carrying the material that lets
    /// only that receiver confirm the targeting.
    Targeted(TargetAuth),
}

/// The full header set produced by signing and consumed by verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageHeaders {
    /// Protocol version identifier.
    pub version: String,

    /// Sender wall-clock milliseconds at signing time.
    pub timestamp: Timestamp,

    /// The per-message nonce.
    pub message_id: MessageId,

    /// The sender identity.
    pub signed_by: PeerId,

    /// The primary signature over the signed payload.
    pub signature: bytes::Bytes,

    /// Broadcast or targeted scope.
    pub scope: Scope,
}

impl MessageHeaders {
    /// The intended receiver, if this message is targeted.
    pub fn signed_for(&self) -> Option<&PeerId> {
        match &self.scope {
            Scope::Broadcast => None,
            Scope::Targeted(auth) => Some(&auth.signed_for),
        }
    }

    /// Map this record to the flat wire header representation.
    pub fn encode(&self) -> BTreeMap<String, String> {
        let mut out = BTreeMap::new();
        out.insert(HEADER_VERSION.into(), self.version.clone());
        out.insert(HEADER_TIMESTAMP.into(), self.timestamp.to_string());
        out.insert(HEADER_UUID.into(), self.message_id.to_string());
        out.insert(HEADER_SIGNED_BY.into(), self.signed_by.to_string());
        out.insert(
            HEADER_SIGNATURE.into(),
            BASE64_URL_SAFE_NO_PAD.encode(&self.signature),
        );
        if let Scope::Targeted(auth) = &self.scope {
            out.insert(HEADER_SIGNED_FOR.into(), auth.signed_for.to_string());
            for (name, share) in
                HEADER_SECRET_SIGNATURES.iter().zip(auth.shares.iter())
            {
                out.insert(
                    (*name).into(),
                    BASE64_URL_SAFE_NO_PAD.encode(share),
                );
            }
        }
        out
    }

    /// Map a flat wire header representation back to a record.
    ///
    /// Fails with a malformed header error if a required field is
    /// missing or badly encoded, or if the targeted fields are only
    /// partially present. A target identity without its shares, or any
    /// share count other than zero or three, is always an error, never
    /// silently treated as non-targeted.
    pub fn decode(
        headers: &BTreeMap<String, String>,
    ) -> MsvResult<MessageHeaders> {
        let version = require(headers, HEADER_VERSION)?.clone();

        let timestamp: i64 =
            require(headers, HEADER_TIMESTAMP)?.parse().map_err(|_| {
                MsvError::malformed_header(format!(
                    "{HEADER_TIMESTAMP} is not an integer"
                ))
            })?;
        let timestamp = Timestamp::from_millis(timestamp);

        let message_id: MessageId =
            decode_b64(headers, HEADER_UUID, Some(MESSAGE_ID_LEN))?.into();

        let signed_by: PeerId =
            decode_b64(headers, HEADER_SIGNED_BY, None)?.into();

        let signature =
            decode_b64(headers, HEADER_SIGNATURE, Some(SIGNATURE_LEN))?;

        let signed_for = headers.get(HEADER_SIGNED_FOR);
        let present = HEADER_SECRET_SIGNATURES
            .iter()
            .filter(|n| headers.contains_key(**n))
            .count();

        let scope = match (signed_for, present) {
            (None, 0) => Scope::Broadcast,
            (Some(_), 3) => {
                let signed_for: PeerId =
                    decode_b64(headers, HEADER_SIGNED_FOR, None)?.into();
                let mut shares = Vec::with_capacity(3);
                for name in HEADER_SECRET_SIGNATURES {
                    shares.push(decode_b64(headers, name, Some(SHARE_LEN))?);
                }
                let shares = [
                    shares[0].clone(),
                    shares[1].clone(),
                    shares[2].clone(),
                ];
                Scope::Targeted(TargetAuth { signed_for, shares })
            }
            _ => {
                return Err(MsvError::malformed_header(
                    "partially populated targeted headers",
                ));
            }
        };

        Ok(MessageHeaders {
            version,
            timestamp,
            message_id,
            signed_by,
            signature,
            scope,
        })
    }
}

fn require<'a>(
    headers: &'a BTreeMap<String, String>,
    name: &str,
) -> MsvResult<&'a String> {
    headers
        .get(name)
        .ok_or_else(|| MsvError::malformed_header(format!("missing {name}")))
}

fn decode_b64(
    headers: &BTreeMap<String, String>,
    name: &str,
    expect_len: Option<usize>,
) -> MsvResult<bytes::Bytes> {
    let raw = BASE64_URL_SAFE_NO_PAD
        .decode(require(headers, name)?)
        .map_err(|_| {
            MsvError::malformed_header(format!("{name} is not base64url"))
        })?;
    if let Some(len) = expect_len {
        if raw.len() != len {
            return Err(MsvError::malformed_header(format!(
                "{name} must be {len} bytes, got {}",
                raw.len()
            )));
        }
    }
    Ok(bytes::Bytes::from(raw))
}

#[cfg(test)]
mod test {
    use super::*;

    fn broadcast_fixture() -> MessageHeaders {
        MessageHeaders {
            version: PROTOCOL_VERSION.into(),
            timestamp: Timestamp::from_millis(1731690797907),
            message_id: MessageId::from(bytes::Bytes::from_static(
                b"0123456789abcdef",
            )),
            signed_by: PeerId::from(bytes::Bytes::from_static(b"sender-pk")),
            signature: bytes::Bytes::from(vec![7_u8; SIGNATURE_LEN]),
            scope: Scope::Broadcast,
        }
    }

    fn targeted_fixture() -> MessageHeaders {
        let mut headers = broadcast_fixture();
        headers.scope = Scope::Targeted(TargetAuth {
            signed_for: PeerId::from(bytes::Bytes::from_static(
                b"receiver-pk",
            )),
            shares: [
                bytes::Bytes::from(vec![0_u8; SHARE_LEN]),
                bytes::Bytes::from(vec![1_u8; SHARE_LEN]),
                bytes::Bytes::from(vec![2_u8; SHARE_LEN]),
            ],
        });
        headers
    }

    #[test]
    fn broadcast_round_trip() {
        let headers = broadcast_fixture();
        let wire = headers.encode();
        assert_eq!(5, wire.len());
        assert_eq!(Some(&"2".to_string()), wire.get(HEADER_VERSION));
        assert_eq!(
            Some(&"1731690797907".to_string()),
            wire.get(HEADER_TIMESTAMP),
        );
        assert_eq!(headers, MessageHeaders::decode(&wire).unwrap());
    }

    #[test]
    fn targeted_round_trip() {
        let headers = targeted_fixture();
        let wire = headers.encode();
        assert_eq!(9, wire.len());
        assert!(wire.contains_key(HEADER_SIGNED_FOR));
        assert_eq!(headers, MessageHeaders::decode(&wire).unwrap());
    }

    #[test]
    fn missing_required_field_is_malformed() {
        for name in [
            HEADER_VERSION,
            HEADER_TIMESTAMP,
            HEADER_UUID,
            HEADER_SIGNED_BY,
            HEADER_SIGNATURE,
        ] {
            let mut wire = broadcast_fixture().encode();
            wire.remove(name);
            let err = MessageHeaders::decode(&wire).unwrap_err();
            assert!(
                matches!(err, MsvError::MalformedHeader { .. }),
                "expected malformed header for missing {name}, got {err}",
            );
        }
    }

    #[test]
    fn partial_shares_are_malformed_never_broadcast() {
        // Exactly one or two of the three shares present must error.
        for keep in 1..3 {
            let mut wire = targeted_fixture().encode();
            for name in HEADER_SECRET_SIGNATURES.iter().skip(keep) {
                wire.remove(*name);
            }
            let err = MessageHeaders::decode(&wire).unwrap_err();
            assert!(matches!(err, MsvError::MalformedHeader { .. }));
        }
    }

    #[test]
    fn target_without_shares_is_malformed() {
        let mut wire = targeted_fixture().encode();
        for name in HEADER_SECRET_SIGNATURES {
            wire.remove(name);
        }
        let err = MessageHeaders::decode(&wire).unwrap_err();
        assert!(matches!(err, MsvError::MalformedHeader { .. }));
    }

    #[test]
    fn shares_without_target_are_malformed() {
        let mut wire = targeted_fixture().encode();
        wire.remove(HEADER_SIGNED_FOR);
        let err = MessageHeaders::decode(&wire).unwrap_err();
        assert!(matches!(err, MsvError::MalformedHeader { .. }));
    }

    #[test]
    fn wrong_signature_length_is_malformed() {
        let mut wire = broadcast_fixture().encode();
        wire.insert(
            HEADER_SIGNATURE.into(),
            BASE64_URL_SAFE_NO_PAD.encode([7_u8; 32]),
        );
        let err = MessageHeaders::decode(&wire).unwrap_err();
        assert!(matches!(err, MsvError::MalformedHeader { .. }));
    }

    #[test]
    fn bad_base64_is_malformed() {
        let mut wire = broadcast_fixture().encode();
        wire.insert(HEADER_UUID.into(), "not/base64url!".into());
        let err = MessageHeaders::decode(&wire).unwrap_err();
        assert!(matches!(err, MsvError::MalformedHeader { .. }));
    }
}
