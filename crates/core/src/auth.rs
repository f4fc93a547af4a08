//! The message authentication protocol context.
//!
//! [MessageAuth] composes canonical digesting, header construction, and
//! signature generation/verification into the two sides of the protocol:
//!
//! - A sender calls [MessageAuth::sign] with its local identity, the
//!   canonical body bytes, and an optional target identity, and gets
//!   back the header set to transmit alongside the body.
//! - A receiver calls [MessageAuth::verify] (or [MessageAuth::verify_for]
//!   when it holds a local identity) with the received headers and body.
//!
//! ### Signed payload
//!
//! The primary signature covers the deterministic dot-joined
//! concatenation, in fixed field order, of timestamp, nonce, sender
//! identity, target identity (empty marker if absent), and the SHA-256
//! content digest of the body. Binary fields are base64url, which cannot
//! contain the `.` separator, so the encoding is unambiguous. The digest
//! is not transmitted separately: a tampered body fails the signature
//! check rather than producing a distinct digest-mismatch error.
//!
//! ### Replay protection
//!
//! Verification bounds `|now - timestamp|` by the configured window,
//! symmetric to guard against clock skew in either direction. No nonce
//! history is persisted. Freshness bounding is the sole replay defense:
//! a captured message can in principle be replayed within the window if
//! an attacker can also mimic the transport. That is an accepted
//! boundary of the design, not a gap.
//!
//! ### Targeted authentication
//!
//! When a message names a target, three 64-byte shares accompany it,
//! derived from a fresh single-use secret and the sender/target x25519
//! shared key. No single share reveals the secret, recombination
//! requires the target's private key, and the nonce is bound into both
//! mask and tag so shares cannot be replayed against another message.
//! Parties other than the named target can still verify sender
//! authenticity, but cannot confirm targeting.
//!
//! All operations are pure, stateless computations over their inputs;
//! the only process-wide state is the immutable replay window, so a
//! single [MessageAuth] may be shared freely across tasks.

use missive_api::canonical::content_digest;
use missive_api::headers::*;
use missive_api::keys::*;
use missive_api::*;

/// MessageAuth configuration types.
pub mod config {
    /// Configuration parameters for [MessageAuth](super::MessageAuth).
    #[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct MessageAuthConfig {
        /// How far a received timestamp may lag or lead the verifier's
        /// clock, in milliseconds. Default: 8000.
        pub allowed_delta_ms: u64,
    }

    impl Default for MessageAuthConfig {
        fn default() -> Self {
            Self {
                allowed_delta_ms: 8000,
            }
        }
    }

    impl MessageAuthConfig {
        /// Get the allowed delta duration.
        pub fn allowed_delta(&self) -> std::time::Duration {
            std::time::Duration::from_millis(self.allowed_delta_ms)
        }
    }

    /// Module-level configuration for MessageAuth.
    #[derive(
        Debug, Default, Clone, serde::Serialize, serde::Deserialize,
    )]
    #[serde(rename_all = "camelCase")]
    pub struct MessageAuthModConfig {
        /// MessageAuth configuration.
        pub message_auth: MessageAuthConfig,
    }

    impl missive_api::config::ModConfig for MessageAuthModConfig {}
}

pub use config::*;

/// The module name under which [MessageAuth] looks up its configuration.
pub const MESSAGE_AUTH_MOD_NAME: &str = "messageAuth";

/// The protocol context. Holds the single configurable parameter, the
/// replay window, set once at construction and read by every
/// verification.
#[derive(Debug, Clone)]
pub struct MessageAuth {
    allowed_delta: std::time::Duration,
}

impl Default for MessageAuth {
    fn default() -> Self {
        Self::new(MessageAuthConfig::default())
    }
}

impl MessageAuth {
    /// Construct a protocol context from a module config.
    pub fn new(config: MessageAuthConfig) -> Self {
        Self {
            allowed_delta: config.allowed_delta(),
        }
    }

    /// Construct a protocol context, looking up the module config from
    /// a top-level [missive_api::config::Config].
    pub fn create(
        config: &missive_api::config::Config,
    ) -> MsvResult<Self> {
        let config: MessageAuthModConfig =
            config.get_module_config(MESSAGE_AUTH_MOD_NAME)?;
        Ok(Self::new(config.message_auth))
    }

    /// The configured replay window.
    pub fn allowed_delta(&self) -> std::time::Duration {
        self.allowed_delta
    }

    /// Sign a canonical body at the current wall-clock time.
    ///
    /// See [MessageAuth::sign_at].
    pub async fn sign<L: LocalIdentity>(
        &self,
        local: &L,
        body: &[u8],
        signed_for: Option<&PeerId>,
    ) -> MsvResult<MessageHeaders> {
        self.sign_at(local, body, Timestamp::now(), signed_for).await
    }

    /// Sign a canonical body at an explicit timestamp, producing the
    /// header set to transmit alongside it.
    ///
    /// A fresh nonce is minted per call, so signing the same body twice
    /// yields two distinct, independently verifiable header sets. When
    /// `signed_for` is given, the targeted-authentication shares are
    /// generated and bundled into the headers.
    pub async fn sign_at<L: LocalIdentity>(
        &self,
        local: &L,
        body: &[u8],
        now: Timestamp,
        signed_for: Option<&PeerId>,
    ) -> MsvResult<MessageHeaders> {
        let message_id = MessageId::generate();
        let payload = signing_payload(
            now,
            &message_id,
            local.identity(),
            signed_for,
            &content_digest(body),
        );
        let signature = local.sign(payload.as_bytes()).await?;

        let scope = match signed_for {
            None => Scope::Broadcast,
            Some(signed_for) => {
                let key = local.shared_secret(signed_for)?;
                Scope::Targeted(TargetAuth {
                    signed_for: signed_for.clone(),
                    shares: split_secret(
                        &key,
                        &message_id,
                        local.identity(),
                        signed_for,
                    ),
                })
            }
        };

        tracing::trace!(
            signed_by = %local.identity(),
            %message_id,
            targeted = signed_for.is_some(),
            "signed message",
        );

        Ok(MessageHeaders {
            version: PROTOCOL_VERSION.into(),
            timestamp: now,
            message_id,
            signed_by: local.identity().clone(),
            signature,
            scope,
        })
    }

    /// Verify sender authenticity and freshness of a received message.
    ///
    /// Checks run in order, short-circuiting on the first failure:
    /// version, timestamp freshness, then the primary signature over the
    /// payload reconstructed from the received fields and the recomputed
    /// body digest. Any party can run this, including for targeted
    /// messages addressed to someone else; confirming the targeting
    /// itself requires [MessageAuth::verify_for].
    pub fn verify<V: Verifier>(
        &self,
        verifier: &V,
        headers: &MessageHeaders,
        body: &[u8],
        now: Timestamp,
    ) -> MsvResult<()> {
        if headers.version != PROTOCOL_VERSION {
            return Err(MsvError::unsupported_version(&headers.version));
        }

        if headers.timestamp.abs_delta(now) > self.allowed_delta {
            return Err(MsvError::TimestampOutOfWindow {
                timestamp: headers.timestamp,
                now,
            });
        }

        let payload = signing_payload(
            headers.timestamp,
            &headers.message_id,
            &headers.signed_by,
            headers.signed_for(),
            &content_digest(body),
        );

        if !verifier.verify(
            &headers.signed_by,
            payload.as_bytes(),
            &headers.signature,
        ) {
            tracing::debug!(
                signed_by = %headers.signed_by,
                message_id = %headers.message_id,
                "rejecting message with invalid signature",
            );
            return Err(MsvError::InvalidSignature);
        }

        Ok(())
    }

    /// Verify a received message as a specific local identity,
    /// additionally confirming the targeting when the message names this
    /// identity as its receiver.
    ///
    /// When the message is broadcast, or targeted at a different
    /// identity, this is equivalent to [MessageAuth::verify]: targeted
    /// confirmation is only meaningful for the named receiver.
    pub fn verify_for<V: Verifier, L: LocalIdentity>(
        &self,
        verifier: &V,
        local: &L,
        headers: &MessageHeaders,
        body: &[u8],
        now: Timestamp,
    ) -> MsvResult<()> {
        self.verify(verifier, headers, body, now)?;

        if let Scope::Targeted(auth) = &headers.scope {
            if &auth.signed_for == local.identity() {
                let key = local
                    .shared_secret(&headers.signed_by)
                    .map_err(|_| MsvError::InvalidTargetAuth)?;
                open_shares(
                    &key,
                    &headers.message_id,
                    &headers.signed_by,
                    auth,
                )?;
            }
        }

        Ok(())
    }
}

/// Build the exact payload the primary signature covers.
fn signing_payload(
    timestamp: Timestamp,
    message_id: &MessageId,
    signed_by: &PeerId,
    signed_for: Option<&PeerId>,
    digest: &[u8; canonical::DIGEST_LEN],
) -> String {
    use base64::prelude::*;
    format!(
        "{timestamp}.{message_id}.{signed_by}.{}.{}",
        signed_for.map(|p| p.to_string()).unwrap_or_default(),
        BASE64_URL_SAFE_NO_PAD.encode(digest),
    )
}

// Domain separation contexts for the share derivation hashes.
const SHARE_MASK_CONTEXT: &[u8] = b"missive-target-mask-v2";
const SHARE_TAG_CONTEXT: &[u8] = b"missive-target-tag-v2";

fn sha512_parts(parts: &[&[u8]]) -> [u8; SHARE_LEN] {
    use sha2::Digest;
    let mut hasher = sha2::Sha512::new();
    for part in parts {
        hasher.update(part);
    }
    let mut out = [0_u8; SHARE_LEN];
    out.copy_from_slice(&hasher.finalize());
    out
}

fn share_mask(key: &[u8], message_id: &MessageId) -> [u8; SHARE_LEN] {
    sha512_parts(&[SHARE_MASK_CONTEXT, key, message_id])
}

fn share_tag(
    key: &[u8],
    secret: &[u8; SHARE_LEN],
    message_id: &MessageId,
    signed_by: &PeerId,
    signed_for: &PeerId,
) -> [u8; SHARE_LEN] {
    sha512_parts(&[
        SHARE_TAG_CONTEXT,
        key,
        secret,
        message_id,
        signed_by,
        signed_for,
    ])
}

/// Split a fresh single-use secret into the three wire shares.
///
/// `s0` is a one-time pad, `s1` is the secret under that pad and the
/// keyed mask, `s2` is the keyed commitment tag over the secret. The
/// mask and tag both require `key`, the sender/target shared secret, so
/// no party without the target's private key can recombine or forge.
fn split_secret(
    key: &[u8],
    message_id: &MessageId,
    signed_by: &PeerId,
    signed_for: &PeerId,
) -> [bytes::Bytes; 3] {
    use rand::RngCore;
    let mut secret = [0_u8; SHARE_LEN];
    rand::rngs::OsRng.fill_bytes(&mut secret);
    let mut pad = [0_u8; SHARE_LEN];
    rand::rngs::OsRng.fill_bytes(&mut pad);

    let mask = share_mask(key, message_id);
    let mut masked = [0_u8; SHARE_LEN];
    for i in 0..SHARE_LEN {
        masked[i] = secret[i] ^ pad[i] ^ mask[i];
    }

    let tag = share_tag(key, &secret, message_id, signed_by, signed_for);

    [
        bytes::Bytes::copy_from_slice(&pad),
        bytes::Bytes::copy_from_slice(&masked),
        bytes::Bytes::copy_from_slice(&tag),
    ]
}

/// Recombine received shares and confirm they commit to this message.
fn open_shares(
    key: &[u8],
    message_id: &MessageId,
    signed_by: &PeerId,
    auth: &TargetAuth,
) -> MsvResult<()> {
    let [pad, masked, tag] = &auth.shares;
    if pad.len() != SHARE_LEN
        || masked.len() != SHARE_LEN
        || tag.len() != SHARE_LEN
    {
        return Err(MsvError::InvalidTargetAuth);
    }

    let mask = share_mask(key, message_id);
    let mut secret = [0_u8; SHARE_LEN];
    for i in 0..SHARE_LEN {
        secret[i] = pad[i] ^ masked[i] ^ mask[i];
    }

    let expect =
        share_tag(key, &secret, message_id, signed_by, &auth.signed_for);
    // The tag is exactly the value a forger must guess, so the
    // comparison must not leak which byte diverged.
    use subtle::ConstantTimeEq;
    let tag: &[u8] = tag;
    if !bool::from(tag.ct_eq(&expect)) {
        return Err(MsvError::InvalidTargetAuth);
    }

    Ok(())
}
