#![deny(missing_docs)]
//! Missive API contains the traits and basic types required to define
//! the message authentication protocol: canonical body encoding, header
//! construction and parsing, and the key capability seams.
//!
//! If you want a working ed25519 implementation of these traits, please
//! see the missive_core crate.

/// Boxed future type.
pub type BoxFut<'a, T> =
    std::pin::Pin<Box<dyn std::future::Future<Output = T> + Send + 'a>>;

pub(crate) mod serde_bytes_base64 {
    pub fn serialize<S>(
        b: &bytes::Bytes,
        serializer: S,
    ) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use base64::prelude::*;
        serializer.serialize_str(&BASE64_URL_SAFE_NO_PAD.encode(b))
    }

    pub fn deserialize<'de, D, T: From<bytes::Bytes>>(
        deserializer: D,
    ) -> Result<T, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        use base64::prelude::*;
        let s: &'de str = serde::Deserialize::deserialize(deserializer)?;
        BASE64_URL_SAFE_NO_PAD
            .decode(s)
            .map(|v| bytes::Bytes::copy_from_slice(&v).into())
            .map_err(serde::de::Error::custom)
    }
}

pub mod canonical;
pub mod config;
pub mod headers;
pub mod keys;

mod error;
pub use error::*;

pub mod id;
pub use id::{MessageId, PeerId, MESSAGE_ID_LEN};

mod timestamp;
pub use timestamp::*;
