//! Missive error types.

use crate::Timestamp;
use std::sync::Arc;

/// A clonable trait-object inner error.
#[derive(Clone, Default)]
pub struct DynInnerError(
    pub Option<Arc<dyn std::error::Error + 'static + Send + Sync>>,
);

impl std::fmt::Debug for DynInnerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl std::fmt::Display for DynInnerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.0.as_ref() {
            None => f.write_str("None"),
            Some(s) => s.fmt(f),
        }
    }
}

impl std::error::Error for DynInnerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.0.as_ref().map(|s| {
            let out: &(dyn std::error::Error + 'static) = &**s;
            out
        })
    }
}

impl DynInnerError {
    /// Construct a new DynInnerError from a source error.
    pub fn new<E: std::error::Error + 'static + Send + Sync>(e: E) -> Self {
        Self(Some(Arc::new(e)))
    }
}

/// The missive error type. Every protocol operation reports a specific
/// kind, never a generic failure, so callers can react differently to,
/// say, a stale timestamp versus a forged signature.
///
/// This type is required to implement `Clone` to ease the use of
/// shared futures, which require the entire `Result` to be `Clone`.
#[derive(Debug, Clone, thiserror::Error)]
pub enum MsvError {
    /// A message could not be canonically encoded.
    #[error("could not encode message: {ctx} (src: {src})")]
    Encoding {
        /// Any context associated with this error.
        ctx: Arc<str>,

        /// The inner error (if any).
        #[source]
        src: DynInnerError,
    },

    /// The signer was unable to produce a signature.
    #[error("could not sign message: {ctx} (src: {src})")]
    Signing {
        /// Any context associated with this error.
        ctx: Arc<str>,

        /// The inner error (if any).
        #[source]
        src: DynInnerError,
    },

    /// A received header set is structurally invalid, including the
    /// partially-populated targeted case.
    #[error("malformed headers: {ctx}")]
    MalformedHeader {
        /// Any context associated with this error.
        ctx: Arc<str>,
    },

    /// A received protocol version is not recognized.
    #[error("unsupported protocol version: {version}")]
    UnsupportedVersion {
        /// The version value that was received.
        version: Arc<str>,
    },

    /// A received timestamp is outside the replay window, in either
    /// direction.
    #[error("timestamp outside replay window: signed at {timestamp}ms, verified at {now}ms")]
    TimestampOutOfWindow {
        /// The timestamp carried in the headers.
        timestamp: Timestamp,

        /// The verifier's clock at the time of the check.
        now: Timestamp,
    },

    /// The primary signature does not verify against the sender identity.
    #[error("invalid request signature")]
    InvalidSignature,

    /// The targeted-authentication shares do not recombine for this
    /// receiver.
    #[error("invalid target authentication")]
    InvalidTargetAuth,
}

impl MsvError {
    /// Construct an encoding error.
    pub fn encoding<C: std::fmt::Display>(ctx: C) -> Self {
        Self::Encoding {
            ctx: ctx.to_string().into_boxed_str().into(),
            src: DynInnerError::default(),
        }
    }

    /// Construct an encoding error with an inner source error.
    pub fn encoding_src<
        C: std::fmt::Display,
        S: std::error::Error + 'static + Send + Sync,
    >(
        ctx: C,
        src: S,
    ) -> Self {
        Self::Encoding {
            ctx: ctx.to_string().into_boxed_str().into(),
            src: DynInnerError::new(src),
        }
    }

    /// Construct a signing error.
    pub fn signing<C: std::fmt::Display>(ctx: C) -> Self {
        Self::Signing {
            ctx: ctx.to_string().into_boxed_str().into(),
            src: DynInnerError::default(),
        }
    }

    /// Construct a signing error with an inner source error.
    pub fn signing_src<
        C: std::fmt::Display,
        S: std::error::Error + 'static + Send + Sync,
    >(
        ctx: C,
        src: S,
    ) -> Self {
        Self::Signing {
            ctx: ctx.to_string().into_boxed_str().into(),
            src: DynInnerError::new(src),
        }
    }

    /// Construct a malformed header error.
    pub fn malformed_header<C: std::fmt::Display>(ctx: C) -> Self {
        Self::MalformedHeader {
            ctx: ctx.to_string().into_boxed_str().into(),
        }
    }

    /// Construct an unsupported version error.
    pub fn unsupported_version<V: std::fmt::Display>(version: V) -> Self {
        Self::UnsupportedVersion {
            version: version.to_string().into_boxed_str().into(),
        }
    }
}

/// The missive result type.
pub type MsvResult<T> = Result<T, MsvError>;

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn error_display() {
        assert_eq!(
            "malformed headers: missing Uuid",
            MsvError::malformed_header("missing Uuid").to_string().as_str(),
        );
        assert_eq!(
            "unsupported protocol version: 9",
            MsvError::unsupported_version("9").to_string().as_str(),
        );
        assert_eq!(
            "could not encode message: bla (src: None)",
            MsvError::encoding("bla").to_string().as_str(),
        );
        assert_eq!(
            "could not sign message: foo (src: bar)",
            MsvError::signing_src("foo", std::io::Error::other("bar"))
                .to_string()
                .as_str(),
        );
    }

    #[test]
    fn error_kinds_are_distinguishable() {
        let err = MsvError::TimestampOutOfWindow {
            timestamp: Timestamp::from_millis(1000),
            now: Timestamp::from_millis(9001),
        };
        assert!(matches!(err, MsvError::TimestampOutOfWindow { .. }));
        assert!(matches!(
            MsvError::InvalidSignature,
            MsvError::InvalidSignature,
        ));
    }

    #[test]
    fn ensure_msv_error_type_is_send_and_sync() {
        fn ensure<T: std::fmt::Display + Send + Sync + Clone>(_t: T) {}
        ensure(MsvError::InvalidSignature);
    }
}
