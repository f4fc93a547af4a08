//! Canonical message body encoding.
//!
//! Both signer and verifier must independently derive byte-identical
//! encodings of the same logical message, so the encoding rule is fixed:
//! compact JSON with object keys explicitly sorted byte-wise. Key order
//! is sorted here on every encode rather than relying on any container's
//! iteration order.
//!
//! The digest of the canonical body, not the body itself, is what ends
//! up inside the signed payload, so the payload size signed is bounded
//! regardless of body size.

use crate::*;

/// Encode any serializable message as its canonical body bytes.
///
/// Two semantically-equal messages always produce identical bytes,
/// regardless of how their maps were constructed. Fails with an
/// encoding error if the message is not representable as JSON
/// (e.g. a map with non-string keys, a non-finite number, or a
/// failing Serialize impl).
pub fn canonical_body<T: serde::Serialize>(
    message: &T,
) -> MsvResult<bytes::Bytes> {
    message.serialize(FiniteCheck).map_err(|e| {
        MsvError::encoding_src("message is not representable as json", e)
    })?;
    let value = serde_json::to_value(message).map_err(|e| {
        MsvError::encoding_src("message is not representable as json", e)
    })?;
    let mut out = Vec::new();
    write_canonical(&value, &mut out)?;
    Ok(out.into())
}

fn write_canonical(
    value: &serde_json::Value,
    out: &mut Vec<u8>,
) -> MsvResult<()> {
    use serde_json::Value::*;
    match value {
        Null => out.extend_from_slice(b"null"),
        Bool(true) => out.extend_from_slice(b"true"),
        Bool(false) => out.extend_from_slice(b"false"),
        // serde_json renders numbers with its shortest round-trip
        // formatting, which is stable for a given value.
        Number(n) => out.extend_from_slice(n.to_string().as_bytes()),
        String(s) => {
            let s = serde_json::to_string(s)
                .map_err(|e| MsvError::encoding_src("string escaping", e))?;
            out.extend_from_slice(s.as_bytes());
        }
        Array(items) => {
            out.push(b'[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(b',');
                }
                write_canonical(item, out)?;
            }
            out.push(b']');
        }
        Object(map) => {
            let mut entries: Vec<(&std::string::String, &serde_json::Value)> =
                map.iter().collect();
            entries.sort_unstable_by_key(|(k, _)| *k);
            out.push(b'{');
            for (i, (key, val)) in entries.iter().enumerate() {
                if i > 0 {
                    out.push(b',');
                }
                let k = serde_json::to_string(key)
                    .map_err(|e| MsvError::encoding_src("key escaping", e))?;
                out.extend_from_slice(k.as_bytes());
                out.push(b':');
                write_canonical(val, out)?;
            }
            out.push(b'}');
        }
    }
    Ok(())
}

// The json value conversion maps NaN and the infinities to null, so a
// message containing them has to be rejected before it can collide
// with a message containing a genuine null. This serializer walks the
// message and errors on the first non-finite number; it produces no
// output.
#[derive(Clone, Copy)]
struct FiniteCheck;

#[derive(Debug)]
struct NonFiniteError(String);

impl std::fmt::Display for NonFiniteError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for NonFiniteError {}

impl serde::ser::Error for NonFiniteError {
    fn custom<T: std::fmt::Display>(msg: T) -> Self {
        Self(msg.to_string())
    }
}

macro_rules! imp_pass {
    ($($f:ident($t:ty),)*) => {$(
        fn $f(self, _v: $t) -> Result<(), NonFiniteError> {
            Ok(())
        }
    )*};
}

impl serde::Serializer for FiniteCheck {
    type Ok = ();
    type Error = NonFiniteError;
    type SerializeSeq = Self;
    type SerializeTuple = Self;
    type SerializeTupleStruct = Self;
    type SerializeTupleVariant = Self;
    type SerializeMap = Self;
    type SerializeStruct = Self;
    type SerializeStructVariant = Self;

    imp_pass! {
        serialize_bool(bool),
        serialize_i8(i8),
        serialize_i16(i16),
        serialize_i32(i32),
        serialize_i64(i64),
        serialize_u8(u8),
        serialize_u16(u16),
        serialize_u32(u32),
        serialize_u64(u64),
        serialize_char(char),
        serialize_str(&str),
        serialize_bytes(&[u8]),
    }

    fn serialize_f32(self, v: f32) -> Result<(), NonFiniteError> {
        self.serialize_f64(v.into())
    }

    fn serialize_f64(self, v: f64) -> Result<(), NonFiniteError> {
        if v.is_finite() {
            Ok(())
        } else {
            Err(NonFiniteError(format!("non-finite number: {v}")))
        }
    }

    fn serialize_none(self) -> Result<(), NonFiniteError> {
        Ok(())
    }

    fn serialize_some<T: serde::Serialize + ?Sized>(
        self,
        value: &T,
    ) -> Result<(), NonFiniteError> {
        value.serialize(self)
    }

    fn serialize_unit(self) -> Result<(), NonFiniteError> {
        Ok(())
    }

    fn serialize_unit_struct(
        self,
        _name: &'static str,
    ) -> Result<(), NonFiniteError> {
        Ok(())
    }

    fn serialize_unit_variant(
        self,
        _name: &'static str,
        _index: u32,
        _variant: &'static str,
    ) -> Result<(), NonFiniteError> {
        Ok(())
    }

    fn serialize_newtype_struct<T: serde::Serialize + ?Sized>(
        self,
        _name: &'static str,
        value: &T,
    ) -> Result<(), NonFiniteError> {
        value.serialize(self)
    }

    fn serialize_newtype_variant<T: serde::Serialize + ?Sized>(
        self,
        _name: &'static str,
        _index: u32,
        _variant: &'static str,
        value: &T,
    ) -> Result<(), NonFiniteError> {
        value.serialize(self)
    }

    fn serialize_seq(
        self,
        _len: Option<usize>,
    ) -> Result<Self, NonFiniteError> {
        Ok(self)
    }

    fn serialize_tuple(self, _len: usize) -> Result<Self, NonFiniteError> {
        Ok(self)
    }

    fn serialize_tuple_struct(
        self,
        _name: &'static str,
        _len: usize,
    ) -> Result<Self, NonFiniteError> {
        Ok(self)
    }

    fn serialize_tuple_variant(
        self,
        _name: &'static str,
        _index: u32,
        _variant: &'static str,
        _len: usize,
    ) -> Result<Self, NonFiniteError> {
        Ok(self)
    }

    fn serialize_map(
        self,
        _len: Option<usize>,
    ) -> Result<Self, NonFiniteError> {
        Ok(self)
    }

    fn serialize_struct(
        self,
        _name: &'static str,
        _len: usize,
    ) -> Result<Self, NonFiniteError> {
        Ok(self)
    }

    fn serialize_struct_variant(
        self,
        _name: &'static str,
        _index: u32,
        _variant: &'static str,
        _len: usize,
    ) -> Result<Self, NonFiniteError> {
        Ok(self)
    }
}

impl serde::ser::SerializeSeq for FiniteCheck {
    type Ok = ();
    type Error = NonFiniteError;

    fn serialize_element<T: serde::Serialize + ?Sized>(
        &mut self,
        value: &T,
    ) -> Result<(), NonFiniteError> {
        value.serialize(FiniteCheck)
    }

    fn end(self) -> Result<(), NonFiniteError> {
        Ok(())
    }
}

impl serde::ser::SerializeTuple for FiniteCheck {
    type Ok = ();
    type Error = NonFiniteError;

    fn serialize_element<T: serde::Serialize + ?Sized>(
        &mut self,
        value: &T,
    ) -> Result<(), NonFiniteError> {
        value.serialize(FiniteCheck)
    }

    fn end(self) -> Result<(), NonFiniteError> {
        Ok(())
    }
}

impl serde::ser::SerializeTupleStruct for FiniteCheck {
    type Ok = ();
    type Error = NonFiniteError;

    fn serialize_field<T: serde::Serialize + ?Sized>(
        &mut self,
        value: &T,
    ) -> Result<(), NonFiniteError> {
        value.serialize(FiniteCheck)
    }

    fn end(self) -> Result<(), NonFiniteError> {
        Ok(())
    }
}

impl serde::ser::SerializeTupleVariant for FiniteCheck {
    type Ok = ();
    type Error = NonFiniteError;

    fn serialize_field<T: serde::Serialize + ?Sized>(
        &mut self,
        value: &T,
    ) -> Result<(), NonFiniteError> {
        value.serialize(FiniteCheck)
    }

    fn end(self) -> Result<(), NonFiniteError> {
        Ok(())
    }
}

impl serde::ser::SerializeMap for FiniteCheck {
    type Ok = ();
    type Error = NonFiniteError;

    fn serialize_key<T: serde::Serialize + ?Sized>(
        &mut self,
        key: &T,
    ) -> Result<(), NonFiniteError> {
        key.serialize(FiniteCheck)
    }

    fn serialize_value<T: serde::Serialize + ?Sized>(
        &mut self,
        value: &T,
    ) -> Result<(), NonFiniteError> {
        value.serialize(FiniteCheck)
    }

    fn end(self) -> Result<(), NonFiniteError> {
        Ok(())
    }
}

impl serde::ser::SerializeStruct for FiniteCheck {
    type Ok = ();
    type Error = NonFiniteError;

    fn serialize_field<T: serde::Serialize + ?Sized>(
        &mut self,
        _key: &'static str,
        value: &T,
    ) -> Result<(), NonFiniteError> {
        value.serialize(FiniteCheck)
    }

    fn end(self) -> Result<(), NonFiniteError> {
        Ok(())
    }
}

impl serde::ser::SerializeStructVariant for FiniteCheck {
    type Ok = ();
    type Error = NonFiniteError;

    fn serialize_field<T: serde::Serialize + ?Sized>(
        &mut self,
        _key: &'static str,
        value: &T,
    ) -> Result<(), NonFiniteError> {
        value.serialize(FiniteCheck)
    }

    fn end(self) -> Result<(), NonFiniteError> {
        Ok(())
    }
}

/// The byte length of a content digest.
pub const DIGEST_LEN: usize = 32;

/// Compute the fixed-length SHA-256 content digest of a canonical body.
pub fn content_digest(body: &[u8]) -> [u8; DIGEST_LEN] {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(body);
    hasher.finalize().into()
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn equal_messages_encode_identically() {
        #[derive(serde::Serialize)]
        struct Msg {
            zebra: u32,
            apple: &'static str,
        }

        // Same logical content built three different ways.
        let a = canonical_body(&Msg {
            zebra: 7,
            apple: "crisp",
        })
        .unwrap();
        let b = canonical_body(
            &serde_json::json!({ "zebra": 7, "apple": "crisp" }),
        )
        .unwrap();
        let mut m = std::collections::HashMap::new();
        m.insert("apple", serde_json::json!("crisp"));
        m.insert("zebra", serde_json::json!(7));
        let c = canonical_body(&m).unwrap();

        assert_eq!(a, b);
        assert_eq!(b, c);
        assert_eq!(a, br#"{"apple":"crisp","zebra":7}"#.as_slice());
    }

    #[test]
    fn nested_keys_are_sorted() {
        let body = canonical_body(&serde_json::json!({
            "outer": { "b": [1, 2], "a": { "y": null, "x": true } },
        }))
        .unwrap();
        assert_eq!(
            body,
            br#"{"outer":{"a":{"x":true,"y":null},"b":[1,2]}}"#.as_slice(),
        );
    }

    #[test]
    fn different_messages_encode_differently() {
        let a = canonical_body(&serde_json::json!({ "data": "Hello" }))
            .unwrap();
        let b = canonical_body(&serde_json::json!({ "data": "hello" }))
            .unwrap();
        assert_ne!(a, b);
        assert_ne!(content_digest(&a), content_digest(&b));
    }

    #[test]
    fn non_finite_numbers_are_an_encoding_error() {
        for bad in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            let mut m = std::collections::HashMap::new();
            m.insert("x", bad);
            let err = canonical_body(&m).unwrap_err();
            assert!(matches!(err, MsvError::Encoding { .. }), "{bad}");
        }

        // including nested, and f32
        #[derive(serde::Serialize)]
        struct Msg {
            values: Vec<f32>,
        }
        let err = canonical_body(&Msg {
            values: vec![1.0, f32::NAN],
        })
        .unwrap_err();
        assert!(matches!(err, MsvError::Encoding { .. }));

        // finite floats still encode
        let mut m = std::collections::HashMap::new();
        m.insert("x", 1.5_f64);
        assert_eq!(canonical_body(&m).unwrap(), br#"{"x":1.5}"#.as_slice());
    }

    #[test]
    fn nan_never_collides_with_null() {
        let null_body =
            canonical_body(&serde_json::json!({ "x": null })).unwrap();
        assert_eq!(null_body, br#"{"x":null}"#.as_slice());

        // a NaN value errors rather than canonicalizing to the same
        // bytes as a genuine null
        let mut m = std::collections::HashMap::new();
        m.insert("x", f64::NAN);
        assert!(canonical_body(&m).is_err());
    }

    #[test]
    fn non_string_keys_are_an_encoding_error() {
        let mut m = std::collections::BTreeMap::new();
        m.insert((1_u8, 2_u8), "pair keys are not json");
        let err = canonical_body(&m).unwrap_err();
        assert!(matches!(err, MsvError::Encoding { .. }));
    }

    #[test]
    fn digest_is_fixed_length() {
        assert_eq!(DIGEST_LEN, content_digest(b"").len());
        assert_eq!(DIGEST_LEN, content_digest(&[0_u8; 4096]).len());
    }
}
