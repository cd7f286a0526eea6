//! Typed payload conversion.
//!
//! [`Payload`] is the decoder/encoder pair a handler registration resolves at
//! setup time. It is implemented here for the primitive Rust types, the dynamic
//! [`Value`], raw [`Envelope`]s and `()`. Application types opt in through
//! [`proto_payload!`](crate::proto_payload) or [`json_payload!`](crate::json_payload).

use serde::{de::DeserializeOwned, Serialize};

use super::{
    decode, decode_primitive, encode, split_type_url, type_name_from_url, type_url, CodecError,
    Envelope, Kind, PrimitiveKind, Value, JSON_TYPE_URL_PREFIX,
};

const EMPTY_TYPE_NAME: &str = "google.protobuf.Empty";

/// A value that can cross the engine boundary as an [`Envelope`].
pub trait Payload: Sized {
    /// Encode into an envelope.
    fn to_envelope(&self) -> Result<Envelope, CodecError>;

    /// Decode from an envelope.
    fn from_envelope(envelope: &Envelope) -> Result<Self, CodecError>;
}

macro_rules! primitive_payload {
    ($ty:ty, $variant:ident) => {
        impl Payload for $ty {
            fn to_envelope(&self) -> Result<Envelope, CodecError> {
                encode(
                    &Value::$variant(self.to_owned()),
                    &Kind::Primitive(PrimitiveKind::$variant),
                )
            }

            fn from_envelope(envelope: &Envelope) -> Result<Self, CodecError> {
                match decode(envelope)? {
                    Value::$variant(v) => Ok(v),
                    other => Err(CodecError::KindMismatch {
                        expected: PrimitiveKind::$variant.to_string(),
                        actual: other.kind().to_string(),
                    }),
                }
            }
        }
    };
}

primitive_payload!(String, String);
primitive_payload!(Vec<u8>, Bytes);
primitive_payload!(bool, Bool);
primitive_payload!(f64, Double);
primitive_payload!(f32, Float);
primitive_payload!(i32, Int32);
primitive_payload!(i64, Int64);
primitive_payload!(u32, Uint32);
primitive_payload!(u64, Uint64);

impl Payload for Value {
    fn to_envelope(&self) -> Result<Envelope, CodecError> {
        encode(self, &self.kind())
    }

    fn from_envelope(envelope: &Envelope) -> Result<Self, CodecError> {
        decode(envelope)
    }
}

/// Raw envelopes pass through untouched.
impl Payload for Envelope {
    fn to_envelope(&self) -> Result<Envelope, CodecError> {
        Ok(self.clone())
    }

    fn from_envelope(envelope: &Envelope) -> Result<Self, CodecError> {
        Ok(envelope.clone())
    }
}

/// The unit reply, encoded as `google.protobuf.Empty`.
impl Payload for () {
    fn to_envelope(&self) -> Result<Envelope, CodecError> {
        Ok(Envelope {
            type_url: type_url(EMPTY_TYPE_NAME),
            value: Vec::new(),
        })
    }

    fn from_envelope(envelope: &Envelope) -> Result<Self, CodecError> {
        if type_name_from_url(&envelope.type_url) != EMPTY_TYPE_NAME {
            return Err(CodecError::UnexpectedType {
                expected: EMPTY_TYPE_NAME.to_string(),
                actual: envelope.type_url.clone(),
            });
        }
        Ok(())
    }
}

/// Pack a protobuf message into an envelope under the given type name.
pub fn pack_message<M: prost::Message>(msg: &M, type_name: &str) -> Envelope {
    Envelope {
        type_url: type_url(type_name),
        value: msg.encode_to_vec(),
    }
}

/// Unpack a protobuf message, checking the envelope carries `type_name`.
pub fn unpack_message<M: prost::Message + Default>(
    envelope: &Envelope,
    type_name: &str,
) -> Result<M, CodecError> {
    let actual = type_name_from_url(&envelope.type_url);
    if actual != type_name {
        return Err(CodecError::UnexpectedType {
            expected: type_name.to_string(),
            actual: envelope.type_url.clone(),
        });
    }
    M::decode(envelope.value.as_slice()).map_err(|source| CodecError::Decode {
        kind: type_name.to_string(),
        source,
    })
}

/// Pack a serde value as a JSON envelope.
///
/// The JSON text travels as a string primitive payload.
pub fn pack_json<T: Serialize + ?Sized>(type_name: &str, value: &T) -> Result<Envelope, CodecError> {
    let text = serde_json::to_string(value).map_err(|source| CodecError::Json {
        type_name: type_name.to_string(),
        source,
    })?;
    let payload = encode(&Value::String(text), &Kind::Primitive(PrimitiveKind::String))?;
    Ok(Envelope {
        type_url: format!("{JSON_TYPE_URL_PREFIX}{type_name}"),
        value: payload.value,
    })
}

/// Unpack a JSON envelope into a serde value.
pub fn unpack_json<T: DeserializeOwned>(envelope: &Envelope) -> Result<T, CodecError> {
    let (prefix, type_name) = split_type_url(&envelope.type_url);
    if prefix != JSON_TYPE_URL_PREFIX {
        return Err(CodecError::UnexpectedType {
            expected: format!("{JSON_TYPE_URL_PREFIX}*"),
            actual: envelope.type_url.clone(),
        });
    }
    let text = match decode_primitive(PrimitiveKind::String, &envelope.value)? {
        Value::String(text) => text,
        other => {
            return Err(CodecError::KindMismatch {
                expected: PrimitiveKind::String.to_string(),
                actual: other.kind().to_string(),
            })
        }
    };
    serde_json::from_str(&text).map_err(|source| CodecError::Json {
        type_name: type_name.to_string(),
        source,
    })
}

/// Implement [`Payload`] for a `prost::Message` under a fully-qualified name.
///
/// ```rust,ignore
/// proto_payload!(AddLineItem => "com.example.shoppingcart.AddLineItem");
/// ```
#[macro_export]
macro_rules! proto_payload {
    ($ty:ty => $name:expr) => {
        impl $crate::codec::Payload for $ty {
            fn to_envelope(
                &self,
            ) -> ::std::result::Result<$crate::codec::Envelope, $crate::codec::CodecError> {
                Ok($crate::codec::pack_message(self, $name))
            }

            fn from_envelope(
                envelope: &$crate::codec::Envelope,
            ) -> ::std::result::Result<Self, $crate::codec::CodecError> {
                $crate::codec::unpack_message(envelope, $name)
            }
        }
    };
}

/// Implement [`Payload`] for a serde type carried as JSON.
///
/// ```rust,ignore
/// json_payload!(Profile => "Profile");
/// ```
#[macro_export]
macro_rules! json_payload {
    ($ty:ty => $name:expr) => {
        impl $crate::codec::Payload for $ty {
            fn to_envelope(
                &self,
            ) -> ::std::result::Result<$crate::codec::Envelope, $crate::codec::CodecError> {
                $crate::codec::pack_json($name, self)
            }

            fn from_envelope(
                envelope: &$crate::codec::Envelope,
            ) -> ::std::result::Result<Self, $crate::codec::CodecError> {
                $crate::codec::unpack_json(envelope)
            }
        }
    };
}
