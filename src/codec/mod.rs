//! Opaque value codec.
//!
//! Commands, replies, events and value-entity state cross the engine boundary
//! as [`Envelope`]s (`google.protobuf.Any`): a type URL plus encoded bytes.
//! The type URL prefix tells the decoder what it is looking at:
//!
//! - `p.akkaserverless.com/<kind>`: one of the nine primitive kinds, encoded as
//!   the matching protobuf wrapper message (field 1).
//! - `json.akkaserverless.com/<Type>`: an application value serialized as JSON,
//!   the JSON text carried as a string primitive.
//! - anything else: an application protobuf message, passed through untouched.
//!
//! The zero value of a primitive kind encodes to an empty payload, and an empty
//! payload decodes to the zero value. Only the bit-exact zero is elided, so
//! `-0.0` and NaN are always written out.

mod payload;

pub use payload::{pack_json, pack_message, unpack_json, unpack_message, Payload};

use std::fmt;
use std::str::FromStr;

use prost::encoding;
use prost::Message;

/// Self-describing payload envelope exchanged with the driver.
pub type Envelope = prost_types::Any;

/// Reserved type URL prefix for primitive values.
pub const PRIMITIVE_TYPE_URL_PREFIX: &str = "p.akkaserverless.com/";
/// Type URL prefix for JSON-encoded application values.
pub const JSON_TYPE_URL_PREFIX: &str = "json.akkaserverless.com/";
/// Default type URL prefix for protocol buffer messages.
pub const TYPE_URL_PREFIX: &str = "type.googleapis.com/";

/// Field number of the `value` field in every protobuf wrapper message.
const WRAPPER_FIELD: u32 = 1;

/// Errors produced while encoding or decoding envelopes.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// The kind name (or primitive type URL) is outside the supported set.
    #[error("unsupported kind: {0}")]
    UnsupportedKind(String),

    /// The value does not belong to the kind it was encoded or decoded as.
    #[error("kind mismatch: expected {expected}, got {actual}")]
    KindMismatch { expected: String, actual: String },

    /// An application type URL uses a prefix reserved for primitive or JSON values.
    #[error("reserved type url for application message: {0}")]
    ReservedTypeUrl(String),

    /// The envelope carries a different application type than requested.
    #[error("unexpected type: expected {expected}, got {actual}")]
    UnexpectedType { expected: String, actual: String },

    /// A non-empty payload could not be decoded.
    #[error("failed to decode {kind}: {source}")]
    Decode {
        kind: String,
        #[source]
        source: prost::DecodeError,
    },

    /// JSON (de)serialization failed.
    #[error("json error for {type_name}: {source}")]
    Json {
        type_name: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Build a fully-qualified type URL from a message type name.
pub fn type_url(type_name: &str) -> String {
    format!("{TYPE_URL_PREFIX}{type_name}")
}

/// Extract the type name from a type URL.
///
/// Returns the part after the last `/` or the whole string if no `/` present.
pub fn type_name_from_url(type_url: &str) -> &str {
    type_url.rsplit('/').next().unwrap_or(type_url)
}

/// Returns true if the type URL is in the reserved primitive namespace.
pub fn is_primitive_url(type_url: &str) -> bool {
    type_url.starts_with(PRIMITIVE_TYPE_URL_PREFIX)
}

/// Split a type URL into its host prefix (including the `/`) and type name.
fn split_type_url(type_url: &str) -> (&str, &str) {
    match type_url.find('/') {
        Some(idx) => (&type_url[..=idx], &type_url[idx + 1..]),
        None => ("", type_url),
    }
}

/// The primitive kinds the codec understands natively.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveKind {
    String,
    Bytes,
    Bool,
    Double,
    Float,
    Int32,
    Int64,
    Uint32,
    Uint64,
}

impl PrimitiveKind {
    /// Every supported primitive kind.
    pub const ALL: [PrimitiveKind; 9] = [
        PrimitiveKind::String,
        PrimitiveKind::Bytes,
        PrimitiveKind::Bool,
        PrimitiveKind::Double,
        PrimitiveKind::Float,
        PrimitiveKind::Int32,
        PrimitiveKind::Int64,
        PrimitiveKind::Uint32,
        PrimitiveKind::Uint64,
    ];

    /// Protobuf scalar name of the kind, as used in the type URL.
    pub fn name(self) -> &'static str {
        match self {
            PrimitiveKind::String => "string",
            PrimitiveKind::Bytes => "bytes",
            PrimitiveKind::Bool => "bool",
            PrimitiveKind::Double => "double",
            PrimitiveKind::Float => "float",
            PrimitiveKind::Int32 => "int32",
            PrimitiveKind::Int64 => "int64",
            PrimitiveKind::Uint32 => "uint32",
            PrimitiveKind::Uint64 => "uint64",
        }
    }

    /// Type URL in the reserved primitive namespace.
    pub fn type_url(self) -> String {
        format!("{PRIMITIVE_TYPE_URL_PREFIX}{}", self.name())
    }

    /// The default value of the kind.
    pub fn zero(self) -> Value {
        match self {
            PrimitiveKind::String => Value::String(String::new()),
            PrimitiveKind::Bytes => Value::Bytes(Vec::new()),
            PrimitiveKind::Bool => Value::Bool(false),
            PrimitiveKind::Double => Value::Double(0.0),
            PrimitiveKind::Float => Value::Float(0.0),
            PrimitiveKind::Int32 => Value::Int32(0),
            PrimitiveKind::Int64 => Value::Int64(0),
            PrimitiveKind::Uint32 => Value::Uint32(0),
            PrimitiveKind::Uint64 => Value::Uint64(0),
        }
    }
}

impl fmt::Display for PrimitiveKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for PrimitiveKind {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PrimitiveKind::ALL
            .into_iter()
            .find(|kind| kind.name() == s)
            .ok_or_else(|| CodecError::UnsupportedKind(s.to_string()))
    }
}

/// What an envelope is expected to carry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Kind {
    /// One of the nine primitive kinds.
    Primitive(PrimitiveKind),
    /// JSON-encoded application value with the given type name.
    Json(String),
    /// Application protobuf message with the given fully-qualified name.
    Message(String),
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Kind::Primitive(kind) => write!(f, "{kind}"),
            Kind::Json(name) => write!(f, "{JSON_TYPE_URL_PREFIX}{name}"),
            Kind::Message(name) => f.write_str(name),
        }
    }
}

impl FromStr for Kind {
    type Err = CodecError;

    /// Parse a kind name.
    ///
    /// Bare names must be primitive kinds. Application messages are named by a
    /// fully-qualified name (`pkg.Type`) or a type URL.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (prefix, name) = split_type_url(s);
        match prefix {
            PRIMITIVE_TYPE_URL_PREFIX => Ok(Kind::Primitive(name.parse()?)),
            JSON_TYPE_URL_PREFIX => Ok(Kind::Json(name.to_string())),
            "" if name.contains('.') => Ok(Kind::Message(name.to_string())),
            "" => Ok(Kind::Primitive(name.parse()?)),
            _ => Ok(Kind::Message(name.to_string())),
        }
    }
}

/// A decoded opaque value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    String(String),
    Bytes(Vec<u8>),
    Bool(bool),
    Double(f64),
    Float(f32),
    Int32(i32),
    Int64(i64),
    Uint32(u32),
    Uint64(u64),
    /// JSON application value.
    Json {
        type_name: String,
        value: serde_json::Value,
    },
    /// Application message, kept as its original type URL and bytes.
    Message { type_url: String, bytes: Vec<u8> },
}

impl Value {
    /// The kind this value belongs to.
    pub fn kind(&self) -> Kind {
        match self {
            Value::String(_) => Kind::Primitive(PrimitiveKind::String),
            Value::Bytes(_) => Kind::Primitive(PrimitiveKind::Bytes),
            Value::Bool(_) => Kind::Primitive(PrimitiveKind::Bool),
            Value::Double(_) => Kind::Primitive(PrimitiveKind::Double),
            Value::Float(_) => Kind::Primitive(PrimitiveKind::Float),
            Value::Int32(_) => Kind::Primitive(PrimitiveKind::Int32),
            Value::Int64(_) => Kind::Primitive(PrimitiveKind::Int64),
            Value::Uint32(_) => Kind::Primitive(PrimitiveKind::Uint32),
            Value::Uint64(_) => Kind::Primitive(PrimitiveKind::Uint64),
            Value::Json { type_name, .. } => Kind::Json(type_name.clone()),
            Value::Message { type_url, .. } => {
                Kind::Message(type_name_from_url(type_url).to_string())
            }
        }
    }

    /// The primitive kind, or `None` for application values.
    pub fn primitive_kind(&self) -> Option<PrimitiveKind> {
        match self.kind() {
            Kind::Primitive(kind) => Some(kind),
            Kind::Json(_) | Kind::Message(_) => None,
        }
    }

    /// True only for the canonical zero of a primitive kind.
    ///
    /// Floating point values compare by bit pattern: `-0.0` and NaN are not zero.
    pub fn is_zero(&self) -> bool {
        match self {
            Value::String(v) => v.is_empty(),
            Value::Bytes(v) => v.is_empty(),
            Value::Bool(v) => !v,
            Value::Double(v) => v.to_bits() == 0,
            Value::Float(v) => v.to_bits() == 0,
            Value::Int32(v) => *v == 0,
            Value::Int64(v) => *v == 0,
            Value::Uint32(v) => *v == 0,
            Value::Uint64(v) => *v == 0,
            Value::Json { .. } | Value::Message { .. } => false,
        }
    }
}

/// Encode `value` as `expected`.
///
/// # Errors
///
/// [`CodecError::KindMismatch`] when `value` is not of the expected kind,
/// [`CodecError::ReservedTypeUrl`] for an application message whose type URL
/// uses the primitive or JSON prefix.
pub fn encode(value: &Value, expected: &Kind) -> Result<Envelope, CodecError> {
    let actual = value.kind();
    if actual != *expected {
        return Err(CodecError::KindMismatch {
            expected: expected.to_string(),
            actual: actual.to_string(),
        });
    }

    match (value, expected) {
        (Value::Json { type_name, value }, _) => pack_json(type_name, value),
        (Value::Message { type_url, .. }, _)
            if type_url.starts_with(PRIMITIVE_TYPE_URL_PREFIX)
                || type_url.starts_with(JSON_TYPE_URL_PREFIX) =>
        {
            Err(CodecError::ReservedTypeUrl(type_url.clone()))
        }
        (Value::Message { type_url, bytes }, _) => Ok(Envelope {
            type_url: type_url.clone(),
            value: bytes.clone(),
        }),
        (primitive, Kind::Primitive(kind)) => Ok(Envelope {
            type_url: kind.type_url(),
            value: encode_primitive(primitive),
        }),
        (_, other) => Err(CodecError::KindMismatch {
            expected: other.to_string(),
            actual: actual.to_string(),
        }),
    }
}

/// Encode `value` as the kind named `kind_name` (`"int64"`, `"pkg.Type"`, ...).
///
/// # Errors
///
/// [`CodecError::UnsupportedKind`] when the name is not a supported kind.
pub fn encode_named(value: &Value, kind_name: &str) -> Result<Envelope, CodecError> {
    encode(value, &kind_name.parse()?)
}

/// Decode an envelope, choosing the decoder by type URL prefix.
///
/// # Errors
///
/// [`CodecError::UnsupportedKind`] for a primitive type URL naming an unknown
/// kind, [`CodecError::Decode`] / [`CodecError::Json`] for malformed payloads.
pub fn decode(envelope: &Envelope) -> Result<Value, CodecError> {
    let (prefix, name) = split_type_url(&envelope.type_url);
    match prefix {
        PRIMITIVE_TYPE_URL_PREFIX => decode_primitive(name.parse()?, &envelope.value),
        JSON_TYPE_URL_PREFIX => Ok(Value::Json {
            type_name: name.to_string(),
            value: unpack_json(envelope)?,
        }),
        _ => Ok(Value::Message {
            type_url: envelope.type_url.clone(),
            bytes: envelope.value.clone(),
        }),
    }
}

/// Encode a primitive as its wrapper message, eliding the zero value.
fn encode_primitive(value: &Value) -> Vec<u8> {
    let mut buf = Vec::new();
    if value.is_zero() {
        return buf;
    }
    match value {
        Value::String(v) => encoding::string::encode(WRAPPER_FIELD, v, &mut buf),
        Value::Bytes(v) => encoding::bytes::encode(WRAPPER_FIELD, v, &mut buf),
        Value::Bool(v) => encoding::bool::encode(WRAPPER_FIELD, v, &mut buf),
        Value::Double(v) => encoding::double::encode(WRAPPER_FIELD, v, &mut buf),
        Value::Float(v) => encoding::float::encode(WRAPPER_FIELD, v, &mut buf),
        Value::Int32(v) => encoding::int32::encode(WRAPPER_FIELD, v, &mut buf),
        Value::Int64(v) => encoding::int64::encode(WRAPPER_FIELD, v, &mut buf),
        Value::Uint32(v) => encoding::uint32::encode(WRAPPER_FIELD, v, &mut buf),
        Value::Uint64(v) => encoding::uint64::encode(WRAPPER_FIELD, v, &mut buf),
        Value::Json { .. } | Value::Message { .. } => {}
    }
    buf
}

/// Decode a wrapper message of the given kind. Empty input is the zero value.
fn decode_primitive(kind: PrimitiveKind, bytes: &[u8]) -> Result<Value, CodecError> {
    if bytes.is_empty() {
        return Ok(kind.zero());
    }
    let err = |source| CodecError::Decode {
        kind: kind.name().to_string(),
        source,
    };
    Ok(match kind {
        PrimitiveKind::String => Value::String(String::decode(bytes).map_err(err)?),
        PrimitiveKind::Bytes => Value::Bytes(Vec::<u8>::decode(bytes).map_err(err)?),
        PrimitiveKind::Bool => Value::Bool(bool::decode(bytes).map_err(err)?),
        PrimitiveKind::Double => Value::Double(f64::decode(bytes).map_err(err)?),
        PrimitiveKind::Float => Value::Float(f32::decode(bytes).map_err(err)?),
        PrimitiveKind::Int32 => Value::Int32(i32::decode(bytes).map_err(err)?),
        PrimitiveKind::Int64 => Value::Int64(i64::decode(bytes).map_err(err)?),
        PrimitiveKind::Uint32 => Value::Uint32(u32::decode(bytes).map_err(err)?),
        PrimitiveKind::Uint64 => Value::Uint64(u64::decode(bytes).map_err(err)?),
    })
}
