//! Codec step definitions.

use cucumber::{then, when, World};
use entity_dispatch::codec::{decode, encode, CodecError, Envelope, Kind, PrimitiveKind, Value};

/// Test context for codec scenarios.
#[derive(Debug, Default, World)]
pub struct CodecWorld {
    envelope: Option<Envelope>,
    decoded: Option<Result<Value, CodecError>>,
}

impl CodecWorld {
    fn envelope(&self) -> &Envelope {
        self.envelope.as_ref().expect("nothing encoded")
    }
}

fn parse_kind(name: &str) -> PrimitiveKind {
    name.parse().expect("supported kind")
}

// --- When steps ---

#[when(expr = "I encode the zero value of {string}")]
async fn when_encode_zero(world: &mut CodecWorld, kind: String) {
    let kind = parse_kind(&kind);
    let envelope = encode(&kind.zero(), &Kind::Primitive(kind)).expect("encode");
    world.envelope = Some(envelope);
}

#[when(expr = "I encode the int64 {int}")]
async fn when_encode_int64(world: &mut CodecWorld, value: i64) {
    let kind = Kind::Primitive(PrimitiveKind::Int64);
    world.envelope = Some(encode(&Value::Int64(value), &kind).expect("encode"));
}

#[when(expr = "I decode an envelope tagged {string}")]
async fn when_decode_tagged(world: &mut CodecWorld, type_url: String) {
    let envelope = Envelope {
        type_url,
        value: vec![0x08, 0x01],
    };
    world.decoded = Some(decode(&envelope));
}

// --- Then steps ---

#[then("the payload is empty")]
async fn then_payload_empty(world: &mut CodecWorld) {
    assert!(world.envelope().value.is_empty());
}

#[then(expr = "the type url is {string}")]
async fn then_type_url(world: &mut CodecWorld, type_url: String) {
    assert_eq!(world.envelope().type_url, type_url);
}

#[then(expr = "decoding yields the zero value of {string}")]
async fn then_decodes_zero(world: &mut CodecWorld, kind: String) {
    let kind = parse_kind(&kind);
    let value = decode(world.envelope()).expect("decode");
    assert_eq!(value, kind.zero());
    assert!(value.is_zero());
}

#[then(expr = "the payload bytes are {string}")]
async fn then_payload_bytes(world: &mut CodecWorld, hex: String) {
    let expected: Vec<u8> = hex
        .split_whitespace()
        .map(|pair| u8::from_str_radix(pair, 16).expect("hex byte"))
        .collect();
    assert_eq!(world.envelope().value, expected);
}

#[then("decoding fails with an unsupported kind")]
async fn then_unsupported(world: &mut CodecWorld) {
    assert!(matches!(
        world.decoded,
        Some(Err(CodecError::UnsupportedKind(ref kind))) if kind == "sint32"
    ));
}
