//! Property tests for the protobuf codec and the negotiation payloads.

use quickcheck::{Arbitrary, Gen};
use tinynoise_link::protobuf::{Formatter, Parser, WireType};
use tinynoise_link::{ClientNegotiation, PayloadOptions, TransportOptions};

/// One field of a generated message.
#[derive(Clone, Debug, PartialEq)]
enum Field {
    Bool(u8, bool),
    U32(u8, u32),
    U64(u8, u64),
    I32(u8, i32),
    I64(u8, i64),
    Bytes(u8, Vec<u8>),
    Str(u8, String),
    Embedded(u8, Vec<Field>),
}

impl Field {
    fn arbitrary_at(g: &mut Gen, depth: usize) -> Self {
        let tag = u8::arbitrary(g);
        let kinds = if depth == 0 { 8 } else { 7 };
        match u8::arbitrary(g) % kinds {
            0 => Field::Bool(tag, bool::arbitrary(g)),
            1 => Field::U32(tag, u32::arbitrary(g)),
            2 => Field::U64(tag, u64::arbitrary(g)),
            3 => Field::I32(tag, i32::arbitrary(g)),
            4 => Field::I64(tag, i64::arbitrary(g)),
            5 => Field::Bytes(tag, Vec::arbitrary(g)),
            6 => Field::Str(tag, String::arbitrary(g)),
            _ => {
                let count = usize::arbitrary(g) % 6;
                let inner = (0..count).map(|_| Field::arbitrary_at(g, depth + 1)).collect();
                Field::Embedded(tag, inner)
            }
        }
    }

    fn format(&self, fmt: &mut Formatter<'_>) {
        match self {
            Field::Bool(tag, v) => {
                fmt.add_bool(*tag, *v);
            }
            Field::U32(tag, v) => {
                fmt.add_u32(*tag, *v);
            }
            Field::U64(tag, v) => {
                fmt.add_u64(*tag, *v);
            }
            Field::I32(tag, v) => {
                fmt.add_i32(*tag, *v);
            }
            Field::I64(tag, v) => {
                fmt.add_i64(*tag, *v);
            }
            Field::Bytes(tag, v) => {
                fmt.add_bytes(*tag, v);
            }
            Field::Str(tag, v) => {
                fmt.add_str(*tag, v);
            }
            Field::Embedded(tag, inner) => {
                let start = fmt.start_embedded(*tag);
                for field in inner {
                    field.format(fmt);
                }
                fmt.end_embedded(start);
            }
        }
    }

    /// Read the field the parser is positioned on, using `self` to pick
    /// the accessor.
    fn parse_like(&self, tag: u8, parser: &mut Parser<'_>) -> Field {
        match self {
            Field::Bool(..) => Field::Bool(tag, parser.read_bool()),
            Field::U32(..) => Field::U32(tag, parser.read_u32()),
            Field::U64(..) => Field::U64(tag, parser.read_u64()),
            Field::I32(..) => Field::I32(tag, parser.read_i32()),
            Field::I64(..) => Field::I64(tag, parser.read_i64()),
            Field::Bytes(..) => Field::Bytes(tag, parser.read_bytes().to_vec()),
            Field::Str(..) => Field::Str(tag, parser.read_str().to_owned()),
            Field::Embedded(_, expected) => {
                let outer = parser.start_embedded();
                let inner = parse_fields(parser, expected);
                parser.end_embedded(outer);
                Field::Embedded(tag, inner)
            }
        }
    }
}

#[derive(Clone, Debug)]
struct Message(Vec<Field>);

impl Arbitrary for Message {
    fn arbitrary(g: &mut Gen) -> Self {
        let count = usize::arbitrary(g) % 12;
        Message((0..count).map(|_| Field::arbitrary_at(g, 0)).collect())
    }
}

fn parse_fields(parser: &mut Parser<'_>, expected: &[Field]) -> Vec<Field> {
    let mut out = Vec::new();
    for field in expected {
        match parser.read_next() {
            Some(tag) => out.push(field.parse_like(tag, parser)),
            None => break,
        }
    }
    out
}

#[quickcheck_macros::quickcheck]
fn fields_survive_encoding(message: Message) -> bool {
    let mut buf = vec![0u8; 1 << 16];
    let mut fmt = Formatter::new(&mut buf);
    for field in &message.0 {
        field.format(&mut fmt);
    }
    let Ok(len) = fmt.finish() else {
        return false;
    };

    let mut parser = Parser::new(&buf[..len]);
    let decoded = parse_fields(&mut parser, &message.0);
    parser.read_next().is_none() && parser.finish().is_ok() && decoded == message.0
}

#[quickcheck_macros::quickcheck]
fn parser_never_panics(bytes: Vec<u8>) -> bool {
    let mut parser = Parser::new(&bytes);
    let mut fields = 0;
    while let Some(_tag) = parser.read_next() {
        match parser.wire_type() {
            Some(WireType::Varint) => {
                parser.read_u64();
            }
            Some(WireType::LengthDelimited) => {
                let outer = parser.start_embedded();
                while parser.read_next().is_some() {}
                parser.end_embedded(outer);
            }
            None => return false,
        }
        fields += 1;
    }
    fields <= bytes.len()
}

#[quickcheck_macros::quickcheck]
fn truncated_buffer_fails_cleanly(message: Message, cut: usize) -> bool {
    let mut buf = vec![0u8; 1 << 16];
    let mut fmt = Formatter::new(&mut buf);
    for field in &message.0 {
        field.format(&mut fmt);
    }
    let Ok(len) = fmt.finish() else {
        return false;
    };
    if len == 0 {
        return true;
    }

    // encoding into a buffer that is too short must fail, not truncate
    let mut short = vec![0u8; len - 1 - cut % len];
    let mut fmt = Formatter::new(&mut short);
    for field in &message.0 {
        field.format(&mut fmt);
    }
    fmt.finish().is_err()
}

#[quickcheck_macros::quickcheck]
fn client_negotiation_round_trip(
    server_name: Option<String>,
    switch: Vec<String>,
    psk_id: Option<Vec<u8>>,
) -> bool {
    let request = ClientNegotiation {
        server_name: server_name.as_deref(),
        initial_protocol: Some("Noise_XX_25519_ChaChaPoly_BLAKE2s"),
        switch_protocols: switch.iter().map(String::as_str).collect(),
        retry_protocols: Vec::new(),
        rejected_protocol: None,
        psk_id: psk_id.as_deref(),
    };
    let mut buf = vec![0u8; 1 << 16];
    match request.encode(&mut buf) {
        Ok(len) => ClientNegotiation::decode(&buf[..len]) == Ok(request),
        Err(_) => false,
    }
}

#[quickcheck_macros::quickcheck]
fn payload_options_round_trip(
    blob: Vec<u8>,
    max_send: Option<u32>,
    max_recv: Option<u32>,
    rekey: bool,
) -> bool {
    let transport = TransportOptions {
        max_send_length: max_send,
        max_recv_length: max_recv,
        continuous_rekey: rekey,
        short_terminated: !rekey,
    };
    let payload = PayloadOptions {
        evidence_blob: Some(blob.as_slice()),
        transport: Some(transport),
        ..Default::default()
    };
    let mut buf = vec![0u8; 1 << 16];
    match payload.encode(&mut buf) {
        Ok(len) => PayloadOptions::decode(&buf[..len]) == Ok(payload),
        Err(_) => false,
    }
}
