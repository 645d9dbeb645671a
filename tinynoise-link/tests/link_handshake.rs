//! Handshakes created from `LinkOptions`, with negotiation payloads
//! carried inside the handshake messages.

use rand_core::OsRng;
use tinynoise_handshake::{HandshakeState, KeyPair, Role, State, protocol};
use tinynoise_link::{
    ClientNegotiation, Error, LinkOptions, PayloadOptions, ServerNegotiation, TransportOptions,
};

fn exchange(writer: &mut HandshakeState, reader: &mut HandshakeState, payload: &[u8]) -> Vec<u8> {
    let mut wire = [0u8; 1024];
    let len = writer.write_message(payload, &mut wire).unwrap();
    let mut out = vec![0u8; 1024];
    let plen = reader.read_message(&wire[..len], &mut out).unwrap();
    out.truncate(plen);
    out
}

#[test]
fn xx_with_transport_options_in_payloads() {
    let mut client = LinkOptions::new();
    client.generate_local_keypair(&mut OsRng);
    client.set_send_buffer_size(1024);
    client.add_protocol(&protocol::NOISE_XX_25519_CHACHAPOLY_BLAKE2S).unwrap();

    let mut server = LinkOptions::new();
    server.generate_local_keypair(&mut OsRng);
    server.add_protocol(&protocol::NOISE_XX_25519_CHACHAPOLY_BLAKE2S).unwrap();

    let mut initiator = client.create_handshake(Role::Initiator, 0).unwrap();
    let mut responder = server.create_handshake(Role::Responder, 0).unwrap();
    initiator.start(Role::Initiator, b"link").unwrap();
    responder.start(Role::Responder, b"link").unwrap();

    let request = ClientNegotiation {
        initial_protocol: Some(protocol::NOISE_XX_25519_CHACHAPOLY_BLAKE2S.name()),
        ..Default::default()
    };
    let mut buf = [0u8; 256];
    let len = request.encode(&mut buf).unwrap();
    let received = exchange(&mut initiator, &mut responder, &buf[..len]);
    let decoded = ClientNegotiation::decode(&received).unwrap();
    assert_eq!(server.protocol_index(decoded.initial_protocol.unwrap()), Some(0));

    let server_payload = PayloadOptions {
        transport: Some(server.transport_options()),
        ..Default::default()
    };
    let len = server_payload.encode(&mut buf).unwrap();
    let received = exchange(&mut responder, &mut initiator, &buf[..len]);
    let decoded = PayloadOptions::decode(&received).unwrap();
    assert_eq!(
        decoded.transport,
        Some(TransportOptions {
            max_send_length: Some(512),
            max_recv_length: Some(512),
            ..Default::default()
        })
    );

    let client_payload = PayloadOptions {
        transport: Some(client.transport_options()),
        ..Default::default()
    };
    let len = client_payload.encode(&mut buf).unwrap();
    let received = exchange(&mut initiator, &mut responder, &buf[..len]);
    let decoded = PayloadOptions::decode(&received).unwrap();
    assert_eq!(decoded.transport.and_then(|t| t.max_send_length), Some(1024));

    assert_eq!(initiator.state(), State::Split);
    assert_eq!(responder.remote_public_key(), client.local_public_key());
}

#[test]
fn ik_needs_remote_key_from_options() {
    let server_keys = KeyPair::generate(&mut OsRng);
    let ik = &protocol::NOISE_IK_25519_AESGCM_SHA256;

    let mut client = LinkOptions::new().with_local_keypair(KeyPair::generate(&mut OsRng));
    client.add_protocol(ik).unwrap();
    assert_eq!(
        client.create_handshake(Role::Initiator, 0).unwrap_err(),
        Error::Handshake(tinynoise_handshake::Error::MissingKey)
    );

    client.set_remote_public_key(server_keys.public);
    let mut initiator = client.create_handshake(Role::Initiator, 0).unwrap();

    let mut server = LinkOptions::new().with_local_keypair(server_keys);
    server.add_protocol(ik).unwrap();
    let mut responder = server.create_handshake(Role::Responder, 0).unwrap();

    initiator.start(Role::Initiator, &[]).unwrap();
    responder.start(Role::Responder, &[]).unwrap();
    exchange(&mut initiator, &mut responder, b"");
    let reply = ServerNegotiation {
        retry_protocol: Some("3"),
        ..Default::default()
    };
    let mut buf = [0u8; 64];
    let len = reply.encode(&mut buf).unwrap();
    let received = exchange(&mut responder, &mut initiator, &buf[..len]);
    assert_eq!(ServerNegotiation::decode(&received).unwrap(), reply);
    assert_eq!(responder.state(), State::Split);
}

#[test]
fn psk_handshake_from_copied_options() {
    let mut base = LinkOptions::new();
    base.set_preshared_key(&[0x11; 32]).unwrap();
    base.add_protocol(&protocol::NOISE_NNPSK0_25519_CHACHAPOLY_SHA256).unwrap();

    let mut peer = LinkOptions::new();
    peer.copy_from(&base);

    let mut initiator = base.create_handshake(Role::Initiator, 0).unwrap();
    let mut responder = peer.create_handshake(Role::Responder, 0).unwrap();
    initiator.start(Role::Initiator, &[]).unwrap();
    responder.start(Role::Responder, &[]).unwrap();
    exchange(&mut initiator, &mut responder, b"ping");
    assert_eq!(exchange(&mut responder, &mut initiator, b"pong"), b"pong");

    peer.clear();
    assert_eq!(
        peer.create_handshake(Role::Responder, 0).unwrap_err(),
        Error::Handshake(tinynoise_handshake::Error::MissingKey)
    );
}
