#![deny(unsafe_code)]

//! # tinynoise-handshake
//!
//! A sans-IO implementation of the Noise Protocol Framework handshake
//! for the XX, IK, NNpsk0 and XXfallback patterns and the Noise Pipes
//! composite, over Curve25519 with ChaChaPoly or AESGCM and BLAKE2s or
//! SHA256.
//!
//! ```no_run
//! use tinynoise_handshake::{KeyPair, Role, protocol};
//!
//! let mut rng = rand_core::OsRng;
//! let mut hs = protocol::NOISE_XX_25519_CHACHAPOLY_BLAKE2S.create_handshake();
//! hs.set_local_keypair(KeyPair::generate(&mut rng))?;
//! hs.start(Role::Initiator, b"prologue")?;
//!
//! let mut msg = [0u8; 128];
//! let len = hs.write_message(b"", &mut msg)?;
//! // send msg[..len], read the reply with hs.read_message(...), and so on
//! # Ok::<(), tinynoise_handshake::Error>(())
//! ```
//!
//! ## Security Properties
//!
//! - X25519 low-order point rejection
//! - All key material zeroized on drop, and on failure where possible
//! - A failed handshake stays failed
//! - No panics on network input

pub mod crypto;
pub mod error;
pub mod keys;
pub mod protocol;

mod cipher_state;
mod dh_state;
mod handshake;
mod suite;
mod symmetric_state;
mod transport;

pub use cipher_state::CipherState;
pub use error::Error;
pub use handshake::{
    HandshakeAction, HandshakeState, Ik, KeyId, NNpsk0, Pattern, Role, State, Token, Xx,
    XxFallback,
};
pub use keys::{KeyPair, PSK_LEN, PresharedKey, PublicKey, StaticSecret};
pub use protocol::{NoisePipes, ProtocolDescriptor, RequiredKeys};
pub use suite::{CipherSuite, ProtocolName};
pub use transport::TransportState;
