#![deny(unsafe_code)]

//! # tinynoise-link
//!
//! Link-level pieces that sit on top of [`tinynoise_handshake`]:
//!
//! - [`LinkOptions`] holding keys, protocol preferences and buffer sizes,
//!   and creating handshakes from them
//! - a protobuf subset codec ([`protobuf::Formatter`], [`protobuf::Parser`])
//! - typed negotiation and option payloads built on that codec

pub mod error;
pub mod negotiation;
pub mod options;
pub mod protobuf;

pub use error::Error;
pub use negotiation::{
    ClientNegotiation, NegotiationRequest, NegotiationResponse, PayloadOption, PayloadOptions,
    ServerNegotiation, TransportOption, TransportOptions,
};
pub use options::{LinkOptions, Padding};
