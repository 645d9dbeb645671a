//! Negotiation and option payloads carried inside handshake messages.
//!
//! These types only encode and decode. Choosing a protocol, acting on a
//! rejection or applying transport limits is up to the caller.

use tracing::trace;

use crate::error::Error;
use crate::protobuf::{Formatter, Parser};

macro_rules! tags {
    (
        $(#[$meta:meta])*
        $name:ident {
            $($(#[$vmeta:meta])* $variant:ident = $value:literal,)+
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        #[repr(u8)]
        pub enum $name {
            $($(#[$vmeta])* $variant = $value,)+
        }

        impl From<$name> for u8 {
            fn from(tag: $name) -> u8 {
                tag as u8
            }
        }

        impl TryFrom<u8> for $name {
            type Error = u8;

            fn try_from(tag: u8) -> Result<Self, u8> {
                match tag {
                    $($value => Ok(Self::$variant),)+
                    other => Err(other),
                }
            }
        }
    };
}

tags! {
    /// Field tags of a client's negotiation request.
    NegotiationRequest {
        ServerName = 1,
        /// The protocol the client is starting with.
        InitialProtocol = 2,
        /// Fallback protocols the client can switch to.
        SwitchProtocol = 3,
        /// Other protocols the client could retry with.
        RetryProtocol = 4,
        /// The protocol the server rejected last time.
        RejectedProtocol = 5,
        PskId = 6,
    }
}

tags! {
    /// Field tags of a server's negotiation response.
    NegotiationResponse {
        SwitchProtocol = 3,
        RetryProtocol = 4,
        Rejected = 5,
    }
}

tags! {
    /// Field tags of the options in a handshake payload.
    PayloadOption {
        EvidenceRequestType = 1,
        EvidenceBlobType = 2,
        EvidenceBlob = 3,
        PskId = 4,
        /// An embedded [`TransportOption`] message.
        Transport = 5,
    }
}

tags! {
    /// Field tags inside the embedded transport options.
    TransportOption {
        MaxSendLength = 1,
        MaxRecvLength = 2,
        ContinuousRekey = 3,
        ShortTerminated = 4,
    }
}

fn skip(tag: u8) {
    trace!(tag, "skipping unknown field");
}

/// A client's negotiation request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientNegotiation<'a> {
    pub server_name: Option<&'a str>,
    pub initial_protocol: Option<&'a str>,
    pub switch_protocols: Vec<&'a str>,
    pub retry_protocols: Vec<&'a str>,
    pub rejected_protocol: Option<&'a str>,
    pub psk_id: Option<&'a [u8]>,
}

impl<'a> ClientNegotiation<'a> {
    pub fn encode(&self, out: &mut [u8]) -> Result<usize, Error> {
        use NegotiationRequest as Tag;

        let mut fmt = Formatter::new(out);
        if let Some(name) = self.server_name {
            fmt.add_str(Tag::ServerName.into(), name);
        }
        if let Some(protocol) = self.initial_protocol {
            fmt.add_str(Tag::InitialProtocol.into(), protocol);
        }
        for protocol in &self.switch_protocols {
            fmt.add_str(Tag::SwitchProtocol.into(), protocol);
        }
        for protocol in &self.retry_protocols {
            fmt.add_str(Tag::RetryProtocol.into(), protocol);
        }
        if let Some(protocol) = self.rejected_protocol {
            fmt.add_str(Tag::RejectedProtocol.into(), protocol);
        }
        if let Some(id) = self.psk_id {
            fmt.add_bytes(Tag::PskId.into(), id);
        }
        fmt.finish()
    }

    pub fn decode(buf: &'a [u8]) -> Result<Self, Error> {
        use NegotiationRequest as Tag;

        let mut parser = Parser::new(buf);
        let mut msg = Self::default();
        while let Some(tag) = parser.read_next() {
            match Tag::try_from(tag) {
                Ok(Tag::ServerName) => msg.server_name = Some(parser.read_str()),
                Ok(Tag::InitialProtocol) => msg.initial_protocol = Some(parser.read_str()),
                Ok(Tag::SwitchProtocol) => msg.switch_protocols.push(parser.read_str()),
                Ok(Tag::RetryProtocol) => msg.retry_protocols.push(parser.read_str()),
                Ok(Tag::RejectedProtocol) => msg.rejected_protocol = Some(parser.read_str()),
                Ok(Tag::PskId) => msg.psk_id = Some(parser.read_bytes()),
                Err(tag) => skip(tag),
            }
        }
        parser.finish()?;
        Ok(msg)
    }
}

/// A server's negotiation response.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ServerNegotiation<'a> {
    pub switch_protocol: Option<&'a str>,
    pub retry_protocol: Option<&'a str>,
    pub rejected: bool,
}

impl<'a> ServerNegotiation<'a> {
    pub fn encode(&self, out: &mut [u8]) -> Result<usize, Error> {
        use NegotiationResponse as Tag;

        let mut fmt = Formatter::new(out);
        if let Some(protocol) = self.switch_protocol {
            fmt.add_str(Tag::SwitchProtocol.into(), protocol);
        }
        if let Some(protocol) = self.retry_protocol {
            fmt.add_str(Tag::RetryProtocol.into(), protocol);
        }
        if self.rejected {
            fmt.add_bool(Tag::Rejected.into(), true);
        }
        fmt.finish()
    }

    pub fn decode(buf: &'a [u8]) -> Result<Self, Error> {
        use NegotiationResponse as Tag;

        let mut parser = Parser::new(buf);
        let mut msg = Self::default();
        while let Some(tag) = parser.read_next() {
            match Tag::try_from(tag) {
                Ok(Tag::SwitchProtocol) => msg.switch_protocol = Some(parser.read_str()),
                Ok(Tag::RetryProtocol) => msg.retry_protocol = Some(parser.read_str()),
                Ok(Tag::Rejected) => msg.rejected = parser.read_bool(),
                Err(tag) => skip(tag),
            }
        }
        parser.finish()?;
        Ok(msg)
    }
}

/// Transport limits and behaviour a party asks of its peer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransportOptions {
    pub max_send_length: Option<u32>,
    pub max_recv_length: Option<u32>,
    /// Rekey after every transport message.
    pub continuous_rekey: bool,
    /// End the session when a short message arrives.
    pub short_terminated: bool,
}

impl TransportOptions {
    fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    fn format(&self, fmt: &mut Formatter<'_>) {
        use TransportOption as Tag;

        if let Some(len) = self.max_send_length {
            fmt.add_u32(Tag::MaxSendLength.into(), len);
        }
        if let Some(len) = self.max_recv_length {
            fmt.add_u32(Tag::MaxRecvLength.into(), len);
        }
        if self.continuous_rekey {
            fmt.add_bool(Tag::ContinuousRekey.into(), true);
        }
        if self.short_terminated {
            fmt.add_bool(Tag::ShortTerminated.into(), true);
        }
    }

    fn parse(parser: &mut Parser<'_>) -> Self {
        use TransportOption as Tag;

        let mut options = Self::default();
        while let Some(tag) = parser.read_next() {
            match Tag::try_from(tag) {
                Ok(Tag::MaxSendLength) => options.max_send_length = Some(parser.read_u32()),
                Ok(Tag::MaxRecvLength) => options.max_recv_length = Some(parser.read_u32()),
                Ok(Tag::ContinuousRekey) => options.continuous_rekey = parser.read_bool(),
                Ok(Tag::ShortTerminated) => options.short_terminated = parser.read_bool(),
                Err(tag) => skip(tag),
            }
        }
        options
    }

    pub fn encode(&self, out: &mut [u8]) -> Result<usize, Error> {
        let mut fmt = Formatter::new(out);
        self.format(&mut fmt);
        fmt.finish()
    }

    pub fn decode(buf: &[u8]) -> Result<Self, Error> {
        let mut parser = Parser::new(buf);
        let options = Self::parse(&mut parser);
        parser.finish()?;
        Ok(options)
    }
}

/// Options carried in a handshake message payload.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PayloadOptions<'a> {
    pub evidence_request_types: Vec<&'a str>,
    pub evidence_blob_type: Option<&'a str>,
    pub evidence_blob: Option<&'a [u8]>,
    pub psk_id: Option<&'a [u8]>,
    pub transport: Option<TransportOptions>,
}

impl<'a> PayloadOptions<'a> {
    pub fn encode(&self, out: &mut [u8]) -> Result<usize, Error> {
        use PayloadOption as Tag;

        let mut fmt = Formatter::new(out);
        for kind in &self.evidence_request_types {
            fmt.add_str(Tag::EvidenceRequestType.into(), kind);
        }
        if let Some(kind) = self.evidence_blob_type {
            fmt.add_str(Tag::EvidenceBlobType.into(), kind);
        }
        if let Some(blob) = self.evidence_blob {
            fmt.add_bytes(Tag::EvidenceBlob.into(), blob);
        }
        if let Some(id) = self.psk_id {
            fmt.add_bytes(Tag::PskId.into(), id);
        }
        if let Some(transport) = self.transport.filter(|t| !t.is_empty()) {
            let start = fmt.start_embedded(Tag::Transport.into());
            transport.format(&mut fmt);
            fmt.end_embedded(start);
        }
        fmt.finish()
    }

    pub fn decode(buf: &'a [u8]) -> Result<Self, Error> {
        use PayloadOption as Tag;

        let mut parser = Parser::new(buf);
        let mut msg = Self::default();
        while let Some(tag) = parser.read_next() {
            match Tag::try_from(tag) {
                Ok(Tag::EvidenceRequestType) => msg.evidence_request_types.push(parser.read_str()),
                Ok(Tag::EvidenceBlobType) => msg.evidence_blob_type = Some(parser.read_str()),
                Ok(Tag::EvidenceBlob) => msg.evidence_blob = Some(parser.read_bytes()),
                Ok(Tag::PskId) => msg.psk_id = Some(parser.read_bytes()),
                Ok(Tag::Transport) => {
                    let outer = parser.start_embedded();
                    msg.transport = Some(TransportOptions::parse(&mut parser));
                    parser.end_embedded(outer);
                }
                Err(tag) => skip(tag),
            }
        }
        parser.finish()?;
        Ok(msg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_values() {
        assert_eq!(u8::from(NegotiationRequest::PskId), 6);
        assert_eq!(u8::from(NegotiationResponse::SwitchProtocol), 3);
        assert_eq!(u8::from(PayloadOption::Transport), 5);
        assert_eq!(u8::from(TransportOption::ShortTerminated), 4);
        assert_eq!(NegotiationResponse::try_from(1), Err(1));
        assert_eq!(
            NegotiationRequest::try_from(2),
            Ok(NegotiationRequest::InitialProtocol)
        );
    }

    #[test]
    fn client_request_round_trip() {
        let request = ClientNegotiation {
            server_name: Some("sensor.local"),
            initial_protocol: Some("Noise_IK_25519_ChaChaPoly_BLAKE2s"),
            switch_protocols: vec!["Noise_XXfallback_25519_ChaChaPoly_BLAKE2s"],
            retry_protocols: vec!["3", "Noise_XX_25519_AESGCM_SHA256"],
            rejected_protocol: None,
            psk_id: Some(&[9, 9, 9]),
        };
        let mut buf = [0u8; 256];
        let len = request.encode(&mut buf).unwrap();
        assert_eq!(ClientNegotiation::decode(&buf[..len]).unwrap(), request);
    }

    #[test]
    fn server_response_round_trip() {
        let response = ServerNegotiation {
            switch_protocol: Some("Noise_XXfallback_25519_AESGCM_SHA256"),
            retry_protocol: None,
            rejected: false,
        };
        let mut buf = [0u8; 64];
        let len = response.encode(&mut buf).unwrap();
        assert_eq!(ServerNegotiation::decode(&buf[..len]).unwrap(), response);

        let rejected = ServerNegotiation {
            rejected: true,
            ..Default::default()
        };
        let len = rejected.encode(&mut buf).unwrap();
        assert_eq!(&buf[..len], [0x28, 0x01]);
        assert!(ServerNegotiation::decode(&buf[..len]).unwrap().rejected);
    }

    #[test]
    fn payload_with_transport_options() {
        let payload = PayloadOptions {
            evidence_request_types: vec!["x509"],
            evidence_blob_type: Some("x509"),
            evidence_blob: Some(&[0xAB; 300]),
            psk_id: None,
            transport: Some(TransportOptions {
                max_send_length: Some(2048),
                max_recv_length: Some(128),
                continuous_rekey: true,
                short_terminated: false,
            }),
        };
        let mut buf = [0u8; 512];
        let len = payload.encode(&mut buf).unwrap();
        assert_eq!(PayloadOptions::decode(&buf[..len]).unwrap(), payload);
    }

    #[test]
    fn empty_transport_options_omitted() {
        let payload = PayloadOptions {
            transport: Some(TransportOptions::default()),
            ..Default::default()
        };
        let mut buf = [0u8; 16];
        assert_eq!(payload.encode(&mut buf).unwrap(), 0);
    }

    #[test]
    fn unknown_fields_skipped() {
        let mut buf = [0u8; 64];
        let mut fmt = Formatter::new(&mut buf);
        fmt.add_u64(77, 5)
            .add_str(1, "name")
            .add_bytes(200, b"opaque");
        let start = fmt.start_embedded(99);
        fmt.add_bool(1, true);
        fmt.end_embedded(start);
        let len = fmt.finish().unwrap();

        let request = ClientNegotiation::decode(&buf[..len]).unwrap();
        assert_eq!(request.server_name, Some("name"));
        assert!(request.switch_protocols.is_empty());
    }

    #[test]
    fn wrong_wire_type_is_malformed() {
        let mut buf = [0u8; 16];
        let mut fmt = Formatter::new(&mut buf);
        fmt.add_u32(u8::from(NegotiationRequest::ServerName), 1);
        let len = fmt.finish().unwrap();
        assert_eq!(
            ClientNegotiation::decode(&buf[..len]).unwrap_err(),
            Error::Malformed
        );
    }

    #[test]
    fn transport_out_of_range_is_malformed() {
        let mut buf = [0u8; 16];
        let mut fmt = Formatter::new(&mut buf);
        fmt.add_u64(u8::from(TransportOption::MaxSendLength), u64::from(u32::MAX) + 1);
        let len = fmt.finish().unwrap();
        assert_eq!(TransportOptions::decode(&buf[..len]), Err(Error::Malformed));
    }

    #[test]
    fn encode_overflow() {
        let request = ClientNegotiation {
            server_name: Some("a-rather-long-server-name.example"),
            ..Default::default()
        };
        let mut buf = [0u8; 8];
        assert_eq!(request.encode(&mut buf), Err(Error::Encoding));
    }
}
