mod pattern;

pub use pattern::{Ik, NNpsk0, Pattern, Token, Xx, XxFallback};
pub(crate) use pattern::by_name as pattern_by_name;

use rand_core::{CryptoRngCore, OsRng};
use tracing::{debug, trace};
use zeroize::Zeroize;

use crate::cipher_state::CipherState;
use crate::crypto::aead::AEAD_TAG_LEN;
use crate::crypto::hash::HASH_LEN;
use crate::crypto::x25519::DH_LEN;
use crate::dh_state::DhState;
use crate::error::Error;
use crate::keys::{KeyPair, PresharedKey, PublicKey};
use crate::protocol::{ProtocolDescriptor, RequiredKeys};
use crate::symmetric_state::SymmetricState;
use crate::transport::TransportState;

/// Which side of the handshake this party plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Initiator,
    Responder,
}

impl Role {
    /// The role of the other party.
    pub fn peer(self) -> Self {
        match self {
            Self::Initiator => Self::Responder,
            Self::Responder => Self::Initiator,
        }
    }
}

/// Lifecycle of a [`HandshakeState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    /// Created, keys may be set, `start` not called yet.
    Initial,
    /// The next call must be `write_message`.
    Write,
    /// The next call must be `read_message`.
    Read,
    /// All messages processed; call `split`.
    Split,
    /// `split` has been called.
    Finished,
    /// Unusable. See [`HandshakeState::failure`].
    Failed,
}

/// The current action the caller must take to advance the handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeAction {
    /// Call `start()` or `start_fallback()`.
    Start,
    /// Call `write_message()` to produce the next handshake message.
    WriteMessage,
    /// Call `read_message()` with the peer's handshake message.
    ReadMessage,
    /// Call `split()` or `into_transport()`.
    Split,
    /// The transport ciphers have been handed out.
    Complete,
    /// The handshake failed and must be discarded (or fallen back from).
    Failed,
}

/// Names a key slot of a handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyId {
    LocalStatic,
    LocalEphemeral,
    RemoteStatic,
    RemoteEphemeral,
    PresharedKey,
}

/// A Noise handshake for one protocol, driven message by message.
///
/// ```text
/// new ─> [set keys] ─> start ─> write/read ... ─> split ─> transport
///                                    │
///                                    └─ any error ─> Failed
/// ```
///
/// A buffer that is too small is reported as [`Error::BufferTooSmall`]
/// without changing any state, so the call can be retried. Every other
/// error during a message moves the handshake to [`State::Failed`] and
/// scrubs the symmetric state. Key slots survive a failure so that an
/// XXfallback handshake can reuse them.
pub struct HandshakeState {
    protocol: &'static ProtocolDescriptor,
    symmetric: Option<SymmetricState>,
    dh: DhState,
    psk: Option<PresharedKey>,
    role: Option<Role>,
    state: State,
    message_number: usize,
    failure: Option<Error>,
    /// Saved at `split()`, once the symmetric state is gone.
    handshake_hash: Option<[u8; HASH_LEN]>,
}

impl Drop for HandshakeState {
    fn drop(&mut self) {
        if let Some(ref mut h) = self.handshake_hash {
            h.zeroize();
        }
    }
}

impl core::fmt::Debug for HandshakeState {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("HandshakeState")
            .field("protocol", &self.protocol.name())
            .field("role", &self.role)
            .field("state", &self.state)
            .field("message_number", &self.message_number)
            .field("failure", &self.failure)
            .finish_non_exhaustive()
    }
}

impl HandshakeState {
    /// Create a handshake for `protocol`. Usually reached through
    /// [`ProtocolDescriptor::create_handshake`].
    pub fn new(protocol: &'static ProtocolDescriptor) -> Self {
        Self {
            protocol,
            symmetric: None,
            dh: DhState::new(),
            psk: None,
            role: None,
            state: State::Initial,
            message_number: 0,
            failure: None,
            handshake_hash: None,
        }
    }

    pub fn protocol(&self) -> &'static ProtocolDescriptor {
        self.protocol
    }

    pub fn state(&self) -> State {
        self.state
    }

    /// The role passed to `start`, if started.
    pub fn role(&self) -> Option<Role> {
        self.role
    }

    /// Why the handshake entered [`State::Failed`], if it did.
    pub fn failure(&self) -> Option<Error> {
        self.failure
    }

    /// Number of handshake messages processed so far.
    pub fn message_number(&self) -> usize {
        self.message_number
    }

    // ----- key management -----

    /// Keys may change until the first message has been processed.
    fn keys_mutable(&self) -> Result<(), Error> {
        match self.state {
            State::Initial => Ok(()),
            State::Write | State::Read if self.message_number == 0 => Ok(()),
            State::Failed => Err(Error::HandshakeFailed),
            _ => Err(Error::WrongState),
        }
    }

    pub fn set_local_keypair(&mut self, pair: KeyPair) -> Result<(), Error> {
        self.keys_mutable()?;
        self.dh.set_local_static(pair);
        Ok(())
    }

    /// Set the local static key from 32 bytes of secret key material.
    pub fn set_local_private_key(&mut self, secret: &[u8]) -> Result<(), Error> {
        self.keys_mutable()?;
        self.dh.set_local_static(KeyPair::from_secret_slice(secret)?);
        Ok(())
    }

    /// Generate a fresh local static keypair.
    pub fn generate_local_keypair(&mut self, rng: &mut impl CryptoRngCore) -> Result<(), Error> {
        self.keys_mutable()?;
        self.dh.set_local_static(KeyPair::generate(rng));
        Ok(())
    }

    /// Use a fixed ephemeral keypair instead of generating one.
    ///
    /// `start` forgets ephemerals for most patterns, so call this after it.
    pub fn set_local_ephemeral(&mut self, pair: KeyPair) -> Result<(), Error> {
        self.keys_mutable()?;
        self.dh.set_local_ephemeral(pair);
        Ok(())
    }

    pub fn set_remote_public_key(&mut self, key: PublicKey) -> Result<(), Error> {
        self.keys_mutable()?;
        self.dh.set_remote_static(key);
        Ok(())
    }

    /// Set the 32-byte pre-shared key.
    pub fn set_preshared_key(&mut self, psk: &[u8]) -> Result<(), Error> {
        self.keys_mutable()?;
        self.psk = Some(PresharedKey::from_slice(psk)?);
        Ok(())
    }

    pub fn local_public_key(&self) -> Option<PublicKey> {
        self.dh.local_static().map(|pair| pair.public)
    }

    /// The peer's static key: configured, or learned during the handshake.
    pub fn remote_public_key(&self) -> Option<PublicKey> {
        self.dh.remote_static().copied()
    }

    /// The ephemeral public key this side sent, while it is held.
    pub fn local_ephemeral_public_key(&self) -> Option<PublicKey> {
        self.dh.local_ephemeral().map(|pair| pair.public)
    }

    /// The ephemeral public key received from the peer, while it is held.
    pub fn remote_ephemeral_public_key(&self) -> Option<PublicKey> {
        self.dh.remote_ephemeral().copied()
    }

    pub fn has_key(&self, id: KeyId) -> bool {
        match id {
            KeyId::LocalStatic => self.dh.local_static().is_some(),
            KeyId::LocalEphemeral => self.dh.local_ephemeral().is_some(),
            KeyId::RemoteStatic => self.dh.remote_static().is_some(),
            KeyId::RemoteEphemeral => self.dh.remote_ephemeral().is_some(),
            KeyId::PresharedKey => self.psk.is_some(),
        }
    }

    pub fn remove_key(&mut self, id: KeyId) -> Result<(), Error> {
        self.keys_mutable()?;
        match id {
            KeyId::LocalStatic => self.dh.remove_local_static(),
            KeyId::RemoteStatic => self.dh.remove_remote_static(),
            KeyId::LocalEphemeral | KeyId::RemoteEphemeral => self.dh.remove_ephemerals(),
            KeyId::PresharedKey => self.psk = None,
        }
        Ok(())
    }

    fn check_required_keys(&self, role: Role) -> Result<(), Error> {
        let required = self.protocol.required_keys(role);
        let missing = (required.contains(RequiredKeys::LOCAL_STATIC)
            && !self.has_key(KeyId::LocalStatic))
            || (required.contains(RequiredKeys::REMOTE_STATIC)
                && !self.has_key(KeyId::RemoteStatic))
            || (required.contains(RequiredKeys::PSK) && !self.has_key(KeyId::PresharedKey));
        if missing { Err(Error::MissingKey) } else { Ok(()) }
    }

    // ----- lifecycle -----

    /// Begin the handshake in `role`, mixing `prologue` into the hash.
    ///
    /// Fails with [`Error::MissingKey`] (and moves to `Failed`) if a key
    /// the protocol requires for `role` has not been set.
    pub fn start(&mut self, role: Role, prologue: &[u8]) -> Result<(), Error> {
        match self.state {
            State::Initial => {}
            State::Failed => return Err(Error::HandshakeFailed),
            _ => return Err(Error::WrongState),
        }
        let pattern = self.protocol.pattern();
        pattern.remove_keys(&mut self.dh);
        if let Err(err) = self.check_required_keys(role) {
            return Err(self.fail(err));
        }

        let suite = self.protocol.suite();
        let mut symmetric = SymmetricState::initialize(self.protocol.name(), suite.cipher, suite.hash);
        symmetric.mix_prologue(prologue)?;
        self.symmetric = Some(symmetric);
        self.role = Some(role);
        self.message_number = 0;
        self.state = if self.writes_message(role, 0) {
            State::Write
        } else {
            State::Read
        };

        debug!(protocol = self.protocol.name(), ?role, "handshake started");
        Ok(())
    }

    /// Start an XXfallback handshake from one that failed or was abandoned.
    ///
    /// `from` must be in `Failed` state. The fallback initiator reuses its
    /// own ephemeral key from `from`; the fallback responder reuses the
    /// peer ephemeral it received. The responder writes first.
    pub fn start_fallback(
        &mut self,
        from: &HandshakeState,
        role: Role,
        prologue: &[u8],
    ) -> Result<(), Error> {
        if !self.protocol.pattern().is_fallback() || self.state != State::Initial {
            return Err(Error::WrongState);
        }
        if from.state != State::Failed {
            return Err(Error::WrongState);
        }
        if let Err(err) = self.dh.fallback(role, &from.dh) {
            return Err(self.fail(err));
        }
        debug!(
            from = from.protocol.name(),
            to = self.protocol.name(),
            ?role,
            "falling back"
        );
        self.start(role, prologue)
    }

    /// Append another section of prologue. Only valid after `start` and
    /// before the first message.
    pub fn add_prologue(&mut self, prologue: &[u8]) -> Result<(), Error> {
        match self.state {
            State::Write | State::Read if self.message_number == 0 => {}
            State::Failed => return Err(Error::HandshakeFailed),
            _ => return Err(Error::WrongState),
        }
        self.symmetric
            .as_mut()
            .ok_or(Error::WrongState)?
            .mix_prologue(prologue)
    }

    /// What action the caller should take next.
    pub fn next_action(&self) -> HandshakeAction {
        match self.state {
            State::Initial => HandshakeAction::Start,
            State::Write => HandshakeAction::WriteMessage,
            State::Read => HandshakeAction::ReadMessage,
            State::Split => HandshakeAction::Split,
            State::Finished => HandshakeAction::Complete,
            State::Failed => HandshakeAction::Failed,
        }
    }

    /// Give up on an in-progress handshake so it can seed a fallback.
    pub fn abandon(&mut self) {
        if matches!(self.state, State::Write | State::Read) {
            self.fail(Error::HandshakeFailed);
        }
    }

    /// Scrub every key and secret; the handshake ends up `Failed`.
    pub fn clear(&mut self) {
        if let Some(symmetric) = self.symmetric.as_mut() {
            symmetric.clear();
        }
        self.symmetric = None;
        self.dh.clear();
        self.psk = None;
        if let Some(ref mut h) = self.handshake_hash {
            h.zeroize();
        }
        self.handshake_hash = None;
        self.state = State::Failed;
        self.failure = Some(Error::HandshakeFailed);
    }

    fn fail(&mut self, err: Error) -> Error {
        if let Some(symmetric) = self.symmetric.as_mut() {
            symmetric.clear();
        }
        self.symmetric = None;
        self.state = State::Failed;
        self.failure = Some(err);
        debug!(protocol = self.protocol.name(), error = %err, "handshake failed");
        err
    }

    /// Whether `role` sends message `n`.
    fn writes_message(&self, role: Role, n: usize) -> bool {
        let first = if self.protocol.pattern().responder_writes_first() {
            Role::Responder
        } else {
            Role::Initiator
        };
        let writer = if n % 2 == 0 { first } else { first.peer() };
        writer == role
    }

    /// Check that a message call is legal in the current state.
    fn expect_state(&mut self, expected: State) -> Result<(), Error> {
        match self.state {
            s if s == expected => Ok(()),
            State::Failed => Err(Error::HandshakeFailed),
            // Out-of-turn message calls abort the handshake.
            State::Write | State::Read => Err(self.fail(Error::WrongState)),
            _ => Err(Error::WrongState),
        }
    }

    fn advance(&mut self) {
        self.message_number += 1;
        if self.message_number >= self.protocol.pattern().messages().len() {
            self.state = State::Split;
            debug!(protocol = self.protocol.name(), "handshake messages complete");
        } else {
            self.state = match self.state {
                State::Write => State::Read,
                _ => State::Write,
            };
        }
    }

    /// Bytes the next message adds on top of its payload.
    ///
    /// Returns 0 when no message is pending.
    pub fn next_message_overhead(&self) -> usize {
        let Some(symmetric) = self.symmetric.as_ref() else {
            return 0;
        };
        if !matches!(self.state, State::Write | State::Read) {
            return 0;
        }
        let pattern = self.protocol.pattern();
        let Some(tokens) = pattern.messages().get(self.message_number) else {
            return 0;
        };
        let tag = |keyed: bool| if keyed { AEAD_TAG_LEN } else { 0 };

        let mut keyed = symmetric.has_key();
        let mut overhead = 0;
        for token in *tokens {
            match token {
                Token::E => {
                    overhead += DH_LEN;
                    keyed |= pattern.is_psk();
                }
                Token::S => overhead += DH_LEN + tag(keyed),
                Token::Ee | Token::Es | Token::Se | Token::Ss | Token::Psk => keyed = true,
            }
        }
        overhead + tag(keyed)
    }

    // ----- messages -----

    /// Write the next handshake message, with `payload` encrypted inside
    /// it once a key is available.
    ///
    /// Returns the number of bytes written to `out`.
    pub fn write_message(&mut self, payload: &[u8], out: &mut [u8]) -> Result<usize, Error> {
        self.write_message_with_rng(payload, out, &mut OsRng)
    }

    /// Write the next handshake message with a specific RNG.
    pub fn write_message_with_rng(
        &mut self,
        payload: &[u8],
        out: &mut [u8],
        rng: &mut impl CryptoRngCore,
    ) -> Result<usize, Error> {
        self.expect_state(State::Write)?;
        let needed = self
            .next_message_overhead()
            .checked_add(payload.len())
            .ok_or(Error::BufferTooSmall)?;
        if out.len() < needed {
            return Err(Error::BufferTooSmall);
        }

        match self.write_tokens(payload, &mut out[..needed], rng) {
            Ok(len) => {
                trace!(message = self.message_number, len, "wrote handshake message");
                self.advance();
                Ok(len)
            }
            Err(err) => Err(self.fail(err)),
        }
    }

    /// Read a handshake message from the peer.
    ///
    /// Returns the number of decrypted payload bytes written to `out`.
    pub fn read_message(&mut self, message: &[u8], out: &mut [u8]) -> Result<usize, Error> {
        self.expect_state(State::Read)?;
        let overhead = self.next_message_overhead();
        if message.len() < overhead {
            return Err(self.fail(Error::BadMessage));
        }
        if out.len() < message.len() - overhead {
            return Err(Error::BufferTooSmall);
        }

        match self.read_tokens(message, out) {
            Ok(len) => {
                trace!(message = self.message_number, len = message.len(), "read handshake message");
                self.advance();
                Ok(len)
            }
            Err(err) => Err(self.fail(err)),
        }
    }

    /// Hash the pre-message keys. Runs once, right before message 0.
    fn mix_premessages(&mut self, role: Role) -> Result<(), Error> {
        let pattern = self.protocol.pattern();
        let symmetric = self.symmetric.as_mut().ok_or(Error::WrongState)?;
        let sections = [
            (Role::Initiator, pattern.initiator_premessage()),
            (Role::Responder, pattern.responder_premessage()),
        ];
        for (owner, tokens) in sections {
            let local = owner == role;
            for token in tokens {
                let key = match (token, local) {
                    (Token::E, true) => self.dh.local_ephemeral().map(|pair| pair.public),
                    (Token::E, false) => self.dh.remote_ephemeral().copied(),
                    (Token::S, true) => self.dh.local_static().map(|pair| pair.public),
                    (Token::S, false) => self.dh.remote_static().copied(),
                    _ => return Err(Error::WrongState),
                }
                .ok_or(Error::MissingKey)?;
                symmetric.mix_hash(key.as_bytes());
                if *token == Token::E && pattern.is_psk() {
                    symmetric.mix_key(key.as_bytes());
                }
            }
        }
        Ok(())
    }

    fn write_tokens(
        &mut self,
        payload: &[u8],
        out: &mut [u8],
        rng: &mut impl CryptoRngCore,
    ) -> Result<usize, Error> {
        let role = self.role.ok_or(Error::WrongState)?;
        if self.message_number == 0 {
            self.mix_premessages(role)?;
        }
        let pattern = self.protocol.pattern();
        let tokens = pattern
            .messages()
            .get(self.message_number)
            .ok_or(Error::WrongState)?;
        let symmetric = self.symmetric.as_mut().ok_or(Error::WrongState)?;

        let mut offset = 0;
        for token in *tokens {
            match token {
                // -> e
                Token::E => {
                    let e = self.dh.generate_local_ephemeral(rng);
                    out[offset..offset + DH_LEN].copy_from_slice(e.as_bytes());
                    symmetric.mix_hash(e.as_bytes());
                    if pattern.is_psk() {
                        symmetric.mix_key(e.as_bytes());
                    }
                    offset += DH_LEN;
                }
                // -> s
                Token::S => {
                    let s = self.dh.local_static().ok_or(Error::MissingKey)?.public;
                    offset += symmetric.encrypt_and_hash(s.as_bytes(), &mut out[offset..])?;
                }
                Token::Ee => symmetric.mix_key(self.dh.ee()?.as_bytes()),
                Token::Es => symmetric.mix_key(self.dh.es(role)?.as_bytes()),
                Token::Se => symmetric.mix_key(self.dh.se(role)?.as_bytes()),
                Token::Ss => symmetric.mix_key(self.dh.ss()?.as_bytes()),
                Token::Psk => {
                    let psk = self.psk.as_ref().ok_or(Error::MissingKey)?;
                    symmetric.mix_key_and_hash(psk.as_bytes());
                }
            }
        }

        offset += symmetric.encrypt_and_hash(payload, &mut out[offset..])?;
        Ok(offset)
    }

    fn read_tokens(&mut self, message: &[u8], out: &mut [u8]) -> Result<usize, Error> {
        let role = self.role.ok_or(Error::WrongState)?;
        if self.message_number == 0 {
            self.mix_premessages(role)?;
        }
        let pattern = self.protocol.pattern();
        let tokens = pattern
            .messages()
            .get(self.message_number)
            .ok_or(Error::WrongState)?;
        let symmetric = self.symmetric.as_mut().ok_or(Error::WrongState)?;

        let mut offset = 0;
        for token in *tokens {
            match token {
                // <- e
                Token::E => {
                    let bytes = message
                        .get(offset..offset + DH_LEN)
                        .ok_or(Error::BadMessage)?;
                    let re = PublicKey::from_slice(bytes)?;
                    symmetric.mix_hash(bytes);
                    if pattern.is_psk() {
                        symmetric.mix_key(bytes);
                    }
                    self.dh.set_remote_ephemeral(re);
                    offset += DH_LEN;
                }
                // <- s
                Token::S => {
                    let len = DH_LEN + symmetric.overhead();
                    let ciphertext = message
                        .get(offset..offset + len)
                        .ok_or(Error::BadMessage)?;
                    let mut rs = [0u8; DH_LEN];
                    symmetric.decrypt_and_hash(ciphertext, &mut rs)?;
                    self.dh.set_remote_static(PublicKey::from_bytes(rs));
                    offset += len;
                }
                Token::Ee => symmetric.mix_key(self.dh.ee()?.as_bytes()),
                Token::Es => symmetric.mix_key(self.dh.es(role)?.as_bytes()),
                Token::Se => symmetric.mix_key(self.dh.se(role)?.as_bytes()),
                Token::Ss => symmetric.mix_key(self.dh.ss()?.as_bytes()),
                Token::Psk => {
                    let psk = self.psk.as_ref().ok_or(Error::MissingKey)?;
                    symmetric.mix_key_and_hash(psk.as_bytes());
                }
            }
        }

        let remaining = &message[offset..];
        if remaining.len() < symmetric.overhead() {
            return Err(Error::BadMessage);
        }
        symmetric.decrypt_and_hash(remaining, out)
    }

    // ----- completion -----

    /// The final handshake hash, a channel-binding value.
    ///
    /// Only available once all messages have been processed.
    pub fn handshake_hash(&self) -> Result<&[u8; HASH_LEN], Error> {
        match self.state {
            State::Split => self
                .symmetric
                .as_ref()
                .map(SymmetricState::handshake_hash)
                .ok_or(Error::WrongState),
            State::Finished => self.handshake_hash.as_ref().ok_or(Error::WrongState),
            _ => Err(Error::WrongState),
        }
    }

    /// Derive the transport ciphers, returned as `(send, receive)` for
    /// the local role.
    ///
    /// The initiator sends with the first derived key, the responder with
    /// the second. Ephemeral keys are scrubbed.
    pub fn split(&mut self) -> Result<(CipherState, CipherState), Error> {
        if self.state != State::Split {
            return Err(Error::WrongState);
        }
        let role = self.role.ok_or(Error::WrongState)?;
        let symmetric = self.symmetric.take().ok_or(Error::WrongState)?;
        let (h, c1, c2) = symmetric.split();
        self.handshake_hash = Some(h);
        self.dh.remove_ephemerals();
        self.state = State::Finished;
        debug!(protocol = self.protocol.name(), ?role, "handshake split");

        Ok(match role {
            Role::Initiator => (c1, c2),
            Role::Responder => (c2, c1),
        })
    }

    /// Convert the completed handshake into a transport state.
    pub fn into_transport(mut self) -> Result<TransportState, Error> {
        let (send, recv) = self.split()?;
        let h = self.handshake_hash.ok_or(Error::WrongState)?;
        Ok(TransportState::new(h, send, recv))
    }
}
