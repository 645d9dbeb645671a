use zeroize::Zeroize;

use crate::cipher_state::CipherState;
use crate::crypto::aead::AEAD_TAG_LEN;
use crate::crypto::hash::HASH_LEN;
use crate::error::Error;

/// Post-handshake transport encryption state: one cipher per direction.
pub struct TransportState {
    send: CipherState,
    recv: CipherState,
    handshake_hash: [u8; HASH_LEN],
}

impl Drop for TransportState {
    fn drop(&mut self) {
        self.handshake_hash.zeroize();
    }
}

impl TransportState {
    pub(crate) fn new(handshake_hash: [u8; HASH_LEN], send: CipherState, recv: CipherState) -> Self {
        Self {
            send,
            recv,
            handshake_hash,
        }
    }

    /// Encrypt a payload for sending to the peer.
    ///
    /// Returns the number of bytes written to `out` (payload + AEAD tag).
    pub fn write_message(&mut self, payload: &[u8], out: &mut [u8]) -> Result<usize, Error> {
        self.send.encrypt_with_ad(&[], payload, out)
    }

    /// Decrypt a message received from the peer.
    ///
    /// Returns the number of plaintext bytes written to `out`.
    pub fn read_message(&mut self, message: &[u8], out: &mut [u8]) -> Result<usize, Error> {
        self.recv.decrypt_with_ad(&[], message, out)
    }

    /// The final handshake hash; equal on both sides.
    pub fn handshake_hash(&self) -> &[u8; HASH_LEN] {
        &self.handshake_hash
    }

    /// The AEAD tag overhead per transport message.
    pub fn overhead(&self) -> usize {
        AEAD_TAG_LEN
    }

    pub fn send_nonce(&self) -> u64 {
        self.send.nonce()
    }

    pub fn receive_nonce(&self) -> u64 {
        self.recv.nonce()
    }

    /// Decrypt the next message with an explicit nonce, for transports
    /// that can reorder or drop messages.
    pub fn set_receive_nonce(&mut self, nonce: u64) {
        self.recv.set_nonce(nonce);
    }

    pub fn rekey_send(&mut self) -> Result<(), Error> {
        self.send.rekey()
    }

    pub fn rekey_recv(&mut self) -> Result<(), Error> {
        self.recv.rekey()
    }
}

impl core::fmt::Debug for TransportState {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("TransportState")
            .field("send", &self.send)
            .field("recv", &self.recv)
            .finish_non_exhaustive()
    }
}
