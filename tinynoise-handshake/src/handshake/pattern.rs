//! Handshake patterns as token tables.
//!
//! ```text
//! XX:                 IK:                 NNpsk0:             XXfallback:
//!   -> e                <- s                -> psk, e           -> e
//!   <- e, ee, s, es     ...                 <- e, ee            ...
//!   -> s, se            -> e, es, s, ss                         <- e, ee, s, es
//!                       <- e, ee, se                            -> s, se
//! ```

use crate::dh_state::DhState;

/// One step of a handshake message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Token {
    E,
    S,
    Ee,
    Es,
    Se,
    Ss,
    Psk,
}

/// The token sequence and key policy of a handshake pattern.
pub trait Pattern: Send + Sync {
    /// Pattern name as used in protocol names, e.g. `"XX"`.
    fn name(&self) -> &'static str;

    /// Keys the initiator is known to hold before the first message.
    fn initiator_premessage(&self) -> &'static [Token] {
        &[]
    }

    /// Keys the responder is known to hold before the first message.
    fn responder_premessage(&self) -> &'static [Token] {
        &[]
    }

    /// Token lists indexed by message number.
    fn messages(&self) -> &'static [&'static [Token]];

    /// Whether message 0 is sent by the responder.
    fn responder_writes_first(&self) -> bool {
        false
    }

    /// Whether this pattern can only be entered by falling back from
    /// another handshake.
    fn is_fallback(&self) -> bool {
        false
    }

    /// Forget stale keys before a handshake starts.
    fn remove_keys(&self, dh: &mut DhState) {
        dh.remove_ephemerals();
    }

    /// PSK patterns also run `MixKey(e)` for every `e` token.
    fn is_psk(&self) -> bool {
        self.messages().iter().any(|m| m.contains(&Token::Psk))
    }
}

pub struct Xx;

impl Pattern for Xx {
    fn name(&self) -> &'static str {
        "XX"
    }

    fn messages(&self) -> &'static [&'static [Token]] {
        use Token::*;
        &[&[E], &[E, Ee, S, Es], &[S, Se]]
    }

    fn remove_keys(&self, dh: &mut DhState) {
        // The remote static is learned during the handshake; the local
        // static is kept because we will send it.
        dh.remove_remote_static();
        dh.remove_ephemerals();
    }
}

pub struct Ik;

impl Pattern for Ik {
    fn name(&self) -> &'static str {
        "IK"
    }

    fn responder_premessage(&self) -> &'static [Token] {
        &[Token::S]
    }

    fn messages(&self) -> &'static [&'static [Token]] {
        use Token::*;
        &[&[E, Es, S, Ss], &[E, Ee, Se]]
    }
}

pub struct NNpsk0;

impl Pattern for NNpsk0 {
    fn name(&self) -> &'static str {
        "NNpsk0"
    }

    fn messages(&self) -> &'static [&'static [Token]] {
        use Token::*;
        &[&[Psk, E], &[E, Ee]]
    }
}

pub struct XxFallback;

impl Pattern for XxFallback {
    fn name(&self) -> &'static str {
        "XXfallback"
    }

    fn initiator_premessage(&self) -> &'static [Token] {
        &[Token::E]
    }

    fn messages(&self) -> &'static [&'static [Token]] {
        use Token::*;
        &[&[E, Ee, S, Es], &[S, Se]]
    }

    fn responder_writes_first(&self) -> bool {
        true
    }

    fn is_fallback(&self) -> bool {
        true
    }

    fn remove_keys(&self, dh: &mut DhState) {
        // The ephemerals were carried over from the abandoned handshake.
        dh.remove_remote_static();
    }
}

/// Every supported pattern.
pub(crate) static PATTERNS: [&dyn Pattern; 4] = [&Xx, &Ik, &NNpsk0, &XxFallback];

/// Look up a pattern by its protocol-name component.
pub fn by_name(name: &str) -> Option<&'static dyn Pattern> {
    PATTERNS.iter().copied().find(|p| p.name() == name)
}
