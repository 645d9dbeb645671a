mod keypair;
mod psk;

pub use keypair::{KeyPair, PublicKey, StaticSecret};
pub use psk::{PSK_LEN, PresharedKey};
