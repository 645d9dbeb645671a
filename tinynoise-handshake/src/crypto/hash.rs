use blake2::Blake2s256;
use sha2::{Digest, Sha256};
use zeroize::Zeroizing;

/// Hash output length. Both supported hashes produce 32 bytes.
pub const HASH_LEN: usize = 32;

/// Block length of both supported hashes, used by HMAC.
const BLOCK_LEN: usize = 64;

/// The hash function selected by a protocol name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HashKind {
    Blake2s,
    Sha256,
}

impl HashKind {
    /// The name of this hash as it appears in a Noise protocol name.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Blake2s => "BLAKE2s",
            Self::Sha256 => "SHA256",
        }
    }

    /// Look up a hash by its protocol-name component.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "BLAKE2s" => Some(Self::Blake2s),
            "SHA256" => Some(Self::Sha256),
            _ => None,
        }
    }
}

/// An incremental hash computation for either supported algorithm.
#[derive(Clone)]
pub enum Hasher {
    Blake2s(Blake2s256),
    Sha256(Sha256),
}

impl Hasher {
    pub fn new(kind: HashKind) -> Self {
        match kind {
            HashKind::Blake2s => Self::Blake2s(Blake2s256::new()),
            HashKind::Sha256 => Self::Sha256(Sha256::new()),
        }
    }

    pub fn update(&mut self, data: &[u8]) {
        match self {
            Self::Blake2s(h) => h.update(data),
            Self::Sha256(h) => h.update(data),
        }
    }

    pub fn finalize(self) -> [u8; HASH_LEN] {
        let mut out = [0u8; HASH_LEN];
        match self {
            Self::Blake2s(h) => out.copy_from_slice(&h.finalize()),
            Self::Sha256(h) => out.copy_from_slice(&h.finalize()),
        }
        out
    }
}

/// Hash a single input.
pub fn hash(kind: HashKind, input: &[u8]) -> [u8; HASH_LEN] {
    let mut hasher = Hasher::new(kind);
    hasher.update(input);
    hasher.finalize()
}

/// Hash two concatenated inputs without allocating.
pub fn hash_two(kind: HashKind, a: &[u8], b: &[u8]) -> [u8; HASH_LEN] {
    let mut hasher = Hasher::new(kind);
    hasher.update(a);
    hasher.update(b);
    hasher.finalize()
}

/// HMAC per [RFC 2104](https://datatracker.ietf.org/doc/html/rfc2104).
///
/// Uses the standard HMAC construction, not BLAKE2's built-in keyed mode,
/// for compatibility with other Noise implementations (notably `snow`).
pub fn hmac(kind: HashKind, key: &[u8; HASH_LEN], data: &[u8]) -> Zeroizing<[u8; HASH_LEN]> {
    hmac_multi(kind, key, &[data])
}

/// HMAC over multiple data slices (fed sequentially to the hasher).
fn hmac_multi(kind: HashKind, key: &[u8; HASH_LEN], parts: &[&[u8]]) -> Zeroizing<[u8; HASH_LEN]> {
    const IPAD: u8 = 0x36;
    const OPAD: u8 = 0x5c;

    // Key fits within block size (32 <= 64), no pre-hashing needed.
    let mut ipad_key = Zeroizing::new([IPAD; BLOCK_LEN]);
    let mut opad_key = Zeroizing::new([OPAD; BLOCK_LEN]);
    for i in 0..HASH_LEN {
        ipad_key[i] ^= key[i];
        opad_key[i] ^= key[i];
    }

    let mut inner = Hasher::new(kind);
    inner.update(ipad_key.as_slice());
    for part in parts {
        inner.update(part);
    }
    let inner_hash = Zeroizing::new(inner.finalize());

    let mut outer = Hasher::new(kind);
    outer.update(opad_key.as_slice());
    outer.update(inner_hash.as_slice());
    Zeroizing::new(outer.finalize())
}

/// HKDF with 2 output blocks.
///
/// Returns `(output1, output2)` where:
/// - `output1 = HMAC(temp_key, 0x01)`
/// - `output2 = HMAC(temp_key, output1 || 0x02)`
pub fn hkdf2(
    kind: HashKind,
    chaining_key: &[u8; HASH_LEN],
    input_key_material: &[u8],
) -> (Zeroizing<[u8; HASH_LEN]>, Zeroizing<[u8; HASH_LEN]>) {
    let temp_key = hmac(kind, chaining_key, input_key_material);
    let output1 = hmac(kind, &temp_key, &[0x01]);
    let output2 = hmac_multi(kind, &temp_key, &[output1.as_slice(), &[0x02]]);
    (output1, output2)
}

/// Three zeroized HKDF output blocks.
pub type HkdfOutput3 = (
    Zeroizing<[u8; HASH_LEN]>,
    Zeroizing<[u8; HASH_LEN]>,
    Zeroizing<[u8; HASH_LEN]>,
);

/// HKDF with 3 output blocks, used by `MixKeyAndHash`.
pub fn hkdf3(
    kind: HashKind,
    chaining_key: &[u8; HASH_LEN],
    input_key_material: &[u8],
) -> HkdfOutput3 {
    let temp_key = hmac(kind, chaining_key, input_key_material);
    let output1 = hmac(kind, &temp_key, &[0x01]);
    let output2 = hmac_multi(kind, &temp_key, &[output1.as_slice(), &[0x02]]);
    let output3 = hmac_multi(kind, &temp_key, &[output2.as_slice(), &[0x03]]);
    (output1, output2, output3)
}
