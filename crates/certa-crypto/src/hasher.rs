use std::fmt;

/// A 32-byte BLAKE3 digest.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContentDigest([u8; 32]);

impl ContentDigest {
    /// Full hex encoding (64 characters).
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// First 8 hex characters.
    pub fn short_hex(&self) -> String {
        hex::encode(&self.0[..4])
    }
}

impl fmt::Debug for ContentDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentDigest({})", self.short_hex())
    }
}

impl fmt::Display for ContentDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Domain-separated BLAKE3 content hasher.
///
/// Each hasher carries a domain tag that is prepended to every hash
/// computation, so an asset and a fingerprint over identical bytes never
/// collide.
pub struct ContentHasher {
    domain: &'static str,
}

impl ContentHasher {
    /// Hasher for certificate asset bytes. Determines the asset object key.
    pub const ASSET: Self = Self {
        domain: "certa-asset-v1",
    };
    /// Hasher for registration submissions (duplicate guard).
    pub const REGISTRATION: Self = Self {
        domain: "certa-registration-v1",
    };
    /// Hasher for mint submissions (duplicate guard).
    pub const MINT: Self = Self {
        domain: "certa-mint-v1",
    };

    /// Hash raw bytes with domain separation.
    pub fn hash(&self, data: &[u8]) -> ContentDigest {
        let mut hasher = self.start();
        hasher.update(data);
        ContentDigest(*hasher.finalize().as_bytes())
    }

    /// Hash several byte strings as one unambiguous message.
    ///
    /// Each part is length-prefixed, so `["ab", "c"]` and `["a", "bc"]`
    /// hash differently.
    pub fn hash_parts(&self, parts: &[&[u8]]) -> ContentDigest {
        let mut hasher = self.start();
        for part in parts {
            hasher.update(&(part.len() as u64).to_le_bytes());
            hasher.update(part);
        }
        ContentDigest(*hasher.finalize().as_bytes())
    }

    fn start(&self) -> blake3::Hasher {
        let mut hasher = blake3::Hasher::new();
        hasher.update(self.domain.as_bytes());
        hasher.update(b":");
        hasher
    }
}
