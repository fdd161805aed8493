//! # Entropy capability
//!
//! Connection ID generation, stateless reset tokens, and PATH_CHALLENGE
//! entropy all need cryptographic randomness. The source is injected as a
//! trait object so tests can pin the bytes; production code uses the
//! operating system RNG.

use rand::RngCore;

/// Source of cryptographic random bytes.
///
/// Implementations must be safe to call with the connection lock held;
/// they must not block.
pub trait EntropySource {
    /// Fill `buf` with random bytes.
    fn fill(&mut self, buf: &mut [u8]);
}

/// Operating system RNG, the default source.
#[derive(Debug, Default)]
pub struct OsEntropy;

impl EntropySource for OsEntropy {
    fn fill(&mut self, buf: &mut [u8]) {
        rand::rngs::OsRng.fill_bytes(buf);
    }
}
