use std::fmt;
use std::num::NonZeroU32;

use ring::pbkdf2;
use ring::rand::{SecureRandom, SystemRandom};

use crate::error::AuthError;

/// Salt and derived-key length in bytes.
pub const KEY_SIZE: usize = 64;

/// PBKDF2 rounds used in production.
pub const DEFAULT_ITERATIONS: NonZeroU32 = match NonZeroU32::new(200_000) {
    Some(n) => n,
    None => panic!("iteration count must be non-zero"),
};

static ALGORITHM: pbkdf2::Algorithm = pbkdf2::PBKDF2_HMAC_SHA512;

/// Stands in for a stored hash and salt when there is nothing to compare against.
static DECOY: [u8; KEY_SIZE] = [0u8; KEY_SIZE];

/// A derived hash and the salt it was derived with.
#[derive(Clone, PartialEq, Eq)]
pub struct HashedSecret {
    pub hash: Vec<u8>,
    pub salt: Vec<u8>,
}

impl fmt::Debug for HashedSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HashedSecret").finish_non_exhaustive()
    }
}

/// PBKDF2-HMAC-SHA512 hasher for passwords and refresh-token secrets.
#[derive(Debug, Clone)]
pub struct PasswordHasher {
    iterations: NonZeroU32,
    rng: SystemRandom,
}

impl PasswordHasher {
    pub fn new() -> Self {
        Self::with_iterations(DEFAULT_ITERATIONS)
    }

    /// Hasher with a custom round count. Only test harnesses should lower it.
    pub fn with_iterations(iterations: NonZeroU32) -> Self {
        Self {
            iterations,
            rng: SystemRandom::new(),
        }
    }

    pub fn iterations(&self) -> u32 {
        self.iterations.get()
    }

    /// Hash a plaintext under a fresh random salt.
    pub fn hash(&self, plaintext: &str) -> Result<HashedSecret, AuthError> {
        let mut salt = vec![0u8; KEY_SIZE];
        self.rng.fill(&mut salt)?;

        let hash = self.derive(plaintext, &salt);
        Ok(HashedSecret { hash, salt })
    }

    /// Re-derive with the stored salt and compare the whole output in constant time.
    pub fn verify(&self, plaintext: &str, hash: &[u8], salt: &[u8]) -> bool {
        pbkdf2::verify(
            ALGORITHM,
            self.iterations,
            salt,
            plaintext.as_bytes(),
            hash,
        )
        .is_ok()
    }

    /// Spend the same work as [`verify`](Self::verify) for a record that does
    /// not exist. Always `false`.
    pub fn verify_absent(&self, plaintext: &str) -> bool {
        self.verify(plaintext, &DECOY, &DECOY)
    }

    fn derive(&self, plaintext: &str, salt: &[u8]) -> Vec<u8> {
        let mut out = vec![0u8; KEY_SIZE];
        pbkdf2::derive(
            ALGORITHM,
            self.iterations,
            salt,
            plaintext.as_bytes(),
            &mut out,
        );
        out
    }
}

impl Default for PasswordHasher {
    fn default() -> Self {
        Self::new()
    }
}
