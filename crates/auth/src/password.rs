//! One-way adaptive password hashing (bcrypt, random salt per hash).

use thiserror::Error;

#[derive(Debug, Error)]
#[error("password hashing failed: {0}")]
pub struct PasswordError(#[from] bcrypt::BcryptError);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PasswordHasher {
    cost: u32,
}

impl Default for PasswordHasher {
    fn default() -> Self {
        Self::new(bcrypt::DEFAULT_COST)
    }
}

impl PasswordHasher {
    /// `cost` is clamped to bcrypt's supported range (4..=31).
    pub fn new(cost: u32) -> Self {
        Self { cost: cost.clamp(4, 31) }
    }

    pub fn cost(&self) -> u32 {
        self.cost
    }

    pub fn hash(&self, plain: &str) -> Result<String, PasswordError> {
        Ok(bcrypt::hash(plain, self.cost)?)
    }

    /// `Ok(false)` for a wrong password; `Err` only for a corrupt stored hash.
    pub fn verify(&self, plain: &str, hash: &str) -> Result<bool, PasswordError> {
        Ok(bcrypt::verify(plain, hash)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_then_verify() {
        let hasher = PasswordHasher::new(4);
        let hash = hasher.hash("hunter2").unwrap();
        assert_ne!(hash, "hunter2");
        assert!(hasher.verify("hunter2", &hash).unwrap());
        assert!(!hasher.verify("hunter3", &hash).unwrap());
    }

    #[test]
    fn salts_differ_between_hashes() {
        let hasher = PasswordHasher::new(4);
        assert_ne!(hasher.hash("same").unwrap(), hasher.hash("same").unwrap());
    }

    #[test]
    fn corrupt_hash_is_an_error() {
        assert!(PasswordHasher::new(4).verify("x", "not-a-bcrypt-hash").is_err());
    }

    #[test]
    fn cost_is_clamped() {
        assert_eq!(PasswordHasher::new(1).cost(), 4);
        assert_eq!(PasswordHasher::new(99).cost(), 31);
    }
}
