//! Argon2id password hashing and password policy.

use argon2::{
    password_hash::{
        PasswordHash, PasswordHasher as Argon2PasswordHasher, PasswordVerifier, SaltString,
    },
    Algorithm, Argon2, Params, Version,
};
use rand::rngs::OsRng;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PasswordPolicyError {
    TooShort { min_length: usize },
    MissingLetter,
    MissingDigit,
}

impl std::fmt::Display for PasswordPolicyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PasswordPolicyError::TooShort { min_length } => {
                write!(f, "Password must be at least {} characters", min_length)
            }
            PasswordPolicyError::MissingLetter => {
                write!(f, "Password must contain at least one letter")
            }
            PasswordPolicyError::MissingDigit => {
                write!(f, "Password must contain at least one digit")
            }
        }
    }
}

impl std::error::Error for PasswordPolicyError {}

#[derive(Debug, Clone)]
pub struct PasswordPolicy {
    pub min_length: usize,
    pub require_letter_and_digit: bool,
}

impl Default for PasswordPolicy {
    fn default() -> Self {
        Self {
            min_length: 8,
            require_letter_and_digit: false,
        }
    }
}

impl PasswordPolicy {
    pub fn new(min_length: usize, require_letter_and_digit: bool) -> Self {
        Self {
            min_length,
            require_letter_and_digit,
        }
    }

    pub fn validate(&self, password: &str) -> Result<(), PasswordPolicyError> {
        if password.chars().count() < self.min_length {
            return Err(PasswordPolicyError::TooShort {
                min_length: self.min_length,
            });
        }

        if self.require_letter_and_digit {
            if !password.chars().any(char::is_alphabetic) {
                return Err(PasswordPolicyError::MissingLetter);
            }
            if !password.chars().any(|c| c.is_ascii_digit()) {
                return Err(PasswordPolicyError::MissingDigit);
            }
        }

        Ok(())
    }
}

/// Argon2id hasher with a fixed memory cost.
#[derive(Clone)]
pub struct PasswordHasher {
    argon2: Argon2<'static>,
}

impl std::fmt::Debug for PasswordHasher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PasswordHasher")
            .field("m_cost", &self.argon2.params().m_cost())
            .finish()
    }
}

impl PasswordHasher {
    /// Memory cost is `2^memory_cost_log2` KiB, capped at 4 GiB.
    ///
    /// - 4: tests
    /// - 12: ~4MB, development
    /// - 16: ~64MB, production
    pub fn with_cost(memory_cost_log2: u32) -> Result<Self, argon2::password_hash::Error> {
        let m_cost = 1u32 << memory_cost_log2.clamp(3, 22);
        let params =
            Params::new(m_cost, 3, 1, None).map_err(|_| argon2::password_hash::Error::Algorithm)?;

        Ok(Self {
            argon2: Argon2::new(Algorithm::Argon2id, Version::V0x13, params),
        })
    }

    pub fn hash(&self, password: &str) -> Result<String, argon2::password_hash::Error> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = self.argon2.hash_password(password.as_bytes(), &salt)?;
        Ok(hash.to_string())
    }

    /// Parameters are read from the PHC string, so hashes made with a
    /// different cost still verify.
    pub fn verify(
        &self,
        password: &str,
        password_hash: &str,
    ) -> Result<bool, argon2::password_hash::Error> {
        let parsed = PasswordHash::new(password_hash)?;
        match self.argon2.verify_password(password.as_bytes(), &parsed) {
            Ok(()) => Ok(true),
            Err(argon2::password_hash::Error::Password) => Ok(false),
            Err(e) => Err(e),
        }
    }
}
