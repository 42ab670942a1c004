//! Credential handling: bearer tokens, passwords, and the user directory.

pub mod bearer;
pub mod directory;
pub mod password;
pub mod token;

pub use bearer::{parse_bearer, BearerCredential};
pub use directory::{DirectoryError, SeedUser, UserDirectory};
pub use password::{PasswordHasher, PasswordPolicy};
pub use token::{IdentityClaims, IssuedToken, TokenError, TokenService, VerifiedClaims};
