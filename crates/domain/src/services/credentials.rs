//! Password hashing, bearer tokens, email codes and short-code generation.

use argon2::{
    password_hash::{self, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use hex::encode as hex_encode;
use sha3::{Digest, Sha3_256};
use thiserror::Error;

use crate::model::{ShortCode, UserId, SHORT_CODE_ALPHABET, SHORT_CODE_LENGTH};

/// Raw bytes behind a bearer token; the hex form is twice as long.
pub const TOKEN_BYTES: usize = 32;
pub const OTP_DIGITS: usize = 6;

#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("system randomness unavailable: {0}")]
    Randomness(String),
    #[error("password hashing failed: {0}")]
    Hashing(String),
    #[error("stored password hash is malformed: {0}")]
    MalformedHash(String),
}

impl From<getrandom::Error> for CredentialError {
    fn from(err: getrandom::Error) -> Self {
        Self::Randomness(err.to_string())
    }
}

/// Hashes a password into an argon2id PHC string.
pub fn hash_password(password: &str) -> Result<String, CredentialError> {
    let mut salt_bytes = [0u8; 16];
    getrandom::fill(&mut salt_bytes)?;
    let salt = SaltString::encode_b64(&salt_bytes)
        .map_err(|err| CredentialError::Hashing(err.to_string()))?;

    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|err| CredentialError::Hashing(err.to_string()))
}

/// `Ok(false)` on mismatch; `Err` only when the stored hash cannot be parsed.
pub fn verify_password(password: &str, stored_hash: &str) -> Result<bool, CredentialError> {
    let parsed = PasswordHash::new(stored_hash)
        .map_err(|err| CredentialError::MalformedHash(err.to_string()))?;
    match Argon2::default().verify_password(password.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(password_hash::Error::Password) => Ok(false),
        Err(err) => Err(CredentialError::Hashing(err.to_string())),
    }
}

/// Fresh random bearer secret, hex encoded.
pub fn generate_token() -> Result<String, CredentialError> {
    let mut bytes = [0u8; TOKEN_BYTES];
    getrandom::fill(&mut bytes)?;
    Ok(hex_encode(bytes))
}

/// SHA3-256 fingerprint stored in place of the bearer secret.
pub fn token_digest(token: &str) -> String {
    let mut hasher = Sha3_256::new();
    hasher.update(token.trim().as_bytes());
    hex_encode(hasher.finalize())
}

/// Uniformly distributed numeric code with [`OTP_DIGITS`] digits.
pub fn generate_otp() -> Result<String, CredentialError> {
    sample_alphabet(b"0123456789", OTP_DIGITS)
}

/// Email codes are bound to the user so a leaked digest is useless for
/// another account.
pub fn otp_digest(user_id: UserId, code: &str) -> String {
    let mut hasher = Sha3_256::new();
    hasher.update(user_id.to_be_bytes());
    hasher.update(code.trim().as_bytes());
    hex_encode(hasher.finalize())
}

/// Random candidate short code; uniqueness is enforced by storage.
pub fn generate_short_code() -> Result<ShortCode, CredentialError> {
    sample_alphabet(SHORT_CODE_ALPHABET, SHORT_CODE_LENGTH).map(ShortCode::new_unchecked)
}

fn sample_alphabet(alphabet: &[u8], len: usize) -> Result<String, CredentialError> {
    // Rejection sampling keeps every symbol equally likely.
    let limit = 256 - (256 % alphabet.len());
    let mut out = String::with_capacity(len);
    let mut buf = [0u8; 32];
    while out.len() < len {
        getrandom::fill(&mut buf)?;
        for byte in buf {
            if (byte as usize) < limit {
                out.push(alphabet[byte as usize % alphabet.len()] as char);
                if out.len() == len {
                    break;
                }
            }
        }
    }
    Ok(out)
}
