//! Anti-forgery tokens derived from a per-session secret.
//!
//! A token is `<salt>-<digest>` where the digest is the URL-safe base64 SHA-256 of
//! `<salt>-<secret>`. Any number of tokens can be minted for one secret and each of
//! them verifies until the secret changes.

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use uuid::Uuid;

const SALT_LEN: usize = 8;

/// Produce a fresh per-session secret.
pub fn generate_secret() -> String {
    format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple())
}

/// Mint a token for embedding in a rendered form.
pub fn mint_token(secret: &str) -> String {
    let salt = Uuid::new_v4().simple().to_string()[..SALT_LEN].to_string();
    let digest = salted_digest(&salt, secret);
    format!("{salt}-{digest}")
}

/// Check a client-supplied token against the session secret.
pub fn verify_token(secret: &str, token: &str) -> bool {
    let Some((salt, supplied)) = token.split_once('-') else {
        return false;
    };
    if salt.is_empty() || supplied.is_empty() {
        return false;
    }

    let expected = salted_digest(salt, secret);
    expected.as_bytes().ct_eq(supplied.as_bytes()).into()
}

fn salted_digest(salt: &str, secret: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(b"-");
    hasher.update(secret.as_bytes());
    URL_SAFE_NO_PAD.encode(hasher.finalize().as_slice())
}
