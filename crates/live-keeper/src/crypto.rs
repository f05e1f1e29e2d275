//! Password encryption for the passport login exchange.
//!
//! The passport host hands out a PKCS#8 PEM public key together with a
//! one-time hash; the login form expects `base64(rsa(hash + password))`
//! with PKCS#1 v1.5 padding.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use rsa::pkcs8::DecodePublicKey;
use rsa::rand_core::OsRng;
use rsa::{Pkcs1v15Encrypt, RsaPublicKey};

use crate::error::{KeeperError, Result};

/// Encrypt `hash + password` with the server-issued RSA public key.
///
/// The output is not byte-reproducible (the padding is randomized); it only
/// needs to decrypt on the server side.
pub fn encrypt_password(key_pem: &str, hash: &str, password: &str) -> Result<String> {
    let public_key = RsaPublicKey::from_public_key_pem(key_pem)
        .map_err(|e| KeeperError::Crypto(e.to_string()))?;

    let message = format!("{}{}", hash, password);
    let mut rng = OsRng;
    let encrypted = public_key
        .encrypt(&mut rng, Pkcs1v15Encrypt, message.as_bytes())
        .map_err(|e| KeeperError::Crypto(e.to_string()))?;

    Ok(STANDARD.encode(encrypted))
}
