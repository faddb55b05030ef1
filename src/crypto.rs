use core::fmt;
use std::error;

use ck_meow::Meow;
use rand_core::CryptoRngCore;
use subtle::ConstantTimeEq;

use crate::party::PartyKey;

const CIPHER_LABEL: &[u8] = b"mpc-proxy-client v0.1.0 party cipher";
const NONCE_LEN: usize = 16;
const TAG_LEN: usize = 32;

/// Represents an error which can happen when decrypting a party's output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    /// The ciphertext doesn't have the expected shape.
    Malformed(String),
    /// The ciphertext failed authentication, so the key is wrong or the data was altered.
    Unauthenticated,
}

impl fmt::Display for CryptoError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CryptoError::Malformed(s) => write!(f, "malformed ciphertext: {}", s),
            CryptoError::Unauthenticated => write!(f, "ciphertext failed authentication"),
        }
    }
}

impl error::Error for CryptoError {}

/// A trait for decrypting the output of an encrypted party.
///
/// Which parties are encrypted, and under which key, is decided per party,
/// see [PartyRecord](crate::PartyRecord).
pub trait CryptoProvider {
    fn decrypt(&self, key: &PartyKey, data: &[u8]) -> Result<Vec<u8>, CryptoError>;
}

/// An authenticated cipher built on top of the Meow duplex.
///
/// A ciphertext is laid out as `nonce || body || tag`. The keystream and the tag
/// are both derived from the key and nonce, with the tag also covering the body.
#[derive(Debug, Clone, Copy, Default)]
pub struct MeowCipher;

impl MeowCipher {
    fn keyed(key: &PartyKey, nonce: &[u8]) -> Meow {
        let mut meow = Meow::new(CIPHER_LABEL);
        meow.meta_ad(b"key", false);
        meow.ad(key.as_ref(), false);
        meow.meta_ad(b"nonce", false);
        meow.ad(nonce, false);
        meow
    }

    fn apply_keystream(meow: &Meow, data: &mut [u8]) {
        let mut meow = meow.clone();
        let mut stream = vec![0u8; data.len()];
        meow.meta_ad(b"stream", false);
        meow.prf(&mut stream, false);
        for (x, k) in data.iter_mut().zip(stream) {
            *x ^= k;
        }
    }

    fn tag(mut meow: Meow, body: &[u8]) -> [u8; TAG_LEN] {
        let mut out = [0u8; TAG_LEN];
        meow.meta_ad(b"body", false);
        meow.ad(body, false);
        meow.prf(&mut out, false);
        out
    }

    /// Encrypt a plaintext under a key, with a fresh random nonce.
    pub fn seal(&self, rng: &mut impl CryptoRngCore, key: &PartyKey, plaintext: &[u8]) -> Vec<u8> {
        let mut nonce = [0u8; NONCE_LEN];
        rng.fill_bytes(&mut nonce);

        let meow = Self::keyed(key, &nonce);
        let mut body = plaintext.to_vec();
        Self::apply_keystream(&meow, &mut body);
        let tag = Self::tag(meow, &body);

        let mut out = Vec::with_capacity(NONCE_LEN + body.len() + TAG_LEN);
        out.extend_from_slice(&nonce);
        out.extend_from_slice(&body);
        out.extend_from_slice(&tag);
        out
    }
}

impl CryptoProvider for MeowCipher {
    fn decrypt(&self, key: &PartyKey, data: &[u8]) -> Result<Vec<u8>, CryptoError> {
        if data.len() < NONCE_LEN + TAG_LEN {
            return Err(CryptoError::Malformed(format!(
                "expected at least {} bytes, found: {}",
                NONCE_LEN + TAG_LEN,
                data.len()
            )));
        }
        let (nonce, rest) = data.split_at(NONCE_LEN);
        let (body, tag) = rest.split_at(rest.len() - TAG_LEN);

        let meow = Self::keyed(key, nonce);
        let expected = Self::tag(meow.clone(), body);
        if !bool::from(expected[..].ct_eq(tag)) {
            return Err(CryptoError::Unauthenticated);
        }

        let mut out = body.to_vec();
        Self::apply_keystream(&meow, &mut out);
        Ok(out)
    }
}
