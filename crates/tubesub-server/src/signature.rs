//! WebSub content-distribution signatures.
//!
//! When a subscription was created with `hub.secret`, the hub signs every
//! notification body with HMAC and sends `X-Hub-Signature: <alg>=<hex>`.
//! The signature covers the exact body bytes, so verification has to run on
//! the raw request body before anything parses it.

use hmac::{Hmac, Mac};
use sha1::Sha1;
use sha2::{Sha256, Sha512};

/// Header carrying the body signature.
pub const SIGNATURE_HEADER: &str = "x-hub-signature";

/// Digest algorithms a hub may use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureAlgorithm {
    Sha1,
    Sha256,
    Sha512,
}

impl SignatureAlgorithm {
    pub const fn prefix(self) -> &'static str {
        match self {
            Self::Sha1 => "sha1",
            Self::Sha256 => "sha256",
            Self::Sha512 => "sha512",
        }
    }

    const fn digest_len(self) -> usize {
        match self {
            Self::Sha1 => 20,
            Self::Sha256 => 32,
            Self::Sha512 => 64,
        }
    }

    fn from_prefix(prefix: &str) -> Option<Self> {
        match prefix.to_ascii_lowercase().as_str() {
            "sha1" => Some(Self::Sha1),
            "sha256" => Some(Self::Sha256),
            "sha512" => Some(Self::Sha512),
            _ => None,
        }
    }
}

/// Parses a signature header (e.g. `"sha1=abc123..."`) into algorithm and
/// raw digest bytes.
///
/// Returns `None` for unknown algorithms, bad hex, or a digest of the wrong
/// length. Never panics.
pub fn parse_signature_header(header: &str) -> Option<(SignatureAlgorithm, Vec<u8>)> {
    let (prefix, hex_sig) = header.trim().split_once('=')?;
    let algorithm = SignatureAlgorithm::from_prefix(prefix)?;
    let digest = hex::decode(hex_sig.trim()).ok()?;
    (digest.len() == algorithm.digest_len()).then_some((algorithm, digest))
}

/// Computes the HMAC of `payload` under `secret`.
pub fn compute_signature(algorithm: SignatureAlgorithm, payload: &[u8], secret: &[u8]) -> Vec<u8> {
    match algorithm {
        SignatureAlgorithm::Sha1 => keyed::<Hmac<Sha1>>(secret, payload)
            .finalize()
            .into_bytes()
            .to_vec(),
        SignatureAlgorithm::Sha256 => keyed::<Hmac<Sha256>>(secret, payload)
            .finalize()
            .into_bytes()
            .to_vec(),
        SignatureAlgorithm::Sha512 => keyed::<Hmac<Sha512>>(secret, payload)
            .finalize()
            .into_bytes()
            .to_vec(),
    }
}

/// Formats a digest as a header value, e.g. `"sha1=<hex>"`.
pub fn format_signature_header(algorithm: SignatureAlgorithm, signature: &[u8]) -> String {
    format!("{}={}", algorithm.prefix(), hex::encode(signature))
}

/// Verifies a notification signature against the payload and secret.
///
/// Comparison is constant-time (`Mac::verify_slice`).
pub fn verify_signature(payload: &[u8], signature_header: &str, secret: &[u8]) -> bool {
    let Some((algorithm, expected)) = parse_signature_header(signature_header) else {
        return false;
    };

    match algorithm {
        SignatureAlgorithm::Sha1 => keyed::<Hmac<Sha1>>(secret, payload)
            .verify_slice(&expected)
            .is_ok(),
        SignatureAlgorithm::Sha256 => keyed::<Hmac<Sha256>>(secret, payload)
            .verify_slice(&expected)
            .is_ok(),
        SignatureAlgorithm::Sha512 => keyed::<Hmac<Sha512>>(secret, payload)
            .verify_slice(&expected)
            .is_ok(),
    }
}

fn keyed<M: Mac + hmac::digest::KeyInit>(secret: &[u8], payload: &[u8]) -> M {
    // HMAC accepts keys of any length, so `new_from_slice` cannot fail here.
    let mut mac = <M as hmac::digest::KeyInit>::new_from_slice(secret)
        .unwrap_or_else(|_| unreachable!("HMAC takes keys of any size"));
    mac.update(payload);
    mac
}
