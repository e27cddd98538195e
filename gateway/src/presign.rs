//! Time-limited pre-signed download URLs for `get` (spec §4.1: "protected_key
//! rewritten as a time-limited pre-signed URL valid for one hour").
//!
//! The choice of Object Store vendor is out of scope (spec §1), so this
//! does not reach for a vendor-specific presign call (e.g. the S3 SDK's
//! `PresignedRequest`) — instead it mints a short-lived signed token over
//! the object key using the same `jsonwebtoken` machinery `Auth` already
//! verifies bearer tokens with, appended as a query parameter on the
//! configured public base URL. A real deployment only needs the public
//! base to point at something that forwards `?token=` to vendor-specific
//! auth (a CDN edge function, a presigning proxy) — this crate's contract
//! is just "one signed, expiring URL per key."

use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
struct DownloadClaims {
    key: String,
    exp: usize,
}

#[derive(Clone)]
pub struct Presigner {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    public_base: String,
}

impl Presigner {
    pub fn new(secret: &[u8], public_base: impl Into<String>) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            public_base: public_base.into(),
        }
    }

    /// Mint a URL for `key` that expires `ttl` from now.
    pub fn sign(&self, key: &str, ttl: Duration) -> String {
        let claims = DownloadClaims {
            key: key.to_string(),
            exp: (Utc::now() + ttl).timestamp() as usize,
        };
        let token = encode(&Header::default(), &claims, &self.encoding_key)
            .expect("signing a download token never fails");
        format!(
            "{}/{}?token={}",
            self.public_base.trim_end_matches('/'),
            key,
            token
        )
    }

    /// Verify a previously minted token resolves to `key` and has not
    /// expired. Not reached from any handler today — kept for the
    /// presigning proxy described above, and exercised directly in tests.
    pub fn verify(&self, token: &str, key: &str) -> bool {
        decode::<DownloadClaims>(token, &self.decoding_key, &Validation::default())
            .map(|data| data.claims.key == key)
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signs_a_url_containing_the_key() {
        let signer = Presigner::new(b"secret", "https://cdn.example.invalid");
        let url = signer.sign("protected/abc.png", Duration::hours(1));
        assert!(url.starts_with("https://cdn.example.invalid/protected/abc.png?token="));
    }

    #[test]
    fn verify_roundtrips_and_rejects_wrong_key() {
        let signer = Presigner::new(b"secret", "https://cdn.example.invalid");
        let url = signer.sign("protected/abc.png", Duration::hours(1));
        let token = url.split("token=").nth(1).unwrap();
        assert!(signer.verify(token, "protected/abc.png"));
        assert!(!signer.verify(token, "protected/other.png"));
    }

    #[test]
    fn verify_rejects_expired_token() {
        let signer = Presigner::new(b"secret", "https://cdn.example.invalid");
        let url = signer.sign("protected/abc.png", Duration::seconds(-10));
        let token = url.split("token=").nth(1).unwrap();
        assert!(!signer.verify(token, "protected/abc.png"));
    }
}
