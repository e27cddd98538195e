//! Bearer-token authentication. Spec §6: "the opaque `owner_id` is
//! extracted from the `sub` claim after signature verification against a
//! configured secret; missing/invalid token -> 401." User authentication
//! itself (issuing tokens, accounts) is an external collaborator (spec §1)
//! — this is signature verification only, grounded in the teacher's
//! `Auth::decode_token`, with password hashing and token issuance dropped
//! since there is no user record in this core's data model.

use jsonwebtoken::{DecodingKey, Validation, decode};
use serde::{Deserialize, Serialize};

use lore_anchor_shared::error::CoreError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: usize,
}

#[derive(Clone)]
pub struct Auth {
    decoding_key: DecodingKey,
}

impl std::fmt::Debug for Auth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Auth").field("decoding_key", &"<DecodingKey>").finish()
    }
}

impl Auth {
    pub fn new(jwt_secret: &[u8]) -> Self {
        Self {
            decoding_key: DecodingKey::from_secret(jwt_secret),
        }
    }

    /// Verify `token`'s signature and expiry, returning the `owner_id`
    /// (the `sub` claim). Any failure collapses to `Unauthenticated` —
    /// the caller never learns whether the token was malformed, expired,
    /// or had a bad signature.
    pub fn verify(&self, token: &str) -> Result<String, CoreError> {
        decode::<Claims>(token, &self.decoding_key, &Validation::default())
            .map(|data| data.claims.sub)
            .map_err(|e| {
                log::warn!("[auth] token verification failed: {e}");
                CoreError::Unauthenticated
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{EncodingKey, Header, encode};

    fn token_for(sub: &str, secret: &[u8]) -> String {
        let claims = Claims {
            sub: sub.to_string(),
            exp: (chrono::Utc::now().timestamp() + 3600) as usize,
        };
        encode(&Header::default(), &claims, &EncodingKey::from_secret(secret)).unwrap()
    }

    #[test]
    fn verifies_well_formed_token() {
        let auth = Auth::new(b"secret");
        let token = token_for("owner-1", b"secret");
        assert_eq!(auth.verify(&token).unwrap(), "owner-1");
    }

    #[test]
    fn rejects_wrong_secret() {
        let auth = Auth::new(b"secret");
        let token = token_for("owner-1", b"other-secret");
        assert!(matches!(auth.verify(&token), Err(CoreError::Unauthenticated)));
    }

    #[test]
    fn rejects_expired_token() {
        let auth = Auth::new(b"secret");
        let claims = Claims {
            sub: "owner-1".to_string(),
            exp: (chrono::Utc::now().timestamp() - 10) as usize,
        };
        let token = encode(&Header::default(), &claims, &EncodingKey::from_secret(b"secret")).unwrap();
        assert!(matches!(auth.verify(&token), Err(CoreError::Unauthenticated)));
    }
}
