//! HS256 bearer tokens.

use crate::error::AppError;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// User id.
    pub sub: String,
    pub email: String,
    pub iat: i64,
    pub exp: i64,
    pub iss: String,
}

#[derive(Clone)]
pub struct TokenIssuer {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    issuer: String,
    lifetime: Duration,
}

impl TokenIssuer {
    pub fn new(secret: &[u8], issuer: impl Into<String>, lifetime: Duration) -> Self {
        let issuer = issuer.into();
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[issuer.as_str()]);
        validation.set_required_spec_claims(&["exp", "sub", "iss"]);
        TokenIssuer {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            validation,
            issuer,
            lifetime,
        }
    }

    pub fn issue(&self, user_id: &str, email: &str) -> Result<String, AppError> {
        self.issue_with_lifetime(user_id, email, self.lifetime)
    }

    pub fn issue_with_lifetime(&self, user_id: &str, email: &str, lifetime: Duration) -> Result<String, AppError> {
        let now = Utc::now();
        let claims = Claims {
            sub: user_id.to_string(),
            email: email.to_string(),
            iat: now.timestamp(),
            exp: (now + lifetime).timestamp(),
            iss: self.issuer.clone(),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| AppError::Internal(format!("failed to sign token: {}", e)))
    }

    /// Signature, issuer and expiry are all checked.
    pub fn verify(&self, token: &str) -> Result<Claims, AppError> {
        decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| AppError::Unauthorized(format!("invalid token: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn issuer() -> TokenIssuer {
        TokenIssuer::new(b"test-secret", "crud-admin", Duration::hours(8))
    }

    #[test]
    fn issued_token_verifies() {
        let tokens = issuer();
        let token = tokens.issue("42", "ana@example.com").unwrap();
        let claims = tokens.verify(&token).unwrap();
        assert_eq!(claims.sub, "42");
        assert_eq!(claims.email, "ana@example.com");
        assert_eq!(claims.exp - claims.iat, 8 * 3600);
    }

    #[test]
    fn rejects_other_secret_and_issuer() {
        let token = issuer().issue("42", "ana@example.com").unwrap();
        let other_secret = TokenIssuer::new(b"other", "crud-admin", Duration::hours(1));
        assert!(matches!(other_secret.verify(&token), Err(AppError::Unauthorized(_))));
        let other_issuer = TokenIssuer::new(b"test-secret", "someone-else", Duration::hours(1));
        assert!(other_issuer.verify(&token).is_err());
    }

    #[test]
    fn rejects_expired_and_garbage() {
        let tokens = issuer();
        let expired = tokens
            .issue_with_lifetime("42", "ana@example.com", Duration::minutes(-10))
            .unwrap();
        assert!(tokens.verify(&expired).is_err());
        assert!(tokens.verify("not.a.jwt").is_err());
    }
}
