//! JWT session validator.
//!
//! The auth service signs access tokens with a shared HS256 secret; the
//! subject is the user id and the audience is `authenticated`.

use async_trait::async_trait;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, Algorithm, DecodingKey, TokenData, Validation};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use crate::domain::foundation::{AuthError, AuthenticatedUser, UserId};
use crate::ports::SessionValidator;

/// Claims read from an access token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionClaims {
    pub sub: String,
    #[serde(default)]
    pub email: Option<String>,
    pub aud: String,
    pub exp: i64,
}

/// Validates HS256 access tokens.
pub struct JwtSessionValidator {
    decoding_key: DecodingKey,
    audience: String,
}

impl JwtSessionValidator {
    pub fn new(secret: &SecretString, audience: impl Into<String>) -> Self {
        Self {
            decoding_key: DecodingKey::from_secret(secret.expose_secret().as_bytes()),
            audience: audience.into(),
        }
    }

    fn decode_claims(&self, token: &str) -> Result<SessionClaims, AuthError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_audience(&[&self.audience]);
        validation.validate_exp = true;

        let token_data: TokenData<SessionClaims> =
            decode(token, &self.decoding_key, &validation).map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => AuthError::TokenExpired,
                _ => {
                    tracing::debug!(error = %e, "Rejected access token");
                    AuthError::InvalidToken
                }
            })?;

        Ok(token_data.claims)
    }
}

#[async_trait]
impl SessionValidator for JwtSessionValidator {
    async fn validate(&self, token: &str) -> Result<AuthenticatedUser, AuthError> {
        let claims = self.decode_claims(token)?;
        let id = UserId::new(claims.sub).map_err(|_| AuthError::InvalidToken)?;
        Ok(AuthenticatedUser::new(id, claims.email.unwrap_or_default()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};

    const SECRET: &str = "test-jwt-secret-with-enough-entropy";

    fn validator() -> JwtSessionValidator {
        JwtSessionValidator::new(&SecretString::new(SECRET.into()), "authenticated")
    }

    fn token(sub: &str, aud: &str, exp_offset: i64, secret: &str) -> String {
        let claims = SessionClaims {
            sub: sub.into(),
            email: Some("a@b.fr".into()),
            aud: aud.into(),
            exp: chrono::Utc::now().timestamp() + exp_offset,
        };
        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn accepts_valid_token() {
        let user = validator()
            .validate(&token("user-1", "authenticated", 3600, SECRET))
            .await
            .unwrap();

        assert_eq!(user.id.as_str(), "user-1");
        assert_eq!(user.email, "a@b.fr");
    }

    #[tokio::test]
    async fn rejects_wrong_secret() {
        let result = validator()
            .validate(&token("user-1", "authenticated", 3600, "other-secret"))
            .await;
        assert!(matches!(result, Err(AuthError::InvalidToken)));
    }

    #[tokio::test]
    async fn rejects_wrong_audience() {
        let result = validator()
            .validate(&token("user-1", "anon", 3600, SECRET))
            .await;
        assert!(matches!(result, Err(AuthError::InvalidToken)));
    }

    #[tokio::test]
    async fn expired_token_is_reported_as_expired() {
        let result = validator()
            .validate(&token("user-1", "authenticated", -3600, SECRET))
            .await;
        assert!(matches!(result, Err(AuthError::TokenExpired)));
    }

    #[tokio::test]
    async fn rejects_garbage() {
        let result = validator().validate("not.a.jwt").await;
        assert!(matches!(result, Err(AuthError::InvalidToken)));
    }
}
