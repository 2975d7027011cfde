use crate::domain::model::{Identity, Role, User, UserId};
use crate::domain::port::{AccessToken, AuthError, IdentityProvider};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

/// トークンに格納するクレーム
#[derive(Debug, Clone, Serialize, Deserialize)]
struct Claims {
    /// ユーザーID
    sub: String,
    /// ロール名（"user" / "admin"）
    role: String,
    exp: i64,
    iat: i64,
}

/// HS256署名のJWTを発行・検証するアイデンティティプロバイダー
#[derive(Clone)]
pub struct JwtIdentityProvider {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    ttl: Duration,
}

impl JwtIdentityProvider {
    /// # Arguments
    /// * `secret` - 署名鍵
    /// * `ttl_hours` - トークンの有効期間（時間）
    pub fn new(secret: &str, ttl_hours: i64) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            ttl: Duration::hours(ttl_hours),
        }
    }

    fn validation() -> Validation {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_required_spec_claims(&["sub", "exp"]);
        validation.leeway = 0;
        validation
    }
}

impl IdentityProvider for JwtIdentityProvider {
    fn issue_token(&self, user: &User) -> Result<AccessToken, AuthError> {
        let now = Utc::now();
        let claims = Claims {
            sub: user.id().to_string(),
            role: user.role().to_string(),
            exp: (now + self.ttl).timestamp(),
            iat: now.timestamp(),
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| AuthError::TokenIssueFailed(e.to_string()))?;

        Ok(AccessToken {
            token,
            expires_in: self.ttl.num_seconds(),
        })
    }

    fn authenticate(&self, token: &str) -> Result<Identity, AuthError> {
        let token_data = decode::<Claims>(token, &self.decoding_key, &Self::validation())
            .map_err(|e| {
                tracing::debug!(error = %e, "token rejected");
                AuthError::InvalidToken
            })?;

        let claims = token_data.claims;
        let user_id = UserId::from_string(&claims.sub).map_err(|_| AuthError::InvalidToken)?;
        let role = Role::from_string(&claims.role).map_err(|_| AuthError::InvalidToken)?;

        Ok(Identity::new(user_id, role))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(role: Role) -> User {
        User::register(
            UserId::new(),
            "Sinta".to_string(),
            "sinta@example.com".to_string(),
            "hash".to_string(),
            role,
        )
        .unwrap()
    }

    #[test]
    fn test_issued_token_authenticates_to_same_identity() {
        let provider = JwtIdentityProvider::new("test-secret", 72);
        let admin = user(Role::Admin);

        let token = provider.issue_token(&admin).unwrap();
        assert_eq!(token.expires_in, 72 * 3600);

        let identity = provider.authenticate(&token.token).unwrap();
        assert_eq!(identity.user_id(), admin.id());
        assert_eq!(identity.role(), Role::Admin);
    }

    #[test]
    fn test_token_signed_with_other_secret_is_rejected() {
        let issuer = JwtIdentityProvider::new("secret-a", 1);
        let verifier = JwtIdentityProvider::new("secret-b", 1);
        let token = issuer.issue_token(&user(Role::User)).unwrap();

        assert_eq!(
            verifier.authenticate(&token.token),
            Err(AuthError::InvalidToken)
        );
    }

    #[test]
    fn test_expired_token_is_rejected() {
        let provider = JwtIdentityProvider::new("test-secret", -1);
        let token = provider.issue_token(&user(Role::User)).unwrap();

        assert_eq!(
            provider.authenticate(&token.token),
            Err(AuthError::InvalidToken)
        );
    }

    #[test]
    fn test_garbage_token_is_rejected() {
        let provider = JwtIdentityProvider::new("test-secret", 1);
        assert_eq!(
            provider.authenticate("not-a-token"),
            Err(AuthError::InvalidToken)
        );
    }
}
