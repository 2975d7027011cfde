// 認証・認可のエクストラクター

use crate::adapter::driver::response_dto::ApiError;
use crate::adapter::driver::rest_api::{map_application_error, AppState};
use crate::application::ApplicationError;
use crate::domain::model::{Identity, Role};
use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum::http::StatusCode;
use axum::Json;

/// `Authorization: Bearer <token>` で認証された利用者
pub struct AuthenticatedUser(pub Identity);

/// 管理者ロールを持つ利用者
pub struct AdminUser(pub Identity);

/// ヘッダー値からトークン部分を取り出す
fn bearer_token(header: &str) -> Option<&str> {
    header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

#[axum::async_trait]
impl FromRequestParts<AppState> for AuthenticatedUser {
    type Rejection = (StatusCode, Json<ApiError>);

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| {
                map_application_error(ApplicationError::Unauthorized(
                    "missing authorization header".to_string(),
                ))
            })?;

        let token = bearer_token(header).ok_or_else(|| {
            map_application_error(ApplicationError::Unauthorized(
                "invalid authorization format".to_string(),
            ))
        })?;

        let identity = state
            .identity_provider
            .authenticate(token)
            .map_err(|e| map_application_error(e.into()))?;

        Ok(Self(identity))
    }
}

#[axum::async_trait]
impl FromRequestParts<AppState> for AdminUser {
    type Rejection = (StatusCode, Json<ApiError>);

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let AuthenticatedUser(identity) =
            AuthenticatedUser::from_request_parts(parts, state).await?;

        if !identity.has_role(Role::Admin) {
            tracing::warn!(user_id = %identity.user_id(), "admin route rejected");
            return Err(map_application_error(ApplicationError::Forbidden(
                "admin role required".to_string(),
            )));
        }
        Ok(Self(identity))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bearer_token_parsing() {
        assert_eq!(bearer_token("Bearer abc.def"), Some("abc.def"));
        assert_eq!(bearer_token("Bearer   "), None);
        assert_eq!(bearer_token("Basic abc"), None);
        assert_eq!(bearer_token("abc.def"), None);
    }
}
