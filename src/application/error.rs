use crate::domain::error::DomainError;
use crate::domain::port::{AuthError, RepositoryError};

/// アプリケーション層のエラー型
/// ドメインエラー、リポジトリエラー、認証・認可エラーをラップする
#[derive(Debug, thiserror::Error)]
pub enum ApplicationError {
    /// ドメインエラー（ビジネスルール違反）
    #[error("Domain error: {0}")]
    DomainError(#[from] DomainError),
    /// リポジトリエラー（永続化の失敗）
    #[error("Repository error: {0}")]
    RepositoryError(#[from] RepositoryError),
    /// リクエスト内容の不備
    #[error("Validation failed: {0}")]
    Validation(String),
    /// エンティティが見つからない
    #[error("Not found: {0}")]
    NotFound(String),
    /// 認証情報がない・不正
    #[error("Unauthorized: {0}")]
    Unauthorized(String),
    /// 所有権またはロールが不足している
    #[error("Forbidden: {0}")]
    Forbidden(String),
    /// トークン発行・ハッシュ生成など認証基盤の内部エラー
    #[error("Authentication backend error: {0}")]
    AuthBackend(String),
}

impl From<AuthError> for ApplicationError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InvalidToken => ApplicationError::Unauthorized(err.to_string()),
            AuthError::TokenIssueFailed(_) | AuthError::HashingFailed(_) => {
                ApplicationError::AuthBackend(err.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_token_becomes_unauthorized() {
        let err = ApplicationError::from(AuthError::InvalidToken);
        assert!(matches!(err, ApplicationError::Unauthorized(_)));
    }

    #[test]
    fn test_hashing_failure_is_backend_error() {
        let err = ApplicationError::from(AuthError::HashingFailed("boom".to_string()));
        assert!(matches!(err, ApplicationError::AuthBackend(_)));
    }
}
