use crate::application::ApplicationError;
use crate::domain::model::{Role, User, UserId};
use crate::domain::port::{
    AccessToken, IdentityProvider, PasswordHasher, RepositoryError, UserRepository,
};
use std::sync::Arc;

/// パスワードの最小文字数
pub const MIN_PASSWORD_LENGTH: usize = 6;

/// ログイン結果
#[derive(Debug, Clone)]
pub struct LoginResult {
    pub token: AccessToken,
    pub user: User,
}

/// アカウントアプリケーションサービス
/// 利用者登録とログイン（トークン発行）を担当する
pub struct AccountApplicationService {
    user_repository: Arc<dyn UserRepository>,
    password_hasher: Arc<dyn PasswordHasher>,
    identity_provider: Arc<dyn IdentityProvider>,
}

impl AccountApplicationService {
    /// 新しいアカウントサービスを作成
    ///
    /// # Arguments
    /// * `user_repository` - ユーザーリポジトリ
    /// * `password_hasher` - パスワードハッシュ
    /// * `identity_provider` - トークンの発行元
    pub fn new(
        user_repository: Arc<dyn UserRepository>,
        password_hasher: Arc<dyn PasswordHasher>,
        identity_provider: Arc<dyn IdentityProvider>,
    ) -> Self {
        Self {
            user_repository,
            password_hasher,
            identity_provider,
        }
    }

    /// 一般利用者として登録する
    /// ロールは常に `user`。管理者はデータベースで直接昇格させる
    ///
    /// # Returns
    /// * `Ok(User)` - 登録されたユーザー
    /// * `Err(ApplicationError::Validation)` - パスワードが短い
    /// * `Err(ApplicationError::RepositoryError(Conflict))` - メールアドレスが登録済み
    #[tracing::instrument(skip(self, password))]
    pub async fn register(
        &self,
        name: String,
        email: String,
        password: String,
    ) -> Result<User, ApplicationError> {
        if password.chars().count() < MIN_PASSWORD_LENGTH {
            return Err(ApplicationError::Validation(format!(
                "password must be at least {} characters",
                MIN_PASSWORD_LENGTH
            )));
        }

        // 登録済みのメールアドレスではハッシュを計算しない
        let email = email.trim().to_lowercase();
        if self.user_repository.find_by_email(&email).await?.is_some() {
            return Err(RepositoryError::Conflict("email already registered".to_string()).into());
        }

        let password_hash = self.hash_password(password).await?;
        let user = User::register(UserId::new(), name, email, password_hash, Role::User)?;

        self.user_repository.insert(&user).await?;
        tracing::info!(user_id = %user.id(), "user registered");
        Ok(user)
    }

    /// メールアドレスとパスワードでログインし、アクセストークンを発行する
    /// 失敗理由は区別せずに `Unauthorized` を返す
    #[tracing::instrument(skip(self, password))]
    pub async fn login(&self, email: &str, password: &str) -> Result<LoginResult, ApplicationError> {
        let email = email.trim().to_lowercase();
        let user = self
            .user_repository
            .find_by_email(&email)
            .await?
            .filter(|user| user.is_active());
        let verified = match &user {
            Some(user) => self.verify_password(password, user.password_hash()).await?,
            None => false,
        };

        let Some(user) = user.filter(|_| verified) else {
            tracing::warn!("login rejected");
            return Err(ApplicationError::Unauthorized(
                "invalid email or password".to_string(),
            ));
        };

        let token = self.identity_provider.issue_token(&user)?;
        tracing::info!(user_id = %user.id(), "user logged in");
        Ok(LoginResult { token, user })
    }

    /// パスワードハッシュの計算はCPU負荷が高いため、ブロッキングスレッドで行う
    async fn hash_password(&self, password: String) -> Result<String, ApplicationError> {
        let hasher = self.password_hasher.clone();
        let password_hash = tokio::task::spawn_blocking(move || hasher.hash(&password))
            .await
            .map_err(|e| ApplicationError::AuthBackend(format!("hashing task failed: {}", e)))?;
        Ok(password_hash?)
    }

    async fn verify_password(
        &self,
        password: &str,
        password_hash: &str,
    ) -> Result<bool, ApplicationError> {
        let hasher = self.password_hasher.clone();
        let password = password.to_string();
        let password_hash = password_hash.to_string();
        tokio::task::spawn_blocking(move || hasher.verify(&password, &password_hash))
            .await
            .map_err(|e| ApplicationError::AuthBackend(format!("verification task failed: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::Identity;
    use crate::domain::port::AuthError;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct MockUserRepository {
        users: Mutex<HashMap<UserId, User>>,
    }

    #[async_trait]
    impl UserRepository for MockUserRepository {
        async fn insert(&self, user: &User) -> Result<(), RepositoryError> {
            self.users.lock().unwrap().insert(user.id(), user.clone());
            Ok(())
        }

        async fn find_by_id(&self, user_id: UserId) -> Result<Option<User>, RepositoryError> {
            Ok(self.users.lock().unwrap().get(&user_id).cloned())
        }

        async fn find_by_email(&self, email: &str) -> Result<Option<User>, RepositoryError> {
            let users = self.users.lock().unwrap();
            Ok(users.values().find(|u| u.email() == email).cloned())
        }
    }

    // 平文に接頭辞を付けるだけのハッシュ（計算回数を数える）
    #[derive(Default)]
    struct PlainHasher {
        hashed: AtomicUsize,
    }

    impl PasswordHasher for PlainHasher {
        fn hash(&self, password: &str) -> Result<String, AuthError> {
            self.hashed.fetch_add(1, Ordering::SeqCst);
            Ok(format!("plain:{}", password))
        }

        fn verify(&self, password: &str, password_hash: &str) -> bool {
            password_hash == format!("plain:{}", password)
        }
    }

    struct StaticIdentityProvider;

    impl IdentityProvider for StaticIdentityProvider {
        fn issue_token(&self, user: &User) -> Result<AccessToken, AuthError> {
            Ok(AccessToken {
                token: format!("token-{}", user.id()),
                expires_in: 60,
            })
        }

        fn authenticate(&self, _token: &str) -> Result<Identity, AuthError> {
            Err(AuthError::InvalidToken)
        }
    }

    fn service_with(hasher: Arc<PlainHasher>) -> AccountApplicationService {
        AccountApplicationService::new(
            Arc::new(MockUserRepository {
                users: Mutex::new(HashMap::new()),
            }),
            hasher,
            Arc::new(StaticIdentityProvider),
        )
    }

    fn service() -> AccountApplicationService {
        service_with(Arc::new(PlainHasher::default()))
    }

    #[tokio::test]
    async fn test_register_assigns_user_role_and_hashes_password() {
        let service = service();

        let user = service
            .register(
                "Dewi".to_string(),
                "Dewi@Example.com".to_string(),
                "secret1".to_string(),
            )
            .await
            .unwrap();

        assert_eq!(user.role(), Role::User);
        assert_eq!(user.email(), "dewi@example.com");
        assert_ne!(user.password_hash(), "secret1");
    }

    #[tokio::test]
    async fn test_register_rejects_short_password() {
        let result = service()
            .register("Dewi".to_string(), "dewi@example.com".to_string(), "12345".to_string())
            .await;
        assert!(matches!(result, Err(ApplicationError::Validation(_))));
    }

    #[tokio::test]
    async fn test_register_duplicate_email_conflicts() {
        let service = service();
        service
            .register("Dewi".to_string(), "dewi@example.com".to_string(), "secret1".to_string())
            .await
            .unwrap();

        let result = service
            .register("Dewi 2".to_string(), "DEWI@example.com".to_string(), "secret2".to_string())
            .await;
        assert!(matches!(
            result,
            Err(ApplicationError::RepositoryError(RepositoryError::Conflict(_)))
        ));
    }

    #[tokio::test]
    async fn test_duplicate_registration_skips_hashing() {
        let hasher = Arc::new(PlainHasher::default());
        let service = service_with(hasher.clone());
        service
            .register("Dewi".to_string(), "dewi@example.com".to_string(), "secret1".to_string())
            .await
            .unwrap();

        let result = service
            .register("Dewi".to_string(), " dewi@example.com ".to_string(), "secret1".to_string())
            .await;

        assert!(result.is_err());
        assert_eq!(hasher.hashed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_login_issues_token() {
        let service = service();
        let user = service
            .register("Dewi".to_string(), "dewi@example.com".to_string(), "secret1".to_string())
            .await
            .unwrap();

        let result = service.login("dewi@example.com", "secret1").await.unwrap();
        assert_eq!(result.user.id(), user.id());
        assert_eq!(result.token.token, format!("token-{}", user.id()));
    }

    #[tokio::test]
    async fn test_login_with_wrong_password_is_unauthorized() {
        let service = service();
        service
            .register("Dewi".to_string(), "dewi@example.com".to_string(), "secret1".to_string())
            .await
            .unwrap();

        let wrong_password = service.login("dewi@example.com", "nope").await;
        assert!(matches!(wrong_password, Err(ApplicationError::Unauthorized(_))));

        let unknown_email = service.login("nobody@example.com", "secret1").await;
        assert!(matches!(unknown_email, Err(ApplicationError::Unauthorized(_))));
    }
}
