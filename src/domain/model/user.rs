use crate::domain::error::DomainError;
use crate::domain::model::{Role, UserId};
use chrono::{DateTime, Utc};

/// ユーザー
/// 注文ワークフローからは参照のみ
#[derive(Debug, Clone, PartialEq)]
pub struct User {
    id: UserId,
    name: String,
    email: String,
    password_hash: String,
    role: Role,
    is_active: bool,
    created_at: DateTime<Utc>,
}

impl User {
    /// 新規登録ユーザーを作成
    /// メールアドレスは小文字に正規化する
    pub fn register(
        id: UserId,
        name: String,
        email: String,
        password_hash: String,
        role: Role,
    ) -> Result<Self, DomainError> {
        let name = name.trim().to_string();
        if name.is_empty() {
            return Err(DomainError::InvalidValue("名前は空にできません".to_string()));
        }
        let email = email.trim().to_lowercase();
        if !Self::is_valid_email(&email) {
            return Err(DomainError::InvalidValue(format!(
                "無効なメールアドレス: {}",
                email
            )));
        }
        Ok(Self {
            id,
            name,
            email,
            password_hash,
            role,
            is_active: true,
            created_at: Utc::now(),
        })
    }

    /// データベースから取得したデータでユーザーを再構築
    pub fn reconstruct(
        id: UserId,
        name: String,
        email: String,
        password_hash: String,
        role: Role,
        is_active: bool,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            name,
            email,
            password_hash,
            role,
            is_active,
            created_at,
        }
    }

    fn is_valid_email(email: &str) -> bool {
        match email.split_once('@') {
            Some((local, domain)) => !local.is_empty() && domain.contains('.'),
            None => false,
        }
    }

    pub fn id(&self) -> UserId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn password_hash(&self) -> &str {
        &self.password_hash
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn is_active(&self) -> bool {
        self.is_active
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

/// 認証済みの利用者
/// トークン検証時に一度だけ構築される
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Identity {
    user_id: UserId,
    role: Role,
}

impl Identity {
    pub fn new(user_id: UserId, role: Role) -> Self {
        Self { user_id, role }
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// 要求されたロールと一致するか（階層なし）
    pub fn has_role(&self, required: Role) -> bool {
        self.role == required
    }

    /// 所有者本人または管理者であればアクセス可能
    pub fn can_access(&self, owner: UserId) -> bool {
        self.is_admin() || self.user_id == owner
    }
}
