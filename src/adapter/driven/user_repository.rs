use crate::adapter::database_error::repository_error;
use crate::adapter::driven::mysql_rows::user_row;
use crate::domain::model::{User, UserId};
use crate::domain::port::{RepositoryError, UserRepository};
use async_trait::async_trait;
use sqlx::{MySql, Pool};

const USER_COLUMNS: &str = "id, name, email, password_hash, role, is_active, created_at";

/// MySQLユーザーリポジトリ
#[derive(Clone)]
pub struct MySqlUserRepository {
    pool: Pool<MySql>,
}

impl MySqlUserRepository {
    pub fn new(pool: Pool<MySql>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserRepository for MySqlUserRepository {
    async fn insert(&self, user: &User) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            INSERT INTO users (id, name, email, password_hash, role, is_active, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(user.id().to_string())
        .bind(user.name())
        .bind(user.email())
        .bind(user.password_hash())
        .bind(user.role().to_string())
        .bind(user.is_active())
        .bind(user.created_at())
        .execute(&self.pool)
        .await
        .map_err(repository_error)?;

        Ok(())
    }

    async fn find_by_id(&self, user_id: UserId) -> Result<Option<User>, RepositoryError> {
        let sql = format!("SELECT {} FROM users WHERE id = ?", USER_COLUMNS);
        let row = sqlx::query(&sql)
            .bind(user_id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(repository_error)?;

        row.as_ref().map(|row| user_row(row, "")).transpose()
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, RepositoryError> {
        let sql = format!("SELECT {} FROM users WHERE email = ?", USER_COLUMNS);
        let row = sqlx::query(&sql)
            .bind(email)
            .fetch_optional(&self.pool)
            .await
            .map_err(repository_error)?;

        row.as_ref().map(|row| user_row(row, "")).transpose()
    }
}
