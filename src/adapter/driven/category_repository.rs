use crate::adapter::database_error::repository_error;
use crate::adapter::driven::mysql_rows::category_row;
use crate::domain::model::{Category, CategoryId};
use crate::domain::port::{CategoryRepository, RepositoryError};
use async_trait::async_trait;
use sqlx::{MySql, Pool};

/// MySQLカテゴリリポジトリ
#[derive(Clone)]
pub struct MySqlCategoryRepository {
    pool: Pool<MySql>,
}

impl MySqlCategoryRepository {
    pub fn new(pool: Pool<MySql>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CategoryRepository for MySqlCategoryRepository {
    async fn insert(&self, category: &Category) -> Result<(), RepositoryError> {
        sqlx::query("INSERT INTO categories (id, name) VALUES (?, ?)")
            .bind(category.id().to_string())
            .bind(category.name())
            .execute(&self.pool)
            .await
            .map_err(repository_error)?;

        Ok(())
    }

    async fn update(&self, category: &Category) -> Result<(), RepositoryError> {
        sqlx::query("UPDATE categories SET name = ? WHERE id = ?")
            .bind(category.name())
            .bind(category.id().to_string())
            .execute(&self.pool)
            .await
            .map_err(repository_error)?;

        Ok(())
    }

    async fn find_by_id(
        &self,
        category_id: CategoryId,
    ) -> Result<Option<Category>, RepositoryError> {
        let row = sqlx::query("SELECT id, name FROM categories WHERE id = ?")
            .bind(category_id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(repository_error)?;

        row.as_ref()
            .map(|row| category_row(row, "id", "name"))
            .transpose()
    }

    async fn find_all(&self) -> Result<Vec<Category>, RepositoryError> {
        let rows = sqlx::query("SELECT id, name FROM categories ORDER BY name ASC")
            .fetch_all(&self.pool)
            .await
            .map_err(repository_error)?;

        rows.iter()
            .map(|row| category_row(row, "id", "name"))
            .collect()
    }

    async fn delete(&self, category_id: CategoryId) -> Result<bool, RepositoryError> {
        // 書籍から参照されている場合は外部キー制約違反（Conflict）になる
        let result = sqlx::query("DELETE FROM categories WHERE id = ?")
            .bind(category_id.to_string())
            .execute(&self.pool)
            .await
            .map_err(repository_error)?;

        Ok(result.rows_affected() > 0)
    }
}
