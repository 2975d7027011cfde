use crate::adapter::database_error::DatabaseError;
use sqlx::{MySql, Pool};

/// 適用順に並べたマイグレーション
const MIGRATIONS: [(&str, &str); 5] = [
    (
        "001_create_users_table",
        include_str!("../../migrations/001_create_users_table.sql"),
    ),
    (
        "002_create_categories_table",
        include_str!("../../migrations/002_create_categories_table.sql"),
    ),
    (
        "003_create_books_table",
        include_str!("../../migrations/003_create_books_table.sql"),
    ),
    (
        "004_create_orders_table",
        include_str!("../../migrations/004_create_orders_table.sql"),
    ),
    (
        "005_create_order_items_table",
        include_str!("../../migrations/005_create_order_items_table.sql"),
    ),
];

/// データベースマイグレーションを管理する構造体
pub struct DatabaseMigration {
    pool: Pool<MySql>,
}

impl DatabaseMigration {
    /// 新しいDatabaseMigrationインスタンスを作成
    pub fn new(pool: Pool<MySql>) -> Self {
        Self { pool }
    }

    /// マイグレーションを実行
    /// べき等性を保証（CREATE TABLE IF NOT EXISTS）
    pub async fn run(&self) -> Result<(), DatabaseError> {
        for (name, migration_sql) in MIGRATIONS {
            tracing::info!(migration = name, "running migration");
            sqlx::query(migration_sql)
                .execute(&self.pool)
                .await
                .map_err(|e| DatabaseError::MigrationError(format!("{} failed: {}", name, e)))?;
        }

        tracing::info!(count = MIGRATIONS.len(), "all migrations completed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migrations_are_idempotent_statements() {
        for (name, sql) in MIGRATIONS {
            assert!(
                sql.contains("CREATE TABLE IF NOT EXISTS"),
                "{} must be idempotent",
                name
            );
        }
    }

    #[test]
    fn test_migrations_are_ordered() {
        let names: Vec<&str> = MIGRATIONS.iter().map(|(name, _)| *name).collect();
        let mut sorted = names.clone();
        sorted.sort();
        assert_eq!(names, sorted);
    }
}
