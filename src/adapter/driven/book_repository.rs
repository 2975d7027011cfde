use crate::adapter::database_error::repository_error;
use crate::adapter::driven::mysql_rows::{book_details_row, book_row, column, BOOK_DETAILS_COLUMNS};
use crate::domain::model::{Book, BookDetails, BookId, BookPage, BookQuery, CategoryFilter};
use crate::domain::port::{BookRepository, RepositoryError};
use async_trait::async_trait;
use sqlx::{MySql, Pool, QueryBuilder};

/// MySQL書籍リポジトリ
/// MySQLデータベースを使用して書籍を永続化する
#[derive(Clone)]
pub struct MySqlBookRepository {
    pool: Pool<MySql>,
}

impl MySqlBookRepository {
    /// 新しいMySQL書籍リポジトリを作成
    ///
    /// # Arguments
    /// * `pool` - MySQLコネクションプール
    pub fn new(pool: Pool<MySql>) -> Self {
        Self { pool }
    }

    /// 検索条件をWHERE句として追加する
    fn push_filters(builder: &mut QueryBuilder<'_, MySql>, query: &BookQuery) {
        builder.push(" WHERE 1 = 1");

        if let Some(keyword) = &query.keyword {
            let pattern = like_pattern(keyword);
            builder
                .push(" AND (LOWER(b.title) LIKE ")
                .push_bind(pattern.clone())
                .push(" OR LOWER(b.author) LIKE ")
                .push_bind(pattern)
                .push(")");
        }

        match &query.category {
            Some(CategoryFilter::Id(category_id)) => {
                builder
                    .push(" AND b.category_id = ")
                    .push_bind(category_id.to_string());
            }
            Some(CategoryFilter::Name(name)) => {
                builder
                    .push(" AND LOWER(c.name) LIKE ")
                    .push_bind(like_pattern(name));
            }
            None => {}
        }
    }
}

/// 部分一致用のLIKEパターン（大文字小文字を区別しない）
fn like_pattern(raw: &str) -> String {
    let escaped = raw
        .to_lowercase()
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

#[async_trait]
impl BookRepository for MySqlBookRepository {
    async fn insert(&self, book: &Book) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            INSERT INTO books (id, title, author, price, stock, year, category_id)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(book.id().to_string())
        .bind(book.title())
        .bind(book.author())
        .bind(book.price().amount())
        .bind(book.stock())
        .bind(book.year())
        .bind(book.category_id().to_string())
        .execute(&self.pool)
        .await
        .map_err(repository_error)?;

        Ok(())
    }

    async fn update_details(&self, book: &Book) -> Result<(), RepositoryError> {
        // 在庫数は注文トランザクションのみが変更するため、ここでは更新しない
        sqlx::query(
            r#"
            UPDATE books
            SET title = ?, author = ?, price = ?, year = ?, category_id = ?
            WHERE id = ?
            "#,
        )
        .bind(book.title())
        .bind(book.author())
        .bind(book.price().amount())
        .bind(book.year())
        .bind(book.category_id().to_string())
        .bind(book.id().to_string())
        .execute(&self.pool)
        .await
        .map_err(repository_error)?;

        Ok(())
    }

    async fn find_by_id(&self, book_id: BookId) -> Result<Option<Book>, RepositoryError> {
        let row = sqlx::query(
            r#"
            SELECT b.id AS book_id, b.title, b.author, b.price, b.stock, b.year, b.category_id
            FROM books b
            WHERE b.id = ?
            "#,
        )
        .bind(book_id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(repository_error)?;

        row.as_ref().map(book_row).transpose()
    }

    async fn find_details(&self, book_id: BookId) -> Result<Option<BookDetails>, RepositoryError> {
        let sql = format!(
            "SELECT {} FROM books b JOIN categories c ON c.id = b.category_id WHERE b.id = ?",
            BOOK_DETAILS_COLUMNS
        );
        let row = sqlx::query(&sql)
            .bind(book_id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(repository_error)?;

        row.as_ref().map(book_details_row).transpose()
    }

    async fn search(&self, query: &BookQuery) -> Result<BookPage, RepositoryError> {
        // 件数
        let mut count_builder = QueryBuilder::<MySql>::new(
            "SELECT COUNT(*) AS total FROM books b JOIN categories c ON c.id = b.category_id",
        );
        Self::push_filters(&mut count_builder, query);
        let count_row = count_builder
            .build()
            .fetch_one(&self.pool)
            .await
            .map_err(repository_error)?;
        let total: i64 = column(&count_row, "total")?;

        // ページ本体（新しい順）
        let mut builder = QueryBuilder::<MySql>::new(format!(
            "SELECT {} FROM books b JOIN categories c ON c.id = b.category_id",
            BOOK_DETAILS_COLUMNS
        ));
        Self::push_filters(&mut builder, query);
        builder
            .push(" ORDER BY b.created_at DESC, b.id DESC LIMIT ")
            .push_bind(query.limit)
            .push(" OFFSET ")
            .push_bind(query.offset());
        let rows = builder
            .build()
            .fetch_all(&self.pool)
            .await
            .map_err(repository_error)?;

        let items = rows
            .iter()
            .map(book_details_row)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(BookPage {
            items,
            page: query.page,
            limit: query.limit,
            total: total.max(0) as u64,
        })
    }

    async fn delete(&self, book_id: BookId) -> Result<bool, RepositoryError> {
        // 注文明細から参照されている場合は外部キー制約違反（Conflict）になる
        let result = sqlx::query("DELETE FROM books WHERE id = ?")
            .bind(book_id.to_string())
            .execute(&self.pool)
            .await
            .map_err(repository_error)?;

        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("Bumi"), "%bumi%");
        assert_eq!(like_pattern("100%_"), "%100\\%\\_%");
    }

    #[test]
    fn test_push_filters_binds_keyword_and_category() {
        let query = BookQuery::new(
            None,
            None,
            Some("pram".to_string()),
            Some(CategoryFilter::Name("novel".to_string())),
        );
        let mut builder = QueryBuilder::<MySql>::new("SELECT 1 FROM books b");
        MySqlBookRepository::push_filters(&mut builder, &query);

        let sql = builder.sql();
        assert!(sql.contains("LOWER(b.title) LIKE ?"));
        assert!(sql.contains("LOWER(c.name) LIKE ?"));
    }
}
