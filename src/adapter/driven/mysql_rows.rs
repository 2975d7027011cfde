// MySQLの行からドメインモデルを復元する共通処理

use crate::adapter::database_error::repository_error;
use crate::domain::model::{
    Book, BookDetails, BookId, Category, CategoryId, Money, Role, User, UserId,
};
use crate::domain::port::RepositoryError;
use rust_decimal::Decimal;
use sqlx::mysql::MySqlRow;
use sqlx::{MySql, Row};

/// 書籍とカテゴリを取得するSELECT句
/// `book_row` / `book_details_row` はこの列名を前提とする
pub(super) const BOOK_DETAILS_COLUMNS: &str = r#"
    b.id AS book_id, b.title, b.author, b.price, b.stock, b.year, b.category_id,
    c.name AS category_name
"#;

/// 列の値を取得する（型が合わない場合はパニックせずにエラーを返す）
pub(super) fn column<'r, T>(row: &'r MySqlRow, name: &str) -> Result<T, RepositoryError>
where
    T: sqlx::Decode<'r, MySql> + sqlx::Type<MySql>,
{
    row.try_get(name).map_err(repository_error)
}

/// UUID文字列の列をIDとして取得する
pub(super) fn id_column<T>(
    row: &MySqlRow,
    name: &str,
    parse: impl Fn(&str) -> Result<T, uuid::Error>,
) -> Result<T, RepositoryError> {
    let raw: String = column(row, name)?;
    parse(&raw).map_err(|e| {
        RepositoryError::FetchFailed(format!("{}の解析に失敗しました: {}", name, e))
    })
}

pub(super) fn money_column(row: &MySqlRow, name: &str) -> Result<Money, RepositoryError> {
    let amount: Decimal = column(row, name)?;
    Money::new(amount).map_err(|e| {
        RepositoryError::FetchFailed(format!("{}の解析に失敗しました: {}", name, e))
    })
}

pub(super) fn category_row(
    row: &MySqlRow,
    id_name: &str,
    name_name: &str,
) -> Result<Category, RepositoryError> {
    let id = id_column(row, id_name, CategoryId::from_string)?;
    let name: String = column(row, name_name)?;
    Category::new(id, name).map_err(|e| {
        RepositoryError::FetchFailed(format!("カテゴリの復元に失敗しました: {}", e))
    })
}

pub(super) fn book_row(row: &MySqlRow) -> Result<Book, RepositoryError> {
    Ok(Book::reconstruct(
        id_column(row, "book_id", BookId::from_string)?,
        column(row, "title")?,
        column(row, "author")?,
        money_column(row, "price")?,
        column(row, "stock")?,
        column(row, "year")?,
        id_column(row, "category_id", CategoryId::from_string)?,
    ))
}

pub(super) fn book_details_row(row: &MySqlRow) -> Result<BookDetails, RepositoryError> {
    Ok(BookDetails {
        book: book_row(row)?,
        category: category_row(row, "category_id", "category_name")?,
    })
}

/// ユーザー行を復元する
/// `prefix` は列名の接頭辞（JOIN時の別名）
pub(super) fn user_row(row: &MySqlRow, prefix: &str) -> Result<User, RepositoryError> {
    let col = |name: &str| format!("{}{}", prefix, name);
    let role: String = column(row, &col("role"))?;
    let role = Role::from_string(&role).map_err(|e| {
        RepositoryError::FetchFailed(format!("ロールの解析に失敗しました: {}", e))
    })?;

    Ok(User::reconstruct(
        id_column(row, &col("id"), UserId::from_string)?,
        column(row, &col("name"))?,
        column(row, &col("email"))?,
        column(row, &col("password_hash"))?,
        role,
        column(row, &col("is_active"))?,
        column(row, &col("created_at"))?,
    ))
}
