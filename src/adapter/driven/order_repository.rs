use crate::adapter::database_error::{repository_error, DatabaseError};
use crate::adapter::driven::mysql_rows::{
    book_details_row, book_row, column, id_column, money_column, user_row, BOOK_DETAILS_COLUMNS,
};
use crate::domain::model::{
    Book, BookId, Money, Order, OrderDetails, OrderId, OrderItem, OrderItemId, OrderLineDetails,
    OrderStatus, UserId,
};
use crate::domain::port::{
    LedgerStore, LedgerTransaction, OrderRepository, OrderScope, RepositoryError,
};
use async_trait::async_trait;
use sqlx::mysql::MySqlRow;
use sqlx::{MySql, Pool, QueryBuilder, Transaction};
use std::collections::HashMap;

/// 注文と注文者を取得するSELECT句
const ORDER_DETAILS_COLUMNS: &str = r#"
    o.id AS order_id, o.total_price, o.status, o.created_at,
    u.id AS user_id, u.name AS user_name, u.email AS user_email,
    u.password_hash AS user_password_hash, u.role AS user_role,
    u.is_active AS user_is_active, u.created_at AS user_created_at
"#;

/// 注文詳細の絞り込み
enum OrderFilter {
    Id(OrderId),
    Scope(OrderScope),
}

/// MySQL注文リポジトリ
/// 注文の読み取りと、注文作成トランザクション（台帳ストア）を提供する
#[derive(Clone)]
pub struct MySqlOrderRepository {
    pool: Pool<MySql>,
}

impl MySqlOrderRepository {
    /// 新しいMySQL注文リポジトリを作成
    ///
    /// # Arguments
    /// * `pool` - MySQLコネクションプール
    pub fn new(pool: Pool<MySql>) -> Self {
        Self { pool }
    }

    /// 注文者・明細・書籍・カテゴリを展開した注文を取得する
    /// 注文は作成日時の降順、明細はリクエスト順に並べる
    async fn fetch_details(
        &self,
        filter: OrderFilter,
    ) -> Result<Vec<OrderDetails>, RepositoryError> {
        let mut builder = QueryBuilder::<MySql>::new(format!(
            "SELECT {} FROM orders o JOIN users u ON u.id = o.user_id",
            ORDER_DETAILS_COLUMNS
        ));
        match filter {
            OrderFilter::Id(order_id) => {
                builder.push(" WHERE o.id = ").push_bind(order_id.to_string());
            }
            OrderFilter::Scope(OrderScope::OwnedBy(user_id)) => {
                builder
                    .push(" WHERE o.user_id = ")
                    .push_bind(user_id.to_string());
            }
            OrderFilter::Scope(OrderScope::All) => {}
        }
        builder.push(" ORDER BY o.created_at DESC, o.id DESC");

        let order_rows = builder
            .build()
            .fetch_all(&self.pool)
            .await
            .map_err(repository_error)?;
        if order_rows.is_empty() {
            return Ok(Vec::new());
        }

        let order_ids = order_rows
            .iter()
            .map(|row| id_column(row, "order_id", OrderId::from_string))
            .collect::<Result<Vec<_>, _>>()?;
        let mut lines_by_order = self.fetch_lines(&order_ids).await?;

        order_rows
            .iter()
            .zip(order_ids)
            .map(|(row, order_id)| -> Result<OrderDetails, RepositoryError> {
                let lines = lines_by_order.remove(&order_id).unwrap_or_default();
                let items = lines.iter().map(|line| line.item.clone()).collect();
                let user = user_row(row, "user_")?;
                let order = order_row(row, user.id(), items)?;
                Ok(OrderDetails { order, user, lines })
            })
            .collect()
    }

    /// 注文ごとに、書籍とカテゴリを展開した明細を取得する
    async fn fetch_lines(
        &self,
        order_ids: &[OrderId],
    ) -> Result<HashMap<OrderId, Vec<OrderLineDetails>>, RepositoryError> {
        let mut builder = QueryBuilder::<MySql>::new(format!(
            r#"
            SELECT i.id AS item_id, i.order_id, i.line_number, i.quantity, i.unit_price, {}
            FROM order_items i
            JOIN books b ON b.id = i.book_id
            JOIN categories c ON c.id = b.category_id
            WHERE i.order_id IN (
            "#,
            BOOK_DETAILS_COLUMNS
        ));
        let mut separated = builder.separated(", ");
        for order_id in order_ids {
            separated.push_bind(order_id.to_string());
        }
        separated.push_unseparated(") ORDER BY i.order_id, i.line_number");

        let rows = builder
            .build()
            .fetch_all(&self.pool)
            .await
            .map_err(repository_error)?;

        let mut lines_by_order: HashMap<OrderId, Vec<OrderLineDetails>> = HashMap::new();
        for row in &rows {
            let line = OrderLineDetails {
                item: order_item_row(row)?,
                book: book_details_row(row)?,
            };
            lines_by_order
                .entry(line.item.order_id())
                .or_default()
                .push(line);
        }
        Ok(lines_by_order)
    }
}

/// 注文明細行を復元する
fn order_item_row(row: &MySqlRow) -> Result<OrderItem, RepositoryError> {
    OrderItem::reconstruct(
        id_column(row, "item_id", OrderItemId::from_string)?,
        id_column(row, "order_id", OrderId::from_string)?,
        id_column(row, "book_id", BookId::from_string)?,
        column(row, "line_number")?,
        column(row, "quantity")?,
        money_column(row, "unit_price")?,
    )
    .map_err(|e| RepositoryError::FetchFailed(format!("注文明細の復元に失敗しました: {}", e)))
}

/// 注文行を復元する
fn order_row(
    row: &MySqlRow,
    user_id: UserId,
    items: Vec<OrderItem>,
) -> Result<Order, RepositoryError> {
    let status: String = column(row, "status")?;
    let status = OrderStatus::from_string(&status).map_err(|e| {
        RepositoryError::FetchFailed(format!("注文ステータスの解析に失敗しました: {}", e))
    })?;

    Ok(Order::reconstruct(
        id_column(row, "order_id", OrderId::from_string)?,
        user_id,
        money_column(row, "total_price")?,
        status,
        column(row, "created_at")?,
        items,
    ))
}

#[async_trait]
impl OrderRepository for MySqlOrderRepository {
    async fn find_by_id(&self, order_id: OrderId) -> Result<Option<Order>, RepositoryError> {
        let row = sqlx::query(
            r#"
            SELECT o.id AS order_id, o.user_id, o.total_price, o.status, o.created_at
            FROM orders o
            WHERE o.id = ?
            "#,
        )
        .bind(order_id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(repository_error)?;

        let Some(row) = row else {
            return Ok(None);
        };

        let item_rows = sqlx::query(
            r#"
            SELECT id AS item_id, order_id, book_id, line_number, quantity, unit_price
            FROM order_items
            WHERE order_id = ?
            ORDER BY line_number
            "#,
        )
        .bind(order_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(repository_error)?;

        let items = item_rows
            .iter()
            .map(order_item_row)
            .collect::<Result<Vec<_>, _>>()?;
        let user_id = id_column(&row, "user_id", UserId::from_string)?;

        order_row(&row, user_id, items).map(Some)
    }

    async fn find_details(
        &self,
        order_id: OrderId,
    ) -> Result<Option<OrderDetails>, RepositoryError> {
        let mut details = self.fetch_details(OrderFilter::Id(order_id)).await?;
        Ok(details.pop())
    }

    async fn list_details(&self, scope: OrderScope) -> Result<Vec<OrderDetails>, RepositoryError> {
        self.fetch_details(OrderFilter::Scope(scope)).await
    }

    async fn transition_status(
        &self,
        order_id: OrderId,
        from: OrderStatus,
        to: OrderStatus,
    ) -> Result<bool, RepositoryError> {
        // 条件付き単一行更新。別リクエストが先に遷移させた場合は0行になる
        let result = sqlx::query("UPDATE orders SET status = ? WHERE id = ? AND status = ?")
            .bind(to.to_string())
            .bind(order_id.to_string())
            .bind(from.to_string())
            .execute(&self.pool)
            .await
            .map_err(repository_error)?;

        Ok(result.rows_affected() == 1)
    }
}

#[async_trait]
impl LedgerStore for MySqlOrderRepository {
    async fn begin(&self) -> Result<Box<dyn LedgerTransaction>, RepositoryError> {
        let tx = self
            .pool
            .begin()
            .await
            .map_err(|e| {
                DatabaseError::ConnectionError(format!("トランザクション開始に失敗しました: {}", e))
            })
            .map_err(RepositoryError::from)?;

        Ok(Box::new(MySqlLedgerTransaction { tx }))
    }
}

/// MySQL台帳トランザクション
/// commit されずに破棄された場合、sqlxがロールバックする
pub struct MySqlLedgerTransaction {
    tx: Transaction<'static, MySql>,
}

#[async_trait]
impl LedgerTransaction for MySqlLedgerTransaction {
    async fn insert_order(&mut self, order: &Order) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            INSERT INTO orders (id, user_id, total_price, status, created_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(order.id().to_string())
        .bind(order.user_id().to_string())
        .bind(order.total_price().amount())
        .bind(order.status().to_string())
        .bind(order.created_at())
        .execute(&mut *self.tx)
        .await
        .map_err(repository_error)?;

        Ok(())
    }

    async fn lock_book(&mut self, book_id: BookId) -> Result<Option<Book>, RepositoryError> {
        let row = sqlx::query(
            r#"
            SELECT b.id AS book_id, b.title, b.author, b.price, b.stock, b.year, b.category_id
            FROM books b
            WHERE b.id = ?
            FOR UPDATE
            "#,
        )
        .bind(book_id.to_string())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(repository_error)?;

        row.as_ref().map(book_row).transpose()
    }

    async fn update_book_stock(
        &mut self,
        book_id: BookId,
        stock: u32,
    ) -> Result<(), RepositoryError> {
        sqlx::query("UPDATE books SET stock = ? WHERE id = ?")
            .bind(stock)
            .bind(book_id.to_string())
            .execute(&mut *self.tx)
            .await
            .map_err(repository_error)?;

        Ok(())
    }

    async fn insert_order_item(&mut self, item: &OrderItem) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            INSERT INTO order_items (id, order_id, book_id, line_number, quantity, unit_price)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(item.id().to_string())
        .bind(item.order_id().to_string())
        .bind(item.book_id().to_string())
        .bind(item.line_number())
        .bind(item.quantity())
        .bind(item.unit_price().amount())
        .execute(&mut *self.tx)
        .await
        .map_err(repository_error)?;

        Ok(())
    }

    async fn update_order_total(
        &mut self,
        order_id: OrderId,
        total_price: Money,
    ) -> Result<(), RepositoryError> {
        sqlx::query("UPDATE orders SET total_price = ? WHERE id = ?")
            .bind(total_price.amount())
            .bind(order_id.to_string())
            .execute(&mut *self.tx)
            .await
            .map_err(repository_error)?;

        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), RepositoryError> {
        let this = *self;
        this.tx.commit().await.map_err(repository_error)
    }

    async fn rollback(self: Box<Self>) -> Result<(), RepositoryError> {
        let this = *self;
        this.tx.rollback().await.map_err(repository_error)
    }
}
