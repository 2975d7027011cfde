mod account_service;
mod catalog_service;
mod order_query_service;

pub use account_service::{AccountApplicationService, LoginResult};
pub use catalog_service::{CatalogApplicationService, NewBook};
pub use order_query_service::OrderQueryService;

use crate::application::ApplicationError;
use crate::domain::error::DomainError;
use crate::domain::model::{CartLine, Identity, Order, OrderDetails, OrderId, OrderStatus, UserId};
use crate::domain::port::{LedgerStore, LedgerTransaction, OrderRepository, RepositoryError};
use std::sync::Arc;
use std::time::Duration;

/// 注文トランザクションの既定の制限時間
pub const DEFAULT_TRANSACTION_TIMEOUT: Duration = Duration::from_secs(10);

/// 注文アプリケーションサービス
/// 注文作成（在庫引当・価格計算）と支払いの状態遷移を担当する
pub struct OrderApplicationService {
    ledger_store: Arc<dyn LedgerStore>,
    order_repository: Arc<dyn OrderRepository>,
    transaction_timeout: Duration,
}

impl OrderApplicationService {
    /// 新しいアプリケーションサービスを作成
    ///
    /// # Arguments
    /// * `ledger_store` - 注文作成トランザクションを提供する台帳ストア
    /// * `order_repository` - 注文リポジトリ
    /// * `transaction_timeout` - 注文作成トランザクションの制限時間
    pub fn new(
        ledger_store: Arc<dyn LedgerStore>,
        order_repository: Arc<dyn OrderRepository>,
        transaction_timeout: Duration,
    ) -> Self {
        Self {
            ledger_store,
            order_repository,
            transaction_timeout,
        }
    }

    /// カートの内容で注文を作成する
    ///
    /// 1つのトランザクション内で、リクエスト順に各書籍を排他ロックして在庫を引き当て、
    /// 注文時点の単価で明細を作成する。どこかで失敗した場合は何も永続化されない。
    ///
    /// # Arguments
    /// * `identity` - 認証済みの注文者
    /// * `lines` - カートの内容（空不可）
    ///
    /// # Returns
    /// * `Ok(OrderDetails)` - 作成された注文（展開済み）
    /// * `Err(ApplicationError)` - 作成失敗
    #[tracing::instrument(skip(self, lines), fields(user_id = %identity.user_id(), lines = lines.len()))]
    pub async fn place_order(
        &self,
        identity: &Identity,
        lines: Vec<CartLine>,
    ) -> Result<OrderDetails, ApplicationError> {
        if lines.is_empty() {
            return Err(DomainError::EmptyOrder.into());
        }

        let order = tokio::time::timeout(
            self.transaction_timeout,
            self.run_order_transaction(identity.user_id(), &lines),
        )
        .await
        .map_err(|_| {
            tracing::warn!(
                timeout = ?self.transaction_timeout,
                "order transaction timed out and was rolled back"
            );
            RepositoryError::Timeout(self.transaction_timeout)
        })??;

        tracing::info!(
            order_id = %order.id(),
            total_price = %order.total_price(),
            items = order.items().len(),
            "order placed"
        );

        self.load_details(order.id()).await
    }

    /// 注文作成トランザクションを実行し、成功時のみコミットする
    async fn run_order_transaction(
        &self,
        user_id: UserId,
        lines: &[CartLine],
    ) -> Result<Order, ApplicationError> {
        let mut tx = self.ledger_store.begin().await?;

        match Self::reserve_and_price(tx.as_mut(), user_id, lines).await {
            Ok(order) => {
                tx.commit().await?;
                Ok(order)
            }
            Err(err) => {
                match &err {
                    ApplicationError::RepositoryError(repo_err) => {
                        tracing::error!(error = %repo_err, "store failure during order placement");
                    }
                    other => tracing::warn!(reason = %other, "order rejected"),
                }
                if let Err(rollback_err) = tx.rollback().await {
                    tracing::warn!(error = %rollback_err, "rollback failed");
                }
                Err(err)
            }
        }
    }

    /// 注文行を挿入し、各明細について在庫引当と価格計算を行う
    async fn reserve_and_price(
        tx: &mut dyn LedgerTransaction,
        user_id: UserId,
        lines: &[CartLine],
    ) -> Result<Order, ApplicationError> {
        let mut order = Order::new(OrderId::new(), user_id);
        tx.insert_order(&order).await?;

        for line in lines {
            let mut book = tx.lock_book(line.book_id()).await?.ok_or_else(|| {
                ApplicationError::NotFound(format!("book not found: {}", line.book_id()))
            })?;

            book.reserve_stock(line.quantity())?;
            tx.update_book_stock(book.id(), book.stock()).await?;

            let item = order.add_item(&book, line.quantity())?;
            tx.insert_order_item(&item).await?;

            tracing::debug!(
                book_id = %book.id(),
                quantity = line.quantity(),
                remaining_stock = book.stock(),
                "stock reserved"
            );
        }

        tx.update_order_total(order.id(), order.total_price()).await?;
        Ok(order)
    }

    /// 注文を支払い済みにする
    ///
    /// # Arguments
    /// * `identity` - 認証済みの利用者（注文者本人または管理者）
    /// * `order_id` - 注文ID
    ///
    /// # Returns
    /// * `Ok(OrderDetails)` - 支払い済みの注文
    /// * `Err(ApplicationError)` - 注文がない、権限がない、PENDINGではない
    #[tracing::instrument(skip(self), fields(user_id = %identity.user_id()))]
    pub async fn pay_order(
        &self,
        identity: &Identity,
        order_id: OrderId,
    ) -> Result<OrderDetails, ApplicationError> {
        let mut order = self
            .order_repository
            .find_by_id(order_id)
            .await?
            .ok_or_else(|| ApplicationError::NotFound(format!("order not found: {}", order_id)))?;

        if !identity.can_access(order.user_id()) {
            tracing::warn!(%order_id, "payment attempted by non-owner");
            return Err(ApplicationError::Forbidden("not authorized".to_string()));
        }

        order.pay()?;

        let updated = self
            .order_repository
            .transition_status(order_id, OrderStatus::Pending, OrderStatus::Paid)
            .await?;
        if !updated {
            // 別リクエストが先に支払いを済ませた
            return Err(DomainError::InvalidOrderState(
                "order has been paid or cancelled".to_string(),
            )
            .into());
        }

        tracing::info!(%order_id, "order paid");
        self.load_details(order_id).await
    }

    async fn load_details(&self, order_id: OrderId) -> Result<OrderDetails, ApplicationError> {
        self.order_repository
            .find_details(order_id)
            .await?
            .ok_or_else(|| ApplicationError::NotFound(format!("order not found: {}", order_id)))
    }
}
