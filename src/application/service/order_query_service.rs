use crate::application::ApplicationError;
use crate::domain::model::{Identity, OrderDetails, OrderId};
use crate::domain::port::{OrderRepository, OrderScope};
use std::sync::Arc;

/// 注文クエリサービス
/// 読み取り専用の注文操作を提供する
pub struct OrderQueryService {
    order_repository: Arc<dyn OrderRepository>,
}

impl OrderQueryService {
    /// 新しい注文クエリサービスを作成
    ///
    /// # Arguments
    /// * `order_repository` - 注文リポジトリ
    pub fn new(order_repository: Arc<dyn OrderRepository>) -> Self {
        Self { order_repository }
    }

    /// 注文IDで注文を取得
    ///
    /// # Arguments
    /// * `identity` - 認証済みの利用者
    /// * `order_id` - 注文ID
    ///
    /// # Returns
    /// * `Ok(OrderDetails)` - 注文が見つかった
    /// * `Err(ApplicationError::NotFound)` - 注文が見つからなかった
    /// * `Err(ApplicationError::Forbidden)` - 本人の注文ではなく、管理者でもない
    pub async fn get_order(
        &self,
        identity: &Identity,
        order_id: OrderId,
    ) -> Result<OrderDetails, ApplicationError> {
        let details = self
            .order_repository
            .find_details(order_id)
            .await?
            .ok_or_else(|| ApplicationError::NotFound(format!("order not found: {}", order_id)))?;

        if !identity.can_access(details.order.user_id()) {
            return Err(ApplicationError::Forbidden("not authorized".to_string()));
        }
        Ok(details)
    }

    /// 注文一覧を取得
    /// 管理者はすべての注文、それ以外は自分の注文のみ。作成日時の降順で返す
    pub async fn list_orders(
        &self,
        identity: &Identity,
    ) -> Result<Vec<OrderDetails>, ApplicationError> {
        let scope = if identity.is_admin() {
            OrderScope::All
        } else {
            OrderScope::OwnedBy(identity.user_id())
        };
        self.order_repository
            .list_details(scope)
            .await
            .map_err(ApplicationError::from)
    }
}
