use crate::domain::error::DomainError;
use crate::domain::model::{
    Book, BookDetails, BookId, Money, OrderId, OrderItemId, OrderStatus, User, UserId,
};
use chrono::{DateTime, Utc};

/// 注文明細
/// 単価は注文時点の書籍価格のスナップショットで、以後の価格変更の影響を受けない
#[derive(Debug, Clone, PartialEq)]
pub struct OrderItem {
    id: OrderItemId,
    order_id: OrderId,
    book_id: BookId,
    line_number: u32,
    quantity: u32,
    unit_price: Money,
    line_total: Money,
}

impl OrderItem {
    /// データベースから取得したデータで注文明細を再構築
    ///
    /// # Returns
    /// * `Err(DomainError::InvalidValue)` - 小計が表現できる範囲を超えた
    pub fn reconstruct(
        id: OrderItemId,
        order_id: OrderId,
        book_id: BookId,
        line_number: u32,
        quantity: u32,
        unit_price: Money,
    ) -> Result<Self, DomainError> {
        Ok(Self {
            id,
            order_id,
            book_id,
            line_number,
            quantity,
            unit_price,
            line_total: unit_price.multiply(quantity)?,
        })
    }

    pub fn id(&self) -> OrderItemId {
        self.id
    }

    pub fn order_id(&self) -> OrderId {
        self.order_id
    }

    pub fn book_id(&self) -> BookId {
        self.book_id
    }

    /// リクエスト内での位置（1始まり）
    pub fn line_number(&self) -> u32 {
        self.line_number
    }

    pub fn quantity(&self) -> u32 {
        self.quantity
    }

    pub fn unit_price(&self) -> Money {
        self.unit_price
    }

    /// 小計（単価 × 数量）
    pub fn line_total(&self) -> Money {
        self.line_total
    }
}

/// Order集約
/// 作成時はPENDING・合計0で、明細の追加ごとに合計金額を積み上げる
#[derive(Debug, Clone, PartialEq)]
pub struct Order {
    id: OrderId,
    user_id: UserId,
    total_price: Money,
    status: OrderStatus,
    created_at: DateTime<Utc>,
    items: Vec<OrderItem>,
}

impl Order {
    /// 新しい注文を作成
    /// 初期ステータスはPending
    pub fn new(id: OrderId, user_id: UserId) -> Self {
        Self {
            id,
            user_id,
            total_price: Money::zero(),
            status: OrderStatus::Pending,
            created_at: Utc::now(),
            items: Vec::new(),
        }
    }

    /// データベースから取得したデータで注文を再構築
    /// リポジトリでの使用を想定
    pub fn reconstruct(
        id: OrderId,
        user_id: UserId,
        total_price: Money,
        status: OrderStatus,
        created_at: DateTime<Utc>,
        items: Vec<OrderItem>,
    ) -> Self {
        Self {
            id,
            user_id,
            total_price,
            status,
            created_at,
            items,
        }
    }

    pub fn id(&self) -> OrderId {
        self.id
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    pub fn total_price(&self) -> Money {
        self.total_price
    }

    pub fn status(&self) -> OrderStatus {
        self.status
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn items(&self) -> &[OrderItem] {
        &self.items
    }

    pub fn is_owned_by(&self, user_id: UserId) -> bool {
        self.user_id == user_id
    }

    /// 書籍の現在価格で明細を追加し、合計金額に加算する
    /// 同じ書籍でも明細はまとめない
    ///
    /// # Returns
    /// * 追加された明細（永続化用）
    pub fn add_item(&mut self, book: &Book, quantity: u32) -> Result<OrderItem, DomainError> {
        if quantity == 0 {
            return Err(DomainError::InvalidQuantity);
        }
        if self.status != OrderStatus::Pending {
            return Err(DomainError::InvalidOrderState(
                "明細を追加できるのはPENDING状態のみです".to_string(),
            ));
        }

        let item = OrderItem::reconstruct(
            OrderItemId::new(),
            self.id,
            book.id(),
            self.items.len() as u32 + 1,
            quantity,
            book.price(),
        )?;
        // 合計が溢れる場合は明細を追加しない
        self.total_price = self.total_price.add(&item.line_total())?;
        self.items.push(item.clone());
        Ok(item)
    }

    /// 明細から合計金額を再計算
    pub fn calculate_total(&self) -> Result<Money, DomainError> {
        self.items
            .iter()
            .try_fold(Money::zero(), |acc, item| acc.add(&item.line_total()))
    }

    /// 注文を支払い済みにする
    /// 事前条件:
    /// - ステータスがPENDING
    pub fn pay(&mut self) -> Result<(), DomainError> {
        if self.status != OrderStatus::Pending {
            return Err(DomainError::InvalidOrderState(
                "order has been paid or cancelled".to_string(),
            ));
        }
        self.status = OrderStatus::Paid;
        Ok(())
    }
}

/// 書籍を展開した注文明細
#[derive(Debug, Clone, PartialEq)]
pub struct OrderLineDetails {
    pub item: OrderItem,
    pub book: BookDetails,
}

/// 注文者・明細・書籍・カテゴリを展開した注文
#[derive(Debug, Clone, PartialEq)]
pub struct OrderDetails {
    pub order: Order,
    pub user: User,
    pub lines: Vec<OrderLineDetails>,
}
