use crate::domain::model::BookId;

/// ドメイン層のエラー型
/// ビジネスルール違反を表現する
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DomainError {
    /// 無効な注文状態（例: 支払い済みの注文を再度支払おうとした）
    #[error("Invalid order state: {0}")]
    InvalidOrderState(String),
    /// 在庫不足
    #[error("quantity exceeds stock for book {title} (requested {requested}, available {available})")]
    InsufficientStock {
        book_id: BookId,
        title: String,
        requested: u32,
        available: u32,
    },
    /// 無効な数量（例: 0の数量）
    #[error("Invalid quantity")]
    InvalidQuantity,
    /// 注文明細が空
    #[error("Order must contain at least one item")]
    EmptyOrder,
    /// 無効な値
    #[error("Invalid value: {0}")]
    InvalidValue(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insufficient_stock_message_names_book() {
        let err = DomainError::InsufficientStock {
            book_id: BookId::new(),
            title: "Laskar Pelangi".to_string(),
            requested: 3,
            available: 2,
        };

        let message = err.to_string();
        assert!(message.contains("Laskar Pelangi"));
        assert!(message.contains("requested 3"));
        assert!(message.contains("available 2"));
    }
}
