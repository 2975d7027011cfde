use crate::domain::error::DomainError;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use std::fmt;

/// UUIDをラップした識別子型を定義する
macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// 新しい一意の識別子を生成
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// UUIDから識別子を作成
            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// 文字列から識別子を作成
            pub fn from_string(s: &str) -> Result<Self, uuid::Error> {
                let uuid = Uuid::parse_str(s)?;
                Ok(Self(uuid))
            }

            /// 内部のUUIDを取得
            pub fn as_uuid(&self) -> Uuid {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }
    };
}

define_id!(
    /// 注文の一意識別子
    OrderId
);
define_id!(
    /// 注文明細の一意識別子
    OrderItemId
);
define_id!(
    /// 書籍の一意識別子
    BookId
);
define_id!(
    /// カテゴリの一意識別子
    CategoryId
);
define_id!(
    /// ユーザーの一意識別子
    UserId
);

/// 金額を表す値オブジェクト
/// 負の金額は存在しない
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(Decimal);

impl Money {
    /// 金額から作成
    pub fn new(amount: Decimal) -> Result<Self, DomainError> {
        if amount.is_sign_negative() && !amount.is_zero() {
            return Err(DomainError::InvalidValue(format!(
                "金額は0以上である必要があります: {}",
                amount
            )));
        }
        Ok(Self(amount))
    }

    /// 0円
    pub fn zero() -> Self {
        Self(Decimal::ZERO)
    }

    /// 金額を取得
    pub fn amount(&self) -> Decimal {
        self.0
    }

    /// 金額を加算
    ///
    /// # Returns
    /// * `Err(DomainError::InvalidValue)` - 表現できる範囲を超えた
    pub fn add(&self, other: &Money) -> Result<Money, DomainError> {
        self.0
            .checked_add(other.0)
            .map(Money)
            .ok_or_else(|| DomainError::InvalidValue("amount is too large".to_string()))
    }

    /// 金額を乗算
    pub fn multiply(&self, factor: u32) -> Result<Money, DomainError> {
        self.0
            .checked_mul(Decimal::from(factor))
            .map(Money)
            .ok_or_else(|| DomainError::InvalidValue("amount is too large".to_string()))
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

/// カートの1行（書籍IDと数量）
/// 数量は1以上である必要がある
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CartLine {
    book_id: BookId,
    quantity: u32,
}

impl CartLine {
    pub fn new(book_id: BookId, quantity: u32) -> Result<Self, DomainError> {
        if quantity == 0 {
            return Err(DomainError::InvalidQuantity);
        }
        Ok(Self { book_id, quantity })
    }

    pub fn book_id(&self) -> BookId {
        self.book_id
    }

    pub fn quantity(&self) -> u32 {
        self.quantity
    }
}

/// 注文のステータス
/// PENDING → PAID の一方向のみ
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderStatus {
    /// 支払い待ち（作成直後）
    Pending,
    /// 支払い済み
    Paid,
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status_str = match self {
            OrderStatus::Pending => "PENDING",
            OrderStatus::Paid => "PAID",
        };
        write!(f, "{}", status_str)
    }
}

impl OrderStatus {
    /// 文字列からOrderStatusを作成
    pub fn from_string(s: &str) -> Result<Self, DomainError> {
        match s {
            "PENDING" => Ok(OrderStatus::Pending),
            "PAID" => Ok(OrderStatus::Paid),
            _ => Err(DomainError::InvalidValue(format!(
                "無効な注文ステータス: {}",
                s
            ))),
        }
    }
}

/// ユーザーのロール
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Admin,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let role_str = match self {
            Role::User => "user",
            Role::Admin => "admin",
        };
        write!(f, "{}", role_str)
    }
}

impl Role {
    /// 文字列からRoleを作成
    pub fn from_string(s: &str) -> Result<Self, DomainError> {
        match s {
            "user" => Ok(Role::User),
            "admin" => Ok(Role::Admin),
            _ => Err(DomainError::InvalidValue(format!("無効なロール: {}", s))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn money(s: &str) -> Money {
        Money::new(Decimal::from_str(s).unwrap()).unwrap()
    }

    #[test]
    fn test_order_id_creation() {
        let id1 = OrderId::new();
        let id2 = OrderId::new();
        assert_ne!(id1, id2, "Each OrderId should be unique");
    }

    #[test]
    fn test_id_from_string_round_trip() {
        let id = BookId::new();
        let parsed = BookId::from_string(&id.to_string()).unwrap();
        assert_eq!(id, parsed);
        assert!(BookId::from_string("not-a-uuid").is_err());
    }

    #[test]
    fn test_money_rejects_negative_amount() {
        assert!(Money::new(Decimal::from_str("-0.01").unwrap()).is_err());
        assert!(Money::new(Decimal::ZERO).is_ok());
    }

    #[test]
    fn test_money_addition() {
        let result = money("10.50").add(&money("4.25")).unwrap();
        assert_eq!(result, money("14.75"));
    }

    #[test]
    fn test_money_multiplication() {
        let result = money("10.00").multiply(3).unwrap();
        assert_eq!(result.amount(), Decimal::from_str("30.00").unwrap());
        assert_eq!(result.to_string(), "30.00");
    }

    #[test]
    fn test_money_overflow_is_an_error() {
        let huge = Money::new(Decimal::MAX).unwrap();

        assert!(matches!(huge.multiply(2), Err(DomainError::InvalidValue(_))));
        assert!(matches!(huge.add(&huge), Err(DomainError::InvalidValue(_))));
        assert_eq!(huge.multiply(1).unwrap(), huge);
    }

    #[test]
    fn test_cart_line_rejects_zero_quantity() {
        let result = CartLine::new(BookId::new(), 0);
        assert_eq!(result.unwrap_err(), DomainError::InvalidQuantity);
    }

    #[test]
    fn test_order_status_from_string() {
        assert_eq!(OrderStatus::from_string("PENDING").unwrap(), OrderStatus::Pending);
        assert_eq!(OrderStatus::from_string("PAID").unwrap(), OrderStatus::Paid);
        assert!(OrderStatus::from_string("CANCELLED").is_err());
        assert!(OrderStatus::from_string("pending").is_err()); // 大文字小文字が違う
    }

    #[test]
    fn test_role_round_trip() {
        for role in [Role::User, Role::Admin] {
            assert_eq!(Role::from_string(&role.to_string()).unwrap(), role);
        }
        assert!(Role::from_string("superuser").is_err());
    }
}
