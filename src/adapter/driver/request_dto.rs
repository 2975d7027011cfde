use crate::application::service::NewBook;
use crate::domain::error::DomainError;
use crate::domain::model::{
    BookId, BookPatch, BookQuery, CartLine, CategoryFilter, CategoryId, Money,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 利用者登録用のリクエストDTO
#[derive(Serialize, Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

/// ログイン用のリクエストDTO
#[derive(Serialize, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// カテゴリ作成・名前変更用のリクエストDTO
#[derive(Serialize, Deserialize)]
pub struct CategoryRequest {
    pub name: String,
}

/// 書籍登録用のリクエストDTO
#[derive(Serialize, Deserialize)]
pub struct CreateBookRequest {
    pub title: String,
    pub author: String,
    pub price: Decimal,
    pub stock: u32,
    pub year: i32,
    pub category_id: Uuid,
}

impl CreateBookRequest {
    pub fn into_new_book(self) -> Result<NewBook, DomainError> {
        Ok(NewBook {
            title: self.title,
            author: self.author,
            price: Money::new(self.price)?,
            stock: self.stock,
            year: self.year,
            category_id: CategoryId::from_uuid(self.category_id),
        })
    }
}

/// 書籍更新用のリクエストDTO
/// 在庫数は受け付けない（未知のフィールドは拒否する）
#[derive(Serialize, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct UpdateBookRequest {
    pub title: Option<String>,
    pub author: Option<String>,
    pub price: Option<Decimal>,
    pub year: Option<i32>,
    pub category_id: Option<Uuid>,
}

impl UpdateBookRequest {
    pub fn into_patch(self) -> Result<BookPatch, DomainError> {
        Ok(BookPatch {
            title: self.title,
            author: self.author,
            price: self.price.map(Money::new).transpose()?,
            year: self.year,
            category_id: self.category_id.map(CategoryId::from_uuid),
        })
    }
}

/// 注文明細のリクエストDTO
#[derive(Serialize, Deserialize)]
pub struct OrderItemRequest {
    pub book_id: Uuid,
    pub quantity: u32,
}

/// 注文作成用のリクエストDTO
#[derive(Serialize, Deserialize)]
pub struct CreateOrderRequest {
    pub items: Vec<OrderItemRequest>,
}

impl CreateOrderRequest {
    /// カートの内容に変換する
    /// 明細の順序はリクエストの順序のまま
    pub fn into_cart_lines(self) -> Result<Vec<CartLine>, DomainError> {
        if self.items.is_empty() {
            return Err(DomainError::EmptyOrder);
        }
        self.items
            .into_iter()
            .map(|item| CartLine::new(BookId::from_uuid(item.book_id), item.quantity))
            .collect()
    }
}

/// 書籍一覧取得用のクエリパラメータ
#[derive(Deserialize, Default)]
pub struct BooksQueryParams {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub q: Option<String>,
    pub category: Option<String>,
}

impl BooksQueryParams {
    pub fn into_query(self) -> BookQuery {
        let category = self
            .category
            .map(|raw| raw.trim().to_string())
            .filter(|raw| !raw.is_empty())
            .map(|raw| CategoryFilter::parse(&raw));
        BookQuery::new(self.page, self.limit, self.q, category)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_order_request_keeps_item_order() {
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();
        let request: CreateOrderRequest = serde_json::from_value(serde_json::json!({
            "items": [
                { "book_id": first, "quantity": 2 },
                { "book_id": second, "quantity": 1 }
            ]
        }))
        .unwrap();

        let lines = request.into_cart_lines().unwrap();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].book_id().as_uuid(), first);
        assert_eq!(lines[1].quantity(), 1);
    }

    #[test]
    fn test_empty_items_is_rejected() {
        let request = CreateOrderRequest { items: Vec::new() };
        assert_eq!(request.into_cart_lines().unwrap_err(), DomainError::EmptyOrder);
    }

    #[test]
    fn test_zero_quantity_is_rejected() {
        let request = CreateOrderRequest {
            items: vec![OrderItemRequest {
                book_id: Uuid::new_v4(),
                quantity: 0,
            }],
        };
        assert_eq!(
            request.into_cart_lines().unwrap_err(),
            DomainError::InvalidQuantity
        );
    }

    #[test]
    fn test_update_book_request_rejects_stock() {
        let result: Result<UpdateBookRequest, _> =
            serde_json::from_value(serde_json::json!({ "title": "Baru", "stock": 100 }));
        assert!(result.is_err());
    }

    #[test]
    fn test_update_book_request_rejects_negative_price() {
        let request = UpdateBookRequest {
            price: Some(Decimal::new(-100, 2)),
            ..Default::default()
        };
        assert!(request.into_patch().is_err());
    }

    #[test]
    fn test_books_query_params_category_by_id_or_name() {
        let id = Uuid::new_v4();
        let by_id = BooksQueryParams {
            category: Some(id.to_string()),
            ..Default::default()
        }
        .into_query();
        assert_eq!(
            by_id.category,
            Some(CategoryFilter::Id(CategoryId::from_uuid(id)))
        );

        let by_name = BooksQueryParams {
            category: Some("novel".to_string()),
            limit: Some(500),
            ..Default::default()
        }
        .into_query();
        assert_eq!(
            by_name.category,
            Some(CategoryFilter::Name("novel".to_string()))
        );
        assert_eq!(by_name.limit, BookQuery::MAX_LIMIT);
    }
}
