use crate::application::service::LoginResult;
use crate::domain::model::{
    BookDetails, BookPage, Category, OrderDetails, OrderLineDetails, User,
};
use serde::{Deserialize, Serialize};

/// 成功時の共通レスポンス
#[derive(Serialize)]
pub struct ApiResponse<T> {
    pub status: &'static str,
    pub data: T,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            status: "success",
            data,
        }
    }
}

/// 失敗時の共通レスポンス
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiError {
    pub status: String,
    pub message: String,
    pub code: String,
}

impl ApiError {
    pub fn new(message: impl Into<String>, code: &str) -> Self {
        Self {
            status: "error".to_string(),
            message: message.into(),
            code: code.to_string(),
        }
    }
}

/// ユーザー用のレスポンスDTO（パスワードハッシュは含めない）
#[derive(Serialize)]
pub struct UserResponse {
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: String,
}

impl UserResponse {
    pub fn from_user(user: &User) -> Self {
        Self {
            id: user.id().to_string(),
            name: user.name().to_string(),
            email: user.email().to_string(),
            role: user.role().to_string(),
        }
    }
}

/// ログイン用のレスポンスDTO
#[derive(Serialize)]
pub struct LoginResponse {
    pub access_token: String,
    pub token_type: &'static str,
    pub expires_in: i64,
    pub user: UserResponse,
}

impl LoginResponse {
    pub fn from_login(result: &LoginResult) -> Self {
        Self {
            access_token: result.token.token.clone(),
            token_type: "bearer",
            expires_in: result.token.expires_in,
            user: UserResponse::from_user(&result.user),
        }
    }
}

/// カテゴリ用のレスポンスDTO
#[derive(Serialize)]
pub struct CategoryResponse {
    pub id: String,
    pub name: String,
}

impl CategoryResponse {
    pub fn from_category(category: &Category) -> Self {
        Self {
            id: category.id().to_string(),
            name: category.name().to_string(),
        }
    }
}

/// 書籍用のレスポンスDTO
/// 金額は小数点以下2桁の文字列で返す
#[derive(Serialize)]
pub struct BookResponse {
    pub id: String,
    pub title: String,
    pub author: String,
    pub price: String,
    pub stock: u32,
    pub year: i32,
    pub category: CategoryResponse,
}

impl BookResponse {
    pub fn from_details(details: &BookDetails) -> Self {
        let book = &details.book;
        Self {
            id: book.id().to_string(),
            title: book.title().to_string(),
            author: book.author().to_string(),
            price: book.price().to_string(),
            stock: book.stock(),
            year: book.year(),
            category: CategoryResponse::from_category(&details.category),
        }
    }
}

/// 書籍一覧用のレスポンスDTO
#[derive(Serialize)]
pub struct BookPageResponse {
    pub items: Vec<BookResponse>,
    pub page: u32,
    pub limit: u32,
    pub total: u64,
}

impl BookPageResponse {
    pub fn from_page(page: &BookPage) -> Self {
        Self {
            items: page.items.iter().map(BookResponse::from_details).collect(),
            page: page.page,
            limit: page.limit,
            total: page.total,
        }
    }
}

/// 注文明細用のレスポンスDTO
#[derive(Serialize)]
pub struct OrderItemResponse {
    pub id: String,
    pub line_number: u32,
    pub quantity: u32,
    /// 注文時点の単価
    pub unit_price: String,
    pub line_total: String,
    pub book: BookResponse,
}

impl OrderItemResponse {
    pub fn from_line(line: &OrderLineDetails) -> Self {
        Self {
            id: line.item.id().to_string(),
            line_number: line.item.line_number(),
            quantity: line.item.quantity(),
            unit_price: line.item.unit_price().to_string(),
            line_total: line.item.line_total().to_string(),
            book: BookResponse::from_details(&line.book),
        }
    }
}

/// 注文用のレスポンスDTO
#[derive(Serialize)]
pub struct OrderResponse {
    pub id: String,
    pub status: String,
    pub total_price: String,
    pub created_at: String,
    pub user: UserResponse,
    pub items: Vec<OrderItemResponse>,
}

impl OrderResponse {
    pub fn from_details(details: &OrderDetails) -> Self {
        let order = &details.order;
        Self {
            id: order.id().to_string(),
            status: order.status().to_string(),
            total_price: order.total_price().to_string(),
            created_at: order.created_at().to_rfc3339(),
            user: UserResponse::from_user(&details.user),
            items: details.lines.iter().map(OrderItemResponse::from_line).collect(),
        }
    }
}
