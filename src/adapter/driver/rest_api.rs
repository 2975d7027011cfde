use axum::{
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use serde::Serialize;
use sqlx::{MySql, Pool};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::adapter::driven::{
    InMemoryStore, MySqlBookRepository, MySqlCategoryRepository, MySqlOrderRepository,
    MySqlUserRepository,
};
use crate::adapter::driver::auth::{AdminUser, AuthenticatedUser};
use crate::adapter::driver::request_dto::{
    BooksQueryParams, CategoryRequest, CreateBookRequest, CreateOrderRequest, LoginRequest,
    RegisterRequest, UpdateBookRequest,
};
use crate::adapter::driver::response_dto::{
    ApiError, ApiResponse, BookPageResponse, BookResponse, CategoryResponse, LoginResponse,
    OrderResponse, UserResponse,
};
use crate::application::service::{
    AccountApplicationService, CatalogApplicationService, OrderApplicationService,
    OrderQueryService,
};
use crate::application::ApplicationError;
use crate::domain::error::DomainError;
use crate::domain::model::{BookId, CategoryId, OrderId};
use crate::domain::port::{IdentityProvider, PasswordHasher, RepositoryError};

type ApiFailure = (StatusCode, Json<ApiError>);
type ApiResult<T> = Result<(StatusCode, Json<ApiResponse<T>>), ApiFailure>;

/// アプリケーションサービスを含む状態
#[derive(Clone)]
pub struct AppState {
    pub order_service: Arc<OrderApplicationService>,
    pub order_query_service: Arc<OrderQueryService>,
    pub catalog_service: Arc<CatalogApplicationService>,
    pub account_service: Arc<AccountApplicationService>,
    pub identity_provider: Arc<dyn IdentityProvider>,
}

impl AppState {
    /// MySQLのリポジトリで状態を構築する
    pub fn with_mysql_pool(
        pool: Pool<MySql>,
        identity_provider: Arc<dyn IdentityProvider>,
        password_hasher: Arc<dyn PasswordHasher>,
        transaction_timeout: Duration,
    ) -> Self {
        let order_repository = Arc::new(MySqlOrderRepository::new(pool.clone()));
        let user_repository = Arc::new(MySqlUserRepository::new(pool.clone()));
        let book_repository = Arc::new(MySqlBookRepository::new(pool.clone()));
        let category_repository = Arc::new(MySqlCategoryRepository::new(pool));

        Self {
            order_service: Arc::new(OrderApplicationService::new(
                order_repository.clone(),
                order_repository.clone(),
                transaction_timeout,
            )),
            order_query_service: Arc::new(OrderQueryService::new(order_repository)),
            catalog_service: Arc::new(CatalogApplicationService::new(
                book_repository,
                category_repository,
            )),
            account_service: Arc::new(AccountApplicationService::new(
                user_repository,
                password_hasher,
                identity_provider.clone(),
            )),
            identity_provider,
        }
    }

    /// インメモリストアで状態を構築する
    pub fn with_in_memory_store(
        store: InMemoryStore,
        identity_provider: Arc<dyn IdentityProvider>,
        password_hasher: Arc<dyn PasswordHasher>,
        transaction_timeout: Duration,
    ) -> Self {
        let store = Arc::new(store);

        Self {
            order_service: Arc::new(OrderApplicationService::new(
                store.clone(),
                store.clone(),
                transaction_timeout,
            )),
            order_query_service: Arc::new(OrderQueryService::new(store.clone())),
            catalog_service: Arc::new(CatalogApplicationService::new(
                store.clone(),
                store.clone(),
            )),
            account_service: Arc::new(AccountApplicationService::new(
                store,
                password_hasher,
                identity_provider.clone(),
            )),
            identity_provider,
        }
    }
}

// REST APIルーターを作成
pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/", get(index))
        .route("/health", get(health_check))
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/categories", get(list_categories).post(create_category))
        .route(
            "/categories/:category_id",
            get(get_category).put(rename_category).delete(delete_category),
        )
        .route("/books", get(list_books).post(create_book))
        .route(
            "/books/:book_id",
            get(get_book).put(update_book).delete(delete_book),
        )
        .route("/orders", get(list_orders).post(create_order))
        .route("/orders/:order_id", get(get_order))
        .route("/orders/:order_id/pay", post(pay_order))
}

fn ok<T: Serialize>(data: T) -> ApiResult<T> {
    Ok((StatusCode::OK, Json(ApiResponse::success(data))))
}

fn created<T: Serialize>(data: T) -> ApiResult<T> {
    Ok((StatusCode::CREATED, Json(ApiResponse::success(data))))
}

fn validation_failure(message: String) -> ApiFailure {
    (
        StatusCode::BAD_REQUEST,
        Json(ApiError::new(message, "VALIDATION_ERROR")),
    )
}

fn parse_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiFailure> {
    payload
        .map(|Json(body)| body)
        .map_err(|rejection| validation_failure(rejection.body_text()))
}

fn parse_id(path: Result<Path<Uuid>, PathRejection>) -> Result<Uuid, ApiFailure> {
    path.map(|Path(id)| id)
        .map_err(|_| validation_failure("invalid id format".to_string()))
}

// トップページ
async fn index() -> ApiResult<serde_json::Value> {
    ok(serde_json::json!({ "message": "Welcome to the bookstore API" }))
}

// ヘルスチェックエンドポイント
async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "bookstore-api",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

// 利用者登録エンドポイント
async fn register(
    State(state): State<AppState>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> ApiResult<UserResponse> {
    let request = parse_body(payload)?;
    let user = state
        .account_service
        .register(request.name, request.email, request.password)
        .await
        .map_err(map_application_error)?;
    created(UserResponse::from_user(&user))
}

// ログインエンドポイント
async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> ApiResult<LoginResponse> {
    let request = parse_body(payload)?;
    let result = state
        .account_service
        .login(&request.email, &request.password)
        .await
        .map_err(map_application_error)?;
    ok(LoginResponse::from_login(&result))
}

// カテゴリ一覧取得エンドポイント
async fn list_categories(
    State(state): State<AppState>,
    AuthenticatedUser(_identity): AuthenticatedUser,
) -> ApiResult<Vec<CategoryResponse>> {
    let categories = state
        .catalog_service
        .list_categories()
        .await
        .map_err(map_application_error)?;
    ok(categories.iter().map(CategoryResponse::from_category).collect())
}

async fn get_category(
    State(state): State<AppState>,
    AuthenticatedUser(_identity): AuthenticatedUser,
    path: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<CategoryResponse> {
    let category_id = CategoryId::from_uuid(parse_id(path)?);
    let category = state
        .catalog_service
        .get_category(category_id)
        .await
        .map_err(map_application_error)?;
    ok(CategoryResponse::from_category(&category))
}

async fn create_category(
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
    payload: Result<Json<CategoryRequest>, JsonRejection>,
) -> ApiResult<CategoryResponse> {
    let request = parse_body(payload)?;
    let category = state
        .catalog_service
        .create_category(request.name)
        .await
        .map_err(map_application_error)?;
    created(CategoryResponse::from_category(&category))
}

async fn rename_category(
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
    path: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<CategoryRequest>, JsonRejection>,
) -> ApiResult<CategoryResponse> {
    let category_id = CategoryId::from_uuid(parse_id(path)?);
    let request = parse_body(payload)?;
    let category = state
        .catalog_service
        .rename_category(category_id, request.name)
        .await
        .map_err(map_application_error)?;
    ok(CategoryResponse::from_category(&category))
}

async fn delete_category(
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
    path: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<serde_json::Value> {
    let category_id = CategoryId::from_uuid(parse_id(path)?);
    state
        .catalog_service
        .delete_category(category_id)
        .await
        .map_err(map_application_error)?;
    ok(serde_json::json!({ "id": category_id }))
}

// 書籍一覧取得エンドポイント
async fn list_books(
    State(state): State<AppState>,
    AuthenticatedUser(_identity): AuthenticatedUser,
    query: Result<Query<BooksQueryParams>, QueryRejection>,
) -> ApiResult<BookPageResponse> {
    let Query(params) =
        query.map_err(|_| validation_failure("invalid query parameters".to_string()))?;
    let page = state
        .catalog_service
        .list_books(&params.into_query())
        .await
        .map_err(map_application_error)?;
    ok(BookPageResponse::from_page(&page))
}

async fn get_book(
    State(state): State<AppState>,
    AuthenticatedUser(_identity): AuthenticatedUser,
    path: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<BookResponse> {
    let book_id = BookId::from_uuid(parse_id(path)?);
    let book = state
        .catalog_service
        .get_book(book_id)
        .await
        .map_err(map_application_error)?;
    ok(BookResponse::from_details(&book))
}

async fn create_book(
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
    payload: Result<Json<CreateBookRequest>, JsonRejection>,
) -> ApiResult<BookResponse> {
    let new_book = parse_body(payload)?
        .into_new_book()
        .map_err(|e| map_application_error(e.into()))?;
    let book = state
        .catalog_service
        .create_book(new_book)
        .await
        .map_err(map_application_error)?;
    created(BookResponse::from_details(&book))
}

async fn update_book(
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
    path: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<UpdateBookRequest>, JsonRejection>,
) -> ApiResult<BookResponse> {
    let book_id = BookId::from_uuid(parse_id(path)?);
    let patch = parse_body(payload)?
        .into_patch()
        .map_err(|e| map_application_error(e.into()))?;
    let book = state
        .catalog_service
        .update_book(book_id, patch)
        .await
        .map_err(map_application_error)?;
    ok(BookResponse::from_details(&book))
}

async fn delete_book(
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
    path: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<serde_json::Value> {
    let book_id = BookId::from_uuid(parse_id(path)?);
    state
        .catalog_service
        .delete_book(book_id)
        .await
        .map_err(map_application_error)?;
    ok(serde_json::json!({ "id": book_id }))
}

// 注文作成エンドポイント
async fn create_order(
    State(state): State<AppState>,
    AuthenticatedUser(identity): AuthenticatedUser,
    payload: Result<Json<CreateOrderRequest>, JsonRejection>,
) -> ApiResult<OrderResponse> {
    let lines = parse_body(payload)?
        .into_cart_lines()
        .map_err(|e| map_application_error(e.into()))?;
    let order = state
        .order_service
        .place_order(&identity, lines)
        .await
        .map_err(map_application_error)?;
    created(OrderResponse::from_details(&order))
}

// 注文一覧取得エンドポイント
async fn list_orders(
    State(state): State<AppState>,
    AuthenticatedUser(identity): AuthenticatedUser,
) -> ApiResult<Vec<OrderResponse>> {
    let orders = state
        .order_query_service
        .list_orders(&identity)
        .await
        .map_err(map_application_error)?;
    ok(orders.iter().map(OrderResponse::from_details).collect())
}

// 注文詳細取得エンドポイント
async fn get_order(
    State(state): State<AppState>,
    AuthenticatedUser(identity): AuthenticatedUser,
    path: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<OrderResponse> {
    let order_id = OrderId::from_uuid(parse_id(path)?);
    let order = state
        .order_query_service
        .get_order(&identity, order_id)
        .await
        .map_err(map_application_error)?;
    ok(OrderResponse::from_details(&order))
}

// 注文支払いエンドポイント
async fn pay_order(
    State(state): State<AppState>,
    AuthenticatedUser(identity): AuthenticatedUser,
    path: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<OrderResponse> {
    let order_id = OrderId::from_uuid(parse_id(path)?);
    let order = state
        .order_service
        .pay_order(&identity, order_id)
        .await
        .map_err(map_application_error)?;
    ok(OrderResponse::from_details(&order))
}

// アプリケーションエラーをHTTPエラーにマッピング
pub(crate) fn map_application_error(err: ApplicationError) -> ApiFailure {
    let (status, message, code) = match err {
        ApplicationError::DomainError(domain_err) => {
            let (status, code) = match &domain_err {
                DomainError::InsufficientStock { .. } => {
                    (StatusCode::BAD_REQUEST, "INSUFFICIENT_STOCK")
                }
                DomainError::InvalidOrderState(_) => {
                    (StatusCode::BAD_REQUEST, "INVALID_ORDER_STATE")
                }
                DomainError::InvalidQuantity
                | DomainError::EmptyOrder
                | DomainError::InvalidValue(_) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
            };
            (status, domain_message(domain_err), code)
        }
        ApplicationError::RepositoryError(repo_err) => match repo_err {
            RepositoryError::Conflict(msg) => (StatusCode::CONFLICT, msg, "CONFLICT"),
            RepositoryError::Timeout(limit) => (
                StatusCode::SERVICE_UNAVAILABLE,
                format!("order transaction timed out after {:?}", limit),
                "TRANSACTION_TIMEOUT",
            ),
            other => {
                tracing::error!(error = %other, "store failure");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal server error".to_string(),
                    "STORE_FAILURE",
                )
            }
        },
        ApplicationError::Validation(msg) => (StatusCode::BAD_REQUEST, msg, "VALIDATION_ERROR"),
        ApplicationError::NotFound(msg) => (StatusCode::NOT_FOUND, msg, "NOT_FOUND"),
        ApplicationError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg, "UNAUTHORIZED"),
        ApplicationError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg, "FORBIDDEN"),
        ApplicationError::AuthBackend(msg) => {
            tracing::error!(error = %msg, "authentication backend failure");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal server error".to_string(),
                "INTERNAL_ERROR",
            )
        }
    };

    (status, Json(ApiError::new(message, code)))
}

// クライアント向けのメッセージ（内部の接頭辞は付けない）
fn domain_message(err: DomainError) -> String {
    match err {
        DomainError::InvalidOrderState(msg) | DomainError::InvalidValue(msg) => msg,
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_map_application_error_not_found() {
        let (status, Json(api_error)) = map_application_error(ApplicationError::NotFound(
            "リソースが見つかりません".to_string(),
        ));

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(api_error.status, "error");
        assert_eq!(api_error.code, "NOT_FOUND");
        assert_eq!(api_error.message, "リソースが見つかりません");
    }

    #[test]
    fn test_insufficient_stock_names_the_book() {
        let err = ApplicationError::from(DomainError::InsufficientStock {
            book_id: BookId::new(),
            title: "Ronggeng Dukuh Paruk".to_string(),
            requested: 4,
            available: 1,
        });
        let (status, Json(api_error)) = map_application_error(err);

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(api_error.code, "INSUFFICIENT_STOCK");
        assert!(api_error
            .message
            .contains("quantity exceeds stock for book Ronggeng Dukuh Paruk"));
    }

    #[test]
    fn test_invalid_state_message_is_unprefixed() {
        let err = ApplicationError::from(DomainError::InvalidOrderState(
            "order has been paid or cancelled".to_string(),
        ));
        let (status, Json(api_error)) = map_application_error(err);

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(api_error.message, "order has been paid or cancelled");
    }

    #[test]
    fn test_store_errors_map_to_conflict_timeout_and_500() {
        let conflict = map_application_error(
            RepositoryError::Conflict("duplicate".to_string()).into(),
        );
        assert_eq!(conflict.0, StatusCode::CONFLICT);

        let timeout =
            map_application_error(RepositoryError::Timeout(Duration::from_secs(10)).into());
        assert_eq!(timeout.0, StatusCode::SERVICE_UNAVAILABLE);

        let (status, Json(api_error)) = map_application_error(
            RepositoryError::OperationFailed("deadlock found".to_string()).into(),
        );
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!api_error.message.contains("deadlock"));
    }

    #[test]
    fn test_auth_errors_map_to_401_and_403() {
        let unauthorized =
            map_application_error(ApplicationError::Unauthorized("no token".to_string()));
        assert_eq!(unauthorized.0, StatusCode::UNAUTHORIZED);

        let forbidden = map_application_error(ApplicationError::Forbidden("nope".to_string()));
        assert_eq!(forbidden.0, StatusCode::FORBIDDEN);
    }
}
