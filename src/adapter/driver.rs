// 駆動する側アダプター（REST API）

mod auth;
mod request_dto;
mod response_dto;
mod rest_api;

pub use auth::{AdminUser, AuthenticatedUser};
pub use rest_api::{create_router, AppState};
