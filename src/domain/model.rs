// ドメインモデル（エンティティと値オブジェクト）

mod book;
mod order;
mod user;
mod value_objects;

pub use value_objects::{
    BookId, CartLine, CategoryId, Money, OrderId, OrderItemId, OrderStatus, Role, UserId,
};

pub use book::{Book, BookDetails, BookPage, BookPatch, BookQuery, Category, CategoryFilter};
pub use order::{Order, OrderDetails, OrderItem, OrderLineDetails};
pub use user::{Identity, User};
