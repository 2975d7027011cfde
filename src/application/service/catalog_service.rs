use crate::application::ApplicationError;
use crate::domain::model::{
    Book, BookDetails, BookId, BookPage, BookPatch, BookQuery, Category, CategoryId, Money,
};
use crate::domain::port::{BookRepository, CategoryRepository};
use std::sync::Arc;

/// 新規登録する書籍の内容
#[derive(Debug, Clone)]
pub struct NewBook {
    pub title: String,
    pub author: String,
    pub price: Money,
    pub stock: u32,
    pub year: i32,
    pub category_id: CategoryId,
}

/// カタログアプリケーションサービス
/// 書籍とカテゴリの参照・管理を担当する
pub struct CatalogApplicationService {
    book_repository: Arc<dyn BookRepository>,
    category_repository: Arc<dyn CategoryRepository>,
}

impl CatalogApplicationService {
    pub fn new(
        book_repository: Arc<dyn BookRepository>,
        category_repository: Arc<dyn CategoryRepository>,
    ) -> Self {
        Self {
            book_repository,
            category_repository,
        }
    }

    /// 書籍一覧を検索する
    pub async fn list_books(&self, query: &BookQuery) -> Result<BookPage, ApplicationError> {
        self.book_repository
            .search(query)
            .await
            .map_err(ApplicationError::from)
    }

    pub async fn get_book(&self, book_id: BookId) -> Result<BookDetails, ApplicationError> {
        self.book_repository
            .find_details(book_id)
            .await?
            .ok_or_else(|| book_not_found(book_id))
    }

    /// 書籍を登録する
    ///
    /// # Returns
    /// * `Ok(BookDetails)` - 登録された書籍
    /// * `Err(ApplicationError::NotFound)` - カテゴリが存在しない
    #[tracing::instrument(skip(self, new_book), fields(title = %new_book.title))]
    pub async fn create_book(&self, new_book: NewBook) -> Result<BookDetails, ApplicationError> {
        self.require_category(new_book.category_id).await?;

        let book = Book::new(
            BookId::new(),
            new_book.title,
            new_book.author,
            new_book.price,
            new_book.stock,
            new_book.year,
            new_book.category_id,
        )?;
        self.book_repository.insert(&book).await?;
        tracing::info!(book_id = %book.id(), stock = book.stock(), "book created");

        self.get_book(book.id()).await
    }

    /// 書籍を部分更新する
    /// 在庫数は変更できない
    #[tracing::instrument(skip(self, patch))]
    pub async fn update_book(
        &self,
        book_id: BookId,
        patch: BookPatch,
    ) -> Result<BookDetails, ApplicationError> {
        let mut book = self
            .book_repository
            .find_by_id(book_id)
            .await?
            .ok_or_else(|| book_not_found(book_id))?;

        if patch.is_empty() {
            return self.get_book(book_id).await;
        }
        if let Some(category_id) = patch.category_id {
            self.require_category(category_id).await?;
        }

        book.apply_patch(patch)?;
        self.book_repository.update_details(&book).await?;
        tracing::info!(%book_id, "book updated");

        self.get_book(book_id).await
    }

    /// 書籍を削除する
    /// 注文明細から参照されている書籍は削除できない（`Conflict`）
    #[tracing::instrument(skip(self))]
    pub async fn delete_book(&self, book_id: BookId) -> Result<(), ApplicationError> {
        if !self.book_repository.delete(book_id).await? {
            return Err(book_not_found(book_id));
        }
        tracing::info!(%book_id, "book deleted");
        Ok(())
    }

    /// すべてのカテゴリを名前順で取得する
    pub async fn list_categories(&self) -> Result<Vec<Category>, ApplicationError> {
        self.category_repository
            .find_all()
            .await
            .map_err(ApplicationError::from)
    }

    pub async fn get_category(&self, category_id: CategoryId) -> Result<Category, ApplicationError> {
        self.require_category(category_id).await
    }

    #[tracing::instrument(skip(self))]
    pub async fn create_category(&self, name: String) -> Result<Category, ApplicationError> {
        let category = Category::new(CategoryId::new(), name)?;
        self.category_repository.insert(&category).await?;
        tracing::info!(category_id = %category.id(), "category created");
        Ok(category)
    }

    #[tracing::instrument(skip(self))]
    pub async fn rename_category(
        &self,
        category_id: CategoryId,
        name: String,
    ) -> Result<Category, ApplicationError> {
        let mut category = self.require_category(category_id).await?;
        category.rename(name)?;
        self.category_repository.update(&category).await?;
        Ok(category)
    }

    /// カテゴリを削除する
    /// 書籍から参照されているカテゴリは削除できない（`Conflict`）
    #[tracing::instrument(skip(self))]
    pub async fn delete_category(&self, category_id: CategoryId) -> Result<(), ApplicationError> {
        if !self.category_repository.delete(category_id).await? {
            return Err(category_not_found(category_id));
        }
        tracing::info!(%category_id, "category deleted");
        Ok(())
    }

    async fn require_category(&self, category_id: CategoryId) -> Result<Category, ApplicationError> {
        self.category_repository
            .find_by_id(category_id)
            .await?
            .ok_or_else(|| category_not_found(category_id))
    }
}

fn book_not_found(book_id: BookId) -> ApplicationError {
    ApplicationError::NotFound(format!("book not found: {}", book_id))
}

fn category_not_found(category_id: CategoryId) -> ApplicationError {
    ApplicationError::NotFound(format!("category not found: {}", category_id))
}
