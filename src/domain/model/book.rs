use crate::domain::error::DomainError;
use crate::domain::model::{BookId, CategoryId, Money};

/// カテゴリ
#[derive(Debug, Clone, PartialEq)]
pub struct Category {
    id: CategoryId,
    name: String,
}

impl Category {
    /// 新しいカテゴリを作成
    /// カテゴリ名は空にできない
    pub fn new(id: CategoryId, name: String) -> Result<Self, DomainError> {
        let name = Self::validate_name(name)?;
        Ok(Self { id, name })
    }

    pub fn id(&self) -> CategoryId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// カテゴリ名を変更
    pub fn rename(&mut self, name: String) -> Result<(), DomainError> {
        self.name = Self::validate_name(name)?;
        Ok(())
    }

    fn validate_name(name: String) -> Result<String, DomainError> {
        let trimmed = name.trim();
        if trimmed.is_empty() {
            return Err(DomainError::InvalidValue(
                "カテゴリ名は空にできません".to_string(),
            ));
        }
        Ok(trimmed.to_string())
    }
}

/// 書籍集約
/// 在庫数は注文作成時の在庫引当でのみ減少する
#[derive(Debug, Clone, PartialEq)]
pub struct Book {
    id: BookId,
    title: String,
    author: String,
    price: Money,
    stock: u32,
    year: i32,
    category_id: CategoryId,
}

impl Book {
    /// 新しい書籍を作成
    ///
    /// # Arguments
    /// * `title` - 書名（空不可）
    /// * `author` - 著者（空不可）
    /// * `price` - 単価
    /// * `stock` - 初期在庫数
    /// * `year` - 出版年
    /// * `category_id` - カテゴリID
    pub fn new(
        id: BookId,
        title: String,
        author: String,
        price: Money,
        stock: u32,
        year: i32,
        category_id: CategoryId,
    ) -> Result<Self, DomainError> {
        Ok(Self {
            id,
            title: require_text("書名", title)?,
            author: require_text("著者", author)?,
            price,
            stock,
            year,
            category_id,
        })
    }

    /// データベースから取得したデータで書籍を再構築
    pub fn reconstruct(
        id: BookId,
        title: String,
        author: String,
        price: Money,
        stock: u32,
        year: i32,
        category_id: CategoryId,
    ) -> Self {
        Self {
            id,
            title,
            author,
            price,
            stock,
            year,
            category_id,
        }
    }

    pub fn id(&self) -> BookId {
        self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn author(&self) -> &str {
        &self.author
    }

    pub fn price(&self) -> Money {
        self.price
    }

    pub fn stock(&self) -> u32 {
        self.stock
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn category_id(&self) -> CategoryId {
        self.category_id
    }

    /// 在庫を引き当てる
    ///
    /// # Returns
    /// * `Ok(())` - 引当成功（在庫数が減少する）
    /// * `Err(DomainError::InsufficientStock)` - 在庫不足（在庫数は変わらない）
    pub fn reserve_stock(&mut self, quantity: u32) -> Result<(), DomainError> {
        if quantity == 0 {
            return Err(DomainError::InvalidQuantity);
        }
        if quantity > self.stock {
            return Err(DomainError::InsufficientStock {
                book_id: self.id,
                title: self.title.clone(),
                requested: quantity,
                available: self.stock,
            });
        }
        self.stock -= quantity;
        Ok(())
    }

    /// 部分更新を適用する
    /// 指定されたフィールドのみを変更し、未指定のフィールドはそのまま残す
    pub fn apply_patch(&mut self, patch: BookPatch) -> Result<(), DomainError> {
        if let Some(title) = patch.title {
            self.title = require_text("書名", title)?;
        }
        if let Some(author) = patch.author {
            self.author = require_text("著者", author)?;
        }
        if let Some(price) = patch.price {
            self.price = price;
        }
        if let Some(year) = patch.year {
            self.year = year;
        }
        if let Some(category_id) = patch.category_id {
            self.category_id = category_id;
        }
        Ok(())
    }
}

fn require_text(field: &str, value: String) -> Result<String, DomainError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(DomainError::InvalidValue(format!(
            "{}は空にできません",
            field
        )));
    }
    Ok(trimmed.to_string())
}

/// 書籍の部分更新
/// `None` のフィールドは変更しない。在庫数は含まない
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BookPatch {
    pub title: Option<String>,
    pub author: Option<String>,
    pub price: Option<Money>,
    pub year: Option<i32>,
    pub category_id: Option<CategoryId>,
}

impl BookPatch {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.author.is_none()
            && self.price.is_none()
            && self.year.is_none()
            && self.category_id.is_none()
    }
}

/// カテゴリを展開した書籍
#[derive(Debug, Clone, PartialEq)]
pub struct BookDetails {
    pub book: Book,
    pub category: Category,
}

/// 書籍一覧のカテゴリ絞り込み
#[derive(Debug, Clone, PartialEq)]
pub enum CategoryFilter {
    /// カテゴリIDで完全一致
    Id(CategoryId),
    /// カテゴリ名の部分一致（大文字小文字を区別しない）
    Name(String),
}

impl CategoryFilter {
    /// クエリ文字列から絞り込み条件を作成
    /// UUIDとして解釈できればID、それ以外は名前
    pub fn parse(raw: &str) -> Self {
        match CategoryId::from_string(raw) {
            Ok(id) => CategoryFilter::Id(id),
            Err(_) => CategoryFilter::Name(raw.to_string()),
        }
    }
}

/// 書籍一覧の検索条件
#[derive(Debug, Clone, PartialEq)]
pub struct BookQuery {
    pub page: u32,
    pub limit: u32,
    pub keyword: Option<String>,
    pub category: Option<CategoryFilter>,
}

impl BookQuery {
    pub const DEFAULT_LIMIT: u32 = 10;
    pub const MAX_LIMIT: u32 = 100;

    /// ページ番号とページサイズを正規化して検索条件を作成
    pub fn new(
        page: Option<u32>,
        limit: Option<u32>,
        keyword: Option<String>,
        category: Option<CategoryFilter>,
    ) -> Self {
        let page = page.unwrap_or(1).max(1);
        let limit = limit
            .unwrap_or(Self::DEFAULT_LIMIT)
            .clamp(1, Self::MAX_LIMIT);
        let keyword = keyword
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty());
        Self {
            page,
            limit,
            keyword,
            category,
        }
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.page - 1) * u64::from(self.limit)
    }
}

/// 書籍一覧の1ページ
#[derive(Debug, Clone)]
pub struct BookPage {
    pub items: Vec<BookDetails>,
    pub page: u32,
    pub limit: u32,
    pub total: u64,
}
