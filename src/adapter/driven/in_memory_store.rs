use crate::domain::model::{
    Book, BookDetails, BookId, BookPage, BookQuery, Category, CategoryFilter, CategoryId, Money,
    Order, OrderDetails, OrderId, OrderItem, OrderLineDetails, OrderStatus, User, UserId,
};
use crate::domain::port::{
    BookRepository, CategoryRepository, LedgerStore, LedgerTransaction, OrderRepository,
    OrderScope, RepositoryError, UserRepository,
};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};

/// 登録順を保持した行
#[derive(Debug, Clone)]
struct Stored<T> {
    value: T,
    seq: u64,
}

#[derive(Debug, Default)]
struct StoreState {
    users: HashMap<UserId, User>,
    categories: HashMap<CategoryId, Category>,
    books: HashMap<BookId, Stored<Book>>,
    orders: HashMap<OrderId, Stored<Order>>,
    next_seq: u64,
}

impl StoreState {
    fn next_seq(&mut self) -> u64 {
        self.next_seq += 1;
        self.next_seq
    }

    fn book_details(&self, book_id: BookId) -> Result<Option<BookDetails>, RepositoryError> {
        let Some(stored) = self.books.get(&book_id) else {
            return Ok(None);
        };
        let category = self
            .categories
            .get(&stored.value.category_id())
            .cloned()
            .ok_or_else(|| {
                RepositoryError::FetchFailed(format!("category missing for book {}", book_id))
            })?;
        Ok(Some(BookDetails {
            book: stored.value.clone(),
            category,
        }))
    }

    fn order_details(&self, order: &Order) -> Result<OrderDetails, RepositoryError> {
        let user = self.users.get(&order.user_id()).cloned().ok_or_else(|| {
            RepositoryError::FetchFailed(format!("user missing for order {}", order.id()))
        })?;
        let lines = order
            .items()
            .iter()
            .map(|item| {
                let book = self.book_details(item.book_id())?.ok_or_else(|| {
                    RepositoryError::FetchFailed(format!(
                        "book missing for order item {}",
                        item.id()
                    ))
                })?;
                Ok(OrderLineDetails {
                    item: item.clone(),
                    book,
                })
            })
            .collect::<Result<Vec<_>, RepositoryError>>()?;

        Ok(OrderDetails {
            order: order.clone(),
            user,
            lines,
        })
    }

    fn category_name_taken(&self, name: &str, except: CategoryId) -> bool {
        self.categories
            .values()
            .any(|c| c.id() != except && c.name().eq_ignore_ascii_case(name))
    }

    fn book_matches(&self, book: &Book, query: &BookQuery) -> bool {
        if let Some(keyword) = &query.keyword {
            let keyword = keyword.to_lowercase();
            if !book.title().to_lowercase().contains(&keyword)
                && !book.author().to_lowercase().contains(&keyword)
            {
                return false;
            }
        }
        match &query.category {
            Some(CategoryFilter::Id(category_id)) => book.category_id() == *category_id,
            Some(CategoryFilter::Name(name)) => self
                .categories
                .get(&book.category_id())
                .map(|c| c.name().to_lowercase().contains(&name.to_lowercase()))
                .unwrap_or(false),
            None => true,
        }
    }
}

#[derive(Debug, Default)]
struct Inner {
    state: RwLock<StoreState>,
    // 書籍ごとの排他ロック（SELECT ... FOR UPDATE 相当）
    book_locks: Mutex<HashMap<BookId, Arc<Mutex<()>>>>,
}

/// インメモリストア
/// すべてのリポジトリと台帳ストアをメモリ上で実装する
/// テストやローカル実行でMySQLの代わりに使用する
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    inner: Arc<Inner>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 全書籍の在庫数の合計
    pub async fn total_stock(&self) -> u64 {
        let state = self.inner.state.read().await;
        state
            .books
            .values()
            .map(|stored| u64::from(stored.value.stock()))
            .sum()
    }

    /// 保存済みの注文数
    pub async fn order_count(&self) -> usize {
        self.inner.state.read().await.orders.len()
    }

    async fn book_lock(&self, book_id: BookId) -> Arc<Mutex<()>> {
        let mut locks = self.inner.book_locks.lock().await;
        locks.entry(book_id).or_default().clone()
    }

    /// 存在しない書籍のロックを登録簿から取り除く
    async fn forget_book_lock(&self, book_id: BookId) {
        self.inner.book_locks.lock().await.remove(&book_id);
    }
}

#[async_trait]
impl UserRepository for InMemoryStore {
    async fn insert(&self, user: &User) -> Result<(), RepositoryError> {
        let mut state = self.inner.state.write().await;
        if state.users.values().any(|u| u.email() == user.email()) {
            return Err(RepositoryError::Conflict(format!(
                "duplicate email: {}",
                user.email()
            )));
        }
        state.users.insert(user.id(), user.clone());
        Ok(())
    }

    async fn find_by_id(&self, user_id: UserId) -> Result<Option<User>, RepositoryError> {
        Ok(self.inner.state.read().await.users.get(&user_id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, RepositoryError> {
        let state = self.inner.state.read().await;
        Ok(state.users.values().find(|u| u.email() == email).cloned())
    }
}

#[async_trait]
impl CategoryRepository for InMemoryStore {
    async fn insert(&self, category: &Category) -> Result<(), RepositoryError> {
        let mut state = self.inner.state.write().await;
        if state.category_name_taken(category.name(), category.id()) {
            return Err(RepositoryError::Conflict(format!(
                "duplicate category name: {}",
                category.name()
            )));
        }
        state.categories.insert(category.id(), category.clone());
        Ok(())
    }

    async fn update(&self, category: &Category) -> Result<(), RepositoryError> {
        let mut state = self.inner.state.write().await;
        if state.category_name_taken(category.name(), category.id()) {
            return Err(RepositoryError::Conflict(format!(
                "duplicate category name: {}",
                category.name()
            )));
        }
        if let Some(existing) = state.categories.get_mut(&category.id()) {
            *existing = category.clone();
        }
        Ok(())
    }

    async fn find_by_id(
        &self,
        category_id: CategoryId,
    ) -> Result<Option<Category>, RepositoryError> {
        Ok(self
            .inner
            .state
            .read()
            .await
            .categories
            .get(&category_id)
            .cloned())
    }

    async fn find_all(&self) -> Result<Vec<Category>, RepositoryError> {
        let state = self.inner.state.read().await;
        let mut categories: Vec<Category> = state.categories.values().cloned().collect();
        categories.sort_by(|a, b| a.name().cmp(b.name()));
        Ok(categories)
    }

    async fn delete(&self, category_id: CategoryId) -> Result<bool, RepositoryError> {
        let mut state = self.inner.state.write().await;
        if state
            .books
            .values()
            .any(|stored| stored.value.category_id() == category_id)
        {
            return Err(RepositoryError::Conflict(format!(
                "category {} is referenced by books",
                category_id
            )));
        }
        Ok(state.categories.remove(&category_id).is_some())
    }
}

#[async_trait]
impl BookRepository for InMemoryStore {
    async fn insert(&self, book: &Book) -> Result<(), RepositoryError> {
        let mut state = self.inner.state.write().await;
        if !state.categories.contains_key(&book.category_id()) {
            return Err(RepositoryError::Conflict(format!(
                "unknown category: {}",
                book.category_id()
            )));
        }
        if state.books.contains_key(&book.id()) {
            return Err(RepositoryError::Conflict(format!("duplicate book: {}", book.id())));
        }
        let seq = state.next_seq();
        state.books.insert(
            book.id(),
            Stored {
                value: book.clone(),
                seq,
            },
        );
        Ok(())
    }

    async fn update_details(&self, book: &Book) -> Result<(), RepositoryError> {
        let mut state = self.inner.state.write().await;
        if !state.categories.contains_key(&book.category_id()) {
            return Err(RepositoryError::Conflict(format!(
                "unknown category: {}",
                book.category_id()
            )));
        }
        if let Some(stored) = state.books.get_mut(&book.id()) {
            // 在庫数は保存済みの値を維持する
            stored.value = Book::reconstruct(
                book.id(),
                book.title().to_string(),
                book.author().to_string(),
                book.price(),
                stored.value.stock(),
                book.year(),
                book.category_id(),
            );
        }
        Ok(())
    }

    async fn find_by_id(&self, book_id: BookId) -> Result<Option<Book>, RepositoryError> {
        let state = self.inner.state.read().await;
        Ok(state.books.get(&book_id).map(|stored| stored.value.clone()))
    }

    async fn find_details(&self, book_id: BookId) -> Result<Option<BookDetails>, RepositoryError> {
        self.inner.state.read().await.book_details(book_id)
    }

    async fn search(&self, query: &BookQuery) -> Result<BookPage, RepositoryError> {
        let state = self.inner.state.read().await;
        let mut matching: Vec<&Stored<Book>> = state
            .books
            .values()
            .filter(|stored| state.book_matches(&stored.value, query))
            .collect();
        // 新しい順
        matching.sort_by(|a, b| b.seq.cmp(&a.seq));

        let total = matching.len() as u64;
        let items = matching
            .into_iter()
            .skip(query.offset() as usize)
            .take(query.limit as usize)
            .map(|stored| {
                state.book_details(stored.value.id())?.ok_or_else(|| {
                    RepositoryError::FetchFailed(format!("book vanished: {}", stored.value.id()))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(BookPage {
            items,
            page: query.page,
            limit: query.limit,
            total,
        })
    }

    async fn delete(&self, book_id: BookId) -> Result<bool, RepositoryError> {
        // 台帳トランザクションがロック中の書籍は、その終了まで削除できない
        let lock = self.book_lock(book_id).await;
        let _guard = lock.lock().await;

        let mut state = self.inner.state.write().await;
        let referenced = state.orders.values().any(|stored| {
            stored
                .value
                .items()
                .iter()
                .any(|item| item.book_id() == book_id)
        });
        if referenced {
            return Err(RepositoryError::Conflict(format!(
                "book {} is referenced by order items",
                book_id
            )));
        }
        let removed = state.books.remove(&book_id).is_some();
        drop(state);

        self.forget_book_lock(book_id).await;
        Ok(removed)
    }
}

#[async_trait]
impl OrderRepository for InMemoryStore {
    async fn find_by_id(&self, order_id: OrderId) -> Result<Option<Order>, RepositoryError> {
        let state = self.inner.state.read().await;
        Ok(state.orders.get(&order_id).map(|stored| stored.value.clone()))
    }

    async fn find_details(
        &self,
        order_id: OrderId,
    ) -> Result<Option<OrderDetails>, RepositoryError> {
        let state = self.inner.state.read().await;
        state
            .orders
            .get(&order_id)
            .map(|stored| state.order_details(&stored.value))
            .transpose()
    }

    async fn list_details(&self, scope: OrderScope) -> Result<Vec<OrderDetails>, RepositoryError> {
        let state = self.inner.state.read().await;
        let mut orders: Vec<&Stored<Order>> = state
            .orders
            .values()
            .filter(|stored| match scope {
                OrderScope::All => true,
                OrderScope::OwnedBy(user_id) => stored.value.is_owned_by(user_id),
            })
            .collect();
        // 作成日時の降順（同時刻は後に保存したものを先に）
        orders.sort_by(|a, b| {
            b.value
                .created_at()
                .cmp(&a.value.created_at())
                .then(b.seq.cmp(&a.seq))
        });

        orders
            .into_iter()
            .map(|stored| state.order_details(&stored.value))
            .collect()
    }

    async fn transition_status(
        &self,
        order_id: OrderId,
        from: OrderStatus,
        to: OrderStatus,
    ) -> Result<bool, RepositoryError> {
        let mut state = self.inner.state.write().await;
        let Some(stored) = state.orders.get_mut(&order_id) else {
            return Ok(false);
        };
        if stored.value.status() != from {
            return Ok(false);
        }
        let order = &stored.value;
        stored.value = Order::reconstruct(
            order.id(),
            order.user_id(),
            order.total_price(),
            to,
            order.created_at(),
            order.items().to_vec(),
        );
        Ok(true)
    }
}

#[async_trait]
impl LedgerStore for InMemoryStore {
    async fn begin(&self) -> Result<Box<dyn LedgerTransaction>, RepositoryError> {
        Ok(Box::new(InMemoryLedgerTransaction {
            store: self.clone(),
            held_locks: HashMap::new(),
            staged_stock: HashMap::new(),
            staged_order: None,
            staged_items: Vec::new(),
            staged_total: None,
        }))
    }
}

/// インメモリ台帳トランザクション
/// 書き込みはコミットまでトランザクション内に保留される
/// 破棄されると保留中の書き込みは捨てられ、書籍ロックも解放される
struct InMemoryLedgerTransaction {
    store: InMemoryStore,
    held_locks: HashMap<BookId, OwnedMutexGuard<()>>,
    staged_stock: HashMap<BookId, u32>,
    staged_order: Option<Order>,
    staged_items: Vec<OrderItem>,
    staged_total: Option<Money>,
}

impl InMemoryLedgerTransaction {
    fn staged_order_id(&self) -> Result<OrderId, RepositoryError> {
        self.staged_order
            .as_ref()
            .map(|order| order.id())
            .ok_or_else(|| {
                RepositoryError::OperationFailed("no order inserted in this transaction".to_string())
            })
    }
}

#[async_trait]
impl LedgerTransaction for InMemoryLedgerTransaction {
    async fn insert_order(&mut self, order: &Order) -> Result<(), RepositoryError> {
        let state = self.store.inner.state.read().await;
        if state.orders.contains_key(&order.id()) || self.staged_order.is_some() {
            return Err(RepositoryError::Conflict(format!(
                "duplicate order: {}",
                order.id()
            )));
        }
        if !state.users.contains_key(&order.user_id()) {
            return Err(RepositoryError::Conflict(format!(
                "unknown user: {}",
                order.user_id()
            )));
        }
        drop(state);

        self.staged_order = Some(order.clone());
        Ok(())
    }

    async fn lock_book(&mut self, book_id: BookId) -> Result<Option<Book>, RepositoryError> {
        if !self.held_locks.contains_key(&book_id) {
            let lock = self.store.book_lock(book_id).await;
            let guard = lock.lock_owned().await;
            self.held_locks.insert(book_id, guard);
        }

        let state = self.store.inner.state.read().await;
        let Some(stored) = state.books.get(&book_id) else {
            drop(state);
            // 存在しない行のロックは保持しない
            self.held_locks.remove(&book_id);
            self.store.forget_book_lock(book_id).await;
            return Ok(None);
        };
        let book = &stored.value;
        let stock = self
            .staged_stock
            .get(&book_id)
            .copied()
            .unwrap_or_else(|| book.stock());

        Ok(Some(Book::reconstruct(
            book.id(),
            book.title().to_string(),
            book.author().to_string(),
            book.price(),
            stock,
            book.year(),
            book.category_id(),
        )))
    }

    async fn update_book_stock(
        &mut self,
        book_id: BookId,
        stock: u32,
    ) -> Result<(), RepositoryError> {
        if !self.held_locks.contains_key(&book_id) {
            return Err(RepositoryError::OperationFailed(format!(
                "book {} is not locked by this transaction",
                book_id
            )));
        }
        self.staged_stock.insert(book_id, stock);
        Ok(())
    }

    async fn insert_order_item(&mut self, item: &OrderItem) -> Result<(), RepositoryError> {
        if item.order_id() != self.staged_order_id()? {
            return Err(RepositoryError::Conflict(format!(
                "unknown order: {}",
                item.order_id()
            )));
        }
        self.staged_items.push(item.clone());
        Ok(())
    }

    async fn update_order_total(
        &mut self,
        order_id: OrderId,
        total_price: Money,
    ) -> Result<(), RepositoryError> {
        if order_id != self.staged_order_id()? {
            return Err(RepositoryError::OperationFailed(format!(
                "order {} is not part of this transaction",
                order_id
            )));
        }
        self.staged_total = Some(total_price);
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), RepositoryError> {
        let this = *self;
        let mut state = this.store.inner.state.write().await;

        // すべての書き込みが適用できることを確認してから反映する
        if let Some(book_id) = this
            .staged_stock
            .keys()
            .find(|book_id| !state.books.contains_key(book_id))
        {
            return Err(RepositoryError::OperationFailed(format!(
                "book {} vanished",
                book_id
            )));
        }
        if let Some(order) = &this.staged_order {
            if !state.users.contains_key(&order.user_id()) {
                return Err(RepositoryError::Conflict(format!(
                    "unknown user: {}",
                    order.user_id()
                )));
            }
        }

        for (book_id, stock) in &this.staged_stock {
            let Some(stored) = state.books.get_mut(book_id) else {
                continue;
            };
            let book = &stored.value;
            stored.value = Book::reconstruct(
                book.id(),
                book.title().to_string(),
                book.author().to_string(),
                book.price(),
                *stock,
                book.year(),
                book.category_id(),
            );
        }

        if let Some(order) = &this.staged_order {
            let order = Order::reconstruct(
                order.id(),
                order.user_id(),
                this.staged_total.unwrap_or_else(|| order.total_price()),
                order.status(),
                order.created_at(),
                this.staged_items.clone(),
            );
            let seq = state.next_seq();
            state.orders.insert(order.id(), Stored { value: order, seq });
        }

        // 書き込みを反映してからロックを解放する
        drop(state);
        drop(this.held_locks);
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), RepositoryError> {
        // 保留中の書き込みとロックを破棄する
        drop(self);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::Role;
    use rust_decimal::Decimal;

    async fn seed_book(store: &InMemoryStore, stock: u32) -> Book {
        let category = Category::new(CategoryId::new(), format!("cat-{}", CategoryId::new())).unwrap();
        CategoryRepository::insert(store, &category).await.unwrap();
        let book = Book::new(
            BookId::new(),
            "Cantik Itu Luka".to_string(),
            "Eka Kurniawan".to_string(),
            Money::new(Decimal::new(1500, 2)).unwrap(),
            stock,
            2002,
            category.id(),
        )
        .unwrap();
        BookRepository::insert(store, &book).await.unwrap();
        book
    }

    async fn seed_user(store: &InMemoryStore) -> User {
        let id = UserId::new();
        let user = User::register(
            id,
            "Reader".to_string(),
            format!("{}@example.com", id),
            "hash".to_string(),
            Role::User,
        )
        .unwrap();
        UserRepository::insert(store, &user).await.unwrap();
        user
    }

    #[tokio::test]
    async fn test_uncommitted_writes_are_discarded() {
        let store = InMemoryStore::new();
        let book = seed_book(&store, 5).await;
        let user = seed_user(&store).await;

        let mut tx = store.begin().await.unwrap();
        tx.insert_order(&Order::new(OrderId::new(), user.id()))
            .await
            .unwrap();
        tx.lock_book(book.id()).await.unwrap();
        tx.update_book_stock(book.id(), 1).await.unwrap();
        tx.rollback().await.unwrap();

        let stored = BookRepository::find_by_id(&store, book.id()).await.unwrap().unwrap();
        assert_eq!(stored.stock(), 5);
        assert_eq!(store.order_count().await, 0);
    }

    #[tokio::test]
    async fn test_commit_applies_staged_writes() {
        let store = InMemoryStore::new();
        let book = seed_book(&store, 5).await;
        let user = seed_user(&store).await;

        let mut tx = store.begin().await.unwrap();
        let order = Order::new(OrderId::new(), user.id());
        tx.insert_order(&order).await.unwrap();
        let locked = tx.lock_book(book.id()).await.unwrap().unwrap();
        assert_eq!(locked.stock(), 5);
        tx.update_book_stock(book.id(), 2).await.unwrap();

        // 同じトランザクション内では保留中の在庫数が見える
        let relocked = tx.lock_book(book.id()).await.unwrap().unwrap();
        assert_eq!(relocked.stock(), 2);
        tx.commit().await.unwrap();

        let stored = BookRepository::find_by_id(&store, book.id()).await.unwrap().unwrap();
        assert_eq!(stored.stock(), 2);
        assert_eq!(store.order_count().await, 1);
    }

    #[tokio::test]
    async fn test_update_without_lock_fails() {
        let store = InMemoryStore::new();
        let book = seed_book(&store, 5).await;

        let mut tx = store.begin().await.unwrap();
        let result = tx.update_book_stock(book.id(), 1).await;
        assert!(matches!(result, Err(RepositoryError::OperationFailed(_))));
    }

    #[tokio::test]
    async fn test_lock_is_released_when_transaction_is_dropped() {
        let store = InMemoryStore::new();
        let book = seed_book(&store, 5).await;

        let mut first = store.begin().await.unwrap();
        first.lock_book(book.id()).await.unwrap();
        drop(first);

        let mut second = store.begin().await.unwrap();
        let locked = tokio::time::timeout(
            std::time::Duration::from_secs(1),
            second.lock_book(book.id()),
        )
        .await;
        assert!(locked.is_ok());
    }

    #[tokio::test]
    async fn test_book_delete_waits_for_locking_transaction() {
        let store = InMemoryStore::new();
        let book = seed_book(&store, 5).await;
        let other = seed_book(&store, 5).await;
        let user = seed_user(&store).await;

        let mut tx = store.begin().await.unwrap();
        let mut order = Order::new(OrderId::new(), user.id());
        tx.insert_order(&order).await.unwrap();
        for id in [book.id(), other.id()] {
            let mut locked = tx.lock_book(id).await.unwrap().unwrap();
            locked.reserve_stock(1).unwrap();
            tx.update_book_stock(id, locked.stock()).await.unwrap();
            let item = order.add_item(&locked, 1).unwrap();
            tx.insert_order_item(&item).await.unwrap();
        }

        let deleter = {
            let store = store.clone();
            let book_id = book.id();
            tokio::spawn(async move { BookRepository::delete(&store, book_id).await })
        };
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        assert!(!deleter.is_finished());

        tx.commit().await.unwrap();

        // コミット後は注文明細から参照されているため削除できない
        let result = deleter.await.unwrap();
        assert!(matches!(result, Err(RepositoryError::Conflict(_))));
        assert_eq!(store.total_stock().await, 8);
        assert_eq!(store.order_count().await, 1);
    }

    #[tokio::test]
    async fn test_unknown_and_deleted_books_leave_no_lock_entries() {
        let store = InMemoryStore::new();
        let book = seed_book(&store, 5).await;

        let mut tx = store.begin().await.unwrap();
        assert!(tx.lock_book(BookId::new()).await.unwrap().is_none());
        tx.rollback().await.unwrap();
        assert!(store.inner.book_locks.lock().await.is_empty());

        assert!(BookRepository::delete(&store, book.id()).await.unwrap());
        assert!(store.inner.book_locks.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_delete_referenced_category_conflicts() {
        let store = InMemoryStore::new();
        let book = seed_book(&store, 1).await;

        let result = CategoryRepository::delete(&store, book.category_id()).await;
        assert!(matches!(result, Err(RepositoryError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_duplicate_email_conflicts() {
        let store = InMemoryStore::new();
        let user = seed_user(&store).await;
        let duplicate = User::register(
            UserId::new(),
            "Other".to_string(),
            user.email().to_string(),
            "hash".to_string(),
            Role::User,
        )
        .unwrap();

        let result = UserRepository::insert(&store, &duplicate).await;
        assert!(matches!(result, Err(RepositoryError::Conflict(_))));
    }
}
