// 出力ポート
// ドメイン層が外部に依存する機能をトレイトとして定義
// アダプター層でこれらのトレイトを実装する

use crate::domain::model::{
    Book, BookDetails, BookId, BookPage, BookQuery, Category, CategoryId, Identity, Money, Order,
    OrderDetails, OrderId, OrderItem, OrderStatus, User, UserId,
};
use async_trait::async_trait;
use std::time::Duration;

/// リポジトリエラー型
/// 永続化層で発生するエラーを表現する
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RepositoryError {
    /// データベース接続に失敗
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),
    /// 操作に失敗（デッドロックを含む）
    #[error("Operation failed: {0}")]
    OperationFailed(String),
    /// データの取得・復元に失敗
    #[error("Fetch failed: {0}")]
    FetchFailed(String),
    /// 一意制約・外部キー制約違反
    #[error("Conflict: {0}")]
    Conflict(String),
    /// トランザクションが制限時間内に完了しなかった
    #[error("Transaction timed out after {0:?}")]
    Timeout(Duration),
}

/// 注文一覧の取得範囲
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderScope {
    /// すべての注文
    All,
    /// 指定ユーザーの注文のみ
    OwnedBy(UserId),
}

/// 書籍リポジトリトレイト
#[async_trait]
pub trait BookRepository: Send + Sync {
    /// 書籍を新規登録する（初期在庫を含む）
    async fn insert(&self, book: &Book) -> Result<(), RepositoryError>;

    /// 書籍の属性を更新する
    /// 在庫数は更新しない（在庫は注文トランザクションのみが変更する）
    async fn update_details(&self, book: &Book) -> Result<(), RepositoryError>;

    /// 書籍IDで書籍を検索する
    async fn find_by_id(&self, book_id: BookId) -> Result<Option<Book>, RepositoryError>;

    /// カテゴリを展開した書籍を検索する
    async fn find_details(&self, book_id: BookId) -> Result<Option<BookDetails>, RepositoryError>;

    /// 条件に一致する書籍を新しい順にページ単位で取得する
    async fn search(&self, query: &BookQuery) -> Result<BookPage, RepositoryError>;

    /// 書籍を削除する
    ///
    /// # Returns
    /// * `Ok(true)` - 削除した
    /// * `Ok(false)` - 存在しなかった
    /// * `Err(RepositoryError::Conflict)` - 注文明細から参照されている
    async fn delete(&self, book_id: BookId) -> Result<bool, RepositoryError>;
}

/// カテゴリリポジトリトレイト
#[async_trait]
pub trait CategoryRepository: Send + Sync {
    /// カテゴリを新規登録する（名前重複は `Conflict`）
    async fn insert(&self, category: &Category) -> Result<(), RepositoryError>;

    /// カテゴリ名を更新する（名前重複は `Conflict`）
    async fn update(&self, category: &Category) -> Result<(), RepositoryError>;

    async fn find_by_id(&self, category_id: CategoryId)
        -> Result<Option<Category>, RepositoryError>;

    /// すべてのカテゴリを名前順で取得する
    async fn find_all(&self) -> Result<Vec<Category>, RepositoryError>;

    /// カテゴリを削除する（書籍から参照されている場合は `Conflict`）
    async fn delete(&self, category_id: CategoryId) -> Result<bool, RepositoryError>;
}

/// ユーザーリポジトリトレイト
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// ユーザーを新規登録する（メールアドレス重複は `Conflict`）
    async fn insert(&self, user: &User) -> Result<(), RepositoryError>;

    async fn find_by_id(&self, user_id: UserId) -> Result<Option<User>, RepositoryError>;

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, RepositoryError>;
}

/// 注文リポジトリトレイト（読み取りと単一行の状態遷移）
#[async_trait]
pub trait OrderRepository: Send + Sync {
    /// 注文IDで注文（明細を含む）を検索する
    async fn find_by_id(&self, order_id: OrderId) -> Result<Option<Order>, RepositoryError>;

    /// 注文者・明細・書籍・カテゴリを展開した注文を検索する
    async fn find_details(
        &self,
        order_id: OrderId,
    ) -> Result<Option<OrderDetails>, RepositoryError>;

    /// 範囲内の注文を作成日時の降順で取得する
    async fn list_details(&self, scope: OrderScope) -> Result<Vec<OrderDetails>, RepositoryError>;

    /// 現在のステータスが `from` の場合のみ `to` に更新する
    ///
    /// # Returns
    /// * `Ok(true)` - 更新した
    /// * `Ok(false)` - 注文が存在しないか、ステータスが `from` ではなかった
    async fn transition_status(
        &self,
        order_id: OrderId,
        from: OrderStatus,
        to: OrderStatus,
    ) -> Result<bool, RepositoryError>;
}

/// 台帳ストア
/// 注文作成のためのトランザクションを開始する
#[async_trait]
pub trait LedgerStore: Send + Sync {
    async fn begin(&self) -> Result<Box<dyn LedgerTransaction>, RepositoryError>;
}

/// 台帳トランザクション
/// commit されずに破棄された場合はすべての変更が取り消され、行ロックも解放される
#[async_trait]
pub trait LedgerTransaction: Send {
    /// 注文行を挿入する
    async fn insert_order(&mut self, order: &Order) -> Result<(), RepositoryError>;

    /// 書籍行を排他ロック付きで取得する（SELECT ... FOR UPDATE 相当）
    /// ロックはトランザクション終了まで保持される
    async fn lock_book(&mut self, book_id: BookId) -> Result<Option<Book>, RepositoryError>;

    /// ロック済みの書籍の在庫数を更新する
    async fn update_book_stock(&mut self, book_id: BookId, stock: u32)
        -> Result<(), RepositoryError>;

    /// 注文明細行を挿入する
    async fn insert_order_item(&mut self, item: &OrderItem) -> Result<(), RepositoryError>;

    /// 注文の合計金額を更新する
    async fn update_order_total(
        &mut self,
        order_id: OrderId,
        total_price: Money,
    ) -> Result<(), RepositoryError>;

    async fn commit(self: Box<Self>) -> Result<(), RepositoryError>;

    async fn rollback(self: Box<Self>) -> Result<(), RepositoryError>;
}

/// 認証エラー
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AuthError {
    /// トークンが不正・期限切れ
    #[error("provided token is invalid")]
    InvalidToken,
    /// トークンの発行に失敗
    #[error("could not create token: {0}")]
    TokenIssueFailed(String),
    /// パスワードハッシュの生成に失敗
    #[error("could not hash password: {0}")]
    HashingFailed(String),
}

/// 発行済みアクセストークン
#[derive(Debug, Clone, PartialEq)]
pub struct AccessToken {
    pub token: String,
    /// 有効期限までの秒数
    pub expires_in: i64,
}

/// アイデンティティプロバイダー
/// 署名付き・期限付きトークンの発行と検証を抽象化する
pub trait IdentityProvider: Send + Sync {
    fn issue_token(&self, user: &User) -> Result<AccessToken, AuthError>;

    /// トークンの署名と有効期限を検証し、利用者を返す
    fn authenticate(&self, token: &str) -> Result<Identity, AuthError>;
}

/// パスワードハッシュ
pub trait PasswordHasher: Send + Sync {
    fn hash(&self, password: &str) -> Result<String, AuthError>;

    fn verify(&self, password: &str, password_hash: &str) -> bool;
}
