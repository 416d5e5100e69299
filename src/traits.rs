use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::error::ScraperError;
use crate::locator::{Anchor, ClickMode, Condition, Read, Selector};

/// ブラウザセッション
///
/// 実行中ずっと1つだけ存在し、各コンポーネントへ明示的に渡される。
/// 操作はすべて単一の制御フローから順番に行う。
#[async_trait]
pub trait Session: Send {
    /// ページ遷移
    async fn goto(&mut self, url: &str) -> Result<(), ScraperError>;

    /// 条件を満たすまで待機（タイムアウト時は `ScraperError::Timeout`）
    async fn wait_for(
        &mut self,
        selector: &Selector,
        condition: Condition,
        timeout: Duration,
    ) -> Result<(), ScraperError>;

    /// 最初に一致した要素の値を読む
    async fn read(
        &mut self,
        selector: &Selector,
        read: &Read,
    ) -> Result<Option<String>, ScraperError>;

    /// 一致した全要素について、自身または最も近い祖先の `<a>` を返す（DOM順）
    async fn anchors(&mut self, selector: &Selector) -> Result<Vec<Anchor>, ScraperError>;

    /// クリック
    async fn click(&mut self, selector: &Selector, mode: ClickMode) -> Result<(), ScraperError>;

    /// 要素を表示領域にスクロール
    async fn scroll_into_view(&mut self, selector: &Selector) -> Result<(), ScraperError>;

    /// UI更新の完了を待機（`delay` は上限）
    async fn settle(&mut self, delay: Duration);

    /// `delay` だけ必ず待つ。ページの状態に関係なく間隔を空けたい場合に使う
    async fn pause(&mut self, delay: Duration) {
        tokio::time::sleep(delay).await;
    }

    /// デバッグ用スナップショット
    async fn snapshot(&mut self, _label: &str) {}

    /// リソース解放
    async fn close(&mut self) -> Result<(), ScraperError>;
}

/// HTTPレスポンス（本文はチャンク単位のストリーム）
pub struct FetchResponse {
    pub status: u16,
    pub body: BoxStream<'static, Result<Vec<u8>, ScraperError>>,
}

impl FetchResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// ファイル取得
#[async_trait]
pub trait Fetch: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<FetchResponse, ScraperError>;
}

#[async_trait]
impl<T: Fetch + ?Sized> Fetch for Arc<T> {
    async fn fetch(&self, url: &str) -> Result<FetchResponse, ScraperError> {
        (**self).fetch(url).await
    }
}
