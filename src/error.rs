use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScraperError {
    #[error("ブラウザ初期化エラー: {0}")]
    BrowserInit(String),

    #[error("ナビゲーションエラー: {0}")]
    Navigation(String),

    #[error("タイムアウト: {0}")]
    Timeout(String),

    #[error("要素が見つかりません: {0}")]
    ElementNotFound(String),

    #[error("JavaScript実行エラー: {0}")]
    JavaScript(String),

    #[error("レート制限 (HTTP 429): {0}")]
    RateLimited(String),

    #[error("HTTPステータスエラー: {0}")]
    HttpStatus(u16),

    #[error("ダウンロードエラー: {0}")]
    Download(String),

    #[error("設定エラー: {0}")]
    Config(String),

    #[error("ファイル操作エラー: {0}")]
    FileIO(#[from] std::io::Error),

    #[error("CSV出力エラー: {0}")]
    Export(#[from] csv::Error),

    #[error("シリアライズエラー: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("URL解析エラー: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

impl ScraperError {
    /// バックオフ付きで再試行すべきエラーか
    pub fn is_retryable(&self) -> bool {
        matches!(self, ScraperError::RateLimited(_))
    }
}
