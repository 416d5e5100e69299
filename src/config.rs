use std::path::PathBuf;
use std::time::Duration;

use crate::error::ScraperError;
use crate::ipex::PortalLayout;

pub const DEFAULT_PORTAL_URL: &str = "https://ipex.eu/IPEXL-WEB/search/document/results";

#[derive(Debug, Clone)]
pub struct ScraperConfig {
    /// 検索ページのURL（相対hrefの解決にも使う）
    pub portal_url: String,
    /// 添付ファイルの保存先ルート
    pub output_dir: PathBuf,
    /// CSVの出力先
    pub export_path: PathBuf,
    pub headless: bool,
    pub debug: bool,
    /// Chrome 実行ファイル
    pub chrome_path: Option<String>,
    /// 「さらに読み込む」のクリック上限
    pub max_load_more: Option<usize>,
    pub timing: Timing,
    pub retry: RetryPolicy,
    pub layout: PortalLayout,
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            portal_url: DEFAULT_PORTAL_URL.to_string(),
            output_dir: PathBuf::from("./Wetsvoorstellen"),
            export_path: PathBuf::from("./ipex_results.csv"),
            headless: true,
            debug: false,
            chrome_path: None,
            max_load_more: None,
            timing: Timing::default(),
            retry: RetryPolicy::default(),
            layout: PortalLayout::default(),
        }
    }
}

impl ScraperConfig {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            ..Default::default()
        }
    }

    /// 環境変数から読み込む
    pub fn from_env() -> Result<Self, ScraperError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup<F>(lookup: F) -> Result<Self, ScraperError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(url) = lookup("IPEX_PORTAL_URL") {
            url::Url::parse(&url)
                .map_err(|e| ScraperError::Config(format!("IPEX_PORTAL_URL={}: {}", url, e)))?;
            config.portal_url = url;
        }
        if let Some(dir) = lookup("IPEX_OUTPUT_DIR") {
            config.output_dir = PathBuf::from(dir);
        }
        if let Some(path) = lookup("IPEX_EXPORT_PATH") {
            config.export_path = PathBuf::from(path);
        }
        if let Some(value) = lookup("IPEX_HEADLESS") {
            config.headless = parse_bool("IPEX_HEADLESS", &value)?;
        }
        if let Some(value) = lookup("IPEX_DEBUG") {
            config.debug = parse_bool("IPEX_DEBUG", &value)?;
        }
        if let Some(value) = lookup("IPEX_MAX_LOAD_MORE") {
            let limit = value.trim().parse::<usize>().map_err(|e| {
                ScraperError::Config(format!("IPEX_MAX_LOAD_MORE={}: {}", value, e))
            })?;
            config.max_load_more = Some(limit);
        }
        config.chrome_path = lookup("CHROME_PATH").or_else(|| lookup("CHROMIUM_PATH"));

        Ok(config)
    }

    pub fn with_portal_url(mut self, url: impl Into<String>) -> Self {
        self.portal_url = url.into();
        self
    }

    pub fn with_output_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.output_dir = path.into();
        self
    }

    pub fn with_export_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.export_path = path.into();
        self
    }

    pub fn with_headless(mut self, headless: bool) -> Self {
        self.headless = headless;
        self
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn with_max_load_more(mut self, limit: usize) -> Self {
        self.max_load_more = Some(limit);
        self
    }

    pub fn with_timing(mut self, timing: Timing) -> Self {
        self.timing = timing;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_layout(mut self, layout: PortalLayout) -> Self {
        self.layout = layout;
        self
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ScraperError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(ScraperError::Config(format!("{}={}: not a boolean", key, other))),
    }
}

/// 待機時間の設定
///
/// 待機はすべて上限値。ブラウザ側で完了を検知できれば早めに戻る。
#[derive(Debug, Clone)]
pub struct Timing {
    /// 要素待機の既定タイムアウト
    pub element_timeout: Duration,
    /// ページ遷移後
    pub page_settle: Duration,
    /// フィルタ操作後
    pub filter_settle: Duration,
    /// 「さらに読み込む」クリック後
    pub load_more_settle: Duration,
    /// スクロール後
    pub scroll_settle: Duration,
    /// 折りたたみパネル展開後
    pub panel_settle: Duration,
    /// 条件待機のポーリング間隔
    pub poll_interval: Duration,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            element_timeout: Duration::from_secs(10),
            page_settle: Duration::from_secs(2),
            filter_settle: Duration::from_secs(2),
            load_more_settle: Duration::from_secs(10),
            scroll_settle: Duration::from_secs(1),
            panel_settle: Duration::from_secs(1),
            poll_interval: Duration::from_millis(250),
        }
    }
}

impl Timing {
    /// 待機なし（テスト用）
    pub fn immediate() -> Self {
        Self {
            element_timeout: Duration::ZERO,
            page_settle: Duration::ZERO,
            filter_settle: Duration::ZERO,
            load_more_settle: Duration::ZERO,
            scroll_settle: Duration::ZERO,
            panel_settle: Duration::ZERO,
            poll_interval: Duration::from_millis(1),
        }
    }
}

/// ダウンロードのリトライ設定
///
/// 試行回数は固定、待機時間は `backoff_step × 試行番号` の線形増加。
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff_step: Duration,
    pub max_backoff: Option<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_step: Duration::from_secs(10),
            max_backoff: None,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff_step: Duration) -> Self {
        Self {
            max_attempts,
            backoff_step,
            max_backoff: None,
        }
    }

    pub fn with_max_backoff(mut self, cap: Duration) -> Self {
        self.max_backoff = Some(cap);
        self
    }

    /// `attempt` 回目（1始まり）の失敗後の待機時間
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let delay = self.backoff_step.saturating_mul(attempt);
        match self.max_backoff {
            Some(cap) => delay.min(cap),
            None => delay,
        }
    }
}
