use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::task::{Context, Poll};

use tower::Service;
use tracing::info;

use crate::browser::ChromeSession;
use crate::config::ScraperConfig;
use crate::download::HttpFetcher;
use crate::error::ScraperError;
use crate::ipex::{IpexScraper, RunReport};

/// スクレイピングリクエスト
#[derive(Debug, Clone)]
pub struct ScrapeRequest {
    pub output_dir: PathBuf,
    pub export_path: PathBuf,
    pub headless: bool,
    /// 未指定の項目はこの設定を引き継ぐ
    pub base: Option<ScraperConfig>,
}

impl ScrapeRequest {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            export_path: PathBuf::from("./ipex_results.csv"),
            headless: true,
            base: None,
        }
    }

    pub fn with_export_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.export_path = path.into();
        self
    }

    pub fn with_headless(mut self, headless: bool) -> Self {
        self.headless = headless;
        self
    }

    pub fn with_base(mut self, config: ScraperConfig) -> Self {
        self.base = Some(config);
        self
    }
}

impl From<ScrapeRequest> for ScraperConfig {
    fn from(req: ScrapeRequest) -> Self {
        req.base
            .unwrap_or_default()
            .with_output_dir(req.output_dir)
            .with_export_path(req.export_path)
            .with_headless(req.headless)
    }
}

/// tower::Serviceを実装したスクレイパーサービス
#[derive(Debug, Clone, Default)]
pub struct ScraperService {}

impl ScraperService {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Service<ScrapeRequest> for ScraperService {
    type Response = RunReport;
    type Error = ScraperError;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: ScrapeRequest) -> Self::Future {
        info!("スクレイピングリクエスト受信: output_dir={:?}", req.output_dir);

        Box::pin(async move {
            let config: ScraperConfig = req.into();
            std::fs::create_dir_all(&config.output_dir)?;

            let fetcher = HttpFetcher::new()?;
            let session = ChromeSession::launch(&config).await?;

            IpexScraper::new(config, session, fetcher).run().await
        })
    }
}
