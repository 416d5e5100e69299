use url::Url;

use crate::config::ScraperConfig;
use crate::download::Downloader;
use crate::error::ScraperError;

/// 抽出処理が共有する読み取り専用の依存
pub struct ScrapeContext<'a, F> {
    pub config: &'a ScraperConfig,
    pub downloader: &'a Downloader<F>,
    /// 相対hrefの解決基準
    pub base_url: Url,
}

impl<'a, F> ScrapeContext<'a, F> {
    pub fn new(
        config: &'a ScraperConfig,
        downloader: &'a Downloader<F>,
    ) -> Result<Self, ScraperError> {
        Ok(Self {
            config,
            downloader,
            base_url: Url::parse(&config.portal_url)?,
        })
    }

    /// hrefを絶対URLにする。空なら `None`
    pub fn absolute(&self, href: &str) -> Result<Option<String>, ScraperError> {
        let href = href.trim();
        if href.is_empty() {
            return Ok(None);
        }
        Ok(Some(self.base_url.join(href)?.to_string()))
    }
}
