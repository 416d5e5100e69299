//! IPEX スクレイパーライブラリ
//!
//! - IPEX検索ページで「理由付き意見あり」の文書に絞り込み、全件を読み込む
//! - 文書ごとのメタデータと、意見を出した議会の一覧をCSVに出力
//! - 議会ごとの添付ファイルを `<出力先>/<文書コード>/<議会名>/` に保存
//!
//! # 使用例
//!
//! ```rust,ignore
//! use ipex_scraper::{ScrapeRequest, ScraperService};
//! use tower::Service;
//!
//! #[tokio::main]
//! async fn main() {
//!     let mut service = ScraperService::new();
//!
//!     let request = ScrapeRequest::new("./Wetsvoorstellen")
//!         .with_export_path("./ipex_results.csv")
//!         .with_headless(false);
//!
//!     let report = service.call(request).await.unwrap();
//!     println!("Documents: {}", report.stats.documents);
//! }
//! ```
//!
//! # 個別に組み立てる場合
//!
//! ```rust,ignore
//! use ipex_scraper::{ChromeSession, HttpFetcher, IpexScraper, ScraperConfig};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = ScraperConfig::from_env().unwrap();
//!     let session = ChromeSession::launch(&config).await.unwrap();
//!     let scraper = IpexScraper::new(config, session, HttpFetcher::new().unwrap());
//!     let report = scraper.run().await.unwrap();
//!     println!("Exported to {:?}", report.export_path);
//! }
//! ```

pub mod browser;
pub mod config;
pub mod download;
pub mod error;
pub mod export;
pub mod ipex;
pub mod locator;
pub mod service;
pub mod traits;

#[cfg(test)]
pub(crate) mod testing;

// 主要な型をリエクスポート
pub use browser::ChromeSession;
pub use config::{RetryPolicy, ScraperConfig, Timing};
pub use download::{DownloadTarget, Downloader, HttpFetcher};
pub use error::ScraperError;
pub use export::ExportTable;
pub use service::{ScrapeRequest, ScraperService};
pub use traits::{Fetch, Session};

pub use ipex::{DocumentRecord, IpexScraper, Outcome, ParliamentRecord, PortalLayout, RunReport};
