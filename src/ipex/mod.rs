//! IPEX スクレイパーモジュール
//!
//! 理由付き意見のある法案を検索し、文書・議会ごとのデータと添付ファイルを取得する

mod context;
pub mod document;
pub mod filters;
mod layout;
pub mod paginator;
pub mod parliament;
mod scraper;
mod types;

pub use context::ScrapeContext;
pub use layout::{FilterStep, PortalLayout};
pub use scraper::IpexScraper;
pub use types::{
    sanitize_path_component, DocumentRecord, Outcome, ParliamentRecord, ResultLink, RunReport,
    RunStats,
};
