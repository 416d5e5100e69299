//! IPEX スクレイパー実装
//!
//! フィルタ設定 → 全結果の読み込み → 文書ごとの抽出（議会ページ・添付ファイルを含む）
//! → CSV出力 の順に実行する。

use std::collections::HashSet;

use chrono::Utc;
use tracing::{debug, error, info, warn};

use crate::config::ScraperConfig;
use crate::download::Downloader;
use crate::error::ScraperError;
use crate::export::ExportTable;
use crate::traits::{Fetch, Session};

use super::context::ScrapeContext;
use super::types::{DocumentRecord, Outcome, ResultLink, RunReport, RunStats};
use super::{document, filters, paginator};

pub struct IpexScraper<S, F> {
    config: ScraperConfig,
    session: S,
    downloader: Downloader<F>,
}

impl<S, F> IpexScraper<S, F>
where
    S: Session,
    F: Fetch,
{
    pub fn new(config: ScraperConfig, session: S, fetcher: F) -> Self {
        let downloader = Downloader::new(fetcher, config.retry.clone());
        Self {
            config,
            session,
            downloader,
        }
    }

    /// 一括実行。途中で失敗しても、ブラウザを閉じてから収集済みの分をCSVに出力する。
    /// エラーを返すのはCSVの書き込みに失敗した場合のみ
    pub async fn run(mut self) -> Result<RunReport, ScraperError> {
        let started_at = Utc::now();
        let mut records = Vec::new();
        let mut stats = RunStats::default();

        if let Err(e) = self.traverse(&mut records, &mut stats).await {
            error!("Scrape stopped early: {}", e);
        }

        if let Err(e) = self.session.close().await {
            warn!("Failed to release browser session: {}", e);
        }

        ExportTable::new(records).write(&self.config.export_path)?;

        let report = RunReport {
            stats,
            export_path: self.config.export_path.clone(),
            started_at,
            finished_at: Utc::now(),
        };
        info!(
            "Scrape finished: {} documents ({} skipped, {} failed), {} parliaments, downloads {} written / {} skipped / {} failed, exported to {:?} in {}s",
            report.stats.documents,
            report.stats.documents_skipped,
            report.stats.documents_failed,
            report.stats.parliaments,
            report.stats.downloads_written,
            report.stats.downloads_skipped,
            report.stats.downloads_failed,
            report.export_path,
            (report.finished_at - report.started_at).num_seconds()
        );
        Ok(report)
    }

    async fn traverse(
        &mut self,
        records: &mut Vec<DocumentRecord>,
        stats: &mut RunStats,
    ) -> Result<(), ScraperError> {
        let ctx = ScrapeContext::new(&self.config, &self.downloader)?;
        let session = &mut self.session;

        session.goto(&ctx.config.portal_url).await?;
        session.settle(ctx.config.timing.page_settle).await;

        filters::configure(session, ctx.config).await?;
        let harvested = paginator::collect_all_links(session, ctx.config).await?;
        let links = distinct(harvested);
        stats.links = links.len();

        for (i, link) in links.iter().enumerate() {
            info!("Document {}/{}: {}", i + 1, links.len(), link);
            match document::extract(session, &ctx, link, stats).await {
                Outcome::Done(record) => {
                    stats.documents += 1;
                    records.push(record);
                }
                Outcome::Skipped(reason) => {
                    stats.documents_skipped += 1;
                    info!("Skipped {}: {}", link, reason);
                }
                Outcome::Failed(reason) => {
                    stats.documents_failed += 1;
                    warn!("Failed {}: {}", link, reason);
                }
            }
        }

        Ok(())
    }
}

/// 同じ詳細ページへのリンクは最初の1件だけ残す（順序は維持）
fn distinct(links: Vec<ResultLink>) -> Vec<ResultLink> {
    let mut seen = HashSet::new();
    let total = links.len();
    let links: Vec<ResultLink> = links
        .into_iter()
        .filter(|link| seen.insert(link.as_str().to_string()))
        .collect();
    if links.len() < total {
        debug!("Dropped {} duplicate result links", total - links.len());
    }
    links
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{RetryPolicy, Timing};
    use crate::locator::Anchor;
    use crate::testing::{FakeElement, FakeFetcher, FakePage, FakeSession};
    use std::path::Path;
    use std::sync::Arc;
    use std::time::Duration;

    const SEARCH: &str = "https://ipex.eu/IPEXL-WEB/search/document/results";
    const DOC_A: &str = "https://ipex.eu/IPEXL-WEB/document/COM-2023-0123";
    const DOC_B: &str = "https://ipex.eu/IPEXL-WEB/document/COM-2023-0456";
    const NL_A: &str = "https://ipex.eu/IPEXL-WEB/scrutiny/NLTK/COM-2023-0123";

    fn config(dir: &Path) -> ScraperConfig {
        ScraperConfig::new(dir.join("Wetsvoorstellen"))
            .with_export_path(dir.join("ipex_results.csv"))
            .with_timing(Timing::immediate())
            .with_retry(RetryPolicy::new(3, Duration::ZERO))
    }

    fn search_page(config: &ScraperConfig) -> FakePage {
        let layout = &config.layout;
        layout
            .filter_steps
            .iter()
            .fold(FakePage::new(), |page, step| {
                page.with_element(&step.target, FakeElement::text(step.name.clone()))
            })
            .with_anchors(
                &layout.result_links,
                vec![Anchor::new("/IPEXL-WEB/document/COM-2023-0123")],
            )
            .with_load_more(
                &layout.load_more,
                &layout.result_links,
                1,
                vec![vec![Anchor::new("/IPEXL-WEB/document/COM-2023-0456")]],
            )
    }

    fn portal(config: &ScraperConfig) -> FakeSession {
        let layout = &config.layout;
        let doc_a = FakePage::new()
            .with_text(&layout.document_title.selector, "COM(2023)0123")
            .with_text(&layout.reasoned_opinion_count.selector, "1")
            .with_anchors(
                &layout.parliament_links,
                vec![Anchor::new("/IPEXL-WEB/scrutiny/NLTK/COM-2023-0123")],
            );
        let doc_b = FakePage::new().with_text(&layout.document_title.selector, "COM/2023/0456");
        let nl = FakePage::new()
            .with_text(&layout.parliament_name.selector, "Tweede Kamer")
            .with_text(&layout.reasoned_opinion_date.selector, "20/04/2023")
            .with_element(
                &layout.linked_files_toggle.selector,
                FakeElement::text("Gekoppelde bestanden").with_attribute("aria-expanded", "false"),
            )
            .with_anchors(
                &layout.linked_files,
                vec![
                    Anchor::new("/IPEXL-WEB/download/1").with_title("brief.pdf"),
                    Anchor::new("/IPEXL-WEB/download/2").with_title("bijlage.pdf"),
                ],
            )
            .with_anchors(
                &layout.opinion_files,
                vec![Anchor::new("/IPEXL-WEB/download/3").with_text("advies.pdf")],
            );

        FakeSession::new()
            .with_page(SEARCH, search_page(config))
            .with_page(DOC_A, doc_a)
            .with_page(DOC_B, doc_b)
            .with_page(NL_A, nl)
    }

    fn subfolders(path: &Path) -> usize {
        std::fs::read_dir(path)
            .map(|entries| {
                entries
                    .filter_map(Result::ok)
                    .filter(|e| e.path().is_dir())
                    .count()
            })
            .unwrap_or(0)
    }

    #[tokio::test]
    async fn test_end_to_end_two_documents() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        let fetcher = Arc::new(FakeFetcher::new());
        let scraper = IpexScraper::new(config.clone(), portal(&config), fetcher.clone());

        let report = scraper.run().await.unwrap();

        assert_eq!(report.stats.documents, 2);
        assert_eq!(report.stats.parliaments, 1);
        assert_eq!(fetcher.calls().len(), 3);
        assert_eq!(report.stats.downloads_written, 3);

        let mut reader = csv::Reader::from_path(&config.export_path).unwrap();
        let rows: Vec<csv::StringRecord> = reader.records().map(Result::unwrap).collect();
        assert_eq!(rows.len(), 2);
        assert_eq!(&rows[0][0], "COM(2023)0123");
        assert_eq!(&rows[0][2], "1");
        assert_eq!(
            &rows[0][9],
            r#"[{"Parliament Name":"Tweede Kamer","Reasoned Opinion Date":"20/04/2023"}]"#
        );
        assert_eq!(&rows[1][0], "COM-2023-0456");
        assert_eq!(&rows[1][2], "0");
        assert_eq!(&rows[1][9], "[]");
        for row in &rows {
            assert!(!row[0].contains('/'));
        }

        let doc_folder = config.output_dir.join("COM(2023)0123");
        assert_eq!(subfolders(&doc_folder), 1);
        assert_eq!(subfolders(&config.output_dir.join("COM-2023-0456")), 0);
        let nl_folder = doc_folder.join("Tweede Kamer");
        assert_eq!(std::fs::read_dir(nl_folder).unwrap().count(), 3);
    }

    #[tokio::test]
    async fn test_repeated_result_link_is_scraped_once() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        let layout = &config.layout;
        let search = layout
            .filter_steps
            .iter()
            .fold(FakePage::new(), |page, step| {
                page.with_element(&step.target, FakeElement::text(step.name.clone()))
            })
            .with_anchors(
                &layout.result_links,
                vec![
                    Anchor::new("/IPEXL-WEB/document/COM-2023-0123"),
                    Anchor::new("/IPEXL-WEB/document/COM-2023-0456"),
                    Anchor::new(DOC_A),
                ],
            );
        let session = portal(&config).with_page(SEARCH, search);
        let fetcher = Arc::new(FakeFetcher::new());
        let scraper = IpexScraper::new(config.clone(), session, fetcher.clone());

        let report = scraper.run().await.unwrap();

        assert_eq!(report.stats.links, 2);
        assert_eq!(report.stats.documents, 2);
        assert_eq!(fetcher.calls().len(), 3);
        let mut reader = csv::Reader::from_path(&config.export_path).unwrap();
        let codes: Vec<String> = reader
            .records()
            .map(|r| r.unwrap()[0].to_string())
            .collect();
        assert_eq!(codes, vec!["COM(2023)0123", "COM-2023-0456"]);
        let nl_folder = config.output_dir.join("COM(2023)0123").join("Tweede Kamer");
        assert_eq!(std::fs::read_dir(nl_folder).unwrap().count(), 3);
    }

    #[test]
    fn test_distinct_keeps_first_seen_order() {
        let links = vec![
            ResultLink(DOC_B.into()),
            ResultLink(DOC_A.into()),
            ResultLink(DOC_B.into()),
        ];
        assert_eq!(
            distinct(links),
            vec![ResultLink(DOC_B.into()), ResultLink(DOC_A.into())]
        );
    }

    #[tokio::test]
    async fn test_filter_failure_still_exports_and_closes() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        let session = FakeSession::new().with_page(SEARCH, FakePage::new());
        let fetcher = Arc::new(FakeFetcher::new());
        let scraper = IpexScraper::new(config.clone(), session, fetcher.clone());

        let report = scraper.run().await.unwrap();

        assert_eq!(report.stats.documents, 0);
        assert!(fetcher.calls().is_empty());
        let contents = std::fs::read_to_string(&config.export_path).unwrap();
        assert_eq!(contents.lines().count(), 1);
    }

    #[tokio::test]
    async fn test_session_is_released() {
        struct Probe {
            inner: FakeSession,
            closed: Arc<std::sync::atomic::AtomicBool>,
        }

        #[async_trait::async_trait]
        impl Session for Probe {
            async fn goto(&mut self, url: &str) -> Result<(), ScraperError> {
                self.inner.goto(url).await
            }
            async fn wait_for(
                &mut self,
                selector: &crate::locator::Selector,
                condition: crate::locator::Condition,
                timeout: Duration,
            ) -> Result<(), ScraperError> {
                self.inner.wait_for(selector, condition, timeout).await
            }
            async fn read(
                &mut self,
                selector: &crate::locator::Selector,
                read: &crate::locator::Read,
            ) -> Result<Option<String>, ScraperError> {
                self.inner.read(selector, read).await
            }
            async fn anchors(
                &mut self,
                selector: &crate::locator::Selector,
            ) -> Result<Vec<Anchor>, ScraperError> {
                self.inner.anchors(selector).await
            }
            async fn click(
                &mut self,
                selector: &crate::locator::Selector,
                mode: crate::locator::ClickMode,
            ) -> Result<(), ScraperError> {
                self.inner.click(selector, mode).await
            }
            async fn scroll_into_view(
                &mut self,
                selector: &crate::locator::Selector,
            ) -> Result<(), ScraperError> {
                self.inner.scroll_into_view(selector).await
            }
            async fn settle(&mut self, _delay: Duration) {}
            async fn close(&mut self) -> Result<(), ScraperError> {
                self.closed.store(true, std::sync::atomic::Ordering::SeqCst);
                self.inner.close().await
            }
        }

        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        let closed = Arc::new(std::sync::atomic::AtomicBool::new(false));
        // 検索ページがないので最初の遷移で失敗する
        let probe = Probe {
            inner: FakeSession::new(),
            closed: closed.clone(),
        };

        IpexScraper::new(config, probe, Arc::new(FakeFetcher::new()))
            .run()
            .await
            .unwrap();

        assert!(closed.load(std::sync::atomic::Ordering::SeqCst));
    }
}
