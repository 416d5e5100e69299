//! 議会ページの抽出
//!
//! 議会名と理由付き意見の日付を取得し、2種類の添付ファイルを
//! `<文書フォルダ>/<議会名>/` にダウンロードする。2つのパスは互いに独立で、
//! 片方の失敗はもう片方や他の議会の処理を止めない。

use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::download::DownloadTarget;
use crate::error::ScraperError;
use crate::locator::{locate_or, Anchor, ClickMode};
use crate::traits::{Fetch, Session};

use super::context::ScrapeContext;
use super::types::{sanitize_path_component, Outcome, ParliamentRecord, RunStats};

/// 議会ページを所有する文書
#[derive(Debug, Clone)]
pub struct OwnerDocument {
    pub code: String,
    pub folder: PathBuf,
}

/// 議会ページを処理する。遷移に失敗した場合のみ `Failed`
pub async fn extract<S, F>(
    session: &mut S,
    ctx: &ScrapeContext<'_, F>,
    link: &str,
    owner: &OwnerDocument,
    stats: &mut RunStats,
) -> Outcome<ParliamentRecord>
where
    S: Session + ?Sized,
    F: Fetch,
{
    let layout = &ctx.config.layout;
    let timing = &ctx.config.timing;

    if let Err(e) = session.goto(link).await {
        warn!("Cannot open parliament page {} for {}: {}", link, owner.code, e);
        return Outcome::Failed(e.to_string());
    }
    session.settle(timing.page_settle).await;

    let name = locate_or(session, &layout.parliament_name, timing.element_timeout, "").await;
    let folder = owner.folder.join(&name);
    if let Err(e) = tokio::fs::create_dir_all(&folder).await {
        warn!("Cannot create folder {:?}: {}", folder, e);
    }

    let reasoned_opinion_date =
        locate_or(session, &layout.reasoned_opinion_date, timing.element_timeout, "").await;

    match linked_files_pass(session, ctx, &folder, stats).await {
        Ok(count) => debug!("Linked files for {} - {}: {}", name, owner.code, count),
        Err(e) => warn!(
            "Error downloading linked files for {} - {}: {}",
            name, owner.code, e
        ),
    }

    match opinion_files_pass(session, ctx, &folder, stats).await {
        Ok(count) => debug!("Opinion files for {} - {}: {}", name, owner.code, count),
        Err(e) => warn!(
            "Error downloading reasoned opinion files for {} - {}: {}",
            name, owner.code, e
        ),
    }

    Outcome::Done(ParliamentRecord {
        name,
        reasoned_opinion_date,
    })
}

/// 「Gekoppelde bestanden」パネル。閉じていれば開いてから収集する
async fn linked_files_pass<S, F>(
    session: &mut S,
    ctx: &ScrapeContext<'_, F>,
    folder: &Path,
    stats: &mut RunStats,
) -> Result<usize, ScraperError>
where
    S: Session + ?Sized,
    F: Fetch,
{
    let layout = &ctx.config.layout;
    let timing = &ctx.config.timing;
    let toggle = &layout.linked_files_toggle;

    session
        .wait_for(&toggle.selector, toggle.condition, timing.element_timeout)
        .await?;
    let expanded = session.read(&toggle.selector, &toggle.read).await?;
    if expanded.as_deref().map(str::trim) == Some("false") {
        session.click(&toggle.selector, ClickMode::Native).await?;
        session.settle(timing.panel_settle).await;
    }

    let anchors = session.anchors(&layout.linked_files).await?;
    Ok(download_anchors(ctx, anchors, folder, "linked files", stats).await)
}

/// 「Met redenen omkleed advies」見出し直後のリスト
async fn opinion_files_pass<S, F>(
    session: &mut S,
    ctx: &ScrapeContext<'_, F>,
    folder: &Path,
    stats: &mut RunStats,
) -> Result<usize, ScraperError>
where
    S: Session + ?Sized,
    F: Fetch,
{
    let anchors = session.anchors(&ctx.config.layout.opinion_files).await?;
    Ok(download_anchors(ctx, anchors, folder, "reasoned opinion", stats).await)
}

/// DOM順にダウンロードし、保存できた件数を返す
async fn download_anchors<F: Fetch>(
    ctx: &ScrapeContext<'_, F>,
    anchors: Vec<Anchor>,
    folder: &Path,
    section: &str,
    stats: &mut RunStats,
) -> usize {
    let mut written = 0;

    for anchor in anchors {
        let Some(name) = anchor.display_name() else {
            info!("Skipping file with empty name in {} section", section);
            stats.downloads_skipped += 1;
            continue;
        };

        let url = match ctx.absolute(anchor.href.as_deref().unwrap_or_default()) {
            Ok(url) => url.unwrap_or_default(),
            Err(e) => {
                warn!("Bad link for {} in {} section: {}", name, section, e);
                stats.downloads_failed += 1;
                continue;
            }
        };

        let target = DownloadTarget::new(url, folder, sanitize_path_component(&name));
        let outcome = ctx.downloader.download(&target).await;
        stats.record_download(&outcome);
        if outcome.is_done() {
            written += 1;
        }
    }

    written
}
