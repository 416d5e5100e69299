//! 文書詳細ページの抽出

use tracing::{debug, info, warn};

use crate::locator::{locate, locate_or};
use crate::traits::{Fetch, Session};

use super::context::ScrapeContext;
use super::parliament::{self, OwnerDocument};
use super::types::{sanitize_path_component, DocumentRecord, Outcome, ResultLink, RunStats};

/// 文書ページを処理し、続けて各議会ページを処理する。
///
/// タイトルが取得できないページは壊れているか閲覧できないものとして `Skipped`。
/// それ以外の項目は欠けていても既定値（件数 "0"、その他は空文字）で埋める。
pub async fn extract<S, F>(
    session: &mut S,
    ctx: &ScrapeContext<'_, F>,
    link: &ResultLink,
    stats: &mut RunStats,
) -> Outcome<DocumentRecord>
where
    S: Session + ?Sized,
    F: Fetch,
{
    let layout = &ctx.config.layout;
    let timing = &ctx.config.timing;
    let timeout = timing.element_timeout;

    if let Err(e) = session.goto(link.as_str()).await {
        warn!("Cannot open document page {}: {}", link, e);
        return Outcome::Failed(e.to_string());
    }
    session.settle(timing.page_settle).await;

    let Some(title) = locate(session, &layout.document_title, timeout)
        .await
        .filter(|t| !t.is_empty())
    else {
        session.snapshot("document title missing").await;
        warn!("Failed to locate document code on {}", link);
        return Outcome::Skipped(format!("no document title on {}", link));
    };

    let code = sanitize_path_component(&title);
    info!("Processing document {}", code);

    let mut record = DocumentRecord {
        name: locate_or(session, &layout.document_name, timeout, "").await,
        reasoned_opinion_count: locate_or(session, &layout.reasoned_opinion_count, timeout, "0")
            .await,
        political_dialogue_count: locate_or(session, &layout.political_dialogue_count, timeout, "0")
            .await,
        important_info_count: locate_or(session, &layout.important_info_count, timeout, "0")
            .await,
        adoption_date: locate_or(session, &layout.adoption_date, timeout, "").await,
        legal_basis: locate_or(session, &layout.legal_basis, timeout, "").await,
        reference_letter_date: locate_or(session, &layout.reference_letter_date, timeout, "")
            .await,
        subsidiarity_deadline: locate_or(session, &layout.subsidiarity_deadline, timeout, "")
            .await,
        code,
        parliaments: Vec::new(),
    };

    let folder = ctx.config.output_dir.join(&record.code);
    if let Err(e) = tokio::fs::create_dir_all(&folder).await {
        warn!("Cannot create document folder {:?}: {}", folder, e);
    }

    let links = parliament_links(session, ctx, &record.code).await;
    debug!("{} parliament pages for {}", links.len(), record.code);

    let owner = OwnerDocument {
        code: record.code.clone(),
        folder,
    };
    for parliament_link in links {
        match parliament::extract(session, ctx, &parliament_link, &owner, stats).await {
            Outcome::Done(parliament) => {
                stats.parliaments += 1;
                record.parliaments.push(parliament);
            }
            Outcome::Skipped(reason) | Outcome::Failed(reason) => {
                stats.parliaments_failed += 1;
                warn!(
                    "Parliament page {} for {} not processed: {}",
                    parliament_link, owner.code, reason
                );
            }
        }
    }

    Outcome::Done(record)
}

/// 理由付き意見タグを持つ議会カードのリンク（発見順、重複なし）
async fn parliament_links<S, F>(
    session: &mut S,
    ctx: &ScrapeContext<'_, F>,
    code: &str,
) -> Vec<String>
where
    S: Session + ?Sized,
{
    let anchors = match session.anchors(&ctx.config.layout.parliament_links).await {
        Ok(anchors) => anchors,
        Err(e) => {
            warn!("Error while collecting parliament links for {}: {}", code, e);
            return Vec::new();
        }
    };

    let mut links: Vec<String> = Vec::new();
    for href in anchors.into_iter().filter_map(|a| a.href) {
        match ctx.absolute(&href) {
            Ok(Some(url)) if !links.contains(&url) => links.push(url),
            Ok(_) => {}
            Err(e) => warn!("Ignoring parliament link {:?} for {}: {}", href, code, e),
        }
    }
    links
}
