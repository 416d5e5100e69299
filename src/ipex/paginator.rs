//! 検索結果のページング
//!
//! 「さらに読み込む」がクリックできる間は押し続け、消えたら（またはタイムアウトしたら）
//! 結果カードのリンクをまとめて収集する。結果は追記のみで並び替えられない前提。

use tracing::{debug, info, warn};
use url::Url;

use crate::config::ScraperConfig;
use crate::error::ScraperError;
use crate::locator::{ClickMode, Condition};
use crate::traits::Session;

use super::types::ResultLink;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PagerState {
    Loading,
    Exhausted,
}

/// 全結果を読み込んでリンクを返す
pub async fn collect_all_links<S>(
    session: &mut S,
    config: &ScraperConfig,
) -> Result<Vec<ResultLink>, ScraperError>
where
    S: Session + ?Sized,
{
    let layout = &config.layout;
    let timing = &config.timing;
    let mut clicks = 0usize;
    let mut state = PagerState::Loading;

    while state == PagerState::Loading {
        if config.max_load_more.is_some_and(|limit| clicks >= limit) {
            info!("Load-more limit of {} reached", clicks);
            state = PagerState::Exhausted;
            continue;
        }

        if session
            .wait_for(&layout.load_more, Condition::Clickable, timing.element_timeout)
            .await
            .is_err()
        {
            state = PagerState::Exhausted;
            continue;
        }

        if let Err(e) = session.scroll_into_view(&layout.load_more).await {
            debug!("Could not scroll load-more into view: {}", e);
        }
        session.settle(timing.scroll_settle).await;

        match session.click(&layout.load_more, ClickMode::Native).await {
            Ok(()) => {
                clicks += 1;
                debug!("Load-more clicked ({} so far)", clicks);
                session.pause(timing.load_more_settle).await;
            }
            Err(e) => {
                debug!("Load-more click failed, treating results as complete: {}", e);
                state = PagerState::Exhausted;
            }
        }
    }
    info!("All results loaded after {} load-more clicks", clicks);

    let base = Url::parse(&config.portal_url)?;
    let links: Vec<ResultLink> = session
        .anchors(&layout.result_links)
        .await?
        .into_iter()
        .filter_map(|anchor| anchor.href)
        .filter_map(|href| match base.join(href.trim()) {
            Ok(url) => Some(ResultLink(url.to_string())),
            Err(e) => {
                warn!("Ignoring malformed result link {:?}: {}", href, e);
                None
            }
        })
        .collect();

    info!("Collected {} result links", links.len());
    Ok(links)
}
