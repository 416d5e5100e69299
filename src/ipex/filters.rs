//! 検索フィルタの設定
//!
//! 言語 → 種別「文書」 → イベント「理由付き意見: はい」の順に操作する。

use tracing::{debug, info};

use crate::config::ScraperConfig;
use crate::error::ScraperError;
use crate::traits::Session;

/// フィルタ設定を順に実行する。途中で失敗したステップ名をエラーに含める
pub async fn configure<S>(session: &mut S, config: &ScraperConfig) -> Result<usize, ScraperError>
where
    S: Session + ?Sized,
{
    info!("Configuring search filters...");
    let timing = &config.timing;

    for (i, step) in config.layout.filter_steps.iter().enumerate() {
        debug!("Filter step {}: {}", i + 1, step.name);

        session
            .wait_for(&step.target, step.wait, timing.element_timeout)
            .await
            .map_err(|e| ScraperError::ElementNotFound(format!("{}: {}", step.name, e)))?;

        if step.scroll {
            session.scroll_into_view(&step.target).await?;
        }

        session
            .click(&step.target, step.click)
            .await
            .map_err(|e| ScraperError::Navigation(format!("{}: {}", step.name, e)))?;

        if step.settle {
            session.settle(timing.filter_settle).await;
        }
    }

    info!("Search filters configured");
    Ok(config.layout.filter_steps.len())
}
