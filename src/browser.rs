//! chromiumoxide による `Session` 実装
//!
//! セレクタ（CSS / XPath）の解決と条件判定はページ内のJavaScriptで行い、
//! 結果はJSON文字列で受け取る。

use std::path::PathBuf;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::element::Element;
use chromiumoxide::page::ScreenshotParams;
use chromiumoxide::Page;
use futures::StreamExt;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::config::ScraperConfig;
use crate::error::ScraperError;
use crate::locator::{Anchor, ClickMode, Condition, Read, Selector};
use crate::traits::Session;

/// ページ遷移後の readyState 待機上限
const PAGE_LOAD_TIMEOUT: Duration = Duration::from_secs(30);
/// DOMが安定したとみなす連続一致回数
const REQUIRED_STABLE_CHECKS: u32 = 3;

const DOM_HELPERS: &str = r#"
    const __resolve = (sel) => {
        if (sel.kind === 'xpath') {
            const snap = document.evaluate(sel.value, document, null, XPathResult.ORDERED_NODE_SNAPSHOT_TYPE, null);
            const nodes = [];
            for (let i = 0; i < snap.snapshotLength; i++) {
                nodes.push(snap.snapshotItem(i));
            }
            return nodes;
        }
        return Array.from(document.querySelectorAll(sel.value));
    };
    const __visible = (el) => {
        const style = window.getComputedStyle(el);
        return style.visibility !== 'hidden' && style.display !== 'none' && el.getClientRects().length > 0;
    };
"#;

#[derive(Debug, Deserialize)]
struct PageState {
    ready: bool,
    length: usize,
}

pub struct ChromeSession {
    browser: Option<Browser>,
    page: Option<Page>,
    handler: Option<JoinHandle<()>>,
    user_data_dir: PathBuf,
    poll_interval: Duration,
    debug: bool,
}

impl ChromeSession {
    /// ブラウザを起動して空のページを開く
    pub async fn launch(config: &ScraperConfig) -> Result<Self, ScraperError> {
        info!("Launching browser...");

        let unique_id = format!(
            "{}-{}",
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap_or_default()
                .as_nanos()
        );
        let user_data_dir = std::env::temp_dir().join(format!("ipex-scraper-{}", unique_id));

        let mut builder = BrowserConfig::builder()
            .user_data_dir(&user_data_dir)
            .window_size(1280, 1024);

        if let Some(path) = &config.chrome_path {
            builder = builder.chrome_executable(path);
        }
        if !config.headless {
            builder = builder.with_head();
        }

        builder = builder
            .no_sandbox()
            .request_timeout(Duration::from_secs(60))
            .arg("--disable-blink-features=AutomationControlled")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-gpu");

        if config.debug {
            builder = builder.arg("--enable-logging=stderr").arg("--v=1");
        }

        let browser_config = builder
            .build()
            .map_err(|e| ScraperError::BrowserInit(format!("ブラウザ設定エラー: {}", e)))?;

        let (browser, mut handler) = Browser::launch(browser_config)
            .await
            .map_err(|e| ScraperError::BrowserInit(e.to_string()))?;

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!("Browser event error: {:?}", e);
                }
            }
        });

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| ScraperError::BrowserInit(e.to_string()))?;

        info!("Browser launched");
        Ok(Self {
            browser: Some(browser),
            page: Some(page),
            handler: Some(handler),
            user_data_dir,
            poll_interval: config.timing.poll_interval,
            debug: config.debug,
        })
    }

    fn page(&self) -> Result<&Page, ScraperError> {
        self.page
            .as_ref()
            .ok_or_else(|| ScraperError::BrowserInit("ブラウザが初期化されていません".into()))
    }

    /// `body` を即時関数として実行し、`JSON.stringify` された戻り値を復元する
    async fn eval<T: DeserializeOwned>(&self, body: &str) -> Result<T, ScraperError> {
        let script = format!("(() => {{ {} {} }})()", DOM_HELPERS, body);
        let json: String = self
            .page()?
            .evaluate(script.as_str())
            .await
            .map_err(|e| ScraperError::JavaScript(e.to_string()))?
            .into_value()
            .map_err(|e| ScraperError::JavaScript(e.to_string()))?;
        Ok(serde_json::from_str(&json)?)
    }

    async fn find(&self, selector: &Selector) -> Result<Element, ScraperError> {
        let page = self.page()?;
        let found = match selector {
            Selector::Css(css) => page.find_element(css.as_str()).await,
            Selector::XPath(xpath) => page.find_xpath(xpath.as_str()).await,
        };
        found.map_err(|e| ScraperError::ElementNotFound(format!("{}: {}", selector, e)))
    }

    async fn page_state(&self) -> Result<PageState, ScraperError> {
        self.eval(
            r#"return JSON.stringify({
                ready: document.readyState === 'complete',
                length: document.documentElement.outerHTML.length,
            });"#,
        )
        .await
    }

    /// readyState が complete になるまで待機
    async fn wait_loaded(&self, timeout: Duration) {
        let start = Instant::now();
        while start.elapsed() < timeout {
            match self.page_state().await {
                Ok(state) if state.ready => {
                    debug!("Page load complete after {:?}", start.elapsed());
                    return;
                }
                Ok(_) => {}
                Err(e) => debug!("readyState check error: {}", e),
            }
            sleep(self.poll_interval).await;
        }
        warn!("Page load timeout after {:?}, proceeding anyway", start.elapsed());
    }

    /// DOMの長さが連続して変化しなくなるまで待機
    async fn wait_stable(&self, timeout: Duration) {
        let start = Instant::now();
        let mut last_length: Option<usize> = None;
        let mut stable_count = 0;

        while start.elapsed() < timeout {
            match self.page_state().await {
                Ok(state) => {
                    match last_length {
                        Some(last) if state.ready && last == state.length => {
                            stable_count += 1;
                            if stable_count >= REQUIRED_STABLE_CHECKS {
                                debug!("Page stable after {:?}", start.elapsed());
                                return;
                            }
                        }
                        _ => stable_count = 0,
                    }
                    last_length = Some(state.length);
                }
                Err(e) => {
                    debug!("Page stable check error: {}", e);
                    stable_count = 0;
                }
            }
            sleep(self.poll_interval).await;
        }

        debug!("Page not stable after {:?}, proceeding", start.elapsed());
    }
}

#[async_trait]
impl Session for ChromeSession {
    async fn goto(&mut self, url: &str) -> Result<(), ScraperError> {
        debug!("Navigating to {}", url);
        self.page()?
            .goto(url)
            .await
            .map_err(|e| ScraperError::Navigation(format!("{}: {}", url, e)))?;
        self.wait_loaded(PAGE_LOAD_TIMEOUT).await;
        Ok(())
    }

    async fn wait_for(
        &mut self,
        selector: &Selector,
        condition: Condition,
        timeout: Duration,
    ) -> Result<(), ScraperError> {
        let body = format!(
            r#"const sel = {};
            const cond = {};
            const ok = __resolve(sel).some((el) => {{
                if (cond === 'present') return true;
                if (!__visible(el)) return false;
                if (cond === 'visible') return true;
                return !el.disabled && window.getComputedStyle(el).pointerEvents !== 'none';
            }});
            return JSON.stringify(ok);"#,
            serde_json::to_string(selector)?,
            serde_json::to_string(&condition)?,
        );

        let start = Instant::now();
        loop {
            match self.eval::<bool>(&body).await {
                Ok(true) => return Ok(()),
                Ok(false) => {}
                Err(e) => debug!("Condition check error ({}): {}", selector, e),
            }
            if start.elapsed() >= timeout {
                return Err(ScraperError::Timeout(format!(
                    "{} ({:?}) not satisfied within {:?}",
                    selector, condition, timeout
                )));
            }
            sleep(self.poll_interval).await;
        }
    }

    async fn read(
        &mut self,
        selector: &Selector,
        read: &Read,
    ) -> Result<Option<String>, ScraperError> {
        let body = format!(
            r#"const el = __resolve({})[0];
            const read = {};
            if (!el) return JSON.stringify(null);
            const value = read.kind === 'text'
                ? (el.innerText ?? el.textContent)
                : el.getAttribute(read.name);
            return JSON.stringify(value ?? null);"#,
            serde_json::to_string(selector)?,
            serde_json::to_string(read)?,
        );
        self.eval(&body).await
    }

    async fn anchors(&mut self, selector: &Selector) -> Result<Vec<Anchor>, ScraperError> {
        let body = format!(
            r#"return JSON.stringify(__resolve({}).map((node) => {{
                const a = (node.closest && node.closest('a')) || node;
                return {{
                    href: a.href || a.getAttribute('href'),
                    title: a.getAttribute('title'),
                    text: (a.innerText || a.textContent || '').trim(),
                }};
            }}));"#,
            serde_json::to_string(selector)?,
        );
        self.eval(&body).await
    }

    async fn click(&mut self, selector: &Selector, mode: ClickMode) -> Result<(), ScraperError> {
        match mode {
            ClickMode::Native => {
                self.find(selector)
                    .await?
                    .click()
                    .await
                    .map_err(|e| ScraperError::Navigation(format!("click {}: {}", selector, e)))?;
            }
            ClickMode::Forced => {
                let body = format!(
                    r#"const el = __resolve({})[0];
                    if (!el) return JSON.stringify(false);
                    el.click();
                    return JSON.stringify(true);"#,
                    serde_json::to_string(selector)?,
                );
                if !self.eval::<bool>(&body).await? {
                    return Err(ScraperError::ElementNotFound(selector.to_string()));
                }
            }
        }
        Ok(())
    }

    async fn scroll_into_view(&mut self, selector: &Selector) -> Result<(), ScraperError> {
        let body = format!(
            r#"const el = __resolve({})[0];
            if (!el) return JSON.stringify(false);
            el.scrollIntoView({{ block: 'center' }});
            return JSON.stringify(true);"#,
            serde_json::to_string(selector)?,
        );
        if !self.eval::<bool>(&body).await? {
            return Err(ScraperError::ElementNotFound(selector.to_string()));
        }
        Ok(())
    }

    async fn settle(&mut self, delay: Duration) {
        if delay.is_zero() {
            return;
        }
        self.wait_stable(delay).await;
    }

    async fn snapshot(&mut self, label: &str) {
        if !self.debug {
            return;
        }
        let Ok(page) = self.page() else {
            return;
        };
        match page
            .screenshot(ScreenshotParams::builder().full_page(true).build())
            .await
        {
            Ok(screenshot) => {
                use base64::Engine;
                let encoded = base64::engine::general_purpose::STANDARD.encode(&screenshot);
                debug!("Screenshot ({}): data:image/png;base64,{}", label, encoded);
            }
            Err(e) => debug!("Screenshot ({}) failed: {}", label, e),
        }
    }

    async fn close(&mut self) -> Result<(), ScraperError> {
        info!("Closing browser...");

        if let Some(page) = self.page.take() {
            if let Err(e) = page.close().await {
                debug!("Failed to close page: {}", e);
            }
        }

        if let Some(mut browser) = self.browser.take() {
            if let Err(e) = browser.close().await {
                warn!("Failed to close browser: {}", e);
            }
            if let Err(e) = browser.wait().await {
                warn!("Failed to wait for browser exit: {}", e);
            }
        }

        if let Some(handler) = self.handler.take() {
            handler.abort();
        }

        if let Err(e) = std::fs::remove_dir_all(&self.user_data_dir) {
            debug!("Failed to remove {:?}: {}", self.user_data_dir, e);
        }

        info!("Browser closed");
        Ok(())
    }
}
