//! テスト用のセッションとフェッチャ

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;

use crate::error::ScraperError;
use crate::locator::{Anchor, ClickMode, Condition, Read, Selector};
use crate::traits::{Fetch, FetchResponse, Session};

#[derive(Debug, Clone)]
pub struct FakeElement {
    text: Option<String>,
    attributes: HashMap<String, String>,
    visible: bool,
    enabled: bool,
}

impl FakeElement {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            attributes: HashMap::new(),
            visible: true,
            enabled: true,
        }
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }
}

#[derive(Debug, Clone)]
struct FakeLoadMore {
    selector: String,
    remaining: usize,
    results: String,
    batches: VecDeque<Vec<Anchor>>,
}

#[derive(Debug, Clone, Default)]
pub struct FakePage {
    elements: HashMap<String, FakeElement>,
    anchors: HashMap<String, Vec<Anchor>>,
    load_more: Option<FakeLoadMore>,
}

impl FakePage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_text(self, selector: impl AsRef<str>, text: impl Into<String>) -> Self {
        self.with_element(selector, FakeElement::text(text))
    }

    pub fn with_element(mut self, selector: impl AsRef<str>, element: FakeElement) -> Self {
        self.elements.insert(selector.as_ref().to_string(), element);
        self
    }

    pub fn with_anchors(mut self, selector: impl AsRef<str>, anchors: Vec<Anchor>) -> Self {
        self.anchors.insert(selector.as_ref().to_string(), anchors);
        self
    }

    /// `clicks` 回だけクリック可能な「さらに読み込む」ボタン。
    /// クリックごとに `batches` の先頭を `results` に追加する
    pub fn with_load_more(
        mut self,
        selector: &Selector,
        results: &Selector,
        clicks: usize,
        batches: Vec<Vec<Anchor>>,
    ) -> Self {
        self.load_more = Some(FakeLoadMore {
            selector: selector.as_str().to_string(),
            remaining: clicks,
            results: results.as_str().to_string(),
            batches: batches.into(),
        });
        self
    }
}

#[derive(Debug, Default)]
pub struct FakeSession {
    pages: HashMap<String, FakePage>,
    current: Option<String>,
    pub visited: Vec<String>,
    pub clicks: Vec<(String, ClickMode)>,
    pub scrolls: Vec<String>,
    pub waits: Vec<(String, Duration)>,
    pub settles: Vec<Duration>,
    pub pauses: Vec<Duration>,
    pub closed: bool,
}

impl FakeSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(mut self, url: impl Into<String>, page: FakePage) -> Self {
        self.pages.insert(url.into(), page);
        self
    }

    pub fn clicks_on(&self, selector: &Selector) -> usize {
        self.clicks
            .iter()
            .filter(|(key, _)| key == selector.as_str())
            .count()
    }

    fn page(&mut self) -> Result<&mut FakePage, ScraperError> {
        let url = self
            .current
            .clone()
            .ok_or_else(|| ScraperError::Navigation("no page loaded".into()))?;
        self.pages
            .get_mut(&url)
            .ok_or_else(|| ScraperError::Navigation(url))
    }
}

#[async_trait]
impl Session for FakeSession {
    async fn goto(&mut self, url: &str) -> Result<(), ScraperError> {
        if !self.pages.contains_key(url) {
            return Err(ScraperError::Navigation(format!("unknown page {}", url)));
        }
        self.current = Some(url.to_string());
        self.visited.push(url.to_string());
        Ok(())
    }

    async fn wait_for(
        &mut self,
        selector: &Selector,
        condition: Condition,
        timeout: Duration,
    ) -> Result<(), ScraperError> {
        let key = selector.as_str();
        self.waits.push((key.to_string(), timeout));
        let page = self.page()?;

        if let Some(load_more) = page.load_more.as_ref().filter(|l| l.selector == key) {
            if load_more.remaining > 0 {
                return Ok(());
            }
            return Err(ScraperError::Timeout(key.to_string()));
        }

        let ready = match page.elements.get(key) {
            Some(element) => match condition {
                Condition::Present => true,
                Condition::Visible => element.visible,
                Condition::Clickable => element.visible && element.enabled,
            },
            None => page.anchors.get(key).is_some_and(|a| !a.is_empty()),
        };

        if ready {
            Ok(())
        } else {
            Err(ScraperError::Timeout(key.to_string()))
        }
    }

    async fn read(
        &mut self,
        selector: &Selector,
        read: &Read,
    ) -> Result<Option<String>, ScraperError> {
        let page = self.page()?;
        Ok(page.elements.get(selector.as_str()).and_then(|e| match read {
            Read::Text => e.text.clone(),
            Read::Attribute(name) => e.attributes.get(name).cloned(),
        }))
    }

    async fn anchors(&mut self, selector: &Selector) -> Result<Vec<Anchor>, ScraperError> {
        let page = self.page()?;
        Ok(page.anchors.get(selector.as_str()).cloned().unwrap_or_default())
    }

    async fn click(&mut self, selector: &Selector, mode: ClickMode) -> Result<(), ScraperError> {
        let key = selector.as_str().to_string();
        let page = self.page()?;

        if let Some(load_more) = page.load_more.as_mut().filter(|l| l.selector == key) {
            if load_more.remaining == 0 {
                return Err(ScraperError::ElementNotFound(key));
            }
            load_more.remaining -= 1;
            let batch = load_more.batches.pop_front().unwrap_or_default();
            let results = load_more.results.clone();
            page.anchors.entry(results).or_default().extend(batch);
        } else {
            let element = page
                .elements
                .get_mut(&key)
                .ok_or_else(|| ScraperError::ElementNotFound(key.clone()))?;
            if element.attributes.contains_key("aria-expanded") {
                element.attributes.insert("aria-expanded".into(), "true".into());
            }
        }

        self.clicks.push((key, mode));
        Ok(())
    }

    async fn scroll_into_view(&mut self, selector: &Selector) -> Result<(), ScraperError> {
        self.page()?;
        self.scrolls.push(selector.as_str().to_string());
        Ok(())
    }

    async fn settle(&mut self, delay: Duration) {
        self.settles.push(delay);
    }

    async fn pause(&mut self, delay: Duration) {
        self.pauses.push(delay);
    }

    async fn close(&mut self) -> Result<(), ScraperError> {
        self.closed = true;
        self.current = None;
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct FakeReply {
    status: u16,
    chunks: Vec<Vec<u8>>,
    broken: bool,
}

impl FakeReply {
    pub fn status(status: u16) -> Self {
        Self {
            status,
            chunks: Vec::new(),
            broken: false,
        }
    }

    pub fn body(body: &[u8]) -> Self {
        Self {
            status: 200,
            chunks: body.chunks(2).map(<[u8]>::to_vec).collect(),
            broken: false,
        }
    }

    /// 本文の途中でストリームが切れる
    pub fn broken(body: &[u8]) -> Self {
        Self {
            broken: true,
            ..Self::body(body)
        }
    }
}

/// 予約した応答を順に返す。予約がなければURLを本文にした 200 を返す
#[derive(Debug, Default)]
pub struct FakeFetcher {
    replies: Mutex<VecDeque<FakeReply>>,
    calls: Mutex<Vec<String>>,
}

impl FakeFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, reply: FakeReply) {
        self.replies.lock().unwrap().push_back(reply);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Fetch for FakeFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchResponse, ScraperError> {
        self.calls.lock().unwrap().push(url.to_string());
        let reply = self
            .replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| FakeReply::body(url.as_bytes()));

        let mut items: Vec<Result<Vec<u8>, ScraperError>> =
            reply.chunks.into_iter().map(Ok).collect();
        if reply.broken {
            items.push(Err(ScraperError::Download("connection reset".into())));
        }

        Ok(FetchResponse {
            status: reply.status,
            body: futures::stream::iter(items).boxed(),
        })
    }
}
