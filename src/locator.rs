//! 要素ロケータ
//!
//! フィールド名ごとの探索戦略（セレクタ + 待機条件 + 読み取り方法）を保持し、
//! 現在のページから値を取り出す。見つからない場合は `None` を返し、
//! 呼び出し側へエラーを伝播しない。ポータルは該当しないセクションを
//! そもそも描画しないため、「要素なし」は通常の結果として扱う。

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::traits::Session;

/// 要素の探索方法
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum Selector {
    Css(String),
    XPath(String),
}

impl Selector {
    pub fn css(value: impl Into<String>) -> Self {
        Selector::Css(value.into())
    }

    pub fn xpath(value: impl Into<String>) -> Self {
        Selector::XPath(value.into())
    }

    pub fn as_str(&self) -> &str {
        match self {
            Selector::Css(value) | Selector::XPath(value) => value,
        }
    }
}

impl AsRef<str> for Selector {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Selector::Css(value) => write!(f, "css={}", value),
            Selector::XPath(value) => write!(f, "xpath={}", value),
        }
    }
}

/// 待機条件
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Condition {
    /// DOMに存在する
    Present,
    /// 表示されている
    Visible,
    /// 表示されていて操作可能
    Clickable,
}

/// 値の読み取り方法
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "name", rename_all = "lowercase")]
pub enum Read {
    Text,
    Attribute(String),
}

/// クリック方法
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClickMode {
    /// 通常のクリック（CDPの入力イベント）
    Native,
    /// `element.click()` の直接呼び出し。表示領域外のコントロール用
    Forced,
}

/// 1フィールド分の探索仕様
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSpec {
    pub selector: Selector,
    pub condition: Condition,
    pub read: Read,
    /// `None` の場合は `Timing::element_timeout` を使う
    pub timeout: Option<Duration>,
}

impl FieldSpec {
    pub fn text(selector: Selector) -> Self {
        Self {
            selector,
            condition: Condition::Present,
            read: Read::Text,
            timeout: None,
        }
    }

    pub fn attribute(selector: Selector, name: impl Into<String>) -> Self {
        Self {
            selector,
            condition: Condition::Present,
            read: Read::Attribute(name.into()),
            timeout: None,
        }
    }

    pub fn with_condition(mut self, condition: Condition) -> Self {
        self.condition = condition;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// リンク要素から取り出した情報
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Anchor {
    pub href: Option<String>,
    pub title: Option<String>,
    #[serde(default)]
    pub text: String,
}

impl Anchor {
    pub fn new(href: impl Into<String>) -> Self {
        Self {
            href: Some(href.into()),
            ..Default::default()
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    /// 表示名: title属性、なければテキスト
    pub fn display_name(&self) -> Option<String> {
        self.title
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .or_else(|| Some(self.text.trim()).filter(|t| !t.is_empty()))
            .map(str::to_string)
    }
}

/// フィールドを探して値を返す。タイムアウト・不在・読み取り失敗はすべて `None`
pub async fn locate<S>(
    session: &mut S,
    spec: &FieldSpec,
    default_timeout: Duration,
) -> Option<String>
where
    S: Session + ?Sized,
{
    let timeout = spec.timeout.unwrap_or(default_timeout);

    if let Err(e) = session.wait_for(&spec.selector, spec.condition, timeout).await {
        debug!("Field not available ({}): {}", spec.selector, e);
        return None;
    }

    match session.read(&spec.selector, &spec.read).await {
        Ok(value) => value.map(|v| v.trim().to_string()),
        Err(e) => {
            debug!("Failed to read field ({}): {}", spec.selector, e);
            None
        }
    }
}

/// `locate` の結果が空なら既定値を使う
pub async fn locate_or<S>(
    session: &mut S,
    spec: &FieldSpec,
    default_timeout: Duration,
    fallback: &str,
) -> String
where
    S: Session + ?Sized,
{
    locate(session, spec, default_timeout)
        .await
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| fallback.to_string())
}
