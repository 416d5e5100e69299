//! ポータルのページ構造（セレクタとUIラベル）
//!
//! 既定値はオランダ語UIのIPEX検索ページに合わせている。

use std::time::Duration;

use crate::locator::{ClickMode, Condition, FieldSpec, Selector};

/// フィルタ設定の1ステップ
#[derive(Debug, Clone)]
pub struct FilterStep {
    pub name: String,
    pub target: Selector,
    pub wait: Condition,
    pub click: ClickMode,
    /// クリック前に表示領域へスクロールする
    pub scroll: bool,
    /// クリック後に `filter_settle` だけ待つ
    pub settle: bool,
}

#[derive(Debug, Clone)]
pub struct PortalLayout {
    // 検索ページ
    pub filter_steps: Vec<FilterStep>,
    pub load_more: Selector,
    pub result_links: Selector,

    // 文書詳細ページ
    pub document_title: FieldSpec,
    pub document_name: FieldSpec,
    pub reasoned_opinion_count: FieldSpec,
    pub political_dialogue_count: FieldSpec,
    pub important_info_count: FieldSpec,
    pub adoption_date: FieldSpec,
    pub legal_basis: FieldSpec,
    pub reference_letter_date: FieldSpec,
    pub subsidiarity_deadline: FieldSpec,
    pub parliament_links: Selector,

    // 議会ページ
    pub parliament_name: FieldSpec,
    pub reasoned_opinion_date: FieldSpec,
    pub linked_files_toggle: FieldSpec,
    pub linked_files: Selector,
    pub opinion_files: Selector,
}

impl Default for PortalLayout {
    fn default() -> Self {
        Self::dutch()
    }
}

impl PortalLayout {
    pub fn dutch() -> Self {
        // タイトル取得後に読むので待たずに1回だけ確認する
        let optional = |selector: Selector| FieldSpec::text(selector).with_timeout(Duration::ZERO);
        let metadata = |label: &str| {
            optional(Selector::xpath(format!(
                "//li[strong[text()='{}']]/span",
                label
            )))
        };

        Self {
            filter_steps: vec![
                FilterStep {
                    name: "language menu".into(),
                    target: Selector::css("#languageMenu"),
                    wait: Condition::Clickable,
                    click: ClickMode::Native,
                    scroll: false,
                    settle: false,
                },
                FilterStep {
                    name: "language option".into(),
                    target: Selector::xpath("//a[@title='NL - Nederlands']"),
                    wait: Condition::Visible,
                    click: ClickMode::Forced,
                    scroll: false,
                    settle: true,
                },
                FilterStep {
                    name: "type facet".into(),
                    target: Selector::xpath("//button[@aria-controls='type']"),
                    wait: Condition::Clickable,
                    click: ClickMode::Forced,
                    scroll: true,
                    settle: false,
                },
                FilterStep {
                    name: "documents option".into(),
                    target: Selector::xpath(
                        "//ul[@id='type']//label[.//span[text()='Documenten']]//input[@type='checkbox']",
                    ),
                    wait: Condition::Present,
                    click: ClickMode::Native,
                    scroll: false,
                    settle: true,
                },
                FilterStep {
                    name: "event facet".into(),
                    target: Selector::xpath("//button[@aria-controls='events']"),
                    wait: Condition::Clickable,
                    click: ClickMode::Forced,
                    scroll: true,
                    settle: false,
                },
                FilterStep {
                    name: "reasoned opinion: yes".into(),
                    // 見出しは "omkleed" と "omklees" の両方の表記がある
                    target: Selector::xpath(
                        "//h5[contains(text(), 'Met redenen omklee')]/following-sibling::ul[1]//label[contains(text(), 'Ja')]//input[@type='checkbox']",
                    ),
                    wait: Condition::Present,
                    click: ClickMode::Native,
                    scroll: false,
                    settle: true,
                },
            ],
            load_more: Selector::xpath("//button[contains(text(), 'Laad meer')]"),
            result_links: Selector::css("app-document-output.srch-card a.srch-card-title"),

            document_title: FieldSpec::text(Selector::css(
                "h1.section-title.document-detail-title",
            )),
            document_name: optional(Selector::css("p.ipx-lead")),
            reasoned_opinion_count: optional(Selector::css(".btn-opinion .tag-count")),
            political_dialogue_count: optional(Selector::css(".btn-dialog .tag-count")),
            important_info_count: optional(Selector::css(".btn-exchange .tag-count")),
            adoption_date: metadata("Aannamedatum:"),
            legal_basis: metadata("Rechtsgrondslag:"),
            reference_letter_date: optional(Selector::xpath(
                "//li[strong[contains(text(), 'Verwijsbrief')]]/span",
            )),
            subsidiarity_deadline: metadata("Subsidiariteitstermijn:"),
            parliament_links: Selector::css(".scrutiny-box.ipx-card a .btn-opinion"),

            parliament_name: FieldSpec::text(Selector::xpath("//h1[contains(@class, 'flag')]")),
            reasoned_opinion_date: FieldSpec::text(Selector::css(
                ".title-opinion + h4.lisbon-block-date",
            )),
            linked_files_toggle: FieldSpec::attribute(
                Selector::xpath("//button[normalize-space(text())='Gekoppelde bestanden']"),
                "aria-expanded",
            ),
            linked_files: Selector::xpath(
                "//div[@aria-hidden='false']//div[contains(@class, 'ipx-files-list')]//a[@download]",
            ),
            opinion_files: Selector::xpath(
                "//h3[contains(text(), 'Met redenen omkleed advies')]/following-sibling::ul//a",
            ),
        }
    }
}
