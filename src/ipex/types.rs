//! IPEX 関連の型定義

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 文書詳細ページのURL
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResultLink(pub String);

impl ResultLink {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ResultLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// 理由付き意見を出した議会
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParliamentRecord {
    #[serde(rename = "Parliament Name")]
    pub name: String,
    #[serde(rename = "Reasoned Opinion Date")]
    pub reasoned_opinion_date: String,
}

/// 1文書分のデータ。未取得の項目は空文字（件数は "0"）
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentRecord {
    /// パス区切り文字を置換済みの文書コード
    pub code: String,
    pub name: String,
    pub reasoned_opinion_count: String,
    pub political_dialogue_count: String,
    pub important_info_count: String,
    pub adoption_date: String,
    pub legal_basis: String,
    pub reference_letter_date: String,
    pub subsidiarity_deadline: String,
    pub parliaments: Vec<ParliamentRecord>,
}

/// 1単位（文書・議会・ファイル）の処理結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome<T> {
    Done(T),
    Skipped(String),
    Failed(String),
}

impl<T> Outcome<T> {
    pub fn is_done(&self) -> bool {
        matches!(self, Outcome::Done(_))
    }

    pub fn done(self) -> Option<T> {
        match self {
            Outcome::Done(value) => Some(value),
            _ => None,
        }
    }
}

/// 実行中の集計
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunStats {
    pub links: usize,
    pub documents: usize,
    pub documents_skipped: usize,
    pub documents_failed: usize,
    pub parliaments: usize,
    pub parliaments_failed: usize,
    pub downloads_written: usize,
    pub downloads_skipped: usize,
    pub downloads_failed: usize,
}

impl RunStats {
    pub fn record_download<T>(&mut self, outcome: &Outcome<T>) {
        match outcome {
            Outcome::Done(_) => self.downloads_written += 1,
            Outcome::Skipped(_) => self.downloads_skipped += 1,
            Outcome::Failed(_) => self.downloads_failed += 1,
        }
    }

    pub fn downloads_attempted(&self) -> usize {
        self.downloads_written + self.downloads_failed
    }
}

/// 実行結果
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub stats: RunStats,
    pub export_path: PathBuf,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

/// ファイル・フォルダ名に使えない文字を '-' に置換
pub fn sanitize_path_component(raw: &str) -> String {
    raw.trim()
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '-',
            c if c.is_control() => '-',
            c => c,
        })
        .collect()
}
