//! CSV エクスポート

use std::path::Path;

use serde::Serialize;
use tracing::info;

use crate::error::ScraperError;
use crate::ipex::DocumentRecord;

#[derive(Serialize)]
struct ExportRow<'a> {
    #[serde(rename = "Document Code")]
    code: &'a str,
    #[serde(rename = "Document Name")]
    name: &'a str,
    #[serde(rename = "Reasoned Opinions")]
    reasoned_opinions: &'a str,
    #[serde(rename = "Political Dialogues")]
    political_dialogues: &'a str,
    #[serde(rename = "Important Information to Exchange")]
    important_information: &'a str,
    #[serde(rename = "Adoption Date")]
    adoption_date: &'a str,
    #[serde(rename = "Legal Basis")]
    legal_basis: &'a str,
    #[serde(rename = "Reference Letter Date")]
    reference_letter_date: &'a str,
    #[serde(rename = "Subsidiarity Deadline")]
    subsidiarity_deadline: &'a str,
    /// JSON配列 `[{"Parliament Name": .., "Reasoned Opinion Date": ..}]`
    #[serde(rename = "Parliament Data")]
    parliament_data: String,
}

/// 実行終了時に1回だけ書き出す表
#[derive(Debug, Clone, Default)]
pub struct ExportTable {
    records: Vec<DocumentRecord>,
}

impl ExportTable {
    pub fn new(records: Vec<DocumentRecord>) -> Self {
        Self { records }
    }

    pub fn write_to<W: std::io::Write>(&self, writer: W) -> Result<(), ScraperError> {
        let mut csv = csv::Writer::from_writer(writer);

        if self.records.is_empty() {
            csv.write_record(HEADERS)?;
        }
        for record in &self.records {
            csv.serialize(ExportRow {
                code: &record.code,
                name: &record.name,
                reasoned_opinions: &record.reasoned_opinion_count,
                political_dialogues: &record.political_dialogue_count,
                important_information: &record.important_info_count,
                adoption_date: &record.adoption_date,
                legal_basis: &record.legal_basis,
                reference_letter_date: &record.reference_letter_date,
                subsidiarity_deadline: &record.subsidiarity_deadline,
                parliament_data: serde_json::to_string(&record.parliaments)?,
            })?;
        }

        csv.flush()?;
        Ok(())
    }

    pub fn write(&self, path: &Path) -> Result<(), ScraperError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let file = std::fs::File::create(path)?;
        self.write_to(file)?;
        info!("Data exported to {:?} ({} rows)", path, self.records.len());
        Ok(())
    }
}

const HEADERS: [&str; 10] = [
    "Document Code",
    "Document Name",
    "Reasoned Opinions",
    "Political Dialogues",
    "Important Information to Exchange",
    "Adoption Date",
    "Legal Basis",
    "Reference Letter Date",
    "Subsidiarity Deadline",
    "Parliament Data",
];
