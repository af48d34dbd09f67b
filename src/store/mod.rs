pub mod auth;
pub mod json;
pub mod rest;
pub mod sheets;
pub mod workbook;

use serde::Serialize;

use crate::config::Settings;
use crate::dedup::TrendRecord;
use crate::error::StoreError;
use crate::ledger::CollectionStamp;

pub use json::JsonRunFile;
pub use rest::RestSheets;
pub use sheets::SheetStore;
pub use workbook::WorkbookStore;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MergeResult {
    pub added: usize,
    /// Data rows after the merge, header excluded.
    pub final_rows: usize,
    pub location: String,
}

/// A persistent destination for a captured batch. Each store merges
/// independently; a failure in one never touches another.
pub trait LedgerStore {
    /// Short name used in logs, summaries and recovery file names.
    fn label(&self) -> &'static str;

    fn location(&self) -> String;

    fn merge(
        &mut self,
        batch: &[TrendRecord],
        stamp: &CollectionStamp,
    ) -> Result<MergeResult, StoreError>;
}

/// Stand-in for a store that was enabled but could not be set up; its merge
/// reports why.
pub struct Unconfigured {
    label: &'static str,
    reason: String,
}

impl LedgerStore for Unconfigured {
    fn label(&self) -> &'static str {
        self.label
    }

    fn location(&self) -> String {
        "-".to_string()
    }

    fn merge(&mut self, _: &[TrendRecord], _: &CollectionStamp) -> Result<MergeResult, StoreError> {
        Err(StoreError::NotConfigured(self.reason.clone()))
    }
}

/// Stores enabled by configuration, in commit order: JSON file, workbook,
/// remote sheet.
pub fn from_settings(settings: &Settings) -> Vec<Box<dyn LedgerStore>> {
    let mut stores: Vec<Box<dyn LedgerStore>> = Vec::new();

    if settings.save_to_json_file {
        stores.push(Box::new(JsonRunFile::new(
            settings.results_dir.clone(),
            settings.recovery_dir(),
        )));
    }
    if settings.save_to_excel_file {
        stores.push(Box::new(WorkbookStore::from_settings(settings)));
    }
    if settings.save_to_remote_sheet {
        match RestSheets::from_settings(settings) {
            Ok(client) => stores.push(Box::new(SheetStore::new(
                client,
                &settings.sheet_title,
                settings.recovery_dir(),
            ))),
            Err(e) => stores.push(Box::new(Unconfigured {
                label: "sheet",
                reason: e.to_string(),
            })),
        }
    }

    stores
}
