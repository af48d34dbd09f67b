use std::path::PathBuf;

use serde::Serialize;
use tracing::{info, warn};

use super::{LedgerStore, MergeResult};
use crate::dedup::TrendRecord;
use crate::error::StoreError;
use crate::ledger::CollectionStamp;
use crate::persist;

/// One record of the per-run file. Field names are read by downstream
/// consumers and must not change.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct JsonTrend<'a> {
    title: &'a str,
    search_volume: &'a str,
    start_date: &'a str,
}

/// Writes each batch to its own `trends_<timestamp>.json`.
pub struct JsonRunFile {
    dir: PathBuf,
    recovery_dir: PathBuf,
}

impl JsonRunFile {
    pub fn new(dir: PathBuf, recovery_dir: PathBuf) -> Self {
        JsonRunFile { dir, recovery_dir }
    }

    pub fn path_for(&self, stamp: &CollectionStamp) -> PathBuf {
        self.dir.join(format!("trends_{}.json", stamp.file_tag))
    }
}

impl LedgerStore for JsonRunFile {
    fn label(&self) -> &'static str {
        "json"
    }

    fn location(&self) -> String {
        self.dir.display().to_string()
    }

    fn merge(
        &mut self,
        batch: &[TrendRecord],
        stamp: &CollectionStamp,
    ) -> Result<MergeResult, StoreError> {
        let path = self.path_for(stamp);
        let records: Vec<JsonTrend> = batch
            .iter()
            .map(|r| JsonTrend {
                title: &r.title,
                search_volume: &r.volume,
                start_date: &r.growth,
            })
            .collect();

        let written = serde_json::to_vec_pretty(&records)
            .map_err(anyhow::Error::from)
            .and_then(|bytes| persist::write_atomic(&path, &bytes, None));
        if let Err(e) = written {
            let recovery =
                persist::spill_recovery(&self.recovery_dir, self.label(), &stamp.file_tag, &batch)
                    .map_err(|re| warn!("Could not write recovery file: {:#}", re))
                    .ok();
            return Err(StoreError::Write {
                location: path.display().to_string(),
                reason: format!("{:#}", e),
                recovery,
            });
        }

        info!("Wrote {} records to {:?}", records.len(), path);
        Ok(MergeResult {
            added: batch.len(),
            final_rows: batch.len(),
            location: path.display().to_string(),
        })
    }
}
