use std::path::PathBuf;

use tracing::{debug, info, warn};

use super::{LedgerStore, MergeResult};
use crate::dedup::TrendRecord;
use crate::error::StoreError;
use crate::ledger::{is_banded, plan_append, CollectionStamp, Ledger, COLUMNS, HEADER};
use crate::persist;

/// RGB fill with components in `0.0..=1.0`, as the sheets API expects.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rgb(pub f32, pub f32, pub f32);

pub const HEADER_FILL: Rgb = Rgb(0.9, 0.95, 1.0);
pub const BAND_FILL: Rgb = Rgb(0.95, 0.95, 0.95);
pub const PLAIN_FILL: Rgb = Rgb(1.0, 1.0, 1.0);
pub const COLUMN_PIXELS: [(usize, usize, u32); 3] = [(0, 2, 150), (2, 3, 70), (3, 6, 200)];

/// Presentation and layout edits sent in one batch. Row and column bounds
/// are zero-based and end-exclusive.
#[derive(Debug, Clone, PartialEq)]
pub enum SheetRequest {
    FillRows {
        sheet_id: i64,
        start_row: usize,
        end_row: usize,
        fill: Rgb,
        bold: bool,
    },
    FreezeRows {
        sheet_id: i64,
        rows: usize,
    },
    ColumnWidth {
        sheet_id: i64,
        start_col: usize,
        end_col: usize,
        pixels: u32,
    },
    /// Sort data rows by date then time, descending.
    SortRecentFirst {
        sheet_id: i64,
        end_row: usize,
    },
    SetFilter {
        sheet_id: i64,
        end_row: usize,
    },
}

/// The operations the ledger needs from a remote spreadsheet.
pub trait SheetsApi {
    fn find_sheet(&mut self, title: &str) -> Result<Option<i64>, StoreError>;
    fn add_sheet(&mut self, title: &str) -> Result<i64, StoreError>;
    /// Rows up to the last used one, header included. Interior blank rows
    /// come back empty.
    fn read_rows(&mut self, title: &str) -> Result<Vec<Vec<String>>, StoreError>;
    /// Overwrite rows starting at the first cell.
    fn write_rows(&mut self, title: &str, rows: &[Vec<String>]) -> Result<(), StoreError>;
    fn append_rows(&mut self, title: &str, rows: &[Vec<String>]) -> Result<(), StoreError>;
    fn batch_update(&mut self, requests: &[SheetRequest]) -> Result<(), StoreError>;
    fn url(&self) -> String;
}

/// Ledger kept in a remote spreadsheet tab.
pub struct SheetStore<C: SheetsApi> {
    client: C,
    title: String,
    recovery_dir: PathBuf,
}

impl<C: SheetsApi> SheetStore<C> {
    pub fn new(client: C, title: &str, recovery_dir: PathBuf) -> Self {
        SheetStore {
            client,
            title: title.to_string(),
            recovery_dir,
        }
    }

    #[cfg(test)]
    pub fn client(&self) -> &C {
        &self.client
    }

    /// Find the ledger tab, creating and styling it on first use.
    fn ensure_sheet(&mut self) -> Result<i64, StoreError> {
        if let Some(id) = self.client.find_sheet(&self.title)? {
            return Ok(id);
        }
        info!("Creating sheet {:?}", self.title);
        let id = self.client.add_sheet(&self.title)?;
        let header: Vec<String> = HEADER.iter().map(|s| s.to_string()).collect();
        self.client.write_rows(&self.title, &[header])?;

        let mut requests = vec![
            SheetRequest::FillRows {
                sheet_id: id,
                start_row: 0,
                end_row: 1,
                fill: HEADER_FILL,
                bold: true,
            },
            SheetRequest::FreezeRows { sheet_id: id, rows: 1 },
        ];
        requests.extend(COLUMN_PIXELS.iter().map(|&(start_col, end_col, pixels)| {
            SheetRequest::ColumnWidth {
                sheet_id: id,
                start_col,
                end_col,
                pixels,
            }
        }));
        self.client.batch_update(&requests)?;
        Ok(id)
    }
}

/// Requests that re-sort the data and redraw banding over the `rows` sheet
/// rows below the header, blank ones included.
pub fn presentation_requests(sheet_id: i64, rows: usize) -> Vec<SheetRequest> {
    let end_row = rows + 1;
    let mut requests = vec![
        SheetRequest::SortRecentFirst { sheet_id, end_row },
        SheetRequest::FillRows {
            sheet_id,
            start_row: 1,
            end_row,
            fill: PLAIN_FILL,
            bold: false,
        },
    ];
    requests.extend((1..end_row).filter(|r| is_banded(*r)).map(|r| SheetRequest::FillRows {
        sheet_id,
        start_row: r,
        end_row: r + 1,
        fill: BAND_FILL,
        bold: false,
    }));
    requests.push(SheetRequest::FreezeRows { sheet_id, rows: 1 });
    requests.push(SheetRequest::SetFilter { sheet_id, end_row });
    requests
}

impl<C: SheetsApi> LedgerStore for SheetStore<C> {
    fn label(&self) -> &'static str {
        "sheet"
    }

    fn location(&self) -> String {
        self.client.url()
    }

    fn merge(
        &mut self,
        batch: &[TrendRecord],
        stamp: &CollectionStamp,
    ) -> Result<MergeResult, StoreError> {
        let sheet_id = self.ensure_sheet()?;
        let raw = self.client.read_rows(&self.title)?;
        let existing = Ledger::from_table(&raw);
        let mut keys = existing.keys();
        let fresh = plan_append(&mut keys, batch, stamp);
        debug!("Sheet has {} rows, {} new", existing.len(), fresh.len());

        if fresh.is_empty() {
            info!("No new rows for sheet {:?}", self.title);
            return Ok(MergeResult {
                added: 0,
                final_rows: existing.len(),
                location: self.location(),
            });
        }

        let cells: Vec<Vec<String>> = fresh.iter().map(|r| r.to_cells()).collect();
        debug_assert!(cells.iter().all(|r| r.len() == COLUMNS));
        if let Err(e) = self.client.append_rows(&self.title, &cells) {
            let recovery = persist::spill_recovery(&self.recovery_dir, self.label(), &stamp.file_tag, &fresh)
                .map_err(|re| warn!("Could not write recovery file: {:#}", re))
                .ok();
            return Err(StoreError::Write {
                location: self.location(),
                reason: e.to_string(),
                recovery,
            });
        }

        let total = existing.len() + fresh.len();
        // appended rows land after the last used row, interior blanks included
        let span = raw.len().max(1) - 1 + fresh.len();
        // rows are already stored; a styling failure only costs presentation
        if let Err(e) = self.client.batch_update(&presentation_requests(sheet_id, span)) {
            warn!("Rows appended but sheet formatting failed: {}", e);
        }

        info!("Appended {} rows to sheet {:?} ({} total)", fresh.len(), self.title, total);
        Ok(MergeResult {
            added: fresh.len(),
            final_rows: total,
            location: self.location(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// In-memory spreadsheet with a single tab.
    #[derive(Default)]
    struct MemorySheet {
        pub sheet: Option<(i64, String)>,
        pub rows: Vec<Vec<String>>,
        pub requests: Vec<SheetRequest>,
        pub fail_append: bool,
    }

    impl SheetsApi for MemorySheet {
        fn find_sheet(&mut self, title: &str) -> Result<Option<i64>, StoreError> {
            Ok(self.sheet.as_ref().filter(|(_, t)| t == title).map(|(id, _)| *id))
        }

        fn add_sheet(&mut self, title: &str) -> Result<i64, StoreError> {
            self.sheet = Some((7, title.to_string()));
            Ok(7)
        }

        fn read_rows(&mut self, _: &str) -> Result<Vec<Vec<String>>, StoreError> {
            Ok(self.rows.clone())
        }

        fn write_rows(&mut self, _: &str, rows: &[Vec<String>]) -> Result<(), StoreError> {
            for (i, row) in rows.iter().enumerate() {
                if i < self.rows.len() {
                    self.rows[i] = row.clone();
                } else {
                    self.rows.push(row.clone());
                }
            }
            Ok(())
        }

        fn append_rows(&mut self, _: &str, rows: &[Vec<String>]) -> Result<(), StoreError> {
            if self.fail_append {
                return Err(StoreError::Remote("quota exceeded".into()));
            }
            self.rows.extend(rows.iter().cloned());
            Ok(())
        }

        fn batch_update(&mut self, requests: &[SheetRequest]) -> Result<(), StoreError> {
            for request in requests {
                if let SheetRequest::SortRecentFirst { end_row, .. } = request {
                    let end = (*end_row).min(self.rows.len());
                    self.rows[1..end].sort_by(|a, b| b[0].cmp(&a[0]).then_with(|| b[1].cmp(&a[1])));
                }
            }
            self.requests.extend(requests.iter().cloned());
            Ok(())
        }

        fn url(&self) -> String {
            "memory://sheet".to_string()
        }
    }

    fn record(rank: u32, title: &str) -> TrendRecord {
        TrendRecord {
            rank,
            title: title.into(),
            volume: "v".into(),
            growth: "g".into(),
        }
    }

    fn store(client: MemorySheet, dir: &std::path::Path) -> SheetStore<MemorySheet> {
        SheetStore::new(client, "Google Trends", dir.join("recovery"))
    }

    #[test]
    fn creates_styled_sheet_then_merges_idempotently() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = store(MemorySheet::default(), dir.path());
        let stamp = CollectionStamp::new("2024-01-01", "10:00:00");
        let batch = vec![record(1, "A"), record(2, "B")];

        let first = store.merge(&batch, &stamp).unwrap();
        assert_eq!((first.added, first.final_rows), (2, 2));
        let rows = &store.client().rows;
        assert_eq!(rows[0][0], HEADER[0]);
        assert_eq!(rows[1][3], "A");
        assert!(store.client().requests.contains(&SheetRequest::FreezeRows { sheet_id: 7, rows: 1 }));

        let second = store.merge(&batch, &stamp).unwrap();
        assert_eq!((second.added, second.final_rows), (0, 2));
        assert_eq!(store.client().rows.len(), 3);
    }

    #[test]
    fn new_rows_sorted_to_top() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = store(MemorySheet::default(), dir.path());
        store
            .merge(&[record(1, "A")], &CollectionStamp::new("2024-01-01", "09:00:00"))
            .unwrap();
        store
            .merge(&[record(1, "A")], &CollectionStamp::new("2024-01-01", "10:00:00"))
            .unwrap();
        let rows = &store.client().rows;
        assert_eq!(rows[1][1], "10:00:00");
        assert_eq!(rows[2][1], "09:00:00");
    }

    #[test]
    fn banding_covers_odd_data_rows() {
        let requests = presentation_requests(3, 4);
        let banded: Vec<usize> = requests
            .iter()
            .filter_map(|r| match r {
                SheetRequest::FillRows { start_row, fill, .. } if *fill == BAND_FILL => Some(*start_row),
                _ => None,
            })
            .collect();
        assert_eq!(banded, vec![1, 3]);
        assert!(requests.contains(&SheetRequest::SetFilter { sheet_id: 3, end_row: 5 }));
    }

    #[test]
    fn presentation_spans_blank_rows() {
        let dir = tempfile::tempdir().unwrap();
        let row = |time: &str, title: &str| -> Vec<String> {
            ["2024-01-01", time, "1", title, "v", "g"].iter().map(|s| s.to_string()).collect()
        };
        let client = MemorySheet {
            sheet: Some((7, "Google Trends".into())),
            rows: vec![
                HEADER.iter().map(|s| s.to_string()).collect(),
                row("09:00:00", "A"),
                vec![String::new(); COLUMNS],
                row("08:00:00", "B"),
            ],
            ..Default::default()
        };
        let mut store = store(client, dir.path());

        let result = store
            .merge(&[record(1, "C")], &CollectionStamp::new("2024-01-01", "10:00:00"))
            .unwrap();
        assert_eq!((result.added, result.final_rows), (1, 3));
        assert!(store
            .client()
            .requests
            .contains(&SheetRequest::SetFilter { sheet_id: 7, end_row: 5 }));
        let titles: Vec<&str> = store.client().rows[1..4].iter().map(|r| r[3].as_str()).collect();
        assert_eq!(titles, vec!["C", "A", "B"]);
    }

    #[test]
    fn failed_append_spills_attempted_rows() {
        let dir = tempfile::tempdir().unwrap();
        let client = MemorySheet {
            fail_append: true,
            ..Default::default()
        };
        let mut store = store(client, dir.path());
        let err = store
            .merge(&[record(1, "A")], &CollectionStamp::new("2024-01-01", "10:00:00"))
            .unwrap_err();
        let recovery = err.recovery_file().unwrap();
        let spilled: serde_json::Value =
            serde_json::from_slice(&std::fs::read(recovery).unwrap()).unwrap();
        assert_eq!(spilled[0]["title"], "A");
        assert_eq!(store.client().rows.len(), 1);
    }
}
