use std::collections::HashSet;

use chrono::{DateTime, Local, Utc};
use serde::Serialize;

use crate::dedup::TrendRecord;

pub const HEADER: [&str; 6] = [
    "collection date",
    "collection time",
    "rank",
    "title",
    "volume",
    "growth",
];
pub const COLUMNS: usize = HEADER.len();

/// The collection instant, captured once per run and shared by every row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionStamp {
    pub date: String,
    pub time: String,
    /// Filesystem-safe UTC timestamp for output and backup file names.
    pub file_tag: String,
}

impl CollectionStamp {
    pub fn now() -> Self {
        Self::at(Utc::now())
    }

    pub fn at(instant: DateTime<Utc>) -> Self {
        let local = instant.with_timezone(&Local);
        CollectionStamp {
            date: local.format("%Y-%m-%d").to_string(),
            time: local.format("%H:%M:%S").to_string(),
            file_tag: instant.format("%Y-%m-%dT%H-%M-%S").to_string(),
        }
    }

    #[cfg(test)]
    pub fn new(date: impl Into<String>, time: impl Into<String>) -> Self {
        let date = date.into();
        let time = time.into();
        let file_tag = format!("{}T{}", date, time).replace(':', "-");
        CollectionStamp { date, time, file_tag }
    }
}

/// `(collection date, collection time, title)`: unique across a ledger.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DedupKey(pub String, pub String, pub String);

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LedgerRow {
    pub date: String,
    pub time: String,
    pub rank: u32,
    pub title: String,
    pub volume: String,
    pub growth: String,
}

impl LedgerRow {
    pub fn from_record(record: &TrendRecord, stamp: &CollectionStamp) -> Self {
        LedgerRow {
            date: stamp.date.clone(),
            time: stamp.time.clone(),
            rank: record.rank,
            title: record.title.clone(),
            volume: record.volume.clone(),
            growth: record.growth.clone(),
        }
    }

    /// Parse a stored row; short rows are padded. `None` for blank rows.
    pub fn from_cells<S: AsRef<str>>(cells: &[S]) -> Option<Self> {
        let cell = |i: usize| {
            cells
                .get(i)
                .map(|c| c.as_ref().trim().to_string())
                .unwrap_or_default()
        };
        if (0..COLUMNS).all(|i| cell(i).is_empty()) {
            return None;
        }
        // numeric cells may come back as "3" or "3.0"
        let rank = cell(2)
            .parse::<f64>()
            .ok()
            .filter(|r| r.is_finite() && *r >= 0.0)
            .map(|r| r as u32)
            .unwrap_or(0);
        Some(LedgerRow {
            date: cell(0),
            time: cell(1),
            rank,
            title: cell(3),
            volume: cell(4),
            growth: cell(5),
        })
    }

    pub fn to_cells(&self) -> Vec<String> {
        vec![
            self.date.clone(),
            self.time.clone(),
            self.rank.to_string(),
            self.title.clone(),
            self.volume.clone(),
            self.growth.clone(),
        ]
    }

    pub fn key(&self) -> DedupKey {
        DedupKey(self.date.clone(), self.time.clone(), self.title.clone())
    }
}

/// Data rows of a tabular store (header excluded).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Ledger {
    rows: Vec<LedgerRow>,
}

impl Ledger {
    /// Build from a raw cell grid whose first row is the header.
    pub fn from_table<S: AsRef<str>>(table: &[Vec<S>]) -> Self {
        let rows = table
            .iter()
            .skip(1)
            .filter_map(|r| LedgerRow::from_cells(r.as_slice()))
            .collect();
        Ledger { rows }
    }

    pub fn rows(&self) -> &[LedgerRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn keys(&self) -> HashSet<DedupKey> {
        self.rows.iter().map(LedgerRow::key).collect()
    }

    /// Append the rows of `batch` whose key is new; returns what was appended.
    pub fn append_batch(&mut self, batch: &[TrendRecord], stamp: &CollectionStamp) -> Vec<LedgerRow> {
        let mut keys = self.keys();
        let fresh = plan_append(&mut keys, batch, stamp);
        self.rows.extend(fresh.iter().cloned());
        fresh
    }

    /// Most recent collection first; ties keep their relative order.
    pub fn sort_recent_first(&mut self) {
        self.rows
            .sort_by(|a, b| b.date.cmp(&a.date).then_with(|| b.time.cmp(&a.time)));
    }
}

/// Rows for the records whose key is absent from `existing`, in rank order.
/// Keys of the planned rows are added to `existing`.
pub fn plan_append(
    existing: &mut HashSet<DedupKey>,
    batch: &[TrendRecord],
    stamp: &CollectionStamp,
) -> Vec<LedgerRow> {
    let mut ordered: Vec<&TrendRecord> = batch.iter().collect();
    ordered.sort_by_key(|r| r.rank);
    ordered
        .into_iter()
        .map(|r| LedgerRow::from_record(r, stamp))
        .filter(|row| existing.insert(row.key()))
        .collect()
}

/// Zebra striping: sheet row 0 is the header, odd sheet rows are shaded.
pub fn is_banded(sheet_row: usize) -> bool {
    sheet_row % 2 == 1
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(rank: u32, title: &str) -> TrendRecord {
        TrendRecord {
            rank,
            title: title.into(),
            volume: format!("search: {title}"),
            growth: "no information".into(),
        }
    }

    fn assert_unique(ledger: &Ledger) {
        let keys = ledger.keys();
        assert_eq!(keys.len(), ledger.len(), "duplicate dedup key in ledger");
    }

    #[test]
    fn empty_ledger_then_idempotent_rerun() {
        let stamp = CollectionStamp::new("2024-01-01", "10:00");
        let batch = vec![record(1, "A"), record(2, "B")];
        let mut ledger = Ledger::default();

        let added = ledger.append_batch(&batch, &stamp);
        assert_eq!(added.len(), 2);
        assert_eq!(ledger.rows()[0].rank, 1);
        assert_eq!(ledger.rows()[0].title, "A");
        assert_eq!(ledger.rows()[1].rank, 2);
        assert_eq!(ledger.rows()[1].title, "B");

        let again = ledger.append_batch(&batch, &stamp);
        assert!(again.is_empty());
        assert_eq!(ledger.len(), 2);
        assert_unique(&ledger);
    }

    #[test]
    fn new_instant_adds_same_titles() {
        let batch = vec![record(1, "A"), record(2, "B")];
        let mut ledger = Ledger::default();
        ledger.append_batch(&batch, &CollectionStamp::new("2024-01-01", "10:00"));
        let added = ledger.append_batch(&batch, &CollectionStamp::new("2024-01-01", "11:00"));
        assert_eq!(added.len(), 2);
        assert_eq!(ledger.len(), 4);
        assert_unique(&ledger);
    }

    #[test]
    fn duplicate_titles_in_batch_are_skipped() {
        let stamp = CollectionStamp::new("2024-01-01", "10:00");
        let batch = vec![record(2, "A"), record(1, "A")];
        let mut ledger = Ledger::default();
        let added = ledger.append_batch(&batch, &stamp);
        assert_eq!(added.len(), 1);
        assert_eq!(added[0].rank, 1);
    }

    #[test]
    fn sorts_recent_first_stably() {
        let mut ledger = Ledger::default();
        ledger.append_batch(&[record(1, "old")], &CollectionStamp::new("2023-12-31", "23:00:00"));
        ledger.append_batch(
            &[record(1, "x"), record(2, "y")],
            &CollectionStamp::new("2024-01-01", "09:00:00"),
        );
        ledger.append_batch(&[record(1, "later")], &CollectionStamp::new("2024-01-01", "10:00:00"));
        ledger.sort_recent_first();
        let titles: Vec<&str> = ledger.rows().iter().map(|r| r.title.as_str()).collect();
        assert_eq!(titles, vec!["later", "x", "y", "old"]);
    }

    #[test]
    fn table_roundtrip_skips_header_and_blank_rows() {
        let table = vec![
            HEADER.iter().map(|s| s.to_string()).collect::<Vec<_>>(),
            vec!["2024-01-01".into(), "10:00".into(), "1.0".into(), "A".into()],
            vec![String::new(); 6],
            LedgerRow::from_record(&record(2, "B"), &CollectionStamp::new("2024-01-01", "10:00"))
                .to_cells(),
        ];
        let ledger = Ledger::from_table(&table);
        assert_eq!(ledger.len(), 2);
        assert_eq!(ledger.rows()[0].rank, 1);
        assert_eq!(ledger.rows()[0].volume, "");
        assert_eq!(ledger.rows()[1].title, "B");
    }

    #[test]
    fn banding_starts_on_first_data_row() {
        assert!(!is_banded(0));
        assert!(is_banded(1));
        assert!(!is_banded(2));
    }

    #[test]
    fn file_tag_has_no_colons() {
        let stamp = CollectionStamp::new("2024-01-01", "10:00:05");
        assert_eq!(stamp.file_tag, "2024-01-01T10-00-05");
        assert!(!CollectionStamp::now().file_tag.contains(':'));
    }
}
