use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;

use calamine::{open_workbook, Data, Reader, Xlsx};
use rust_xlsxwriter::{Color, Format, FormatBorder, Workbook, XlsxError};
use tracing::{debug, info, warn};

use super::{LedgerStore, MergeResult};
use crate::config::Settings;
use crate::dedup::TrendRecord;
use crate::error::StoreError;
use crate::ledger::{is_banded, CollectionStamp, Ledger, COLUMNS, HEADER};
use crate::persist;

const HEADER_FILL: u32 = 0xE6F2FF;
const BAND_FILL: u32 = 0xF2F2F2;
// character units, matching the remote sheet's 150/70/200 px
const COLUMN_WIDTHS: [f64; COLUMNS] = [20.0, 20.0, 9.0, 27.0, 27.0, 27.0];

/// The local xlsx ledger: a single named sheet, header on the first row.
pub struct WorkbookStore {
    path: PathBuf,
    sheet_title: String,
    keep_backups: bool,
    salvage_unreadable: bool,
    recovery_dir: PathBuf,
}

impl WorkbookStore {
    pub fn new(path: PathBuf, sheet_title: &str, recovery_dir: PathBuf) -> Self {
        WorkbookStore {
            path,
            sheet_title: sheet_title.to_string(),
            keep_backups: true,
            salvage_unreadable: false,
            recovery_dir,
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        WorkbookStore::new(
            settings.workbook_path(),
            &settings.sheet_title,
            settings.recovery_dir(),
        )
        .keep_backups(settings.keep_backups)
        .salvage_unreadable(settings.salvage_unreadable_store)
    }

    pub fn keep_backups(mut self, keep: bool) -> Self {
        self.keep_backups = keep;
        self
    }

    pub fn salvage_unreadable(mut self, salvage: bool) -> Self {
        self.salvage_unreadable = salvage;
        self
    }

    #[cfg(test)]
    pub fn path(&self) -> &std::path::Path {
        &self.path
    }

    fn read_error(&self, reason: String) -> StoreError {
        StoreError::Read {
            location: self.path.display().to_string(),
            reason,
        }
    }

    /// Open the workbook, `None` when none exists yet.
    fn open(&self) -> Result<Option<Xlsx<BufReader<File>>>, StoreError> {
        if !self.path.exists() {
            return Ok(None);
        }
        let workbook =
            open_workbook::<Xlsx<_>, _>(&self.path).map_err(|e| self.read_error(e.to_string()))?;
        Ok(Some(workbook))
    }

    /// Read the ledger sheet. The rewrite only ever carries the ledger
    /// sheet, so a workbook holding any other sheet is refused untouched.
    fn read_ledger(&self, workbook: &mut Xlsx<BufReader<File>>) -> Result<Ledger, StoreError> {
        let names = workbook.sheet_names();
        let foreign: Vec<&str> = names
            .iter()
            .map(String::as_str)
            .filter(|n| *n != self.sheet_title)
            .collect();
        if !foreign.is_empty() {
            return Err(self.read_error(format!(
                "workbook holds sheets other than {:?} ({}); refusing to rewrite it",
                self.sheet_title,
                foreign.join(", ")
            )));
        }
        if names.is_empty() {
            debug!("{:?} has no sheets", self.path);
            return Ok(Ledger::default());
        }
        let range = workbook
            .worksheet_range(&self.sheet_title)
            .map_err(|e| self.read_error(e.to_string()))?;
        let table: Vec<Vec<String>> = range
            .rows()
            .map(|row| row.iter().map(cell_text).collect())
            .collect();
        Ok(Ledger::from_table(&table))
    }

    #[cfg(test)]
    pub fn load(&self) -> Result<Option<Ledger>, StoreError> {
        match self.open()? {
            Some(mut workbook) => self.read_ledger(&mut workbook).map(Some),
            None => Ok(None),
        }
    }

    /// Serialize the whole ledger with header styling, banding, a frozen
    /// header row and an autofilter over the data.
    pub fn render(&self, ledger: &Ledger) -> Result<Vec<u8>, XlsxError> {
        let header_format = Format::new()
            .set_bold()
            .set_background_color(Color::RGB(HEADER_FILL))
            .set_border_bottom(FormatBorder::Thin);
        let band_format = Format::new().set_background_color(Color::RGB(BAND_FILL));
        let plain_format = Format::new();

        let mut workbook = Workbook::new();
        let sheet = workbook.add_worksheet();
        sheet.set_name(&self.sheet_title)?;

        for (col, title) in HEADER.iter().enumerate() {
            sheet.write_string_with_format(0, col as u16, *title, &header_format)?;
        }
        for (i, row) in ledger.rows().iter().enumerate() {
            let r = i + 1;
            let format = if is_banded(r) { &band_format } else { &plain_format };
            let r = r as u32;
            sheet.write_string_with_format(r, 0, &row.date, format)?;
            sheet.write_string_with_format(r, 1, &row.time, format)?;
            sheet.write_number_with_format(r, 2, row.rank as f64, format)?;
            sheet.write_string_with_format(r, 3, &row.title, format)?;
            sheet.write_string_with_format(r, 4, &row.volume, format)?;
            sheet.write_string_with_format(r, 5, &row.growth, format)?;
        }
        for (col, width) in COLUMN_WIDTHS.iter().enumerate() {
            sheet.set_column_width(col as u16, *width)?;
        }
        sheet.set_freeze_panes(1, 0)?;
        sheet.autofilter(0, 0, ledger.len() as u32, (COLUMNS - 1) as u16)?;

        workbook.save_to_buffer()
    }

    /// Salvage only covers a file that cannot be opened at all; a readable
    /// workbook with foreign sheets is never moved.
    fn open_or_salvage(&self, stamp: &CollectionStamp) -> Result<(Ledger, bool), StoreError> {
        match self.open() {
            Ok(Some(mut workbook)) => Ok((self.read_ledger(&mut workbook)?, true)),
            Ok(None) => Ok((Ledger::default(), false)),
            Err(e) if self.salvage_unreadable => {
                warn!("{}; starting a fresh ledger", e);
                let moved = persist::set_aside(&self.path, "corrupt", &stamp.file_tag)
                    .map_err(|se| self.read_error(format!("{:#}", se)))?;
                warn!("Unreadable workbook moved to {:?}", moved);
                Ok((Ledger::default(), false))
            }
            Err(e) => Err(e),
        }
    }
}

impl LedgerStore for WorkbookStore {
    fn label(&self) -> &'static str {
        "workbook"
    }

    fn location(&self) -> String {
        self.path.display().to_string()
    }

    fn merge(
        &mut self,
        batch: &[TrendRecord],
        stamp: &CollectionStamp,
    ) -> Result<MergeResult, StoreError> {
        let (mut ledger, existed) = self.open_or_salvage(stamp)?;
        let before = ledger.len();
        let fresh = ledger.append_batch(batch, stamp);
        debug!("Workbook had {} rows, {} new", before, fresh.len());

        if fresh.is_empty() && existed {
            info!("No new rows for {:?}", self.path);
            return Ok(MergeResult {
                added: 0,
                final_rows: ledger.len(),
                location: self.location(),
            });
        }

        ledger.sort_recent_first();
        let backup_tag = self.keep_backups.then_some(stamp.file_tag.as_str());
        let committed = self
            .render(&ledger)
            .map_err(anyhow::Error::from)
            .and_then(|bytes| persist::write_atomic(&self.path, &bytes, backup_tag));

        if let Err(e) = committed {
            let recovery = persist::spill_recovery(&self.recovery_dir, self.label(), &stamp.file_tag, &fresh)
                .map_err(|re| warn!("Could not write recovery file: {:#}", re))
                .ok();
            return Err(StoreError::Write {
                location: self.location(),
                reason: format!("{:#}", e),
                recovery,
            });
        }

        info!("Appended {} rows to {:?} ({} total)", fresh.len(), self.path, ledger.len());
        Ok(MergeResult {
            added: fresh.len(),
            final_rows: ledger.len(),
            location: self.location(),
        })
    }
}

fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        other => other.to_string(),
    }
}
