use std::time::Duration;

use reqwest::blocking::{Client, RequestBuilder};
use reqwest::Url;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use super::auth::Credentials;
use super::sheets::{Rgb, SheetRequest, SheetsApi};
use crate::config::Settings;
use crate::error::StoreError;
use crate::ledger::COLUMNS;

const API_BASE: &str = "https://sheets.googleapis.com/v4/spreadsheets";

#[derive(Deserialize)]
struct SpreadsheetMeta {
    #[serde(default)]
    sheets: Vec<SheetMeta>,
}

#[derive(Deserialize)]
struct SheetMeta {
    properties: SheetProperties,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SheetProperties {
    sheet_id: i64,
    title: String,
}

#[derive(Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

/// Sheets v4 REST client.
pub struct RestSheets {
    http: Client,
    base: String,
    spreadsheet_id: String,
    credentials: Credentials,
}

impl RestSheets {
    pub fn new(spreadsheet_id: &str, credentials: Credentials) -> Result<Self, StoreError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| StoreError::Remote(e.to_string()))?;
        Ok(RestSheets {
            http,
            base: API_BASE.to_string(),
            spreadsheet_id: spreadsheet_id.to_string(),
            credentials,
        })
    }

    pub fn from_settings(settings: &Settings) -> Result<Self, StoreError> {
        let id = settings
            .spreadsheet_id
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| StoreError::NotConfigured("spreadsheet id is not set".into()))?;
        RestSheets::new(id, Credentials::from_settings(settings)?)
    }

    fn spreadsheet_url(&self) -> String {
        format!("{}/{}", self.base, self.spreadsheet_id)
    }

    /// `.../values/<range><suffix>`, with the range percent-encoded.
    fn values_url(&self, range: &str, suffix: &str) -> Result<Url, StoreError> {
        let mut url = Url::parse(&self.spreadsheet_url()).map_err(|e| StoreError::Remote(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|_| StoreError::Remote(format!("cannot build values url from {}", self.base)))?
            .push("values")
            .push(&format!("{}{}", range, suffix));
        Ok(url)
    }

    fn send(&mut self, request: RequestBuilder) -> Result<Value, StoreError> {
        let token = self.credentials.bearer(&self.http)?;
        let response = request
            .bearer_auth(token)
            .send()
            .and_then(|r| r.error_for_status())
            .map_err(|e| StoreError::Remote(e.to_string()))?;
        response.json().map_err(|e| StoreError::Remote(e.to_string()))
    }
}

/// `'Title'!A:F`
fn sheet_range(title: &str) -> String {
    let last = (b'A' + COLUMNS as u8 - 1) as char;
    format!("'{}'!A:{}", title.replace('\'', "''"), last)
}

fn color(rgb: Rgb) -> Value {
    json!({ "red": rgb.0, "green": rgb.1, "blue": rgb.2 })
}

fn grid(sheet_id: i64, start_row: usize, end_row: usize) -> Value {
    json!({
        "sheetId": sheet_id,
        "startRowIndex": start_row,
        "endRowIndex": end_row,
        "startColumnIndex": 0,
        "endColumnIndex": COLUMNS,
    })
}

/// Wire form of a request for `spreadsheets.batchUpdate`.
pub fn request_json(request: &SheetRequest) -> Value {
    match *request {
        SheetRequest::FillRows {
            sheet_id,
            start_row,
            end_row,
            fill,
            bold,
        } => json!({
            "repeatCell": {
                "range": grid(sheet_id, start_row, end_row),
                "cell": { "userEnteredFormat": {
                    "backgroundColor": color(fill),
                    "textFormat": { "bold": bold },
                }},
                "fields": "userEnteredFormat(backgroundColor,textFormat)",
            }
        }),
        SheetRequest::FreezeRows { sheet_id, rows } => json!({
            "updateSheetProperties": {
                "properties": { "sheetId": sheet_id, "gridProperties": { "frozenRowCount": rows } },
                "fields": "gridProperties.frozenRowCount",
            }
        }),
        SheetRequest::ColumnWidth {
            sheet_id,
            start_col,
            end_col,
            pixels,
        } => json!({
            "updateDimensionProperties": {
                "range": {
                    "sheetId": sheet_id,
                    "dimension": "COLUMNS",
                    "startIndex": start_col,
                    "endIndex": end_col,
                },
                "properties": { "pixelSize": pixels },
                "fields": "pixelSize",
            }
        }),
        SheetRequest::SortRecentFirst { sheet_id, end_row } => json!({
            "sortRange": {
                "range": grid(sheet_id, 1, end_row),
                "sortSpecs": [
                    { "dimensionIndex": 0, "sortOrder": "DESCENDING" },
                    { "dimensionIndex": 1, "sortOrder": "DESCENDING" },
                ],
            }
        }),
        SheetRequest::SetFilter { sheet_id, end_row } => json!({
            "setBasicFilter": { "filter": { "range": grid(sheet_id, 0, end_row) } }
        }),
    }
}

fn cell_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

impl SheetsApi for RestSheets {
    fn find_sheet(&mut self, title: &str) -> Result<Option<i64>, StoreError> {
        let request = self
            .http
            .get(self.spreadsheet_url())
            .query(&[("fields", "sheets.properties(sheetId,title)")]);
        let meta: SpreadsheetMeta =
            serde_json::from_value(self.send(request)?).map_err(|e| StoreError::Remote(e.to_string()))?;
        Ok(meta
            .sheets
            .into_iter()
            .find(|s| s.properties.title == title)
            .map(|s| s.properties.sheet_id))
    }

    fn add_sheet(&mut self, title: &str) -> Result<i64, StoreError> {
        let body = json!({ "requests": [{ "addSheet": { "properties": { "title": title } } }] });
        let url = format!("{}:batchUpdate", self.spreadsheet_url());
        let request = self.http.post(url).json(&body);
        let reply = self.send(request)?;
        reply
            .pointer("/replies/0/addSheet/properties/sheetId")
            .and_then(Value::as_i64)
            .ok_or_else(|| StoreError::Remote("addSheet reply has no sheet id".into()))
    }

    fn read_rows(&mut self, title: &str) -> Result<Vec<Vec<String>>, StoreError> {
        let url = self.values_url(&sheet_range(title), "")?;
        let request = self.http.get(url);
        let range: ValueRange = serde_json::from_value(self.send(request)?)
            .map_err(|e| StoreError::Remote(e.to_string()))?;
        debug!("Read {} rows from sheet {:?}", range.values.len(), title);
        Ok(range
            .values
            .iter()
            .map(|row| row.iter().map(cell_text).collect())
            .collect())
    }

    fn write_rows(&mut self, title: &str, rows: &[Vec<String>]) -> Result<(), StoreError> {
        let url = self.values_url(&format!("'{}'!A1", title.replace('\'', "''")), "")?;
        let request = self
            .http
            .put(url)
            .query(&[("valueInputOption", "RAW")])
            .json(&json!({ "values": rows }));
        self.send(request).map(|_| ())
    }

    fn append_rows(&mut self, title: &str, rows: &[Vec<String>]) -> Result<(), StoreError> {
        let url = self.values_url(&sheet_range(title), ":append")?;
        let request = self
            .http
            .post(url)
            .query(&[("valueInputOption", "RAW"), ("insertDataOption", "INSERT_ROWS")])
            .json(&json!({ "values": rows }));
        self.send(request).map(|_| ())
    }

    fn batch_update(&mut self, requests: &[SheetRequest]) -> Result<(), StoreError> {
        if requests.is_empty() {
            return Ok(());
        }
        let body = json!({ "requests": requests.iter().map(request_json).collect::<Vec<_>>() });
        let url = format!("{}:batchUpdate", self.spreadsheet_url());
        let request = self.http.post(url).json(&body);
        self.send(request).map(|_| ())
    }

    fn url(&self) -> String {
        format!("https://docs.google.com/spreadsheets/d/{}/edit", self.spreadsheet_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn range_quotes_title() {
        assert_eq!(sheet_range("Google Trends"), "'Google Trends'!A:F");
        assert_eq!(sheet_range("Bob's"), "'Bob''s'!A:F");
    }

    #[test]
    fn values_url_encodes_range() {
        let client = RestSheets::new("abc123", Credentials::Token("token".into())).unwrap();
        let url = client.values_url(&sheet_range("Google Trends"), ":append").unwrap();
        assert_eq!(
            url.as_str(),
            "https://sheets.googleapis.com/v4/spreadsheets/abc123/values/'Google%20Trends'!A:F:append"
        );
        assert_eq!(client.url(), "https://docs.google.com/spreadsheets/d/abc123/edit");
    }

    #[test]
    fn sort_request_skips_header() {
        let v = request_json(&SheetRequest::SortRecentFirst { sheet_id: 9, end_row: 4 });
        assert_eq!(v["sortRange"]["range"]["startRowIndex"], 1);
        assert_eq!(v["sortRange"]["range"]["endRowIndex"], 4);
        assert_eq!(v["sortRange"]["sortSpecs"][1]["dimensionIndex"], 1);
    }

    #[test]
    fn header_fill_is_bold() {
        let v = request_json(&SheetRequest::FillRows {
            sheet_id: 1,
            start_row: 0,
            end_row: 1,
            fill: Rgb(0.9, 0.95, 1.0),
            bold: true,
        });
        let format = &v["repeatCell"]["cell"]["userEnteredFormat"];
        assert_eq!(format["textFormat"]["bold"], true);
        assert!((format["backgroundColor"]["red"].as_f64().unwrap() - 0.9).abs() < 1e-6);
    }

    #[test]
    fn missing_id_is_not_configured() {
        let env = crate::config::Map::new();
        let settings = crate::config::resolve(None, &env).unwrap();
        assert!(matches!(
            RestSheets::from_settings(&settings),
            Err(StoreError::NotConfigured(_))
        ));
    }

    #[test]
    fn missing_credentials_is_not_configured() {
        let dir = tempfile::tempdir().unwrap();
        let env = crate::config::Map::new();
        let mut settings = crate::config::resolve(None, &env).unwrap();
        settings.spreadsheet_id = Some("abc123".into());
        settings.google_credentials_path = dir.path().join("credentials.json");
        assert!(matches!(
            RestSheets::from_settings(&settings),
            Err(StoreError::NotConfigured(_))
        ));

        settings.sheets_access_token = Some("token".into());
        let client = RestSheets::from_settings(&settings).unwrap();
        assert_eq!(client.url(), "https://docs.google.com/spreadsheets/d/abc123/edit");
    }
}
