use std::path::{Path, PathBuf};

use ::config::{Config, ConfigError, Environment, File, Source, Value};
use serde::Deserialize;

use crate::parser::Locale;

pub use ::config::Map;

/// Prefix of per-option environment overrides, e.g. `TRENDS_TARGET_RECORD_COUNT`.
pub const ENV_PREFIX: &str = "TRENDS";
/// Takes precedence over every other source of `spreadsheet_id`.
pub const SPREADSHEET_ENV: &str = "GOOGLE_SPREADSHEET_ID";
pub const DEFAULT_SOURCE_URL: &str = "https://trends.google.com/trending?geo=US&hl=en&hours=4";
pub const DEFAULT_TARGET: i64 = 5;

/// camelCase keys of older config files and the option each one sets.
const LEGACY_KEYS: [(&str, &str); 5] = [
    ("savetojsonfile", "save_to_json_file"),
    ("savetoexcelfile", "save_to_excel_file"),
    ("savetoremotesheet", "save_to_remote_sheet"),
    ("targetrecordcount", "target_record_count"),
    ("spreadsheetid", "spreadsheet_id"),
];

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub save_to_json_file: bool,
    pub save_to_excel_file: bool,
    pub save_to_remote_sheet: bool,
    pub target_record_count: usize,
    #[serde(default)]
    pub spreadsheet_id: Option<String>,
    pub sheet_title: String,
    pub results_dir: PathBuf,
    pub workbook_file: String,
    pub locale: Locale,
    #[serde(default)]
    pub default_growth: Option<String>,
    pub keep_backups: bool,
    pub salvage_unreadable_store: bool,
    pub source_url: String,
    #[serde(default)]
    pub snapshot_path: Option<PathBuf>,
    /// Service-account key used for the remote sheet.
    pub google_credentials_path: PathBuf,
    /// Bearer token that bypasses the service-account exchange.
    #[serde(default)]
    pub sheets_access_token: Option<String>,
}

impl Settings {
    pub fn workbook_path(&self) -> PathBuf {
        self.results_dir.join(&self.workbook_file)
    }

    pub fn recovery_dir(&self) -> PathBuf {
        self.results_dir.join("recovery")
    }
}

/// Renames legacy camelCase keys of the wrapped source to their snake_case
/// option. A snake_case key present in the same source wins.
#[derive(Debug, Clone)]
struct LegacyKeys<S>(S);

impl<S> Source for LegacyKeys<S>
where
    S: Source + Clone + Send + Sync + 'static,
{
    fn clone_into_box(&self) -> Box<dyn Source + Send + Sync> {
        Box::new(self.clone())
    }

    fn collect(&self) -> Result<Map<String, Value>, ConfigError> {
        let mut renamed = Map::new();
        let mut legacy = Vec::new();
        for (key, value) in self.0.collect()? {
            let lower = key.to_lowercase();
            match LEGACY_KEYS.iter().find(|(old, _)| *old == lower) {
                Some((_, current)) => legacy.push((current.to_string(), value)),
                None => {
                    renamed.insert(key, value);
                }
            }
        }
        for (key, value) in legacy {
            renamed.entry(key).or_insert(value);
        }
        Ok(renamed)
    }
}

/// Merge defaults, the optional config file and `env`, later sources
/// winning. A missing file is not an error; a malformed one is.
pub fn resolve(file: Option<&Path>, env: &Map<String, String>) -> Result<Settings, ConfigError> {
    let mut builder = Config::builder()
        .set_default("save_to_json_file", true)?
        .set_default("save_to_excel_file", true)?
        .set_default("save_to_remote_sheet", false)?
        .set_default("target_record_count", DEFAULT_TARGET)?
        .set_default("sheet_title", "Google Trends")?
        .set_default("results_dir", "results")?
        .set_default("workbook_file", "google_trends.xlsx")?
        .set_default("locale", "en")?
        .set_default("keep_backups", true)?
        .set_default("salvage_unreadable_store", false)?
        .set_default("source_url", DEFAULT_SOURCE_URL)?
        .set_default("google_credentials_path", "credentials.json")?;

    if let Some(path) = file {
        builder = builder.add_source(LegacyKeys(File::from(path).required(false)));
    }

    let spreadsheet_id = env
        .get(SPREADSHEET_ENV)
        .filter(|v| !v.trim().is_empty())
        .cloned();

    let mut settings: Settings = builder
        .add_source(
            Environment::with_prefix(ENV_PREFIX)
                .try_parsing(true)
                .ignore_empty(true)
                .source(Some(env.clone())),
        )
        .set_override_option("spreadsheet_id", spreadsheet_id)?
        .build()?
        .try_deserialize()?;

    settings.target_record_count = settings.target_record_count.max(1);
    Ok(settings)
}

/// `resolve` against the process environment.
pub fn load(file: &Path) -> Result<Settings, ConfigError> {
    let env: Map<String, String> = std::env::vars().collect();
    resolve(Some(file), &env)
}
