use std::path::PathBuf;

use thiserror::Error;

/// Failure inside a single extraction strategy. The coordinator logs it and
/// treats the strategy as having produced nothing.
#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("invalid selector `{selector}`: {reason}")]
    Selector { selector: String, reason: String },

    #[error("page has no {0} to scan")]
    MissingContent(&'static str),
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("failed to read {location}: {reason}")]
    Read { location: String, reason: String },

    #[error("failed to write {location}: {reason}{}", recovery_note(.recovery))]
    Write {
        location: String,
        reason: String,
        recovery: Option<PathBuf>,
    },

    #[error("remote sheet request failed: {0}")]
    Remote(String),

    #[error("store not configured: {0}")]
    NotConfigured(String),
}

impl StoreError {
    pub fn recovery_file(&self) -> Option<&PathBuf> {
        match self {
            StoreError::Write { recovery, .. } => recovery.as_ref(),
            _ => None,
        }
    }
}

fn recovery_note(recovery: &Option<PathBuf>) -> String {
    match recovery {
        Some(p) => format!(" (attempted rows saved to {})", p.display()),
        None => String::new(),
    }
}

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("no usable trend records after running {strategies} extraction strategies")]
    NoRecords { strategies: usize },
}
