use std::collections::HashSet;

use scraper::Selector;

use super::vocab::Vocabulary;
use crate::error::ExtractError;
use crate::snapshot::PageSnapshot;

/// Unvalidated extraction result, before normalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawCandidate {
    pub title: String,
    pub volume_text: Option<String>,
    pub recency_text: Option<String>,
}

impl RawCandidate {
    pub fn new(title: impl Into<String>) -> Self {
        RawCandidate {
            title: title.into(),
            volume_text: None,
            recency_text: None,
        }
    }

    pub fn with_volume(mut self, text: impl Into<String>) -> Self {
        self.volume_text = Some(text.into());
        self
    }

    #[cfg(test)]
    pub fn with_recency(mut self, text: impl Into<String>) -> Self {
        self.recency_text = Some(text.into());
        self
    }
}

/// What a strategy gets to work with besides the page.
pub struct ExtractContext<'a> {
    pub vocab: &'a Vocabulary,
    /// Per-strategy output cap.
    pub limit: usize,
}

/// One self-contained extraction heuristic. Implementations must not keep
/// state between calls.
pub trait Strategy {
    fn name(&self) -> &'static str;

    fn extract(
        &self,
        page: &PageSnapshot,
        ctx: &ExtractContext<'_>,
    ) -> Result<Vec<RawCandidate>, ExtractError>;
}

/// Accumulates a strategy's output: unique titles, placeholder titles dropped,
/// capped at the limit.
pub(crate) struct Collector<'a> {
    ctx: &'a ExtractContext<'a>,
    seen: HashSet<String>,
    items: Vec<RawCandidate>,
}

impl<'a> Collector<'a> {
    pub fn new(ctx: &'a ExtractContext<'a>) -> Self {
        Collector {
            ctx,
            seen: HashSet::new(),
            items: Vec::new(),
        }
    }

    pub fn is_full(&self) -> bool {
        self.items.len() >= self.ctx.limit
    }

    pub fn has_seen(&self, title: &str) -> bool {
        self.seen.contains(title.trim())
    }

    /// Returns false when the candidate was rejected.
    pub fn push(&mut self, mut candidate: RawCandidate) -> bool {
        candidate.title = candidate.title.trim().to_string();
        if self.is_full()
            || self.ctx.vocab.is_placeholder_title(&candidate.title)
            || !self.seen.insert(candidate.title.clone())
        {
            return false;
        }
        self.items.push(candidate);
        true
    }

    pub fn items_mut(&mut self) -> &mut [RawCandidate] {
        &mut self.items
    }

    pub fn finish(self) -> Vec<RawCandidate> {
        self.items
    }
}

pub(crate) fn selector(css: &str) -> Result<Selector, ExtractError> {
    Selector::parse(css).map_err(|e| ExtractError::Selector {
        selector: css.to_string(),
        reason: e.to_string(),
    })
}
