use std::collections::HashSet;

use serde::Serialize;

use crate::normalize::NormalizedTrend;
use crate::parser::Vocabulary;

/// A normalized trend with its 1-based discovery rank.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrendRecord {
    pub rank: u32,
    pub title: String,
    pub volume: String,
    pub growth: String,
}

/// Count of distinct usable titles, as the coordinator sees them.
pub fn unique_titles<'a, I>(titles: I, vocab: &Vocabulary) -> usize
where
    I: IntoIterator<Item = &'a str>,
{
    let mut seen = HashSet::new();
    titles
        .into_iter()
        .map(str::trim)
        .filter(|t| !vocab.is_placeholder_title(t))
        .filter(|t| seen.insert(*t))
        .count()
}

/// First-seen-wins dedup by title, placeholders dropped, capped at `cap`.
/// The surviving order is the rank order.
pub fn rank_batch(
    trends: Vec<NormalizedTrend>,
    vocab: &Vocabulary,
    cap: usize,
) -> Vec<TrendRecord> {
    let mut seen = HashSet::new();
    trends
        .into_iter()
        .filter(|t| !vocab.is_placeholder_title(&t.title))
        .filter(|t| seen.insert(t.title.clone()))
        .take(cap)
        .enumerate()
        .map(|(i, t)| TrendRecord {
            rank: i as u32 + 1,
            title: t.title,
            volume: t.volume,
            growth: t.growth,
        })
        .collect()
}
