pub mod fulltext;
pub mod hinted;
pub mod marker;
pub mod rows;
pub mod strategy;
pub mod vocab;

pub use strategy::{ExtractContext, RawCandidate, Strategy};
pub use vocab::{Locale, Vocabulary};

/// Strategies in priority order: structured rows, marker text, class hints,
/// whole-page regex.
pub fn default_strategies() -> Vec<Box<dyn Strategy>> {
    vec![
        Box::new(rows::StructuredRows),
        Box::new(marker::MarkerText),
        Box::new(hinted::AttributeHinted),
        Box::new(fulltext::GlobalText),
    ]
}
