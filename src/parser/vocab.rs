use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;

/// Display language of the trends page being scraped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Locale {
    #[default]
    En,
    Ko,
}

impl Locale {
    pub fn vocab(self) -> &'static Vocabulary {
        match self {
            Locale::En => &EN,
            Locale::Ko => &KO,
        }
    }
}

/// Every token and pattern the extractors and normalizer look for.
pub struct Vocabulary {
    /// The "search" marker separating a title from its volume.
    pub marker: Regex,
    /// Unit hints; marker text without one of these is not a trend item.
    pub unit_hint: Regex,
    /// A volume token: digits, scale suffix, count unit.
    pub volume: Regex,
    /// Marker immediately followed by a captured volume token.
    pub marked_volume: Regex,
    /// Global-text triple: (title)(marker)(volume).
    pub triple: Regex,
    /// Standalone elapsed token, hours captured.
    pub elapsed: Regex,
    pub numeric: Regex,
    pub percent: Regex,
    pub active_words: &'static [&'static str],
    /// Word that disqualifies a child text from being a title.
    pub trending_word: &'static str,
    pub marker_label: &'static str,
    pub active_label: &'static str,
    pub idle_label: &'static str,
    pub active_suffix: &'static str,
    pub no_title: &'static str,
    pub no_info: &'static str,
    pub unknown: &'static str,
    pub up_icon: &'static str,
}

impl Vocabulary {
    pub fn is_active(&self, text: &str) -> bool {
        let lower = text.to_lowercase();
        self.active_words.iter().any(|w| lower.contains(w))
    }

    /// First elapsed token as the page phrased it, whitespace collapsed.
    pub fn elapsed_phrase(&self, text: &str) -> Option<String> {
        let m = self.elapsed.find(text)?;
        Some(m.as_str().split_whitespace().collect::<Vec<_>>().join(" "))
    }

    /// Text before the first search marker, if any and non-empty.
    pub fn title_before_marker<'a>(&self, text: &'a str) -> Option<&'a str> {
        let m = self.marker.find(text)?;
        let title = text[..m.start()].trim();
        (!title.is_empty()).then_some(title)
    }

    /// First elapsed token, with the activity word appended when present.
    pub fn recency_from(&self, text: &str) -> Option<String> {
        let mut recency = self.elapsed_phrase(text)?;
        if self.is_active(text) {
            recency.push_str(self.active_suffix);
        }
        Some(recency)
    }

    pub fn is_placeholder_title(&self, title: &str) -> bool {
        let t = title.trim();
        t.is_empty() || t == self.no_title
    }
}

// grouped thousands first so "1,000,000" is not cut at its first comma
const EN_NUMBER: &str = r"(?:\d{1,3}(?:,\d{3})+|\d+(?:\.\d+)?)";
const EN_VOLUME: &str = r"(?:\d{1,3}(?:,\d{3})+|\d+(?:\.\d+)?)\s*[KkMm]?\+*\s*times\b";
const KO_VOLUME: &str = r"\d+[만천\+]*회";

static EN: LazyLock<Vocabulary> = LazyLock::new(|| Vocabulary {
    marker: Regex::new(r"(?i)\bsearch\b").unwrap(),
    unit_hint: Regex::new(r"(?i)\btimes\b|\d\s*[KkMm]\+").unwrap(),
    volume: Regex::new(&format!("(?i){}", EN_VOLUME)).unwrap(),
    marked_volume: Regex::new(&format!(r"(?i)\bsearch\b\s*({})", EN_VOLUME)).unwrap(),
    triple: Regex::new(&format!(r"(?i)([^\n]{{2,30}}?)\s*\bsearch\b\s*({})", EN_VOLUME)).unwrap(),
    elapsed: Regex::new(r"(?i)(\d+)\s*hours?\s*ago").unwrap(),
    numeric: Regex::new(&format!(r"{}[KkMm]?\+*", EN_NUMBER)).unwrap(),
    percent: Regex::new(r"\d+(?:,\d{3})*%").unwrap(),
    active_words: &["active", "trending_up"],
    trending_word: "trending",
    marker_label: "search",
    active_label: "📈 active",
    idle_label: "⏱️ sustained",
    active_suffix: " active",
    no_title: "no title",
    no_info: "no information",
    unknown: "unknown",
    up_icon: "⬆️",
});

static KO: LazyLock<Vocabulary> = LazyLock::new(|| Vocabulary {
    marker: Regex::new(r"검색").unwrap(),
    unit_hint: Regex::new(r"회|만\+").unwrap(),
    volume: Regex::new(KO_VOLUME).unwrap(),
    marked_volume: Regex::new(&format!(r"검색\s*({})", KO_VOLUME)).unwrap(),
    triple: Regex::new(&format!(r"([^검색\n]{{2,30}})\s*검색\s*({})", KO_VOLUME)).unwrap(),
    elapsed: Regex::new(r"(\d+)\s*시간\s*전").unwrap(),
    numeric: Regex::new(r"\d+[만천\+]*").unwrap(),
    percent: Regex::new(r"\d+(?:,\d{3})*%").unwrap(),
    active_words: &["활성", "trending_up"],
    trending_word: "trending",
    marker_label: "검색",
    active_label: "📈 활성",
    idle_label: "⏱️ 지속됨",
    active_suffix: " 활성",
    no_title: "제목 없음",
    no_info: "정보 없음",
    unknown: "알 수 없음",
    up_icon: "⬆️",
});
