use std::path::Path;
use std::sync::LazyLock;
use std::time::Duration;

use anyhow::{Context, Result};
use regex::Regex;
use scraper::{ElementRef, Html, Node, Selector};
use tracing::info;

static BODY: LazyLock<Selector> = LazyLock::new(|| Selector::parse("body").unwrap());
static WS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

const HIDDEN_TAGS: &[&str] = &["script", "style", "noscript", "template"];
const USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36";

/// A rendered page: the parsed tree plus its visible text, one text node per line.
pub struct PageSnapshot {
    html: Html,
    text: String,
}

impl PageSnapshot {
    pub fn from_html(source: &str) -> Self {
        let html = Html::parse_document(source);
        let text = {
            let root = html
                .select(&BODY)
                .next()
                .unwrap_or_else(|| html.root_element());
            visible_text(root)
        };
        PageSnapshot { html, text }
    }

    /// Load a page previously dumped to disk (e.g. by a headless browser).
    pub fn load(path: &Path) -> Result<Self> {
        let source = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read snapshot {:?}", path))?;
        info!("Loaded page snapshot from {:?} ({} bytes)", path, source.len());
        Ok(Self::from_html(&source))
    }

    /// Plain HTTP fetch. Script-rendered content is only present if the
    /// server pre-renders it; use `load` with a browser dump otherwise.
    pub fn fetch(url: &str) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(120))
            .build()?;
        info!("Fetching page: {}", url);
        let source = client
            .get(url)
            .send()
            .and_then(|r| r.error_for_status())
            .and_then(|r| r.text())
            .with_context(|| format!("Failed to fetch {}", url))?;
        Ok(Self::from_html(&source))
    }

    pub fn html(&self) -> &Html {
        &self.html
    }

    pub fn full_text(&self) -> &str {
        &self.text
    }
}

/// Visible text under `el`, trimmed text nodes joined by newlines.
pub fn visible_text(el: ElementRef<'_>) -> String {
    el.descendants()
        .filter_map(|node| {
            let Node::Text(text) = node.value() else {
                return None;
            };
            let hidden = node
                .parent()
                .and_then(|p| p.value().as_element())
                .is_some_and(|e| HIDDEN_TAGS.contains(&e.name()));
            if hidden {
                return None;
            }
            let t = text.trim();
            (!t.is_empty()).then_some(t)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Collapse every whitespace run (including newlines) to a single space.
pub fn collapse_ws(s: &str) -> String {
    WS_RE.replace_all(s.trim(), " ").into_owned()
}
