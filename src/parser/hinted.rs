use scraper::ElementRef;

use super::marker::NOISE_THRESHOLD;
use super::strategy::{selector, Collector, ExtractContext, RawCandidate, Strategy};
use crate::error::ExtractError;
use crate::snapshot::{collapse_ws, visible_text, PageSnapshot};

const HINT_SELECTOR: &str = r#"[class*="trend"], [class*="feed"], [class*="search"], [class*="rank"], [class*="item"]"#;

/// Child texts at or above this length are never taken as a title.
const TITLE_MAX: usize = 50;

/// Strategy C: only elements whose class hints at trend content.
pub struct AttributeHinted;

impl Strategy for AttributeHinted {
    fn name(&self) -> &'static str {
        "attribute-hinted"
    }

    fn extract(
        &self,
        page: &PageSnapshot,
        ctx: &ExtractContext<'_>,
    ) -> Result<Vec<RawCandidate>, ExtractError> {
        let hinted = selector(HINT_SELECTOR)?;
        let vocab = ctx.vocab;
        let mut out = Collector::new(ctx);

        for el in page.html().select(&hinted) {
            if out.is_full() {
                break;
            }
            let text = visible_text(el);
            if text.is_empty() || text.chars().count() >= NOISE_THRESHOLD {
                continue;
            }

            let title = child_title(el, ctx)
                .or_else(|| vocab.title_before_marker(&text).map(collapse_ws))
                .or_else(|| {
                    (!vocab.marker.is_match(&text))
                        .then(|| text.lines().next().map(str::trim).unwrap_or_default().to_string())
                });
            let Some(title) = title else {
                continue;
            };
            if out.has_seen(&title) {
                continue;
            }

            let volume = vocab
                .marked_volume
                .captures(&text)
                .map(|caps| format!("{} {}", vocab.marker_label, &caps[1]));

            out.push(RawCandidate {
                title,
                volume_text: volume,
                recency_text: vocab.recency_from(&text),
            });
        }

        Ok(out.finish())
    }
}

/// First descendant with short text that is not itself volume/trending text.
fn child_title(el: ElementRef<'_>, ctx: &ExtractContext<'_>) -> Option<String> {
    el.descendants()
        .skip(1)
        .filter_map(ElementRef::wrap)
        .map(visible_text)
        .find(|t| {
            !t.is_empty()
                && t.chars().count() < TITLE_MAX
                && !ctx.vocab.marker.is_match(t)
                && !t.to_lowercase().contains(ctx.vocab.trending_word)
        })
        .map(|t| collapse_ws(&t))
}
