use super::strategy::{selector, Collector, ExtractContext, RawCandidate, Strategy};
use crate::error::ExtractError;
use crate::snapshot::{collapse_ws, visible_text, PageSnapshot};

/// Elements with more text than this are containers, not trend items.
pub const NOISE_THRESHOLD: usize = 200;

/// Strategy B: any element whose text carries the search marker and a unit hint.
pub struct MarkerText;

impl Strategy for MarkerText {
    fn name(&self) -> &'static str {
        "marker-text"
    }

    fn extract(
        &self,
        page: &PageSnapshot,
        ctx: &ExtractContext<'_>,
    ) -> Result<Vec<RawCandidate>, ExtractError> {
        let all = selector("*")?;
        let vocab = ctx.vocab;
        let mut out = Collector::new(ctx);

        for el in page.html().select(&all) {
            if out.is_full() {
                break;
            }
            let text = visible_text(el);
            if text.chars().count() >= NOISE_THRESHOLD
                || !vocab.marker.is_match(&text)
                || !vocab.unit_hint.is_match(&text)
            {
                continue;
            }
            let Some(title) = vocab.title_before_marker(&text) else {
                continue;
            };
            let title = collapse_ws(title);
            if out.has_seen(&title) {
                continue;
            }

            // volume text is the marker and everything after it
            let volume = vocab
                .marker
                .find(&text)
                .map(|m| collapse_ws(&text[m.start()..]));

            out.push(RawCandidate {
                title,
                volume_text: volume,
                recency_text: vocab.recency_from(&text),
            });
        }

        Ok(out.finish())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::vocab::Locale;

    fn run(html: &str, locale: Locale) -> Vec<RawCandidate> {
        let page = PageSnapshot::from_html(html);
        let ctx = ExtractContext {
            vocab: locale.vocab(),
            limit: 5,
        };
        MarkerText.extract(&page, &ctx).unwrap()
    }

    #[test]
    fn marker_cards() {
        let html = std::fs::read_to_string("tests/fixtures/cards.html").unwrap();
        let items = run(&html, Locale::En);
        let titles: Vec<&str> = items.iter().map(|c| c.title.as_str()).collect();
        assert_eq!(titles, vec!["Solar eclipse", "Lakers", "Bitcoin price"]);
        assert_eq!(
            items[0].volume_text.as_deref(),
            Some("search 50K+ times trending_up 4 hours ago")
        );
        assert_eq!(items[0].recency_text.as_deref(), Some("4 hours ago active"));
        assert_eq!(items[1].recency_text.as_deref(), Some("1 hour ago"));
    }

    #[test]
    fn ignores_text_without_units_and_long_containers() {
        let long = "x".repeat(NOISE_THRESHOLD);
        let html = format!(
            "<body><p>Weather search now</p>\
             <div>{long} search 10K+ times</div></body>"
        );
        assert!(run(&html, Locale::En).is_empty());
    }

    #[test]
    fn korean_marker() {
        let html = "<body><ul><li><b>손흥민</b> 검색 5만+회 <i>2시간 전</i></li></ul></body>";
        let items = run(html, Locale::Ko);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].title, "손흥민");
        assert_eq!(items[0].volume_text.as_deref(), Some("검색 5만+회 2시간 전"));
        assert_eq!(items[0].recency_text.as_deref(), Some("2시간 전"));
    }
}
