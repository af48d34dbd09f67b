use super::strategy::{Collector, ExtractContext, RawCandidate, Strategy};
use crate::error::ExtractError;
use crate::snapshot::{collapse_ws, PageSnapshot};

/// Strategy D: regex passes over the whole page text. Last resort.
pub struct GlobalText;

impl Strategy for GlobalText {
    fn name(&self) -> &'static str {
        "global-text"
    }

    fn extract(
        &self,
        page: &PageSnapshot,
        ctx: &ExtractContext<'_>,
    ) -> Result<Vec<RawCandidate>, ExtractError> {
        let text = page.full_text();
        if text.is_empty() {
            return Err(ExtractError::MissingContent("text"));
        }
        let vocab = ctx.vocab;
        let mut out = Collector::new(ctx);

        for caps in vocab.triple.captures_iter(text) {
            if out.is_full() {
                break;
            }
            let title = collapse_ws(&caps[1]);
            out.push(
                RawCandidate::new(title)
                    .with_volume(format!("{} {}", vocab.marker_label, collapse_ws(&caps[2]))),
            );
        }

        // standalone elapsed tokens fill in recency, in page order
        let mut elapsed = vocab
            .elapsed
            .find_iter(text)
            .take(ctx.limit)
            .map(|m| collapse_ws(m.as_str()));
        for item in out.items_mut() {
            if item.recency_text.is_some() {
                continue;
            }
            match elapsed.next() {
                Some(r) => item.recency_text = Some(r),
                None => break,
            }
        }

        Ok(out.finish())
    }
}
