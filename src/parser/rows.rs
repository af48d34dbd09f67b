use super::strategy::{selector, Collector, ExtractContext, RawCandidate, Strategy};
use crate::error::ExtractError;
use crate::snapshot::{collapse_ws, visible_text, PageSnapshot};

/// Strategy A: table rows, cells read positionally as title / volume / recency.
pub struct StructuredRows;

impl Strategy for StructuredRows {
    fn name(&self) -> &'static str {
        "structured-row"
    }

    fn extract(
        &self,
        page: &PageSnapshot,
        ctx: &ExtractContext<'_>,
    ) -> Result<Vec<RawCandidate>, ExtractError> {
        let row_sel = selector("tr")?;
        let cell_sel = selector("td")?;
        let mut out = Collector::new(ctx);

        // first row is the header
        for row in page.html().select(&row_sel).skip(1) {
            if out.is_full() {
                break;
            }
            let cells: Vec<String> = row
                .select(&cell_sel)
                .map(|c| collapse_ws(&visible_text(c)))
                .collect();
            if cells.len() < 2 {
                continue;
            }

            let volume = non_empty(&cells[1]);
            let recency = cells.get(2).and_then(|c| non_empty(c));

            let mut title = cells[0].clone();
            if ctx.vocab.is_placeholder_title(&title) {
                // some layouts fold the title into the volume cell
                match volume.as_deref().and_then(|v| ctx.vocab.title_before_marker(v)) {
                    Some(t) => title = t.to_string(),
                    None => continue,
                }
            }

            out.push(RawCandidate {
                title,
                volume_text: volume,
                recency_text: recency,
            });
        }

        Ok(out.finish())
    }
}

fn non_empty(s: &str) -> Option<String> {
    let t = s.trim();
    (!t.is_empty()).then(|| t.to_string())
}
