use crate::parser::{RawCandidate, Vocabulary};

/// A candidate with decorated descriptors; rank is assigned after dedup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedTrend {
    pub title: String,
    pub volume: String,
    pub growth: String,
}

/// Total: absent tokens degrade to the vocabulary's sentinels, never to "".
pub fn normalize(
    candidate: &RawCandidate,
    vocab: &Vocabulary,
    default_growth: Option<&str>,
) -> NormalizedTrend {
    NormalizedTrend {
        title: candidate.title.trim().to_string(),
        volume: volume_descriptor(candidate.volume_text.as_deref(), vocab),
        growth: growth_descriptor(candidate.recency_text.as_deref(), vocab, default_growth),
    }
}

/// `search: <volume>· <activity> ·<elapsed>`
pub fn volume_descriptor(text: Option<&str>, vocab: &Vocabulary) -> String {
    let Some(text) = text else {
        return vocab.no_info.to_string();
    };
    let Some(volume) = vocab.volume.find(text) else {
        return vocab.no_info.to_string();
    };
    let activity = if vocab.is_active(text) {
        vocab.active_label
    } else {
        vocab.idle_label
    };
    let elapsed = vocab.elapsed.find(text).map(|m| m.as_str()).unwrap_or_default();
    format!(
        "{}: {}· {} ·{}",
        vocab.marker_label,
        volume.as_str(),
        activity,
        elapsed
    )
}

/// `<numeric> ⬆️ <percent>`; a missing percentage becomes `default_growth`
/// when configured, otherwise the unknown sentinel.
pub fn growth_descriptor(
    text: Option<&str>,
    vocab: &Vocabulary,
    default_growth: Option<&str>,
) -> String {
    let Some(text) = text else {
        return vocab.no_info.to_string();
    };
    let percent = vocab.percent.find(text).map(|m| m.as_str().to_string());
    let without_percent = vocab.percent.replace_all(text, " ");
    let numeric = vocab
        .numeric
        .find(&without_percent)
        .map(|m| m.as_str().to_string());

    match (numeric, percent) {
        (None, None) => vocab.no_info.to_string(),
        (None, Some(p)) => format!("{} {}", vocab.up_icon, p),
        (Some(n), p) => {
            let p = p.unwrap_or_else(|| default_growth.unwrap_or(vocab.unknown).to_string());
            format!("{} {} {}", n, vocab.up_icon, p)
        }
    }
}
