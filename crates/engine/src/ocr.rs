//! Text-match adapter contract, fuzzy matching, and paragraph assembly

use async_trait::async_trait;
use image::DynamicImage;
use reelcheck_common::{ParagraphResult, Result, TextMatch, TextSearchResult};
use serde::{Deserialize, Serialize};

/// Minimum similarity ratio for a fragment to count as a match
pub const MIN_SIMILARITY: f64 = 0.8;

/// One OCR-recognized text fragment with its centroid
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextFragment {
    pub text: String,
    pub x: f64,
    pub y: f64,
    pub confidence: f64,
}

/// Black-box OCR engine: image in, positioned fragments out.
#[async_trait]
pub trait TextRecognizer: Send + Sync {
    async fn recognize(&self, image: &DynamicImage) -> Result<Vec<TextFragment>>;
}

/// Casefold and collapse whitespace runs to single spaces.
fn normalize(s: &str) -> String {
    s.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Standard edit distance over characters.
pub fn levenshtein_distance(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0usize; b.len() + 1];

    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = if ca == cb { 0 } else { 1 };
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}

/// Similarity ratio between two strings under normalization, 0.0..=1.0.
pub fn similarity(a: &str, b: &str) -> f64 {
    let a = normalize(a);
    let b = normalize(b);
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    let max_len = a.chars().count().max(b.chars().count());
    1.0 - levenshtein_distance(&a, &b) as f64 / max_len as f64
}

/// Match recognized fragments against a query. All fragments clearing
/// the similarity floor are returned; the max-confidence one is
/// distinguished as `best` (ties keep the first encountered).
pub fn find_text(fragments: &[TextFragment], query: &str) -> TextSearchResult {
    let mut matches = Vec::new();
    for fragment in fragments {
        let sim = similarity(&fragment.text, query);
        if sim >= MIN_SIMILARITY {
            matches.push(TextMatch {
                text: fragment.text.clone(),
                x: fragment.x,
                y: fragment.y,
                confidence: fragment.confidence,
                similarity: sim,
            });
        }
    }

    let mut best: Option<TextMatch> = None;
    for m in &matches {
        match &best {
            Some(b) if m.confidence <= b.confidence => {}
            _ => best = Some(m.clone()),
        }
    }

    TextSearchResult {
        found: !matches.is_empty(),
        best,
        matches,
    }
}

/// Concatenate all recognized fragments into a single paragraph,
/// ordered top-to-bottom then left-to-right.
pub fn assemble_paragraph(fragments: &[TextFragment]) -> ParagraphResult {
    let mut ordered: Vec<&TextFragment> = fragments.iter().collect();
    ordered.sort_by(|a, b| {
        a.y.partial_cmp(&b.y)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.x.partial_cmp(&b.x).unwrap_or(std::cmp::Ordering::Equal))
    });

    let paragraph = ordered
        .iter()
        .map(|f| f.text.trim())
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ");

    ParagraphResult {
        found: !paragraph.is_empty(),
        paragraph,
    }
}

/// Extract the monetary amount following `label` in a paragraph.
///
/// Tolerates currency symbols and separators between label and value,
/// thousands-separator commas, and the OCR habit of reading '0' as
/// 'O'. Used for net-position counters and max-bet stake displays.
pub fn extract_amount(paragraph: &str, label: &str) -> Option<f64> {
    let hay = normalize(paragraph);
    let needle = normalize(label);
    if needle.is_empty() {
        return None;
    }
    let start = hay.find(&needle)? + needle.len();
    let tail: Vec<char> = hay[start..].chars().collect();

    // The value must sit close to its label; skip a short run of
    // separators or currency symbols to reach the first digit.
    let mut i = 0;
    while i < tail.len() && !tail[i].is_ascii_digit() {
        if i >= 10 {
            return None;
        }
        i += 1;
    }

    let mut num = String::new();
    while i < tail.len() {
        match tail[i] {
            c if c.is_ascii_digit() => num.push(c),
            'o' => num.push('0'),
            ',' => {}
            '.' => num.push('.'),
            _ => break,
        }
        i += 1;
    }

    let num = num.trim_end_matches('.');
    if num.is_empty() {
        return None;
    }
    num.parse().ok()
}
