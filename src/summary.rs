//! Per-page summaries of an analysis.

use schemars::JsonSchema;

use crate::{
    ocr::{AnalysisResult, Page, Word},
    prelude::*,
};

/// One CSV row describing a page.
///
/// Field order here is the column order of the CSV.
#[derive(Clone, Debug, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct PageSummaryRow {
    /// The page number reported by the analyzer.
    pub page_number: u32,

    /// All the words on the page, joined with single spaces.
    pub text: String,

    /// How many words are on the page.
    pub word_count: usize,

    /// Mean word confidence, as a percentage rounded to 2 places.
    pub average_confidence: Option<f64>,

    /// Lowest word confidence, as a percentage rounded to 2 places.
    pub min_confidence: Option<f64>,

    /// Highest word confidence, as a percentage rounded to 2 places.
    pub max_confidence: Option<f64>,
}

impl PageSummaryRow {
    /// Summarize a page. Returns `None` for pages without any words.
    pub fn from_page(page: &Page) -> Option<Self> {
        if page.words.is_empty() {
            return None;
        }
        let text = page
            .words
            .iter()
            .map(|w| w.content.as_str())
            .collect::<Vec<_>>()
            .join(" ");
        let stats = ConfidenceStats::from_words(&page.words);
        Some(Self {
            page_number: page.page_number,
            text,
            word_count: page.words.len(),
            average_confidence: stats.map(|s| as_percent(s.mean)),
            min_confidence: stats.map(|s| as_percent(s.min)),
            max_confidence: stats.map(|s| as_percent(s.max)),
        })
    }
}

/// Summarize every page that has words, keeping document order.
///
/// Returns `None` if no page has any words, so that callers can tell "nothing
/// to report" apart from an empty table.
pub fn summarize(result: &AnalysisResult) -> Option<Vec<PageSummaryRow>> {
    let rows = result
        .pages
        .iter()
        .filter_map(PageSummaryRow::from_page)
        .collect::<Vec<_>>();
    debug!(
        pages = result.pages.len(),
        rows = rows.len(),
        "Summarized analysis"
    );
    if rows.is_empty() { None } else { Some(rows) }
}

/// Raw confidence statistics, in the range 0.0 to 1.0.
#[derive(Clone, Copy, Debug)]
struct ConfidenceStats {
    mean: f64,
    min: f64,
    max: f64,
}

impl ConfidenceStats {
    /// Compute statistics over the words that carry a confidence.
    fn from_words(words: &[Word]) -> Option<Self> {
        let confidences = words.iter().filter_map(|w| w.confidence).collect::<Vec<_>>();
        if confidences.is_empty() {
            return None;
        }
        let sum: f64 = confidences.iter().sum();
        Some(Self {
            mean: sum / confidences.len() as f64,
            min: confidences.iter().copied().fold(f64::INFINITY, f64::min),
            max: confidences.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        })
    }
}

/// Scale a 0–1 confidence to a percentage with 2 decimal places.
fn as_percent(confidence: f64) -> f64 {
    (confidence * 100.0 * 100.0).round() / 100.0
}
