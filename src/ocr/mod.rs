//! Document analysis interface.
//!
//! An analyzer takes a PDF on disk and returns the words it recognized on
//! each page, along with a confidence score for each word.

use schemars::JsonSchema;

use crate::prelude::*;

pub mod azure;

/// The words recognized in a document, page by page.
#[derive(Clone, Debug, Default, Deserialize, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    /// Pages in document order.
    #[serde(default)]
    pub pages: Vec<Page>,
}

/// A single analyzed page.
#[derive(Clone, Debug, Deserialize, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page {
    /// 1-based page number, as reported by the service.
    pub page_number: u32,

    /// Words in reading order. May be empty for blank pages.
    #[serde(default)]
    pub words: Vec<Word>,
}

/// A recognized word.
#[derive(Clone, Debug, Deserialize, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Word {
    /// The text of the word.
    pub content: String,

    /// Recognition confidence, between 0.0 and 1.0.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
}

/// Interface to a document analysis service.
#[async_trait]
pub trait DocumentAnalyzer: Send + Sync + 'static {
    /// Analyze the PDF at `path`, waiting until the analysis is complete.
    ///
    /// `page_range` is passed through to the service as-is, for example
    /// `"1-3"` or `"2,4"`. `None` analyzes the whole document.
    async fn analyze(&self, path: &Path, page_range: Option<&str>)
    -> Result<AnalysisResult>;
}
