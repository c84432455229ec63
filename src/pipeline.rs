//! The document-to-CSV pipeline.
//!
//! A request moves through Uploaded, Analyzed, Summarized and Written. Any
//! failure stops the remaining steps for that request only.

use crate::{
    csv_output::write_summary_csv,
    ocr::DocumentAnalyzer,
    prelude::*,
    summary::{PageSummaryRow, summarize},
};

/// Ways the pipeline can fail.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// The request itself was malformed.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// We could not store the uploaded file.
    #[error("failed to store upload: {0:#}")]
    Upload(anyhow::Error),

    /// We could not read the input document.
    #[error("failed to read input document: {0:#}")]
    Input(anyhow::Error),

    /// The analysis service failed or returned something we can't use.
    #[error("document analysis failed: {0:#}")]
    Analysis(anyhow::Error),

    /// The document has no pages with recognizable words.
    #[error("no extractable content: no page of the document contains recognized words")]
    NoExtractableContent,

    /// We could not write or read back the CSV.
    #[error("failed to write CSV: {0:#}")]
    CsvWrite(anyhow::Error),
}

/// What a successful run produced.
#[derive(Debug)]
pub struct PipelineOutput {
    /// Where the CSV was written.
    pub csv_path: PathBuf,

    /// The rows in the CSV.
    pub rows: Vec<PageSummaryRow>,
}

/// Analyze `input_path`, summarize the result, and write it to `output_path`.
///
/// If the analysis has no pages with words, nothing is written and we return
/// [`PipelineError::NoExtractableContent`].
#[instrument(
    level = "debug",
    skip(analyzer),
    fields(input = %input_path.display(), output = %output_path.display())
)]
pub async fn run(
    analyzer: &dyn DocumentAnalyzer,
    input_path: &Path,
    page_range: Option<&str>,
    output_path: &Path,
) -> Result<PipelineOutput, PipelineError> {
    tokio::fs::File::open(input_path)
        .await
        .with_context(|| format!("failed to read {:?}", input_path))
        .map_err(PipelineError::Input)?;

    let analysis = analyzer
        .analyze(input_path, page_range)
        .await
        .map_err(PipelineError::Analysis)?;

    let rows = summarize(&analysis).ok_or(PipelineError::NoExtractableContent)?;

    write_summary_csv(&rows, output_path)
        .await
        .map_err(PipelineError::CsvWrite)?;
    info!(rows = rows.len(), "Wrote page summary");

    Ok(PipelineOutput {
        csv_path: output_path.to_owned(),
        rows,
    })
}
