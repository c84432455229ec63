//! The `ocr` subcommand.

use clap::Args;

use crate::{
    config::AzureConfig,
    csv_output::csv_output_path,
    ocr::azure::AzureDocumentAnalyzer,
    pipeline,
    prelude::*,
    ui::{ProgressConfig, Ui},
    upload::normalize_page_range,
};

/// OCR command line arguments.
#[derive(Debug, Args)]
pub struct OcrOpts {
    /// The PDF to analyze.
    pub input_path: PathBuf,

    /// Pages to analyze, for example "1-3" or "2,4". Defaults to all pages.
    #[clap(long = "pages")]
    pub page_range: Option<String>,

    /// Where to write the CSV. Defaults to the input path with a `.csv`
    /// extension.
    #[clap(short = 'o', long = "out")]
    pub output_path: Option<PathBuf>,
}

/// The `ocr` subcommand.
#[instrument(level = "debug", skip_all, fields(input = %opts.input_path.display()))]
pub async fn cmd_ocr(ui: Ui, opts: &OcrOpts) -> Result<()> {
    // Fail on an unreadable input before we need any credentials.
    tokio::fs::metadata(&opts.input_path)
        .await
        .with_context(|| format!("failed to read {:?}", opts.input_path))?;

    let config = AzureConfig::from_env()?;
    debug!(?config, "Loaded Azure Document Intelligence configuration");
    let analyzer = AzureDocumentAnalyzer::new(config)?;

    let output_path = match &opts.output_path {
        Some(path) => path.clone(),
        None => csv_output_path(&opts.input_path, None),
    };
    let page_range = normalize_page_range(opts.page_range.as_deref());

    let spinner = ui.new_spinner(&ProgressConfig {
        emoji: "📄",
        msg: "Analyzing document",
        done_msg: "Analyzed document",
    });
    let result = pipeline::run(
        &analyzer,
        &opts.input_path,
        page_range.as_deref(),
        &output_path,
    )
    .await;
    spinner.finish_and_clear();

    let output = result?;
    info!(
        rows = output.rows.len(),
        path = %output.csv_path.display(),
        "Wrote CSV summary"
    );
    Ok(())
}
