//! A small HTML form for uploading PDFs from a browser.
//!
//! The result page embeds the CSV in a `data:` URL, so the download works
//! without keeping anything on the server after the request ends.

use axum::{
    Router,
    extract::{Multipart, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::get,
};
use base64::{Engine as _, prelude::BASE64_STANDARD};
use html_escape::{encode_double_quoted_attribute, encode_text};

use crate::{pipeline::PipelineError, prelude::*, summary::PageSummaryRow};

use super::{AppState, ProcessedUpload, UploadForm, process_upload};

/// Create the form router.
pub fn router() -> Router<AppState> {
    Router::new().route("/", get(show_form).post(submit_form))
}

/// GET /
async fn show_form() -> Html<String> {
    Html(render_page(None))
}

/// POST /
async fn submit_form(State(state): State<AppState>, multipart: Multipart) -> Response {
    let result = match UploadForm::from_multipart(multipart).await {
        Ok(form) => process_upload(&state, form).await,
        Err(err) => Err(err),
    };
    match result {
        Ok(processed) => {
            (StatusCode::OK, Html(render_page(Some(Ok(&processed))))).into_response()
        }
        Err(err) => {
            let status = err.status_code();
            warn!(code = err.code(), "Form submission failed: {err}");
            (status, Html(render_page(Some(Err(&err))))).into_response()
        }
    }
}

/// Convert binary data to a `data:` URL.
fn data_url(mime_type: &str, data: &[u8]) -> String {
    format!("data:{};base64,{}", mime_type, BASE64_STANDARD.encode(data))
}

/// Top of every page, up to and including the form.
const PAGE_HEAD: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>PDF to CSV</title>
<style>
  body { font-family: sans-serif; max-width: 60rem; margin: 2rem auto; padding: 0 1rem; }
  form { display: grid; gap: 0.75rem; max-width: 30rem; }
  table { border-collapse: collapse; margin-top: 1rem; }
  th, td { border: 1px solid #ccc; padding: 0.25rem 0.5rem; vertical-align: top; }
  .error { color: #a00; }
</style>
</head>
<body>
<h1>PDF to CSV</h1>
<p>Upload a PDF to recognize its text with Azure Document Intelligence and
download a per-page summary as CSV.</p>
<form method="post" action="/" enctype="multipart/form-data">
  <label>PDF file <input type="file" name="file" accept="application/pdf,.pdf" required></label>
  <label>Page range (optional) <input type="text" name="page_range" placeholder="e.g. 1-3 or 2,4"></label>
  <button type="submit">Analyze</button>
</form>
"#;

const PAGE_TAIL: &str = "</body>\n</html>\n";

/// Render the form page, with the outcome of a submission if there is one.
fn render_page(outcome: Option<Result<&ProcessedUpload, &PipelineError>>) -> String {
    let mut html = String::from(PAGE_HEAD);
    match outcome {
        None => {}
        Some(Ok(processed)) => render_result(&mut html, processed),
        Some(Err(PipelineError::NoExtractableContent)) => {
            html.push_str(
                "<section class=\"error\"><h2>No text found</h2>\
                 <p>None of the analyzed pages contain recognizable words, so there is no CSV to download.</p>\
                 </section>\n",
            );
        }
        Some(Err(err)) => {
            html.push_str(&format!(
                "<section class=\"error\"><h2>Something went wrong</h2><p>{}</p></section>\n",
                encode_text(&err.to_string())
            ));
        }
    }
    html.push_str(PAGE_TAIL);
    html
}

/// Render a download link and a preview table.
fn render_result(html: &mut String, processed: &ProcessedUpload) {
    let file_name = &processed.csv_file_name;
    html.push_str(&format!(
        "<section class=\"result\"><h2>Result</h2>\n<p><a download=\"{}\" href=\"{}\">Download {}</a></p>\n",
        encode_double_quoted_attribute(file_name),
        data_url("text/csv", &processed.csv),
        encode_text(file_name),
    ));
    html.push_str(
        "<table>\n<tr><th>Page</th><th>Text</th><th>Words</th>\
         <th>Average</th><th>Min</th><th>Max</th></tr>\n",
    );
    for row in &processed.rows {
        render_row(html, row);
    }
    html.push_str("</table>\n</section>\n");
}

fn render_row(html: &mut String, row: &PageSummaryRow) {
    html.push_str(&format!(
        "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>\n",
        row.page_number,
        encode_text(&row.text),
        row.word_count,
        format_confidence(row.average_confidence),
        format_confidence(row.min_confidence),
        format_confidence(row.max_confidence),
    ));
}

fn format_confidence(confidence: Option<f64>) -> String {
    confidence.map(|c| format!("{c:.2}")).unwrap_or_default()
}
