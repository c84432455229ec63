//! The CSV API.
//!
//! `POST /process_pdf` takes a multipart body with a `file` field and an
//! optional `page_range` field, and responds with the CSV as a download.

use axum::{
    Router,
    extract::{Multipart, State},
    http::header,
    response::{IntoResponse, Response},
    routing::post,
};

use crate::{pipeline::PipelineError, prelude::*};

use super::{AppState, ProcessedUpload, UploadForm, process_upload};

/// Create the API router.
pub fn router() -> Router<AppState> {
    Router::new().route("/process_pdf", post(process_pdf))
}

/// POST /process_pdf
async fn process_pdf(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Response, PipelineError> {
    let form = UploadForm::from_multipart(multipart).await?;
    info!(
        file_name = ?form.file_name,
        bytes = form.bytes.len(),
        "Received PDF for processing"
    );
    let processed = process_upload(&state, form).await?;
    Ok(csv_download(processed))
}

/// Serve a CSV as a file download.
fn csv_download(processed: ProcessedUpload) -> Response {
    (
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_owned()),
            (
                header::CONTENT_DISPOSITION,
                content_disposition(&processed.csv_file_name),
            ),
        ],
        processed.csv,
    )
        .into_response()
}

/// Build an attachment `Content-Disposition` for `file_name`.
///
/// Names that don't survive as a plain quoted parameter also get an RFC 5987
/// `filename*` parameter carrying the exact UTF-8 name.
fn content_disposition(file_name: &str) -> String {
    let fallback = header_safe_file_name(file_name);
    if fallback == file_name {
        format!("attachment; filename=\"{file_name}\"")
    } else {
        format!(
            "attachment; filename=\"{fallback}\"; filename*=UTF-8''{}",
            urlencoding::encode(file_name)
        )
    }
}

/// Replace anything that can't appear in a quoted header parameter.
fn header_safe_file_name(file_name: &str) -> String {
    file_name
        .chars()
        .map(|c| {
            if c == ' ' || (c.is_ascii_graphic() && c != '"' && c != '\\') {
                c
            } else {
                '_'
            }
        })
        .collect()
}
