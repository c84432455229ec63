//! OCR using Azure AI Document Intelligence.
//!
//! Analysis is a long-running operation on the service side. We submit the
//! document, receive an `Operation-Location` URL, and poll it until the job
//! either succeeds or fails. Nothing here is retried: any error from the
//! service ends the analysis.

use std::{fmt, time::Duration};

use reqwest::{
    Url,
    header::{CONTENT_TYPE, RETRY_AFTER},
};

use crate::{config::AzureConfig, prelude::*};

use super::{AnalysisResult, DocumentAnalyzer};

/// Header carrying our subscription key.
const SUBSCRIPTION_KEY_HEADER: &str = "Ocp-Apim-Subscription-Key";

/// Header pointing at the operation we need to poll.
const OPERATION_LOCATION_HEADER: &str = "operation-location";

/// How long to wait between polls if the service doesn't tell us.
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Document analyzer backed by the Azure Document Intelligence REST API.
pub struct AzureDocumentAnalyzer {
    /// Shared HTTP client.
    client: reqwest::Client,

    /// Endpoint, credentials and model.
    config: AzureConfig,

    /// Delay between polls when there is no `Retry-After` header.
    poll_interval: Duration,
}

impl AzureDocumentAnalyzer {
    /// Create a new analyzer.
    pub fn new(config: AzureConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .build()
            .context("failed to create HTTP client")?;
        Ok(Self {
            client,
            config,
            poll_interval: DEFAULT_POLL_INTERVAL,
        })
    }

    /// Override the default delay between polls.
    #[cfg(test)]
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Build the URL used to start an analysis.
    fn analyze_url(&self, page_range: Option<&str>) -> Result<Url> {
        let mut url = Url::parse(&format!(
            "{}/documentintelligence/documentModels/{}:analyze",
            self.config.endpoint, self.config.model_id
        ))
        .with_context(|| {
            format!("invalid Azure endpoint {:?}", self.config.endpoint)
        })?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("api-version", &self.config.api_version);
            if let Some(pages) = page_range {
                query.append_pair("pages", pages);
            }
        }
        Ok(url)
    }

    /// Submit a document and return the URL of the resulting operation.
    async fn submit(&self, document: Vec<u8>, page_range: Option<&str>) -> Result<String> {
        let url = self.analyze_url(page_range)?;
        debug!(%url, bytes = document.len(), "Submitting document for analysis");
        let response = self
            .client
            .post(url)
            .header(SUBSCRIPTION_KEY_HEADER, &self.config.key)
            .header(CONTENT_TYPE, "application/octet-stream")
            .body(document)
            .send()
            .await
            .context("failed to send document to Azure Document Intelligence")?;
        let response = check_status(response, "submit document").await?;

        let location = response
            .headers()
            .get(OPERATION_LOCATION_HEADER)
            .ok_or_else(|| {
                anyhow!("Azure Document Intelligence did not return an Operation-Location header")
            })?
            .to_str()
            .context("Operation-Location header is not valid text")?
            .to_owned();
        Ok(location)
    }

    /// Poll an operation until it finishes.
    async fn wait_for_result(&self, operation_url: &str) -> Result<AnalysisResult> {
        loop {
            let response = self
                .client
                .get(operation_url)
                .header(SUBSCRIPTION_KEY_HEADER, &self.config.key)
                .send()
                .await
                .context("failed to poll Azure Document Intelligence")?;
            let response = check_status(response, "poll analysis").await?;
            let delay = retry_after(&response).unwrap_or(self.poll_interval);
            let operation = response
                .json::<AnalyzeOperation>()
                .await
                .context("failed to parse analysis status")?;

            match operation.status {
                OperationStatus::NotStarted | OperationStatus::Running => {
                    trace!(status = ?operation.status, ?delay, "Analysis in progress");
                    tokio::time::sleep(delay).await;
                }
                OperationStatus::Succeeded => {
                    return operation.analyze_result.ok_or_else(|| {
                        anyhow!("Azure Document Intelligence succeeded without an analyzeResult")
                    });
                }
                OperationStatus::Failed | OperationStatus::Canceled => {
                    let detail = match operation.error {
                        Some(error) => error.to_string(),
                        None => "no error details".to_owned(),
                    };
                    return Err(anyhow!(
                        "document analysis {:?}: {}",
                        operation.status,
                        detail
                    ));
                }
                OperationStatus::Unknown => {
                    return Err(anyhow!(
                        "Azure Document Intelligence returned an unknown analysis status"
                    ));
                }
            }
        }
    }
}

#[async_trait]
impl DocumentAnalyzer for AzureDocumentAnalyzer {
    #[instrument(
        level = "debug",
        skip_all,
        fields(path = %path.display(), model = %self.config.model_id, pages = ?page_range)
    )]
    async fn analyze(
        &self,
        path: &Path,
        page_range: Option<&str>,
    ) -> Result<AnalysisResult> {
        // Read the file before talking to the service, so a bad path never
        // costs us a request.
        let document = tokio::fs::read(path)
            .await
            .with_context(|| format!("failed to read {:?}", path))?;

        let operation_url = self.submit(document, page_range).await?;
        debug!(%operation_url, "Analysis accepted");
        let result = self.wait_for_result(&operation_url).await?;
        info!(pages = result.pages.len(), "Analysis complete");
        Ok(result)
    }
}

/// Turn a non-success response into an error, using the service's error
/// message when we can parse one.
async fn check_status(
    response: reqwest::Response,
    action: &str,
) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    match serde_json::from_str::<ServiceErrorResponse>(&body) {
        Ok(parsed) => Err(anyhow!(
            "failed to {} (status {}): {}",
            action,
            status,
            parsed.error
        )),
        Err(_) => Err(anyhow!("failed to {} (status {}): {}", action, status, body)),
    }
}

/// Parse a `Retry-After` header given in seconds.
fn retry_after(response: &reqwest::Response) -> Option<Duration> {
    response
        .headers()
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

/// Status of a long-running analysis.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
enum OperationStatus {
    NotStarted,
    Running,
    Succeeded,
    Failed,
    Canceled,
    #[serde(other)]
    Unknown,
}

/// Body returned when polling an analysis.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnalyzeOperation {
    status: OperationStatus,
    #[serde(default)]
    analyze_result: Option<AnalysisResult>,
    #[serde(default)]
    error: Option<ServiceError>,
}

/// Error envelope used by failed requests.
#[derive(Debug, Deserialize)]
struct ServiceErrorResponse {
    error: ServiceError,
}

/// A service-side error.
#[derive(Debug, Deserialize)]
struct ServiceError {
    #[serde(default)]
    code: String,
    #[serde(default)]
    message: String,
}

impl fmt::Display for ServiceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}
