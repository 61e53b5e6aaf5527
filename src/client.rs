use std::env;
use std::pin::Pin;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::Stream;
use futures::stream::StreamExt;
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::{Client as ReqwestClient, Response, header};
use url::Url;

use crate::client_logger::ClientLogger;
use crate::error::{Error, Result};
use crate::observability::{
    CLIENT_REQUEST_DURATION, CLIENT_REQUEST_ERRORS, CLIENT_REQUESTS, STREAM_BYTES, STREAM_CHUNKS,
    STREAM_ERRORS, STREAM_TTFB,
};
use crate::sse::process_sse;
use crate::types::{ApiErrorResponse, GenerateContentRequest, GenerateContentResponse, Model};

const DEFAULT_API_URL: &str = "https://generativelanguage.googleapis.com/v1beta/";
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(60);

/// Environment variable the API key is read from.
pub const API_KEY_ENV: &str = "GOOGLE_API_KEY";

/// Client for the Gemini API.
#[derive(Clone)]
pub struct Gemini {
    api_key: String,
    client: ReqwestClient,
    base_url: Url,
    connect_timeout: Duration,
    logger: Option<Arc<dyn ClientLogger>>,
}

impl std::fmt::Debug for Gemini {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gemini")
            .field("base_url", &self.base_url.as_str())
            .field("connect_timeout", &self.connect_timeout)
            .field("logger", &self.logger.is_some())
            .finish_non_exhaustive()
    }
}

impl Gemini {
    /// Create a new Gemini client.
    ///
    /// The API key can be provided directly or read from the GOOGLE_API_KEY
    /// environment variable.
    pub fn new(api_key: Option<String>) -> Result<Self> {
        Self::with_options(api_key, None, None)
    }

    /// Create a new client with custom settings.
    ///
    /// `connect_timeout` defaults to 60 seconds.
    pub fn with_options(
        api_key: Option<String>,
        base_url: Option<String>,
        connect_timeout: Option<Duration>,
    ) -> Result<Self> {
        let api_key = match api_key {
            Some(key) => key,
            None => env::var(API_KEY_ENV).map_err(|_| {
                Error::authentication(format!(
                    "API key not provided and {API_KEY_ENV} environment variable not set"
                ))
            })?,
        };
        if api_key.trim().is_empty() {
            return Err(Error::authentication("API key is empty"));
        }
        HeaderValue::from_str(&api_key)
            .map_err(|_| Error::authentication("API key contains invalid header characters"))?;

        let mut base_url = base_url.unwrap_or_else(|| DEFAULT_API_URL.to_string());
        if !base_url.ends_with('/') {
            base_url.push('/');
        }
        let base_url = Url::parse(&base_url)?;

        // Bounds connection setup only; streamed bodies have no overall deadline.
        let connect_timeout = connect_timeout.unwrap_or(DEFAULT_CONNECT_TIMEOUT);
        let client = ReqwestClient::builder()
            .connect_timeout(connect_timeout)
            .build()
            .map_err(|e| {
                Error::http_client(format!("Failed to build HTTP client: {e}"), Some(Box::new(e)))
            })?;

        Ok(Self {
            api_key,
            client,
            base_url,
            connect_timeout,
            logger: None,
        })
    }

    /// Attach a logger that observes every request, response and stream chunk.
    pub fn with_logger(mut self, logger: Arc<dyn ClientLogger>) -> Self {
        self.logger = Some(logger);
        self
    }

    /// Build the endpoint URL for a model method such as `generateContent`.
    fn endpoint(&self, model: &Model, method: &str) -> Result<Url> {
        Ok(self
            .base_url
            .join(&format!("models/{}:{method}", model.name()))?)
    }

    /// Create and return default headers for API requests.
    fn default_headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        headers.insert(header::ACCEPT, HeaderValue::from_static("application/json"));
        let key = HeaderValue::from_str(&self.api_key)
            .map_err(|_| Error::authentication("API key contains invalid header characters"))?;
        headers.insert("x-goog-api-key", key);
        Ok(headers)
    }

    fn map_transport_error(&self, e: reqwest::Error) -> Error {
        if e.is_timeout() {
            Error::timeout(
                format!("Request timed out: {e}"),
                Some(self.connect_timeout.as_secs_f64()),
            )
        } else if e.is_connect() {
            Error::connection(format!("Connection error: {e}"), Some(Box::new(e)))
        } else {
            Error::http_client(format!("Request failed: {e}"), Some(Box::new(e)))
        }
    }

    /// Process API response errors and convert to our Error type.
    async fn process_error_response(response: Response) -> Error {
        let status_code = response.status().as_u16();

        let retry_after = response
            .headers()
            .get("retry-after")
            .and_then(|val| val.to_str().ok())
            .and_then(|val| val.parse::<u64>().ok());

        let error_body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                return Error::http_client(
                    format!("Failed to read error response: {e}"),
                    Some(Box::new(e)),
                );
            }
        };

        map_status(status_code, retry_after, &error_body)
    }

    async fn post(
        &self,
        url: Url,
        headers: HeaderMap,
        request: &GenerateContentRequest,
    ) -> Result<Response> {
        CLIENT_REQUESTS.click();
        let response = self
            .client
            .post(url)
            .headers(headers)
            .json(request)
            .send()
            .await
            .map_err(|e| self.map_transport_error(e));
        let response = match response {
            Ok(response) => response,
            Err(err) => {
                CLIENT_REQUEST_ERRORS.click();
                return Err(err);
            }
        };

        if !response.status().is_success() {
            CLIENT_REQUEST_ERRORS.click();
            return Err(Self::process_error_response(response).await);
        }
        Ok(response)
    }

    /// Send a request and get a complete, non-streaming response.
    pub async fn send(
        &self,
        model: &Model,
        request: &GenerateContentRequest,
    ) -> Result<GenerateContentResponse> {
        let start = Instant::now();
        if let Some(logger) = &self.logger {
            logger.log_request(model, request);
        }

        let url = self.endpoint(model, "generateContent")?;
        let response = self.post(url, self.default_headers()?, request).await?;
        let parsed = response
            .json::<GenerateContentResponse>()
            .await
            .map_err(|e| {
                Error::serialization(format!("Failed to parse response: {e}"), Some(Box::new(e)))
            });
        CLIENT_REQUEST_DURATION.add(start.elapsed().as_secs_f64());

        let parsed = parsed?;
        if let Some(logger) = &self.logger {
            logger.log_response(&parsed);
        }
        Ok(parsed)
    }

    /// Send a request and get a streaming response.
    ///
    /// Returns a stream of response chunks that can be processed
    /// incrementally; each chunk carries the text generated since the
    /// previous one. The stream owns its connection and does not borrow the
    /// client or the request.
    pub async fn stream(
        &self,
        model: &Model,
        request: &GenerateContentRequest,
    ) -> Result<Pin<Box<dyn Stream<Item = Result<GenerateContentResponse>> + Send>>> {
        let start = Instant::now();
        if let Some(logger) = &self.logger {
            logger.log_request(model, request);
        }

        let mut url = self.endpoint(model, "streamGenerateContent")?;
        url.set_query(Some("alt=sse"));

        let mut headers = self.default_headers()?;
        headers.insert(
            header::ACCEPT,
            HeaderValue::from_static("text/event-stream"),
        );

        let response = self.post(url, headers, request).await?;
        STREAM_TTFB.add(start.elapsed().as_secs_f64());

        let bytes = response.bytes_stream().map(|chunk| {
            if let Ok(bytes) = &chunk {
                STREAM_BYTES.count(bytes.len() as u64);
            }
            chunk
        });

        let logger = self.logger.clone();
        let chunks = process_sse(Box::pin(bytes)).map(move |chunk| {
            match &chunk {
                Ok(chunk) => {
                    STREAM_CHUNKS.click();
                    if let Some(logger) = &logger {
                        logger.log_stream_chunk(chunk);
                    }
                }
                Err(_) => STREAM_ERRORS.click(),
            }
            chunk
        });
        Ok(Box::pin(chunks))
    }
}

/// Map an HTTP error status and body to an [`Error`].
fn map_status(status_code: u16, retry_after: Option<u64>, body: &str) -> Error {
    let parsed = serde_json::from_str::<ApiErrorResponse>(body).ok();
    let status = parsed.as_ref().and_then(|e| e.error.status.clone());
    let message = parsed
        .and_then(|e| e.error.message)
        .unwrap_or_else(|| body.to_string());

    match status_code {
        400 => Error::bad_request(message, status),
        401 => Error::authentication(message),
        403 => Error::permission(message),
        404 => Error::not_found(message),
        408 => Error::timeout(message, None),
        429 => Error::rate_limit(message, retry_after),
        500 => Error::internal_server(message),
        502..=504 => Error::service_unavailable(message, retry_after),
        _ => Error::api(status_code, status, message),
    }
}
