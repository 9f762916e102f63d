
use anyhow::{Context, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, error, warn};
use url::Url;

pub const DEFAULT_TIMEOUT_SECONDS: u64 = 60;
pub const DEFAULT_RETRY_ATTEMPTS: u32 = 1;
const EXPONENTIAL_BACKOFF_BASE: u64 = 2;

/// Blocking JSON-over-HTTP client shared by the service clients
#[derive(Debug, Clone)]
pub struct HttpClient {
    agent: ureq::Agent,
    retry_attempts: u32,
    bearer_token: Option<String>,
}

impl Default for HttpClient {
    #[inline]
    fn default() -> Self {
        Self::new(Duration::from_secs(DEFAULT_TIMEOUT_SECONDS))
    }
}

impl HttpClient {
    #[inline]
    pub fn new(timeout: Duration) -> Self {
        let agent = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .http_status_as_error(false)
            .build()
            .into();

        Self {
            agent,
            retry_attempts: DEFAULT_RETRY_ATTEMPTS,
            bearer_token: None,
        }
    }

    #[inline]
    pub fn with_retry_attempts(mut self, attempts: u32) -> Self {
        self.retry_attempts = attempts.max(1);
        self
    }

    #[inline]
    pub fn with_bearer_token(mut self, token: Option<String>) -> Self {
        self.bearer_token = token.filter(|t| !t.trim().is_empty());
        self
    }

    #[inline]
    pub fn retry_attempts(&self) -> u32 {
        self.retry_attempts
    }

    /// GET a URL and return the body as text
    #[inline]
    pub fn get_text(&self, url: &Url) -> Result<String> {
        debug!("GET {}", url);

        self.make_request_with_retry(url, || {
            let mut request = self.agent.get(url.as_str());
            if let Some(token) = &self.bearer_token {
                request = request.header("Authorization", format!("Bearer {}", token));
            }
            request.call().and_then(read_response)
        })
    }

    /// POST a JSON body and decode the JSON response
    #[inline]
    pub fn post_json<T, R>(&self, url: &Url, body: &T) -> Result<R>
    where
        T: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let request_json = serde_json::to_string(body).context("Failed to serialize request")?;

        debug!("POST {} ({} bytes)", url, request_json.len());

        let response_text = self.make_request_with_retry(url, || {
            let mut request = self
                .agent
                .post(url.as_str())
                .header("Content-Type", "application/json");
            if let Some(token) = &self.bearer_token {
                request = request.header("Authorization", format!("Bearer {}", token));
            }
            request.send(&request_json).and_then(read_response)
        })?;

        serde_json::from_str(&response_text)
            .with_context(|| format!("Failed to parse response from {}", url))
    }

    fn make_request_with_retry<F>(&self, url: &Url, mut request_fn: F) -> Result<String>
    where
        F: FnMut() -> Result<(u16, String), ureq::Error>,
    {
        let mut last_error = None;

        for attempt in 1..=self.retry_attempts {
            debug!("HTTP request attempt {}/{}", attempt, self.retry_attempts);

            match request_fn() {
                Ok((status, body)) if status < 400 => {
                    debug!("Request succeeded on attempt {}", attempt);
                    return Ok(body);
                }
                Ok((status, body)) if status >= 500 => {
                    warn!(
                        "Server error (status {}) from {}, attempt {}/{}",
                        status, url, attempt, self.retry_attempts
                    );
                    last_error = Some(status_error("Server error", status, &body));
                }
                Ok((status, body)) => {
                    warn!("Client error (status {}) from {}, not retrying", status, url);
                    return Err(status_error("Client error", status, &body));
                }
                Err(error) => {
                    match &error {
                        ureq::Error::ConnectionFailed
                        | ureq::Error::HostNotFound
                        | ureq::Error::Timeout(_)
                        | ureq::Error::Io(_) => {
                            warn!(
                                "Transport error: {}, attempt {}/{}",
                                error, attempt, self.retry_attempts
                            );
                        }
                        _ => {
                            warn!("Non-retryable error: {}", error);
                            return Err(anyhow::anyhow!("Non-retryable error: {}", error));
                        }
                    }
                    last_error = Some(anyhow::anyhow!("Request error: {}", error));
                }
            }

            if attempt < self.retry_attempts {
                let delay_ms = EXPONENTIAL_BACKOFF_BASE.pow(attempt - 1) * 1000;
                let delay = Duration::from_millis(delay_ms);
                debug!("Waiting {:?} before retry", delay);
                std::thread::sleep(delay);
            }
        }

        error!("All request attempts failed for {}", url);

        Err(last_error.unwrap_or_else(|| anyhow::anyhow!("Request failed after retries")))
    }
}

fn read_response(
    mut resp: ureq::http::Response<ureq::Body>,
) -> Result<(u16, String), ureq::Error> {
    let status = resp.status().as_u16();
    let body = resp.body_mut().read_to_string()?;
    Ok((status, body))
}

/// Error for a non-success status, carrying the service's response body
fn status_error(kind: &str, status: u16, body: &str) -> anyhow::Error {
    let body = body.trim();
    if body.is_empty() {
        anyhow::anyhow!("{}: HTTP {}", kind, status)
    } else {
        anyhow::anyhow!("{}: HTTP {}: {}", kind, status, body)
    }
}

/// Run a blocking client call on the blocking thread pool
#[inline]
pub async fn run_blocking<T, F>(f: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .context("Blocking HTTP task failed")?
}

/// Join a relative API path onto a base URL, keeping any path prefix (e.g. `/v1`)
#[inline]
pub fn endpoint(base: &Url, path: &str) -> Result<Url> {
    let mut base = base.clone();
    if !base.path().ends_with('/') {
        let with_slash = format!("{}/", base.path());
        base.set_path(&with_slash);
    }
    base.join(path.trim_start_matches('/'))
        .with_context(|| format!("Failed to build URL for {}", path))
}
