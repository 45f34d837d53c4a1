//! Single-attempt HTTP executor.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::Utc;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE, USER_AGENT};
use uuid::Uuid;

use crate::models::{Headers, HttpMethod, Task, TaskResult};
use super::{Execute, DEFAULT_TIMEOUT};

/// Response bodies are stored up to this many bytes; anything beyond is
/// replaced with [`TRUNCATION_MARKER`].
pub const BODY_CAP: usize = 10_000;
pub const TRUNCATION_MARKER: &str = "... (truncated)";

const DEFAULT_USER_AGENT: &str = "taskline/0.1";

/// One shared client with pooled connections serves all workers.
pub struct HttpExecutor {
    client: reqwest::Client,
}

impl HttpExecutor {
    pub fn new() -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .pool_max_idle_per_host(10)
            .pool_idle_timeout(Duration::from_secs(90))
            .build()?;
        Ok(Self { client })
    }

    fn build_request(&self, task: &Task, timeout: Duration) -> Result<reqwest::Request, String> {
        let mut headers = HeaderMap::new();
        for (name, value) in &task.action.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|err| format!("invalid header name '{name}': {err}"))?;
            let value = HeaderValue::from_str(value)
                .map_err(|err| format!("invalid value for header '{name:?}': {err}"))?;
            headers.insert(name, value);
        }

        if let Some(payload) = &task.action.payload {
            if !payload.is_empty() && !headers.contains_key(CONTENT_TYPE) {
                headers.insert(CONTENT_TYPE, HeaderValue::from_static(infer_content_type(payload)));
            }
        }
        if !headers.contains_key(USER_AGENT) {
            headers.insert(USER_AGENT, HeaderValue::from_static(DEFAULT_USER_AGENT));
        }

        let mut builder = self
            .client
            .request(task.action.method.into(), &task.action.url)
            .headers(headers)
            .timeout(timeout);

        if let Some(payload) = &task.action.payload {
            if !payload.is_empty() {
                builder = builder.body(payload.clone());
            }
        }

        builder.build().map_err(|err| err.to_string())
    }
}

#[async_trait]
impl Execute for HttpExecutor {
    async fn execute(&self, task: &Task) -> TaskResult {
        self.execute_with_timeout(task, DEFAULT_TIMEOUT).await
    }

    async fn execute_with_timeout(&self, task: &Task, timeout: Duration) -> TaskResult {
        let run_at = Utc::now();
        let started = Instant::now();
        let mut result = TaskResult {
            id: Uuid::new_v4(),
            task_id: task.id,
            run_at,
            status_code: None,
            success: false,
            response_headers: Headers::new(),
            response_body: None,
            error_message: None,
            duration_ms: 0,
            created_at: run_at,
        };

        let request = match self.build_request(task, timeout) {
            Ok(request) => request,
            Err(msg) => {
                result.error_message = Some(format!("failed to prepare request: {msg}"));
                result.duration_ms = started.elapsed().as_millis() as i64;
                return result;
            }
        };

        let response = match self.client.execute(request).await {
            Ok(response) => response,
            Err(err) => {
                result.error_message = Some(format!("http request failed: {err}"));
                result.duration_ms = started.elapsed().as_millis() as i64;
                return result;
            }
        };

        let status = response.status();
        result.status_code = Some(status.as_u16() as i32);
        result.success = status.is_success();

        // Keep the first value seen for each header name.
        for (name, value) in response.headers() {
            if let Ok(value) = value.to_str() {
                result
                    .response_headers
                    .entry(name.as_str().to_string())
                    .or_insert_with(|| value.to_string());
            }
        }

        match response.text().await {
            Ok(body) => result.response_body = Some(truncate_body(body)),
            Err(err) => result.error_message = Some(format!("failed to read response body: {err}")),
        }

        if !result.success && result.error_message.is_none() {
            result.error_message = Some(format!("http request returned status {}", status.as_u16()));
        }

        result.duration_ms = started.elapsed().as_millis() as i64;
        result
    }
}

impl From<HttpMethod> for reqwest::Method {
    fn from(method: HttpMethod) -> Self {
        match method {
            HttpMethod::Get     => reqwest::Method::GET,
            HttpMethod::Post    => reqwest::Method::POST,
            HttpMethod::Put     => reqwest::Method::PUT,
            HttpMethod::Delete  => reqwest::Method::DELETE,
            HttpMethod::Patch   => reqwest::Method::PATCH,
            HttpMethod::Head    => reqwest::Method::HEAD,
            HttpMethod::Options => reqwest::Method::OPTIONS,
        }
    }
}

/// Pick a Content-Type for a payload the caller did not label: anything
/// that parses as JSON is sent as JSON.
fn infer_content_type(payload: &str) -> &'static str {
    if serde_json::from_str::<serde_json::Value>(payload).is_ok() {
        "application/json"
    } else {
        "application/x-www-form-urlencoded"
    }
}

/// Cap the stored body at [`BODY_CAP`] bytes, appending the marker when
/// anything was cut.  The cut never splits a UTF-8 sequence.
fn truncate_body(body: String) -> String {
    if body.len() <= BODY_CAP {
        return body;
    }
    let mut cut = BODY_CAP;
    while !body.is_char_boundary(cut) {
        cut -= 1;
    }
    let mut truncated = body[..cut].to_string();
    truncated.push_str(TRUNCATION_MARKER);
    truncated
}
