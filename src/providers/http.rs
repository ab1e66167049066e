use std::time::Duration;

use reqwest::header::AUTHORIZATION;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::error::{AiRegistryError, Result};

/// JSON-over-HTTP plumbing shared by the collaborator clients.
pub struct JsonEndpoint {
    service: &'static str,
    base_url: String,
    api_key: Option<String>,
    timeout: Duration,
    client: reqwest::Client,
}

impl JsonEndpoint {
    pub fn new(
        service: &'static str,
        base_url: &str,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let base_url = base_url.trim().trim_end_matches('/').to_string();
        if base_url.is_empty() {
            return Err(AiRegistryError::Config(format!(
                "missing base_url for {service} service"
            )));
        }
        let client = reqwest::Client::builder()
            .connect_timeout(timeout.min(Duration::from_secs(5)))
            .timeout(timeout)
            .build()
            .map_err(|e| AiRegistryError::Http(e.to_string()))?;
        Ok(Self {
            service,
            base_url,
            api_key: api_key.filter(|key| !key.trim().is_empty()),
            timeout,
            client,
        })
    }

    pub fn service(&self) -> &'static str {
        self.service
    }

    pub async fn post<T: Serialize + ?Sized>(&self, path: &str, body: &T) -> Result<Value> {
        let url = format!("{}/{}", self.base_url, path.trim_start_matches('/'));
        debug!(service = self.service, %url, "calling collaborator");
        let mut request = self.client.post(&url).json(body);
        if let Some(key) = &self.api_key {
            request = request.header(AUTHORIZATION, format!("Bearer {key}"));
        }
        let response = request.send().await.map_err(|e| self.transport_error(e))?;
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| self.transport_error(e))?;
        if !status.is_success() {
            return Err(AiRegistryError::collaborator(
                self.service,
                format!("{url} returned {status}: {}", text.trim()),
            ));
        }
        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&text).map_err(|e| {
            AiRegistryError::collaborator(self.service, format!("invalid JSON from {url}: {e}"))
        })
    }

    fn transport_error(&self, err: reqwest::Error) -> AiRegistryError {
        if err.is_timeout() {
            AiRegistryError::collaborator(
                self.service,
                format!("timed out after {}s", self.timeout.as_secs()),
            )
        } else {
            AiRegistryError::collaborator(self.service, err.to_string())
        }
    }
}
