//! Thin HTTP client for the Control API. Every subcommand except `serve`
//! goes through here instead of touching the orchestrator directly.

use forgepipe_core::build::Build;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("server returned {status}: {body}")]
    Server { status: reqwest::StatusCode, body: String },
}

pub struct Client {
    http: reqwest::Client,
    base_url: String,
}

impl Client {
    #[must_use]
    pub fn new(base_url: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    async fn check(resp: reqwest::Response) -> Result<reqwest::Response, ClientError> {
        if resp.status().is_success() {
            return Ok(resp);
        }
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        Err(ClientError::Server { status, body })
    }

    pub async fn start_build(
        &self,
        tenant: &str,
        user: &str,
        project: &str,
        spec: serde_json::Value,
    ) -> Result<String, ClientError> {
        let url = format!("{}/builds", self.base_url);
        let resp = self
            .http
            .post(&url)
            .json(&serde_json::json!({
                "tenant": tenant,
                "user": user,
                "project": project,
                "spec": spec,
            }))
            .send()
            .await
            .map_err(|source| ClientError::Request { url: url.clone(), source })?;
        let resp = Self::check(resp).await?;
        let body: serde_json::Value = resp
            .json()
            .await
            .map_err(|source| ClientError::Request { url, source })?;
        Ok(body["build_id"].as_str().unwrap_or_default().to_string())
    }

    pub async fn get_build(&self, build_id: &str) -> Result<Build, ClientError> {
        let url = format!("{}/builds/{build_id}", self.base_url);
        let resp = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|source| ClientError::Request { url: url.clone(), source })?;
        let resp = Self::check(resp).await?;
        resp.json().await.map_err(|source| ClientError::Request { url, source })
    }

    pub async fn list_builds(&self) -> Result<Vec<Build>, ClientError> {
        let url = format!("{}/builds", self.base_url);
        let resp = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|source| ClientError::Request { url: url.clone(), source })?;
        let resp = Self::check(resp).await?;
        resp.json().await.map_err(|source| ClientError::Request { url, source })
    }

    pub async fn cancel_build(&self, build_id: &str) -> Result<(), ClientError> {
        let url = format!("{}/builds/{build_id}/cancel", self.base_url);
        let resp = self
            .http
            .post(&url)
            .send()
            .await
            .map_err(|source| ClientError::Request { url: url.clone(), source })?;
        Self::check(resp).await?;
        Ok(())
    }

    pub async fn retry_build(&self, build_id: &str) -> Result<String, ClientError> {
        let url = format!("{}/builds/{build_id}/retry", self.base_url);
        let resp = self
            .http
            .post(&url)
            .send()
            .await
            .map_err(|source| ClientError::Request { url: url.clone(), source })?;
        let resp = Self::check(resp).await?;
        let body: serde_json::Value = resp
            .json()
            .await
            .map_err(|source| ClientError::Request { url, source })?;
        Ok(body["build_id"].as_str().unwrap_or_default().to_string())
    }

    /// `from` is the CLI-facing decimal stage number (`3` or `3.5`); this
    /// converts it to the tenths-scaled integer the wire format expects.
    pub async fn retry_stage(&self, build_id: &str, from: f64) -> Result<(), ClientError> {
        let url = format!("{}/builds/{build_id}/retry-stage", self.base_url);
        let tenths = (from * 10.0).round() as i64;
        let resp = self
            .http
            .post(&url)
            .json(&serde_json::json!({ "from": tenths }))
            .send()
            .await
            .map_err(|source| ClientError::Request { url: url.clone(), source })?;
        Self::check(resp).await?;
        Ok(())
    }

    /// Stream an NDJSON-decoded sequence of raw progress events from the
    /// build's SSE endpoint, calling `on_event` with each event's JSON
    /// payload as it arrives.
    pub async fn watch(
        &self,
        build_id: &str,
        mut on_event: impl FnMut(serde_json::Value),
    ) -> Result<(), ClientError> {
        use futures::StreamExt;

        let url = format!("{}/builds/{build_id}/events", self.base_url);
        let resp = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|source| ClientError::Request { url: url.clone(), source })?;
        let resp = Self::check(resp).await?;

        let mut stream = resp.bytes_stream();
        let mut buf = String::new();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|source| ClientError::Request { url: url.clone(), source })?;
            buf.push_str(&String::from_utf8_lossy(&chunk));
            while let Some(pos) = buf.find("\n\n") {
                let frame = buf[..pos].to_string();
                buf.drain(..pos + 2);
                for line in frame.lines() {
                    if let Some(data) = line.strip_prefix("data: ").or_else(|| line.strip_prefix("data:")) {
                        if let Ok(value) = serde_json::from_str::<serde_json::Value>(data.trim()) {
                            on_event(value);
                        }
                    }
                }
            }
        }
        Ok(())
    }
}
