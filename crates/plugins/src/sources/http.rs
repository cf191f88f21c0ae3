use std::sync::Arc;

use async_trait::async_trait;
use pipeline::{
    AuthConfig, DataPlugin, FetchError, HttpMethod, HttpSource, Plugin, PluginDescriptor,
    PluginPhase, RuntimeContext, SourceConfig, SourceKind,
};
use reqwest::{Method, Url};
use serde_json::Value;
use tracing::debug;

use super::unexpected;
use crate::descriptor;
use crate::pool::ResourcePool;

const DEFAULT_API_KEY_HEADER: &str = "X-API-Key";

/// Serves `http` sources with clients from the shared [`ResourcePool`].
///
/// Any non-2xx status is a fetch error. Response bodies are parsed as JSON
/// when possible and returned as text otherwise.
#[derive(Debug)]
pub struct HttpData {
    descriptor: PluginDescriptor,
    pool: Arc<ResourcePool>,
}

impl HttpData {
    pub fn new(pool: Arc<ResourcePool>) -> Self {
        Self {
            descriptor: descriptor("http-data", PluginPhase::Data),
            pool,
        }
    }
}

impl Plugin for HttpData {
    fn descriptor(&self) -> &PluginDescriptor {
        &self.descriptor
    }
}

#[async_trait]
impl DataPlugin for HttpData {
    fn kind(&self) -> SourceKind {
        SourceKind::Http
    }

    fn validate(&self, source: &SourceConfig) -> Result<(), FetchError> {
        let SourceConfig::Http(http) = source else {
            return Err(unexpected(SourceKind::Http, source));
        };
        let url = Url::parse(&http.url).map_err(|e| invalid(format!("bad url '{}': {e}", http.url)))?;
        match url.scheme() {
            "http" | "https" => Ok(()),
            other => Err(invalid(format!("unsupported scheme '{other}'"))),
        }
    }

    async fn fetch(&self, source: &SourceConfig, _ctx: &RuntimeContext) -> Result<Value, FetchError> {
        let SourceConfig::Http(http) = source else {
            return Err(unexpected(SourceKind::Http, source));
        };
        let timeout_ms = http.timeout_ms();
        let client = self.pool.http_client(timeout_ms).await?;
        let request = build_request(&client, http)?;
        debug!(method = %request.method(), url = %request.url(), "Sending HTTP request");

        let response = client.execute(request).await.map_err(|e| {
            if e.is_timeout() {
                FetchError::Timeout { after_ms: timeout_ms }
            } else {
                FetchError::failed(SourceKind::Http, format!("request failed: {e}"))
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::failed(
                SourceKind::Http,
                format!("HTTP request failed. Status: {status}"),
            ));
        }

        let body = response
            .text()
            .await
            .map_err(|e| FetchError::failed(SourceKind::Http, format!("cannot read body: {e}")))?;
        Ok(serde_json::from_str(&body).unwrap_or(Value::String(body)))
    }
}

/// Builds the request described by `http`: method, headers, credentials and,
/// for methods that carry one, the JSON body.
pub(crate) fn build_request(
    client: &reqwest::Client,
    http: &HttpSource,
) -> Result<reqwest::Request, FetchError> {
    let mut builder = client.request(method(http.method), &http.url);
    for (name, value) in &http.headers {
        builder = builder.header(name.as_str(), value.as_str());
    }
    builder = match &http.auth {
        None => builder,
        Some(AuthConfig::Basic { username, password }) => builder.basic_auth(username, Some(password)),
        Some(AuthConfig::Bearer { token }) => builder.bearer_auth(token),
        Some(AuthConfig::ApiKey {
            api_key,
            api_key_header,
        }) => builder.header(
            api_key_header.as_deref().unwrap_or(DEFAULT_API_KEY_HEADER),
            api_key.as_str(),
        ),
    };
    if let Some(body) = http.body.as_ref().filter(|_| http.method.carries_body()) {
        builder = builder.json(body);
    }
    builder.build().map_err(|e| invalid(e.to_string()))
}

fn method(method: HttpMethod) -> Method {
    match method {
        HttpMethod::Get => Method::GET,
        HttpMethod::Post => Method::POST,
        HttpMethod::Put => Method::PUT,
        HttpMethod::Delete => Method::DELETE,
        HttpMethod::Patch => Method::PATCH,
    }
}

fn invalid(message: String) -> FetchError {
    FetchError::InvalidSource {
        kind: SourceKind::Http,
        message,
    }
}
