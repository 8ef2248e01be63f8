//! HTTP client implementing the remote contracts

use crate::config::HttpConfig;
use crate::error::HttpError;
use async_trait::async_trait;
use manifest_cache::{BootstrapPayload, BootstrapRequest, LoadError, ManifestPayload, ManifestSource};
use manifest_model::{EntityId, Record};
use manifest_runtime::{
    ActionApi, ActionRequest, ActionResult, ApiError, ModuleSummary, RecordApi, RegistryApi,
};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::{RequestBuilder, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;

/// `reqwest`-backed transport
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: reqwest::Client,
    base: Url,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RowsBody {
    Rows(Vec<Record>),
    Wrapped { records: Vec<Record> },
}

impl RowsBody {
    fn into_rows(self) -> Vec<Record> {
        match self {
            Self::Rows(rows) | Self::Wrapped { records: rows } => rows,
        }
    }
}

#[derive(Deserialize)]
struct RunBody {
    #[serde(default)]
    result: ActionResult,
}

impl HttpClient {
    /// Build the client
    ///
    /// # Errors
    /// Invalid base URL or token, or a client that cannot be built.
    pub fn new(config: &HttpConfig) -> Result<Self, HttpError> {
        let normalized = config.normalized_base()?;
        let base = Url::parse(&normalized)
            .map_err(|_| HttpError::InvalidBaseUrl(config.base_url.clone()))?;

        let mut headers = HeaderMap::new();
        if let Some(token) = &config.bearer_token {
            let mut value = HeaderValue::from_str(&format!("Bearer {token}"))
                .map_err(|_| HttpError::InvalidToken)?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }

        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .default_headers(headers)
            .build()?;
        tracing::debug!(base = %base, timeout_ms = config.timeout_ms, "http transport ready");
        Ok(Self { client, base })
    }

    /// Base URL plus percent-encoded path segments
    fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn records_url(&self, entity: &EntityId, id: Option<&str>) -> Url {
        match id {
            Some(id) => self.url(&["records", entity.as_str(), id]),
            None => self.url(&["records", entity.as_str()]),
        }
    }

    fn list_url(&self, entity: &EntityId, fields: &[String]) -> Url {
        let mut url = self.records_url(entity, None);
        if !fields.is_empty() {
            url.query_pairs_mut().append_pair("fields", &fields.join(","));
        }
        url
    }
}

fn network(err: &reqwest::Error) -> ApiError {
    ApiError::Network(err.to_string())
}

fn rejection(status: StatusCode, body: String, not_found: impl FnOnce() -> ApiError) -> ApiError {
    if status == StatusCode::NOT_FOUND {
        return not_found();
    }
    let message = if body.trim().is_empty() {
        status.canonical_reason().unwrap_or("request failed").to_string()
    } else {
        body
    };
    ApiError::Rejected {
        status: status.as_u16(),
        message,
    }
}

async fn send(
    request: RequestBuilder,
    not_found: impl FnOnce() -> ApiError,
) -> Result<reqwest::Response, ApiError> {
    let response = request.send().await.map_err(|e| network(&e))?;
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    tracing::warn!(status = status.as_u16(), "request rejected");
    Err(rejection(status, body, not_found))
}

async fn send_json<T: DeserializeOwned>(
    request: RequestBuilder,
    not_found: impl FnOnce() -> ApiError,
) -> Result<T, ApiError> {
    send(request, not_found)
        .await?
        .json::<T>()
        .await
        .map_err(|e| ApiError::InvalidResponse(e.to_string()))
}

fn load_error(module_id: &str, err: ApiError) -> LoadError {
    match err {
        ApiError::EntityNotFound(_) | ApiError::RecordNotFound { .. } => {
            LoadError::ModuleNotFound(module_id.to_string())
        }
        other => LoadError::fetch(module_id, other.to_string()),
    }
}

#[async_trait]
impl ManifestSource for HttpClient {
    async fn get_manifest(&self, module_id: &str) -> Result<ManifestPayload, LoadError> {
        tracing::debug!(module_id, "GET manifest");
        let request = self.client.get(self.url(&["manifests", module_id]));
        send_json(request, || ApiError::EntityNotFound(module_id.to_string()))
            .await
            .map_err(|err| load_error(module_id, err))
    }

    async fn get_page_bootstrap(
        &self,
        request: &BootstrapRequest,
    ) -> Result<BootstrapPayload, LoadError> {
        let module_id = request.module_id.as_str();
        tracing::debug!(module_id, "POST bootstrap");
        let http = self
            .client
            .post(self.url(&["manifests", "bootstrap"]))
            .json(request);
        send_json(http, || ApiError::EntityNotFound(module_id.to_string()))
            .await
            .map_err(|err| load_error(module_id, err))
    }
}

#[async_trait]
impl RecordApi for HttpClient {
    async fn list(&self, entity: &EntityId, fields: &[String]) -> Result<Vec<Record>, ApiError> {
        let request = self.client.get(self.list_url(entity, fields));
        let body: RowsBody =
            send_json(request, || ApiError::EntityNotFound(entity.to_string())).await?;
        Ok(body.into_rows())
    }

    async fn get(&self, entity: &EntityId, id: &str) -> Result<Record, ApiError> {
        let request = self.client.get(self.records_url(entity, Some(id)));
        send_json(request, || record_not_found(entity, id)).await
    }

    async fn create(&self, entity: &EntityId, record: &Record) -> Result<Record, ApiError> {
        let request = self.client.post(self.records_url(entity, None)).json(record);
        send_json(request, || ApiError::EntityNotFound(entity.to_string())).await
    }

    async fn update(&self, entity: &EntityId, id: &str, record: &Record) -> Result<Record, ApiError> {
        let request = self
            .client
            .put(self.records_url(entity, Some(id)))
            .json(record);
        send_json(request, || record_not_found(entity, id)).await
    }

    async fn delete(&self, entity: &EntityId, id: &str) -> Result<(), ApiError> {
        let request = self.client.delete(self.records_url(entity, Some(id)));
        send(request, || record_not_found(entity, id)).await?;
        Ok(())
    }
}

fn record_not_found(entity: &EntityId, id: &str) -> ApiError {
    ApiError::RecordNotFound {
        entity: entity.to_string(),
        id: id.to_string(),
    }
}

#[async_trait]
impl ActionApi for HttpClient {
    async fn run(&self, request: &ActionRequest) -> Result<ActionResult, ApiError> {
        tracing::debug!(module_id = %request.module_id, action_id = %request.action_id, "POST action");
        let http = self.client.post(self.url(&["actions", "run"])).json(request);
        let body: RunBody = send_json(http, || {
            ApiError::Rejected {
                status: StatusCode::NOT_FOUND.as_u16(),
                message: format!("unknown action '{}'", request.action_id),
            }
        })
        .await?;
        Ok(body.result)
    }
}

#[async_trait]
impl RegistryApi for HttpClient {
    async fn list_modules(&self) -> Result<Vec<ModuleSummary>, ApiError> {
        let request = self.client.get(self.url(&["modules"]));
        send_json(request, || ApiError::InvalidResponse("module registry unavailable".into())).await
    }
}
